//! # Context Market
//!
//! A marketplace for project context bundles. Users sign in with GitHub,
//! curate a "context" — a named bundle of documentation files describing a
//! project's stack, business logic, people, and guidelines — optionally link
//! it to a repository, and publish the bundle back to that repository as a
//! pull request. Public contexts are also served read-only to MCP clients.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ Web (axum)   │──▶│ ContextStore │◀──│ MCP (rmcp)    │
//! │ pages + API  │   │ in-memory +  │   │ tools +       │
//! │ OAuth login  │   │ write-through│   │ resources     │
//! └──────┬───────┘   └──────────────┘   └───────────────┘
//!        │
//!        ▼
//! ┌──────────────┐
//! │ GitHubClient │  enrichment (degrading) + publish (fallible)
//! └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export GITHUB_CLIENT_ID=... GITHUB_CLIENT_SECRET=... CTXM_SECRET_KEY=...
//! ctxm serve web                # web surface on [server].bind
//! ctxm serve mcp                # MCP surface at /mcp
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`store`] | Context store with write-through persistence |
//! | [`generate`] | Default document generation |
//! | [`github`] | GitHub REST client |
//! | [`publish`] | Publish-to-pull-request workflow |
//! | [`session`] | Signed-cookie sessions |
//! | [`auth`] | GitHub OAuth handlers |
//! | [`server`] | Web server (pages + JSON API) |
//! | [`pages`] | Server-rendered HTML pages |
//! | [`tools`] | Read-only tool registry |
//! | [`mcp`] | MCP protocol bridge |

pub mod auth;
pub mod config;
pub mod generate;
pub mod github;
pub mod mcp;
pub mod models;
pub mod pages;
pub mod publish;
pub mod server;
pub mod session;
pub mod store;
pub mod tools;
