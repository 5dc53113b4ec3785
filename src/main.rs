//! # Context Market CLI (`ctxm`)
//!
//! The `ctxm` binary starts the two server surfaces of Context Market.
//!
//! ## Usage
//!
//! ```bash
//! ctxm --config ./ctxm.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ctxm serve web` | Start the web server (pages, OAuth, JSON API) |
//! | `ctxm serve mcp` | Start the MCP server for AI tool integration |
//!
//! Both surfaces share `[store].data_dir`: contexts persisted by the web
//! server are rehydrated by the MCP server at startup.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use context_market::{config, mcp, server};

/// Context Market CLI — curate project context bundles and serve them to
/// humans and AI tools.
#[derive(Parser)]
#[command(
    name = "ctxm",
    about = "Context Market — a marketplace for project context bundles",
    version,
    long_about = "Context Market lets users curate named bundles of documentation files \
    about their projects, link them to GitHub repositories, publish them back as pull \
    requests, and serve public bundles to MCP-compatible AI tools."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./ctxm.toml`. Server, store, and GitHub settings are
    /// read from this file; secrets come from the environment.
    #[arg(long, global = true, default_value = "./ctxm.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Start a server.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },
}

/// Server subcommands.
#[derive(Subcommand)]
enum ServeService {
    /// Start the web server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// HTML pages, the GitHub OAuth flow, and the JSON context API.
    /// Requires `CTXM_SECRET_KEY` in the environment.
    Web,

    /// Start the MCP server.
    ///
    /// Exposes public contexts to Cursor, Claude, and other MCP-compatible
    /// AI tools as a Streamable HTTP endpoint at `/mcp`.
    Mcp,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve { service } => match service {
            ServeService::Web => {
                server::run_server(&cfg).await?;
            }
            ServeService::Mcp => {
                mcp::run_server(&cfg).await?;
            }
        },
    }

    Ok(())
}
