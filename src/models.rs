//! Core data models used throughout Context Market.
//!
//! These types represent the context bundles, their documents, and the GitHub
//! snapshots that flow between the store, the web API, and the tool surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of document carried inside a context bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Stack,
    Business,
    People,
    Guidelines,
    Custom,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Stack => "stack",
            FileType::Business => "business",
            FileType::People => "people",
            FileType::Guidelines => "guidelines",
            FileType::Custom => "custom",
        }
    }
}

/// A named document inside a context. Names are unique per context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextFile {
    pub name: String,
    pub file_type: FileType,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot of a linked GitHub repository, captured at link time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRepo {
    pub owner: String,
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub url: String,
    pub clone_url: String,
    #[serde(default = "default_branch")]
    pub default_branch: String,
    #[serde(default)]
    pub language: Option<String>,
    /// Byte counts per language, as reported by the languages endpoint.
    #[serde(default)]
    pub languages: Option<HashMap<String, u64>>,
}

fn default_branch() -> String {
    "main".to_string()
}

/// Contributor snapshot, enriched with profile fields where available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubContributor {
    pub login: String,
    pub id: i64,
    pub avatar_url: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub pronouns: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub twitter_username: Option<String>,
    #[serde(default)]
    pub public_repos: Option<i64>,
    #[serde(default)]
    pub followers: Option<i64>,
    #[serde(default)]
    pub following: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub hireable: Option<bool>,
    #[serde(default)]
    pub contributions: u64,
    /// Whether this contributor appears in the generated people document.
    #[serde(default)]
    pub selected: bool,
}

/// A named bundle of documents, optionally linked to a repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub owner_id: String,
    pub owner_login: String,
    #[serde(default)]
    pub github_repo: Option<GitHubRepo>,
    #[serde(default)]
    pub files: Vec<ContextFile>,
    #[serde(default)]
    pub contributors: Vec<GitHubContributor>,
    #[serde(default = "default_true")]
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Request payloads
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateContextRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub github_repo_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_public: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateContextRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFileRequest {
    pub name: String,
    pub file_type: FileType,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateFileRequest {
    pub content: String,
}
