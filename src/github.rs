//! GitHub REST API client.
//!
//! One client per authenticated user: handlers construct a [`GitHubClient`]
//! from the session's access token and the configured API base. Two kinds of
//! call live here, with different failure behavior:
//!
//! - **Enrichment** (repository info, contributors, file content) degrades:
//!   failures are logged and surface as `None` or an empty list, never as an
//!   error. A context stays usable without its repository snapshot.
//! - **Publish plumbing** (branch refs, file writes, pull requests) is
//!   fallible: callers get the upstream failure, including the API's JSON
//!   `message` when one is present.
//!
//! The API base is configurable so integration tests can point the client at
//! a local mock server.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::config::GitHubConfig;
use crate::models::{GitHubContributor, GitHubRepo};

/// How many contributors get the extra per-profile lookup.
const CONTRIBUTOR_LIMIT: usize = 10;
/// Soft cap on repositories gathered across listing pages.
const REPO_LIST_LIMIT: usize = 200;

pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig, token: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("context-market/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            api_base: config.api_base.clone(),
            token: token.into(),
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.api_base, path))
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/json")
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.request(Method::GET, path)
    }

    // ============ Repository enrichment ============

    /// Fetches the repository snapshot for a web URL, including per-language
    /// byte counts. Unparseable URLs and upstream failures yield `None`.
    pub async fn repo_info(&self, url: &str) -> Option<GitHubRepo> {
        let (owner, repo) = parse_repo_url(url)?;
        match self.fetch_repo(&owner, &repo).await {
            Ok(info) => Some(info),
            Err(e) => {
                eprintln!("Warning: failed to fetch repository {}/{}: {}", owner, repo, e);
                None
            }
        }
    }

    async fn fetch_repo(&self, owner: &str, repo: &str) -> Result<GitHubRepo> {
        let resp = self.get(&format!("/repos/{}/{}", owner, repo)).send().await?;
        if !resp.status().is_success() {
            bail!("repository endpoint returned {}", resp.status());
        }
        let payload: RepoPayload = resp.json().await?;

        // Language data is best-effort; an empty map is a valid snapshot.
        let languages = match self.fetch_languages(owner, repo).await {
            Ok(map) => map,
            Err(e) => {
                eprintln!("Warning: failed to fetch languages for {}/{}: {}", owner, repo, e);
                HashMap::new()
            }
        };

        Ok(GitHubRepo {
            owner: payload.owner.login,
            name: payload.name,
            full_name: payload.full_name,
            description: non_empty(payload.description),
            url: payload.html_url,
            clone_url: payload.clone_url,
            default_branch: payload.default_branch.unwrap_or_else(|| "main".to_string()),
            language: non_empty(payload.language),
            languages: Some(languages),
        })
    }

    async fn fetch_languages(&self, owner: &str, repo: &str) -> Result<HashMap<String, u64>> {
        let resp = self
            .get(&format!("/repos/{}/{}/languages", owner, repo))
            .send()
            .await?;
        if !resp.status().is_success() {
            bail!("languages endpoint returned {}", resp.status());
        }
        Ok(resp.json().await?)
    }

    /// Fetches the top contributors (upstream order, capped) and enriches
    /// each with profile fields from the users endpoint. Failures degrade to
    /// an empty list; a failed profile lookup degrades that one entry.
    pub async fn contributors(&self, owner: &str, repo: &str) -> Vec<GitHubContributor> {
        match self.fetch_contributors(owner, repo).await {
            Ok(list) => list,
            Err(e) => {
                eprintln!(
                    "Warning: failed to fetch contributors for {}/{}: {}",
                    owner, repo, e
                );
                Vec::new()
            }
        }
    }

    async fn fetch_contributors(&self, owner: &str, repo: &str) -> Result<Vec<GitHubContributor>> {
        let resp = self
            .get(&format!("/repos/{}/{}/contributors", owner, repo))
            .send()
            .await?;
        if !resp.status().is_success() {
            bail!("contributors endpoint returned {}", resp.status());
        }
        let raw: Vec<ContributorPayload> = resp.json().await?;

        let mut contributors = Vec::new();
        for entry in raw.into_iter().take(CONTRIBUTOR_LIMIT) {
            let profile = match self.fetch_profile(&entry.login).await {
                Ok(profile) => profile,
                Err(e) => {
                    eprintln!("Warning: failed to fetch profile for {}: {}", entry.login, e);
                    ProfilePayload::default()
                }
            };
            contributors.push(GitHubContributor {
                login: entry.login,
                id: entry.id,
                avatar_url: entry.avatar_url,
                name: non_empty(profile.name),
                email: non_empty(profile.email),
                bio: non_empty(profile.bio),
                pronouns: non_empty(profile.pronouns),
                company: non_empty(profile.company),
                // The users endpoint calls the website field "blog".
                website: non_empty(profile.blog),
                location: non_empty(profile.location),
                twitter_username: non_empty(profile.twitter_username),
                public_repos: profile.public_repos,
                followers: profile.followers,
                following: profile.following,
                created_at: profile.created_at,
                hireable: profile.hireable,
                contributions: entry.contributions,
                selected: false,
            });
        }
        Ok(contributors)
    }

    async fn fetch_profile(&self, login: &str) -> Result<ProfilePayload> {
        let resp = self.get(&format!("/users/{}", login)).send().await?;
        if !resp.status().is_success() {
            bail!("users endpoint returned {}", resp.status());
        }
        Ok(resp.json().await?)
    }

    /// Fetches one file's decoded text content from the repository. Anything
    /// that is not a regular file, or any upstream failure, yields `None`.
    pub async fn file_content(&self, owner: &str, repo: &str, path: &str) -> Option<String> {
        match self.fetch_file_content(owner, repo, path).await {
            Ok(content) => Some(content),
            Err(e) => {
                eprintln!(
                    "Warning: failed to fetch {}/{} file {}: {}",
                    owner, repo, path, e
                );
                None
            }
        }
    }

    async fn fetch_file_content(&self, owner: &str, repo: &str, path: &str) -> Result<String> {
        let resp = self
            .get(&format!("/repos/{}/{}/contents/{}", owner, repo, path))
            .send()
            .await?;
        if !resp.status().is_success() {
            bail!("contents endpoint returned {}", resp.status());
        }
        let payload: ContentsPayload = resp.json().await?;
        if payload.kind != "file" {
            bail!("{} is not a file", path);
        }
        // The API wraps base64 content in newlines.
        let cleaned: String = payload
            .content
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let bytes = BASE64.decode(cleaned).context("invalid base64 content")?;
        String::from_utf8(bytes).context("file content is not UTF-8")
    }

    // ============ Authenticated identity ============

    pub async fn current_user(&self) -> Result<UserPayload> {
        let resp = self.get("/user").send().await?;
        if !resp.status().is_success() {
            bail!("user endpoint returned {}", resp.status());
        }
        Ok(resp.json().await?)
    }

    /// Looks up the primary address from the emails endpoint, for accounts
    /// whose profile email is private.
    pub async fn user_primary_email(&self) -> Result<Option<String>> {
        let resp = self.get("/user/emails").send().await?;
        if !resp.status().is_success() {
            bail!("emails endpoint returned {}", resp.status());
        }
        let emails: Vec<EmailPayload> = resp.json().await?;
        Ok(emails.into_iter().find(|e| e.primary).map(|e| e.email))
    }

    // ============ Repository listing ============

    /// Lists repositories the user can reach: personal pages first, then each
    /// organization's, de-duplicated by id and sorted by update time (most
    /// recent first). Pagination stops at a soft cap; a non-success page ends
    /// that listing early rather than failing the whole call.
    pub async fn user_repositories(&self) -> Result<Vec<RepoSummary>> {
        let mut raw: Vec<RepoListPayload> = Vec::new();

        let mut page = 1;
        while raw.len() < REPO_LIST_LIMIT {
            let resp = self
                .get("/user/repos")
                .query(&[
                    ("sort", "updated"),
                    ("per_page", "100"),
                    ("type", "all"),
                    ("page", &page.to_string()),
                ])
                .send()
                .await?;
            if !resp.status().is_success() {
                break;
            }
            let batch: Vec<RepoListPayload> = resp.json().await?;
            if batch.is_empty() {
                break;
            }
            raw.extend(batch);
            page += 1;
        }

        for org in self.user_orgs().await? {
            let mut org_page = 1;
            loop {
                let resp = self
                    .get(&format!("/orgs/{}/repos", org))
                    .query(&[
                        ("sort", "updated"),
                        ("per_page", "100"),
                        ("type", "all"),
                        ("page", &org_page.to_string()),
                    ])
                    .send()
                    .await?;
                if !resp.status().is_success() {
                    break;
                }
                let batch: Vec<RepoListPayload> = resp.json().await?;
                if batch.is_empty() {
                    break;
                }
                let known: std::collections::HashSet<i64> = raw.iter().map(|r| r.id).collect();
                let fresh: Vec<RepoListPayload> = batch
                    .into_iter()
                    .filter(|r| !known.contains(&r.id))
                    .collect();
                let fresh_len = fresh.len();
                raw.extend(fresh);
                org_page += 1;
                if fresh_len < 100 {
                    break;
                }
            }
        }

        let mut summaries: Vec<RepoSummary> = raw.into_iter().map(RepoSummary::from).collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    async fn user_orgs(&self) -> Result<Vec<String>> {
        let resp = self
            .get("/user/orgs")
            .query(&[("per_page", "100")])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Ok(Vec::new());
        }
        let orgs: Vec<OrgPayload> = resp.json().await?;
        Ok(orgs.into_iter().map(|o| o.login).collect())
    }

    // ============ Publish plumbing ============

    /// Resolves the tip commit SHA of a branch.
    pub async fn branch_head_sha(&self, owner: &str, repo: &str, branch: &str) -> Result<String> {
        let resp = self
            .get(&format!("/repos/{}/{}/git/ref/heads/{}", owner, repo, branch))
            .send()
            .await?;
        if !resp.status().is_success() {
            bail!("could not get branch reference: {}", api_message(resp).await);
        }
        let payload: RefPayload = resp.json().await?;
        Ok(payload.object.sha)
    }

    pub async fn create_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        sha: &str,
    ) -> Result<()> {
        let resp = self
            .request(Method::POST, &format!("/repos/{}/{}/git/refs", owner, repo))
            .json(&serde_json::json!({
                "ref": format!("refs/heads/{}", branch),
                "sha": sha,
            }))
            .send()
            .await?;
        if resp.status() != reqwest::StatusCode::CREATED {
            bail!("{}", api_message(resp).await);
        }
        Ok(())
    }

    /// Creates or updates one file on a branch. The contents endpoint answers
    /// 201 for new files and 200 for updates.
    pub async fn put_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        content: &str,
        message: &str,
        branch: &str,
    ) -> Result<()> {
        let resp = self
            .request(
                Method::PUT,
                &format!("/repos/{}/{}/contents/{}", owner, repo, path),
            )
            .json(&serde_json::json!({
                "message": message,
                "content": BASE64.encode(content.as_bytes()),
                "branch": branch,
            }))
            .send()
            .await?;
        let status = resp.status();
        if status != reqwest::StatusCode::CREATED && status != reqwest::StatusCode::OK {
            bail!("{}", api_message(resp).await);
        }
        Ok(())
    }

    /// Opens a pull request and returns its web URL.
    pub async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<String> {
        let resp = self
            .request(Method::POST, &format!("/repos/{}/{}/pulls", owner, repo))
            .json(&serde_json::json!({
                "title": title,
                "body": body,
                "head": head,
                "base": base,
            }))
            .send()
            .await?;
        if resp.status() != reqwest::StatusCode::CREATED {
            bail!("{}", api_message(resp).await);
        }
        let payload: PullRequestPayload = resp.json().await?;
        Ok(payload.html_url)
    }
}

/// Extracts owner and repository name from a GitHub web or SSH URL,
/// tolerating a `.git` suffix and a trailing slash. Anything else is `None`.
pub fn parse_repo_url(url: &str) -> Option<(String, String)> {
    let url = url.trim();
    let rest = url
        .strip_prefix("https://github.com/")
        .or_else(|| url.strip_prefix("http://github.com/"))
        .or_else(|| url.strip_prefix("https://www.github.com/"))
        .or_else(|| url.strip_prefix("git@github.com:"))?;

    let (owner, repo) = rest.trim_end_matches('/').split_once('/')?;
    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Pulls the `message` field out of an API error body, falling back to the
/// HTTP status line.
async fn api_message(resp: reqwest::Response) -> String {
    let status = resp.status();
    match resp.json::<serde_json::Value>().await {
        Ok(body) => body
            .get("message")
            .and_then(|m| m.as_str())
            .map(|m| m.to_string())
            .unwrap_or_else(|| status.to_string()),
        Err(_) => status.to_string(),
    }
}

// ============ Wire payloads ============

#[derive(Debug, Deserialize)]
struct RepoPayload {
    name: String,
    full_name: String,
    #[serde(default)]
    description: Option<String>,
    html_url: String,
    clone_url: String,
    #[serde(default)]
    default_branch: Option<String>,
    #[serde(default)]
    language: Option<String>,
    owner: OwnerPayload,
}

#[derive(Debug, Deserialize)]
struct OwnerPayload {
    login: String,
    #[serde(default, rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ContributorPayload {
    login: String,
    id: i64,
    avatar_url: String,
    #[serde(default)]
    contributions: u64,
}

#[derive(Debug, Default, Deserialize)]
struct ProfilePayload {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    bio: Option<String>,
    #[serde(default)]
    pronouns: Option<String>,
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    blog: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    twitter_username: Option<String>,
    #[serde(default)]
    public_repos: Option<i64>,
    #[serde(default)]
    followers: Option<i64>,
    #[serde(default)]
    following: Option<i64>,
    #[serde(default)]
    created_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    hireable: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ContentsPayload {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
pub struct UserPayload {
    pub id: i64,
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub avatar_url: String,
}

#[derive(Debug, Deserialize)]
struct EmailPayload {
    email: String,
    #[serde(default)]
    primary: bool,
}

#[derive(Debug, Deserialize)]
struct OrgPayload {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RefPayload {
    object: RefObjectPayload,
}

#[derive(Debug, Deserialize)]
struct RefObjectPayload {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PullRequestPayload {
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct RepoListPayload {
    id: i64,
    name: String,
    full_name: String,
    #[serde(default)]
    description: Option<String>,
    html_url: String,
    clone_url: String,
    private: bool,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    stargazers_count: i64,
    #[serde(default)]
    forks_count: i64,
    #[serde(default)]
    fork: bool,
    owner: OwnerPayload,
    #[serde(default)]
    permissions: Option<PermissionsPayload>,
}

#[derive(Debug, Deserialize)]
struct PermissionsPayload {
    #[serde(default)]
    admin: bool,
    #[serde(default)]
    push: bool,
    #[serde(default = "default_pull")]
    pull: bool,
}

fn default_pull() -> bool {
    true
}

/// Repository row returned by the listing API, annotated by the handler with
/// whether one of the caller's contexts already links to it.
#[derive(Debug, Clone, Serialize)]
pub struct RepoSummary {
    pub id: i64,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub html_url: String,
    pub clone_url: String,
    pub private: bool,
    pub language: Option<String>,
    pub updated_at: Option<String>,
    pub stargazers_count: i64,
    pub forks_count: i64,
    pub fork: bool,
    pub owner_type: String,
    pub owner_login: String,
    pub permissions: RepoPermissions,
    pub has_context: bool,
    pub context_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepoPermissions {
    pub admin: bool,
    pub push: bool,
    pub pull: bool,
}

impl From<RepoListPayload> for RepoSummary {
    fn from(raw: RepoListPayload) -> Self {
        let permissions = match raw.permissions {
            Some(p) => RepoPermissions {
                admin: p.admin,
                push: p.push,
                pull: p.pull,
            },
            None => RepoPermissions {
                admin: false,
                push: false,
                pull: true,
            },
        };
        Self {
            id: raw.id,
            name: raw.name,
            full_name: raw.full_name,
            description: raw.description,
            html_url: raw.html_url,
            clone_url: raw.clone_url,
            private: raw.private,
            language: raw.language,
            updated_at: raw.updated_at,
            stargazers_count: raw.stargazers_count,
            forks_count: raw.forks_count,
            fork: raw.fork,
            owner_type: raw.owner.kind,
            owner_login: raw.owner.login,
            permissions,
            has_context: false,
            context_id: None,
        }
    }
}
