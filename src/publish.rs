//! Publish workflow: pushing a context's documents to its linked repository
//! as a pull request.
//!
//! The workflow is a straight line with one soft spot: repository access,
//! branch-ref lookup, branch creation, and the pull request itself are fatal
//! when they fail, while individual file writes only warn and continue so a
//! single bad path cannot sink the whole publish. Nothing is rolled back; a
//! branch created before a failed pull request stays on the repository.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::github::GitHubClient;
use crate::models::Context;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Context is not connected to a GitHub repository")]
    NotLinked,
    #[error("Repository not found or not accessible")]
    RepoAccess,
    #[error("Could not get default branch reference: {message}")]
    Reference { message: String },
    #[error("Could not create branch {branch}: {message}")]
    Branch { branch: String, message: String },
    #[error("Could not create PR: {message}")]
    PullRequest { message: String },
}

/// Publishes the context's documents to `.context/` on a fresh branch of the
/// linked repository and opens a pull request against the default branch.
/// Returns the pull request's web URL.
pub async fn publish_context(
    github: &GitHubClient,
    context: &Context,
    acting_login: &str,
) -> Result<String, PublishError> {
    let linked = match &context.github_repo {
        Some(repo) => repo,
        None => return Err(PublishError::NotLinked),
    };

    // Re-read the repository so a deleted repo or revoked access fails
    // before any branch is created.
    let repo = match github.repo_info(&linked.url).await {
        Some(repo) => repo,
        None => return Err(PublishError::RepoAccess),
    };

    let base_sha = github
        .branch_head_sha(&repo.owner, &repo.name, &repo.default_branch)
        .await
        .map_err(|e| PublishError::Reference {
            message: e.to_string(),
        })?;

    let branch = branch_name(&context.name, Utc::now());
    github
        .create_branch(&repo.owner, &repo.name, &branch, &base_sha)
        .await
        .map_err(|e| PublishError::Branch {
            branch: branch.clone(),
            message: e.to_string(),
        })?;

    for file in &context.files {
        let path = format!(".context/{}", file.name);
        let message = format!("Add {} from Context Market", path);
        let written = github
            .put_file(
                &repo.owner,
                &repo.name,
                &path,
                &file.content,
                &message,
                &branch,
            )
            .await;
        if let Err(e) = written {
            eprintln!("Warning: could not create file {}: {}", path, e);
        }
    }

    let title = format!("Add project context from {}", context.name);
    let body = pr_body(context, acting_login);
    github
        .create_pull_request(
            &repo.owner,
            &repo.name,
            &title,
            &body,
            &branch,
            &repo.default_branch,
        )
        .await
        .map_err(|e| PublishError::PullRequest {
            message: e.to_string(),
        })
}

/// Branch names carry the lowercased, hyphenated context name plus a UTC
/// timestamp so repeated publishes never collide.
fn branch_name(context_name: &str, now: DateTime<Utc>) -> String {
    let slug = context_name.to_lowercase().replace(' ', "-");
    format!("context-{}-{}", slug, now.format("%Y%m%d-%H%M%S"))
}

fn pr_body(context: &Context, acting_login: &str) -> String {
    let description_line = match &context.description {
        Some(description) => format!("**Description:** {}", description),
        None => String::new(),
    };
    let file_list = context
        .files
        .iter()
        .map(|f| format!("- `.context/{}`", f.name))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "This PR adds project context files from Context Market.\n\
         \n\
         **Context:** {name}\n\
         {description_line}\n\
         \n\
         ## Files Added:\n\
         {file_list}\n\
         \n\
         ## What is this?\n\
         These files contain project context information including:\n\
         - Technology stack and architecture\n\
         - Business logic and requirements\n\
         - Team information and contributors\n\
         - Development guidelines and standards\n\
         \n\
         The `.context/` directory helps new contributors understand the project quickly \
         and provides context for AI tools and code assistants.\n\
         \n\
         ---\n\
         *Created by @{login} via [Context Market]()*\n",
        name = context.name,
        description_line = description_line,
        file_list = file_list,
        login = acting_login,
    )
}
