//! Default document generation for context bundles.
//!
//! Every new context gets four seed documents built from whatever repository
//! data is linked at the time. Generation is deterministic: the same context
//! always yields the same bytes, which keeps regeneration (for example after
//! a contributor toggle) an honest overwrite.

use crate::models::{Context, CreateFileRequest, FileType};
use crate::store::{ContextStore, StoreError};

/// Builds `stack.md`. Languages come from the linked repository snapshot,
/// listed alphabetically; the section is omitted when no language data is
/// present.
pub fn stack_content(context: &Context) -> String {
    let mut content = String::from("# Technology Stack\n\n");

    if let Some(repo) = &context.github_repo {
        if let Some(languages) = &repo.languages {
            if !languages.is_empty() {
                content.push_str("## Languages\n");
                let mut names: Vec<&String> = languages.keys().collect();
                names.sort();
                for lang in names {
                    content.push_str(&format!("- **{}**\n", lang));
                }
                content.push('\n');
            }
        }
    }

    content.push_str("## Frameworks & Libraries\n");
    content.push_str("_Add frameworks and libraries used in this project_\n\n");

    content.push_str("## Tools & Services\n");
    content.push_str("_Add development tools, CI/CD, and services used_\n\n");

    content.push_str("## Architecture\n");
    content.push_str("_Describe the high-level architecture of the project_\n");

    content
}

/// Builds `business.md`, seeding the project description from the linked
/// repository when one is known.
pub fn business_content(context: &Context) -> String {
    let mut content = String::from("# Business Logic\n\n");

    if let Some(repo) = &context.github_repo {
        if let Some(description) = &repo.description {
            content.push_str(&format!("## Project Description\n{}\n\n", description));
        }
    }

    content.push_str("## Core Features\n");
    content.push_str("_List the main features and functionality_\n\n");

    content.push_str("## Business Rules\n");
    content.push_str("_Document important business rules and constraints_\n\n");

    content.push_str("## User Stories\n");
    content.push_str("_Add key user stories and use cases_\n");

    content
}

/// Builds `people.md`. Only contributors marked `selected` get a section;
/// profile lines appear strictly when the field carries a value.
pub fn people_content(context: &Context) -> String {
    let mut content = String::from("# People\n\n");

    if !context.contributors.is_empty() {
        content.push_str("## Contributors\n");
        for contributor in &context.contributors {
            if !contributor.selected {
                continue;
            }
            let display_name = contributor.name.as_deref().unwrap_or(&contributor.login);
            content.push_str(&format!("### {}\n", display_name));
            content.push_str(&format!(
                "- **GitHub**: [@{}](https://github.com/{})\n",
                contributor.login, contributor.login
            ));

            if let Some(pronouns) = &contributor.pronouns {
                content.push_str(&format!("- **Pronouns**: {}\n", pronouns));
            }
            if let Some(bio) = &contributor.bio {
                content.push_str(&format!("- **Bio**: {}\n", bio));
            }
            if let Some(company) = &contributor.company {
                content.push_str(&format!("- **Company**: {}\n", company));
            }
            if let Some(location) = &contributor.location {
                content.push_str(&format!("- **Location**: {}\n", location));
            }
            if let Some(website) = &contributor.website {
                // The label keeps the raw value; the link always gets a scheme.
                let href = if website.starts_with("http://") || website.starts_with("https://") {
                    website.clone()
                } else {
                    format!("https://{}", website)
                };
                content.push_str(&format!("- **Website**: [{}]({})\n", website, href));
            }
            if let Some(email) = &contributor.email {
                content.push_str(&format!("- **Email**: {}\n", email));
            }
            if let Some(twitter) = &contributor.twitter_username {
                content.push_str(&format!(
                    "- **Twitter**: [@{}](https://twitter.com/{})\n",
                    twitter, twitter
                ));
            }
            if contributor.hireable.unwrap_or(false) {
                content.push_str("- **Available for hire**: Yes\n");
            }

            content.push('\n');
        }
    }

    content.push_str("## Team Roles\n");
    content.push_str("_Define roles and responsibilities_\n\n");

    content.push_str("## Contact Information\n");
    content.push_str("_Add relevant contact information_\n");

    content
}

/// Builds `guidelines.md`. Pure scaffolding, independent of the repository.
pub fn guidelines_content() -> String {
    let mut content = String::from("# Development Guidelines\n\n");

    content.push_str("## Code Style\n");
    content.push_str("_Define coding standards and style guidelines_\n\n");

    content.push_str("## Development Workflow\n");
    content.push_str("_Describe the development process and workflow_\n\n");

    content.push_str("## Testing Guidelines\n");
    content.push_str("_Document testing requirements and practices_\n\n");

    content.push_str("## Review Process\n");
    content.push_str("_Define the code review process_\n");

    content
}

/// Adds the four seed documents to the context through the store, replacing
/// any documents already carrying those names. Returns the refreshed context,
/// or `Ok(None)` when the id is unknown.
pub fn generate_default_files(
    store: &ContextStore,
    id: &str,
) -> Result<Option<Context>, StoreError> {
    let context = match store.get_context(id) {
        Some(c) => c,
        None => return Ok(None),
    };

    let seeds = [
        ("stack.md", FileType::Stack, stack_content(&context)),
        ("business.md", FileType::Business, business_content(&context)),
        ("people.md", FileType::People, people_content(&context)),
        ("guidelines.md", FileType::Guidelines, guidelines_content()),
    ];
    for (name, file_type, content) in seeds {
        store.add_file(
            id,
            CreateFileRequest {
                name: name.to_string(),
                file_type,
                content,
            },
        )?;
    }

    Ok(store.get_context(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateContextRequest, GitHubContributor, GitHubRepo};
    use crate::store::ContextStore;
    use chrono::Utc;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn bare_context() -> Context {
        let now = Utc::now();
        Context {
            id: "ctx-1".to_string(),
            name: "Demo".to_string(),
            description: None,
            owner_id: "u1".to_string(),
            owner_login: "alice".to_string(),
            github_repo: None,
            files: Vec::new(),
            contributors: Vec::new(),
            is_public: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn linked_repo(languages: &[(&str, u64)], description: Option<&str>) -> GitHubRepo {
        GitHubRepo {
            owner: "octocat".to_string(),
            name: "hello".to_string(),
            full_name: "octocat/hello".to_string(),
            description: description.map(String::from),
            url: "https://github.com/octocat/hello".to_string(),
            clone_url: "https://github.com/octocat/hello.git".to_string(),
            default_branch: "main".to_string(),
            language: None,
            languages: Some(
                languages
                    .iter()
                    .map(|(k, v)| (k.to_string(), *v))
                    .collect::<HashMap<_, _>>(),
            ),
        }
    }

    fn contributor(login: &str, selected: bool) -> GitHubContributor {
        GitHubContributor {
            login: login.to_string(),
            id: 1,
            avatar_url: String::new(),
            name: None,
            email: None,
            bio: None,
            pronouns: None,
            company: None,
            website: None,
            location: None,
            twitter_username: None,
            public_repos: None,
            followers: None,
            following: None,
            created_at: None,
            hireable: None,
            contributions: 1,
            selected,
        }
    }

    #[test]
    fn test_stack_omits_languages_without_repo_data() {
        let content = stack_content(&bare_context());
        assert_eq!(
            content,
            "# Technology Stack\n\n\
             ## Frameworks & Libraries\n_Add frameworks and libraries used in this project_\n\n\
             ## Tools & Services\n_Add development tools, CI/CD, and services used_\n\n\
             ## Architecture\n_Describe the high-level architecture of the project_\n"
        );

        // An empty language map is treated the same as no data.
        let mut ctx = bare_context();
        ctx.github_repo = Some(linked_repo(&[], None));
        assert_eq!(stack_content(&ctx), content);
    }

    #[test]
    fn test_stack_languages_sorted_alphabetically() {
        let mut ctx = bare_context();
        ctx.github_repo = Some(linked_repo(
            &[("Python", 10), ("Go", 99_999), ("Rust", 5)],
            None,
        ));
        let content = stack_content(&ctx);
        assert!(content.contains(
            "## Languages\n- **Go**\n- **Python**\n- **Rust**\n\n## Frameworks & Libraries\n"
        ));
    }

    #[test]
    fn test_business_description_from_repo() {
        let mut ctx = bare_context();
        assert!(!business_content(&ctx).contains("## Project Description"));

        ctx.github_repo = Some(linked_repo(&[], Some("A demo project")));
        let content = business_content(&ctx);
        assert!(content.starts_with("# Business Logic\n\n## Project Description\nA demo project\n\n"));
        assert!(content.ends_with(
            "## Core Features\n_List the main features and functionality_\n\n\
             ## Business Rules\n_Document important business rules and constraints_\n\n\
             ## User Stories\n_Add key user stories and use cases_\n"
        ));
    }

    #[test]
    fn test_people_selected_only_with_conditional_fields() {
        let mut ctx = bare_context();
        let mut lead = contributor("octocat", true);
        lead.name = Some("The Octocat".to_string());
        lead.bio = Some("Mascot".to_string());
        lead.website = Some("octocat.dev".to_string());
        lead.twitter_username = Some("octo".to_string());
        lead.hireable = Some(false);
        ctx.contributors = vec![lead, contributor("shadow", false)];

        let content = people_content(&ctx);
        assert!(content.contains("### The Octocat\n"));
        assert!(content.contains("- **GitHub**: [@octocat](https://github.com/octocat)\n"));
        assert!(content.contains("- **Bio**: Mascot\n"));
        assert!(content.contains("- **Website**: [octocat.dev](https://octocat.dev)\n"));
        assert!(content.contains("- **Twitter**: [@octo](https://twitter.com/octo)\n"));
        assert!(!content.contains("Available for hire"));
        assert!(!content.contains("Pronouns"));
        assert!(!content.contains("shadow"));
    }

    #[test]
    fn test_people_website_keeps_existing_scheme() {
        let mut ctx = bare_context();
        let mut lead = contributor("octocat", true);
        lead.website = Some("http://octocat.dev".to_string());
        ctx.contributors = vec![lead];

        let content = people_content(&ctx);
        assert!(content.contains("- **Website**: [http://octocat.dev](http://octocat.dev)\n"));
    }

    #[test]
    fn test_people_toggle_round_trip_is_byte_identical() {
        let mut ctx = bare_context();
        ctx.contributors = vec![contributor("octocat", false), contributor("hubot", true)];

        let original = people_content(&ctx);
        ctx.contributors[0].selected = true;
        let toggled = people_content(&ctx);
        assert_ne!(original, toggled);

        ctx.contributors[0].selected = false;
        assert_eq!(people_content(&ctx), original);
    }

    #[test]
    fn test_empty_context_gets_four_placeholder_documents() {
        let dir = TempDir::new().unwrap();
        let store = ContextStore::open(dir.path()).unwrap();
        let ctx = store
            .create_context(
                "u1",
                "alice",
                CreateContextRequest {
                    name: "Demo".to_string(),
                    description: None,
                    github_repo_url: None,
                    is_public: true,
                },
            )
            .unwrap();

        let seeded = generate_default_files(&store, &ctx.id).unwrap().unwrap();
        let names: Vec<&str> = seeded.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["stack.md", "business.md", "people.md", "guidelines.md"]);

        let guidelines = seeded
            .files
            .iter()
            .find(|f| f.name == "guidelines.md")
            .unwrap();
        assert_eq!(guidelines.file_type, FileType::Guidelines);
        assert_eq!(
            guidelines.content,
            "# Development Guidelines\n\n\
             ## Code Style\n_Define coding standards and style guidelines_\n\n\
             ## Development Workflow\n_Describe the development process and workflow_\n\n\
             ## Testing Guidelines\n_Document testing requirements and practices_\n\n\
             ## Review Process\n_Define the code review process_\n"
        );

        // Regeneration replaces in place rather than accumulating documents.
        let reseeded = generate_default_files(&store, &ctx.id).unwrap().unwrap();
        assert_eq!(reseeded.files.len(), 4);

        assert!(generate_default_files(&store, "nope").unwrap().is_none());
    }
}
