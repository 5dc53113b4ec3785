//! In-memory context store with write-through persistence.
//!
//! Contexts live in a `HashMap` behind a single `std::sync::RwLock`. Every
//! mutation holds the write lock across its whole read-modify-write-persist
//! sequence, so the map and the on-disk copy cannot diverge under concurrent
//! handlers. Each context persists as a directory:
//!
//! ```text
//! <data_dir>/<context id>/metadata.json   # the full serialized context
//! <data_dir>/<context id>/files/<name>    # raw content, one file per document
//! ```
//!
//! `metadata.json` is the source of truth; the `files/` copies exist so the
//! documents stay greppable and diffable on disk. [`ContextStore::open`]
//! rehydrates the map from `metadata.json` entries at startup.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Context, ContextFile, CreateContextRequest, CreateFileRequest, GitHubContributor, GitHubRepo,
    UpdateContextRequest, UpdateFileRequest,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a context linked to {url} already exists for this user")]
    DuplicateLink { url: String },
    #[error("failed to open data directory {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to persist context {id}: {source}")]
    Persist {
        id: String,
        #[source]
        source: std::io::Error,
    },
}

/// Thread-safe store for context bundles.
pub struct ContextStore {
    contexts: RwLock<HashMap<String, Context>>,
    data_dir: PathBuf,
}

impl ContextStore {
    /// Opens a store rooted at `data_dir`, creating the directory if needed
    /// and rehydrating every context persisted there. Unreadable entries are
    /// skipped with a warning so one corrupt directory cannot keep the
    /// service from starting.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).map_err(|source| StoreError::Open {
            path: data_dir.clone(),
            source,
        })?;

        let mut contexts = HashMap::new();
        let entries = fs::read_dir(&data_dir).map_err(|source| StoreError::Open {
            path: data_dir.clone(),
            source,
        })?;
        for entry in entries.flatten() {
            let metadata_path = entry.path().join("metadata.json");
            if !metadata_path.is_file() {
                continue;
            }
            match read_context(&metadata_path) {
                Ok(context) => {
                    contexts.insert(context.id.clone(), context);
                }
                Err(e) => {
                    eprintln!(
                        "Warning: skipping unreadable context at {}: {}",
                        metadata_path.display(),
                        e
                    );
                }
            }
        }

        Ok(Self {
            contexts: RwLock::new(contexts),
            data_dir,
        })
    }

    pub fn len(&self) -> usize {
        self.contexts.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creates a context owned by the given user. When the request carries a
    /// repository URL that one of the owner's existing contexts is already
    /// linked to, creation is rejected before anything is written.
    pub fn create_context(
        &self,
        owner_id: &str,
        owner_login: &str,
        req: CreateContextRequest,
    ) -> Result<Context, StoreError> {
        let mut contexts = self.contexts.write().unwrap();

        if let Some(url) = req.github_repo_url.as_deref() {
            let already_linked = contexts.values().any(|c| {
                c.owner_id == owner_id
                    && match &c.github_repo {
                        Some(repo) => repo.url == url,
                        None => false,
                    }
            });
            if already_linked {
                return Err(StoreError::DuplicateLink {
                    url: url.to_string(),
                });
            }
        }

        let now = Utc::now();
        let context = Context {
            id: Uuid::new_v4().to_string(),
            name: req.name,
            description: req.description,
            owner_id: owner_id.to_string(),
            owner_login: owner_login.to_string(),
            github_repo: None,
            files: Vec::new(),
            contributors: Vec::new(),
            is_public: req.is_public,
            created_at: now,
            updated_at: now,
        };
        self.persist(&context)?;
        contexts.insert(context.id.clone(), context.clone());
        Ok(context)
    }

    pub fn get_context(&self, id: &str) -> Option<Context> {
        self.contexts.read().unwrap().get(id).cloned()
    }

    pub fn contexts_for_owner(&self, owner_id: &str) -> Vec<Context> {
        self.contexts
            .read()
            .unwrap()
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect()
    }

    pub fn all_contexts(&self) -> Vec<Context> {
        self.contexts.read().unwrap().values().cloned().collect()
    }

    pub fn public_contexts(&self) -> Vec<Context> {
        self.contexts
            .read()
            .unwrap()
            .values()
            .filter(|c| c.is_public)
            .cloned()
            .collect()
    }

    /// Maps each repository URL that one of the owner's contexts is linked to
    /// onto that context's id. URLs are compared by exact string equality
    /// against the stored canonical repository URL.
    pub fn contexts_for_repo_urls(
        &self,
        owner_id: &str,
        urls: &[String],
    ) -> HashMap<String, String> {
        let contexts = self.contexts.read().unwrap();
        let mut linked = HashMap::new();
        for url in urls {
            let found = contexts.values().find(|c| {
                c.owner_id == owner_id
                    && match &c.github_repo {
                        Some(repo) => &repo.url == url,
                        None => false,
                    }
            });
            if let Some(context) = found {
                linked.insert(url.clone(), context.id.clone());
            }
        }
        linked
    }

    pub fn update_context(
        &self,
        id: &str,
        req: UpdateContextRequest,
    ) -> Result<Option<Context>, StoreError> {
        let mut contexts = self.contexts.write().unwrap();
        let context = match contexts.get_mut(id) {
            Some(c) => c,
            None => return Ok(None),
        };
        if let Some(name) = req.name {
            context.name = name;
        }
        if let Some(description) = req.description {
            context.description = Some(description);
        }
        if let Some(is_public) = req.is_public {
            context.is_public = is_public;
        }
        context.updated_at = Utc::now();
        self.persist(context)?;
        Ok(Some(context.clone()))
    }

    /// Removes the context and its on-disk directory. Absent ids return
    /// `Ok(false)`.
    pub fn delete_context(&self, id: &str) -> Result<bool, StoreError> {
        let mut contexts = self.contexts.write().unwrap();
        if contexts.remove(id).is_none() {
            return Ok(false);
        }
        let dir = self.data_dir.join(id);
        if let Err(source) = fs::remove_dir_all(&dir) {
            if source.kind() != std::io::ErrorKind::NotFound {
                return Err(StoreError::Persist {
                    id: id.to_string(),
                    source,
                });
            }
        }
        Ok(true)
    }

    /// Adds a document to the context. A document with the same name is
    /// replaced: the old entry is removed and the new one appended, so the
    /// file count never grows on re-add.
    pub fn add_file(
        &self,
        id: &str,
        req: CreateFileRequest,
    ) -> Result<Option<ContextFile>, StoreError> {
        let mut contexts = self.contexts.write().unwrap();
        let context = match contexts.get_mut(id) {
            Some(c) => c,
            None => return Ok(None),
        };
        let now = Utc::now();
        context.files.retain(|f| f.name != req.name);
        let file = ContextFile {
            name: req.name,
            file_type: req.file_type,
            content: req.content,
            created_at: now,
            updated_at: now,
        };
        context.files.push(file.clone());
        context.updated_at = now;
        self.persist(context)?;
        Ok(Some(file))
    }

    pub fn update_file(
        &self,
        id: &str,
        name: &str,
        req: UpdateFileRequest,
    ) -> Result<Option<ContextFile>, StoreError> {
        let mut contexts = self.contexts.write().unwrap();
        let context = match contexts.get_mut(id) {
            Some(c) => c,
            None => return Ok(None),
        };
        let now = Utc::now();
        let updated = match context.files.iter_mut().find(|f| f.name == name) {
            Some(file) => {
                file.content = req.content;
                file.updated_at = now;
                file.clone()
            }
            None => return Ok(None),
        };
        context.updated_at = now;
        self.persist(context)?;
        Ok(Some(updated))
    }

    /// Removes a document by name. Returns `Ok(false)` without touching
    /// timestamps when the context exists but carries no such document.
    pub fn remove_file(&self, id: &str, name: &str) -> Result<bool, StoreError> {
        let mut contexts = self.contexts.write().unwrap();
        let context = match contexts.get_mut(id) {
            Some(c) => c,
            None => return Ok(false),
        };
        let before = context.files.len();
        context.files.retain(|f| f.name != name);
        if context.files.len() == before {
            return Ok(false);
        }
        context.updated_at = Utc::now();
        self.persist(context)?;
        Ok(true)
    }

    /// Replaces the repository link wholesale with a fresh snapshot.
    pub fn set_repo_link(&self, id: &str, repo: GitHubRepo) -> Result<Option<Context>, StoreError> {
        let mut contexts = self.contexts.write().unwrap();
        let context = match contexts.get_mut(id) {
            Some(c) => c,
            None => return Ok(None),
        };
        context.github_repo = Some(repo);
        context.updated_at = Utc::now();
        self.persist(context)?;
        Ok(Some(context.clone()))
    }

    /// Replaces the contributor snapshot wholesale.
    pub fn set_contributors(
        &self,
        id: &str,
        contributors: Vec<GitHubContributor>,
    ) -> Result<Option<Context>, StoreError> {
        let mut contexts = self.contexts.write().unwrap();
        let context = match contexts.get_mut(id) {
            Some(c) => c,
            None => return Ok(None),
        };
        context.contributors = contributors;
        context.updated_at = Utc::now();
        self.persist(context)?;
        Ok(Some(context.clone()))
    }

    /// Flips a contributor's `selected` flag. Returns the updated context and
    /// the new flag value, or `Ok(None)` when the context or contributor is
    /// unknown.
    pub fn toggle_contributor(
        &self,
        id: &str,
        login: &str,
    ) -> Result<Option<(Context, bool)>, StoreError> {
        let mut contexts = self.contexts.write().unwrap();
        let context = match contexts.get_mut(id) {
            Some(c) => c,
            None => return Ok(None),
        };
        let selected = match context.contributors.iter_mut().find(|c| c.login == login) {
            Some(contributor) => {
                contributor.selected = !contributor.selected;
                contributor.selected
            }
            None => return Ok(None),
        };
        context.updated_at = Utc::now();
        self.persist(context)?;
        Ok(Some((context.clone(), selected)))
    }

    fn persist(&self, context: &Context) -> Result<(), StoreError> {
        write_context_dir(&self.data_dir, context).map_err(|source| StoreError::Persist {
            id: context.id.clone(),
            source,
        })
    }
}

fn read_context(path: &Path) -> anyhow::Result<Context> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_context_dir(data_dir: &Path, context: &Context) -> std::io::Result<()> {
    let dir = data_dir.join(&context.id);
    let files_dir = dir.join("files");
    fs::create_dir_all(&files_dir)?;

    let metadata = serde_json::to_string_pretty(context)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    fs::write(dir.join("metadata.json"), metadata)?;

    for file in &context.files {
        fs::write(files_dir.join(&file.name), &file.content)?;
    }

    // Prune raw copies of documents that are no longer in the bundle.
    for entry in fs::read_dir(&files_dir)?.flatten() {
        let name = entry.file_name();
        let kept = context
            .files
            .iter()
            .any(|f| f.name.as_str() == name.to_string_lossy());
        if !kept {
            let _ = fs::remove_file(entry.path());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileType;
    use tempfile::TempDir;

    fn test_store() -> (TempDir, ContextStore) {
        let dir = TempDir::new().unwrap();
        let store = ContextStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn create_req(name: &str, repo_url: Option<&str>) -> CreateContextRequest {
        CreateContextRequest {
            name: name.to_string(),
            description: None,
            github_repo_url: repo_url.map(String::from),
            is_public: true,
        }
    }

    fn file_req(name: &str, content: &str) -> CreateFileRequest {
        CreateFileRequest {
            name: name.to_string(),
            file_type: FileType::Custom,
            content: content.to_string(),
        }
    }

    fn sample_repo(url: &str) -> GitHubRepo {
        GitHubRepo {
            owner: "octocat".to_string(),
            name: "hello".to_string(),
            full_name: "octocat/hello".to_string(),
            description: None,
            url: url.to_string(),
            clone_url: format!("{}.git", url),
            default_branch: "main".to_string(),
            language: None,
            languages: None,
        }
    }

    fn sample_contributor(login: &str) -> GitHubContributor {
        GitHubContributor {
            login: login.to_string(),
            id: 1,
            avatar_url: format!("https://avatars.example/{}", login),
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
            contributions: 3,
            selected: false,
        }
    }

    #[test]
    fn test_create_context_defaults() {
        let (_dir, store) = test_store();
        let ctx = store
            .create_context("u1", "alice", create_req("My Project", None))
            .unwrap();

        assert!(!ctx.id.is_empty());
        assert_eq!(ctx.owner_id, "u1");
        assert_eq!(ctx.owner_login, "alice");
        assert!(ctx.files.is_empty());
        assert!(ctx.contributors.is_empty());
        assert!(ctx.github_repo.is_none());
        assert!(ctx.is_public);
        assert_eq!(ctx.created_at, ctx.updated_at);

        let fetched = store.get_context(&ctx.id).unwrap();
        assert_eq!(fetched.name, "My Project");
    }

    #[test]
    fn test_create_request_visibility_defaults_to_public() {
        let req: CreateContextRequest = serde_json::from_str(r#"{"name":"x"}"#).unwrap();
        assert!(req.is_public);
    }

    #[test]
    fn test_duplicate_repo_link_scoped_to_owner() {
        let (_dir, store) = test_store();
        let url = "https://github.com/octocat/hello";

        let first = store.create_context("u1", "alice", create_req("A", None)).unwrap();
        store.set_repo_link(&first.id, sample_repo(url)).unwrap();

        let err = store
            .create_context("u1", "alice", create_req("B", Some(url)))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateLink { .. }));

        // A different owner may link the same repository.
        let other = store.create_context("u2", "bob", create_req("C", Some(url)));
        assert!(other.is_ok());
    }

    #[test]
    fn test_add_file_replaces_same_name() {
        let (_dir, store) = test_store();
        let ctx = store.create_context("u1", "alice", create_req("A", None)).unwrap();

        store.add_file(&ctx.id, file_req("notes.md", "first")).unwrap();
        let before = store.get_context(&ctx.id).unwrap();
        assert_eq!(before.files.len(), 1);

        let replaced = store
            .add_file(&ctx.id, file_req("notes.md", "second"))
            .unwrap()
            .unwrap();
        assert_eq!(replaced.content, "second");

        let after = store.get_context(&ctx.id).unwrap();
        assert_eq!(after.files.len(), 1);
        assert_eq!(after.files[0].content, "second");
        assert!(after.updated_at >= before.updated_at);
    }

    #[test]
    fn test_update_file_bumps_file_and_context() {
        let (_dir, store) = test_store();
        let ctx = store.create_context("u1", "alice", create_req("A", None)).unwrap();
        let added = store
            .add_file(&ctx.id, file_req("notes.md", "first"))
            .unwrap()
            .unwrap();

        let updated = store
            .update_file(
                &ctx.id,
                "notes.md",
                UpdateFileRequest {
                    content: "second".to_string(),
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.content, "second");
        assert!(updated.updated_at >= added.updated_at);
        assert_eq!(updated.created_at, added.created_at);

        let after = store.get_context(&ctx.id).unwrap();
        assert!(after.updated_at >= ctx.updated_at);

        let missing = store
            .update_file(
                &ctx.id,
                "absent.md",
                UpdateFileRequest {
                    content: "x".to_string(),
                },
            )
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_remove_missing_file_leaves_timestamps() {
        let (_dir, store) = test_store();
        let ctx = store.create_context("u1", "alice", create_req("A", None)).unwrap();
        store.add_file(&ctx.id, file_req("notes.md", "x")).unwrap();
        let before = store.get_context(&ctx.id).unwrap();

        assert!(!store.remove_file(&ctx.id, "absent.md").unwrap());
        let after = store.get_context(&ctx.id).unwrap();
        assert_eq!(after.updated_at, before.updated_at);

        assert!(store.remove_file(&ctx.id, "notes.md").unwrap());
        let emptied = store.get_context(&ctx.id).unwrap();
        assert!(emptied.files.is_empty());
        assert!(emptied.updated_at >= before.updated_at);
    }

    #[test]
    fn test_update_context_partial() {
        let (_dir, store) = test_store();
        let ctx = store
            .create_context(
                "u1",
                "alice",
                CreateContextRequest {
                    name: "A".to_string(),
                    description: Some("original".to_string()),
                    github_repo_url: None,
                    is_public: true,
                },
            )
            .unwrap();

        let updated = store
            .update_context(
                &ctx.id,
                UpdateContextRequest {
                    name: Some("B".to_string()),
                    description: None,
                    is_public: Some(false),
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "B");
        assert_eq!(updated.description.as_deref(), Some("original"));
        assert!(!updated.is_public);

        assert!(store
            .update_context("nope", UpdateContextRequest::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_persistence_layout_and_pruning() {
        let (dir, store) = test_store();
        let ctx = store.create_context("u1", "alice", create_req("A", None)).unwrap();
        store.add_file(&ctx.id, file_req("stack.md", "# Stack")).unwrap();
        store.add_file(&ctx.id, file_req("notes.md", "hello")).unwrap();

        let ctx_dir = dir.path().join(&ctx.id);
        assert!(ctx_dir.join("metadata.json").is_file());
        assert_eq!(
            fs::read_to_string(ctx_dir.join("files").join("notes.md")).unwrap(),
            "hello"
        );

        store.remove_file(&ctx.id, "notes.md").unwrap();
        assert!(!ctx_dir.join("files").join("notes.md").exists());
        assert!(ctx_dir.join("files").join("stack.md").exists());
    }

    #[test]
    fn test_rehydration_round_trip() {
        let dir = TempDir::new().unwrap();
        let id = {
            let store = ContextStore::open(dir.path()).unwrap();
            let ctx = store.create_context("u1", "alice", create_req("A", None)).unwrap();
            store.add_file(&ctx.id, file_req("stack.md", "# Stack")).unwrap();
            store
                .set_contributors(&ctx.id, vec![sample_contributor("octocat")])
                .unwrap();
            ctx.id
        };

        let reopened = ContextStore::open(dir.path()).unwrap();
        assert_eq!(reopened.len(), 1);
        let ctx = reopened.get_context(&id).unwrap();
        assert_eq!(ctx.name, "A");
        assert_eq!(ctx.files.len(), 1);
        assert_eq!(ctx.files[0].content, "# Stack");
        assert_eq!(ctx.contributors.len(), 1);
    }

    #[test]
    fn test_delete_context_removes_directory() {
        let (dir, store) = test_store();
        let ctx = store.create_context("u1", "alice", create_req("A", None)).unwrap();
        let ctx_dir = dir.path().join(&ctx.id);
        assert!(ctx_dir.is_dir());

        assert!(store.delete_context(&ctx.id).unwrap());
        assert!(!ctx_dir.exists());
        assert!(store.get_context(&ctx.id).is_none());
        assert!(!store.delete_context(&ctx.id).unwrap());
    }

    #[test]
    fn test_contexts_for_repo_urls_scoped_to_owner() {
        let (_dir, store) = test_store();
        let url = "https://github.com/octocat/hello".to_string();

        let mine = store.create_context("u1", "alice", create_req("A", None)).unwrap();
        store.set_repo_link(&mine.id, sample_repo(&url)).unwrap();
        let theirs = store.create_context("u2", "bob", create_req("B", None)).unwrap();
        store.set_repo_link(&theirs.id, sample_repo(&url)).unwrap();

        let urls = vec![url.clone(), "https://github.com/none/none".to_string()];
        let linked = store.contexts_for_repo_urls("u1", &urls);
        assert_eq!(linked.len(), 1);
        assert_eq!(linked.get(&url), Some(&mine.id));
    }

    #[test]
    fn test_toggle_contributor() {
        let (_dir, store) = test_store();
        let ctx = store.create_context("u1", "alice", create_req("A", None)).unwrap();
        store
            .set_contributors(&ctx.id, vec![sample_contributor("octocat")])
            .unwrap();

        let (_, selected) = store.toggle_contributor(&ctx.id, "octocat").unwrap().unwrap();
        assert!(selected);
        let (_, selected) = store.toggle_contributor(&ctx.id, "octocat").unwrap().unwrap();
        assert!(!selected);

        assert!(store.toggle_contributor(&ctx.id, "ghost").unwrap().is_none());
        assert!(store.toggle_contributor("nope", "octocat").unwrap().is_none());
    }

    #[test]
    fn test_list_scopes() {
        let (_dir, store) = test_store();
        store.create_context("u1", "alice", create_req("A", None)).unwrap();
        let private = store
            .create_context(
                "u1",
                "alice",
                CreateContextRequest {
                    name: "B".to_string(),
                    description: None,
                    github_repo_url: None,
                    is_public: false,
                },
            )
            .unwrap();
        store.create_context("u2", "bob", create_req("C", None)).unwrap();

        assert_eq!(store.contexts_for_owner("u1").len(), 2);
        let public = store.public_contexts();
        assert_eq!(public.len(), 2);
        assert!(public.iter().all(|c| c.id != private.id));
    }
}
