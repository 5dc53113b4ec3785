//! Read-only tool surface over the context store.
//!
//! Tools are the unit the MCP bridge exposes to AI clients. Each tool
//! declares a JSON Schema for its parameters and renders its result as
//! markdown-ish text, the shape tool-calling clients display directly.
//!
//! Private contexts are invisible here: lookups on them answer the same way
//! as a missing id, so the tool surface cannot be used to probe for them.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use context_market::store::ContextStore;
//! use context_market::tools::{ToolContext, ToolRegistry};
//!
//! # async fn example(store: Arc<ContextStore>) -> anyhow::Result<()> {
//! let registry = ToolRegistry::with_builtins();
//! let ctx = ToolContext::new(store);
//! let tool = registry.find("list_contexts").unwrap();
//! let text = tool.execute(serde_json::json!({}), &ctx).await?;
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::models::Context;
use crate::store::ContextStore;

/// A read-only tool that MCP clients can discover and call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name, a lowercase identifier with underscores.
    fn name(&self) -> &str;

    /// One-line description for client-side tool selection.
    fn description(&self) -> &str;

    /// JSON Schema (`type: "object"`) describing the parameters.
    fn parameters_schema(&self) -> Value;

    /// Executes the tool and returns display text.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<String>;
}

/// Store handle passed to every tool invocation.
pub struct ToolContext {
    store: Arc<ContextStore>,
}

impl ToolContext {
    pub fn new(store: Arc<ContextStore>) -> Self {
        Self { store }
    }

    fn public_context(&self, id: &str) -> Option<Context> {
        self.store.get_context(id).filter(|c| c.is_public)
    }
}

/// Registry for tools.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Creates a registry pre-loaded with the built-in context tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SearchContextsTool));
        registry.register(Box::new(GetContextDetailsTool));
        registry.register(Box::new(ListContextsTool));
        registry.register(Box::new(GetContextFilesTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    let value = params[key].as_str().unwrap_or("");
    if value.trim().is_empty() {
        anyhow::bail!("{} must not be empty", key);
    }
    Ok(value)
}

/// One summary block per context, shared by search and listing output.
fn context_summary(context: &Context) -> String {
    let mut block = format!("**{}** (ID: {})\n", context.name, context.id);
    if let Some(description) = &context.description {
        block.push_str(&format!("  Description: {}\n", description));
    }
    block.push_str(&format!("  Owner: @{}\n", context.owner_login));
    block.push_str(&format!("  Files: {}\n", context.files.len()));
    block.push_str(&format!(
        "  Public: {}\n",
        if context.is_public { "Yes" } else { "No" }
    ));
    block
}

// ═══════════════════════════════════════════════════════════════════════
// Built-in tools
// ═══════════════════════════════════════════════════════════════════════

/// Case-insensitive substring search over public contexts.
pub struct SearchContextsTool;

#[async_trait]
impl Tool for SearchContextsTool {
    fn name(&self) -> &str {
        "search_contexts"
    }

    fn description(&self) -> &str {
        "Search for contexts by name or description"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query for context name or description"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<String> {
        let query = required_str(&params, "query")?;
        let needle = query.to_lowercase();

        let matching: Vec<Context> = ctx
            .store
            .public_contexts()
            .into_iter()
            .filter(|c| {
                c.name.to_lowercase().contains(&needle)
                    || c.description
                        .as_ref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            })
            .collect();

        if matching.is_empty() {
            return Ok(format!("No contexts found matching '{}'", query));
        }

        let mut result = format!(
            "Found {} contexts matching '{}':\n\n",
            matching.len(),
            query
        );
        for context in &matching {
            result.push_str(&context_summary(context));
            result.push('\n');
        }
        Ok(result)
    }
}

/// Full detail dump for one public context, with file previews.
pub struct GetContextDetailsTool;

#[async_trait]
impl Tool for GetContextDetailsTool {
    fn name(&self) -> &str {
        "get_context_details"
    }

    fn description(&self) -> &str {
        "Get detailed information about a specific context"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "context_id": {
                    "type": "string",
                    "description": "ID of the context to retrieve"
                }
            },
            "required": ["context_id"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<String> {
        let id = required_str(&params, "context_id")?;
        let context = match ctx.public_context(id) {
            Some(c) => c,
            None => return Ok(format!("Context not found: {}", id)),
        };

        let mut result = format!("# Context: {}\n\n", context.name);
        result.push_str(&format!("**ID:** {}\n", context.id));
        if let Some(description) = &context.description {
            result.push_str(&format!("**Description:** {}\n", description));
        }
        result.push_str(&format!("**Owner:** @{}\n", context.owner_login));
        result.push_str("**Public:** Yes\n");
        result.push_str(&format!("**Created:** {}\n", context.created_at));
        result.push_str(&format!("**Updated:** {}\n\n", context.updated_at));

        if let Some(repo) = &context.github_repo {
            result.push_str(&format!("**GitHub Repository:** {}\n", repo.full_name));
            if let Some(description) = &repo.description {
                result.push_str(&format!("**Repo Description:** {}\n", description));
            }
            if let Some(language) = &repo.language {
                result.push_str(&format!("**Primary Language:** {}\n", language));
            }
            result.push('\n');
        }

        result.push_str(&format!("## Files ({})\n\n", context.files.len()));
        for file in &context.files {
            result.push_str(&format!("- **{}** ({})\n", file.name, file.file_type.as_str()));
            if file.content.chars().count() > 200 {
                let preview: String = file.content.chars().take(200).collect();
                result.push_str(&format!("  Preview: {}...\n", preview));
            } else {
                result.push_str(&format!("  Content: {}\n", file.content));
            }
            result.push('\n');
        }

        Ok(result)
    }
}

/// Listing of all contexts, public-only by default.
pub struct ListContextsTool;

#[async_trait]
impl Tool for ListContextsTool {
    fn name(&self) -> &str {
        "list_contexts"
    }

    fn description(&self) -> &str {
        "List all available contexts"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "public_only": {
                    "type": "boolean",
                    "description": "Whether to show only public contexts",
                    "default": true
                }
            },
            "required": []
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<String> {
        let public_only = params["public_only"].as_bool().unwrap_or(true);
        let contexts = if public_only {
            ctx.store.public_contexts()
        } else {
            ctx.store.all_contexts()
        };

        if contexts.is_empty() {
            return Ok("No contexts found".to_string());
        }

        let mut result = format!("Found {} contexts:\n\n", contexts.len());
        for context in &contexts {
            result.push_str(&context_summary(context));
            if let Some(repo) = &context.github_repo {
                result.push_str(&format!("  Repository: {}\n", repo.full_name));
            }
            result.push('\n');
        }
        Ok(result)
    }
}

/// Raw dump of every file in a public context.
pub struct GetContextFilesTool;

#[async_trait]
impl Tool for GetContextFilesTool {
    fn name(&self) -> &str {
        "get_context_files"
    }

    fn description(&self) -> &str {
        "Get all files from a specific context"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "context_id": {
                    "type": "string",
                    "description": "ID of the context"
                }
            },
            "required": ["context_id"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<String> {
        let id = required_str(&params, "context_id")?;
        let context = match ctx.public_context(id) {
            Some(c) => c,
            None => return Ok(format!("Context not found: {}", id)),
        };

        if context.files.is_empty() {
            return Ok(format!("No files found in context: {}", context.name));
        }

        let mut result = format!("# Files from Context: {}\n\n", context.name);
        for file in &context.files {
            result.push_str(&format!("## {} ({})\n\n", file.name, file.file_type.as_str()));
            result.push_str(&format!("```\n{}\n```\n\n", file.content));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateContextRequest, CreateFileRequest, FileType};
    use tempfile::TempDir;

    fn seeded_store() -> (TempDir, Arc<ContextStore>, String, String) {
        let dir = TempDir::new().unwrap();
        let store = ContextStore::open(dir.path()).unwrap();

        let public = store
            .create_context(
                "u1",
                "alice",
                CreateContextRequest {
                    name: "Payments Service".to_string(),
                    description: Some("Billing and invoicing".to_string()),
                    github_repo_url: None,
                    is_public: true,
                },
            )
            .unwrap();
        store
            .add_file(
                &public.id,
                CreateFileRequest {
                    name: "stack.md".to_string(),
                    file_type: FileType::Stack,
                    content: "# Technology Stack".to_string(),
                },
            )
            .unwrap();

        let private = store
            .create_context(
                "u1",
                "alice",
                CreateContextRequest {
                    name: "Secret Plans".to_string(),
                    description: None,
                    github_repo_url: None,
                    is_public: false,
                },
            )
            .unwrap();

        (dir, Arc::new(store), public.id, private.id)
    }

    #[tokio::test]
    async fn test_search_matches_name_and_description() {
        let (_dir, store, _, _) = seeded_store();
        let ctx = ToolContext::new(store);
        let tool = SearchContextsTool;

        let hit = tool
            .execute(serde_json::json!({"query": "PAYMENTS"}), &ctx)
            .await
            .unwrap();
        assert!(hit.starts_with("Found 1 contexts matching 'PAYMENTS':\n\n"));
        assert!(hit.contains("**Payments Service** (ID: "));
        assert!(hit.contains("  Description: Billing and invoicing\n"));
        assert!(hit.contains("  Owner: @alice\n"));

        let by_desc = tool
            .execute(serde_json::json!({"query": "invoicing"}), &ctx)
            .await
            .unwrap();
        assert!(by_desc.contains("Payments Service"));

        let miss = tool
            .execute(serde_json::json!({"query": "nothing"}), &ctx)
            .await
            .unwrap();
        assert_eq!(miss, "No contexts found matching 'nothing'");
    }

    #[tokio::test]
    async fn test_search_skips_private_contexts() {
        let (_dir, store, _, _) = seeded_store();
        let ctx = ToolContext::new(store);

        let result = SearchContextsTool
            .execute(serde_json::json!({"query": "secret"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result, "No contexts found matching 'secret'");
    }

    #[tokio::test]
    async fn test_details_hides_private_and_missing_alike() {
        let (_dir, store, public_id, private_id) = seeded_store();
        let ctx = ToolContext::new(store);
        let tool = GetContextDetailsTool;

        let details = tool
            .execute(serde_json::json!({"context_id": public_id}), &ctx)
            .await
            .unwrap();
        assert!(details.starts_with("# Context: Payments Service\n\n"));
        assert!(details.contains("## Files (1)\n\n- **stack.md** (stack)\n"));
        assert!(details.contains("  Content: # Technology Stack\n"));

        let hidden = tool
            .execute(serde_json::json!({"context_id": private_id}), &ctx)
            .await
            .unwrap();
        assert_eq!(hidden, format!("Context not found: {}", private_id));

        let missing = tool
            .execute(serde_json::json!({"context_id": "nope"}), &ctx)
            .await
            .unwrap();
        assert_eq!(missing, "Context not found: nope");
    }

    #[tokio::test]
    async fn test_list_honors_public_only() {
        let (_dir, store, _, _) = seeded_store();
        let ctx = ToolContext::new(store);
        let tool = ListContextsTool;

        let default = tool.execute(serde_json::json!({}), &ctx).await.unwrap();
        assert!(default.starts_with("Found 1 contexts:\n\n"));
        assert!(!default.contains("Secret Plans"));

        let all = tool
            .execute(serde_json::json!({"public_only": false}), &ctx)
            .await
            .unwrap();
        assert!(all.starts_with("Found 2 contexts:\n\n"));
        assert!(all.contains("Secret Plans"));
    }

    #[tokio::test]
    async fn test_files_dump_and_empty_params() {
        let (_dir, store, public_id, _) = seeded_store();
        let ctx = ToolContext::new(store);
        let tool = GetContextFilesTool;

        let dump = tool
            .execute(serde_json::json!({"context_id": public_id}), &ctx)
            .await
            .unwrap();
        assert!(dump.starts_with("# Files from Context: Payments Service\n\n"));
        assert!(dump.contains("## stack.md (stack)\n\n```\n# Technology Stack\n```\n\n"));

        let err = tool.execute(serde_json::json!({}), &ctx).await.unwrap_err();
        assert!(err.to_string().contains("context_id must not be empty"));
    }

    #[test]
    fn test_registry_builtins() {
        let registry = ToolRegistry::with_builtins();
        assert_eq!(registry.len(), 4);
        assert!(registry.find("search_contexts").is_some());
        assert!(registry.find("get_context_details").is_some());
        assert!(registry.find("list_contexts").is_some());
        assert!(registry.find("get_context_files").is_some());
        assert!(registry.find("unknown").is_none());
    }
}
