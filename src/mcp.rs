//! MCP JSON-RPC protocol bridge.
//!
//! Adapts the [`ToolRegistry`](crate::tools::ToolRegistry) and the context
//! store into an MCP Streamable HTTP endpoint that Cursor and other MCP
//! clients can connect to.
//!
//! * **Tools** are exposed via `list_tools` / `call_tool` — the four
//!   read-only context tools.
//! * **Resources** expose public contexts: `context://{id}` renders the
//!   whole bundle as text, `context://{id}/files/{name}` returns one
//!   document's raw content.
//!
//! The bridge is read-only by construction: it never holds a user session,
//! so only public contexts are reachable through it.

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::model::*;
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpService,
};
use rmcp::{ErrorData as McpError, ServerHandler};

use crate::config::Config;
use crate::models::Context;
use crate::store::ContextStore;
use crate::tools::{ToolContext, ToolRegistry};

const RESOURCE_SCHEME: &str = "context://";

/// Bridges the tool registry and store to the MCP JSON-RPC protocol.
///
/// Each MCP session receives a clone of this struct (everything is behind
/// `Arc`), so all sessions share the same store and tool set.
#[derive(Clone)]
pub struct McpBridge {
    store: Arc<ContextStore>,
    tools: Arc<ToolRegistry>,
}

impl McpBridge {
    pub fn new(store: Arc<ContextStore>, tools: Arc<ToolRegistry>) -> Self {
        Self { store, tools }
    }

    /// Convert a context-market tool into an rmcp `Tool` descriptor.
    fn to_mcp_tool(tool: &dyn crate::tools::Tool) -> Tool {
        let schema_value = tool.parameters_schema();
        let input_schema: Arc<serde_json::Map<String, serde_json::Value>> = match schema_value {
            serde_json::Value::Object(map) => Arc::new(map),
            _ => Arc::new(serde_json::Map::new()),
        };

        Tool {
            name: Cow::Owned(tool.name().to_string()),
            title: None,
            description: Some(Cow::Owned(tool.description().to_string())),
            input_schema,
            output_schema: None,
            annotations: Some(ToolAnnotations::new().read_only(true)),
            execution: None,
            icons: None,
            meta: None,
        }
    }

    fn resource_not_found(uri: &str) -> McpError {
        McpError::new(
            ErrorCode::RESOURCE_NOT_FOUND,
            format!("resource not found: {}", uri),
            None,
        )
    }
}

/// Renders a whole context bundle as readable text for the resource view.
fn render_context(context: &Context) -> String {
    let mut output = format!("# Context: {}\n\n", context.name);

    if let Some(description) = &context.description {
        output.push_str(&format!("**Description:** {}\n\n", description));
    }
    output.push_str(&format!("**Owner:** @{}\n", context.owner_login));
    output.push_str(&format!("**Files:** {}\n", context.files.len()));
    output.push_str(&format!(
        "**Public:** {}\n\n",
        if context.is_public { "Yes" } else { "No" }
    ));

    if let Some(repo) = &context.github_repo {
        output.push_str(&format!("**GitHub Repository:** {}\n", repo.full_name));
        if let Some(description) = &repo.description {
            output.push_str(&format!("**Repo Description:** {}\n", description));
        }
        output.push('\n');
    }

    output.push_str("## Files\n\n");
    for file in &context.files {
        output.push_str(&format!("### {}\n\n", file.name));
        output.push_str(&format!("```\n{}\n```\n\n", file.content));
    }

    output
}

impl ServerHandler for McpBridge {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: "context-market".to_string(),
                title: Some("Context Market".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Context Market — curated project context bundles. Use search_contexts \
                 to find contexts by name or description, get_context_details for one \
                 context's metadata, and get_context_files to read its documents. \
                 Public contexts are also available as context:// resources."
                    .to_string(),
            ),
        }
    }

    // ── Tools ────────────────────────────────────────────────────────────

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools: Vec<Tool> = self
            .tools
            .tools()
            .iter()
            .map(|t| Self::to_mcp_tool(t.as_ref()))
            .collect();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    fn get_tool(&self, name: &str) -> Option<Tool> {
        self.tools.find(name).map(Self::to_mcp_tool)
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let tool = self.tools.find(&request.name).ok_or_else(|| {
            McpError::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("no tool registered with name: {}", request.name),
                None,
            )
        })?;

        let params = request
            .arguments
            .map(serde_json::Value::Object)
            .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));

        let ctx = ToolContext::new(self.store.clone());
        match tool.execute(params, &ctx).await {
            Ok(text) => Ok(CallToolResult::success(vec![Content::text(text)])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        }
    }

    // ── Resources ────────────────────────────────────────────────────────

    fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        let mut resources = Vec::new();
        for context in self.store.public_contexts() {
            let mut bundle = RawResource::new(
                format!("{}{}", RESOURCE_SCHEME, context.id),
                format!("Context: {}", context.name),
            );
            bundle.description = Some(
                context
                    .description
                    .clone()
                    .unwrap_or_else(|| "Code context".to_string()),
            );
            bundle.mime_type = Some("text/plain".to_string());
            resources.push(bundle.no_annotation());

            for file in &context.files {
                let mut doc = RawResource::new(
                    format!("{}{}/files/{}", RESOURCE_SCHEME, context.id, file.name),
                    format!("{}/{}", context.name, file.name),
                );
                doc.description = Some(format!("File from context: {}", context.name));
                doc.mime_type = Some("text/plain".to_string());
                resources.push(doc.no_annotation());
            }
        }
        std::future::ready(Ok(ListResourcesResult::with_all_items(resources)))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let uri = request.uri.as_str();
        let path = uri
            .strip_prefix(RESOURCE_SCHEME)
            .ok_or_else(|| Self::resource_not_found(uri))?;

        let (context_id, file_name) = match path.split_once("/files/") {
            Some((id, name)) => (id, Some(name)),
            None => (path, None),
        };

        let context = self
            .store
            .get_context(context_id)
            .filter(|c| c.is_public)
            .ok_or_else(|| Self::resource_not_found(uri))?;

        let text = match file_name {
            Some(name) => context
                .files
                .iter()
                .find(|f| f.name == name)
                .map(|f| f.content.clone())
                .ok_or_else(|| Self::resource_not_found(uri))?,
            None => render_context(&context),
        };

        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, uri.to_string())],
        })
    }
}

/// Starts the MCP server on `[server].bind`, mounted at `/mcp`.
///
/// This is the entry point for `ctxm serve mcp`. It shares the persisted
/// store with the web server: contexts created there are visible here after
/// rehydration.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store = Arc::new(ContextStore::open(&config.store.data_dir)?);
    println!(
        "Loaded {} contexts from {}",
        store.len(),
        config.store.data_dir.display()
    );

    let bridge = McpBridge::new(store, Arc::new(ToolRegistry::with_builtins()));
    let service = StreamableHttpService::new(
        move || Ok(bridge.clone()),
        LocalSessionManager::default().into(),
        Default::default(),
    );

    let app = axum::Router::new().nest_service("/mcp", service);

    println!("MCP server listening on http://{}/mcp", config.server.bind);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
