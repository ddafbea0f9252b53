//! MCP server surface
//!
//! Exposes exactly six tools over the Model Context Protocol:
//! `manage_index`, `search_codebase`, `read_file`, `file_outline`,
//! `call_graph`, and `list_codebases`. Tool discovery derives input
//! schemas from the typed argument declarations.

use rmcp::model::{
    CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
    ServerCapabilities, ServerInfo, Tool,
};
use rmcp::ErrorData as McpError;
use rmcp::ServerHandler;
use std::borrow::Cow;
use std::sync::Arc;

use crate::server::args::{
    CallGraphArgs, FileOutlineArgs, ManageIndexArgs, ReadFileArgs, SearchCodebaseArgs,
};
use crate::server::handlers::{
    CallGraphHandler, FileOutlineHandler, ListCodebasesHandler, ManageIndexHandler,
    ReadFileHandler, SearchCodebaseHandler,
};
use crate::server::state::ServerState;

const SUPPORTED_TOOLS: &[&str] = &[
    "manage_index",
    "search_codebase",
    "read_file",
    "file_outline",
    "call_graph",
    "list_codebases",
];

/// The Satori MCP server
#[derive(Clone)]
pub struct SatoriServer {
    manage_index: Arc<ManageIndexHandler>,
    search_codebase: Arc<SearchCodebaseHandler>,
    read_file: Arc<ReadFileHandler>,
    file_outline: Arc<FileOutlineHandler>,
    call_graph: Arc<CallGraphHandler>,
    list_codebases: Arc<ListCodebasesHandler>,
}

impl SatoriServer {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self {
            manage_index: Arc::new(ManageIndexHandler::new(Arc::clone(&state))),
            search_codebase: Arc::new(SearchCodebaseHandler::new(Arc::clone(&state))),
            read_file: Arc::new(ReadFileHandler::new(Arc::clone(&state))),
            file_outline: Arc::new(FileOutlineHandler::new(Arc::clone(&state))),
            call_graph: Arc::new(CallGraphHandler::new(Arc::clone(&state))),
            list_codebases: Arc::new(ListCodebasesHandler::new(state)),
        }
    }
}

fn tool_entry(
    name: &'static str,
    description: &'static str,
    schema: serde_json::Value,
) -> Result<Tool, McpError> {
    let schema_object = schema
        .as_object()
        .cloned()
        .ok_or_else(|| McpError::internal_error(format!("Schema for {} is not an object", name), None))?;
    Ok(Tool {
        name: Cow::Borrowed(name),
        title: None,
        description: Some(Cow::Borrowed(description)),
        input_schema: Arc::new(schema_object),
        output_schema: None,
        annotations: None,
        icons: None,
        meta: Default::default(),
    })
}

fn schema_of<T: schemars::JsonSchema>() -> Result<serde_json::Value, McpError> {
    serde_json::to_value(schemars::schema_for!(T))
        .map_err(|e| McpError::internal_error(e.to_string(), None))
}

impl ServerHandler for SatoriServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "Satori".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "Satori is a semantic code-indexing server.\n\n\
                 Start with `manage_index` (action=create, absolute path) and poll with \
                 action=status until the codebase reports `indexed`. Then use \
                 `search_codebase` for natural-language queries (prefix operators: lang:, \
                 path:, -path:, must:, exclude:), `read_file` for symbol-aware reads, \
                 `file_outline` for per-file symbol listings, and `call_graph` for \
                 heuristic caller/callee traversal. `list_codebases` shows everything \
                 tracked. Indexes are refreshed incrementally; only changed files are \
                 re-embedded."
                    .to_string(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _pagination: Option<PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let tools = vec![
            tool_entry(
                "manage_index",
                "Create, refresh, inspect, or remove a semantic codebase index",
                schema_of::<ManageIndexArgs>()?,
            )?,
            tool_entry(
                "search_codebase",
                "Search an indexed codebase with natural language queries",
                schema_of::<SearchCodebaseArgs>()?,
            )?,
            tool_entry(
                "read_file",
                "Read a file with line-range and symbol-aware options",
                schema_of::<ReadFileArgs>()?,
            )?,
            tool_entry(
                "file_outline",
                "List the symbols of one file from the call-graph sidecar",
                schema_of::<FileOutlineArgs>()?,
            )?,
            tool_entry(
                "call_graph",
                "Query the heuristic call graph around one symbol",
                schema_of::<CallGraphArgs>()?,
            )?,
            tool_entry(
                "list_codebases",
                "List every tracked codebase with status and metadata",
                schema_of::<crate::server::args::ListCodebasesArgs>()?,
            )?,
        ];
        Ok(ListToolsResult {
            tools,
            meta: Default::default(),
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        request: rmcp::model::CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let arguments = serde_json::Value::Object(request.arguments.unwrap_or_default());
        match request.name.as_ref() {
            "manage_index" => {
                let args: ManageIndexArgs = parse_args(arguments)?;
                Ok(self.manage_index.handle(args).await)
            }
            "search_codebase" => {
                let args: SearchCodebaseArgs = parse_args(arguments)?;
                Ok(self.search_codebase.handle(args).await)
            }
            "read_file" => {
                let args: ReadFileArgs = parse_args(arguments)?;
                Ok(self.read_file.handle(args).await)
            }
            "file_outline" => {
                let args: FileOutlineArgs = parse_args(arguments)?;
                Ok(self.file_outline.handle(args).await)
            }
            "call_graph" => {
                let args: CallGraphArgs = parse_args(arguments)?;
                Ok(self.call_graph.handle(args).await)
            }
            "list_codebases" => Ok(self.list_codebases.handle().await),
            other => Err(McpError::invalid_params(
                format!(
                    "Unknown tool: {}. Supported tools: {}",
                    other,
                    SUPPORTED_TOOLS.join(", ")
                ),
                None,
            )),
        }
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, McpError> {
    serde_json::from_value(value)
        .map_err(|e| McpError::invalid_params(format!("Invalid arguments: {}", e), None))
}
