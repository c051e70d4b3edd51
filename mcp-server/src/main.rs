//! rocq-mcp: MCP stdio server for driving Rocq proofs interactively.
//!
//! Exposes the `rocq-core` bridge as MCP tools over stdio. An agent opens a
//! `.v` file, advances the proof sentence by sentence, inspects goals, and
//! runs query/search commands; every reply is plain text.
//!
//! All positional arguments are forwarded verbatim to the `vsrocqtop`
//! subprocess (load paths and other proof-environment flags):
//!
//! ```bash
//! rocq-mcp -R theories Mylib
//! ```
//!
//! Stdout is reserved for MCP frames; logs go to stderr (`RUST_LOG`).

use std::sync::Arc;

use rmcp::{
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
    transport::stdio,
    ErrorData as McpError, ServiceExt,
};
use schemars::JsonSchema;
use serde::Deserialize;

use rocq_core::{Bridge, QueryKind};

#[derive(Debug, Deserialize, JsonSchema)]
struct FileArgs {
    /// Path to the .v file.
    file: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct CheckArgs {
    /// Path to the .v file.
    file: String,
    /// 0-indexed line number to interpret up to.
    line: u32,
    /// 0-indexed column number.
    col: u32,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct QueryArgs {
    /// Path to the .v file.
    file: String,
    /// The identifier or expression to query.
    pattern: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SearchArgs {
    /// Path to the .v file.
    file: String,
    /// Search pattern (e.g. `nat -> nat`, `_ + _ = _ + _`).
    pattern: String,
}

#[derive(Clone)]
struct RocqMcp {
    bridge: Arc<Bridge>,
    tool_router: ToolRouter<Self>,
}

impl RocqMcp {
    fn new(bridge: Arc<Bridge>) -> Self {
        Self {
            bridge,
            tool_router: Self::tool_router(),
        }
    }
}

/// Bridge outcomes become text payloads; errors keep the same shape with
/// the error flag set, so the agent always has something to read.
fn reply(result: rocq_core::Result<String>) -> Result<CallToolResult, McpError> {
    Ok(match result {
        Ok(text) => CallToolResult::success(vec![Content::text(text)]),
        Err(e) => CallToolResult::error(vec![Content::text(e.to_string())]),
    })
}

#[tool_router]
impl RocqMcp {
    #[tool(
        description = "Open a .v file in the Rocq proof checker. Must be called before any other operations on the file."
    )]
    async fn rocq_open(&self, params: Parameters<FileArgs>) -> Result<CallToolResult, McpError> {
        let file = params.0.file;
        reply(
            self.bridge
                .open_doc(&file)
                .await
                .map(|()| format!("Opened {file}")),
        )
    }

    #[tool(description = "Close a .v file and release its resources.")]
    async fn rocq_close(&self, params: Parameters<FileArgs>) -> Result<CallToolResult, McpError> {
        let file = params.0.file;
        reply(
            self.bridge
                .close_doc(&file)
                .await
                .map(|()| format!("Closed {file}")),
        )
    }

    #[tool(
        description = "Re-read a .v file from disk after editing it. Required after using Edit/Write tools."
    )]
    async fn rocq_sync(&self, params: Parameters<FileArgs>) -> Result<CallToolResult, McpError> {
        let file = params.0.file;
        reply(
            self.bridge
                .sync_doc(&file)
                .await
                .map(|()| format!("Synced {file}")),
        )
    }

    #[tool(
        description = "Check the file up to a given position. Returns proof goals and diagnostics (errors/warnings)."
    )]
    async fn rocq_check(&self, params: Parameters<CheckArgs>) -> Result<CallToolResult, McpError> {
        let CheckArgs { file, line, col } = params.0;
        reply(self.bridge.check(&file, line, col).await)
    }

    #[tool(
        description = "Check the entire file. Returns proof goals (if any remain) and all diagnostics."
    )]
    async fn rocq_check_all(
        &self,
        params: Parameters<FileArgs>,
    ) -> Result<CallToolResult, McpError> {
        reply(self.bridge.check_all(&params.0.file).await)
    }

    #[tool(description = "Step forward one sentence in the proof. Returns updated proof goals.")]
    async fn rocq_step_forward(
        &self,
        params: Parameters<FileArgs>,
    ) -> Result<CallToolResult, McpError> {
        reply(self.bridge.step(&params.0.file, true).await)
    }

    #[tool(description = "Step backward one sentence in the proof. Returns updated proof goals.")]
    async fn rocq_step_backward(
        &self,
        params: Parameters<FileArgs>,
    ) -> Result<CallToolResult, McpError> {
        reply(self.bridge.step(&params.0.file, false).await)
    }

    #[tool(
        description = "Get the full current proof state with all goals and hypotheses, as of the last check or step."
    )]
    async fn rocq_get_proof_state(
        &self,
        params: Parameters<FileArgs>,
    ) -> Result<CallToolResult, McpError> {
        reply(self.bridge.proof_state(&params.0.file).await)
    }

    #[tool(
        description = "Show information about an identifier (type, module, etc). Like Rocq's 'About' command."
    )]
    async fn rocq_about(&self, params: Parameters<QueryArgs>) -> Result<CallToolResult, McpError> {
        let QueryArgs { file, pattern } = params.0;
        reply(self.bridge.query(&file, QueryKind::About, &pattern).await)
    }

    #[tool(description = "Check the type of an expression. Like Rocq's 'Check' command.")]
    async fn rocq_check_type(
        &self,
        params: Parameters<QueryArgs>,
    ) -> Result<CallToolResult, McpError> {
        let QueryArgs { file, pattern } = params.0;
        reply(
            self.bridge
                .query(&file, QueryKind::CheckType, &pattern)
                .await,
        )
    }

    #[tool(
        description = "Locate the defining module of an identifier. Like Rocq's 'Locate' command."
    )]
    async fn rocq_locate(&self, params: Parameters<QueryArgs>) -> Result<CallToolResult, McpError> {
        let QueryArgs { file, pattern } = params.0;
        reply(self.bridge.query(&file, QueryKind::Locate, &pattern).await)
    }

    #[tool(
        description = "Print the full definition of an identifier. Like Rocq's 'Print' command."
    )]
    async fn rocq_print(&self, params: Parameters<QueryArgs>) -> Result<CallToolResult, McpError> {
        let QueryArgs { file, pattern } = params.0;
        reply(self.bridge.query(&file, QueryKind::Print, &pattern).await)
    }

    #[tool(
        description = "Search for lemmas matching a pattern. Like Rocq's 'Search' command. Results may be large; use specific patterns."
    )]
    async fn rocq_search(
        &self,
        params: Parameters<SearchArgs>,
    ) -> Result<CallToolResult, McpError> {
        let SearchArgs { file, pattern } = params.0;
        reply(self.bridge.search(&file, &pattern).await)
    }

    #[tool(
        description = "Reset the Rocq prover state for a file. Use when the prover is in a bad state."
    )]
    async fn rocq_reset(&self, params: Parameters<FileArgs>) -> Result<CallToolResult, McpError> {
        let file = params.0.file;
        reply(
            self.bridge
                .reset(&file)
                .await
                .map(|()| format!("Reset {file}")),
        )
    }

    #[tool(
        description = "List all proof blocks in a file with their statements, tactics, and line ranges. Useful for navigating and understanding proof structure."
    )]
    async fn rocq_document_proofs(
        &self,
        params: Parameters<FileArgs>,
    ) -> Result<CallToolResult, McpError> {
        reply(self.bridge.document_proofs(&params.0.file).await)
    }
}

#[tool_handler]
impl rmcp::ServerHandler for RocqMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Tools for interactively driving Rocq proofs through vsrocqtop. \
                 Open a file first; stdout is reserved for MCP frames."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs must never touch stdout; that stream carries MCP frames.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Everything after the binary name goes to vsrocqtop untouched.
    let prover_args: Vec<String> = std::env::args().skip(1).collect();
    let bridge = Arc::new(Bridge::new(prover_args));

    let service = RocqMcp::new(Arc::clone(&bridge));
    let running = service
        .serve(stdio())
        .await
        .map_err(|e| format!("failed to start stdio MCP server: {e:?}"))?;
    running
        .waiting()
        .await
        .map_err(|e| format!("stdio MCP server task join failed: {e:?}"))?;

    if let Err(e) = bridge.shutdown().await {
        tracing::warn!(error = %e, "prover shutdown failed");
    }
    Ok(())
}
