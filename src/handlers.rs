//! ServerHandler implementation for the SQL Server MCP server.
//!
//! Tool problems become tool results with `isError`; resource problems
//! become `{uri, message}` payloads. Protocol faults are left to the SDK.

use crate::resources::{build_resource_list, build_resource_templates};
use crate::server::SqlServerMcp;
use rmcp::handler::server::ServerHandler;
use rmcp::model::{
    Implementation, ListResourceTemplatesResult, ListResourcesResult, PaginatedRequestParam,
    ProtocolVersion, ReadResourceRequestParam, ReadResourceResult, ResourceContents,
    ServerCapabilities, ServerInfo,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{tool_handler, ErrorData};
use tracing::info;

/// `#[tool_handler]` generates `list_tools` and `call_tool` from the
/// server's tool router.
#[tool_handler]
impl ServerHandler for SqlServerMcp {
    fn get_info(&self) -> ServerInfo {
        info!("MCP client requesting server info");

        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,

            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),

            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                title: Some("SQL Server MCP Server".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },

            instructions: Some(build_instructions(self)),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, ErrorData> {
        Ok(ListResourcesResult {
            resources: build_resource_list(),
            next_cursor: None,
        })
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, ErrorData> {
        Ok(ListResourceTemplatesResult {
            resource_templates: build_resource_templates(),
            next_cursor: None,
        })
    }

    /// Read a resource. Cancelling the request abandons the catalog lookup.
    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, ErrorData> {
        let payload = self.resources().read_or_error(&request.uri, &context.ct).await;
        let text = serde_json::to_string_pretty(&payload)
            .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;

        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, request.uri)],
        })
    }
}

/// Build server instructions based on configuration.
fn build_instructions(server: &SqlServerMcp) -> String {
    let mut instructions = String::new();

    instructions.push_str("# SQL Server MCP Server\n\n");
    if let Some(db) = server.current_database() {
        instructions.push_str(&format!("**Connected to database:** `{db}`\n\n"));
    }

    instructions.push_str("### Resources (Read-only metadata access)\n");
    instructions.push_str("- Start at `sqlserver://schemas` and drill into a schema\n");
    instructions.push_str("- Percent-encode names containing reserved characters\n");
    instructions.push_str("- Object descriptors are cached; definitions are always fetched fresh\n\n");

    instructions.push_str("### Tools (Query execution)\n");
    if server.is_read_only() {
        instructions.push_str("- **Read-only mode**: write statements are rejected\n");
    } else {
        instructions.push_str("- Write statements report rows affected\n");
    }
    instructions.push_str("- Results are limited by `maxRows`; use OFFSET/FETCH to paginate\n");

    instructions
}
