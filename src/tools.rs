//! MCP Tools for query and stored-procedure execution.
//!
//! - `execute_query`: Execute an ad-hoc statement under the read-only policy
//!   and the injection guard
//! - `execute_stored_procedure`: Execute a stored procedure with bound
//!   parameters
//!
//! Both run through the [`crate::database::QueryExecutor`] with the request's
//! cancellation token and render the resulting [`QueryResult`] as JSON text.
//! Oversized payloads are replaced by a summary carrying the first few rows.

pub mod inputs;

use crate::constants::TRUNCATED_SAMPLE_ROWS;
use crate::database::{QueryResult, ResultRow};
use crate::server::SqlServerMcp;
use inputs::{ExecuteQueryInput, ExecuteStoredProcedureInput, RenderOptions};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{tool, tool_router, ErrorData};
use serde::Serialize;
use serde_json::json;
use tracing::debug;

#[tool_router]
impl SqlServerMcp {
    /// Execute an ad-hoc SQL statement.
    #[tool(
        description = "Execute a SQL statement. SELECT statements return rows; other statements \
                       report rows affected. When the server runs in read-only mode, INSERT, \
                       UPDATE, DELETE, TRUNCATE, DROP, ALTER, CREATE and MERGE are rejected."
    )]
    pub async fn execute_query(
        &self,
        Parameters(input): Parameters<ExecuteQueryInput>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        debug!(tool = "execute_query", "Tool call");

        let result = self
            .executor
            .execute_query(&input.query, input.execution_options(), &context.ct)
            .await;
        Ok(to_tool_result(&result, input.render_options()))
    }

    /// Execute a stored procedure with bound parameters.
    #[tool(
        description = "Execute a stored procedure with named parameters. Parameter values are \
                       always bound, never concatenated into SQL."
    )]
    pub async fn execute_stored_procedure(
        &self,
        Parameters(input): Parameters<ExecuteStoredProcedureInput>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        debug!(tool = "execute_stored_procedure", "Tool call");

        let parameters = input.parameters.clone().unwrap_or_default();
        let result = self
            .executor
            .execute_stored_procedure(
                &input.schema,
                &input.procedure_name,
                &parameters,
                input.execution_options(),
                &context.ct,
            )
            .await;
        Ok(to_tool_result(&result, input.render_options()))
    }
}

/// Router over every `#[tool]` method of [`SqlServerMcp`].
pub(crate) fn create_tool_router() -> ToolRouter<SqlServerMcp> {
    SqlServerMcp::tool_router()
}

fn to_tool_result(result: &QueryResult, options: RenderOptions) -> CallToolResult {
    let content = vec![Content::text(render_query_result(result, options))];
    if result.is_success {
        CallToolResult::success(content)
    } else {
        CallToolResult::error(content)
    }
}

/// Summary substituted for a payload that exceeds its character budget.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TruncatedSummary<'a> {
    columns: &'a [String],
    row_count: usize,
    total_row_count: usize,
    truncated: bool,
    truncated_at: usize,
    message: String,
    sample_rows: &'a [ResultRow],
}

/// Serialize a result, substituting a summary when it exceeds
/// `max_response_chars`.
pub fn render_query_result(result: &QueryResult, options: RenderOptions) -> String {
    let full = to_json_text(result, options.pretty);

    let limit = match options.max_response_chars {
        Some(limit) if full.chars().count() > limit => limit,
        _ => return full,
    };

    let sample = &result.rows[..result.rows.len().min(TRUNCATED_SAMPLE_ROWS)];
    let summary = TruncatedSummary {
        columns: &result.columns,
        row_count: result.row_count,
        total_row_count: result.total_row_count.unwrap_or(result.row_count),
        truncated: true,
        truncated_at: limit,
        message: format!(
            "Response exceeded {limit} characters; showing {} of {} rows. \
             Lower maxRows or raise maxResponseChars to see more.",
            sample.len(),
            result.row_count
        ),
        sample_rows: sample,
    };

    to_json_text(&summary, options.pretty)
}

fn to_json_text<T: Serialize>(value: &T, pretty: bool) -> String {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    rendered.unwrap_or_else(|e| json!({ "isSuccess": false, "message": e.to_string() }).to_string())
}
