//! Tool input types.

use crate::database::ExecutionOptions;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// How a tool renders its `QueryResult`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Pretty-print instead of compact JSON.
    pub pretty: bool,

    /// Character budget for the rendered payload. Larger payloads are
    /// replaced by a summary.
    pub max_response_chars: Option<usize>,
}

/// Input for the `execute_query` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteQueryInput {
    /// The SQL statement to execute.
    #[schemars(description = "SQL statement to execute")]
    pub query: String,

    /// Command timeout in seconds; 0 disables it.
    #[serde(default, alias = "commandTimeoutSeconds")]
    #[schemars(
        description = "Command timeout in seconds, 0 for none (default: server configured timeout)"
    )]
    pub timeout_seconds: Option<u64>,

    /// Maximum number of rows to return.
    #[serde(default)]
    #[schemars(description = "Maximum number of rows to return (default: server configured limit)")]
    pub max_rows: Option<usize>,

    #[serde(default)]
    #[schemars(description = "Pretty-print the JSON result (default: false)")]
    pub pretty: bool,

    #[serde(default)]
    #[schemars(
        description = "Replace the result with a summary when it exceeds this many characters"
    )]
    pub max_response_chars: Option<usize>,
}

impl ExecuteQueryInput {
    pub fn execution_options(&self) -> ExecutionOptions {
        ExecutionOptions {
            timeout_seconds: self.timeout_seconds,
            max_rows: self.max_rows,
        }
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            pretty: self.pretty,
            max_response_chars: self.max_response_chars,
        }
    }
}

/// Input for the `execute_stored_procedure` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteStoredProcedureInput {
    /// Schema of the stored procedure.
    #[serde(default = "default_schema")]
    #[schemars(description = "Schema of the procedure (default: dbo)")]
    pub schema: String,

    /// Name of the stored procedure.
    #[serde(alias = "procedure")]
    #[schemars(description = "Name of the stored procedure")]
    pub procedure_name: String,

    /// Named parameters. Keys may omit the leading `@`.
    #[serde(default)]
    #[schemars(description = "Named parameters; keys may omit the leading @")]
    pub parameters: Option<BTreeMap<String, Value>>,

    #[serde(default, alias = "commandTimeoutSeconds")]
    #[schemars(description = "Command timeout in seconds, 0 for none")]
    pub timeout_seconds: Option<u64>,

    #[serde(default)]
    #[schemars(description = "Maximum number of rows to return")]
    pub max_rows: Option<usize>,

    #[serde(default)]
    #[schemars(description = "Pretty-print the JSON result")]
    pub pretty: bool,

    #[serde(default)]
    #[schemars(description = "Summary threshold in characters")]
    pub max_response_chars: Option<usize>,
}

impl ExecuteStoredProcedureInput {
    pub fn execution_options(&self) -> ExecutionOptions {
        ExecutionOptions {
            timeout_seconds: self.timeout_seconds,
            max_rows: self.max_rows,
        }
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            pretty: self.pretty,
            max_response_chars: self.max_response_chars,
        }
    }
}

fn default_schema() -> String {
    "dbo".to_string()
}
