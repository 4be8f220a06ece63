//! Query execution and result handling.
//!
//! [`QueryExecutor`] applies the execution policy (read-only mode, injection
//! guard, identifier validation) before any connection is opened, runs the
//! statement under a timeout and a cancellation token, and folds every outcome
//! into a [`QueryResult`].

use crate::config::Config;
use crate::constants::LOG_QUERY_TRUNCATE_LENGTH;
use crate::database::driver::{Connector, RowSet};
use crate::database::types::SqlValue;
use crate::error::ServerError;
use crate::security::{
    classify, invalid_identifier_message, is_safe_identifier, normalize_parameter_name,
    qualified_name, InjectionGuard, StatementKind,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Fixed rejection for write statements under read-only mode.
pub const READ_ONLY_MESSAGE: &str =
    "Write operations (INSERT, UPDATE, DELETE, etc.) are not allowed in read-only mode";

/// A single row of query results: column name to value.
///
/// An explicit [`SqlValue::Null`] is kept, so a null column is distinct from
/// an absent one.
pub type ResultRow = HashMap<String, SqlValue>;

/// Outcome of a query or stored-procedure execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Column names in order.
    pub columns: Vec<String>,

    /// Result rows.
    pub rows: Vec<ResultRow>,

    /// Number of rows returned (after limiting).
    pub row_count: usize,

    /// Size of the unlimited result, when known. Only set on truncation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_row_count: Option<usize>,

    /// Rows affected by a non-row-returning statement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,

    pub is_success: bool,

    pub message: String,

    /// Engine error number, only for failures raised by the database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i32>,

    /// More rows were available than the row limit allowed.
    pub has_more_rows: bool,
}

impl QueryResult {
    /// A successful row-returning result.
    pub fn with_rows(columns: Vec<String>, rows: Vec<ResultRow>, has_more_rows: bool) -> Self {
        let row_count = rows.len();
        let message = if has_more_rows {
            format!(
                "Showing the first {row_count} rows; more rows are available. \
                 Use OFFSET/FETCH to paginate or raise maxRows to see more."
            )
        } else if columns.is_empty() {
            "Command completed; no result set was returned.".to_string()
        } else {
            format!("Query returned {row_count} row(s).")
        };

        Self {
            columns,
            rows,
            row_count,
            total_row_count: None,
            rows_affected: None,
            is_success: true,
            message,
            error_code: None,
            has_more_rows,
        }
    }

    /// A successful non-row-returning result.
    pub fn with_rows_affected(rows_affected: u64) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: 0,
            total_row_count: None,
            rows_affected: Some(rows_affected),
            is_success: true,
            message: format!("Command completed; {rows_affected} row(s) affected."),
            error_code: None,
            has_more_rows: false,
        }
    }

    /// A failed result without an engine error code.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: 0,
            total_row_count: None,
            rows_affected: None,
            is_success: false,
            message: message.into(),
            error_code: None,
            has_more_rows: false,
        }
    }

    /// Map an execution error to a failed result. Only engine errors carry a code.
    pub fn from_error(error: &ServerError) -> Self {
        Self {
            error_code: error.sql_error_code(),
            ..Self::failure(error.to_string())
        }
    }

    /// Build a bounded result from the driver's row set.
    ///
    /// `rows` may hold one row beyond `row_limit`; that extra row only signals
    /// that more data exists and is discarded.
    fn from_row_set(set: RowSet, row_limit: usize) -> Self {
        let RowSet { columns, rows } = set;
        let has_more_rows = rows.len() > row_limit;

        let rows = rows
            .into_iter()
            .take(row_limit)
            .map(|values| columns.iter().cloned().zip(values).collect())
            .collect();

        Self::with_rows(columns, rows, has_more_rows)
    }
}

/// Per-call overrides of the configured defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionOptions {
    /// Command timeout in seconds. Zero disables the timeout.
    pub timeout_seconds: Option<u64>,

    /// Maximum rows to return.
    pub max_rows: Option<usize>,
}

/// Execution policy resolved from configuration at construction.
#[derive(Debug, Clone)]
struct ExecutionPolicy {
    read_only: bool,
    default_timeout: Duration,
    default_max_rows: usize,
}

/// Query executor for ad-hoc statements and stored procedures.
pub struct QueryExecutor {
    connector: Arc<dyn Connector>,
    guard: InjectionGuard,
    policy: ExecutionPolicy,
}

impl QueryExecutor {
    /// Create a new query executor.
    pub fn new(connector: Arc<dyn Connector>, config: &Config, guard: InjectionGuard) -> Self {
        Self {
            connector,
            guard,
            policy: ExecutionPolicy {
                read_only: config.security.read_only,
                default_timeout: config.query.default_timeout,
                default_max_rows: config.security.max_result_rows,
            },
        }
    }

    /// Whether write statements are rejected.
    pub fn is_read_only(&self) -> bool {
        self.policy.read_only
    }

    /// Execute an ad-hoc statement.
    ///
    /// Statements starting with `SELECT` are read as rows; anything else runs
    /// as a command and reports rows affected.
    pub async fn execute_query(
        &self,
        query: &str,
        options: ExecutionOptions,
        cancel: &CancellationToken,
    ) -> QueryResult {
        let (timeout, row_limit) = self.resolve(options);
        let kind = classify(query);

        if self.policy.read_only && kind == StatementKind::Write {
            warn!(
                "Blocked write statement in read-only mode: {}",
                truncate_for_log(query, LOG_QUERY_TRUNCATE_LENGTH)
            );
            return QueryResult::failure(READ_ONLY_MESSAGE);
        }

        if let Err(reason) = self.guard.validate(query) {
            warn!(
                "Injection guard rejected query ({}): {}",
                reason,
                truncate_for_log(query, LOG_QUERY_TRUNCATE_LENGTH)
            );
            return QueryResult::failure(format!("Security validation failed: {reason}"));
        }

        debug!(
            "Executing query: {}",
            truncate_for_log(query, LOG_QUERY_TRUNCATE_LENGTH)
        );

        let connector = Arc::clone(&self.connector);
        let outcome = run_bounded(timeout, cancel, async move {
            let mut conn = connector.open().await?;
            if kind == StatementKind::Select {
                let set = conn.query(query, &[], row_limit.saturating_add(1)).await?;
                Ok(QueryResult::from_row_set(set, row_limit))
            } else {
                let affected = conn.execute(query).await?;
                Ok(QueryResult::with_rows_affected(affected))
            }
        })
        .await;

        finish(outcome)
    }

    /// Execute `[schema].[procedure]` with named, bound parameters.
    pub async fn execute_stored_procedure(
        &self,
        schema: &str,
        procedure: &str,
        parameters: &BTreeMap<String, serde_json::Value>,
        options: ExecutionOptions,
        cancel: &CancellationToken,
    ) -> QueryResult {
        if !is_safe_identifier(schema) {
            return QueryResult::failure(invalid_identifier_message("schema name", schema));
        }
        if !is_safe_identifier(procedure) {
            return QueryResult::failure(invalid_identifier_message("procedure name", procedure));
        }

        let (timeout, row_limit) = self.resolve(options);

        let (sql, values) = match build_procedure_call(schema, procedure, parameters) {
            Ok(call) => call,
            Err(message) => return QueryResult::failure(message),
        };

        debug!("Executing stored procedure: {}", sql);

        let connector = Arc::clone(&self.connector);
        let outcome = run_bounded(timeout, cancel, async move {
            let mut conn = connector.open().await?;
            let set = conn
                .query(&sql, &values, row_limit.saturating_add(1))
                .await?;
            Ok(QueryResult::from_row_set(set, row_limit))
        })
        .await;

        finish(outcome)
    }

    fn resolve(&self, options: ExecutionOptions) -> (Option<Duration>, usize) {
        let timeout = options
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.policy.default_timeout);
        let timeout = (!timeout.is_zero()).then_some(timeout);
        let row_limit = options.max_rows.unwrap_or(self.policy.default_max_rows);
        (timeout, row_limit)
    }
}

/// Build `EXEC [schema].[proc] @a = @P1, @b = @P2` and the values to bind.
///
/// Parameter keys gain a leading `@` when missing. Values never enter the
/// statement text.
fn build_procedure_call(
    schema: &str,
    procedure: &str,
    parameters: &BTreeMap<String, serde_json::Value>,
) -> Result<(String, Vec<SqlValue>), String> {
    let mut assignments = Vec::with_capacity(parameters.len());
    let mut values = Vec::with_capacity(parameters.len());

    for (idx, (key, value)) in parameters.iter().enumerate() {
        let name = normalize_parameter_name(key)?;
        assignments.push(format!("{} = @P{}", name, idx + 1));
        values.push(SqlValue::from(value));
    }

    let mut sql = format!("EXEC {}", qualified_name(schema, procedure));
    if !assignments.is_empty() {
        sql.push(' ');
        sql.push_str(&assignments.join(", "));
    }

    Ok((sql, values))
}

/// Drive `work` under an optional timeout, aborting on cancellation.
///
/// `work` owns its connection, so every exit path (completion, timeout,
/// cancellation) drops the connection before this returns.
pub(crate) async fn run_bounded<T, F>(
    timeout: Option<Duration>,
    cancel: &CancellationToken,
    work: F,
) -> Result<T, ServerError>
where
    F: Future<Output = Result<T, ServerError>>,
{
    let bounded = async {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, work)
                .await
                .unwrap_or_else(|_| Err(ServerError::timeout(limit.as_secs()))),
            None => work.await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ServerError::Cancelled),
        result = bounded => result,
    }
}

fn finish(outcome: Result<QueryResult, ServerError>) -> QueryResult {
    match outcome {
        Ok(result) => {
            debug!(
                "Execution completed: {} rows, has_more_rows={}",
                result.row_count, result.has_more_rows
            );
            result
        }
        Err(error) => {
            warn!("Execution failed: {}", error);
            QueryResult::from_error(&error)
        }
    }
}

/// Truncate a string for logging purposes without splitting a character.
pub(crate) fn truncate_for_log(s: &str, max_len: usize) -> String {
    match s.char_indices().nth(max_len) {
        Some((byte_idx, _)) => format!("{}...", &s[..byte_idx]),
        None => s.to_string(),
    }
}
