//! Centralized constants for the SQL Server MCP server.
//!
//! Every default the engine falls back to lives here so the policy knobs are
//! easy to find.

use std::time::Duration;

// =============================================================================
// Connection Constants
// =============================================================================

/// Default SQL Server port.
pub const DEFAULT_PORT: u16 = 1433;

/// Default connection timeout in seconds.
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Default connection timeout as Duration.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration =
    Duration::from_secs(DEFAULT_CONNECTION_TIMEOUT_SECS);

/// Application name reported to SQL Server.
pub const APPLICATION_NAME: &str = "sqlserver-mcp-server";

// =============================================================================
// Query Execution Constants
// =============================================================================

/// Default command timeout in seconds. Zero disables the timeout.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Default command timeout as Duration.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS);

/// Default number of rows materialized per result.
pub const DEFAULT_MAX_RESULT_ROWS: usize = 1000;

// =============================================================================
// Cache Constants
// =============================================================================

/// Default metadata cache TTL in seconds (10 minutes).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 600;

/// Default metadata cache TTL as Duration.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(DEFAULT_CACHE_TTL_SECS);

// =============================================================================
// Resource Constants
// =============================================================================

/// URI scheme for metadata resources.
pub const RESOURCE_SCHEME: &str = "sqlserver://";

/// Root collection under the scheme.
pub const RESOURCE_ROOT: &str = "schemas";

// =============================================================================
// Tool Output Constants
// =============================================================================

/// Rows included in a truncated tool response summary.
pub const TRUNCATED_SAMPLE_ROWS: usize = 3;

// =============================================================================
// Logging Constants
// =============================================================================

/// Default truncation length for query logging.
pub const LOG_QUERY_TRUNCATE_LENGTH: usize = 100;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_durations() {
        assert_eq!(DEFAULT_CONNECTION_TIMEOUT, Duration::from_secs(30));
        assert_eq!(DEFAULT_QUERY_TIMEOUT, Duration::from_secs(30));
    }

    #[test]
    fn test_cache_ttl_is_ten_minutes() {
        assert_eq!(DEFAULT_CACHE_TTL, Duration::from_secs(10 * 60));
    }
}
