//! Configuration management for the SQL Server MCP server.
//!
//! Configuration is loaded from environment variables following the 12-factor app pattern.
//! The resulting [`Config`] is immutable and injected once when the engine is built.

use crate::constants::{
    APPLICATION_NAME, DEFAULT_CACHE_TTL, DEFAULT_CACHE_TTL_SECS, DEFAULT_CONNECTION_TIMEOUT,
    DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_MAX_RESULT_ROWS, DEFAULT_PORT,
    DEFAULT_QUERY_TIMEOUT, DEFAULT_QUERY_TIMEOUT_SECS,
};
use crate::error::ServerError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database connection configuration
    pub database: DatabaseConfig,

    /// Security configuration
    pub security: SecurityConfig,

    /// Query execution configuration
    pub query: QueryConfig,
}

/// Database connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQL Server hostname or IP address
    pub host: String,

    /// SQL Server port (default: 1433)
    pub port: u16,

    /// Database name
    pub database: Option<String>,

    /// Authentication configuration
    pub auth: AuthConfig,

    /// Enable TLS encryption
    pub encrypt: bool,

    /// Trust server certificate (for self-signed certs)
    pub trust_server_certificate: bool,

    /// Application name sent to SQL Server
    pub application_name: String,

    /// Time allowed for opening a connection
    pub connect_timeout: Duration,
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AuthConfig {
    /// SQL Server authentication (username/password)
    SqlServer { username: String, password: String },

    /// ADO.NET connection string. Host, port, database and TLS settings come
    /// from the string instead of the surrounding fields.
    ConnectionString(String),
}

/// Security configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Reject write statements before they reach the database
    pub read_only: bool,

    /// Default maximum result rows per query
    pub max_result_rows: usize,
}

/// Query execution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Default command timeout. Zero disables the timeout.
    pub default_timeout: Duration,

    /// TTL for cached schema metadata
    pub metadata_cache_ttl: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `MSSQL_CONNECTION_STRING`: ADO.NET connection string (replaces the
    ///   host, port, database, credential and TLS variables)
    /// - `MSSQL_HOST`: SQL Server hostname (required without a connection string)
    /// - `MSSQL_USER` / `MSSQL_PASSWORD`: SQL authentication
    /// - `MSSQL_PORT`: Port (default: 1433)
    /// - `MSSQL_DATABASE`: Database name
    /// - `MSSQL_ENCRYPT`: Enable TLS (default: true)
    /// - `MSSQL_TRUST_CERT`: Trust server certificate (default: false)
    /// - `MSSQL_CONNECT_TIMEOUT`: Connection timeout in seconds (default: 30)
    /// - `MSSQL_READ_ONLY`: Block write statements (default: false)
    /// - `MSSQL_QUERY_TIMEOUT`: Default command timeout in seconds (default: 30, 0 = none)
    /// - `MSSQL_MAX_ROWS`: Default maximum result rows (default: 1000)
    /// - `MSSQL_CACHE_TTL`: Metadata cache TTL in seconds (default: 600)
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let connection_string = lookup("MSSQL_CONNECTION_STRING").filter(|s| !s.trim().is_empty());

        let (host, auth) = match connection_string {
            Some(ado) => (lookup("MSSQL_HOST").unwrap_or_default(), AuthConfig::ConnectionString(ado)),
            None => {
                let host = lookup("MSSQL_HOST").ok_or_else(|| {
                    ServerError::config(
                        "MSSQL_HOST environment variable is required (or set MSSQL_CONNECTION_STRING)",
                    )
                })?;

                let auth = match (lookup("MSSQL_USER"), lookup("MSSQL_PASSWORD")) {
                    (Some(username), Some(password)) => AuthConfig::SqlServer { username, password },
                    (Some(_), None) => {
                        return Err(ServerError::config(
                            "MSSQL_PASSWORD is required when MSSQL_USER is set",
                        ))
                    }
                    (None, Some(_)) => {
                        return Err(ServerError::config(
                            "MSSQL_USER is required when MSSQL_PASSWORD is set",
                        ))
                    }
                    (None, None) => {
                        return Err(ServerError::config(
                            "Authentication required: set MSSQL_USER and MSSQL_PASSWORD, or MSSQL_CONNECTION_STRING",
                        ))
                    }
                };
                (host, auth)
            }
        };

        let port = parse_or(&lookup, "MSSQL_PORT", DEFAULT_PORT)?;
        let database = lookup("MSSQL_DATABASE").filter(|s| !s.is_empty());
        let encrypt = flag_or(&lookup, "MSSQL_ENCRYPT", true);
        let trust_server_certificate = flag_or(&lookup, "MSSQL_TRUST_CERT", false);
        let connect_timeout_secs =
            parse_or(&lookup, "MSSQL_CONNECT_TIMEOUT", DEFAULT_CONNECTION_TIMEOUT_SECS)?;

        let read_only = flag_or(&lookup, "MSSQL_READ_ONLY", false);
        let default_timeout_secs =
            parse_or(&lookup, "MSSQL_QUERY_TIMEOUT", DEFAULT_QUERY_TIMEOUT_SECS)?;
        let max_result_rows = parse_or(&lookup, "MSSQL_MAX_ROWS", DEFAULT_MAX_RESULT_ROWS)?;
        let cache_ttl_secs = parse_or(&lookup, "MSSQL_CACHE_TTL", DEFAULT_CACHE_TTL_SECS)?;

        Ok(Config {
            database: DatabaseConfig {
                host,
                port,
                database,
                auth,
                encrypt,
                trust_server_certificate,
                application_name: APPLICATION_NAME.to_string(),
                connect_timeout: Duration::from_secs(connect_timeout_secs),
            },
            security: SecurityConfig {
                read_only,
                max_result_rows,
            },
            query: QueryConfig {
                default_timeout: Duration::from_secs(default_timeout_secs),
                metadata_cache_ttl: Duration::from_secs(cache_ttl_secs),
            },
        })
    }
}

fn flag_or<F>(lookup: &F, name: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ServerError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ServerError::config(format!("{name} has an invalid value: '{raw}'"))),
        None => Ok(default),
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            database: None,
            auth: AuthConfig::SqlServer {
                username: "sa".to_string(),
                password: String::new(),
            },
            encrypt: true,
            trust_server_certificate: false,
            application_name: APPLICATION_NAME.to_string(),
            connect_timeout: DEFAULT_CONNECTION_TIMEOUT,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            read_only: false,
            max_result_rows: DEFAULT_MAX_RESULT_ROWS,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_QUERY_TIMEOUT,
            metadata_cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}
