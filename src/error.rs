//! Error types for the SQL Server MCP server.
//!
//! `ServerError` covers everything that can go wrong below the tool and
//! resource boundaries. Policy rejections never become a `ServerError`: the
//! executor answers them with a failed `QueryResult` directly.

use thiserror::Error;

/// Domain-specific errors for the SQL Server MCP server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure to open or keep a connection
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Statement failure. Carries the engine error number when the server
    /// reported one.
    #[error("{message}")]
    QueryExecution {
        message: String,
        sql_error_code: Option<i32>,
    },

    /// Command timeout
    #[error("Query timed out after {timeout_seconds} seconds")]
    Timeout { timeout_seconds: u64 },

    /// Cooperative cancellation observed
    #[error("Query was cancelled")]
    Cancelled,

    /// Catalog object not found, e.g. `Table not found: dbo.Users`
    #[error("{kind} not found: {name}")]
    ResourceNotFound { kind: &'static str, name: String },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a connection error with a source.
    pub fn connection_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a query execution error without an engine code.
    pub fn query_error(msg: impl Into<String>) -> Self {
        Self::QueryExecution {
            message: msg.into(),
            sql_error_code: None,
        }
    }

    /// Create a query execution error reported by the database engine.
    pub fn query_error_with_code(msg: impl Into<String>, code: i32) -> Self {
        Self::QueryExecution {
            message: msg.into(),
            sql_error_code: Some(code),
        }
    }

    /// Create a timeout error.
    pub fn timeout(seconds: u64) -> Self {
        Self::Timeout {
            timeout_seconds: seconds,
        }
    }

    /// Create a resource not found error.
    pub fn resource_not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::ResourceNotFound {
            kind,
            name: name.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The engine error number, if the database reported this failure.
    pub fn sql_error_code(&self) -> Option<i32> {
        match self {
            Self::QueryExecution { sql_error_code, .. } => *sql_error_code,
            _ => None,
        }
    }
}

impl From<tiberius::error::Error> for ServerError {
    fn from(e: tiberius::error::Error) -> Self {
        use tiberius::error::Error;

        match e {
            Error::Server(token) => {
                // Engine error numbers fit comfortably in i32.
                let code = i32::try_from(token.code()).unwrap_or(i32::MAX);
                ServerError::query_error_with_code(token.message(), code)
            }
            Error::Io { kind, message } => {
                ServerError::connection(format!("IO error ({kind:?}): {message}"))
            }
            Error::Tls(message) => ServerError::connection(format!("TLS error: {message}")),
            Error::Routing { host, port } => ServerError::connection(format!(
                "Server requested a redirect to {host}:{port}"
            )),
            Error::Protocol(message) => {
                ServerError::connection(format!("Protocol error: {message}"))
            }
            Error::Conversion(message) => {
                ServerError::query_error(format!("Type conversion error: {message}"))
            }
            other => ServerError::query_error(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(e: serde_json::Error) -> Self {
        ServerError::internal(format!("Serialization failed: {e}"))
    }
}
