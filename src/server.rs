//! MCP server struct definition and initialization.

use crate::config::Config;
use crate::database::{Connector, QueryExecutor, TdsConnector};
use crate::error::ServerError;
use crate::resources::ResourceRouter;
use crate::security::InjectionGuard;
use rmcp::handler::server::router::tool::ToolRouter;
use std::sync::Arc;
use tracing::info;

/// The SQL Server MCP server instance.
///
/// Cloned into every request task; the inner state is shared via `Arc`.
/// Serves MCP through the `ServerHandler` impl in [`crate::handlers`].
#[derive(Clone)]
pub struct SqlServerMcp {
    /// Configuration.
    pub(crate) config: Arc<Config>,

    /// Query executor.
    pub(crate) executor: Arc<QueryExecutor>,

    /// Metadata resource router and its cache.
    pub(crate) resources: Arc<ResourceRouter>,

    /// Tool router for dispatching tool calls.
    pub(crate) tool_router: ToolRouter<Self>,
}

impl SqlServerMcp {
    /// Create a server that opens SQL Server connections with tiberius.
    ///
    /// No connection is made here; the first tool call or resource read opens
    /// one.
    pub fn from_config(config: Config) -> Result<Self, ServerError> {
        let connector = TdsConnector::new(&config.database)?;
        Ok(Self::with_connector(config, Arc::new(connector)))
    }

    /// Create a server over an arbitrary connector.
    pub fn with_connector(config: Config, connector: Arc<dyn Connector>) -> Self {
        let executor = Arc::new(QueryExecutor::new(
            Arc::clone(&connector),
            &config,
            InjectionGuard::default(),
        ));
        let resources = Arc::new(ResourceRouter::new(connector, &config));

        info!(
            read_only = config.security.read_only,
            max_rows = config.security.max_result_rows,
            cache_ttl_secs = config.query.metadata_cache_ttl.as_secs(),
            "Server initialized"
        );

        Self {
            config: Arc::new(config),
            executor,
            resources,
            tool_router: crate::tools::create_tool_router(),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the query executor.
    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    /// Get the resource router.
    pub fn resources(&self) -> &ResourceRouter {
        &self.resources
    }

    /// Check if the server is in read-only mode.
    pub fn is_read_only(&self) -> bool {
        self.executor.is_read_only()
    }

    /// The configured database, if any.
    pub fn current_database(&self) -> Option<&str> {
        self.config.database.database.as_deref()
    }
}
