//! SQL Server connections over tiberius.
//!
//! [`TdsConnector`] builds the tiberius configuration once and opens a fresh
//! client for every execution. Nothing is pooled or retained: the client is
//! closed when the returned [`Connection`] is dropped.

use crate::config::{AuthConfig, DatabaseConfig};
use crate::database::driver::{Connection, Connector, RowSet};
use crate::database::types::{SqlValue, TypeMapper};
use crate::error::ServerError;
use async_trait::async_trait;
use futures_util::stream::TryStreamExt;
use std::time::Duration;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, QueryItem, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

/// Type alias for a raw tiberius connection.
pub type RawConnection = Client<Compat<TcpStream>>;

/// Create a tiberius Config from DatabaseConfig.
pub fn create_config(db_config: &DatabaseConfig) -> Result<Config, ServerError> {
    if let AuthConfig::ConnectionString(ado) = &db_config.auth {
        let mut config = Config::from_ado_string(ado)
            .map_err(|e| ServerError::config(format!("Invalid connection string: {e}")))?;
        config.application_name(&db_config.application_name);
        return Ok(config);
    }

    let mut config = Config::new();

    config.host(&db_config.host);
    config.port(db_config.port);

    if let Some(ref database) = db_config.database {
        config.database(database);
    }

    if db_config.encrypt {
        config.encryption(EncryptionLevel::Required);
    } else {
        config.encryption(EncryptionLevel::Off);
    }

    if db_config.trust_server_certificate {
        config.trust_cert();
    }

    if let AuthConfig::SqlServer { username, password } = &db_config.auth {
        config.authentication(AuthMethod::sql_server(username, password));
    }

    config.application_name(&db_config.application_name);

    Ok(config)
}

/// Establish a TCP connection and perform the TDS handshake.
///
/// Follows one routing redirect, as issued by Azure SQL gateways.
pub async fn create_connection(config: Config) -> Result<RawConnection, ServerError> {
    let tcp = open_tcp(&config.get_addr()).await?;

    match Client::connect(config.clone(), tcp.compat_write()).await {
        Ok(client) => Ok(client),
        Err(tiberius::error::Error::Routing { host, port }) => {
            debug!("Server redirected connection to {}:{}", host, port);
            let mut config = config;
            config.host(&host);
            config.port(port);
            let tcp = open_tcp(&config.get_addr()).await?;
            Ok(Client::connect(config, tcp.compat_write()).await?)
        }
        Err(e) => Err(e.into()),
    }
}

async fn open_tcp(address: &str) -> Result<TcpStream, ServerError> {
    debug!("Creating connection to {}", address);

    let tcp = TcpStream::connect(address).await.map_err(|e| {
        ServerError::connection_with_source(format!("Failed to connect to {address}"), e)
    })?;

    tcp.set_nodelay(true)
        .map_err(|e| ServerError::connection_with_source("Failed to set TCP_NODELAY", e))?;

    Ok(tcp)
}

/// Opens one tiberius client per call.
#[derive(Debug, Clone)]
pub struct TdsConnector {
    config: Config,
    connect_timeout: Duration,
}

impl TdsConnector {
    /// Create a connector from configuration. Does not touch the network.
    pub fn new(db_config: &DatabaseConfig) -> Result<Self, ServerError> {
        Ok(Self {
            config: create_config(db_config)?,
            connect_timeout: db_config.connect_timeout,
        })
    }
}

#[async_trait]
impl Connector for TdsConnector {
    async fn open(&self) -> Result<Box<dyn Connection>, ServerError> {
        let client = tokio::time::timeout(self.connect_timeout, create_connection(self.config.clone()))
            .await
            .map_err(|_| {
                ServerError::connection(format!(
                    "Timed out after {} seconds connecting to SQL Server",
                    self.connect_timeout.as_secs()
                ))
            })??;

        Ok(Box::new(TdsConnection { client }))
    }
}

/// A live tiberius client owned by one execution.
pub struct TdsConnection {
    client: RawConnection,
}

#[async_trait]
impl Connection for TdsConnection {
    async fn query(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        row_cap: usize,
    ) -> Result<RowSet, ServerError> {
        let bound: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();
        let mut stream = self.client.query(sql, &bound).await?;

        let mut set = RowSet::default();

        while let Some(item) = stream.try_next().await? {
            match item {
                QueryItem::Metadata(meta) if meta.result_index() == 0 => {
                    set.columns = meta
                        .columns()
                        .iter()
                        .map(|col| col.name().to_string())
                        .collect();
                }
                // Only the first result set is materialized.
                QueryItem::Metadata(_) => break,
                QueryItem::Row(row) => {
                    if row.result_index() > 0 || set.rows.len() >= row_cap {
                        break;
                    }
                    set.rows.push(TypeMapper::extract_row(&row));
                }
            }
        }

        Ok(set)
    }

    async fn execute(&mut self, sql: &str) -> Result<u64, ServerError> {
        let result = self.client.execute(sql, &[]).await?;
        Ok(result.total())
    }
}
