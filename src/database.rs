//! Database connectivity, query execution and catalog metadata.

mod connection;
pub mod driver;
pub mod metadata;
mod query;
pub mod types;

pub use connection::{create_config, create_connection, RawConnection, TdsConnection, TdsConnector};
pub use driver::{Connection, Connector, Record, RowSet};
pub use metadata::{
    ColumnDescriptor, ForeignKeyDescriptor, MetadataQueries, ModuleType, ObjectDefinition,
    ParameterDescriptor, ProcedureDescriptor, SchemaSummary, TableDescriptor, ViewDescriptor,
};
pub(crate) use query::run_bounded;
pub use query::{ExecutionOptions, QueryExecutor, QueryResult, ResultRow, READ_ONLY_MESSAGE};
pub use types::{SqlValue, TypeMapper};
