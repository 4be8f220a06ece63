//! The database-driver seam.
//!
//! The executor and the metadata fetchers talk to the database only through
//! these traits. Each [`Connection`] is opened for one logical execution and
//! dropped when that execution ends.

use crate::database::types::SqlValue;
use crate::error::ServerError;
use async_trait::async_trait;

/// The first result set of a command, capped at a caller-chosen row count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    /// Column names in order. Empty when the command returned no result set.
    pub columns: Vec<String>,

    /// Row values, positionally aligned with `columns`.
    pub rows: Vec<Vec<SqlValue>>,
}

impl RowSet {
    /// Create a row set from column names and rows.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self { columns, rows }
    }

    /// Iterate rows as name-addressable records.
    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(move |values| Record {
            columns: &self.columns,
            values,
        })
    }
}

/// One row of a [`RowSet`] addressed by column name.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    columns: &'a [String],
    values: &'a [SqlValue],
}

impl<'a> Record<'a> {
    /// Value of the named column, if present.
    pub fn get(&self, column: &str) -> Option<&'a SqlValue> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .and_then(|idx| self.values.get(idx))
    }
}

/// Opens connections to the target database.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new connection. Never returns a shared or pooled handle.
    async fn open(&self) -> Result<Box<dyn Connection>, ServerError>;
}

/// A single open connection, exclusively owned by one execution.
#[async_trait]
pub trait Connection: Send {
    /// Run a row-returning command with `params` bound as `@P1..@Pn`.
    ///
    /// Reads at most `row_cap` rows of the first result set and stops there.
    async fn query(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        row_cap: usize,
    ) -> Result<RowSet, ServerError>;

    /// Run a non-row-returning command and report the rows affected.
    async fn execute(&mut self, sql: &str) -> Result<u64, ServerError>;
}
