//! Shared test fixtures: a scripted in-memory connector and config helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlserver_mcp_server::config::Config;
use sqlserver_mcp_server::database::{Connection, Connector, RowSet, SqlValue};
use sqlserver_mcp_server::error::ServerError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What a scripted statement answers.
#[derive(Debug, Clone)]
pub enum Reply {
    Rows(RowSet),
    Affected(u64),
    EngineError { message: String, code: i32 },
    ConnectivityError(String),
}

impl Reply {
    fn to_error(&self) -> Option<ServerError> {
        match self {
            Reply::EngineError { message, code } => {
                Some(ServerError::query_error_with_code(message.clone(), *code))
            }
            Reply::ConnectivityError(message) => Some(ServerError::connection(message.clone())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Rule {
    patterns: Vec<String>,
    reply: Reply,
}

impl Rule {
    fn matches(&self, sql: &str) -> bool {
        self.patterns.iter().all(|p| sql.contains(p.as_str()))
    }
}

/// A statement as the connection received it.
#[derive(Debug, Clone, PartialEq)]
pub struct Issued {
    pub sql: String,
    pub params: Vec<SqlValue>,
    pub row_cap: Option<usize>,
}

#[derive(Default)]
struct MockState {
    rules: Mutex<Vec<Rule>>,
    issued: Mutex<Vec<Issued>>,
    open_failure: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
    opens: AtomicUsize,
    live: AtomicUsize,
}

/// Connector answering statements from a script instead of a database.
///
/// A statement is answered by the first rule whose patterns are all
/// substrings of its text; unmatched queries return an empty row set.
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<MockState>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule, or replace the rule with the same patterns.
    pub fn on(&self, patterns: &[&str], reply: Reply) -> &Self {
        let patterns: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
        let mut rules = self.state.rules.lock();
        match rules.iter_mut().find(|r| r.patterns == patterns) {
            Some(rule) => rule.reply = reply,
            None => rules.push(Rule { patterns, reply }),
        }
        self
    }

    pub fn on_rows(&self, patterns: &[&str], set: RowSet) -> &Self {
        self.on(patterns, Reply::Rows(set))
    }

    /// Every later `open` fails with a connectivity error.
    pub fn fail_open(&self, message: &str) {
        *self.state.open_failure.lock() = Some(message.to_string());
    }

    /// Every later statement waits this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock() = Some(delay);
    }

    pub fn opens(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    /// Connections opened and not yet dropped.
    pub fn live_connections(&self) -> usize {
        self.state.live.load(Ordering::SeqCst)
    }

    pub fn issued(&self) -> Vec<Issued> {
        self.state.issued.lock().clone()
    }

    /// Number of statements issued whose text contains every pattern.
    pub fn count(&self, patterns: &[&str]) -> usize {
        self.state
            .issued
            .lock()
            .iter()
            .filter(|i| patterns.iter().all(|p| i.sql.contains(p)))
            .count()
    }

    pub fn as_connector(&self) -> Arc<dyn Connector> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self) -> Result<Box<dyn Connection>, ServerError> {
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.state.open_failure.lock().clone() {
            return Err(ServerError::connection(message));
        }
        self.state.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockConnection {
    state: Arc<MockState>,
}

impl MockConnection {
    async fn answer(
        &self,
        sql: &str,
        params: &[SqlValue],
        row_cap: Option<usize>,
    ) -> Option<Reply> {
        self.state.issued.lock().push(Issued {
            sql: sql.to_string(),
            params: params.to_vec(),
            row_cap,
        });

        let delay = *self.state.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.state
            .rules
            .lock()
            .iter()
            .find(|r| r.matches(sql))
            .map(|r| r.reply.clone())
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.state.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn query(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        row_cap: usize,
    ) -> Result<RowSet, ServerError> {
        match self.answer(sql, params, Some(row_cap)).await {
            Some(Reply::Rows(mut set)) => {
                set.rows.truncate(row_cap);
                Ok(set)
            }
            Some(reply) => match reply.to_error() {
                Some(error) => Err(error),
                None => Ok(RowSet::default()),
            },
            None => Ok(RowSet::default()),
        }
    }

    async fn execute(&mut self, sql: &str) -> Result<u64, ServerError> {
        match self.answer(sql, &[], None).await {
            Some(Reply::Affected(n)) => Ok(n),
            Some(reply) => match reply.to_error() {
                Some(error) => Err(error),
                None => Ok(0),
            },
            None => Ok(0),
        }
    }
}

/// Build a row set from column names and rows.
pub fn rows(columns: &[&str], rows: Vec<Vec<SqlValue>>) -> RowSet {
    RowSet::new(columns.iter().map(|c| c.to_string()).collect(), rows)
}

/// A single-column row set of text values.
pub fn names(column: &str, values: &[&str]) -> RowSet {
    rows(
        &[column],
        values.iter().map(|v| vec![text(v)]).collect(),
    )
}

pub fn text(s: &str) -> SqlValue {
    SqlValue::Text(s.to_string())
}

/// Config for tests, with extra environment-style overrides.
pub fn config_with(overrides: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = [
        ("MSSQL_HOST", "localhost"),
        ("MSSQL_USER", "sa"),
        ("MSSQL_PASSWORD", "test"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in overrides {
        vars.insert(k.to_string(), v.to_string());
    }
    Config::from_lookup(|name| vars.get(name).cloned()).expect("test config must load")
}

pub fn read_only_config() -> Config {
    config_with(&[("MSSQL_READ_ONLY", "true")])
}

pub fn read_write_config() -> Config {
    config_with(&[("MSSQL_READ_ONLY", "false")])
}
