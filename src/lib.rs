//! # SQL Server MCP Server
//!
//! A Model Context Protocol (MCP) server for Microsoft SQL Server.
//!
//! This crate provides:
//! - **Tools**: Execute ad-hoc statements and stored procedures under a
//!   read-only policy, an injection guard and identifier validation
//! - **Resources**: Browse schema metadata under `sqlserver://schemas/...`
//! - **Caching**: Single-flight TTL cache for metadata lookups
//!
//! ## Architecture
//!
//! The server follows MCP protocol semantics:
//! - Resources for passive data access (schema discovery)
//! - Tools for active operations (query execution)
//!
//! Each execution opens its own connection through the
//! [`database::Connector`] seam and drops it before returning.

pub mod cache;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod handlers;
pub mod resources;
pub mod security;
pub mod server;
pub mod shutdown;
pub mod tools;

pub use config::Config;
pub use error::ServerError;
pub use server::SqlServerMcp;
