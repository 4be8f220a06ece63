//! MCP Resources for SQL Server metadata.
//!
//! Resources provide passive read-only access to database schema information.
//!
//! ## URI Scheme
//!
//! - `sqlserver://schemas` - User schemas in the current database
//! - `sqlserver://schemas/{schema}` - Table, view and procedure counts
//! - `sqlserver://schemas/{schema}/tables` - Table names
//! - `sqlserver://schemas/{schema}/tables/{table}` - Columns, keys and row count
//! - `sqlserver://schemas/{schema}/views` - View names
//! - `sqlserver://schemas/{schema}/views/{view}` - View columns
//! - `sqlserver://schemas/{schema}/views/{view}/definition` - View source
//! - `sqlserver://schemas/{schema}/procedures` - Procedure names
//! - `sqlserver://schemas/{schema}/procedures/{procedure}` - Procedure parameters
//! - `sqlserver://schemas/{schema}/procedures/{procedure}/definition` - Procedure source
//!
//! Everything except the `definition` leaves is served through the metadata
//! cache.

use crate::cache::{CacheKey, CacheStats, MetadataKind, ResourceCache};
use crate::config::Config;
use crate::constants::{RESOURCE_ROOT, RESOURCE_SCHEME};
use crate::database::{run_bounded, Connector, MetadataQueries, ModuleType};
use crate::error::ServerError;
use percent_encoding::percent_decode_str;
use rmcp::model::{AnnotateAble, RawResource, RawResourceTemplate, Resource, ResourceTemplate};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const JSON_MIME_TYPE: &str = "application/json";

// =========================================================================
// Resource URI Parsing
// =========================================================================

/// Object family addressed below a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// The schema itself.
    Schema,
    Tables,
    Views,
    Procedures,
}

impl ObjectKind {
    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "tables" => Some(ObjectKind::Tables),
            "views" => Some(ObjectKind::Views),
            "procedures" => Some(ObjectKind::Procedures),
            _ => None,
        }
    }

    fn has_definition(self) -> bool {
        matches!(self, ObjectKind::Views | ObjectKind::Procedures)
    }
}

/// Parsed form of a schema-scoped resource URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLocator {
    pub schema: String,
    pub kind: ObjectKind,
    pub name: Option<String>,
    pub wants_definition: bool,
}

/// Parsed resource URI variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceUri {
    /// `sqlserver://schemas`
    Schemas,
    /// Anything below `sqlserver://schemas/{schema}`
    Object(ResourceLocator),
}

/// Error type for resource URI parsing with detailed context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceParseError {
    uri: String,
    reason: ParseErrorReason,
}

/// Specific reasons why a resource URI parse failed.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ParseErrorReason {
    /// URI does not start with the sqlserver:// scheme
    InvalidScheme,
    /// Path does not match any known shape
    UnknownShape,
    /// Schema or object name segment is empty or does not decode
    InvalidSegment { message: String },
}

impl fmt::Display for ResourceParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            ParseErrorReason::InvalidScheme => write!(
                f,
                "Unknown resource URI '{}': expected the {RESOURCE_SCHEME} scheme",
                self.uri
            ),
            ParseErrorReason::UnknownShape => write!(f, "Unknown resource URI '{}'", self.uri),
            ParseErrorReason::InvalidSegment { message } => {
                write!(f, "Invalid resource URI '{}': {message}", self.uri)
            }
        }
    }
}

impl std::error::Error for ResourceParseError {}

impl ResourceParseError {
    fn new(uri: &str, reason: ParseErrorReason) -> Self {
        Self {
            uri: uri.to_string(),
            reason,
        }
    }
}

/// Parse `sqlserver://schemas/{schema}[/tables|/views|/procedures[/{name}[/definition]]]`.
pub fn parse_resource_uri(uri: &str) -> Result<ResourceUri, ResourceParseError> {
    let path = uri
        .strip_prefix(RESOURCE_SCHEME)
        .ok_or_else(|| ResourceParseError::new(uri, ParseErrorReason::InvalidScheme))?;

    let segments: Vec<&str> = path.trim_end_matches('/').split('/').collect();
    let unknown = || ResourceParseError::new(uri, ParseErrorReason::UnknownShape);

    let (schema, rest) = match segments.as_slice() {
        [root] if *root == RESOURCE_ROOT => return Ok(ResourceUri::Schemas),
        [root, schema, rest @ ..] if *root == RESOURCE_ROOT => (*schema, rest),
        _ => return Err(unknown()),
    };

    let (kind, name, wants_definition) = match rest {
        [] => (ObjectKind::Schema, None, false),
        [kind] => (ObjectKind::from_segment(kind).ok_or_else(unknown)?, None, false),
        [kind, name] => (
            ObjectKind::from_segment(kind).ok_or_else(unknown)?,
            Some(*name),
            false,
        ),
        [kind, name, "definition"] => {
            let kind = ObjectKind::from_segment(kind)
                .filter(|k| k.has_definition())
                .ok_or_else(unknown)?;
            (kind, Some(*name), true)
        }
        _ => return Err(unknown()),
    };

    let schema = decode_segment(uri, "schema name", schema)?;
    let name = name
        .map(|name| decode_segment(uri, "object name", name))
        .transpose()?;

    Ok(ResourceUri::Object(ResourceLocator {
        schema,
        kind,
        name,
        wants_definition,
    }))
}

/// Percent-decode a schema or object name segment.
///
/// Any catalog name is accepted; it is only ever bound as a query parameter.
fn decode_segment(uri: &str, what: &str, raw: &str) -> Result<String, ResourceParseError> {
    let invalid = |message: String| {
        ResourceParseError::new(uri, ParseErrorReason::InvalidSegment { message })
    };

    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| invalid(format!("{what} '{raw}' is not valid UTF-8 once decoded")))?;

    if decoded.is_empty() {
        return Err(invalid(format!("{what} cannot be empty")));
    }
    if decoded.contains('/') {
        return Err(invalid(format!("{what} '{decoded}' cannot contain '/'")));
    }
    Ok(decoded.into_owned())
}

// =========================================================================
// Router
// =========================================================================

/// Resolves resource URIs to metadata, caching everything except definitions.
pub struct ResourceRouter {
    metadata: MetadataQueries,
    cache: ResourceCache<CacheKey, Value>,
    ttl: Duration,
    timeout: Option<Duration>,
}

impl ResourceRouter {
    /// Create a router over `connector` using the configured cache TTL and
    /// command timeout.
    pub fn new(connector: Arc<dyn Connector>, config: &Config) -> Self {
        let timeout = config.query.default_timeout;
        Self {
            metadata: MetadataQueries::new(connector),
            cache: ResourceCache::new(),
            ttl: config.query.metadata_cache_ttl,
            timeout: (!timeout.is_zero()).then_some(timeout),
        }
    }

    /// Read a resource.
    ///
    /// Unknown URIs fail before any database access. Cancelling `cancel`
    /// abandons the read at its next suspension point.
    pub async fn read(&self, uri: &str, cancel: &CancellationToken) -> Result<Value, ServerError> {
        let parsed =
            parse_resource_uri(uri).map_err(|e| ServerError::invalid_input(e.to_string()))?;

        debug!(uri, "Reading resource");
        run_bounded(self.timeout, cancel, self.dispatch(parsed)).await
    }

    /// Read a resource, folding any failure into `{uri, message}`.
    pub async fn read_or_error(&self, uri: &str, cancel: &CancellationToken) -> Value {
        match self.read(uri, cancel).await {
            Ok(value) => value,
            Err(error) => {
                warn!(uri, "Resource read failed: {}", error);
                error_payload(uri, &error)
            }
        }
    }

    /// Metadata cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop every cached metadata entry.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    async fn dispatch(&self, uri: ResourceUri) -> Result<Value, ServerError> {
        let locator = match uri {
            ResourceUri::Schemas => {
                return self
                    .cached(CacheKey::schema_list(), || async move {
                        let schemas = self.metadata.list_schemas().await?;
                        Ok(json!({ "count": schemas.len(), "schemas": schemas }))
                    })
                    .await;
            }
            ResourceUri::Object(locator) => locator,
        };

        let ResourceLocator {
            schema,
            kind,
            name,
            wants_definition,
        } = locator;
        let schema = schema.as_str();

        match (kind, name.as_deref(), wants_definition) {
            (ObjectKind::Schema, None, _) => {
                self.cached(CacheKey::schema_level(MetadataKind::Schema, schema), || async move {
                    to_json(self.metadata.schema_summary(schema).await?)
                })
                .await
            }
            (ObjectKind::Tables, None, _) => {
                self.cached(CacheKey::schema_level(MetadataKind::Tables, schema), || async move {
                    let tables = self.metadata.list_tables(schema).await?;
                    Ok(name_list(schema, "tables", tables))
                })
                .await
            }
            (ObjectKind::Tables, Some(table), false) => {
                self.cached(CacheKey::object(MetadataKind::Table, schema, table), || async move {
                    to_json(self.metadata.table_descriptor(schema, table).await?)
                })
                .await
            }
            (ObjectKind::Views, None, _) => {
                self.cached(CacheKey::schema_level(MetadataKind::Views, schema), || async move {
                    let views = self.metadata.list_views(schema).await?;
                    Ok(name_list(schema, "views", views))
                })
                .await
            }
            (ObjectKind::Views, Some(view), false) => {
                self.cached(CacheKey::object(MetadataKind::View, schema, view), || async move {
                    to_json(self.metadata.view_descriptor(schema, view).await?)
                })
                .await
            }
            (ObjectKind::Views, Some(view), true) => {
                to_json(self.metadata.definition(ModuleType::View, schema, view).await?)
            }
            (ObjectKind::Procedures, None, _) => {
                self.cached(CacheKey::schema_level(MetadataKind::Procedures, schema), || async move {
                    let procedures = self.metadata.list_procedures(schema).await?;
                    Ok(name_list(schema, "procedures", procedures))
                })
                .await
            }
            (ObjectKind::Procedures, Some(procedure), false) => {
                self.cached(
                    CacheKey::object(MetadataKind::Procedure, schema, procedure),
                    || async move {
                        to_json(self.metadata.procedure_descriptor(schema, procedure).await?)
                    },
                )
                .await
            }
            (ObjectKind::Procedures, Some(procedure), true) => {
                to_json(
                    self.metadata
                        .definition(ModuleType::Procedure, schema, procedure)
                        .await?,
                )
            }
            _ => Err(ServerError::invalid_input(format!(
                "Unknown resource URI for schema '{schema}'"
            ))),
        }
    }

    async fn cached<F, Fut>(&self, key: CacheKey, fetch: F) -> Result<Value, ServerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, ServerError>>,
    {
        self.cache.get_or_add(key, self.ttl, fetch).await
    }
}

/// Failure payload of the resource-read boundary.
pub fn error_payload(uri: &str, error: &ServerError) -> Value {
    json!({ "uri": uri, "message": error.to_string() })
}

fn name_list(schema: &str, field: &str, names: Vec<String>) -> Value {
    let mut value = json!({ "schema": schema, "count": names.len() });
    value[field] = json!(names);
    value
}

fn to_json<T: Serialize>(value: T) -> Result<Value, ServerError> {
    Ok(serde_json::to_value(value)?)
}

// =========================================================================
// Listing
// =========================================================================

/// Build the list of static resources.
pub fn build_resource_list() -> Vec<Resource> {
    vec![create_resource(
        &format!("{RESOURCE_SCHEME}{RESOURCE_ROOT}"),
        "Schemas",
        "User schemas in the current database",
    )]
}

/// Build resource templates for the schema-scoped resources.
pub fn build_resource_templates() -> Vec<ResourceTemplate> {
    let base = format!("{RESOURCE_SCHEME}{RESOURCE_ROOT}/{{schema}}");
    vec![
        create_resource_template(
            &base,
            "Schema Summary",
            "Number of tables, views and stored procedures in a schema",
        ),
        create_resource_template(
            &format!("{base}/tables"),
            "Tables",
            "Names of the tables in a schema",
        ),
        create_resource_template(
            &format!("{base}/tables/{{table}}"),
            "Table Details",
            "Columns, primary key, foreign keys and row count of a table",
        ),
        create_resource_template(
            &format!("{base}/views"),
            "Views",
            "Names of the views in a schema",
        ),
        create_resource_template(
            &format!("{base}/views/{{view}}"),
            "View Details",
            "Columns of a view",
        ),
        create_resource_template(
            &format!("{base}/views/{{view}}/definition"),
            "View Definition",
            "SQL source of a view",
        ),
        create_resource_template(
            &format!("{base}/procedures"),
            "Stored Procedures",
            "Names of the stored procedures in a schema",
        ),
        create_resource_template(
            &format!("{base}/procedures/{{procedure}}"),
            "Procedure Details",
            "Parameters of a stored procedure",
        ),
        create_resource_template(
            &format!("{base}/procedures/{{procedure}}/definition"),
            "Procedure Definition",
            "SQL source of a stored procedure",
        ),
    ]
}

fn create_resource(uri: &str, name: &str, description: &str) -> Resource {
    let mut resource = RawResource::new(uri, name);
    resource.description = Some(description.to_string());
    resource.mime_type = Some(JSON_MIME_TYPE.to_string());
    resource.no_annotation()
}

fn create_resource_template(uri_template: &str, name: &str, description: &str) -> ResourceTemplate {
    RawResourceTemplate {
        uri_template: uri_template.to_string(),
        name: name.to_string(),
        title: None,
        description: Some(description.to_string()),
        mime_type: Some(JSON_MIME_TYPE.to_string()),
    }
    .no_annotation()
}
