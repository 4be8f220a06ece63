//! SQL Server catalog queries for schema introspection.
//!
//! Every query binds schema and object names as parameters; nothing from the
//! caller is interpolated into the statement text.

use crate::database::driver::{Connection, Connector, Record, RowSet};
use crate::database::types::SqlValue;
use crate::error::ServerError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Object counts for one schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaSummary {
    pub schema: String,
    pub table_count: i64,
    pub view_count: i64,
    pub procedure_count: i64,
}

/// Column metadata for a table or view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    pub name: String,
    pub ordinal_position: i64,
    pub data_type: String,
    pub max_length: Option<i64>,
    pub numeric_precision: Option<i64>,
    pub numeric_scale: Option<i64>,
    pub is_nullable: bool,
    pub default_value: Option<String>,
}

/// One column of a foreign key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyDescriptor {
    pub name: String,
    pub column: String,
    pub referenced_schema: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

/// Full table descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDescriptor {
    pub schema: String,
    pub name: String,
    /// Rows in the heap or clustered index, from `sys.partitions`.
    pub row_count: Option<i64>,
    pub columns: Vec<ColumnDescriptor>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyDescriptor>,
}

/// View columns. The definition is served separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewDescriptor {
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
}

/// Stored procedure parameter metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDescriptor {
    pub name: String,
    pub ordinal_position: i64,
    /// `IN`, `OUT` or `INOUT`.
    pub mode: String,
    pub data_type: String,
    pub max_length: Option<i64>,
    pub numeric_precision: Option<i64>,
    pub numeric_scale: Option<i64>,
}

/// Stored procedure parameters. The definition is served separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureDescriptor {
    pub schema: String,
    pub name: String,
    pub parameters: Vec<ParameterDescriptor>,
}

/// SQL source of a view or procedure. `None` for encrypted modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDefinition {
    pub schema: String,
    pub name: String,
    pub definition: Option<String>,
}

/// Module type codes in `sys.objects`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleType {
    View,
    Procedure,
}

impl ModuleType {
    fn type_code(self) -> &'static str {
        match self {
            ModuleType::View => "V",
            ModuleType::Procedure => "P",
        }
    }

    fn label(self) -> &'static str {
        match self {
            ModuleType::View => "View",
            ModuleType::Procedure => "Procedure",
        }
    }
}

const LIST_SCHEMAS: &str = r#"
    SELECT SCHEMA_NAME AS schema_name
    FROM INFORMATION_SCHEMA.SCHEMATA
    WHERE SCHEMA_NAME NOT IN ('sys', 'INFORMATION_SCHEMA', 'guest')
    AND SCHEMA_NAME NOT LIKE 'db[_]%'
    ORDER BY SCHEMA_NAME
"#;

const SCHEMA_SUMMARY: &str = r#"
    SELECT
        (SELECT COUNT(*) FROM INFORMATION_SCHEMA.SCHEMATA
            WHERE SCHEMA_NAME = @P1) AS schema_count,
        (SELECT COUNT(*) FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = @P1 AND TABLE_TYPE = 'BASE TABLE') AS table_count,
        (SELECT COUNT(*) FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = @P1 AND TABLE_TYPE = 'VIEW') AS view_count,
        (SELECT COUNT(*) FROM INFORMATION_SCHEMA.ROUTINES
            WHERE ROUTINE_SCHEMA = @P1 AND ROUTINE_TYPE = 'PROCEDURE') AS procedure_count
"#;

const LIST_TABLES: &str = r#"
    SELECT TABLE_NAME AS object_name
    FROM INFORMATION_SCHEMA.TABLES
    WHERE TABLE_SCHEMA = @P1 AND TABLE_TYPE = 'BASE TABLE'
    ORDER BY TABLE_NAME
"#;

const LIST_VIEWS: &str = r#"
    SELECT TABLE_NAME AS object_name
    FROM INFORMATION_SCHEMA.VIEWS
    WHERE TABLE_SCHEMA = @P1
    ORDER BY TABLE_NAME
"#;

const LIST_PROCEDURES: &str = r#"
    SELECT ROUTINE_NAME AS object_name
    FROM INFORMATION_SCHEMA.ROUTINES
    WHERE ROUTINE_SCHEMA = @P1 AND ROUTINE_TYPE = 'PROCEDURE'
    ORDER BY ROUTINE_NAME
"#;

/// Columns of a table (`@P3 = 'BASE TABLE'`) or view (`@P3 = 'VIEW'`).
const OBJECT_COLUMNS: &str = r#"
    SELECT
        c.COLUMN_NAME AS column_name,
        c.ORDINAL_POSITION AS ordinal_position,
        c.DATA_TYPE AS data_type,
        c.CHARACTER_MAXIMUM_LENGTH AS max_length,
        c.NUMERIC_PRECISION AS numeric_precision,
        c.NUMERIC_SCALE AS numeric_scale,
        c.IS_NULLABLE AS is_nullable,
        c.COLUMN_DEFAULT AS default_value
    FROM INFORMATION_SCHEMA.COLUMNS c
    INNER JOIN INFORMATION_SCHEMA.TABLES t
        ON t.TABLE_SCHEMA = c.TABLE_SCHEMA AND t.TABLE_NAME = c.TABLE_NAME
    WHERE c.TABLE_SCHEMA = @P1 AND c.TABLE_NAME = @P2 AND t.TABLE_TYPE = @P3
    ORDER BY c.ORDINAL_POSITION
"#;

const PRIMARY_KEY: &str = r#"
    SELECT kcu.COLUMN_NAME AS column_name
    FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc
    INNER JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu
        ON kcu.CONSTRAINT_SCHEMA = tc.CONSTRAINT_SCHEMA
        AND kcu.CONSTRAINT_NAME = tc.CONSTRAINT_NAME
        AND kcu.TABLE_NAME = tc.TABLE_NAME
    WHERE tc.CONSTRAINT_TYPE = 'PRIMARY KEY'
    AND tc.TABLE_SCHEMA = @P1 AND tc.TABLE_NAME = @P2
    ORDER BY kcu.ORDINAL_POSITION
"#;

const FOREIGN_KEYS: &str = r#"
    SELECT
        fk.name AS constraint_name,
        pc.name AS column_name,
        rs.name AS referenced_schema,
        rt.name AS referenced_table,
        rc.name AS referenced_column
    FROM sys.foreign_keys fk
    INNER JOIN sys.foreign_key_columns fkc ON fkc.constraint_object_id = fk.object_id
    INNER JOIN sys.tables pt ON pt.object_id = fkc.parent_object_id
    INNER JOIN sys.schemas ps ON ps.schema_id = pt.schema_id
    INNER JOIN sys.columns pc
        ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id
    INNER JOIN sys.tables rt ON rt.object_id = fkc.referenced_object_id
    INNER JOIN sys.schemas rs ON rs.schema_id = rt.schema_id
    INNER JOIN sys.columns rc
        ON rc.object_id = fkc.referenced_object_id AND rc.column_id = fkc.referenced_column_id
    WHERE ps.name = @P1 AND pt.name = @P2
    ORDER BY fk.name, fkc.constraint_column_id
"#;

const TABLE_ROW_COUNT: &str = r#"
    SELECT SUM(p.rows) AS row_count
    FROM sys.partitions p
    INNER JOIN sys.tables t ON t.object_id = p.object_id
    INNER JOIN sys.schemas s ON s.schema_id = t.schema_id
    WHERE s.name = @P1 AND t.name = @P2 AND p.index_id IN (0, 1)
"#;

const PROCEDURE_EXISTS: &str = r#"
    SELECT COUNT(*) AS match_count
    FROM INFORMATION_SCHEMA.ROUTINES
    WHERE ROUTINE_SCHEMA = @P1 AND ROUTINE_NAME = @P2 AND ROUTINE_TYPE = 'PROCEDURE'
"#;

const PROCEDURE_PARAMETERS: &str = r#"
    SELECT
        PARAMETER_NAME AS parameter_name,
        ORDINAL_POSITION AS ordinal_position,
        PARAMETER_MODE AS parameter_mode,
        DATA_TYPE AS data_type,
        CHARACTER_MAXIMUM_LENGTH AS max_length,
        NUMERIC_PRECISION AS numeric_precision,
        NUMERIC_SCALE AS numeric_scale
    FROM INFORMATION_SCHEMA.PARAMETERS
    WHERE SPECIFIC_SCHEMA = @P1 AND SPECIFIC_NAME = @P2 AND ORDINAL_POSITION > 0
    ORDER BY ORDINAL_POSITION
"#;

const MODULE_DEFINITION: &str = r#"
    SELECT m.definition AS definition
    FROM sys.sql_modules m
    INNER JOIN sys.objects o ON o.object_id = m.object_id
    INNER JOIN sys.schemas s ON s.schema_id = o.schema_id
    WHERE s.name = @P1 AND o.name = @P2 AND o.type = @P3
"#;

/// Catalog fetchers. Each call opens its own connection and drops it on return.
#[derive(Clone)]
pub struct MetadataQueries {
    connector: Arc<dyn Connector>,
}

impl MetadataQueries {
    /// Create a new metadata query builder.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }

    /// List user schemas.
    pub async fn list_schemas(&self) -> Result<Vec<String>, ServerError> {
        let mut conn = self.connector.open().await?;
        let set = fetch(conn.as_mut(), LIST_SCHEMAS, &[]).await?;
        Ok(set
            .records()
            .filter_map(|r| extract_string(&r, "schema_name"))
            .collect())
    }

    /// Count tables, views and procedures in a schema.
    pub async fn schema_summary(&self, schema: &str) -> Result<SchemaSummary, ServerError> {
        let mut conn = self.connector.open().await?;
        let set = fetch(conn.as_mut(), SCHEMA_SUMMARY, &[text(schema)]).await?;

        let record = set
            .records()
            .next()
            .filter(|r| extract_i64(r, "schema_count").unwrap_or(0) > 0)
            .ok_or_else(|| ServerError::resource_not_found("Schema", schema))?;

        Ok(SchemaSummary {
            schema: schema.to_string(),
            table_count: extract_i64(&record, "table_count").unwrap_or(0),
            view_count: extract_i64(&record, "view_count").unwrap_or(0),
            procedure_count: extract_i64(&record, "procedure_count").unwrap_or(0),
        })
    }

    /// Names of base tables in a schema.
    pub async fn list_tables(&self, schema: &str) -> Result<Vec<String>, ServerError> {
        self.list_names(LIST_TABLES, schema).await
    }

    /// Names of views in a schema.
    pub async fn list_views(&self, schema: &str) -> Result<Vec<String>, ServerError> {
        self.list_names(LIST_VIEWS, schema).await
    }

    /// Names of stored procedures in a schema.
    pub async fn list_procedures(&self, schema: &str) -> Result<Vec<String>, ServerError> {
        self.list_names(LIST_PROCEDURES, schema).await
    }

    async fn list_names(&self, sql: &str, schema: &str) -> Result<Vec<String>, ServerError> {
        let mut conn = self.connector.open().await?;
        let set = fetch(conn.as_mut(), sql, &[text(schema)]).await?;
        Ok(set
            .records()
            .filter_map(|r| extract_string(&r, "object_name"))
            .collect())
    }

    /// Columns, primary key, foreign keys and row count of one table.
    pub async fn table_descriptor(
        &self,
        schema: &str,
        table: &str,
    ) -> Result<TableDescriptor, ServerError> {
        let mut conn = self.connector.open().await?;
        let names = [text(schema), text(table)];

        let columns = object_columns(conn.as_mut(), schema, table, "BASE TABLE").await?;
        if columns.is_empty() {
            return Err(ServerError::resource_not_found(
                "Table",
                format!("{schema}.{table}"),
            ));
        }

        let primary_key = fetch(conn.as_mut(), PRIMARY_KEY, &names)
            .await?
            .records()
            .filter_map(|r| extract_string(&r, "column_name"))
            .collect();

        let foreign_keys = fetch(conn.as_mut(), FOREIGN_KEYS, &names)
            .await?
            .records()
            .map(|r| ForeignKeyDescriptor {
                name: extract_string(&r, "constraint_name").unwrap_or_default(),
                column: extract_string(&r, "column_name").unwrap_or_default(),
                referenced_schema: extract_string(&r, "referenced_schema").unwrap_or_default(),
                referenced_table: extract_string(&r, "referenced_table").unwrap_or_default(),
                referenced_column: extract_string(&r, "referenced_column").unwrap_or_default(),
            })
            .collect();

        let row_count = fetch(conn.as_mut(), TABLE_ROW_COUNT, &names)
            .await?
            .records()
            .next()
            .and_then(|r| extract_i64(&r, "row_count"));

        Ok(TableDescriptor {
            schema: schema.to_string(),
            name: table.to_string(),
            row_count,
            columns,
            primary_key,
            foreign_keys,
        })
    }

    /// Columns of one view.
    pub async fn view_descriptor(
        &self,
        schema: &str,
        view: &str,
    ) -> Result<ViewDescriptor, ServerError> {
        let mut conn = self.connector.open().await?;
        let columns = object_columns(conn.as_mut(), schema, view, "VIEW").await?;
        if columns.is_empty() {
            return Err(ServerError::resource_not_found(
                "View",
                format!("{schema}.{view}"),
            ));
        }

        Ok(ViewDescriptor {
            schema: schema.to_string(),
            name: view.to_string(),
            columns,
        })
    }

    /// Parameters of one stored procedure.
    pub async fn procedure_descriptor(
        &self,
        schema: &str,
        procedure: &str,
    ) -> Result<ProcedureDescriptor, ServerError> {
        let mut conn = self.connector.open().await?;
        let names = [text(schema), text(procedure)];

        let exists = fetch(conn.as_mut(), PROCEDURE_EXISTS, &names)
            .await?
            .records()
            .next()
            .and_then(|r| extract_i64(&r, "match_count"))
            .unwrap_or(0)
            > 0;
        if !exists {
            return Err(ServerError::resource_not_found(
                "Procedure",
                format!("{schema}.{procedure}"),
            ));
        }

        let parameters = fetch(conn.as_mut(), PROCEDURE_PARAMETERS, &names)
            .await?
            .records()
            .map(|r| ParameterDescriptor {
                name: extract_string(&r, "parameter_name").unwrap_or_default(),
                ordinal_position: extract_i64(&r, "ordinal_position").unwrap_or(0),
                mode: extract_string(&r, "parameter_mode").unwrap_or_else(|| "IN".to_string()),
                data_type: extract_string(&r, "data_type").unwrap_or_default(),
                max_length: extract_i64(&r, "max_length"),
                numeric_precision: extract_i64(&r, "numeric_precision"),
                numeric_scale: extract_i64(&r, "numeric_scale"),
            })
            .collect();

        Ok(ProcedureDescriptor {
            schema: schema.to_string(),
            name: procedure.to_string(),
            parameters,
        })
    }

    /// SQL source text of a view or procedure.
    pub async fn definition(
        &self,
        module: ModuleType,
        schema: &str,
        name: &str,
    ) -> Result<ObjectDefinition, ServerError> {
        let mut conn = self.connector.open().await?;
        let set = fetch(
            conn.as_mut(),
            MODULE_DEFINITION,
            &[text(schema), text(name), text(module.type_code())],
        )
        .await?;

        let record = set.records().next().ok_or_else(|| {
            ServerError::resource_not_found(module.label(), format!("{schema}.{name}"))
        })?;

        Ok(ObjectDefinition {
            schema: schema.to_string(),
            name: name.to_string(),
            definition: extract_string(&record, "definition"),
        })
    }
}

async fn fetch(
    conn: &mut dyn Connection,
    sql: &str,
    params: &[SqlValue],
) -> Result<RowSet, ServerError> {
    conn.query(sql, params, usize::MAX).await
}

async fn object_columns(
    conn: &mut dyn Connection,
    schema: &str,
    name: &str,
    table_type: &str,
) -> Result<Vec<ColumnDescriptor>, ServerError> {
    let set = fetch(
        conn,
        OBJECT_COLUMNS,
        &[text(schema), text(name), text(table_type)],
    )
    .await?;

    Ok(set
        .records()
        .map(|r| ColumnDescriptor {
            name: extract_string(&r, "column_name").unwrap_or_default(),
            ordinal_position: extract_i64(&r, "ordinal_position").unwrap_or(0),
            data_type: extract_string(&r, "data_type").unwrap_or_default(),
            max_length: extract_i64(&r, "max_length"),
            numeric_precision: extract_i64(&r, "numeric_precision"),
            numeric_scale: extract_i64(&r, "numeric_scale"),
            is_nullable: extract_bool(&r, "is_nullable").unwrap_or(true),
            default_value: extract_string(&r, "default_value"),
        })
        .collect())
}

fn text(s: &str) -> SqlValue {
    SqlValue::Text(s.to_string())
}

fn extract_string(record: &Record<'_>, column: &str) -> Option<String> {
    match record.get(column)? {
        SqlValue::Text(s) => Some(s.clone()),
        SqlValue::Null => None,
        SqlValue::Int(v) => Some(v.to_string()),
        _ => None,
    }
}

fn extract_i64(record: &Record<'_>, column: &str) -> Option<i64> {
    match record.get(column)? {
        SqlValue::Int(v) => Some(*v),
        SqlValue::Float(v) => Some(*v as i64),
        _ => None,
    }
}

/// Accepts `bit` columns as well as the `'YES'`/`'NO'` text used by
/// INFORMATION_SCHEMA.
fn extract_bool(record: &Record<'_>, column: &str) -> Option<bool> {
    match record.get(column)? {
        SqlValue::Bool(v) => Some(*v),
        SqlValue::Int(v) => Some(*v != 0),
        SqlValue::Text(s) => match s.to_ascii_uppercase().as_str() {
            "YES" | "TRUE" | "1" => Some(true),
            "NO" | "FALSE" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
