//! SQL Server type mapping to a closed set of scalar values.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::borrow::Cow;
use tiberius::{ColumnData, Row, ToSql};

/// A dynamically-typed scalar as it appears in a result row or as a bound
/// parameter.
///
/// Serialized untagged: `null`, booleans, numbers and strings map to their
/// JSON counterparts; binary values become `"0x..."` hex strings and
/// timestamps ISO-8601 strings, so both read back as [`SqlValue::Text`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    #[serde(serialize_with = "serialize_hex")]
    Binary(Vec<u8>),
    Timestamp(NaiveDateTime),
}

impl From<&serde_json::Value> for SqlValue {
    /// Map a JSON argument to a bindable value. Arrays and objects are passed
    /// as their JSON text.
    fn from(value: &serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Int(i),
                None => n.as_f64().map(SqlValue::Float).unwrap_or(SqlValue::Null),
            },
            Value::String(s) => SqlValue::Text(s.clone()),
            other => SqlValue::Text(other.to_string()),
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            SqlValue::Null => ColumnData::String(None),
            SqlValue::Bool(v) => ColumnData::Bit(Some(*v)),
            SqlValue::Int(v) => ColumnData::I64(Some(*v)),
            SqlValue::Float(v) => ColumnData::F64(Some(*v)),
            SqlValue::Text(v) => ColumnData::String(Some(Cow::Borrowed(v.as_str()))),
            SqlValue::Binary(v) => ColumnData::Binary(Some(Cow::Borrowed(v.as_slice()))),
            SqlValue::Timestamp(v) => v.to_sql(),
        }
    }
}

fn serialize_hex<T, S>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: AsRef<[u8]>,
    S: Serializer,
{
    serializer.serialize_str(&format!("0x{}", hex::encode(bytes.as_ref())))
}

/// Type mapper for converting tiberius rows to [`SqlValue`]s.
pub struct TypeMapper;

impl TypeMapper {
    /// Convert every cell of a row, in column order.
    pub fn extract_row(row: &Row) -> Vec<SqlValue> {
        row.cells()
            .enumerate()
            .map(|(idx, (_, data))| Self::extract_cell(row, idx, data))
            .collect()
    }

    fn extract_cell(row: &Row, idx: usize, data: &ColumnData<'static>) -> SqlValue {
        match data {
            ColumnData::Bit(Some(v)) => SqlValue::Bool(*v),
            ColumnData::U8(Some(v)) => SqlValue::Int(i64::from(*v)),
            ColumnData::I16(Some(v)) => SqlValue::Int(i64::from(*v)),
            ColumnData::I32(Some(v)) => SqlValue::Int(i64::from(*v)),
            ColumnData::I64(Some(v)) => SqlValue::Int(*v),
            ColumnData::F32(Some(v)) => SqlValue::Float(f64::from(*v)),
            ColumnData::F64(Some(v)) => SqlValue::Float(*v),
            ColumnData::Numeric(Some(n)) => {
                SqlValue::Float(n.value() as f64 / 10f64.powi(i32::from(n.scale())))
            }
            ColumnData::String(Some(s)) => SqlValue::Text(s.to_string()),
            ColumnData::Guid(Some(g)) => SqlValue::Text(g.to_string()),
            ColumnData::Binary(Some(b)) => SqlValue::Binary(b.to_vec()),
            ColumnData::Xml(Some(xml)) => SqlValue::Text(xml.to_string()),
            // Date/time types go through chrono via typed getters
            ColumnData::DateTime(Some(_))
            | ColumnData::SmallDateTime(Some(_))
            | ColumnData::DateTime2(Some(_)) => row
                .try_get::<NaiveDateTime, _>(idx)
                .ok()
                .flatten()
                .map(SqlValue::Timestamp)
                .unwrap_or(SqlValue::Null),
            ColumnData::DateTimeOffset(Some(_)) => row
                .try_get::<DateTime<Utc>, _>(idx)
                .ok()
                .flatten()
                .map(|dt| SqlValue::Timestamp(dt.naive_utc()))
                .unwrap_or(SqlValue::Null),
            ColumnData::Date(Some(_)) => row
                .try_get::<NaiveDate, _>(idx)
                .ok()
                .flatten()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(SqlValue::Timestamp)
                .unwrap_or(SqlValue::Null),
            ColumnData::Time(Some(_)) => row
                .try_get::<NaiveTime, _>(idx)
                .ok()
                .flatten()
                .map(|t| SqlValue::Text(t.format("%H:%M:%S%.f").to_string()))
                .unwrap_or(SqlValue::Null),
            // All None variants
            _ => SqlValue::Null,
        }
    }
}

/// Hex encoding helper (minimal implementation to avoid extra dependency).
mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02X}", b)).collect()
    }
}
