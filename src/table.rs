use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// ClickHouse type name as reported by the server, e.g. `UInt64` or `Array(Float64)`.
    #[serde(rename = "type")]
    pub type_name: String,
}

impl Column {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Rows of one query result in server order. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct JsonCompactResponse {
    meta: Vec<Column>,
    data: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Decodes a `FORMAT JSONCompact` response body.
    pub fn from_json_compact(body: &[u8]) -> Result<Self> {
        let response: JsonCompactResponse = serde_json::from_slice(body)?;
        if let Some(row) = response
            .data
            .iter()
            .find(|row| row.len() != response.meta.len())
        {
            return Err(Error::column(
                "*",
                format!(
                    "row has {} values for {} columns",
                    row.len(),
                    response.meta.len()
                ),
            ));
        }
        Ok(Self::new(response.meta, response.data))
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)
    }

    pub fn u64(&self, row: usize, column: &str) -> Result<u64> {
        let value = self
            .value(row, column)
            .ok_or_else(|| Error::column(column, format!("missing in row {row}")))?;
        value_as_u64(value)
            .ok_or_else(|| Error::column(column, format!("not an unsigned integer: {value}")))
    }

    pub fn str(&self, row: usize, column: &str) -> Result<&str> {
        let value = self
            .value(row, column)
            .ok_or_else(|| Error::column(column, format!("missing in row {row}")))?;
        value
            .as_str()
            .ok_or_else(|| Error::column(column, format!("not a string: {value}")))
    }

    /// Row `row` as a JSON object keyed by column name.
    pub fn row_object(&self, row: usize) -> Option<Map<String, Value>> {
        let values = self.rows.get(row)?;
        Some(
            self.columns
                .iter()
                .zip(values)
                .map(|(column, value)| (column.name.clone(), value.clone()))
                .collect(),
        )
    }

    pub fn row_objects(&self) -> impl Iterator<Item = Map<String, Value>> + '_ {
        (0..self.rows.len()).filter_map(|row| self.row_object(row))
    }
}

/// 64-bit integers may arrive quoted when the server ignores the unquoted-output setting.
pub(crate) fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(raw) => raw.parse().ok(),
        _ => None,
    }
}

pub(crate) fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.parse().ok(),
        _ => None,
    }
}
