//! Structured-query (QL) request and response payloads.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Read consistency requested for a QL select.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyLevel {
    /// Served by the tablet leader.
    #[default]
    Strong,
    /// May be served by any replica with a consistent prefix of the log.
    ConsistentPrefix,
}

impl FromStr for ConsistencyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strong" => Ok(Self::Strong),
            "consistent_prefix" | "consistent-prefix" => Ok(Self::ConsistentPrefix),
            other => Err(format!("unknown consistency level '{other}'")),
        }
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strong => f.write_str("strong"),
            Self::ConsistentPrefix => f.write_str("consistent_prefix"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QlStatementType {
    Insert,
    Update,
    Delete,
}

impl QlStatementType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

/// A value bound to a column position; `None` binds SQL NULL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QlColumnValue {
    pub column_index: usize,
    pub value: Option<Value>,
}

impl QlColumnValue {
    pub fn new(column_index: usize, value: impl Into<Value>) -> Self {
        Self {
            column_index,
            value: Some(value.into()),
        }
    }

    pub fn null(column_index: usize) -> Self {
        Self {
            column_index,
            value: None,
        }
    }
}

/// Last binding for `column_index`, if any.
pub(crate) fn bound_value(values: &[QlColumnValue], column_index: usize) -> Option<&QlColumnValue> {
    values
        .iter()
        .rev()
        .find(|bound| bound.column_index == column_index)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QlWriteRequest {
    pub statement_type: QlStatementType,
    pub schema_version: u32,
    /// Hash bucket of the bound hash key; written by `set_hash_code`.
    pub hash_code: Option<u16>,
    pub hashed_column_values: Vec<QlColumnValue>,
    pub range_column_values: Vec<QlColumnValue>,
    /// Non-key assignments (`SET col = ...` / inserted values).
    pub column_values: Vec<QlColumnValue>,
    pub ttl_ms: Option<u64>,
}

impl QlWriteRequest {
    pub fn new(statement_type: QlStatementType) -> Self {
        Self {
            statement_type,
            schema_version: 0,
            hash_code: None,
            hashed_column_values: Vec::new(),
            range_column_values: Vec::new(),
            column_values: Vec::new(),
            ttl_ms: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QlReadRequest {
    pub schema_version: u32,
    /// Explicit hash bucket; takes precedence over the row key for routing.
    pub hash_code: Option<u16>,
    pub hashed_column_values: Vec<QlColumnValue>,
    pub range_column_values: Vec<QlColumnValue>,
    /// Column positions to return; empty selects every column.
    pub selected_columns: Vec<usize>,
    pub limit: Option<u64>,
    pub paging_state: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QlResponseStatus {
    #[default]
    Ok,
    SchemaVersionMismatch,
    RuntimeError,
    UsageError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QlResponse {
    pub status: QlResponseStatus,
    pub error_message: Option<String>,
    /// Resume token when the result was truncated by `limit` or page size.
    pub paging_state: Option<Vec<u8>>,
}

impl QlResponse {
    pub fn is_ok(&self) -> bool {
        self.status == QlResponseStatus::Ok
    }
}
