//! Sparse, schema-bound row owned by exactly one operation.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::error::{OpError, OpResult};
use crate::keys::{decode_key, encode_key};
use crate::schema::Schema;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Unset,
    Null,
    Value(Value),
}

/// A row where each column is either unset, explicitly null, or set to a value
/// of the column's type.
///
/// Variable-length values are accounted as copied into an indirect arena that
/// only shrinks on [`PartialRow::clear`], so [`PartialRow::indirect_size`] never
/// decreases while columns are being populated.
#[derive(Debug)]
pub struct PartialRow {
    schema: Arc<Schema>,
    cells: Vec<Cell>,
    indirect_bytes: usize,
}

impl PartialRow {
    pub fn new(schema: Arc<Schema>) -> Self {
        let cells = vec![Cell::Unset; schema.num_columns()];
        Self {
            schema,
            cells,
            indirect_bytes: 0,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Sets column `idx`; the value type must match the column type exactly.
    pub fn set(&mut self, idx: usize, value: impl Into<Value>) -> OpResult<()> {
        let value = value.into();
        let column = self.schema.column(idx)?;
        if value.column_type() != column.column_type {
            return Err(OpError::schema(format!(
                "column '{}' has type {} but value has type {}",
                column.name,
                column.column_type,
                value.column_type()
            )));
        }
        self.indirect_bytes = self.indirect_bytes.saturating_add(value.indirect_len());
        self.cells[idx] = Cell::Value(value);
        Ok(())
    }

    pub fn set_by_name(&mut self, name: &str, value: impl Into<Value>) -> OpResult<()> {
        let idx = self.schema.find_column(name)?;
        self.set(idx, value)
    }

    pub fn set_null(&mut self, idx: usize) -> OpResult<()> {
        let column = self.schema.column(idx)?;
        if !column.nullable {
            return Err(OpError::schema(format!(
                "column '{}' is not nullable",
                column.name
            )));
        }
        self.cells[idx] = Cell::Null;
        Ok(())
    }

    pub fn unset(&mut self, idx: usize) -> OpResult<()> {
        self.schema.column(idx)?;
        self.cells[idx] = Cell::Unset;
        Ok(())
    }

    /// Resets every column to unset and releases the indirect arena.
    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(|cell| *cell = Cell::Unset);
        self.indirect_bytes = 0;
    }

    pub fn is_set(&self, idx: usize) -> bool {
        matches!(self.cells.get(idx), Some(Cell::Value(_) | Cell::Null))
    }

    pub fn is_null(&self, idx: usize) -> bool {
        matches!(self.cells.get(idx), Some(Cell::Null))
    }

    /// Returns the value at `idx`, or `None` when unset, null or out of range.
    pub fn get(&self, idx: usize) -> Option<&Value> {
        match self.cells.get(idx) {
            Some(Cell::Value(value)) => Some(value),
            _ => None,
        }
    }

    pub fn is_key_set(&self) -> bool {
        self.schema.key_columns().all(|idx| self.is_set(idx))
    }

    pub fn is_hash_key_set(&self) -> bool {
        self.schema.num_hash_key_columns() > 0
            && self.schema.hash_key_columns().all(|idx| self.is_set(idx))
    }

    pub fn has_non_key_set(&self) -> bool {
        (self.schema.num_key_columns()..self.schema.num_columns()).any(|idx| self.is_set(idx))
    }

    pub fn num_set_columns(&self) -> usize {
        (0..self.cells.len()).filter(|idx| self.is_set(*idx)).count()
    }

    pub fn direct_size(&self) -> usize {
        self.schema.direct_row_size()
    }

    pub fn indirect_size(&self) -> usize {
        self.indirect_bytes
    }

    /// Encodes every key column; fails naming the first unset key column.
    pub fn encode_primary_key(&self) -> OpResult<Vec<u8>> {
        self.encode_columns(self.schema.key_columns())
    }

    /// Encodes the hash key columns only.
    pub fn encode_hash_key(&self) -> OpResult<Vec<u8>> {
        self.encode_columns(self.schema.hash_key_columns())
    }

    fn encode_columns(&self, columns: Range<usize>) -> OpResult<Vec<u8>> {
        let mut values = Vec::with_capacity(columns.len());
        for idx in columns {
            match self.get(idx) {
                Some(value) => values.push(value),
                None => {
                    let column = self.schema.column(idx)?;
                    return Err(OpError::missing_key(format!(
                        "key column '{}' is not set",
                        column.name
                    )));
                }
            }
        }
        Ok(encode_key(values))
    }

    /// Decodes an encoded primary key and sets the key columns from it.
    pub fn set_encoded_primary_key(&mut self, encoded: &[u8]) -> OpResult<()> {
        let values = decode_key(&self.schema, self.schema.key_columns(), encoded)?;
        for (idx, value) in values.into_iter().enumerate() {
            self.set(idx, value)?;
        }
        Ok(())
    }

    /// Renders the row with every value replaced by `<redacted>`.
    pub fn to_string_redacted(&self) -> String {
        self.render(true)
    }

    fn render(&self, redact: bool) -> String {
        let mut parts = Vec::new();
        for (column, cell) in self.schema.columns().iter().zip(&self.cells) {
            let rendered = match cell {
                Cell::Unset => continue,
                Cell::Null => "NULL".to_string(),
                Cell::Value(_) if redact => "<redacted>".to_string(),
                Cell::Value(value) => value.to_string(),
            };
            parts.push(format!("{} {}={}", column.column_type, column.name, rendered));
        }
        format!("({})", parts.join(", "))
    }
}

impl fmt::Display for PartialRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}
