//! Table schema and partition scheme consumed by rows and operations.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{OpError, OpResult};

/// Bytes occupied by a variable-length cell inside the fixed row area.
pub const VARLEN_SLOT_WIDTH: usize = 16;

/// Physical column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Int8,
    Int16,
    Int32,
    Int64,
    Float64,
    Bool,
    Utf8,
    Binary,
    TimestampNanos,
}

impl ColumnType {
    /// Width of this type's cell in the fixed (direct) row area.
    pub const fn fixed_width(self) -> usize {
        match self {
            Self::Int8 | Self::Bool => 1,
            Self::Int16 => 2,
            Self::Int32 => 4,
            Self::Int64 | Self::Float64 | Self::TimestampNanos => 8,
            Self::Utf8 | Self::Binary => VARLEN_SLOT_WIDTH,
        }
    }

    pub const fn is_variable_length(self) -> bool {
        matches!(self, Self::Utf8 | Self::Binary)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float64 => "double",
            Self::Bool => "bool",
            Self::Utf8 => "string",
            Self::Binary => "binary",
            Self::TimestampNanos => "timestamp",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Role a column plays in the primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Part of the hashed key prefix; determines the hash code.
    HashKey,
    /// Part of the clustering (range) key.
    RangeKey,
    Regular,
}

/// One column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub kind: ColumnKind,
}

impl ColumnSchema {
    /// Creates a nullable regular column.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            kind: ColumnKind::Regular,
        }
    }

    /// Marks the column as a hash key column (implies not null).
    pub fn hash_key(mut self) -> Self {
        self.kind = ColumnKind::HashKey;
        self.nullable = false;
        self
    }

    /// Marks the column as a range key column (implies not null).
    pub fn range_key(mut self) -> Self {
        self.kind = ColumnKind::RangeKey;
        self.nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn is_key(&self) -> bool {
        !matches!(self.kind, ColumnKind::Regular)
    }
}

/// Validated, immutable column layout of a table.
///
/// Key columns form a prefix of the column list with hash key columns before
/// range key columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<ColumnSchema>,
    num_hash_key_columns: usize,
    num_key_columns: usize,
    has_nullable_columns: bool,
    by_name: HashMap<String, usize>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnSchema>) -> OpResult<Self> {
        if columns.is_empty() {
            return Err(OpError::schema("schema has no columns"));
        }

        let mut by_name = HashMap::with_capacity(columns.len());
        let mut num_hash_key_columns = 0usize;
        let mut num_key_columns = 0usize;
        let mut seen_range = false;
        let mut seen_regular = false;

        for (idx, column) in columns.iter().enumerate() {
            if column.name.trim().is_empty() {
                return Err(OpError::schema(format!("column {idx} has an empty name")));
            }
            if by_name.insert(column.name.clone(), idx).is_some() {
                return Err(OpError::schema(format!(
                    "duplicate column name '{}'",
                    column.name
                )));
            }
            match column.kind {
                ColumnKind::HashKey => {
                    if seen_range || seen_regular {
                        return Err(OpError::schema(format!(
                            "hash key column '{}' must precede range key and regular columns",
                            column.name
                        )));
                    }
                    num_hash_key_columns += 1;
                    num_key_columns += 1;
                }
                ColumnKind::RangeKey => {
                    if seen_regular {
                        return Err(OpError::schema(format!(
                            "range key column '{}' must precede regular columns",
                            column.name
                        )));
                    }
                    seen_range = true;
                    num_key_columns += 1;
                }
                ColumnKind::Regular => seen_regular = true,
            }
            if column.is_key() && column.nullable {
                return Err(OpError::schema(format!(
                    "key column '{}' cannot be nullable",
                    column.name
                )));
            }
        }

        if num_key_columns == 0 {
            return Err(OpError::schema("schema has no key columns"));
        }

        let has_nullable_columns = columns.iter().any(|column| column.nullable);
        Ok(Self {
            columns,
            num_hash_key_columns,
            num_key_columns,
            has_nullable_columns,
            by_name,
        })
    }

    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, idx: usize) -> OpResult<&ColumnSchema> {
        self.columns.get(idx).ok_or_else(|| {
            OpError::InvalidColumn(format!(
                "column index {idx} out of range (schema has {} columns)",
                self.columns.len()
            ))
        })
    }

    pub fn find_column(&self, name: &str) -> OpResult<usize> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| OpError::InvalidColumn(format!("no column named '{name}'")))
    }

    pub fn num_key_columns(&self) -> usize {
        self.num_key_columns
    }

    pub fn num_hash_key_columns(&self) -> usize {
        self.num_hash_key_columns
    }

    pub fn num_range_key_columns(&self) -> usize {
        self.num_key_columns - self.num_hash_key_columns
    }

    pub fn key_columns(&self) -> Range<usize> {
        0..self.num_key_columns
    }

    pub fn hash_key_columns(&self) -> Range<usize> {
        0..self.num_hash_key_columns
    }

    pub fn is_key_column(&self, idx: usize) -> bool {
        idx < self.num_key_columns
    }

    pub fn has_nullable_columns(&self) -> bool {
        self.has_nullable_columns
    }

    /// Size of the fixed row area: is-set bitmap, optional null bitmap, cells.
    pub fn direct_row_size(&self) -> usize {
        let bitmap = bitmap_bytes(self.columns.len());
        let null_bitmap = if self.has_nullable_columns { bitmap } else { 0 };
        let cells: usize = self
            .columns
            .iter()
            .map(|column| column.column_type.fixed_width())
            .sum();
        bitmap + null_bitmap + cells
    }
}

/// How a table's rows are mapped to tablets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionSchema {
    /// Partition key is the 16-bit hash code of the hash key columns.
    Hash,
    /// Partition key is the order-preserving encoding of every key column.
    Range,
}

impl PartitionSchema {
    pub(crate) fn validate(self, schema: &Schema) -> OpResult<()> {
        if self == Self::Hash && schema.num_hash_key_columns() == 0 {
            return Err(OpError::schema(
                "hash partitioning requires at least one hash key column",
            ));
        }
        Ok(())
    }
}

fn bitmap_bytes(bits: usize) -> usize {
    bits.div_ceil(8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_counts_key_prefix() {
        let schema = Schema::new(vec![
            ColumnSchema::new("h", ColumnType::Int64).hash_key(),
            ColumnSchema::new("r", ColumnType::Utf8).range_key(),
            ColumnSchema::new("v", ColumnType::Binary),
        ])
        .expect("valid schema");
        assert_eq!(schema.num_key_columns(), 2);
        assert_eq!(schema.num_hash_key_columns(), 1);
        assert_eq!(schema.num_range_key_columns(), 1);
        assert!(schema.is_key_column(1));
        assert!(!schema.is_key_column(2));
        assert_eq!(schema.find_column("v").expect("find v"), 2);
    }

    #[test]
    fn schema_rejects_key_after_regular_column() {
        let err = Schema::new(vec![
            ColumnSchema::new("v", ColumnType::Int32),
            ColumnSchema::new("k", ColumnType::Int32).range_key(),
        ])
        .expect_err("key after regular must fail");
        assert!(matches!(err, OpError::SchemaMismatch(_)), "err={err}");
    }

    #[test]
    fn schema_rejects_nullable_key_and_duplicates() {
        let mut key = ColumnSchema::new("k", ColumnType::Int32).hash_key();
        key.nullable = true;
        assert!(Schema::new(vec![key]).is_err());

        assert!(Schema::new(vec![
            ColumnSchema::new("k", ColumnType::Int32).hash_key(),
            ColumnSchema::new("k", ColumnType::Int32),
        ])
        .is_err());

        assert!(Schema::new(vec![ColumnSchema::new("v", ColumnType::Int32)]).is_err());
    }

    #[test]
    fn direct_row_size_counts_bitmaps_and_cells() {
        let schema = Schema::new(vec![
            ColumnSchema::new("key", ColumnType::Int32).range_key(),
            ColumnSchema::new("val", ColumnType::Utf8),
        ])
        .expect("valid schema");
        // isset bitmap (1) + null bitmap (1) + int32 (4) + string slot (16)
        assert_eq!(schema.direct_row_size(), 22);

        let not_null = Schema::new(vec![ColumnSchema::new("key", ColumnType::Int64).hash_key()])
            .expect("valid schema");
        assert_eq!(not_null.direct_row_size(), 1 + 8);
    }

    #[test]
    fn hash_partitioning_needs_hash_columns() {
        let schema = Schema::new(vec![ColumnSchema::new("k", ColumnType::Int32).range_key()])
            .expect("valid schema");
        assert!(PartitionSchema::Hash.validate(&schema).is_err());
        assert!(PartitionSchema::Range.validate(&schema).is_ok());
    }
}
