//! Shared table handle and the only constructors for operations.
//!
//! A `Table` is held behind an `Arc`; every operation keeps a strong reference,
//! so the caller may drop its own handle while operations are still in flight.

use std::sync::Arc;

use tracing::debug;

use crate::config::ClientOpsConfig;
use crate::error::{OpError, OpResult};
use crate::keys::{encode_hash_code, encode_key, hash_code};
use crate::op::{OpVariant, Operation, QlReadOp, QlWriteOp, RedisReadOp, RedisWriteOp};
use crate::protocol::ql::QlStatementType;
use crate::row::PartialRow;
use crate::schema::{PartitionSchema, Schema};
use crate::value::Value;

#[derive(Debug)]
pub struct Table {
    id: String,
    name: String,
    schema: Arc<Schema>,
    partition_schema: PartitionSchema,
    config: Arc<ClientOpsConfig>,
}

impl Table {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        schema: Schema,
        partition_schema: PartitionSchema,
        config: Arc<ClientOpsConfig>,
    ) -> OpResult<Arc<Self>> {
        let id = id.into();
        let name = name.into();
        if id.trim().is_empty() {
            return Err(OpError::schema(format!("table '{name}' has an empty id")));
        }
        partition_schema.validate(&schema)?;
        Ok(Arc::new(Self {
            id,
            name,
            schema: Arc::new(schema),
            partition_schema,
            config,
        }))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn partition_schema(&self) -> PartitionSchema {
        self.partition_schema
    }

    pub fn config(&self) -> &ClientOpsConfig {
        &self.config
    }

    pub fn new_row(&self) -> PartialRow {
        PartialRow::new(self.schema.clone())
    }

    /// Encodes the partition key of `row` under this table's partition schema.
    pub fn partition_key_for_row(&self, row: &PartialRow) -> OpResult<Vec<u8>> {
        match self.partition_schema {
            PartitionSchema::Hash => Ok(encode_hash_code(hash_code(&row.encode_hash_key()?))),
            PartitionSchema::Range => row.encode_primary_key(),
        }
    }

    /// Hash code for a full set of hash key values, in hash column order.
    pub fn hash_code_for(&self, hash_values: &[Value]) -> OpResult<u16> {
        let expected = self.schema.num_hash_key_columns();
        if hash_values.len() != expected {
            return Err(OpError::schema(format!(
                "table '{}' has {expected} hash key columns, got {} values",
                self.name,
                hash_values.len()
            )));
        }
        for (idx, value) in hash_values.iter().enumerate() {
            let column = self.schema.column(idx)?;
            if value.column_type() != column.column_type {
                return Err(OpError::schema(format!(
                    "hash column '{}' has type {} but value has type {}",
                    column.name,
                    column.column_type,
                    value.column_type()
                )));
            }
        }
        Ok(hash_code(&encode_key(hash_values.iter())))
    }

    pub fn new_insert(self: &Arc<Self>) -> Operation {
        self.build(OpVariant::Insert)
    }

    /// Fails when the schema has no non-key column to update.
    pub fn new_update(self: &Arc<Self>) -> OpResult<Operation> {
        self.require_non_key_column("update")?;
        Ok(self.build(OpVariant::Update))
    }

    pub fn new_delete(self: &Arc<Self>) -> Operation {
        self.build(OpVariant::Delete)
    }

    pub fn new_redis_write(self: &Arc<Self>) -> OpResult<Operation> {
        self.require_hash_partitioning("redis write")?;
        Ok(self.build(OpVariant::RedisWrite(RedisWriteOp::new())))
    }

    pub fn new_redis_read(self: &Arc<Self>) -> OpResult<Operation> {
        self.require_hash_partitioning("redis read")?;
        Ok(self.build(OpVariant::RedisRead(RedisReadOp::new())))
    }

    pub fn new_ql_insert(self: &Arc<Self>) -> Operation {
        self.build(OpVariant::QlWrite(QlWriteOp::new(QlStatementType::Insert)))
    }

    pub fn new_ql_update(self: &Arc<Self>) -> OpResult<Operation> {
        self.require_non_key_column("ql update")?;
        Ok(self.build(OpVariant::QlWrite(QlWriteOp::new(QlStatementType::Update))))
    }

    pub fn new_ql_delete(self: &Arc<Self>) -> Operation {
        self.build(OpVariant::QlWrite(QlWriteOp::new(QlStatementType::Delete)))
    }

    pub fn new_ql_select(self: &Arc<Self>) -> Operation {
        let consistency = self.config.default_read_consistency;
        self.build(OpVariant::QlRead(QlReadOp::new(consistency)))
    }

    fn build(self: &Arc<Self>, variant: OpVariant) -> Operation {
        let op = Operation::new(self.clone(), variant);
        debug!(table = %self.name, kind = %op.kind(), "built operation");
        op
    }

    fn require_non_key_column(&self, what: &str) -> OpResult<()> {
        if self.schema.num_columns() == self.schema.num_key_columns() {
            return Err(OpError::UnsupportedOperation(format!(
                "{what} on table '{}' requires at least one non-key column",
                self.name
            )));
        }
        Ok(())
    }

    fn require_hash_partitioning(&self, what: &str) -> OpResult<()> {
        if self.partition_schema != PartitionSchema::Hash {
            return Err(OpError::UnsupportedOperation(format!(
                "{what} requires hash partitioning but table '{}' is range partitioned",
                self.name
            )));
        }
        Ok(())
    }
}
