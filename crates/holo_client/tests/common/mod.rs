//! Shared table fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use holo_client::{ClientOpsConfig, ColumnSchema, ColumnType, PartitionSchema, Schema, Table};

/// `T(key:int32, val:utf8)` with `key` as the only key column.
pub fn kv_table(partition_schema: PartitionSchema) -> Arc<Table> {
    kv_table_with_config(partition_schema, ClientOpsConfig::default())
}

pub fn kv_table_with_config(
    partition_schema: PartitionSchema,
    config: ClientOpsConfig,
) -> Arc<Table> {
    let key = match partition_schema {
        PartitionSchema::Hash => ColumnSchema::new("key", ColumnType::Int32).hash_key(),
        PartitionSchema::Range => ColumnSchema::new("key", ColumnType::Int32).range_key(),
    };
    let schema = Schema::new(vec![key, ColumnSchema::new("val", ColumnType::Utf8)])
        .expect("valid schema");
    Table::new("tbl-kv", "kv", schema, partition_schema, Arc::new(config)).expect("valid table")
}

/// `events(tenant:utf8 hash, seq:int64 range, body:binary)`.
pub fn events_table() -> Arc<Table> {
    let schema = Schema::new(vec![
        ColumnSchema::new("tenant", ColumnType::Utf8).hash_key(),
        ColumnSchema::new("seq", ColumnType::Int64).range_key(),
        ColumnSchema::new("body", ColumnType::Binary),
    ])
    .expect("valid schema");
    Table::new(
        "tbl-events",
        "events",
        schema,
        PartitionSchema::Hash,
        Arc::new(ClientOpsConfig::default()),
    )
    .expect("valid table")
}
