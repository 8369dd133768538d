//! Integration tests for row mutations, partition keys, buffering cost and
//! tablet routing through the public `Table` factories.

mod common;

use std::sync::Arc;

use common::{events_table, kv_table, kv_table_with_config};
use holo_client::keys::{encode_hash_code, encode_key, hash_code};
use holo_client::{
    flush_ranges, ClientOpsConfig, OpError, OpKind, PartitionKey, PartitionSchema, RemoteTablet,
    TabletMap, TabletRoute, Value,
};

#[test]
fn factories_tag_kinds_and_read_only_flags() {
    let table = kv_table(PartitionSchema::Hash);
    let ops = [
        table.new_insert(),
        table.new_update().expect("update"),
        table.new_delete(),
        table.new_redis_write().expect("redis write"),
        table.new_redis_read().expect("redis read"),
        table.new_ql_insert(),
        table.new_ql_update().expect("ql update"),
        table.new_ql_delete(),
        table.new_ql_select(),
    ];
    let kinds: Vec<(OpKind, bool)> = ops.iter().map(|op| (op.kind(), op.is_read_only())).collect();
    assert_eq!(
        kinds,
        vec![
            (OpKind::Insert, false),
            (OpKind::Update, false),
            (OpKind::Delete, false),
            (OpKind::RedisWrite, false),
            (OpKind::RedisRead, true),
            (OpKind::QlWrite, false),
            (OpKind::QlWrite, false),
            (OpKind::QlWrite, false),
            (OpKind::QlRead, true),
        ]
    );
    assert!(ops.iter().all(|op| Arc::ptr_eq(op.table(), &table)));
    assert!(ops.iter().all(|op| op.tablet().is_none()));
}

#[test]
fn insert_partition_key_matches_range_encoding() {
    let table = kv_table(PartitionSchema::Range);
    let mut op = table.new_insert();
    op.row_mut().set(0, 5i32).expect("set key");
    op.row_mut().set(1, "a").expect("set val");

    let expected = encode_key([Value::Int32(5)].iter());
    assert_eq!(op.partition_key().expect("key"), PartitionKey::Key(expected));
    assert_eq!(
        op.partition_key().expect("key"),
        op.partition_key().expect("key"),
        "derivation is deterministic"
    );
}

#[test]
fn insert_partition_key_matches_hash_encoding() {
    let table = kv_table(PartitionSchema::Hash);
    let mut op = table.new_insert();
    op.row_mut().set(0, 5i32).expect("set key");

    let code = table.hash_code_for(&[Value::Int32(5)]).expect("hash code");
    assert_eq!(
        op.partition_key().expect("key"),
        PartitionKey::Key(encode_hash_code(code))
    );
    assert_eq!(code, hash_code(&encode_key([Value::Int32(5)].iter())));
}

#[test]
fn partition_key_requires_key_columns() {
    let table = kv_table(PartitionSchema::Range);
    let mut op = table.new_delete();
    op.row_mut().set(1, "orphan").expect("set val");
    let err = op.partition_key().expect_err("key unset");
    assert!(matches!(err, OpError::MissingKey(_)), "err={err}");
    assert!(err.to_string().contains("'key'"), "err={err}");
}

#[test]
fn size_in_buffer_counts_fixed_and_variable_parts() {
    let table = kv_table(PartitionSchema::Range);
    let mut op = table.new_insert();
    let empty = op.size_in_buffer();
    // is-set bitmap + null bitmap + int32 + varlen slot
    assert_eq!(empty, 1 + 1 + 4 + 16);

    op.row_mut().set(0, 5i32).expect("set key");
    assert_eq!(op.size_in_buffer(), empty);
    op.row_mut().set(1, "a").expect("set val");
    assert_eq!(op.size_in_buffer(), empty + "a".len());
}

#[test]
fn size_in_buffer_never_decreases_until_clear() {
    let table = kv_table(PartitionSchema::Range);
    let mut op = table.new_insert();
    let mut last = op.size_in_buffer();
    for val in ["long value here", "x", "", "medium"] {
        op.row_mut().set(1, val).expect("set val");
        let size = op.size_in_buffer();
        assert!(size >= last, "size went from {last} to {size}");
        last = size;
    }
    op.row_mut().set_null(1).expect("set null");
    assert!(op.size_in_buffer() >= last);

    op.row_mut().clear();
    assert_eq!(op.size_in_buffer(), 1 + 1 + 4 + 16);
}

#[test]
fn set_key_round_trips_encoded_primary_key() {
    let table = events_table();
    let mut source = table.new_insert();
    source.row_mut().set(0, "acme").expect("set tenant");
    source.row_mut().set(1, 42i64).expect("set seq");
    let encoded = source.row().encode_primary_key().expect("encode");

    let mut target = table.new_delete();
    target.set_key(&encoded).expect("set key");
    assert_eq!(target.row().get(0), Some(&Value::Utf8("acme".to_string())));
    assert_eq!(target.row().get(1), Some(&Value::Int64(42)));
    assert_eq!(
        target.partition_key().expect("key"),
        source.partition_key().expect("key")
    );
}

#[test]
fn set_key_rejects_bytes_that_do_not_decode() {
    let table = kv_table(PartitionSchema::Range);
    let mut op = table.new_delete();
    assert!(matches!(
        op.set_key(&[0x80, 0x00]),
        Err(OpError::SchemaMismatch(_))
    ));
    assert!(matches!(
        op.set_key(&[0x80, 0, 0, 5, 9]),
        Err(OpError::SchemaMismatch(_))
    ));
    assert!(!op.row().is_set(0));
}

#[test]
fn validate_row_checks_kind_requirements() {
    let table = kv_table(PartitionSchema::Range);

    let mut insert = table.new_insert();
    assert!(matches!(insert.validate_row(), Err(OpError::MissingKey(_))));
    insert.row_mut().set(0, 1i32).expect("set key");
    insert.validate_row().expect("insert with key");

    let mut update = table.new_update().expect("update");
    update.row_mut().set(0, 1i32).expect("set key");
    assert!(matches!(
        update.validate_row(),
        Err(OpError::SchemaMismatch(_))
    ));
    update.row_mut().set(1, "new").expect("set val");
    update.validate_row().expect("update with value");
}

#[test]
fn tablet_map_assigns_single_tablet_and_reports_replacement() {
    let table = kv_table(PartitionSchema::Hash);
    let map = TabletMap::hash_split(table.id(), 4).expect("tablets");
    let mut op = table.new_insert();
    op.row_mut().set(0, 7i32).expect("set key");

    let assignment = map.assign(&mut op).expect("assign");
    assert!(assignment.replaced.is_none());
    let TabletRoute::Single(tablet) = assignment.route else {
        panic!("point write must route to one tablet");
    };
    let key = op.partition_key().expect("key");
    assert!(tablet.contains_key(key.as_bytes().expect("bytes")));
    assert_eq!(op.tablet().map(|t| t.tablet_id.as_str()), Some(tablet.tablet_id.as_str()));

    let stale = Arc::new(RemoteTablet {
        tablet_id: "moved".to_string(),
        ..(*tablet).clone()
    });
    let previous = op.set_tablet(stale).expect("previous tablet");
    assert_eq!(previous.tablet_id, tablet.tablet_id);
    assert_eq!(op.tablet().map(|t| t.tablet_id.as_str()), Some("moved"));

    let reassigned = map.assign(&mut op).expect("reassign");
    assert_eq!(
        reassigned.replaced.map(|t| t.tablet_id.clone()),
        Some("moved".to_string()),
        "assign must hand back the tablet it replaced"
    );
    assert_eq!(op.tablet().map(|t| t.tablet_id.as_str()), Some(tablet.tablet_id.as_str()));
}

#[test]
fn tablet_map_refuses_foreign_operations() {
    let table = kv_table(PartitionSchema::Hash);
    let map = TabletMap::hash_split("some-other-table", 2).expect("tablets");
    let mut op = table.new_insert();
    op.row_mut().set(0, 1i32).expect("set key");
    let err = map.assign(&mut op).expect_err("wrong table");
    assert!(err.is_misuse());
    assert!(op.tablet().is_none());
}

#[test]
fn flush_ranges_split_buffered_operations() {
    let table = kv_table(PartitionSchema::Range);
    let ops: Vec<_> = (0..4i32)
        .map(|key| {
            let mut op = table.new_insert();
            op.row_mut().set(0, key).expect("set key");
            op
        })
        .collect();
    let per_op = ops[0].size_in_buffer();
    assert_eq!(flush_ranges(&ops, 3, per_op * 2), vec![0..2, 2..4]);
}

#[test]
fn summary_serializes_and_redacts() {
    let config = ClientOpsConfig {
        redact_values: true,
        ..ClientOpsConfig::default()
    };
    let table = kv_table_with_config(PartitionSchema::Range, config);
    let mut op = table.new_insert();
    op.row_mut().set(0, 5i32).expect("set key");
    op.row_mut().set(1, "secret").expect("set val");

    let summary = op.summary();
    assert_eq!(summary.kind, OpKind::Insert);
    assert!(!summary.description.contains("secret"));
    assert!(summary.description.contains("<redacted>"));

    let json = serde_json::to_value(&summary).expect("serialize");
    assert_eq!(json["kind"], "Insert");
    assert_eq!(json["table"], "kv");
    assert_eq!(json["read_only"], false);
    assert_eq!(json["size_in_buffer"], 22 + "secret".len());
    assert!(json["payload_state"].is_null());

    let plain = kv_table(PartitionSchema::Range);
    let mut op = plain.new_insert();
    op.row_mut().set(0, 5i32).expect("set key");
    op.row_mut().set(1, "a").expect("set val");
    assert_eq!(op.to_string(), "INSERT (int32 key=5, string val=\"a\")");
}
