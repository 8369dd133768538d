//! Client-side operation core for HoloStore tables.
//!
//! A client builds operations through a shared [`Table`] handle:
//! - row mutations (insert, update, delete) carry a [`PartialRow`],
//! - key-value protocol operations carry a Redis-style command routed by an
//!   explicit hash bucket,
//! - structured-query operations carry a statement whose bound key columns
//!   are copied into the row for routing.
//!
//! Every operation exposes the same batching surface: kind, read-only flag,
//! [`PartitionKey`], buffer cost and the resolved [`RemoteTablet`]. Protocol
//! operations also move their request to the RPC layer and take the response
//! back through a [`PayloadSlot`].

pub mod buffer;
pub mod config;
pub mod error;
pub mod handoff;
pub mod keys;
pub mod op;
pub mod protocol;
pub mod row;
pub mod schema;
pub mod table;
pub mod tablet;
pub mod value;

pub use buffer::{flush_ranges, BufferBudget};
pub use config::ClientOpsConfig;
pub use error::{OpError, OpResult};
pub use handoff::{HandoffState, PayloadSlot};
pub use keys::PartitionKey;
pub use op::{
    OpKind, OpVariant, Operation, OperationSummary, ProtocolOp, QlReadOp, QlWriteOp, RedisReadOp,
    RedisWriteOp, StatementKey,
};
pub use protocol::ql::ConsistencyLevel;
pub use row::PartialRow;
pub use schema::{ColumnKind, ColumnSchema, ColumnType, PartitionSchema, Schema};
pub use table::Table;
pub use tablet::{RemoteTablet, TabletAssignment, TabletMap, TabletRoute};
pub use value::Value;
