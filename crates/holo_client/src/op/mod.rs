//! Operations submitted against a sharded table.
//!
//! Every operation owns one row and holds a strong reference to its table.
//! The kind-specific state lives in [`OpVariant`]; the batching layer only needs
//! the uniform surface on [`Operation`]: kind, read-only flag, partition key,
//! buffering cost and the tablet slot.

mod ql;
mod redis;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::error::{OpError, OpResult};
use crate::handoff::{HandoffState, PayloadSlot};
use crate::keys::PartitionKey;
use crate::protocol::redis::{RedisReadCommand, RedisWriteCommand};
use crate::row::PartialRow;
use crate::table::Table;
use crate::tablet::RemoteTablet;

pub use ql::{QlReadOp, QlWriteOp, StatementKey};
pub use redis::{RedisReadOp, RedisWriteOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OpKind {
    Insert,
    Update,
    Delete,
    RedisWrite,
    RedisRead,
    QlWrite,
    QlRead,
}

impl OpKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::RedisWrite => "REDIS_WRITE",
            Self::RedisRead => "REDIS_READ",
            Self::QlWrite => "QL_WRITE",
            Self::QlRead => "QL_READ",
        }
    }

    /// Reads take the read RPC path; everything else is a write.
    pub const fn is_read_only(self) -> bool {
        matches!(self, Self::RedisRead | Self::QlRead)
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind tag plus the kind-specific payload.
#[derive(Debug)]
pub enum OpVariant {
    Insert,
    Update,
    Delete,
    RedisWrite(RedisWriteOp),
    RedisRead(RedisReadOp),
    QlWrite(QlWriteOp),
    QlRead(QlReadOp),
}

impl OpVariant {
    pub fn kind(&self) -> OpKind {
        match self {
            Self::Insert => OpKind::Insert,
            Self::Update => OpKind::Update,
            Self::Delete => OpKind::Delete,
            Self::RedisWrite(_) => OpKind::RedisWrite,
            Self::RedisRead(_) => OpKind::RedisRead,
            Self::QlWrite(_) => OpKind::QlWrite,
            Self::QlRead(_) => OpKind::QlRead,
        }
    }

    fn payload_state(&self) -> Option<HandoffState> {
        match self {
            Self::Insert | Self::Update | Self::Delete => None,
            Self::RedisWrite(op) => Some(op.state()),
            Self::RedisRead(op) => Some(op.state()),
            Self::QlWrite(op) => Some(op.state()),
            Self::QlRead(op) => Some(op.state()),
        }
    }
}

/// Uniform access to a protocol operation's request/response handoff.
pub trait ProtocolOp {
    type Request;
    type Response;

    fn payload(&self) -> &PayloadSlot<Self::Request, Self::Response>;
    fn payload_mut(&mut self) -> &mut PayloadSlot<Self::Request, Self::Response>;

    fn state(&self) -> HandoffState {
        self.payload().state()
    }

    fn request(&self) -> OpResult<&Self::Request> {
        self.payload().request()
    }

    fn request_mut(&mut self) -> OpResult<&mut Self::Request> {
        self.payload_mut().request_mut()
    }

    fn take_request(&mut self) -> OpResult<Self::Request> {
        self.payload_mut().take_request()
    }

    fn restore_request(&mut self, request: Self::Request) -> OpResult<()> {
        self.payload_mut().restore_request(request)
    }

    fn complete(&mut self, request: Self::Request, response: Self::Response) -> OpResult<()> {
        self.payload_mut().complete(request, response)
    }

    fn has_response(&self) -> bool {
        self.payload().has_response()
    }

    fn response(&self) -> OpResult<&Self::Response> {
        self.payload().response()
    }

    fn response_mut(&mut self) -> OpResult<&mut Self::Response> {
        self.payload_mut().response_mut()
    }
}

/// Serializable snapshot of an operation for logs and diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct OperationSummary {
    pub kind: OpKind,
    pub table: String,
    pub read_only: bool,
    pub size_in_buffer: usize,
    pub tablet_id: Option<String>,
    pub payload_state: Option<HandoffState>,
    pub description: String,
}

/// One operation against one table. Built only by [`Table`] factories.
#[derive(Debug)]
pub struct Operation {
    table: Arc<Table>,
    row: PartialRow,
    tablet: Option<Arc<RemoteTablet>>,
    variant: OpVariant,
}

macro_rules! variant_accessors {
    ($get:ident, $get_mut:ident, $variant:ident, $ty:ty) => {
        pub fn $get(&self) -> OpResult<&$ty> {
            match &self.variant {
                OpVariant::$variant(op) => Ok(op),
                other => Err(wrong_kind(other.kind(), OpKind::$variant)),
            }
        }

        pub fn $get_mut(&mut self) -> OpResult<&mut $ty> {
            match &mut self.variant {
                OpVariant::$variant(op) => Ok(op),
                other => Err(wrong_kind(other.kind(), OpKind::$variant)),
            }
        }
    };
}

fn wrong_kind(actual: OpKind, wanted: OpKind) -> OpError {
    OpError::misuse(format!("{actual} operation accessed as {wanted}"))
}

impl Operation {
    pub(crate) fn new(table: Arc<Table>, variant: OpVariant) -> Self {
        let row = table.new_row();
        Self {
            table,
            row,
            tablet: None,
            variant,
        }
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    pub fn row(&self) -> &PartialRow {
        &self.row
    }

    pub fn row_mut(&mut self) -> &mut PartialRow {
        &mut self.row
    }

    pub fn kind(&self) -> OpKind {
        self.variant.kind()
    }

    pub fn is_read_only(&self) -> bool {
        self.kind().is_read_only()
    }

    pub fn variant(&self) -> &OpVariant {
        &self.variant
    }

    variant_accessors!(redis_write, redis_write_mut, RedisWrite, RedisWriteOp);
    variant_accessors!(redis_read, redis_read_mut, RedisRead, RedisReadOp);
    variant_accessors!(ql_write, ql_write_mut, QlWrite, QlWriteOp);
    variant_accessors!(ql_read, ql_read_mut, QlRead, QlReadOp);

    /// Decodes an encoded primary key and writes the key columns of the row.
    pub fn set_key(&mut self, encoded: &[u8]) -> OpResult<()> {
        self.row.set_encoded_primary_key(encoded)
    }

    /// Copies the statement's bound key values into the row.
    ///
    /// A QL write fails when any key column is unbound. A QL read returns
    /// [`StatementKey::Scatter`] and leaves the row untouched unless every key
    /// column is bound. Other kinds have no statement and are refused.
    pub fn set_key_from_statement(&mut self) -> OpResult<StatementKey> {
        match &self.variant {
            OpVariant::QlWrite(op) => op.bind_key(&mut self.row),
            OpVariant::QlRead(op) => op.bind_key(&mut self.row),
            other => Err(OpError::misuse(format!(
                "{} operation has no statement to bind a key from",
                other.kind()
            ))),
        }
    }

    /// Sets the explicit hash bucket on the request.
    ///
    /// A no-op for row mutations, whose sharding derives from key columns.
    /// Last write wins. Fails once the request has been handed off.
    pub fn set_hash_code(&mut self, hash_code: u16) -> OpResult<()> {
        match &mut self.variant {
            OpVariant::Insert | OpVariant::Update | OpVariant::Delete => Ok(()),
            OpVariant::RedisWrite(op) => op.set_hash_code(hash_code),
            OpVariant::RedisRead(op) => op.set_hash_code(hash_code),
            OpVariant::QlWrite(op) => op.set_hash_code(hash_code),
            OpVariant::QlRead(op) => op.set_hash_code(hash_code),
        }
    }

    /// Routing token for this operation.
    ///
    /// Row mutations and QL writes encode the row's key under the table's
    /// partition schema. Redis kinds return their explicit hash bucket. A QL
    /// read returns its explicit bucket, else the row key when one is bound,
    /// else [`PartitionKey::FullScan`].
    pub fn partition_key(&self) -> OpResult<PartitionKey> {
        match &self.variant {
            OpVariant::Insert | OpVariant::Update | OpVariant::Delete | OpVariant::QlWrite(_) => {
                Ok(PartitionKey::Key(self.table.partition_key_for_row(&self.row)?))
            }
            OpVariant::RedisWrite(op) => explicit_hash_key(op.hash_code()?),
            OpVariant::RedisRead(op) => explicit_hash_key(op.hash_code()?),
            OpVariant::QlRead(op) => {
                if let Some(hash_code) = op.hash_code()? {
                    return Ok(PartitionKey::from_hash_code(hash_code));
                }
                match self.table.partition_key_for_row(&self.row) {
                    Ok(key) => Ok(PartitionKey::Key(key)),
                    Err(OpError::MissingKey(_)) => Ok(PartitionKey::FullScan),
                    Err(err) => Err(err),
                }
            }
        }
    }

    /// Bytes needed to buffer this operation: row direct plus indirect size.
    pub fn size_in_buffer(&self) -> usize {
        self.row.direct_size() + self.row.indirect_size()
    }

    pub fn tablet(&self) -> Option<&Arc<RemoteTablet>> {
        self.tablet.as_ref()
    }

    /// Stores the resolved tablet and returns the one it replaces, if any.
    pub fn set_tablet(&mut self, tablet: Arc<RemoteTablet>) -> Option<Arc<RemoteTablet>> {
        let previous = self.tablet.replace(tablet);
        if let (Some(prev), Some(current)) = (previous.as_ref(), self.tablet.as_ref()) {
            if prev.tablet_id != current.tablet_id {
                warn!(
                    kind = %self.kind(),
                    previous = %prev.tablet_id,
                    current = %current.tablet_id,
                    "operation tablet reassigned"
                );
            }
        }
        previous
    }

    /// Checks that the row carries what this kind of mutation needs.
    pub fn validate_row(&self) -> OpResult<()> {
        match self.variant {
            OpVariant::Insert | OpVariant::Delete => self.require_key_set(),
            OpVariant::Update => {
                self.require_key_set()?;
                if !self.row.has_non_key_set() {
                    return Err(OpError::schema(
                        "update requires at least one non-key column to be set",
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn require_key_set(&self) -> OpResult<()> {
        let schema = self.row.schema();
        for idx in schema.key_columns() {
            if !self.row.is_set(idx) {
                let column = schema.column(idx)?;
                return Err(OpError::missing_key(format!(
                    "{} requires key column '{}' to be set",
                    self.kind(),
                    column.name
                )));
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> OperationSummary {
        OperationSummary {
            kind: self.kind(),
            table: self.table.name().to_string(),
            read_only: self.is_read_only(),
            size_in_buffer: self.size_in_buffer(),
            tablet_id: self.tablet.as_ref().map(|tablet| tablet.tablet_id.clone()),
            payload_state: self.variant.payload_state(),
            description: self.to_string(),
        }
    }

    fn render_row(&self) -> String {
        if self.table.config().redact_values {
            self.row.to_string_redacted()
        } else {
            self.row.to_string()
        }
    }

    fn render_payload(&self) -> String {
        let redact = self.table.config().redact_values;
        let key_text = |key: &[u8]| {
            if redact {
                "<redacted>".to_string()
            } else {
                format!("0x{}", hex::encode(key))
            }
        };
        match &self.variant {
            OpVariant::Insert | OpVariant::Update | OpVariant::Delete => String::new(),
            OpVariant::RedisWrite(op) => match op.request() {
                Ok(request) => match &request.command {
                    Some(command) => format!(
                        "{} key={} hash_code={:?}",
                        redis_write_name(command),
                        key_text(command.key()),
                        request.hash_code
                    ),
                    None => "<no command>".to_string(),
                },
                Err(_) => format!("<{}>", op.state()),
            },
            OpVariant::RedisRead(op) => match op.request() {
                Ok(request) => match &request.command {
                    Some(command) => format!(
                        "{} key={} hash_code={:?}",
                        redis_read_name(command),
                        key_text(command.key()),
                        request.hash_code
                    ),
                    None => "<no command>".to_string(),
                },
                Err(_) => format!("<{}>", op.state()),
            },
            OpVariant::QlWrite(op) => format!("{} {}", op.statement_type().name(), self.render_row()),
            OpVariant::QlRead(op) => {
                format!("SELECT consistency={} {}", op.consistency_level(), self.render_row())
            }
        }
    }
}

fn explicit_hash_key(hash_code: Option<u16>) -> OpResult<PartitionKey> {
    hash_code
        .map(PartitionKey::from_hash_code)
        .ok_or_else(|| OpError::missing_key("hash code has not been set"))
}

fn redis_write_name(command: &RedisWriteCommand) -> &'static str {
    match command {
        RedisWriteCommand::Set { .. } => "SET",
        RedisWriteCommand::Del { .. } => "DEL",
    }
}

fn redis_read_name(command: &RedisReadCommand) -> &'static str {
    match command {
        RedisReadCommand::Get { .. } => "GET",
        RedisReadCommand::Exists { .. } => "EXISTS",
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.variant {
            OpVariant::Insert | OpVariant::Update | OpVariant::Delete => {
                write!(f, "{} {}", self.kind(), self.render_row())
            }
            _ => write!(f, "{} {}", self.kind(), self.render_payload()),
        }
    }
}
