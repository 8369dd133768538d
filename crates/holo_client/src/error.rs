//! Error taxonomy for operation construction, key derivation and payload handoff.

use thiserror::Error;

/// Errors surfaced by the operation core.
///
/// A read that needs a full scan is not an error; see
/// [`crate::keys::PartitionKey::FullScan`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpError {
    /// Bytes or values that do not fit the table schema.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    /// A key column (or explicit hash code) needed for routing is not set.
    #[error("missing key material: {0}")]
    MissingKey(String),
    /// A payload was inspected or moved outside its permitted handoff state.
    #[error("operation misuse: {0}")]
    Misuse(String),
    /// Column position or name that does not exist in the schema.
    #[error("invalid column: {0}")]
    InvalidColumn(String),
    /// The table factory refused to build this kind of operation.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
}

pub type OpResult<T> = Result<T, OpError>;

impl OpError {
    pub(crate) fn schema(msg: impl Into<String>) -> Self {
        Self::SchemaMismatch(msg.into())
    }

    pub(crate) fn missing_key(msg: impl Into<String>) -> Self {
        Self::MissingKey(msg.into())
    }

    pub(crate) fn misuse(msg: impl Into<String>) -> Self {
        Self::Misuse(msg.into())
    }

    /// Returns `true` for errors caused by calling the API in the wrong state.
    pub fn is_misuse(&self) -> bool {
        matches!(self, Self::Misuse(_))
    }
}
