//! Structured-query operations.

use bytes::Bytes;
use tracing::trace;

use crate::error::{OpError, OpResult};
use crate::handoff::{HandoffState, PayloadSlot};
use crate::op::ProtocolOp;
use crate::protocol::ql::{
    bound_value, ConsistencyLevel, QlColumnValue, QlReadRequest, QlResponse, QlStatementType,
    QlWriteRequest,
};
use crate::row::PartialRow;
use crate::value::Value;

/// Outcome of copying a statement's bound key into the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKey {
    /// Every key column was bound and copied; the statement targets one row.
    Point,
    /// Not all key columns are bound; the read scatters across tablets.
    Scatter,
}

/// Raw result rows, handed to the caller exactly once.
#[derive(Debug, Default)]
struct RowsData {
    data: Option<Bytes>,
    taken: bool,
}

impl RowsData {
    fn take(&mut self, state: HandoffState) -> OpResult<Bytes> {
        if state != HandoffState::Completed {
            return Err(OpError::misuse(format!(
                "rows data cannot be taken while {state}"
            )));
        }
        if self.taken {
            return Err(OpError::misuse("rows data already taken"));
        }
        self.taken = true;
        Ok(self.data.take().unwrap_or_default())
    }
}

#[derive(Debug)]
pub struct QlWriteOp {
    statement_type: QlStatementType,
    payload: PayloadSlot<QlWriteRequest, QlResponse>,
    rows: RowsData,
}

impl QlWriteOp {
    pub(crate) fn new(statement_type: QlStatementType) -> Self {
        Self {
            statement_type,
            payload: PayloadSlot::new(QlWriteRequest::new(statement_type)),
            rows: RowsData::default(),
        }
    }

    /// Statement sub-kind chosen by the factory.
    pub fn statement_type(&self) -> QlStatementType {
        self.statement_type
    }

    /// Completes the RPC and stores the raw result rows sent alongside it.
    pub fn complete_with_rows(
        &mut self,
        request: QlWriteRequest,
        response: QlResponse,
        rows_data: Bytes,
    ) -> OpResult<()> {
        self.payload.complete(request, response)?;
        trace!(bytes = rows_data.len(), "ql write rows data received");
        self.rows.data = Some(rows_data);
        Ok(())
    }

    /// Moves the raw result rows to the caller; a second call is misuse.
    pub fn take_rows_data(&mut self) -> OpResult<Bytes> {
        self.rows.take(self.payload.state())
    }

    pub(crate) fn bind_key(&self, row: &mut PartialRow) -> OpResult<StatementKey> {
        let request = self.request()?;
        copy_bound_key(
            row,
            &request.hashed_column_values,
            &request.range_column_values,
            true,
        )
    }

    pub(crate) fn set_hash_code(&mut self, hash_code: u16) -> OpResult<()> {
        self.request_mut()?.hash_code = Some(hash_code);
        Ok(())
    }
}

impl ProtocolOp for QlWriteOp {
    type Request = QlWriteRequest;
    type Response = QlResponse;

    fn payload(&self) -> &PayloadSlot<QlWriteRequest, QlResponse> {
        &self.payload
    }

    fn payload_mut(&mut self) -> &mut PayloadSlot<QlWriteRequest, QlResponse> {
        &mut self.payload
    }
}

#[derive(Debug)]
pub struct QlReadOp {
    consistency: ConsistencyLevel,
    payload: PayloadSlot<QlReadRequest, QlResponse>,
    rows: RowsData,
}

impl QlReadOp {
    pub(crate) fn new(consistency: ConsistencyLevel) -> Self {
        Self {
            consistency,
            payload: PayloadSlot::new(QlReadRequest::default()),
            rows: RowsData::default(),
        }
    }

    pub fn consistency_level(&self) -> ConsistencyLevel {
        self.consistency
    }

    pub fn set_consistency_level(&mut self, consistency: ConsistencyLevel) {
        self.consistency = consistency;
    }

    pub fn complete_with_rows(
        &mut self,
        request: QlReadRequest,
        response: QlResponse,
        rows_data: Bytes,
    ) -> OpResult<()> {
        self.payload.complete(request, response)?;
        trace!(bytes = rows_data.len(), "ql read rows data received");
        self.rows.data = Some(rows_data);
        Ok(())
    }

    pub fn take_rows_data(&mut self) -> OpResult<Bytes> {
        self.rows.take(self.payload.state())
    }

    pub(crate) fn bind_key(&self, row: &mut PartialRow) -> OpResult<StatementKey> {
        let request = self.request()?;
        copy_bound_key(
            row,
            &request.hashed_column_values,
            &request.range_column_values,
            false,
        )
    }

    pub(crate) fn hash_code(&self) -> OpResult<Option<u16>> {
        Ok(self.request()?.hash_code)
    }

    pub(crate) fn set_hash_code(&mut self, hash_code: u16) -> OpResult<()> {
        self.request_mut()?.hash_code = Some(hash_code);
        Ok(())
    }
}

impl ProtocolOp for QlReadOp {
    type Request = QlReadRequest;
    type Response = QlResponse;

    fn payload(&self) -> &PayloadSlot<QlReadRequest, QlResponse> {
        &self.payload
    }

    fn payload_mut(&mut self) -> &mut PayloadSlot<QlReadRequest, QlResponse> {
        &mut self.payload
    }
}

/// Copies bound key values into `row`. With `required`, an unbound key column
/// is an error; otherwise the row is left untouched and `Scatter` returned.
/// Every binding is checked before the first write, so on error the row is
/// unchanged.
fn copy_bound_key(
    row: &mut PartialRow,
    hashed: &[QlColumnValue],
    range: &[QlColumnValue],
    required: bool,
) -> OpResult<StatementKey> {
    let schema = row.schema().clone();

    for bound in hashed {
        if bound.column_index >= schema.num_hash_key_columns() {
            return Err(OpError::schema(format!(
                "column {} is bound as a hash key but is not a hash key column",
                bound.column_index
            )));
        }
    }
    for bound in range {
        if !schema.is_key_column(bound.column_index)
            || bound.column_index < schema.num_hash_key_columns()
        {
            return Err(OpError::schema(format!(
                "column {} is bound as a range key but is not a range key column",
                bound.column_index
            )));
        }
    }

    let mut values: Vec<(usize, Value)> = Vec::with_capacity(schema.num_key_columns());
    for idx in schema.key_columns() {
        let source = if idx < schema.num_hash_key_columns() {
            hashed
        } else {
            range
        };
        let column = schema.column(idx)?;
        match bound_value(source, idx) {
            Some(QlColumnValue {
                value: Some(value), ..
            }) => {
                if value.column_type() != column.column_type {
                    return Err(OpError::schema(format!(
                        "key column '{}' has type {} but bound value has type {}",
                        column.name,
                        column.column_type,
                        value.column_type()
                    )));
                }
                values.push((idx, value.clone()));
            }
            Some(QlColumnValue { value: None, .. }) => {
                return Err(OpError::schema(format!(
                    "key column '{}' is bound to NULL",
                    column.name
                )));
            }
            None if required => {
                return Err(OpError::missing_key(format!(
                    "key column '{}' is not bound",
                    column.name
                )));
            }
            None => return Ok(StatementKey::Scatter),
        }
    }

    for (idx, value) in values {
        row.set(idx, value)?;
    }
    Ok(StatementKey::Point)
}
