//! Key-value protocol operations.
//!
//! Routing for these kinds is a pure hash-slot computation: the caller sets the
//! hash bucket explicitly and the partition key is that bucket, independent of
//! the row.

use crate::error::OpResult;
use crate::handoff::PayloadSlot;
use crate::op::ProtocolOp;
use crate::protocol::redis::{
    RedisReadCommand, RedisReadRequest, RedisResponse, RedisWriteCommand, RedisWriteRequest,
};

#[derive(Debug)]
pub struct RedisWriteOp {
    payload: PayloadSlot<RedisWriteRequest, RedisResponse>,
}

impl RedisWriteOp {
    pub(crate) fn new() -> Self {
        Self {
            payload: PayloadSlot::new(RedisWriteRequest::default()),
        }
    }

    pub fn set_command(&mut self, command: RedisWriteCommand) -> OpResult<()> {
        self.request_mut()?.command = Some(command);
        Ok(())
    }

    pub(crate) fn hash_code(&self) -> OpResult<Option<u16>> {
        Ok(self.request()?.hash_code)
    }

    pub(crate) fn set_hash_code(&mut self, hash_code: u16) -> OpResult<()> {
        self.request_mut()?.hash_code = Some(hash_code);
        Ok(())
    }
}

impl ProtocolOp for RedisWriteOp {
    type Request = RedisWriteRequest;
    type Response = RedisResponse;

    fn payload(&self) -> &PayloadSlot<RedisWriteRequest, RedisResponse> {
        &self.payload
    }

    fn payload_mut(&mut self) -> &mut PayloadSlot<RedisWriteRequest, RedisResponse> {
        &mut self.payload
    }
}

/// A read whose response is only present when an RPC actually ran; see
/// [`ProtocolOp::has_response`].
#[derive(Debug)]
pub struct RedisReadOp {
    payload: PayloadSlot<RedisReadRequest, RedisResponse>,
}

impl RedisReadOp {
    pub(crate) fn new() -> Self {
        Self {
            payload: PayloadSlot::new(RedisReadRequest::default()),
        }
    }

    pub fn set_command(&mut self, command: RedisReadCommand) -> OpResult<()> {
        self.request_mut()?.command = Some(command);
        Ok(())
    }

    /// Completes the read without an RPC, e.g. when answered upstream.
    pub fn short_circuit(&mut self) -> OpResult<()> {
        self.payload.short_circuit()
    }

    pub(crate) fn hash_code(&self) -> OpResult<Option<u16>> {
        Ok(self.request()?.hash_code)
    }

    pub(crate) fn set_hash_code(&mut self, hash_code: u16) -> OpResult<()> {
        self.request_mut()?.hash_code = Some(hash_code);
        Ok(())
    }
}

impl ProtocolOp for RedisReadOp {
    type Request = RedisReadRequest;
    type Response = RedisResponse;

    fn payload(&self) -> &PayloadSlot<RedisReadRequest, RedisResponse> {
        &self.payload
    }

    fn payload_mut(&mut self) -> &mut PayloadSlot<RedisReadRequest, RedisResponse> {
        &mut self.payload
    }
}
