//! Ownership handoff of protocol payloads across the RPC boundary.
//!
//! A request is moved out of the operation when it is sent and moved back,
//! together with the response, when the RPC completes. The slot tracks where the
//! payload currently lives:
//!
//! ```text
//! Idle --take_request--> InFlight --complete--> Completed
//!   ^                        |
//!   +----restore_request-----+        (retry path)
//! Idle --short_circuit--> Completed   (answered without an RPC)
//! ```

use std::fmt;

use serde::Serialize;
use tracing::trace;

use crate::error::{OpError, OpResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HandoffState {
    /// Request is owned by the operation and may be mutated.
    Idle,
    /// Request has been moved into an outbound RPC.
    InFlight,
    /// RPC finished; request restored and response (if any) available.
    Completed,
}

impl fmt::Display for HandoffState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::InFlight => "in-flight",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Request/response pair plus the state guarding access to them.
#[derive(Debug)]
pub struct PayloadSlot<Req, Resp> {
    state: HandoffState,
    request: Option<Req>,
    response: Option<Resp>,
}

impl<Req, Resp> PayloadSlot<Req, Resp> {
    pub fn new(request: Req) -> Self {
        Self {
            state: HandoffState::Idle,
            request: Some(request),
            response: None,
        }
    }

    pub fn state(&self) -> HandoffState {
        self.state
    }

    /// Read access to the request; refused while it is in flight.
    pub fn request(&self) -> OpResult<&Req> {
        match (self.state, self.request.as_ref()) {
            (HandoffState::InFlight, _) | (_, None) => Err(OpError::misuse(format!(
                "request cannot be read while {}",
                self.state
            ))),
            (_, Some(request)) => Ok(request),
        }
    }

    /// Write access to the request; only before it has been handed off.
    pub fn request_mut(&mut self) -> OpResult<&mut Req> {
        if self.state != HandoffState::Idle {
            return Err(OpError::misuse(format!(
                "request cannot be mutated while {}",
                self.state
            )));
        }
        self.request
            .as_mut()
            .ok_or_else(|| OpError::misuse("request slot is empty"))
    }

    /// Moves the request out for transmission: Idle -> InFlight.
    pub fn take_request(&mut self) -> OpResult<Req> {
        if self.state != HandoffState::Idle {
            return Err(OpError::misuse(format!(
                "request cannot be taken while {}",
                self.state
            )));
        }
        let request = self
            .request
            .take()
            .ok_or_else(|| OpError::misuse("request slot is empty"))?;
        self.state = HandoffState::InFlight;
        trace!(state = %self.state, "request handed to rpc");
        Ok(request)
    }

    /// Returns an unanswered request for a retry: InFlight -> Idle.
    pub fn restore_request(&mut self, request: Req) -> OpResult<()> {
        if self.state != HandoffState::InFlight {
            return Err(OpError::misuse(format!(
                "request cannot be restored while {}",
                self.state
            )));
        }
        self.request = Some(request);
        self.state = HandoffState::Idle;
        trace!(state = %self.state, "request restored for retry");
        Ok(())
    }

    /// Restores the request and stores the response: InFlight -> Completed.
    pub fn complete(&mut self, request: Req, response: Resp) -> OpResult<()> {
        if self.state != HandoffState::InFlight {
            return Err(OpError::misuse(format!(
                "response cannot be delivered while {}",
                self.state
            )));
        }
        self.request = Some(request);
        self.response = Some(response);
        self.state = HandoffState::Completed;
        trace!(state = %self.state, "rpc completed");
        Ok(())
    }

    /// Finishes without an RPC and without a response: Idle -> Completed.
    pub fn short_circuit(&mut self) -> OpResult<()> {
        if self.state != HandoffState::Idle {
            return Err(OpError::misuse(format!(
                "cannot short-circuit while {}",
                self.state
            )));
        }
        self.state = HandoffState::Completed;
        trace!(state = %self.state, "completed without rpc");
        Ok(())
    }

    pub fn has_response(&self) -> bool {
        self.state == HandoffState::Completed && self.response.is_some()
    }

    /// Response of a completed RPC.
    pub fn response(&self) -> OpResult<&Resp> {
        if self.state != HandoffState::Completed {
            return Err(OpError::misuse(format!(
                "response cannot be read while {}",
                self.state
            )));
        }
        self.response
            .as_ref()
            .ok_or_else(|| OpError::misuse("operation completed without a response"))
    }

    pub fn response_mut(&mut self) -> OpResult<&mut Resp> {
        if self.state != HandoffState::Completed {
            return Err(OpError::misuse(format!(
                "response cannot be mutated while {}",
                self.state
            )));
        }
        self.response
            .as_mut()
            .ok_or_else(|| OpError::misuse("operation completed without a response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_cycle_preserves_request_and_delivers_response() {
        let mut slot = PayloadSlot::<Vec<u8>, String>::new(b"req".to_vec());
        slot.request_mut().expect("idle mutable").push(b'!');

        let sent = slot.take_request().expect("take");
        assert_eq!(slot.state(), HandoffState::InFlight);
        assert!(slot.request().expect_err("in flight").is_misuse());
        assert!(slot.response().expect_err("not complete").is_misuse());

        slot.complete(sent, "ok".to_string()).expect("complete");
        assert_eq!(slot.request().expect("restored"), b"req!");
        assert_eq!(slot.response().expect("response"), "ok");
        assert!(slot.request_mut().expect_err("sent already").is_misuse());
    }

    #[test]
    fn retry_path_returns_to_idle() {
        let mut slot = PayloadSlot::<u32, u32>::new(7);
        let sent = slot.take_request().expect("take");
        assert!(slot.take_request().expect_err("double take").is_misuse());
        slot.restore_request(sent).expect("restore");
        assert_eq!(slot.state(), HandoffState::Idle);
        let again = slot.take_request().expect("retake");
        assert_eq!(again, 7);
    }

    #[test]
    fn completion_requires_in_flight() {
        let mut slot = PayloadSlot::<u32, u32>::new(1);
        assert!(slot.complete(1, 2).expect_err("idle").is_misuse());
        assert!(slot.restore_request(1).expect_err("idle").is_misuse());
    }

    #[test]
    fn short_circuit_completes_without_response() {
        let mut slot = PayloadSlot::<u32, u32>::new(1);
        slot.short_circuit().expect("short circuit");
        assert!(!slot.has_response());
        assert_eq!(*slot.request().expect("request kept"), 1);
        assert!(slot.response().expect_err("no response").is_misuse());
        assert!(slot.take_request().expect_err("completed").is_misuse());
    }
}
