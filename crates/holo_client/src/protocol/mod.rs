//! Protocol payloads carried by operations.
//!
//! The core treats these as opaque except for the fields it is entitled to
//! write (hash code, bound key values) and for moving whole payloads across
//! the RPC boundary.

pub mod ql;
pub mod redis;
