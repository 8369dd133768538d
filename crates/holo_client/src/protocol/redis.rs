//! Key-value (Redis-compatible) request and response payloads.

use bytes::Bytes;
use redis_protocol::resp2::types::{BytesFrame, Resp2Frame};
use serde::{Deserialize, Serialize};

use crate::error::{OpError, OpResult};
use crate::keys::hash_code;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedisWriteCommand {
    Set {
        key: Vec<u8>,
        value: Vec<u8>,
        ttl_ms: Option<u64>,
    },
    Del {
        key: Vec<u8>,
    },
}

impl RedisWriteCommand {
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Set { key, .. } | Self::Del { key } => key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedisReadCommand {
    Get { key: Vec<u8> },
    Exists { key: Vec<u8> },
}

impl RedisReadCommand {
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Get { key } | Self::Exists { key } => key,
        }
    }
}

/// A parsed client command, split by the RPC path it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedisCommand {
    Write(RedisWriteCommand),
    Read(RedisReadCommand),
}

impl RedisCommand {
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Write(cmd) => cmd.key(),
            Self::Read(cmd) => cmd.key(),
        }
    }

    /// Parses a RESP2 array frame such as `["SET", key, value, "PX", "500"]`.
    pub fn from_frame(frame: &BytesFrame) -> OpResult<Self> {
        let BytesFrame::Array(parts) = frame else {
            return Err(OpError::schema("expected array frame"));
        };
        let Some(first) = parts.first() else {
            return Err(OpError::schema("empty command"));
        };

        let cmd = frame_str_upper(first).ok_or_else(|| OpError::schema("invalid command"))?;
        match cmd.as_str() {
            "GET" => {
                expect_args(&cmd, parts, 2)?;
                let key = frame_bytes(&parts[1], "key")?;
                Ok(Self::Read(RedisReadCommand::Get { key }))
            }
            "EXISTS" => {
                expect_args(&cmd, parts, 2)?;
                let key = frame_bytes(&parts[1], "key")?;
                Ok(Self::Read(RedisReadCommand::Exists { key }))
            }
            "DEL" => {
                expect_args(&cmd, parts, 2)?;
                let key = frame_bytes(&parts[1], "key")?;
                Ok(Self::Write(RedisWriteCommand::Del { key }))
            }
            "SET" => {
                if parts.len() != 3 && parts.len() != 5 {
                    return Err(OpError::schema(
                        "SET expects 2 arguments plus optional EX/PX",
                    ));
                }
                let key = frame_bytes(&parts[1], "key")?;
                let value = frame_bytes(&parts[2], "value")?;
                let ttl_ms = if parts.len() == 5 {
                    Some(parse_ttl(&parts[3], &parts[4])?)
                } else {
                    None
                };
                Ok(Self::Write(RedisWriteCommand::Set { key, value, ttl_ms }))
            }
            other => Err(OpError::schema(format!("unknown command {other}"))),
        }
    }
}

fn expect_args(cmd: &str, parts: &[BytesFrame], len: usize) -> OpResult<()> {
    if parts.len() != len {
        return Err(OpError::schema(format!(
            "{cmd} expects {} argument(s)",
            len - 1
        )));
    }
    Ok(())
}

fn parse_ttl(unit: &BytesFrame, amount: &BytesFrame) -> OpResult<u64> {
    let unit = frame_str_upper(unit).ok_or_else(|| OpError::schema("invalid SET option"))?;
    let amount = amount
        .as_str()
        .and_then(|raw| raw.parse::<u64>().ok())
        .ok_or_else(|| OpError::schema("invalid SET expiry"))?;
    match unit.as_str() {
        "EX" => Ok(amount.saturating_mul(1_000)),
        "PX" => Ok(amount),
        other => Err(OpError::schema(format!("unsupported SET option {other}"))),
    }
}

fn frame_str_upper(frame: &BytesFrame) -> Option<String> {
    frame.as_str().map(|s| s.to_ascii_uppercase())
}

fn frame_bytes(frame: &BytesFrame, what: &str) -> OpResult<Vec<u8>> {
    match frame {
        BytesFrame::BulkString(b) | BytesFrame::SimpleString(b) => Ok(b.to_vec()),
        _ => Err(OpError::schema(format!("invalid {what}"))),
    }
}

/// Hash bucket a redis key routes to.
pub fn hash_code_for_key(key: &[u8]) -> u16 {
    hash_code(key)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisWriteRequest {
    /// Hash bucket; written by the operation's `set_hash_code`.
    pub hash_code: Option<u16>,
    pub command: Option<RedisWriteCommand>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisReadRequest {
    /// Hash bucket; written by the operation's `set_hash_code`.
    pub hash_code: Option<u16>,
    pub command: Option<RedisReadCommand>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedisResponse {
    Ok,
    Nil,
    Bulk(Vec<u8>),
    Integer(i64),
    Error(String),
}

impl RedisResponse {
    /// Renders the response as the RESP2 frame a client expects.
    pub fn to_frame(&self) -> BytesFrame {
        match self {
            Self::Ok => BytesFrame::SimpleString(Bytes::from_static(b"OK")),
            Self::Nil => BytesFrame::Null,
            Self::Bulk(value) => BytesFrame::BulkString(Bytes::from(value.clone())),
            Self::Integer(value) => BytesFrame::Integer(*value),
            Self::Error(msg) => BytesFrame::Error(format!("ERR {msg}").into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(s: &str) -> BytesFrame {
        BytesFrame::BulkString(Bytes::from(s.to_string()))
    }

    #[test]
    fn parses_set_with_expiry() {
        let frame = BytesFrame::Array(vec![bulk("set"), bulk("k"), bulk("v"), bulk("EX"), bulk("2")]);
        let cmd = RedisCommand::from_frame(&frame).expect("parse");
        assert_eq!(
            cmd,
            RedisCommand::Write(RedisWriteCommand::Set {
                key: b"k".to_vec(),
                value: b"v".to_vec(),
                ttl_ms: Some(2_000),
            })
        );
        assert_eq!(cmd.key(), b"k");
    }

    #[test]
    fn parses_reads_and_rejects_bad_arity() {
        let get = BytesFrame::Array(vec![bulk("GET"), bulk("user:1")]);
        assert_eq!(
            RedisCommand::from_frame(&get).expect("parse"),
            RedisCommand::Read(RedisReadCommand::Get {
                key: b"user:1".to_vec()
            })
        );

        let bad = BytesFrame::Array(vec![bulk("GET")]);
        let err = RedisCommand::from_frame(&bad).expect_err("arity");
        assert!(err.to_string().contains("GET expects 1 argument"), "err={err}");

        let unknown = BytesFrame::Array(vec![bulk("FLUSHALL")]);
        assert!(RedisCommand::from_frame(&unknown).is_err());
    }

    #[test]
    fn responses_render_as_frames() {
        assert_eq!(RedisResponse::Nil.to_frame(), BytesFrame::Null);
        assert_eq!(RedisResponse::Integer(3).to_frame(), BytesFrame::Integer(3));
        assert_eq!(
            RedisResponse::Bulk(b"v".to_vec()).to_frame(),
            BytesFrame::BulkString(Bytes::from_static(b"v"))
        );
    }
}
