//! Client-side tuning for operation construction and buffering.
//!
//! Values are read from `HOLO_CLIENT_*` environment variables with defaults
//! suitable for a single embedded client.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::protocol::ql::ConsistencyLevel;

/// Default byte budget for operations buffered before a flush is forced.
pub const DEFAULT_MAX_BUFFER_BYTES: usize = 7 * 1024 * 1024;
/// Default number of operations buffered before a flush is forced.
pub const DEFAULT_MAX_BUFFERED_OPS: usize = 1024;

/// Runtime configuration shared by every table handle of one client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientOpsConfig {
    /// Consistency applied to newly built structured-query reads.
    pub default_read_consistency: ConsistencyLevel,
    /// Upper bound on summed `size_in_buffer` before the batcher must flush.
    pub max_buffer_bytes: usize,
    /// Upper bound on buffered operation count before the batcher must flush.
    pub max_buffered_ops: usize,
    /// Replace column values with `<redacted>` in diagnostic rendering.
    pub redact_values: bool,
}

impl Default for ClientOpsConfig {
    fn default() -> Self {
        Self {
            default_read_consistency: ConsistencyLevel::Strong,
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
            max_buffered_ops: DEFAULT_MAX_BUFFERED_OPS,
            redact_values: false,
        }
    }
}

impl ClientOpsConfig {
    /// Loads configuration from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        let default_read_consistency = parse_consistency(
            std::env::var("HOLO_CLIENT_DEFAULT_READ_CONSISTENCY").ok(),
            ConsistencyLevel::Strong,
        )?;
        let max_buffer_bytes = parse_usize(
            std::env::var("HOLO_CLIENT_MAX_BUFFER_BYTES").ok(),
            DEFAULT_MAX_BUFFER_BYTES,
        )?
        .max(1);
        let max_buffered_ops = parse_usize(
            std::env::var("HOLO_CLIENT_MAX_BUFFERED_OPS").ok(),
            DEFAULT_MAX_BUFFERED_OPS,
        )?
        .max(1);
        let redact_values = parse_bool(std::env::var("HOLO_CLIENT_REDACT_VALUES").ok(), false)?;

        Ok(Self {
            default_read_consistency,
            max_buffer_bytes,
            max_buffered_ops,
            redact_values,
        })
    }
}

/// Parses an optional `usize` with fallback default.
fn parse_usize(value: Option<String>, default_value: usize) -> Result<usize> {
    match value {
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .with_context(|| format!("invalid usize value: {raw}")),
        None => Ok(default_value),
    }
}

/// Parses an optional boolean, accepting common truthy and falsy spellings.
fn parse_bool(value: Option<String>, default_value: bool) -> Result<bool> {
    let Some(raw) = value else {
        return Ok(default_value);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "no" | "n" | "off" => Ok(false),
        _ => Err(anyhow!("invalid bool value: {raw}")),
    }
}

fn parse_consistency(
    value: Option<String>,
    default_value: ConsistencyLevel,
) -> Result<ConsistencyLevel> {
    match value {
        Some(raw) => raw
            .parse::<ConsistencyLevel>()
            .map_err(|err| anyhow!(err))
            .with_context(|| format!("invalid read consistency: {raw}")),
        None => Ok(default_value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 4] = [
        "HOLO_CLIENT_DEFAULT_READ_CONSISTENCY",
        "HOLO_CLIENT_MAX_BUFFER_BYTES",
        "HOLO_CLIENT_MAX_BUFFERED_OPS",
        "HOLO_CLIENT_REDACT_VALUES",
    ];

    fn clear_env() {
        for name in VARS {
            std::env::remove_var(name);
        }
    }

    #[test]
    #[serial]
    fn from_env_uses_defaults_when_unset() {
        clear_env();
        let config = ClientOpsConfig::from_env().expect("load config");
        assert_eq!(config, ClientOpsConfig::default());
    }

    #[test]
    #[serial]
    fn from_env_reads_overrides_and_clamps_limits() {
        clear_env();
        std::env::set_var("HOLO_CLIENT_DEFAULT_READ_CONSISTENCY", "consistent_prefix");
        std::env::set_var("HOLO_CLIENT_MAX_BUFFER_BYTES", "0");
        std::env::set_var("HOLO_CLIENT_MAX_BUFFERED_OPS", "16");
        std::env::set_var("HOLO_CLIENT_REDACT_VALUES", "yes");

        let config = ClientOpsConfig::from_env().expect("load config");
        clear_env();

        assert_eq!(
            config.default_read_consistency,
            ConsistencyLevel::ConsistentPrefix
        );
        assert_eq!(config.max_buffer_bytes, 1);
        assert_eq!(config.max_buffered_ops, 16);
        assert!(config.redact_values);
    }

    #[test]
    #[serial]
    fn from_env_rejects_garbage() {
        clear_env();
        std::env::set_var("HOLO_CLIENT_MAX_BUFFERED_OPS", "lots");
        let err = ClientOpsConfig::from_env().expect_err("garbage must fail");
        clear_env();
        assert!(
            format!("{err:#}").contains("invalid usize value: lots"),
            "err={err:#}"
        );
    }
}
