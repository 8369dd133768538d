//! Buffer accounting for operations awaiting a flush.

use std::ops::Range;

use tracing::debug;

use crate::config::ClientOpsConfig;
use crate::op::Operation;

/// Running totals of buffered operations against the configured limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferBudget {
    max_bytes: usize,
    max_ops: usize,
    used_bytes: usize,
    used_ops: usize,
}

impl BufferBudget {
    pub fn new(max_bytes: usize, max_ops: usize) -> Self {
        Self {
            max_bytes: max_bytes.max(1),
            max_ops: max_ops.max(1),
            used_bytes: 0,
            used_ops: 0,
        }
    }

    pub fn from_config(config: &ClientOpsConfig) -> Self {
        Self::new(config.max_buffer_bytes, config.max_buffered_ops)
    }

    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    pub fn used_ops(&self) -> usize {
        self.used_ops
    }

    /// Returns `true` if `op` fits without exceeding either limit. An empty
    /// buffer always admits one operation, however large.
    pub fn can_admit(&self, op: &Operation) -> bool {
        if self.used_ops == 0 {
            return true;
        }
        self.used_ops < self.max_ops
            && self.used_bytes.saturating_add(op.size_in_buffer()) <= self.max_bytes
    }

    /// Adds `op` to the totals if it fits; returns whether it was admitted.
    pub fn admit(&mut self, op: &Operation) -> bool {
        if !self.can_admit(op) {
            debug!(
                kind = %op.kind(),
                size = op.size_in_buffer(),
                used_bytes = self.used_bytes,
                used_ops = self.used_ops,
                "buffer full; flush required"
            );
            return false;
        }
        self.used_bytes = self.used_bytes.saturating_add(op.size_in_buffer());
        self.used_ops += 1;
        true
    }

    pub fn needs_flush(&self) -> bool {
        self.used_ops >= self.max_ops || self.used_bytes >= self.max_bytes
    }

    pub fn reset(&mut self) {
        self.used_bytes = 0;
        self.used_ops = 0;
    }
}

/// Splits `ops` into contiguous flush batches bounded by count and bytes.
///
/// Every batch holds at least one operation, so an oversized operation is
/// flushed alone instead of stalling the buffer.
pub fn flush_ranges(ops: &[Operation], max_ops: usize, max_bytes: usize) -> Vec<Range<usize>> {
    if ops.is_empty() {
        return Vec::new();
    }
    let max_ops = max_ops.max(1);
    let max_bytes = max_bytes.max(1);
    let mut ranges = Vec::new();
    let mut start = 0usize;

    while start < ops.len() {
        let mut end = start;
        let mut bytes = 0usize;

        while end < ops.len() && end - start < max_ops {
            let op_bytes = ops[end].size_in_buffer();
            if end > start && bytes.saturating_add(op_bytes) > max_bytes {
                break;
            }
            bytes = bytes.saturating_add(op_bytes);
            end += 1;
        }

        if end == start {
            end += 1;
        }
        ranges.push(start..end);
        start = end;
    }

    ranges
}
