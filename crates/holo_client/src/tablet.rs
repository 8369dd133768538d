//! Tablet descriptors and partition-key routing.
//!
//! `TabletMap` is the client's view of one table's tablets, sorted by partition
//! start key. It turns an operation's [`PartitionKey`] into either a single
//! tablet or, for scatter reads, every tablet of the table.

use std::net::SocketAddr;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::error::{OpError, OpResult};
use crate::keys::{encode_hash_code, PartitionKey};
use crate::op::Operation;

/// A physical shard of a table, addressed by `[partition_start, partition_end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteTablet {
    pub tablet_id: String,
    pub table_id: String,
    /// Inclusive start key; empty means unbounded.
    pub partition_start: Vec<u8>,
    /// Exclusive end key; empty means unbounded.
    pub partition_end: Vec<u8>,
    /// Current leader endpoint, when known.
    pub leader: Option<SocketAddr>,
}

impl RemoteTablet {
    pub fn contains_key(&self, key: &[u8]) -> bool {
        key_in_range(key, &self.partition_start, &self.partition_end)
    }
}

/// Checks whether `key` is within `[start, end)` where empty bounds are open.
pub fn key_in_range(key: &[u8], start: &[u8], end: &[u8]) -> bool {
    let in_start = start.is_empty() || key >= start;
    let in_end = end.is_empty() || key < end;
    in_start && in_end
}

/// Outcome of [`TabletMap::assign`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabletAssignment {
    pub route: TabletRoute,
    /// Tablet the operation pointed at before this assignment, if any.
    pub replaced: Option<Arc<RemoteTablet>>,
}

/// Result of routing one partition key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabletRoute {
    Single(Arc<RemoteTablet>),
    /// Scatter read: evaluate on every tablet.
    FanOut(Vec<Arc<RemoteTablet>>),
}

#[derive(Debug, Clone)]
pub struct TabletMap {
    table_id: String,
    tablets: Vec<Arc<RemoteTablet>>,
}

impl TabletMap {
    /// Builds a map from non-overlapping tablets. Gaps are allowed; a key that
    /// falls into one fails to route.
    pub fn new(table_id: impl Into<String>, mut tablets: Vec<RemoteTablet>) -> OpResult<Self> {
        let table_id = table_id.into();
        if tablets.is_empty() {
            return Err(OpError::schema(format!("table '{table_id}' has no tablets")));
        }
        if let Some(foreign) = tablets.iter().find(|tablet| tablet.table_id != table_id) {
            return Err(OpError::schema(format!(
                "tablet '{}' belongs to table '{}', not '{table_id}'",
                foreign.tablet_id, foreign.table_id
            )));
        }
        tablets.sort_by(|a, b| a.partition_start.cmp(&b.partition_start));

        for pair in tablets.windows(2) {
            if pair[0].partition_end.is_empty() || pair[0].partition_end > pair[1].partition_start {
                return Err(OpError::schema(format!(
                    "tablets '{}' and '{}' overlap",
                    pair[0].tablet_id, pair[1].tablet_id
                )));
            }
        }

        Ok(Self {
            table_id,
            tablets: tablets.into_iter().map(Arc::new).collect(),
        })
    }

    /// Splits the 16-bit hash space evenly into `count` tablets.
    pub fn hash_split(table_id: impl Into<String>, count: usize) -> OpResult<Self> {
        let table_id = table_id.into();
        let count = count.clamp(1, usize::from(u16::MAX));
        let width = (u32::from(u16::MAX) + 1) / count as u32;
        let tablets = (0..count)
            .map(|idx| {
                let start = if idx == 0 {
                    Vec::new()
                } else {
                    encode_hash_code((width * idx as u32) as u16)
                };
                let end = if idx + 1 == count {
                    Vec::new()
                } else {
                    encode_hash_code((width * (idx as u32 + 1)) as u16)
                };
                RemoteTablet {
                    tablet_id: format!("{table_id}-tablet-{idx}"),
                    table_id: table_id.clone(),
                    partition_start: start,
                    partition_end: end,
                    leader: None,
                }
            })
            .collect();
        Self::new(table_id, tablets)
    }

    pub fn table_id(&self) -> &str {
        &self.table_id
    }

    pub fn tablets(&self) -> &[Arc<RemoteTablet>] {
        &self.tablets
    }

    pub fn route(&self, key: &PartitionKey) -> OpResult<TabletRoute> {
        match key {
            PartitionKey::FullScan => Ok(TabletRoute::FanOut(self.tablets.clone())),
            PartitionKey::Key(bytes) => self
                .tablets
                .iter()
                .find(|tablet| tablet.contains_key(bytes))
                .cloned()
                .map(TabletRoute::Single)
                .ok_or_else(|| {
                    OpError::schema(format!(
                        "no tablet of table '{}' covers partition key 0x{}",
                        self.table_id,
                        hex::encode(bytes)
                    ))
                }),
        }
    }

    /// Routes `op` and stores the tablet on it when a single tablet is targeted.
    /// The tablet it previously held, if any, is handed back in `replaced`.
    pub fn assign(&self, op: &mut Operation) -> OpResult<TabletAssignment> {
        if op.table().id() != self.table_id {
            return Err(OpError::misuse(format!(
                "operation on table '{}' routed with tablets of table '{}'",
                op.table().id(),
                self.table_id
            )));
        }
        let key = op.partition_key()?;
        let route = self.route(&key)?;
        let replaced = match &route {
            TabletRoute::Single(tablet) => op.set_tablet(tablet.clone()),
            TabletRoute::FanOut(tablets) => {
                debug!(
                    table = %self.table_id,
                    kind = %op.kind(),
                    tablets = tablets.len(),
                    "scatter read fans out to every tablet"
                );
                None
            }
        };
        Ok(TabletAssignment { route, replaced })
    }
}
