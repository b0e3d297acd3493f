//! Metadata-only checkpoints.
//!
//! A snapshot records the flow state, graph statuses and edges, and file
//! checksums. It never captures callables or file contents.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::flow::FlowState;
use crate::graph::GraphMetadata;

/// Smallest ring the recovery engine may use.
pub const MIN_SNAPSHOTS: usize = 50;

/// Point-in-time copy of flow and graph metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub flow_state: FlowState,
    pub graph_metadata: GraphMetadata,
    /// Relative path to hex SHA-256 digest.
    #[serde(default)]
    pub file_checksums: BTreeMap<String, String>,
    pub description: String,
}

impl Snapshot {
    pub fn new(description: impl Into<String>, flow_state: FlowState, graph_metadata: GraphMetadata) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            flow_state,
            graph_metadata,
            file_checksums: BTreeMap::new(),
            description: description.into(),
        }
    }

    pub fn with_checksums(mut self, checksums: BTreeMap<String, String>) -> Self {
        self.file_checksums = checksums;
        self
    }
}

/// Bounded ring of snapshots, oldest evicted first.
#[derive(Debug, Clone)]
pub struct SnapshotRing {
    capacity: usize,
    snapshots: VecDeque<Snapshot>,
}

impl Default for SnapshotRing {
    fn default() -> Self {
        Self::new(MIN_SNAPSHOTS)
    }
}

impl SnapshotRing {
    /// Capacities below the minimum are raised to it.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_SNAPSHOTS);
        Self {
            capacity,
            snapshots: VecDeque::with_capacity(capacity),
        }
    }

    /// Store a snapshot and return its id.
    pub fn push(&mut self, snapshot: Snapshot) -> String {
        let id = snapshot.id.clone();
        debug!(snapshot = %id, description = %snapshot.description, "Snapshot taken");
        self.snapshots.push_back(snapshot);
        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
        }
        id
    }

    pub fn get(&self, id: &str) -> Option<&Snapshot> {
        self.snapshots.iter().find(|s| s.id == id)
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.back()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_has_a_floor() {
        assert_eq!(SnapshotRing::new(5).capacity(), MIN_SNAPSHOTS);
        assert_eq!(SnapshotRing::new(80).capacity(), 80);
    }

    #[test]
    fn test_ring_evicts_oldest() {
        let mut ring = SnapshotRing::new(0);
        let first = ring.push(Snapshot::new("s0", FlowState::default(), GraphMetadata::default()));
        for i in 1..=MIN_SNAPSHOTS {
            ring.push(Snapshot::new(format!("s{}", i), FlowState::default(), GraphMetadata::default()));
        }
        assert_eq!(ring.len(), MIN_SNAPSHOTS);
        assert!(ring.get(&first).is_none());
        assert_eq!(ring.latest().unwrap().description, format!("s{}", MIN_SNAPSHOTS));
    }
}
