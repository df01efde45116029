//! Durable store for activation status snapshots.
//!
//! The status table persists a snapshot of its bindings keyed by the owning
//! mapping. A mapping without bindings has no snapshot at all rather than
//! an empty one.

mod memory;
#[cfg(feature = "redis")]
mod redis_store;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::{RedisStore, RedisStoreConfig};

use crate::host::HostKey;
use crate::mapping::MappingId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vbridge_types::{MacAddress, SwitchPort, VlanId};

/// Errors from snapshot store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store connection error: {0}")]
    ConnectionError(String),

    #[error("Store command error: {0}")]
    CommandError(String),

    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{mapping}: invalid snapshot: {reason}")]
    InvalidSnapshot { mapping: MappingId, reason: String },
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// One persisted binding: a host and the port it was learned on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostBinding {
    pub mac: MacAddress,
    pub vlan: VlanId,
    pub port: SwitchPort,
}

impl HostBinding {
    /// Returns the host key of this binding.
    pub fn host(&self) -> HostKey {
        HostKey::new(self.mac, self.vlan)
    }
}

/// Persisted form of an activation status table.
///
/// Bindings are kept sorted so that equal tables produce equal snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub hosts: Vec<HostBinding>,
}

impl StatusSnapshot {
    /// Creates a snapshot from bindings in any order.
    pub fn new(mut hosts: Vec<HostBinding>) -> Self {
        hosts.sort();
        Self { hosts }
    }

    /// Returns true if the snapshot holds no binding.
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Serializes the snapshot to JSON.
    pub fn to_json(&self) -> StoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserializes a snapshot from JSON.
    pub fn from_json(json: &str) -> StoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Durable store collaborator.
///
/// Implementations are keyed by the owning mapping's identity. `read`
/// returns `None` when no snapshot was written.
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Reads the snapshot of a mapping.
    async fn read(&self, id: &MappingId) -> StoreResult<Option<StatusSnapshot>>;

    /// Replaces the snapshot of a mapping.
    async fn write(&self, id: &MappingId, snapshot: &StatusSnapshot) -> StoreResult<()>;

    /// Removes the snapshot of a mapping.
    async fn delete(&self, id: &MappingId) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn binding(mac: u64, vlan: u16, switch: u64, port: u32) -> HostBinding {
        HostBinding {
            mac: MacAddress::from_u64(mac).unwrap(),
            vlan: VlanId::new(vlan).unwrap(),
            port: SwitchPort::new(switch, port),
        }
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let snapshot = StatusSnapshot::new(vec![binding(2, 1, 1, 1), binding(1, 1, 1, 1)]);
        assert_eq!(snapshot.hosts, vec![binding(1, 1, 1, 1), binding(2, 1, 1, 1)]);
    }

    #[test]
    fn test_snapshot_json() {
        let snapshot = StatusSnapshot::new(vec![binding(0xa, 10, 1, 2)]);
        let json = snapshot.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"hosts":[{"mac":"00:00:00:00:00:0a","vlan":10,"port":"1:2"}]}"#
        );
        assert_eq!(StatusSnapshot::from_json(&json).unwrap(), snapshot);
    }

    #[test]
    fn test_snapshot_json_invalid() {
        let err = StatusSnapshot::from_json(r#"{"hosts":[{"mac":"zz","vlan":1,"port":"1:1"}]}"#)
            .unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[test]
    fn test_binding_keys() {
        let b = binding(1, 10, 3, 4);
        assert_eq!(b.host().to_string(), "00:00:00:00:00:01@10");
    }
}
