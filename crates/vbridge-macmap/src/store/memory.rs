//! In-memory snapshot store.

use super::{MappingStore, StatusSnapshot, StoreResult};
use crate::mapping::MappingId;
use async_trait::async_trait;
use log::trace;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Snapshot store kept in process memory.
///
/// Counts every store call so that callers can verify which operations
/// touched the store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshots: RwLock<HashMap<MappingId, StatusSnapshot>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    deletes: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored snapshot of a mapping without counting a read.
    pub async fn get(&self, id: &MappingId) -> Option<StatusSnapshot> {
        self.snapshots.read().await.get(id).cloned()
    }

    /// Returns the number of stored snapshots.
    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    /// Returns true if no snapshot is stored.
    pub async fn is_empty(&self) -> bool {
        self.snapshots.read().await.is_empty()
    }

    /// Number of `read` calls.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of `write` calls.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// Number of `delete` calls.
    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::Relaxed)
    }

    /// Total number of store calls.
    pub fn calls(&self) -> usize {
        self.reads() + self.writes() + self.deletes()
    }
}

#[async_trait]
impl MappingStore for MemoryStore {
    async fn read(&self, id: &MappingId) -> StoreResult<Option<StatusSnapshot>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.snapshots.read().await.get(id).cloned())
    }

    async fn write(&self, id: &MappingId, snapshot: &StatusSnapshot) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        trace!("{}: storing {} host bindings", id, snapshot.hosts.len());
        self.snapshots
            .write()
            .await
            .insert(id.clone(), snapshot.clone());
        Ok(())
    }

    async fn delete(&self, id: &MappingId) -> StoreResult<()> {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        self.snapshots.write().await.remove(id);
        Ok(())
    }
}
