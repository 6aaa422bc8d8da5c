//! In-memory snapshot store.
//!
//! Keeps each snapshot as a postcard blob, so restore exercises the
//! same encode/decode path a flash- or file-backed store would.

use std::collections::HashMap;

use log::debug;

use crate::snapshot::{Snapshot, SnapshotStore, StoreError};

#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    blobs: HashMap<String, Vec<u8>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Raw stored bytes, for tests that corrupt them.
    pub fn blob_mut(&mut self, key: &str) -> Option<&mut Vec<u8>> {
        self.blobs.get_mut(key)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self, key: &str) -> Result<Option<Snapshot>, StoreError> {
        let Some(blob) = self.blobs.get(key) else {
            return Ok(None);
        };
        postcard::from_bytes(blob)
            .map(Some)
            .map_err(|_| StoreError::Corrupted)
    }

    fn save(&mut self, key: &str, snapshot: &Snapshot) -> Result<(), StoreError> {
        let blob = postcard::to_allocvec(snapshot).map_err(|_| StoreError::Encode)?;
        debug!("Store: {} <- {} bytes", key, blob.len());
        self.blobs.insert(key.to_owned(), blob);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        self.blobs.remove(key);
        Ok(())
    }
}
