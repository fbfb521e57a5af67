//! Advisory per-upload locks
//!
//! Appends to one upload must be serialized; a second writer racing the
//! first would corrupt the offset bookkeeping. Locks are in-process only,
//! which matches a single-instance gateway in front of one store root.

use crate::error::{Result, TusError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Registry of uploads currently being written.
#[derive(Clone, Default)]
pub struct UploadLocks {
    held: Arc<DashMap<String, ()>>,
}

impl UploadLocks {
    /// Create an empty lock registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for an upload, failing immediately if it is held.
    pub fn try_acquire(&self, id: &str) -> Result<LockGuard> {
        match self.held.entry(id.to_string()) {
            Entry::Occupied(_) => Err(TusError::Locked(id.to_string())),
            Entry::Vacant(vacant) => {
                vacant.insert(());
                Ok(LockGuard {
                    held: Arc::clone(&self.held),
                    id: id.to_string(),
                })
            }
        }
    }
}

/// Releases the upload lock when dropped.
pub struct LockGuard {
    held: Arc<DashMap<String, ()>>,
    id: String,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.held.remove(&self.id);
    }
}
