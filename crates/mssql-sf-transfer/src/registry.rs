//! In-memory transfer registry shared by the HTTP surface and orchestrator.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::orchestrator::{Transfer, TransferStatus};

/// Transfers keyed by id for the process lifetime.
///
/// Entries are immutable snapshots; updates replace the whole entry under
/// the lock rather than mutating through an alias. Readers therefore never
/// observe a half-applied update.
#[derive(Default)]
pub struct TransferRegistry {
    inner: RwLock<HashMap<String, Arc<Transfer>>>,
}

impl TransferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a transfer snapshot.
    pub fn put(&self, transfer: Arc<Transfer>) {
        let mut map = self.inner.write().expect("transfer registry poisoned");
        map.insert(transfer.id.clone(), transfer);
    }

    /// Fetch the current snapshot for an id.
    pub fn get(&self, id: &str) -> Option<Arc<Transfer>> {
        let map = self.inner.read().expect("transfer registry poisoned");
        map.get(id).cloned()
    }

    /// Replace the entry for `id` with the snapshot produced by `f`.
    ///
    /// No-op when the id is unknown.
    pub fn update(&self, id: &str, f: impl FnOnce(&Transfer) -> Transfer) {
        let mut map = self.inner.write().expect("transfer registry poisoned");
        if let Some(current) = map.get(id) {
            let updated = f(current);
            map.insert(id.to_string(), Arc::new(updated));
        }
    }

    /// Number of transfers currently running.
    pub fn running_count(&self) -> usize {
        let map = self.inner.read().expect("transfer registry poisoned");
        map.values()
            .filter(|t| t.status == TransferStatus::Running)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::tests::running_transfer;

    #[test]
    fn test_put_and_get() {
        let registry = TransferRegistry::new();
        registry.put(Arc::new(running_transfer("a")));

        let fetched = registry.get("a").unwrap();
        assert_eq!(fetched.id, "a");
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_update_replaces_snapshot() {
        let registry = TransferRegistry::new();
        registry.put(Arc::new(running_transfer("a")));
        let before = registry.get("a").unwrap();

        registry.update("a", |t| {
            let mut t = t.clone();
            t.status = TransferStatus::Failed;
            t.error = "boom".to_string();
            t
        });

        let after = registry.get("a").unwrap();
        assert_eq!(after.status, TransferStatus::Failed);
        assert_eq!(after.error, "boom");
        // The old snapshot is untouched; readers holding it see running.
        assert_eq!(before.status, TransferStatus::Running);
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let registry = TransferRegistry::new();
        registry.update("ghost", |t| t.clone());
        assert!(registry.get("ghost").is_none());
    }

    #[test]
    fn test_running_count() {
        let registry = TransferRegistry::new();
        registry.put(Arc::new(running_transfer("a")));
        registry.put(Arc::new(running_transfer("b")));
        assert_eq!(registry.running_count(), 2);

        registry.update("a", |t| {
            let mut t = t.clone();
            t.status = TransferStatus::Complete;
            t
        });
        assert_eq!(registry.running_count(), 1);
    }

    #[test]
    fn test_concurrent_readers_and_writers() {
        let registry = Arc::new(TransferRegistry::new());
        registry.put(Arc::new(running_transfer("a")));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    registry.update("a", |t| t.clone());
                    let _ = registry.get("a");
                    let _ = registry.running_count();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(registry.get("a").is_some());
    }
}
