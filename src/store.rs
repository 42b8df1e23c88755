use std::sync::{Arc, RwLock};

use crate::dataset::Dataset;

/// Single-slot holder of the current dataset.
///
/// The slot is empty at process start and replaced wholesale on every
/// successful ingestion; the previous dataset is dropped, never mutated in
/// place. Readers take an `Arc` snapshot under the read lock, so a request
/// either sees the old table or the new one, never a half-written mix, and
/// a snapshot stays valid even if an upload lands mid-request.
///
/// Constructed once and owned by the application state; consumers receive
/// it by reference.
#[derive(Debug, Default)]
pub struct DatasetStore {
    slot: RwLock<Option<Arc<Dataset>>>,
}

impl DatasetStore {
    pub fn new() -> Self {
        DatasetStore {
            slot: RwLock::new(None),
        }
    }

    /// Replace the current dataset.
    pub fn set(&self, dataset: Dataset) {
        let mut slot = self.slot.write().unwrap();
        *slot = Some(Arc::new(dataset));
    }

    /// Snapshot of the current dataset, or `None` when nothing has been
    /// loaded yet.
    pub fn get(&self) -> Option<Arc<Dataset>> {
        self.slot.read().unwrap().clone()
    }
}
