//! In-memory contact store, for tests and dry runs.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::model::ContactRecord;
use crate::store::traits::ContactStore;

/// Keeps the contact list in memory and counts loads/saves.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<ContactRecord>>,
    loads: AtomicUsize,
    saves: AtomicUsize,
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a pre-populated list.
    pub fn with_records(records: Vec<ContactRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            ..Self::default()
        }
    }

    /// Make every subsequent `load` fail with an IO error.
    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `save` fail with an IO error.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Current contents without counting a load.
    pub async fn snapshot(&self) -> Vec<ContactRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl ContactStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self) -> Result<Vec<ContactRecord>, StoreError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(StoreError::Read {
                path: "memory".to_string(),
                source: std::io::Error::other("injected load failure"),
            });
        }
        Ok(self.records.read().await.clone())
    }

    async fn save(&self, records: &[ContactRecord]) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Write {
                path: "memory".to_string(),
                source: std::io::Error::other("injected save failure"),
            });
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.records.write().await = records.to_vec();
        Ok(())
    }
}
