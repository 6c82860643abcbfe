//! Contact log: the single writer over a [`ContactStore`].
//!
//! Every mutation runs load → modify → save while holding one async mutex, so
//! two messages handled at the same time cannot lose each other's update.
//!
//! Reads treat an unreadable store as empty. Mutations refuse to run on one,
//! since saving would replace records that could not be read.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::store::model::ContactRecord;
use crate::store::traits::ContactStore;

pub struct ContactLog {
    store: Arc<dyn ContactStore>,
    lock: Mutex<()>,
}

impl ContactLog {
    pub fn new(store: Arc<dyn ContactStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    /// Load for a mutation. Load errors propagate so nothing gets overwritten.
    async fn load(&self) -> Result<Vec<ContactRecord>, StoreError> {
        let records = self.store.load().await?;
        Ok(merge_duplicates(records))
    }

    /// Best-effort snapshot for reads; an unreadable store counts as empty.
    async fn snapshot(&self) -> Vec<ContactRecord> {
        match self.load().await {
            Ok(records) => records,
            Err(e) => {
                warn!(store = self.store.name(), error = %e, "Contact store unreadable, treating as empty");
                Vec::new()
            }
        }
    }

    /// Create a record for `id` unless one exists. Returns `true` if created.
    ///
    /// An existing record is left untouched and nothing is written.
    pub async fn register(&self, id: &str, display_name: &str) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;

        if records.iter().any(|r| r.id == id) {
            debug!(contact = %id, "Contact already registered");
            return Ok(false);
        }

        records.push(ContactRecord::new(id, display_name));
        self.store.save(&records).await?;

        info!(contact = %id, name = %display_name, total = records.len(), "Registered new contact");
        Ok(true)
    }

    /// Append `option` to the record for `id`. Returns `false` (and writes
    /// nothing) when there is no such record.
    pub async fn record_choice(&self, id: &str, option: &str) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;

        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            debug!(contact = %id, option = %option, "No record for contact, choice not logged");
            return Ok(false);
        };

        record.chosen_options.push(option.to_string());
        let choices = record.chosen_options.len();
        self.store.save(&records).await?;

        info!(contact = %id, option = %option, choices, "Logged menu choice");
        Ok(true)
    }

    /// The record for `id`, if any.
    pub async fn get(&self, id: &str) -> Option<ContactRecord> {
        let _guard = self.lock.lock().await;
        self.snapshot().await.into_iter().find(|r| r.id == id)
    }

    /// Every record, in creation order.
    pub async fn all(&self) -> Vec<ContactRecord> {
        let _guard = self.lock.lock().await;
        self.snapshot().await
    }

    pub async fn count(&self) -> usize {
        self.all().await.len()
    }
}

/// Fold records sharing an id into the first one, concatenating their choices
/// in file order. Older files held one record per greeting.
fn merge_duplicates(records: Vec<ContactRecord>) -> Vec<ContactRecord> {
    let mut merged: Vec<ContactRecord> = Vec::with_capacity(records.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        match index.get(&record.id) {
            Some(&at) => {
                debug!(contact = %record.id, "Merging duplicate contact record");
                merged[at].chosen_options.extend(record.chosen_options);
            }
            None => {
                index.insert(record.id.clone(), merged.len());
                merged.push(record);
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::json::JsonFileStore;
    use crate::store::memory::MemoryStore;

    fn memory_log() -> (ContactLog, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (ContactLog::new(store.clone()), store)
    }

    #[tokio::test]
    async fn register_creates_once() {
        let (log, store) = memory_log();
        assert!(log.register("5511", "Maria").await.unwrap());
        assert!(!log.register("5511", "Maria Silva").await.unwrap());

        let records = store.snapshot().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].display_name, "Maria");
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn choices_append_in_order_with_duplicates() {
        let (log, _store) = memory_log();
        log.register("5511", "Ana").await.unwrap();
        for option in ["3", "1", "3"] {
            assert!(log.record_choice("5511", option).await.unwrap());
        }
        let record = log.get("5511").await.unwrap();
        assert_eq!(record.chosen_options, ["3", "1", "3"]);
    }

    #[tokio::test]
    async fn choice_without_record_writes_nothing() {
        let (log, store) = memory_log();
        assert!(!log.record_choice("5599", "1").await.unwrap());
        assert!(store.snapshot().await.is_empty());
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn unreadable_store_reads_as_empty() {
        let store = Arc::new(MemoryStore::with_records(vec![ContactRecord::new("5511", "Ana")]));
        let log = ContactLog::new(store.clone());
        store.fail_loads(true);
        assert_eq!(log.count().await, 0);
        assert!(log.get("5511").await.is_none());
    }

    #[tokio::test]
    async fn unreadable_store_is_never_overwritten() {
        let store = Arc::new(MemoryStore::with_records(vec![ContactRecord::new("5511", "Ana")]));
        let log = ContactLog::new(store.clone());
        store.fail_loads(true);

        assert!(matches!(
            log.register("5599", "Bia").await,
            Err(StoreError::Read { .. })
        ));
        assert!(matches!(
            log.record_choice("5511", "1").await,
            Err(StoreError::Read { .. })
        ));
        assert_eq!(store.save_count(), 0);

        store.fail_loads(false);
        assert_eq!(log.all().await, vec![ContactRecord::new("5511", "Ana")]);
    }

    #[tokio::test]
    async fn duplicate_ids_are_merged_in_file_order() {
        let mut first = ContactRecord::new("5511", "Ana");
        first.chosen_options = vec!["1".into()];
        let mut second = ContactRecord::new("5511", "Ana Paula");
        second.chosen_options = vec!["4".into(), "1".into()];
        let other = ContactRecord::new("5521", "Bia");

        let store = Arc::new(MemoryStore::with_records(vec![first, other, second]));
        let log = ContactLog::new(store.clone());

        assert_eq!(log.count().await, 2);
        assert!(!log.register("5511", "Ana").await.unwrap());
        assert!(log.record_choice("5511", "2").await.unwrap());

        let saved = store.snapshot().await;
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].display_name, "Ana");
        assert_eq!(saved[0].chosen_options, ["1", "4", "1", "2"]);
        assert_eq!(saved[1].id, "5521");
    }

    #[tokio::test]
    async fn save_failure_surfaces_as_error() {
        let (log, store) = memory_log();
        store.fail_saves(true);
        assert!(matches!(
            log.register("5511", "Ana").await,
            Err(StoreError::Write { .. })
        ));
    }

    #[tokio::test]
    async fn concurrent_registrations_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path().join("data.json")));
        let log = Arc::new(ContactLog::new(store));

        let handles: Vec<_> = (0..25)
            .map(|i| {
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    log.register(&format!("55119000000{i:02}"), "Cliente").await
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().unwrap());
        }

        assert_eq!(log.count().await, 25);
    }

    #[tokio::test]
    async fn concurrent_choices_for_one_contact_are_all_kept() {
        let (log, _store) = memory_log();
        let log = Arc::new(log);
        log.register("5511", "Ana").await.unwrap();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let log = Arc::clone(&log);
                tokio::spawn(async move { log.record_choice("5511", "2").await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().unwrap());
        }

        assert_eq!(log.get("5511").await.unwrap().chosen_options.len(), 10);
    }
}
