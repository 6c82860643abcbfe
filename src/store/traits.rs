//! Store accessor trait: wholesale load/save of the contact list.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::store::model::ContactRecord;

/// Backend-agnostic accessor for the contact list.
///
/// The list is always read and written as a whole. Callers that mutate it
/// must go through [`ContactLog`](crate::store::ContactLog), which serializes
/// the load-modify-save cycle.
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Short backend name for logging.
    fn name(&self) -> &str;

    /// Read every record. A missing or corrupt backing file yields an empty list.
    async fn load(&self) -> Result<Vec<ContactRecord>, StoreError>;

    /// Replace the stored list with `records`.
    async fn save(&self, records: &[ContactRecord]) -> Result<(), StoreError>;
}
