//! Persistence layer: the per-contact interaction log.

pub mod contacts;
pub mod json;
pub mod memory;
pub mod model;
pub mod traits;

pub use contacts::ContactLog;
pub use json::JsonFileStore;
pub use memory::MemoryStore;
pub use model::ContactRecord;
pub use traits::ContactStore;
