//! JSON file store: the whole contact list as one pretty-printed array.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::store::model::ContactRecord;
use crate::store::traits::ContactStore;

/// File-backed contact store.
///
/// Saves go to a sibling temp file that is then renamed over the target, so a
/// crash mid-write leaves the previous list intact. A file that fails to parse
/// is renamed to `<file>.corrupt-<timestamp>` and treated as empty.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(suffix);
        self.path.with_file_name(name)
    }

    /// Move an unparseable file out of the way so the next save can't clobber it.
    async fn quarantine(&self) {
        let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
        let target = self.sibling(&format!(".corrupt-{stamp}"));
        match fs::rename(&self.path, &target).await {
            Ok(()) => warn!(
                path = %self.path.display(),
                moved_to = %target.display(),
                "Moved corrupt contact store aside"
            ),
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Could not move corrupt contact store aside"
            ),
        }
    }
}

#[async_trait]
impl ContactStore for JsonFileStore {
    fn name(&self) -> &str {
        "json"
    }

    async fn load(&self) -> Result<Vec<ContactRecord>, StoreError> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Contact store not found, starting empty");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.display().to_string(),
                    source,
                });
            }
        };

        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        // from_slice rejects invalid UTF-8 the same way it rejects bad JSON.
        match serde_json::from_slice::<Vec<ContactRecord>>(&raw) {
            Ok(records) => Ok(records),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Contact store is not a valid record list, treating as empty"
                );
                self.quarantine().await;
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, records: &[ContactRecord]) -> Result<(), StoreError> {
        let write_err = |source| StoreError::Write {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let mut body = serde_json::to_string_pretty(records)?;
        body.push('\n');

        let tmp = self.sibling(".tmp");
        fs::write(&tmp, body).await.map_err(write_err)?;
        fs::rename(&tmp, &self.path).await.map_err(write_err)?;

        info!(path = %self.path.display(), records = records.len(), "Contact store saved");
        Ok(())
    }
}
