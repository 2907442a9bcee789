//! View history
//!
//! The set of photo names already shown since the last reset. The worker
//! updates it one move at a time while other threads may query it, so the set
//! sits behind its own mutex and every method takes `&self`.

use crate::error::Result;
use crate::state::{discard_temp, load_json, save_json_atomic};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info};

/// Persisted set of photo names already displayed
#[derive(Debug, Default)]
pub struct ViewHistory {
    path: Option<PathBuf>,
    names: Mutex<HashSet<String>>,
}

impl ViewHistory {
    /// History that is never written to disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the history document, falling back to an empty set on any error
    pub fn load(path: &Path) -> Self {
        discard_temp(path);

        let names = match load_json::<Vec<String>>(path) {
            Ok(Some(names)) => {
                info!(viewed = names.len(), "Loaded view history");
                names.into_iter().collect()
            }
            Ok(None) => HashSet::new(),
            Err(e) => {
                error!(?path, error = %e, "Error loading viewed photos");
                HashSet::new()
            }
        };

        Self {
            path: Some(path.to_path_buf()),
            names: Mutex::new(names),
        }
    }

    fn names(&self) -> MutexGuard<'_, HashSet<String>> {
        self.names.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names().contains(name)
    }

    pub fn add(&self, name: &str) {
        self.names().insert(name.to_string());
    }

    pub fn discard(&self, name: &str) -> bool {
        self.names().remove(name)
    }

    pub fn clear(&self) {
        self.names().clear();
    }

    pub fn len(&self) -> usize {
        self.names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names().is_empty()
    }

    /// Sorted copy of the viewed names
    pub fn snapshot(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names().iter().cloned().collect();
        names.sort();
        names
    }

    /// Write the full set atomically
    pub fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        // Serialize from a snapshot so the lock is not held during I/O
        let names = self.snapshot();
        save_json_atomic(path, &names)?;
        debug!(viewed = names.len(), "Saved view history");
        Ok(())
    }
}
