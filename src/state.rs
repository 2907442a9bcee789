//! Persisted state documents
//!
//! Both the view history and the metadata cache are flat JSON documents.
//! Writes go to a temporary sibling first and are renamed into place, so a
//! crash leaves either the previous document or the new one, never a
//! truncated file.

use crate::error::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::debug;

/// Load a JSON document, `None` when the file does not exist
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        debug!(?path, "State file does not exist");
        return Ok(None);
    }

    let file = File::open(path).map_err(|e| Error::StateFile(format!(
        "Failed to open {}: {}", path.display(), e
    )))?;
    let reader = BufReader::new(file);

    let value = serde_json::from_reader(reader)?;

    Ok(Some(value))
}

/// Write a JSON document atomically
pub fn save_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("json.tmp");

    let file = File::create(&temp_path).map_err(|e| Error::StateFile(format!(
        "Failed to create temp state file {}: {}", temp_path.display(), e
    )))?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer(&mut writer, value)?;

    let file = writer.into_inner().map_err(|e| Error::StateFile(format!(
        "Failed to flush state file {}: {}", temp_path.display(), e.error()
    )))?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path).map_err(|e| Error::StateFile(format!(
        "Failed to rename temp state file to {}: {}", path.display(), e
    )))?;

    Ok(())
}

/// Remove a stale temporary file left by an interrupted save
pub fn discard_temp(path: &Path) {
    let temp_path = path.with_extension("json.tmp");
    if temp_path.exists() && fs::remove_file(&temp_path).is_ok() {
        debug!(path = %temp_path.display(), "Removed stale temp state file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[test]
    fn test_missing_document_is_none() {
        let dir = tempdir().unwrap();
        let loaded: Option<Vec<String>> = load_json(&dir.path().join("absent.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("doc.json");

        let mut doc = BTreeMap::new();
        doc.insert("a.jpg".to_string(), 1.5f64);
        save_json_atomic(&path, &doc).unwrap();

        let loaded: BTreeMap<String, f64> = load_json(&path).unwrap().unwrap();
        assert_eq!(loaded, doc);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_document_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");
        fs::write(&path, b"{\"a.jpg\": ").unwrap();

        let loaded: Result<Option<BTreeMap<String, f64>>> = load_json(&path);
        assert!(matches!(loaded, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_discard_temp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");
        fs::write(path.with_extension("json.tmp"), b"[").unwrap();

        discard_temp(&path);
        assert!(!path.with_extension("json.tmp").exists());
    }
}
