//! Photo metadata cache
//!
//! Maps a photo's file name (not its path, so a photo keeps its entry while it
//! travels between library and gallery) to its capture date and orientation.
//! Values are computed lazily on first lookup and written back on `flush`.
//!
//! The document also accepts the older shape where each name mapped straight
//! to a timestamp; such documents are upgraded in memory and rewritten on the
//! next flush.

use crate::config::OrientationFilter;
use crate::error::{Error, Result};
use crate::state::{discard_temp, load_json, save_json_atomic};
use crate::time::{Timestamp, resolve_capture_time};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Orientation derived from pixel dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    /// Landscape when strictly wider than tall; squares count as portrait
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        if width > height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }
}

/// Whether a photo passes the orientation filter.
///
/// Photos whose orientation is unknown always pass.
pub fn matches_filter(orientation: Option<Orientation>, filter: OrientationFilter) -> bool {
    match (filter, orientation) {
        (OrientationFilter::Both, _) | (_, None) => true,
        (OrientationFilter::Portrait, Some(o)) => o == Orientation::Portrait,
        (OrientationFilter::Landscape, Some(o)) => o == Orientation::Landscape,
    }
}

/// Cached facts about one photo
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Resolved capture time
    #[serde(default)]
    pub date: Option<Timestamp>,

    /// Orientation, absent when not yet known
    #[serde(default)]
    pub orientation: Option<Orientation>,
}

/// On-disk entry, current or legacy shape
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Legacy(Timestamp),
    Record(MetadataRecord),
}

/// Lazily populated, explicitly flushed metadata cache
#[derive(Debug, Default)]
pub struct MetadataStore {
    path: Option<PathBuf>,
    records: HashMap<String, MetadataRecord>,
    dirty: bool,
}

impl MetadataStore {
    /// Cache that is never written to disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the cache document, falling back to an empty cache on any error
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(store) => store,
            Err(e) => {
                error!(?path, error = %e, "Error loading metadata cache");
                Self {
                    path: Some(path.to_path_buf()),
                    ..Self::default()
                }
            }
        }
    }

    /// Load the cache document
    pub fn try_load(path: &Path) -> Result<Self> {
        discard_temp(path);

        let mut store = Self {
            path: Some(path.to_path_buf()),
            ..Self::default()
        };

        let Some(entries) = load_json::<HashMap<String, StoredEntry>>(path)? else {
            return Ok(store);
        };

        let mut legacy = 0usize;
        for (name, entry) in entries {
            let record = match entry {
                StoredEntry::Record(record) => record,
                StoredEntry::Legacy(date) => {
                    legacy += 1;
                    MetadataRecord {
                        date: Some(date),
                        orientation: None,
                    }
                }
            };
            store.records.insert(name, record);
        }

        if legacy > 0 {
            info!(entries = legacy, "Converting old cache format to new format");
            store.dirty = true;
        }

        info!(entries = store.records.len(), "Loaded metadata cache");
        Ok(store)
    }

    /// Capture date of a photo, resolved and cached on a miss
    pub fn date(&mut self, name: &str, path: &Path) -> Timestamp {
        if let Some(date) = self.records.get(name).and_then(|r| r.date) {
            return date;
        }

        let resolved = resolve_capture_time(path);
        debug!(name, source = ?resolved.source, "Resolved photo date");

        self.records.entry(name.to_string()).or_default().date = Some(resolved.timestamp);
        self.dirty = true;
        resolved.timestamp
    }

    /// Orientation of a photo, probed and cached on a miss.
    ///
    /// `None` means the image could not be decoded; it is not remembered, so
    /// the next lookup probes again.
    pub fn orientation(&mut self, name: &str, path: &Path) -> Option<Orientation> {
        if let Some(orientation) = self.records.get(name).and_then(|r| r.orientation) {
            return Some(orientation);
        }

        match probe_orientation(path) {
            Ok(orientation) => {
                self.records.entry(name.to_string()).or_default().orientation = Some(orientation);
                self.dirty = true;
                Some(orientation)
            }
            Err(e) => {
                warn!(?path, error = %e, "Error getting orientation");
                None
            }
        }
    }

    /// Cached record for a name
    pub fn get(&self, name: &str) -> Option<&MetadataRecord> {
        self.records.get(name)
    }

    /// Store a record, replacing any cached one
    pub fn insert(&mut self, name: impl Into<String>, record: MetadataRecord) {
        self.records.insert(name.into(), record);
        self.dirty = true;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether there are changes not yet written
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Drop every cached record
    pub fn clear(&mut self) {
        self.records.clear();
        self.dirty = true;
    }

    /// Write the cache document if anything changed
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let Some(path) = &self.path else {
            self.dirty = false;
            return Ok(());
        };

        save_json_atomic(path, &self.records)?;
        self.dirty = false;
        debug!(entries = self.records.len(), "Saved metadata cache");
        Ok(())
    }
}

/// Decode just enough of the image to learn its dimensions
fn probe_orientation(path: &Path) -> Result<Orientation> {
    let decode_error = |message: String| Error::ImageDecode {
        path: path.to_path_buf(),
        message,
    };

    let (width, height) = image::ImageReader::open(path)?
        .with_guessed_format()?
        .into_dimensions()
        .map_err(|e| decode_error(e.to_string()))?;

    Ok(Orientation::from_dimensions(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_png(path: &Path, width: u32, height: u32) {
        image::RgbImage::new(width, height).save(path).unwrap();
    }

    #[test]
    fn test_orientation_from_dimensions() {
        assert_eq!(Orientation::from_dimensions(40, 20), Orientation::Landscape);
        assert_eq!(Orientation::from_dimensions(20, 40), Orientation::Portrait);
        assert_eq!(Orientation::from_dimensions(30, 30), Orientation::Portrait);
    }

    #[test]
    fn test_unknown_orientation_matches_every_filter() {
        for filter in [
            OrientationFilter::Both,
            OrientationFilter::Portrait,
            OrientationFilter::Landscape,
        ] {
            assert!(matches_filter(None, filter));
        }
        assert!(!matches_filter(Some(Orientation::Portrait), OrientationFilter::Landscape));
        assert!(matches_filter(Some(Orientation::Portrait), OrientationFilter::Portrait));
        assert!(matches_filter(Some(Orientation::Landscape), OrientationFilter::Both));
    }

    #[test]
    fn test_orientation_probe_is_cached() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wide.png");
        write_png(&path, 40, 20);

        let mut store = MetadataStore::in_memory();
        assert_eq!(store.orientation("wide.png", &path), Some(Orientation::Landscape));
        assert!(store.is_dirty());

        // Cached by name: the file is no longer needed
        fs::remove_file(&path).unwrap();
        assert_eq!(store.orientation("wide.png", &path), Some(Orientation::Landscape));
    }

    #[test]
    fn test_undecodable_orientation_is_not_cached() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        fs::write(&path, b"garbage").unwrap();

        let mut store = MetadataStore::in_memory();
        assert_eq!(store.orientation("broken.jpg", &path), None);
        assert!(store.get("broken.jpg").is_none());

        write_png(&path, 10, 30);
        assert_eq!(store.orientation("broken.jpg", &path), Some(Orientation::Portrait));
    }

    #[test]
    fn test_cached_date_wins_over_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.png");
        write_png(&path, 4, 4);

        let mut store = MetadataStore::in_memory();
        store.insert(
            "a.png",
            MetadataRecord {
                date: Some(1000.0),
                orientation: None,
            },
        );
        assert_eq!(store.date("a.png", &path), 1000.0);
    }

    #[test]
    fn test_date_miss_populates_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.png");
        write_png(&path, 4, 4);

        let mut store = MetadataStore::in_memory();
        let date = store.date("a.png", &path);
        assert_eq!(store.get("a.png").unwrap().date, Some(date));
        assert_eq!(store.get("a.png").unwrap().orientation, None);
    }

    #[test]
    fn test_flush_skipped_when_clean() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo_metadata.json");

        let mut store = MetadataStore::load(&path);
        store.flush().unwrap();
        assert!(!path.exists());

        store.insert("a.jpg", MetadataRecord::default());
        store.flush().unwrap();
        assert!(path.exists());
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo_metadata.json");

        let mut store = MetadataStore::load(&path);
        store.insert(
            "a.jpg",
            MetadataRecord {
                date: Some(1_700_000_000.5),
                orientation: Some(Orientation::Landscape),
            },
        );
        store.flush().unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["a.jpg"]["orientation"], "landscape");
        assert_eq!(raw["a.jpg"]["date"], 1_700_000_000.5);

        let reloaded = MetadataStore::load(&path);
        assert!(!reloaded.is_dirty());
        assert_eq!(
            reloaded.get("a.jpg").unwrap().orientation,
            Some(Orientation::Landscape)
        );
    }

    #[test]
    fn test_legacy_document_is_upgraded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo_metadata.json");
        fs::write(&path, r#"{"old.jpg": 1600000000.0, "older.jpg": 1500000000}"#).unwrap();

        let mut store = MetadataStore::load(&path);
        assert!(store.is_dirty());
        assert_eq!(store.get("old.jpg").unwrap().date, Some(1_600_000_000.0));
        assert_eq!(store.get("older.jpg").unwrap().orientation, None);

        store.flush().unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["old.jpg"]["date"], 1_600_000_000.0);
        assert!(raw["old.jpg"]["orientation"].is_null());
    }

    #[test]
    fn test_null_fields_accepted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo_metadata.json");
        fs::write(&path, r#"{"a.jpg": {"date": null, "orientation": "portrait"}, "b.jpg": {}}"#)
            .unwrap();

        let store = MetadataStore::load(&path);
        assert!(!store.is_dirty());
        assert_eq!(store.get("a.jpg").unwrap().date, None);
        assert_eq!(
            store.get("a.jpg").unwrap().orientation,
            Some(Orientation::Portrait)
        );
        assert_eq!(store.get("b.jpg").unwrap(), &MetadataRecord::default());
    }

    #[test]
    fn test_corrupt_document_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo_metadata.json");
        fs::write(&path, b"not json").unwrap();

        let mut store = MetadataStore::load(&path);
        assert!(store.is_empty());

        store.insert("a.jpg", MetadataRecord::default());
        store.flush().unwrap();
        assert_eq!(MetadataStore::load(&path).len(), 1);
    }
}
