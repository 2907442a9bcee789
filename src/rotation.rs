//! Rotation engine
//!
//! Owns the persisted stores and runs the mutating operations end to end:
//! - rotate: select photos from the library, then reconcile the gallery
//! - clear: move every gallery photo back to the library
//! - reset: forget the view history and the metadata cache

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::history::ViewHistory;
use crate::metadata::MetadataStore;
use crate::select::Selector;
use crate::sync::Synchronizer;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fmt;
use std::fs;
use std::sync::Arc;
use tracing::{Level, error, info, span, warn};

/// Terminal status of an operation, shown to the user as is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Completed(String),
    Cancelled,
    Failed(String),
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Completed(message) => f.write_str(message),
            OperationStatus::Cancelled => f.write_str("Operation cancelled"),
            OperationStatus::Failed(message) => write!(f, "Error: {}", message),
        }
    }
}

/// Engine state shared by every operation
pub struct Rotator {
    config: Config,
    metadata: MetadataStore,
    history: Arc<ViewHistory>,
    rng: StdRng,
    cancel: CancelToken,
}

impl Rotator {
    /// Create an engine, loading the stores from the configured state directory
    pub fn new(config: Config) -> Self {
        let metadata = MetadataStore::load(&config.metadata_file());
        let history = ViewHistory::load(&config.history_file());
        Self::with_stores(config, metadata, history)
    }

    /// Create an engine around existing stores
    pub fn with_stores(config: Config, metadata: MetadataStore, history: ViewHistory) -> Self {
        let rng = seeded_rng(config.seed);
        Self {
            config,
            metadata,
            history: Arc::new(history),
            rng,
            cancel: CancelToken::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Apply new settings; the random generator is reseeded when the seed changes
    pub fn set_config(&mut self, config: Config) {
        if config.seed != self.config.seed {
            self.rng = seeded_rng(config.seed);
        }
        self.config = config;
    }

    pub fn history(&self) -> &Arc<ViewHistory> {
        &self.history
    }

    /// Token polled by running operations
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Select new photos and swap them into the gallery
    pub fn rotate(&mut self) -> OperationStatus {
        let _span = span!(Level::INFO, "rotate").entered();
        info!("Starting photo switch...");

        let status = match self.try_rotate() {
            Ok(status) => status,
            Err(e) => {
                error!(error = %e, "Photo switch failed");
                OperationStatus::Failed(e.to_string())
            }
        };
        self.flush_metadata();
        status
    }

    fn try_rotate(&mut self) -> Result<OperationStatus> {
        let library = self.config.library_dir.clone();
        if !library.is_dir() {
            return Err(Error::LibraryNotFound(library));
        }
        let gallery = self.config.gallery_path();
        fs::create_dir_all(&gallery)?;

        info!("Selecting new photos...");
        let request = self.config.selection_request();
        let selection = Selector::new(
            &mut self.metadata,
            &self.history,
            &self.cancel,
            &mut self.rng,
            &self.config.image_extensions,
        )
        .with_flush_interval(self.config.limits.cache_flush_interval)
        .select(&request);

        if selection.cancelled {
            return Ok(OperationStatus::Cancelled);
        }

        let sync = Synchronizer::new(
            &library,
            &gallery,
            &self.config.image_extensions,
            &self.history,
            &self.cancel,
        );
        let previous = sync.gallery_photos();
        let report = sync.reconcile(&previous, &selection.photos);
        if report.cancelled {
            return Ok(OperationStatus::Cancelled);
        }

        let shown = selection.names().len();
        info!(
            photos = shown,
            moved_in = report.moved_in,
            moved_back = report.moved_back,
            "Switch complete"
        );
        Ok(OperationStatus::Completed(format!("Switched to {} photos", shown)))
    }

    /// Move every gallery photo back to the library
    pub fn clear(&mut self) -> OperationStatus {
        let _span = span!(Level::INFO, "clear_gallery").entered();
        info!("Starting clear gallery...");

        let gallery = self.config.gallery_path();
        if !gallery.is_dir() {
            warn!(gallery = %gallery.display(), "Gallery directory does not exist");
            return OperationStatus::Completed("Gallery directory does not exist".into());
        }

        let report = Synchronizer::new(
            &self.config.library_dir,
            &gallery,
            &self.config.image_extensions,
            &self.history,
            &self.cancel,
        )
        .clear();

        if report.cancelled {
            return OperationStatus::Cancelled;
        }
        info!(count = report.moved_back, "Clear complete");
        OperationStatus::Completed(format!("Moved {} photos back", report.moved_back))
    }

    /// Forget every viewed photo and every cached record
    pub fn reset_history(&mut self) -> Result<()> {
        self.history.clear();
        self.history.flush()?;
        self.metadata.clear();
        self.metadata.flush()?;
        info!("History and metadata cache reset");
        Ok(())
    }

    /// Persist both stores
    pub fn flush(&mut self) -> Result<()> {
        self.history.flush()?;
        self.metadata.flush()
    }

    fn flush_metadata(&mut self) {
        if let Err(e) = self.metadata.flush() {
            error!(error = %e, "Error saving metadata cache");
        }
    }
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OrderMode, OrientationFilter};
    use crate::metadata::MetadataRecord;
    use std::path::Path;
    use tempfile::tempdir;

    fn config(library: &Path) -> Config {
        Config {
            library_dir: library.to_path_buf(),
            state_dir: Some(library.join(".state")),
            photo_count: 2,
            order: OrderMode::Newest,
            orientation: OrientationFilter::Both,
            seed: Some(7),
            ..Config::default()
        }
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(
            OperationStatus::Completed("Switched to 3 photos".into()).to_string(),
            "Switched to 3 photos"
        );
        assert_eq!(OperationStatus::Cancelled.to_string(), "Operation cancelled");
        assert_eq!(
            OperationStatus::Failed("boom".into()).to_string(),
            "Error: boom"
        );
    }

    #[test]
    fn test_rotate_missing_library() {
        let dir = tempdir().unwrap();
        let mut rotator = Rotator::new(config(&dir.path().join("missing")));

        let status = rotator.rotate();
        assert!(matches!(status, OperationStatus::Failed(ref m) if m.contains("does not exist")));
        assert!(!dir.path().join("missing").exists());
    }

    #[test]
    fn test_rotate_then_clear() {
        let dir = tempdir().unwrap();
        let library = dir.path();
        let mut metadata = MetadataStore::in_memory();
        for (name, date) in [("a.jpg", 1.0), ("b.jpg", 2.0), ("c.jpg", 3.0)] {
            fs::write(library.join(name), b"x").unwrap();
            metadata.insert(name, MetadataRecord { date: Some(date), orientation: None });
        }

        let mut rotator = Rotator::with_stores(config(library), metadata, ViewHistory::in_memory());
        let status = rotator.rotate();
        assert_eq!(status.to_string(), "Switched to 2 photos");
        assert!(library.join("Gallery").join("c.jpg").exists());
        assert!(library.join("Gallery").join("b.jpg").exists());
        assert_eq!(rotator.history().snapshot(), vec!["b.jpg", "c.jpg"]);

        let status = rotator.clear();
        assert_eq!(status.to_string(), "Moved 2 photos back");
        assert!(library.join("c.jpg").exists());
        assert!(library.join("b.jpg").exists());
    }

    #[test]
    fn test_rotation_survives_unwritable_state() {
        let dir = tempdir().unwrap();
        let library = dir.path().join("library");
        fs::create_dir(&library).unwrap();
        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            fs::write(library.join(name), b"x").unwrap();
        }
        // A regular file where the state directory should be
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"").unwrap();

        let cfg = Config {
            state_dir: Some(blocker.join("state")),
            order: OrderMode::Random,
            ..config(&library)
        };
        let mut rotator = Rotator::new(cfg.clone());

        let status = rotator.rotate();
        assert_eq!(status.to_string(), "Switched to 2 photos");
        assert_eq!(fs::read_dir(library.join("Gallery")).unwrap().count(), 2);
        assert_eq!(rotator.history().snapshot().len(), 2);
        assert!(!cfg.history_file().exists());
        assert!(rotator.flush().is_err());
    }

    #[test]
    fn test_clear_without_gallery() {
        let dir = tempdir().unwrap();
        let mut rotator = Rotator::new(config(dir.path()));
        assert_eq!(rotator.clear().to_string(), "Gallery directory does not exist");
    }

    #[test]
    fn test_cancelled_rotation() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        let mut rotator = Rotator::new(config(dir.path()));
        rotator.cancel_token().cancel();

        assert_eq!(rotator.rotate(), OperationStatus::Cancelled);
        assert!(dir.path().join("a.jpg").exists());
    }

    #[test]
    fn test_reset_history_clears_both_stores() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path());
        let mut rotator = Rotator::new(cfg.clone());
        rotator.history().add("a.jpg");
        rotator.metadata.insert("a.jpg", MetadataRecord { date: Some(1.0), orientation: None });
        rotator.flush().unwrap();

        rotator.reset_history().unwrap();
        assert!(ViewHistory::load(&cfg.history_file()).is_empty());
        assert!(MetadataStore::load(&cfg.metadata_file()).is_empty());
    }
}
