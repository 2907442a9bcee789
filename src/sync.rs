//! Gallery reconciliation
//!
//! Brings the gallery in line with a selection using two move batches:
//! selected photos go from the library into the gallery, then gallery photos
//! that were not selected go back to the library. No move ever replaces a
//! file; when the destination name is taken, the source copy is deleted and
//! recorded as a duplicate.

use crate::cancel::CancelToken;
use crate::history::ViewHistory;
use crate::os;
use crate::scan::{PhotoSource, photo_name};
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{Level, debug, error, info, span, warn};

/// What a reconciliation did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Photos moved from the library into the gallery
    pub moved_in: usize,
    /// Photos moved from the gallery back to the library
    pub moved_back: usize,
    /// Selected photos that were already in the gallery
    pub already_present: usize,
    /// Library copies deleted because the gallery already held the name
    pub duplicates_in: Vec<String>,
    /// Gallery copies deleted because the library already held the name
    pub duplicates_back: Vec<String>,
    /// Moves that failed and were skipped
    pub failed: usize,
    /// The batch stopped early on cancellation
    pub cancelled: bool,
}

impl ReconcileReport {
    /// Total number of files moved in either direction
    pub fn moves(&self) -> usize {
        self.moved_in + self.moved_back
    }
}

enum Outcome {
    Moved,
    Duplicate,
    Failed,
}

/// Moves photos between one library and its gallery
pub struct Synchronizer<'a> {
    library: &'a Path,
    gallery: PhotoSource,
    history: &'a ViewHistory,
    cancel: &'a CancelToken,
}

impl<'a> Synchronizer<'a> {
    pub fn new(
        library: &'a Path,
        gallery: &Path,
        extensions: &[String],
        history: &'a ViewHistory,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            library,
            gallery: PhotoSource::new(gallery, extensions),
            history,
            cancel,
        }
    }

    /// Photos currently in the gallery
    pub fn gallery_photos(&self) -> Vec<PathBuf> {
        self.gallery.photos().collect()
    }

    /// Move the selection in and everything else in `previous_gallery` out.
    ///
    /// Selected photos are marked viewed as they arrive. Gallery copies deleted
    /// as duplicates on the way back are dropped from the history, which is
    /// persisted once at the end, also after a cancellation.
    pub fn reconcile(&self, previous_gallery: &[PathBuf], selection: &[PathBuf]) -> ReconcileReport {
        let _span = span!(Level::INFO, "reconcile").entered();
        let mut report = ReconcileReport::default();

        self.move_in(selection, &mut report);
        info!(moved = report.moved_in, "Moved new photos to gallery");

        if !report.cancelled {
            let selected: HashSet<String> = selection.iter().filter_map(|p| photo_name(p)).collect();
            self.move_back(previous_gallery, &selected, &mut report);
        }
        self.finish(&report);
        report
    }

    /// Move every gallery photo back to the library
    pub fn clear(&self) -> ReconcileReport {
        let _span = span!(Level::INFO, "clear").entered();
        let previous = self.gallery_photos();

        let mut report = ReconcileReport::default();
        self.move_back(&previous, &HashSet::new(), &mut report);
        self.finish(&report);
        report
    }

    fn move_in(&self, selection: &[PathBuf], report: &mut ReconcileReport) {
        for source in selection {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                return;
            }
            let Some(name) = photo_name(source) else {
                continue;
            };
            let target = self.gallery.dir().join(&name);

            if !source.exists() && target.exists() {
                debug!(%name, "Already in gallery");
                report.already_present += 1;
                continue;
            }

            match transfer(source, &target) {
                Outcome::Moved => {
                    report.moved_in += 1;
                    self.history.add(&name);
                }
                Outcome::Duplicate => {
                    debug!(%name, "Deleted library duplicate");
                    self.history.add(&name);
                    report.duplicates_in.push(name);
                }
                Outcome::Failed => report.failed += 1,
            }
        }
    }

    fn move_back(
        &self,
        previous_gallery: &[PathBuf],
        selected: &HashSet<String>,
        report: &mut ReconcileReport,
    ) {
        for photo in previous_gallery {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                return;
            }
            let Some(name) = photo_name(photo) else {
                continue;
            };
            if selected.contains(&name) {
                continue;
            }

            match transfer(photo, &self.library.join(&name)) {
                Outcome::Moved => report.moved_back += 1,
                Outcome::Duplicate => report.duplicates_back.push(name),
                Outcome::Failed => report.failed += 1,
            }
        }
    }

    fn finish(&self, report: &ReconcileReport) {
        for name in &report.duplicates_back {
            self.history.discard(name);
        }
        if !report.duplicates_back.is_empty() {
            info!(count = report.duplicates_back.len(), "Removed duplicate(s)");
        }
        if report.moved_back > 0 {
            info!(count = report.moved_back, "Moved old photos back to library");
        }
        if report.failed > 0 {
            warn!(count = report.failed, "Some photos could not be moved");
        }

        if let Err(e) = self.history.flush() {
            error!(error = %e, "Error saving viewed photos");
        }
    }
}

/// Move `source` to `target`, deleting `source` if `target` already exists
fn transfer(source: &Path, target: &Path) -> Outcome {
    match os::move_file(source, target) {
        Ok(()) => Outcome::Moved,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => match fs::remove_file(source) {
            Ok(()) => Outcome::Duplicate,
            Err(e) => {
                error!(path = ?source, error = %e, "Error removing duplicate");
                Outcome::Failed
            }
        },
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            error!(path = ?source, error = %e, "Permission denied moving photo");
            Outcome::Failed
        }
        Err(e) => {
            error!(path = ?source, error = %e, "Error moving photo");
            Outcome::Failed
        }
    }
}
