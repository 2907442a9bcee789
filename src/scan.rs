//! Photo directory streaming
//!
//! Libraries can hold hundreds of thousands of photos, so directories are
//! never collected up front: [`PhotoSource::photos`] returns a lazy iterator
//! over the regular files directly inside the directory whose extension is on
//! the allow-list. Entries that cannot be read are logged and skipped; a
//! directory that cannot be read at all behaves as an empty one.

use std::path::{Path, PathBuf};
use tracing::{error, warn};
use walkdir::WalkDir;

/// File name used as the identity key for caches and history
pub fn photo_name(path: &Path) -> Option<String> {
    path.file_name().map(|name| name.to_string_lossy().into_owned())
}

/// A directory of photos that can be streamed any number of times
#[derive(Debug, Clone)]
pub struct PhotoSource {
    dir: PathBuf,
    extensions: Vec<String>,
}

impl PhotoSource {
    pub fn new(dir: impl Into<PathBuf>, extensions: &[String]) -> Self {
        Self {
            dir: dir.into(),
            extensions: extensions.iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Check if a path carries an allowed extension
    pub fn is_photo(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let ext = e.to_lowercase();
                self.extensions.iter().any(|allowed| allowed == &ext)
            })
            .unwrap_or(false)
    }

    /// Start a fresh pass over the directory
    pub fn photos(&self) -> Photos<'_> {
        let entries = if self.dir.is_dir() {
            Some(
                WalkDir::new(&self.dir)
                    .min_depth(1)
                    .max_depth(1)
                    .follow_links(true)
                    .into_iter(),
            )
        } else {
            warn!(dir = %self.dir.display(), "Directory does not exist");
            None
        };

        Photos {
            source: self,
            entries,
        }
    }
}

/// Lazy iterator over the photos of one directory pass
pub struct Photos<'a> {
    source: &'a PhotoSource,
    entries: Option<walkdir::IntoIter>,
}

impl Iterator for Photos<'_> {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        let entries = self.entries.as_mut()?;
        loop {
            match entries.next()? {
                Ok(entry) => {
                    if entry.file_type().is_file() && self.source.is_photo(entry.path()) {
                        return Some(entry.into_path());
                    }
                }
                Err(e) => {
                    if e.depth() == 0 {
                        error!(dir = %self.source.dir.display(), error = %e, "Error reading directory");
                    } else {
                        warn!(error = %e, "Error accessing directory entry");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs;
    use tempfile::tempdir;

    fn extensions() -> Vec<String> {
        vec!["jpg".into(), "jpeg".into(), "png".into()]
    }

    fn names(source: &PhotoSource) -> BTreeSet<String> {
        source
            .photos()
            .filter_map(|p| photo_name(&p))
            .collect()
    }

    #[test]
    fn test_filters_by_extension_case_insensitive() {
        let dir = tempdir().unwrap();
        for name in ["a.jpg", "b.JPEG", "c.Png", "d.txt", "e", "f.mp4"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }

        let source = PhotoSource::new(dir.path(), &extensions());
        let expected: BTreeSet<String> =
            ["a.jpg", "b.JPEG", "c.Png"].iter().map(|s| s.to_string()).collect();
        assert_eq!(names(&source), expected);
    }

    #[test]
    fn test_ignores_subdirectories() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("Gallery.jpg")).unwrap();
        fs::create_dir(dir.path().join("Gallery")).unwrap();
        fs::write(dir.path().join("Gallery").join("inner.jpg"), b"x").unwrap();
        fs::write(dir.path().join("top.jpg"), b"x").unwrap();

        let source = PhotoSource::new(dir.path(), &extensions());
        let found = names(&source);
        assert_eq!(found.len(), 1);
        assert!(found.contains("top.jpg"));
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let source = PhotoSource::new(dir.path().join("absent"), &extensions());
        assert_eq!(source.photos().count(), 0);
    }

    #[test]
    fn test_restartable() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.jpg"), b"x").unwrap();

        let source = PhotoSource::new(dir.path(), &extensions());
        assert_eq!(source.photos().count(), 1);
        fs::write(dir.path().join("b.jpg"), b"x").unwrap();
        assert_eq!(source.photos().count(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_broken_symlink_is_skipped() {
        let dir = tempdir().unwrap();
        std::os::unix::fs::symlink(dir.path().join("nowhere.jpg"), dir.path().join("link.jpg"))
            .unwrap();
        fs::write(dir.path().join("real.jpg"), b"x").unwrap();

        let source = PhotoSource::new(dir.path(), &extensions());
        let found = names(&source);
        assert_eq!(found.len(), 1);
        assert!(found.contains("real.jpg"));
    }
}
