//! Capture time resolution
//!
//! A photo's date is taken from the first source that yields one:
//! 1. EXIF capture tags
//! 2. File system creation time (where the platform records it)
//! 3. File system modification time
//!
//! When even `stat` fails the current time is used so the photo still gets a
//! sortable value.

pub mod exif;

use chrono::{Local, NaiveDateTime, TimeZone};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Seconds since the Unix epoch, as stored in the metadata document
pub type Timestamp = f64;

/// Source of a resolved timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSource {
    /// Extracted from EXIF metadata
    Exif,
    /// File system creation (birth) time
    Created,
    /// File system modification time
    Modified,
    /// Wall clock at lookup time; nothing else was readable
    Now,
}

/// Result of timestamp resolution
#[derive(Debug, Clone, Copy)]
pub struct ResolvedTime {
    pub timestamp: Timestamp,
    pub source: TimeSource,
}

/// Resolve the capture time of a photo
pub fn resolve_capture_time(path: &Path) -> ResolvedTime {
    match exif::extract_exif_time(path) {
        Ok(datetime) => {
            debug!(?path, "Resolved time from EXIF");
            return ResolvedTime {
                timestamp: local_timestamp(&datetime),
                source: TimeSource::Exif,
            };
        }
        Err(e) => debug!(?path, error = %e, "No EXIF time, using file system time"),
    }

    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!(?path, error = %e, "Error getting date, using current time");
            return ResolvedTime {
                timestamp: now(),
                source: TimeSource::Now,
            };
        }
    };

    if let Ok(created) = metadata.created() {
        return ResolvedTime {
            timestamp: system_timestamp(created),
            source: TimeSource::Created,
        };
    }

    match metadata.modified() {
        Ok(modified) => ResolvedTime {
            timestamp: system_timestamp(modified),
            source: TimeSource::Modified,
        },
        Err(e) => {
            warn!(?path, error = %e, "No file system time, using current time");
            ResolvedTime {
                timestamp: now(),
                source: TimeSource::Now,
            }
        }
    }
}

/// Current wall-clock time
pub fn now() -> Timestamp {
    system_timestamp(SystemTime::now())
}

/// Convert a system time to epoch seconds (negative before 1970)
pub fn system_timestamp(time: SystemTime) -> Timestamp {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}

/// EXIF times carry no zone; they are read as local wall-clock time
fn local_timestamp(datetime: &NaiveDateTime) -> Timestamp {
    let millis = match Local.from_local_datetime(datetime).earliest() {
        Some(local) => local.timestamp_millis(),
        None => datetime.and_utc().timestamp_millis(),
    };
    millis as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_falls_back_to_file_system_time() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, b"no exif here").unwrap();

        let resolved = resolve_capture_time(&path);
        assert!(matches!(
            resolved.source,
            TimeSource::Created | TimeSource::Modified
        ));
        assert!((resolved.timestamp - now()).abs() < 3600.0);
    }

    #[test]
    fn test_missing_file_uses_current_time() {
        let dir = tempdir().unwrap();
        let before = now();
        let resolved = resolve_capture_time(&dir.path().join("gone.jpg"));
        assert_eq!(resolved.source, TimeSource::Now);
        assert!(resolved.timestamp >= before);
    }

    #[test]
    fn test_system_timestamp_before_epoch() {
        let time = UNIX_EPOCH - Duration::from_secs(10);
        assert_eq!(system_timestamp(time), -10.0);
        assert_eq!(system_timestamp(UNIX_EPOCH + Duration::from_millis(1500)), 1.5);
    }
}
