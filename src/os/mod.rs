//! Platform-specific file moves.
//!
//! Photos move between the library and the gallery without ever replacing a
//! file that already exists at the destination.

#[cfg(target_os = "linux")]
mod linux;

use filetime::FileTime;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::Path;
use tracing::{debug, warn};

/// Rename `from` to `to`, failing with `AlreadyExists` if `to` exists.
pub fn rename_noreplace(from: &Path, to: &Path) -> io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        match linux::renameat2_noreplace(from, to) {
            Ok(()) => return Ok(()),
            Err(e) if linux::is_unsupported(&e) => {
                debug!(error = %e, "renameat2 unsupported here, falling back to hard link");
            }
            Err(e) => return Err(e),
        }
    }

    // Hard link + unlink never replaces an existing destination
    match fs::hard_link(from, to) {
        Ok(()) => {
            if let Err(e) = fs::remove_file(from) {
                // Keep only the original
                let _ = fs::remove_file(to);
                return Err(e);
            }
            return Ok(());
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists || is_cross_device(&e) => return Err(e),
        Err(e) => {
            debug!(error = %e, "Hard link failed, falling back to checked rename");
        }
    }

    if to.exists() {
        return Err(io::Error::new(
            ErrorKind::AlreadyExists,
            format!("{} already exists", to.display()),
        ));
    }
    fs::rename(from, to)
}

/// Move a file without overwriting, copying across filesystems when needed.
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match rename_noreplace(from, to) {
        Err(e) if is_cross_device(&e) => {
            debug!(?from, ?to, "Cross-device move, copying");
            copy_then_remove(from, to)
        }
        other => other,
    }
}

fn is_cross_device(err: &io::Error) -> bool {
    if err.kind() == ErrorKind::CrossesDevices {
        return true;
    }
    #[cfg(target_os = "linux")]
    {
        err.raw_os_error() == Some(libc::EXDEV)
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}

/// Copy into a freshly created destination, keep the timestamps, remove the source.
fn copy_then_remove(from: &Path, to: &Path) -> io::Result<()> {
    let mut reader = File::open(from)?;
    let metadata = reader.metadata()?;
    let mut writer = OpenOptions::new().write(true).create_new(true).open(to)?;

    if let Err(e) = io::copy(&mut reader, &mut writer).and_then(|_| writer.sync_all()) {
        drop(writer);
        let _ = fs::remove_file(to);
        return Err(e);
    }
    drop(writer);

    let mtime = FileTime::from_last_modification_time(&metadata);
    let atime = FileTime::from_last_access_time(&metadata);
    if let Err(e) = filetime::set_file_times(to, atime, mtime) {
        warn!(path = ?to, error = %e, "Failed to restore timestamps");
    }

    drop(reader);
    fs::remove_file(from)
}
