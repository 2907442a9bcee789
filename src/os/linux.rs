use nix::fcntl::{RenameFlags, renameat2};
use std::io;
use std::os::fd::BorrowedFd;
use std::path::Path;

/// Atomic rename that refuses to replace an existing destination
pub(super) fn renameat2_noreplace(from: &Path, to: &Path) -> io::Result<()> {
    // SAFETY: AT_FDCWD is a constant that always names the working directory
    let cwd = unsafe { BorrowedFd::borrow_raw(libc::AT_FDCWD) };
    renameat2(cwd, from, cwd, to, RenameFlags::RENAME_NOREPLACE).map_err(io::Error::from)
}

/// Errors meaning the kernel or filesystem lacks `RENAME_NOREPLACE`
pub(super) fn is_unsupported(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::EINVAL) | Some(libc::ENOSYS) | Some(libc::EPERM)
    )
}
