//! Ownership inspection and change
//!
//! `try_get_ownership` is the single place that knows whether a platform's
//! metadata carries POSIX ownership. Everything above it deals in
//! `Option<Identity>`, where `None` means "unknown, leave it alone".

use crate::identity::Identity;
use std::fs::{File, Metadata};
use std::path::Path;

/// Raw-pair form of "ownership unknown"
pub const UNKNOWN_OWNER: (i64, i64) = (-1, -1);

/// Owning identity of a filesystem entry, if the platform exposes one
#[cfg(unix)]
#[must_use]
pub fn try_get_ownership(metadata: &Metadata) -> Option<Identity> {
    use std::os::unix::fs::MetadataExt;

    Some(Identity::new(metadata.uid(), metadata.gid()))
}

/// Owning identity of a filesystem entry, if the platform exposes one
#[cfg(not(unix))]
#[must_use]
pub fn try_get_ownership(_metadata: &Metadata) -> Option<Identity> {
    None
}

/// Owning `(uid, gid)` as signed values, `(-1, -1)` when unknown
#[must_use]
pub fn owner_pair(metadata: &Metadata) -> (i64, i64) {
    raw_owner_pair(try_get_ownership(metadata))
}

/// Signed raw-pair form of an optional owner
#[must_use]
pub fn raw_owner_pair(owner: Option<Identity>) -> (i64, i64) {
    owner.map_or(UNKNOWN_OWNER, |id| (i64::from(id.uid), i64::from(id.gid)))
}

/// Change ownership of `path`, following symlinks
///
/// `None` leaves both ids unchanged.
///
/// # Errors
///
/// Returns the underlying OS error, typically `EPERM` when not privileged.
#[cfg(unix)]
pub fn change_owner(path: &Path, owner: Option<Identity>) -> std::io::Result<()> {
    use nix::unistd::{chown, Gid, Uid};

    let Some(owner) = owner else {
        return Ok(());
    };
    chown(
        path,
        Some(Uid::from_raw(owner.uid)),
        Some(Gid::from_raw(owner.gid)),
    )
    .map_err(std::io::Error::from)
}

/// Change ownership of `path` (unsupported on this platform)
///
/// # Errors
///
/// Returns `Unsupported` when an owner is requested.
#[cfg(not(unix))]
pub fn change_owner(_path: &Path, owner: Option<Identity>) -> std::io::Result<()> {
    match owner {
        None => Ok(()),
        Some(_) => Err(std::io::Error::from(std::io::ErrorKind::Unsupported)),
    }
}

/// Change ownership of an open file
///
/// # Errors
///
/// Returns the underlying OS error, typically `EPERM` when not privileged.
#[cfg(unix)]
pub fn change_owner_fd(file: &File, owner: Option<Identity>) -> std::io::Result<()> {
    let Some(owner) = owner else {
        return Ok(());
    };
    std::os::unix::fs::fchown(file, Some(owner.uid), Some(owner.gid))
}

/// Change ownership of an open file (unsupported on this platform)
///
/// # Errors
///
/// Returns `Unsupported` when an owner is requested.
#[cfg(not(unix))]
pub fn change_owner_fd(_file: &File, owner: Option<Identity>) -> std::io::Result<()> {
    match owner {
        None => Ok(()),
        Some(_) => Err(std::io::Error::from(std::io::ErrorKind::Unsupported)),
    }
}

#[cfg(test)]
mod raw_pair_tests {
    use super::*;

    #[test]
    fn test_unknown_owner_is_minus_one_pair() {
        assert_eq!(raw_owner_pair(None), UNKNOWN_OWNER);
        assert_eq!(raw_owner_pair(None), (-1, -1));
    }

    #[test]
    fn test_known_owner_is_widened_without_sign_change() {
        assert_eq!(raw_owner_pair(Some(Identity::new(65534, 65534))), (65534, 65534));
        // The largest valid id must not wrap into the sentinel
        assert_eq!(
            raw_owner_pair(Some(Identity::new(u32::MAX - 1, 0))),
            (i64::from(u32::MAX - 1), 0)
        );
    }
}
