//! Staging host files into a task's private filesystem root
//!
//! A staged file is hardlinked when possible, which shares the source inode
//! and costs nothing. When linking fails (the destination is on another
//! device, the filesystem has no hardlinks) or the caller forbids it (secrets
//! must not share inode history with the host), the bytes are copied and the
//! copy is given an explicit mode and owner.
//!
//! # Idempotency
//!
//! A destination that already exists is treated as already staged and is not
//! inspected. This keeps agent restarts from redoing or clobbering work a
//! running task may depend on, at the price of never refreshing a destination
//! whose host source has since changed.
//!
//! # Concurrency
//!
//! The existence check and the write are not atomic. Two stagers racing on the
//! same destination can both decide to write; callers serialize staging per
//! destination.
//!
//! # Dangling destination symlinks
//!
//! The existence check follows symlinks, so a destination that is a symlink to
//! a missing target counts as absent. The hardlink then fails because the
//! name is taken, and the copy opens the destination with create/truncate,
//! which writes through the link and creates its target. When running as root
//! that target can lie outside the task root. Callers staging into a tree a
//! task has already written to must remove such links first.

use crate::error::{AllocDirError, Result};
use fs_ownership::{change_owner_fd, Identity};
use std::fs::{File, OpenOptions, Permissions};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::Path;
use tracing::{debug, trace};

/// Whether staging may share the source inode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StageMode {
    /// Hardlink, copying only when the link fails
    #[default]
    LinkOrCopy,
    /// Always copy, never share the source inode
    CopyOnly,
}

/// Options applied to every file of a staging pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageOptions {
    /// Link policy
    pub mode: StageMode,
}

impl StageOptions {
    /// Options that never hardlink
    #[must_use]
    pub const fn copy_only() -> Self {
        Self {
            mode: StageMode::CopyOnly,
        }
    }
}

/// What a staging call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staged {
    /// The destination already existed; nothing was read or written
    AlreadyPresent,
    /// The destination is a hardlink to the source
    Linked,
    /// The source was copied
    Copied {
        /// Bytes written to the destination
        bytes: u64,
    },
}

/// Stage `src` at `dst`, hardlinking when possible
///
/// `owner` and `mode` only apply when the file has to be copied; a hardlink
/// keeps the source's ownership and mode. `None` leaves the copy owned by
/// whoever created it.
///
/// # Errors
///
/// Returns `StagingFailed` if the copy fallback fails at any step. The
/// destination is left as the failing step produced it; re-stage into a fresh
/// path or delete it before retrying.
pub fn stage(src: &Path, dst: &Path, owner: Option<Identity>, mode: u32) -> Result<Staged> {
    stage_with(src, dst, owner, mode, &StageOptions::default())
}

/// Stage `src` at `dst` with explicit options
///
/// # Errors
///
/// See [`stage`].
pub fn stage_with(
    src: &Path,
    dst: &Path,
    owner: Option<Identity>,
    mode: u32,
    options: &StageOptions,
) -> Result<Staged> {
    // Any stat result counts as present; stat errors count as absent
    if std::fs::metadata(dst).is_ok() {
        trace!(dst = %dst.display(), "already staged");
        return Ok(Staged::AlreadyPresent);
    }

    if options.mode == StageMode::LinkOrCopy {
        match std::fs::hard_link(src, dst) {
            Ok(()) => {
                debug!(src = %src.display(), dst = %dst.display(), "hardlinked");
                return Ok(Staged::Linked);
            }
            Err(e) => {
                debug!(
                    src = %src.display(),
                    dst = %dst.display(),
                    error = %e,
                    "hardlink failed, copying"
                );
            }
        }
    }

    let bytes = copy_with_owner(src, dst, owner, mode)?;
    debug!(
        src = %src.display(),
        dst = %dst.display(),
        bytes,
        owner = ?owner,
        mode = %format!("{mode:o}"),
        "copied"
    );
    Ok(Staged::Copied { bytes })
}

/// Copy `src` to `dst`, then set `owner` and `mode` on the open destination
///
/// Ownership goes first: changing the owner of an executable clears its
/// setuid/setgid bits, which would undo a mode set earlier.
fn copy_with_owner(src: &Path, dst: &Path, owner: Option<Identity>, mode: u32) -> Result<u64> {
    let mut src_file = File::open(src).map_err(|e| AllocDirError::staging(src, e))?;
    let mut dst_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(dst)
        .map_err(|e| AllocDirError::staging(dst, e))?;

    let bytes =
        std::io::copy(&mut src_file, &mut dst_file).map_err(|e| AllocDirError::staging(dst, e))?;

    change_owner_fd(&dst_file, owner).map_err(|e| AllocDirError::staging(dst, e))?;

    // The create mode above is narrowed by the umask
    dst_file
        .set_permissions(Permissions::from_mode(mode))
        .map_err(|e| AllocDirError::staging(dst, e))?;

    Ok(bytes)
}
