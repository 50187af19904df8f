//! Sharing-friendly permissions and ownership drop for allocation directories
//!
//! Tasks may run as an unprivileged or container-namespaced user the agent
//! knows nothing about, so every allocation subtree is opened up to all local
//! accounts. When the agent is root it additionally hands the directory to an
//! unprivileged account so a compromised task cannot tamper with agent-owned
//! state.
//!
//! # Usage
//!
//! ```rust,no_run
//! use allocdir::permissions::DirPermissions;
//! use std::path::Path;
//!
//! # fn main() -> allocdir::Result<()> {
//! let guard = DirPermissions::detect();
//! guard.widen_and_drop(Path::new("/var/lib/agent/alloc/a1/web/secrets"), 0o700)?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AllocDirError, Result};
use fs_ownership::{change_owner, lookup_identity, Privilege};
use std::fs::Permissions;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Bits OR-ed into every widened directory mode
pub const WORLD_RWX: u32 = 0o777;

/// Account directories are handed to when running as root
pub const DEFAULT_DROP_USER: &str = "nobody";

/// Permission widening and ownership drop policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirPermissions {
    drop_user: String,
    privilege: Privilege,
}

impl DirPermissions {
    /// Policy dropping to `drop_user` at the given privilege level
    #[must_use]
    pub fn new(drop_user: impl Into<String>, privilege: Privilege) -> Self {
        Self {
            drop_user: drop_user.into(),
            privilege,
        }
    }

    /// Policy dropping to `nobody`, with the privilege of this process
    ///
    /// Process privilege is fixed at start, so reading it once here and acting
    /// on it later is not a meaningful race.
    #[must_use]
    pub fn detect() -> Self {
        Self::new(DEFAULT_DROP_USER, Privilege::current())
    }

    /// Account ownership is dropped to
    #[must_use]
    pub fn drop_user(&self) -> &str {
        &self.drop_user
    }

    /// Privilege level this policy acts with
    #[must_use]
    pub const fn privilege(&self) -> Privilege {
        self.privilege
    }

    /// Widen `path`'s mode to `desired_mode | 0o777` and, when root, hand it
    /// to the drop-target account
    ///
    /// Lacking privilege is not an error: the mode is still widened and the
    /// call succeeds with ownership untouched.
    ///
    /// # Errors
    ///
    /// - `PermissionChangeFailed` if the mode cannot be set; ownership is not attempted
    /// - `IdentityNotFound` / `IdentityMalformed` if root and the drop-target
    ///   account cannot be resolved; the directory keeps its widened mode
    /// - `OwnershipChangeFailed` if the ownership change is refused
    pub fn widen_and_drop(&self, path: &Path, desired_mode: u32) -> Result<()> {
        let mode = desired_mode | WORLD_RWX;
        info!(path = %path.display(), desired = %format!("{desired_mode:o}"), "widen_and_drop");

        if let Err(source) = std::fs::set_permissions(path, Permissions::from_mode(mode)) {
            warn!(path = %path.display(), step = "chmod", error = %source, "failed");
            return Err(AllocDirError::PermissionChangeFailed {
                path: path.to_path_buf(),
                source,
            });
        }
        debug!(path = %path.display(), step = "chmod", mode = %format!("{mode:o}"), "ok");

        if !self.privilege.is_root() {
            warn!(
                path = %path.display(),
                step = "privilege",
                "not running as root, leaving ownership unchanged"
            );
            return Ok(());
        }
        debug!(step = "privilege", "ok");

        let identity = lookup_identity(&self.drop_user).map_err(|e| {
            warn!(step = "lookup", user = %self.drop_user, error = %e, "failed");
            AllocDirError::from(e)
        })?;
        debug!(step = "lookup", user = %self.drop_user, uid = identity.uid, gid = identity.gid, "ok");

        if let Err(source) = change_owner(path, Some(identity)) {
            warn!(path = %path.display(), step = "chown", error = %source, "failed");
            return Err(AllocDirError::OwnershipChangeFailed {
                path: path.to_path_buf(),
                uid: identity.uid,
                gid: identity.gid,
                source,
            });
        }
        debug!(path = %path.display(), step = "chown", uid = identity.uid, gid = identity.gid, "ok");

        Ok(())
    }
}

impl Default for DirPermissions {
    fn default() -> Self {
        Self::detect()
    }
}

/// Widen and drop `path` using the default policy for this process
///
/// # Errors
///
/// See [`DirPermissions::widen_and_drop`].
pub fn widen_and_drop(path: &Path, desired_mode: u32) -> Result<()> {
    DirPermissions::detect().widen_and_drop(path, desired_mode)
}
