//! Error types for allocation directory preparation
//!
//! Every variant carries the path it failed on. Nothing here is retried;
//! callers get one precise, attributable failure per operation.

use fs_ownership::IdentityError;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, AllocDirError>;

/// Failures preparing allocation directories and staging files
#[derive(Debug, Error)]
pub enum AllocDirError {
    /// Widening a directory's permission bits failed
    #[error("chmod({}) failed: {source}", .path.display())]
    PermissionChangeFailed {
        /// Directory whose mode could not be changed
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The drop-target account does not exist on this host
    #[error("drop-target account {name:?} not found")]
    IdentityNotFound {
        /// Account name that was looked up
        name: String,
    },

    /// The drop-target account resolved to an unusable identity
    #[error("drop-target account {name:?} is malformed: {reason}")]
    IdentityMalformed {
        /// Account name that was looked up
        name: String,
        /// What was wrong with the record
        reason: String,
    },

    /// Handing a directory to the drop-target identity failed
    #[error("couldn't change owner/group of {} to (uid: {uid}, gid: {gid}): {source}", .path.display())]
    OwnershipChangeFailed {
        /// Directory whose ownership could not be changed
        path: PathBuf,
        /// Target user id
        uid: u32,
        /// Target group id
        gid: u32,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The copy fallback of staging failed; destination state is unknown
    #[error("failed to stage {}: {source}", .path.display())]
    StagingFailed {
        /// Path the failing step operated on
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Creating a directory of the allocation layout failed
    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDirFailed {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Walking a chroot source tree failed
    #[error("failed to walk chroot source {}: {source}", .path.display())]
    ChrootWalkFailed {
        /// Source tree being walked
        path: PathBuf,
        /// Underlying walk error
        #[source]
        source: walkdir::Error,
    },

    /// Recreating a symlink inside a chroot failed
    #[error("failed to create symlink {}: {source}", .path.display())]
    SymlinkFailed {
        /// Symlink that could not be created
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },
}

impl From<IdentityError> for AllocDirError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::NotFound { name } => Self::IdentityNotFound { name },
            IdentityError::Malformed { name, reason } => Self::IdentityMalformed { name, reason },
        }
    }
}

impl AllocDirError {
    /// Build a `StagingFailed` error for `path`
    pub(crate) fn staging(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StagingFailed {
            path: path.into(),
            source,
        }
    }

    /// Build a `CreateDirFailed` error for `path`
    pub(crate) fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::CreateDirFailed {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_errors_map_to_taxonomy() {
        let err: AllocDirError = IdentityError::NotFound {
            name: "nobody".to_string(),
        }
        .into();
        assert!(matches!(err, AllocDirError::IdentityNotFound { ref name } if name == "nobody"));

        let err: AllocDirError = IdentityError::Malformed {
            name: "nobody".to_string(),
            reason: "bad uid".to_string(),
        }
        .into();
        assert!(err.to_string().contains("bad uid"));
    }

    #[test]
    fn test_ownership_error_names_path_and_ids() {
        let err = AllocDirError::OwnershipChangeFailed {
            path: PathBuf::from("/alloc/x/secrets"),
            uid: 65534,
            gid: 65534,
            source: std::io::Error::from_raw_os_error(1),
        };
        let msg = err.to_string();
        assert!(msg.contains("/alloc/x/secrets"));
        assert!(msg.contains("uid: 65534"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
