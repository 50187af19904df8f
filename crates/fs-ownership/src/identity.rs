//! Account name to numeric identity resolution
//!
//! The only identity-database lookup the staging code needs is turning a
//! symbolic account name (normally `nobody`) into the `(uid, gid)` pair that
//! directories are handed over to.

use crate::error::{IdentityError, Result};
use std::fmt;

/// `(uid_t)-1`, which `chown(2)` treats as "leave this id unchanged"
const NO_CHANGE_ID: u32 = u32::MAX;

/// A host user/group pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identity {
    /// Numeric user id
    pub uid: u32,
    /// Numeric group id
    pub gid: u32,
}

impl Identity {
    /// Create an identity from raw ids
    #[must_use]
    pub const fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }

    /// Validate the numeric fields of a resolved account record
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Malformed` if either id is the all-ones value,
    /// which ownership syscalls would silently interpret as "no change".
    pub fn from_record(name: &str, uid: u32, gid: u32) -> Result<Self> {
        if uid == NO_CHANGE_ID {
            return Err(IdentityError::Malformed {
                name: name.to_string(),
                reason: format!("uid {uid} is the reserved no-change value"),
            });
        }
        if gid == NO_CHANGE_ID {
            return Err(IdentityError::Malformed {
                name: name.to_string(),
                reason: format!("gid {gid} is the reserved no-change value"),
            });
        }
        Ok(Self { uid, gid })
    }

    /// Whether this is the superuser identity
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.uid == 0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.uid, self.gid)
    }
}

/// Resolve an account name through the host identity database
///
/// # Errors
///
/// - `IdentityError::NotFound` if the account does not exist
/// - `IdentityError::Malformed` if the lookup fails or returns unusable ids
#[cfg(unix)]
pub fn lookup_identity(name: &str) -> Result<Identity> {
    let user = nix::unistd::User::from_name(name)
        .map_err(|errno| IdentityError::Malformed {
            name: name.to_string(),
            reason: format!("identity database lookup failed: {errno}"),
        })?
        .ok_or_else(|| IdentityError::NotFound {
            name: name.to_string(),
        })?;

    log::debug!(
        "resolved account {name:?} to uid={} gid={}",
        user.uid,
        user.gid
    );
    Identity::from_record(name, user.uid.as_raw(), user.gid.as_raw())
}

/// Resolve an account name through the host identity database
///
/// # Errors
///
/// Always returns `IdentityError::NotFound`: there is no POSIX identity
/// database on this platform.
#[cfg(not(unix))]
pub fn lookup_identity(name: &str) -> Result<Identity> {
    Err(IdentityError::NotFound {
        name: name.to_string(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_root() {
        let root = lookup_identity("root").unwrap();
        assert_eq!(root.uid, 0);
        assert!(root.is_root());
    }

    #[test]
    fn test_lookup_missing_account() {
        let err = lookup_identity("no-such-account-for-fs-ownership-tests").unwrap_err();
        assert!(matches!(err, IdentityError::NotFound { .. }));
        assert_eq!(err.name(), "no-such-account-for-fs-ownership-tests");
    }

    #[test]
    fn test_record_rejects_no_change_ids() {
        let err = Identity::from_record("broken", u32::MAX, 100).unwrap_err();
        assert!(matches!(err, IdentityError::Malformed { .. }));
        assert!(err.to_string().contains("uid"));

        let err = Identity::from_record("broken", 100, u32::MAX).unwrap_err();
        assert!(err.to_string().contains("gid"));
    }

    #[test]
    fn test_record_accepts_nobody_ids() {
        let id = Identity::from_record("nobody", 65534, 65534).unwrap();
        assert_eq!(id, Identity::new(65534, 65534));
        assert_eq!(id.to_string(), "65534:65534");
    }
}
