//! Error types for identity resolution

use thiserror::Error;

/// Result alias for identity lookups
pub type Result<T> = std::result::Result<T, IdentityError>;

/// Failures resolving an account name to a numeric identity
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The host identity database has no entry for the account
    #[error("account {name:?} not found in the host identity database")]
    NotFound {
        /// Account name that was looked up
        name: String,
    },

    /// The lookup produced something that cannot be used as a numeric identity
    #[error("identity record for {name:?} is malformed: {reason}")]
    Malformed {
        /// Account name that was looked up
        name: String,
        /// What was wrong with the record
        reason: String,
    },
}

impl IdentityError {
    /// Account name the error refers to
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::NotFound { name } | Self::Malformed { name, .. } => name,
        }
    }
}
