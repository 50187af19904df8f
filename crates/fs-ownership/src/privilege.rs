//! Effective privilege detection

/// Privilege level of the current process for ownership changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    /// Effective uid is 0; ownership can be handed to other accounts
    Root,
    /// Ownership changes to other accounts will be refused by the kernel
    Unprivileged,
}

impl Privilege {
    /// Privilege of the running process, from its effective uid
    #[cfg(unix)]
    #[must_use]
    pub fn current() -> Self {
        if nix::unistd::geteuid().is_root() {
            Self::Root
        } else {
            Self::Unprivileged
        }
    }

    /// Privilege of the running process
    #[cfg(not(unix))]
    #[must_use]
    pub fn current() -> Self {
        Self::Unprivileged
    }

    /// Whether ownership may be changed to arbitrary identities
    #[must_use]
    pub const fn is_root(self) -> bool {
        matches!(self, Self::Root)
    }
}
