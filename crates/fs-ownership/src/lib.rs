//! # fs-ownership
//!
//! Small Unix identity and ownership primitives used when preparing task
//! directories:
//! - Resolving an account name to a numeric `(uid, gid)` pair
//! - Reading the owning identity out of file metadata, when the platform has one
//! - Changing ownership by path or by open file
//! - Detecting whether the process runs with superuser privilege
//!
//! ## Example
//!
//! ```rust,no_run
//! use fs_ownership::{lookup_identity, try_get_ownership, Privilege};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let nobody = lookup_identity("nobody")?;
//! let meta = std::fs::metadata("/bin/sh")?;
//! if let Some(owner) = try_get_ownership(&meta) {
//!     println!("/bin/sh is owned by {owner}, nobody is {nobody}");
//! }
//! if Privilege::current().is_root() {
//!     fs_ownership::change_owner(std::path::Path::new("/tmp/x"), Some(nobody))?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod identity;
pub mod ownership;
pub mod privilege;

pub use error::{IdentityError, Result};
pub use identity::{lookup_identity, Identity};
pub use ownership::{
    change_owner, change_owner_fd, owner_pair, raw_owner_pair, try_get_ownership, UNKNOWN_OWNER,
};
pub use privilege::Privilege;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
