//! # allocdir
//!
//! Filesystem staging and ownership for the directories an agent prepares
//! before starting sandboxed tasks.
//!
//! - [`permissions`]: widen allocation directories for any local account and,
//!   when root, hand them to an unprivileged account
//! - [`stage`]: make a host file available inside a task root, hardlinking when
//!   possible and copying with explicit ownership otherwise
//! - [`chroot`]: mirror caller-chosen host trees into a task root
//! - [`alloc_dir`]: the shared / local / secrets layout of an allocation
//! - [`paths`]: the fixed in-task mount points of that layout
//!
//! Every operation is synchronous and idempotent against what is already on
//! disk, so it can be rerun after an agent restart.
//!
//! ```rust,no_run
//! use allocdir::{AllocDir, ChrootMap, DirPermissions, StageOptions};
//!
//! # fn main() -> allocdir::Result<()> {
//! let perms = DirPermissions::detect();
//! let alloc = AllocDir::new("/var/lib/agent/alloc", "7f3a");
//! alloc.build(&perms)?;
//!
//! // On merged-/usr hosts /bin and /lib are symlinks into /usr, which is
//! // mapped too so they resolve inside the task root
//! let chroot: ChrootMap = [("/bin", "bin"), ("/lib", "lib"), ("/usr", "usr")]
//!     .into_iter()
//!     .collect();
//! let task = alloc.new_task_dir("web");
//! task.build(&perms, Some((&chroot, &StageOptions::default())))?;
//! # Ok(())
//! # }
//! ```

pub mod alloc_dir;
pub mod chroot;
pub mod cli;
pub mod error;
pub mod paths;
pub mod permissions;
pub mod stage;

pub use alloc_dir::{AllocDir, TaskDir};
pub use chroot::{embed_chroot, ChrootMap, EmbedStats};
pub use error::{AllocDirError, Result};
pub use fs_ownership::{Identity, Privilege};
pub use paths::TaskPaths;
pub use permissions::{widen_and_drop, DirPermissions};
pub use stage::{stage, stage_with, StageMode, StageOptions, Staged};
