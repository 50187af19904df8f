//! Host-side directory layout of an allocation and its tasks
//!
//! ```text
//! <alloc_root>/<alloc_id>/
//! ├── alloc/            shared by every task (mounted at /alloc)
//! │   ├── data/
//! │   ├── logs/
//! │   └── tmp/
//! └── <task>/
//!     ├── local/        task private storage (mounted at /local)
//!     ├── secrets/      task secrets (mounted at /secrets)
//!     ├── tmp/
//!     └── ...           chroot contents, when the driver wants one
//! ```
//!
//! Building is idempotent: existing directories are reused and permissions
//! reapplied, so an agent that restarts can rebuild over a live allocation.

use crate::chroot::{embed_chroot, ChrootMap, EmbedStats};
use crate::error::{AllocDirError, Result};
use crate::paths::{SHARED_ALLOC_NAME, TASK_LOCAL, TASK_SECRETS};
use crate::permissions::DirPermissions;
use crate::stage::StageOptions;
use std::fs::DirBuilder;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use tracing::info;

/// Shared directory for data persisted across task restarts
pub const SHARED_DATA_DIR: &str = "data";

/// Shared directory for task logs
pub const LOG_DIR_NAME: &str = "logs";

/// Scratch directory name, both shared and per task
pub const TMP_DIR_NAME: &str = "tmp";

/// Subdirectories created inside the shared directory
pub const SHARED_ALLOC_DIRS: [&str; 3] = [LOG_DIR_NAME, TMP_DIR_NAME, SHARED_DATA_DIR];

/// Mode of the allocation directory itself; never widened
const ALLOC_DIR_MODE: u32 = 0o755;

/// Creation mode of directories that are widened afterwards
const SHARED_MODE: u32 = 0o777;

/// Desired mode for secrets before widening
const SECRETS_MODE: u32 = 0o700;

/// Directory tree for one allocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocDir {
    alloc_dir: PathBuf,
    shared_dir: PathBuf,
}

impl AllocDir {
    /// Layout for allocation `alloc_id` under `alloc_root`; nothing is created
    pub fn new(alloc_root: impl AsRef<Path>, alloc_id: &str) -> Self {
        let alloc_dir = alloc_root.as_ref().join(alloc_id);
        let shared_dir = alloc_dir.join(SHARED_ALLOC_NAME);
        Self {
            alloc_dir,
            shared_dir,
        }
    }

    /// The allocation directory
    #[must_use]
    pub fn alloc_dir(&self) -> &Path {
        &self.alloc_dir
    }

    /// Directory shared by all tasks
    #[must_use]
    pub fn shared_dir(&self) -> &Path {
        &self.shared_dir
    }

    /// Shared data directory
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.shared_dir.join(SHARED_DATA_DIR)
    }

    /// Shared log directory
    #[must_use]
    pub fn log_dir(&self) -> PathBuf {
        self.shared_dir.join(LOG_DIR_NAME)
    }

    /// Layout for task `name` inside this allocation; nothing is created
    #[must_use]
    pub fn new_task_dir(&self, name: &str) -> TaskDir {
        let dir = self.alloc_dir.join(name);
        TaskDir {
            name: name.to_string(),
            shared_alloc_dir: self.shared_dir.clone(),
            local_dir: dir.join(TASK_LOCAL),
            secrets_dir: dir.join(TASK_SECRETS),
            tmp_dir: dir.join(TMP_DIR_NAME),
            dir,
        }
    }

    /// Create the allocation and shared directories
    ///
    /// # Errors
    ///
    /// Returns `CreateDirFailed` or any error of
    /// [`DirPermissions::widen_and_drop`].
    pub fn build(&self, perms: &DirPermissions) -> Result<()> {
        create_dir(&self.alloc_dir, ALLOC_DIR_MODE)?;

        create_dir(&self.shared_dir, SHARED_MODE)?;
        perms.widen_and_drop(&self.shared_dir, SHARED_MODE)?;

        for name in SHARED_ALLOC_DIRS {
            let dir = self.shared_dir.join(name);
            create_dir(&dir, SHARED_MODE)?;
            perms.widen_and_drop(&dir, SHARED_MODE)?;
        }

        info!(alloc_dir = %self.alloc_dir.display(), "allocation directory built");
        Ok(())
    }
}

/// Directory tree for one task of an allocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDir {
    name: String,
    dir: PathBuf,
    shared_alloc_dir: PathBuf,
    local_dir: PathBuf,
    secrets_dir: PathBuf,
    tmp_dir: PathBuf,
}

impl TaskDir {
    /// Task name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Task directory, also the chroot root
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The allocation's shared directory
    #[must_use]
    pub fn shared_alloc_dir(&self) -> &Path {
        &self.shared_alloc_dir
    }

    /// Task-local directory
    #[must_use]
    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    /// Task secrets directory
    #[must_use]
    pub fn secrets_dir(&self) -> &Path {
        &self.secrets_dir
    }

    /// Task scratch directory
    #[must_use]
    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    /// Create the task directories and optionally embed a chroot
    ///
    /// Returns the embed counters when a chroot was requested.
    ///
    /// # Errors
    ///
    /// Returns `CreateDirFailed`, any error of
    /// [`DirPermissions::widen_and_drop`], or any error of
    /// [`embed_chroot`].
    pub fn build(
        &self,
        perms: &DirPermissions,
        chroot: Option<(&ChrootMap, &StageOptions)>,
    ) -> Result<Option<EmbedStats>> {
        create_dir(&self.dir, SHARED_MODE)?;

        create_dir(&self.local_dir, SHARED_MODE)?;
        perms.widen_and_drop(&self.local_dir, SHARED_MODE)?;

        create_dir(&self.secrets_dir, SHARED_MODE)?;
        perms.widen_and_drop(&self.secrets_dir, SECRETS_MODE)?;

        create_dir(&self.tmp_dir, SHARED_MODE)?;
        perms.widen_and_drop(&self.tmp_dir, SHARED_MODE)?;

        info!(task = %self.name, dir = %self.dir.display(), "task directory built");

        chroot
            .map(|(map, options)| embed_chroot(&self.dir, map, options))
            .transpose()
    }
}

fn create_dir(path: &Path, mode: u32) -> Result<()> {
    DirBuilder::new()
        .recursive(true)
        .mode(mode)
        .create(path)
        .map_err(|e| AllocDirError::create_dir(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fs_ownership::Privilege;
    use std::os::unix::fs::MetadataExt;
    use tempfile::TempDir;

    fn unprivileged() -> DirPermissions {
        DirPermissions::new("nobody", Privilege::Unprivileged)
    }

    #[test]
    fn test_layout_paths() {
        let alloc = AllocDir::new("/srv/alloc", "a1");
        assert_eq!(alloc.alloc_dir(), Path::new("/srv/alloc/a1"));
        assert_eq!(alloc.shared_dir(), Path::new("/srv/alloc/a1/alloc"));
        assert_eq!(alloc.data_dir(), PathBuf::from("/srv/alloc/a1/alloc/data"));

        let task = alloc.new_task_dir("redis");
        assert_eq!(task.name(), "redis");
        assert_eq!(task.dir(), Path::new("/srv/alloc/a1/redis"));
        assert_eq!(task.local_dir(), Path::new("/srv/alloc/a1/redis/local"));
        assert_eq!(task.secrets_dir(), Path::new("/srv/alloc/a1/redis/secrets"));
        assert_eq!(task.shared_alloc_dir(), alloc.shared_dir());
    }

    #[test]
    fn test_build_widens_shared_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let alloc = AllocDir::new(temp_dir.path(), "a1");
        alloc.build(&unprivileged()).unwrap();

        let alloc_mode = std::fs::metadata(alloc.alloc_dir()).unwrap().mode();
        assert_eq!(alloc_mode & 0o002, 0, "allocation dir itself is not world writable");

        for dir in [alloc.shared_dir().to_path_buf(), alloc.data_dir(), alloc.log_dir()] {
            let mode = std::fs::metadata(&dir).unwrap().mode();
            assert_eq!(mode & 0o777, 0o777, "{} not widened", dir.display());
        }
    }

    #[test]
    fn test_task_build_without_chroot() {
        let temp_dir = TempDir::new().unwrap();
        let alloc = AllocDir::new(temp_dir.path(), "a1");
        alloc.build(&unprivileged()).unwrap();

        let task = alloc.new_task_dir("web");
        let stats = task.build(&unprivileged(), None).unwrap();
        assert!(stats.is_none());

        for dir in [task.local_dir(), task.secrets_dir(), task.tmp_dir()] {
            let mode = std::fs::metadata(dir).unwrap().mode();
            assert_eq!(mode & 0o777, 0o777);
        }
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let alloc = AllocDir::new(temp_dir.path(), "a1");
        let task = alloc.new_task_dir("web");

        alloc.build(&unprivileged()).unwrap();
        task.build(&unprivileged(), None).unwrap();
        std::fs::write(task.local_dir().join("state"), b"keep me").unwrap();

        alloc.build(&unprivileged()).unwrap();
        task.build(&unprivileged(), None).unwrap();
        assert_eq!(
            std::fs::read(task.local_dir().join("state")).unwrap(),
            b"keep me"
        );
    }
}
