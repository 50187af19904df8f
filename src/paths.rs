//! Fixed mount points as seen from inside a task's filesystem namespace
//!
//! These strings are part of the contract with tasks that are already running,
//! so they never change across agent upgrades and are not configurable. They
//! are handed to driver integration code as an immutable `TaskPaths` value
//! rather than read from globals.

use crate::alloc_dir::TaskDir;
use std::path::{Component, Path, PathBuf};

/// Host-side name of the directory shared by every task in an allocation
pub const SHARED_ALLOC_NAME: &str = "alloc";

/// Host-side name of a task's private local directory
pub const TASK_LOCAL: &str = "local";

/// Host-side name of a task's secrets directory
pub const TASK_SECRETS: &str = "secrets";

/// In-namespace mount points for the shared, local and secrets subtrees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskPaths {
    shared_alloc: &'static str,
    task_local: &'static str,
    task_secrets: &'static str,
}

impl TaskPaths {
    /// The one set of mount points tasks are built against
    pub const STANDARD: Self = Self {
        shared_alloc: "/alloc",
        task_local: "/local",
        task_secrets: "/secrets",
    };

    /// Mount point of the shared allocation directory
    #[must_use]
    pub fn shared_alloc(&self) -> &'static Path {
        Path::new(self.shared_alloc)
    }

    /// Mount point of the task-local directory
    #[must_use]
    pub fn task_local(&self) -> &'static Path {
        Path::new(self.task_local)
    }

    /// Mount point of the task secrets directory
    #[must_use]
    pub fn task_secrets(&self) -> &'static Path {
        Path::new(self.task_secrets)
    }

    /// Map a task-visible path to where it lives on the host
    ///
    /// Returns `None` for paths outside the three mount points, including
    /// paths that climb out of one with `..`.
    #[must_use]
    pub fn host_path(&self, task_dir: &TaskDir, in_task: &Path) -> Option<PathBuf> {
        let mounts = [
            (self.shared_alloc(), task_dir.shared_alloc_dir()),
            (self.task_local(), task_dir.local_dir()),
            (self.task_secrets(), task_dir.secrets_dir()),
        ];
        let (host, rest) = mounts
            .into_iter()
            .find_map(|(mount, host)| in_task.strip_prefix(mount).ok().map(|rest| (host, rest)))?;

        if rest
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }
        if rest.as_os_str().is_empty() {
            Some(host.to_path_buf())
        } else {
            Some(host.join(rest))
        }
    }
}

impl Default for TaskPaths {
    fn default() -> Self {
        Self::STANDARD
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc_dir::AllocDir;

    #[test]
    fn test_standard_mount_points_are_fixed() {
        let paths = TaskPaths::default();
        assert_eq!(paths, TaskPaths::STANDARD);
        assert_eq!(paths.shared_alloc(), Path::new("/alloc"));
        assert_eq!(paths.task_local(), Path::new("/local"));
        assert_eq!(paths.task_secrets(), Path::new("/secrets"));
    }

    #[test]
    fn test_host_path_mapping() {
        let alloc = AllocDir::new("/var/lib/agent/alloc", "a1");
        let task = alloc.new_task_dir("web");
        let paths = TaskPaths::STANDARD;

        assert_eq!(
            paths.host_path(&task, Path::new("/alloc/data/db")),
            Some(PathBuf::from("/var/lib/agent/alloc/a1/alloc/data/db"))
        );
        assert_eq!(
            paths.host_path(&task, Path::new("/local")),
            Some(PathBuf::from("/var/lib/agent/alloc/a1/web/local"))
        );
        assert_eq!(
            paths.host_path(&task, Path::new("/secrets/token")),
            Some(PathBuf::from("/var/lib/agent/alloc/a1/web/secrets/token"))
        );
        assert_eq!(paths.host_path(&task, Path::new("/etc/passwd")), None);
        // Prefix match is per component, not per byte
        assert_eq!(paths.host_path(&task, Path::new("/allocations")), None);
        // No climbing out of a mount point
        assert_eq!(
            paths.host_path(&task, Path::new("/secrets/../../../../../etc/shadow")),
            None
        );
        assert_eq!(paths.host_path(&task, Path::new("/local/data/../..")), None);
        assert_eq!(
            paths.host_path(&task, Path::new("/local/./cache")),
            Some(PathBuf::from("/var/lib/agent/alloc/a1/web/local/cache"))
        );
    }
}
