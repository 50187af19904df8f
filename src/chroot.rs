//! Populating a task's private filesystem root from host paths
//!
//! The caller decides which host paths belong in the chroot; this module only
//! mirrors them. Each host source is walked without following symlinks, the
//! mapped source itself included:
//!
//! - directories are recreated with the source's permission bits
//! - regular files are staged (hardlink, else copy keeping the source owner)
//! - symlinks are recreated pointing at the same target; a mapped source that
//!   is itself a symlink (`/bin -> usr/bin` on merged-/usr hosts) becomes that
//!   symlink in the task root, so its target has to be mapped too
//! - device nodes, sockets and fifos are skipped
//!
//! Every step is skipped when its destination already exists, so running the
//! same embed again after an agent restart is cheap and leaves a task's
//! running files alone.

use crate::error::{AllocDirError, Result};
use crate::stage::{stage_with, StageOptions, Staged};
use fs_ownership::try_get_ownership;
use std::collections::BTreeMap;
use std::fs::DirBuilder;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Mode for parent directories the chroot needs but no source describes
const PARENT_DIR_MODE: u32 = 0o755;

/// Host source paths and where they land relative to the task directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChrootMap {
    entries: BTreeMap<PathBuf, PathBuf>,
}

impl ChrootMap {
    /// Empty map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map host `source` to `dest`, relative to the task directory
    pub fn insert(&mut self, source: impl Into<PathBuf>, dest: impl Into<PathBuf>) {
        self.entries.insert(source.into(), dest.into());
    }

    /// Entries in source path order
    pub fn iter(&self) -> impl Iterator<Item = (&Path, &Path)> {
        self.entries.iter().map(|(s, d)| (s.as_path(), d.as_path()))
    }

    /// Number of mapped sources
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is mapped
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<PathBuf>, D: Into<PathBuf>> FromIterator<(S, D)> for ChrootMap {
    fn from_iter<I: IntoIterator<Item = (S, D)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (source, dest) in iter {
            map.insert(source, dest);
        }
        map
    }
}

/// Counters for one embed pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmbedStats {
    /// Directories walked (created or already there)
    pub directories: u64,
    /// Files hardlinked
    pub linked: u64,
    /// Files copied
    pub copied: u64,
    /// Files already staged
    pub present: u64,
    /// Symlinks created
    pub symlinks: u64,
    /// Sources missing on the host, and entries of unsupported types
    pub skipped: u64,
}

impl EmbedStats {
    fn record(&mut self, staged: Staged) {
        match staged {
            Staged::AlreadyPresent => self.present += 1,
            Staged::Linked => self.linked += 1,
            Staged::Copied { .. } => self.copied += 1,
        }
    }
}

/// Mirror every mapped host source into `task_root`
///
/// Sources that do not exist on this host are skipped.
///
/// # Errors
///
/// - `ChrootWalkFailed` if a source tree cannot be read
/// - `CreateDirFailed` if a destination directory cannot be created
/// - `StagingFailed` if a file cannot be copied
/// - `SymlinkFailed` if a symlink cannot be read or recreated
pub fn embed_chroot(task_root: &Path, map: &ChrootMap, options: &StageOptions) -> Result<EmbedStats> {
    let mut stats = EmbedStats::default();

    for (source, dest) in map.iter() {
        if std::fs::symlink_metadata(source).is_err() {
            debug!(source = %source.display(), "chroot source missing on host, skipping");
            stats.skipped += 1;
            continue;
        }
        embed_tree(source, &task_root.join(dest), options, &mut stats)?;
    }

    info!(
        task_root = %task_root.display(),
        directories = stats.directories,
        linked = stats.linked,
        copied = stats.copied,
        present = stats.present,
        symlinks = stats.symlinks,
        skipped = stats.skipped,
        "chroot embedded"
    );
    Ok(stats)
}

fn embed_tree(
    source: &Path,
    dest_root: &Path,
    options: &StageOptions,
    stats: &mut EmbedStats,
) -> Result<()> {
    let walk_error = |e: walkdir::Error| AllocDirError::ChrootWalkFailed {
        path: source.to_path_buf(),
        source: e,
    };

    for entry in WalkDir::new(source)
        .follow_links(false)
        .follow_root_links(false)
    {
        let entry = entry.map_err(walk_error)?;
        let Ok(rel) = entry.path().strip_prefix(source) else {
            continue;
        };
        let dst = if rel.as_os_str().is_empty() {
            dest_root.to_path_buf()
        } else {
            dest_root.join(rel)
        };
        let metadata = entry.metadata().map_err(walk_error)?;
        let perm = metadata.permissions().mode() & 0o7777;
        let file_type = entry.file_type();

        if file_type.is_dir() {
            DirBuilder::new()
                .recursive(true)
                .mode(perm)
                .create(&dst)
                .map_err(|e| AllocDirError::create_dir(&dst, e))?;
            stats.directories += 1;
            continue;
        }

        // A file or symlink mapped directly may land below directories no
        // source describes
        if entry.depth() == 0 {
            ensure_parent(&dst)?;
        }

        if file_type.is_file() {
            let staged = stage_with(entry.path(), &dst, try_get_ownership(&metadata), perm, options)?;
            stats.record(staged);
        } else if file_type.is_symlink() {
            if recreate_symlink(entry.path(), &dst)? {
                stats.symlinks += 1;
            } else {
                stats.present += 1;
            }
        } else {
            debug!(path = %entry.path().display(), "unsupported file type in chroot source, skipping");
            stats.skipped += 1;
        }
    }
    Ok(())
}

fn ensure_parent(dst: &Path) -> Result<()> {
    match dst.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => DirBuilder::new()
            .recursive(true)
            .mode(PARENT_DIR_MODE)
            .create(parent)
            .map_err(|e| AllocDirError::create_dir(parent, e)),
        _ => Ok(()),
    }
}

/// Returns `false` when something already occupies `dst`
fn recreate_symlink(src: &Path, dst: &Path) -> Result<bool> {
    if std::fs::symlink_metadata(dst).is_ok() {
        return Ok(false);
    }
    let target = std::fs::read_link(src).map_err(|e| AllocDirError::SymlinkFailed {
        path: src.to_path_buf(),
        source: e,
    })?;
    std::os::unix::fs::symlink(&target, dst).map_err(|e| AllocDirError::SymlinkFailed {
        path: dst.to_path_buf(),
        source: e,
    })?;
    debug!(link = %dst.display(), target = %target.display(), "symlink recreated");
    Ok(true)
}
