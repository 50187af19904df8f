//! Command-line interface definitions
//!
//! Arguments are grouped by the component that consumes them, so each group
//! converts directly into the library value it configures.

use crate::chroot::ChrootMap;
use crate::permissions::{DirPermissions, DEFAULT_DROP_USER};
use crate::stage::{StageMode, StageOptions};
use anyhow::Result;
use clap::{Parser, Subcommand};
use fs_ownership::{Identity, Privilege};
use std::path::{Component, Path, PathBuf};
use tracing::Level;

/// Prepare allocation directories and task chroots for sandboxed tasks
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// What to prepare
    #[command(subcommand)]
    pub command: Command,

    /// Output and logging configuration
    #[command(flatten)]
    pub output: OutputConfig,
}

/// Operations exposed by the binary
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build an allocation directory and its task directories
    Alloc(AllocArgs),
    /// Stage one host file into a task directory
    Stage(StageArgs),
}

/// Arguments for `alloc`
///
/// Used by: `AllocDir::build()`, `TaskDir::build()`
#[derive(clap::Args, Debug, Clone)]
pub struct AllocArgs {
    /// Directory holding every allocation
    #[arg(long, value_name = "DIR")]
    pub alloc_root: PathBuf,

    /// Allocation id, used as the directory name
    #[arg(long, value_name = "ID")]
    pub alloc_id: String,

    /// Task to build a directory for (repeatable)
    #[arg(long = "task", value_name = "NAME")]
    pub tasks: Vec<String>,

    /// Ownership drop configuration
    #[command(flatten)]
    pub ownership: OwnershipConfig,

    /// Chroot contents for every task
    #[command(flatten)]
    pub chroot: ChrootConfig,
}

/// Arguments for `stage`
///
/// Used by: `stage_with()`
#[derive(clap::Args, Debug, Clone)]
pub struct StageArgs {
    /// Host file to stage
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Destination inside the task directory
    #[arg(value_name = "DESTINATION")]
    pub destination: PathBuf,

    /// Owner uid applied when the file is copied
    #[arg(long, requires = "gid")]
    pub uid: Option<u32>,

    /// Owner gid applied when the file is copied
    #[arg(long, requires = "uid")]
    pub gid: Option<u32>,

    /// Octal mode applied when the file is copied
    #[arg(long, default_value = "644", value_parser = parse_octal_mode)]
    pub mode: u32,

    /// Never hardlink; always copy
    #[arg(long)]
    pub copy_only: bool,
}

impl StageArgs {
    /// Owner requested for copies, if any
    #[must_use]
    pub fn owner(&self) -> Option<Identity> {
        self.uid.zip(self.gid).map(|(uid, gid)| Identity::new(uid, gid))
    }

    /// Staging options from the flags
    #[must_use]
    pub const fn options(&self) -> StageOptions {
        StageOptions {
            mode: if self.copy_only {
                StageMode::CopyOnly
            } else {
                StageMode::LinkOrCopy
            },
        }
    }
}

/// Ownership drop configuration
///
/// Used by: `DirPermissions`
#[derive(clap::Args, Debug, Clone)]
#[command(next_help_heading = "Ownership Options")]
pub struct OwnershipConfig {
    /// Account directories are handed to when running as root
    #[arg(long, default_value = DEFAULT_DROP_USER, value_name = "USER")]
    pub drop_user: String,

    /// Only widen permissions, never change ownership
    #[arg(long)]
    pub no_drop: bool,
}

impl OwnershipConfig {
    /// Permission policy for this process
    #[must_use]
    pub fn to_permissions(&self) -> DirPermissions {
        let privilege = if self.no_drop {
            Privilege::Unprivileged
        } else {
            Privilege::current()
        };
        DirPermissions::new(self.drop_user.clone(), privilege)
    }
}

/// Chroot configuration
///
/// Used by: `embed_chroot()`
#[derive(clap::Args, Debug, Clone, Default)]
#[command(next_help_heading = "Chroot Options")]
pub struct ChrootConfig {
    /// Host path to mirror into each task, as SOURCE=DEST (repeatable)
    ///
    /// SOURCE is an absolute host path, DEST is relative to the task directory.
    #[arg(long = "chroot", value_name = "SOURCE=DEST", value_parser = parse_chroot_entry)]
    pub entries: Vec<(PathBuf, PathBuf)>,

    /// Copy chroot files instead of hardlinking them
    #[arg(long = "chroot-copy-only")]
    pub copy_only: bool,
}

impl ChrootConfig {
    /// The map to embed, `None` when no chroot was requested
    #[must_use]
    pub fn to_map(&self) -> Option<ChrootMap> {
        if self.entries.is_empty() {
            return None;
        }
        Some(self.entries.iter().cloned().collect())
    }

    /// Staging options for chroot files
    #[must_use]
    pub const fn stage_options(&self) -> StageOptions {
        if self.copy_only {
            StageOptions::copy_only()
        } else {
            StageOptions {
                mode: StageMode::LinkOrCopy,
            }
        }
    }
}

/// Output and logging configuration
///
/// Used by: `main()`, logging initialization
#[derive(clap::Args, Debug, Clone, Default)]
#[command(next_help_heading = "Output Options")]
pub struct OutputConfig {
    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress all output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

impl OutputConfig {
    /// Maximum level to log at
    #[must_use]
    pub const fn level(&self) -> Level {
        if self.quiet {
            return Level::ERROR;
        }
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

impl Args {
    /// Validate command-line arguments
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - Both --quiet and --verbose options are used
    /// - An allocation id or task name is empty or contains a path separator
    /// - The staging source does not exist
    pub fn validate(&self) -> Result<()> {
        if self.output.quiet && self.output.verbose > 0 {
            anyhow::bail!("--quiet and --verbose are mutually exclusive");
        }

        match &self.command {
            Command::Alloc(alloc) => {
                validate_dir_name("allocation id", &alloc.alloc_id)?;
                for task in &alloc.tasks {
                    validate_dir_name("task name", task)?;
                }
            }
            Command::Stage(stage) => {
                if std::fs::symlink_metadata(&stage.source).is_err() {
                    anyhow::bail!(
                        "Source path does not exist: {}",
                        stage.source.display()
                    );
                }
            }
        }
        Ok(())
    }
}

fn validate_dir_name(what: &str, name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => anyhow::bail!("Invalid {what}: {name:?}"),
    }
}

/// Parse an octal permission mode such as `755` or `0o755`
///
/// # Errors
///
/// Returns a message if the value is not octal or exceeds `7777`.
pub fn parse_octal_mode(value: &str) -> std::result::Result<u32, String> {
    let digits = value.strip_prefix("0o").unwrap_or(value);
    let mode = u32::from_str_radix(digits, 8).map_err(|e| format!("invalid octal mode {value:?}: {e}"))?;
    if mode > 0o7777 {
        return Err(format!("mode {value:?} exceeds 7777"));
    }
    Ok(mode)
}

/// Parse a `SOURCE=DEST` chroot entry
///
/// # Errors
///
/// Returns a message if the separator is missing, SOURCE is relative, or
/// DEST is absolute or climbs out of the task directory.
pub fn parse_chroot_entry(value: &str) -> std::result::Result<(PathBuf, PathBuf), String> {
    let (source, dest) = value
        .split_once('=')
        .ok_or_else(|| format!("expected SOURCE=DEST, got {value:?}"))?;
    let source = PathBuf::from(source);
    let dest = PathBuf::from(dest);

    if !source.is_absolute() {
        return Err(format!("chroot source must be absolute: {}", source.display()));
    }
    if dest.as_os_str().is_empty()
        || dest
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(format!(
            "chroot destination must be relative to the task directory: {}",
            dest.display()
        ));
    }
    Ok((source, dest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("755", 0o755)]
    #[case("0o600", 0o600)]
    #[case("4755", 0o4755)]
    fn test_parse_octal_mode(#[case] input: &str, #[case] expected: u32) {
        assert_eq!(parse_octal_mode(input).unwrap(), expected);
    }

    #[rstest]
    #[case("9")]
    #[case("17777")]
    #[case("rwx")]
    fn test_parse_octal_mode_rejects(#[case] input: &str) {
        assert!(parse_octal_mode(input).is_err());
    }

    #[test]
    fn test_parse_chroot_entry() {
        let (src, dst) = parse_chroot_entry("/usr/lib=usr/lib").unwrap();
        assert_eq!(src, PathBuf::from("/usr/lib"));
        assert_eq!(dst, PathBuf::from("usr/lib"));

        assert!(parse_chroot_entry("/bin").is_err());
        assert!(parse_chroot_entry("bin=bin").is_err());
        assert!(parse_chroot_entry("/bin=/bin").is_err());
        assert!(parse_chroot_entry("/bin=../escape").is_err());
        assert!(parse_chroot_entry("/bin=").is_err());
    }

    #[test]
    fn test_alloc_args_parse() {
        let args = Args::try_parse_from([
            "allocdir",
            "alloc",
            "--alloc-root",
            "/srv/alloc",
            "--alloc-id",
            "a1",
            "--task",
            "web",
            "--task",
            "db",
            "--chroot",
            "/bin=bin",
            "--chroot-copy-only",
            "-vv",
        ])
        .unwrap();
        args.validate().unwrap();
        assert_eq!(args.output.level(), Level::DEBUG);

        let Command::Alloc(alloc) = args.command else {
            panic!("expected alloc subcommand");
        };
        assert_eq!(alloc.tasks, vec!["web", "db"]);
        assert_eq!(alloc.ownership.drop_user, "nobody");
        assert_eq!(alloc.chroot.to_map().unwrap().len(), 1);
        assert_eq!(alloc.chroot.stage_options(), StageOptions::copy_only());
    }

    #[test]
    fn test_no_drop_forces_unprivileged() {
        let config = OwnershipConfig {
            drop_user: "nobody".to_string(),
            no_drop: true,
        };
        assert_eq!(config.to_permissions().privilege(), Privilege::Unprivileged);
    }

    #[test]
    fn test_stage_owner_requires_both_ids() {
        let result = Args::try_parse_from(["allocdir", "stage", "/bin/sh", "/tmp/sh", "--uid", "65534"]);
        assert!(result.is_err());

        let args = Args::try_parse_from([
            "allocdir", "stage", "/bin/sh", "/tmp/sh", "--uid", "65534", "--gid", "65534", "--mode", "755",
        ])
        .unwrap();
        let Command::Stage(stage) = args.command else {
            panic!("expected stage subcommand");
        };
        assert_eq!(stage.owner(), Some(Identity::new(65534, 65534)));
        assert_eq!(stage.mode, 0o755);
        assert_eq!(stage.options().mode, StageMode::LinkOrCopy);
    }

    #[rstest]
    #[case("")]
    #[case("..")]
    #[case("a/b")]
    #[case("/abs")]
    fn test_invalid_dir_names(#[case] name: &str) {
        assert!(validate_dir_name("task name", name).is_err());
    }

    #[test]
    fn test_quiet_and_verbose_conflict() {
        let args = Args::try_parse_from([
            "allocdir", "-q", "-v", "alloc", "--alloc-root", "/srv", "--alloc-id", "a1",
        ])
        .unwrap();
        assert!(args.validate().is_err());
    }
}
