//! `allocdir` binary: prepare allocation directories from the command line

use allocdir::alloc_dir::AllocDir;
use allocdir::cli::{AllocArgs, Args, Command, OutputConfig, StageArgs};
use allocdir::stage::{stage_with, Staged};
use anyhow::{Context, Result};
use clap::Parser;

fn main() -> Result<()> {
    let args = Args::parse();
    args.validate()?;
    init_logging(&args.output);

    match &args.command {
        Command::Alloc(alloc) => run_alloc(alloc),
        Command::Stage(stage) => run_stage(stage),
    }
}

fn init_logging(output: &OutputConfig) {
    tracing_subscriber::fmt()
        .with_max_level(output.level())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_alloc(args: &AllocArgs) -> Result<()> {
    let perms = args.ownership.to_permissions();
    let alloc = AllocDir::new(&args.alloc_root, &args.alloc_id);
    alloc
        .build(&perms)
        .with_context(|| format!("building allocation {}", args.alloc_id))?;

    let chroot = args.chroot.to_map();
    let options = args.chroot.stage_options();

    for name in &args.tasks {
        let task = alloc.new_task_dir(name);
        let stats = task
            .build(&perms, chroot.as_ref().map(|map| (map, &options)))
            .with_context(|| format!("building task directory {name}"))?;

        match stats {
            Some(stats) => println!(
                "{}: linked={} copied={} present={} symlinks={} skipped={}",
                task.dir().display(),
                stats.linked,
                stats.copied,
                stats.present,
                stats.symlinks,
                stats.skipped
            ),
            None => println!("{}", task.dir().display()),
        }
    }
    Ok(())
}

fn run_stage(args: &StageArgs) -> Result<()> {
    let staged = stage_with(
        &args.source,
        &args.destination,
        args.owner(),
        args.mode,
        &args.options(),
    )
    .with_context(|| {
        format!(
            "staging {} at {}",
            args.source.display(),
            args.destination.display()
        )
    })?;

    match staged {
        Staged::AlreadyPresent => println!("{}: already present", args.destination.display()),
        Staged::Linked => println!("{}: linked", args.destination.display()),
        Staged::Copied { bytes } => {
            println!("{}: copied {bytes} bytes", args.destination.display());
        }
    }
    Ok(())
}
