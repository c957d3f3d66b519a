use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "volvault",
    version,
    about = "Pause containers, rsync their volumes, resume them"
)]
pub struct Cli {
    /// Settings file
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,
    /// Container/volume manifest, overrides backup.config_file_path
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Restore from the destination instead of backing up (runs once)
    #[arg(long)]
    pub restore: bool,
    /// Run one cycle immediately and exit
    #[arg(long)]
    pub now: bool,

    #[arg(long)]
    pub dry_run: bool,
    #[arg(long, short = 'v')]
    pub verbose: bool,
    /// Print the resolved mounts and commands and exit
    #[arg(long)]
    pub print_plan: bool,
}
