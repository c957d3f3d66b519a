use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::backup::lifecycle::PauseTracker;
use crate::backup::{needs_worker_image, print_plan, CycleRunner};
use crate::cli::args::Cli;
use crate::config::load::load_settings;
use crate::config::manifest::{load_manifest, ManifestDefaults};
use crate::config::model::Settings;
use crate::error::VolvaultError;
use crate::runtime::cli::CliRuntime;
use crate::runtime::prepare_image;
use crate::schedule::{Scheduler, SystemClock};
use crate::signal_handler::signal_handler;
use crate::types::{Mode, RunMode, TriggerTime};
use crate::util::lock::acquire_process_lock;
use crate::util::paths::is_remote_spec;

const CONFIG_FILE: &str = "/etc/volvault/volvault.yaml";
const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod args;

pub fn run() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    info!(version = VERSION, "volvault starting");

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let mut settings = match load_settings(&config_path) {
        Ok(settings) => settings,
        Err(err) => exit_for_error(&err),
    };
    apply_cli_overrides(&mut settings, &cli);

    let containers = match load_manifest(&settings.manifest_path, &ManifestDefaults::from(&settings)) {
        Ok(containers) => containers,
        Err(err) => exit_for_error(&err),
    };
    info!(
        manifest = %settings.manifest_path.display(),
        containers = containers.len(),
        mode = settings.mode.as_str(),
        "manifest loaded"
    );

    if cli.print_plan {
        print_plan(&settings, &containers)?;
        return Ok(());
    }

    if !settings.destination_remote && is_remote_spec(&settings.destination) {
        warn!(
            destination = %settings.destination,
            "destination looks remote but backup.destination_remote is false"
        );
    }

    let run_mode = RunMode {
        dry_run: cli.dry_run,
        verbose: cli.verbose,
    };

    let lock = if run_mode.dry_run {
        None
    } else {
        match acquire_process_lock(&settings.lock_file) {
            Ok(guard) => Some(guard),
            Err(err) => {
                println!("{}", err);
                std::process::exit(3);
            }
        }
    };

    let runtime = CliRuntime::new(settings.runtime_binary.clone(), settings.socket_path.clone());
    if !run_mode.dry_run && needs_worker_image(&containers) {
        prepare_image(
            &runtime,
            &settings.image_name,
            settings.image_build_source.as_deref(),
        )?;
    }

    let tracker = PauseTracker::default();
    signal_handler(
        &tracker,
        runtime.clone(),
        lock.as_ref().map(|guard| guard.path().to_path_buf()),
    );

    let runner = CycleRunner::new(&settings, &containers, &runtime, tracker, run_mode);
    if settings.runs_once() {
        runner.run_cycle();
        return Ok(());
    }

    Scheduler::new(settings.time_to_run, SystemClock).run_forever(|| {
        runner.run_cycle();
    });
    Ok(())
}

fn apply_cli_overrides(settings: &mut Settings, cli: &Cli) {
    if cli.restore {
        settings.mode = Mode::Restore;
    }
    if cli.now {
        settings.time_to_run = TriggerTime::Now;
    }
    if let Some(manifest) = &cli.manifest {
        settings.manifest_path = manifest.clone();
    }
}

pub fn exit_for_error(err: &VolvaultError) -> ! {
    let code = match err {
        VolvaultError::Config(_) => 2,
        _ => 1,
    };
    println!("{}", err);
    std::process::exit(code);
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
