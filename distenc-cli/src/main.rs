// ============================================================================
// distenc-cli/src/main.rs
// ============================================================================
//
// MAIN ENTRY POINT: distenc CLI
//
// Parses arguments, loads the preset/config file, wires the concrete
// tokio-backed ProcessRunner and MediaProbe into the scheduler, runs the
// batch, and maps the outcome onto the exit codes from §6: 0 on
// `failed == 0`, 1 on any job failure, 1 on Ctrl-C, 2 on argument/config
// errors.

mod args;
mod logging;

use anyhow::{Context, Result};
use args::Cli;
use clap::Parser;
use distenc_core::config::{self, CliOverrides};
use distenc_core::media::FfprobeMediaProbe;
use distenc_core::process::{ProcessRunner, SystemProcessRunner};
use distenc_core::scheduler::{self, SchedulerConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

const DEFAULT_CONFIG_FILE: &str = "distenc.ini";

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = logging::init_logging(cli.verbose, cli.log_dir.as_deref()) {
        eprintln!("failed to initialize logging: {e:#}");
        return ExitCode::from(2);
    }

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    if cli.list_presets {
        let names = config::list_preset_names(&config_path)
            .with_context(|| format!("failed to read preset names from {}", config_path.display()))?;
        for name in names {
            println!("{name}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    // clap's `required_unless_present = "list_presets"` on these flags
    // guarantees they are `Some` once the list-presets short-circuit above
    // has not fired.
    let output_dir = cli.output_dir.clone().expect("required unless --list-presets");
    let scratch_dir = cli.scratch_dir.clone().expect("required unless --list-presets");
    let token_dir = cli.token_dir.clone().expect("required unless --list-presets");
    let preset_name = cli.preset.clone().expect("required unless --list-presets");

    let preset = config::load_preset(&config_path, &preset_name)
        .with_context(|| format!("failed to load preset '{preset_name}' from {}", config_path.display()))?;

    let overrides = CliOverrides {
        one_pass: cli.one_pass.then_some(true),
        title_rate: cli.title_rate.clone(),
        closing_rate: cli.closing_rate.clone(),
        skip_first_episodes: cli.skip_rate_for_first_episodes.then_some(true),
    };

    let settings = config::build_encode_settings(&preset, &overrides)
        .context("failed to assemble encode settings from preset")?;
    let zone_config = config::build_zone_config(&overrides).context("failed to parse zone rate flags")?;
    let crop_samples = config::get_crop_samples(&preset).context("preset missing crop_samples")?;
    let ffprobe_path = config::get_ffprobe_path(&preset).context("preset missing ffprobe_path")?;

    let runner: Arc<dyn ProcessRunner> = Arc::new(SystemProcessRunner::new());
    let probe = Arc::new(FfprobeMediaProbe::new(runner.clone(), ffprobe_path));

    let scheduler_config = Arc::new(SchedulerConfig {
        output_dir: output_dir.clone(),
        scratch_dir,
        token_dir,
        max_workers: cli.jobs,
        settings,
        zone_config,
        crop_samples,
    });

    let jobs = scheduler::build_jobs(&cli.inputs, &output_dir);
    if jobs.is_empty() {
        log::warn!("no processable inputs found");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let summary = runtime.block_on(scheduler::run_batch(jobs, scheduler_config, probe, runner))?;

    log::info!(
        "completed={} failed={} skipped={} interrupted={}",
        summary.completed,
        summary.failed,
        summary.skipped,
        summary.interrupted
    );

    if summary.interrupted {
        log::warn!("run was interrupted by a shutdown signal before all inputs were processed");
        Ok(ExitCode::from(1))
    } else if summary.succeeded() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(1))
    }
}
