// ============================================================================
// distenc-core/src/scheduler.rs
// ============================================================================
//
// BATCH SCHEDULER: Directory Setup, Enumeration, Bounded Concurrency (§4.8)
//
// Single process, cooperative task model (§5): jobs are tokio tasks that
// suspend only at explicit boundaries (process wait, file I/O, semaphore
// acquire, joining sibling tasks). The scheduler itself performs no CPU work;
// all of it happens inside the spawned encoder child processes.
//
// AI-ASSISTANT-INFO: mirrors the active-jobs bookkeeping and wait-for-all
// shape of the core's synchronous scheduler, re-expressed over
// tokio::sync::Semaphore with an explicit shutdown flag instead of OS threads.

use crate::command_builder::EncodeSettings;
use crate::crop::CropDetector;
use crate::discovery;
use crate::error::CoreResult;
use crate::job::{self, ClaimOutcome, DriverConfig, EncodingJob, JobStatus};
use crate::media::MediaProbe;
use crate::process::ProcessRunner;
use crate::zones::ZoneConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, Semaphore};

/// Directory layout and concurrency bound for one scheduler run.
pub struct SchedulerConfig {
    pub output_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub token_dir: PathBuf,
    pub max_workers: usize,
    pub settings: EncodeSettings,
    pub zone_config: ZoneConfig,
    pub crop_samples: u32,
}

/// Final tally returned once every input has been dispositioned.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Whether a shutdown signal (SIGINT/SIGTERM) was observed during the
    /// run. The CLI maps this to its own exit code (§6: 1 on
    /// KeyboardInterrupt) independent of `failed`.
    pub interrupted: bool,
}

impl RunSummary {
    /// Per §4.8: the batch run succeeds iff no job failed.
    pub fn succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Creates the output, scratch, and token directories if absent.
async fn ensure_directories(config: &SchedulerConfig) -> CoreResult<()> {
    tokio::fs::create_dir_all(&config.output_dir).await?;
    tokio::fs::create_dir_all(&config.scratch_dir).await?;
    tokio::fs::create_dir_all(&config.token_dir).await?;
    Ok(())
}

/// Enumerates `inputs`, dropping non-files with a warning, and builds one
/// `EncodingJob` per surviving input.
pub fn build_jobs(inputs: &[PathBuf], output_dir: &Path) -> Vec<EncodingJob> {
    discovery::discover_processable_inputs(inputs)
        .into_iter()
        .filter_map(|input| {
            let output_path = discovery::output_path_for(&input, output_dir)?;
            Some(EncodingJob::new(input, output_path))
        })
        .collect()
}

/// Registers a SIGINT/SIGTERM handler that flips `shutdown` on the first
/// signal. A second signal is left to the default OS disposition (the
/// process terminates immediately; cleanup of any in-flight encoder output
/// happens via the FAILED path on the next invocation, per §5).
fn spawn_shutdown_listener(shutdown: Arc<AtomicBool>) {
    tokio::spawn(async move {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {e}");
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
        log::warn!("shutdown requested; finishing in-flight jobs and skipping the rest");
        shutdown.store(true, Ordering::SeqCst);
    });
}

/// Runs the batch: claims and processes every job in `jobs`, bounded to
/// `config.max_workers` concurrent encodes.
pub async fn run_batch(
    jobs: Vec<EncodingJob>,
    config: Arc<SchedulerConfig>,
    probe: Arc<dyn MediaProbe>,
    runner: Arc<dyn ProcessRunner>,
) -> CoreResult<RunSummary> {
    ensure_directories(&config).await?;

    let semaphore = Arc::new(Semaphore::new(config.max_workers.max(1)));
    let shutdown = Arc::new(AtomicBool::new(false));
    spawn_shutdown_listener(shutdown.clone());

    let active_jobs: Arc<Mutex<HashMap<PathBuf, JobStatus>>> = Arc::new(Mutex::new(HashMap::new()));
    let crop_detector = Arc::new(CropDetector::new(runner.clone(), config.settings.ffmpeg_path.clone()));

    let mut handles = Vec::with_capacity(jobs.len());
    for job in jobs {
        let semaphore = semaphore.clone();
        let shutdown = shutdown.clone();
        let active_jobs = active_jobs.clone();
        let config = config.clone();
        let probe = probe.clone();
        let runner = runner.clone();
        let crop_detector = crop_detector.clone();

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
            run_one_job(job, config, probe, runner, crop_detector, active_jobs, shutdown).await
        }));
    }

    let mut summary = RunSummary::default();
    for handle in handles {
        match handle.await {
            Ok(status) => tally(&mut summary, status),
            Err(e) => {
                log::error!("job task panicked: {e}");
                summary.failed += 1;
            }
        }
    }

    summary.interrupted = shutdown.load(Ordering::SeqCst);

    log::info!(
        "batch finished: completed={} failed={} skipped={} interrupted={}",
        summary.completed,
        summary.failed,
        summary.skipped,
        summary.interrupted
    );

    Ok(summary)
}

fn tally(summary: &mut RunSummary, status: JobStatus) {
    match status {
        JobStatus::Completed => summary.completed += 1,
        JobStatus::Failed => summary.failed += 1,
        JobStatus::Skipped => summary.skipped += 1,
        JobStatus::Pending | JobStatus::InProgress => {
            // A task only returns after settling into a terminal status.
            unreachable!("job task returned before reaching a terminal status")
        }
    }
}

async fn run_one_job(
    mut encoding_job: EncodingJob,
    config: Arc<SchedulerConfig>,
    probe: Arc<dyn MediaProbe>,
    runner: Arc<dyn ProcessRunner>,
    crop_detector: Arc<CropDetector>,
    active_jobs: Arc<Mutex<HashMap<PathBuf, JobStatus>>>,
    shutdown: Arc<AtomicBool>,
) -> JobStatus {
    if shutdown.load(Ordering::SeqCst) {
        encoding_job.mark_skipped();
        return JobStatus::Skipped;
    }

    let claim = job::try_claim(
        &config.token_dir,
        &config.scratch_dir,
        &encoding_job.input_path,
        &encoding_job.output_path,
    )
    .await;

    let (token_path, scratch_prefix) = match claim {
        Ok(ClaimOutcome::Claimed { token_path, scratch_prefix }) => (token_path, scratch_prefix),
        Ok(ClaimOutcome::NotClaimed) => {
            encoding_job.mark_skipped();
            return JobStatus::Skipped;
        }
        Err(e) => {
            log::error!("claim attempt failed for {}: {e}", encoding_job.input_path.display());
            encoding_job.mark_skipped();
            return JobStatus::Skipped;
        }
    };

    encoding_job.mark_claimed(token_path.clone(), scratch_prefix.clone());
    active_jobs
        .lock()
        .await
        .insert(encoding_job.input_path.clone(), JobStatus::InProgress);

    let driver_config = DriverConfig {
        settings: config.settings.clone(),
        zone_config: config.zone_config.clone(),
        crop_samples: config.crop_samples,
    };

    let result = job::run_job(
        probe.as_ref(),
        &crop_detector,
        &runner,
        &encoding_job.input_path,
        &encoding_job.output_path,
        &token_path,
        &scratch_prefix,
        &driver_config,
    )
    .await;

    let final_status = match result {
        Ok(()) => {
            job::release_on_completed();
            encoding_job.mark_completed();
            JobStatus::Completed
        }
        Err(e) => {
            log::error!("job failed for {}: {e}", encoding_job.input_path.display());
            if let Err(release_err) = job::release_on_failed(&token_path).await {
                log::warn!("failed to release token after failure: {release_err}");
            }
            encoding_job.mark_failed(e.to_string());
            JobStatus::Failed
        }
    };

    active_jobs.lock().await.remove(&encoding_job.input_path);
    final_status
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_succeeds_only_with_zero_failures() {
        let ok = RunSummary { completed: 2, failed: 0, skipped: 1, interrupted: false };
        assert!(ok.succeeded());
        let bad = RunSummary { completed: 2, failed: 1, skipped: 0, interrupted: false };
        assert!(!bad.succeeded());
    }

    #[test]
    fn build_jobs_drops_non_files() {
        let dir = tempfile::tempdir().unwrap();
        let real_file = dir.path().join("in.mkv");
        std::fs::write(&real_file, b"x").unwrap();
        let missing = dir.path().join("missing.mkv");

        let jobs = build_jobs(&[real_file.clone(), missing], dir.path());
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].input_path, real_file);
    }
}
