// ============================================================================
// distenc-core/tests/claim_exclusivity.rs
// ============================================================================
//
// END-TO-END: Two Cooperating Workers, One Shared Token Directory
//
// Drives two full `run_batch` schedulers concurrently against the same
// inputs, output directory, and token directory, exactly as two independent
// worker processes launched against a shared filesystem would. The encoder
// and probe binaries are replaced with tiny stub shell scripts, spawned as
// real child processes through `SystemProcessRunner`, so the claim registry's
// O_EXCL exclusivity is exercised against the real kernel rather than an
// in-memory fake.
//
// Scenario: two workers, inputs [a.mkv, b.mkv], jobs=1 each. Exactly one
// worker claims each input; across both workers completed=2, skipped=2,
// failed=0.

use distenc_core::command_builder::EncodeSettings;
use distenc_core::media::FfprobeMediaProbe;
use distenc_core::process::SystemProcessRunner;
use distenc_core::scheduler::{self, SchedulerConfig};
use distenc_core::zones::ZoneConfig;
use std::path::PathBuf;
use std::sync::Arc;

fn fixture(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
        .to_string_lossy()
        .into_owned()
}

fn settings() -> EncodeSettings {
    EncodeSettings {
        ffmpeg_path: fixture("stub_ffmpeg.sh"),
        target_width: 1920,
        target_height: 1080,
        crf_or_rate: 22,
        audio_bitrate_kbps: 128,
        x265_params: String::new(),
        add_x265_params: String::new(),
        video_filter: None,
        scale_filter: None,
        sharpen_filter: None,
        one_pass: true,
    }
}

#[tokio::test]
async fn two_workers_share_a_token_dir_without_double_encoding() {
    let output_dir = tempfile::tempdir().unwrap();
    let scratch_dir = tempfile::tempdir().unwrap();
    let token_dir = tempfile::tempdir().unwrap();
    let input_dir = tempfile::tempdir().unwrap();

    let a = input_dir.path().join("a.mkv");
    let b = input_dir.path().join("b.mkv");
    tokio::fs::write(&a, b"not a real video").await.unwrap();
    tokio::fs::write(&b, b"not a real video either").await.unwrap();

    let inputs = vec![a, b];

    let make_worker = || {
        let runner: Arc<dyn distenc_core::process::ProcessRunner> =
            Arc::new(SystemProcessRunner::new());
        let probe = Arc::new(FfprobeMediaProbe::new(runner.clone(), fixture("stub_ffprobe.sh")));
        let config = Arc::new(SchedulerConfig {
            output_dir: output_dir.path().to_path_buf(),
            scratch_dir: scratch_dir.path().to_path_buf(),
            token_dir: token_dir.path().to_path_buf(),
            max_workers: 1,
            settings: settings(),
            zone_config: ZoneConfig::default(),
            crop_samples: 1,
        });
        (runner, probe, config)
    };

    let jobs_a = scheduler::build_jobs(&inputs, output_dir.path());
    let jobs_b = scheduler::build_jobs(&inputs, output_dir.path());

    let (runner_a, probe_a, config_a) = make_worker();
    let (runner_b, probe_b, config_b) = make_worker();

    let worker_a = tokio::spawn(scheduler::run_batch(jobs_a, config_a, probe_a, runner_a));
    let worker_b = tokio::spawn(scheduler::run_batch(jobs_b, config_b, probe_b, runner_b));

    let summary_a = worker_a.await.unwrap().unwrap();
    let summary_b = worker_b.await.unwrap().unwrap();

    assert_eq!(summary_a.failed, 0);
    assert_eq!(summary_b.failed, 0);

    let total_completed = summary_a.completed + summary_b.completed;
    let total_skipped = summary_a.skipped + summary_b.skipped;
    assert_eq!(total_completed, 2, "exactly one worker should complete each input");
    assert_eq!(total_skipped, 2, "the other worker should skip each already-claimed input");

    assert!(tokio::fs::try_exists(output_dir.path().join("a.mkv")).await.unwrap());
    assert!(tokio::fs::try_exists(output_dir.path().join("b.mkv")).await.unwrap());
}
