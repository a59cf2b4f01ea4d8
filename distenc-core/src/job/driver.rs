// ============================================================================
// distenc-core/src/job/driver.rs
// ============================================================================
//
// ENCODER DRIVER: The Per-Job State Machine
//
// ANALYZE -> CROP -> PLAN -> PASS1 -> MEASURE -> PASS2 -> COMMIT, or, when
// the command builder selects one-pass, ANALYZE -> CROP -> PLAN -> ENCODE ->
// COMMIT (§4.6). Any stage failing aborts the job: partial output is
// deleted, the token is renamed to `.error_log`, and scratch files matching
// `<scratch_prefix>*` are removed unconditionally on the way out.

use crate::command_builder::{self, EncodePlan, EncodeSettings, LoudnessMeasurement};
use crate::crop::CropDetector;
use crate::error::{CoreError, CoreResult};
use crate::job::registry;
use crate::media::MediaProbe;
use crate::process::ProcessRunner;
use crate::zones::{self, ZoneConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Static configuration the driver needs beyond the per-job paths: encode
/// settings, zone configuration, and crop-sampling parameters.
pub struct DriverConfig {
    pub settings: EncodeSettings,
    pub zone_config: ZoneConfig,
    pub crop_samples: u32,
}

/// Runs the full per-job pipeline for a claimed job. Encoder output is
/// appended directly to `token_path` as each pass runs (§4.6/§6: the token
/// file's bytes after the claim header *are* the captured encoder log), so
/// a job that fails partway still leaves its diagnostics behind once the
/// caller renames the token to `.error_log`.
pub async fn run_job(
    probe: &dyn MediaProbe,
    crop_detector: &CropDetector,
    runner: &Arc<dyn ProcessRunner>,
    input_path: &Path,
    output_path: &Path,
    token_path: &Path,
    scratch_prefix: &Path,
    config: &DriverConfig,
) -> CoreResult<()> {
    let result = run_job_inner(
        probe,
        crop_detector,
        runner,
        input_path,
        output_path,
        token_path,
        scratch_prefix,
        config,
    )
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(output_path).await;
    }
    registry::cleanup_scratch_files(scratch_prefix).await?;

    result
}

async fn run_job_inner(
    probe: &dyn MediaProbe,
    crop_detector: &CropDetector,
    runner: &Arc<dyn ProcessRunner>,
    input_path: &Path,
    output_path: &Path,
    token_path: &Path,
    scratch_prefix: &Path,
    config: &DriverConfig,
) -> CoreResult<()> {
    // ANALYZE
    let mut info = probe.analyze(input_path).await?;
    if info.duration_s.is_none() {
        return Err(CoreError::DurationMissing(info.file_name()));
    }

    // CROP
    let crop = crop_detector
        .detect(
            &info,
            config.crop_samples,
            config.settings.target_width,
            config.settings.target_height,
        )
        .await?;
    info.crop = Some(crop);

    // PLAN
    let zone_string = zones::plan_zones(&info, &config.zone_config);

    let plan = command_builder::build_plan(
        &info,
        &crop,
        &zone_string,
        &config.settings,
        output_path,
        &stats_path(scratch_prefix),
        None,
    );

    match plan {
        EncodePlan::OnePass { args } => {
            runner
                .run_to_sink(&config.settings.ffmpeg_path, &args, token_path, None)
                .await?;
        }
        EncodePlan::TwoPass { pass1_args, .. } => {
            // PASS1
            runner
                .run_to_sink(&config.settings.ffmpeg_path, &pass1_args, token_path, None)
                .await?;

            // MEASURE
            let measured = measure_loudness(token_path).await?;

            let pass2_plan = command_builder::build_plan(
                &info,
                &crop,
                &zone_string,
                &config.settings,
                output_path,
                &stats_path(scratch_prefix),
                Some(&measured),
            );

            let EncodePlan::TwoPass { pass2_args, .. } = pass2_plan else {
                unreachable!("build_plan is deterministic for the same settings");
            };

            // PASS2
            runner
                .run_to_sink(&config.settings.ffmpeg_path, &pass2_args, token_path, None)
                .await?;
        }
    }

    // COMMIT: success is exit 0 of the final pass (already enforced by
    // ProcessRunner::run_to_sink returning Err on non-zero exit) plus
    // existence of output_path.
    if !tokio::fs::try_exists(output_path).await.unwrap_or(false) {
        return Err(CoreError::OperationFailed(format!(
            "encoder reported success but {} does not exist",
            output_path.display()
        )));
    }

    Ok(())
}

fn stats_path(scratch_prefix: &Path) -> PathBuf {
    let mut name = scratch_prefix
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str("_stats.log");
    scratch_prefix.with_file_name(name)
}

/// MEASURE: re-reads the token file (claim header plus pass-1's appended
/// output) line by line, extracting loudness statistics from JSON fragments.
/// Missing keys fall back to the documented defaults rather than failing the
/// job (§4.6).
async fn measure_loudness(token_path: &Path) -> CoreResult<LoudnessMeasurement> {
    let contents = tokio::fs::read_to_string(token_path).await.unwrap_or_default();
    Ok(parse_loudness_fragments(&contents))
}

fn parse_loudness_fragments(text: &str) -> LoudnessMeasurement {
    let mut measurement = LoudnessMeasurement::default();

    // ebur128/loudnorm emit one JSON object spread across multiple lines;
    // rather than require a single well-formed document we scan for each
    // `"key" : "value"` fragment independently, matching the resilience the
    // spec calls for around missing keys.
    if let Some(v) = extract_json_number(text, "input_i") {
        measurement.input_i = v;
    }
    if let Some(v) = extract_json_number(text, "input_tp") {
        measurement.input_tp = v;
    }
    if let Some(v) = extract_json_number(text, "input_lra") {
        measurement.input_lra = v;
    }
    if let Some(v) = extract_json_number(text, "input_thresh") {
        measurement.input_thresh = v;
    }
    if let Some(v) = extract_json_number(text, "target_offset") {
        measurement.target_offset = v;
    }

    measurement
}

fn extract_json_number(text: &str, key: &str) -> Option<f64> {
    let needle = format!("\"{key}\"");
    let start = text.find(&needle)? + needle.len();
    let rest = &text[start..];
    let colon = rest.find(':')?;
    let rest = rest[colon + 1..].trim_start();
    let rest = rest.trim_start_matches('"');
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
        .unwrap_or(rest.len());
    rest[..end].parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quoted_loudness_fragments() {
        let log = r#"[Parsed_loudnorm_0] {
            "input_i" : "-24.3",
            "input_tp" : "-1.5",
            "input_lra" : "5.0",
            "input_thresh" : "-34.0",
            "target_offset" : "0.7"
        }"#;
        let m = parse_loudness_fragments(log);
        assert_eq!(m.input_i, -24.3);
        assert_eq!(m.target_offset, 0.7);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let log = r#"{"input_i" : "-24.3", "target_offset" : "0.7"}"#;
        let m = parse_loudness_fragments(log);
        assert_eq!(m.input_i, -24.3);
        assert_eq!(m.target_offset, 0.7);
        assert_eq!(m.input_tp, -2.0);
        assert_eq!(m.input_lra, 7.0);
        assert_eq!(m.input_thresh, -33.0);
    }

    #[test]
    fn empty_log_yields_all_defaults() {
        let m = parse_loudness_fragments("");
        assert_eq!(m, LoudnessMeasurement::default());
    }
}
