// ============================================================================
// distenc-core/src/command_builder.rs
// ============================================================================
//
// COMMAND BUILDER: Transcoder Argument Vectors
//
// Composes the video filter chain, merges x265 parameter lists, and decides
// between one-pass and two-pass invocation (§4.5). This module owns no
// process execution; it only produces argv vectors for the encoder driver to
// hand to a `ProcessRunner`.

use crate::media::{CropRect, VideoInfo};
use std::collections::BTreeMap;
use std::path::Path;

/// Typed view over the subset of preset keys the command builder consumes.
/// Populated from the raw preset map by the configuration loader (§4.9); see
/// the design note on preset dynamic typing.
#[derive(Debug, Clone)]
pub struct EncodeSettings {
    pub ffmpeg_path: String,
    pub target_width: u32,
    pub target_height: u32,
    pub crf_or_rate: u32,
    pub audio_bitrate_kbps: u32,
    pub x265_params: String,
    pub add_x265_params: String,
    pub video_filter: Option<String>,
    pub scale_filter: Option<String>,
    pub sharpen_filter: Option<String>,
    pub one_pass: bool,
}

/// The crf_or_rate threshold at or below which a value is treated as a CRF
/// (quality target) rather than a bitrate in kbps (§4.5).
const CRF_RATE_THRESHOLD: u32 = 50;

/// Whether the builder selects the one-pass or two-pass form for `settings`.
pub fn is_one_pass(settings: &EncodeSettings) -> bool {
    settings.one_pass || settings.crf_or_rate <= CRF_RATE_THRESHOLD
}

/// Parses a colon-separated `key=value` list into an ordered map, preserving
/// first-seen key order via `BTreeMap`'s iteration being irrelevant here
/// (only override semantics matter, not original order).
fn parse_params(raw: &str) -> BTreeMap<String, String> {
    raw.split(':')
        .filter(|kv| !kv.is_empty())
        .filter_map(|kv| kv.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Merges `base` and `overrides`, letting `overrides` win on key collision,
/// and serializes back to colon-joined `key=value` form.
fn merge_params(base: &str, overrides: &str) -> String {
    let mut merged = parse_params(base);
    for (k, v) in parse_params(overrides) {
        merged.insert(k, v);
    }
    merged
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Builds the `-vf` filter chain: `[video_filter?, scale, crop, sharpen?]`.
fn build_filter_chain(settings: &EncodeSettings, crop: &CropRect) -> String {
    let mut stages = Vec::new();
    if let Some(vf) = &settings.video_filter {
        if !vf.is_empty() {
            stages.push(vf.clone());
        }
    }
    if let Some(scale_filter) = &settings.scale_filter {
        stages.push(format!(
            "zscale={}:{}:filter={}",
            settings.target_width, settings.target_height, scale_filter
        ));
    }
    stages.push(crop.filter_string());
    if let Some(sharpen) = &settings.sharpen_filter {
        if !sharpen.is_empty() {
            stages.push(sharpen.clone());
        }
    }
    stages.join(",")
}

/// Builds the merged x265 parameter string, prefixed with `zones=...:` when
/// `zone_string` is non-empty.
fn build_x265_params(settings: &EncodeSettings, zone_string: &str) -> String {
    let merged = merge_params(&settings.x265_params, &settings.add_x265_params);
    if zone_string.is_empty() {
        merged
    } else if merged.is_empty() {
        format!("zones={zone_string}")
    } else {
        format!("zones={zone_string}:{merged}")
    }
}

/// The two invocation shapes the encoder driver may need to run.
pub enum EncodePlan {
    OnePass { args: Vec<String> },
    TwoPass {
        pass1_args: Vec<String>,
        pass2_args: Vec<String>,
    },
}

/// Builds the full encode plan for `info`/`crop`/`zone_string` under
/// `settings`. `stats_path` is the pass-1 statistics file (two-pass only);
/// `loudness` is `None` for pass 1 and `Some` for the pass-2 substitution
/// (§4.6 MEASURE).
pub fn build_plan(
    info: &VideoInfo,
    crop: &CropRect,
    zone_string: &str,
    settings: &EncodeSettings,
    output_path: &Path,
    stats_path: &Path,
    loudness: Option<&LoudnessMeasurement>,
) -> EncodePlan {
    let filter_chain = build_filter_chain(settings, crop);
    let x265_params = build_x265_params(settings, zone_string);
    let input = info.path.to_string_lossy().into_owned();

    if is_one_pass(settings) {
        EncodePlan::OnePass {
            args: one_pass_args(&input, &filter_chain, &x265_params, settings, info, output_path),
        }
    } else {
        let pass1 = pass1_args(&input, &filter_chain, &x265_params, settings, stats_path);
        let measurement = loudness.cloned().unwrap_or_default();
        let pass2 = pass2_args(
            &input,
            &filter_chain,
            &x265_params,
            settings,
            info,
            output_path,
            stats_path,
            &measurement,
        );
        EncodePlan::TwoPass { pass1_args: pass1, pass2_args: pass2 }
    }
}

fn common_video_args(
    input: &str,
    filter_chain: &str,
    settings: &EncodeSettings,
    info: &VideoInfo,
) -> Vec<String> {
    let mut args = vec!["-i".to_string(), input.to_string()];
    args.extend(["-vf".to_string(), filter_chain.to_string()]);
    args.extend(["-c:v".to_string(), "libx265".to_string()]);
    args.extend(["-crf".to_string(), settings.crf_or_rate.to_string()]);
    args.extend([
        "-hdr".to_string(),
        if info.has_hdr_dv { "1".to_string() } else { "0".to_string() },
    ]);
    args
}

fn one_pass_args(
    input: &str,
    filter_chain: &str,
    x265_params: &str,
    settings: &EncodeSettings,
    info: &VideoInfo,
    output_path: &Path,
) -> Vec<String> {
    let mut args = common_video_args(input, filter_chain, settings, info);
    args.extend(["-x265-params".to_string(), x265_params.to_string()]);
    args.extend(["-map".to_string(), "0:v:0".to_string()]);
    args.extend(["-map".to_string(), "0:a:0".to_string()]);
    args.extend([
        "-af".to_string(),
        "loudnorm=I=-23:TP=-2:LRA=7".to_string(),
    ]);
    args.extend(["-ac".to_string(), "2".to_string()]);
    args.extend(["-c:a".to_string(), "libopus".to_string()]);
    args.extend([
        "-b:a".to_string(),
        format!("{}k", settings.audio_bitrate_kbps),
    ]);
    for idx in &info.text_subtitle_indices {
        args.extend(["-map".to_string(), format!("0:s:{idx}")]);
    }
    if !info.text_subtitle_indices.is_empty() {
        args.extend(["-c:s".to_string(), "copy".to_string()]);
    }
    args.push(output_path.to_string_lossy().into_owned());
    args
}

fn pass1_args(
    input: &str,
    filter_chain: &str,
    x265_params: &str,
    settings: &EncodeSettings,
    stats_path: &Path,
) -> Vec<String> {
    let mut args = vec!["-i".to_string(), input.to_string()];
    args.extend(["-vf".to_string(), filter_chain.to_string()]);
    args.extend(["-c:v".to_string(), "libx265".to_string()]);
    args.extend(["-crf".to_string(), settings.crf_or_rate.to_string()]);
    args.extend([
        "-x265-params".to_string(),
        format!("{x265_params}:pass=1:stats={}", stats_path.display()),
    ]);
    args.extend(["-an".to_string()]);
    args.extend([
        "-af".to_string(),
        "ebur128=peak=true:framelog=verbose".to_string(),
    ]);
    args.extend(["-f".to_string(), "null".to_string(), "-".to_string()]);
    args
}

fn pass2_args(
    input: &str,
    filter_chain: &str,
    x265_params: &str,
    settings: &EncodeSettings,
    info: &VideoInfo,
    output_path: &Path,
    stats_path: &Path,
    loudness: &LoudnessMeasurement,
) -> Vec<String> {
    let mut args = common_video_args(input, filter_chain, settings, info);
    args.extend([
        "-x265-params".to_string(),
        format!("{x265_params}:pass=2:stats={}", stats_path.display()),
    ]);
    args.extend(["-map".to_string(), "0:v:0".to_string()]);
    args.extend(["-map".to_string(), "0:a:0".to_string()]);
    args.extend([
        "-af".to_string(),
        format!(
            "loudnorm=I=-23:TP=-2:LRA=7:measured_I={}:measured_TP={}:measured_LRA={}:measured_thresh={}:offset={}:linear=true",
            loudness.input_i, loudness.input_tp, loudness.input_lra, loudness.input_thresh, loudness.target_offset
        ),
    ]);
    args.extend(["-ac".to_string(), "2".to_string()]);
    args.extend(["-c:a".to_string(), "libopus".to_string()]);
    args.extend([
        "-b:a".to_string(),
        format!("{}k", settings.audio_bitrate_kbps),
    ]);
    for idx in &info.text_subtitle_indices {
        args.extend(["-map".to_string(), format!("0:s:{idx}")]);
    }
    if !info.text_subtitle_indices.is_empty() {
        args.extend(["-c:s".to_string(), "copy".to_string()]);
    }
    args.push(output_path.to_string_lossy().into_owned());
    args
}

/// Loudness statistics extracted from the pass-1 log during MEASURE (§4.6).
/// Missing keys fall back to the documented defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoudnessMeasurement {
    pub input_i: f64,
    pub input_tp: f64,
    pub input_lra: f64,
    pub input_thresh: f64,
    pub target_offset: f64,
}

impl Default for LoudnessMeasurement {
    fn default() -> Self {
        Self {
            input_i: -23.0,
            input_tp: -2.0,
            input_lra: 7.0,
            input_thresh: -33.0,
            target_offset: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::VideoInfo;

    fn sample_settings(crf_or_rate: u32, one_pass: bool) -> EncodeSettings {
        EncodeSettings {
            ffmpeg_path: "ffmpeg".to_string(),
            target_width: 1920,
            target_height: 1080,
            crf_or_rate,
            audio_bitrate_kbps: 128,
            x265_params: "aq-mode=3:bframes=8".to_string(),
            add_x265_params: String::new(),
            video_filter: None,
            scale_filter: Some("lanczos".to_string()),
            sharpen_filter: None,
            one_pass,
        }
    }

    #[test]
    fn one_pass_selected_when_crf_or_rate_is_low() {
        let settings = sample_settings(22, false);
        assert!(is_one_pass(&settings));
    }

    #[test]
    fn two_pass_selected_when_rate_is_high_and_one_pass_false() {
        let settings = sample_settings(6000, false);
        assert!(!is_one_pass(&settings));
    }

    #[test]
    fn one_pass_flag_forces_one_pass_regardless_of_rate() {
        let settings = sample_settings(6000, true);
        assert!(is_one_pass(&settings));
    }

    #[test]
    fn add_x265_params_overrides_exactly_one_occurrence() {
        let settings = EncodeSettings {
            add_x265_params: "bframes=4".to_string(),
            ..sample_settings(22, true)
        };
        let merged = build_x265_params(&settings, "");
        let occurrences = merged.matches("bframes=").count();
        assert_eq!(occurrences, 1);
        assert!(merged.contains("bframes=4"));
        assert!(!merged.contains("bframes=8"));
    }

    #[test]
    fn zone_string_is_prefixed() {
        let settings = sample_settings(22, true);
        let merged = build_x265_params(&settings, "720,1440,b=0.5");
        assert!(merged.starts_with("zones=720,1440,b=0.5:"));
    }

    #[test]
    fn filter_chain_orders_stages() {
        let settings = sample_settings(22, true);
        let crop = CropRect { w: 1920, h: 800, x: 0, y: 140 };
        let chain = build_filter_chain(&settings, &crop);
        assert_eq!(chain, "zscale=1920:1080:filter=lanczos,crop=1920:800:0:140");
    }

    #[test]
    fn pass2_substitutes_measured_loudness() {
        let info = VideoInfo::new("in.mkv".into());
        let settings = sample_settings(6000, false);
        let crop = CropRect { w: 1920, h: 800, x: 0, y: 140 };
        let loudness = LoudnessMeasurement {
            input_i: -24.3,
            target_offset: 0.7,
            ..Default::default()
        };
        let chain = build_filter_chain(&settings, &crop);
        let x265 = build_x265_params(&settings, "");
        let args = pass2_args(
            "in.mkv",
            &chain,
            &x265,
            &settings,
            &info,
            Path::new("out.mkv"),
            Path::new("scratch/stats.log"),
            &loudness,
        );
        let af = args
            .windows(2)
            .find(|w| w[0] == "-af")
            .map(|w| w[1].clone())
            .unwrap();
        assert!(af.contains("measured_I=-24.3"));
        assert!(af.contains("offset=0.7"));
    }
}
