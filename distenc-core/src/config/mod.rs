// ============================================================================
// distenc-core/src/config/mod.rs
// ============================================================================
//
// CONFIGURATION: Preset Loading and Typed Settings Assembly
//
// Bridges the raw, heterogeneous `Preset` map (§3, §4.9) to the typed
// `EncodeSettings`/`ZoneConfig` structs the rest of the pipeline consumes,
// applying CLI-flag overrides last (§6).

mod preset;

pub use preset::{Preset, PresetValue, list_preset_names, load_preset};

use crate::command_builder::EncodeSettings;
use crate::error::{CoreError, CoreResult};
use crate::zones::{RateConfig, ZoneConfig};

/// CLI-flag overrides applied on top of a loaded preset (§6): all optional,
/// since most runs simply use the preset as-is.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub one_pass: Option<bool>,
    pub title_rate: Option<String>,
    pub closing_rate: Option<String>,
    pub skip_first_episodes: Option<bool>,
}

fn require_str(preset: &Preset, key: &str) -> CoreResult<String> {
    preset
        .get(key)
        .and_then(PresetValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| CoreError::OperationFailed(format!("preset key '{key}' missing or not a string")))
}

fn require_u32(preset: &Preset, key: &str) -> CoreResult<u32> {
    preset
        .get(key)
        .and_then(PresetValue::as_int)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| CoreError::OperationFailed(format!("preset key '{key}' missing or not an integer")))
}

fn optional_str(preset: &Preset, key: &str) -> Option<String> {
    preset.get(key).and_then(PresetValue::as_str).map(str::to_string)
}

fn optional_bool(preset: &Preset, key: &str, default: bool) -> bool {
    preset.get(key).and_then(PresetValue::as_bool).unwrap_or(default)
}

/// Builds an `EncodeSettings` from a loaded `Preset`, layering `overrides`
/// on top last.
pub fn build_encode_settings(preset: &Preset, overrides: &CliOverrides) -> CoreResult<EncodeSettings> {
    let x265_params = optional_str(preset, "x265_params").unwrap_or_default();
    let add_x265_params = optional_str(preset, "add_x265_params").unwrap_or_default();

    Ok(EncodeSettings {
        ffmpeg_path: require_str(preset, "ffmpeg_path")?,
        target_width: require_u32(preset, "target_width")?,
        target_height: require_u32(preset, "target_height")?,
        crf_or_rate: require_u32(preset, "crf_or_rate")?,
        audio_bitrate_kbps: require_u32(preset, "audio_bitrate_kbps")?,
        x265_params,
        add_x265_params,
        video_filter: optional_str(preset, "video_filter"),
        scale_filter: optional_str(preset, "scale_filter"),
        sharpen_filter: optional_str(preset, "sharpen_filter"),
        one_pass: overrides
            .one_pass
            .unwrap_or_else(|| optional_bool(preset, "one_pass", false)),
    })
}

/// Parses a `"seconds,multiplier"` CLI value into a `RateConfig`.
fn parse_rate_config(raw: &str) -> CoreResult<RateConfig> {
    let (seconds, multiplier) = raw
        .split_once(',')
        .ok_or_else(|| CoreError::OperationFailed(format!("invalid rate spec: '{raw}'")))?;
    let seconds: f64 = seconds
        .trim()
        .parse()
        .map_err(|_| CoreError::OperationFailed(format!("invalid rate seconds: '{seconds}'")))?;
    let multiplier: f64 = multiplier
        .trim()
        .parse()
        .map_err(|_| CoreError::OperationFailed(format!("invalid rate multiplier: '{multiplier}'")))?;
    Ok(RateConfig { seconds, multiplier })
}

/// Builds a `ZoneConfig` from CLI overrides (`--title-rate`, `--closing-rate`,
/// `--skip-rate-for-first-episodes`).
pub fn build_zone_config(overrides: &CliOverrides) -> CoreResult<ZoneConfig> {
    let title_rate = overrides.title_rate.as_deref().map(parse_rate_config).transpose()?;
    let closing_rate = overrides.closing_rate.as_deref().map(parse_rate_config).transpose()?;

    Ok(ZoneConfig {
        title_rate,
        closing_rate,
        skip_first_episodes: overrides.skip_first_episodes.unwrap_or(false),
    })
}

pub fn get_crop_samples(preset: &Preset) -> CoreResult<u32> {
    require_u32(preset, "crop_samples")
}

pub fn get_ffprobe_path(preset: &Preset) -> CoreResult<String> {
    require_str(preset, "ffprobe_path")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_preset() -> Preset {
        let mut preset = Preset::default();
        preset.insert("ffmpeg_path", PresetValue::Str("ffmpeg".to_string()));
        preset.insert("ffprobe_path", PresetValue::Str("ffprobe".to_string()));
        preset.insert("target_width", PresetValue::Int(1920));
        preset.insert("target_height", PresetValue::Int(1080));
        preset.insert("crop_samples", PresetValue::Int(5));
        preset.insert("crf_or_rate", PresetValue::Int(22));
        preset.insert("audio_bitrate_kbps", PresetValue::Int(128));
        preset.insert("one_pass", PresetValue::Bool(false));
        preset
    }

    #[test]
    fn cli_override_wins_over_preset_one_pass() {
        let preset = sample_preset();
        let overrides = CliOverrides { one_pass: Some(true), ..Default::default() };
        let settings = build_encode_settings(&preset, &overrides).unwrap();
        assert!(settings.one_pass);
    }

    #[test]
    fn preset_value_used_when_no_override() {
        let preset = sample_preset();
        let settings = build_encode_settings(&preset, &CliOverrides::default()).unwrap();
        assert!(!settings.one_pass);
    }

    #[test]
    fn parses_title_and_closing_rate_strings() {
        let overrides = CliOverrides {
            title_rate: Some("30,0.5".to_string()),
            closing_rate: Some("60,0.7".to_string()),
            skip_first_episodes: Some(true),
            ..Default::default()
        };
        let zone_config = build_zone_config(&overrides).unwrap();
        assert_eq!(zone_config.title_rate, Some(RateConfig { seconds: 30.0, multiplier: 0.5 }));
        assert_eq!(zone_config.closing_rate, Some(RateConfig { seconds: 60.0, multiplier: 0.7 }));
        assert!(zone_config.skip_first_episodes);
    }

    #[test]
    fn missing_required_key_is_an_error() {
        let mut preset = sample_preset();
        preset.0.remove("crf_or_rate");
        assert!(build_encode_settings(&preset, &CliOverrides::default()).is_err());
    }
}
