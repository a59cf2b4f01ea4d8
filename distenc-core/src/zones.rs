// ============================================================================
// distenc-core/src/zones.rs
// ============================================================================
//
// ZONE PLANNER: Chapter-Derived Bitrate Zones
//
// Maps chapter boundaries and the configured title/closing rates to a
// forward-slash-joined `start_frame,end_frame,b=multiplier` string consumed
// by the encoder's `zones=` parameter (§4.4). Any missing required field
// (duration, frame rate, a qualifying chapter) short-circuits that zone to
// nothing rather than failing the job: zone planning never fails the job on
// its own.

use crate::media::VideoInfo;

/// `(seconds, multiplier)` pair read from the `title_rate` / `closing_rate`
/// preset keys.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateConfig {
    pub seconds: f64,
    pub multiplier: f64,
}

/// Zone-planning configuration, parsed from preset keys.
#[derive(Debug, Clone, Default)]
pub struct ZoneConfig {
    pub title_rate: Option<RateConfig>,
    pub closing_rate: Option<RateConfig>,
    pub skip_first_episodes: bool,
}

/// Heuristic window (seconds) within which a leading chapter is assumed to
/// be a title sequence rather than content.
const TITLE_SEQUENCE_WINDOW_S: f64 = 600.0;

/// Builds the zone string for `info` under `config`. Empty when no zone
/// rule applies — never an error.
pub fn plan_zones(info: &VideoInfo, config: &ZoneConfig) -> String {
    if config.skip_first_episodes && info.file_name().contains("E01") {
        return String::new();
    }

    let mut zones = Vec::new();

    if let (Some(rate), Some(fps)) = (config.title_rate, info.frame_rate_fps) {
        if let Some(earliest) = info
            .chapters
            .iter()
            .min_by(|a, b| a.start_s.total_cmp(&b.start_s))
        {
            if let Some(end_s) = earliest.end_s {
                if end_s <= TITLE_SEQUENCE_WINDOW_S {
                    let start_frame = (0.0f64.max(end_s - rate.seconds) * fps).floor() as i64;
                    let end_frame = (end_s * fps).floor() as i64;
                    if start_frame < end_frame {
                        zones.push(format!("{start_frame},{end_frame},b={}", rate.multiplier));
                    }
                }
            }
        }
    }

    if let (Some(rate), Some(duration), Some(fps)) =
        (config.closing_rate, info.duration_s, info.frame_rate_fps)
    {
        let start_frame = (0.0f64.max(duration - rate.seconds) * fps).floor() as i64;
        let end_frame = (duration * fps).floor() as i64;
        if start_frame < end_frame {
            zones.push(format!("{start_frame},{end_frame},b={}", rate.multiplier));
        }
    }

    zones.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::Chapter;

    fn sample_info() -> VideoInfo {
        let mut info = VideoInfo::new("Show.mkv".into());
        info.chapters = vec![
            Chapter { start_s: 0.0, end_s: Some(60.0) },
            Chapter { start_s: 60.0, end_s: Some(1200.0) },
            Chapter { start_s: 1200.0, end_s: Some(1500.0) },
        ];
        info.duration_s = Some(1500.0);
        info.frame_rate_fps = Some(24.0);
        info
    }

    #[test]
    fn title_and_closing_zones_combine() {
        let info = sample_info();
        let config = ZoneConfig {
            title_rate: Some(RateConfig { seconds: 30.0, multiplier: 0.5 }),
            closing_rate: Some(RateConfig { seconds: 60.0, multiplier: 0.7 }),
            skip_first_episodes: false,
        };
        assert_eq!(plan_zones(&info, &config), "720,1440,b=0.5/34560,36000,b=0.7");
    }

    #[test]
    fn skip_first_episodes_yields_empty_string() {
        let mut info = sample_info();
        info.path = "Show.S01E01.mkv".into();
        let config = ZoneConfig {
            title_rate: Some(RateConfig { seconds: 30.0, multiplier: 0.5 }),
            closing_rate: None,
            skip_first_episodes: true,
        };
        assert_eq!(plan_zones(&info, &config), "");
    }

    #[test]
    fn missing_frame_rate_short_circuits_to_empty() {
        let mut info = sample_info();
        info.frame_rate_fps = None;
        let config = ZoneConfig {
            title_rate: Some(RateConfig { seconds: 30.0, multiplier: 0.5 }),
            closing_rate: Some(RateConfig { seconds: 60.0, multiplier: 0.7 }),
            skip_first_episodes: false,
        };
        assert_eq!(plan_zones(&info, &config), "");
    }

    #[test]
    fn title_sequence_beyond_window_is_ignored() {
        let mut info = sample_info();
        info.chapters[0].end_s = Some(700.0);
        let config = ZoneConfig {
            title_rate: Some(RateConfig { seconds: 30.0, multiplier: 0.5 }),
            closing_rate: None,
            skip_first_episodes: false,
        };
        assert_eq!(plan_zones(&info, &config), "");
    }

    #[test]
    fn every_emitted_zone_has_start_before_end() {
        let info = sample_info();
        let config = ZoneConfig {
            title_rate: Some(RateConfig { seconds: 30.0, multiplier: 0.5 }),
            closing_rate: Some(RateConfig { seconds: 60.0, multiplier: 0.7 }),
            skip_first_episodes: false,
        };
        let zones = plan_zones(&info, &config);
        for triple in zones.split('/') {
            let parts: Vec<&str> = triple.split(',').collect();
            let start: i64 = parts[0].parse().unwrap();
            let end: i64 = parts[1].parse().unwrap();
            assert!(start < end);
            assert!(start >= 0);
        }
    }
}
