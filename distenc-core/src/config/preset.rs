// ============================================================================
// distenc-core/src/config/preset.rs
// ============================================================================
//
// PRESET LOADING: INI-like Config File, Flat Heterogeneous Value Map
//
// Preset files are `[baseline]` plus one `[preset_<name>]` section per named
// preset; preset keys override baseline keys on load (§6). The map itself is
// heterogeneous (ints, floats, strings, booleans): modeled as a tagged union
// per the design note on dynamic preset typing, with numeric-looking values
// coerced at load time exactly as the source observes (integer vs. float
// distinguishes the `crf_or_rate <= 50` decision, so the coercion must not
// collapse ints into floats).

use crate::error::{CoreError, CoreResult};
use ini::Ini;
use std::collections::HashMap;
use std::path::Path;

/// One value from a preset's flat key→value map.
#[derive(Debug, Clone, PartialEq)]
pub enum PresetValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl PresetValue {
    /// Parses a raw INI value string, preferring int over float over bool
    /// over a bare string, matching the "numeric-looking strings are
    /// coerced to int/float at load time" rule (§3).
    fn coerce(raw: &str) -> PresetValue {
        if let Ok(i) = raw.parse::<i64>() {
            return PresetValue::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return PresetValue::Float(f);
        }
        match raw.to_ascii_lowercase().as_str() {
            "true" => return PresetValue::Bool(true),
            "false" => return PresetValue::Bool(false),
            _ => {}
        }
        PresetValue::Str(raw.to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PresetValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PresetValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            PresetValue::Float(f) => Some(*f),
            PresetValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PresetValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Flat key→value map consumed by the command builder (§3).
#[derive(Debug, Clone, Default)]
pub struct Preset(pub HashMap<String, PresetValue>);

impl Preset {
    pub fn get(&self, key: &str) -> Option<&PresetValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: PresetValue) {
        self.0.insert(key.into(), value);
    }
}

/// Loads `[baseline]` plus `[preset_<name>]` from `path`, with the named
/// preset's keys overriding baseline keys on collision.
pub fn load_preset(path: &Path, preset_name: &str) -> CoreResult<Preset> {
    let ini = Ini::load_from_file(path)
        .map_err(|e| CoreError::OperationFailed(format!("failed to parse {}: {e}", path.display())))?;

    let mut preset = Preset::default();

    if let Some(section) = ini.section(Some("baseline")) {
        for (k, v) in section.iter() {
            preset.insert(k, PresetValue::coerce(v));
        }
    }

    let section_name = format!("preset_{preset_name}");
    let section = ini.section(Some(section_name.as_str())).ok_or_else(|| {
        CoreError::OperationFailed(format!(
            "preset '{preset_name}' not found in {}",
            path.display()
        ))
    })?;
    for (k, v) in section.iter() {
        preset.insert(k, PresetValue::coerce(v));
    }

    Ok(preset)
}

/// Lists the preset names declared in `path` (`-l/--list-presets`): every
/// `[preset_<name>]` section, stripped of its `preset_` prefix.
pub fn list_preset_names(path: &Path) -> CoreResult<Vec<String>> {
    let ini = Ini::load_from_file(path)
        .map_err(|e| CoreError::OperationFailed(format!("failed to parse {}: {e}", path.display())))?;

    Ok(ini
        .sections()
        .filter_map(|s| s?.strip_prefix("preset_").map(str::to_string))
        .collect())
}
