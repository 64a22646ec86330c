use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::infrastructure::formant_warper::{FormantMode, DEFAULT_FORMANT_STRENGTH};
use crate::audio::infrastructure::mcadams_anonymizer::{
    has_window_overlap, DEFAULT_FRAME_LENGTH, DEFAULT_HOP_LENGTH, DEFAULT_LPC_ORDER,
    DEFAULT_MCADAMS_COEFFICIENT,
};
use crate::audio::infrastructure::noise_reducer::{
    DEFAULT_NOISE_REDUCTION_STRENGTH, MAX_NOISE_REDUCTION_STRENGTH,
};
use crate::audio::infrastructure::pitch_time_modifier::DEFAULT_PITCH_RANGE;
use crate::audio::infrastructure::pre_emphasis_filter::DEFAULT_PRE_EMPHASIS;
use crate::audio::infrastructure::protection_noise_injector::DEFAULT_PROTECTION_NOISE_LEVEL;
use crate::shared::constants::{DEFAULT_SILENCE_FLOOR, DEFAULT_TARGET_SAMPLE_RATE};

const MAX_PITCH_SEMITONES: f64 = 12.0;
const TIME_STRETCH_LIMITS: (f64, f64) = (0.5, 2.0);
const MAX_FORMANT_STRENGTH: f64 = 0.5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} = {value} is out of range (expected {expected})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },
    #[error("{field} range [{min}, {max}] has min greater than max")]
    InvertedRange {
        field: &'static str,
        min: f64,
        max: f64,
    },
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One transform in the pipeline's stage list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    NoiseReduction,
    PreEmphasis,
    Normalize,
    PitchTime,
    FormantWarp,
    #[serde(rename = "mcadams")]
    McAdams,
    ProtectionNoise,
}

impl StageKind {
    /// Production order: condition, disguise, perturb, renormalize.
    pub fn default_order() -> Vec<StageKind> {
        vec![
            StageKind::NoiseReduction,
            StageKind::PreEmphasis,
            StageKind::Normalize,
            StageKind::PitchTime,
            StageKind::FormantWarp,
            StageKind::McAdams,
            StageKind::ProtectionNoise,
            StageKind::Normalize,
        ]
    }
}

/// Voice-disguise tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preset {
    /// Pitch shift and tilt only.
    Light,
    #[default]
    Standard,
    /// Lower McAdams coefficient, spectral warp, wider pitch range, mild time stretch.
    Strong,
}

impl std::str::FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Preset::Light),
            "standard" => Ok(Preset::Standard),
            "strong" => Ok(Preset::Strong),
            other => Err(format!(
                "preset must be 'light', 'standard' or 'strong', got '{other}'"
            )),
        }
    }
}

/// Parameters for one anonymization run. Built per invocation and never
/// mutated while the run is in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub target_sample_rate: u32,
    pub stages: Vec<StageKind>,
    pub noise_reduction_strength: f64,
    pub pre_emphasis: f64,
    /// Peak level at or below which the normalize after protection noise leaves a buffer untouched.
    pub silence_floor: f64,
    /// Closed interval of pitch shift in semitones.
    pub pitch_range: (f64, f64),
    /// Closed interval of output/input duration ratio; `None` disables stretching.
    pub time_stretch_range: Option<(f64, f64)>,
    pub formant_mode: FormantMode,
    pub formant_strength: f64,
    pub mcadams_coefficient: f64,
    pub lpc_order: usize,
    pub frame_length: usize,
    pub hop_length: usize,
    pub protection_noise_level: f64,
    /// Worker threads for McAdams frame processing; 1 runs on the caller's thread.
    pub workers: usize,
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: DEFAULT_TARGET_SAMPLE_RATE,
            stages: StageKind::default_order(),
            noise_reduction_strength: DEFAULT_NOISE_REDUCTION_STRENGTH,
            pre_emphasis: DEFAULT_PRE_EMPHASIS,
            silence_floor: DEFAULT_SILENCE_FLOOR,
            pitch_range: DEFAULT_PITCH_RANGE,
            time_stretch_range: None,
            formant_mode: FormantMode::Tilt,
            formant_strength: DEFAULT_FORMANT_STRENGTH,
            mcadams_coefficient: DEFAULT_MCADAMS_COEFFICIENT,
            lpc_order: DEFAULT_LPC_ORDER,
            frame_length: DEFAULT_FRAME_LENGTH,
            hop_length: DEFAULT_HOP_LENGTH,
            protection_noise_level: DEFAULT_PROTECTION_NOISE_LEVEL,
            workers: 1,
            seed: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_preset(preset: Preset) -> Self {
        let standard = Self::default();
        match preset {
            Preset::Light => Self {
                stages: standard
                    .stages
                    .iter()
                    .copied()
                    .filter(|s| *s != StageKind::McAdams)
                    .collect(),
                ..standard
            },
            Preset::Standard => standard,
            Preset::Strong => Self {
                mcadams_coefficient: 0.65,
                formant_mode: FormantMode::SpectralWarp,
                pitch_range: (-3.0, -1.5),
                time_stretch_range: Some((0.95, 1.05)),
                ..standard
            },
        }
    }

    /// Load a JSON document; absent fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        Self::default().overlay_json_file(path)
    }

    /// Replace the fields named in a JSON object, keeping every other field
    /// of `self`.
    pub fn overlay_json_file(self, path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let overrides: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&text)?;
        let mut merged = serde_json::to_value(self)?;
        if let serde_json::Value::Object(fields) = &mut merged {
            fields.extend(overrides);
        }
        Ok(serde_json::from_value(merged)?)
    }

    /// Clamp soft-limited values, then reject anything still invalid.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        let clamped = self
            .noise_reduction_strength
            .clamp(0.0, MAX_NOISE_REDUCTION_STRENGTH);
        if clamped != self.noise_reduction_strength {
            log::warn!(
                "noise_reduction_strength {} clamped to {clamped}",
                self.noise_reduction_strength
            );
            self.noise_reduction_strength = clamped;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_sample_rate == 0 {
            return Err(out_of_range("target_sample_rate", 0.0, "> 0"));
        }
        if !(0.0..1.0).contains(&self.pre_emphasis) {
            return Err(out_of_range("pre_emphasis", self.pre_emphasis, "[0, 1)"));
        }
        if self.silence_floor.is_nan() || self.silence_floor < 0.0 {
            return Err(out_of_range("silence_floor", self.silence_floor, ">= 0"));
        }
        check_range(
            "pitch_range",
            self.pitch_range,
            (-MAX_PITCH_SEMITONES, MAX_PITCH_SEMITONES),
            "[-12, 12] semitones",
        )?;
        if let Some(range) = self.time_stretch_range {
            check_range("time_stretch_range", range, TIME_STRETCH_LIMITS, "[0.5, 2.0]")?;
        }
        if !(0.0..=MAX_FORMANT_STRENGTH).contains(&self.formant_strength) {
            return Err(out_of_range(
                "formant_strength",
                self.formant_strength,
                "[0, 0.5]",
            ));
        }
        if !(self.mcadams_coefficient > 0.0 && self.mcadams_coefficient <= 1.0) {
            return Err(out_of_range(
                "mcadams_coefficient",
                self.mcadams_coefficient,
                "(0, 1]",
            ));
        }
        if self.lpc_order == 0 || self.lpc_order >= self.frame_length {
            return Err(out_of_range(
                "lpc_order",
                self.lpc_order as f64,
                "1 <= lpc_order < frame_length",
            ));
        }
        if !has_window_overlap(self.frame_length, self.hop_length) {
            return Err(out_of_range(
                "hop_length",
                self.hop_length as f64,
                "1 <= hop_length <= frame_length / 2",
            ));
        }
        if self.protection_noise_level.is_nan() || self.protection_noise_level < 0.0 {
            return Err(out_of_range(
                "protection_noise_level",
                self.protection_noise_level,
                ">= 0",
            ));
        }
        Ok(())
    }
}

fn out_of_range(field: &'static str, value: f64, expected: &'static str) -> ConfigError {
    ConfigError::OutOfRange {
        field,
        value,
        expected,
    }
}

fn check_range(
    field: &'static str,
    (min, max): (f64, f64),
    (lo, hi): (f64, f64),
    expected: &'static str,
) -> Result<(), ConfigError> {
    if min > max {
        return Err(ConfigError::InvertedRange { field, min, max });
    }
    for value in [min, max] {
        if !(lo..=hi).contains(&value) {
            return Err(out_of_range(field, value, expected));
        }
    }
    Ok(())
}
