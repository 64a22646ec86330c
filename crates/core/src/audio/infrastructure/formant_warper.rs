use serde::{Deserialize, Serialize};

use crate::audio::domain::audio_buffer::AudioBuffer;
use crate::audio::domain::audio_stage::AudioStage;
use crate::audio::domain::randomness::RandomnessContext;
use crate::audio::domain::stage_error::StageError;
use crate::audio::infrastructure::stft::{mirror_spectrum, Stft};

/// Default warp strength (tilt pole / ramp half-width).
pub const DEFAULT_FORMANT_STRENGTH: f64 = 0.08;

/// STFT frame size for spectral warping.
const WINDOW_SIZE: usize = 2048;

/// Hop size between successive analysis frames.
const HOP_SIZE: usize = 512;

/// How the vocal-tract warp is realised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FormantMode {
    /// Single-pole IIR `y[n] = (1-a) x[n] + a y[n-1]` with `a = strength`.
    #[default]
    Tilt,
    /// Per-bin magnitude ramp from `1 - strength` at DC to `1 + strength`
    /// at Nyquist; phase untouched.
    SpectralWarp,
}

impl std::fmt::Display for FormantMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormantMode::Tilt => write!(f, "tilt"),
            FormantMode::SpectralWarp => write!(f, "spectral_warp"),
        }
    }
}

impl std::str::FromStr for FormantMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tilt" => Ok(FormantMode::Tilt),
            "spectral" | "spectral_warp" => Ok(FormantMode::SpectralWarp),
            other => Err(format!(
                "formant mode must be 'tilt' or 'spectral', got '{other}'"
            )),
        }
    }
}

/// Alters perceived vocal-tract resonances without touching pitch.
pub struct FormantWarper {
    mode: FormantMode,
    strength: f64,
    stft: Option<Stft>,
}

impl FormantWarper {
    pub fn new(mode: FormantMode, strength: f64) -> Self {
        let stft = match mode {
            FormantMode::SpectralWarp => Some(Stft::new(WINDOW_SIZE, HOP_SIZE)),
            FormantMode::Tilt => None,
        };
        Self {
            mode,
            strength,
            stft,
        }
    }

    fn tilt(&self, samples: &[f64]) -> Vec<f64> {
        let alpha = self.strength;
        let mut prev = 0.0;
        samples
            .iter()
            .map(|&x| {
                prev = (1.0 - alpha) * x + alpha * prev;
                prev
            })
            .collect()
    }

    fn spectral_warp(&self, stft: &Stft, samples: &[f64]) -> Vec<f64> {
        let num_bins = stft.num_bins();
        let low = 1.0 - self.strength;
        let high = 1.0 + self.strength;
        let curve: Vec<f64> = (0..num_bins)
            .map(|k| low + (high - low) * k as f64 / (num_bins - 1) as f64)
            .collect();

        let mut frames = stft.analyze(samples);
        for frame in frames.iter_mut() {
            for (bin, gain) in frame.iter_mut().zip(curve.iter()) {
                *bin *= *gain;
            }
            mirror_spectrum(frame);
        }
        stft.synthesize(frames, samples.len())
    }
}

impl AudioStage for FormantWarper {
    fn name(&self) -> &'static str {
        "formant_warp"
    }

    fn parameters(&self) -> String {
        format!("mode={}, strength={}", self.mode, self.strength)
    }

    fn transform(
        &self,
        audio: &mut AudioBuffer,
        _rng: &mut RandomnessContext,
    ) -> Result<(), StageError> {
        if self.strength == 0.0 || audio.is_empty() {
            return Ok(());
        }
        let samples = audio.to_f64();
        let warped = match &self.stft {
            Some(stft) => self.spectral_warp(stft, &samples),
            None => self.tilt(&samples),
        };
        StageError::check_finite(self.name(), &warped)?;
        audio.set_from_f64(&warped);
        Ok(())
    }
}
