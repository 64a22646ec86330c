use rustfft::num_complex::Complex;

use crate::audio::domain::audio_buffer::AudioBuffer;
use crate::audio::domain::audio_stage::AudioStage;
use crate::audio::domain::randomness::RandomnessContext;
use crate::audio::domain::stage_error::StageError;
use crate::audio::infrastructure::stft::{mirror_spectrum, Stft};

/// Default fraction of the estimated noise removed.
pub const DEFAULT_NOISE_REDUCTION_STRENGTH: f64 = 0.6;

/// Upper bound on the attenuation fraction; full suppression over-attenuates speech.
pub const MAX_NOISE_REDUCTION_STRENGTH: f64 = 0.9;

const WINDOW_SIZE: usize = 1024;
const HOP_SIZE: usize = 256;

/// Share of the quietest frames used as the noise pilot.
const NOISE_PILOT_FRACTION: f64 = 0.1;

/// Bins whose power is within this factor of the noise floor count as noise.
const NOISE_THRESHOLD: f64 = 2.0;

/// Stationary spectral-gating noise reducer.
///
/// The noise floor per frequency bin is the mean power of the quietest
/// frames. Each bin is then attenuated by `strength` times a soft mask that
/// is 1 where the bin sits at the noise floor and falls off as the bin rises
/// above it. Gains never exceed 1, so the reducer cannot amplify.
pub struct NoiseReducer {
    strength: f64,
    stft: Stft,
}

impl NoiseReducer {
    pub fn new(strength: f64) -> Self {
        let clamped = strength.clamp(0.0, MAX_NOISE_REDUCTION_STRENGTH);
        if clamped != strength {
            log::warn!("Noise reduction strength {strength} clamped to {clamped}");
        }
        Self {
            strength: clamped,
            stft: Stft::new(WINDOW_SIZE, HOP_SIZE),
        }
    }

    pub fn strength(&self) -> f64 {
        self.strength
    }

    pub fn reduce(&self, samples: &[f64]) -> Vec<f64> {
        let mut frames = self.stft.analyze(samples);
        let noise_power = self.estimate_noise_floor(&frames, samples.len());
        let num_bins = self.stft.num_bins();

        for frame in frames.iter_mut() {
            for k in 0..num_bins {
                let power = frame[k].norm_sqr();
                let mask = if power > 0.0 {
                    (noise_power[k] * NOISE_THRESHOLD / power).min(1.0)
                } else {
                    1.0
                };
                frame[k] *= 1.0 - self.strength * mask;
            }
            mirror_spectrum(frame);
        }

        self.stft.synthesize(frames, samples.len())
    }

    /// Mean per-bin power of the quietest interior frames.
    fn estimate_noise_floor(&self, frames: &[Vec<Complex<f64>>], len: usize) -> Vec<f64> {
        let num_bins = self.stft.num_bins();
        let mut candidates: Vec<usize> = self.stft.interior_frames(len).collect();
        if candidates.is_empty() {
            candidates = (0..frames.len()).collect();
        }

        let frame_energy = |idx: usize| -> f64 { frames[idx][..num_bins].iter().map(|c| c.norm_sqr()).sum() };
        candidates.sort_by(|&a, &b| frame_energy(a).total_cmp(&frame_energy(b)));

        let pilot_len = ((candidates.len() as f64 * NOISE_PILOT_FRACTION).ceil() as usize).max(1);
        let pilot = &candidates[..pilot_len.min(candidates.len())];

        let mut noise_power = vec![0.0f64; num_bins];
        for &idx in pilot {
            for (k, np) in noise_power.iter_mut().enumerate() {
                *np += frames[idx][k].norm_sqr();
            }
        }
        for np in noise_power.iter_mut() {
            *np /= pilot.len() as f64;
        }
        noise_power
    }
}

impl AudioStage for NoiseReducer {
    fn name(&self) -> &'static str {
        "noise_reduction"
    }

    fn parameters(&self) -> String {
        format!("strength={}", self.strength)
    }

    fn transform(
        &self,
        audio: &mut AudioBuffer,
        _rng: &mut RandomnessContext,
    ) -> Result<(), StageError> {
        if self.strength == 0.0 || audio.is_empty() {
            return Ok(());
        }
        let reduced = self.reduce(&audio.to_f64());
        StageError::check_finite(self.name(), &reduced)?;
        audio.set_from_f64(&reduced);
        Ok(())
    }
}
