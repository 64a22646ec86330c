use rustfft::num_complex::Complex;

use crate::audio::domain::audio_buffer::AudioBuffer;
use crate::audio::domain::audio_stage::AudioStage;
use crate::audio::domain::frame_executor::FrameExecutor;
use crate::audio::domain::lpc::{polynomial_from_roots, LpcFrame};
use crate::audio::domain::randomness::RandomnessContext;
use crate::audio::domain::stage_error::StageError;
use crate::audio::infrastructure::sequential_frame_executor::SequentialFrameExecutor;
use crate::audio::infrastructure::stft::hann_window;

pub const DEFAULT_MCADAMS_COEFFICIENT: f64 = 0.8;
pub const DEFAULT_LPC_ORDER: usize = 20;
pub const DEFAULT_FRAME_LENGTH: usize = 512;
pub const DEFAULT_HOP_LENGTH: usize = 256;

/// Rotated poles at or beyond the unit circle are pulled back to this radius.
pub const MAX_POLE_MAGNITUDE: f64 = 0.999;

/// Poles with |imag| below this are treated as real.
const REAL_POLE_TOLERANCE: f64 = 1e-9;

const STAGE_NAME: &str = "mcadams";

/// Hann frames overlap-add without gaps only when consecutive frames
/// overlap by at least half a frame.
pub fn has_window_overlap(frame_length: usize, hop_length: usize) -> bool {
    hop_length >= 1 && hop_length <= frame_length / 2
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct McAdamsSettings {
    pub coefficient: f64,
    pub lpc_order: usize,
    pub frame_length: usize,
    pub hop_length: usize,
}

impl Default for McAdamsSettings {
    fn default() -> Self {
        Self {
            coefficient: DEFAULT_MCADAMS_COEFFICIENT,
            lpc_order: DEFAULT_LPC_ORDER,
            frame_length: DEFAULT_FRAME_LENGTH,
            hop_length: DEFAULT_HOP_LENGTH,
        }
    }
}

/// LPC pole-rotation anonymizer.
///
/// Each Hann-windowed frame is modelled by an all-pole filter; the angle of
/// every complex pole is multiplied by the McAdams coefficient (conjugate
/// partners rotated together, real poles left in place), magnitudes are kept,
/// and the frame's residual is re-filtered through the rotated model. Frames
/// are overlap-added and normalized by the accumulated window.
///
/// The signal is padded with one frame of silence on each side; a trailing
/// partial frame is therefore analyzed zero-padded and the padding trimmed
/// from the output, which keeps the input length.
pub struct McAdamsAnonymizer {
    settings: McAdamsSettings,
    window: Vec<f64>,
    executor: Box<dyn FrameExecutor>,
}

impl McAdamsAnonymizer {
    pub fn new(settings: McAdamsSettings, executor: Box<dyn FrameExecutor>) -> Self {
        Self {
            window: hann_window(settings.frame_length),
            settings,
            executor,
        }
    }

    pub fn sequential(settings: McAdamsSettings) -> Self {
        Self::new(settings, Box::new(SequentialFrameExecutor))
    }

    fn rotates(&self) -> bool {
        (self.settings.coefficient - 1.0).abs() > f64::EPSILON
    }

    pub fn anonymize(&self, samples: &[f64]) -> Result<Vec<f64>, StageError> {
        let n = samples.len();
        let frame_length = self.settings.frame_length;
        let hop = self.settings.hop_length;
        if !has_window_overlap(frame_length, hop) {
            return Err(StageError::InsufficientOverlap {
                stage: STAGE_NAME,
                frame_length,
                hop,
            });
        }

        let num_frames = (n + frame_length).div_ceil(hop) + 1;
        let padded_len = (num_frames - 1) * hop + frame_length;
        let mut padded = vec![0.0f64; padded_len];
        padded[frame_length..frame_length + n].copy_from_slice(samples);

        let frames = self
            .executor
            .map_frames(num_frames, &|idx| self.process_frame(&padded, idx))?;

        // Single accumulation pass, in frame order.
        let mut output = vec![0.0f64; padded_len];
        let mut window_sum = vec![0.0f64; padded_len];
        for (idx, frame) in frames.iter().enumerate() {
            let start = idx * hop;
            for (i, &v) in frame.iter().enumerate() {
                output[start + i] += v;
                window_sum[start + i] += self.window[i];
            }
        }

        let max_window_sum = window_sum.iter().cloned().fold(0.0f64, f64::max);
        let ws_threshold = max_window_sum * 0.1;
        let mut trimmed: Vec<f64> = (0..n)
            .map(|i| {
                let ws = window_sum[frame_length + i];
                if ws >= ws_threshold && ws > 0.0 {
                    output[frame_length + i] / ws
                } else {
                    0.0
                }
            })
            .collect();

        match_energy(samples, &mut trimmed);
        StageError::check_finite(STAGE_NAME, &trimmed)?;
        Ok(trimmed)
    }

    /// Analyze, rotate and resynthesize one frame. Returns the windowed
    /// contribution for overlap-add.
    fn process_frame(&self, padded: &[f64], idx: usize) -> Result<Vec<f64>, StageError> {
        let start = idx * self.settings.hop_length;
        let windowed: Vec<f64> = self
            .window
            .iter()
            .enumerate()
            .map(|(i, w)| padded[start + i] * w)
            .collect();

        let frame = match LpcFrame::analyze(&windowed, self.settings.lpc_order) {
            Some(frame) => frame,
            None => return Ok(windowed),
        };

        let coefficients = if self.rotates() {
            self.rotated_coefficients(&frame, idx)
        } else {
            frame.coefficients().to_vec()
        };

        let mut resynthesized = frame.resynthesize(&coefficients);
        if resynthesized.iter().any(|s| !s.is_finite()) {
            return Err(StageError::DegenerateFrame {
                stage: STAGE_NAME,
                frame: idx,
                reason: "resynthesis diverged".to_string(),
            });
        }
        match_energy(frame.samples(), &mut resynthesized);
        Ok(resynthesized)
    }

    fn rotated_coefficients(&self, frame: &LpcFrame, idx: usize) -> Vec<f64> {
        let poles = frame.poles();
        let mut rotated = match rotate_poles(&poles, self.settings.coefficient) {
            Some(rotated) => rotated,
            None => {
                log::debug!("Frame {idx}: unpaired complex poles, keeping original envelope");
                return frame.coefficients().to_vec();
            }
        };
        let clamped = clamp_poles(&mut rotated, MAX_POLE_MAGNITUDE);
        if clamped > 0 {
            log::debug!("Frame {idx}: clamped {clamped} pole(s) inside the unit circle");
        }
        polynomial_from_roots(&rotated).iter().map(|c| c.re).collect()
    }
}

/// Multiply the angle of every complex pole by `coefficient`.
///
/// Poles in the upper half-plane are rotated and emitted together with their
/// conjugate, so the rebuilt polynomial has real coefficients. Real poles are
/// kept as they are. Returns `None` if the upper and lower half-planes hold a
/// different number of poles (no consistent pairing).
pub fn rotate_poles(poles: &[Complex<f64>], coefficient: f64) -> Option<Vec<Complex<f64>>> {
    let mut rotated = Vec::with_capacity(poles.len());
    let mut upper = 0usize;
    let mut lower = 0usize;
    for &pole in poles {
        if pole.im > REAL_POLE_TOLERANCE {
            upper += 1;
            let moved = Complex::from_polar(pole.norm(), pole.arg() * coefficient);
            rotated.push(moved);
            rotated.push(moved.conj());
        } else if pole.im < -REAL_POLE_TOLERANCE {
            lower += 1;
        } else {
            rotated.push(Complex::new(pole.re, 0.0));
        }
    }
    (upper == lower).then_some(rotated)
}

/// Pull every pole with magnitude >= 1 back to `max_magnitude`, keeping its
/// angle. Returns the number of poles changed.
pub fn clamp_poles(poles: &mut [Complex<f64>], max_magnitude: f64) -> usize {
    let mut clamped = 0;
    for pole in poles.iter_mut() {
        if pole.norm() >= 1.0 {
            *pole = if pole.im == 0.0 {
                Complex::new(max_magnitude.copysign(pole.re), 0.0)
            } else {
                Complex::from_polar(max_magnitude, pole.arg())
            };
            clamped += 1;
        }
    }
    clamped
}

/// Scale `output` to carry the same energy as `reference`.
fn match_energy(reference: &[f64], output: &mut [f64]) {
    let target: f64 = reference.iter().map(|s| s * s).sum();
    let actual: f64 = output.iter().map(|s| s * s).sum();
    if actual > 1e-20 && target > 0.0 {
        let gain = (target / actual).sqrt();
        for s in output.iter_mut() {
            *s *= gain;
        }
    }
}

impl AudioStage for McAdamsAnonymizer {
    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    fn parameters(&self) -> String {
        format!(
            "coefficient={}, lpc_order={}, frame_length={}, hop_length={}",
            self.settings.coefficient,
            self.settings.lpc_order,
            self.settings.frame_length,
            self.settings.hop_length
        )
    }

    fn transform(
        &self,
        audio: &mut AudioBuffer,
        _rng: &mut RandomnessContext,
    ) -> Result<(), StageError> {
        if audio.is_empty() {
            return Ok(());
        }
        let anonymized = self.anonymize(&audio.to_f64())?;
        audio.set_from_f64(&anonymized);
        Ok(())
    }
}
