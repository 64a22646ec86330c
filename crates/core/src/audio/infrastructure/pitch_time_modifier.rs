use std::f64::consts::PI;

use rustfft::num_complex::Complex;

use crate::audio::domain::audio_buffer::AudioBuffer;
use crate::audio::domain::audio_stage::AudioStage;
use crate::audio::domain::randomness::RandomnessContext;
use crate::audio::domain::stage_error::StageError;
use crate::audio::infrastructure::stft::{mirror_spectrum, wrap_phase, Stft};

/// Default pitch shift interval in semitones (lowered voice).
pub const DEFAULT_PITCH_RANGE: (f64, f64) = (-2.0, -1.0);

/// STFT analysis/synthesis window size.
const WINDOW_SIZE: usize = 2048;

/// Hop size between successive STFT frames.
const HOP_SIZE: usize = 512;

/// Randomized phase-vocoder pitch shift with optional time stretch.
///
/// Each run draws a pitch shift uniformly from `pitch_range` and, when a
/// `time_stretch_range` is configured, a duration ratio from it. The
/// stretch ratio is output duration over input duration, so the output has
/// `round(len * ratio)` samples.
pub struct PitchTimeModifier {
    pitch_range: (f64, f64),
    time_stretch_range: Option<(f64, f64)>,
    stft: Stft,
}

impl PitchTimeModifier {
    pub fn new(pitch_range: (f64, f64), time_stretch_range: Option<(f64, f64)>) -> Self {
        Self {
            pitch_range,
            time_stretch_range,
            stft: Stft::new(WINDOW_SIZE, HOP_SIZE),
        }
    }

    /// Shift pitch by `semitones` without changing duration.
    ///
    /// Bins are moved to `k * ratio` with their instantaneous frequency scaled
    /// to match; when several source bins land on one target the loudest wins.
    pub fn shift_pitch(&self, samples: &[f64], semitones: f64) -> Vec<f64> {
        let shift_ratio = 2.0_f64.powf(semitones / 12.0);
        let num_bins = self.stft.num_bins();
        let expected_phase_advance = self.expected_phase_advance();

        let mut frames = self.stft.analyze(samples);
        let mut prev_phase = vec![0.0f64; num_bins];
        let mut synth_phase = vec![0.0f64; num_bins];

        for frame in frames.iter_mut() {
            let magnitudes: Vec<f64> = frame[..num_bins].iter().map(|c| c.norm()).collect();
            let phases: Vec<f64> = frame[..num_bins].iter().map(|c| c.arg()).collect();

            let inst_freq: Vec<f64> = (0..num_bins)
                .map(|k| {
                    let deviation = phases[k] - prev_phase[k] - expected_phase_advance[k];
                    expected_phase_advance[k] + wrap_phase(deviation)
                })
                .collect();

            let mut new_magnitudes = vec![0.0f64; num_bins];
            let mut new_inst_freq = vec![0.0f64; num_bins];
            for k in 0..num_bins {
                let new_bin = (k as f64 * shift_ratio).round() as usize;
                if new_bin < num_bins && magnitudes[k] > new_magnitudes[new_bin] {
                    new_magnitudes[new_bin] = magnitudes[k];
                    new_inst_freq[new_bin] = inst_freq[k] * shift_ratio;
                }
            }

            for k in 0..num_bins {
                synth_phase[k] += new_inst_freq[k];
                frame[k] = Complex::from_polar(new_magnitudes[k], synth_phase[k]);
            }
            mirror_spectrum(frame);
            prev_phase.copy_from_slice(&phases);
        }

        let output = self.stft.synthesize(frames, samples.len());
        limit_to_input_peak(samples, output)
    }

    /// Change duration by `ratio` without changing pitch.
    ///
    /// Output frames sample the input frame sequence at evenly spaced
    /// fractional positions; magnitudes are interpolated and phases advance
    /// by each bin's measured phase increment.
    pub fn stretch_time(&self, samples: &[f64], ratio: f64) -> Vec<f64> {
        let output_len = (samples.len() as f64 * ratio).round() as usize;
        let num_bins = self.stft.num_bins();
        let expected_phase_advance = self.expected_phase_advance();

        let frames = self.stft.analyze(samples);
        let in_frames = frames.len();
        let out_frames = self.stft.num_frames(output_len);
        let step = if out_frames > 1 {
            (in_frames - 1) as f64 / (out_frames - 1) as f64
        } else {
            0.0
        };

        let mut phase_acc: Vec<f64> = frames[0][..num_bins].iter().map(|c| c.arg()).collect();
        let mut stretched = Vec::with_capacity(out_frames);

        for j in 0..out_frames {
            let pos = j as f64 * step;
            let t = (pos.floor() as usize).min(in_frames - 1);
            let t_next = (t + 1).min(in_frames - 1);
            let frac = pos - t as f64;

            let mut frame = vec![Complex::new(0.0, 0.0); self.stft.window_size()];
            for k in 0..num_bins {
                let magnitude = (1.0 - frac) * frames[t][k].norm() + frac * frames[t_next][k].norm();
                frame[k] = Complex::from_polar(magnitude, phase_acc[k]);

                let deviation =
                    frames[t_next][k].arg() - frames[t][k].arg() - expected_phase_advance[k];
                phase_acc[k] += expected_phase_advance[k] + wrap_phase(deviation);
            }
            mirror_spectrum(&mut frame);
            stretched.push(frame);
        }

        self.stft.synthesize(stretched, output_len)
    }

    fn expected_phase_advance(&self) -> Vec<f64> {
        let window = self.stft.window_size() as f64;
        let hop = self.stft.hop_size() as f64;
        (0..self.stft.num_bins())
            .map(|k| 2.0 * PI * k as f64 * hop / window)
            .collect()
    }
}

/// Scale `output` down if its peak exceeds the input's.
fn limit_to_input_peak(input: &[f64], mut output: Vec<f64>) -> Vec<f64> {
    let input_peak = input.iter().map(|s| s.abs()).fold(0.0f64, f64::max);
    let output_peak = output.iter().map(|s| s.abs()).fold(0.0f64, f64::max);
    if output_peak > 1e-10 && output_peak > input_peak {
        let gain = input_peak / output_peak;
        for s in output.iter_mut() {
            *s *= gain;
        }
    }
    output
}

impl AudioStage for PitchTimeModifier {
    fn name(&self) -> &'static str {
        "pitch_time"
    }

    fn parameters(&self) -> String {
        format!(
            "pitch_range={:?}, time_stretch_range={:?}",
            self.pitch_range, self.time_stretch_range
        )
    }

    fn transform(
        &self,
        audio: &mut AudioBuffer,
        rng: &mut RandomnessContext,
    ) -> Result<(), StageError> {
        if audio.is_empty() {
            return Ok(());
        }
        let semitones = rng.uniform(self.pitch_range.0, self.pitch_range.1);
        log::info!("Pitch shift: {semitones:.3} semitones");
        let mut samples = self.shift_pitch(&audio.to_f64(), semitones);

        if let Some((min, max)) = self.time_stretch_range {
            let ratio = rng.uniform(min, max);
            log::info!("Time stretch: ratio {ratio:.3}");
            samples = self.stretch_time(&samples, ratio);
        }

        StageError::check_finite(self.name(), &samples)?;
        audio.set_from_f64(&samples);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, duration: f64, sample_rate: u32) -> Vec<f64> {
        let len = (duration * sample_rate as f64) as usize;
        (0..len)
            .map(|i| {
                let t = i as f64 / sample_rate as f64;
                (2.0 * PI * freq * t).sin() * 0.5
            })
            .collect()
    }

    fn mse(a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>() / a.len() as f64
    }

    /// Frequency of the strongest FFT bin over the middle of the signal.
    fn dominant_frequency(samples: &[f64], sample_rate: f64) -> f64 {
        let size = 8192;
        let start = (samples.len() - size) / 2;
        let mut buf: Vec<Complex<f64>> = samples[start..start + size]
            .iter()
            .map(|&s| Complex::new(s, 0.0))
            .collect();
        rustfft::FftPlanner::<f64>::new()
            .plan_fft_forward(size)
            .process(&mut buf);
        let (peak_bin, _) = buf[..size / 2]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.norm().total_cmp(&b.1.norm()))
            .unwrap();
        peak_bin as f64 * sample_rate / size as f64
    }

    #[test]
    fn test_zero_semitones_near_identity() {
        let input = sine(440.0, 1.0, 16000);
        let modifier = PitchTimeModifier::new((0.0, 0.0), None);
        let output = modifier.shift_pitch(&input, 0.0);
        assert!(mse(&input, &output) < 1e-8, "MSE={}", mse(&input, &output));
    }

    #[test]
    fn test_unit_stretch_near_identity() {
        let input = sine(440.0, 1.0, 16000);
        let modifier = PitchTimeModifier::new((0.0, 0.0), Some((1.0, 1.0)));
        let output = modifier.stretch_time(&input, 1.0);
        assert_eq!(output.len(), input.len());
        assert!(mse(&input, &output) < 1e-8, "MSE={}", mse(&input, &output));
    }

    #[test]
    fn test_transform_with_neutral_ranges_near_identity() {
        let input = sine(300.0, 1.0, 16000);
        let mut audio = AudioBuffer::new(input.iter().map(|&s| s as f32).collect(), 16000);
        let mut rng = RandomnessContext::from_seed(3);
        PitchTimeModifier::new((0.0, 0.0), Some((1.0, 1.0)))
            .transform(&mut audio, &mut rng)
            .unwrap();
        assert!(mse(&input, &audio.to_f64()) < 1e-6);
    }

    #[test]
    fn test_pitch_shift_lowers_frequency() {
        let input = sine(440.0, 1.0, 16000);
        let modifier = PitchTimeModifier::new(DEFAULT_PITCH_RANGE, None);
        let output = modifier.shift_pitch(&input, -12.0);
        let freq = dominant_frequency(&output, 16000.0);
        assert!((freq - 220.0).abs() < 15.0, "dominant frequency {freq}");
    }

    #[test]
    fn test_pitch_shift_preserves_length_and_peak() {
        let input = sine(440.0, 1.0, 16000);
        let modifier = PitchTimeModifier::new(DEFAULT_PITCH_RANGE, None);
        let output = modifier.shift_pitch(&input, -1.5);
        assert_eq!(output.len(), input.len());
        let peak = output.iter().map(|s| s.abs()).fold(0.0f64, f64::max);
        assert!(peak <= 0.5 + 1e-9);
    }

    #[test]
    fn test_time_stretch_changes_length_not_pitch() {
        let input = sine(440.0, 1.0, 16000);
        let modifier = PitchTimeModifier::new((0.0, 0.0), Some((1.1, 1.1)));
        let output = modifier.stretch_time(&input, 1.1);
        assert_eq!(output.len(), 17600);
        let freq = dominant_frequency(&output, 16000.0);
        assert!((freq - 440.0).abs() < 10.0, "dominant frequency {freq}");
    }

    #[test]
    fn test_transform_draws_from_rng() {
        let input: Vec<f32> = sine(440.0, 1.0, 16000).iter().map(|&s| s as f32).collect();
        let modifier = PitchTimeModifier::new(DEFAULT_PITCH_RANGE, Some((0.9, 1.1)));

        let mut a = AudioBuffer::new(input.clone(), 16000);
        let mut b = AudioBuffer::new(input.clone(), 16000);
        modifier
            .transform(&mut a, &mut RandomnessContext::from_seed(10))
            .unwrap();
        modifier
            .transform(&mut b, &mut RandomnessContext::from_seed(10))
            .unwrap();
        assert_eq!(a, b);
        assert!((14400..=17600).contains(&a.len()));
    }
}
