use std::f64::consts::PI;
use std::ops::Range;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Short-time Fourier transform with Hann analysis/synthesis windows.
///
/// The signal is padded with one window of silence on each side so every
/// real sample is covered by the full set of overlapping frames; synthesis
/// divides by the accumulated squared window, so an unmodified
/// analyze -> synthesize round trip reproduces the input.
pub struct Stft {
    window_size: usize,
    hop_size: usize,
    window: Vec<f64>,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl Stft {
    pub fn new(window_size: usize, hop_size: usize) -> Self {
        let window = hann_window(window_size);
        let mut planner = FftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(window_size);
        let inverse = planner.plan_fft_inverse(window_size);
        Self {
            window_size,
            hop_size: hop_size.max(1),
            window,
            forward,
            inverse,
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Number of non-redundant bins (DC through Nyquist).
    pub fn num_bins(&self) -> usize {
        self.window_size / 2 + 1
    }

    /// Frames needed to cover `len` samples plus the padding.
    pub fn num_frames(&self, len: usize) -> usize {
        (len + self.window_size).div_ceil(self.hop_size) + 1
    }

    /// Indices of frames lying entirely inside the (unpadded) signal.
    pub fn interior_frames(&self, len: usize) -> Range<usize> {
        let first = self.window_size.div_ceil(self.hop_size);
        if len < self.window_size {
            return first..first;
        }
        let last = len / self.hop_size + 1;
        first..last.max(first)
    }

    /// Full-length spectra (all `window_size` bins) of each padded frame.
    pub fn analyze(&self, samples: &[f64]) -> Vec<Vec<Complex<f64>>> {
        let num_frames = self.num_frames(samples.len());
        let padded_len = (num_frames - 1) * self.hop_size + self.window_size;
        let mut padded = vec![0.0f64; padded_len];
        padded[self.window_size..self.window_size + samples.len()].copy_from_slice(samples);

        (0..num_frames)
            .map(|frame_idx| {
                let start = frame_idx * self.hop_size;
                let mut buf: Vec<Complex<f64>> = (0..self.window_size)
                    .map(|i| Complex::new(padded[start + i] * self.window[i], 0.0))
                    .collect();
                self.forward.process(&mut buf);
                buf
            })
            .collect()
    }

    /// Overlap-add the frames back into `output_len` samples.
    pub fn synthesize(&self, frames: Vec<Vec<Complex<f64>>>, output_len: usize) -> Vec<f64> {
        if frames.is_empty() {
            return vec![0.0; output_len];
        }
        let total = (frames.len() - 1) * self.hop_size + self.window_size;
        let mut output = vec![0.0f64; total];
        let mut window_sum = vec![0.0f64; total];

        // rustfft does not normalize the inverse transform
        let norm = 1.0 / self.window_size as f64;

        for (frame_idx, mut buf) in frames.into_iter().enumerate() {
            self.inverse.process(&mut buf);
            let start = frame_idx * self.hop_size;
            for i in 0..self.window_size {
                output[start + i] += buf[i].re * norm * self.window[i];
                window_sum[start + i] += self.window[i] * self.window[i];
            }
        }

        // Samples touched only by window tails are unreliable; zero them.
        let max_window_sum = window_sum.iter().cloned().fold(0.0f64, f64::max);
        let ws_threshold = max_window_sum * 0.1;
        for (sample, &ws) in output.iter_mut().zip(window_sum.iter()) {
            if ws >= ws_threshold && ws > 0.0 {
                *sample /= ws;
            } else {
                *sample = 0.0;
            }
        }

        (0..output_len)
            .map(|i| output.get(self.window_size + i).copied().unwrap_or(0.0))
            .collect()
    }
}

/// Periodic Hann window.
pub fn hann_window(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / size as f64).cos()))
        .collect()
}

/// Rebuild the negative-frequency half from the positive one so the
/// inverse transform is real.
pub fn mirror_spectrum(spectrum: &mut [Complex<f64>]) {
    let size = spectrum.len();
    let half = size / 2 + 1;
    for k in 1..half - 1 {
        spectrum[size - k] = spectrum[k].conj();
    }
}

/// Wrap a phase value to [-pi, pi].
pub fn wrap_phase(phase: f64) -> f64 {
    phase - (2.0 * PI) * (phase / (2.0 * PI)).round()
}
