/// A mono recording: PCM samples normalized to [-1.0, 1.0] at a fixed sample rate.
///
/// The orchestrator owns one buffer per run and hands it to each stage in turn;
/// stages mutate it in place (or replace its samples when the length changes).
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Samples widened to f64 for numerically sensitive processing.
    pub fn to_f64(&self) -> Vec<f64> {
        self.samples.iter().map(|&s| s as f64).collect()
    }

    /// Overwrite the samples from an f64 working buffer.
    pub fn set_from_f64(&mut self, samples: &[f64]) {
        self.samples = samples.iter().map(|&s| s as f32).collect();
    }

    pub fn peak(&self) -> f32 {
        self.samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
    }

    pub fn rms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        (self.energy() / self.samples.len() as f64).sqrt()
    }

    /// Sum of squared samples.
    pub fn energy(&self) -> f64 {
        self.samples.iter().map(|&s| (s as f64).powi(2)).sum()
    }

    /// Index of the first NaN or infinite sample, if any.
    pub fn first_non_finite(&self) -> Option<usize> {
        self.samples.iter().position(|s| !s.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_creates_buffer_with_correct_fields() {
        let samples = vec![0.0f32; 16000];
        let buf = AudioBuffer::new(samples.clone(), 16000);
        assert_eq!(buf.samples(), &samples[..]);
        assert_eq!(buf.sample_rate(), 16000);
        assert_eq!(buf.len(), 16000);
    }

    #[test]
    fn test_duration() {
        let buf = AudioBuffer::new(vec![0.0; 48000], 16000);
        assert_eq!(buf.duration(), 3.0);
    }

    #[test]
    fn test_duration_zero_rate() {
        let buf = AudioBuffer::new(vec![0.0; 10], 0);
        assert_eq!(buf.duration(), 0.0);
    }

    #[test]
    fn test_peak_and_energy() {
        let buf = AudioBuffer::new(vec![0.5, -0.75, 0.25], 16000);
        assert_relative_eq!(buf.peak(), 0.75);
        assert_relative_eq!(buf.energy(), 0.25 + 0.5625 + 0.0625);
    }

    #[test]
    fn test_first_non_finite() {
        let buf = AudioBuffer::new(vec![0.0, 0.1, f32::NAN, f32::INFINITY], 16000);
        assert_eq!(buf.first_non_finite(), Some(2));
        let clean = AudioBuffer::new(vec![0.0, 0.1], 16000);
        assert_eq!(clean.first_non_finite(), None);
    }

    #[test]
    fn test_f64_round_trip() {
        let mut buf = AudioBuffer::new(vec![0.0; 4], 16000);
        buf.set_from_f64(&[0.5, -0.5, 0.25, 0.0]);
        assert_eq!(buf.to_f64(), vec![0.5, -0.5, 0.25, 0.0]);
    }
}
