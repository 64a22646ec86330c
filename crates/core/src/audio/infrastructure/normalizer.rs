use crate::audio::domain::audio_buffer::AudioBuffer;
use crate::audio::domain::audio_stage::AudioStage;
use crate::audio::domain::randomness::RandomnessContext;
use crate::audio::domain::stage_error::StageError;

/// Peak normalizer: scales the buffer so its largest magnitude is 1.0.
///
/// Buffers whose peak is at or below `silence_floor` are left unchanged, so
/// silence (and near-silence such as bare protection noise) is never
/// amplified. A floor of 0.0 gives plain peak normalization.
pub struct Normalizer {
    silence_floor: f64,
}

impl Normalizer {
    pub fn new(silence_floor: f64) -> Self {
        Self {
            silence_floor: silence_floor.max(0.0),
        }
    }

    pub fn normalize(&self, samples: &mut [f32]) {
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
        if peak == 0.0 || (peak as f64) <= self.silence_floor {
            return;
        }
        for s in samples.iter_mut() {
            *s /= peak;
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl AudioStage for Normalizer {
    fn name(&self) -> &'static str {
        "normalize"
    }

    fn parameters(&self) -> String {
        format!("silence_floor={}", self.silence_floor)
    }

    fn transform(
        &self,
        audio: &mut AudioBuffer,
        _rng: &mut RandomnessContext,
    ) -> Result<(), StageError> {
        self.normalize(audio.samples_mut());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    fn peak(samples: &[f32]) -> f32 {
        samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
    }

    #[rstest]
    #[case::quiet(vec![0.01, -0.02, 0.005])]
    #[case::loud(vec![3.0, -7.5, 2.0])]
    #[case::negative_peak(vec![-0.4, 0.1, 0.2])]
    #[case::single_sample(vec![1e-6])]
    fn test_peak_becomes_one(#[case] mut samples: Vec<f32>) {
        Normalizer::new(0.0).normalize(&mut samples);
        assert_abs_diff_eq!(peak(&samples), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_zero_buffer_unchanged() {
        let mut samples = vec![0.0f32; 256];
        Normalizer::new(0.0).normalize(&mut samples);
        assert!(samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_idempotent() {
        let mut once = vec![0.3f32, -0.6, 0.1, 0.45];
        let n = Normalizer::new(0.0);
        n.normalize(&mut once);
        let mut twice = once.clone();
        n.normalize(&mut twice);
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_below_silence_floor_unchanged() {
        let mut samples = vec![0.0001f32, -0.0002, 0.00015];
        let original = samples.clone();
        Normalizer::new(1e-3).normalize(&mut samples);
        assert_eq!(samples, original);
    }

    #[test]
    fn test_stage_transform() {
        let mut audio = AudioBuffer::new(vec![0.25, -0.5], 16000);
        let mut rng = RandomnessContext::from_seed(0);
        Normalizer::default().transform(&mut audio, &mut rng).unwrap();
        assert_eq!(audio.samples(), &[0.5, -1.0]);
    }
}
