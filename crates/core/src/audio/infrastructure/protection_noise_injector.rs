use crate::audio::domain::audio_buffer::AudioBuffer;
use crate::audio::domain::audio_stage::AudioStage;
use crate::audio::domain::randomness::RandomnessContext;
use crate::audio::domain::stage_error::StageError;

/// Default protection noise amplitude (fraction of full scale).
pub const DEFAULT_PROTECTION_NOISE_LEVEL: f64 = 0.00015;

/// Adds low-level zero-mean Gaussian noise to perturb speaker-embedding models.
///
/// `level` is the maximum added amplitude: draws use a standard deviation of
/// `level / 3` and are truncated at `±level`.
pub struct ProtectionNoiseInjector {
    level: f64,
}

impl ProtectionNoiseInjector {
    pub fn new(level: f64) -> Self {
        Self {
            level: level.max(0.0),
        }
    }

    pub fn level(&self) -> f64 {
        self.level
    }
}

impl AudioStage for ProtectionNoiseInjector {
    fn name(&self) -> &'static str {
        "protection_noise"
    }

    fn parameters(&self) -> String {
        format!("level={}", self.level)
    }

    fn transform(
        &self,
        audio: &mut AudioBuffer,
        rng: &mut RandomnessContext,
    ) -> Result<(), StageError> {
        if self.level == 0.0 {
            return Ok(());
        }
        let std_dev = self.level / 3.0;
        for s in audio.samples_mut() {
            let noise = rng.gaussian(std_dev).clamp(-self.level, self.level);
            *s += noise as f32;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_bounded_by_level() {
        let mut audio = AudioBuffer::new(vec![0.0; 16000], 16000);
        let mut rng = RandomnessContext::from_seed(5);
        ProtectionNoiseInjector::new(0.0005)
            .transform(&mut audio, &mut rng)
            .unwrap();
        assert!(audio.peak() <= 0.0005 + 1e-9);
        assert!(audio.peak() > 0.0);
    }

    #[test]
    fn test_noise_is_zero_mean() {
        let mut audio = AudioBuffer::new(vec![0.0; 32000], 16000);
        let mut rng = RandomnessContext::from_seed(9);
        ProtectionNoiseInjector::new(0.001)
            .transform(&mut audio, &mut rng)
            .unwrap();
        let mean: f64 =
            audio.samples().iter().map(|&s| s as f64).sum::<f64>() / audio.len() as f64;
        assert!(mean.abs() < 1e-5, "mean={mean}");
    }

    #[test]
    fn test_same_seed_same_noise() {
        let injector = ProtectionNoiseInjector::new(DEFAULT_PROTECTION_NOISE_LEVEL);
        let mut a = AudioBuffer::new(vec![0.0; 512], 16000);
        let mut b = a.clone();
        injector
            .transform(&mut a, &mut RandomnessContext::from_seed(42))
            .unwrap();
        injector
            .transform(&mut b, &mut RandomnessContext::from_seed(42))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_level_is_noop() {
        let mut audio = AudioBuffer::new(vec![0.25; 64], 16000);
        let mut rng = RandomnessContext::from_seed(1);
        ProtectionNoiseInjector::new(0.0)
            .transform(&mut audio, &mut rng)
            .unwrap();
        assert!(audio.samples().iter().all(|&s| s == 0.25));
    }
}
