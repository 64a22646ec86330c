use crate::audio::domain::audio_buffer::AudioBuffer;
use crate::audio::domain::audio_stage::AudioStage;
use crate::audio::domain::randomness::RandomnessContext;
use crate::audio::domain::stage_error::StageError;

/// Default first-order pre-emphasis coefficient.
pub const DEFAULT_PRE_EMPHASIS: f64 = 0.97;

/// First-order high-frequency boost: `y[n] = x[n] - a * x[n-1]`, `y[0] = x[0]`.
pub struct PreEmphasisFilter {
    coefficient: f64,
}

impl PreEmphasisFilter {
    pub fn new(coefficient: f64) -> Self {
        Self { coefficient }
    }

    pub fn apply(&self, samples: &mut [f32]) {
        let a = self.coefficient as f32;
        // Walk backwards so x[n-1] is still the unfiltered input.
        for n in (1..samples.len()).rev() {
            samples[n] -= a * samples[n - 1];
        }
    }
}

impl AudioStage for PreEmphasisFilter {
    fn name(&self) -> &'static str {
        "pre_emphasis"
    }

    fn parameters(&self) -> String {
        format!("coefficient={}", self.coefficient)
    }

    fn transform(
        &self,
        audio: &mut AudioBuffer,
        _rng: &mut RandomnessContext,
    ) -> Result<(), StageError> {
        self.apply(audio.samples_mut());
        Ok(())
    }
}
