use super::audio_buffer::AudioBuffer;
use super::randomness::RandomnessContext;
use super::stage_error::StageError;

/// Domain interface for one step of the anonymization chain.
///
/// A stage is built from the run's configuration, receives the buffer, and
/// must not keep any reference to it after returning. All random draws go
/// through the run-owned `RandomnessContext`.
pub trait AudioStage: Send + Sync {
    /// Short identifier used in logs and timing reports.
    fn name(&self) -> &'static str;

    /// Human-readable parameter summary for failure logs.
    fn parameters(&self) -> String {
        String::new()
    }

    fn transform(
        &self,
        audio: &mut AudioBuffer,
        rng: &mut RandomnessContext,
    ) -> Result<(), StageError>;
}
