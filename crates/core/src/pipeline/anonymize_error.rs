use std::fmt;

use thiserror::Error;

use crate::audio::domain::audio_buffer::AudioBuffer;
use crate::audio::domain::stage_error::StageError;
use crate::codec::domain::codec_error::CodecError;

use super::output_artifact::IntegrityError;

/// The only failure kinds callers of the pipeline see. Detailed causes are
/// logged, never returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AnonymizeError {
    #[error("input audio could not be loaded")]
    InputLoad,
    #[error("audio processing failed")]
    StageExecution,
    #[error("output audio failed integrity check")]
    OutputIntegrity,
}

impl AnonymizeError {
    /// Stable machine-readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            AnonymizeError::InputLoad => "input_load",
            AnonymizeError::StageExecution => "stage_execution",
            AnonymizeError::OutputIntegrity => "output_integrity",
        }
    }
}

/// Length, peak and RMS of a buffer at the moment something went wrong.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferStats {
    pub len: usize,
    pub sample_rate: u32,
    pub peak: f32,
    pub rms: f64,
}

impl BufferStats {
    pub fn of(audio: &AudioBuffer) -> Self {
        Self {
            len: audio.len(),
            sample_rate: audio.sample_rate(),
            peak: audio.peak(),
            rms: audio.rms(),
        }
    }
}

impl fmt::Display for BufferStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "len={} rate={} peak={:.6} rms={:.6}",
            self.len, self.sample_rate, self.peak, self.rms
        )
    }
}

/// Full internal cause of a failed run.
#[derive(Debug, Error)]
pub(crate) enum PipelineFailure {
    #[error("input buffer is empty")]
    EmptyInput,
    #[error("input sample rate must be positive")]
    ZeroSampleRate,
    #[error("input sample rate {actual} Hz does not match processing rate {expected} Hz")]
    SampleRateMismatch { expected: u32, actual: u32 },
    #[error("input is {duration:.3}s, shorter than the {min}s minimum")]
    TooShort { duration: f64, min: f64 },
    #[error("input sample {index} is not finite")]
    NonFiniteInput { index: usize },
    #[error("stage '{stage}' ({parameters}) failed on buffer [{stats}]: {source}")]
    Stage {
        stage: &'static str,
        parameters: String,
        stats: BufferStats,
        #[source]
        source: StageError,
    },
    #[error("encoding failed: {0}")]
    Encode(#[source] CodecError),
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
}

impl PipelineFailure {
    pub(crate) fn kind(&self) -> AnonymizeError {
        match self {
            PipelineFailure::EmptyInput
            | PipelineFailure::ZeroSampleRate
            | PipelineFailure::SampleRateMismatch { .. }
            | PipelineFailure::TooShort { .. }
            | PipelineFailure::NonFiniteInput { .. } => AnonymizeError::InputLoad,
            PipelineFailure::Stage { .. } => AnonymizeError::StageExecution,
            PipelineFailure::Encode(_) | PipelineFailure::Integrity(_) => {
                AnonymizeError::OutputIntegrity
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::empty(PipelineFailure::EmptyInput, AnonymizeError::InputLoad)]
    #[case::rate(PipelineFailure::SampleRateMismatch { expected: 16000, actual: 8000 }, AnonymizeError::InputLoad)]
    #[case::non_finite(PipelineFailure::NonFiniteInput { index: 3 }, AnonymizeError::InputLoad)]
    #[case::encode(PipelineFailure::Encode(CodecError::Empty), AnonymizeError::OutputIntegrity)]
    #[case::truncated(PipelineFailure::Integrity(IntegrityError::TooSmall { size: 44, min: 1000 }), AnonymizeError::OutputIntegrity)]
    fn test_failure_collapses_to_kind(
        #[case] failure: PipelineFailure,
        #[case] expected: AnonymizeError,
    ) {
        assert_eq!(failure.kind(), expected);
    }

    #[test]
    fn test_stage_failure_message_carries_detail() {
        let audio = AudioBuffer::new(vec![0.5, -0.25], 16000);
        let failure = PipelineFailure::Stage {
            stage: "mcadams",
            parameters: "coefficient=0.8".to_string(),
            stats: BufferStats::of(&audio),
            source: StageError::NonFinite {
                stage: "mcadams",
                index: 1,
            },
        };
        assert_eq!(failure.kind(), AnonymizeError::StageExecution);
        let text = failure.to_string();
        assert!(text.contains("mcadams"));
        assert!(text.contains("coefficient=0.8"));
        assert!(text.contains("peak=0.500000"));
    }

    #[test]
    fn test_public_error_hides_detail() {
        assert_eq!(AnonymizeError::StageExecution.to_string(), "audio processing failed");
        assert_eq!(AnonymizeError::OutputIntegrity.error_code(), "output_integrity");
    }
}
