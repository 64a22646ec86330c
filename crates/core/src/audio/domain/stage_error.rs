use thiserror::Error;

#[derive(Error, Debug)]
pub enum StageError {
    #[error("{stage}: buffer too short ({len} samples, need at least {required})")]
    BufferTooShort {
        stage: &'static str,
        len: usize,
        required: usize,
    },
    #[error("{stage}: produced non-finite sample at index {index}")]
    NonFinite { stage: &'static str, index: usize },
    #[error("{stage}: frame {frame} failed LPC analysis: {reason}")]
    DegenerateFrame {
        stage: &'static str,
        frame: usize,
        reason: String,
    },
    #[error("{stage}: hop {hop} leaves gaps between frames of length {frame_length}")]
    InsufficientOverlap {
        stage: &'static str,
        frame_length: usize,
        hop: usize,
    },
    #[error("{stage}: frame worker failed: {reason}")]
    Worker { stage: &'static str, reason: String },
}

impl StageError {
    /// Fails with `NonFinite` if any sample is NaN or infinite.
    pub fn check_finite(stage: &'static str, samples: &[f64]) -> Result<(), StageError> {
        match samples.iter().position(|s| !s.is_finite()) {
            Some(index) => Err(StageError::NonFinite { stage, index }),
            None => Ok(()),
        }
    }
}
