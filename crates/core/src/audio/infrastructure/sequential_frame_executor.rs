use crate::audio::domain::frame_executor::{FrameExecutor, FrameJob};
use crate::audio::domain::stage_error::StageError;

/// Processes frames one after another on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialFrameExecutor;

impl FrameExecutor for SequentialFrameExecutor {
    fn map_frames(
        &self,
        num_frames: usize,
        job: &FrameJob<'_>,
    ) -> Result<Vec<Vec<f64>>, StageError> {
        (0..num_frames).map(job).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_results_in_frame_order() {
        let out = SequentialFrameExecutor
            .map_frames(4, &|i| Ok(vec![i as f64]))
            .unwrap();
        assert_eq!(out, vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]]);
    }

    #[test]
    fn test_first_error_stops() {
        let err = SequentialFrameExecutor
            .map_frames(4, &|i| {
                if i == 2 {
                    Err(StageError::NonFinite {
                        stage: "test",
                        index: i,
                    })
                } else {
                    Ok(vec![])
                }
            })
            .unwrap_err();
        assert!(matches!(err, StageError::NonFinite { index: 2, .. }));
    }
}
