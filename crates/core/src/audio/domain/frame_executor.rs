use super::stage_error::StageError;

/// Work applied to one analysis frame, identified by its index.
pub type FrameJob<'a> = dyn Fn(usize) -> Result<Vec<f64>, StageError> + Sync + 'a;

/// Runs independent per-frame jobs and returns their outputs in frame order.
///
/// This is a port: infrastructure decides whether frames run sequentially or
/// across worker threads. Because results come back ordered, the caller's
/// overlap-add pass is identical either way.
pub trait FrameExecutor: Send + Sync {
    fn map_frames(
        &self,
        num_frames: usize,
        job: &FrameJob<'_>,
    ) -> Result<Vec<Vec<f64>>, StageError>;
}
