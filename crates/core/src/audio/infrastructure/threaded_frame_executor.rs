use std::thread;

use crate::audio::domain::frame_executor::{FrameExecutor, FrameJob};
use crate::audio::domain::stage_error::StageError;

type FrameResult = (usize, Result<Vec<f64>, StageError>);

/// Spreads frames across scoped worker threads.
///
/// Layout: `indices → workers → results`, then a single pass on the calling
/// thread puts results back in frame order. Workers never touch a shared
/// output buffer.
pub struct ThreadedFrameExecutor {
    workers: usize,
}

impl ThreadedFrameExecutor {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl FrameExecutor for ThreadedFrameExecutor {
    fn map_frames(
        &self,
        num_frames: usize,
        job: &FrameJob<'_>,
    ) -> Result<Vec<Vec<f64>>, StageError> {
        let workers = self.workers.min(num_frames.max(1));
        let (index_tx, index_rx) = crossbeam_channel::unbounded::<usize>();
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<FrameResult>();

        for idx in 0..num_frames {
            // Receiver is alive until the scope below ends.
            let _ = index_tx.send(idx);
        }
        drop(index_tx);

        let joined: Vec<thread::Result<()>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    let index_rx = index_rx.clone();
                    let result_tx = result_tx.clone();
                    scope.spawn(move || {
                        for idx in index_rx.iter() {
                            if result_tx.send((idx, job(idx))).is_err() {
                                break;
                            }
                        }
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join()).collect()
        });
        drop(result_tx);

        if joined.iter().any(|r| r.is_err()) {
            return Err(StageError::Worker {
                stage: "frame_executor",
                reason: "worker thread panicked".to_string(),
            });
        }

        let mut slots: Vec<Option<Result<Vec<f64>, StageError>>> =
            (0..num_frames).map(|_| None).collect();
        for (idx, result) in result_rx.try_iter() {
            slots[idx] = Some(result);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| {
                slot.unwrap_or_else(|| {
                    Err(StageError::Worker {
                        stage: "frame_executor",
                        reason: format!("frame {idx} produced no result"),
                    })
                })
            })
            .collect()
    }
}
