//! Background segmentation so decoding large photos never blocks drawing.
//! The UI submits paths and polls for results each tick; job ids let the
//! add-article flow ignore results meant for a flow it already left.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::error::SegmentationError;
use crate::segmentation::{SegmentedImage, SubjectSegmenter};

struct Job {
    id: u64,
    path: PathBuf,
}

#[derive(Debug)]
pub struct SegmentationResult {
    pub job_id: u64,
    pub outcome: Result<SegmentedImage, SegmentationError>,
}

pub struct SegmentationWorker {
    jobs: Sender<Job>,
    results: Receiver<SegmentationResult>,
    // Results for jobs the thread could not take.
    failed: VecDeque<SegmentationResult>,
    next_id: u64,
}

impl SegmentationWorker {
    /// Start the worker thread. It exits once the worker is dropped.
    pub fn spawn(segmenter: Box<dyn SubjectSegmenter>) -> Result<Self> {
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (result_tx, result_rx) = mpsc::channel();

        thread::Builder::new()
            .name("segmentation".into())
            .spawn(move || {
                for job in job_rx {
                    debug!(job_id = job.id, path = %job.path.display(), "segmenting");
                    let outcome = segmenter.segment(&job.path);
                    if result_tx
                        .send(SegmentationResult {
                            job_id: job.id,
                            outcome,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
                debug!("segmentation worker stopped");
            })
            .context("failed to start segmentation worker")?;

        Ok(Self {
            jobs: job_tx,
            results: result_rx,
            failed: VecDeque::new(),
            next_id: 1,
        })
    }

    /// Queue `path` and return the job id its result will carry.
    pub fn submit(&mut self, path: PathBuf) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        if self.jobs.send(Job { id, path }).is_err() {
            warn!(job_id = id, "segmentation worker is gone");
            self.failed.push_back(SegmentationResult {
                job_id: id,
                outcome: Err(SegmentationError::ModuleNotReady),
            });
        }
        id
    }

    /// Next finished job, if any, without blocking.
    pub fn try_result(&mut self) -> Option<SegmentationResult> {
        if let Some(result) = self.failed.pop_front() {
            return Some(result);
        }
        match self.results.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                warn!("segmentation worker exited");
                None
            }
        }
    }

    #[cfg(test)]
    fn wait_result(&mut self, timeout: std::time::Duration) -> Option<SegmentationResult> {
        if let Some(result) = self.failed.pop_front() {
            return Some(result);
        }
        self.results.recv_timeout(timeout).ok()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use super::*;
    use crate::segmentation::testing::FixedSegmenter;

    struct PanickySegmenter;

    impl SubjectSegmenter for PanickySegmenter {
        fn segment(&self, _path: &Path) -> Result<SegmentedImage, SegmentationError> {
            panic!("model crashed");
        }
    }

    #[test]
    fn results_carry_their_job_ids() {
        let segmenter = FixedSegmenter(Err(SegmentationError::ModuleNotReady));
        let mut worker = SegmentationWorker::spawn(Box::new(segmenter)).unwrap();

        let first = worker.submit("a.png".into());
        let second = worker.submit("b.png".into());
        assert_ne!(first, second);

        let a = worker.wait_result(Duration::from_secs(5)).unwrap();
        let b = worker.wait_result(Duration::from_secs(5)).unwrap();
        assert_eq!((a.job_id, b.job_id), (first, second));
        assert_eq!(a.outcome.unwrap_err(), SegmentationError::ModuleNotReady);
    }

    #[test]
    fn dead_worker_reports_not_ready() {
        let mut worker = SegmentationWorker::spawn(Box::new(PanickySegmenter)).unwrap();
        worker.submit("boom.png".into());
        // The thread panics on the first job; later submissions cannot be sent.
        let mut job_id = 0;
        for _ in 0..100 {
            job_id = worker.submit("again.png".into());
            if let Some(result) = worker.try_result() {
                assert_eq!(result.job_id, job_id);
                assert_eq!(result.outcome.unwrap_err(), SegmentationError::ModuleNotReady);
                return;
            }
            thread::sleep(Duration::from_millis(20));
        }
        panic!("worker never reported job {job_id} as failed");
    }
}
