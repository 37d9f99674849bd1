//! Background decoding.
//!
//! Decoding is CPU/IO-bound, so request handlers can hand it to a [`DecodeWorker`] instead of
//! blocking. The worker runs jobs on a dedicated `rayon` pool and additionally caps the number
//! of jobs that hold their input bytes at once (`max_in_flight`).
//!
//! Loading is deliberately not offered here: the destination store is a single-writer resource
//! and a load must run to completion on the caller's store handle.

mod semaphore;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, DecodeResult};
use crate::ingestion::{decode, DecodeOptions};
use crate::types::{ContainerKind, DecodedTable};

use semaphore::Semaphore;

/// Configuration for a [`DecodeWorker`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerOptions {
    /// Number of worker threads. If `None`, uses the platform's available parallelism.
    pub num_threads: Option<usize>,
    /// Upper bound on concurrently running decode jobs.
    pub max_in_flight: usize,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        let n = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self {
            num_threads: Some(n),
            max_in_flight: n,
        }
    }
}

/// Runs decode jobs off the calling thread.
pub struct DecodeWorker {
    pool: ThreadPool,
    permits: Arc<Semaphore>,
    metrics: Arc<WorkerMetrics>,
}

impl DecodeWorker {
    /// Build a worker and its thread pool.
    pub fn new(opts: WorkerOptions) -> Result<Self, ThreadPoolBuildError> {
        let n_threads = opts
            .num_threads
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
            .max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .thread_name(|i| format!("tabular-decode-{i}"))
            .build()?;

        Ok(Self {
            pool,
            permits: Arc::new(Semaphore::new(opts.max_in_flight)),
            metrics: Arc::new(WorkerMetrics::default()),
        })
    }

    /// Handle to live job counters.
    pub fn metrics(&self) -> Arc<WorkerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Queue a decode job. The result is delivered through the returned handle.
    pub fn submit(&self, bytes: Vec<u8>, kind: ContainerKind, options: DecodeOptions) -> DecodeHandle {
        let (tx, rx) = mpsc::sync_channel(1);
        let permits = Arc::clone(&self.permits);
        let metrics = Arc::clone(&self.metrics);

        self.pool.spawn(move || {
            let (permit, waited) = permits.acquire();
            let job = ActiveJob::start(&metrics, waited);
            let result = decode(&bytes, kind, &options);
            drop(bytes);
            drop(job);
            drop(permit);
            // The receiver may have been dropped; the result is simply discarded then.
            let _ = tx.send(result);
        });

        DecodeHandle { rx }
    }
}

/// Pending result of a [`DecodeWorker::submit`] call.
#[derive(Debug)]
pub struct DecodeHandle {
    rx: mpsc::Receiver<DecodeResult<DecodedTable>>,
}

impl DecodeHandle {
    /// Block until the job finishes.
    pub fn wait(self) -> DecodeResult<DecodedTable> {
        self.rx.recv().unwrap_or_else(|_| {
            Err(DecodeError::Io(std::io::Error::other(
                "decode worker stopped before producing a result",
            )))
        })
    }

    /// Wait at most `timeout`; returns `None` if the job is still running.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<DecodeResult<DecodedTable>> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(mpsc::RecvTimeoutError::Timeout) => None,
            Err(mpsc::RecvTimeoutError::Disconnected) => Some(Err(DecodeError::Io(std::io::Error::other(
                "decode worker stopped before producing a result",
            )))),
        }
    }
}

/// Live counters for a [`DecodeWorker`].
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    jobs_started: AtomicU64,
    jobs_finished: AtomicU64,
    throttle_wait_ns: AtomicU64,
    active_jobs: AtomicUsize,
    max_active_jobs: AtomicUsize,
}

impl WorkerMetrics {
    fn on_job_start(&self, waited: Duration) {
        let _ = self.jobs_started.fetch_add(1, Ordering::SeqCst);
        let add = waited.as_nanos().min(u64::MAX as u128) as u64;
        let _ = self.throttle_wait_ns.fetch_add(add, Ordering::SeqCst);
        let now = self.active_jobs.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.max_active_jobs.fetch_max(now, Ordering::SeqCst);
    }

    fn on_job_end(&self) {
        let _ = self.jobs_finished.fetch_add(1, Ordering::SeqCst);
        let _ = self.active_jobs.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> WorkerMetricsSnapshot {
        WorkerMetricsSnapshot {
            jobs_started: self.jobs_started.load(Ordering::SeqCst),
            jobs_finished: self.jobs_finished.load(Ordering::SeqCst),
            throttle_wait: Duration::from_nanos(self.throttle_wait_ns.load(Ordering::SeqCst)),
            max_active_jobs: self.max_active_jobs.load(Ordering::SeqCst),
        }
    }
}

/// Marks a job as running in [`WorkerMetrics`] until dropped.
struct ActiveJob<'a> {
    metrics: &'a WorkerMetrics,
}

impl<'a> ActiveJob<'a> {
    fn start(metrics: &'a WorkerMetrics, waited: Duration) -> Self {
        metrics.on_job_start(waited);
        Self { metrics }
    }
}

impl Drop for ActiveJob<'_> {
    fn drop(&mut self) {
        self.metrics.on_job_end();
    }
}

/// Immutable snapshot of [`WorkerMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerMetricsSnapshot {
    pub jobs_started: u64,
    pub jobs_finished: u64,
    pub throttle_wait: Duration,
    pub max_active_jobs: usize,
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::{ActiveJob, DecodeWorker, WorkerMetrics, WorkerOptions};
    use crate::ingestion::DecodeOptions;
    use crate::types::ContainerKind;

    fn csv_of_n(n: usize) -> Vec<u8> {
        let mut out = String::from("id,name\n");
        for i in 0..n {
            out.push_str(&format!("{i},row{i}\n"));
        }
        out.into_bytes()
    }

    #[test]
    fn submitted_jobs_decode_off_thread() {
        let worker = DecodeWorker::new(WorkerOptions {
            num_threads: Some(2),
            max_in_flight: 2,
        })
        .unwrap();

        let handles: Vec<_> = (1..=4)
            .map(|n| worker.submit(csv_of_n(n * 10), ContainerKind::DelimitedText, DecodeOptions::default()))
            .collect();

        let counts: Vec<usize> = handles.into_iter().map(|h| h.wait().unwrap().row_count()).collect();
        assert_eq!(counts, vec![10, 20, 30, 40]);

        let snap = worker.metrics().snapshot();
        assert_eq!(snap.jobs_started, 4);
        assert_eq!(snap.jobs_finished, 4);
    }

    #[test]
    fn max_in_flight_caps_concurrent_jobs() {
        let worker = DecodeWorker::new(WorkerOptions {
            num_threads: Some(4),
            max_in_flight: 1,
        })
        .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| worker.submit(csv_of_n(2_000), ContainerKind::DelimitedText, DecodeOptions::default()))
            .collect();
        for h in handles {
            assert_eq!(h.wait().unwrap().row_count(), 2_000);
        }

        assert_eq!(worker.metrics().snapshot().max_active_jobs, 1);
    }

    #[test]
    fn decode_errors_are_delivered_through_the_handle() {
        let worker = DecodeWorker::new(WorkerOptions::default()).unwrap();
        let err = worker
            .submit(Vec::new(), ContainerKind::DelimitedText, DecodeOptions::default())
            .wait()
            .unwrap_err();
        assert_eq!(err.kind(), "empty_header");
    }

    #[test]
    fn panicking_job_is_still_counted_as_finished() {
        let metrics = WorkerMetrics::default();
        let outcome = std::panic::catch_unwind(|| {
            let _job = ActiveJob::start(&metrics, Duration::ZERO);
            panic!("decoder bug");
        });

        assert!(outcome.is_err());
        assert_eq!(metrics.active_jobs.load(Ordering::SeqCst), 0);
        assert_eq!(metrics.snapshot().jobs_finished, 1);
    }
}
