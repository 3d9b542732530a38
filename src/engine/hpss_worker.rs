// HpssWorker - background HPSS thread fed by lock-free SPSC queues
//
// Separation is too slow to run inline with the frame stream, so chunks of
// raw audio are handed to a dedicated thread. Three rtrb rings connect the
// stream thread to the worker:
// - JOB_QUEUE: stream thread pushes audio chunks, worker consumes
// - RESULT_QUEUE: worker pushes outcomes, stream thread polls without blocking
// - SPARE_QUEUE: worker returns drained chunk buffers for reuse
//
// At most one job is in flight per stream; `submit` rejects new work with
// `HpssError::WorkerBusy` until the previous job has finished.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rtrb::{Consumer, PopError, Producer, RingBuffer};

use crate::config::HpssConfig;
use crate::error::{log_hpss_error, ConfigError, HpssError};
use crate::hpss::{HpssEngine, HpssResult};
use crate::telemetry::{self, DiagnosticError};

const JOB_QUEUE_CAPACITY: usize = 1;
const RESULT_QUEUE_CAPACITY: usize = 4;
const SPARE_QUEUE_CAPACITY: usize = 2;

/// Audio chunk queued for separation
pub struct HpssJob {
    pub id: u64,
    pub samples: Vec<f32>,
}

/// Outcome of one job
///
/// Failures other than cancellation are already converted into the fallback
/// result, so `Err` only ever carries `HpssError::Cancelled`.
#[derive(Debug)]
pub struct HpssJobResult {
    pub id: u64,
    pub outcome: Result<HpssResult, HpssError>,
    pub elapsed_ms: f32,
}

pub struct HpssWorker {
    jobs: Producer<HpssJob>,
    results: Consumer<HpssJobResult>,
    spares: Consumer<Vec<f32>>,
    busy: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    next_id: u64,
}

impl HpssWorker {
    /// Start the worker thread
    ///
    /// # Errors
    /// `ConfigError::InvalidHpssGeometry` when the configuration is unusable
    pub fn spawn(config: HpssConfig) -> Result<Self, ConfigError> {
        let engine = HpssEngine::new(config)?;
        let (jobs, job_rx) = RingBuffer::<HpssJob>::new(JOB_QUEUE_CAPACITY);
        let (result_tx, results) = RingBuffer::<HpssJobResult>::new(RESULT_QUEUE_CAPACITY);
        let (spare_tx, spares) = RingBuffer::<Vec<f32>>::new(SPARE_QUEUE_CAPACITY);

        let busy = Arc::new(AtomicBool::new(false));
        let cancel = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));

        let thread = WorkerThread {
            engine,
            jobs: job_rx,
            results: result_tx,
            spares: spare_tx,
            busy: Arc::clone(&busy),
            cancel: Arc::clone(&cancel),
            running: Arc::clone(&running),
        };
        let handle = thread::spawn(move || thread.run());

        Ok(Self {
            jobs,
            results,
            spares,
            busy,
            cancel,
            running,
            handle: Some(handle),
            next_id: 0,
        })
    }

    /// Queue a chunk for separation
    ///
    /// # Returns
    /// The job id, or `HpssError::WorkerBusy` while a job is in flight
    pub fn submit(&mut self, samples: Vec<f32>) -> Result<u64, HpssError> {
        if self.busy.load(Ordering::SeqCst) {
            telemetry::hub().record_error(DiagnosticError::WorkerBusy, "HpssWorker::submit");
            return Err(HpssError::WorkerBusy);
        }

        let id = self.next_id;
        self.cancel.store(false, Ordering::SeqCst);
        self.busy.store(true, Ordering::SeqCst);
        if self.jobs.push(HpssJob { id, samples }).is_err() {
            self.busy.store(false, Ordering::SeqCst);
            return Err(HpssError::WorkerBusy);
        }
        self.next_id += 1;
        tracing::debug!("[HpssWorker] Submitted job {}", id);
        Ok(id)
    }

    /// Id the next accepted job will receive
    pub fn next_job_id(&self) -> u64 {
        self.next_id
    }

    /// Poll for a finished job without blocking
    pub fn try_recv(&mut self) -> Option<HpssJobResult> {
        self.results.pop().ok()
    }

    /// Poll until a result arrives or `timeout` elapses
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<HpssJobResult> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(result) = self.try_recv() {
                return Some(result);
            }
            if Instant::now() >= deadline {
                return None;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Reuse a buffer returned by the worker, or allocate a new one
    pub fn take_buffer(&mut self) -> Vec<f32> {
        self.spares.pop().unwrap_or_default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Ask the running job to stop at its next iteration boundary
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }
}

impl Drop for HpssWorker {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.cancel.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("[HpssWorker] Worker thread panicked");
            }
        }
    }
}

struct WorkerThread {
    engine: HpssEngine,
    jobs: Consumer<HpssJob>,
    results: Producer<HpssJobResult>,
    spares: Producer<Vec<f32>>,
    busy: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
}

impl WorkerThread {
    fn run(mut self) {
        tracing::info!("[HpssWorker] Worker thread started");
        loop {
            let job = match self.jobs.pop() {
                Ok(job) => job,
                Err(PopError::Empty) => {
                    // Check shutdown flag only when queue is empty
                    if !self.running.load(Ordering::SeqCst) {
                        tracing::info!("[HpssWorker] Shutdown requested and queue empty, exiting");
                        break;
                    }
                    thread::sleep(Duration::from_millis(1));
                    continue;
                }
            };

            let result = self.process(&job);
            if self.results.push(result).is_err() {
                tracing::warn!("[HpssWorker] Result queue full, dropping job {}", job.id);
            }

            let mut buffer = job.samples;
            buffer.clear();
            // Spare queue full means the stream thread has enough buffers
            let _ = self.spares.push(buffer);

            // Idle only once the result is visible to `try_recv`
            self.busy.store(false, Ordering::SeqCst);
        }
    }

    fn process(&self, job: &HpssJob) -> HpssJobResult {
        let started = Instant::now();
        let outcome = match self.engine.separate_cancellable(&job.samples, &self.cancel) {
            Ok(result) => Ok(result),
            Err(err @ HpssError::Cancelled { .. }) => {
                tracing::info!("[HpssWorker] Job {} cancelled: {}", job.id, err);
                telemetry::hub().record_error(
                    DiagnosticError::HpssCancelled,
                    format!("job {}", job.id),
                );
                Err(err)
            }
            Err(err) => {
                log_hpss_error(&err, "HpssWorker");
                Ok(HpssResult::fallback(&job.samples))
            }
        };
        let elapsed_ms = started.elapsed().as_secs_f32() * 1000.0;

        if let Ok(result) = &outcome {
            telemetry::hub().record_hpss(&result.summary(), elapsed_ms);
        }
        HpssJobResult {
            id: job.id,
            outcome,
            elapsed_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> HpssConfig {
        HpssConfig {
            window_size: 256,
            hop_size: 64,
            kernel_size: 5,
            iterations: 3,
            power: 2.0,
        }
    }

    fn tone(len: usize) -> Vec<f32> {
        (0..len).map(|i| (i as f32 * 0.07).sin() * 0.5).collect()
    }

    #[test]
    fn worker_returns_separation() {
        let mut worker = HpssWorker::spawn(small_config()).unwrap();
        let id = worker.submit(tone(4000)).unwrap();

        let result = worker
            .recv_timeout(Duration::from_secs(10))
            .expect("worker produced no result");
        assert_eq!(result.id, id);
        let separation = result.outcome.unwrap();
        assert!(!separation.is_fallback);
        assert!(separation.harmonic_ratio > 0.0);
    }

    #[test]
    fn worker_rejects_second_job_while_busy() {
        let mut config = small_config();
        config.iterations = 200;
        let mut worker = HpssWorker::spawn(config).unwrap();

        worker.submit(tone(44_100)).unwrap();
        assert!(worker.is_busy());
        assert_eq!(worker.submit(tone(100)), Err(HpssError::WorkerBusy));

        worker.cancel();
        let result = worker.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(matches!(
            result.outcome,
            Err(HpssError::Cancelled { .. }) | Ok(_)
        ));
    }

    #[test]
    fn worker_falls_back_on_invalid_input() {
        let mut worker = HpssWorker::spawn(small_config()).unwrap();
        worker.submit(vec![0.1, f32::NAN, 0.2]).unwrap();
        let result = worker.recv_timeout(Duration::from_secs(10)).unwrap();
        let separation = result.outcome.unwrap();
        assert!(separation.is_fallback);
        assert_eq!(separation.harmonic.len(), 3);
    }

    #[test]
    fn worker_recycles_buffers() {
        let mut worker = HpssWorker::spawn(small_config()).unwrap();
        let mut chunk = worker.take_buffer();
        assert!(chunk.is_empty());
        chunk.extend(tone(1024));
        let capacity = chunk.capacity();
        worker.submit(chunk).unwrap();
        worker.recv_timeout(Duration::from_secs(10)).unwrap();

        // The spare is pushed right after the result
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut spare = worker.take_buffer();
        while spare.capacity() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
            spare = worker.take_buffer();
        }
        assert!(spare.is_empty());
        assert_eq!(spare.capacity(), capacity);
    }

    #[test]
    fn result_is_ready_once_idle() {
        let mut worker = HpssWorker::spawn(small_config()).unwrap();
        let id = worker.submit(tone(4000)).unwrap();
        assert_eq!(worker.next_job_id(), id + 1);

        let deadline = Instant::now() + Duration::from_secs(10);
        while worker.is_busy() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!worker.is_busy());
        let result = worker.try_recv().expect("idle worker has no result queued");
        assert_eq!(result.id, id);
    }

    #[test]
    fn worker_shuts_down_on_drop() {
        let worker = HpssWorker::spawn(small_config()).unwrap();
        drop(worker);
    }
}
