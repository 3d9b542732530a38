//! StreamSession: raw audio in, decision events out.
//!
//! Wires the reference frame extractor, optional external models, the
//! background HPSS worker and a `DecisionEngine` for one mono stream. HPSS
//! runs on fixed-size chunks at a reduced cadence; a chunk that becomes due
//! while the previous job is still running is skipped.

use std::time::Duration;

use crate::analysis::FrameFeatureExtractor;
use crate::config::{AggregationConfig, EngineConfig};
use crate::engine::core::{DecisionEngine, DecisionEvent};
use crate::engine::hpss_worker::{HpssJobResult, HpssWorker};
use crate::error::ConfigError;
use crate::hpss::HpssSummary;
use crate::models::{enrich_record, FeatureModel};

/// Default HPSS chunk length
pub const DEFAULT_HPSS_CHUNK_MS: u32 = 1000;

pub struct StreamSession {
    extractor: FrameFeatureExtractor,
    engine: DecisionEngine,
    worker: Option<HpssWorker>,
    models: Vec<Box<dyn FeatureModel>>,
    hpss_chunk: Vec<f32>,
    hpss_chunk_samples: usize,
    skipped_chunks: u64,
    pending_jobs: usize,
    /// Results from jobs below this id predate the last reset
    first_live_job: u64,
    last_hpss: Option<HpssSummary>,
}

impl StreamSession {
    /// Create a session with background HPSS enabled
    ///
    /// # Arguments
    /// * `config` - Engine configuration (validated here)
    /// * `sample_rate` - Sample rate of the audio passed to `process_audio`
    pub fn new(config: EngineConfig, sample_rate: u32) -> Result<Self, ConfigError> {
        let worker = HpssWorker::spawn(config.hpss.clone())?;
        let mut session = Self::without_hpss(config, sample_rate)?;
        session.worker = Some(worker);
        Ok(session)
    }

    /// Create a session that never runs HPSS
    ///
    /// A frame period left at its default is replaced by the extractor's
    /// real period at `sample_rate`, so flux-peak tempo stays in BPM.
    pub fn without_hpss(mut config: EngineConfig, sample_rate: u32) -> Result<Self, ConfigError> {
        let extractor = FrameFeatureExtractor::new(sample_rate);
        let default_period = AggregationConfig::default().frame_period_ms;
        if (config.aggregation.frame_period_ms - default_period).abs() < f64::EPSILON {
            config.aggregation.frame_period_ms = extractor.frame_period_ms();
        }
        let engine = DecisionEngine::new(config)?;
        let hpss_chunk_samples = chunk_samples(DEFAULT_HPSS_CHUNK_MS, extractor.sample_rate());
        Ok(Self {
            extractor,
            engine,
            worker: None,
            models: Vec::new(),
            hpss_chunk: Vec::with_capacity(hpss_chunk_samples),
            hpss_chunk_samples,
            skipped_chunks: 0,
            pending_jobs: 0,
            first_live_job: 0,
            last_hpss: None,
        })
    }

    /// Attach external models run on every frame
    pub fn with_models(mut self, models: Vec<Box<dyn FeatureModel>>) -> Self {
        self.models = models;
        self
    }

    /// Change the HPSS chunk length
    pub fn with_hpss_chunk_ms(mut self, chunk_ms: u32) -> Self {
        self.hpss_chunk_samples = chunk_samples(chunk_ms, self.extractor.sample_rate());
        self
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut DecisionEngine {
        &mut self.engine
    }

    pub fn last_hpss(&self) -> Option<HpssSummary> {
        self.last_hpss
    }

    /// HPSS chunks dropped because the worker was still busy
    pub fn skipped_chunks(&self) -> u64 {
        self.skipped_chunks
    }

    /// Feed a block of mono samples
    ///
    /// # Returns
    /// Decision events produced by the frames this block completed
    pub fn process_audio(&mut self, samples: &[f32]) -> Vec<DecisionEvent> {
        self.poll_hpss();
        self.feed_hpss(samples);

        let sample_rate = self.extractor.sample_rate();
        let models = &mut self.models;
        let records = self.extractor.process_samples_with(samples, |frame, record| {
            if !models.is_empty() {
                enrich_record(record, models.as_mut_slice(), frame, sample_rate);
            }
        });

        records
            .into_iter()
            .flat_map(|record| self.engine.push_frame(record))
            .collect()
    }

    /// Wait up to `timeout` for an in-flight HPSS job and apply its result
    ///
    /// Returns immediately when no job is outstanding.
    pub fn flush_hpss(&mut self, timeout: Duration) -> Option<HpssSummary> {
        self.poll_hpss();
        if self.pending_jobs > 0 {
            let result = self.worker.as_mut()?.recv_timeout(timeout)?;
            self.apply_job(result);
        }
        self.last_hpss
    }

    /// Drop all per-stream state, cancelling any running HPSS job
    pub fn reset(&mut self) {
        if let Some(worker) = self.worker.as_ref() {
            worker.cancel();
            self.first_live_job = worker.next_job_id();
        }
        self.pending_jobs = 0;
        self.extractor.reset();
        self.engine.reset();
        self.hpss_chunk.clear();
        self.last_hpss = None;
    }

    fn poll_hpss(&mut self) {
        while let Some(result) = self.worker.as_mut().and_then(HpssWorker::try_recv) {
            self.apply_job(result);
        }
    }

    fn apply_job(&mut self, result: HpssJobResult) {
        if result.id < self.first_live_job {
            log::debug!("[StreamSession] Discarding HPSS job {} from before reset", result.id);
            return;
        }
        self.pending_jobs = self.pending_jobs.saturating_sub(1);
        match result.outcome {
            Ok(separation) => {
                if self.engine.apply_hpss(&separation) {
                    self.last_hpss = Some(separation.summary());
                }
            }
            Err(err) => log::debug!("[StreamSession] HPSS job {} discarded: {}", result.id, err),
        }
    }

    fn feed_hpss(&mut self, samples: &[f32]) {
        let Some(worker) = self.worker.as_mut() else {
            return;
        };

        let mut rest = samples;
        while !rest.is_empty() {
            let take = (self.hpss_chunk_samples - self.hpss_chunk.len()).min(rest.len());
            self.hpss_chunk.extend_from_slice(&rest[..take]);
            rest = &rest[take..];

            if self.hpss_chunk.len() < self.hpss_chunk_samples {
                break;
            }
            if worker.is_busy() {
                self.skipped_chunks += 1;
                log::debug!("[StreamSession] HPSS worker busy, skipping chunk");
                self.hpss_chunk.clear();
                continue;
            }

            let next = worker.take_buffer();
            let chunk = std::mem::replace(&mut self.hpss_chunk, next);
            match worker.submit(chunk) {
                Ok(_) => self.pending_jobs += 1,
                Err(err) => {
                    self.skipped_chunks += 1;
                    log::debug!("[StreamSession] HPSS submit rejected: {}", err);
                }
            }
        }
    }
}

fn chunk_samples(chunk_ms: u32, sample_rate: u32) -> usize {
    ((chunk_ms as u64 * sample_rate as u64) / 1000).max(1) as usize
}
