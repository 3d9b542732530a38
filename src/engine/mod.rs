//! Engine module housing the per-stream decision pipeline.
//!
//! `core` holds the `DecisionEngine` (records in, decision events out),
//! `hpss_worker` the background separation thread, and `session` the
//! audio-level wiring of extractor, models, worker and engine.

pub mod core;
pub mod hpss_worker;
pub mod session;

pub use core::{DecisionEngine, DecisionEvent, StyleDecision};
pub use hpss_worker::{HpssJob, HpssJobResult, HpssWorker};
pub use session::{StreamSession, DEFAULT_HPSS_CHUNK_MS};
