// Analysis module - from per-frame features to musical decisions
//
// Pipeline:
//   FrameFeatureExtractor (or an external feature source)
//     → FeatureRecord stream
//     → FeatureAggregator (sliding window statistics, tempo)
//     → StabilityDetector (energy hysteresis + stability state machine)
//     → StyleClassifier (template scoring, talking points, sub-genres)
//
// Every stage is synchronous and owned by a single caller; the engine
// module wires them together.

pub mod aggregator;
pub mod classifier;
pub mod features;
pub mod hysteresis;
pub mod record;
pub mod stability;
pub mod stats;
pub mod tempo;
pub mod templates;

pub use aggregator::{FeatureAggregator, FeatureWindow};
pub use classifier::{StyleClassifier, StyleResult, StyleScore, StyleSuffix};
pub use features::FrameFeatureExtractor;
pub use hysteresis::{EnergyGate, GateEvent};
pub use record::{FeatureRecord, ScalarFeature, CHROMA_LEN, CONTRAST_LEN, MFCC_LEN};
pub use stability::{DetectorState, StabilityDetector, StabilityMetrics, StabilityUpdate};
pub use stats::{Stat, VectorStat};
pub use tempo::{TempoEstimate, TempoSource};
pub use templates::{StyleTemplate, STYLE_TEMPLATES};
