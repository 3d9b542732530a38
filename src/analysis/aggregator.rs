// FeatureAggregator - sliding-window statistics over FeatureRecords
//
// Records are kept in a time-ordered VecDeque. On every insert, records
// older than `newest - max_window_ms` are evicted from the front. A
// FeatureWindow summarizes the records inside the shorter minimum window.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use super::record::{dominant_label, FeatureRecord, ScalarFeature};
use super::stats::{finite_or_zero, Stat, VectorStat};
use super::tempo::{estimate_tempo, TempoSource};
use crate::config::AggregationConfig;
use crate::error::ConfigError;

/// Summary statistics over the minimum window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureWindow {
    /// Timestamp of the oldest record in the window
    pub start_ms: f64,
    /// Timestamp of the newest record in the window
    pub end_ms: f64,
    pub frame_count: usize,
    /// Indexed by [`ScalarFeature::index`]
    pub scalars: [Stat; ScalarFeature::COUNT],
    pub rms_peak: f32,
    /// Max minus min RMS over the window (0 when no record carries RMS)
    pub dynamic_range: f32,
    pub mfcc: VectorStat,
    pub chroma: VectorStat,
    pub spectral_contrast: VectorStat,
    pub tempo_bpm: f32,
    pub tempo_source: Option<TempoSource>,
    pub beat_strength: f32,
    /// Mean probability per instrument label over records carrying a map
    pub instruments: BTreeMap<String, f32>,
    pub dominant_instrument: Option<String>,
    pub dominant_instrument_confidence: f32,
}

impl FeatureWindow {
    pub fn stat(&self, feature: ScalarFeature) -> Stat {
        self.scalars[feature.index()]
    }

    pub fn mean(&self, feature: ScalarFeature) -> f32 {
        self.stat(feature).mean
    }

    pub fn has(&self, feature: ScalarFeature) -> bool {
        self.stat(feature).is_present()
    }

    pub fn duration_ms(&self) -> f64 {
        (self.end_ms - self.start_ms).max(0.0)
    }

    /// Mean of the first spectral-contrast band, if any record carried contrast
    pub fn contrast_low_band(&self) -> Option<f32> {
        if self.spectral_contrast.is_present() {
            self.spectral_contrast.mean.first().copied()
        } else {
            None
        }
    }

    /// Tempo-source-aware check: a default tempo is not a measurement
    pub fn has_measured_tempo(&self) -> bool {
        matches!(
            self.tempo_source,
            Some(TempoSource::SpectralFlux) | Some(TempoSource::Model)
        )
    }
}

/// Time-bounded buffer of FeatureRecords
pub struct FeatureAggregator {
    config: AggregationConfig,
    records: VecDeque<FeatureRecord>,
    dropped_out_of_order: u64,
}

impl Default for FeatureAggregator {
    fn default() -> Self {
        Self {
            config: AggregationConfig::default(),
            records: VecDeque::new(),
            dropped_out_of_order: 0,
        }
    }
}

impl FeatureAggregator {
    /// Create an aggregator with validated window parameters
    pub fn new(config: AggregationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            records: VecDeque::new(),
            dropped_out_of_order: 0,
        })
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Append a record and evict expired ones
    ///
    /// Records older than the newest stored record are rejected so the
    /// buffer stays time-ordered.
    ///
    /// # Returns
    /// `true` if the record was stored
    pub fn add_frame(&mut self, record: FeatureRecord) -> bool {
        if !record.timestamp_ms.is_finite() {
            log::warn!("[FeatureAggregator] Dropping record with non-finite timestamp");
            self.dropped_out_of_order += 1;
            return false;
        }
        if let Some(newest) = self.newest_timestamp() {
            if record.timestamp_ms < newest {
                self.dropped_out_of_order += 1;
                log::debug!(
                    "[FeatureAggregator] Dropping out-of-order record at {:.1}ms (newest {:.1}ms)",
                    record.timestamp_ms,
                    newest
                );
                return false;
            }
        }

        self.records.push_back(record.sanitized());
        self.evict();
        true
    }

    fn evict(&mut self) {
        let Some(newest) = self.newest_timestamp() else {
            return;
        };
        let cutoff = newest - self.config.max_window_ms;
        while self
            .records
            .front()
            .map_or(false, |r| r.timestamp_ms < cutoff)
        {
            self.records.pop_front();
        }
    }

    pub fn newest_timestamp(&self) -> Option<f64> {
        self.records.back().map(|r| r.timestamp_ms)
    }

    pub fn oldest_timestamp(&self) -> Option<f64> {
        self.records.front().map(|r| r.timestamp_ms)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dropped_out_of_order(&self) -> u64 {
        self.dropped_out_of_order
    }

    pub fn records(&self) -> impl Iterator<Item = &FeatureRecord> {
        self.records.iter()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Records inside the minimum window, oldest first
    fn window_records(&self) -> Vec<&FeatureRecord> {
        let Some(newest) = self.newest_timestamp() else {
            return Vec::new();
        };
        let cutoff = newest - self.config.min_window_ms;
        let start = self
            .records
            .iter()
            .position(|r| r.timestamp_ms >= cutoff)
            .unwrap_or(self.records.len());
        self.records.range(start..).collect()
    }

    /// Summarize the current minimum window
    ///
    /// Pure with respect to the buffer: repeated calls without an
    /// intervening `add_frame` return equal windows.
    ///
    /// # Returns
    /// `None` when no records are buffered
    pub fn compute_window_features(&self) -> Option<FeatureWindow> {
        let records = self.window_records();
        let (first, last) = (records.first()?, records.last()?);

        let mut scalars = [Stat::default(); ScalarFeature::COUNT];
        for feature in ScalarFeature::ALL {
            scalars[feature.index()] =
                Stat::from_values(records.iter().filter_map(|r| r.scalar(feature)));
        }

        let (rms_min, rms_peak) = records
            .iter()
            .filter_map(|r| r.scalar(ScalarFeature::Rms))
            .fold((f32::INFINITY, 0.0f32), |(lo, hi), v| (lo.min(v), hi.max(v)));
        let dynamic_range = if scalars[ScalarFeature::Rms.index()].is_present() {
            finite_or_zero((rms_peak - rms_min) as f64).max(0.0)
        } else {
            0.0
        };

        let mfcc = VectorStat::from_vectors(records.iter().filter_map(|r| r.mfcc.as_ref()));
        let chroma =
            VectorStat::from_vectors(records.iter().filter_map(|r| r.chroma.as_ref()));
        let spectral_contrast = VectorStat::from_vectors(
            records.iter().filter_map(|r| r.spectral_contrast.as_ref()),
        );

        let flux: Vec<f32> = records
            .iter()
            .filter_map(|r| r.scalar(ScalarFeature::SpectralFlux))
            .collect();
        let flux_tempo = estimate_tempo(&flux, &self.config);

        let model_tempo = Stat::from_values(
            records
                .iter()
                .filter_map(|r| r.model_tempo_bpm.filter(|b| *b > 0.0)),
        );
        let (tempo_bpm, tempo_source) = if self.config.prefer_model_tempo && model_tempo.is_present()
        {
            (
                model_tempo
                    .mean
                    .clamp(self.config.min_bpm, self.config.max_bpm),
                TempoSource::Model,
            )
        } else {
            (flux_tempo.bpm, flux_tempo.source)
        };

        let (instruments, dominant_instrument, dominant_instrument_confidence) =
            summarize_instruments(&records);

        Some(FeatureWindow {
            start_ms: first.timestamp_ms,
            end_ms: last.timestamp_ms,
            frame_count: records.len(),
            scalars,
            rms_peak,
            dynamic_range,
            mfcc,
            chroma,
            spectral_contrast,
            tempo_bpm,
            tempo_source: Some(tempo_source),
            beat_strength: flux_tempo.beat_strength,
            instruments,
            dominant_instrument,
            dominant_instrument_confidence,
        })
    }
}

/// Mean instrument probabilities plus the dominant label
///
/// Prefers the averaged probability maps; falls back to a majority vote over
/// per-record dominant labels when no record carries a map.
fn summarize_instruments(
    records: &[&FeatureRecord],
) -> (BTreeMap<String, f32>, Option<String>, f32) {
    let maps: Vec<&BTreeMap<String, f32>> =
        records.iter().filter_map(|r| r.instruments.as_ref()).collect();

    if !maps.is_empty() {
        let mut sums: BTreeMap<String, f64> = BTreeMap::new();
        for map in &maps {
            for (label, &p) in map.iter() {
                if p.is_finite() {
                    *sums.entry(label.clone()).or_insert(0.0) += p as f64;
                }
            }
        }
        let means: BTreeMap<String, f32> = sums
            .into_iter()
            .map(|(label, sum)| (label, finite_or_zero(sum / maps.len() as f64)))
            .collect();
        let dominant = dominant_label(&means);
        let confidence = dominant.as_ref().map_or(0.0, |(_, p)| *p);
        return (means, dominant.map(|(label, _)| label), confidence);
    }

    let mut votes: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
    for record in records {
        if let Some(label) = record.dominant_instrument.as_deref() {
            let entry = votes.entry(label).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += record.dominant_instrument_confidence.unwrap_or(0.0) as f64;
        }
    }
    let mut best: Option<(&str, usize, f64)> = None;
    for (label, (count, conf_sum)) in votes {
        if best.map_or(true, |(_, best_count, _)| count > best_count) {
            best = Some((label, count, conf_sum));
        }
    }
    match best {
        Some((label, count, conf_sum)) => (
            BTreeMap::new(),
            Some(label.to_string()),
            finite_or_zero(conf_sum / count as f64).clamp(0.0, 1.0),
        ),
        None => (BTreeMap::new(), None, 0.0),
    }
}
