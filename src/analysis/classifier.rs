// Classifier - rule-based music style classification
//
// Scores a FeatureWindow against every entry of the style template catalog
// and picks the best match. The base label is refined into a compound label
// ("techno_percussive", "pop_vocal", ...) from the voice/percussive/harmonic
// ratios, and decorated with talking points and sub-genre hints.
//
// Scoring is deterministic: equal windows always produce equal scores and
// labels. Ties resolve to the template listed first in the catalog.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::analysis::aggregator::FeatureWindow;
use crate::analysis::record::ScalarFeature;
use crate::analysis::templates::{Range, StyleTemplate, STYLE_TEMPLATES};
use crate::config::{ClassifierConfig, TalkingPointSelection};
use crate::error::ConfigError;
use Compare::{Above, Below};
use Metric::{ContrastLow, Scalar, Tempo};
use ScalarFeature::{
    HarmonicRatio, PercussiveRatio, Rms, SpectralCentroid, SpectralFlatness, VoiceProbability,
};

pub const UNKNOWN_LABEL: &str = "unknown";
pub const FALLBACK_TALKING_POINT: &str = "Listening for a clearer musical signal";

/// Threshold above which a ratio is considered dominant
const DOMINANT_RATIO: f32 = 0.6;
/// Voice probability below which a style reads as instrumental
const INSTRUMENTAL_VOICE: f32 = 0.2;

/// Score of one template against a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleScore {
    pub style: String,
    pub score: f32,
}

/// StyleResult is the classifier's answer for one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleResult {
    /// Base style or compound label, e.g. "techno_percussive"
    pub label: String,
    /// Template name the label was derived from (`None` for unknown)
    pub base_style: Option<String>,
    pub confidence: f32,
    pub talking_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_genres: Vec<String>,
    /// Per-template scores, best first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scores: Vec<StyleScore>,
}

impl StyleResult {
    pub fn unknown() -> Self {
        Self {
            label: UNKNOWN_LABEL.to_string(),
            base_style: None,
            confidence: 0.0,
            talking_points: vec![FALLBACK_TALKING_POINT.to_string()],
            sub_genres: Vec::new(),
            scores: Vec::new(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.label == UNKNOWN_LABEL
    }
}

/// Compound label suffix, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleSuffix {
    Vocal,
    Percussive,
    Harmonic,
    Instrumental,
}

impl StyleSuffix {
    pub fn as_str(&self) -> &'static str {
        match self {
            StyleSuffix::Vocal => "vocal",
            StyleSuffix::Percussive => "percussive",
            StyleSuffix::Harmonic => "harmonic",
            StyleSuffix::Instrumental => "instrumental",
        }
    }

    fn opener(&self, display_name: &str) -> String {
        match self {
            StyleSuffix::Vocal => format!("Vocal-led {}", display_name),
            StyleSuffix::Percussive => format!("Percussion-heavy {}", display_name),
            StyleSuffix::Harmonic => format!("Lush, harmonic {}", display_name),
            StyleSuffix::Instrumental => format!("Instrumental {}", display_name),
        }
    }
}

/// Quantity a sub-genre rule inspects
#[derive(Debug, Clone, Copy)]
enum Metric {
    Tempo,
    Scalar(ScalarFeature),
    ContrastLow,
}

#[derive(Debug, Clone, Copy)]
enum Compare {
    Above(f32),
    Below(f32),
}

struct SubGenreRule {
    style: &'static str,
    label: &'static str,
    metric: Metric,
    compare: Compare,
}

const fn rule(style: &'static str, label: &'static str, metric: Metric, compare: Compare) -> SubGenreRule {
    SubGenreRule {
        style,
        label,
        metric,
        compare,
    }
}

const SUB_GENRE_RULES: &[SubGenreRule] = &[
    rule("techno", "Percussive Techno", Scalar(PercussiveRatio), Above(0.7)),
    rule("techno", "Minimal Techno", Scalar(Rms), Below(0.6)),
    rule("techno", "Industrial Techno", Scalar(SpectralFlatness), Above(0.35)),
    rule("house", "Vocal House", Scalar(VoiceProbability), Above(0.6)),
    rule("house", "Deep House", Scalar(HarmonicRatio), Above(0.5)),
    rule("house", "Tech House", Scalar(PercussiveRatio), Above(0.7)),
    rule("trance", "Uplifting Trance", Tempo, Above(137.0)),
    rule("trance", "Psytrance", Scalar(SpectralCentroid), Above(3500.0)),
    rule("trance", "Progressive Trance", Scalar(HarmonicRatio), Above(0.7)),
    rule("drum_and_bass", "Liquid Drum & Bass", Scalar(HarmonicRatio), Above(0.5)),
    rule("drum_and_bass", "Neurofunk", Scalar(SpectralFlatness), Above(0.4)),
    rule("drum_and_bass", "Jump-Up", Scalar(PercussiveRatio), Above(0.75)),
    rule("rock", "Hard Rock", Scalar(Rms), Above(0.8)),
    rule("rock", "Instrumental Rock", Scalar(VoiceProbability), Below(0.3)),
    rule("rock", "Soft Rock", Scalar(SpectralFlatness), Below(0.1)),
    rule("pop", "Dance Pop", Scalar(PercussiveRatio), Above(0.6)),
    rule("pop", "Electropop", Scalar(SpectralCentroid), Above(2800.0)),
    rule("pop", "Acoustic Pop", Scalar(Rms), Below(0.5)),
    rule("jazz", "Bebop", Tempo, Above(120.0)),
    rule("jazz", "Cool Jazz", Scalar(Rms), Below(0.3)),
    rule("jazz", "Jazz Fusion", Scalar(PercussiveRatio), Above(0.5)),
    rule("classical", "Orchestral", Scalar(Rms), Above(0.3)),
    rule("classical", "Chamber Music", Scalar(Rms), Below(0.15)),
    rule("classical", "Choral", Scalar(VoiceProbability), Above(0.4)),
    rule("hip_hop", "Boom Bap", Tempo, Below(95.0)),
    rule("hip_hop", "Trap", Scalar(PercussiveRatio), Above(0.75)),
    rule("hip_hop", "Lyrical Hip-Hop", Scalar(VoiceProbability), Above(0.8)),
    rule("metal", "Thrash Metal", Tempo, Above(160.0)),
    rule("metal", "Black Metal", Scalar(SpectralCentroid), Above(4000.0)),
    rule("metal", "Death Metal", ContrastLow, Above(24.0)),
    rule("ambient", "Drone", Scalar(HarmonicRatio), Above(0.85)),
    rule("ambient", "Dark Ambient", Scalar(SpectralCentroid), Below(700.0)),
    rule("ambient", "Downtempo", Scalar(PercussiveRatio), Above(0.2)),
];

fn metric_value(window: &FeatureWindow, metric: Metric) -> Option<f32> {
    match metric {
        Tempo => window.has_measured_tempo().then_some(window.tempo_bpm),
        Scalar(feature) => window.has(feature).then(|| window.mean(feature)),
        ContrastLow => window.contrast_low_band(),
    }
}

/// StyleClassifier scores windows against the template catalog
///
/// Stateless between calls; any hysteresis over successive results belongs to
/// the stability detector.
#[derive(Debug, Clone, Default)]
pub struct StyleClassifier {
    config: ClassifierConfig,
}

impl StyleClassifier {
    pub fn new(config: ClassifierConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify a window
    ///
    /// Never fails: silent or sparse windows yield an `"unknown"` result with
    /// zero confidence and a single fallback talking point.
    pub fn detect_style(&self, window: &FeatureWindow) -> StyleResult {
        if self.is_silent_or_sparse(window) {
            log::debug!("[StyleClassifier] Window too quiet or sparse, reporting unknown");
            return StyleResult::unknown();
        }

        let mut scores: Vec<(&'static StyleTemplate, f32)> = STYLE_TEMPLATES
            .iter()
            .map(|t| (t, self.score_template(t, window)))
            .collect();

        // Stable sort keeps catalog order among equal scores
        scores.sort_by(|a, b| b.1.total_cmp(&a.1));
        let Some(&(best, best_score)) = scores.first() else {
            return StyleResult::unknown();
        };
        if best_score <= 0.0 {
            return StyleResult::unknown();
        }

        let suffix = resolve_suffix(best, window);
        let label = match suffix {
            Some(suffix) => format!("{}_{}", best.name, suffix.as_str()),
            None => best.name.to_string(),
        };
        let confidence = (best_score * 1.2).min(1.0);

        log::debug!(
            "[StyleClassifier] {} (score {:.3}, confidence {:.2})",
            label,
            best_score,
            confidence
        );

        StyleResult {
            label,
            base_style: Some(best.name.to_string()),
            confidence,
            talking_points: self.talking_points(best, suffix, window),
            sub_genres: detect_sub_genres(best, window),
            scores: scores
                .iter()
                .map(|(t, s)| StyleScore {
                    style: t.name.to_string(),
                    score: *s,
                })
                .collect(),
        }
    }

    fn is_silent_or_sparse(&self, window: &FeatureWindow) -> bool {
        if window.frame_count == 0 {
            return true;
        }
        if window.has(ScalarFeature::Rms) && window.mean(ScalarFeature::Rms) < self.config.silence_rms
        {
            return true;
        }
        let core = [
            ScalarFeature::Rms,
            ScalarFeature::SpectralCentroid,
            ScalarFeature::ZeroCrossingRate,
            ScalarFeature::SpectralFlatness,
        ];
        core.iter().filter(|f| window.has(**f)).count() < 2
    }

    /// Weighted fraction of satisfied template terms, in [0, 1]
    pub fn score_template(&self, template: &StyleTemplate, window: &FeatureWindow) -> f32 {
        let w = &self.config.weights;
        let in_range = |feature: ScalarFeature, range: &Range| {
            window.has(feature) && range.contains(window.mean(feature))
        };

        let mut terms = vec![
            (w.tempo, template.tempo.contains(window.tempo_bpm)),
            (w.rms, in_range(ScalarFeature::Rms, &template.rms)),
            (
                w.centroid,
                in_range(ScalarFeature::SpectralCentroid, &template.centroid),
            ),
            (w.zcr, in_range(ScalarFeature::ZeroCrossingRate, &template.zcr)),
            (
                w.flatness,
                window.has(ScalarFeature::SpectralFlatness)
                    && window.mean(ScalarFeature::SpectralFlatness) < template.flatness_max,
            ),
            (
                w.contrast,
                window
                    .contrast_low_band()
                    .map_or(false, |c| c > template.contrast_min),
            ),
        ];
        if let Some(range) = &template.voice {
            terms.push((w.voice, in_range(ScalarFeature::VoiceProbability, range)));
        }
        if let Some(range) = &template.percussive {
            terms.push((w.percussive, in_range(ScalarFeature::PercussiveRatio, range)));
        }
        if let Some(range) = &template.harmonic {
            terms.push((w.harmonic, in_range(ScalarFeature::HarmonicRatio, range)));
        }

        let applicable: f32 = terms.iter().map(|(weight, _)| weight).sum();
        let satisfied: f32 = terms
            .iter()
            .filter(|(_, ok)| *ok)
            .map(|(weight, _)| weight)
            .sum();

        if applicable > 0.0 {
            (satisfied / applicable).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    fn talking_points(
        &self,
        template: &StyleTemplate,
        suffix: Option<StyleSuffix>,
        window: &FeatureWindow,
    ) -> Vec<String> {
        let mut remarks = descriptive_remarks(window);
        if let TalkingPointSelection::Shuffled { seed } = self.config.talking_points {
            let mut rng = StdRng::seed_from_u64(seed);
            remarks.shuffle(&mut rng);
        }

        let mut points = Vec::with_capacity(self.config.max_talking_points + 2);
        if let Some(suffix) = suffix {
            points.push(suffix.opener(template.display_name));
        }
        points.extend(remarks);
        points.extend(template.keywords.iter().take(2).map(|k| k.to_string()));

        points.truncate(self.config.max_talking_points);
        points
    }
}

/// Pick at most one suffix, in priority order vocal > percussive > harmonic > instrumental
pub fn resolve_suffix(template: &StyleTemplate, window: &FeatureWindow) -> Option<StyleSuffix> {
    let ratio = |f: ScalarFeature| window.has(f).then(|| window.mean(f));
    let voice = ratio(ScalarFeature::VoiceProbability);
    let percussive = ratio(ScalarFeature::PercussiveRatio);
    let harmonic = ratio(ScalarFeature::HarmonicRatio);

    if voice.map_or(false, |v| v > DOMINANT_RATIO) {
        Some(StyleSuffix::Vocal)
    } else if percussive.map_or(false, |p| p > DOMINANT_RATIO) {
        Some(StyleSuffix::Percussive)
    } else if template.harmonic_suffix && harmonic.map_or(false, |h| h > DOMINANT_RATIO) {
        Some(StyleSuffix::Harmonic)
    } else if template.instrumental_suffix && voice.map_or(false, |v| v < INSTRUMENTAL_VOICE) {
        Some(StyleSuffix::Instrumental)
    } else {
        None
    }
}

/// Sub-genre hints for a base style; every matching rule contributes
pub fn detect_sub_genres(template: &StyleTemplate, window: &FeatureWindow) -> Vec<String> {
    SUB_GENRE_RULES
        .iter()
        .filter(|r| r.style == template.name)
        .filter(|r| match (metric_value(window, r.metric), r.compare) {
            (Some(v), Above(t)) => v > t,
            (Some(v), Below(t)) => v < t,
            (None, _) => false,
        })
        .map(|r| r.label.to_string())
        .collect()
}

/// Tempo, spectral, energy, balance and percussion remarks, in that order
fn descriptive_remarks(window: &FeatureWindow) -> Vec<String> {
    let mut remarks = Vec::new();

    if window.has_measured_tempo() {
        let bpm = window.tempo_bpm.round() as i32;
        remarks.push(match window.tempo_bpm {
            t if t < 90.0 => format!("Relaxed tempo around {} BPM", bpm),
            t if t < 120.0 => format!("Steady mid-tempo groove at {} BPM", bpm),
            t if t < 140.0 => format!("Energetic pulse at {} BPM", bpm),
            _ => format!("High-speed drive at {} BPM", bpm),
        });
    }

    if window.has(ScalarFeature::SpectralFlatness) {
        let flatness = window.mean(ScalarFeature::SpectralFlatness);
        remarks.push(
            if flatness < 0.15 {
                "Clean, tonal sound"
            } else if flatness < 0.35 {
                "Mix of tonal and noisy textures"
            } else {
                "Gritty, noise-driven textures"
            }
            .to_string(),
        );
    }

    if window.has(ScalarFeature::SpectralCentroid) {
        let centroid = window.mean(ScalarFeature::SpectralCentroid);
        remarks.push(
            if centroid < 1200.0 {
                "Dark, warm timbre"
            } else if centroid < 2500.0 {
                "Balanced tonal color"
            } else {
                "Bright, crisp highs"
            }
            .to_string(),
        );
    }

    if window.has(ScalarFeature::Rms) {
        let rms = window.mean(ScalarFeature::Rms);
        remarks.push(
            if rms > 0.6 {
                "High-energy, loud mix"
            } else if rms > 0.25 {
                "Moderate energy level"
            } else {
                "Quiet, delicate dynamics"
            }
            .to_string(),
        );
    }

    if window.has(ScalarFeature::VoiceProbability) {
        let voice = window.mean(ScalarFeature::VoiceProbability);
        remarks.push(if voice > DOMINANT_RATIO {
            "Vocals front and center".to_string()
        } else if voice < INSTRUMENTAL_VOICE {
            match &window.dominant_instrument {
                Some(instrument) => format!("Instrumental, led by {}", instrument),
                None => "Mostly instrumental".to_string(),
            }
        } else {
            "Blend of vocals and instruments".to_string()
        });
    } else if let Some(instrument) = &window.dominant_instrument {
        remarks.push(format!("Featuring {}", instrument));
    }

    if window.has(ScalarFeature::PercussiveRatio)
        && window.mean(ScalarFeature::PercussiveRatio) > DOMINANT_RATIO
    {
        remarks.push("Punchy, percussion-forward rhythm".to_string());
    }

    remarks
}

#[cfg(test)]
#[path = "classifier_tests.rs"]
mod tests;
