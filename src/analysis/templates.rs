// Style templates - the fixed catalog the classifier scores against
//
// Ranges are inclusive. Tempo in BPM, centroid in Hz, zcr as crossings per
// sample, all ratios in [0, 1], contrast in dB.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Range {
    pub min: f32,
    pub max: f32,
}

impl Range {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StyleTemplate {
    /// Machine label, used as the base of compound labels
    pub name: &'static str,
    pub display_name: &'static str,
    pub tempo: Range,
    pub rms: Range,
    pub centroid: Range,
    pub zcr: Range,
    /// Flatness must stay below this
    pub flatness_max: f32,
    /// First contrast band must exceed this
    pub contrast_min: f32,
    pub voice: Option<Range>,
    pub percussive: Option<Range>,
    pub harmonic: Option<Range>,
    /// Whether a low voice probability yields an `_instrumental` label
    pub instrumental_suffix: bool,
    /// Whether a high harmonic ratio yields a `_harmonic` label
    pub harmonic_suffix: bool,
    pub keywords: &'static [&'static str],
}

pub const STYLE_TEMPLATES: &[StyleTemplate] = &[
    StyleTemplate {
        name: "techno",
        display_name: "Techno",
        tempo: Range::new(120.0, 150.0),
        rms: Range::new(0.5, 1.0),
        centroid: Range::new(1500.0, 3500.0),
        zcr: Range::new(0.02, 0.15),
        flatness_max: 0.45,
        contrast_min: 12.0,
        voice: Some(Range::new(0.0, 0.3)),
        percussive: Some(Range::new(0.5, 1.0)),
        harmonic: None,
        instrumental_suffix: true,
        harmonic_suffix: false,
        keywords: &["Driving four-on-the-floor kick", "Hypnotic looping synths"],
    },
    StyleTemplate {
        name: "house",
        display_name: "House",
        tempo: Range::new(115.0, 130.0),
        rms: Range::new(0.4, 0.9),
        centroid: Range::new(1200.0, 3000.0),
        zcr: Range::new(0.02, 0.12),
        flatness_max: 0.4,
        contrast_min: 10.0,
        voice: Some(Range::new(0.3, 0.8)),
        percussive: Some(Range::new(0.4, 0.8)),
        harmonic: None,
        instrumental_suffix: false,
        harmonic_suffix: false,
        keywords: &["Soulful four-on-the-floor groove", "Warm chord stabs"],
    },
    StyleTemplate {
        name: "trance",
        display_name: "Trance",
        tempo: Range::new(130.0, 145.0),
        rms: Range::new(0.5, 0.95),
        centroid: Range::new(2000.0, 4500.0),
        zcr: Range::new(0.03, 0.15),
        flatness_max: 0.35,
        contrast_min: 10.0,
        voice: None,
        percussive: None,
        harmonic: Some(Range::new(0.5, 1.0)),
        instrumental_suffix: true,
        harmonic_suffix: false,
        keywords: &["Euphoric build-ups", "Soaring synth leads"],
    },
    StyleTemplate {
        name: "drum_and_bass",
        display_name: "Drum & Bass",
        tempo: Range::new(160.0, 180.0),
        rms: Range::new(0.5, 1.0),
        centroid: Range::new(1800.0, 4500.0),
        zcr: Range::new(0.04, 0.2),
        flatness_max: 0.5,
        contrast_min: 14.0,
        voice: None,
        percussive: Some(Range::new(0.5, 1.0)),
        harmonic: None,
        instrumental_suffix: false,
        harmonic_suffix: false,
        keywords: &["Rapid breakbeat rhythms", "Deep rolling sub-bass"],
    },
    StyleTemplate {
        name: "rock",
        display_name: "Rock",
        tempo: Range::new(100.0, 150.0),
        rms: Range::new(0.5, 0.95),
        centroid: Range::new(1500.0, 3500.0),
        zcr: Range::new(0.05, 0.18),
        flatness_max: 0.35,
        contrast_min: 15.0,
        voice: Some(Range::new(0.3, 0.9)),
        percussive: None,
        harmonic: None,
        instrumental_suffix: false,
        harmonic_suffix: false,
        keywords: &["Distorted guitar riffs", "Live drum kit energy"],
    },
    StyleTemplate {
        name: "pop",
        display_name: "Pop",
        tempo: Range::new(95.0, 130.0),
        rms: Range::new(0.4, 0.85),
        centroid: Range::new(1500.0, 3200.0),
        zcr: Range::new(0.03, 0.14),
        flatness_max: 0.3,
        contrast_min: 10.0,
        voice: Some(Range::new(0.5, 1.0)),
        percussive: None,
        harmonic: None,
        instrumental_suffix: false,
        harmonic_suffix: false,
        keywords: &["Catchy vocal hooks", "Polished radio-ready production"],
    },
    StyleTemplate {
        name: "jazz",
        display_name: "Jazz",
        tempo: Range::new(70.0, 140.0),
        rms: Range::new(0.1, 0.6),
        centroid: Range::new(800.0, 2500.0),
        zcr: Range::new(0.02, 0.1),
        flatness_max: 0.25,
        contrast_min: 8.0,
        voice: None,
        percussive: None,
        harmonic: Some(Range::new(0.5, 1.0)),
        instrumental_suffix: true,
        harmonic_suffix: false,
        keywords: &["Improvised solos", "Swinging rhythm section"],
    },
    StyleTemplate {
        name: "classical",
        display_name: "Classical",
        tempo: Range::new(60.0, 120.0),
        rms: Range::new(0.05, 0.5),
        centroid: Range::new(500.0, 2200.0),
        zcr: Range::new(0.015, 0.08),
        flatness_max: 0.2,
        contrast_min: 6.0,
        voice: Some(Range::new(0.0, 0.3)),
        percussive: None,
        harmonic: Some(Range::new(0.6, 1.0)),
        instrumental_suffix: true,
        harmonic_suffix: true,
        keywords: &["Orchestral dynamics", "Rich harmonic textures"],
    },
    StyleTemplate {
        name: "hip_hop",
        display_name: "Hip-Hop",
        tempo: Range::new(70.0, 105.0),
        rms: Range::new(0.5, 0.95),
        centroid: Range::new(1000.0, 2800.0),
        zcr: Range::new(0.03, 0.12),
        flatness_max: 0.35,
        contrast_min: 12.0,
        voice: Some(Range::new(0.5, 1.0)),
        percussive: Some(Range::new(0.4, 0.9)),
        harmonic: None,
        instrumental_suffix: false,
        harmonic_suffix: false,
        keywords: &["Heavy boom-bap beats", "Rhythmic vocal delivery"],
    },
    StyleTemplate {
        name: "metal",
        display_name: "Metal",
        tempo: Range::new(100.0, 180.0),
        rms: Range::new(0.7, 1.0),
        centroid: Range::new(2500.0, 5500.0),
        zcr: Range::new(0.1, 0.3),
        flatness_max: 0.6,
        contrast_min: 16.0,
        voice: None,
        percussive: Some(Range::new(0.4, 0.9)),
        harmonic: None,
        instrumental_suffix: false,
        harmonic_suffix: false,
        keywords: &["Down-tuned heavy riffs", "Relentless double-kick drums"],
    },
    StyleTemplate {
        name: "ambient",
        display_name: "Ambient",
        tempo: Range::new(60.0, 100.0),
        rms: Range::new(0.0, 0.3),
        centroid: Range::new(300.0, 2000.0),
        zcr: Range::new(0.0, 0.06),
        flatness_max: 0.3,
        contrast_min: 4.0,
        voice: None,
        percussive: Some(Range::new(0.0, 0.3)),
        harmonic: Some(Range::new(0.6, 1.0)),
        instrumental_suffix: true,
        harmonic_suffix: true,
        keywords: &["Evolving soundscapes", "Spacious atmospheric pads"],
    },
];

pub fn find_template(name: &str) -> Option<&'static StyleTemplate> {
    STYLE_TEMPLATES.iter().find(|t| t.name == name)
}
