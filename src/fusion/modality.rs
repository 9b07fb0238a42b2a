//! Canonical per-channel data fed into the correlation engine.
//!
//! Every bounded field lives in `[0, 1]`. Heart rate is in bpm and blood
//! pressure is an opaque string. Values produced by [`ModalityAdapter`]
//! already satisfy these bounds; hand-built values are clamped by
//! [`normalized`](VoiceData::normalized) before the engine reads them.
//!
//! [`ModalityAdapter`]: crate::fusion::ModalityAdapter

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Default for bounded fields a provider did not report.
pub const MID_RANGE: f64 = 0.5;

/// Default questionnaire consistency when a provider did not report one.
///
/// Sits above the contradiction threshold: an unreported value is not
/// evidence of contradictory answers.
pub const NEUTRAL_CONSISTENCY: f64 = 0.75;

/// One of the three fused channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Voice,
    Facial,
    Anamnesis,
}

/// Set of channels, ordered for stable output.
pub type ChannelSet = BTreeSet<Channel>;

/// Which provider in a fallback chain produced a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    #[default]
    Primary,
    Secondary,
    Fallback,
}

impl Provenance {
    /// Weight multiplier applied when the engine weights by provenance.
    pub fn weight(self) -> f64 {
        match self {
            Provenance::Primary => 1.0,
            Provenance::Secondary => 0.85,
            Provenance::Fallback => 0.6,
        }
    }
}

/// Fields shared by every channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalityCommon {
    /// Signal quality of the channel
    pub quality: f64,
    /// Internal coherence of the channel's own measurements
    pub coherence: f64,
    /// Provider confidence in its output
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub source: Provenance,
}

impl Default for ModalityCommon {
    fn default() -> Self {
        Self {
            quality: MID_RANGE,
            coherence: MID_RANGE,
            confidence: MID_RANGE,
            timestamp: Utc::now(),
            source: Provenance::Primary,
        }
    }
}

impl ModalityCommon {
    fn normalized(&self) -> Self {
        Self {
            quality: unit(self.quality),
            coherence: unit(self.coherence),
            confidence: unit(self.confidence),
            timestamp: self.timestamp,
            source: self.source,
        }
    }
}

/// Emotional state tag reported by voice analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionalState {
    Calm,
    #[default]
    Neutral,
    Anxious,
    Stressed,
    Distressed,
    #[serde(other)]
    Unknown,
}

impl EmotionalState {
    /// Parse a provider tag, accepting English and Portuguese labels.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "calm" | "calmo" | "calma" | "relaxed" => EmotionalState::Calm,
            "neutral" | "neutro" => EmotionalState::Neutral,
            "anxious" | "ansioso" | "ansiosa" | "nervous" => EmotionalState::Anxious,
            "stressed" | "estressado" | "estressada" | "tense" => EmotionalState::Stressed,
            "distressed" | "angustiado" | "angustiada" | "panic" => EmotionalState::Distressed,
            _ => EmotionalState::Unknown,
        }
    }
}

/// Breathing pattern tag reported by voice analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RespiratoryPattern {
    #[default]
    Normal,
    Rapid,
    Shallow,
    Irregular,
    Labored,
    #[serde(other)]
    Unknown,
}

impl RespiratoryPattern {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "normal" => RespiratoryPattern::Normal,
            "rapid" | "fast" | "rapida" | "rápida" | "acelerada" => RespiratoryPattern::Rapid,
            "shallow" | "superficial" => RespiratoryPattern::Shallow,
            "irregular" => RespiratoryPattern::Irregular,
            "labored" | "laboured" | "difficult" | "dificil" | "difícil" => {
                RespiratoryPattern::Labored
            }
            _ => RespiratoryPattern::Unknown,
        }
    }
}

/// Voice/speech channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceData {
    #[serde(flatten)]
    pub common: ModalityCommon,
    pub stress_level: f64,
    pub emotional_state: EmotionalState,
    pub respiratory_pattern: RespiratoryPattern,
    pub speech_clarity: f64,
    pub audio_quality: f64,
}

impl Default for VoiceData {
    fn default() -> Self {
        Self::mid_range()
    }
}

impl VoiceData {
    /// Mid-range voice data, the baseline for partially reported payloads.
    pub fn mid_range() -> Self {
        Self {
            common: ModalityCommon::default(),
            stress_level: MID_RANGE,
            emotional_state: EmotionalState::default(),
            respiratory_pattern: RespiratoryPattern::default(),
            speech_clarity: MID_RANGE,
            audio_quality: MID_RANGE,
        }
    }

    /// Copy with every bounded field clamped into `[0, 1]`.
    pub fn normalized(&self) -> Self {
        Self {
            common: self.common.normalized(),
            stress_level: unit(self.stress_level),
            emotional_state: self.emotional_state,
            respiratory_pattern: self.respiratory_pattern,
            speech_clarity: unit(self.speech_clarity),
            audio_quality: unit(self.audio_quality),
        }
    }
}

/// Facial/video channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacialData {
    #[serde(flatten)]
    pub common: ModalityCommon,
    /// Beats per minute
    pub heart_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_pressure: Option<String>,
    pub stress_indicators: f64,
    pub movement_stability: f64,
    pub lighting_quality: f64,
}

impl Default for FacialData {
    fn default() -> Self {
        Self::mid_range()
    }
}

impl FacialData {
    /// Mid-range facial data at a resting heart rate.
    pub fn mid_range() -> Self {
        Self {
            common: ModalityCommon::default(),
            heart_rate: 75.0,
            blood_pressure: None,
            stress_indicators: MID_RANGE,
            movement_stability: MID_RANGE,
            lighting_quality: MID_RANGE,
        }
    }

    pub fn normalized(&self) -> Self {
        Self {
            common: self.common.normalized(),
            heart_rate: if self.heart_rate.is_finite() {
                self.heart_rate.max(0.0)
            } else {
                0.0
            },
            blood_pressure: self.blood_pressure.clone(),
            stress_indicators: unit(self.stress_indicators),
            movement_stability: unit(self.movement_stability),
            lighting_quality: unit(self.lighting_quality),
        }
    }
}

/// Structured questionnaire channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnamnesisData {
    #[serde(flatten)]
    pub common: ModalityCommon,
    pub symptom_severity: f64,
    pub response_consistency: f64,
    pub objectivity_score: f64,
    pub completeness: f64,
}

impl Default for AnamnesisData {
    fn default() -> Self {
        Self::mid_range()
    }
}

impl AnamnesisData {
    pub fn mid_range() -> Self {
        Self {
            common: ModalityCommon::default(),
            symptom_severity: MID_RANGE,
            response_consistency: NEUTRAL_CONSISTENCY,
            objectivity_score: MID_RANGE,
            completeness: MID_RANGE,
        }
    }

    pub fn normalized(&self) -> Self {
        Self {
            common: self.common.normalized(),
            symptom_severity: unit(self.symptom_severity),
            response_consistency: unit(self.response_consistency),
            objectivity_score: unit(self.objectivity_score),
            completeness: unit(self.completeness),
        }
    }
}

/// Channel-tagged modality value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum ModalityData {
    Voice(VoiceData),
    Facial(FacialData),
    Anamnesis(AnamnesisData),
}

impl ModalityData {
    pub fn channel(&self) -> Channel {
        match self {
            ModalityData::Voice(_) => Channel::Voice,
            ModalityData::Facial(_) => Channel::Facial,
            ModalityData::Anamnesis(_) => Channel::Anamnesis,
        }
    }

    pub fn common(&self) -> &ModalityCommon {
        match self {
            ModalityData::Voice(v) => &v.common,
            ModalityData::Facial(f) => &f.common,
            ModalityData::Anamnesis(a) => &a.common,
        }
    }
}

/// Up to one value per channel, as consumed by the correlation engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModalitySet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facial: Option<FacialData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anamnesis: Option<AnamnesisData>,
}

impl ModalitySet {
    /// Insert a value, replacing any earlier value for the same channel.
    pub fn insert(&mut self, data: ModalityData) {
        match data {
            ModalityData::Voice(v) => self.voice = Some(v),
            ModalityData::Facial(f) => self.facial = Some(f),
            ModalityData::Anamnesis(a) => self.anamnesis = Some(a),
        }
    }

    /// Channels present in the set.
    pub fn channels(&self) -> ChannelSet {
        let mut channels = ChannelSet::new();
        if self.voice.is_some() {
            channels.insert(Channel::Voice);
        }
        if self.facial.is_some() {
            channels.insert(Channel::Facial);
        }
        if self.anamnesis.is_some() {
            channels.insert(Channel::Anamnesis);
        }
        channels
    }

    pub fn is_empty(&self) -> bool {
        self.voice.is_none() && self.facial.is_none() && self.anamnesis.is_none()
    }
}

impl FromIterator<ModalityData> for ModalitySet {
    fn from_iter<I: IntoIterator<Item = ModalityData>>(iter: I) -> Self {
        let mut set = ModalitySet::default();
        for data in iter {
            set.insert(data);
        }
        set
    }
}

/// Clamp into `[0, 1]`, mapping non-finite input to the worst end.
pub(crate) fn unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
