//! Provider payload normalization.
//!
//! Voice, facial and anamnesis providers each report their own field names.
//! This adapter is the only place those names are known: every alias is
//! resolved here through a versioned table, so the correlation engine only
//! ever sees canonical [`ModalityData`].

use crate::fusion::modality::{
    unit, AnamnesisData, Channel, EmotionalState, FacialData, ModalityCommon, ModalityData,
    ModalitySet, Provenance, RespiratoryPattern, VoiceData, MID_RANGE,
    NEUTRAL_CONSISTENCY,
};
use crate::rppg::RppgReading;
use crate::triage::{TriageAnswers, UrgencyAssessment, UrgencyLevel};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

/// Version of the provider alias table.
pub const ALIAS_TABLE_VERSION: u32 = 2;

/// Heart rate assumed when a facial payload omits it.
const RESTING_HEART_RATE: f64 = 75.0;

/// Alias entry: canonical field and the names it may arrive under, in
/// resolution order.
type AliasEntry = (&'static str, &'static [&'static str]);

const COMMON_ALIASES: &[AliasEntry] = &[
    ("quality", &["quality", "signalQuality", "signal_quality", "qualidade"]),
    ("coherence", &["coherence", "coherenceScore", "coerencia"]),
    (
        "confidence",
        &["confidence", "confidenceScore", "confidence_score", "confianca"],
    ),
    ("timestamp", &["timestamp", "createdAt", "created_at", "analyzedAt"]),
    ("source", &["source", "provider", "origem"]),
];

const VOICE_ALIASES: &[AliasEntry] = &[
    ("stress_level", &["stressLevel", "stress_level", "stress", "nivelEstresse"]),
    (
        "emotional_state",
        &["emotionalState", "emotional_state", "emotion", "estadoEmocional"],
    ),
    (
        "respiratory_pattern",
        &[
            "respiratoryPattern",
            "respiratory_pattern",
            "breathingPattern",
            "padraoRespiratorio",
        ],
    ),
    ("speech_clarity", &["speechClarity", "speech_clarity", "clarity", "clarezaFala"]),
    ("audio_quality", &["audioQuality", "audio_quality", "qualidadeAudio"]),
];

const FACIAL_ALIASES: &[AliasEntry] = &[
    (
        "heart_rate",
        &["heartRate", "heart_rate", "bpm", "hr", "frequenciaCardiaca"],
    ),
    (
        "blood_pressure",
        &["bloodPressure", "blood_pressure", "pressaoArterial"],
    ),
    (
        "stress_indicators",
        &["stressIndicators", "stress_indicators", "facialStress", "stressLevel"],
    ),
    (
        "movement_stability",
        &["movementStability", "movement_stability", "stability"],
    ),
    (
        "lighting_quality",
        &["lightingQuality", "lighting_quality", "lighting", "iluminacao"],
    ),
];

const ANAMNESIS_ALIASES: &[AliasEntry] = &[
    (
        "symptom_severity",
        &["symptomSeverity", "symptom_severity", "severity", "gravidade"],
    ),
    (
        "urgency_level",
        &["urgencyLevel", "urgency_level", "nivelUrgencia", "urgency"],
    ),
    (
        "response_consistency",
        &["responseConsistency", "response_consistency", "consistency", "consistencia"],
    ),
    (
        "objectivity_score",
        &["objectivityScore", "objectivity_score", "objectivity", "objetividade"],
    ),
    ("completeness", &["completeness", "completude"]),
];

/// View of one provider payload through an alias table.
struct Payload<'a> {
    map: Option<&'a Map<String, Value>>,
    table: &'static [AliasEntry],
}

impl<'a> Payload<'a> {
    fn new(value: &'a Value, table: &'static [AliasEntry]) -> Self {
        Self {
            map: value.as_object(),
            table,
        }
    }

    fn get(&self, canonical: &str) -> Option<&'a Value> {
        let map = self.map?;
        let (_, aliases) = self
            .table
            .iter()
            .chain(COMMON_ALIASES.iter())
            .find(|(name, _)| *name == canonical)?;
        aliases
            .iter()
            .filter_map(|alias| map.get(*alias))
            .find(|value| !value.is_null())
    }

    fn number(&self, canonical: &str) -> Option<f64> {
        let value = self.get(canonical)?;
        let number = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }?;
        number.is_finite().then_some(number)
    }

    /// Bounded field, mid-range when absent.
    fn unit(&self, canonical: &str) -> f64 {
        self.number(canonical).map(unit).unwrap_or(MID_RANGE)
    }

    fn text(&self, canonical: &str) -> Option<String> {
        match self.get(canonical)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn common(&self) -> ModalityCommon {
        ModalityCommon {
            quality: self.unit("quality"),
            coherence: self.unit("coherence"),
            confidence: self.unit("confidence"),
            timestamp: self.timestamp().unwrap_or_else(Utc::now),
            source: self.provenance(),
        }
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self.get("timestamp")? {
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            Value::Number(n) => n
                .as_i64()
                .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
            _ => None,
        }
    }

    fn provenance(&self) -> Provenance {
        let Some(tag) = self.text("source") else {
            return Provenance::Primary;
        };
        match tag.trim().to_lowercase().as_str() {
            "primary" | "primario" | "primário" => Provenance::Primary,
            "secondary" | "secundario" | "secundário" | "backup" => Provenance::Secondary,
            "fallback" | "local" | "heuristic" | "default" => Provenance::Fallback,
            other => {
                tracing::debug!(source = other, "unknown provenance tag, assuming primary");
                Provenance::Primary
            }
        }
    }
}

/// Symptom severity implied by a categorical urgency label.
fn severity_from_urgency(value: &Value) -> Option<f64> {
    let label = value.as_str()?.trim().to_lowercase();
    match label.as_str() {
        "baixa" | "low" => Some(0.2),
        "média" | "media" | "medium" | "moderate" => Some(0.5),
        "alta" | "high" => Some(0.75),
        "crítica" | "critica" | "critical" => Some(0.95),
        _ => None,
    }
}

/// Maps provider payloads onto canonical [`ModalityData`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ModalityAdapter;

impl ModalityAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Version of the alias table this adapter resolves against.
    pub fn alias_version(&self) -> u32 {
        ALIAS_TABLE_VERSION
    }

    pub fn voice(&self, payload: &Value) -> VoiceData {
        let p = Payload::new(payload, VOICE_ALIASES);
        VoiceData {
            common: p.common(),
            stress_level: p.unit("stress_level"),
            emotional_state: p
                .text("emotional_state")
                .map(|t| EmotionalState::from_tag(&t))
                .unwrap_or_default(),
            respiratory_pattern: p
                .text("respiratory_pattern")
                .map(|t| RespiratoryPattern::from_tag(&t))
                .unwrap_or_default(),
            speech_clarity: p.unit("speech_clarity"),
            audio_quality: p.unit("audio_quality"),
        }
    }

    pub fn facial(&self, payload: &Value) -> FacialData {
        let p = Payload::new(payload, FACIAL_ALIASES);
        FacialData {
            common: p.common(),
            heart_rate: p
                .number("heart_rate")
                .map(|bpm| bpm.max(0.0))
                .unwrap_or(RESTING_HEART_RATE),
            blood_pressure: p.text("blood_pressure"),
            stress_indicators: p.unit("stress_indicators"),
            movement_stability: p.unit("movement_stability"),
            lighting_quality: p.unit("lighting_quality"),
        }
    }

    /// Anamnesis payload. A categorical urgency level stands in for symptom
    /// severity when severity itself is not reported.
    pub fn anamnesis(&self, payload: &Value) -> AnamnesisData {
        let p = Payload::new(payload, ANAMNESIS_ALIASES);
        let symptom_severity = p
            .number("symptom_severity")
            .map(unit)
            .or_else(|| p.get("urgency_level").and_then(severity_from_urgency))
            .unwrap_or(MID_RANGE);

        AnamnesisData {
            common: p.common(),
            symptom_severity,
            response_consistency: p
                .number("response_consistency")
                .map(unit)
                .unwrap_or(NEUTRAL_CONSISTENCY),
            objectivity_score: p.unit("objectivity_score"),
            completeness: p.unit("completeness"),
        }
    }

    pub fn adapt(&self, channel: Channel, payload: &Value) -> ModalityData {
        match channel {
            Channel::Voice => ModalityData::Voice(self.voice(payload)),
            Channel::Facial => ModalityData::Facial(self.facial(payload)),
            Channel::Anamnesis => ModalityData::Anamnesis(self.anamnesis(payload)),
        }
    }

    /// Adapt a combined payload with optional `voice`, `facial` and
    /// `anamnesis` objects.
    pub fn adapt_all(&self, payload: &Value) -> ModalitySet {
        let channel = |key: &str| payload.get(key).filter(|v| v.is_object());
        ModalitySet {
            voice: channel("voice").map(|v| self.voice(v)),
            facial: channel("facial").map(|v| self.facial(v)),
            anamnesis: channel("anamnesis").map(|v| self.anamnesis(v)),
        }
    }

    /// Facial channel from a local pulse reading.
    ///
    /// Stress is approximated by how far the pulse sits above a resting 60
    /// bpm, saturating at 120 bpm.
    pub fn facial_from_reading(&self, reading: &RppgReading) -> FacialData {
        let quality = reading.quality.score();
        FacialData {
            common: ModalityCommon {
                quality,
                coherence: if reading.motion_detected {
                    quality * 0.7
                } else {
                    quality
                },
                confidence: reading.confidence(),
                timestamp: reading.timestamp,
                source: Provenance::Primary,
            },
            heart_rate: reading.bpm,
            blood_pressure: None,
            stress_indicators: unit((reading.bpm - 60.0) / 60.0),
            movement_stability: if reading.motion_detected { 0.3 } else { 0.9 },
            lighting_quality: reading.lighting.score(),
        }
    }

    /// Anamnesis channel from a scored questionnaire.
    pub fn anamnesis_from_assessment(
        &self,
        assessment: &UrgencyAssessment,
        answers: &TriageAnswers,
    ) -> AnamnesisData {
        let completeness = answers.completeness();
        let response_consistency = unit(1.0 - 0.25 * answers.contradictions().len() as f64);

        // Numeric answers are less open to interpretation than yes/no ones.
        let numeric = [
            answers.pain_intensity.is_some(),
            answers.fever_temperature.is_some(),
        ];
        let objectivity_score =
            0.5 + 0.25 * numeric.iter().filter(|answered| **answered).count() as f64;

        let symptom_severity = match assessment.level {
            UrgencyLevel::Critica => unit(assessment.score as f64 / 100.0).max(0.8),
            _ => unit(assessment.score as f64 / 100.0),
        };

        AnamnesisData {
            common: ModalityCommon {
                quality: completeness,
                coherence: response_consistency,
                confidence: (completeness + response_consistency) / 2.0,
                timestamp: Utc::now(),
                source: Provenance::Primary,
            },
            symptom_severity,
            response_consistency,
            objectivity_score,
            completeness,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::CorrelationEngine;
    use crate::rppg::{LightingCondition, SignalQuality};
    use crate::triage::UrgencyScorer;
    use approx::assert_abs_diff_eq;
    use serde_json::json;

    #[test]
    fn test_voice_aliases() {
        let adapter = ModalityAdapter::new();
        let camel = adapter.voice(&json!({
            "stressLevel": 0.8,
            "audioQuality": 0.9,
            "emotionalState": "ansioso",
            "breathingPattern": "rapid"
        }));
        let snake = adapter.voice(&json!({
            "stress_level": 0.8,
            "audio_quality": 0.9,
            "emotional_state": "anxious",
            "respiratory_pattern": "rapid"
        }));

        assert_eq!(camel.stress_level, snake.stress_level);
        assert_eq!(camel.audio_quality, 0.9);
        assert_eq!(camel.emotional_state, EmotionalState::Anxious);
        assert_eq!(camel.respiratory_pattern, RespiratoryPattern::Rapid);
        assert_eq!(camel.speech_clarity, MID_RANGE);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let facial = ModalityAdapter::new().facial(&json!({
            "heartRate": "96",
            "lightingQuality": 1.4,
            "movementStability": -3,
            "confidence": "0.7"
        }));
        assert_eq!(facial.heart_rate, 96.0);
        assert_eq!(facial.lighting_quality, 1.0);
        assert_eq!(facial.movement_stability, 0.0);
        assert_eq!(facial.common.confidence, 0.7);
    }

    #[test]
    fn test_urgency_level_fallback() {
        let adapter = ModalityAdapter::new();
        for (key, label, expected) in [
            ("urgencyLevel", "alta", 0.75),
            ("urgency_level", "crítica", 0.95),
            ("nivelUrgencia", "baixa", 0.2),
            ("urgency", "medium", 0.5),
        ] {
            let data = adapter.anamnesis(&json!({ key: label }));
            assert_eq!(data.symptom_severity, expected, "{key}={label}");
        }

        let explicit = adapter.anamnesis(&json!({ "symptomSeverity": 0.3, "urgencyLevel": "alta" }));
        assert_eq!(explicit.symptom_severity, 0.3);
    }

    #[test]
    fn test_unreported_consistency_is_not_penalised() {
        let adapter = ModalityAdapter::new();
        let data = adapter.anamnesis(&json!({ "severity": 0.4 }));
        assert_eq!(data.response_consistency, NEUTRAL_CONSISTENCY);
        assert_eq!(data.objectivity_score, MID_RANGE);

        let result = CorrelationEngine::new().analyze(None, None, Some(&data));
        assert!(result.inconsistencies.is_empty());
        assert!(result.recommendations.is_empty());

        let reported = adapter.anamnesis(&json!({ "consistency": 0.4 }));
        assert_eq!(reported.response_consistency, 0.4);
    }

    #[test]
    fn test_provenance_tag() {
        let adapter = ModalityAdapter::new();
        assert_eq!(
            adapter.voice(&json!({ "provider": "fallback" })).common.source,
            Provenance::Fallback
        );
        assert_eq!(
            adapter.voice(&json!({ "source": "secondary" })).common.source,
            Provenance::Secondary
        );
        assert_eq!(adapter.voice(&json!({})).common.source, Provenance::Primary);
    }

    #[test]
    fn test_non_object_payload_is_mid_range() {
        let voice = ModalityAdapter::new().voice(&json!("garbage"));
        assert_eq!(voice.stress_level, MID_RANGE);
        assert_eq!(voice.common.quality, MID_RANGE);
    }

    #[test]
    fn test_adapt_all_skips_absent_channels() {
        let set = ModalityAdapter::new().adapt_all(&json!({
            "voice": { "stressLevel": 0.4 },
            "anamnesis": { "severity": 0.4 }
        }));
        assert!(set.voice.is_some());
        assert!(set.facial.is_none());
        assert!(set.anamnesis.is_some());
    }

    #[test]
    fn test_timestamp_parsing() {
        let data = ModalityAdapter::new().voice(&json!({ "timestamp": "2024-03-01T12:00:00Z" }));
        assert_eq!(data.common.timestamp.to_rfc3339(), "2024-03-01T12:00:00+00:00");
    }

    #[test]
    fn test_facial_from_reading() {
        let reading = RppgReading {
            bpm: 90.0,
            snr: 10.0,
            quality: SignalQuality::Excellent,
            timestamp: Utc::now(),
            motion_detected: false,
            lighting: LightingCondition::Good,
        };
        let facial = ModalityAdapter::new().facial_from_reading(&reading);
        assert_eq!(facial.heart_rate, 90.0);
        assert_abs_diff_eq!(facial.stress_indicators, 0.5, epsilon = 1e-12);
        assert_eq!(facial.common.confidence, 1.0);
        assert_eq!(facial.lighting_quality, 0.9);
    }

    #[test]
    fn test_anamnesis_from_assessment() {
        let answers = TriageAnswers::from_json(&json!({
            "breathing_difficulty": "no",
            "chest_pain": "no",
            "pain_intensity": 7,
            "fever": "no",
            "onset": "1-3 dias",
            "takes_medication": "no",
            "chronic_conditions": "no"
        }));
        let assessment = UrgencyScorer::new().score(&answers);
        let data = ModalityAdapter::new().anamnesis_from_assessment(&assessment, &answers);

        assert_abs_diff_eq!(data.symptom_severity, 0.6, epsilon = 1e-12);
        assert_eq!(data.completeness, 1.0);
        assert_eq!(data.response_consistency, 1.0);
        assert_eq!(data.objectivity_score, 0.75);
    }
}
