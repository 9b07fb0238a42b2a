//! Cross-modal correlation and reliability scoring.
//!
//! [`CorrelationEngine::analyze`] takes up to one value per channel and
//! produces a [`CorrelationResult`]:
//!
//! 1. Every inconsistency rule that applies fires, each carrying a negative
//!    impact on reliability.
//! 2. Agreement rules award bonuses. A rule only runs when all the channels
//!    it compares are present.
//! 3. Channel confidences are averaged, weighted by quality, coherence and a
//!    channel-specific modifier.
//! 4. Reliability is that average plus impacts and bonuses, clamped to
//!    `[0.1, 0.95]`.
//!
//! The engine holds no state between calls.

use crate::fusion::modality::{
    AnamnesisData, Channel, ChannelSet, FacialData, ModalityCommon, ModalitySet, VoiceData,
};
use serde::{Deserialize, Serialize};

/// Lowest reliability ever reported.
pub const MIN_RELIABILITY: f64 = 0.1;
/// Highest reliability ever reported.
pub const MAX_RELIABILITY: f64 = 0.95;

/// Plausible heart-rate range for a conscious adult, in bpm.
const HEART_RATE_RANGE: (f64, f64) = (40.0, 180.0);

/// Factor strength from which a factor counts as strong.
const STRONG_FACTOR: f64 = 0.7;

/// Category of an inconsistency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InconsistencyKind {
    CrossModal,
    Temporal,
    Physiological,
    Behavioral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Rule that raised an inconsistency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InconsistencyCode {
    StressedVoiceCalmPulse,
    CalmVoiceRacingPulse,
    PoorAudio,
    PoorLighting,
    ImplausibleHeartRate,
    InconsistentResponses,
    SevereSymptomsWithoutStress,
    UnstableMovement,
    LowObjectivity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inconsistency {
    pub code: InconsistencyCode,
    pub kind: InconsistencyKind,
    pub severity: Severity,
    pub description: String,
    pub affected_channels: ChannelSet,
    /// Reliability adjustment in `[-0.3, 0]`
    pub impact_on_reliability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Positive,
    Negative,
}

/// Rule that raised a correlation factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorCode {
    StressCoherence,
    TriModalConsistency,
    HighDataQuality,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationFactor {
    pub code: FactorCode,
    pub polarity: Polarity,
    pub name: String,
    /// Strength in `[0, 1]`
    pub strength: f64,
    pub description: String,
    /// Reliability adjustment in `[-0.2, 0.2]`
    pub reliability_bonus: f64,
}

/// Categorical summary of the reliability score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl TrustLevel {
    pub fn label(self) -> &'static str {
        match self {
            TrustLevel::VeryLow => "very_low",
            TrustLevel::Low => "low",
            TrustLevel::Medium => "medium",
            TrustLevel::High => "high",
            TrustLevel::VeryHigh => "very_high",
        }
    }
}

impl std::fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Map a reliability score onto a trust level. Lower bounds are inclusive.
pub fn determine_trust_level(reliability: f64) -> TrustLevel {
    if reliability >= 0.90 {
        TrustLevel::VeryHigh
    } else if reliability >= 0.80 {
        TrustLevel::High
    } else if reliability >= 0.65 {
        TrustLevel::Medium
    } else if reliability >= 0.50 {
        TrustLevel::Low
    } else {
        TrustLevel::VeryLow
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub weighted_confidence: f64,
    /// Always within `[0.1, 0.95]`
    pub reliability_score: f64,
    pub inconsistencies: Vec<Inconsistency>,
    pub correlation_factors: Vec<CorrelationFactor>,
    pub recommendations: Vec<String>,
    pub trust_level: TrustLevel,
    /// Channels that were present in the input
    pub channels: ChannelSet,
}

impl CorrelationResult {
    pub fn has_critical_inconsistency(&self) -> bool {
        self.inconsistencies
            .iter()
            .any(|i| i.severity == Severity::Critical)
    }

    pub fn strong_factor_count(&self) -> usize {
        self.correlation_factors
            .iter()
            .filter(|f| f.strength >= STRONG_FACTOR)
            .count()
    }
}

/// Stateless cross-modal correlation engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrelationEngine {
    provenance_weighting: bool,
}

impl CorrelationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine that also scales each channel's weight by its provenance.
    pub fn weighted_by_provenance() -> Self {
        Self {
            provenance_weighting: true,
        }
    }

    pub fn analyze(
        &self,
        voice: Option<&VoiceData>,
        facial: Option<&FacialData>,
        anamnesis: Option<&AnamnesisData>,
    ) -> CorrelationResult {
        // Clamp at the boundary so every rule sees in-range values.
        let voice = voice.map(VoiceData::normalized);
        let facial = facial.map(FacialData::normalized);
        let anamnesis = anamnesis.map(AnamnesisData::normalized);
        let (voice, facial, anamnesis) = (voice.as_ref(), facial.as_ref(), anamnesis.as_ref());

        let inconsistencies = detect_inconsistencies(voice, facial, anamnesis);
        let correlation_factors = detect_factors(voice, facial, anamnesis);
        let weighted_confidence = self.weighted_confidence(voice, facial, anamnesis);

        let impact: f64 = inconsistencies
            .iter()
            .map(|i| i.impact_on_reliability)
            .sum();
        let bonus: f64 = correlation_factors
            .iter()
            .map(|f| f.reliability_bonus)
            .sum();
        let raw = weighted_confidence + impact + bonus;
        let reliability_score = if raw.is_nan() {
            MIN_RELIABILITY
        } else {
            raw.clamp(MIN_RELIABILITY, MAX_RELIABILITY)
        };

        let mut channels = ChannelSet::new();
        if voice.is_some() {
            channels.insert(Channel::Voice);
        }
        if facial.is_some() {
            channels.insert(Channel::Facial);
        }
        if anamnesis.is_some() {
            channels.insert(Channel::Anamnesis);
        }

        let mut result = CorrelationResult {
            weighted_confidence,
            reliability_score,
            inconsistencies,
            correlation_factors,
            recommendations: Vec::new(),
            trust_level: determine_trust_level(reliability_score),
            channels,
        };
        result.recommendations = recommendations(&result);

        tracing::debug!(
            reliability = result.reliability_score,
            trust = %result.trust_level,
            inconsistencies = result.inconsistencies.len(),
            factors = result.correlation_factors.len(),
            "correlation analysed"
        );
        result
    }

    pub fn analyze_set(&self, set: &ModalitySet) -> CorrelationResult {
        self.analyze(set.voice.as_ref(), set.facial.as_ref(), set.anamnesis.as_ref())
    }

    fn weighted_confidence(
        &self,
        voice: Option<&VoiceData>,
        facial: Option<&FacialData>,
        anamnesis: Option<&AnamnesisData>,
    ) -> f64 {
        let channels = [
            voice.map(|v| (&v.common, v.audio_quality)),
            facial.map(|f| (&f.common, f.lighting_quality)),
            anamnesis.map(|a| (&a.common, a.response_consistency)),
        ];

        let (mut numerator, mut denominator) = (0.0, 0.0);
        for (common, modifier) in channels.into_iter().flatten() {
            let weight = self.weight(common, modifier);
            numerator += common.confidence * weight;
            denominator += weight;
        }

        if denominator > 0.0 {
            numerator / denominator
        } else {
            0.0
        }
    }

    fn weight(&self, common: &ModalityCommon, modifier: f64) -> f64 {
        let weight = common.quality * common.coherence * modifier;
        if self.provenance_weighting {
            weight * common.source.weight()
        } else {
            weight
        }
    }
}

fn channels(list: &[Channel]) -> ChannelSet {
    list.iter().copied().collect()
}

fn inconsistency(
    code: InconsistencyCode,
    kind: InconsistencyKind,
    severity: Severity,
    description: impl Into<String>,
    affected: &[Channel],
    impact: f64,
) -> Inconsistency {
    Inconsistency {
        code,
        kind,
        severity,
        description: description.into(),
        affected_channels: channels(affected),
        impact_on_reliability: impact,
    }
}

fn detect_inconsistencies(
    voice: Option<&VoiceData>,
    facial: Option<&FacialData>,
    anamnesis: Option<&AnamnesisData>,
) -> Vec<Inconsistency> {
    use Channel::*;
    use InconsistencyCode::*;
    use InconsistencyKind::*;

    let mut found = Vec::new();

    if let (Some(v), Some(f)) = (voice, facial) {
        if v.stress_level > 0.7 && f.heart_rate < 70.0 {
            found.push(inconsistency(
                StressedVoiceCalmPulse,
                CrossModal,
                Severity::Medium,
                format!(
                    "Voz indica estresse elevado ({:.2}) com frequência cardíaca baixa ({:.0} bpm)",
                    v.stress_level, f.heart_rate
                ),
                &[Voice, Facial],
                -0.08,
            ));
        }
        if v.stress_level < 0.3 && f.heart_rate > 110.0 {
            found.push(inconsistency(
                CalmVoiceRacingPulse,
                CrossModal,
                Severity::Medium,
                format!(
                    "Voz calma ({:.2}) com frequência cardíaca elevada ({:.0} bpm)",
                    v.stress_level, f.heart_rate
                ),
                &[Voice, Facial],
                -0.08,
            ));
        }
    }

    if let Some(v) = voice {
        if v.audio_quality < 0.4 {
            found.push(inconsistency(
                PoorAudio,
                Physiological,
                Severity::High,
                "Qualidade de áudio insuficiente para análise vocal confiável",
                &[Voice],
                -0.12,
            ));
        }
    }

    if let Some(f) = facial {
        if f.lighting_quality < 0.4 {
            found.push(inconsistency(
                PoorLighting,
                Physiological,
                Severity::High,
                "Iluminação inadequada compromete a leitura facial",
                &[Facial],
                -0.10,
            ));
        }
        let (low, high) = HEART_RATE_RANGE;
        if f.heart_rate < low || f.heart_rate > high {
            found.push(inconsistency(
                ImplausibleHeartRate,
                Physiological,
                Severity::Critical,
                format!(
                    "Frequência cardíaca fora da faixa fisiológica ({:.0} bpm)",
                    f.heart_rate
                ),
                &[Facial],
                -0.25,
            ));
        }
    }

    if let Some(a) = anamnesis {
        if a.response_consistency < 0.6 {
            found.push(inconsistency(
                InconsistentResponses,
                Behavioral,
                Severity::High,
                "Respostas do questionário apresentam contradições",
                &[Anamnesis],
                -0.15,
            ));
        }
    }

    if let (Some(v), Some(f), Some(a)) = (voice, facial, anamnesis) {
        if a.symptom_severity > 0.8 && v.stress_level < 0.2 && f.stress_indicators < 0.2 {
            found.push(inconsistency(
                SevereSymptomsWithoutStress,
                CrossModal,
                Severity::High,
                "Sintomas relatados como graves sem sinais de estresse na voz ou na face",
                &[Voice, Facial, Anamnesis],
                -0.10,
            ));
        }
    }

    if let Some(f) = facial {
        if f.movement_stability < 0.5 {
            found.push(inconsistency(
                UnstableMovement,
                Temporal,
                Severity::Low,
                "Movimentação excessiva durante a captura facial",
                &[Facial],
                -0.05,
            ));
        }
    }

    if let Some(a) = anamnesis {
        if a.objectivity_score < 0.4 {
            found.push(inconsistency(
                LowObjectivity,
                Behavioral,
                Severity::Medium,
                "Respostas pouco objetivas no questionário",
                &[Anamnesis],
                -0.06,
            ));
        }
    }

    found
}

fn detect_factors(
    voice: Option<&VoiceData>,
    facial: Option<&FacialData>,
    anamnesis: Option<&AnamnesisData>,
) -> Vec<CorrelationFactor> {
    let mut found = Vec::new();

    if let (Some(v), Some(f)) = (voice, facial) {
        let difference = (v.stress_level - f.stress_indicators).abs();
        if difference < 0.2 {
            let strength = (1.0 - 5.0 * difference).clamp(0.0, 1.0);
            found.push(CorrelationFactor {
                code: FactorCode::StressCoherence,
                polarity: Polarity::Positive,
                name: "Coerência de estresse".to_string(),
                strength,
                description: "Nível de estresse vocal consistente com os indicadores faciais"
                    .to_string(),
                reliability_bonus: 0.1 * strength,
            });
        }
    }

    if let (Some(v), Some(f), Some(a)) = (voice, facial, anamnesis) {
        let signals = [v.stress_level, f.stress_indicators, a.symptom_severity];
        let mean = signals.iter().sum::<f64>() / signals.len() as f64;
        let spread = signals
            .iter()
            .map(|s| (s - mean).abs())
            .fold(0.0, f64::max);
        if spread <= 0.1 {
            let strength = (1.0 - 5.0 * spread).clamp(0.0, 1.0);
            found.push(CorrelationFactor {
                code: FactorCode::TriModalConsistency,
                polarity: Polarity::Positive,
                name: "Consistência tri-modal".to_string(),
                strength,
                description: "Voz, face e questionário indicam o mesmo nível de gravidade"
                    .to_string(),
                reliability_bonus: 0.15,
            });
        }
    }

    if let (Some(v), Some(f)) = (voice, facial) {
        if v.audio_quality > 0.8 && f.lighting_quality > 0.8 {
            found.push(CorrelationFactor {
                code: FactorCode::HighDataQuality,
                polarity: Polarity::Positive,
                name: "Alta qualidade dos dados".to_string(),
                strength: v.audio_quality.min(f.lighting_quality),
                description: "Áudio e iluminação com qualidade elevada".to_string(),
                reliability_bonus: 0.05,
            });
        }
    }

    found
}

fn recommendations(result: &CorrelationResult) -> Vec<String> {
    let has = |code: InconsistencyCode| result.inconsistencies.iter().any(|i| i.code == code);
    let mut out = Vec::new();

    if result.has_critical_inconsistency() {
        out.push(
            "Inconsistência crítica detectada: repita a medição antes de considerar o resultado."
                .to_string(),
        );
    }
    if has(InconsistencyCode::PoorAudio) {
        out.push(
            "Melhore a qualidade do áudio: grave em ambiente silencioso, próximo ao microfone."
                .to_string(),
        );
    }
    if has(InconsistencyCode::PoorLighting) {
        out.push(
            "Melhore a iluminação: posicione-se de frente para uma fonte de luz uniforme."
                .to_string(),
        );
    }
    if result.strong_factor_count() >= 2 {
        out.push(
            "Múltiplas modalidades concordam entre si: os dados apresentam alta consistência."
                .to_string(),
        );
    }
    if has(InconsistencyCode::InconsistentResponses) {
        out.push("Revise as respostas do questionário: há contradições entre elas.".to_string());
    }

    out
}
