//! Manchester-style urgency scoring.
//!
//! Scoring is deterministic and does not depend on the order answers arrive
//! in. Independent severity signals are combined with `max`, not summed, so
//! correlated symptoms are not counted twice.

use crate::triage::answers::TriageAnswers;
use serde::{Deserialize, Serialize};

/// Score assigned when breathing difficulty and chest pain co-occur.
const OVERRIDE_SCORE: u8 = 100;
const BREATHING_SCORE: u8 = 90;
const CHEST_PAIN_SCORE: u8 = 70;
const FEVER_SCORE: u8 = 30;
const HIGH_FEVER_SCORE: u8 = 50;
/// Temperature from which fever scores as high, in °C.
const HIGH_FEVER_C: f64 = 39.0;
/// Acute onset adds this much once the score is already above `ACUTE_FLOOR`.
const ACUTE_ESCALATION: u8 = 15;
const ACUTE_FLOOR: u8 = 40;

/// Urgency tier, most urgent last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UrgencyLevel {
    #[serde(rename = "baixa")]
    Baixa,
    #[serde(rename = "média")]
    Media,
    #[serde(rename = "alta")]
    Alta,
    #[serde(rename = "crítica")]
    Critica,
}

impl UrgencyLevel {
    /// Tier for a score in `[0, 100]`.
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => UrgencyLevel::Critica,
            60..=79 => UrgencyLevel::Alta,
            40..=59 => UrgencyLevel::Media,
            _ => UrgencyLevel::Baixa,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            UrgencyLevel::Baixa => "baixa",
            UrgencyLevel::Media => "média",
            UrgencyLevel::Alta => "alta",
            UrgencyLevel::Critica => "crítica",
        }
    }

    /// Manchester color band.
    pub fn color(self) -> &'static str {
        match self {
            UrgencyLevel::Critica => "vermelho",
            UrgencyLevel::Alta => "laranja",
            UrgencyLevel::Media => "amarelo",
            UrgencyLevel::Baixa => "verde",
        }
    }

    /// Longest recommended wait before being seen.
    pub fn max_wait_minutes(self) -> u32 {
        match self {
            UrgencyLevel::Critica => 0,
            UrgencyLevel::Alta => 10,
            UrgencyLevel::Media => 60,
            UrgencyLevel::Baixa => 120,
        }
    }

    /// Queue priority, 1 is seen first.
    pub fn priority(self) -> u8 {
        match self {
            UrgencyLevel::Critica => 1,
            UrgencyLevel::Alta => 2,
            UrgencyLevel::Media => 3,
            UrgencyLevel::Baixa => 4,
        }
    }

    fn recommendations(self) -> &'static [&'static str] {
        match self {
            UrgencyLevel::Critica => &[
                "Procure atendimento de emergência imediatamente.",
                "Ligue para o SAMU (192) se não puder se deslocar com segurança.",
                "Não espere os sintomas melhorarem.",
            ],
            UrgencyLevel::Alta => &[
                "Procure atendimento médico nas próximas horas.",
                "Dirija-se a uma unidade de pronto atendimento.",
                "Se os sintomas piorarem, ligue para o SAMU (192).",
            ],
            UrgencyLevel::Media => &[
                "Agende uma consulta médica para hoje ou amanhã.",
                "Acompanhe a evolução dos sintomas.",
                "Procure atendimento se surgirem sinais de piora.",
            ],
            UrgencyLevel::Baixa => &[
                "Repouse e mantenha-se hidratado.",
                "Acompanhe os sintomas nos próximos dias.",
                "Agende uma consulta de rotina se os sintomas persistirem.",
            ],
        }
    }
}

impl std::fmt::Display for UrgencyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of scoring a questionnaire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrgencyAssessment {
    /// Urgency score in `[0, 100]`
    pub score: u8,
    pub level: UrgencyLevel,
    pub recommendations: Vec<String>,
    /// Required questions left unanswered; they scored as "no"
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<String>,
}

/// Stateless urgency scorer.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrgencyScorer;

impl UrgencyScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, answers: &TriageAnswers) -> UrgencyAssessment {
        let score = raw_score(answers);
        let level = UrgencyLevel::from_score(score);

        let mut recommendations: Vec<String> = level
            .recommendations()
            .iter()
            .map(|r| r.to_string())
            .collect();
        if answers.takes_medication == Some(true) {
            recommendations.push("Leve a lista dos medicamentos que você usa.".to_string());
        }
        if answers.chronic_conditions == Some(true) {
            recommendations
                .push("Informe ao profissional de saúde suas condições crônicas.".to_string());
        }

        let missing_fields = answers.missing_fields();
        if !missing_fields.is_empty() {
            tracing::debug!(?missing_fields, "unanswered questions scored as negative");
        }

        UrgencyAssessment {
            score,
            level,
            recommendations,
            missing_fields,
        }
    }

    /// Resolve a raw questionnaire object and score it.
    pub fn score_json(&self, responses: &serde_json::Value) -> UrgencyAssessment {
        self.score(&TriageAnswers::from_json(responses))
    }
}

fn raw_score(answers: &TriageAnswers) -> u8 {
    if answers.has_breathing_difficulty() && answers.has_chest_pain() {
        return OVERRIDE_SCORE;
    }

    let mut score = 0u8;
    if answers.has_breathing_difficulty() {
        score = score.max(BREATHING_SCORE);
    }
    if answers.has_chest_pain() {
        score = score.max(CHEST_PAIN_SCORE);
    }
    if let Some(pain) = answers.pain_intensity {
        score = score.max(pain_score(pain));
    }
    if answers.has_fever() {
        let high = answers.fever_temperature.is_some_and(|t| t >= HIGH_FEVER_C);
        score = score.max(if high { HIGH_FEVER_SCORE } else { FEVER_SCORE });
    }

    if score > ACUTE_FLOOR && answers.onset.is_some_and(|o| o.is_acute()) {
        score = score.saturating_add(ACUTE_ESCALATION).min(100);
    }
    score
}

fn pain_score(intensity: u8) -> u8 {
    match intensity {
        9.. => 85,
        7..=8 => 60,
        5..=6 => 40,
        _ => 0,
    }
}
