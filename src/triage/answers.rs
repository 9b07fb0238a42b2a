//! Canonical structured questionnaire.
//!
//! Questionnaire front-ends name their fields differently (English,
//! Portuguese, camelCase, snake_case). [`TriageAnswers::from_json`] resolves
//! every known alias to one canonical field. Values that cannot be
//! interpreted are left unanswered rather than guessed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Version of the questionnaire alias table.
pub const ANSWER_ALIAS_VERSION: u32 = 1;

/// Canonical questionnaire field names.
pub mod field {
    pub const BREATHING_DIFFICULTY: &str = "breathing_difficulty";
    pub const CHEST_PAIN: &str = "chest_pain";
    pub const PAIN_INTENSITY: &str = "pain_intensity";
    pub const FEVER: &str = "fever";
    pub const FEVER_TEMPERATURE: &str = "fever_temperature";
    pub const ONSET: &str = "onset";
    pub const TAKES_MEDICATION: &str = "takes_medication";
    pub const CHRONIC_CONDITIONS: &str = "chronic_conditions";
}

/// Alias table: canonical field followed by the names it may arrive under,
/// in resolution order.
const ALIASES: &[(&str, &[&str])] = &[
    (
        field::BREATHING_DIFFICULTY,
        &[
            "breathing_difficulty",
            "breathingDifficulty",
            "difficulty_breathing",
            "shortness_of_breath",
            "dificuldade_respirar",
            "dificuldadeRespirar",
            "falta_de_ar",
            "faltaDeAr",
            "breathing",
        ],
    ),
    (
        field::CHEST_PAIN,
        &["chest_pain", "chestPain", "dor_peito", "dor_no_peito", "dorNoPeito", "dorPeito"],
    ),
    (
        field::PAIN_INTENSITY,
        &[
            "pain_intensity",
            "painIntensity",
            "pain_level",
            "painLevel",
            "pain_scale",
            "intensidade_dor",
            "intensidadeDor",
            "nivel_dor",
        ],
    ),
    (field::FEVER, &["fever", "has_fever", "hasFever", "febre"]),
    (
        field::FEVER_TEMPERATURE,
        &["fever_temperature", "feverTemperature", "temperature", "temperatura"],
    ),
    (
        field::ONSET,
        &[
            "onset",
            "symptom_onset",
            "symptomOnset",
            "symptom_duration",
            "symptomDuration",
            "inicio_sintomas",
            "inicioSintomas",
            "duracao",
        ],
    ),
    (
        field::TAKES_MEDICATION,
        &[
            "takes_medication",
            "takesMedication",
            "medication",
            "medications",
            "usa_medicamentos",
            "usaMedicamentos",
            "medicamentos",
        ],
    ),
    (
        field::CHRONIC_CONDITIONS,
        &[
            "chronic_conditions",
            "chronicConditions",
            "chronic_disease",
            "doencas_cronicas",
            "doencasCronicas",
            "comorbidades",
        ],
    ),
];

/// Fields that count toward completeness. Temperature is a follow-up to
/// `fever` and is not required.
const REQUIRED: &[&str] = &[
    field::BREATHING_DIFFICULTY,
    field::CHEST_PAIN,
    field::PAIN_INTENSITY,
    field::FEVER,
    field::ONSET,
    field::TAKES_MEDICATION,
    field::CHRONIC_CONDITIONS,
];

/// Temperature from which a fever counts as present, in °C.
pub const FEVER_THRESHOLD_C: f64 = 37.8;

/// When the symptoms started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymptomOnset {
    LessThanOneDay,
    OneToThreeDays,
    ThreeToSevenDays,
    MoreThanOneWeek,
}

impl SymptomOnset {
    /// Parse the duration labels used by questionnaire front-ends.
    pub fn parse(label: &str) -> Option<Self> {
        let normalized: String = label
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect();

        match normalized.as_str() {
            "<1dia" | "menosde1dia" | "menosdeumdia" | "lessthan1day" | "lessthanoneday"
            | "<24h" | "today" | "hoje" => Some(SymptomOnset::LessThanOneDay),
            "13dias" | "1a3dias" | "onetothreedays" | "1to3days" => {
                Some(SymptomOnset::OneToThreeDays)
            }
            "37dias" | "3a7dias" | "threetosevendays" | "3to7days" => {
                Some(SymptomOnset::ThreeToSevenDays)
            }
            ">1semana" | "maisde1semana" | "maisdeumasemana" | "morethan1week"
            | "morethanoneweek" => Some(SymptomOnset::MoreThanOneWeek),
            _ => None,
        }
    }

    pub fn is_acute(self) -> bool {
        self == SymptomOnset::LessThanOneDay
    }
}

/// Answers to the triage questionnaire, one canonical value per field.
///
/// `None` means unanswered or not understood.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriageAnswers {
    pub breathing_difficulty: Option<bool>,
    pub chest_pain: Option<bool>,
    /// Pain on a 0-10 scale
    pub pain_intensity: Option<u8>,
    pub fever: Option<bool>,
    /// Measured temperature in °C
    pub fever_temperature: Option<f64>,
    pub onset: Option<SymptomOnset>,
    pub takes_medication: Option<bool>,
    pub chronic_conditions: Option<bool>,
}

impl TriageAnswers {
    /// Resolve a raw questionnaire object through the alias table.
    ///
    /// Anything other than a JSON object yields an empty questionnaire.
    pub fn from_json(responses: &Value) -> Self {
        let Some(map) = responses.as_object() else {
            return Self::default();
        };

        let lookup = |canonical: &str| resolve(map, canonical);

        Self {
            breathing_difficulty: lookup(field::BREATHING_DIFFICULTY).and_then(parse_affirmative),
            chest_pain: lookup(field::CHEST_PAIN).and_then(parse_affirmative),
            pain_intensity: lookup(field::PAIN_INTENSITY).and_then(parse_pain),
            fever: lookup(field::FEVER).and_then(parse_affirmative),
            fever_temperature: lookup(field::FEVER_TEMPERATURE).and_then(parse_temperature),
            onset: lookup(field::ONSET)
                .and_then(Value::as_str)
                .and_then(SymptomOnset::parse),
            takes_medication: lookup(field::TAKES_MEDICATION).and_then(parse_listing),
            chronic_conditions: lookup(field::CHRONIC_CONDITIONS).and_then(parse_listing),
        }
    }

    pub fn has_breathing_difficulty(&self) -> bool {
        self.breathing_difficulty == Some(true)
    }

    pub fn has_chest_pain(&self) -> bool {
        self.chest_pain == Some(true)
    }

    /// Fever answered yes, or a temperature at or above the fever threshold.
    pub fn has_fever(&self) -> bool {
        self.fever == Some(true)
            || self
                .fever_temperature
                .is_some_and(|t| t >= FEVER_THRESHOLD_C)
    }

    /// Canonical names of required fields left unanswered.
    pub fn missing_fields(&self) -> Vec<String> {
        REQUIRED
            .iter()
            .filter(|name| !self.is_answered(name))
            .map(|name| name.to_string())
            .collect()
    }

    /// Fraction of required fields answered.
    pub fn completeness(&self) -> f64 {
        let answered = REQUIRED.iter().filter(|name| self.is_answered(name)).count();
        answered as f64 / REQUIRED.len() as f64
    }

    /// Answers that contradict each other.
    pub fn contradictions(&self) -> Vec<&'static str> {
        let mut found = Vec::new();
        if self.fever == Some(false)
            && self
                .fever_temperature
                .is_some_and(|t| t >= FEVER_THRESHOLD_C)
        {
            found.push("fever denied but temperature is febrile");
        }
        if self.has_chest_pain() && self.pain_intensity == Some(0) {
            found.push("chest pain reported with zero pain intensity");
        }
        found
    }

    fn is_answered(&self, name: &str) -> bool {
        match name {
            field::BREATHING_DIFFICULTY => self.breathing_difficulty.is_some(),
            field::CHEST_PAIN => self.chest_pain.is_some(),
            field::PAIN_INTENSITY => self.pain_intensity.is_some(),
            field::FEVER => self.fever.is_some(),
            field::FEVER_TEMPERATURE => self.fever_temperature.is_some(),
            field::ONSET => self.onset.is_some(),
            field::TAKES_MEDICATION => self.takes_medication.is_some(),
            field::CHRONIC_CONDITIONS => self.chronic_conditions.is_some(),
            _ => false,
        }
    }
}

/// First non-null value stored under any alias of `canonical`.
fn resolve<'a>(map: &'a Map<String, Value>, canonical: &str) -> Option<&'a Value> {
    let (_, aliases) = ALIASES.iter().find(|(name, _)| *name == canonical)?;
    aliases
        .iter()
        .filter_map(|alias| map.get(*alias))
        .find(|value| !value.is_null())
}

/// Yes/no answer. Unrecognized strings are treated as unanswered.
fn parse_affirmative(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "yes" | "y" | "sim" | "s" | "true" | "1" => Some(true),
            "no" | "n" | "não" | "nao" | "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Free-text answers meaning "none" to a medication or condition question.
const NONE_ANSWERS: &[&str] = &[
    "nenhum",
    "nenhuma",
    "none",
    "nada",
    "não uso",
    "nao uso",
    "não tenho",
    "nao tenho",
    "n/a",
    "na",
    "nothing",
];

/// Free-text answers that commit to neither yes nor no.
const UNSURE_ANSWERS: &[&str] = &["talvez", "não sei", "nao sei", "maybe", "unknown", "not sure"];

/// Yes/no answer that may also arrive as the list itself.
///
/// A list of names counts as yes, a list of only "none" entries as no.
fn parse_listing(value: &Value) -> Option<bool> {
    match value {
        Value::Array(items) => {
            let entries: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(normalize_entry(s)),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .filter(|entry| !entry.is_empty())
                .collect();
            Some(entries.iter().any(|entry| !is_none_answer(entry)))
        }
        Value::String(s) => {
            if let Some(answer) = parse_affirmative(value) {
                return Some(answer);
            }
            let text = normalize_entry(s);
            if text.is_empty() || UNSURE_ANSWERS.contains(&text.as_str()) {
                return None;
            }
            if is_none_answer(&text) {
                return Some(false);
            }

            let entries: Vec<String> = text
                .split(&[',', ';', '/', '\n'][..])
                .map(normalize_entry)
                .filter(|entry| !entry.is_empty())
                .collect();
            if entries.iter().all(|entry| is_none_answer(entry)) {
                Some(false)
            } else if entries.iter().any(|entry| looks_like_name(entry)) {
                Some(true)
            } else {
                None
            }
        }
        _ => parse_affirmative(value),
    }
}

fn normalize_entry(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn is_none_answer(entry: &str) -> bool {
    NONE_ANSWERS.contains(&entry) || parse_affirmative(&Value::String(entry.to_string())) == Some(false)
}

fn looks_like_name(entry: &str) -> bool {
    entry.chars().filter(|c| c.is_alphabetic()).count() >= 3
        && !is_none_answer(entry)
        && !UNSURE_ANSWERS.contains(&entry)
}

fn parse_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn parse_pain(value: &Value) -> Option<u8> {
    parse_number(value).map(|v| v.round().clamp(0.0, 10.0) as u8)
}

/// Body temperature in °C, ignoring physiologically impossible values.
fn parse_temperature(value: &Value) -> Option<f64> {
    parse_number(value).filter(|t| (30.0..=45.0).contains(t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_aliases_resolve_to_canonical_fields() {
        let answers = TriageAnswers::from_json(&json!({
            "dificuldadeRespirar": "sim",
            "chestPain": false,
            "intensidade_dor": "7",
            "febre": "não",
            "temperatura": "37,2",
            "inicioSintomas": "< 1 dia",
            "medicamentos": ["losartana"],
            "doencasCronicas": []
        }));

        assert_eq!(answers.breathing_difficulty, Some(true));
        assert_eq!(answers.chest_pain, Some(false));
        assert_eq!(answers.pain_intensity, Some(7));
        assert_eq!(answers.fever, Some(false));
        assert_eq!(answers.fever_temperature, Some(37.2));
        assert_eq!(answers.onset, Some(SymptomOnset::LessThanOneDay));
        assert_eq!(answers.takes_medication, Some(true));
        assert_eq!(answers.chronic_conditions, Some(false));
        assert!(answers.missing_fields().is_empty());
    }

    #[test]
    fn test_first_alias_wins() {
        let answers = TriageAnswers::from_json(&json!({
            "breathing_difficulty": "no",
            "breathing": "yes"
        }));
        assert_eq!(answers.breathing_difficulty, Some(false));
    }

    #[test]
    fn test_unrecognized_values_are_unanswered() {
        let answers = TriageAnswers::from_json(&json!({
            "breathing_difficulty": "maybe",
            "pain_intensity": "a lot",
            "onset": "last tuesday",
            "fever_temperature": 80
        }));

        assert_eq!(answers.breathing_difficulty, None);
        assert_eq!(answers.pain_intensity, None);
        assert_eq!(answers.onset, None);
        assert_eq!(answers.fever_temperature, None);
        assert!(!answers.has_breathing_difficulty());
        assert_eq!(answers.missing_fields().len(), REQUIRED.len());
        assert_eq!(answers.completeness(), 0.0);
    }

    #[test]
    fn test_none_answers_are_negative() {
        for word in ["nenhum", "nenhuma", "none", "nada", "não uso", "N/A", "  Nenhum  "] {
            let answers = TriageAnswers::from_json(&json!({
                "takes_medication": word,
                "chronic_conditions": word
            }));
            assert_eq!(answers.takes_medication, Some(false), "{word}");
            assert_eq!(answers.chronic_conditions, Some(false), "{word}");
        }

        let listed = TriageAnswers::from_json(&json!({ "medicamentos": ["nenhum"] }));
        assert_eq!(listed.takes_medication, Some(false));
    }

    #[test]
    fn test_listed_names_are_affirmative() {
        let answers = TriageAnswers::from_json(&json!({
            "takes_medication": "losartana, metformina",
            "chronic_conditions": "hipertensão"
        }));
        assert_eq!(answers.takes_medication, Some(true));
        assert_eq!(answers.chronic_conditions, Some(true));

        let unsure = TriageAnswers::from_json(&json!({
            "takes_medication": "talvez",
            "chronic_conditions": "??"
        }));
        assert_eq!(unsure.takes_medication, None);
        assert_eq!(unsure.chronic_conditions, None);
    }

    #[test]
    fn test_pain_is_clamped_and_rounded() {
        let high = TriageAnswers::from_json(&json!({ "pain_intensity": 14 }));
        assert_eq!(high.pain_intensity, Some(10));
        let fractional = TriageAnswers::from_json(&json!({ "painLevel": 6.6 }));
        assert_eq!(fractional.pain_intensity, Some(7));
    }

    #[test]
    fn test_fever_from_temperature() {
        let answers = TriageAnswers::from_json(&json!({ "temperature": 38.4 }));
        assert!(answers.has_fever());
        assert!(answers.missing_fields().contains(&"fever".to_string()));
    }

    #[test]
    fn test_contradictions() {
        let answers = TriageAnswers {
            fever: Some(false),
            fever_temperature: Some(39.0),
            chest_pain: Some(true),
            pain_intensity: Some(0),
            ..Default::default()
        };
        assert_eq!(answers.contradictions().len(), 2);
    }

    #[test]
    fn test_non_object_is_empty() {
        assert_eq!(TriageAnswers::from_json(&json!([1, 2])), TriageAnswers::default());
    }

    #[test]
    fn test_onset_labels() {
        assert_eq!(SymptomOnset::parse("1-3 dias"), Some(SymptomOnset::OneToThreeDays));
        assert_eq!(SymptomOnset::parse("more_than_1_week"), Some(SymptomOnset::MoreThanOneWeek));
        assert_eq!(SymptomOnset::parse("less_than_1_day"), Some(SymptomOnset::LessThanOneDay));
        assert!(SymptomOnset::LessThanOneDay.is_acute());
    }
}
