//! Structured questionnaire triage.

pub mod answers;
pub mod urgency;

pub use answers::{SymptomOnset, TriageAnswers};
pub use urgency::{UrgencyAssessment, UrgencyLevel, UrgencyScorer};
