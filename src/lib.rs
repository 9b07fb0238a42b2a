//! Synheart Triage - explainable multimodal self-triage core.
//!
//! This library turns three independent channels into an urgency and trust
//! estimate for medical self-triage:
//!
//! - **Pulse**: heart rate from facial color changes (remote photoplethysmography)
//! - **Fusion**: cross-modal reliability over voice, facial and questionnaire data
//! - **Urgency**: Manchester-style scoring of a structured questionnaire
//!
//! Capture devices, transcription, storage and presentation are collaborators:
//! the core consumes already-extracted inputs and returns plain values.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         Synheart Triage                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐             │
//! │  │   Frames    │──▶│   Signal    │──▶│  Analyzer   │──┐          │
//! │  │ (ROI, mean) │   │ (10s window)│   │  (1s tick)  │  │          │
//! │  └─────────────┘   └─────────────┘   └─────────────┘  │          │
//! │                                                       ▼          │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────────────┐     │
//! │  │  Provider   │──▶│  Modality   │──▶│ Correlation Engine  │──┐  │
//! │  │  payloads   │   │   Adapter   │   │ (reliability/trust) │  │  │
//! │  └─────────────┘   └─────────────┘   └─────────────────────┘  │  │
//! │                                                               ▼  │
//! │  ┌─────────────┐   ┌─────────────┐                 ┌──────────┐  │
//! │  │Questionnaire│──▶│   Urgency   │────────────────▶│  Report  │  │
//! │  │  (aliases)  │   │   Scorer    │                 └──────────┘  │
//! │  └─────────────┘   └─────────────┘                               │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use synheart_triage::{triage::UrgencyScorer, triage::UrgencyLevel};
//!
//! let assessment = UrgencyScorer::new().score_json(&serde_json::json!({
//!     "breathing_difficulty": "sim",
//!     "chest_pain": "sim",
//! }));
//! assert_eq!(assessment.score, 100);
//! assert_eq!(assessment.level, UrgencyLevel::Critica);
//! ```

pub mod config;
pub mod fusion;
pub mod report;
pub mod rppg;
pub mod transparency;
pub mod triage;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use fusion::{
    CorrelationEngine, CorrelationResult, ModalityAdapter, ModalityData, ModalitySet, TrustLevel,
};
pub use report::{ReportBuilder, ReportError, TriageReport};
pub use rppg::{
    AnalyzerConfig, ColorSample, RppgAnalyzer, RppgReading, RppgSession, SessionDriver,
    SignalBuffer, SignalQuality,
};
pub use transparency::{AuditLog, AuditStats, SharedAuditLog};
pub use triage::{TriageAnswers, UrgencyAssessment, UrgencyLevel, UrgencyScorer};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Medical disclaimer that must be displayed alongside any result.
pub const MEDICAL_DISCLAIMER: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║              SYNHEART TRIAGE - AVISO MÉDICO / NOTICE             ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  Esta ferramenta auxilia a autotriagem. NÃO é um diagnóstico.    ║
║  This tool supports self-triage. It is NOT a diagnosis.          ║
║                                                                  ║
║  ✓ O QUE ELA FAZ / WHAT IT DOES:                                 ║
║    • Estima a frequência cardíaca pela câmera                    ║
║    • Avalia a confiabilidade cruzada dos dados                   ║
║    • Classifica a urgência das respostas (Manchester)            ║
║                                                                  ║
║  ✗ O QUE ELA NÃO FAZ / WHAT IT DOES NOT DO:                      ║
║    • Não substitui avaliação de um profissional de saúde         ║
║    • Não armazena imagens, áudio ou respostas livres             ║
║                                                                  ║
║  EM EMERGÊNCIA, LIGUE 192 (SAMU) / IN AN EMERGENCY, CALL 192.    ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disclaimer_contents() {
        assert!(MEDICAL_DISCLAIMER.contains("NOT a diagnosis"));
        assert!(MEDICAL_DISCLAIMER.contains("192"));
        assert!(MEDICAL_DISCLAIMER.contains("profissional de saúde"));
    }
}
