//! Multi-modal fusion of voice, facial and anamnesis channels.
//!
//! This module contains:
//! - Canonical per-channel data and provenance tags
//! - The adapter that maps provider payloads onto it
//! - The correlation engine producing reliability and trust

pub mod adapter;
pub mod correlation;
pub mod modality;

pub use adapter::{ModalityAdapter, ALIAS_TABLE_VERSION};
pub use correlation::{
    determine_trust_level, CorrelationEngine, CorrelationFactor, CorrelationResult, FactorCode,
    Inconsistency, InconsistencyCode, InconsistencyKind, Polarity, Severity, TrustLevel,
};
pub use modality::{
    AnamnesisData, Channel, ChannelSet, EmotionalState, FacialData, ModalityCommon, ModalityData,
    ModalitySet, Provenance, RespiratoryPattern, VoiceData,
};
