//! Triage report envelope.
//!
//! A report bundles the outputs of one triage run (pulse reading,
//! correlation result and urgency assessment) with producer metadata, so
//! downstream consumers can store or render it without knowing how it was
//! computed. Every part is optional: a report carries whatever was run.

use crate::fusion::{Channel, CorrelationResult, ModalitySet, Provenance};
use crate::rppg::{RppgReading, SignalQuality};
use crate::triage::UrgencyAssessment;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// The current report format version.
pub const REPORT_VERSION: &str = "1.0";

/// The name of this producer.
pub const PRODUCER_NAME: &str = "synheart-triage";

/// Producer metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProducer {
    /// Name of the producing software
    pub name: String,
    /// Version of the producing software
    pub version: String,
    /// Unique instance identifier (UUID)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

/// One input channel that contributed to the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSource {
    /// Which provider in the fallback chain supplied the data
    pub provenance: Provenance,
    /// Quality of the source (0-1)
    pub quality: f64,
    /// Whether the source is degraded
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Privacy declaration carried by every report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPrivacy {
    /// Always false: reports never contain identifying data
    pub contains_pii: bool,
    /// Always false: frames and audio are reduced before they reach the core
    pub raw_signals_included: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Default for ReportPrivacy {
    fn default() -> Self {
        Self {
            contains_pii: false,
            raw_signals_included: false,
            notes: Some(
                "Derived scores only - no frames, audio or free-text answers".to_string(),
            ),
        }
    }
}

/// Complete triage report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageReport {
    /// Report format version
    pub report_version: String,
    /// Unique report identifier
    pub report_id: String,
    /// When this report was computed (RFC3339)
    pub computed_at_utc: String,
    /// When the newest underlying observation was made (RFC3339)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_at_utc: Option<String>,
    pub producer: ReportProducer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pulse: Option<RppgReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation: Option<CorrelationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<UrgencyAssessment>,
    /// Contributing sources keyed by name
    pub sources: HashMap<String, ReportSource>,
    pub privacy: ReportPrivacy,
    /// Whether the medical disclaimer applies to this report
    pub disclaimer: bool,
}

impl TriageReport {
    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report to `dir` as `triage_<timestamp>_<id>.json`.
    pub fn export(&self, dir: &Path) -> Result<PathBuf, ReportError> {
        std::fs::create_dir_all(dir)?;
        let short_id: String = self.report_id.chars().take(8).collect();
        let path = dir.join(format!(
            "triage_{}_{}.json",
            Utc::now().format("%Y%m%d_%H%M%S"),
            short_id
        ));
        std::fs::write(&path, self.to_json()?)?;
        tracing::info!(path = %path.display(), "report exported");
        Ok(path)
    }
}

/// Report errors.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Builder for triage reports.
pub struct ReportBuilder {
    instance_id: Uuid,
    session_id: Option<String>,
}

impl ReportBuilder {
    /// Create a new builder with a unique instance ID.
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            session_id: None,
        }
    }

    pub fn with_session_id(mut self, session_id: String) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Assemble a report from whichever parts were computed.
    pub fn build(
        &self,
        pulse: Option<&RppgReading>,
        modalities: Option<&ModalitySet>,
        correlation: Option<&CorrelationResult>,
        urgency: Option<&UrgencyAssessment>,
    ) -> TriageReport {
        let mut sources = HashMap::new();

        if let Some(reading) = pulse {
            let degraded = reading.quality <= SignalQuality::Fair || reading.motion_detected;
            sources.insert(
                format!("s_rppg_{}", self.instance_id),
                ReportSource {
                    provenance: Provenance::Primary,
                    quality: reading.quality.score(),
                    degraded,
                    notes: reading
                        .motion_detected
                        .then(|| "Motion detected during capture".to_string()),
                },
            );
        }

        if let Some(set) = modalities {
            let channels = [
                (Channel::Voice, set.voice.as_ref().map(|v| &v.common)),
                (Channel::Facial, set.facial.as_ref().map(|f| &f.common)),
                (Channel::Anamnesis, set.anamnesis.as_ref().map(|a| &a.common)),
            ];
            for (channel, common) in channels {
                let Some(common) = common else { continue };
                let name = serde_json::to_value(channel)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                sources.insert(
                    format!("s_{name}"),
                    ReportSource {
                        provenance: common.source,
                        quality: common.quality,
                        degraded: common.quality < 0.5 || common.source == Provenance::Fallback,
                        notes: (common.source == Provenance::Fallback)
                            .then(|| "Produced by a fallback provider".to_string()),
                    },
                );
            }
        }

        let observed_at = pulse.map(|r| r.timestamp).into_iter().chain(
            modalities
                .into_iter()
                .flat_map(|set| {
                    [
                        set.voice.as_ref().map(|v| v.common.timestamp),
                        set.facial.as_ref().map(|f| f.common.timestamp),
                        set.anamnesis.as_ref().map(|a| a.common.timestamp),
                    ]
                })
                .flatten(),
        );

        TriageReport {
            report_version: REPORT_VERSION.to_string(),
            report_id: Uuid::new_v4().to_string(),
            computed_at_utc: Utc::now().to_rfc3339(),
            observed_at_utc: observed_at.max().map(|t| t.to_rfc3339()),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                instance_id: Some(self.instance_id.to_string()),
            },
            session_id: self.session_id.clone(),
            pulse: pulse.cloned(),
            correlation: correlation.cloned(),
            urgency: urgency.cloned(),
            sources,
            privacy: ReportPrivacy::default(),
            disclaimer: true,
        }
    }
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}
