//! Session audit log.
//!
//! Tracks what the triage core processed (frames, readings, assessments)
//! without storing any of the underlying signal or answers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Processing counters for the current session.
#[derive(Debug)]
pub struct AuditLog {
    /// Frames that produced a color sample
    frames_captured: AtomicU64,
    /// Frames skipped because no face region was found
    frames_skipped: AtomicU64,
    /// Heart-rate readings emitted
    readings_produced: AtomicU64,
    /// Analysis ticks that yielded no reading
    analyses_suppressed: AtomicU64,
    /// Questionnaires scored
    assessments_scored: AtomicU64,
    /// Reports written to disk
    reports_exported: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl AuditLog {
    /// Create an empty log for a new session.
    pub fn new() -> Self {
        Self {
            frames_captured: AtomicU64::new(0),
            frames_skipped: AtomicU64::new(0),
            readings_produced: AtomicU64::new(0),
            analyses_suppressed: AtomicU64::new(0),
            assessments_scored: AtomicU64::new(0),
            reports_exported: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log that accumulates onto stats persisted at `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!("could not load previous audit stats: {e}");
        }

        log
    }

    /// Record a frame reduced to a color sample.
    pub fn record_frame_captured(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a frame with no face region.
    pub fn record_frame_skipped(&self) {
        self.frames_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an emitted heart-rate reading.
    pub fn record_reading(&self) {
        self.readings_produced.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an analysis tick that produced no reading.
    pub fn record_analysis_suppressed(&self) {
        self.analyses_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a scored questionnaire.
    pub fn record_assessment(&self) {
        self.assessments_scored.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a report written to disk.
    pub fn record_report_exported(&self) {
        self.reports_exported.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> AuditStats {
        AuditStats {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
            readings_produced: self.readings_produced.load(Ordering::Relaxed),
            analyses_suppressed: self.analyses_suppressed.load(Ordering::Relaxed),
            assessments_scored: self.assessments_scored.load(Ordering::Relaxed),
            reports_exported: self.reports_exported.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Frames sampled: {}\n\
             - Frames without a face: {}\n\
             - Heart-rate readings: {}\n\
             - Analyses without a reading: {}\n\
             - Questionnaires scored: {}\n\
             - Reports exported: {}\n\
             - Session duration: {} seconds\n\
             \n\
             Data Handling:\n\
             - Frames are reduced to a mean color and discarded\n\
             - Answers are scored in memory only\n\
             - Reports are written only on request",
            stats.frames_captured,
            stats.frames_skipped,
            stats.readings_produced,
            stats.analyses_suppressed,
            stats.assessments_scored,
            stats.reports_exported,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                frames_captured: stats.frames_captured,
                frames_skipped: stats.frames_skipped,
                readings_produced: stats.readings_produced,
                analyses_suppressed: stats.analyses_suppressed,
                assessments_scored: stats.assessments_scored,
                reports_exported: stats.reports_exported,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    /// Restore counters from the persisted stats, if any.
    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.frames_captured
                    .store(persisted.frames_captured, Ordering::Relaxed);
                self.frames_skipped
                    .store(persisted.frames_skipped, Ordering::Relaxed);
                self.readings_produced
                    .store(persisted.readings_produced, Ordering::Relaxed);
                self.analyses_suppressed
                    .store(persisted.analyses_suppressed, Ordering::Relaxed);
                self.assessments_scored
                    .store(persisted.assessments_scored, Ordering::Relaxed);
                self.reports_exported
                    .store(persisted.reports_exported, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.frames_captured.store(0, Ordering::Relaxed);
        self.frames_skipped.store(0, Ordering::Relaxed);
        self.readings_produced.store(0, Ordering::Relaxed);
        self.analyses_suppressed.store(0, Ordering::Relaxed);
        self.assessments_scored.store(0, Ordering::Relaxed);
        self.reports_exported.store(0, Ordering::Relaxed);
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of the audit counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditStats {
    pub frames_captured: u64,
    pub frames_skipped: u64,
    pub readings_produced: u64,
    pub analyses_suppressed: u64,
    pub assessments_scored: u64,
    pub reports_exported: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    frames_captured: u64,
    frames_skipped: u64,
    readings_produced: u64,
    analyses_suppressed: u64,
    assessments_scored: u64,
    reports_exported: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared audit log.
pub type SharedAuditLog = Arc<AuditLog>;

pub fn create_shared_log() -> SharedAuditLog {
    Arc::new(AuditLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedAuditLog {
    Arc::new(AuditLog::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_log_counting() {
        let log = AuditLog::new();

        log.record_frame_captured();
        log.record_frame_captured();
        log.record_frame_skipped();
        log.record_reading();

        let stats = log.stats();
        assert_eq!(stats.frames_captured, 2);
        assert_eq!(stats.frames_skipped, 1);
        assert_eq!(stats.readings_produced, 1);
        assert_eq!(stats.analyses_suppressed, 0);
    }

    #[test]
    fn test_audit_log_reset() {
        let log = AuditLog::new();
        log.record_assessment();
        log.record_report_exported();
        log.reset();

        let stats = log.stats();
        assert_eq!(stats.assessments_scored, 0);
        assert_eq!(stats.reports_exported, 0);
    }

    #[test]
    fn test_persistence_accumulates() {
        let path = std::env::temp_dir()
            .join(format!("synheart-triage-audit-{}", uuid::Uuid::new_v4()))
            .join("audit.json");

        let log = AuditLog::with_persistence(path.clone());
        log.record_reading();
        log.record_reading();
        log.save().unwrap();

        let reloaded = AuditLog::with_persistence(path.clone());
        assert_eq!(reloaded.stats().readings_produced, 2);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_summary_format() {
        let summary = AuditLog::new().summary();
        assert!(summary.contains("Heart-rate readings"));
        assert!(summary.contains("Data Handling"));
    }
}
