//! Audit trail of what the triage core processed.
//!
//! Counters only: no samples, answers or scores are retained here.

pub mod log;

pub use log::{
    create_shared_log, create_shared_log_with_persistence, AuditLog, AuditStats, SharedAuditLog,
};
