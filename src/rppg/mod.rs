//! Remote photoplethysmography: pulse rate from facial color changes.
//!
//! This module contains:
//! - Color samples and the bounded window they are collected into
//! - Face localization and color extraction on raw frames
//! - Signal processing and heart-rate estimation
//! - Capture/analysis scheduling, threaded and simulated

pub mod analyzer;
pub mod buffer;
pub mod dsp;
pub mod frame;
pub mod session;
pub mod synthetic;
pub mod types;

pub use analyzer::{estimate_reading, AnalyzerConfig, RppgAnalyzer};
pub use buffer::SignalBuffer;
pub use frame::{detect_roi, extract_color, Frame, FrameBuf};
pub use session::{FrameSource, RppgSession, SessionDriver, Tick, TickSchedule};
pub use synthetic::SyntheticFrameSource;
pub use types::{ColorSample, LightingCondition, Roi, RppgReading, SignalQuality};
