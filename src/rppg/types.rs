//! Value types for remote photoplethysmography.
//!
//! Samples are spatial color averages over the face region. They carry no
//! pixel data and no identity: once a frame is reduced to a sample the frame
//! itself is dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mean color of the region of interest for one captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorSample {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub timestamp: DateTime<Utc>,
}

impl ColorSample {
    /// Create a sample, clamping every channel into `[0, 255]`.
    ///
    /// Non-finite channel values are treated as black.
    pub fn new(r: f64, g: f64, b: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            r: clamp_channel(r),
            g: clamp_channel(g),
            b: clamp_channel(b),
            timestamp,
        }
    }

    /// Create a sample stamped with the current time.
    pub fn now(r: f64, g: f64, b: f64) -> Self {
        Self::new(r, g, b, Utc::now())
    }

    /// Rec. 601 luma of the sample.
    pub fn luminance(&self) -> f64 {
        0.299 * self.r + 0.587 * self.g + 0.114 * self.b
    }

    /// Sum of absolute per-channel differences to another sample.
    pub fn channel_delta(&self, other: &ColorSample) -> f64 {
        (self.r - other.r).abs() + (self.g - other.g).abs() + (self.b - other.b).abs()
    }
}

fn clamp_channel(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 255.0)
    } else {
        0.0
    }
}

/// Rectangle in frame coordinates believed to contain skin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Number of pixels covered by the rectangle.
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether the rectangle lies fully inside a `width` x `height` frame.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x.saturating_add(self.width) <= width
            && self.y.saturating_add(self.height) <= height
    }
}

/// Four-level grade of a heart-rate estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalQuality {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl SignalQuality {
    /// One grade lower, saturating at `Poor`.
    pub fn downgrade(self) -> Self {
        match self {
            SignalQuality::Excellent => SignalQuality::Good,
            SignalQuality::Good => SignalQuality::Fair,
            SignalQuality::Fair | SignalQuality::Poor => SignalQuality::Poor,
        }
    }

    /// Representative score in `[0, 1]` used when the grade feeds fusion.
    pub fn score(self) -> f64 {
        match self {
            SignalQuality::Poor => 0.25,
            SignalQuality::Fair => 0.5,
            SignalQuality::Good => 0.75,
            SignalQuality::Excellent => 0.95,
        }
    }
}

impl std::fmt::Display for SignalQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalQuality::Poor => write!(f, "poor"),
            SignalQuality::Fair => write!(f, "fair"),
            SignalQuality::Good => write!(f, "good"),
            SignalQuality::Excellent => write!(f, "excellent"),
        }
    }
}

/// Advisory classification of scene brightness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightingCondition {
    TooDark,
    TooBright,
    Good,
}

impl LightingCondition {
    /// Quality score in `[0, 1]` for the facial channel.
    pub fn score(self) -> f64 {
        match self {
            LightingCondition::Good => 0.9,
            LightingCondition::TooBright => 0.45,
            LightingCondition::TooDark => 0.3,
        }
    }
}

/// A heart-rate estimate derived from the current window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RppgReading {
    /// Beats per minute
    pub bpm: f64,
    /// Signal-to-noise ratio in dB
    pub snr: f64,
    pub quality: SignalQuality,
    /// Timestamp of the newest sample in the window
    pub timestamp: DateTime<Utc>,
    /// Whether a frame-to-frame motion artifact was seen in the window
    pub motion_detected: bool,
    /// Lighting of the newest sample
    pub lighting: LightingCondition,
}

impl RppgReading {
    /// Map SNR in [-5, 10] dB onto a confidence in [0, 1].
    pub fn confidence(&self) -> f64 {
        ((self.snr + 5.0) / 15.0).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_clamps_channels() {
        let sample = ColorSample::now(-12.0, 300.0, f64::NAN);
        assert_eq!(sample.r, 0.0);
        assert_eq!(sample.g, 255.0);
        assert_eq!(sample.b, 0.0);
    }

    #[test]
    fn test_roi_bounds() {
        let roi = Roi::new(10, 10, 20, 20);
        assert!(roi.fits_within(30, 30));
        assert!(!roi.fits_within(29, 30));
        assert!(!Roi::new(0, 0, 0, 5).fits_within(10, 10));
        assert_eq!(roi.area(), 400);
    }

    #[test]
    fn test_quality_downgrade_saturates() {
        assert_eq!(SignalQuality::Excellent.downgrade(), SignalQuality::Good);
        assert_eq!(SignalQuality::Poor.downgrade(), SignalQuality::Poor);
        assert!(SignalQuality::Good > SignalQuality::Fair);
    }

    #[test]
    fn test_confidence_from_snr() {
        let mut reading = RppgReading {
            bpm: 70.0,
            snr: 10.0,
            quality: SignalQuality::Good,
            timestamp: Utc::now(),
            motion_detected: false,
            lighting: LightingCondition::Good,
        };
        assert_eq!(reading.confidence(), 1.0);
        reading.snr = -20.0;
        assert_eq!(reading.confidence(), 0.0);
    }
}
