//! Heart-rate extraction from the rolling color window.
//!
//! The green channel carries most of the pulse signal. Each analysis pass:
//!
//! 1. Removes the linear trend of the green series
//! 2. Band-limits it to the plausible pulse range (42-240 bpm by default)
//! 3. Picks peaks at least one shortest plausible beat apart
//! 4. Takes the median inter-peak interval as the beat period
//! 5. Grades the estimate from spectral SNR and interval regularity
//!
//! Missing faces, bad lighting and motion never fail the pipeline. They
//! lower the grade or suppress the reading.

use crate::config::duration_millis;
use crate::rppg::buffer::SignalBuffer;
use crate::rppg::dsp;
use crate::rppg::frame::{self, Frame};
use crate::rppg::types::{ColorSample, LightingCondition, Roi, RppgReading, SignalQuality};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Parameters for pulse extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Nominal capture rate in Hz, used to size the window
    pub sample_rate_hz: f64,
    /// Length of the sliding window
    #[serde(with = "duration_millis")]
    pub window: Duration,
    /// Fraction of the window that must be filled before analysing
    pub readiness_threshold: f64,
    /// Lower edge of the pulse band
    pub min_bpm: f64,
    /// Upper edge of the pulse band
    pub max_bpm: f64,
    /// Fewest peaks needed for a stable period estimate
    pub min_peaks: usize,
    /// Lowest beat regularity (1 - CV of intervals) accepted as a period
    #[serde(default = "default_min_regularity")]
    pub min_regularity: f64,
    /// SNR in dB at or below which the window is treated as noise
    #[serde(default = "default_min_snr_db")]
    pub min_snr_db: f64,
    /// Summed channel delta between consecutive samples that counts as motion
    pub motion_threshold: f64,
    /// Luminance below which the scene is too dark
    pub dark_luminance: f64,
    /// Luminance above which the scene is too bright
    pub bright_luminance: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 30.0,
            window: Duration::from_secs(10),
            readiness_threshold: 0.6,
            min_bpm: 42.0,
            max_bpm: 240.0,
            min_peaks: 4,
            min_regularity: default_min_regularity(),
            min_snr_db: default_min_snr_db(),
            motion_threshold: 12.0,
            dark_luminance: 60.0,
            bright_luminance: 200.0,
        }
    }
}

fn default_min_regularity() -> f64 {
    0.5
}

fn default_min_snr_db() -> f64 {
    -3.0
}

/// Rolling pulse analyzer for one capture session.
#[derive(Debug, Clone)]
pub struct RppgAnalyzer {
    config: AnalyzerConfig,
    buffer: SignalBuffer,
}

impl RppgAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        let buffer = SignalBuffer::for_window(config.window, config.sample_rate_hz);
        Self { config, buffer }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn buffer(&self) -> &SignalBuffer {
        &self.buffer
    }

    /// Append a sample to the window, evicting the oldest one when full.
    pub fn add_reading(&mut self, sample: ColorSample) {
        // Re-clamp: the fields are public and may have been edited.
        let sample = ColorSample::new(sample.r, sample.g, sample.b, sample.timestamp);
        self.buffer.push(sample);
    }

    /// Fraction of the window currently filled.
    pub fn buffer_progress(&self) -> f64 {
        self.buffer.progress()
    }

    /// Locate the skin region of a frame.
    pub fn detect_roi(&self, frame: &Frame<'_>) -> Option<Roi> {
        frame::detect_roi(frame)
    }

    /// Average color inside `roi`.
    pub fn extract_color(
        &self,
        frame: &Frame<'_>,
        roi: Option<&Roi>,
        timestamp: DateTime<Utc>,
    ) -> Option<ColorSample> {
        frame::extract_color(frame, roi, timestamp)
    }

    /// Detect, extract and buffer in one step.
    ///
    /// Returns the buffered sample, or `None` when the frame had to be skipped.
    pub fn process_frame(
        &mut self,
        frame: &Frame<'_>,
        timestamp: DateTime<Utc>,
    ) -> Option<ColorSample> {
        let roi = self.detect_roi(frame);
        let sample = self.extract_color(frame, roi.as_ref(), timestamp)?;
        self.add_reading(sample);
        Some(sample)
    }

    pub fn assess_lighting(&self, sample: &ColorSample) -> LightingCondition {
        assess_lighting(&self.config, sample)
    }

    pub fn detect_movement(&self, prev: &ColorSample, curr: &ColorSample) -> bool {
        detect_movement(&self.config, prev, curr)
    }

    /// Estimate heart rate from the current window.
    pub fn analyze(&self) -> Option<RppgReading> {
        estimate_reading(&self.config, &self.buffer.snapshot(), self.buffer.capacity())
    }

    /// Empty the window. `analyze` returns `None` until it refills.
    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
    }

    /// Return the analyzer to its freshly created state.
    pub fn reset(&mut self) {
        self.buffer = SignalBuffer::for_window(self.config.window, self.config.sample_rate_hz);
    }
}

/// Threshold classification of a sample's luminance.
pub fn assess_lighting(config: &AnalyzerConfig, sample: &ColorSample) -> LightingCondition {
    let luminance = sample.luminance();
    if luminance < config.dark_luminance {
        LightingCondition::TooDark
    } else if luminance > config.bright_luminance {
        LightingCondition::TooBright
    } else {
        LightingCondition::Good
    }
}

/// Whether the change between two consecutive samples looks like motion.
pub fn detect_movement(config: &AnalyzerConfig, prev: &ColorSample, curr: &ColorSample) -> bool {
    prev.channel_delta(curr) > config.motion_threshold
}

/// Whether any consecutive pair in the window exceeds the motion threshold.
pub fn window_has_motion(config: &AnalyzerConfig, samples: &[ColorSample]) -> bool {
    samples
        .windows(2)
        .any(|pair| detect_movement(config, &pair[0], &pair[1]))
}

/// Map SNR and beat regularity to a grade.
pub fn grade(snr_db: f64, regularity: f64) -> SignalQuality {
    if snr_db >= 10.0 && regularity >= 0.9 {
        SignalQuality::Excellent
    } else if snr_db >= 5.0 && regularity >= 0.8 {
        SignalQuality::Good
    } else if snr_db >= 0.0 && regularity >= 0.6 {
        SignalQuality::Fair
    } else {
        SignalQuality::Poor
    }
}

/// Estimate a reading from a window snapshot.
///
/// `capacity` is the full window size the snapshot was taken from; the
/// readiness gate is evaluated against it.
pub fn estimate_reading(
    config: &AnalyzerConfig,
    samples: &[ColorSample],
    capacity: usize,
) -> Option<RppgReading> {
    if capacity == 0 || (samples.len() as f64 / capacity as f64) < config.readiness_threshold {
        return None;
    }
    let first = samples.first()?;
    let last = samples.last()?;

    let span_secs = (last.timestamp - first.timestamp).num_microseconds()? as f64 / 1e6;
    let sample_rate = if span_secs > 0.0 {
        (samples.len() - 1) as f64 / span_secs
    } else {
        config.sample_rate_hz
    };

    let green: Vec<f64> = samples.iter().map(|s| s.g).collect();
    let detrended = dsp::detrend(&green);
    let filtered = dsp::band_limit(
        &detrended,
        sample_rate,
        config.min_bpm / 60.0,
        config.max_bpm / 60.0,
    );

    let spread = dsp::std_dev(&filtered);
    if spread <= 1e-9 {
        tracing::debug!("flat pulse band, no reading");
        return None;
    }

    let min_distance = ((sample_rate * 60.0 / config.max_bpm).floor() as usize).max(1);
    let peaks = dsp::find_peaks(&filtered, min_distance, 0.3 * spread);
    if peaks.len() < config.min_peaks {
        tracing::debug!(peaks = peaks.len(), "too few peaks for a stable period");
        return None;
    }

    let intervals_ms: Vec<f64> = peaks
        .windows(2)
        .filter_map(|pair| {
            (samples[pair[1]].timestamp - samples[pair[0]].timestamp).num_microseconds()
        })
        .map(|us| us as f64 / 1000.0)
        .collect();

    let period_ms = dsp::median(&intervals_ms)?;
    if period_ms <= 0.0 {
        return None;
    }
    let bpm = 60_000.0 / period_ms;
    if bpm < config.min_bpm || bpm > config.max_bpm {
        tracing::debug!(bpm, "period outside plausible pulse range");
        return None;
    }

    let snr = dsp::spectral_snr(&detrended, sample_rate, bpm / 60.0);
    let regularity = dsp::regularity(&intervals_ms);
    if regularity < config.min_regularity || snr <= config.min_snr_db {
        tracing::debug!(bpm, snr, regularity, "no stable period in window");
        return None;
    }
    let motion_detected = window_has_motion(config, samples);

    let mut quality = grade(snr, regularity);
    if motion_detected {
        quality = quality.downgrade();
    }

    Some(RppgReading {
        bpm,
        snr,
        quality,
        timestamp: last.timestamp,
        motion_detected,
        lighting: assess_lighting(config, last),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use std::f64::consts::PI;

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn pulse_sample(i: usize, bpm: f64, fs: f64) -> ColorSample {
        let t = i as f64 / fs;
        let g = 140.0 + 2.0 * (2.0 * PI * bpm / 60.0 * t).sin();
        ColorSample::new(
            200.0,
            g,
            110.0,
            t0() + ChronoDuration::microseconds((t * 1e6) as i64),
        )
    }

    fn filled(bpm: f64, count: usize) -> RppgAnalyzer {
        let mut analyzer = RppgAnalyzer::new(AnalyzerConfig::default());
        for i in 0..count {
            analyzer.add_reading(pulse_sample(i, bpm, 30.0));
        }
        analyzer
    }

    #[test]
    fn test_recovers_synthetic_pulse() {
        let analyzer = filled(72.0, 300);
        let reading = analyzer.analyze().expect("full window should yield a reading");

        assert_abs_diff_eq!(reading.bpm, 72.0, epsilon = 2.0);
        assert!(reading.snr > 10.0, "snr {}", reading.snr);
        assert_eq!(reading.quality, SignalQuality::Excellent);
        assert!(!reading.motion_detected);
        assert_eq!(reading.lighting, LightingCondition::Good);
    }

    #[test]
    fn test_tracks_different_rates() {
        for bpm in [54.0, 90.0, 120.0] {
            let reading = filled(bpm, 300).analyze().unwrap();
            assert_abs_diff_eq!(reading.bpm, bpm, epsilon = 3.0);
        }
    }

    #[test]
    fn test_readiness_gate() {
        let analyzer = filled(72.0, 170);
        assert!(analyzer.buffer_progress() < 0.6);
        assert!(analyzer.analyze().is_none());

        let analyzer = filled(72.0, 180);
        assert_abs_diff_eq!(analyzer.buffer_progress(), 0.6, epsilon = 1e-12);
        assert!(analyzer.analyze().is_some());
    }

    #[test]
    fn test_clear_buffer_suppresses_reading() {
        let mut analyzer = filled(72.0, 300);
        analyzer.clear_buffer();
        assert_eq!(analyzer.buffer_progress(), 0.0);
        assert!(analyzer.analyze().is_none());

        for i in 0..100 {
            analyzer.add_reading(pulse_sample(i, 72.0, 30.0));
        }
        assert!(analyzer.analyze().is_none());
    }

    #[test]
    fn test_flat_signal_yields_nothing() {
        let mut analyzer = RppgAnalyzer::new(AnalyzerConfig::default());
        for i in 0..300 {
            analyzer.add_reading(ColorSample::new(
                200.0,
                140.0,
                110.0,
                t0() + ChronoDuration::milliseconds(i * 33),
            ));
        }
        assert!(analyzer.analyze().is_none());
    }

    /// Deterministic uniform noise in `[-1, 1)`.
    fn noise(state: &mut u64) -> f64 {
        *state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        ((*state >> 11) as f64 / (1u64 << 53) as f64) * 2.0 - 1.0
    }

    #[test]
    fn test_noise_only_window_yields_nothing() {
        let mut state = 0x5eed;
        for count in [180, 300] {
            let mut analyzer = RppgAnalyzer::new(AnalyzerConfig::default());
            for i in 0..count {
                let t = i as f64 / 30.0;
                analyzer.add_reading(ColorSample::new(
                    200.0,
                    140.0 + 0.3 * t + 2.0 * noise(&mut state),
                    110.0,
                    t0() + ChronoDuration::microseconds((t * 1e6) as i64),
                ));
            }
            assert!(analyzer.analyze().is_none(), "noise produced a reading at {count} samples");
        }
    }

    #[test]
    fn test_buried_pulse_yields_nothing() {
        let mut state = 42;
        let mut analyzer = RppgAnalyzer::new(AnalyzerConfig::default());
        for i in 0..300 {
            let mut sample = pulse_sample(i, 72.0, 30.0);
            sample.g += 8.0 * noise(&mut state);
            analyzer.add_reading(sample);
        }
        assert!(analyzer.analyze().is_none());
    }

    #[test]
    fn test_motion_spike_downgrades_reading() {
        let mut analyzer = RppgAnalyzer::new(AnalyzerConfig::default());
        for i in 0..300 {
            let mut sample = pulse_sample(i, 72.0, 30.0);
            if i == 150 {
                sample.r += 20.0;
            }
            analyzer.add_reading(sample);
        }

        let reading = analyzer.analyze().expect("spike leaves the pulse intact");
        assert!(reading.motion_detected);
        assert_eq!(reading.quality, SignalQuality::Good);
        assert_abs_diff_eq!(reading.bpm, 72.0, epsilon = 2.0);
    }

    #[test]
    fn test_lighting_classification() {
        let analyzer = RppgAnalyzer::new(AnalyzerConfig::default());
        assert_eq!(
            analyzer.assess_lighting(&ColorSample::now(20.0, 20.0, 20.0)),
            LightingCondition::TooDark
        );
        assert_eq!(
            analyzer.assess_lighting(&ColorSample::now(250.0, 250.0, 250.0)),
            LightingCondition::TooBright
        );
        assert_eq!(
            analyzer.assess_lighting(&ColorSample::now(200.0, 140.0, 110.0)),
            LightingCondition::Good
        );
    }

    #[test]
    fn test_movement_threshold() {
        let analyzer = RppgAnalyzer::new(AnalyzerConfig::default());
        let still = ColorSample::now(200.0, 140.0, 110.0);
        let jitter = ColorSample::now(201.0, 141.5, 110.0);
        let jump = ColorSample::now(215.0, 150.0, 118.0);

        assert!(!analyzer.detect_movement(&still, &jitter));
        assert!(analyzer.detect_movement(&still, &jump));
        assert!(window_has_motion(analyzer.config(), &[still, jitter, jump]));
    }

    #[test]
    fn test_grade_table() {
        assert_eq!(grade(15.0, 0.95), SignalQuality::Excellent);
        assert_eq!(grade(15.0, 0.85), SignalQuality::Good);
        assert_eq!(grade(2.0, 0.95), SignalQuality::Fair);
        assert_eq!(grade(-3.0, 0.95), SignalQuality::Poor);
    }

    #[test]
    fn test_process_frame_skips_faceless_frames() {
        use crate::rppg::frame::FrameBuf;

        let mut analyzer = RppgAnalyzer::new(AnalyzerConfig::default());
        let background = FrameBuf::solid(32, 32, [10, 50, 20]);
        assert!(analyzer.process_frame(&background.as_frame(), Utc::now()).is_none());
        assert_eq!(analyzer.buffer().len(), 0);

        let face = FrameBuf::solid(32, 32, [200, 140, 110]);
        assert!(analyzer.process_frame(&face.as_frame(), Utc::now()).is_some());
        assert_eq!(analyzer.buffer().len(), 1);
    }
}
