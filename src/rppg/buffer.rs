//! Bounded sliding window of color samples.
//!
//! The window is sized in samples (`window seconds x sample rate`). Inserting
//! into a full window evicts exactly the oldest sample; the buffer never grows
//! past its capacity and never reorders.

use crate::rppg::types::ColorSample;
use std::collections::VecDeque;
use std::time::Duration;

/// Fixed-capacity FIFO of [`ColorSample`]s.
#[derive(Debug, Clone)]
pub struct SignalBuffer {
    samples: VecDeque<ColorSample>,
    capacity: usize,
}

impl SignalBuffer {
    /// Create a buffer holding at most `capacity` samples (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Create a buffer covering `window` at `sample_rate_hz`.
    pub fn for_window(window: Duration, sample_rate_hz: f64) -> Self {
        let capacity = (window.as_secs_f64() * sample_rate_hz).round();
        Self::new(if capacity.is_finite() && capacity > 0.0 {
            capacity as usize
        } else {
            1
        })
    }

    /// Append a sample, evicting the oldest one when full.
    ///
    /// Returns the evicted sample, if any.
    pub fn push(&mut self, sample: ColorSample) -> Option<ColorSample> {
        let evicted = if self.samples.len() == self.capacity {
            self.samples.pop_front()
        } else {
            None
        };
        self.samples.push_back(sample);
        evicted
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fraction of capacity currently filled, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        self.samples.len() as f64 / self.capacity as f64
    }

    /// Most recently inserted sample.
    pub fn latest(&self) -> Option<&ColorSample> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColorSample> {
        self.samples.iter()
    }

    /// Copy of the current window in arrival order.
    ///
    /// Analysis runs on this copy so that capture can keep writing.
    pub fn snapshot(&self) -> Vec<ColorSample> {
        self.samples.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    fn sample(i: i64) -> ColorSample {
        let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        ColorSample::new(i as f64, i as f64, i as f64, t0 + ChronoDuration::milliseconds(i))
    }

    #[test]
    fn test_capacity_from_window() {
        let buffer = SignalBuffer::for_window(Duration::from_secs(10), 30.0);
        assert_eq!(buffer.capacity(), 300);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut buffer = SignalBuffer::new(5);
        for i in 0..50 {
            buffer.push(sample(i));
            assert!(buffer.len() <= 5);
        }
        assert_eq!(buffer.len(), 5);
    }

    #[test]
    fn test_evicts_single_oldest_in_order() {
        let mut buffer = SignalBuffer::new(3);
        assert!(buffer.push(sample(0)).is_none());
        buffer.push(sample(1));
        buffer.push(sample(2));

        let evicted = buffer.push(sample(3)).unwrap();
        assert_eq!(evicted.r, 0.0);

        let order: Vec<f64> = buffer.iter().map(|s| s.r).collect();
        assert_eq!(order, vec![1.0, 2.0, 3.0]);
        assert_eq!(buffer.latest().unwrap().r, 3.0);
    }

    #[test]
    fn test_progress_and_clear() {
        let mut buffer = SignalBuffer::new(4);
        buffer.push(sample(0));
        assert_eq!(buffer.progress(), 0.25);

        buffer.clear();
        assert_eq!(buffer.progress(), 0.0);
        assert!(buffer.snapshot().is_empty());
    }
}
