//! Signal conditioning for pulse extraction.
//!
//! All routines work on plain `f64` slices and allocate their output.

use rustfft::{num_complex::Complex, FftPlanner};
use statrs::statistics::{Data, OrderStatistics, Statistics};
use std::f64::consts::PI;

/// Cap for SNR when the noise floor vanishes (synthetic signals).
pub const MAX_SNR_DB: f64 = 30.0;

/// Half-width around the fundamental and its harmonic counted as signal, in Hz.
const SIGNAL_HALF_WIDTH_HZ: f64 = 0.15;

/// Remove the least-squares linear trend (offset and slope).
pub fn detrend(signal: &[f64]) -> Vec<f64> {
    let n = signal.len();
    if n < 2 {
        return vec![0.0; n];
    }

    let mean_x = (n - 1) as f64 / 2.0;
    let mean_y = signal.iter().mean();

    let mut cov = 0.0;
    let mut var = 0.0;
    for (i, &y) in signal.iter().enumerate() {
        let dx = i as f64 - mean_x;
        cov += dx * (y - mean_y);
        var += dx * dx;
    }
    let slope = if var > 0.0 { cov / var } else { 0.0 };

    signal
        .iter()
        .enumerate()
        .map(|(i, &y)| y - (mean_y + slope * (i as f64 - mean_x)))
        .collect()
}

/// Zero every spectral component outside `[min_hz, max_hz]`.
pub fn band_limit(signal: &[f64], sample_rate: f64, min_hz: f64, max_hz: f64) -> Vec<f64> {
    let n = signal.len();
    if n == 0 || sample_rate <= 0.0 {
        return Vec::new();
    }

    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(n);
    let inverse = planner.plan_fft_inverse(n);

    let mut spectrum: Vec<Complex<f64>> = signal.iter().map(|&s| Complex::new(s, 0.0)).collect();
    forward.process(&mut spectrum);

    let resolution = sample_rate / n as f64;
    for (k, bin) in spectrum.iter_mut().enumerate() {
        // Bins above n/2 mirror the negative frequencies.
        let freq = k.min(n - k) as f64 * resolution;
        if freq < min_hz || freq > max_hz {
            *bin = Complex::new(0.0, 0.0);
        }
    }

    inverse.process(&mut spectrum);
    spectrum.iter().map(|c| c.re / n as f64).collect()
}

/// Indices of local maxima above `threshold`, at least `min_distance` apart.
///
/// When two maxima are closer than `min_distance` the taller one wins.
/// Returned indices are in ascending order.
pub fn find_peaks(signal: &[f64], min_distance: usize, threshold: f64) -> Vec<usize> {
    if signal.len() < 3 {
        return Vec::new();
    }

    let mut candidates: Vec<usize> = (1..signal.len() - 1)
        .filter(|&i| {
            signal[i] > threshold && signal[i] > signal[i - 1] && signal[i] >= signal[i + 1]
        })
        .collect();

    candidates.sort_by(|&a, &b| signal[b].total_cmp(&signal[a]));

    let mut accepted: Vec<usize> = Vec::with_capacity(candidates.len());
    for idx in candidates {
        if accepted.iter().all(|&p| p.abs_diff(idx) >= min_distance) {
            accepted.push(idx);
        }
    }

    accepted.sort_unstable();
    accepted
}

/// Hann-windowed power spectrum, bins `0..=n/2`.
fn power_spectrum(signal: &[f64]) -> Vec<f64> {
    let n = signal.len();
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);

    let mut buffer: Vec<Complex<f64>> = signal
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let w = 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos();
            Complex::new(s * w, 0.0)
        })
        .collect();
    fft.process(&mut buffer);

    buffer[..=n / 2].iter().map(|c| c.norm_sqr()).collect()
}

/// Signal-to-noise ratio in dB of a pulse at `fundamental_hz`.
///
/// Signal energy is the power around the fundamental and its first harmonic;
/// noise is every other non-DC bin.
pub fn spectral_snr(signal: &[f64], sample_rate: f64, fundamental_hz: f64) -> f64 {
    let n = signal.len();
    if n < 4 || sample_rate <= 0.0 || fundamental_hz <= 0.0 {
        return 0.0;
    }

    let spectrum = power_spectrum(signal);
    let resolution = sample_rate / n as f64;
    let half_width = ((SIGNAL_HALF_WIDTH_HZ / resolution).ceil() as usize).max(2);

    let harmonics = [fundamental_hz, 2.0 * fundamental_hz];
    let mut signal_power = 0.0;
    let mut noise_power = 0.0;
    for (k, &power) in spectrum.iter().enumerate().skip(1) {
        let near_pulse = harmonics.iter().any(|&h| {
            let center = (h / resolution).round() as usize;
            k.abs_diff(center) <= half_width
        });
        if near_pulse {
            signal_power += power;
        } else {
            noise_power += power;
        }
    }

    if signal_power <= 0.0 {
        return -MAX_SNR_DB;
    }
    if noise_power <= f64::EPSILON * signal_power {
        return MAX_SNR_DB;
    }
    (10.0 * (signal_power / noise_power).log10()).clamp(-MAX_SNR_DB, MAX_SNR_DB)
}

/// Median of a set of values, `None` when empty.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut data = Data::new(values.to_vec());
    Some(data.median())
}

/// Population standard deviation, 0 for fewer than two values.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values.iter().population_std_dev()
}

/// Regularity of a set of intervals: `1 - coefficient of variation`, in `[0, 1]`.
pub fn regularity(intervals: &[f64]) -> f64 {
    if intervals.is_empty() {
        return 0.0;
    }
    let mean = intervals.iter().mean();
    if mean <= 0.0 {
        return 0.0;
    }
    (1.0 - std_dev(intervals) / mean).clamp(0.0, 1.0)
}
