//! Capture and analysis scheduling for a monitoring session.
//!
//! A session runs two periodic ticks over one shared window:
//!
//! - **capture** (~33 ms): pull a frame, locate the face, buffer its mean color
//! - **analysis** (~1 s): snapshot the window and estimate heart rate
//!
//! Analysis always works on a copy of the window, so a slow estimate never
//! stalls capture and never sees a half-written window.
//!
//! [`SessionDriver`] runs both ticks on simulated time for deterministic use.
//! [`RppgSession`] runs them on their own threads with real timers.

use crate::config::Config;
use crate::rppg::analyzer::{estimate_reading, AnalyzerConfig, RppgAnalyzer};
use crate::rppg::buffer::SignalBuffer;
use crate::rppg::frame::{detect_roi, extract_color, FrameBuf};
use crate::rppg::types::{ColorSample, RppgReading};
use crate::transparency::{create_shared_log, SharedAuditLog};
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, select, tick, Receiver, Sender, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Readings held for consumers before new ones are dropped.
const READING_QUEUE: usize = 64;

/// Shortest tick period accepted.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Supplier of raw frames, one per capture tick.
///
/// The session owns the source while it runs. A `None` means no frame is
/// available this tick; capture simply continues on the next one.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Option<FrameBuf>;
}

impl<F> FrameSource for F
where
    F: FnMut() -> Option<FrameBuf> + Send,
{
    fn next_frame(&mut self) -> Option<FrameBuf> {
        self()
    }
}

/// Kind of scheduled work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Capture,
    Analyze,
}

/// Deterministic schedule of capture and analysis ticks.
///
/// The first capture fires at zero, the first analysis one analysis period
/// later. When both fall on the same instant, capture goes first.
#[derive(Debug, Clone)]
pub struct TickSchedule {
    capture_interval: Duration,
    analysis_interval: Duration,
    next_capture: Duration,
    next_analysis: Duration,
}

impl TickSchedule {
    pub fn new(capture_interval: Duration, analysis_interval: Duration) -> Self {
        let analysis_interval = analysis_interval.max(MIN_INTERVAL);
        Self {
            capture_interval: capture_interval.max(MIN_INTERVAL),
            analysis_interval,
            next_capture: Duration::ZERO,
            next_analysis: analysis_interval,
        }
    }

    /// All ticks due up to and including `elapsed`, in firing order.
    pub fn due(&mut self, elapsed: Duration) -> Vec<(Duration, Tick)> {
        let mut ticks = Vec::new();
        loop {
            let capture_first = self.next_capture <= self.next_analysis;
            let next = if capture_first {
                self.next_capture
            } else {
                self.next_analysis
            };
            if next > elapsed {
                break;
            }
            if capture_first {
                ticks.push((next, Tick::Capture));
                self.next_capture += self.capture_interval;
            } else {
                ticks.push((next, Tick::Analyze));
                self.next_analysis += self.analysis_interval;
            }
        }
        ticks
    }
}

/// Reduce one frame to a color sample, recording the outcome.
fn capture_sample(
    source: &mut dyn FrameSource,
    timestamp: DateTime<Utc>,
    audit: &SharedAuditLog,
) -> Option<ColorSample> {
    let frame = source.next_frame()?;
    let view = frame.as_frame();
    let roi = detect_roi(&view);
    match extract_color(&view, roi.as_ref(), timestamp) {
        Some(sample) => {
            audit.record_frame_captured();
            Some(sample)
        }
        None => {
            tracing::trace!("no face region in frame");
            audit.record_frame_skipped();
            None
        }
    }
}

/// Estimate a reading from a window snapshot, recording the outcome.
fn analyze_snapshot(
    config: &AnalyzerConfig,
    snapshot: &[ColorSample],
    capacity: usize,
    audit: &SharedAuditLog,
) -> Option<RppgReading> {
    let reading = estimate_reading(config, snapshot, capacity);
    match &reading {
        Some(r) => {
            tracing::debug!(bpm = r.bpm, snr = r.snr, quality = %r.quality, "pulse reading");
            audit.record_reading();
        }
        None => audit.record_analysis_suppressed(),
    }
    reading
}

/// Single-threaded session on simulated time.
pub struct SessionDriver<S: FrameSource> {
    analyzer: RppgAnalyzer,
    source: S,
    schedule: TickSchedule,
    started_at: DateTime<Utc>,
    audit: SharedAuditLog,
}

impl<S: FrameSource> SessionDriver<S> {
    pub fn new(config: &Config, source: S, started_at: DateTime<Utc>) -> Self {
        Self {
            analyzer: RppgAnalyzer::new(config.analyzer.clone()),
            source,
            schedule: TickSchedule::new(config.capture_interval, config.analysis_interval),
            started_at,
            audit: create_shared_log(),
        }
    }

    pub fn with_audit(mut self, audit: SharedAuditLog) -> Self {
        self.audit = audit;
        self
    }

    pub fn analyzer(&self) -> &RppgAnalyzer {
        &self.analyzer
    }

    pub fn audit(&self) -> &SharedAuditLog {
        &self.audit
    }

    /// Run every tick due up to `elapsed` since start.
    ///
    /// Returns the readings produced, oldest first.
    pub fn advance_to(&mut self, elapsed: Duration) -> Vec<RppgReading> {
        let mut readings = Vec::new();
        for (at, tick) in self.schedule.due(elapsed) {
            match tick {
                Tick::Capture => {
                    let timestamp = self.started_at
                        + chrono::Duration::from_std(at).unwrap_or_else(|_| chrono::Duration::zero());
                    if let Some(sample) = capture_sample(&mut self.source, timestamp, &self.audit) {
                        self.analyzer.add_reading(sample);
                    }
                }
                Tick::Analyze => {
                    let buffer = self.analyzer.buffer();
                    if let Some(reading) = analyze_snapshot(
                        self.analyzer.config(),
                        &buffer.snapshot(),
                        buffer.capacity(),
                        &self.audit,
                    ) {
                        readings.push(reading);
                    }
                }
            }
        }
        readings
    }

    /// End the session, discarding the window and handing back the source.
    pub fn stop(mut self) -> S {
        self.analyzer.clear_buffer();
        self.source
    }
}

/// Live session running capture and analysis on their own threads.
///
/// Dropping the session stops it.
pub struct RppgSession {
    stop_tx: Option<Sender<()>>,
    stop_rx: Receiver<()>,
    workers: Vec<JoinHandle<()>>,
    buffer: Arc<Mutex<SignalBuffer>>,
    readings: Receiver<RppgReading>,
    audit: SharedAuditLog,
}

impl RppgSession {
    /// Acquire both ticks and start sampling from `source`.
    pub fn start<S>(config: &Config, source: S, audit: SharedAuditLog) -> Self
    where
        S: FrameSource + 'static,
    {
        let analyzer_config = config.analyzer.clone();
        let buffer = Arc::new(Mutex::new(SignalBuffer::for_window(
            analyzer_config.window,
            analyzer_config.sample_rate_hz,
        )));
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let (reading_tx, reading_rx) = bounded::<RppgReading>(READING_QUEUE);

        let capture = spawn_capture(
            source,
            config.capture_interval.max(MIN_INTERVAL),
            Arc::clone(&buffer),
            stop_rx.clone(),
            Arc::clone(&audit),
        );
        let analysis = spawn_analysis(
            analyzer_config,
            config.analysis_interval.max(MIN_INTERVAL),
            Arc::clone(&buffer),
            reading_tx,
            stop_rx.clone(),
            Arc::clone(&audit),
        );

        tracing::info!(
            capture_ms = config.capture_interval.as_millis() as u64,
            analysis_ms = config.analysis_interval.as_millis() as u64,
            "pulse session started"
        );

        Self {
            stop_tx: Some(stop_tx),
            stop_rx,
            workers: vec![capture, analysis],
            buffer,
            readings: reading_rx,
            audit,
        }
    }

    /// Receiver for readings, one per successful analysis tick.
    pub fn readings(&self) -> &Receiver<RppgReading> {
        &self.readings
    }

    /// Deliver readings to `callback` on a dispatcher thread.
    ///
    /// The callback draws from the same queue as [`readings`](Self::readings).
    /// A slow callback delays only later callbacks, never capture or analysis.
    pub fn on_reading<F>(&mut self, mut callback: F)
    where
        F: FnMut(RppgReading) + Send + 'static,
    {
        if !self.is_running() {
            return;
        }
        let readings = self.readings.clone();
        let stop_rx = self.stop_rx.clone();
        let handle = thread::spawn(move || loop {
            select! {
                recv(stop_rx) -> _ => break,
                recv(readings) -> msg => match msg {
                    Ok(reading) => callback(reading),
                    Err(_) => break,
                },
            }
        });
        self.workers.push(handle);
    }

    pub fn is_running(&self) -> bool {
        self.stop_tx.is_some()
    }

    /// Fraction of the window currently filled.
    pub fn buffer_progress(&self) -> f64 {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .progress()
    }

    pub fn audit(&self) -> &SharedAuditLog {
        &self.audit
    }

    /// Halt both ticks, wait for the workers and discard the window.
    pub fn stop(&mut self) {
        let Some(stop_tx) = self.stop_tx.take() else {
            return;
        };
        drop(stop_tx);

        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::warn!("session worker panicked");
            }
        }

        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        tracing::info!("pulse session stopped");
    }
}

impl Drop for RppgSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_capture<S>(
    mut source: S,
    interval: Duration,
    buffer: Arc<Mutex<SignalBuffer>>,
    stop_rx: Receiver<()>,
    audit: SharedAuditLog,
) -> JoinHandle<()>
where
    S: FrameSource + 'static,
{
    thread::spawn(move || {
        let ticker = tick(interval);
        loop {
            select! {
                recv(stop_rx) -> _ => break,
                recv(ticker) -> _ => {
                    if let Some(sample) = capture_sample(&mut source, Utc::now(), &audit) {
                        buffer
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push(sample);
                    }
                }
            }
        }
    })
}

fn spawn_analysis(
    config: AnalyzerConfig,
    interval: Duration,
    buffer: Arc<Mutex<SignalBuffer>>,
    readings: Sender<RppgReading>,
    stop_rx: Receiver<()>,
    audit: SharedAuditLog,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let ticker = tick(interval);
        loop {
            select! {
                recv(stop_rx) -> _ => break,
                recv(ticker) -> _ => {
                    let (snapshot, capacity) = {
                        let guard = buffer.lock().unwrap_or_else(PoisonError::into_inner);
                        (guard.snapshot(), guard.capacity())
                    };
                    if let Some(reading) = analyze_snapshot(&config, &snapshot, capacity, &audit) {
                        match readings.try_send(reading) {
                            Ok(()) => {}
                            Err(TrySendError::Full(_)) => {
                                tracing::debug!("reading queue full, dropping reading");
                            }
                            Err(TrySendError::Disconnected(_)) => break,
                        }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rppg::synthetic::SyntheticFrameSource;
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    fn start_time() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.capture_interval = Duration::from_micros(33_333);
        config
    }

    #[test]
    fn test_schedule_orders_ticks() {
        let mut schedule =
            TickSchedule::new(Duration::from_millis(400), Duration::from_millis(1000));
        let ticks: Vec<Tick> = schedule
            .due(Duration::from_millis(1200))
            .into_iter()
            .map(|(_, t)| t)
            .collect();
        assert_eq!(
            ticks,
            vec![
                Tick::Capture,
                Tick::Capture,
                Tick::Capture,
                Tick::Analyze,
                Tick::Capture,
            ]
        );
        assert!(schedule.due(Duration::from_millis(1200)).is_empty());
    }

    #[test]
    fn test_schedule_capture_before_analysis_on_tie() {
        let mut schedule =
            TickSchedule::new(Duration::from_millis(500), Duration::from_millis(1000));
        let ticks = schedule.due(Duration::from_millis(1000));
        assert_eq!(ticks.last().unwrap(), &(Duration::from_millis(1000), Tick::Analyze));
        assert_eq!(ticks[2], (Duration::from_millis(1000), Tick::Capture));
    }

    #[test]
    fn test_driver_produces_readings_once_ready() {
        let source = SyntheticFrameSource::new(72.0, 30.0);
        let mut driver = SessionDriver::new(&fast_config(), source, start_time());

        // Five seconds is below the readiness threshold of a 10 s window.
        assert!(driver.advance_to(Duration::from_secs(5)).is_empty());
        assert!(driver.analyzer().buffer_progress() < 0.6);

        let readings = driver.advance_to(Duration::from_secs(12));
        assert!(!readings.is_empty());
        let last = readings.last().unwrap();
        assert_abs_diff_eq!(last.bpm, 72.0, epsilon = 3.0);

        let stats = driver.audit().stats();
        assert_eq!(stats.readings_produced, readings.len() as u64);
        assert!(stats.analyses_suppressed >= 5);
    }

    #[test]
    fn test_driver_skips_faceless_frames() {
        let source = SyntheticFrameSource::new(72.0, 30.0).with_dropout_every(10);
        let mut driver = SessionDriver::new(&fast_config(), source, start_time());
        driver.advance_to(Duration::from_secs(3));

        let stats = driver.audit().stats();
        assert!(stats.frames_skipped > 0);
        assert_eq!(driver.analyzer().buffer().len() as u64, stats.frames_captured);
    }

    #[test]
    fn test_driver_suppresses_pulseless_face() {
        let source = SyntheticFrameSource::new(72.0, 30.0).with_amplitude(0.0);
        let mut driver = SessionDriver::new(&fast_config(), source, start_time());

        assert!(driver.advance_to(Duration::from_secs(12)).is_empty());
        let stats = driver.audit().stats();
        assert_eq!(stats.readings_produced, 0);
        assert_eq!(stats.analyses_suppressed, 12);
        assert!(driver.analyzer().buffer_progress() >= 0.6);
    }

    #[test]
    fn test_driver_stop_returns_source() {
        let source = SyntheticFrameSource::new(72.0, 30.0);
        let mut driver = SessionDriver::new(&fast_config(), source, start_time());
        driver.advance_to(Duration::from_secs(1));
        let source = driver.stop();
        assert!(source.frames_rendered() > 0);
    }

    #[test]
    fn test_live_session_stops_cleanly() {
        let mut config = Config::default();
        config.capture_interval = Duration::from_millis(5);
        config.analysis_interval = Duration::from_millis(20);

        let audit = create_shared_log();
        let mut session =
            RppgSession::start(&config, SyntheticFrameSource::new(72.0, 200.0), Arc::clone(&audit));
        assert!(session.is_running());

        thread::sleep(Duration::from_millis(100));
        assert!(audit.stats().frames_captured > 0);

        session.stop();
        assert!(!session.is_running());
        assert_eq!(session.buffer_progress(), 0.0);

        let captured = audit.stats().frames_captured;
        thread::sleep(Duration::from_millis(30));
        assert_eq!(audit.stats().frames_captured, captured);

        // Stopping twice is a no-op.
        session.stop();
    }

    #[test]
    fn test_closure_frame_source() {
        let mut calls = 0u32;
        let mut source = move || {
            calls += 1;
            if calls % 2 == 0 {
                None
            } else {
                Some(FrameBuf::solid(8, 8, [200, 140, 110]))
            }
        };
        assert!(source.next_frame().is_some());
        assert!(source.next_frame().is_none());
    }
}
