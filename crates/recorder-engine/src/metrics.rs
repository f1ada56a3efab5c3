//! Metrics collection and reporting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use recorder_ipc::{RecordingMetrics, WarningType};

/// Collects render loop and recording metrics.
pub struct MetricsCollector {
    frames_composed: AtomicU64,
    frames_encoded: AtomicU64,
    frames_duplicated: AtomicU64,
    degraded_ticks: AtomicU64,
    bytes_recorded: AtomicU64,
    last_report_time: RwLock<Instant>,
    last_frame_count: AtomicU64,
    last_tick: RwLock<Duration>,
    target_fps: f32,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    pub fn new(target_fps: f32) -> Self {
        Self {
            frames_composed: AtomicU64::new(0),
            frames_encoded: AtomicU64::new(0),
            frames_duplicated: AtomicU64::new(0),
            degraded_ticks: AtomicU64::new(0),
            bytes_recorded: AtomicU64::new(0),
            last_report_time: RwLock::new(Instant::now()),
            last_frame_count: AtomicU64::new(0),
            last_tick: RwLock::new(Duration::ZERO),
            target_fps,
        }
    }

    /// Record one compositor tick and how long it took.
    pub fn record_tick(&self, duration: Duration, degraded: bool) {
        self.frames_composed.fetch_add(1, Ordering::Relaxed);
        if degraded {
            self.degraded_ticks.fetch_add(1, Ordering::Relaxed);
        }
        *self.last_tick.write() = duration;
    }

    /// Record a tick that reused a source frame.
    pub fn record_duplicate(&self) {
        self.frames_duplicated.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a frame handed to the encoder.
    pub fn record_encoded(&self) {
        self.frames_encoded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record encoded bytes received.
    pub fn record_bytes(&self, bytes: u64) {
        self.bytes_recorded.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Reset the per-recording counters.
    pub fn reset_recording(&self) {
        self.frames_encoded.store(0, Ordering::Relaxed);
        self.bytes_recorded.store(0, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self, elapsed: Duration) -> RecordingMetrics {
        let now = Instant::now();

        let last_time = *self.last_report_time.read();
        let window = now.duration_since(last_time).as_secs_f32();
        let current_frames = self.frames_composed.load(Ordering::Relaxed);
        let last_frames = self.last_frame_count.load(Ordering::Relaxed);

        let fps = if window > 0.0 {
            current_frames.saturating_sub(last_frames) as f32 / window
        } else {
            0.0
        };

        RecordingMetrics {
            fps,
            target_fps: self.target_fps,
            frames_composed: current_frames,
            frames_encoded: self.frames_encoded.load(Ordering::Relaxed),
            frames_duplicated: self.frames_duplicated.load(Ordering::Relaxed),
            degraded_ticks: self.degraded_ticks.load(Ordering::Relaxed),
            bytes_recorded: self.bytes_recorded.load(Ordering::Relaxed),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// Check for warnings based on current metrics.
    pub fn check_warnings(&self) -> Vec<WarningType> {
        let mut warnings = Vec::new();

        let budget_ms = 1000.0 / self.target_fps.max(1.0);
        let tick_ms = self.last_tick.read().as_secs_f32() * 1000.0;
        if tick_ms > budget_ms {
            warnings.push(WarningType::SlowComposition { tick_ms, budget_ms });
        }

        warnings
    }

    /// Update last report time for FPS calculation.
    pub fn mark_reported(&self) {
        *self.last_report_time.write() = Instant::now();
        self.last_frame_count.store(
            self.frames_composed.load(Ordering::Relaxed),
            Ordering::Relaxed,
        );
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(recorder_ipc::DEFAULT_FPS as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_in_snapshot() {
        let metrics = MetricsCollector::new(30.0);
        metrics.record_tick(Duration::from_millis(5), false);
        metrics.record_tick(Duration::from_millis(5), true);
        metrics.record_duplicate();
        metrics.record_encoded();
        metrics.record_bytes(1024);

        let snapshot = metrics.snapshot(Duration::from_millis(1500));
        assert_eq!(snapshot.frames_composed, 2);
        assert_eq!(snapshot.degraded_ticks, 1);
        assert_eq!(snapshot.frames_duplicated, 1);
        assert_eq!(snapshot.frames_encoded, 1);
        assert_eq!(snapshot.bytes_recorded, 1024);
        assert_eq!(snapshot.elapsed_ms, 1500);
        assert_eq!(snapshot.target_fps, 30.0);
    }

    #[test]
    fn test_slow_tick_warning() {
        let metrics = MetricsCollector::new(30.0);
        metrics.record_tick(Duration::from_millis(10), false);
        assert!(metrics.check_warnings().is_empty());

        metrics.record_tick(Duration::from_millis(50), false);
        let warnings = metrics.check_warnings();
        assert!(matches!(
            warnings.as_slice(),
            [WarningType::SlowComposition { .. }]
        ));
    }

    #[test]
    fn test_reset_recording_keeps_render_counters() {
        let metrics = MetricsCollector::default();
        metrics.record_tick(Duration::ZERO, false);
        metrics.record_encoded();
        metrics.reset_recording();
        let snapshot = metrics.snapshot(Duration::ZERO);
        assert_eq!(snapshot.frames_composed, 1);
        assert_eq!(snapshot.frames_encoded, 0);
    }
}
