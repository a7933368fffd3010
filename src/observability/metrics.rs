use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Capture counters shared between the sampling task and the session that
/// owns it. Per-frame source errors are silent at the cycle level but show
/// up here, per channel, in the end-of-recording statistics.
pub struct CaptureMetrics {
    frames_captured: AtomicU64,
    read_errors: Mutex<BTreeMap<String, u64>>,
}

impl CaptureMetrics {
    pub fn new() -> Self {
        Self {
            frames_captured: AtomicU64::new(0),
            read_errors: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn record_frame(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_read_error(&self, channel: &str) {
        let mut errors = self.read_errors.lock().unwrap();
        *errors.entry(channel.to_string()).or_insert(0) += 1;
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames_captured.load(Ordering::Relaxed)
    }

    pub fn read_errors(&self) -> BTreeMap<String, u64> {
        self.read_errors.lock().unwrap().clone()
    }

    pub fn report(&self, elapsed: Duration) -> CaptureReport {
        let frames = self.frames_captured();
        let secs = elapsed.as_secs_f64();
        CaptureReport {
            frames_captured: frames,
            elapsed_secs: secs,
            achieved_fps: if secs > 0.0 { frames as f64 / secs } else { 0.0 },
            read_errors: self.read_errors(),
        }
    }
}

impl Default for CaptureMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time snapshot of the capture counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureReport {
    pub frames_captured: u64,
    pub elapsed_secs: f64,
    pub achieved_fps: f64,
    pub read_errors: BTreeMap<String, u64>,
}

impl CaptureReport {
    pub fn render(&self) -> String {
        let mut report = String::from("=== Capture Metrics ===\n");
        report.push_str(&format!(
            "  Frames: {} in {:.1}s ({:.1} FPS)\n",
            self.frames_captured, self.elapsed_secs, self.achieved_fps
        ));

        if self.read_errors.is_empty() {
            report.push_str("  Read errors: none\n");
        } else {
            report.push_str("  Read errors:\n");
            for (channel, count) in &self.read_errors {
                report.push_str(&format!("    {channel}: {count}\n"));
            }
        }

        report
    }
}
