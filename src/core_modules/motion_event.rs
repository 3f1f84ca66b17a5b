// THEORY:
// A `MotionEvent` is the only currency the arbitration layer accepts. Both
// detectors mint them, the controller spends each one exactly once. Events are
// plain immutable values: no detector keeps a handle to an event after sending it,
// so the arbiter never has to worry about an event changing underneath it.

use std::fmt;
use tokio::time::Instant;

/// Which detector produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionSource {
    /// The distance sensor saw the range shift past the hysteresis threshold.
    Sensor,
    /// Frame differencing saw enough of the picture change.
    Camera,
}

impl fmt::Display for MotionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionSource::Sensor => f.write_str("sensor"),
            MotionSource::Camera => f.write_str("camera"),
        }
    }
}

/// A single motion observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionEvent {
    pub source: MotionSource,
    /// Monotonic time the detector observed the change.
    pub timestamp: Instant,
    /// Magnitude of the change: millimetres of shift for sensor events, fraction of
    /// changed pixels for camera events.
    pub score: f64,
}

impl MotionEvent {
    pub fn sensor(timestamp: Instant, shift_mm: f64) -> Self {
        Self {
            source: MotionSource::Sensor,
            timestamp,
            score: shift_mm,
        }
    }

    pub fn camera(timestamp: Instant, changed_fraction: f64) -> Self {
        Self {
            source: MotionSource::Camera,
            timestamp,
            score: changed_fraction,
        }
    }
}
