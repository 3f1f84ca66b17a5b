// THEORY:
// The `Arbiter` is the pure decision core of the controller. It owns the only
// copy of the recording state and the inactivity timer, and it decides what each
// incoming event means. It performs no I/O: the controller asks it for a verdict,
// carries out the side effect (start the recorder, stop it, prune storage), and
// then reports the outcome back so the state only changes once the side effect
// actually happened.
//
// Rules:
// 1.  **Debounce**: An event arriving less than `DEBOUNCE` after the previously
//     accepted one is dropped on the floor: no state change, no timer reset.
// 2.  **Idle**: Any accepted event, from either source, asks for a recording.
// 3.  **Recording**: Only camera events extend the inactivity window. Sensor
//     events still count for debounce, but a sensor hovering near its hysteresis
//     threshold must not be able to keep a recording alive forever; once video is
//     rolling, only visible motion justifies more footage.
// 4.  **Timeout**: A recording ends when no qualifying motion was seen for the
//     configured inactivity window.

use crate::core_modules::motion_event::{MotionEvent, MotionSource};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Minimum spacing between two accepted events.
pub const DEBOUNCE: Duration = Duration::from_millis(500);

/// Whether the camera is currently rolling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerState {
    #[default]
    Idle,
    Recording,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerState::Idle => f.write_str("idle"),
            ControllerState::Recording => f.write_str("recording"),
        }
    }
}

/// What the controller should do about an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Too close to the previous accepted event; ignore it.
    Debounced,
    /// Idle and motion seen: start recording, then call `recording_started`.
    StartRecording,
    /// Recording and the camera confirmed motion: the window was extended.
    WindowExtended,
    /// Recording and the sensor saw something: noted, window unchanged.
    Noted,
}

/// Read-only copy of the arbiter's state, for status reporting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArbiterSnapshot {
    pub state: ControllerState,
    pub last_motion: Option<Instant>,
    pub last_accepted: Option<Instant>,
}

/// Idle/Recording state machine with debounce and per-source timer rules.
#[derive(Debug, Clone)]
pub struct Arbiter {
    state: ControllerState,
    inactivity: Duration,
    last_accepted: Option<Instant>,
    last_motion: Option<Instant>,
}

impl Arbiter {
    pub fn new(inactivity: Duration) -> Self {
        Self {
            state: ControllerState::Idle,
            inactivity,
            last_accepted: None,
            last_motion: None,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn inactivity(&self) -> Duration {
        self.inactivity
    }

    pub fn snapshot(&self) -> ArbiterSnapshot {
        ArbiterSnapshot {
            state: self.state,
            last_motion: self.last_motion,
            last_accepted: self.last_accepted,
        }
    }

    /// Classifies an incoming event and updates debounce/timer bookkeeping.
    pub fn on_motion(&mut self, event: &MotionEvent) -> Verdict {
        if let Some(last) = self.last_accepted {
            // An event stamped before the last accepted one counts as zero spacing.
            if event.timestamp.saturating_duration_since(last) < DEBOUNCE {
                return Verdict::Debounced;
            }
        }
        self.last_accepted = Some(event.timestamp);

        match (self.state, event.source) {
            (ControllerState::Idle, _) => Verdict::StartRecording,
            (ControllerState::Recording, MotionSource::Camera) => {
                self.last_motion = Some(event.timestamp);
                Verdict::WindowExtended
            }
            (ControllerState::Recording, MotionSource::Sensor) => Verdict::Noted,
        }
    }

    /// The recorder is running; the inactivity window starts at `motion_at`.
    pub fn recording_started(&mut self, motion_at: Instant) {
        self.state = ControllerState::Recording;
        self.last_motion = Some(motion_at);
    }

    /// True when a recording has gone a full inactivity window without motion.
    pub fn inactivity_elapsed(&self, now: Instant) -> bool {
        match (self.state, self.last_motion) {
            (ControllerState::Recording, Some(last)) => {
                now.saturating_duration_since(last) >= self.inactivity
            }
            _ => false,
        }
    }

    /// The recorder was told to stop; back to idle.
    pub fn recording_stopped(&mut self) {
        self.state = ControllerState::Idle;
        self.last_motion = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(base: Instant, millis: u64) -> Instant {
        base + Duration::from_millis(millis)
    }

    fn recording(base: Instant) -> Arbiter {
        let mut arbiter = Arbiter::new(Duration::from_secs(10));
        assert_eq!(
            arbiter.on_motion(&MotionEvent::sensor(base, 45.0)),
            Verdict::StartRecording
        );
        arbiter.recording_started(base);
        arbiter
    }

    #[test]
    fn idle_event_requests_recording_without_changing_state() {
        let base = Instant::now();
        let mut arbiter = Arbiter::new(Duration::from_secs(10));
        assert_eq!(
            arbiter.on_motion(&MotionEvent::camera(base, 0.5)),
            Verdict::StartRecording
        );
        // Until the recorder confirms, we are still idle.
        assert_eq!(arbiter.state(), ControllerState::Idle);
        arbiter.recording_started(base);
        assert_eq!(arbiter.state(), ControllerState::Recording);
    }

    #[test]
    fn events_inside_debounce_window_are_dropped() {
        let base = Instant::now();
        let mut arbiter = recording(base);
        let verdict = arbiter.on_motion(&MotionEvent::camera(at(base, 499), 1.0));
        assert_eq!(verdict, Verdict::Debounced);
        assert_eq!(arbiter.snapshot().last_motion, Some(base));
        assert_eq!(arbiter.snapshot().last_accepted, Some(base));
    }

    #[test]
    fn events_at_debounce_boundary_are_accepted() {
        let base = Instant::now();
        let mut arbiter = recording(base);
        let verdict = arbiter.on_motion(&MotionEvent::camera(at(base, 500), 1.0));
        assert_eq!(verdict, Verdict::WindowExtended);
        assert_eq!(arbiter.snapshot().last_motion, Some(at(base, 500)));
    }

    #[test]
    fn sensor_never_extends_recording() {
        let base = Instant::now();
        let mut arbiter = recording(base);
        for step in 1..=20 {
            let verdict = arbiter.on_motion(&MotionEvent::sensor(at(base, step * 600), 50.0));
            assert_eq!(verdict, Verdict::Noted);
        }
        assert_eq!(arbiter.snapshot().last_motion, Some(base));
        assert!(arbiter.inactivity_elapsed(at(base, 10_000)));
    }

    #[test]
    fn sensor_event_still_debounces_camera() {
        let base = Instant::now();
        let mut arbiter = recording(base);
        assert_eq!(
            arbiter.on_motion(&MotionEvent::sensor(at(base, 1000), 50.0)),
            Verdict::Noted
        );
        assert_eq!(
            arbiter.on_motion(&MotionEvent::camera(at(base, 1200), 1.0)),
            Verdict::Debounced
        );
    }

    #[test]
    fn stale_timestamp_counts_as_zero_spacing() {
        let base = Instant::now();
        let mut arbiter = recording(at(base, 1000));
        assert_eq!(
            arbiter.on_motion(&MotionEvent::camera(base, 1.0)),
            Verdict::Debounced
        );
    }

    #[test]
    fn timeout_is_inclusive() {
        let base = Instant::now();
        let arbiter = recording(base);
        assert!(!arbiter.inactivity_elapsed(at(base, 9_999)));
        assert!(arbiter.inactivity_elapsed(at(base, 10_000)));
    }

    #[test]
    fn idle_never_times_out() {
        let base = Instant::now();
        let arbiter = Arbiter::new(Duration::from_secs(1));
        assert!(!arbiter.inactivity_elapsed(at(base, 60_000)));
    }

    #[test]
    fn stop_clears_timer() {
        let base = Instant::now();
        let mut arbiter = recording(base);
        arbiter.recording_stopped();
        assert_eq!(arbiter.state(), ControllerState::Idle);
        assert!(arbiter.snapshot().last_motion.is_none());
        // Next accepted event starts a fresh recording.
        assert_eq!(
            arbiter.on_motion(&MotionEvent::sensor(at(base, 20_000), 45.0)),
            Verdict::StartRecording
        );
    }
}
