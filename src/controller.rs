// THEORY:
// The `Controller` is the top-level orchestrator. It wires the two motion sources
// to the `Arbiter` and carries out the arbiter's verdicts against the recorder and
// storage. It runs four cooperative loops inside one task:
//
// 1.  **Sensor Loop**: drains the distance sensor's event stream.
// 2.  **Vision Loop**: while recording, samples the newest camera frame every
//     `VISION_TICK` and turns visible change into camera events.
// 3.  **Timeout Loop**: every `TIMEOUT_TICK`, ends the recording once the
//     inactivity window has passed.
// 4.  **Status Loop**: optional periodic one-line summary for the journal.
//
// All state changes go through one async mutex around the arbiter, and the lock is
// held while the recorder starts or stops. Two near-simultaneous events from
// different loops can therefore never both start a recording.
//
// The loops are joined with `try_join!`: a recorder that refuses to start is
// fatal, it cancels every sibling and surfaces from `run`.

use crate::camera::Recorder;
use crate::core_modules::arbiter::{Arbiter, ArbiterSnapshot, ControllerState, Verdict};
use crate::core_modules::distance_filter::DistanceSample;
use crate::core_modules::frame_diff::{FrameDiffConfig, FrameDiffDetector};
use crate::core_modules::motion_event::MotionEvent;
use crate::error::{CamError, Result};
use crate::storage::Retention;
use futures::{Stream, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace};

/// Period of the vision loop.
pub const VISION_TICK: Duration = Duration::from_millis(100);
/// Period of the inactivity check.
pub const TIMEOUT_TICK: Duration = Duration::from_millis(200);

/// What the status line reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusReport {
    pub state: ControllerState,
    /// Smoothed distance from the feed, if one is attached and has a reading.
    pub distance_mm: Option<f64>,
    /// Time since the last motion that counted towards the recording.
    pub idle_for: Option<Duration>,
}

pub struct Controller {
    recorder: Arc<dyn Recorder>,
    storage: Arc<dyn Retention>,
    arbiter: Mutex<Arbiter>,
    vision: FrameDiffConfig,
    status_interval: Option<Duration>,
    distance: Option<watch::Receiver<Option<DistanceSample>>>,
}

impl Controller {
    pub fn new(recorder: Arc<dyn Recorder>, storage: Arc<dyn Retention>, inactivity: Duration) -> Self {
        Self {
            recorder,
            storage,
            arbiter: Mutex::new(Arbiter::new(inactivity)),
            vision: FrameDiffConfig {
                enabled: false,
                ..FrameDiffConfig::default()
            },
            status_interval: None,
            distance: None,
        }
    }

    /// Enables (or reconfigures) frame differencing while recording.
    pub fn with_vision(mut self, vision: FrameDiffConfig) -> Self {
        self.vision = vision;
        self
    }

    pub fn with_status_interval(mut self, interval: Option<Duration>) -> Self {
        self.status_interval = interval;
        self
    }

    /// Latest distance readings, shown in the status line.
    pub fn with_distance_feed(mut self, feed: watch::Receiver<Option<DistanceSample>>) -> Self {
        self.distance = Some(feed);
        self
    }

    pub async fn snapshot(&self) -> ArbiterSnapshot {
        self.arbiter.lock().await.snapshot()
    }

    pub async fn status(&self) -> StatusReport {
        let snapshot = self.snapshot().await;
        StatusReport {
            state: snapshot.state,
            distance_mm: self
                .distance
                .as_ref()
                .and_then(|feed| *feed.borrow())
                .map(|d| d.smoothed_mm),
            idle_for: snapshot.last_motion.map(|t| t.elapsed()),
        }
    }

    pub async fn state(&self) -> ControllerState {
        self.arbiter.lock().await.state()
    }

    /// Feeds one motion event through the arbiter and applies the verdict.
    ///
    /// Starting a recording runs a retention pass first. A recorder that fails to
    /// start is returned as `CamError::RecorderStart` and the state stays idle.
    pub async fn on_motion(&self, event: MotionEvent) -> Result<Verdict> {
        let mut arbiter = self.arbiter.lock().await;
        let verdict = arbiter.on_motion(&event);
        match verdict {
            Verdict::Debounced => {
                trace!(source = %event.source, "debounced");
            }
            Verdict::StartRecording => {
                info!(source = %event.source, score = event.score, "motion detected, starting recording");
                self.storage.ensure_free_space().await;
                self.recorder.start().await.map_err(CamError::RecorderStart)?;
                arbiter.recording_started(event.timestamp);
                info!(state = %arbiter.state(), "recording started");
            }
            Verdict::WindowExtended => {
                debug!(score = event.score, "visible motion, inactivity window extended");
            }
            Verdict::Noted => {
                debug!(score = event.score, "sensor motion while recording; window unchanged");
            }
        }
        Ok(verdict)
    }

    /// Stops the recording if the inactivity window has elapsed at `now`.
    /// Returns whether a stop happened.
    pub async fn check_inactivity(&self, now: Instant) -> bool {
        let mut arbiter = self.arbiter.lock().await;
        if !arbiter.inactivity_elapsed(now) {
            return false;
        }
        info!(
            "no motion for {}s, stopping recording",
            arbiter.inactivity().as_secs_f64()
        );
        self.stop_recording(&mut arbiter).await;
        true
    }

    async fn stop_recording(&self, arbiter: &mut Arbiter) {
        if let Err(e) = self.recorder.stop().await {
            error!(error = %e, "recorder failed to stop cleanly");
        }
        arbiter.recording_stopped();
        self.storage.ensure_free_space().await;
        info!(state = %arbiter.state(), "recording stopped");
    }

    async fn sensor_loop<S>(&self, events: S) -> Result<()>
    where
        S: Stream<Item = MotionEvent>,
    {
        futures::pin_mut!(events);
        while let Some(event) = events.next().await {
            self.on_motion(event).await?;
        }
        debug!("sensor event stream ended");
        Ok(())
    }

    async fn vision_loop(&self) -> Result<()> {
        let mut detector = FrameDiffDetector::new(self.vision);
        if !detector.enabled() {
            info!("vision motion disabled");
            return Ok(());
        }
        let mut ticker = time::interval(VISION_TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut was_recording = false;
        loop {
            ticker.tick().await;
            let recording = self.state().await == ControllerState::Recording;
            if !recording {
                if was_recording {
                    detector.reset();
                }
                was_recording = false;
                continue;
            }
            was_recording = true;

            let frame = self.recorder.latest_frame();
            if detector.detect(frame.as_deref()) {
                let event = MotionEvent::camera(Instant::now(), detector.last_changed_fraction());
                self.on_motion(event).await?;
            }
        }
    }

    async fn timeout_loop(&self) -> Result<()> {
        let mut ticker = time::interval(TIMEOUT_TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.check_inactivity(Instant::now()).await;
        }
    }

    async fn status_loop(&self) -> Result<()> {
        let Some(period) = self.status_interval else {
            return Ok(());
        };
        let mut ticker = time::interval(period);
        loop {
            ticker.tick().await;
            let report = self.status().await;
            info!(
                state = %report.state,
                distance_mm = ?report.distance_mm.map(f64::round),
                idle_for_s = ?report.idle_for.map(|d| d.as_secs()),
                "status"
            );
        }
    }

    /// Runs every loop until one of them fails.
    pub async fn run<S>(&self, sensor_events: S) -> Result<()>
    where
        S: Stream<Item = MotionEvent>,
    {
        info!(
            inactivity_s = self.arbiter.lock().await.inactivity().as_secs(),
            vision = self.vision.enabled,
            "controller running"
        );
        tokio::try_join!(
            self.sensor_loop(sensor_events),
            self.vision_loop(),
            self.timeout_loop(),
            self.status_loop(),
        )?;
        Ok(())
    }

    /// Runs until `shutdown` resolves or a loop fails, then stops any recording.
    pub async fn run_until<S, F>(&self, sensor_events: S, shutdown: F) -> Result<()>
    where
        S: Stream<Item = MotionEvent>,
        F: Future<Output = ()>,
    {
        let outcome = tokio::select! {
            result = self.run(sensor_events) => result,
            _ = shutdown => {
                info!("shutdown requested");
                Ok(())
            }
        };
        self.shutdown().await;
        outcome
    }

    /// Stops an in-progress recording. Safe to call any number of times.
    pub async fn shutdown(&self) {
        let mut arbiter = self.arbiter.lock().await;
        if arbiter.state() == ControllerState::Recording || self.recorder.is_recording() {
            self.stop_recording(&mut arbiter).await;
        }
    }
}
