// THEORY:
// A recorder with no camera and no files.
//
// While "recording" it renders a bright square sweeping across a grey
// background at the vision rate, so frame differencing sees steady motion and
// the whole controller can be exercised on a bench.

use crate::core_modules::frame_slot::{Frame, FrameSlot};
use crate::error::RecorderError;
use async_trait::async_trait;
use image::Rgb;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::info;

use super::Recorder;

const BACKGROUND: Rgb<u8> = Rgb([128, 128, 128]);
const SQUARE: Rgb<u8> = Rgb([230, 230, 230]);

/// Renders frame number `tick` of the synthetic scene.
pub fn synthetic_frame(width: u32, height: u32, tick: u64) -> Frame {
    let size = (height / 4).max(1).min(width);
    let step = (size / 2).max(1) as u64;
    let travel = (width - size) as u64 + 1;
    let left = ((tick * step) % travel) as u32;
    let top = (height - size.min(height)) / 2;

    let mut frame = Frame::from_pixel(width, height, BACKGROUND);
    for y in top..(top + size).min(height) {
        for x in left..left + size {
            frame.put_pixel(x, y, SQUARE);
        }
    }
    frame
}

pub struct SimulatedRecorder {
    width: u32,
    height: u32,
    fps: u32,
    slot: FrameSlot,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SimulatedRecorder {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            fps: fps.max(1),
            slot: FrameSlot::new(),
            task: Mutex::new(None),
        }
    }

    fn task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Recorder for SimulatedRecorder {
    async fn start(&self) -> Result<(), RecorderError> {
        let mut task = self.task();
        if task.is_some() {
            return Ok(());
        }
        let (width, height, slot) = (self.width, self.height, self.slot.clone());
        let period = Duration::from_secs_f64(1.0 / self.fps as f64);
        *task = Some(tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut tick = 0u64;
            loop {
                ticker.tick().await;
                slot.publish(synthetic_frame(width, height, tick));
                tick += 1;
            }
        }));
        info!(width, height, fps = self.fps, "simulated capture started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), RecorderError> {
        if let Some(task) = self.task().take() {
            task.abort();
            self.slot.clear();
            info!("simulated capture stopped");
        }
        Ok(())
    }

    fn latest_frame(&self) -> Option<Arc<Frame>> {
        self.slot.latest()
    }

    fn is_recording(&self) -> bool {
        self.task().is_some()
    }
}

impl Drop for SimulatedRecorder {
    fn drop(&mut self) {
        if let Some(task) = self.task().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::frame_diff::{FrameDiffConfig, FrameDiffDetector};
    use tokio::time::Instant;

    #[test]
    fn consecutive_frames_register_as_motion() {
        let mut detector = FrameDiffDetector::new(FrameDiffConfig::default());
        let base = Instant::now();
        assert!(!detector.detect_at(Some(&synthetic_frame(320, 240, 0)), base));
        let second = synthetic_frame(320, 240, 1);
        assert!(detector.detect_at(Some(&second), base + Duration::from_secs(1)));
    }

    #[test]
    fn square_wraps_inside_frame() {
        for tick in 0..200 {
            let frame = synthetic_frame(64, 48, tick);
            assert_eq!(frame.dimensions(), (64, 48));
        }
        // Degenerate geometry must not panic either.
        synthetic_frame(1, 1, 3);
        synthetic_frame(2, 40, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn frames_flow_only_while_recording() {
        let recorder = SimulatedRecorder::new(64, 48, 5);
        assert!(recorder.latest_frame().is_none());
        recorder.start().await.unwrap();
        recorder.start().await.unwrap();
        time::sleep(Duration::from_millis(450)).await;
        assert!(recorder.is_recording());
        assert!(recorder.latest_frame().is_some());

        recorder.stop().await.unwrap();
        recorder.stop().await.unwrap();
        assert!(!recorder.is_recording());
        assert!(recorder.latest_frame().is_none());
    }
}
