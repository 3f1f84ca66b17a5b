// THEORY:
// The controller never talks to a camera directly. It holds an `Arc<dyn
// Recorder>` and needs exactly three things from it: start rolling, stop
// rolling, and "show me the newest frame you have". Everything else (encoder
// choice, file naming, segment length, how frames get into memory) is the
// recorder's business.
//
// Both operations are idempotent. The controller's state machine should never
// ask twice, but a shutdown racing a timeout can, and the recorder must shrug
// that off rather than spawn a second capture process.

pub mod process_recorder;
pub mod simulated;

use crate::config::{AppConfig, CameraBackend};
use crate::error::{RecorderError, Result};
use async_trait::async_trait;
use std::sync::Arc;

pub use crate::core_modules::frame_slot::Frame;
pub use process_recorder::{CaptureSettings, ProcessRecorder};
pub use simulated::SimulatedRecorder;

/// The recording collaborator.
#[async_trait]
pub trait Recorder: Send + Sync {
    /// Starts a recording. A no-op when already recording.
    async fn start(&self) -> std::result::Result<(), RecorderError>;

    /// Stops the current recording. A no-op when not recording.
    async fn stop(&self) -> std::result::Result<(), RecorderError>;

    /// Newest decoded frame, if the recorder has produced one.
    fn latest_frame(&self) -> Option<Arc<Frame>>;

    fn is_recording(&self) -> bool;
}

/// Builds the recorder selected by `camera.backend`.
pub fn build_recorder(config: &AppConfig) -> Result<Arc<dyn Recorder>> {
    Ok(match config.camera.backend {
        CameraBackend::Ffmpeg => Arc::new(ProcessRecorder::new(CaptureSettings::from_config(config))?),
        CameraBackend::Simulated => Arc::new(SimulatedRecorder::new(
            config.camera.width,
            config.camera.height,
            config.motion.vision_motion_fps.max(1),
        )),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CamError;

    #[test]
    fn simulated_backend_needs_no_tools() {
        let mut config = AppConfig::default();
        config.camera.backend = CameraBackend::Simulated;
        let recorder = build_recorder(&config).unwrap();
        assert!(!recorder.is_recording());
    }

    #[test]
    fn missing_capture_program_is_configuration_error() {
        let mut config = AppConfig::default();
        config.camera.program = "presence-cam-no-such-encoder".to_string();
        match build_recorder(&config) {
            Err(CamError::Configuration { message, .. }) => {
                assert!(message.contains("presence-cam-no-such-encoder"))
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("missing program accepted"),
        }
    }
}
