// THEORY:
// Service configuration, loaded from TOML.
//
// Every key has a default so a config file only needs the values that differ
// on a given device. The loaded value is validated once at startup and then
// passed down explicitly; nothing reads configuration from a global.

use crate::core_modules::distance_filter::FilterConfig;
use crate::core_modules::frame_diff::FrameDiffConfig;
use crate::error::{CamError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub camera: CameraConfig,
    pub motion: MotionConfig,
    pub sensor: SensorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Where segments are written and pruned.
    pub output_dir: PathBuf,
    /// Free-space floor kept on the filesystem holding `output_dir`.
    pub min_free_mb: u64,
    /// Length of each recorded segment.
    pub segment_seconds: u64,
    /// Recording stops after this long without qualifying motion.
    pub inactivity_seconds: u64,
    /// Period of the status log line; `0` turns the status loop off.
    pub status_interval_seconds: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./videos"),
            min_free_mb: 1024,
            segment_seconds: 30,
            inactivity_seconds: 10,
            status_interval_seconds: 0,
        }
    }
}

/// Which recorder implementation drives the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraBackend {
    /// An external capture process (ffmpeg) writing segments and a raw analysis stream.
    Ffmpeg,
    /// Synthetic frames, no files. For bench testing without a camera.
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub backend: CameraBackend,
    /// Capture program, looked up on `PATH` unless absolute.
    pub program: String,
    /// Capture input format (`-f` of ffmpeg), e.g. `v4l2`.
    pub input_format: String,
    /// Capture device, e.g. `/dev/video0`.
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            backend: CameraBackend::Ffmpeg,
            program: "ffmpeg".to_string(),
            input_format: "v4l2".to_string(),
            device: "/dev/video0".to_string(),
            width: 1280,
            height: 720,
            fps: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub enable_vision_motion: bool,
    /// Turn vision off on installations that have a radar or lidar instead.
    pub disable_vision_if_radar_or_lidar: bool,
    pub has_radar_or_lidar: bool,
    pub vision_motion_fps: u32,
    /// Per-pixel luma change that counts as motion; higher is less sensitive.
    pub vision_motion_sensitivity: u32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            enable_vision_motion: true,
            disable_vision_if_radar_or_lidar: true,
            has_radar_or_lidar: false,
            vision_motion_fps: 5,
            vision_motion_sensitivity: 25,
        }
    }
}

impl MotionConfig {
    /// Whether frame differencing should run at all.
    pub fn vision_enabled(&self) -> bool {
        self.enable_vision_motion
            && !(self.disable_vision_if_radar_or_lidar && self.has_radar_or_lidar)
    }

    pub fn frame_diff(&self) -> FrameDiffConfig {
        FrameDiffConfig {
            enabled: self.vision_enabled(),
            sample_fps: self.vision_motion_fps,
            sensitivity: self.vision_motion_sensitivity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub poll_hz: u32,
    /// Use the random-walk simulator instead of real hardware.
    pub simulate: bool,
    pub i2c_bus: u8,
    pub i2c_address: u16,
    /// Zones reporting a lower confidence are ignored (0-255).
    pub min_confidence: u8,
    /// Optional 188-byte factory calibration blob.
    pub calibration_file: Option<PathBuf>,
    /// EMA weight of the newest reading; `0` disables smoothing.
    pub smooth_alpha: f64,
    pub hysteresis_mm: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            poll_hz: 8,
            simulate: false,
            i2c_bus: 1,
            i2c_address: 0x41,
            min_confidence: 5,
            calibration_file: None,
            smooth_alpha: 0.25,
            hysteresis_mm: 40.0,
        }
    }
}

impl SensorConfig {
    pub fn filter(&self) -> FilterConfig {
        FilterConfig {
            alpha: self.smooth_alpha,
            hysteresis_mm: self.hysteresis_mm,
            min_confidence: self.min_confidence,
        }
    }

    pub fn poll_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.poll_hz.max(1) as f64)
    }
}

impl AppConfig {
    /// Reads and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CamError::configuration(
                format!("cannot read config file {}: {e}", path.display()),
                "pass an existing file with --config (see config.example.toml)",
            )
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(text).map_err(|e| {
            CamError::configuration(
                format!("invalid config: {e}"),
                "check key names and value types against config.example.toml",
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |message: &str, hint: &str| Err(CamError::configuration(message, hint));

        if self.sensor.poll_hz == 0 {
            return fail("sensor.poll_hz must be > 0", "8 Hz is a good default");
        }
        if !(0.0..=1.0).contains(&self.sensor.smooth_alpha) {
            return fail(
                "sensor.smooth_alpha must be within 0.0..=1.0",
                "use 0 to disable smoothing, 0.2-0.4 for moderate smoothing",
            );
        }
        if !self.sensor.hysteresis_mm.is_finite() || self.sensor.hysteresis_mm <= 0.0 {
            return fail(
                "sensor.hysteresis_mm must be a positive number",
                "40 mm filters typical sensor noise",
            );
        }
        if self.service.inactivity_seconds == 0 {
            return fail(
                "service.inactivity_seconds must be > 0",
                "a recording needs a non-empty inactivity window",
            );
        }
        if self.service.segment_seconds == 0 {
            return fail("service.segment_seconds must be > 0", "30 s is the default");
        }
        if self.camera.width == 0 || self.camera.height == 0 || self.camera.fps == 0 {
            return fail(
                "camera.width, camera.height and camera.fps must be > 0",
                "use a mode the camera supports, e.g. 1280x720 at 30 fps",
            );
        }
        Ok(())
    }

    pub fn min_free_bytes(&self) -> u64 {
        self.service.min_free_mb.saturating_mul(1024 * 1024)
    }

    pub fn inactivity(&self) -> Duration {
        Duration::from_secs(self.service.inactivity_seconds)
    }

    pub fn status_interval(&self) -> Option<Duration> {
        match self.service.status_interval_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}
