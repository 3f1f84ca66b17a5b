// THEORY:
// The `FrameDiffDetector` is the cheap, second-opinion motion cue. It only runs
// while a recording is already in progress and its sole job is to answer "is
// there still visible motion?", so it trades accuracy for a tiny CPU budget:
//
// 1.  **Coarse Sampling**: Instead of touching every pixel, it reads one pixel
//     out of every `SAMPLE_STRIDE` in both directions. A 1280x720 frame becomes
//     an 80x45 grid: 3600 reads instead of almost a million.
// 2.  **Luma Only**: Each sampled pixel is collapsed to a single perceptual
//     brightness value. Motion shows up as brightness change long before colour
//     analysis would add anything useful.
// 3.  **Changed-Fraction Decision**: A pixel "changed" when its luma moved by more
//     than `sensitivity` since the previous sampled frame. Motion is declared when
//     more than `MOTION_FRACTION` of the grid changed, which ignores sensor noise
//     and a handful of flickering pixels.
// 4.  **Rate Limiting**: At most `sample_fps` frames per second are evaluated,
//     whatever rate the caller polls at.

use crate::core_modules::frame_slot::Frame;
use std::time::Duration;
use tokio::time::Instant;

/// Take one pixel out of every `SAMPLE_STRIDE` along each axis.
pub const SAMPLE_STRIDE: u32 = 16;
/// Fraction of sampled pixels that must change to call it motion.
pub const MOTION_FRACTION: f64 = 0.02;

const LUMA_RED: f32 = 0.2989;
const LUMA_GREEN: f32 = 0.5870;
const LUMA_BLUE: f32 = 0.1140;

/// Tunables for the detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameDiffConfig {
    pub enabled: bool,
    /// Maximum number of frames evaluated per second. `0` disables evaluation.
    pub sample_fps: u32,
    /// Per-pixel luma change that counts as "changed". Higher is less sensitive.
    pub sensitivity: u32,
}

impl Default for FrameDiffConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_fps: 5,
            sensitivity: 25,
        }
    }
}

/// Downsampled luma plane of one frame.
#[derive(Debug, Clone, PartialEq)]
struct LumaGrid {
    columns: u32,
    rows: u32,
    values: Vec<f32>,
}

impl LumaGrid {
    fn from_frame(frame: &Frame) -> Self {
        let (width, height) = frame.dimensions();
        let columns = width.div_ceil(SAMPLE_STRIDE);
        let rows = height.div_ceil(SAMPLE_STRIDE);
        let mut values = Vec::with_capacity((columns * rows) as usize);
        for y in (0..height).step_by(SAMPLE_STRIDE as usize) {
            for x in (0..width).step_by(SAMPLE_STRIDE as usize) {
                let [r, g, b] = frame.get_pixel(x, y).0;
                values.push(luma(r, g, b));
            }
        }
        Self {
            columns,
            rows,
            values,
        }
    }

    fn same_shape(&self, other: &LumaGrid) -> bool {
        self.columns == other.columns && self.rows == other.rows
    }
}

/// Perceptual brightness of an RGB triple, in the 0..255 range.
pub fn luma(red: u8, green: u8, blue: u8) -> f32 {
    LUMA_RED * red as f32 + LUMA_GREEN * green as f32 + LUMA_BLUE * blue as f32
}

/// Frame-differencing motion detector.
#[derive(Debug)]
pub struct FrameDiffDetector {
    config: FrameDiffConfig,
    last_evaluated: Option<Instant>,
    previous: Option<LumaGrid>,
    last_changed_fraction: f64,
}

impl FrameDiffDetector {
    pub fn new(config: FrameDiffConfig) -> Self {
        Self {
            config,
            last_evaluated: None,
            previous: None,
            last_changed_fraction: 0.0,
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled && self.config.sample_fps > 0
    }

    /// Evaluates `frame` against the previously sampled one, using the current time
    /// for rate limiting.
    pub fn detect(&mut self, frame: Option<&Frame>) -> bool {
        self.detect_at(frame, Instant::now())
    }

    /// Same as [`detect`](Self::detect) with an explicit clock reading.
    pub fn detect_at(&mut self, frame: Option<&Frame>, now: Instant) -> bool {
        if !self.enabled() {
            return false;
        }
        let Some(frame) = frame else {
            return false;
        };
        let period = Duration::from_secs_f64(1.0 / self.config.sample_fps as f64);
        if let Some(last) = self.last_evaluated {
            if now.saturating_duration_since(last) < period {
                return false;
            }
        }
        self.last_evaluated = Some(now);

        let current = LumaGrid::from_frame(frame);
        let previous = self.previous.replace(current);
        let (Some(previous), Some(current)) = (previous, self.previous.as_ref()) else {
            self.last_changed_fraction = 0.0;
            return false;
        };
        if !previous.same_shape(current) || current.values.is_empty() {
            self.last_changed_fraction = 0.0;
            return false;
        }

        let threshold = self.config.sensitivity as f32;
        let changed = previous
            .values
            .iter()
            .zip(current.values.iter())
            .filter(|(before, after)| (*after - *before).abs() > threshold)
            .count();
        self.last_changed_fraction = changed as f64 / current.values.len() as f64;
        self.last_changed_fraction > MOTION_FRACTION
    }

    /// Fraction of sampled pixels that changed in the last evaluated frame.
    pub fn last_changed_fraction(&self) -> f64 {
        self.last_changed_fraction
    }

    /// Forgets the reference frame, e.g. between two recordings.
    pub fn reset(&mut self) {
        self.previous = None;
        self.last_evaluated = None;
        self.last_changed_fraction = 0.0;
    }
}
