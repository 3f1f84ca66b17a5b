// THEORY:
// `ProcessRecorder` drives an external capture program (ffmpeg) that does all the
// heavy lifting in one process with two outputs:
//
// 1.  **Segments**: H.264 in MP4 containers, one file per `segment_seconds`, named
//     by wall-clock start time, written straight into the output directory.
// 2.  **Analysis Stream**: raw RGB24 frames on stdout at full capture resolution,
//     throttled to the vision rate. A reader task decodes them one by one into
//     the shared `FrameSlot`, which is where the vision loop picks them up.
//     Frames are not downscaled here; frame differencing does its own coarse
//     sampling, so its grid is computed on the real camera geometry.
//
// Stopping is polite first: `q` on stdin lets the encoder close the current
// segment cleanly. A program that ignores it for `STOP_GRACE` is killed.
//
// The child is spawned with `kill_on_drop`. Whatever path drops a session (a
// cancelled stop, an error halfway through start, the recorder itself going
// away) takes the capture process down with it.

use crate::config::AppConfig;
use crate::core_modules::frame_slot::{Frame, FrameSlot};
use crate::error::{CamError, RecorderError, Result};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use super::Recorder;

/// How long the capture program gets to exit after a quit request.
pub const STOP_GRACE: Duration = Duration::from_secs(3);
/// Time allowed for the capture program to fail on bad arguments or devices.
const STARTUP_SETTLE: Duration = Duration::from_millis(250);
pub const SEGMENT_PATTERN: &str = "%Y%m%d_%H%M%S.mp4";

/// Everything needed to build the capture command line.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSettings {
    pub program: String,
    pub input_format: String,
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub segment_seconds: u64,
    pub output_dir: PathBuf,
    /// Rate of the analysis stream.
    pub analysis_fps: u32,
}

impl CaptureSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            program: config.camera.program.clone(),
            input_format: config.camera.input_format.clone(),
            device: config.camera.device.clone(),
            width: config.camera.width,
            height: config.camera.height,
            fps: config.camera.fps,
            segment_seconds: config.service.segment_seconds,
            output_dir: config.service.output_dir.clone(),
            analysis_fps: config.motion.vision_motion_fps.max(1),
        }
    }

    /// Bytes in one raw RGB24 analysis frame.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// Arguments passed to the capture program.
    pub fn args(&self) -> Vec<String> {
        let pattern = self.output_dir.join(SEGMENT_PATTERN);
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-f"]
            .into_iter()
            .map(String::from)
            .collect();
        args.extend([
            self.input_format.clone(),
            "-framerate".into(),
            self.fps.to_string(),
            "-video_size".into(),
            format!("{}x{}", self.width, self.height),
            "-i".into(),
            self.device.clone(),
        ]);
        // Output 1: segmented recording.
        args.extend(
            [
                "-map", "0:v", "-c:v", "libx264", "-preset", "veryfast", "-f", "segment",
                "-reset_timestamps", "1", "-strftime", "1", "-segment_time",
            ]
            .into_iter()
            .map(String::from),
        );
        args.push(self.segment_seconds.to_string());
        args.push(pattern.to_string_lossy().into_owned());
        // Output 2: full-resolution raw frames on stdout.
        args.extend([
            "-map".into(),
            "0:v".into(),
            "-vf".into(),
            format!("fps={}", self.analysis_fps),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "rgb24".into(),
            "pipe:1".into(),
        ]);
        args
    }
}

/// Resolves `program` the way the shell would: as a path when it has more than
/// one component, otherwise through `PATH`.
pub fn locate_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|path| path.is_file())
}

/// Reads fixed-size RGB24 frames until the stream ends.
pub async fn pump_frames(
    mut source: impl AsyncRead + Unpin,
    width: u32,
    height: u32,
    slot: FrameSlot,
) -> u64 {
    let mut buffer = vec![0u8; width as usize * height as usize * 3];
    let mut frames = 0;
    loop {
        if let Err(e) = source.read_exact(&mut buffer).await {
            if e.kind() != io::ErrorKind::UnexpectedEof {
                warn!(error = %e, "analysis stream read failed");
            }
            break;
        }
        if let Some(frame) = Frame::from_raw(width, height, buffer.clone()) {
            slot.publish(frame);
            frames += 1;
        }
    }
    debug!(frames, "analysis stream closed");
    frames
}

struct Session {
    child: Child,
    reader: Option<JoinHandle<u64>>,
}

impl Session {
    async fn shutdown(&mut self) -> std::result::Result<(), RecorderError> {
        if let Some(mut stdin) = self.child.stdin.take() {
            let quit = async {
                stdin.write_all(b"q").await?;
                stdin.flush().await
            };
            if let Err(e) = quit.await {
                debug!(error = %e, "quit request not delivered; process may already be gone");
            }
        }

        let status = match time::timeout(STOP_GRACE, self.child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                warn!(
                    pid = self.child.id(),
                    "capture program ignored quit for {}s; killing",
                    STOP_GRACE.as_secs()
                );
                self.child.kill().await?;
                self.child.wait().await?
            }
        };
        info!(%status, "capture stopped");

        if let Some(reader) = self.reader.take() {
            match reader.await {
                Ok(frames) => debug!(frames, "frame reader finished"),
                Err(e) => warn!(error = %e, "frame reader task ended abnormally"),
            }
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Recorder backed by an external capture process.
pub struct ProcessRecorder {
    settings: CaptureSettings,
    slot: FrameSlot,
    session: Mutex<Option<Session>>,
    recording: AtomicBool,
}

impl ProcessRecorder {
    /// Fails with a configuration error when the capture program is not installed.
    pub fn new(settings: CaptureSettings) -> Result<Self> {
        let Some(path) = locate_program(&settings.program) else {
            return Err(CamError::configuration(
                format!("capture program `{}` not found", settings.program),
                "install ffmpeg (apt install ffmpeg) or set camera.program to its full path",
            ));
        };
        debug!(program = %path.display(), "capture program located");
        Ok(Self {
            settings,
            slot: FrameSlot::new(),
            session: Mutex::new(None),
            recording: AtomicBool::new(false),
        })
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// OS pid of the running capture program.
    pub async fn pid(&self) -> Option<u32> {
        self.session.lock().await.as_ref().and_then(|s| s.child.id())
    }
}

#[async_trait]
impl Recorder for ProcessRecorder {
    async fn start(&self) -> std::result::Result<(), RecorderError> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return Ok(());
        }
        tokio::fs::create_dir_all(&self.settings.output_dir).await?;

        let mut child = Command::new(&self.settings.program)
            .args(self.settings.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RecorderError::Spawn {
                program: self.settings.program.clone(),
                source,
            })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RecorderError::Io(io::Error::other("capture stdout not piped")))?;
        let mut pending = Session {
            reader: Some(tokio::spawn(pump_frames(
                stdout,
                self.settings.width,
                self.settings.height,
                self.slot.clone(),
            ))),
            child,
        };

        time::sleep(STARTUP_SETTLE).await;
        if let Some(status) = pending.child.try_wait()? {
            return Err(RecorderError::EarlyExit(status));
        }

        info!(
            pid = pending.child.id(),
            dir = %self.settings.output_dir.display(),
            segment_seconds = self.settings.segment_seconds,
            "capture started"
        );
        *session = Some(pending);
        self.recording.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> std::result::Result<(), RecorderError> {
        let Some(mut session) = self.session.lock().await.take() else {
            return Ok(());
        };
        self.recording.store(false, Ordering::SeqCst);
        let result = session.shutdown().await;
        self.slot.clear();
        result
    }

    fn latest_frame(&self) -> Option<Arc<Frame>> {
        self.slot.latest()
    }

    fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }
}
