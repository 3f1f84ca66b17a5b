// THEORY:
// The sensor layer has two halves. `RangeDevice` is the narrow contract a
// backend must honour: come up, take a measurement, optionally accept
// calibration, go to standby. `DistanceSensor` sits on top of any backend and
// turns its measurements into the motion-event stream the controller consumes,
// by way of the `DistanceFilter`.
//
// The controller only ever sees `DistanceSensor`; whether the numbers come from
// a kernel driver or a random walk is decided once, at startup, by
// `build_device`.
//
// Failure policy lives here too:
// - Bring-up is retried a bounded number of times with a fixed delay, then
//   escalated as a fatal error carrying a wiring/power/permission hint. A sensor
//   that is not there must not be papered over by retrying forever.
// - Once running, a failed measurement costs exactly one sample.

pub mod iio;
pub mod simulated;

use crate::config::SensorConfig;
use crate::core_modules::distance_filter::{DistanceFilter, DistanceSample, FilterConfig};
use crate::core_modules::motion_event::MotionEvent;
use crate::error::{CamError, DeviceError, Result};
use async_trait::async_trait;
use futures::Stream;
use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

pub use iio::IioRanger;
pub use simulated::SimulatedRanger;

/// Number of bring-up attempts before giving up.
pub const INIT_ATTEMPTS: u32 = 3;
/// Fixed delay between bring-up attempts.
pub const INIT_RETRY_DELAY: Duration = Duration::from_millis(1500);
/// Exact size of a factory calibration blob.
pub const CALIBRATION_LEN: usize = 188;
/// Confidence reported by backends that have no notion of it.
pub const FULL_CONFIDENCE: u8 = u8::MAX;

/// One zone of a (possibly multi-zone) range measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zone {
    pub distance_mm: f64,
    pub confidence: u8,
}

/// Everything a backend reports for one measurement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Measurement {
    pub zones: Vec<Zone>,
}

impl Measurement {
    pub fn single(distance_mm: f64, confidence: u8) -> Self {
        Self {
            zones: vec![Zone {
                distance_mm,
                confidence,
            }],
        }
    }

    /// Zones that reported any distance at all.
    pub fn ranged(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter().filter(|z| z.distance_mm > 0.0)
    }

    /// The closest zone that meets `min_confidence`. When none does, the closest
    /// zone overall is returned so the filter's confidence gate rejects it.
    pub fn nearest_plausible(&self, min_confidence: u8) -> Option<Zone> {
        closest(self.ranged().filter(|z| z.confidence >= min_confidence))
            .or_else(|| closest(self.ranged()))
    }
}

fn closest<'a>(zones: impl Iterator<Item = &'a Zone>) -> Option<Zone> {
    zones
        .copied()
        .min_by(|a, b| a.distance_mm.total_cmp(&b.distance_mm))
}

/// Summary over a batch of zone readings, for bench diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeStats {
    pub count: usize,
    pub closest_mm: f64,
    pub median_mm: f64,
    pub farthest_mm: f64,
    pub mean_confidence: f64,
}

impl RangeStats {
    /// `None` when no zone reported a distance.
    pub fn from_zones(zones: &[Zone]) -> Option<Self> {
        let mut distances: Vec<f64> = zones
            .iter()
            .filter(|z| z.distance_mm > 0.0)
            .map(|z| z.distance_mm)
            .collect();
        if distances.is_empty() {
            return None;
        }
        distances.sort_by(f64::total_cmp);
        let n = distances.len();
        let median_mm = if n % 2 == 1 {
            distances[n / 2]
        } else {
            (distances[n / 2 - 1] + distances[n / 2]) / 2.0
        };
        let ranged = zones.iter().filter(|z| z.distance_mm > 0.0);
        let confidence_sum: f64 = ranged.map(|z| z.confidence as f64).sum();
        Some(Self {
            count: n,
            closest_mm: distances[0],
            median_mm,
            farthest_mm: distances[n - 1],
            mean_confidence: confidence_sum / n as f64,
        })
    }
}

/// Most recent zones kept by a long-running diagnostic session.
pub const RANGE_WINDOW_LEN: usize = 1024;

/// Sliding window of zone readings with bounded memory.
#[derive(Debug, Clone)]
pub struct RangeWindow {
    zones: VecDeque<Zone>,
    capacity: usize,
    seen: u64,
}

impl Default for RangeWindow {
    fn default() -> Self {
        Self::with_capacity(RANGE_WINDOW_LEN)
    }
}

impl RangeWindow {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            zones: VecDeque::with_capacity(capacity),
            capacity,
            seen: 0,
        }
    }

    /// Adds a reading, evicting the oldest once full.
    pub fn push(&mut self, zone: Zone) {
        if self.zones.len() == self.capacity {
            self.zones.pop_front();
        }
        self.zones.push_back(zone);
        self.seen += 1;
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Readings pushed over the window's lifetime, evicted ones included.
    pub fn seen(&self) -> u64 {
        self.seen
    }

    /// Stats over the readings still in the window.
    pub fn stats(&mut self) -> Option<RangeStats> {
        RangeStats::from_zones(self.zones.make_contiguous())
    }
}

/// A validated factory calibration blob.
#[derive(Clone, PartialEq, Eq)]
pub struct CalibrationBlob(Box<[u8; CALIBRATION_LEN]>);

impl std::fmt::Debug for CalibrationBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CalibrationBlob({} bytes)", CALIBRATION_LEN)
    }
}

impl CalibrationBlob {
    /// Accepts exactly `CALIBRATION_LEN` bytes; otherwise returns the bad length.
    pub fn from_bytes(bytes: Vec<u8>) -> std::result::Result<Self, usize> {
        let len = bytes.len();
        let boxed: Box<[u8; CALIBRATION_LEN]> = bytes
            .into_boxed_slice()
            .try_into()
            .map_err(|_| len)?;
        Ok(Self(boxed))
    }

    /// Loads a blob from disk. Missing, unreadable or wrongly sized files are
    /// reported as warnings and ignored.
    pub fn load(path: &Path) -> Option<Self> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "calibration file unreadable; skipping");
                return None;
            }
        };
        match Self::from_bytes(bytes) {
            Ok(blob) => Some(blob),
            Err(len) => {
                warn!(
                    path = %path.display(),
                    len,
                    expected = CALIBRATION_LEN,
                    "calibration file has wrong size; skipping"
                );
                None
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }
}

/// Contract every range sensor backend implements.
///
/// `standby` must be idempotent: it is called on drop, after failed bring-up and
/// possibly again by the owner.
#[async_trait]
pub trait RangeDevice: Send {
    /// Human-readable identity for logs.
    fn describe(&self) -> String;

    /// Opens the bus and completes the device handshake.
    async fn enable(&mut self) -> std::result::Result<(), DeviceError>;

    /// Takes one measurement.
    async fn measure(&mut self) -> std::result::Result<Measurement, DeviceError>;

    async fn write_calibration(
        &mut self,
        _blob: &CalibrationBlob,
    ) -> std::result::Result<(), DeviceError> {
        Err(DeviceError::Unsupported)
    }

    /// Whether the device considers its current calibration usable.
    fn calibration_ok(&self) -> bool {
        true
    }

    /// Runs an in-session calibration.
    async fn calibrate(&mut self) -> std::result::Result<(), DeviceError> {
        Err(DeviceError::Unsupported)
    }

    /// Puts the device to sleep and releases the bus.
    fn standby(&mut self);
}

/// Picks the backend for this installation.
pub fn build_device(config: &SensorConfig) -> Box<dyn RangeDevice> {
    if config.simulate {
        Box::new(SimulatedRanger::new())
    } else {
        Box::new(IioRanger::new(config.i2c_bus, config.i2c_address))
    }
}

/// Brings a device up, retrying `INIT_ATTEMPTS` times with a fixed delay.
pub async fn handshake(device: &mut dyn RangeDevice) -> Result<()> {
    let mut attempt = 1;
    loop {
        match device.enable().await {
            Ok(()) => {
                info!(device = %device.describe(), attempt, "distance sensor up");
                return Ok(());
            }
            Err(e) if attempt < INIT_ATTEMPTS => {
                warn!(
                    device = %device.describe(),
                    error = %e,
                    "sensor bring-up failed, retry {}/{} in {:.1}s",
                    attempt + 1,
                    INIT_ATTEMPTS,
                    INIT_RETRY_DELAY.as_secs_f64()
                );
                device.standby();
                time::sleep(INIT_RETRY_DELAY).await;
                attempt += 1;
            }
            Err(e) => {
                device.standby();
                return Err(CamError::BusInit {
                    attempts: attempt,
                    hint: e.hint().to_string(),
                    source: e,
                });
            }
        }
    }
}

/// Loads calibration into the device, or asks it to self-calibrate.
pub async fn apply_calibration(device: &mut dyn RangeDevice, blob: Option<&CalibrationBlob>) {
    match blob {
        Some(blob) => match device.write_calibration(blob).await {
            Ok(()) => info!(device = %device.describe(), "calibration loaded"),
            Err(DeviceError::Unsupported) => {
                info!(device = %device.describe(), "backend takes no calibration data; ignoring file")
            }
            Err(e) => warn!(device = %device.describe(), error = %e, "calibration upload failed"),
        },
        None if !device.calibration_ok() => {
            info!(device = %device.describe(), "calibrating...");
            match device.calibrate().await {
                Ok(()) => info!(device = %device.describe(), "calibration done"),
                Err(e) => warn!(device = %device.describe(), error = %e, "calibration failed"),
            }
        }
        None => debug!(device = %device.describe(), "calibration OK (no file)"),
    }
}

/// Construction parameters for a `DistanceSensor`.
#[derive(Debug, Clone)]
pub struct SensorParams {
    pub poll_period: Duration,
    pub filter: FilterConfig,
    pub calibration: Option<CalibrationBlob>,
}

impl SensorParams {
    pub fn from_config(config: &SensorConfig) -> Self {
        Self {
            poll_period: config.poll_period(),
            filter: config.filter(),
            calibration: config
                .calibration_file
                .as_deref()
                .and_then(CalibrationBlob::load),
        }
    }
}

/// A running distance sensor: a device plus the signal conditioning on top.
pub struct DistanceSensor {
    device: Box<dyn RangeDevice>,
    filter: DistanceFilter,
    poll_period: Duration,
    latest_tx: watch::Sender<Option<DistanceSample>>,
}

impl DistanceSensor {
    /// Brings the device up and applies calibration. Fails with
    /// `CamError::BusInit` when the device never answers.
    pub async fn connect(mut device: Box<dyn RangeDevice>, params: SensorParams) -> Result<Self> {
        handshake(device.as_mut()).await?;
        apply_calibration(device.as_mut(), params.calibration.as_ref()).await;
        let (latest_tx, _) = watch::channel(None);
        info!(
            device = %device.describe(),
            poll_hz = %format!("{:.1}", 1.0 / params.poll_period.as_secs_f64()),
            hysteresis_mm = params.filter.hysteresis_mm,
            smooth_alpha = params.filter.alpha,
            min_confidence = params.filter.min_confidence,
            "distance sensor ready"
        );
        Ok(Self {
            device,
            filter: DistanceFilter::new(params.filter),
            poll_period: params.poll_period,
            latest_tx,
        })
    }

    /// Receiver of the most recent sample, for status reporting.
    pub fn subscribe(&self) -> watch::Receiver<Option<DistanceSample>> {
        self.latest_tx.subscribe()
    }

    /// Takes one measurement and returns a motion event if it crossed the
    /// hysteresis threshold. Read errors are logged and yield `None`.
    pub async fn poll_once(&mut self) -> Option<MotionEvent> {
        let measurement = match self.device.measure().await {
            Ok(m) => m,
            Err(e) => {
                warn!(device = %self.device.describe(), error = %e, "measurement failed; sample skipped");
                return None;
            }
        };
        let Some(zone) = measurement.nearest_plausible(self.filter.config().min_confidence) else {
            trace!("no zone reported a distance");
            return None;
        };
        let shift = self.filter.sample(zone.distance_mm, zone.confidence);
        if zone.confidence < self.filter.config().min_confidence {
            debug!(
                distance_mm = zone.distance_mm,
                confidence = zone.confidence,
                "low-confidence sample discarded"
            );
        }
        let first = self.latest_tx.borrow().is_none();
        if let Some(sample) = self.filter.latest() {
            if first {
                info!(distance_mm = %format!("{:.1}", sample.smoothed_mm), "first distance sample");
            }
            self.latest_tx.send_replace(Some(sample));
        }
        shift.map(|shift| {
            debug!(
                from_mm = %format!("{:.1}", shift.from_mm),
                to_mm = %format!("{:.1}", shift.to_mm),
                "distance motion event"
            );
            MotionEvent::sensor(Instant::now(), shift.magnitude_mm())
        })
    }

    /// The sensor as an endless stream of motion events, one poll per period.
    pub fn events(self) -> impl Stream<Item = MotionEvent> + Send + 'static {
        async_stream::stream! {
            let mut sensor = self;
            let mut ticker = time::interval(sensor.poll_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Some(event) = sensor.poll_once().await {
                    yield event;
                }
            }
        }
    }
}

impl Drop for DistanceSensor {
    fn drop(&mut self) {
        self.device.standby();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// What a `ScriptedDevice` was asked to do.
    #[derive(Debug, Default)]
    struct DeviceLog {
        pub enable_calls: u32,
        pub standby_calls: u32,
        pub calibration_writes: Vec<usize>,
        pub calibrate_calls: u32,
    }

    /// A device that replays canned results.
    struct ScriptedDevice {
        pub enable_failures: u32,
        pub readings: VecDeque<std::result::Result<Measurement, DeviceError>>,
        pub calibration_ok: bool,
        pub log: Arc<Mutex<DeviceLog>>,
    }

    impl ScriptedDevice {
        fn new(
            readings: Vec<std::result::Result<Measurement, DeviceError>>,
        ) -> (Self, Arc<Mutex<DeviceLog>>) {
            let log = Arc::new(Mutex::new(DeviceLog::default()));
            (
                Self {
                    enable_failures: 0,
                    readings: readings.into(),
                    calibration_ok: true,
                    log: log.clone(),
                },
                log,
            )
        }
    }

    #[async_trait]
    impl RangeDevice for ScriptedDevice {
        fn describe(&self) -> String {
            "scripted".to_string()
        }

        async fn enable(&mut self) -> std::result::Result<(), DeviceError> {
            let mut log = self.log.lock().unwrap();
            log.enable_calls += 1;
            if log.enable_calls <= self.enable_failures {
                return Err(DeviceError::Io(io::Error::from(io::ErrorKind::NotFound)));
            }
            Ok(())
        }

        async fn measure(&mut self) -> std::result::Result<Measurement, DeviceError> {
            self.readings
                .pop_front()
                .unwrap_or_else(|| Err(DeviceError::Transient("script exhausted".into())))
        }

        async fn write_calibration(
            &mut self,
            blob: &CalibrationBlob,
        ) -> std::result::Result<(), DeviceError> {
            self.log.lock().unwrap().calibration_writes.push(blob.as_bytes().len());
            Ok(())
        }

        fn calibration_ok(&self) -> bool {
            self.calibration_ok
        }

        async fn calibrate(&mut self) -> std::result::Result<(), DeviceError> {
            self.log.lock().unwrap().calibrate_calls += 1;
            Ok(())
        }

        fn standby(&mut self) {
            self.log.lock().unwrap().standby_calls += 1;
        }
    }

    fn params(hysteresis_mm: f64) -> SensorParams {
        SensorParams {
            poll_period: Duration::from_millis(125),
            filter: FilterConfig {
                alpha: 0.0,
                hysteresis_mm,
                min_confidence: 5,
            },
            calibration: None,
        }
    }

    fn ok(distance_mm: f64) -> std::result::Result<Measurement, DeviceError> {
        Ok(Measurement::single(distance_mm, 100))
    }

    #[test]
    fn nearest_plausible_prefers_confident_zones() {
        let m = Measurement {
            zones: vec![
                Zone { distance_mm: 0.0, confidence: 255 },
                Zone { distance_mm: 300.0, confidence: 2 },
                Zone { distance_mm: 450.0, confidence: 80 },
                Zone { distance_mm: 900.0, confidence: 90 },
            ],
        };
        assert_eq!(m.nearest_plausible(5).unwrap().distance_mm, 450.0);
        // With nothing confident, the nearest ranged zone comes back for gating.
        assert_eq!(m.nearest_plausible(100).unwrap().distance_mm, 300.0);
        assert!(Measurement::single(0.0, 255).nearest_plausible(0).is_none());
    }

    #[test]
    fn range_stats_summarise_ranged_zones() {
        let zones = [
            Zone { distance_mm: 900.0, confidence: 10 },
            Zone { distance_mm: 0.0, confidence: 255 },
            Zone { distance_mm: 300.0, confidence: 30 },
            Zone { distance_mm: 500.0, confidence: 20 },
            Zone { distance_mm: 700.0, confidence: 40 },
        ];
        let stats = RangeStats::from_zones(&zones).unwrap();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.closest_mm, 300.0);
        assert_eq!(stats.median_mm, 600.0);
        assert_eq!(stats.farthest_mm, 900.0);
        assert_eq!(stats.mean_confidence, 25.0);
        assert!(RangeStats::from_zones(&zones[1..2]).is_none());
    }

    #[test]
    fn range_window_keeps_only_recent_readings() {
        let mut window = RangeWindow::with_capacity(3);
        assert!(window.stats().is_none());
        for mm in [100.0, 200.0, 300.0, 400.0, 500.0] {
            window.push(Zone { distance_mm: mm, confidence: 50 });
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.seen(), 5);
        let stats = window.stats().unwrap();
        assert_eq!(stats.closest_mm, 300.0);
        assert_eq!(stats.farthest_mm, 500.0);
    }

    #[test]
    fn range_window_stays_bounded_over_long_sessions() {
        let mut window = RangeWindow::default();
        for i in 0..(RANGE_WINDOW_LEN * 10) {
            window.push(Zone { distance_mm: 100.0 + i as f64, confidence: 50 });
        }
        assert_eq!(window.len(), RANGE_WINDOW_LEN);
        assert_eq!(window.seen(), (RANGE_WINDOW_LEN * 10) as u64);
        assert_eq!(window.stats().unwrap().count, RANGE_WINDOW_LEN);
    }

    #[test]
    fn calibration_blob_requires_exact_size() {
        assert!(CalibrationBlob::from_bytes(vec![0; CALIBRATION_LEN]).is_ok());
        assert_eq!(CalibrationBlob::from_bytes(vec![0; 187]).unwrap_err(), 187);
        assert_eq!(CalibrationBlob::from_bytes(vec![0; 189]).unwrap_err(), 189);
        assert_eq!(CalibrationBlob::from_bytes(Vec::new()).unwrap_err(), 0);
    }

    #[test]
    fn calibration_file_of_wrong_size_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let short = dir.path().join("short.bin");
        std::fs::write(&short, vec![7u8; 100]).unwrap();
        assert!(CalibrationBlob::load(&short).is_none());

        let good = dir.path().join("good.bin");
        std::fs::write(&good, vec![7u8; CALIBRATION_LEN]).unwrap();
        assert_eq!(CalibrationBlob::load(&good).unwrap().as_bytes()[0], 7);

        assert!(CalibrationBlob::load(&dir.path().join("missing.bin")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_size_blob_never_reaches_device() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cal.bin");
        std::fs::write(&path, vec![1u8; 200]).unwrap();
        let config = SensorConfig {
            calibration_file: Some(path),
            ..SensorConfig::default()
        };
        let (device, log) = ScriptedDevice::new(vec![]);
        let sensor = DistanceSensor::connect(Box::new(device), SensorParams::from_config(&config))
            .await
            .unwrap();
        drop(sensor);
        assert!(log.lock().unwrap().calibration_writes.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn valid_blob_is_written_once() {
        let (device, log) = ScriptedDevice::new(vec![]);
        let mut p = params(40.0);
        p.calibration = Some(CalibrationBlob::from_bytes(vec![3; CALIBRATION_LEN]).unwrap());
        let _sensor = DistanceSensor::connect(Box::new(device), p).await.unwrap();
        let log = log.lock().unwrap();
        assert_eq!(log.calibration_writes, vec![CALIBRATION_LEN]);
        assert_eq!(log.calibrate_calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn self_calibrates_when_needed_without_file() {
        let (mut device, log) = ScriptedDevice::new(vec![]);
        device.calibration_ok = false;
        let _sensor = DistanceSensor::connect(Box::new(device), params(40.0)).await.unwrap();
        assert_eq!(log.lock().unwrap().calibrate_calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn bring_up_gives_up_after_three_attempts() {
        let (mut device, log) = ScriptedDevice::new(vec![]);
        device.enable_failures = u32::MAX;
        let started = Instant::now();
        let err = match DistanceSensor::connect(Box::new(device), params(40.0)).await {
            Ok(_) => panic!("bring-up should fail"),
            Err(e) => e,
        };
        match err {
            CamError::BusInit { attempts, hint, .. } => {
                assert_eq!(attempts, INIT_ATTEMPTS);
                assert!(hint.contains("wiring"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(log.lock().unwrap().enable_calls, INIT_ATTEMPTS);
        // Two fixed backoffs between three attempts.
        assert!(started.elapsed() >= INIT_RETRY_DELAY * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn bring_up_recovers_on_retry() {
        let (mut device, log) = ScriptedDevice::new(vec![]);
        device.enable_failures = 1;
        assert!(DistanceSensor::connect(Box::new(device), params(40.0)).await.is_ok());
        assert_eq!(log.lock().unwrap().enable_calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn read_error_skips_one_sample() {
        let (device, _log) = ScriptedDevice::new(vec![
            ok(600.0),
            Err(DeviceError::Transient("crc".into())),
            ok(620.0),
            Err(DeviceError::Io(io::Error::other("EIO"))),
            ok(645.0),
        ]);
        let mut sensor = DistanceSensor::connect(Box::new(device), params(40.0)).await.unwrap();
        let latest = sensor.subscribe();
        let fired: Vec<bool> = {
            let mut out = Vec::new();
            for _ in 0..5 {
                out.push(sensor.poll_once().await.is_some());
            }
            out
        };
        assert_eq!(fired, vec![false, false, false, false, true]);
        assert_eq!(latest.borrow().unwrap().raw_mm, 645.0);
    }

    #[tokio::test(start_paused = true)]
    async fn event_stream_yields_shift_magnitude() {
        let (device, _log) = ScriptedDevice::new(vec![ok(600.0), ok(600.0), ok(600.0), ok(645.0)]);
        let sensor = DistanceSensor::connect(Box::new(device), params(40.0)).await.unwrap();
        let events = sensor.events();
        futures::pin_mut!(events);
        let event = events.next().await.unwrap();
        assert_eq!(event.source, crate::core_modules::motion_event::MotionSource::Sensor);
        assert_eq!(event.score, 45.0);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_puts_device_in_standby() {
        let (device, log) = ScriptedDevice::new(vec![]);
        let sensor = DistanceSensor::connect(Box::new(device), params(40.0)).await.unwrap();
        drop(sensor);
        assert_eq!(log.lock().unwrap().standby_calls, 1);
    }
}
