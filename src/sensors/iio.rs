// THEORY:
// Range sensor backed by a Linux IIO driver.
//
// Time-of-flight sensors with a mainline driver (vl53l0x, vl53l1x and friends)
// show up under `/sys/bus/i2c/devices/<bus>-<addr>/iio:deviceN` and expose the
// distance as `in_distance_raw`, optionally with `in_distance_scale` in metres
// per unit. Older drivers publish the same reading as `in_proximity_raw` (and
// `in_proximity_scale`); the first channel pair present wins. The kernel owns
// the bus, so this backend only reads files.

use super::{FULL_CONFIDENCE, Measurement, RangeDevice};
use crate::error::DeviceError;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const I2C_DEVICES: &str = "/sys/bus/i2c/devices";
/// `(raw, scale)` channel pairs, in order of preference.
const CHANNELS: [(&str, &str); 2] = [
    ("in_distance_raw", "in_distance_scale"),
    ("in_proximity_raw", "in_proximity_scale"),
];

pub struct IioRanger {
    bus: u8,
    address: u16,
    sysfs_root: PathBuf,
    channel: Option<PathBuf>,
    mm_per_unit: f64,
}

impl IioRanger {
    pub fn new(bus: u8, address: u16) -> Self {
        Self::with_sysfs_root(bus, address, I2C_DEVICES)
    }

    pub fn with_sysfs_root(bus: u8, address: u16, root: impl Into<PathBuf>) -> Self {
        Self {
            bus,
            address,
            sysfs_root: root.into(),
            channel: None,
            mm_per_unit: 1.0,
        }
    }

    fn device_dir(&self) -> PathBuf {
        self.sysfs_root
            .join(format!("{}-{:04x}", self.bus, self.address))
    }

    async fn find_iio_node(dir: &Path) -> io::Result<PathBuf> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().starts_with("iio:device") {
                return Ok(entry.path());
            }
        }
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no iio:device node under {}", dir.display()),
        ))
    }

    async fn pick_channel(node: &Path) -> io::Result<(PathBuf, PathBuf)> {
        for (raw, scale) in CHANNELS {
            let channel = node.join(raw);
            if tokio::fs::try_exists(&channel).await? {
                return Ok((channel, node.join(scale)));
            }
        }
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no distance or proximity channel under {}", node.display()),
        ))
    }

    async fn read_raw(channel: &Path) -> Result<f64, DeviceError> {
        let text = tokio::fs::read_to_string(channel).await?;
        text.trim()
            .parse::<f64>()
            .map_err(|e| DeviceError::Transient(format!("unparseable reading {:?}: {e}", text.trim())))
    }
}

#[async_trait]
impl RangeDevice for IioRanger {
    fn describe(&self) -> String {
        format!("iio ranger i2c-{} @ 0x{:02x}", self.bus, self.address)
    }

    async fn enable(&mut self) -> Result<(), DeviceError> {
        let node = Self::find_iio_node(&self.device_dir()).await?;
        let (channel, scale) = Self::pick_channel(&node).await?;
        // Sysfs reports scale in metres per raw unit.
        self.mm_per_unit = match tokio::fs::read_to_string(&scale).await {
            Ok(text) => text.trim().parse::<f64>().map(|m| m * 1000.0).unwrap_or(1.0),
            Err(_) => 1.0,
        };
        // A first read doubles as the handshake.
        Self::read_raw(&channel).await?;
        debug!(channel = %channel.display(), mm_per_unit = self.mm_per_unit, "iio node ready");
        self.channel = Some(channel);
        Ok(())
    }

    async fn measure(&mut self) -> Result<Measurement, DeviceError> {
        let Some(channel) = self.channel.as_deref() else {
            return Err(DeviceError::Transient("sensor not enabled".into()));
        };
        let raw = Self::read_raw(channel).await?;
        Ok(Measurement::single(raw * self.mm_per_unit, FULL_CONFIDENCE))
    }

    fn standby(&mut self) {
        self.channel = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::CalibrationBlob;

    const RAW_CHANNEL: &str = CHANNELS[0].0;

    fn fake_node(files: &[(&str, &str)]) -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let node = root.path().join("1-0029").join("iio:device0");
        std::fs::create_dir_all(&node).unwrap();
        for (name, contents) in files {
            std::fs::write(node.join(name), contents).unwrap();
        }
        root
    }

    fn fake_sysfs(raw: &str, scale: Option<&str>) -> tempfile::TempDir {
        let mut files = vec![(RAW_CHANNEL, raw)];
        if let Some(scale) = scale {
            files.push((CHANNELS[0].1, scale));
        }
        fake_node(&files)
    }

    #[tokio::test]
    async fn reads_scaled_distance() {
        let root = fake_sysfs("812\n", Some("0.001\n"));
        let mut ranger = IioRanger::with_sysfs_root(1, 0x29, root.path());
        ranger.enable().await.unwrap();
        let m = ranger.measure().await.unwrap();
        assert!((m.zones[0].distance_mm - 812.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn missing_scale_means_millimetres() {
        let root = fake_sysfs("455", None);
        let mut ranger = IioRanger::with_sysfs_root(1, 0x29, root.path());
        ranger.enable().await.unwrap();
        assert_eq!(ranger.measure().await.unwrap().zones[0].distance_mm, 455.0);
    }

    #[tokio::test]
    async fn falls_back_to_proximity_channel() {
        let root = fake_node(&[("in_proximity_raw", "1234\n"), ("in_proximity_scale", "0.0001\n")]);
        let mut ranger = IioRanger::with_sysfs_root(1, 0x29, root.path());
        ranger.enable().await.unwrap();
        let m = ranger.measure().await.unwrap();
        assert!((m.zones[0].distance_mm - 123.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn distance_channel_wins_over_proximity() {
        let root = fake_node(&[("in_distance_raw", "700"), ("in_proximity_raw", "5")]);
        let mut ranger = IioRanger::with_sysfs_root(1, 0x29, root.path());
        ranger.enable().await.unwrap();
        assert_eq!(ranger.measure().await.unwrap().zones[0].distance_mm, 700.0);
    }

    #[tokio::test]
    async fn node_without_channels_is_not_found() {
        let root = fake_node(&[("name", "vl53l0x\n")]);
        let mut ranger = IioRanger::with_sysfs_root(1, 0x29, root.path());
        match ranger.enable().await {
            Err(DeviceError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_node_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        let mut ranger = IioRanger::with_sysfs_root(1, 0x41, root.path());
        match ranger.enable().await {
            Err(DeviceError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn garbage_reading_is_transient() {
        let root = fake_sysfs("600", None);
        let mut ranger = IioRanger::with_sysfs_root(1, 0x29, root.path());
        ranger.enable().await.unwrap();
        std::fs::write(
            root.path().join("1-0029").join("iio:device0").join(RAW_CHANNEL),
            "busy",
        )
        .unwrap();
        assert!(matches!(
            ranger.measure().await,
            Err(DeviceError::Transient(_))
        ));
    }

    #[tokio::test]
    async fn calibration_upload_is_unsupported() {
        let root = fake_sysfs("600", None);
        let mut ranger = IioRanger::with_sysfs_root(1, 0x29, root.path());
        let blob = CalibrationBlob::from_bytes(vec![0; crate::sensors::CALIBRATION_LEN]).unwrap();
        assert!(matches!(
            ranger.write_calibration(&blob).await,
            Err(DeviceError::Unsupported)
        ));
    }
}
