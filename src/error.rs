// THEORY:
// Errors are split by who can act on them. A `DeviceError` comes from the range
// sensor backend and is usually survivable: one bad bus transaction costs one
// sample. A `RecorderError` comes from the capture collaborator; on `start` it is
// fatal, on `stop` it is only logged. `CamError` is what escapes to `main`, and
// every variant that can end the process carries a remediation hint, because the
// person reading it is standing next to the device with a screwdriver.

use std::io;
use thiserror::Error;

/// Failures reported by a range sensor backend.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The bus or device node could not be used (missing node, permissions, EIO).
    #[error("sensor I/O error: {0}")]
    Io(#[from] io::Error),
    /// A single transaction produced garbage; the next one may be fine.
    #[error("sensor transaction failed: {0}")]
    Transient(String),
    /// The backend has no way to honour the request (e.g. calibration upload).
    #[error("operation not supported by this sensor backend")]
    Unsupported,
}

impl DeviceError {
    /// An actionable hint for an operator, based on what went wrong.
    pub fn hint(&self) -> &'static str {
        match self {
            DeviceError::Io(e) => match e.kind() {
                io::ErrorKind::PermissionDenied => {
                    "permission denied: add the service user to the `i2c` group (then log in again), \
                     and do not run the controller with sudo"
                }
                io::ErrorKind::NotFound => {
                    "sensor node not found: check wiring (3.3V, GND, SDA, SCL; never 5V), \
                     the configured i2c_bus/i2c_address and that the kernel driver overlay is enabled"
                }
                _ => {
                    "bus I/O failure: power-cycle the sensor (unplug 3.3V/GND for 5s) and close any \
                     other program using the bus"
                }
            },
            DeviceError::Transient(_) => {
                "the sensor keeps returning bad transactions: check cable length and pull-ups"
            }
            DeviceError::Unsupported => "pick a sensor backend that supports this operation",
        }
    }
}

/// Failures reported by the recorder collaborator.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("failed to spawn capture program `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("capture program exited immediately with {0}")]
    EarlyExit(std::process::ExitStatus),
    #[error("recorder I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Top-level error of the controller.
#[derive(Debug, Error)]
pub enum CamError {
    /// Bad or unsupported configuration. Fatal before the run loop starts.
    #[error("configuration error: {message}\n  hint: {hint}")]
    Configuration { message: String, hint: String },

    /// The distance sensor never completed its handshake.
    #[error("distance sensor failed to initialise after {attempts} attempts: {source}\n  hint: {hint}")]
    BusInit {
        attempts: u32,
        #[source]
        source: DeviceError,
        hint: String,
    },

    /// The recorder refused to start; the controller must be restarted.
    #[error("recorder failed to start: {0}")]
    RecorderStart(#[source] RecorderError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl CamError {
    pub fn configuration(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CamError::Configuration {
            message: message.into(),
            hint: hint.into(),
        }
    }
}

pub type Result<T, E = CamError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_hint_mentions_group() {
        let err = DeviceError::Io(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(err.hint().contains("i2c"));
    }

    #[test]
    fn bus_init_message_carries_hint() {
        let source = DeviceError::Io(io::Error::from(io::ErrorKind::NotFound));
        let hint = source.hint().to_string();
        let err = CamError::BusInit {
            attempts: 3,
            source,
            hint,
        };
        let text = err.to_string();
        assert!(text.contains("3 attempts"));
        assert!(text.contains("wiring"));
    }
}
