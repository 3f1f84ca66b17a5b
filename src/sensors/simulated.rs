// THEORY:
// A stand-in range sensor for benches without hardware. The target "walks":
// every measurement moves it by a uniform random step in `[-JITTER_MM, JITTER_MM]`
// and it never comes closer than `FLOOR_MM`. With the default hysteresis this
// produces an occasional motion event once the walk has drifted far enough,
// which is exactly the behaviour needed to exercise the controller end to end.

use super::{FULL_CONFIDENCE, Measurement, RangeDevice};
use crate::error::DeviceError;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

pub const BASELINE_MM: f64 = 600.0;
pub const JITTER_MM: f64 = 5.0;
pub const FLOOR_MM: f64 = 50.0;

pub struct SimulatedRanger {
    rng: StdRng,
    current_mm: f64,
    enabled: bool,
}

impl SimulatedRanger {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Deterministic walk, for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng,
            current_mm: BASELINE_MM,
            enabled: false,
        }
    }

    pub fn current_mm(&self) -> f64 {
        self.current_mm
    }
}

impl Default for SimulatedRanger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RangeDevice for SimulatedRanger {
    fn describe(&self) -> String {
        "simulated ranger".to_string()
    }

    async fn enable(&mut self) -> Result<(), DeviceError> {
        warn!("SIMULATION ACTIVE: distance readings are synthetic");
        self.enabled = true;
        Ok(())
    }

    async fn measure(&mut self) -> Result<Measurement, DeviceError> {
        if !self.enabled {
            return Err(DeviceError::Transient("simulator not enabled".into()));
        }
        let step: f64 = self.rng.gen_range(-JITTER_MM..=JITTER_MM);
        self.current_mm = (self.current_mm + step).max(FLOOR_MM);
        Ok(Measurement::single(self.current_mm, FULL_CONFIDENCE))
    }

    fn standby(&mut self) {
        self.enabled = false;
    }
}
