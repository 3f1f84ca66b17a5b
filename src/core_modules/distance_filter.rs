// THEORY:
// The `DistanceFilter` turns a noisy stream of range readings into a sparse stream
// of "something moved" events. It is the sensor-side counterpart of frame
// differencing and it is deliberately simple:
//
// 1.  **Confidence Gate**: Readings the sensor itself does not trust are dropped
//     before they can touch any state. A dropped reading is not a zero reading.
// 2.  **Exponential Smoothing**: Valid readings feed an EMA with weight `alpha`.
//     `alpha == 0` turns smoothing off entirely (smoothed == raw), which is what
//     most installations want when the sensor already averages internally.
// 3.  **Hysteresis Against A Stable Reference**: The smoothed value is compared
//     with the last value that fired an event, not with the previous sample. Slow
//     drift therefore accumulates until it crosses the threshold once, while
//     jitter inside the band never fires. The reference only moves when an event
//     fires; the very first valid reading seeds it silently.
//
// The filter owns no clock and no I/O. It can be driven by a real sensor, by the
// simulator, or by a unit test with a literal list of numbers.

/// The most recent reading, before and after smoothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceSample {
    pub raw_mm: f64,
    pub smoothed_mm: f64,
}

/// A hysteresis crossing: the reference moved from `from_mm` to `to_mm`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceShift {
    pub from_mm: f64,
    pub to_mm: f64,
}

impl DistanceShift {
    pub fn magnitude_mm(&self) -> f64 {
        (self.to_mm - self.from_mm).abs()
    }
}

/// Tunables for the filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterConfig {
    /// EMA weight of the newest reading, in `[0, 1]`. `0` disables smoothing.
    pub alpha: f64,
    /// Minimum deviation from the stable reference that counts as motion.
    pub hysteresis_mm: f64,
    /// Readings below this confidence are discarded.
    pub min_confidence: u8,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            alpha: 0.25,
            hysteresis_mm: 40.0,
            min_confidence: 5,
        }
    }
}

/// Smoothing + hysteresis state for one distance channel.
#[derive(Debug, Clone)]
pub struct DistanceFilter {
    config: FilterConfig,
    latest: Option<DistanceSample>,
    stable_reference_mm: Option<f64>,
}

impl DistanceFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config,
            latest: None,
            stable_reference_mm: None,
        }
    }

    /// Feeds one reading. Returns a shift when the smoothed distance has moved at
    /// least `hysteresis_mm` away from the stable reference.
    pub fn sample(&mut self, raw_mm: f64, confidence: u8) -> Option<DistanceShift> {
        if confidence < self.config.min_confidence || !raw_mm.is_finite() {
            return None;
        }

        let smoothed_mm = match self.latest {
            Some(previous) if self.config.alpha > 0.0 => {
                self.config.alpha * raw_mm + (1.0 - self.config.alpha) * previous.smoothed_mm
            }
            _ => raw_mm,
        };
        self.latest = Some(DistanceSample {
            raw_mm,
            smoothed_mm,
        });

        let Some(reference) = self.stable_reference_mm else {
            self.stable_reference_mm = Some(smoothed_mm);
            return None;
        };

        if (smoothed_mm - reference).abs() >= self.config.hysteresis_mm {
            self.stable_reference_mm = Some(smoothed_mm);
            Some(DistanceShift {
                from_mm: reference,
                to_mm: smoothed_mm,
            })
        } else {
            None
        }
    }

    pub fn latest(&self) -> Option<DistanceSample> {
        self.latest
    }

    pub fn stable_reference_mm(&self) -> Option<f64> {
        self.stable_reference_mm
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }
}
