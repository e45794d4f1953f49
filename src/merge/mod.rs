// Multi-node averaging: several sensor endpoints -> one representative reading

use crate::error::AqiError;
use crate::pollutant::{normalize, Pollutant, RawReading};
use std::collections::BTreeMap;
use tracing::debug;

/// Merges raw readings from the endpoints of one multi-node zone.
#[derive(Debug, Clone, Copy)]
pub struct SensorAverager {
    min_reporting: usize,
}

impl SensorAverager {
    /// `min_reporting` below 1 is treated as 1
    pub fn new(min_reporting: usize) -> Self {
        Self {
            min_reporting: min_reporting.max(1),
        }
    }

    pub fn min_reporting(&self) -> usize {
        self.min_reporting
    }

    /// Average each pollutant over the endpoints that reported a valid value
    /// for it.
    ///
    /// A value is valid when it has a recognizable key and is finite and
    /// non-negative. An endpoint counts as reporting when at least one of its
    /// values is valid. The merged reading uses canonical ids as keys and
    /// omits pollutants no endpoint reported.
    pub fn merge(&self, readings: &[RawReading]) -> Result<RawReading, AqiError> {
        let mut totals: BTreeMap<Pollutant, (f64, u32)> = BTreeMap::new();
        let mut reporting = 0;

        for (endpoint, raw) in readings.iter().enumerate() {
            let valid: Vec<(Pollutant, f64)> = normalize(raw)
                .into_iter()
                .filter(|(_, value)| *value >= 0.0)
                .collect();

            if valid.is_empty() {
                debug!(endpoint, "Endpoint reported no valid pollutant values");
                continue;
            }

            reporting += 1;
            for (pollutant, value) in valid {
                let entry = totals.entry(pollutant).or_insert((0.0, 0));
                entry.0 += value;
                entry.1 += 1;
            }
        }

        if reporting < self.min_reporting {
            return Err(AqiError::InsufficientSensors {
                reporting,
                required: self.min_reporting,
            });
        }

        Ok(totals
            .into_iter()
            .map(|(pollutant, (sum, count))| (pollutant.id(), sum / f64::from(count)))
            .collect())
    }
}

impl Default for SensorAverager {
    fn default() -> Self {
        Self::new(1)
    }
}
