use super::{Pollutant, PollutantReading};
use serde::Serialize;

/// Micrograms per milligram
const UG_PER_MG: f64 = 1000.0;

/// Concentrations expressed in the units the breakpoint table expects.
///
/// Only constructed by [`to_breakpoint_units`], so a value can never be
/// converted twice.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ConvertedReading {
    values: PollutantReading,
}

impl ConvertedReading {
    /// Every converted concentration, including reporting-only pollutants
    pub fn all(&self) -> &PollutantReading {
        &self.values
    }

    /// Concentrations handed to the sub-index calculator (CH4 excluded)
    pub fn indexable(&self) -> impl Iterator<Item = (Pollutant, f64)> + '_ {
        self.values
            .iter()
            .filter(|(p, _)| p.is_indexed())
            .map(|(p, v)| (*p, *v))
    }

    pub fn get(&self, pollutant: Pollutant) -> Option<f64> {
        self.values.get(&pollutant).copied()
    }
}

/// Convert normalized µg/m³ concentrations into breakpoint units.
///
/// CO and CH4 are divided by 1000 (µg/m³ → mg/m³); everything else passes
/// through unchanged.
pub fn to_breakpoint_units(reading: &PollutantReading) -> ConvertedReading {
    let values = reading
        .iter()
        .map(|(pollutant, value)| {
            let converted = if pollutant.indexed_in_mg() {
                value / UG_PER_MG
            } else {
                *value
            };
            (*pollutant, converted)
        })
        .collect();

    ConvertedReading { values }
}
