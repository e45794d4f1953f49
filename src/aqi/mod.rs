// Sub-index calculation and AQI aggregation

mod us_epa;

pub use us_epa::{us_aqi, us_sub_index};

use crate::breakpoints::BreakpointTable;
use crate::error::AqiError;
use crate::pollutant::{
    normalize, to_breakpoint_units, ConvertedReading, Pollutant, PollutantReading, RawReading,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// AQI sub-index for a single pollutant
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SubIndexResult {
    pub pollutant: Pollutant,
    pub value: u16,
}

/// Outcome of one AQI computation. Immutable once built.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AqiResult {
    /// Overall index: the highest sub-index
    pub aqi: u16,

    /// Pollutant owning the highest sub-index
    pub main_pollutant: Pollutant,

    /// Sub-index per eligible pollutant
    pub aqi_details: BTreeMap<Pollutant, u16>,

    /// Concentrations in breakpoint units (CO/CH4 in mg/m³), as used
    pub concentrations: ConvertedReading,

    /// Normalized concentrations as received (µg/m³)
    pub raw_concentrations: PollutantReading,

    /// US EPA particulate index, informational only
    pub us_aqi: Option<u16>,
}

/// Pick the overall AQI and its owning pollutant.
///
/// Ties resolve to the pollutant that comes first in canonical order,
/// regardless of the order of `sub_indices`.
pub fn aggregate(sub_indices: &[SubIndexResult]) -> Result<SubIndexResult, AqiError> {
    sub_indices
        .iter()
        .copied()
        .reduce(|best, candidate| {
            let higher = candidate.value > best.value;
            let earlier_tie = candidate.value == best.value && candidate.pollutant < best.pollutant;
            if higher || earlier_tie {
                candidate
            } else {
                best
            }
        })
        .ok_or(AqiError::NoEligiblePollutants)
}

/// Runs normalization → unit conversion → sub-index → aggregation against
/// a shared breakpoint table.
#[derive(Clone, Debug)]
pub struct AqiCalculator {
    table: Arc<BreakpointTable>,
}

impl AqiCalculator {
    pub fn new(table: Arc<BreakpointTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &BreakpointTable {
        &self.table
    }

    /// Sub-indices for every pollutant present in both the reading and the table
    pub fn sub_indices(&self, converted: &ConvertedReading) -> Vec<SubIndexResult> {
        converted
            .indexable()
            .filter_map(|(pollutant, concentration)| {
                self.table
                    .sub_index(pollutant, concentration)
                    .map(|value| SubIndexResult { pollutant, value })
            })
            .collect()
    }

    /// Compute the AQI for a raw provider payload
    pub fn compute_raw(&self, raw: &RawReading) -> Result<AqiResult, AqiError> {
        self.compute(&normalize(raw))
    }

    /// Compute the AQI for an already normalized reading (µg/m³)
    pub fn compute(&self, reading: &PollutantReading) -> Result<AqiResult, AqiError> {
        if reading.is_empty() {
            return Err(AqiError::MalformedReading);
        }

        let concentrations = to_breakpoint_units(reading);
        let sub_indices = self.sub_indices(&concentrations);
        let main = aggregate(&sub_indices)?;

        Ok(AqiResult {
            aqi: main.value,
            main_pollutant: main.pollutant,
            aqi_details: sub_indices
                .iter()
                .map(|s| (s.pollutant, s.value))
                .collect(),
            concentrations,
            raw_concentrations: reading.clone(),
            us_aqi: us_aqi(reading),
        })
    }
}
