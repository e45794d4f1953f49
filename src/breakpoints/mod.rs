// Regulatory breakpoint table and piecewise-linear sub-index interpolation

use crate::pollutant::Pollutant;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;


/// Highest reportable index value
pub const MAX_AQI: u16 = 500;

/// National table shipped with the crate (same content as
/// `config/aqi_breakpoints.toml`)
const NATIONAL_TABLE: &str = include_str!("../../config/aqi_breakpoints.toml");

/// One breakpoint range: concentrations `[c_lo, c_hi]` map linearly onto
/// indices `[i_lo, i_hi]`.
///
/// Deserializes from a 4-element array `[C_lo, C_hi, I_lo, I_hi]`.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(from = "(f64, f64, u16, u16)")]
pub struct Breakpoint {
    pub c_lo: f64,
    pub c_hi: f64,
    pub i_lo: u16,
    pub i_hi: u16,
}

impl From<(f64, f64, u16, u16)> for Breakpoint {
    fn from((c_lo, c_hi, i_lo, i_hi): (f64, f64, u16, u16)) -> Self {
        Self {
            c_lo,
            c_hi,
            i_lo,
            i_hi,
        }
    }
}

impl Breakpoint {
    /// Whether `c` falls inside this range (both ends inclusive)
    pub fn contains(&self, c: f64) -> bool {
        self.c_lo <= c && c <= self.c_hi
    }

    /// I = ((I_hi − I_lo) / (C_hi − C_lo)) × (C − C_lo) + I_lo,
    /// rounded half away from zero and clamped to [0, 500].
    pub fn interpolate(&self, c: f64) -> u16 {
        if self.c_hi == self.c_lo {
            return self.i_lo;
        }

        let slope = (f64::from(self.i_hi) - f64::from(self.i_lo)) / (self.c_hi - self.c_lo);
        let value = slope * (c - self.c_lo) + f64::from(self.i_lo);

        value.round().clamp(0.0, f64::from(MAX_AQI)) as u16
    }
}

/// Breakpoint ranges per pollutant.
///
/// Loaded once and never mutated; share it behind an `Arc`.
#[derive(Clone, Debug, PartialEq)]
pub struct BreakpointTable {
    ranges: BTreeMap<Pollutant, Vec<Breakpoint>>,
}

impl BreakpointTable {
    /// National table embedded in the binary
    pub fn national() -> Result<Self, BreakpointError> {
        Self::parse(NATIONAL_TABLE)
    }

    /// Load and validate an external breakpoint artifact
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read breakpoint table {}", path.display()))?;

        Self::parse(&contents)
            .with_context(|| format!("Invalid breakpoint table {}", path.display()))
    }

    /// Parse TOML of the form `pm10 = [[0.0, 50.0, 0, 50], ...]` and validate it
    pub fn parse(contents: &str) -> Result<Self, BreakpointError> {
        let raw: BTreeMap<String, Vec<Breakpoint>> =
            toml::from_str(contents).map_err(|e| BreakpointError::Parse(e.to_string()))?;

        let mut ranges = BTreeMap::new();
        for (key, list) in raw {
            let pollutant = Pollutant::from_id(&key)
                .ok_or_else(|| BreakpointError::UnknownPollutant(key.clone()))?;
            ranges.insert(pollutant, list);
        }

        Self::from_ranges(ranges)
    }

    /// Build a table from already-typed ranges, validating every invariant
    pub fn from_ranges(ranges: BTreeMap<Pollutant, Vec<Breakpoint>>) -> Result<Self, BreakpointError> {
        if ranges.is_empty() {
            return Err(BreakpointError::Empty);
        }

        for (pollutant, list) in &ranges {
            validate_ranges(*pollutant, list)?;
        }

        Ok(Self { ranges })
    }

    /// Ranges for one pollutant, ascending
    pub fn ranges(&self, pollutant: Pollutant) -> Option<&[Breakpoint]> {
        self.ranges.get(&pollutant).map(Vec::as_slice)
    }

    /// Pollutants that have a table entry
    pub fn pollutants(&self) -> impl Iterator<Item = Pollutant> + '_ {
        self.ranges.keys().copied()
    }

    /// Sub-index for a concentration already expressed in table units.
    ///
    /// Returns `None` when the pollutant has no entry. Below the first range
    /// (including negative and NaN input) yields 0; above the last range
    /// yields 500. Ranges are scanned in ascending order, so a value on a
    /// shared boundary resolves to the lower range.
    pub fn sub_index(&self, pollutant: Pollutant, concentration: f64) -> Option<u16> {
        let ranges = self.ranges.get(&pollutant)?;
        let first = ranges.first()?;

        if concentration.is_nan() || concentration < first.c_lo {
            return Some(0);
        }

        let index = ranges
            .iter()
            .find(|bp| bp.contains(concentration))
            .map(|bp| bp.interpolate(concentration))
            .unwrap_or(MAX_AQI);

        Some(index)
    }
}

fn validate_ranges(pollutant: Pollutant, list: &[Breakpoint]) -> Result<(), BreakpointError> {
    if !pollutant.is_indexed() {
        return Err(BreakpointError::NotIndexed(pollutant));
    }

    let first = list.first().ok_or(BreakpointError::NoRanges(pollutant))?;
    if first.c_lo != 0.0 {
        return Err(BreakpointError::DoesNotStartAtZero(pollutant));
    }

    for (index, bp) in list.iter().enumerate() {
        let unordered = bp.c_lo.is_nan() || bp.c_hi.is_nan() || bp.c_lo > bp.c_hi;
        if unordered || bp.i_lo > bp.i_hi {
            return Err(BreakpointError::InvertedRange { pollutant, index });
        }
        if bp.i_hi > MAX_AQI {
            return Err(BreakpointError::IndexOutOfRange { pollutant, index });
        }
    }

    // Zero concentration must index to 0
    if first.i_lo != 0 {
        return Err(BreakpointError::NonZeroBaseIndex(pollutant));
    }

    for (index, pair) in list.windows(2).enumerate() {
        if pair[1].c_lo != pair[0].c_hi {
            return Err(BreakpointError::NotContiguous {
                pollutant,
                index: index + 1,
            });
        }
    }

    Ok(())
}

/// Breakpoint table validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum BreakpointError {
    Parse(String),
    Empty,
    UnknownPollutant(String),
    NotIndexed(Pollutant),
    NoRanges(Pollutant),
    DoesNotStartAtZero(Pollutant),
    NonZeroBaseIndex(Pollutant),
    InvertedRange { pollutant: Pollutant, index: usize },
    IndexOutOfRange { pollutant: Pollutant, index: usize },
    NotContiguous { pollutant: Pollutant, index: usize },
}

impl fmt::Display for BreakpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakpointError::Parse(e) => write!(f, "failed to parse breakpoint table: {}", e),
            BreakpointError::Empty => write!(f, "breakpoint table has no pollutants"),
            BreakpointError::UnknownPollutant(key) => {
                write!(f, "unknown pollutant id '{}' (use canonical ids such as pm2_5)", key)
            }
            BreakpointError::NotIndexed(p) => {
                write!(f, "{} is outside AQI scope and must not have breakpoints", p)
            }
            BreakpointError::NoRanges(p) => write!(f, "{} has no breakpoint ranges", p),
            BreakpointError::DoesNotStartAtZero(p) => {
                write!(f, "{}: first range must start at concentration 0", p)
            }
            BreakpointError::NonZeroBaseIndex(p) => {
                write!(f, "{}: first range must start at index 0", p)
            }
            BreakpointError::InvertedRange { pollutant, index } => {
                write!(f, "{}: range {} has C_lo > C_hi or I_lo > I_hi", pollutant, index)
            }
            BreakpointError::IndexOutOfRange { pollutant, index } => {
                write!(f, "{}: range {} has index above {}", pollutant, index, MAX_AQI)
            }
            BreakpointError::NotContiguous { pollutant, index } => write!(
                f,
                "{}: range {} does not start where range {} ends",
                pollutant,
                index,
                index - 1
            ),
        }
    }
}

impl std::error::Error for BreakpointError {}
