// Pollutant model, key normalization and unit conversion

mod normalize;
mod units;
#[cfg(test)]
mod tests;

pub use normalize::{canonical_key, normalize, RawReading};
pub use units::{to_breakpoint_units, ConvertedReading};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Canonical pollutant identifiers.
///
/// Declaration order is the canonical enumeration order. It drives the
/// ordering of every `PollutantReading` and the aggregator tie-break.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pollutant {
    #[serde(rename = "pm2_5")]
    Pm25,
    #[serde(rename = "pm10")]
    Pm10,
    #[serde(rename = "co")]
    Co,
    #[serde(rename = "no2")]
    No2,
    #[serde(rename = "so2")]
    So2,
    #[serde(rename = "ch4")]
    Ch4,
    #[serde(rename = "o3")]
    O3,
}

impl Pollutant {
    /// All pollutants in canonical order
    pub const ALL: [Pollutant; 7] = [
        Pollutant::Pm25,
        Pollutant::Pm10,
        Pollutant::Co,
        Pollutant::No2,
        Pollutant::So2,
        Pollutant::Ch4,
        Pollutant::O3,
    ];

    /// Canonical identifier (used in config files and serialized output)
    pub fn id(&self) -> &'static str {
        match self {
            Pollutant::Pm25 => "pm2_5",
            Pollutant::Pm10 => "pm10",
            Pollutant::Co => "co",
            Pollutant::No2 => "no2",
            Pollutant::So2 => "so2",
            Pollutant::Ch4 => "ch4",
            Pollutant::O3 => "o3",
        }
    }

    /// Parse a canonical identifier. Only exact canonical ids are accepted;
    /// use [`normalize`] for arbitrary provider spellings.
    pub fn from_id(id: &str) -> Option<Pollutant> {
        Pollutant::ALL.into_iter().find(|p| p.id() == id)
    }

    /// Whether concentrations arrive in µg/m³ but are indexed in mg/m³
    pub fn indexed_in_mg(&self) -> bool {
        matches!(self, Pollutant::Co | Pollutant::Ch4)
    }

    /// Whether this pollutant ever participates in AQI computation.
    /// CH4 is reported but never indexed.
    pub fn is_indexed(&self) -> bool {
        !matches!(self, Pollutant::Ch4)
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Pollutant::Pm25 => "PM2.5",
            Pollutant::Pm10 => "PM10",
            Pollutant::Co => "CO",
            Pollutant::No2 => "NO2",
            Pollutant::So2 => "SO2",
            Pollutant::Ch4 => "CH4",
            Pollutant::O3 => "O3",
        };
        f.write_str(name)
    }
}

/// Concentrations keyed by canonical pollutant, iterated in canonical order
pub type PollutantReading = BTreeMap<Pollutant, f64>;
