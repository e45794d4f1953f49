use super::{Pollutant, PollutantReading};
use tracing::debug;

/// Raw provider payload: pollutant keys in arbitrary spelling, in the order
/// the provider emitted them.
///
/// Payload order matters: when two spellings of the same pollutant appear,
/// the later one wins during normalization.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawReading {
    entries: Vec<(String, f64)>,
}

impl RawReading {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a key/value pair (preserves payload order)
    pub fn push(&mut self, key: impl Into<String>, value: f64) {
        self.entries.push((key.into(), value));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for RawReading {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Collapse a raw key to its lookup form: lowercase, separators removed.
/// "PM2.5", "pm2_5", "pm-2.5" and "PM 25" all become "pm25".
fn squash(key: &str) -> String {
    key.trim()
        .chars()
        .filter(|c| !matches!(c, '.' | '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Synonym table over squashed keys
fn lookup(squashed: &str) -> Option<Pollutant> {
    let pollutant = match squashed {
        "pm25" => Pollutant::Pm25,
        "pm10" => Pollutant::Pm10,
        "co" | "carbonmonoxide" => Pollutant::Co,
        "no2" | "nitrogendioxide" => Pollutant::No2,
        "so2" | "sulphurdioxide" | "sulfurdioxide" => Pollutant::So2,
        "ch4" | "methane" => Pollutant::Ch4,
        "o3" | "ozone" => Pollutant::O3,
        _ => return None,
    };
    Some(pollutant)
}

/// Map a single raw key to its canonical pollutant
pub fn canonical_key(raw_key: &str) -> Option<Pollutant> {
    lookup(&squash(raw_key))
}

/// Normalize a raw payload to canonical keys.
///
/// Unrecognized keys and non-finite values are dropped. When several raw
/// keys map to the same pollutant, the last one in payload order wins.
/// Negative values are kept; they index to 0 downstream.
pub fn normalize(raw: &RawReading) -> PollutantReading {
    let mut reading = PollutantReading::new();

    for (key, value) in raw.iter() {
        let Some(pollutant) = canonical_key(key) else {
            debug!(key = %key, "Ignoring unrecognized pollutant key");
            continue;
        };

        if !value.is_finite() {
            debug!(key = %key, "Dropping non-finite concentration");
            continue;
        }

        reading.insert(pollutant, value);
    }

    reading
}
