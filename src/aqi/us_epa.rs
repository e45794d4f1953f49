//! US EPA particulate index, reported next to the national AQI.
//!
//! EPA rules differ from the national table: concentrations are truncated
//! (PM2.5 to 0.1 µg/m³, PM10 to 1 µg/m³) before lookup and the interpolated
//! index is truncated rather than rounded. Truncation means the gaps between
//! EPA ranges can never be hit.

use crate::breakpoints::{Breakpoint, MAX_AQI};
use crate::pollutant::{Pollutant, PollutantReading};

const fn bp(c_lo: f64, c_hi: f64, i_lo: u16, i_hi: u16) -> Breakpoint {
    Breakpoint {
        c_lo,
        c_hi,
        i_lo,
        i_hi,
    }
}

const PM25: [Breakpoint; 7] = [
    bp(0.0, 9.0, 0, 50),
    bp(9.1, 35.4, 51, 100),
    bp(35.5, 55.4, 101, 150),
    bp(55.5, 125.4, 151, 200),
    bp(125.5, 225.4, 201, 300),
    bp(225.5, 325.4, 301, 400),
    bp(325.5, 500.4, 401, 500),
];

const PM10: [Breakpoint; 7] = [
    bp(0.0, 54.0, 0, 50),
    bp(55.0, 154.0, 51, 100),
    bp(155.0, 254.0, 101, 150),
    bp(255.0, 354.0, 151, 200),
    bp(355.0, 424.0, 201, 300),
    bp(425.0, 504.0, 301, 400),
    bp(505.0, 604.0, 401, 500),
];

/// EPA sub-index for PM2.5 or PM10 (µg/m³). Other pollutants return `None`.
pub fn us_sub_index(pollutant: Pollutant, concentration: f64) -> Option<u16> {
    let (ranges, truncated) = match pollutant {
        Pollutant::Pm25 => (&PM25, (concentration * 10.0).floor() / 10.0),
        Pollutant::Pm10 => (&PM10, concentration.trunc()),
        _ => return None,
    };

    if truncated.is_nan() || truncated < ranges[0].c_lo {
        return Some(0);
    }

    let index = match ranges.iter().find(|r| r.contains(truncated)) {
        Some(r) if r.c_hi == r.c_lo => r.i_lo,
        Some(r) => {
            let span = f64::from(r.i_hi - r.i_lo) * (truncated - r.c_lo);
            (span / (r.c_hi - r.c_lo) + f64::from(r.i_lo)).trunc() as u16
        }
        None => MAX_AQI,
    };

    Some(index)
}

/// Highest EPA particulate sub-index, `None` without PM2.5/PM10
pub fn us_aqi(reading: &PollutantReading) -> Option<u16> {
    [Pollutant::Pm25, Pollutant::Pm10]
        .into_iter()
        .filter_map(|p| reading.get(&p).and_then(|c| us_sub_index(p, *c)))
        .max()
}
