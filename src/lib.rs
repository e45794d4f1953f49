// Pollutant model, key normalization and unit conversion
pub mod pollutant;

// Breakpoint table and sub-index interpolation
pub mod breakpoints;

// AQI calculation and aggregation
pub mod aqi;

// Multi-node sensor averaging
pub mod merge;

// Zone definitions and registry
pub mod zones;

// Upstream data source interface
pub mod source;

// Per-zone freshness cache
pub mod cache;

// Zone service (cached AQI lookups and refreshes)
pub mod service;

// Configuration loading
pub mod config;

pub mod error;

pub use aqi::{AqiCalculator, AqiResult, SubIndexResult};
pub use breakpoints::{BreakpointTable, MAX_AQI};
pub use cache::{CacheState, Cached, Freshness, FRESHNESS_WINDOW};
pub use config::BreatheConfig;
pub use error::AqiError;
pub use pollutant::{Pollutant, PollutantReading, RawReading};
pub use service::{CachedAqi, ZoneService, ZoneSnapshot};
pub use source::DataSource;
pub use zones::{ProviderKind, ZoneDefinition, ZoneRegistry};
