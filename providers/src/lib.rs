//! Breathe providers - upstream data sources and the periodic refresher.
//!
//! The `breathe` core computes and caches AQI values but never touches the
//! network. This crate supplies the collaborators it treats as opaque:
//!
//! ```text
//! Open-Meteo API        AirGradient API
//!       ↓                     ↓
//! ┌─────────────────────────────────────────┐
//! │   DataSource implementations             │
//! │  - OpenMeteoSource (modeled estimates)   │
//! │  - AirGradientSource (ground sensors)    │
//! └─────────────────────────────────────────┘
//!          ↓
//! ┌─────────────────────────────────────────┐
//! │   breathe::ZoneService                   │
//! │  - merge, normalize, compute, cache      │
//! └─────────────────────────────────────────┘
//!          ↑
//!   RefreshScheduler (every refresh interval)
//! ```
//!
//! # Core Types
//!
//! - [`OpenMeteoSource`] - hourly air-quality estimates for any coordinates
//! - [`AirGradientSource`] - current measurements from AirGradient sensors
//! - [`RefreshScheduler`] - background task that refreshes every zone

pub mod air_gradient;
pub mod open_meteo;
pub mod scheduler;

mod http;

pub use air_gradient::AirGradientSource;
pub use open_meteo::OpenMeteoSource;
pub use scheduler::{RefreshScheduler, RefreshStatus};
