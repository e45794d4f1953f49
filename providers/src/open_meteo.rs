//! Open-Meteo air-quality API (modeled estimates, global coverage).

use crate::http::{build_client, check_response_status, request_failed};
use anyhow::Result;
use async_trait::async_trait;
use breathe::{AqiError, DataSource, ProviderKind, RawReading, ZoneDefinition};
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

pub const BASE_URL: &str = "https://air-quality-api.open-meteo.com";

const PROVIDER: &str = "Open-Meteo";

/// Hourly variables requested for a full reading, in payload order
pub const ALL_VARIABLES: &[&str] = &[
    "pm10",
    "pm2_5",
    "carbon_monoxide",
    "nitrogen_dioxide",
    "sulphur_dioxide",
    "ozone",
    "methane",
];

/// Gas variables used to complement particulate-only sensors
pub const GAS_VARIABLES: &[&str] = &[
    "ozone",
    "nitrogen_dioxide",
    "sulphur_dioxide",
    "carbon_monoxide",
];

/// Hours to look back when the current hour has no value
const LOOKBACK_HOURS: usize = 5;

#[derive(Debug, Deserialize)]
struct AirQualityResponse {
    #[serde(default)]
    hourly: Option<Hourly>,
}

#[derive(Debug, Deserialize)]
struct Hourly {
    #[serde(default)]
    time: Vec<i64>,
    #[serde(flatten)]
    series: HashMap<String, Vec<Option<f64>>>,
}

/// Data source backed by the Open-Meteo air-quality endpoint
pub struct OpenMeteoSource {
    http_client: Client,
    base_url: String,
}

impl OpenMeteoSource {
    /// Create a source using the public Open-Meteo base URL.
    pub fn new() -> Result<Self> {
        Self::with_base_url(BASE_URL.to_string())
    }

    /// Create a source with a custom base URL (for testing with a mock server).
    pub fn with_base_url(base_url: String) -> Result<Self> {
        Ok(Self {
            http_client: build_client()?,
            base_url,
        })
    }

    /// Current values of `variables` at the given coordinates
    pub async fn fetch_current(
        &self,
        lat: f64,
        lon: f64,
        variables: &[&str],
    ) -> Result<RawReading, AqiError> {
        let url = format!("{}/v1/air-quality", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                ("hourly", variables.join(",")),
                ("timezone", "auto".to_string()),
                ("timeformat", "unixtime".to_string()),
                ("past_days", "1".to_string()),
            ])
            .send()
            .await
            .map_err(|e| request_failed(PROVIDER, e))?;

        check_response_status(PROVIDER, &response)?;

        let body: AirQualityResponse = response
            .json()
            .await
            .map_err(|e| AqiError::upstream(format!("Failed to parse {} response: {}", PROVIDER, e)))?;

        let hourly = body
            .hourly
            .filter(|h| !h.time.is_empty())
            .ok_or_else(|| AqiError::upstream(format!("{} returned no hourly data", PROVIDER)))?;

        Ok(pick_current(&hourly, Utc::now().timestamp(), variables))
    }
}

#[async_trait]
impl DataSource for OpenMeteoSource {
    fn name(&self) -> &str {
        "open_meteo"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenMeteo
    }

    async fn fetch(&self, zone: &ZoneDefinition) -> Result<Vec<RawReading>, AqiError> {
        let reading = self.fetch_current(zone.lat, zone.lon, ALL_VARIABLES).await?;
        debug!(zone_id = %zone.id, values = reading.len(), "Open-Meteo reading");
        Ok(vec![reading])
    }
}

/// Take each variable at the hour closest to `now`, stepping back up to
/// five hours past nulls. Variables with no value in that span are omitted.
fn pick_current(hourly: &Hourly, now: i64, variables: &[&str]) -> RawReading {
    let mut reading = RawReading::new();

    let closest = hourly
        .time
        .iter()
        .enumerate()
        .min_by_key(|(_, t)| (**t - now).abs())
        .map(|(i, _)| i);

    let Some(index) = closest else {
        return reading;
    };

    for variable in variables {
        let Some(values) = hourly.series.get(*variable) else {
            continue;
        };

        let found = (0..=LOOKBACK_HOURS)
            .filter_map(|step| index.checked_sub(step))
            .find_map(|i| values.get(i).copied().flatten());

        if let Some(value) = found {
            reading.push(*variable, value);
        }
    }

    reading
}
