//! AirGradient public API (ground sensors, particulates only).

use crate::http::{build_client, check_response_status, request_failed};
use crate::open_meteo::{OpenMeteoSource, GAS_VARIABLES};
use anyhow::Result;
use async_trait::async_trait;
use breathe::zones::SensorEndpoint;
use breathe::{AqiError, DataSource, ProviderKind, RawReading, ZoneDefinition};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

pub const BASE_URL: &str = "https://api.airgradient.com";

const PROVIDER: &str = "AirGradient";

/// Measurements older than this mean the sensor is offline
pub const MAX_MEASUREMENT_AGE_SECS: i64 = 3600;

/// Current measures for one location. Corrected fields are preferred.
#[derive(Debug, Deserialize)]
struct CurrentMeasures {
    #[serde(default)]
    pm02: Option<f64>,
    #[serde(default)]
    pm02_corrected: Option<f64>,
    #[serde(default)]
    pm10: Option<f64>,
    #[serde(default)]
    pm10_corrected: Option<f64>,
    #[serde(default)]
    timestamp: Option<String>,
}

/// Data source backed by AirGradient sensors.
///
/// Each zone endpoint names a location id and the env var holding its
/// token. Endpoints that fail, have no token, lack PM2.5, or report stale
/// data are skipped; the zone fails only when none are left.
pub struct AirGradientSource {
    http_client: Client,
    base_url: String,
    gases: Option<Arc<OpenMeteoSource>>,
}

impl AirGradientSource {
    /// Create a source using the public AirGradient base URL.
    pub fn new() -> Result<Self> {
        Self::with_base_url(BASE_URL.to_string())
    }

    /// Create a source with a custom base URL (for testing with a mock server).
    pub fn with_base_url(base_url: String) -> Result<Self> {
        Ok(Self {
            http_client: build_client()?,
            base_url,
            gases: None,
        })
    }

    /// Complete sensor readings with modeled gas values (O3, NO2, SO2, CO)
    /// for the zone coordinates
    pub fn with_gas_supplement(mut self, open_meteo: Arc<OpenMeteoSource>) -> Self {
        self.gases = Some(open_meteo);
        self
    }

    async fn fetch_endpoint(
        &self,
        endpoint: &SensorEndpoint,
        location_id: u64,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<RawReading, AqiError> {
        let url = format!(
            "{}/public/api/v1/locations/{}/measures/current",
            self.base_url, location_id
        );
        let response = self
            .http_client
            .get(&url)
            .query(&[("token", token)])
            .send()
            .await
            .map_err(|e| request_failed(PROVIDER, e))?;

        check_response_status(PROVIDER, &response)?;

        let measures: CurrentMeasures = response
            .json()
            .await
            .map_err(|e| AqiError::upstream(format!("Failed to parse {} response: {}", PROVIDER, e)))?;

        to_reading(&endpoint.id, measures, now)
    }
}

/// Convert one measurement, rejecting it when PM2.5 is missing or the
/// timestamp is more than an hour old
fn to_reading(endpoint_id: &str, measures: CurrentMeasures, now: DateTime<Utc>) -> Result<RawReading, AqiError> {
    if let Some(ts) = measures.timestamp.as_deref() {
        match DateTime::parse_from_rfc3339(ts) {
            Ok(measured_at) => {
                let age = now.signed_duration_since(measured_at.with_timezone(&Utc));
                if age > Duration::seconds(MAX_MEASUREMENT_AGE_SECS) {
                    return Err(AqiError::upstream(format!(
                        "sensor {} data is stale ({} minutes old)",
                        endpoint_id,
                        age.num_minutes()
                    )));
                }
            }
            Err(e) => debug!(endpoint = endpoint_id, error = %e, "Unparseable measurement timestamp"),
        }
    }

    let pm25 = measures
        .pm02_corrected
        .or(measures.pm02)
        .ok_or_else(|| AqiError::upstream(format!("sensor {} reported no PM2.5", endpoint_id)))?;

    let mut reading = RawReading::new();
    reading.push("pm2_5", pm25);
    if let Some(pm10) = measures.pm10_corrected.or(measures.pm10) {
        reading.push("pm10", pm10);
    }
    Ok(reading)
}

#[async_trait]
impl DataSource for AirGradientSource {
    fn name(&self) -> &str {
        "air_gradient"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::AirGradient
    }

    async fn fetch(&self, zone: &ZoneDefinition) -> Result<Vec<RawReading>, AqiError> {
        let now = Utc::now();
        let mut readings = Vec::new();

        for endpoint in &zone.endpoints {
            let Some(location_id) = endpoint.location_id else {
                continue;
            };

            let token = endpoint
                .token_env
                .as_deref()
                .and_then(|name| std::env::var(name).ok());
            let Some(token) = token else {
                warn!(zone_id = %zone.id, endpoint = %endpoint.id, "No AirGradient token, skipping endpoint");
                continue;
            };

            match self.fetch_endpoint(endpoint, location_id, &token, now).await {
                Ok(reading) => readings.push(reading),
                Err(e) => warn!(
                    zone_id = %zone.id,
                    endpoint = %endpoint.id,
                    error = %e,
                    "AirGradient endpoint skipped"
                ),
            }
        }

        if readings.is_empty() {
            return Err(AqiError::upstream(format!(
                "no AirGradient endpoint returned current data for zone '{}'",
                zone.id
            )));
        }

        if let Some(open_meteo) = &self.gases {
            match open_meteo.fetch_current(zone.lat, zone.lon, GAS_VARIABLES).await {
                Ok(gases) => {
                    for reading in &mut readings {
                        for (key, value) in gases.iter() {
                            reading.push(key, value);
                        }
                    }
                }
                Err(e) => warn!(zone_id = %zone.id, error = %e, "Gas supplement unavailable"),
            }
        }

        debug!(zone_id = %zone.id, endpoints = readings.len(), "AirGradient readings");
        Ok(readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use breathe::pollutant::normalize;
    use breathe::Pollutant;
    use mockito::{Matcher, Server};

    fn zone(endpoints: Vec<SensorEndpoint>) -> ZoneDefinition {
        ZoneDefinition {
            id: "srinagar".to_string(),
            name: "Srinagar".to_string(),
            provider: ProviderKind::AirGradient,
            lat: 34.08,
            lon: 74.79,
            fallback_provider: Some(ProviderKind::OpenMeteo),
            min_reporting_sensors: None,
            endpoints,
        }
    }

    fn endpoint(id: &str, location_id: u64, token_env: &str) -> SensorEndpoint {
        SensorEndpoint {
            id: id.to_string(),
            location_id: Some(location_id),
            token_env: Some(token_env.to_string()),
        }
    }

    fn measures(body: serde_json::Value) -> CurrentMeasures {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_prefers_corrected_values() {
        let now = Utc::now();
        let reading = to_reading(
            "lal_chowk",
            measures(serde_json::json!({
                "pm02": 80.0,
                "pm02_corrected": 61.5,
                "pm10": 120.0,
                "timestamp": now.to_rfc3339()
            })),
            now,
        )
        .unwrap();

        assert_eq!(
            reading.iter().collect::<Vec<_>>(),
            vec![("pm2_5", 61.5), ("pm10", 120.0)]
        );
    }

    #[test]
    fn test_stale_measurement_rejected() {
        let now = Utc::now();
        let err = to_reading(
            "lal_chowk",
            measures(serde_json::json!({
                "pm02": 30.0,
                "timestamp": (now - Duration::minutes(90)).to_rfc3339()
            })),
            now,
        )
        .unwrap_err();

        assert_eq!(
            err,
            AqiError::upstream("sensor lal_chowk data is stale (90 minutes old)")
        );
    }

    #[test]
    fn test_missing_pm25_rejected() {
        let err = to_reading("north", measures(serde_json::json!({"pm10": 40.0})), Utc::now())
            .unwrap_err();
        assert_eq!(err, AqiError::upstream("sensor north reported no PM2.5"));
    }

    #[tokio::test]
    async fn test_fetch_skips_failing_endpoints() {
        std::env::set_var("BREATHE_TEST_AG_TOKEN_SKIP", "secret");
        let now = Utc::now().to_rfc3339();

        let mut server = Server::new_async().await;
        let _ok = server
            .mock("GET", "/public/api/v1/locations/1/measures/current")
            .match_query(Matcher::UrlEncoded("token".into(), "secret".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({"pm02_corrected": 45.0, "pm10_corrected": 70.0, "timestamp": now})
                    .to_string(),
            )
            .create_async()
            .await;
        let _down = server
            .mock("GET", "/public/api/v1/locations/2/measures/current")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let source = AirGradientSource::with_base_url(server.url()).unwrap();
        let zone = zone(vec![
            endpoint("north", 1, "BREATHE_TEST_AG_TOKEN_SKIP"),
            endpoint("south", 2, "BREATHE_TEST_AG_TOKEN_SKIP"),
            endpoint("east", 3, "BREATHE_TEST_AG_TOKEN_UNSET"),
        ]);

        let readings = source.fetch(&zone).await.unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(normalize(&readings[0]).get(&Pollutant::Pm25), Some(&45.0));
    }

    #[tokio::test]
    async fn test_fetch_fails_when_no_endpoint_responds() {
        std::env::set_var("BREATHE_TEST_AG_TOKEN_DOWN", "secret");

        let mut server = Server::new_async().await;
        let _down = server
            .mock("GET", "/public/api/v1/locations/7/measures/current")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let source = AirGradientSource::with_base_url(server.url()).unwrap();
        let err = source
            .fetch(&zone(vec![endpoint("north", 7, "BREATHE_TEST_AG_TOKEN_DOWN")]))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AqiError::upstream("no AirGradient endpoint returned current data for zone 'srinagar'")
        );
    }

    #[tokio::test]
    async fn test_gas_supplement_appended() {
        std::env::set_var("BREATHE_TEST_AG_TOKEN_GAS", "secret");
        let now = Utc::now();

        let mut server = Server::new_async().await;
        let _sensor = server
            .mock("GET", "/public/api/v1/locations/5/measures/current")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({"pm02": 20.0, "timestamp": now.to_rfc3339()}).to_string(),
            )
            .create_async()
            .await;
        let _gases = server
            .mock("GET", "/v1/air-quality")
            .match_query(Matcher::UrlEncoded(
                "hourly".into(),
                "ozone,nitrogen_dioxide,sulphur_dioxide,carbon_monoxide".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "hourly": {
                        "time": [now.timestamp()],
                        "ozone": [55.0],
                        "nitrogen_dioxide": [18.0],
                        "sulphur_dioxide": [3.0],
                        "carbon_monoxide": [410.0]
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let open_meteo = Arc::new(OpenMeteoSource::with_base_url(server.url()).unwrap());
        let source = AirGradientSource::with_base_url(server.url())
            .unwrap()
            .with_gas_supplement(open_meteo);

        let readings = source
            .fetch(&zone(vec![endpoint("north", 5, "BREATHE_TEST_AG_TOKEN_GAS")]))
            .await
            .unwrap();

        let reading = normalize(&readings[0]);
        assert_eq!(reading.get(&Pollutant::Pm25), Some(&20.0));
        assert_eq!(reading.get(&Pollutant::O3), Some(&55.0));
        assert_eq!(reading.get(&Pollutant::Co), Some(&410.0));
        assert_eq!(reading.get(&Pollutant::Pm10), None);
    }
}
