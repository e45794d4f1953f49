use super::*;
use crate::breakpoints::BreakpointTable;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

struct StubSource {
    name: &'static str,
    kind: ProviderKind,
    response: Mutex<Result<Vec<RawReading>, AqiError>>,
    calls: AtomicUsize,
}

impl StubSource {
    fn new(name: &'static str, kind: ProviderKind, readings: Vec<Vec<(&str, f64)>>) -> Arc<Self> {
        let readings: Vec<RawReading> = readings
            .into_iter()
            .map(|pairs| pairs.into_iter().collect())
            .collect();
        Arc::new(Self {
            name,
            kind,
            response: Mutex::new(Ok(readings)),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(name: &'static str, kind: ProviderKind, err: AqiError) -> Arc<Self> {
        Arc::new(Self {
            name,
            kind,
            response: Mutex::new(Err(err)),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl DataSource for StubSource {
    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn fetch(&self, _zone: &ZoneDefinition) -> Result<Vec<RawReading>, AqiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.lock().unwrap().clone()
    }
}

const ZONES: &str = r#"
[[zone]]
id = "srinagar"
name = "Srinagar"
provider = "air_gradient"
fallback_provider = "open_meteo"
lat = 34.08
lon = 74.79

[[zone.endpoints]]
id = "lal_chowk"
location_id = 172681

[[zone]]
id = "old_city"
name = "Old City"
provider = "air_gradient"
lat = 34.09
lon = 74.81
min_reporting_sensors = 2

[[zone.endpoints]]
id = "north"
location_id = 1

[[zone.endpoints]]
id = "south"
location_id = 2

[[zone]]
id = "leh"
name = "Leh"
provider = "open_meteo"
lat = 34.15
lon = 77.57
"#;

fn service() -> ZoneService {
    let registry = Arc::new(ZoneRegistry::parse(ZONES).unwrap());
    let calculator = AqiCalculator::new(Arc::new(BreakpointTable::national().unwrap()));
    ZoneService::new(registry, calculator, &BreatheConfig::default())
}

#[tokio::test]
async fn test_unknown_zone() {
    let service = service();
    assert_eq!(
        service.get_zone_aqi("gulmarg").await.unwrap_err(),
        AqiError::UnknownZone("gulmarg".to_string())
    );
    assert_eq!(
        service.cache_state("gulmarg").unwrap_err(),
        AqiError::UnknownZone("gulmarg".to_string())
    );
}

#[tokio::test]
async fn test_snapshot_carries_zone_and_source() {
    let meteo = StubSource::new(
        "open_meteo",
        ProviderKind::OpenMeteo,
        vec![vec![("pm2_5", 45.0), ("pm10", 150.0)]],
    );
    let service = service().with_source(meteo);

    let cached = service.get_zone_aqi("leh").await.unwrap();
    assert_eq!(cached.value.zone_id, "leh");
    assert_eq!(cached.value.zone_name, "Leh");
    assert_eq!(cached.value.source, "open_meteo");
    assert_eq!(cached.value.result.aqi, 134);
    assert_eq!(cached.value.result.main_pollutant, Pollutant::Pm10);
    assert!(cached.value.notices.is_empty());
}

#[tokio::test]
async fn test_spike_notice_attached_but_value_reported() {
    let meteo = StubSource::new(
        "open_meteo",
        ProviderKind::OpenMeteo,
        vec![vec![("pm2_5", 700.0)]],
    );
    let service = service().with_source(meteo);

    let cached = service.get_zone_aqi("leh").await.unwrap();
    assert_eq!(cached.value.result.aqi, 500);
    assert!(cached.value.has_notice(NoticeKind::SensorSpike));
}

#[tokio::test]
async fn test_fallback_provider_used_when_primary_fails() {
    let sensors = StubSource::failing(
        "air_gradient",
        ProviderKind::AirGradient,
        AqiError::upstream("no sensor data within the last hour"),
    );
    let meteo = StubSource::new(
        "open_meteo",
        ProviderKind::OpenMeteo,
        vec![vec![("pm10", 150.0)]],
    );
    let service = service().with_source(sensors.clone()).with_source(meteo.clone());

    let cached = service.get_zone_aqi("srinagar").await.unwrap();
    assert_eq!(cached.value.source, "open_meteo");
    assert!(cached.value.has_notice(NoticeKind::ProviderFallback));
    assert_eq!(sensors.calls.load(Ordering::SeqCst), 1);
    assert_eq!(meteo.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_both_providers_failing_reports_primary_error() {
    let sensors = StubSource::failing(
        "air_gradient",
        ProviderKind::AirGradient,
        AqiError::upstream("HTTP 502"),
    );
    let meteo = StubSource::failing(
        "open_meteo",
        ProviderKind::OpenMeteo,
        AqiError::upstream("HTTP 500"),
    );
    let service = service().with_source(sensors).with_source(meteo);

    assert_eq!(
        service.get_zone_aqi("srinagar").await.unwrap_err(),
        AqiError::upstream("HTTP 502")
    );
    assert_eq!(service.cache_state("srinagar").unwrap(), CacheState::Empty);
}

#[tokio::test]
async fn test_missing_source_is_upstream_failure() {
    let service = service();
    assert!(matches!(
        service.get_zone_aqi("leh").await,
        Err(AqiError::UpstreamFailure(_))
    ));
}

#[tokio::test]
async fn test_multi_node_zone_is_averaged() {
    let sensors = StubSource::new(
        "air_gradient",
        ProviderKind::AirGradient,
        vec![vec![("pm2_5", 100.0)], vec![("PM2.5", 140.0)]],
    );
    let service = service().with_source(sensors);

    let cached = service.get_zone_aqi("old_city").await.unwrap();
    assert_eq!(
        cached.value.result.raw_concentrations.get(&Pollutant::Pm25),
        Some(&120.0)
    );
}

#[tokio::test]
async fn test_multi_node_zone_needs_minimum_reporters() {
    let sensors = StubSource::new(
        "air_gradient",
        ProviderKind::AirGradient,
        vec![vec![("pm2_5", 100.0)], vec![("temperature", 4.0)]],
    );
    let service = service().with_source(sensors);

    assert_eq!(
        service.get_zone_aqi("old_city").await.unwrap_err(),
        AqiError::InsufficientSensors {
            reporting: 1,
            required: 2
        }
    );
}

#[tokio::test]
async fn test_single_node_keeps_negative_values_as_zero_index() {
    let meteo = StubSource::new(
        "open_meteo",
        ProviderKind::OpenMeteo,
        vec![vec![("pm10", -3.0), ("no2", 20.0)]],
    );
    let service = service().with_source(meteo);

    let cached = service.get_zone_aqi("leh").await.unwrap();
    assert_eq!(cached.value.result.aqi_details.get(&Pollutant::Pm10), Some(&0));
    assert_eq!(cached.value.result.main_pollutant, Pollutant::No2);
}

#[test]
fn test_spike_thresholds_are_exclusive() {
    let mut reading = PollutantReading::new();
    reading.insert(Pollutant::Pm25, 650.0);
    reading.insert(Pollutant::Pm10, 600.0);
    assert!(!has_implausible_spike(&reading));

    reading.insert(Pollutant::Pm10, 600.5);
    assert!(has_implausible_spike(&reading));
}
