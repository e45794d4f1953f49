// Zone service: registry + data sources + AQI pipeline + cache

mod snapshot;
#[cfg(test)]
mod tests;

pub use snapshot::{Notice, NoticeKind, ZoneSnapshot};

use crate::aqi::AqiCalculator;
use crate::cache::{CacheState, Cached, Clock, ZoneCache};
use crate::config::BreatheConfig;
use crate::error::AqiError;
use crate::merge::SensorAverager;
use crate::pollutant::{Pollutant, PollutantReading, RawReading};
use crate::source::DataSource;
use crate::zones::{ProviderKind, ZoneDefinition, ZoneRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// PM2.5 above this (µg/m³) is flagged as a probable sensor artifact
pub const PM25_SPIKE_THRESHOLD: f64 = 650.0;

/// PM10 above this (µg/m³) is flagged as a probable sensor artifact
pub const PM10_SPIKE_THRESHOLD: f64 = 600.0;

/// A zone's AQI as served by the cache
pub type CachedAqi = Cached<ZoneSnapshot>;

/// Outcome of refreshing one zone within [`ZoneService::refresh_all`]
#[derive(Debug)]
pub struct ZoneRefreshOutcome {
    pub zone_id: String,
    pub result: Result<CachedAqi, AqiError>,
}

/// Entry point for AQI lookups.
///
/// Owns the per-zone cache and runs the fetch → merge → normalize →
/// convert → sub-index → aggregate pipeline whenever a zone needs a new
/// value.
pub struct ZoneService {
    registry: Arc<ZoneRegistry>,
    sources: HashMap<ProviderKind, Arc<dyn DataSource>>,
    calculator: AqiCalculator,
    cache: ZoneCache<ZoneSnapshot>,
    min_reporting: usize,
    stagger: Duration,
}

impl ZoneService {
    pub fn new(registry: Arc<ZoneRegistry>, calculator: AqiCalculator, config: &BreatheConfig) -> Self {
        Self {
            registry,
            sources: HashMap::new(),
            calculator,
            cache: ZoneCache::new(config.cache.refresh_timeout()),
            min_reporting: config.sensors.min_reporting,
            stagger: config.refresh.stagger(),
        }
    }

    /// Register the data source for its provider kind, replacing any
    /// previous one
    pub fn with_source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.sources.insert(source.kind(), source);
        self
    }

    /// Replace the cache clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.cache = ZoneCache::with_clock(self.cache.refresh_timeout(), clock);
        self
    }

    /// Configured zones in registry order
    pub fn zones(&self) -> impl Iterator<Item = &Arc<ZoneDefinition>> {
        self.registry.iter()
    }

    /// Whether the zone's cached value is fresh, stale, or absent
    pub fn cache_state(&self, zone_id: &str) -> Result<CacheState, AqiError> {
        self.zone(zone_id)?;
        Ok(self.cache.state(zone_id))
    }

    /// Cached AQI for a zone, recomputed when empty or stale.
    ///
    /// A failed recomputation is returned as an error even if a stale value
    /// exists; see [`ZoneService::get_zone_aqi_or_stale`].
    pub async fn get_zone_aqi(&self, zone_id: &str) -> Result<CachedAqi, AqiError> {
        let zone = self.zone(zone_id)?;
        self.cache
            .get_or_refresh(zone_id, || self.compute_zone(&zone))
            .await
    }

    /// Like [`ZoneService::get_zone_aqi`], but serves the last value (marked
    /// stale) when recomputation fails
    pub async fn get_zone_aqi_or_stale(&self, zone_id: &str) -> Result<CachedAqi, AqiError> {
        match self.get_zone_aqi(zone_id).await {
            Ok(cached) => Ok(cached),
            Err(AqiError::UnknownZone(id)) => Err(AqiError::UnknownZone(id)),
            Err(e) => match self.cache.peek(zone_id) {
                Some(stale) => {
                    warn!(zone_id, error = %e, "Serving stale AQI after failed refresh");
                    Ok(stale)
                }
                None => Err(e),
            },
        }
    }

    /// Recompute a zone regardless of freshness
    pub async fn refresh_zone(&self, zone_id: &str) -> Result<CachedAqi, AqiError> {
        let zone = self.zone(zone_id)?;
        self.cache
            .refresh(zone_id, || self.compute_zone(&zone))
            .await
    }

    /// Recompute every zone in registry order, pausing between zones.
    ///
    /// Each zone's outcome is independent of the others.
    pub async fn refresh_all(&self) -> Vec<ZoneRefreshOutcome> {
        let mut outcomes = Vec::with_capacity(self.registry.len());

        for (i, zone) in self.registry.iter().enumerate() {
            if i > 0 && !self.stagger.is_zero() {
                tokio::time::sleep(self.stagger).await;
            }

            let result = self.refresh_zone(&zone.id).await;
            outcomes.push(ZoneRefreshOutcome {
                zone_id: zone.id.clone(),
                result,
            });
        }

        outcomes
    }

    fn zone(&self, zone_id: &str) -> Result<Arc<ZoneDefinition>, AqiError> {
        self.registry
            .get(zone_id)
            .cloned()
            .ok_or_else(|| AqiError::UnknownZone(zone_id.to_string()))
    }

    /// Primary provider first, then the fallback provider if one is set.
    /// When both fail the primary's error is returned.
    async fn compute_zone(&self, zone: &ZoneDefinition) -> Result<ZoneSnapshot, AqiError> {
        let primary_err = match self.sources.get(&zone.provider) {
            Some(source) => match self.compute_from(zone, source.as_ref(), true).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) => e,
            },
            None => AqiError::upstream(format!(
                "no data source registered for provider {}",
                zone.provider
            )),
        };

        let fallback = match zone.fallback_provider.and_then(|kind| self.sources.get(&kind)) {
            Some(fallback) => fallback,
            None => return Err(primary_err),
        };

        warn!(
            zone_id = %zone.id,
            provider = %zone.provider,
            fallback = fallback.name(),
            error = %primary_err,
            "Primary provider failed, using fallback"
        );

        match self.compute_from(zone, fallback.as_ref(), false).await {
            Ok(mut snapshot) => {
                snapshot.notices.push(Notice::provider_fallback(fallback.name()));
                Ok(snapshot)
            }
            Err(e) => {
                warn!(zone_id = %zone.id, error = %e, "Fallback provider failed");
                Err(primary_err)
            }
        }
    }

    async fn compute_from(
        &self,
        zone: &ZoneDefinition,
        source: &dyn DataSource,
        primary: bool,
    ) -> Result<ZoneSnapshot, AqiError> {
        let readings = source.fetch(zone).await?;
        let raw = self.combine(zone, source, primary, readings)?;
        let result = self.calculator.compute_raw(&raw)?;

        let mut notices = Vec::new();
        if has_implausible_spike(&result.raw_concentrations) {
            warn!(zone_id = %zone.id, source = source.name(), "Implausible particulate spike");
            notices.push(Notice::sensor_spike());
        }

        debug!(
            zone_id = %zone.id,
            source = source.name(),
            aqi = result.aqi,
            main_pollutant = %result.main_pollutant,
            "AQI computed"
        );

        Ok(ZoneSnapshot {
            zone_id: zone.id.clone(),
            zone_name: zone.name.clone(),
            source: source.name().to_string(),
            result,
            notices,
        })
    }

    /// Reduce the endpoint readings to one raw reading.
    ///
    /// A multi-node zone on its primary provider is averaged under the
    /// zone's reporting minimum. Otherwise a single reading is used as is and
    /// several are averaged without a minimum.
    fn combine(
        &self,
        zone: &ZoneDefinition,
        source: &dyn DataSource,
        primary: bool,
        mut readings: Vec<RawReading>,
    ) -> Result<RawReading, AqiError> {
        if primary && zone.is_multi_node() {
            let min = zone.min_reporting_sensors.unwrap_or(self.min_reporting);
            return SensorAverager::new(min).merge(&readings);
        }

        match readings.len() {
            0 => Err(AqiError::upstream(format!(
                "{} returned no readings for zone '{}'",
                source.name(),
                zone.id
            ))),
            1 => Ok(readings.remove(0)),
            _ => SensorAverager::default().merge(&readings),
        }
    }
}

fn has_implausible_spike(reading: &PollutantReading) -> bool {
    let above = |p: Pollutant, limit: f64| reading.get(&p).is_some_and(|v| *v > limit);
    above(Pollutant::Pm25, PM25_SPIKE_THRESHOLD) || above(Pollutant::Pm10, PM10_SPIKE_THRESHOLD)
}
