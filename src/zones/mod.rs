// Zone definitions and the registry loaded from zones.toml


use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Which upstream collaborator supplies a zone's readings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Modeled estimates from the Open-Meteo air-quality API
    OpenMeteo,
    /// Ground sensors on the AirGradient public API
    AirGradient,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenMeteo => "open_meteo",
            ProviderKind::AirGradient => "air_gradient",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One physical sensor behind a zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorEndpoint {
    pub id: String,

    /// Provider-side location identifier
    #[serde(default)]
    pub location_id: Option<u64>,

    /// Name of the environment variable holding the access token
    #[serde(default)]
    pub token_env: Option<String>,
}

/// A geographic zone and how to obtain its readings.
///
/// Read-only after load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneDefinition {
    pub id: String,
    pub name: String,
    pub provider: ProviderKind,
    pub lat: f64,
    pub lon: f64,

    /// Provider tried when the primary one fails
    #[serde(default)]
    pub fallback_provider: Option<ProviderKind>,

    /// Overrides `[sensors] min_reporting` for this zone
    #[serde(default)]
    pub min_reporting_sensors: Option<usize>,

    #[serde(default)]
    pub endpoints: Vec<SensorEndpoint>,
}

impl ZoneDefinition {
    /// Zone backed by more than one physical sensor
    pub fn is_multi_node(&self) -> bool {
        self.endpoints.len() > 1
    }

    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            bail!("Zone id must not be empty");
        }
        if !(-90.0..=90.0).contains(&self.lat) || !(-180.0..=180.0).contains(&self.lon) {
            bail!(
                "Zone '{}' has out-of-range coordinates ({}, {})",
                self.id,
                self.lat,
                self.lon
            );
        }
        if self.fallback_provider == Some(self.provider) {
            bail!(
                "Zone '{}' uses {} as both provider and fallback_provider",
                self.id,
                self.provider
            );
        }
        if self.min_reporting_sensors == Some(0) {
            bail!("Zone '{}': min_reporting_sensors must be at least 1", self.id);
        }
        if let Some(min) = self.min_reporting_sensors {
            if min > self.endpoints.len().max(1) {
                bail!(
                    "Zone '{}': min_reporting_sensors ({}) exceeds its {} endpoint(s)",
                    self.id,
                    min,
                    self.endpoints.len()
                );
            }
        }
        if self.provider == ProviderKind::AirGradient
            && !self.endpoints.iter().any(|e| e.location_id.is_some())
        {
            bail!(
                "Zone '{}' uses air_gradient but has no endpoint with a location_id",
                self.id
            );
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ZonesFile {
    #[serde(default, rename = "zone")]
    zones: Vec<ZoneDefinition>,
}

/// All configured zones, in file order, with lookup by id
#[derive(Debug, Clone, Default)]
pub struct ZoneRegistry {
    zones: Vec<Arc<ZoneDefinition>>,
    index: HashMap<String, usize>,
}

impl ZoneRegistry {
    /// Load `[[zone]]` records from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read zones file {}", path.display()))?;

        Self::parse(&contents).with_context(|| format!("Invalid zones file {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let file: ZonesFile = toml::from_str(contents).context("Failed to parse zones TOML")?;
        Self::from_zones(file.zones)
    }

    /// Build a registry, rejecting duplicate ids and invalid definitions
    pub fn from_zones(zones: Vec<ZoneDefinition>) -> Result<Self> {
        let mut registry = Self::default();

        for zone in zones {
            zone.validate()?;
            if registry.index.contains_key(&zone.id) {
                bail!("Duplicate zone id '{}'", zone.id);
            }
            registry.index.insert(zone.id.clone(), registry.zones.len());
            registry.zones.push(Arc::new(zone));
        }

        Ok(registry)
    }

    pub fn get(&self, zone_id: &str) -> Option<&Arc<ZoneDefinition>> {
        self.index.get(zone_id).map(|&i| &self.zones[i])
    }

    /// Zones in file order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ZoneDefinition>> {
        self.zones.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.zones.iter().map(|z| z.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}
