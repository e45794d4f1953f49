use crate::error::AqiError;
use crate::pollutant::RawReading;
use crate::zones::{ProviderKind, ZoneDefinition};
use async_trait::async_trait;

/// Upstream data source for raw pollutant readings.
///
/// The core never talks to the network; implementations live outside it
/// and are registered with the zone service per [`ProviderKind`].
///
/// # Example
/// ```no_run
/// use async_trait::async_trait;
/// use breathe::{AqiError, DataSource, ProviderKind, RawReading, ZoneDefinition};
///
/// struct FixedSource;
///
/// #[async_trait]
/// impl DataSource for FixedSource {
///     fn name(&self) -> &str {
///         "fixed"
///     }
///
///     fn kind(&self) -> ProviderKind {
///         ProviderKind::OpenMeteo
///     }
///
///     async fn fetch(&self, _zone: &ZoneDefinition) -> Result<Vec<RawReading>, AqiError> {
///         Ok(vec![[("pm2_5", 42.0), ("pm10", 80.0)].into_iter().collect()])
///     }
/// }
/// ```
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Short identifier used in logs and in `ZoneSnapshot::source`
    fn name(&self) -> &str;

    /// Provider kind this source serves
    fn kind(&self) -> ProviderKind;

    /// Fetch current readings for a zone.
    ///
    /// Returns one raw reading per responding endpoint, keys in payload
    /// order. Endpoints that did not respond are left out; an error means
    /// no usable reading at all.
    async fn fetch(&self, zone: &ZoneDefinition) -> Result<Vec<RawReading>, AqiError>;
}
