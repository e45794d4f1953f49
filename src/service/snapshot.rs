use crate::aqi::AqiResult;
use serde::Serialize;

const SPIKE_MESSAGE: &str = "Warning: Unnatural spikes in sensors could be influenced by other \
atmospheric factors at the moment and this may not reflect the actual readings of the region";

/// Cached per-zone value: the AQI result plus where it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneSnapshot {
    pub zone_id: String,
    pub zone_name: String,

    /// Name of the data source that produced the reading
    pub source: String,

    #[serde(flatten)]
    pub result: AqiResult,

    pub notices: Vec<Notice>,
}

impl ZoneSnapshot {
    pub fn has_notice(&self, kind: NoticeKind) -> bool {
        self.notices.iter().any(|n| n.kind == kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// PM2.5 or PM10 above plausible levels; the value is still reported
    SensorSpike,
    /// Primary provider failed and the fallback supplied the reading
    ProviderFallback,
}

/// Human-readable warning attached to a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn sensor_spike() -> Self {
        Self {
            kind: NoticeKind::SensorSpike,
            message: SPIKE_MESSAGE.to_string(),
        }
    }

    pub fn provider_fallback(fallback: &str) -> Self {
        Self {
            kind: NoticeKind::ProviderFallback,
            message: format!(
                "Physical sensor temporarily offline. Using estimates from {} instead.",
                fallback
            ),
        }
    }
}
