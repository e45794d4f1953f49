use std::fmt;
use std::time::Duration;

/// Errors from one zone's fetch-and-compute attempt.
///
/// Every variant is local to a single zone refresh; the cache is left
/// unchanged whenever one of these is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum AqiError {
    /// Payload had no recognizable pollutant keys after normalization
    MalformedReading,
    /// Multi-node merge had too few endpoints reporting valid data
    InsufficientSensors { reporting: usize, required: usize },
    /// No pollutant in the reading has a breakpoint table entry
    NoEligiblePollutants,
    /// Pipeline did not finish within the refresh timeout
    UpstreamTimeout { zone_id: String, timeout: Duration },
    /// Data source returned an error
    UpstreamFailure(String),
    /// Zone id not present in the registry
    UnknownZone(String),
}

impl AqiError {
    /// Shorthand for provider-side failures
    pub fn upstream(message: impl Into<String>) -> Self {
        AqiError::UpstreamFailure(message.into())
    }
}

impl fmt::Display for AqiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AqiError::MalformedReading => {
                write!(f, "reading contains no recognizable pollutant keys")
            }
            AqiError::InsufficientSensors {
                reporting,
                required,
            } => write!(
                f,
                "only {} sensor(s) reported valid data, {} required",
                reporting, required
            ),
            AqiError::NoEligiblePollutants => {
                write!(f, "no pollutant in the reading has a breakpoint table")
            }
            AqiError::UpstreamTimeout { zone_id, timeout } => write!(
                f,
                "refresh for zone '{}' timed out after {}s",
                zone_id,
                timeout.as_secs_f64()
            ),
            AqiError::UpstreamFailure(message) => write!(f, "upstream failure: {}", message),
            AqiError::UnknownZone(zone_id) => write!(f, "zone '{}' not found", zone_id),
        }
    }
}

impl std::error::Error for AqiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = AqiError::InsufficientSensors {
            reporting: 1,
            required: 2,
        };
        assert_eq!(err.to_string(), "only 1 sensor(s) reported valid data, 2 required");

        let err = AqiError::UpstreamTimeout {
            zone_id: "srinagar".to_string(),
            timeout: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "refresh for zone 'srinagar' timed out after 1.5s");

        assert_eq!(
            AqiError::upstream("HTTP 502").to_string(),
            "upstream failure: HTTP 502"
        );
    }
}
