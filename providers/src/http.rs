use anyhow::{Context, Result};
use breathe::AqiError;
use reqwest::Client;
use std::time::Duration;

/// Per-request bound; the zone refresh timeout still applies on top
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

pub(crate) fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!("breathe/", env!("CARGO_PKG_VERSION")))
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}

/// Map a non-2xx status to an upstream failure naming the provider
pub(crate) fn check_response_status(provider: &str, response: &reqwest::Response) -> Result<(), AqiError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(AqiError::upstream(format!(
            "{} returned HTTP {}",
            provider,
            status.as_u16()
        )))
    }
}

pub(crate) fn request_failed(provider: &str, e: reqwest::Error) -> AqiError {
    AqiError::upstream(format!("{} request failed: {}", provider, e))
}
