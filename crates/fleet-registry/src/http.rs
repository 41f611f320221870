//! HTTP implementation of the fetch traits
//!
//! Talks to the fleet REST backend with reqwest. Scoping parameters
//! (company id, session token) ride along on every request; the raw
//! responses go straight into the normalization functions in
//! [`crate::fetch`] so nothing downstream sees the wire shapes.

use crate::error::{RegistryError, RegistryResult};
use crate::fetch::{RegistryApi, TelemetryApi};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use fleet_core::{DeviceId, TelemetryPatch};

/// Per-request timeout for the REST backend
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// REST client for the registry and per-device telemetry endpoints
pub struct FleetApiClient {
    client: reqwest::Client,
    base_url: String,
    company_id: String,
    session_token: String,
}

impl FleetApiClient {
    pub fn new(
        base_url: impl Into<String>,
        company_id: impl Into<String>,
        session_token: impl Into<String>,
    ) -> RegistryResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            company_id: company_id.into(),
            session_token: session_token.into(),
        })
    }

    async fn get_json(&self, path: &str) -> RegistryResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "Fetching");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.session_token)
            .query(&[("companyId", self.company_id.as_str())])
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }
}

#[async_trait]
impl RegistryApi for FleetApiClient {
    async fn fetch_registry(&self) -> RegistryResult<Value> {
        self.get_json("/vehicles").await
    }
}

#[async_trait]
impl TelemetryApi for FleetApiClient {
    async fn fetch_latest(&self, device_id: &DeviceId) -> RegistryResult<Option<TelemetryPatch>> {
        let body = self
            .get_json(&format!("/devices/{}/latest", device_id))
            .await?;

        // The backend signals "no telemetry yet" with a null body or an
        // explicit noData flag.
        if body.is_null() || body.get("noData").and_then(Value::as_bool) == Some(true) {
            return Ok(None);
        }

        // Device responses omit the device id (it is in the path), so
        // thread it back in before handing off to the shared normalizer.
        let mut enveloped = body;
        if let Some(obj) = enveloped.as_object_mut() {
            obj.entry("deviceId")
                .or_insert_with(|| Value::String(device_id.as_str().to_string()));
        }

        let (_, patch) =
            TelemetryPatch::from_event(&enveloped).map_err(RegistryError::Core)?;
        Ok(if patch.is_empty() { None } else { Some(patch) })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_construction_trims_trailing_slash() {
        let client = FleetApiClient::new("https://api.example.com/", "C-1", "token").unwrap();
        assert_eq!(client.base_url, "https://api.example.com");
    }
}
