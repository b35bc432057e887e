//! ==============================================================================
//! api.rs - farm backend client
//! ==============================================================================
//!
//! purpose:
//!     the two GET calls the dashboard makes against the farm backend:
//!     - GET {base}/api/sensors
//!     - GET {base}/api/sensors/{hardware_id}/readings?start={iso}&end={iso}
//!
//! relationships:
//!     - used by: dashboard.rs (catalog mount, readings fetch)
//!     - produces: domain.rs types, error.rs FetchError
//!
//! the SensorApi trait is the seam between the state machine driver and the
//! network; tests plug in scripted implementations.
//!
//! ==============================================================================

use crate::domain::{iso8601, FetchWindow, Reading, Sensor};
use crate::error::FetchError;

use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;

pub trait SensorApi: Send + Sync {
    /// SensorCatalog: every sensor the backend knows about
    fn list_sensors(&self) -> impl Future<Output = Result<Vec<Sensor>, FetchError>> + Send;

    /// ReadingsFetcher: raw readings of one sensor inside `window`
    fn readings(
        &self,
        sensor_id: i64,
        window: FetchWindow,
    ) -> impl Future<Output = Result<Vec<Reading>, FetchError>> + Send;
}

/// reqwest-backed client
#[derive(Clone)]
pub struct HttpSensorApi {
    client: reqwest::Client,
    base: String,
}

impl HttpSensorApi {
    /// `base` is the backend root; a trailing `/` is ignored
    pub fn new(base: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client, base: base.trim_end_matches('/').to_string() })
    }

    pub fn sensors_url(&self) -> String {
        format!("{}/api/sensors", self.base)
    }

    pub fn readings_url(&self, sensor_id: i64) -> String {
        format!("{}/api/sensors/{}/readings", self.base, sensor_id)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        resource: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, FetchError> {
        let response = request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(resource, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus { resource, status: status.as_u16() });
        }

        // read the body first so a malformed payload is reported as a decode
        // failure rather than a transport one
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(resource, e))?;

        serde_json::from_slice(&body)
            .map_err(|e| FetchError::Decode { resource, reason: e.to_string() })
    }
}

impl SensorApi for HttpSensorApi {
    async fn list_sensors(&self) -> Result<Vec<Sensor>, FetchError> {
        let request = self.client.get(self.sensors_url());
        self.get_json("sensors", request).await
    }

    async fn readings(&self, sensor_id: i64, window: FetchWindow) -> Result<Vec<Reading>, FetchError> {
        let request = self
            .client
            .get(self.readings_url(sensor_id))
            .query(&[("start", iso8601(window.start)), ("end", iso8601(window.end))]);
        self.get_json("readings", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_strip_trailing_slash() {
        let api = HttpSensorApi::new("http://127.0.0.1:8000/", Duration::from_secs(1)).unwrap();
        assert_eq!(api.sensors_url(), "http://127.0.0.1:8000/api/sensors");
        assert_eq!(api.readings_url(42), "http://127.0.0.1:8000/api/sensors/42/readings");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        // port 9 (discard) is closed on any sane test machine
        let api = HttpSensorApi::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        match api.list_sensors().await {
            Err(FetchError::Transport { resource, .. }) => assert_eq!(resource, "sensors"),
            other => panic!("expected transport error, got {:?}", other),
        }
    }
}
