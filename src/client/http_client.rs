//! # Backend HTTP Client
//!
//! `reqwest` implementation of the liveness and notification contracts.
//! Requests carry the session bearer token when one is installed.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use std::time::Duration;
use tracing::{debug, warn};

use crate::client::traits::{LivenessCheck, NotificationApi};
use crate::config::RealtimeConfig;
use crate::constants::paths;
use crate::error::{RealtimeError, RealtimeResult};
use crate::models::NotificationRecord;
use crate::session::SharedCredentials;

/// HTTP client for the EventHub REST API
#[derive(Clone)]
pub struct HttpBackendClient {
    client: Client,
    base_url: Url,
    credentials: SharedCredentials,
}

impl std::fmt::Debug for HttpBackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackendClient")
            .field("base_url", &self.base_url.as_str())
            .field("authenticated", &self.credentials.is_authenticated())
            .finish()
    }
}

impl HttpBackendClient {
    /// Create a client rooted at `base_url`
    ///
    /// Endpoint paths are joined relative to the base, so a base of
    /// `http://host/api` resolves health checks to `http://host/api/health`.
    pub fn new(
        base_url: &str,
        request_timeout: Duration,
        credentials: SharedCredentials,
    ) -> RealtimeResult<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| RealtimeError::config_error(format!("Invalid base URL: {e}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(format!("eventhub-realtime/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RealtimeError::config_error(format!("Failed to create HTTP client: {e}")))?;

        debug!(base_url = %base_url, "Created backend HTTP client");

        Ok(Self {
            client,
            base_url,
            credentials,
        })
    }

    pub fn from_config(
        config: &RealtimeConfig,
        credentials: SharedCredentials,
    ) -> RealtimeResult<Self> {
        Self::new(
            &config.api_base_url,
            Duration::from_millis(config.http.request_timeout_ms),
            credentials,
        )
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn endpoint(&self, path: &str) -> RealtimeResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| RealtimeError::config_error(format!("Failed to construct URL: {e}")))
    }

    fn request(&self, method: Method, path: &str) -> RealtimeResult<RequestBuilder> {
        let url = self.endpoint(path)?;
        let builder = self.client.request(method, url);
        Ok(match self.credentials.bearer_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    /// Send and turn any non-2xx status into `RealtimeError::Api`
    async fn send(&self, builder: RequestBuilder) -> RealtimeResult<reqwest::Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(RealtimeError::api_error(status.as_u16(), body))
    }
}

#[async_trait]
impl LivenessCheck for HttpBackendClient {
    async fn check_liveness(&self) -> RealtimeResult<()> {
        let request = self.request(Method::GET, paths::HEALTH)?;
        self.send(request).await.map(|_| ())
    }
}

#[async_trait]
impl NotificationApi for HttpBackendClient {
    async fn list_notifications(&self) -> RealtimeResult<Vec<NotificationRecord>> {
        let request = self.request(Method::GET, paths::NOTIFICATIONS)?;
        let response = self.send(request).await?;
        let body = response.bytes().await?;
        let records: Vec<NotificationRecord> = serde_json::from_slice(&body)?;
        debug!(count = records.len(), "Fetched notifications");
        Ok(records)
    }

    async fn mark_read(&self, notification_id: i64) -> RealtimeResult<()> {
        let request = self.request(Method::PUT, &paths::notification_read(notification_id))?;
        self.send(request).await.map(|_| ()).inspect_err(|e| {
            warn!(notification_id, error = %e, "Mark-read request failed");
        })
    }

    async fn mark_all_read(&self) -> RealtimeResult<()> {
        let request = self.request(Method::PUT, paths::NOTIFICATIONS_READ_ALL)?;
        self.send(request).await.map(|_| ()).inspect_err(|e| {
            warn!(error = %e, "Mark-all-read request failed");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> HttpBackendClient {
        HttpBackendClient::new(base, Duration::from_secs(1), SharedCredentials::new()).unwrap()
    }

    #[test]
    fn test_paths_resolve_under_api_prefix() {
        let client = client("http://localhost:8080/api");
        assert_eq!(client.base_url(), "http://localhost:8080/api/");
        assert_eq!(
            client.endpoint(paths::HEALTH).unwrap().as_str(),
            "http://localhost:8080/api/health"
        );
        assert_eq!(
            client.endpoint(&paths::notification_read(5)).unwrap().as_str(),
            "http://localhost:8080/api/notifications/5/read"
        );
        assert_eq!(
            client.endpoint(paths::NOTIFICATIONS_READ_ALL).unwrap().as_str(),
            "http://localhost:8080/api/notifications/read-all"
        );
    }

    #[test]
    fn test_invalid_base_url_is_configuration_error() {
        let result = HttpBackendClient::new("::not-a-url", Duration::from_secs(1), SharedCredentials::new());
        assert!(matches!(result, Err(RealtimeError::Configuration(_))));
    }
}
