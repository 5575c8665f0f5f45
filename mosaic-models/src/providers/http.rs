//! Shared outbound HTTP plumbing for provider adapters.

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use tracing::{debug, warn};

use super::{ProviderConnection, VerifyStatus};
use crate::config::CatalogConfig;
use crate::{Error, Result};

/// A `reqwest` client plus the per-call timeouts adapters apply.
///
/// Cloning shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    verify_timeout: Duration,
    list_timeout: Duration,
}

impl HttpClient {
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.clone());
        }

        Ok(Self {
            client: builder.build()?,
            verify_timeout: config.verify_timeout(),
            list_timeout: config.list_timeout(),
        })
    }

    fn request(
        &self,
        connection: &ProviderConnection,
        url: &str,
        timeout: Duration,
    ) -> reqwest::RequestBuilder {
        let mut request = self.client.get(url).timeout(timeout);

        let mut has_authorization = false;
        for (name, value) in &connection.headers {
            has_authorization |= name.eq_ignore_ascii_case(AUTHORIZATION.as_str());
            request = request.header(name.as_str(), value.as_str());
        }
        if !has_authorization {
            if let Some(token) = connection.bearer_token() {
                request = request.bearer_auth(token);
            }
        }
        request
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> Result<reqwest::Response> {
        debug!(url, "provider request");
        let response = request.send().await.map_err(|e| {
            warn!(url, error = %e, "provider request failed");
            Error::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url, %status, "provider returned error status");
            return Err(Error::upstream_status(
                status.as_u16(),
                format!("remote returned {status}"),
            ));
        }
        Ok(response)
    }

    /// Issue a verification `GET` and report the upstream status.
    pub async fn probe(&self, connection: &ProviderConnection, url: &str) -> Result<VerifyStatus> {
        let request = self.request(connection, url, self.verify_timeout);
        let response = self.send(request, url).await?;
        let status = response.status();

        Ok(VerifyStatus {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
        })
    }

    /// Issue a listing `GET` and decode the body as JSON.
    pub async fn fetch_json(
        &self,
        connection: &ProviderConnection,
        url: &str,
    ) -> Result<serde_json::Value> {
        let request = self.request(connection, url, self.list_timeout);
        let response = self.send(request, url).await?;
        let body = response.json::<serde_json::Value>().await.map_err(|e| {
            warn!(url, error = %e, "provider returned undecodable body");
            Error::from(e)
        })?;
        Ok(body)
    }
}
