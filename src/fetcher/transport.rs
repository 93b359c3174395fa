//! Production HTTP transport

use super::{FetchRequest, FetchResponse, HttpTransport};
use crate::config::NetworkConfig;
use crate::error::{Error, FetchError, Result};
use std::time::Duration;

/// [`HttpTransport`] backed by a shared `reqwest` client
///
/// The client carries the run's timeout, proxy pair and idle-pool ceiling, so every request
/// of a run goes through the same proxy and connection pool.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build the client for a run
    pub fn new(config: &NetworkConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .pool_max_idle_per_host(config.max_connections);

        if let Some(proxies) = &config.proxies {
            let http = reqwest::Proxy::http(&proxies.http)
                .map_err(|e| Error::config("proxies.http", format!("invalid proxy: {e}")))?;
            let https = reqwest::Proxy::https(&proxies.https)
                .map_err(|e| Error::config("proxies.https", format!("invalid proxy: {e}")))?;
            builder = builder.proxy(http).proxy(https);
        }

        let client = builder.build().map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "Failed to create HTTP client: {}",
                e
            )))
        })?;

        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn classify(url: &str, e: &reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if e.is_builder() {
        FetchError::Decode {
            url: url.to_string(),
            reason: format!("invalid request: {e}"),
        }
    } else {
        FetchError::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &FetchRequest) -> std::result::Result<FetchResponse, FetchError> {
        let mut builder = self.client.get(&request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify(&request.url, &e))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited {
                url: request.url.clone(),
                retry_after: retry_after(response.headers()),
            });
        }
        if status.is_server_error() {
            return Err(FetchError::ServerError {
                url: request.url.clone(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::ClientError {
                url: request.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| classify(&request.url, &e))?;

        Ok(FetchResponse {
            url: request.url.clone(),
            status: status.as_u16(),
            body,
            retries: 0,
        })
    }
}
