//! HTTP transport backed by `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use covertrace_core::{HttpMethod, WireRequest};

use crate::error::{NetworkError, Result};
use crate::transport::{Response, Transport};

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Total time allowed per request, connection included.
    pub timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

/// Sends requests exactly as framed: every header of the frame is set and
/// the body bytes are sent unchanged.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NetworkError::ClientSetup(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: WireRequest) -> Result<Response> {
        let WireRequest { frame, body } = request;

        let mut builder = self.client.request(method(frame.method), &frame.url);
        for header in &frame.headers {
            builder = builder.header(header.name.as_str(), header.value.as_str());
        }
        if !body.is_empty() {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(url = %frame.url, error = %e, "request failed");
            NetworkError::Connection
        })?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| {
            warn!(url = %frame.url, error = %e, "response body unreadable");
            NetworkError::Connection
        })?;

        debug!(url = %frame.url, status, bytes = body.len(), "response received");
        Ok(Response { status, body })
    }
}
