//! reqwest implementation of [`Transport`].
//!
//! One shared `reqwest::Client`; the timeout is applied per request from
//! [`TransportRequest::timeout`]. Bodies are passed through untouched: the
//! client does not negotiate or undo any content encoding.

use async_trait::async_trait;
use dpae_core::TransportError;

use crate::transport::{Method, Transport, TransportRequest, TransportResponse};

/// Production transport over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build the underlying HTTP client.
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("dpae-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Connection {
                endpoint: "client_init".into(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        }
        .timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.to_vec());
        }

        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                TransportError::Timeout {
                    endpoint: request.url.clone(),
                    elapsed_ms: u64::try_from(request.timeout.as_millis()).unwrap_or(u64::MAX),
                }
            } else {
                TransportError::Connection {
                    endpoint: request.url.clone(),
                    reason: e.to_string(),
                }
            }
        };

        let response = builder.send().await.map_err(map_err)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_err)?.to_vec();

        tracing::debug!(url = %request.url, status, bytes = body.len(), "response received");
        Ok(TransportResponse { status, body })
    }
}
