//! # Transport Adapter
//!
//! The narrow request/response interface the state machine talks to. The
//! production implementation is [`crate::http::HttpTransport`]; tests plug
//! in scripted transports.
//!
//! A transport only reports failures to obtain a response
//! ([`TransportError::Timeout`], [`TransportError::Connection`]). Status
//! codes are returned as-is and interpreted by the caller.

use std::time::Duration;

use async_trait::async_trait;
use dpae_core::TransportError;
use zeroize::Zeroizing;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One outgoing request.
///
/// The body is wiped on drop because the authentication request carries
/// the password. `Debug` prints header names only.
#[derive(Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Zeroizing<Vec<u8>>,
    pub timeout: Duration,
}

impl TransportRequest {
    /// A GET request with no body.
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: Zeroizing::new(Vec::new()),
            timeout,
        }
    }

    /// A POST request carrying `body`.
    pub fn post(url: impl Into<String>, body: Vec<u8>, timeout: Duration) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Zeroizing::new(body),
            timeout,
        }
    }

    /// Add a header.
    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Value of the first header called `name`, compared case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl std::fmt::Debug for TransportRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.headers.iter().map(|(n, _)| *n).collect();
        f.debug_struct("TransportRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &names)
            .field("body_len", &self.body.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A received response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into a [`TransportError::Status`].
    pub fn error_for_status(self, endpoint: &str) -> Result<Self, TransportError> {
        if self.is_success() {
            return Ok(self);
        }
        Err(self.into_status_error(endpoint))
    }

    /// Describe this response as a [`TransportError::Status`].
    pub fn into_status_error(self, endpoint: &str) -> TransportError {
        TransportError::Status {
            endpoint: endpoint.to_string(),
            status: self.status,
            body: excerpt(&self.body),
        }
    }
}

const BODY_EXCERPT_LEN: usize = 500;

fn excerpt(body: &[u8]) -> String {
    dpae_core::response::decode_body(body)
        .chars()
        .take(BODY_EXCERPT_LEN)
        .collect()
}

/// Sends requests to the declaration service.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one request. Never retries.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}
