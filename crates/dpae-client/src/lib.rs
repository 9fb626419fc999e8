//! # dpae-client: Async client for the DPAE declaration service
//!
//! Drives one pre-hiring declaration through the remote lifecycle:
//!
//! 1. **Authenticate** against `mon.urssaf.fr` and obtain a session token.
//! 2. **Submit** the declaration, ISO-8859-1 encoded and gzip-compressed,
//!    to the deposit endpoint, which answers with a 23-character flux id.
//! 3. **Poll** the consultation feed for that flux until a result document
//!    certifies or rejects the declaration.
//!
//! ## Architecture
//!
//! - [`declaration`] holds the typestate machine. Each step consumes the
//!   previous state.
//! - [`transport::Transport`] is the only path to the network.
//!   [`http::HttpTransport`] is the reqwest implementation.
//! - [`clock::Clock`] provides the delays between polling attempts, so
//!   tests can run the loop without sleeping.
//! - Every network call and every delay is raced against the client's
//!   [`CancellationToken`]; cancelling yields [`DpaeError::Cancelled`].
//!
//! [`DpaeClient`] is cheap to clone and can drive many declarations
//! concurrently on separate tasks.

pub mod clock;
pub mod config;
pub mod declaration;
pub mod http;
mod poll;
pub mod transport;
pub mod wire;

pub use clock::{Clock, TokioClock};
pub use config::{ConfigError, DpaeConfig, PollPolicy};
pub use declaration::{
    Authenticated, Certified, Declaration, DeclarationState, Rejected, Resolved, Submitted,
    Unauthenticated,
};
pub use http::HttpTransport;
pub use transport::{Method, Transport, TransportRequest, TransportResponse};

use std::sync::Arc;
use std::time::Duration;

use dpae_core::{DeclarationContext, DpaeError, FluxId};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use zeroize::Zeroizing;

/// Entry point: configuration plus the transport and clock to use.
#[derive(Clone)]
pub struct DpaeClient {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    config: Arc<DpaeConfig>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for DpaeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DpaeClient")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl DpaeClient {
    /// Create a client that talks HTTPS and sleeps on the tokio timer.
    pub fn new(config: DpaeConfig) -> Result<Self, DpaeError> {
        let transport = HttpTransport::new()?;
        Ok(Self::with_transport(
            config,
            Arc::new(transport),
            Arc::new(TokioClock),
        ))
    }

    /// Create a client over an arbitrary transport and clock.
    pub fn with_transport(
        config: DpaeConfig,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            transport,
            clock,
            config: Arc::new(config),
            cancel: CancellationToken::new(),
        }
    }

    /// Use `token` to cancel in-flight declarations.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The token that cancels this client's declarations.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &DpaeConfig {
        &self.config
    }

    /// Start the lifecycle of one declaration.
    pub fn declaration(&self, context: DeclarationContext) -> Declaration<Unauthenticated> {
        Declaration::new(self.clone(), context)
    }

    /// Authenticate, submit and poll until a verdict.
    ///
    /// Runs inside a `declaration` span carrying a fresh correlation id.
    pub async fn declare(
        &self,
        context: DeclarationContext,
        password: Zeroizing<String>,
    ) -> Result<Resolved, DpaeError> {
        let span = tracing::info_span!(
            "declaration",
            correlation_id = %uuid::Uuid::new_v4(),
            environment = context.environment_indicator,
        );
        async move {
            self.declaration(context)
                .authenticate(password)
                .await?
                .submit()
                .await?
                .poll()
                .await
        }
        .instrument(span)
        .await
    }

    /// Authenticate, then resume polling a flux submitted earlier.
    pub async fn resume(
        &self,
        context: DeclarationContext,
        password: Zeroizing<String>,
        flux_id: FluxId,
    ) -> Result<Resolved, DpaeError> {
        let span = tracing::info_span!(
            "declaration",
            correlation_id = %uuid::Uuid::new_v4(),
            flux_id = %flux_id,
        );
        async move {
            self.declaration(context)
                .authenticate(password)
                .await?
                .track(flux_id)
                .poll()
                .await
        }
        .instrument(span)
        .await
    }

    pub(crate) async fn send(&self, request: TransportRequest) -> Result<TransportResponse, DpaeError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(DpaeError::Cancelled),
            result = self.transport.send(request) => result.map_err(DpaeError::from),
        }
    }

    pub(crate) async fn pause(&self, duration: Duration) -> Result<(), DpaeError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(DpaeError::Cancelled),
            _ = self.clock.sleep(duration) => Ok(()),
        }
    }
}
