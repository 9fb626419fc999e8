//! # Declaration Typestate Machine
//!
//! Implements the declaration lifecycle using the typestate pattern.
//! Each state is a distinct type, so calling a transition from the wrong
//! state is a compile error.
//!
//! ## States
//!
//! - `Unauthenticated` → context built, no usable session token.
//! - `Authenticated` → session token held.
//! - `Submitted` → declaration accepted, flux id assigned.
//! - `Certified` → terminal, compliance certificate issued.
//! - `Rejected` → terminal, declaration judged non-conforming.
//!
//! ## Allowed Transitions
//!
//! ```text
//! Unauthenticated ──authenticate()──▶ Authenticated ──submit()──▶ Submitted
//!        ▲                              │        │                  │
//!        └─────────reset_token()────────┘        └──track()─────────┘
//!                                                                   │
//!                                                   poll() ─────────┤
//!                                                                   ▼
//!                                                     Certified | Rejected
//! ```
//!
//! Every transition consumes the previous value. A failing transition
//! returns `Err(DpaeError)` and the declaration is gone with it, so a half
//! updated context can never be observed.
//!
//! ## Compile-Time Safety Example
//!
//! ```compile_fail
//! # async fn demo(client: dpae_client::DpaeClient, ctx: dpae_core::DeclarationContext) {
//! let declaration = client.declaration(ctx);
//! // ERROR: no method named `submit` found for `Declaration<Unauthenticated>`
//! let _ = declaration.submit().await;
//! # }
//! ```

use dpae_core::format::{normalize_birth_department, normalize_health_service};
use dpae_core::response::{decode_body, extract_flux_id};
use dpae_core::{
    prepare_declaration, render_authentication, render_declaration, Certificate, CredentialError,
    DeclarationContext, DpaeError, FluxId, RejectionError, SessionToken, ValidationError,
};
use zeroize::Zeroizing;

use crate::poll::{poll_until_resolved, Verdict};
use crate::transport::TransportRequest;
use crate::wire::encode_payload;
use crate::DpaeClient;

/// A token received from the authentication endpoint must be at least
/// this many characters long.
pub const MIN_SESSION_TOKEN_LEN: usize = 10;

// ── State Types ──────────────────────────────────────────────────────

/// No usable session token yet.
#[derive(Debug, Clone, Copy)]
pub struct Unauthenticated;

/// A session token is held.
#[derive(Debug, Clone)]
pub struct Authenticated {
    token: SessionToken,
}

/// The declaration was accepted and assigned a flux id.
#[derive(Debug, Clone)]
pub struct Submitted {
    token: SessionToken,
    flux_id: FluxId,
}

/// Terminal: a compliance certificate was issued.
#[derive(Debug, Clone)]
pub struct Certified {
    certificate: Certificate,
}

/// Terminal: the declaration was judged non-conforming.
#[derive(Debug, Clone)]
pub struct Rejected {
    reason: String,
}

// ── Sealed Trait ─────────────────────────────────────────────────────

mod private {
    pub trait Sealed {}
    impl Sealed for super::Unauthenticated {}
    impl Sealed for super::Authenticated {}
    impl Sealed for super::Submitted {}
    impl Sealed for super::Certified {}
    impl Sealed for super::Rejected {}
}

/// Marker trait for all declaration states.
///
/// Sealed: only the five states defined in this module implement it.
pub trait DeclarationState: private::Sealed + std::fmt::Debug + Send {
    /// The canonical name of this state.
    fn name() -> &'static str;

    /// Whether this state is terminal.
    fn is_terminal() -> bool {
        false
    }
}

impl DeclarationState for Unauthenticated {
    fn name() -> &'static str {
        "UNAUTHENTICATED"
    }
}
impl DeclarationState for Authenticated {
    fn name() -> &'static str {
        "AUTHENTICATED"
    }
}
impl DeclarationState for Submitted {
    fn name() -> &'static str {
        "SUBMITTED"
    }
}
impl DeclarationState for Certified {
    fn name() -> &'static str {
        "CERTIFIED"
    }
    fn is_terminal() -> bool {
        true
    }
}
impl DeclarationState for Rejected {
    fn name() -> &'static str {
        "REJECTED"
    }
    fn is_terminal() -> bool {
        true
    }
}

// ── Declaration ──────────────────────────────────────────────────────

/// One declaration in lifecycle state `S`.
pub struct Declaration<S: DeclarationState> {
    client: DpaeClient,
    context: DeclarationContext,
    state: S,
}

impl<S: DeclarationState> Declaration<S> {
    /// The declaration data and results recorded so far.
    pub fn context(&self) -> &DeclarationContext {
        &self.context
    }

    /// Give up the typestate and keep the context.
    pub fn into_context(self) -> DeclarationContext {
        self.context
    }

    /// Name of the current state.
    pub fn state_name(&self) -> &'static str {
        S::name()
    }

    /// Whether the current state is terminal.
    pub fn is_terminal(&self) -> bool {
        S::is_terminal()
    }

    fn advance<T: DeclarationState>(self, state: T) -> Declaration<T> {
        tracing::debug!(from = S::name(), to = T::name(), "declaration transition");
        Declaration {
            client: self.client,
            context: self.context,
            state,
        }
    }
}

impl<S: DeclarationState> std::fmt::Debug for Declaration<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Declaration")
            .field("state", &self.state)
            .field("flux_id", &self.context.flux_id)
            .finish_non_exhaustive()
    }
}

impl Declaration<Unauthenticated> {
    pub(crate) fn new(client: DpaeClient, context: DeclarationContext) -> Self {
        Self {
            client,
            context,
            state: Unauthenticated,
        }
    }

    /// Seed a session token obtained earlier.
    pub fn with_session_token(mut self, token: SessionToken) -> Self {
        self.context.set_session_token(token);
        self
    }

    /// Obtain a session token.
    ///
    /// Reuses a held token longer than [`MIN_SESSION_TOKEN_LEN`] without
    /// any network call. Otherwise posts the authentication document once.
    /// The password is wiped when this returns, whatever the outcome.
    pub async fn authenticate(
        mut self,
        password: Zeroizing<String>,
    ) -> Result<Declaration<Authenticated>, DpaeError> {
        if self.context.credentials.organization_id.trim().is_empty() {
            return Err(ValidationError::MissingField("credentials.organization_id").into());
        }
        if password.is_empty() {
            return Err(ValidationError::MissingField("password").into());
        }

        let reusable = self
            .context
            .session_token()
            .filter(|t| t.len() > MIN_SESSION_TOKEN_LEN)
            .cloned();
        if let Some(token) = reusable {
            tracing::debug!("session token already held; skipping authentication");
            return Ok(self.advance(Authenticated { token }));
        }
        self.context.clear_session_token();

        let document = render_authentication(&self.context.credentials, &password)?;
        drop(password);

        let endpoint = self.client.config().auth_url.to_string();
        let request = TransportRequest::post(
            endpoint.as_str(),
            document.as_bytes().to_vec(),
            self.client.config().timeout,
        )
        .header("Content-Type", "application/xml");
        drop(document);

        tracing::info!(endpoint = %endpoint, "authenticating");
        let response = self.client.send(request).await?;
        match response.status {
            200 => {}
            422 => {
                tracing::warn!(endpoint = %endpoint, "credentials refused");
                return Err(CredentialError::Rejected.into());
            }
            status => {
                tracing::warn!(endpoint = %endpoint, status, "authentication failed");
                return Err(response.into_status_error(&endpoint).into());
            }
        }

        let raw_body = Zeroizing::new(response.body);
        let body = Zeroizing::new(decode_body(&raw_body));
        let raw = body.trim();
        let length = raw.chars().count();
        if length < MIN_SESSION_TOKEN_LEN {
            tracing::warn!(length, "authentication returned an unusable token");
            return Err(CredentialError::InvalidToken { length }.into());
        }
        let token = SessionToken::new(raw)?;
        self.context.set_session_token(token.clone());

        tracing::info!("authenticated");
        Ok(self.advance(Authenticated { token }))
    }
}

impl Declaration<Authenticated> {
    /// The held session token.
    pub fn session_token(&self) -> &SessionToken {
        &self.state.token
    }

    /// Forget the session token.
    pub fn reset_token(mut self) -> Declaration<Unauthenticated> {
        self.context.clear_session_token();
        self.advance(Unauthenticated)
    }

    /// Resume polling for a declaration submitted earlier.
    pub fn track(mut self, flux_id: FluxId) -> Declaration<Submitted> {
        tracing::info!(flux_id = %flux_id, "tracking existing flux");
        self.context.flux_id = Some(flux_id.clone());
        let token = self.state.token.clone();
        self.advance(Submitted { token, flux_id })
    }

    /// Render, encode and upload the declaration.
    ///
    /// Birth department and health service defaults are written back into
    /// the context before rendering. The rendered document is recorded as
    /// the context's payload. The held token is never empty:
    /// [`SessionToken::new`] refuses empty values with
    /// [`CredentialError::MissingToken`].
    pub async fn submit(mut self) -> Result<Declaration<Submitted>, DpaeError> {
        let token = self.state.token.clone();

        let ctx = &mut self.context;
        ctx.employee.birth_department = Some(normalize_birth_department(
            ctx.employee.birth_department.as_deref(),
        ));
        ctx.employer.health_service = Some(normalize_health_service(
            ctx.employer.health_service.as_deref(),
        ));

        let (prepared, report) = prepare_declaration(ctx)?;
        if !report.is_clean() {
            tracing::info!(
                fields = report.losses().len(),
                stripped = report.total_stripped(),
                "declaration normalized with character losses"
            );
        }
        let document = render_declaration(&prepared)?;
        let payload = encode_payload(&document)?;
        ctx.rendered_payload = Some(document);

        let endpoint = self.client.config().submit_url.to_string();
        let request = TransportRequest::post(endpoint.as_str(), payload, self.client.config().timeout)
            .header("Content-Type", "application/xml")
            .header("Content-Encoding", "gzip")
            .header("Authorization", token.authorization_header().as_str());

        tracing::info!(endpoint = %endpoint, bytes = request.body.len(), "submitting declaration");
        let response = self.client.send(request).await?.error_for_status(&endpoint)?;
        let flux_id = extract_flux_id(&decode_body(&response.body))?;

        tracing::info!(flux_id = %flux_id, "declaration accepted");
        self.context.flux_id = Some(flux_id.clone());
        Ok(self.advance(Submitted { token, flux_id }))
    }
}

impl Declaration<Submitted> {
    /// The server-assigned flux id.
    pub fn flux_id(&self) -> &FluxId {
        &self.state.flux_id
    }

    /// Poll the result feed until a verdict or until retries run out.
    pub async fn poll(mut self) -> Result<Resolved, DpaeError> {
        let verdict = poll_until_resolved(&self.client, &self.state.token, &self.state.flux_id).await?;
        match verdict {
            Verdict::Certified(certificate) => {
                tracing::info!(flux_id = %self.state.flux_id, "declaration certified");
                self.context.certificate = Some(certificate.clone());
                Ok(Resolved::Certified(self.advance(Certified { certificate })))
            }
            Verdict::Rejected(reason) => {
                tracing::warn!(flux_id = %self.state.flux_id, reason = %reason, "declaration rejected");
                self.context.certificate_error = Some(reason.clone());
                Ok(Resolved::Rejected(self.advance(Rejected { reason })))
            }
        }
    }
}

impl Declaration<Certified> {
    /// The issued compliance certificate.
    pub fn certificate(&self) -> &Certificate {
        &self.state.certificate
    }
}

impl Declaration<Rejected> {
    /// Why the declaration was judged non-conforming.
    pub fn reason(&self) -> &str {
        &self.state.reason
    }
}

// ── Terminal outcome ─────────────────────────────────────────────────

/// Outcome of a completed polling run.
#[derive(Debug)]
pub enum Resolved {
    Certified(Declaration<Certified>),
    Rejected(Declaration<Rejected>),
}

impl Resolved {
    pub fn is_certified(&self) -> bool {
        matches!(self, Self::Certified(_))
    }

    pub fn context(&self) -> &DeclarationContext {
        match self {
            Self::Certified(d) => d.context(),
            Self::Rejected(d) => d.context(),
        }
    }

    pub fn into_context(self) -> DeclarationContext {
        match self {
            Self::Certified(d) => d.into_context(),
            Self::Rejected(d) => d.into_context(),
        }
    }

    /// The certificate, or the rejection as an error.
    pub fn into_certificate(self) -> Result<Certificate, DpaeError> {
        match self {
            Self::Certified(d) => Ok(d.state.certificate),
            Self::Rejected(d) => Err(RejectionError {
                reason: d.state.reason,
            }
            .into()),
        }
    }
}
