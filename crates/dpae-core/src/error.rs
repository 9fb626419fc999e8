//! # Error Types: Structured Error Hierarchy
//!
//! Defines the error taxonomy used throughout the DPAE client. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Propagation
//!
//! - [`ValidationError`] is raised before any network call and is never retried.
//! - [`CredentialError`] and [`TransportError`] are fatal during authentication
//!   and submission. While polling, [`TransportError`] is a retry signal.
//! - [`ProtocolError`] means a reply did not have the expected wire shape.
//!   It is fatal wherever it occurs.
//! - [`RejectionError`] is the remote service's explicit non-conformity
//!   verdict. It is a terminal outcome, not a bug.

use thiserror::Error;

/// Top-level error type for a declaration lifecycle.
#[derive(Error, Debug)]
pub enum DpaeError {
    /// Input failed validation before reaching the network.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Authentication was refused or produced no usable token.
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    /// The remote endpoint could not be reached or answered with an error status.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A reply did not match the expected wire format.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The declaration was judged non-conforming.
    #[error("declaration rejected: {0}")]
    Rejected(#[from] RejectionError),

    /// Polling ran out of attempts without a verdict.
    #[error("no answer for flux {flux_id} after {tries} tries")]
    RetryExhausted {
        /// The flux being polled.
        flux_id: String,
        /// The configured retry budget.
        tries: u32,
    },

    /// The caller cancelled the lifecycle at a suspension point.
    #[error("declaration cancelled")]
    Cancelled,

    /// The encoded declaration could not be compressed.
    #[error("payload compression failed: {0}")]
    Compression(#[source] std::io::Error),
}

impl DpaeError {
    /// Whether this error is the remote service's rejection verdict.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// Malformed or out-of-domain input.
///
/// Carries the offending value so that operators can fix the source data
/// without guesswork.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Date did not match any accepted pattern or is not a calendar date.
    #[error("invalid date \"{0}\" (expected e.g. YYYY-MM-DD, DD/MM/YYYY or YYYYMMDD)")]
    InvalidDate(String),

    /// Time did not match any accepted pattern or is out of range.
    #[error("invalid time \"{0}\" (expected HH:mm:ss, HH:mm, HHmmss, HHmm or HH)")]
    InvalidTime(String),

    /// Environment indicator outside {1, 120}.
    #[error("environment indicator must be 1 (test) or 120 (production), got {0}")]
    InvalidEnvironment(u16),

    /// Service code outside {"25", "98"}.
    #[error("service code must be 25 or 98, got \"{0}\"")]
    InvalidServiceCode(String),

    /// Contract nature outside {"CDD", "CDI", "CTT"}.
    #[error("contract nature code must be CDD, CDI or CTT, got \"{0}\"")]
    InvalidNatureCode(String),

    /// A required field is empty.
    #[error("required field {0} is empty")]
    MissingField(&'static str),

    /// The rendered document holds a character that ISO-8859-1 cannot encode.
    #[error("character {character:?} at offset {offset} cannot be encoded as ISO-8859-1")]
    NotLatin1 {
        /// The offending character.
        character: char,
        /// Byte offset in the rendered document.
        offset: usize,
    },

    /// A template references a field the renderer does not know.
    #[error("template references unknown field {0}")]
    UnknownTemplateField(String),
}

/// Authentication failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// The authentication endpoint answered HTTP 422.
    #[error("credentials rejected by the authentication endpoint")]
    Rejected,

    /// The authentication endpoint answered 200 with an unusable token.
    #[error("invalid session token ({length} characters)")]
    InvalidToken {
        /// Length of the token that was received.
        length: usize,
    },

    /// A transition that needs a session token was attempted without one.
    #[error("no session token; authenticate first")]
    MissingToken,
}

/// Network-level failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request did not complete within its timeout.
    #[error("{endpoint} timed out after {elapsed_ms} ms")]
    Timeout {
        /// The endpoint that was called.
        endpoint: String,
        /// The timeout that elapsed.
        elapsed_ms: u64,
    },

    /// The connection could not be established or broke mid-request.
    #[error("{endpoint} unreachable: {reason}")]
    Connection {
        /// The endpoint that was called.
        endpoint: String,
        /// Underlying error message.
        reason: String,
    },

    /// The endpoint answered with an unexpected HTTP status.
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        /// The endpoint that was called.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Response body excerpt.
        body: String,
    },
}

/// Replies that do not match the expected wire shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The submission reply contains no `idflux` element.
    #[error("idflux not found in submission reply: {excerpt}")]
    MissingIdFlux {
        /// Start of the reply body.
        excerpt: String,
    },

    /// The `idflux` value is not exactly 23 characters long.
    #[error("idflux must be 23 characters, got {length}: \"{value}\"")]
    InvalidIdFluxLength {
        /// The extracted value.
        value: String,
        /// Its length in characters.
        length: usize,
    },

    /// A conforming result document has no certificate element.
    #[error("certificat_conformite not found in conforming result")]
    MissingCertificate,

    /// The extracted certificate is shorter than 10 characters.
    #[error("certificate \"{0}\" is shorter than 10 characters")]
    CertificateTooShort(String),

    /// A non-conforming result document gives no reason.
    #[error("non-conforming result carries no message")]
    MissingRejectionReason,

    /// A DPAE result document carries neither an OK nor a KO marker.
    #[error("result document has no etat_conformite OK/KO marker")]
    UnexpectedConformityState,
}

/// The remote service reported the declaration as non-conforming.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct RejectionError {
    /// Reason extracted from the result document.
    pub reason: String,
}
