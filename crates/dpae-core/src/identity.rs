//! # Protocol Identifier Newtypes
//!
//! Newtype wrappers for the identifiers exchanged with the declaration
//! service. Constructors enforce the wire-format length rules, so a
//! `FluxId` or `Certificate` that exists is one the service could have
//! issued.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{CredentialError, ProtocolError};

/// Exact length, in characters, of a server-assigned flux identifier.
pub const FLUX_ID_LEN: usize = 23;

/// Minimum length, in characters, of a compliance certificate.
pub const MIN_CERTIFICATE_LEN: usize = 10;

/// Server-assigned identifier of a submitted declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FluxId(String);

impl FluxId {
    /// Validate and wrap a flux identifier. Must be exactly 23 characters.
    pub fn new(value: impl Into<String>) -> Result<Self, ProtocolError> {
        let value = value.into();
        let length = value.chars().count();
        if length != FLUX_ID_LEN {
            return Err(ProtocolError::InvalidIdFluxLength { value, length });
        }
        Ok(Self(value))
    }

    /// Access the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for FluxId {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FluxId> for String {
    fn from(id: FluxId) -> Self {
        id.0
    }
}

impl std::fmt::Display for FluxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Proof-of-compliance token issued once conformity is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Certificate(String);

impl Certificate {
    /// Validate and wrap a certificate. Must be at least 10 characters.
    pub fn new(value: impl Into<String>) -> Result<Self, ProtocolError> {
        let value = value.into();
        if value.chars().count() < MIN_CERTIFICATE_LEN {
            return Err(ProtocolError::CertificateTooShort(value));
        }
        Ok(Self(value))
    }

    /// Access the certificate as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Certificate {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Certificate> for String {
    fn from(cert: Certificate) -> Self {
        cert.0
    }
}

impl std::fmt::Display for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bearer credential returned by the authentication endpoint.
///
/// The value is wiped from memory on drop and redacted from `Debug` output.
/// It is deliberately not `Serialize`: context snapshots never carry it.
#[derive(Clone)]
pub struct SessionToken(Zeroizing<String>);

impl SessionToken {
    /// Wrap a token. Empty tokens are refused.
    pub fn new(value: impl Into<String>) -> Result<Self, CredentialError> {
        let value = Zeroizing::new(value.into());
        if value.is_empty() {
            return Err(CredentialError::MissingToken);
        }
        Ok(Self(value))
    }

    /// Access the raw token for building the `Authorization` header.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    /// Length of the token in characters.
    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    /// Always false; empty tokens cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value of the `Authorization` header expected by the service.
    pub fn authorization_header(&self) -> Zeroizing<String> {
        Zeroizing::new(format!("DSNLogin jeton={}", self.0.as_str()))
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SessionToken").field(&"[REDACTED]").finish()
    }
}
