//! # Response Parser
//!
//! Pure extraction over reply bodies that were already fetched: the flux id
//! in a submission acknowledgement, the result URLs in a consultation feed,
//! and the verdict carried by a result document.
//!
//! The result documents are semi-structured XML. Extraction is done with
//! non-greedy regular expressions over the text, not with an XML parser,
//! because the documents are only ever probed for a handful of markers.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ProtocolError;
use crate::identity::{Certificate, FluxId};

static ID_FLUX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)idflux>(.*?)</idflux").expect("idflux regex is valid"));

static CERTIFICATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<certificat_conformite>(.*?)</certificat_conformite>")
        .expect("certificate regex is valid")
});

static MESSAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<message>(.*?)</message>").expect("message regex is valid"));

const DPAE_PROFILE_MARKER: &str = r#"profil="DPAE""#;
const CONFORMITY_KO: &str = "<etat_conformite>KO</etat_conformite>";
const CONFORMITY_OK: &str = "<etat_conformite>OK</etat_conformite>";

/// Longest body prefix quoted in a `MissingIdFlux` error.
const EXCERPT_LEN: usize = 200;

// ── Body decoding ────────────────────────────────────────────────────

/// Decode a reply body: UTF-8 when valid, ISO-8859-1 otherwise.
pub fn decode_body(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

// ── Submission acknowledgement ───────────────────────────────────────

/// Extract the flux id from a submission reply.
pub fn extract_flux_id(body: &str) -> Result<FluxId, ProtocolError> {
    let captured = ID_FLUX
        .captures(body)
        .and_then(|c| c.get(1))
        .ok_or_else(|| ProtocolError::MissingIdFlux {
            excerpt: body.chars().take(EXCERPT_LEN).collect(),
        })?;
    FluxId::new(captured.as_str().trim())
}

// ── Consultation feed ────────────────────────────────────────────────

/// JSON feed returned by the consultation endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsultationResult {
    #[serde(rename = "Retours", default)]
    pub returns: ReturnSet,
}

/// The `Retours` object of the feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnSet {
    #[serde(rename = "Flux", default, deserialize_with = "null_as_empty")]
    pub flux: Vec<FluxReturns>,
}

/// Results published for one flux.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FluxReturns {
    #[serde(rename = "ID", default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(rename = "Retour", default, deserialize_with = "null_as_empty")]
    pub results: Vec<ResultEntry>,
}

/// One published result document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEntry {
    #[serde(rename = "Publication", default, deserialize_with = "lenient_string")]
    pub publication: Option<String>,
    #[serde(rename = "Production", default, deserialize_with = "lenient_string")]
    pub production: Option<String>,
    #[serde(rename = "Nature", default, deserialize_with = "lenient_string")]
    pub nature: Option<String>,
    #[serde(rename = "Statut", default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
    #[serde(rename = "ID", default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(rename = "URL", default, deserialize_with = "lenient_string")]
    pub url: Option<String>,
}

impl ConsultationResult {
    /// Every non-empty result URL in the feed, in feed order.
    pub fn result_urls(&self) -> Vec<&str> {
        self.returns
            .flux
            .iter()
            .flat_map(|f| f.results.iter())
            .filter_map(|r| r.url.as_deref())
            .filter(|u| !u.trim().is_empty())
            .collect()
    }
}

/// Parse a consultation feed body.
pub fn parse_consultation(body: &str) -> Result<ConsultationResult, serde_json::Error> {
    serde_json::from_str(body)
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts a string, a number or null; the service is not consistent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

// ── Result documents ─────────────────────────────────────────────────

/// Conformity marker of a result document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conformity {
    Ok,
    Ko,
}

/// Whether a result document concerns a DPAE declaration.
pub fn is_dpae_document(doc: &str) -> bool {
    doc.contains(DPAE_PROFILE_MARKER)
}

/// Read the conformity marker. A KO marker wins over an OK marker.
pub fn conformity_state(doc: &str) -> Result<Conformity, ProtocolError> {
    if doc.contains(CONFORMITY_KO) {
        Ok(Conformity::Ko)
    } else if doc.contains(CONFORMITY_OK) {
        Ok(Conformity::Ok)
    } else {
        Err(ProtocolError::UnexpectedConformityState)
    }
}

/// Extract the compliance certificate of a conforming document.
pub fn extract_certificate(doc: &str) -> Result<Certificate, ProtocolError> {
    let captured = CERTIFICATE
        .captures(doc)
        .and_then(|c| c.get(1))
        .ok_or(ProtocolError::MissingCertificate)?;
    Certificate::new(captured.as_str().trim())
}

/// Extract the first rejection message of a non-conforming document.
pub fn extract_rejection_reason(doc: &str) -> Result<String, ProtocolError> {
    MESSAGE
        .captures(doc)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .ok_or(ProtocolError::MissingRejectionReason)
}

/// What a single result document says about the declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultVerdict {
    /// Not a DPAE document; look at the next one.
    NotApplicable,
    Certified(Certificate),
    Rejected { reason: String },
}

/// Interpret one result document.
pub fn interpret_result_document(doc: &str) -> Result<ResultVerdict, ProtocolError> {
    if !is_dpae_document(doc) {
        return Ok(ResultVerdict::NotApplicable);
    }
    match conformity_state(doc)? {
        Conformity::Ko => Ok(ResultVerdict::Rejected {
            reason: extract_rejection_reason(doc)?,
        }),
        Conformity::Ok => Ok(ResultVerdict::Certified(extract_certificate(doc)?)),
    }
}
