//! Bounded polling of the consultation feed.
//!
//! Attempts are numbered `0..=max_retries`. Each attempt waits on the
//! client's clock first, then fetches the feed and every published result
//! document. Transport failures, error statuses, an unreadable feed and an
//! empty feed all end the attempt without a verdict and count against the
//! budget. Protocol errors, validation errors and cancellation end polling
//! at once.

use dpae_core::response::{decode_body, interpret_result_document, parse_consultation, ResultVerdict};
use dpae_core::{Certificate, DpaeError, FluxId, SessionToken, TransportError};

use crate::transport::TransportRequest;
use crate::DpaeClient;

/// Verdict reached by polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Verdict {
    Certified(Certificate),
    Rejected(String),
}

pub(crate) async fn poll_until_resolved(
    client: &DpaeClient,
    token: &SessionToken,
    flux_id: &FluxId,
) -> Result<Verdict, DpaeError> {
    let policy = client.config().poll;

    for attempt in 0..=policy.max_retries {
        client.pause(policy.delay_before(attempt)).await?;
        if let Some(verdict) = attempt_once(client, token, flux_id, attempt).await? {
            return Ok(verdict);
        }
    }

    tracing::warn!(flux_id = %flux_id, tries = policy.max_retries, "no verdict; giving up");
    Err(DpaeError::RetryExhausted {
        flux_id: flux_id.to_string(),
        tries: policy.max_retries,
    })
}

async fn attempt_once(
    client: &DpaeClient,
    token: &SessionToken,
    flux_id: &FluxId,
    attempt: u32,
) -> Result<Option<Verdict>, DpaeError> {
    let authorization = token.authorization_header();
    let feed_url = client.config().consultation_url_for(flux_id.as_str());

    let body = match fetch(client, &feed_url, &authorization).await? {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(attempt, flux_id = %flux_id, error = %e, "consultation failed");
            return Ok(None);
        }
    };
    let feed = match parse_consultation(&body) {
        Ok(feed) => feed,
        Err(e) => {
            tracing::warn!(attempt, flux_id = %flux_id, error = %e, "consultation feed unreadable");
            return Ok(None);
        }
    };

    let urls = feed.result_urls();
    if urls.is_empty() {
        tracing::debug!(attempt, flux_id = %flux_id, "no result published yet");
        return Ok(None);
    }

    for url in urls {
        let document = match fetch(client, url, &authorization).await? {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(attempt, flux_id = %flux_id, url, error = %e, "result document unavailable");
                return Ok(None);
            }
        };
        match interpret_result_document(&document)? {
            ResultVerdict::NotApplicable => continue,
            ResultVerdict::Certified(certificate) => return Ok(Some(Verdict::Certified(certificate))),
            ResultVerdict::Rejected { reason } => return Ok(Some(Verdict::Rejected(reason))),
        }
    }

    tracing::debug!(attempt, flux_id = %flux_id, "no DPAE result among published documents");
    Ok(None)
}

/// GET `url` with the bearer header.
///
/// The outer error ends polling; the inner one is a retry signal.
async fn fetch(
    client: &DpaeClient,
    url: &str,
    authorization: &str,
) -> Result<Result<String, TransportError>, DpaeError> {
    let request = TransportRequest::get(url, client.config().timeout).header("Authorization", authorization);
    match client.send(request).await {
        Ok(response) => Ok(response.error_for_status(url).map(|r| decode_body(&r.body))),
        Err(DpaeError::Transport(e)) => Ok(Err(e)),
        Err(other) => Err(other),
    }
}
