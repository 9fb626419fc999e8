//! DPAE client configuration.
//!
//! Endpoint URLs, the per-request timeout and the polling policy. Defaults
//! point to the production service. Override via environment variables or
//! explicit construction for testing.

use std::time::Duration;

use url::Url;

/// Default authentication endpoint.
pub const DEFAULT_AUTH_URL: &str = "https://mon.urssaf.fr/authentifier_dpae";
/// Default submission endpoint.
pub const DEFAULT_SUBMIT_URL: &str = "https://depot.dpae-edi.urssaf.fr/deposer-dsn/1.0/";
/// Default consultation endpoint; the flux id is appended to it.
pub const DEFAULT_CONSULTATION_URL: &str =
    "https://consultation.dpae-edi.urssaf.fr/lister-retours-flux/2.0/";
/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// How the result feed is polled after submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Wait before the first attempt.
    pub initial_delay: Duration,
    /// Wait before every later attempt.
    pub retry_delay: Duration,
    /// Attempts are numbered `0..=max_retries`.
    pub max_retries: u32,
}

impl PollPolicy {
    /// Delay to observe before attempt number `attempt`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            self.initial_delay
        } else {
            self.retry_delay
        }
    }

    /// Total number of attempts this policy allows.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(30),
            retry_delay: Duration::from_secs(10),
            max_retries: 60,
        }
    }
}

/// Configuration for connecting to the declaration service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DpaeConfig {
    pub auth_url: Url,
    pub submit_url: Url,
    /// Base of the consultation endpoint; must end with `/`.
    pub consultation_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
    pub poll: PollPolicy,
}

impl DpaeConfig {
    /// Production endpoints with default timeout and polling policy.
    pub fn production() -> Result<Self, ConfigError> {
        Self::from_lookup(|_| None)
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `DPAE_AUTH_URL` (default: `https://mon.urssaf.fr/authentifier_dpae`)
    /// - `DPAE_SUBMIT_URL` (default: `https://depot.dpae-edi.urssaf.fr/deposer-dsn/1.0/`)
    /// - `DPAE_CONSULTATION_URL` (default: `https://consultation.dpae-edi.urssaf.fr/lister-retours-flux/2.0/`)
    /// - `DPAE_TIMEOUT_SECS` (default: 60)
    /// - `DPAE_POLL_INITIAL_DELAY_SECS` (default: 30)
    /// - `DPAE_POLL_RETRY_DELAY_SECS` (default: 10)
    /// - `DPAE_POLL_MAX_RETRIES` (default: 60)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = PollPolicy::default();
        let consultation_url = url_var(&lookup, "DPAE_CONSULTATION_URL", DEFAULT_CONSULTATION_URL)?;
        if !consultation_url.path().ends_with('/') {
            return Err(ConfigError::InvalidUrl(
                "DPAE_CONSULTATION_URL".into(),
                "path must end with '/'".into(),
            ));
        }

        Ok(Self {
            auth_url: url_var(&lookup, "DPAE_AUTH_URL", DEFAULT_AUTH_URL)?,
            submit_url: url_var(&lookup, "DPAE_SUBMIT_URL", DEFAULT_SUBMIT_URL)?,
            consultation_url,
            timeout: Duration::from_secs(number_var(
                &lookup,
                "DPAE_TIMEOUT_SECS",
                DEFAULT_TIMEOUT.as_secs(),
            )?),
            poll: PollPolicy {
                initial_delay: Duration::from_secs(number_var(
                    &lookup,
                    "DPAE_POLL_INITIAL_DELAY_SECS",
                    defaults.initial_delay.as_secs(),
                )?),
                retry_delay: Duration::from_secs(number_var(
                    &lookup,
                    "DPAE_POLL_RETRY_DELAY_SECS",
                    defaults.retry_delay.as_secs(),
                )?),
                max_retries: number_var(&lookup, "DPAE_POLL_MAX_RETRIES", defaults.max_retries)?,
            },
        })
    }

    /// Create a configuration pointing every endpoint at a local mock server.
    ///
    /// Polling waits zero seconds and gives up after five retries.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if `base` is not a valid URL.
    pub fn local_mock(base: &str) -> Result<Self, ConfigError> {
        let base = base.trim_end_matches('/');
        let make_url = |path: &str| -> Result<Url, ConfigError> {
            Url::parse(&format!("{base}{path}"))
                .map_err(|e| ConfigError::InvalidUrl(base.to_string(), e.to_string()))
        };
        Ok(Self {
            auth_url: make_url("/authentifier_dpae")?,
            submit_url: make_url("/deposer-dsn/1.0/")?,
            consultation_url: make_url("/lister-retours-flux/2.0/")?,
            timeout: Duration::from_secs(5),
            poll: PollPolicy {
                initial_delay: Duration::ZERO,
                retry_delay: Duration::ZERO,
                max_retries: 5,
            },
        })
    }

    /// Consultation URL for one flux.
    pub fn consultation_url_for(&self, flux_id: &str) -> String {
        format!("{}{flux_id}", self.consultation_url)
    }
}

fn url_var<F>(lookup: &F, var: &str, default: &str) -> Result<Url, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(var).unwrap_or_else(|| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

fn number_var<F, T>(lookup: &F, var: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
            var: var.to_string(),
            value: raw,
        }),
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("{var} must be a non-negative integer, got \"{value}\"")]
    InvalidNumber { var: String, value: String },
}
