//! # Declaration Data Model
//!
//! Flat value records describing one pre-hiring declaration, plus the
//! [`DeclarationContext`] that aggregates them with the lifecycle results
//! (session token, flux id, rendered payload, certificate, rejection
//! reason).
//!
//! Raw field values are kept as the caller supplied them. Enumerated codes
//! are only parsed into [`Environment`], [`ServiceCode`] and [`NatureCode`]
//! during pre-render validation, so out-of-domain values loaded from files
//! are reported as `ValidationError`s instead of deserialization failures.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::identity::{Certificate, FluxId, SessionToken};

// ── Enumerated codes ─────────────────────────────────────────────────

/// Target environment of the declaration service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Test submissions; indicator `1`.
    Test,
    /// Production submissions; indicator `120`.
    Production,
}

impl Environment {
    /// The numeric indicator embedded in the declaration document.
    pub fn indicator(self) -> u16 {
        match self {
            Self::Test => 1,
            Self::Production => 120,
        }
    }

    /// Select the environment from a production flag.
    pub fn from_production_flag(production: bool) -> Self {
        if production {
            Self::Production
        } else {
            Self::Test
        }
    }
}

impl TryFrom<u16> for Environment {
    type Error = ValidationError;

    fn try_from(indicator: u16) -> Result<Self, Self::Error> {
        match indicator {
            1 => Ok(Self::Test),
            120 => Ok(Self::Production),
            other => Err(ValidationError::InvalidEnvironment(other)),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Test => write!(f, "test"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Service code sent with the credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceCode {
    /// Code `"25"`.
    Code25,
    /// Code `"98"`.
    Code98,
}

impl ServiceCode {
    /// Parse a raw service code.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw {
            "25" => Ok(Self::Code25),
            "98" => Ok(Self::Code98),
            other => Err(ValidationError::InvalidServiceCode(other.to_string())),
        }
    }

    /// The code as it appears on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Code25 => "25",
            Self::Code98 => "98",
        }
    }
}

/// Nature of the employment contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NatureCode {
    /// Fixed-term contract.
    Cdd,
    /// Open-ended contract.
    Cdi,
    /// Temporary work contract.
    Ctt,
}

impl NatureCode {
    /// Parse a raw nature code.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw {
            "CDD" => Ok(Self::Cdd),
            "CDI" => Ok(Self::Cdi),
            "CTT" => Ok(Self::Ctt),
            other => Err(ValidationError::InvalidNatureCode(other.to_string())),
        }
    }

    /// The code as it appears on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cdd => "CDD",
            Self::Cdi => "CDI",
            Self::Ctt => "CTT",
        }
    }
}

// ── Value records ────────────────────────────────────────────────────

/// Identity used to authenticate against the declaration service.
///
/// The password is not part of this record. It is handed to the
/// authentication step by value and wiped once the step returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// SIRET of the declaring organization.
    pub organization_id: String,
    /// Last name of the declaring user.
    pub last_name: String,
    /// First name of the declaring user.
    pub first_name: String,
    /// Service code, `"25"` or `"98"`.
    pub service_code: String,
}

/// The hiring establishment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employer {
    pub designation: String,
    pub siret: String,
    pub ape_code: String,
    pub urssaf_code: String,
    pub address: String,
    pub town: String,
    pub postal_code: String,
    pub phone: String,
    /// Occupational health service code; defaults to `"01"` at submission.
    #[serde(default)]
    pub health_service: Option<String>,
}

/// The person being hired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub surname: String,
    pub christian_name: String,
    /// Numeric sex code.
    pub sex: u8,
    /// Social security number.
    pub nir: String,
    /// Social security number key.
    pub nir_key: String,
    pub birth_date: String,
    pub birth_town: String,
    /// Two-character department code; `"99"` for born abroad or unknown.
    #[serde(default)]
    pub birth_department: Option<String>,
}

/// Terms of the hiring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub start_date: String,
    pub start_time: String,
    /// Absent for open-ended contracts.
    #[serde(default)]
    pub end_date: Option<String>,
    /// `"CDD"`, `"CDI"` or `"CTT"`.
    pub nature_code: String,
}

// ── Declaration context ──────────────────────────────────────────────

/// Everything known about one declaration attempt.
///
/// Created once per attempt and never reused for another declaration.
/// The lifecycle fields (`flux_id`, `rendered_payload`, `certificate`,
/// `certificate_error`) start empty and are filled by the submission state
/// machine. The session token is held privately and is skipped when the
/// context is serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclarationContext {
    /// `1` for test, `120` for production. Defaults to test.
    #[serde(default = "default_environment_indicator")]
    pub environment_indicator: u16,
    pub credentials: Credentials,
    pub employer: Employer,
    pub employee: Employee,
    pub contract: Contract,
    #[serde(skip)]
    session_token: Option<SessionToken>,
    /// Server-assigned identifier of the submitted declaration.
    #[serde(default)]
    pub flux_id: Option<FluxId>,
    /// Declaration document exactly as rendered for submission.
    #[serde(default)]
    pub rendered_payload: Option<String>,
    /// Compliance certificate, once issued.
    #[serde(default)]
    pub certificate: Option<Certificate>,
    /// Rejection reason, if the declaration was judged non-conforming.
    #[serde(default)]
    pub certificate_error: Option<String>,
}

fn default_environment_indicator() -> u16 {
    Environment::Test.indicator()
}

impl DeclarationContext {
    /// Create a fresh context with no lifecycle results.
    pub fn new(
        environment: Environment,
        credentials: Credentials,
        employer: Employer,
        employee: Employee,
        contract: Contract,
    ) -> Self {
        Self {
            environment_indicator: environment.indicator(),
            credentials,
            employer,
            employee,
            contract,
            session_token: None,
            flux_id: None,
            rendered_payload: None,
            certificate: None,
            certificate_error: None,
        }
    }

    /// Switch between the test and production environments.
    pub fn set_environment(&mut self, environment: Environment) {
        self.environment_indicator = environment.indicator();
    }

    /// Validated environment.
    pub fn environment(&self) -> Result<Environment, ValidationError> {
        Environment::try_from(self.environment_indicator)
    }

    /// Current session token, if any.
    pub fn session_token(&self) -> Option<&SessionToken> {
        self.session_token.as_ref()
    }

    /// Store a session token obtained from the authentication endpoint.
    pub fn set_session_token(&mut self, token: SessionToken) {
        self.session_token = Some(token);
    }

    /// Forget the session token.
    pub fn clear_session_token(&mut self) {
        self.session_token = None;
    }
}
