//! # dpae-core: Foundational Types for the DPAE Client
//!
//! Everything about a pre-hiring declaration that does not touch the
//! network: the data model, the field formatter that normalizes raw input,
//! the renderer that produces the authentication and declaration documents,
//! the parser that reads the service's replies, and the error taxonomy
//! shared by the whole workspace.
//!
//! ## Key Design Principles
//!
//! 1. **Validate before rendering.** [`prepare_declaration`] parses every
//!    enumerated code and date before a template is touched. A
//!    [`PreparedDeclaration`] always renders into a document the service
//!    accepts structurally.
//!
//! 2. **Newtypes for protocol identifiers.** [`FluxId`] and [`Certificate`]
//!    enforce their length rules at construction. [`SessionToken`] is
//!    zeroized on drop and redacted from `Debug`.
//!
//! 3. **Lossy normalization is visible.** Characters dropped by the
//!    free-text allow-sets are counted per field in a
//!    [`NormalizationReport`].
//!
//! ## Crate Policy
//!
//! - No I/O. Transport lives in `dpae-client`.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod format;
pub mod identity;
pub mod model;
pub mod render;
pub mod response;

// Re-export primary types for ergonomic imports.
pub use error::{
    CredentialError, DpaeError, ProtocolError, RejectionError, TransportError, ValidationError,
};
pub use identity::{Certificate, FluxId, SessionToken, FLUX_ID_LEN, MIN_CERTIFICATE_LEN};
pub use model::{
    Contract, Credentials, DeclarationContext, Employee, Employer, Environment, NatureCode,
    ServiceCode,
};
pub use render::{
    encode_latin1, prepare_declaration, render_authentication, render_declaration,
    NormalizationReport, PreparedDeclaration,
};
pub use response::{ConsultationResult, ResultVerdict};
