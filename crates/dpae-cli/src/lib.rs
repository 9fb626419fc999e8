//! # dpae-cli: Command-line tool for DPAE declarations
//!
//! Provides the `dpae` command-line interface over `dpae-client`.
//!
//! ## Subcommands
//!
//! - `dpae render`: validate, normalize and print the declaration XML.
//! - `dpae submit`: authenticate, submit and poll until a verdict.
//! - `dpae poll`: authenticate and resume polling an earlier submission.
//!
//! ```bash
//! dpae render --input hire.yaml
//! DPAE_PASSWORD=... dpae submit --input hire.json --production
//! DPAE_PASSWORD=... dpae poll --input hire.json --flux-id 12345678901234567890123
//! ```
//!
//! ## Exit Codes
//!
//! `0` certified (or rendered), `2` rejected, `1` any error.

pub mod input;
pub mod lifecycle;
pub mod render;

/// Exit code for a certified or rendered declaration.
pub const EXIT_OK: u8 = 0;

/// Exit code for a declaration judged non-conforming.
pub const EXIT_REJECTED: u8 = 2;
