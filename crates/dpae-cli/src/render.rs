//! # Render Subcommand
//!
//! Validates and normalizes a declaration, then prints the XML document
//! that `submit` would send. Fields that lost characters are listed on
//! stderr.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use dpae_core::{prepare_declaration, render_declaration, NormalizationReport};

use crate::input::load_for;
use crate::EXIT_OK;

/// Arguments for the render subcommand.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Declaration file (JSON, or YAML with a .yaml/.yml extension).
    #[arg(long)]
    pub input: PathBuf,

    /// Render for the production environment instead of test.
    #[arg(long)]
    pub production: bool,
}

/// Execute the render subcommand.
pub fn run_render(args: &RenderArgs) -> Result<u8> {
    let context = load_for(&args.input, args.production)?;
    let (prepared, report) = prepare_declaration(&context).context("declaration is invalid")?;
    let document = render_declaration(&prepared)?;

    eprint!("{}", describe_report(&report));
    println!("{document}");
    Ok(EXIT_OK)
}

/// Human-readable summary of normalization losses; empty when clean.
pub fn describe_report(report: &NormalizationReport) -> String {
    report
        .losses()
        .iter()
        .map(|loss| {
            format!(
                "warning: {} lost {} disallowed and {} overflow character(s)\n",
                loss.field, loss.stripped, loss.truncated
            )
        })
        .collect()
}
