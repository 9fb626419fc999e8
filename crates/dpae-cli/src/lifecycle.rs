//! # Submit and Poll Subcommands
//!
//! Both run against the live service configured through `DPAE_*`
//! environment variables. The password is read from an environment
//! variable, never from the command line. Ctrl-C cancels the declaration
//! at its next suspension point.
//!
//! The final context (without session token) is printed as JSON on stdout.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use dpae_client::{DpaeClient, DpaeConfig, Resolved};
use dpae_core::{DeclarationContext, FluxId};
use zeroize::Zeroizing;

use crate::input::load_for;
use crate::{EXIT_OK, EXIT_REJECTED};

/// Arguments for the submit subcommand.
#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Declaration file (JSON, or YAML with a .yaml/.yml extension).
    #[arg(long)]
    pub input: PathBuf,

    /// Submit to the production environment instead of test.
    #[arg(long)]
    pub production: bool,

    /// Environment variable holding the account password.
    #[arg(long, default_value = "DPAE_PASSWORD")]
    pub password_env: String,
}

/// Arguments for the poll subcommand.
#[derive(Args, Debug)]
pub struct PollArgs {
    /// Declaration file the flux was submitted from.
    #[arg(long)]
    pub input: PathBuf,

    /// Flux id returned by an earlier submission.
    #[arg(long)]
    pub flux_id: String,

    /// Environment variable holding the account password.
    #[arg(long, default_value = "DPAE_PASSWORD")]
    pub password_env: String,
}

/// Execute the submit subcommand.
pub async fn run_submit(args: &SubmitArgs) -> Result<u8> {
    let context = load_for(&args.input, args.production)?;
    let password = read_password(&args.password_env)?;
    let client = build_client()?;

    let resolved = client
        .declare(context, password)
        .await
        .context("declaration failed")?;
    report(resolved)
}

/// Execute the poll subcommand.
pub async fn run_poll(args: &PollArgs) -> Result<u8> {
    let flux_id = FluxId::new(args.flux_id.trim()).context("invalid --flux-id")?;
    let context = load_for(&args.input, false)?;
    let password = read_password(&args.password_env)?;
    let client = build_client()?;

    let resolved = client
        .resume(context, password, flux_id)
        .await
        .context("polling failed")?;
    report(resolved)
}

/// Read the password from `var`.
pub fn read_password(var: &str) -> Result<Zeroizing<String>> {
    let password = Zeroizing::new(
        std::env::var(var).with_context(|| format!("environment variable {var} is not set"))?,
    );
    if password.is_empty() {
        anyhow::bail!("environment variable {var} is empty");
    }
    Ok(password)
}

fn build_client() -> Result<DpaeClient> {
    let config = DpaeConfig::from_env().context("invalid DPAE_* configuration")?;
    tracing::debug!(?config, "configuration loaded");
    let client = DpaeClient::new(config)?;

    let cancel = client.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted; cancelling declaration");
            cancel.cancel();
        }
    });
    Ok(client)
}

fn report(resolved: Resolved) -> Result<u8> {
    let code = match &resolved {
        Resolved::Certified(declaration) => {
            eprintln!("certified: {}", declaration.certificate());
            EXIT_OK
        }
        Resolved::Rejected(declaration) => {
            eprintln!("rejected: {}", declaration.reason());
            EXIT_REJECTED
        }
    };
    print_context(&resolved.into_context())?;
    Ok(code)
}

/// Print the context snapshot as pretty JSON.
pub fn print_context(context: &DeclarationContext) -> Result<()> {
    let json = serde_json::to_string_pretty(context).context("failed to serialize context")?;
    println!("{json}");
    Ok(())
}
