//! # dpae CLI entry point
//!
//! Parses command-line arguments, initializes tracing and dispatches to
//! the subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dpae_cli::lifecycle::{run_poll, run_submit, PollArgs, SubmitArgs};
use dpae_cli::render::{run_render, RenderArgs};

/// DPAE pre-hiring declaration client.
///
/// Renders declarations, submits them to the declaration service and polls
/// for the compliance certificate.
#[derive(Parser, Debug)]
#[command(name = "dpae", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate, normalize and print the declaration XML.
    Render(RenderArgs),

    /// Authenticate, submit the declaration and poll until a verdict.
    Submit(SubmitArgs),

    /// Authenticate and resume polling an earlier submission.
    Poll(PollArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity level.
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let result = match cli.command {
        Commands::Render(args) => run_render(&args),
        Commands::Submit(args) => run_submit(&args).await,
        Commands::Poll(args) => run_poll(&args).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
