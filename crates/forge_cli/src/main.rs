//! AppForge CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Generation failure
//! - 4: Cancelled

use std::process::ExitCode;

use clap::Parser;
use forge_kernel::KernelError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod render;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const GENERATION_FAILURE: u8 = 3;
    pub const CANCELLED: u8 = 4;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.global.json_logs);

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args, &cli.global).await,
        Commands::Resume(args) => commands::resume::execute(args, &cli.global).await,
        Commands::Status(args) => commands::status::execute(args, &cli.global).await,
        Commands::Clear(args) => commands::clear::execute(args, &cli.global).await,
        Commands::Plan(args) => commands::plan::execute(args, &cli.global).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            if exit_code != ExitCodes::CANCELLED {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::from(exit_code)
        }
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("forge=info,warn"));
    let registry = tracing_subscriber::registry().with(filter);
    let log_result = if json {
        registry.with(fmt::layer().json().with_target(false)).try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };

    if log_result.is_err() {
        // Logging already initialized, continue
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    if let Some(kernel) = e.downcast_ref::<KernelError>() {
        return match kernel {
            _ if kernel.is_cancelled() => ExitCodes::CANCELLED,
            KernelError::NoProject | KernelError::EmptyCommand(_) | KernelError::Security { .. } => {
                ExitCodes::INVALID_ARGS
            }
            KernelError::FlowFailed { .. } | KernelError::Pipeline(_) => ExitCodes::GENERATION_FAILURE,
            _ => ExitCodes::GENERAL_ERROR,
        };
    }

    let msg = e.to_string().to_lowercase();
    if msg.contains("invalid option") || msg.contains("unknown platform") || msg.contains("no saved session") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}
