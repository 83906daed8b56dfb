//! Uploadgate CLI: run local files through the upload gate.
//!
//! Configuration comes from the environment (or `.env`); see `GateConfig`.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use uploadgate_cli::{init_tracing, resolve_policy, run_check, run_scan, CheckRequest, EXIT_REJECTED};
use uploadgate_core::{load_policy_file, GateConfig, PolicySettings};
use uploadgate_services::create_scanner;

#[derive(Parser)]
#[command(name = "uploadgate", about = "Upload validation and malware scanning gate")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a file exactly as an upload would be validated
    Check {
        /// Path to the file to check
        path: PathBuf,
        /// Submit the file through the image field
        #[arg(long)]
        as_image: bool,
        /// File type selected by the uploader (e.g. stl); required unless ALLOW_MISSING_FILE_TYPE=true
        #[arg(long)]
        file_type: Option<String>,
        /// Content type declared by the uploader
        #[arg(long)]
        content_type: Option<String>,
        /// Policy settings file overriding the configured policy
        #[arg(long)]
        policy: Option<PathBuf>,
    },
    /// Run the configured scanner on a file and print its raw verdict
    Scan {
        /// Path to the file to scan
        path: PathBuf,
    },
    /// Check that the configured scanner is reachable
    Health,
    /// Policy operations
    Policy {
        #[command(subcommand)]
        sub: PolicyCommands,
    },
}

#[derive(Subcommand)]
enum PolicyCommands {
    /// Print the effective policy
    Show {
        /// Policy settings file overriding the configured policy
        #[arg(long)]
        policy: Option<PathBuf>,
    },
    /// Validate a policy settings file and print it normalised
    Check {
        /// Policy settings file
        file: PathBuf,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

fn exit_for(passed: bool) -> ExitCode {
    if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_REJECTED)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = GateConfig::from_env().context("Failed to load configuration")?;
    init_tracing(config.log_format);

    match cli.command {
        Commands::Check {
            path,
            as_image,
            file_type,
            content_type,
            policy,
        } => {
            config.validate().context("Invalid configuration")?;
            let request = CheckRequest {
                path,
                as_image,
                file_type,
                content_type,
                policy_file: policy,
            };
            let result = run_check(&config, &request).await?;
            if let Some(message) = result.user_message() {
                tracing::info!(reason = %message, "Upload would be rejected");
            }
            print_json(&result)?;
            Ok(exit_for(result.accepted))
        }
        Commands::Scan { path } => {
            config.validate().context("Invalid configuration")?;
            let verdict = run_scan(&config, &path).await?;
            print_json(&verdict)?;
            Ok(exit_for(verdict.is_clean()))
        }
        Commands::Health => {
            let scanner = create_scanner(&config).context("Failed to create scanner")?;
            let healthy = scanner.health_check().await;
            print_json(&serde_json::json!({ "scanner": scanner.name(), "healthy": healthy }))?;
            Ok(exit_for(healthy))
        }
        Commands::Policy { sub } => match sub {
            PolicyCommands::Show { policy } => {
                let policy = resolve_policy(&config, policy.as_deref())?;
                print_json(&serde_json::json!({
                    "policy": policy,
                    "settings": PolicySettings::from(&policy),
                }))?;
                Ok(ExitCode::SUCCESS)
            }
            PolicyCommands::Check { file } => {
                let policy = load_policy_file(&file)
                    .with_context(|| format!("Invalid policy file {}", file.display()))?;
                print_json(&policy)?;
                Ok(ExitCode::SUCCESS)
            }
        },
    }
}
