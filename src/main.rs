//! issue-dl command line entry point

use clap::{Parser, Subcommand};
use issue_dl::{Config, CycleOutcome, Service, UpdateCheck, Validation, run_until_shutdown};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Keep a local copy of the latest issue of a publication
#[derive(Parser, Debug)]
#[command(name = "issue-dl", version, about)]
struct Cli {
    /// Configuration file (TOML); defaults apply when omitted
    #[arg(short, long, env = "ISSUE_DL_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the weekly and periodic triggers until interrupted
    Run,
    /// Run a single acquisition cycle and exit
    Once,
    /// Resolve the latest issue and compare it with the cache, without downloading
    Check,
    /// Verify the cached document against its metadata
    Validate,
    /// Delete everything in the staging directory except the placeholder
    Clean,
    /// Print cache metadata as JSON
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> issue_dl::Result<ExitCode> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v when set
    let default_filter = match cli.verbose {
        0 => "issue_dl=info",
        1 => "issue_dl=debug",
        _ => "issue_dl=trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => {
            debug!(path = %path.display(), "Loading configuration");
            Config::from_file(path)?
        }
        None => Config::default(),
    };
    let service = Service::from_config(&config)?;

    match cli.command {
        Command::Run => {
            run_until_shutdown(service.start()?).await;
            Ok(ExitCode::SUCCESS)
        }
        Command::Once => {
            let outcome = service.coordinator().run_acquisition_cycle().await;
            println!("{outcome}");
            if let CycleOutcome::DownloadedAndCached { stored_path, .. } = &outcome {
                println!("{}", stored_path.display());
            }
            Ok(exit_code(!outcome.is_failure()))
        }
        Command::Check => match service.coordinator().check_for_update().await {
            UpdateCheck::NewIssue { latest, cached } => {
                let url = service.resolver().build_issue_url(latest);
                match cached {
                    Some(cached) => println!("new issue {latest} available (cached {cached}): {url}"),
                    None => println!("new issue {latest} available (cache empty): {url}"),
                }
                Ok(ExitCode::SUCCESS)
            }
            UpdateCheck::UpToDate { latest, .. } => {
                println!("up to date (latest {latest})");
                Ok(ExitCode::SUCCESS)
            }
            UpdateCheck::Failed { error } => {
                eprintln!("check failed: {error}");
                Ok(ExitCode::FAILURE)
            }
        },
        Command::Validate => {
            let validation = service.cache().validate().await?;
            match &validation {
                Validation::Valid {
                    issue,
                    path,
                    size,
                    checksum,
                    checksum_verified,
                } => {
                    println!("issue {issue}: {} ({size} bytes)", path.display());
                    if *checksum_verified {
                        println!("checksum ok: {checksum}");
                    } else {
                        println!("checksum (not recorded): {checksum}");
                    }
                }
                Validation::Empty => println!("cache is empty"),
                Validation::MissingFile(path) => {
                    eprintln!("cached file missing: {}", path.display())
                }
                Validation::NotPdf(path) => {
                    eprintln!("cached file is not a PDF: {}", path.display())
                }
                Validation::ChecksumMismatch { expected, actual } => {
                    eprintln!("checksum mismatch: expected {expected}, found {actual}")
                }
            }
            Ok(exit_code(
                validation.is_valid() || validation == Validation::Empty,
            ))
        }
        Command::Clean => {
            let report = service.staging().purge().await;
            println!(
                "cleaned {} file(s) from {}",
                report.deleted,
                service.staging().dir().display()
            );
            Ok(exit_code(report.failed == 0))
        }
        Command::Status => {
            let status = service.coordinator().status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
