use clap::{Parser, Subcommand};
use crate_lens::formatter::{status_glyph, suggested_update};
use crate_lens::{Engine, LensConfig, PassOutcome, ResultSink, Session, ValidationReport};
use lens_core::{AdvisoryCheck, LensError};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Report how far behind the published crates a Cargo manifest is
#[derive(Parser, Debug)]
#[command(name = "crate-lens", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate one Cargo.toml
    Check {
        /// Path to the manifest
        manifest: PathBuf,

        /// Print results as JSON
        #[arg(long)]
        json: bool,

        /// Skip the cargo audit check
        #[arg(long)]
        no_advisories: bool,
    },
}

/// Keeps the advisory result so it can be printed after the pass.
#[derive(Default)]
struct CliSink {
    advisories: Mutex<Option<AdvisoryCheck>>,
}

impl ResultSink for CliSink {
    fn publish_results(&self, report: &ValidationReport) {
        tracing::debug!("pass {} produced {} results", report.generation, report.results.len());
    }

    fn publish_advisories(&self, _path: &Path, _generation: u64, check: &AdvisoryCheck) {
        if let Ok(mut slot) = self.advisories.lock() {
            *slot = Some(check.clone());
        }
    }

    fn publish_parse_error(&self, path: &Path, _generation: u64, error: &LensError) {
        tracing::debug!("parse error in {}: {}", path.display(), error);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> crate_lens::Result<ExitCode> {
    let mut config = LensConfig::load(cli.config.as_deref())?;

    let Command::Check {
        manifest,
        json,
        no_advisories,
    } = cli.command;
    if no_advisories {
        config.advisories.enabled = false;
    }

    let sink = Arc::new(CliSink::default());
    let engine = Engine::new(Arc::new(Session::cargo(config)?), sink.clone());

    let outcome = engine.validate_file(&manifest).await?.wait_advisories().await;
    let advisories = sink.advisories.lock().ok().and_then(|mut slot| slot.take());

    match outcome {
        PassOutcome::Completed(report) => {
            if json {
                print_json(&report, advisories.as_ref());
            } else {
                print_text(&report, advisories.as_ref());
            }
            Ok(ExitCode::SUCCESS)
        }
        PassOutcome::ParseFailed { error, .. } => {
            eprintln!("error: {}", error);
            Ok(ExitCode::FAILURE)
        }
        PassOutcome::Cancelled => Ok(ExitCode::FAILURE),
    }
}

fn print_json(report: &ValidationReport, advisories: Option<&AdvisoryCheck>) {
    let output = serde_json::json!({
        "path": report.path,
        "results": report.results,
        "unanchored": report.unanchored,
        "advisories": advisories,
    });
    match serde_json::to_string_pretty(&output) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("error: failed to serialize results: {}", e),
    }
}

fn print_text(report: &ValidationReport, advisories: Option<&AdvisoryCheck>) {
    println!("{}", report.path.display());

    for result in &report.results {
        let dep = &result.dependency;
        let mut line = format!(
            "{:>5}  {:<24} {:<12} {} {}",
            dep.line + 1,
            dep.name,
            dep.requirement.raw().unwrap_or("-"),
            status_glyph(result.status),
            result.status.as_str(),
        );
        if let Some(version) = suggested_update(result) {
            line.push_str(&format!(" → {}", version));
        }
        if let Some(locked) = &result.locked {
            line.push_str(&format!(" (locked {})", locked));
        }
        if let Some(error) = &result.error {
            line.push_str(&format!(": {}", error.message));
        }
        println!("{}", line);
    }
    for name in &report.unanchored {
        println!("{:>5}  {:<24} skipped: shares its line with another dependency", "-", name);
    }

    let Some(check) = advisories else {
        return;
    };
    if !check.available {
        println!("\nadvisories: cargo audit not installed");
        return;
    }
    if let Some(error) = &check.error {
        println!("\nadvisories: {}", error);
        return;
    }
    if check.advisories.is_empty() {
        println!("\nadvisories: none");
        return;
    }

    println!("\nadvisories:");
    for (name, list) in check.advisories.iter() {
        for advisory in list {
            println!(
                "  {} {} {}: {}",
                name,
                advisory.version.as_deref().unwrap_or("*"),
                advisory.id,
                advisory.title
            );
        }
    }
}
