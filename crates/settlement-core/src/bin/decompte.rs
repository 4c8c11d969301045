//! Décompte CLI Tool
//!
//! Run the settlement rules from the command line, JSON in and JSON out.
//!
//! Usage:
//!   decompte coverage --billed <amount> [--percent <p>] [--exempt]
//!   decompte execute --prescribed <n> --previous <n> --requested <n>
//!   decompte prescription <file> --who <actor>
//!   decompte settle <lines> --payer <id> --from <date> --to <date> [--select <ids>] [--invoice <seq>]
//!   decompte sheet <file>

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Deserialize;
use settlement_core::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "decompte")]
#[command(version = "0.1.0")]
#[command(about = "Coverage décompte, prescription execution and settlement totals", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format: json or pretty
    #[arg(short, long, default_value = "pretty", global = true)]
    format: String,

    /// Output file (stdout if not specified)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a billed amount into covered share and patient remainder
    Coverage {
        /// Billed amount
        #[arg(short, long)]
        billed: Decimal,

        /// Coverage percentage (configured default if omitted)
        #[arg(short, long)]
        percent: Option<Decimal>,

        /// Beneficiary is exempt (exonéré)
        #[arg(long)]
        exempt: bool,
    },

    /// Reconcile one execution request against a line balance
    Execute {
        #[arg(long)]
        prescribed: u32,

        #[arg(long, default_value = "0")]
        previous: u32,

        #[arg(long)]
        requested: u32,
    },

    /// Execute lines of a prescription file ({"prescription": ..., "requests": [...]})
    Prescription {
        file: PathBuf,

        /// Who performs the execution (pharmacist, nurse, lab)
        #[arg(short, long)]
        who: String,
    },

    /// Settle a payer's prestations for a period
    Settle {
        /// Lines file: JSON object mapping payer id to prestation lines
        lines: PathBuf,

        #[arg(short, long)]
        payer: String,

        /// Period start (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,

        /// Period end (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,

        /// Comma-separated line ids (all lines of the period if omitted)
        #[arg(short, long, value_delimiter = ',')]
        select: Vec<String>,

        /// Issue an invoice with this sequence number
        #[arg(long)]
        invoice: Option<u32>,
    },

    /// Build a coverage sheet (feuille de prise en charge) from a request file
    Sheet {
        file: PathBuf,
    },
}

#[derive(Deserialize)]
struct ExecutionFile {
    prescription: Prescription,
    requests: Vec<LineRequest>,
}

#[derive(Deserialize)]
struct LineRequest {
    line_id: String,
    #[serde(default, deserialize_with = "settlement_core::lenient::quantity")]
    quantity: u32,
}

#[derive(Deserialize)]
struct SheetRequest {
    beneficiary: Beneficiary,
    provider: String,
    date: NaiveDate,
    #[serde(default)]
    coverage_percent: Option<Decimal>,
    acts: Vec<SheetAct>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let bootstrap_filter = std::env::var(settlement_core::config::ENV_LOG)
        .unwrap_or_else(|_| SettlementConfig::default().log_filter);
    let config = load_config(cli.config.as_deref(), &bootstrap_filter)?;
    init_tracing(&config.log_filter);
    debug!(?config, "configuration loaded");

    let result: serde_json::Value = match cli.command {
        Commands::Coverage { billed, percent, exempt } => {
            let percent = percent.unwrap_or(config.default_coverage_percent);
            serde_json::to_value(compute_coverage(billed, percent, exempt))?
        }

        Commands::Execute { prescribed, previous, requested } => {
            let outcome = reconcile(ExecutionRequest {
                prescribed_quantity: prescribed,
                previously_executed_quantity: previous,
                requested_quantity: requested,
            });
            serde_json::to_value(outcome)?
        }

        Commands::Prescription { file, who } => {
            let mut input: ExecutionFile = serde_json::from_str(&fs::read_to_string(&file)?)?;
            let requests: Vec<(String, u32)> = input
                .requests
                .into_iter()
                .map(|r| (r.line_id, r.quantity))
                .collect();
            let execution = input.prescription.execute_all(&who, Utc::now(), &requests)?;
            serde_json::json!({
                "execution": execution,
                "prescription": input.prescription,
            })
        }

        Commands::Settle { lines, payer, from, to, select, invoice } => {
            let source: InMemorySource = serde_json::from_str(&fs::read_to_string(&lines)?)?;
            let batch = SettlementBatch::new(payer, from, to).with_lines(select);
            let pipeline = SettlementPipeline::new(source, config.clone());
            let report = pipeline.run(&batch)?;
            match invoice {
                Some(sequence) => {
                    let issued_on = Utc::now().date_naive();
                    serde_json::to_value(pipeline.invoice(&report, issued_on, sequence))?
                }
                None => serde_json::to_value(report)?,
            }
        }

        Commands::Sheet { file } => {
            let request: SheetRequest = serde_json::from_str(&fs::read_to_string(&file)?)?;
            let percent = request
                .coverage_percent
                .unwrap_or(config.default_coverage_percent);
            let sheet = CoverageSheet::build(
                request.beneficiary,
                request.provider,
                request.date,
                percent,
                request.acts,
            );
            serde_json::json!({
                "currency": config.currency,
                "sheet": sheet,
            })
        }
    };

    let output_str = match cli.format.as_str() {
        "json" => serde_json::to_string(&result)?,
        "pretty" => serde_json::to_string_pretty(&result)?,
        other => return Err(format!("Unknown format: {}. Valid: json, pretty", other).into()),
    };

    if let Some(output_path) = cli.output {
        fs::write(&output_path, &output_str)?;
        eprintln!("Output written to: {}", output_path.display());
    } else {
        println!("{}", output_str);
    }

    Ok(())
}

/// Load the config under a scoped subscriber
///
/// The configured filter is only known once the config is read.
fn load_config(path: Option<&Path>, bootstrap_filter: &str) -> Result<SettlementConfig, SettlementError> {
    tracing::subscriber::with_default(stderr_subscriber(bootstrap_filter), || SettlementConfig::load(path))
}

fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

fn stderr_subscriber(default_filter: &str) -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_filter))
        .with_writer(std::io::stderr)
        .finish()
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_filter))
        .with_writer(std::io::stderr)
        .init();
}
