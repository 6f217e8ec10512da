//! Calma CLI - Command-line interface for the Calma stress engine
//!
//! Commands:
//! - decide: Score one request (batch mode)
//! - run: Score NDJSON requests from stdin (streaming mode)
//! - validate: Run the advisory sensor range checks
//! - doctor: Diagnose weights and configuration

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use calma_stress::encoder::DecisionEncoder;
use calma_stress::sequence::SequenceBuilder;
use calma_stress::validation::{validate_reading, validate_window, ValidationReport};
use calma_stress::{
    ComputeError, DecisionEngine, EngineConfig, ErrorKind, SensorReading, StressInput,
    CALMA_VERSION, PRODUCER_NAME,
};

/// Calma - Hybrid stress decision engine
#[derive(Parser)]
#[command(name = "calma")]
#[command(version = CALMA_VERSION)]
#[command(about = "Score physiological readings for stress", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a single request (reading object or {"sequence": [...]})
    Decide {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// LSTM weights (JSON state dict)
        #[arg(short, long)]
        weights: PathBuf,

        /// Engine config JSON (defaults when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,

        /// Wrap the decision in a report envelope
        #[arg(long)]
        report: bool,
    },

    /// Score newline-delimited requests from stdin (streaming mode)
    Run {
        /// LSTM weights (JSON state dict)
        #[arg(short, long)]
        weights: PathBuf,

        /// Engine config JSON (defaults when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Wrap each decision in a report envelope
        #[arg(long)]
        report: bool,

        /// Buffer output instead of flushing after each record
        #[arg(long)]
        no_flush: bool,
    },

    /// Run the advisory sensor range checks on a request
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose weights and configuration
    Doctor {
        /// LSTM weights to check
        #[arg(short, long)]
        weights: Option<PathBuf>,

        /// Engine config to check
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact single-line JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CalmaCliError> {
    match cli.command {
        Commands::Decide {
            input,
            weights,
            config,
            output_format,
            report,
        } => cmd_decide(&input, &weights, config.as_deref(), output_format, report),
        Commands::Run {
            weights,
            config,
            report,
            no_flush,
        } => cmd_run(&weights, config.as_deref(), report, !no_flush),
        Commands::Validate { input, json } => cmd_validate(&input, json),
        Commands::Doctor {
            weights,
            config,
            json,
        } => cmd_doctor(weights.as_deref(), config.as_deref(), json),
    }
}

fn cmd_decide(
    input: &Path,
    weights: &Path,
    config: Option<&Path>,
    output_format: OutputFormat,
    report: bool,
) -> Result<(), CalmaCliError> {
    let engine = load_engine(weights, config)?;
    let request: StressInput = serde_json::from_str(&read_input(input)?)?;

    let value = if report {
        let encoder = DecisionEncoder::new();
        serde_json::to_value(engine.decide_report(request, &encoder)?)?
    } else {
        serde_json::to_value(engine.decide(request)?)?
    };

    let output = match output_format {
        OutputFormat::Json => serde_json::to_string(&value)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(&value)?,
    };
    println!("{output}");
    Ok(())
}

fn cmd_run(
    weights: &Path,
    config: Option<&Path>,
    report: bool,
    flush: bool,
) -> Result<(), CalmaCliError> {
    let engine = load_engine(weights, config)?;
    let encoder = DecisionEncoder::new();

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut processed = 0usize;
    let mut failed = 0usize;

    for (index, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        // A bad request is answered with an error record; the stream keeps going
        let record = match decide_line(&engine, &encoder, trimmed, report) {
            Ok(value) => value,
            Err(e) => {
                failed += 1;
                log::warn!("line {}: {e}", index + 1);
                serde_json::json!({
                    "line": index + 1,
                    "error": CliError::from(CalmaCliError::Compute(e)),
                })
            }
        };
        processed += 1;

        writeln!(stdout, "{}", serde_json::to_string(&record)?)?;
        if flush {
            stdout.flush()?;
        }
    }

    stdout.flush()?;
    log::info!("processed {processed} requests ({failed} failed)");
    Ok(())
}

fn decide_line(
    engine: &DecisionEngine,
    encoder: &DecisionEncoder,
    line: &str,
    report: bool,
) -> Result<serde_json::Value, ComputeError> {
    let request: StressInput = serde_json::from_str(line)?;
    if report {
        Ok(serde_json::to_value(engine.decide_report(request, encoder)?)?)
    } else {
        Ok(serde_json::to_value(engine.decide(request)?)?)
    }
}

fn cmd_validate(input: &Path, json: bool) -> Result<(), CalmaCliError> {
    let request: StressInput = serde_json::from_str(&read_input(input)?)?;

    let report = match request {
        StressInput::Reading(reading) => validate_reading(&reading),
        StressInput::Sequence { sequence } => {
            let readings: Vec<SensorReading> = SequenceBuilder::parse_rows(&sequence)?;
            validate_window(&readings)
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_validation(&report);
    }

    if report.valid {
        Ok(())
    } else {
        Err(CalmaCliError::ValidationFailed(report.warnings.len()))
    }
}

fn print_validation(report: &ValidationReport) {
    println!("Validation Report");
    println!("=================");
    println!("Valid:    {}", report.valid);
    println!("Warnings: {}", report.warnings.len());

    if !report.warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &report.warnings {
            println!("  - {warning}");
        }
    }
}

fn cmd_doctor(
    weights: Option<&Path>,
    config: Option<&Path>,
    json: bool,
) -> Result<(), CalmaCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "calma_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Calma version {CALMA_VERSION}"),
    });

    let engine_config = match config {
        Some(path) => match EngineConfig::from_path(path) {
            Ok(cfg) => {
                checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: format!("Config valid (seq_len {})", cfg.seq_len),
                });
                Some(cfg)
            }
            Err(e) => {
                checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: e.to_string(),
                });
                None
            }
        },
        None => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: "Using default config".to_string(),
            });
            Some(EngineConfig::default())
        }
    };

    match (weights, engine_config) {
        (Some(path), Some(cfg)) => checks.push(check_weights(path, cfg)),
        (Some(_), None) => checks.push(DoctorCheck {
            name: "weights".to_string(),
            status: CheckStatus::Warning,
            message: "Skipped, config is invalid".to_string(),
        }),
        (None, _) => checks.push(DoctorCheck {
            name: "weights".to_string(),
            status: CheckStatus::Warning,
            message: "No weights file given (use --weights)".to_string(),
        }),
    }

    // Check stdin is available (for streaming mode)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: CALMA_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Calma Doctor Report");
        println!("===================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");
        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(CalmaCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

/// Load the weights and run one calm reading through the full pipeline
fn check_weights(path: &Path, config: EngineConfig) -> DoctorCheck {
    let smoke = SensorReading::new(70.0, 45.0, 14.0, 0.5);

    match DecisionEngine::from_weights_path(config, path)
        .and_then(|engine| engine.decide_reading(smoke))
    {
        Ok(decision) => DoctorCheck {
            name: "weights".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "Weights loaded, smoke decision {} ({:.1}%)",
                decision.level_name, decision.stress_percentage
            ),
        },
        Err(e) => DoctorCheck {
            name: "weights".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    }
}

// Helper functions

fn load_engine(weights: &Path, config: Option<&Path>) -> Result<DecisionEngine, CalmaCliError> {
    let config = match config {
        Some(path) => EngineConfig::from_path(path)?,
        None => EngineConfig::default(),
    };
    Ok(DecisionEngine::from_weights_path(config, weights)?)
}

fn read_input(input: &Path) -> Result<String, CalmaCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

// Error types

#[derive(Debug)]
enum CalmaCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for CalmaCliError {
    fn from(e: io::Error) -> Self {
        CalmaCliError::Io(e)
    }
}

impl From<ComputeError> for CalmaCliError {
    fn from(e: ComputeError) -> Self {
        CalmaCliError::Compute(e)
    }
}

impl From<serde_json::Error> for CalmaCliError {
    fn from(e: serde_json::Error) -> Self {
        CalmaCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CalmaCliError> for CliError {
    fn from(e: CalmaCliError) -> Self {
        match e {
            CalmaCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CalmaCliError::Compute(e) => {
                let (code, hint) = match e.kind() {
                    ErrorKind::Shape => (
                        "SHAPE_ERROR",
                        "Each sequence row must be [hr, rmssd, breathing_rpm, movement]",
                    ),
                    ErrorKind::Inference => (
                        "INFERENCE_ERROR",
                        "Run 'calma doctor --weights <file>' to check the model",
                    ),
                    ErrorKind::Startup => (
                        "STARTUP_ERROR",
                        "Check the weights and config files",
                    ),
                    ErrorKind::Input => (
                        "PARSE_ERROR",
                        "Send a reading object or {\"sequence\": [[...], ...]}",
                    ),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            CalmaCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            CalmaCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{count} sensor values out of range"),
                hint: Some(
                    "Out-of-range values are advisory; decide still scores them".to_string(),
                ),
            },
            CalmaCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
