//! CircuitGuard CLI - validate inspection protocol measurements from the command line.

use anyhow::Context;
use circuitguard::{
    load_circuits, AggregateReport, EngineConfig, ReferenceTables, RuleCatalog, Severity,
    ValidationEngine,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "circuitguard")]
#[command(about = "Electrical circuit measurement validation tool", long_about = None)]
#[command(version)]
struct Cli {
    /// Log debug output to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate every circuit in a protocol file
    Check {
        /// JSON file with a circuit array or a `circuits` array
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Exit with error code if findings exist at this severity or higher
        #[arg(long, value_enum)]
        fail_on: Option<FailOnSeverity>,

        /// Engine configuration (JSON)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Reference tables replacing the builtin ones (JSON)
        #[arg(long, value_name = "FILE")]
        tables: Option<PathBuf>,
    },

    /// Check a single field value as a form would on each keystroke
    Field {
        /// Field name, e.g. current, cableGauge, nominalFrequency
        name: String,

        /// Raw value as typed
        #[arg(allow_hyphen_values = true)]
        value: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Reference tables replacing the builtin ones (JSON)
        #[arg(long, value_name = "FILE")]
        tables: Option<PathBuf>,
    },

    /// List available validation rules
    Rules {
        /// Show rule descriptions and the fields each rule reads
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the active reference tables as JSON
    Tables {
        /// Reference tables to load instead of the builtin ones
        #[arg(long, value_name = "FILE")]
        tables: Option<PathBuf>,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output for tooling
    Json,
    /// GitHub Actions annotations
    Github,
}

#[derive(Clone, ValueEnum)]
enum FailOnSeverity {
    Critical,
    Warning,
    Info,
}

impl FailOnSeverity {
    fn threshold(&self) -> Severity {
        match self {
            FailOnSeverity::Critical => Severity::Critical,
            FailOnSeverity::Warning => Severity::Warning,
            FailOnSeverity::Info => Severity::Info,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let outcome = match cli.command {
        Commands::Check {
            file,
            format,
            fail_on,
            config,
            tables,
        } => handle_check(&file, format, fail_on, config.as_deref(), tables),
        Commands::Field {
            name,
            value,
            format,
            tables,
        } => handle_field(&name, value, format, tables.as_deref()),
        Commands::Rules { verbose } => {
            handle_rules(verbose);
            Ok(0)
        }
        Commands::Tables { tables } => handle_tables(tables.as_deref()),
    };

    let exit_code = match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };
    process::exit(exit_code);
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_tables(path: Option<&Path>) -> anyhow::Result<ReferenceTables> {
    match path {
        Some(path) => ReferenceTables::load(path)
            .with_context(|| format!("failed to load reference tables from {}", path.display())),
        None => Ok(ReferenceTables::builtin()),
    }
}

fn handle_check(
    file: &Path,
    format: OutputFormat,
    fail_on: Option<FailOnSeverity>,
    config: Option<&Path>,
    tables: Option<PathBuf>,
) -> anyhow::Result<i32> {
    let mut config = match config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if tables.is_some() {
        config.tables_path = tables;
    }

    let engine = ValidationEngine::from_config(&config).context("failed to build engine")?;
    let circuits = load_circuits(file)
        .with_context(|| format!("failed to read circuits from {}", file.display()))?;
    debug!("Loaded {} circuit(s) from {}", circuits.len(), file.display());

    let report = engine.validate_all_circuits(&circuits);
    match format {
        OutputFormat::Human => output_human(file, &report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Github => output_github(file, &report),
    }

    if let Some(severity) = fail_on {
        if should_fail(&report, &severity) {
            return Ok(1);
        }
    }
    Ok(0)
}

fn should_fail(report: &AggregateReport, severity: &FailOnSeverity) -> bool {
    let threshold = severity.threshold();
    report.circuit_results.iter().any(|circuit| {
        circuit
            .result
            .overall
            .is_some_and(|overall| overall.rank() >= threshold.rank())
    })
}

fn output_human(file: &Path, report: &AggregateReport) {
    println!("\nProtocol: {}", file.display());
    println!("{}", "─".repeat(60));

    for circuit in &report.circuit_results {
        let result = &circuit.result;
        if result.non_conformities.is_empty() {
            println!("\n  {}: no findings", circuit.circuit_id);
            continue;
        }

        let status = if result.is_valid { "ok" } else { "NOT OK" };
        println!("\n  {} ({}):", circuit.circuit_id, status);
        for finding in &result.non_conformities {
            println!("    [{}] {}", finding.severity, finding.message);
            if !finding.affected_fields.is_empty() {
                println!("      Fields: {}", finding.affected_fields.join(", "));
            }
        }
    }

    println!("\n  Summary:");
    println!("    Circuits:    {}", report.total_circuits);
    println!("    Valid:       {}", report.valid_circuits);
    println!("    With issues: {}", report.circuits_with_issues);
    println!("    Critical:    {}", report.critical_issues);
}

fn severity_to_github(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "error",
        Severity::Warning => "warning",
        Severity::Info => "notice",
    }
}

fn output_github(file: &Path, report: &AggregateReport) {
    for circuit in &report.circuit_results {
        for finding in &circuit.result.non_conformities {
            println!(
                "::{} file={},title={} {}::{}",
                severity_to_github(finding.severity),
                file.display(),
                circuit.circuit_id,
                finding.code,
                finding.message.replace('\n', " ")
            );
        }
    }
}

fn handle_field(
    name: &str,
    value: String,
    format: OutputFormat,
    tables: Option<&Path>,
) -> anyhow::Result<i32> {
    let engine = ValidationEngine::new(load_tables(tables)?);
    let check = engine.validate_input_value(name, value.as_str());

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&check)?),
        OutputFormat::Human | OutputFormat::Github => match &check.error {
            None => println!("{} = '{}': valid", name, value),
            Some(error) => println!("{} = '{}': invalid ({})", name, value, error),
        },
    }

    Ok(if check.valid { 0 } else { 1 })
}

fn handle_rules(verbose: bool) {
    println!("Available validation rules:\n");

    let catalog = RuleCatalog::with_default_rules();
    for rule in catalog.rules() {
        println!("  {}", rule.code());
        println!("    {} ({:?})", rule.name(), rule.category());
        if verbose {
            println!("    {}", rule.description());
            println!("    Fields: {}", rule.fields().join(", "));
        }
        println!();
    }
}

fn handle_tables(path: Option<&Path>) -> anyhow::Result<i32> {
    let tables = load_tables(path)?;
    println!("{}", serde_json::to_string_pretty(&tables)?);
    Ok(0)
}
