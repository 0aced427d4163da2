use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use statement_ledger::{
    ConvertOptions, DecimalConvention, OpeningBalancePolicy, PageSelection, StatementReport,
    TieBreakPolicy, convert_pdf_to_csv,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "stmt2csv",
    version,
    about = "Convert bank statement PDFs into signed transaction CSV"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract transactions, classify them and write CSV output.
    Convert(ConvertArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OpeningPolicyArg {
    Reconcile,
    TrustFirstRow,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TieBreakArg {
    ColumnHint,
    Nearest,
}

#[derive(Debug, Args)]
struct ConvertArgs {
    /// Input PDF path.
    #[arg(short, long)]
    input: PathBuf,

    /// Output CSV path.
    #[arg(short, long)]
    output: PathBuf,

    /// Also write the full report (transactions, summary, warnings) as JSON.
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Page selection like 1-3,5.
    #[arg(long)]
    pages: Option<String>,

    /// Statement date format (chrono strftime), e.g. %d/%m/%Y. Skips inference.
    #[arg(long)]
    date_format: Option<String>,

    /// Extra date formats tried after the built-in ones. Repeatable.
    #[arg(long = "extra-date-format")]
    extra_date_formats: Vec<String>,

    /// Number convention: dot, comma, or <thousands><decimal> such as " ,".
    #[arg(long, default_value = "dot")]
    decimal: String,

    /// Balance before the first transaction.
    #[arg(long, allow_hyphen_values = true)]
    opening_balance: Option<String>,

    /// How a declared opening balance is used.
    #[arg(long, value_enum, default_value_t = OpeningPolicyArg::Reconcile)]
    opening_policy: OpeningPolicyArg,

    /// Sign choice when an amount does not explain the balance movement.
    #[arg(long, value_enum, default_value_t = TieBreakArg::ColumnHint)]
    tie_break: TieBreakArg,

    /// Largest balance difference still treated as reconciled.
    #[arg(long, default_value = "0.01")]
    tolerance: String,

    /// Refuse documents with more pages than this.
    #[arg(long, default_value_t = 2000)]
    max_pages: usize,

    /// Refuse documents with more text rows than this.
    #[arg(long, default_value_t = 200_000)]
    max_rows: usize,

    /// Output delimiter character.
    #[arg(long, default_value = ",")]
    delimiter: char,

    /// Enable verbose warning output.
    #[arg(short, long)]
    verbose: bool,
}

fn parse_decimal(value: &str, flag: &str) -> Result<Decimal> {
    Decimal::from_str(value.trim())
        .map_err(|error| anyhow!("invalid number '{value}': {error}"))
        .with_context(|| format!("failed to parse {flag}"))
}

fn parse_options(args: &ConvertArgs) -> Result<ConvertOptions> {
    let pages = args
        .pages
        .as_deref()
        .map(PageSelection::from_str)
        .transpose()
        .context("failed to parse --pages")?;

    let decimal = DecimalConvention::from_str(&args.decimal).context("failed to parse --decimal")?;

    let declared_opening_balance = args
        .opening_balance
        .as_deref()
        .map(|value| parse_decimal(value, "--opening-balance"))
        .transpose()?;

    if !args.delimiter.is_ascii() {
        anyhow::bail!("delimiter must be a single ASCII character");
    }

    let defaults = ConvertOptions::default();
    let mut date_formats = defaults.date_formats;
    date_formats.extend(args.extra_date_formats.iter().cloned());

    Ok(ConvertOptions {
        pages,
        date_formats,
        date_format_hint: args.date_format.clone(),
        decimal,
        declared_opening_balance,
        opening_balance_policy: match args.opening_policy {
            OpeningPolicyArg::Reconcile => OpeningBalancePolicy::Reconcile,
            OpeningPolicyArg::TrustFirstRow => OpeningBalancePolicy::TrustFirstRow,
        },
        tie_break: match args.tie_break {
            TieBreakArg::ColumnHint => TieBreakPolicy::ColumnHintThenNearest,
            TieBreakArg::Nearest => TieBreakPolicy::NearestOnly,
        },
        mismatch_tolerance: parse_decimal(&args.tolerance, "--tolerance")?,
        max_pages: args.max_pages,
        max_rows: args.max_rows,
        delimiter: args.delimiter as u8,
        ..defaults
    })
}

fn log_report(report: &StatementReport, verbose: bool) {
    let summary = &report.summary;
    eprintln!(
        "{} transaction(s): credit {} debit {} opening {} closing {}",
        summary.total_transactions,
        summary.total_credit,
        summary.total_debit,
        summary.opening_balance,
        summary.closing_balance
    );
    if summary.needs_review {
        eprintln!(
            "warning: {} balance mismatch(es); review the output",
            summary.balance_mismatches.len()
        );
    }

    if report.warnings.is_empty() {
        return;
    }

    eprintln!("warning: {} issue(s) detected", report.warnings.len());
    if verbose {
        for warning in &report.warnings {
            eprintln!(
                "  - {:?} ({:?}) page={:?} line={:?} index={:?}: {}",
                warning.code,
                warning.severity(),
                warning.page,
                warning.line,
                warning.sequence_index,
                warning.message
            );
        }
    }
}

fn run_convert(args: &ConvertArgs) -> Result<StatementReport> {
    let options = parse_options(args)?;
    let report = convert_pdf_to_csv(&args.input, &args.output, &options)
        .with_context(|| format!("failed to convert '{}'", args.input.display()))?;

    if let Some(path) = &args.summary {
        let json = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write summary '{}'", path.display()))?;
    }

    Ok(report)
}

fn main() -> ExitCode {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("statement_ledger=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Convert(args) => match run_convert(&args) {
            Ok(report) => {
                log_report(&report, args.verbose);
                if report.summary.total_transactions > 0 {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::from(2)
                }
            }
            Err(error) => {
                eprintln!("error: {error:#}");
                ExitCode::from(1)
            }
        },
    }
}
