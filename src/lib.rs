mod amount;
mod assemble;
mod classify;
mod csv_out;
mod dates;
mod error;
mod extract;
mod model;
mod normalize;
mod options;
mod pdf_reader;
mod summary;
mod warning;

use std::path::Path;

use rust_decimal::Decimal;
use tracing::debug;

use crate::amount::AmountParser;
use crate::assemble::{AssembleSettings, assemble, printed_opening};
use crate::csv_out::{write_csv, write_csv_to_string};
use crate::dates::DateMatcher;
use crate::extract::extract_pages;
use crate::normalize::{Normalizer, RowOutcome};
use crate::pdf_reader::{read_pdf_pages, read_pdf_pages_from_bytes};

pub use classify::{Classification, ClassifySettings, classify};
pub use error::ConvertError;
pub use model::{
    BalanceMismatch, Cell, ClassifiedTransaction, ColumnHint, DraftTransaction, PageContent,
    RawRow, ReconciliationSummary, StatementPage, StatementReport, TransactionKind,
};
pub use options::{
    ConvertOptions, DEFAULT_DATE_FORMATS, DecimalConvention, OpeningBalancePolicy, PageSelection,
    TieBreakPolicy,
};
pub use summary::summarize;
pub use warning::{ConvertWarning, Severity, WarningCode};

fn check_ceiling(resource: &'static str, limit: usize, actual: usize) -> Result<(), ConvertError> {
    if actual > limit {
        return Err(ConvertError::CeilingExceeded {
            resource,
            limit,
            actual,
        });
    }
    Ok(())
}

/// Declared opening balance wins over one printed on the statement; a
/// disagreement between the two is reported.
fn effective_opening(
    declared: Option<Decimal>,
    printed: Option<Decimal>,
    tolerance: Decimal,
    warnings: &mut Vec<ConvertWarning>,
) -> Option<Decimal> {
    match (declared, printed) {
        (Some(declared), Some(printed)) => {
            if (declared - printed).abs() > tolerance {
                warnings.push(ConvertWarning::new(
                    WarningCode::OpeningBalanceDisagreement,
                    format!(
                        "declared opening balance {declared} differs from {printed} printed on the statement"
                    ),
                ));
            }
            Some(declared)
        }
        (declared, printed) => declared.or(printed),
    }
}

/// Runs the whole engine over already decoded pages.
///
/// Configuration problems and exceeded ceilings abort the conversion.
/// Everything else degrades into warnings on the returned report, so a
/// noisy statement still yields the transactions that could be recovered.
pub fn convert_statement(
    pages: &[StatementPage],
    options: &ConvertOptions,
) -> Result<StatementReport, ConvertError> {
    options.validate()?;
    check_ceiling("page", options.max_pages, pages.len())?;

    let selected = pages
        .iter()
        .filter(|page| {
            options
                .pages
                .as_ref()
                .is_none_or(|selection| selection.contains(page.page_number))
        })
        .cloned()
        .collect::<Vec<_>>();
    if selected.is_empty() {
        return Err(ConvertError::NoPagesSelected);
    }

    let amounts = AmountParser::new(options.decimal)?;
    let dates = DateMatcher::new(&options.date_patterns());

    let (rows, mut warnings) = extract_pages(&selected);
    check_ceiling("row", options.max_rows, rows.len())?;
    debug!(pages = selected.len(), rows = rows.len(), "extracted rows");

    let mut normalizer = Normalizer::new(amounts, dates.clone());
    let outcomes = rows
        .iter()
        .map(|row| {
            let outcome = normalizer.normalize(row);
            if matches!(outcome, RowOutcome::Noise { warning: None, .. }) {
                debug!(page = row.page, line = row.line, text = %row.joined_text(), "ignored row");
            }
            outcome
        })
        .collect::<Vec<_>>();

    let opening_balance = effective_opening(
        options.declared_opening_balance,
        printed_opening(&outcomes),
        options.mismatch_tolerance,
        &mut warnings,
    );
    let assembly = assemble(
        &outcomes,
        &dates,
        &AssembleSettings {
            date_format_hint: options.date_format_hint.as_deref(),
            inference_window: options.date_inference_window,
            opening_balance,
            tolerance: options.mismatch_tolerance,
        },
    );
    debug!(
        date_format = assembly.date_format.as_deref().unwrap_or("-"),
        drafts = assembly.drafts.len(),
        "assembled statement"
    );
    warnings.extend(assembly.warnings);

    let classification = classify(
        assembly.drafts,
        &ClassifySettings {
            declared_opening: opening_balance,
            opening_policy: options.opening_balance_policy,
            tie_break: options.tie_break,
            tolerance: options.mismatch_tolerance,
        },
    );
    warnings.extend(classification.warnings);

    if !classification.mismatches.is_empty() {
        warnings.push(ConvertWarning::new(
            WarningCode::ClassificationMismatch,
            format!(
                "{} transaction(s) do not reconcile with the running balance",
                classification.mismatches.len()
            ),
        ));
    }
    if classification.transactions.is_empty() {
        warnings.push(ConvertWarning::new(
            WarningCode::NoTransactionsDetected,
            "no transactions were detected in the selected pages",
        ));
    }

    let summary = summarize(&classification.transactions, classification.mismatches);
    debug!(
        transactions = summary.total_transactions,
        warnings = warnings.len(),
        needs_review = summary.needs_review,
        "converted statement"
    );

    Ok(StatementReport {
        transactions: classification.transactions,
        summary,
        warnings,
    })
}

pub fn convert_pdf_file(
    input_pdf: &Path,
    options: &ConvertOptions,
) -> Result<StatementReport, ConvertError> {
    options.validate()?;
    let pages = read_pdf_pages(input_pdf, options.pages.as_ref(), options.max_pages)?;
    convert_statement(&pages, options)
}

pub fn convert_pdf_bytes(
    input_pdf: &[u8],
    options: &ConvertOptions,
) -> Result<StatementReport, ConvertError> {
    options.validate()?;
    let pages = read_pdf_pages_from_bytes(input_pdf, options.pages.as_ref(), options.max_pages)?;
    convert_statement(&pages, options)
}

pub fn convert_pdf_to_csv(
    input_pdf: &Path,
    output_csv: &Path,
    options: &ConvertOptions,
) -> Result<StatementReport, ConvertError> {
    let report = convert_pdf_file(input_pdf, options)?;
    write_csv(output_csv, &report.transactions, options.delimiter)?;
    Ok(report)
}

pub fn convert_pdf_bytes_to_csv_string(
    input_pdf: &[u8],
    options: &ConvertOptions,
) -> Result<(String, StatementReport), ConvertError> {
    let report = convert_pdf_bytes(input_pdf, options)?;
    let csv = write_csv_to_string(&report.transactions, options.delimiter)?;
    Ok((csv, report))
}

/// CSV rendering of already converted transactions.
pub fn transactions_to_csv_string(
    transactions: &[ClassifiedTransaction],
    delimiter: u8,
) -> Result<String, ConvertError> {
    write_csv_to_string(transactions, delimiter)
}
