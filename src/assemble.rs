use rust_decimal::Decimal;
use tracing::debug;

use crate::dates::{DateMatcher, parse_date};
use crate::model::{ColumnHint, DraftTransaction};
use crate::normalize::{MarkerKind, NormalizedField, NormalizedRow, RowOutcome};
use crate::warning::{ConvertWarning, WarningCode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Assembly {
    pub drafts: Vec<DraftTransaction>,
    pub date_format: Option<String>,
    pub warnings: Vec<ConvertWarning>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct AssembleSettings<'a> {
    pub date_format_hint: Option<&'a str>,
    pub inference_window: usize,
    /// Balance before the first transaction, when known.
    pub opening_balance: Option<Decimal>,
    pub tolerance: Decimal,
}

/// Where wrapped text goes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chain {
    /// Nothing accepted yet; stray text is preamble.
    Start,
    /// Attach to the last draft.
    Open,
    /// The row the text belongs to was rejected.
    Broken,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    value: Decimal,
    hint: ColumnHint,
}

fn reject(row: &NormalizedRow, message: impl Into<String>) -> ConvertWarning {
    ConvertWarning::new(WarningCode::RowRejected, message)
        .with_page(row.page)
        .with_line(row.line)
}

/// Picks the transaction amount among a row's candidates.
///
/// With two non-zero candidates the one matching the balance movement since
/// `previous_balance` wins; a double match is settled by the hint agreeing
/// with the direction of the movement, otherwise the rightmost is taken.
fn resolve_amount(
    candidates: &[Candidate],
    previous_balance: Option<Decimal>,
    balance: Decimal,
    tolerance: Decimal,
) -> Option<(Decimal, ColumnHint)> {
    let rightmost = *candidates.last()?;
    let non_zero = candidates
        .iter()
        .filter(|candidate| !candidate.value.is_zero())
        .copied()
        .collect::<Vec<_>>();

    let chosen = match non_zero.as_slice() {
        [] => rightmost,
        [only] => *only,
        [.., last] => match previous_balance {
            None => *last,
            Some(previous) => {
                let delta = balance - previous;
                let matching = non_zero
                    .iter()
                    .filter(|candidate| (candidate.value.abs() - delta.abs()).abs() <= tolerance)
                    .copied()
                    .collect::<Vec<_>>();
                match matching.as_slice() {
                    [] => *last,
                    [only] => *only,
                    several => {
                        let wanted = if delta.is_sign_negative() {
                            ColumnHint::Debit
                        } else {
                            ColumnHint::Credit
                        };
                        several
                            .iter()
                            .rev()
                            .find(|candidate| candidate.hint == wanted)
                            .copied()
                            .unwrap_or(*last)
                    }
                }
            }
        },
    };

    Some((chosen.value.abs(), chosen.hint))
}

fn infer_date_format(
    outcomes: &[RowOutcome],
    matcher: &DateMatcher,
    settings: &AssembleSettings<'_>,
) -> Option<String> {
    if let Some(hint) = settings.date_format_hint {
        return Some(hint.to_string());
    }

    let tokens = outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            RowOutcome::Entry(row) => row.fields.iter().find_map(|field| match field {
                NormalizedField::Date { raw, .. } => Some(raw.as_str()),
                _ => None,
            }),
            _ => None,
        })
        .take(settings.inference_window);
    matcher.infer_format(tokens).map(ToString::to_string)
}

/// Opening balance printed on the statement ahead of the first entry.
pub(crate) fn printed_opening(outcomes: &[RowOutcome]) -> Option<Decimal> {
    outcomes
        .iter()
        .take_while(|outcome| !matches!(outcome, RowOutcome::Entry(_)))
        .find_map(|outcome| match outcome {
            RowOutcome::Marker {
                kind: MarkerKind::Opening,
                balance,
                ..
            } => Some(*balance),
            _ => None,
        })
}

pub(crate) fn assemble(
    outcomes: &[RowOutcome],
    matcher: &DateMatcher,
    settings: &AssembleSettings<'_>,
) -> Assembly {
    let date_format = infer_date_format(outcomes, matcher, settings);
    debug!(format = ?date_format, "statement date format");

    let mut drafts: Vec<DraftTransaction> = Vec::new();
    let mut warnings = Vec::new();
    let mut chain = Chain::Start;

    for outcome in outcomes {
        match outcome {
            RowOutcome::Entry(row) => {
                let mut raw_date = None;
                let mut description = String::new();
                let mut candidates = Vec::new();
                let mut balance = None;
                for field in &row.fields {
                    match field {
                        NormalizedField::Date { raw, .. } => raw_date = Some(raw.as_str()),
                        NormalizedField::Description(text) => description.clone_from(text),
                        NormalizedField::AmountCandidate { value, hint } => {
                            candidates.push(Candidate {
                                value: *value,
                                hint: *hint,
                            });
                        }
                        NormalizedField::Balance(value) => balance = Some(*value),
                    }
                }

                let (Some(raw_date), Some(balance)) = (raw_date, balance) else {
                    warnings.push(reject(row, "row lost its date or balance"));
                    chain = Chain::Broken;
                    continue;
                };
                let Some(date) = date_format
                    .as_deref()
                    .and_then(|format| parse_date(format, raw_date))
                else {
                    warnings.push(reject(
                        row,
                        format!(
                            "date '{raw_date}' does not match the statement date format {}",
                            date_format.as_deref().unwrap_or("(none)")
                        ),
                    ));
                    chain = Chain::Broken;
                    continue;
                };

                let previous_balance = drafts
                    .last()
                    .map(|draft| draft.balance_after)
                    .or(settings.opening_balance);
                let Some((amount_magnitude, column_hint)) =
                    resolve_amount(&candidates, previous_balance, balance, settings.tolerance)
                else {
                    warnings.push(reject(row, "row has a balance but no transaction amount"));
                    chain = Chain::Broken;
                    continue;
                };

                drafts.push(DraftTransaction {
                    sequence_index: drafts.len(),
                    date,
                    description,
                    amount_magnitude,
                    balance_after: balance,
                    source_page: row.page,
                    column_hint,
                });
                chain = Chain::Open;
            }
            RowOutcome::Continuation { page, line, text } => match (chain, drafts.last_mut()) {
                (Chain::Open, Some(last)) => {
                    if !last.description.is_empty() {
                        last.description.push(' ');
                    }
                    last.description.push_str(text);
                }
                (Chain::Broken, _) => warnings.push(
                    ConvertWarning::new(
                        WarningCode::OrphanContinuation,
                        format!("wrapped text '{text}' follows a rejected row"),
                    )
                    .with_page(*page)
                    .with_line(*line),
                ),
                _ => debug!(page, line, "skipping text ahead of the first transaction"),
            },
            RowOutcome::Marker {
                page,
                line,
                balance,
                ..
            } => {
                if let Some(last) = drafts.last()
                    && (last.balance_after - *balance).abs() > settings.tolerance
                {
                    warnings.push(
                        ConvertWarning::new(
                            WarningCode::CarriedBalanceDisagreement,
                            format!(
                                "carried balance {balance} differs from running balance {}",
                                last.balance_after
                            ),
                        )
                        .with_page(*page)
                        .with_line(*line)
                        .with_sequence_index(last.sequence_index),
                    );
                }
            }
            RowOutcome::Noise { warning, .. } => {
                if let Some(warning) = warning {
                    warnings.push(warning.clone());
                    chain = Chain::Broken;
                }
            }
        }
    }

    debug!(drafts = drafts.len(), warnings = warnings.len(), "assembled drafts");
    Assembly {
        drafts,
        date_format,
        warnings,
    }
}
