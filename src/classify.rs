//! Debit/credit inference from consecutive running balances.
//!
//! A single left-to-right pass: each transaction is compared with the
//! balance left by the one before it. When neither `+amount` nor `-amount`
//! reproduces the movement, [`break_tie`] decides and the row is recorded as
//! a mismatch. The pass never fails.

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::model::{
    BalanceMismatch, ClassifiedTransaction, ColumnHint, DraftTransaction, TransactionKind,
};
use crate::options::{OpeningBalancePolicy, TieBreakPolicy};
use crate::warning::{ConvertWarning, WarningCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifySettings {
    pub declared_opening: Option<Decimal>,
    pub opening_policy: OpeningBalancePolicy,
    pub tie_break: TieBreakPolicy,
    pub tolerance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Classification {
    pub transactions: Vec<ClassifiedTransaction>,
    pub mismatches: Vec<BalanceMismatch>,
    pub warnings: Vec<ConvertWarning>,
}

/// Balance before the first transaction when nothing was declared. The
/// first row is assumed to be a credit unless its column says debit.
fn inferred_opening(first: &DraftTransaction) -> Decimal {
    match first.column_hint {
        ColumnHint::Debit => first.balance_after + first.amount_magnitude,
        ColumnHint::Credit | ColumnHint::Unknown => first.balance_after - first.amount_magnitude,
    }
}

/// Sign choice for a row whose amount does not explain the balance movement.
fn break_tie(
    delta: Decimal,
    draft: &DraftTransaction,
    policy: TieBreakPolicy,
) -> (TransactionKind, Decimal) {
    let magnitude = draft.amount_magnitude;
    if policy == TieBreakPolicy::ColumnHintThenNearest {
        match draft.column_hint {
            ColumnHint::Debit => return (TransactionKind::Debit, -magnitude),
            ColumnHint::Credit => return (TransactionKind::Credit, magnitude),
            ColumnHint::Unknown => {}
        }
    }

    if (delta - magnitude).abs() <= (delta + magnitude).abs() {
        (TransactionKind::Credit, magnitude)
    } else {
        (TransactionKind::Debit, -magnitude)
    }
}

pub fn classify(drafts: Vec<DraftTransaction>, settings: &ClassifySettings) -> Classification {
    let Some(first) = drafts.first() else {
        return Classification::default();
    };

    let mut warnings = Vec::new();
    let inferred = inferred_opening(first);
    let mut prev_balance = match (settings.declared_opening, settings.opening_policy) {
        (Some(declared), OpeningBalancePolicy::Reconcile) => declared,
        (Some(declared), OpeningBalancePolicy::TrustFirstRow) => {
            if (declared - inferred).abs() > settings.tolerance {
                warnings.push(
                    ConvertWarning::new(
                        WarningCode::OpeningBalanceDisagreement,
                        format!(
                            "declared opening balance {declared} differs from {inferred} implied by the first row"
                        ),
                    )
                    .with_page(first.source_page)
                    .with_sequence_index(first.sequence_index),
                );
            }
            inferred
        }
        (None, _) => inferred,
    };

    let tolerance = settings.tolerance;
    let mut transactions = Vec::with_capacity(drafts.len());
    let mut mismatches = Vec::new();

    for draft in drafts {
        let magnitude = draft.amount_magnitude;
        let delta = draft.balance_after - prev_balance;

        let (kind, signed_amount) = if (delta - magnitude).abs() <= tolerance {
            (TransactionKind::Credit, magnitude)
        } else if (delta + magnitude).abs() <= tolerance {
            (TransactionKind::Debit, -magnitude)
        } else {
            let (kind, signed_amount) = break_tie(delta, &draft, settings.tie_break);
            let mismatch = BalanceMismatch {
                sequence_index: draft.sequence_index,
                expected: prev_balance + signed_amount,
                actual: draft.balance_after,
            };
            warn!(
                sequence_index = mismatch.sequence_index,
                expected = %mismatch.expected,
                actual = %mismatch.actual,
                "running balance does not reconcile"
            );
            mismatches.push(mismatch);
            (kind, signed_amount)
        };

        prev_balance = draft.balance_after;
        transactions.push(ClassifiedTransaction {
            draft,
            signed_amount,
            kind,
        });
    }

    debug!(
        transactions = transactions.len(),
        mismatches = mismatches.len(),
        "classified transactions"
    );
    Classification {
        transactions,
        mismatches,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::{ClassifySettings, classify};
    use crate::model::{BalanceMismatch, ColumnHint, DraftTransaction, TransactionKind};
    use crate::options::{OpeningBalancePolicy, TieBreakPolicy};
    use crate::warning::WarningCode;

    fn dec(value: &str) -> Decimal {
        Decimal::from_str(value).expect("valid decimal")
    }

    fn draft(index: usize, amount: &str, balance: &str, hint: ColumnHint) -> DraftTransaction {
        DraftTransaction {
            sequence_index: index,
            date: NaiveDate::from_ymd_opt(2024, 2, 1).expect("valid date"),
            description: format!("row {index}"),
            amount_magnitude: dec(amount),
            balance_after: dec(balance),
            source_page: 1,
            column_hint: hint,
        }
    }

    fn settings(declared: Option<&str>) -> ClassifySettings {
        ClassifySettings {
            declared_opening: declared.map(dec),
            opening_policy: OpeningBalancePolicy::Reconcile,
            tie_break: TieBreakPolicy::ColumnHintThenNearest,
            tolerance: dec("0.01"),
        }
    }

    fn kinds(drafts: Vec<DraftTransaction>, settings: &ClassifySettings) -> Vec<TransactionKind> {
        classify(drafts, settings)
            .transactions
            .iter()
            .map(|transaction| transaction.kind)
            .collect()
    }

    #[test]
    fn credit_then_debit_from_declared_opening() {
        let drafts = vec![
            draft(0, "200.00", "1200.00", ColumnHint::Unknown),
            draft(1, "150.00", "1050.00", ColumnHint::Unknown),
        ];
        let result = classify(drafts, &settings(Some("1000.00")));
        assert!(result.mismatches.is_empty());
        assert_eq!(result.transactions[0].kind, TransactionKind::Credit);
        assert_eq!(result.transactions[1].signed_amount, dec("-150.00"));
    }

    #[test]
    fn debit_hint_seeds_inferred_opening() {
        let drafts = vec![
            draft(0, "50.00", "950.00", ColumnHint::Debit),
            draft(1, "25.00", "975.00", ColumnHint::Unknown),
        ];
        assert_eq!(
            kinds(drafts, &settings(None)),
            vec![TransactionKind::Debit, TransactionKind::Credit]
        );
    }

    #[test]
    fn column_hint_breaks_unexplained_movement() {
        let drafts = vec![
            draft(0, "100.00", "1100.00", ColumnHint::Unknown),
            draft(1, "40.00", "1000.00", ColumnHint::Credit),
        ];
        let result = classify(drafts, &settings(Some("1000.00")));
        assert_eq!(result.transactions[1].kind, TransactionKind::Credit);
        assert_eq!(
            result.mismatches,
            vec![BalanceMismatch {
                sequence_index: 1,
                expected: dec("1140.00"),
                actual: dec("1000.00"),
            }]
        );
    }

    #[test]
    fn nearest_sign_when_hint_is_unknown_or_ignored() {
        let drafts = vec![
            draft(0, "100.00", "1100.00", ColumnHint::Unknown),
            draft(1, "40.00", "1000.00", ColumnHint::Credit),
        ];
        let nearest = ClassifySettings {
            tie_break: TieBreakPolicy::NearestOnly,
            ..settings(Some("1000.00"))
        };
        let result = classify(drafts, &nearest);
        assert_eq!(result.transactions[1].kind, TransactionKind::Debit);
        assert_eq!(result.mismatches[0].expected, dec("1060.00"));
    }

    #[test]
    fn tolerance_absorbs_rounding() {
        let drafts = vec![draft(0, "10.00", "1009.995", ColumnHint::Unknown)];
        let result = classify(drafts, &settings(Some("1000.00")));
        assert!(result.mismatches.is_empty());
        assert_eq!(result.transactions[0].kind, TransactionKind::Credit);
    }

    #[test]
    fn trust_first_row_warns_about_declared_opening() {
        let drafts = vec![draft(0, "200.00", "1200.00", ColumnHint::Unknown)];
        let trusting = ClassifySettings {
            opening_policy: OpeningBalancePolicy::TrustFirstRow,
            ..settings(Some("900.00"))
        };
        let result = classify(drafts, &trusting);
        assert!(result.mismatches.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].code, WarningCode::OpeningBalanceDisagreement);
    }

    #[test]
    fn reconcile_records_first_row_mismatch_against_declared_opening() {
        let drafts = vec![draft(0, "200.00", "1200.00", ColumnHint::Unknown)];
        let result = classify(drafts, &settings(Some("900.00")));
        assert_eq!(result.mismatches.len(), 1);
        assert_eq!(result.mismatches[0].sequence_index, 0);
    }

    #[test]
    fn empty_input_classifies_to_nothing() {
        let result = classify(Vec::new(), &settings(None));
        assert!(result.transactions.is_empty());
        assert!(result.mismatches.is_empty());
    }
}
