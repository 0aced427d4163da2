use rust_decimal::Decimal;

use crate::model::{BalanceMismatch, ClassifiedTransaction, ReconciliationSummary, TransactionKind};

/// Aggregates classified transactions. Mismatches are carried through and
/// flag the summary for review; they never turn into an error.
#[must_use]
pub fn summarize(
    transactions: &[ClassifiedTransaction],
    balance_mismatches: Vec<BalanceMismatch>,
) -> ReconciliationSummary {
    let (total_credit, total_debit) = transactions.iter().fold(
        (Decimal::ZERO, Decimal::ZERO),
        |(credit, debit), transaction| match transaction.kind {
            TransactionKind::Credit => (credit + transaction.signed_amount, debit),
            TransactionKind::Debit => (credit, debit + transaction.signed_amount.abs()),
        },
    );

    let opening_balance = transactions.first().map_or(Decimal::ZERO, |first| {
        first.draft.balance_after - first.signed_amount
    });
    let closing_balance = transactions
        .last()
        .map_or(Decimal::ZERO, |last| last.draft.balance_after);

    ReconciliationSummary {
        total_transactions: transactions.len(),
        total_credit,
        total_debit,
        opening_balance,
        closing_balance,
        needs_review: !balance_mismatches.is_empty(),
        balance_mismatches,
    }
}
