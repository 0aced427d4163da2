use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::warning::ConvertWarning;

/// Content of one statement page as produced by the PDF decoding step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageContent {
    /// Layout-preserving text; columns are separated by runs of whitespace.
    Text(String),
    /// Pre-split table rows, one inner vector per physical line.
    Table(Vec<Vec<String>>),
    /// The page could not be decoded; the payload says why.
    Undecodable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementPage {
    pub page_number: u32,
    pub content: PageContent,
}

impl StatementPage {
    #[must_use]
    pub fn text(page_number: u32, text: impl Into<String>) -> Self {
        Self {
            page_number,
            content: PageContent::Text(text.into()),
        }
    }

    #[must_use]
    pub fn table(page_number: u32, rows: Vec<Vec<String>>) -> Self {
        Self {
            page_number,
            content: PageContent::Table(rows),
        }
    }

    #[must_use]
    pub fn undecodable(page_number: u32, reason: impl Into<String>) -> Self {
        Self {
            page_number,
            content: PageContent::Undecodable(reason.into()),
        }
    }
}

/// A text fragment and its horizontal span on the line: character offset and
/// length for text pages, cell index and a width of 1 for table pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    pub column: usize,
    pub width: usize,
}

impl Cell {
    /// Twice the horizontal centre, kept integral.
    pub(crate) fn centre2(&self) -> usize {
        self.column * 2 + self.width
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub page: u32,
    pub line: usize,
    pub cells: Vec<Cell>,
}

impl RawRow {
    pub(crate) fn joined_text(&self) -> String {
        self.cells
            .iter()
            .map(|cell| cell.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Advisory signal about which side of the ledger an amount token sat on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnHint {
    Debit,
    Credit,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Debit,
    Credit,
}

impl TransactionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftTransaction {
    pub sequence_index: usize,
    pub date: NaiveDate,
    pub description: String,
    pub amount_magnitude: Decimal,
    pub balance_after: Decimal,
    pub source_page: u32,
    #[serde(skip)]
    pub column_hint: ColumnHint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedTransaction {
    #[serde(flatten)]
    pub draft: DraftTransaction,
    pub signed_amount: Decimal,
    pub kind: TransactionKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BalanceMismatch {
    pub sequence_index: usize,
    pub expected: Decimal,
    pub actual: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationSummary {
    pub total_transactions: usize,
    pub total_credit: Decimal,
    pub total_debit: Decimal,
    pub opening_balance: Decimal,
    pub closing_balance: Decimal,
    pub balance_mismatches: Vec<BalanceMismatch>,
    /// Set when the running balance did not reconcile somewhere.
    pub needs_review: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementReport {
    pub transactions: Vec<ClassifiedTransaction>,
    pub summary: ReconciliationSummary,
    pub warnings: Vec<ConvertWarning>,
}

impl StatementReport {
    #[must_use]
    pub fn converted_with_warnings(&self) -> bool {
        !self.warnings.is_empty() || self.summary.needs_review
    }
}
