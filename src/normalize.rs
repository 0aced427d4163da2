use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::amount::{AmountParser, NumericToken, ParsedAmount};
use crate::dates::DateMatcher;
use crate::model::{ColumnHint, RawRow};
use crate::warning::{ConvertWarning, WarningCode};

const DEBIT_LABELS: &[&str] = &["debit", "withdrawal", "paid out", "money out", "dr"];
const CREDIT_LABELS: &[&str] = &["credit", "deposit", "paid in", "money in", "cr"];
const BALANCE_LABELS: &[&str] = &["balance", "running balance"];

const OPENING_MARKERS: &[&str] = &[
    "opening balance",
    "brought forward",
    "b/f",
    "previous balance",
    "beginning balance",
];
const CLOSING_MARKERS: &[&str] = &[
    "closing balance",
    "carried forward",
    "c/f",
    "ending balance",
];

const FURNITURE_PREFIXES: &[&str] = &[
    "continued",
    "statement of account",
    "this is a computer generated",
];

/// One recognised piece of a statement row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NormalizedField {
    Date { raw: String, value: NaiveDate },
    Description(String),
    AmountCandidate { value: Decimal, hint: ColumnHint },
    Balance(Decimal),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NormalizedRow {
    pub page: u32,
    pub line: usize,
    pub fields: Vec<NormalizedField>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MarkerKind {
    Opening,
    Closing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RowOutcome {
    /// A row carrying a date and a running balance.
    Entry(NormalizedRow),
    /// Wrapped description text for the previous entry.
    Continuation { page: u32, line: usize, text: String },
    /// An opening/closing balance line; never a transaction.
    Marker {
        page: u32,
        line: usize,
        kind: MarkerKind,
        balance: Decimal,
    },
    Noise {
        page: u32,
        line: usize,
        warning: Option<ConvertWarning>,
    },
}

/// Horizontal centres (doubled) of the labelled amount columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct ColumnLayout {
    debit: Option<usize>,
    credit: Option<usize>,
    balance: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LayoutColumn {
    Debit,
    Credit,
    Balance,
}

fn header_label(text: &str) -> Option<LayoutColumn> {
    let label = text
        .to_lowercase()
        .chars()
        .filter(|ch| !matches!(ch, '(' | ')' | '.' | ':' | '*'))
        .collect::<String>();
    let label = label.trim();
    let matches = |labels: &[&str]| {
        labels.iter().any(|candidate| {
            label == *candidate
                || label
                    .strip_prefix(candidate)
                    .is_some_and(|rest| {
                        rest.starts_with(|ch: char| ch.is_whitespace() || ch == 's')
                    })
        })
    };

    if matches(BALANCE_LABELS) {
        Some(LayoutColumn::Balance)
    } else if matches(DEBIT_LABELS) {
        Some(LayoutColumn::Debit)
    } else if matches(CREDIT_LABELS) {
        Some(LayoutColumn::Credit)
    } else {
        None
    }
}

impl ColumnLayout {
    /// Recognises a column header row naming at least two of the
    /// debit/credit/balance columns.
    fn detect(row: &RawRow) -> Option<Self> {
        let mut layout = Self::default();
        let mut found = 0;
        for cell in &row.cells {
            let slot = match header_label(&cell.text) {
                Some(LayoutColumn::Debit) => &mut layout.debit,
                Some(LayoutColumn::Credit) => &mut layout.credit,
                Some(LayoutColumn::Balance) => &mut layout.balance,
                None => continue,
            };
            if slot.is_none() {
                *slot = Some(cell.centre2());
                found += 1;
            }
        }
        (found >= 2).then_some(layout)
    }

    fn nearest(&self, centre2: usize) -> Option<LayoutColumn> {
        [
            (LayoutColumn::Debit, self.debit),
            (LayoutColumn::Credit, self.credit),
            (LayoutColumn::Balance, self.balance),
        ]
        .into_iter()
        .filter_map(|(column, position)| {
            position.map(|position| (column, position.abs_diff(centre2)))
        })
        .min_by_key(|(_, distance)| *distance)
        .map(|(column, _)| column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Word {
    text: String,
    cell: usize,
    centre2: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WordKind {
    Text,
    Date,
    Amount,
    Consumed,
}

fn words_of(row: &RawRow) -> Vec<Word> {
    let mut words = Vec::new();
    for (cell_index, cell) in row.cells.iter().enumerate() {
        let chars = cell.text.chars().collect::<Vec<_>>();
        let positional = cell.width == chars.len();
        let mut push = |start: usize, end: usize| {
            let centre2 = if positional {
                (cell.column + start) * 2 + (end - start)
            } else {
                cell.centre2()
            };
            words.push(Word {
                text: chars[start..end].iter().collect(),
                cell: cell_index,
                centre2,
            });
        };

        let mut start = None;
        for (index, ch) in chars.iter().enumerate() {
            if ch.is_whitespace() {
                if let Some(begin) = start.take() {
                    push(begin, index);
                }
            } else if start.is_none() {
                start = Some(index);
            }
        }
        if let Some(begin) = start {
            push(begin, chars.len());
        }
    }
    words
}

fn marker_kind(description: &str) -> Option<MarkerKind> {
    // Whole-word matching so "SUB/FEE" does not read as "b/f".
    let padded = format!(
        " {} ",
        description
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    );
    let mentions = |markers: &[&str]| {
        markers
            .iter()
            .any(|marker| padded.contains(&format!(" {marker} ")))
    };
    if mentions(OPENING_MARKERS) {
        Some(MarkerKind::Opening)
    } else if mentions(CLOSING_MARKERS) {
        Some(MarkerKind::Closing)
    } else {
        None
    }
}

fn is_page_furniture(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    if FURNITURE_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
    {
        return true;
    }

    // "Page 3" / "Page 3 of 7"
    let tokens = lower.split_whitespace().collect::<Vec<_>>();
    let is_number = |token: &&str| token.chars().all(|ch| ch.is_ascii_digit());
    match tokens.as_slice() {
        ["page", n] => is_number(n),
        ["page", n, "of", m] => is_number(n) && is_number(m),
        _ => false,
    }
}

/// Maps raw rows to normalized fields. Keeps the most recent column header
/// layout so that later rows can be given column hints.
#[derive(Debug, Clone)]
pub(crate) struct Normalizer {
    amounts: AmountParser,
    dates: DateMatcher,
    layout: Option<ColumnLayout>,
    /// Page of the last entry or wrapped line, cleared by markers and
    /// rejected rows.
    entry_page: Option<u32>,
}

impl Normalizer {
    pub(crate) fn new(amounts: AmountParser, dates: DateMatcher) -> Self {
        Self {
            amounts,
            dates,
            layout: None,
            entry_page: None,
        }
    }

    fn find_date(&self, words: &[Word], kinds: &mut [WordKind]) -> Option<(String, NaiveDate)> {
        for start in 0..words.len() {
            for size in (1..=3).rev() {
                let end = start + size;
                if end > words.len()
                    || words[start..end]
                        .iter()
                        .any(|word| word.cell != words[start].cell)
                {
                    continue;
                }
                let raw = words[start..end]
                    .iter()
                    .map(|word| word.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                if let Some(value) = self.dates.find(&raw) {
                    kinds[start..end].fill(WordKind::Date);
                    return Some((raw, value));
                }
            }
        }
        None
    }

    fn hint_for(&self, parsed: ParsedAmount, centre2: usize, slot: usize, of: usize) -> ColumnHint {
        if parsed.hint != ColumnHint::Unknown {
            return parsed.hint;
        }
        if let Some(layout) = &self.layout {
            return match layout.nearest(centre2) {
                Some(LayoutColumn::Debit) => ColumnHint::Debit,
                Some(LayoutColumn::Credit) => ColumnHint::Credit,
                Some(LayoutColumn::Balance) | None => ColumnHint::Unknown,
            };
        }
        match (of, slot) {
            (2, 0) => ColumnHint::Debit,
            (2, 1) => ColumnHint::Credit,
            _ => ColumnHint::Unknown,
        }
    }

    /// The lone numeric token of a row is an amount rather than a balance
    /// when the header layout places it under a debit or credit column.
    fn sits_in_amount_column(&self, centre2: usize) -> bool {
        self.layout.as_ref().is_some_and(|layout| {
            layout.balance.is_some()
                && matches!(
                    layout.nearest(centre2),
                    Some(LayoutColumn::Debit | LayoutColumn::Credit)
                )
        })
    }

    pub(crate) fn normalize(&mut self, row: &RawRow) -> RowOutcome {
        let outcome = self.normalize_row(row);
        match &outcome {
            RowOutcome::Entry(_) | RowOutcome::Continuation { .. } => {
                self.entry_page = Some(row.page);
            }
            RowOutcome::Marker { .. } | RowOutcome::Noise { warning: Some(_), .. } => {
                self.entry_page = None;
            }
            RowOutcome::Noise { warning: None, .. } => {}
        }
        outcome
    }

    fn normalize_row(&mut self, row: &RawRow) -> RowOutcome {
        let (page, line) = (row.page, row.line);
        let noise = |warning: Option<ConvertWarning>| RowOutcome::Noise {
            page,
            line,
            warning,
        };

        let words = words_of(row);
        let mut kinds = vec![WordKind::Text; words.len()];
        let date = self.find_date(&words, &mut kinds);

        let mut numerics: Vec<(usize, ParsedAmount)> = Vec::new();
        let mut malformed = None;
        for index in 0..words.len() {
            if kinds[index] != WordKind::Text || self.dates.find(&words[index].text).is_some() {
                continue;
            }
            match self.amounts.classify(&words[index].text) {
                NumericToken::Amount(mut parsed) => {
                    if let Some(next) = words.get(index + 1)
                        && kinds[index + 1] == WordKind::Text
                        && AmountParser::is_sign_marker(&next.text)
                        && let NumericToken::Amount(marked) = self
                            .amounts
                            .classify(&format!("{} {}", words[index].text, next.text))
                    {
                        parsed = marked;
                        kinds[index + 1] = WordKind::Consumed;
                    }
                    kinds[index] = WordKind::Amount;
                    numerics.push((index, parsed));
                }
                NumericToken::Malformed => {
                    malformed.get_or_insert(index);
                }
                NumericToken::Text => {}
            }
        }

        if let Some(index) = malformed {
            let warning = (date.is_some() || !numerics.is_empty()).then(|| {
                ConvertWarning::new(
                    WarningCode::RowRejected,
                    format!("unparseable numeric token '{}'", words[index].text),
                )
                .with_page(page)
                .with_line(line)
            });
            return noise(warning);
        }

        if date.is_none() && numerics.is_empty() {
            if let Some(layout) = ColumnLayout::detect(row) {
                self.layout = Some(layout);
                return noise(None);
            }
        }

        let balance = match numerics.as_slice() {
            [] => None,
            [(index, _)] if self.sits_in_amount_column(words[*index].centre2) => None,
            [.., (_, last)] => Some(last.value),
        };
        if balance.is_some() {
            numerics.pop();
        }
        // Only the two numeric tokens nearest the balance can be amounts.
        while numerics.len() > 2 {
            let (index, _) = numerics.remove(0);
            kinds[index] = WordKind::Text;
        }

        let description = words
            .iter()
            .zip(&kinds)
            .filter(|(word, kind)| {
                **kind == WordKind::Text && !word.text.chars().all(|ch| ch == '-')
            })
            .map(|(word, _)| word.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        match (date, balance) {
            (date, Some(balance)) => {
                // A row with its own amount is a transaction even when its
                // text mentions a brought forward or previous balance.
                if numerics.is_empty()
                    && let Some(kind) = marker_kind(&description)
                {
                    return RowOutcome::Marker {
                        page,
                        line,
                        kind,
                        balance,
                    };
                }
                let Some((raw, value)) = date else {
                    return noise(None);
                };

                let count = numerics.len();
                let mut fields = Vec::with_capacity(count + 3);
                fields.push(NormalizedField::Date { raw, value });
                fields.push(NormalizedField::Description(description));
                for (slot, (index, parsed)) in numerics.into_iter().enumerate() {
                    fields.push(NormalizedField::AmountCandidate {
                        value: parsed.value,
                        hint: self.hint_for(parsed, words[index].centre2, slot, count),
                    });
                }
                fields.push(NormalizedField::Balance(balance));
                RowOutcome::Entry(NormalizedRow { page, line, fields })
            }
            (Some(_), None) => {
                if numerics.is_empty() && !description.is_empty() {
                    RowOutcome::Continuation {
                        page,
                        line,
                        text: description,
                    }
                } else {
                    noise(Some(
                        ConvertWarning::new(
                            WarningCode::RowRejected,
                            "dated row has no running balance",
                        )
                        .with_page(page)
                        .with_line(line),
                    ))
                }
            }
            (None, None) => {
                // Text split over several cells only wraps an entry on the same page.
                let wrapped = numerics.is_empty()
                    && (row.cells.len() == 1 || self.entry_page == Some(page))
                    && !description.is_empty()
                    && !is_page_furniture(&description)
                    && marker_kind(&description).is_none();
                if wrapped {
                    RowOutcome::Continuation {
                        page,
                        line,
                        text: description,
                    }
                } else {
                    noise(None)
                }
            }
        }
    }
}
