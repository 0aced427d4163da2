use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::format::{Fixed, Item, Numeric, StrftimeItems};
use rust_decimal::Decimal;

use crate::error::ConvertError;

pub const DEFAULT_DATE_FORMATS: &[&str] = &[
    "%d-%m-%Y", "%d/%m/%Y", "%m/%d/%Y", "%Y-%m-%d", "%d.%m.%Y", "%d %b %Y", "%d-%b-%Y",
    "%d %b %y", "%d-%b-%y",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSelection {
    pages: BTreeSet<u32>,
}

impl PageSelection {
    #[must_use]
    pub fn contains(&self, page: u32) -> bool {
        self.pages.contains(&page)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

fn parse_page_set(input: &str) -> Result<BTreeSet<u32>, String> {
    let mut pages = BTreeSet::new();
    for token in input.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if let Some((start, end)) = token.split_once('-') {
            let start: u32 = start
                .trim()
                .parse()
                .map_err(|_| format!("invalid page range start: '{start}'"))?;
            let end: u32 = end
                .trim()
                .parse()
                .map_err(|_| format!("invalid page range end: '{end}'"))?;
            if start == 0 || end == 0 {
                return Err("pages are 1-based".to_string());
            }
            if end < start {
                return Err(format!(
                    "invalid range '{token}': end is smaller than start"
                ));
            }
            pages.extend(start..=end);
        } else {
            let page: u32 = token
                .parse()
                .map_err(|_| format!("invalid page number: '{token}'"))?;
            if page == 0 {
                return Err("pages are 1-based".to_string());
            }
            pages.insert(page);
        }
    }

    if pages.is_empty() {
        return Err("page selection cannot be empty".to_string());
    }

    Ok(pages)
}

impl FromStr for PageSelection {
    type Err = ConvertError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        parse_page_set(input)
            .map(|pages| Self { pages })
            .map_err(ConvertError::InvalidPageSelection)
    }
}

/// Decimal and thousands separators used by amount tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalConvention {
    pub decimal: char,
    pub thousands: char,
}

impl Default for DecimalConvention {
    fn default() -> Self {
        Self {
            decimal: '.',
            thousands: ',',
        }
    }
}

impl DecimalConvention {
    pub(crate) fn validate(self) -> Result<(), ConvertError> {
        if self.decimal == self.thousands {
            return Err(ConvertError::configuration(format!(
                "decimal and thousands separators must differ (both '{}')",
                self.decimal
            )));
        }
        for separator in [self.decimal, self.thousands] {
            if separator.is_ascii_digit() || matches!(separator, '-' | '+' | '(' | ')') {
                return Err(ConvertError::configuration(format!(
                    "'{separator}' cannot be used as a number separator"
                )));
            }
        }
        if self.decimal.is_whitespace() {
            return Err(ConvertError::configuration(
                "the decimal separator cannot be whitespace",
            ));
        }
        Ok(())
    }
}

impl FromStr for DecimalConvention {
    type Err = ConvertError;

    /// Accepts `dot` (1,234.56), `comma` (1.234,56) or two characters
    /// `<thousands><decimal>` such as `" ,"` or `"'."`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "dot" | "point" => return Ok(Self::default()),
            "comma" => {
                return Ok(Self {
                    decimal: ',',
                    thousands: '.',
                });
            }
            _ => {}
        }

        let chars = input.chars().collect::<Vec<_>>();
        let [thousands, decimal] = chars.as_slice() else {
            return Err(ConvertError::configuration(format!(
                "invalid decimal convention '{input}', expected dot, comma or <thousands><decimal>"
            )));
        };
        Ok(Self {
            decimal: *decimal,
            thousands: *thousands,
        })
    }
}

/// How a declared opening balance interacts with the first statement row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpeningBalancePolicy {
    /// Seed the running balance with the declared value; a first row that
    /// does not reconcile against it is recorded as a mismatch.
    Reconcile,
    /// Infer the opening balance from the first row; a differing declared
    /// value only produces a warning.
    TrustFirstRow,
}

/// Decision used when neither sign reproduces the balance delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TieBreakPolicy {
    ColumnHintThenNearest,
    NearestOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvertOptions {
    pub pages: Option<PageSelection>,
    pub date_formats: Vec<String>,
    pub date_format_hint: Option<String>,
    pub date_inference_window: usize,
    pub decimal: DecimalConvention,
    pub declared_opening_balance: Option<Decimal>,
    pub opening_balance_policy: OpeningBalancePolicy,
    pub tie_break: TieBreakPolicy,
    pub mismatch_tolerance: Decimal,
    pub max_pages: usize,
    pub max_rows: usize,
    pub delimiter: u8,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            pages: None,
            date_formats: DEFAULT_DATE_FORMATS
                .iter()
                .map(ToString::to_string)
                .collect(),
            date_format_hint: None,
            date_inference_window: 20,
            decimal: DecimalConvention::default(),
            declared_opening_balance: None,
            opening_balance_policy: OpeningBalancePolicy::Reconcile,
            tie_break: TieBreakPolicy::ColumnHintThenNearest,
            mismatch_tolerance: Decimal::new(1, 2),
            max_pages: 2_000,
            max_rows: 200_000,
            delimiter: b',',
        }
    }
}

impl ConvertOptions {
    /// Rejects unusable settings before any page is processed.
    pub fn validate(&self) -> Result<(), ConvertError> {
        if self.date_formats.is_empty() && self.date_format_hint.is_none() {
            return Err(ConvertError::configuration(
                "at least one date format is required",
            ));
        }
        for pattern in self.date_format_hint.iter().chain(&self.date_formats) {
            validate_date_pattern(pattern)?;
        }
        self.decimal.validate()?;

        if self.mismatch_tolerance.is_sign_negative() {
            return Err(ConvertError::configuration(format!(
                "mismatch tolerance must not be negative (got {})",
                self.mismatch_tolerance
            )));
        }
        if self.date_inference_window == 0 {
            return Err(ConvertError::configuration(
                "date inference window must be at least 1",
            ));
        }
        if self.max_pages == 0 || self.max_rows == 0 {
            return Err(ConvertError::configuration(
                "page and row ceilings must be at least 1",
            ));
        }
        Ok(())
    }

    /// Patterns in the order date tokens are tried; the hint goes first.
    pub(crate) fn date_patterns(&self) -> Vec<&str> {
        let mut patterns = Vec::with_capacity(self.date_formats.len() + 1);
        if let Some(hint) = &self.date_format_hint {
            patterns.push(hint.as_str());
        }
        for pattern in &self.date_formats {
            if !patterns.contains(&pattern.as_str()) {
                patterns.push(pattern.as_str());
            }
        }
        patterns
    }
}

fn validate_date_pattern(pattern: &str) -> Result<(), ConvertError> {
    let mut has_day = false;
    let mut has_month = false;
    let mut has_year = false;

    for item in StrftimeItems::new(pattern) {
        match item {
            Item::Error => {
                return Err(ConvertError::configuration(format!(
                    "unparseable date format '{pattern}'"
                )));
            }
            Item::Numeric(Numeric::Day, _) => has_day = true,
            Item::Numeric(Numeric::Month, _)
            | Item::Fixed(Fixed::ShortMonthName | Fixed::LongMonthName) => has_month = true,
            Item::Numeric(Numeric::Year | Numeric::YearMod100, _) => has_year = true,
            _ => {}
        }
    }

    if !(has_day && has_month && has_year) {
        return Err(ConvertError::configuration(format!(
            "date format '{pattern}' must contain a day, a month and a year"
        )));
    }
    Ok(())
}
