use std::str::FromStr;

use regex::Regex;
use rust_decimal::Decimal;

use crate::error::ConvertError;
use crate::model::ColumnHint;
use crate::options::DecimalConvention;

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥', '₹'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ParsedAmount {
    /// Signed value; negative only when the token carried an explicit debit marker.
    pub value: Decimal,
    pub hint: ColumnHint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NumericToken {
    Amount(ParsedAmount),
    /// Shaped like an amount but not a valid one under the configured convention.
    Malformed,
    Text,
}

#[derive(Debug, Clone)]
pub(crate) struct AmountParser {
    convention: DecimalConvention,
    body: Regex,
}

fn strip_marker<'a>(token: &'a str, marker: &str) -> Option<&'a str> {
    let split = token.len().checked_sub(marker.len())?;
    if split == 0 || !token.is_char_boundary(split) {
        return None;
    }
    let (head, tail) = token.split_at(split);
    tail.eq_ignore_ascii_case(marker).then_some(head)
}

impl AmountParser {
    pub(crate) fn new(convention: DecimalConvention) -> Result<Self, ConvertError> {
        let thousands = regex::escape(&convention.thousands.to_string());
        let decimal = regex::escape(&convention.decimal.to_string());
        let pattern = format!(r"^(?:\d{{1,3}}(?:{thousands}\d{{3}})+|\d+){decimal}\d{{2}}$");
        let body = Regex::new(&pattern).map_err(|error| {
            ConvertError::configuration(format!("unusable decimal convention: {error}"))
        })?;
        Ok(Self { convention, body })
    }

    /// A standalone `CR`/`DR` word that belongs to the amount before it.
    /// A lone `-` is left alone since statements use it for empty columns.
    pub(crate) fn is_sign_marker(word: &str) -> bool {
        word.eq_ignore_ascii_case("cr") || word.eq_ignore_ascii_case("dr")
    }

    pub(crate) fn classify(&self, token: &str) -> NumericToken {
        let mut body = token.trim();
        let mut negative = false;
        let mut hint = ColumnHint::Unknown;

        if let Some(head) = strip_marker(body, "cr") {
            body = head.trim_end();
            hint = ColumnHint::Credit;
        } else if let Some(head) = strip_marker(body, "dr") {
            body = head.trim_end();
            negative = true;
        } else if let Some(head) = body.strip_suffix('-') {
            body = head.trim_end();
            negative = true;
        } else if let Some(head) = body.strip_suffix('+') {
            body = head.trim_end();
            hint = ColumnHint::Credit;
        }

        if let Some(inner) = body.strip_prefix('(').and_then(|rest| rest.strip_suffix(')')) {
            body = inner.trim();
            negative = true;
        }
        if let Some(rest) = body.strip_prefix('-') {
            body = rest;
            negative = true;
        } else if let Some(rest) = body.strip_prefix('+') {
            body = rest;
            hint = ColumnHint::Credit;
        }
        body = body.trim_start_matches(CURRENCY_SYMBOLS).trim();

        if !body.chars().any(|ch| ch.is_ascii_digit()) {
            return NumericToken::Text;
        }
        if !self.body.is_match(body) {
            return if self.looks_numeric(body) {
                NumericToken::Malformed
            } else {
                NumericToken::Text
            };
        }

        let canonical = body
            .chars()
            .filter(|ch| *ch != self.convention.thousands)
            .map(|ch| if ch == self.convention.decimal { '.' } else { ch })
            .collect::<String>();
        let Ok(magnitude) = Decimal::from_str(&canonical) else {
            return NumericToken::Malformed;
        };

        let value = if negative { -magnitude } else { magnitude };
        if negative {
            hint = ColumnHint::Debit;
        }
        NumericToken::Amount(ParsedAmount { value, hint })
    }

    fn looks_numeric(&self, body: &str) -> bool {
        let DecimalConvention { decimal, thousands } = self.convention;
        body.contains(decimal)
            && body.starts_with(|ch: char| ch.is_ascii_digit())
            && body.ends_with(|ch: char| ch.is_ascii_digit())
            && body
                .chars()
                .all(|ch| ch.is_ascii_digit() || ch == decimal || ch == thousands)
    }
}
