use chrono::{Datelike, NaiveDate};

const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2200;

/// Parses `token` under one strftime pattern, rejecting implausible years.
pub(crate) fn parse_date(pattern: &str, token: &str) -> Option<NaiveDate> {
    let date = NaiveDate::parse_from_str(token.trim(), pattern).ok()?;
    (MIN_YEAR..=MAX_YEAR).contains(&date.year()).then_some(date)
}

#[derive(Debug, Clone)]
pub(crate) struct DateMatcher {
    patterns: Vec<String>,
}

impl DateMatcher {
    pub(crate) fn new(patterns: &[&str]) -> Self {
        Self {
            patterns: patterns.iter().map(ToString::to_string).collect(),
        }
    }

    /// First pattern (in configured order) that accepts the token.
    pub(crate) fn find(&self, token: &str) -> Option<NaiveDate> {
        self.patterns
            .iter()
            .find_map(|pattern| parse_date(pattern, token))
    }

    /// The pattern accepting the most tokens; earlier patterns win ties.
    pub(crate) fn infer_format<'a>(
        &self,
        tokens: impl IntoIterator<Item = &'a str>,
    ) -> Option<&str> {
        let tokens = tokens.into_iter().collect::<Vec<_>>();
        if tokens.is_empty() {
            return None;
        }

        let mut best: Option<(&str, usize)> = None;
        for pattern in &self.patterns {
            let hits = tokens
                .iter()
                .filter(|token| parse_date(pattern, token).is_some())
                .count();
            if hits == 0 {
                continue;
            }
            if best.is_none_or(|(_, best_hits)| hits > best_hits) {
                best = Some((pattern.as_str(), hits));
            }
        }
        best.map(|(pattern, _)| pattern)
    }
}
