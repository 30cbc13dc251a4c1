//! Free-text query builder.
//!
//! A single unambiguous temporal anchor (one month and/or one year) narrows
//! the search to those tokens with `searchMode=all`. No anchors, or more than
//! one of a kind, searches the raw query with `searchMode=any`.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{FreeTextSearchRequest, SearchMode};

pub const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

static MONTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b({})\b", MONTHS.join("|"))).expect("month regex is valid")
});

static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(20\d{2})\b").expect("year regex is valid"));

/// Temporal anchors found in a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemporalAnchors {
    /// Distinct month names, in calendar order.
    pub months: Vec<&'static str>,
    /// Every year match, in order of appearance (duplicates kept).
    pub years: Vec<String>,
}

impl TemporalAnchors {
    pub fn extract(query: &str) -> Self {
        let lower = query.to_lowercase();

        let month_idx: BTreeSet<usize> = MONTH_RE
            .find_iter(&lower)
            .filter_map(|m| MONTHS.iter().position(|name| *name == m.as_str()))
            .collect();
        let months = month_idx.into_iter().map(|i| MONTHS[i]).collect();

        let years = YEAR_RE
            .find_iter(&lower)
            .map(|m| m.as_str().to_string())
            .collect();

        Self { months, years }
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty() && self.years.is_empty()
    }

    /// At most one month and at most one year.
    pub fn is_unambiguous(&self) -> bool {
        self.months.len() <= 1 && self.years.len() <= 1
    }

    fn tokens(&self) -> Vec<&str> {
        self.months
            .iter()
            .copied()
            .chain(self.years.iter().map(String::as_str))
            .collect()
    }
}

/// Builds `{search, searchMode}` requests.
pub struct FreeTextQueryBuilder;

impl FreeTextQueryBuilder {
    pub fn build(query: &str) -> FreeTextSearchRequest {
        let anchors = TemporalAnchors::extract(query);

        if anchors.is_empty() || !anchors.is_unambiguous() {
            return FreeTextSearchRequest {
                search_text: query.to_string(),
                search_mode: SearchMode::Any,
            };
        }

        FreeTextSearchRequest {
            search_text: anchors.tokens().join(" "),
            search_mode: SearchMode::All,
        }
    }
}
