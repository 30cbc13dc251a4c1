//! Structured (sort + limit) query builder.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::keywords::KeywordClassifier;
use crate::types::StructuredSearchRequest;

static TOP_N_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:top|highest|lowest|bottom|best|worst)\s+(\d+)")
        .expect("top-n regex is valid")
});

pub const DEFAULT_TOP_N: u32 = 1;

/// Builds `{search: "*", orderby, top}` requests from aggregation keywords.
pub struct StructuredQueryBuilder;

impl StructuredQueryBuilder {
    /// Build a sorted request, or `None` when no trigger term matches.
    pub fn build(query: &str) -> Option<StructuredSearchRequest> {
        let lower = query.to_lowercase();
        let rule = KeywordClassifier::matching_rule(&lower)?;
        let top = Self::extract_top_n(&lower)
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_TOP_N);

        Some(StructuredSearchRequest {
            search: "*".into(),
            order_by: format!("{} {}", rule.field, rule.order),
            top,
        })
    }

    /// Explicit count following a ranking word, e.g. "top 5" or "worst 2".
    pub fn extract_top_n(query: &str) -> Option<u32> {
        let lower = query.to_lowercase();
        TOP_N_RE
            .captures(&lower)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}
