//! Keyword classifier.
//!
//! [`KEYWORD_RULES`] is scanned in declaration order and the first match wins,
//! so the order of the slice is part of its contract.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{KeywordRule, QueryClassification, SortOrder};

/// Numeric field the structured queries sort on.
pub const SALES_FIELD: &str = "SalesQty";

pub static KEYWORD_RULES: &[KeywordRule] = &[
    rule("highest", SortOrder::Desc),
    rule("top", SortOrder::Desc),
    rule("maximum", SortOrder::Desc),
    rule("max", SortOrder::Desc),
    rule("largest", SortOrder::Desc),
    rule("most", SortOrder::Desc),
    rule("lowest", SortOrder::Asc),
    rule("minimum", SortOrder::Asc),
    rule("min", SortOrder::Asc),
    rule("least", SortOrder::Asc),
    rule("smallest", SortOrder::Asc),
    rule("bottom", SortOrder::Asc),
];

const fn rule(term: &'static str, order: SortOrder) -> KeywordRule {
    KeywordRule {
        term,
        field: SALES_FIELD,
        order,
    }
}

const MULTI_ENTITY_MARKERS: &[&str] = &["compare", " vs ", " and "];

// Month names (full or abbreviated) and 202x years.
static TEMPORAL_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?|202\d)\b",
    )
    .expect("temporal token regex is valid")
});

/// Stateless query classifier.
pub struct KeywordClassifier;

impl KeywordClassifier {
    /// Classify a raw query.
    pub fn classify(query: &str) -> QueryClassification {
        let lower = query.to_lowercase();
        QueryClassification {
            has_aggregation_keyword: Self::matching_rule(&lower).is_some(),
            is_multi_entity: Self::is_multi_entity(&lower),
        }
    }

    /// First rule (in table order) whose term occurs in the lower-cased query.
    pub fn matching_rule(query_lower: &str) -> Option<&'static KeywordRule> {
        KEYWORD_RULES.iter().find(|r| query_lower.contains(r.term))
    }

    fn is_multi_entity(query_lower: &str) -> bool {
        MULTI_ENTITY_MARKERS.iter().any(|m| query_lower.contains(m))
            || Self::temporal_tokens(query_lower).len() >= 2
    }

    /// Distinct temporal anchors; `jan` and `january` count as one.
    fn temporal_tokens(query_lower: &str) -> BTreeSet<String> {
        TEMPORAL_TOKEN_RE
            .find_iter(query_lower)
            .map(|m| {
                let token = m.as_str();
                if token.starts_with("202") {
                    token.to_string()
                } else {
                    token[..3].to_string()
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order() {
        let terms: Vec<&str> = KEYWORD_RULES.iter().map(|r| r.term).collect();
        assert_eq!(
            terms,
            vec![
                "highest", "top", "maximum", "max", "largest", "most", "lowest", "minimum",
                "min", "least", "smallest", "bottom"
            ]
        );
        assert!(KEYWORD_RULES.iter().all(|r| r.field == SALES_FIELD));
        assert!(KEYWORD_RULES[..6].iter().all(|r| r.order == SortOrder::Desc));
        assert!(KEYWORD_RULES[6..].iter().all(|r| r.order == SortOrder::Asc));
    }

    #[test]
    fn test_terms_unique() {
        let unique: BTreeSet<&str> = KEYWORD_RULES.iter().map(|r| r.term).collect();
        assert_eq!(unique.len(), KEYWORD_RULES.len());
    }

    #[test]
    fn test_aggregation_keyword() {
        let signals = KeywordClassifier::classify("Which product had the HIGHEST sales?");
        assert!(signals.has_aggregation_keyword);
        assert!(KeywordClassifier::classify("bottom 3 regions").has_aggregation_keyword);
        assert!(!KeywordClassifier::classify("show sales for widgets").has_aggregation_keyword);
    }

    #[test]
    fn test_first_match_wins() {
        // "highest" precedes "lowest" in the table.
        let rule = KeywordClassifier::matching_rule("highest and lowest").unwrap();
        assert_eq!(rule.term, "highest");
        let rule = KeywordClassifier::matching_rule("the minimum month").unwrap();
        assert_eq!(rule.term, "minimum");
        assert_eq!(rule.order, SortOrder::Asc);
    }

    #[test]
    fn test_multi_entity_markers() {
        assert!(KeywordClassifier::classify("Compare north with south").is_multi_entity);
        assert!(KeywordClassifier::classify("north vs south").is_multi_entity);
        assert!(KeywordClassifier::classify("north and south").is_multi_entity);
        assert!(!KeywordClassifier::classify("north region sales").is_multi_entity);
        // "vs" must be a standalone word
        assert!(!KeywordClassifier::classify("canvs totals").is_multi_entity);
    }

    #[test]
    fn test_multi_entity_dates() {
        assert!(KeywordClassifier::classify("top product jan 2024").is_multi_entity);
        assert!(KeywordClassifier::classify("top product Jan, Feb").is_multi_entity);
        assert!(KeywordClassifier::classify("top 2023 2024").is_multi_entity);
        // Same month twice is a single anchor.
        assert!(!KeywordClassifier::classify("top product jan january").is_multi_entity);
        assert!(!KeywordClassifier::classify("top product in march").is_multi_entity);
        assert!(!KeywordClassifier::classify("top product").is_multi_entity);
    }

    #[test]
    fn test_both_flags() {
        let c = KeywordClassifier::classify("compare the top sellers in Jan and Feb");
        assert!(c.has_aggregation_keyword);
        assert!(c.is_multi_entity);
        assert!(!c.wants_structured());
    }
}
