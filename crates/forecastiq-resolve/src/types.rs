//! Routing and search wire types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sort direction of a structured aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortOrder::Asc => write!(f, "asc"),
            SortOrder::Desc => write!(f, "desc"),
        }
    }
}

/// Trigger term mapped to the sort it implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordRule {
    pub term: &'static str,
    pub field: &'static str,
    pub order: SortOrder,
}

/// Verdict of the keyword classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct QueryClassification {
    #[serde(rename = "hasAggregationKeyword")]
    pub has_aggregation_keyword: bool,
    #[serde(rename = "isMultiEntity")]
    pub is_multi_entity: bool,
}

impl QueryClassification {
    /// Single-entity aggregation questions are answered with a sorted query.
    pub fn wants_structured(&self) -> bool {
        self.has_aggregation_keyword && !self.is_multi_entity
    }
}

/// Strictness of a free-text search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Every term must match.
    All,
    /// Any term may match.
    Any,
}

/// Sorted "match everything, take N" request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredSearchRequest {
    pub search: String,
    #[serde(rename = "orderby")]
    pub order_by: String,
    pub top: u32,
}

/// Full-text request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeTextSearchRequest {
    #[serde(rename = "search")]
    pub search_text: String,
    #[serde(rename = "searchMode")]
    pub search_mode: SearchMode,
}

/// Body POSTed to the search index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SearchRequest {
    Structured(StructuredSearchRequest),
    FreeText(FreeTextSearchRequest),
}

/// Which builder produced the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    Structured,
    FreeText,
}

impl SearchRequest {
    pub fn route(&self) -> RouteKind {
        match self {
            SearchRequest::Structured(_) => RouteKind::Structured,
            SearchRequest::FreeText(_) => RouteKind::FreeText,
        }
    }
}

/// A document returned by the index.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchDocument {
    pub content: String,
}

/// Index response envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub value: Vec<SearchDocument>,
}

/// Ways a retrieval can fail. All of them degrade to "no documents".
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Search backend not configured")]
    NotConfigured,

    #[error("Search request failed: {0}")]
    Transport(String),

    #[error("Search request timed out")]
    Timeout,

    #[error("Search API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed search response: {0}")]
    Decode(String),
}
