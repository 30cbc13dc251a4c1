//! Query routing: decides how a user utterance is searched.
//!
//! Aggregation-style questions ("top 5", "lowest") become a structured
//! sort/limit request; everything else becomes a free-text request whose
//! strictness depends on the month/year anchors found in the query.

pub mod backend;
pub mod dispatcher;
pub mod free_text;
pub mod keywords;
pub mod structured;
pub mod types;

pub use backend::HttpSearchBackend;
pub use dispatcher::{degrade, route_query, RetrievalDispatcher, SearchBackend};
pub use free_text::FreeTextQueryBuilder;
pub use keywords::{KeywordClassifier, KEYWORD_RULES};
pub use structured::StructuredQueryBuilder;
pub use types::*;
