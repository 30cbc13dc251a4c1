//! Retrieval dispatcher: classify, build, search, degrade.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::free_text::FreeTextQueryBuilder;
use crate::keywords::KeywordClassifier;
use crate::structured::StructuredQueryBuilder;
use crate::types::*;

/// The document index the dispatcher queries.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchDocument>, RetrievalError>;
}

/// Request chosen for a query, with the verdict that chose it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedQuery {
    pub classification: QueryClassification,
    pub request: SearchRequest,
}

impl RoutedQuery {
    pub fn route(&self) -> RouteKind {
        self.request.route()
    }
}

/// Decide which request to send for `query`. Pure.
pub fn route_query(query: &str) -> RoutedQuery {
    let classification = KeywordClassifier::classify(query);

    let structured = if classification.wants_structured() {
        let built = StructuredQueryBuilder::build(query);
        if built.is_none() {
            warn!("Aggregation keyword found but no rule matched, using free-text search");
        }
        built
    } else {
        None
    };

    let request = match structured {
        Some(req) => SearchRequest::Structured(req),
        None => SearchRequest::FreeText(FreeTextQueryBuilder::build(query)),
    };

    RoutedQuery {
        classification,
        request,
    }
}

/// Retrieval failure policy: every error means "no documents, carry on".
pub fn degrade(result: Result<Vec<String>, RetrievalError>) -> Vec<String> {
    match result {
        Ok(docs) => docs,
        Err(e) => {
            warn!("Retrieval degraded to empty context: {}", e);
            Vec::new()
        }
    }
}

/// Routes queries to the search backend.
#[derive(Clone)]
pub struct RetrievalDispatcher {
    backend: Arc<dyn SearchBackend>,
}

impl RetrievalDispatcher {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self { backend }
    }

    /// Search and return document contents in backend order, or the error.
    pub async fn try_retrieve(&self, query: &str) -> Result<Vec<String>, RetrievalError> {
        let routed = route_query(query);
        debug!(
            "Routing query via {:?} (aggregation={}, multi_entity={})",
            routed.route(),
            routed.classification.has_aggregation_keyword,
            routed.classification.is_multi_entity
        );

        let docs = self.backend.search(&routed.request).await?;
        debug!("Search returned {} documents", docs.len());
        Ok(docs.into_iter().map(|d| d.content).collect())
    }

    /// Search with failures degraded to an empty sequence.
    pub async fn retrieve(&self, query: &str) -> Vec<String> {
        degrade(self.try_retrieve(query).await)
    }
}
