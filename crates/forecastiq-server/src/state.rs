//! Shared application state.

use std::sync::Arc;

use forecastiq_chat::{ChatBackend, HttpChatBackend, LLMConfig};
use forecastiq_core::ForecastIqConfig;
use forecastiq_forecast::{Forecaster, SeasonalNaiveForecaster};
use forecastiq_resolve::{HttpSearchBackend, RetrievalDispatcher, SearchBackend};
use forecastiq_runtime::ConversationSession;
use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: ForecastIqConfig,
    /// Never held across an `.await`.
    pub session: Mutex<ConversationSession>,
    pub dispatcher: RetrievalDispatcher,
    pub llm_config: Arc<RwLock<LLMConfig>>,
    pub llm: Arc<dyn ChatBackend>,
    pub forecaster: Box<dyn Forecaster>,
}

impl AppState {
    /// Wire the HTTP search and LLM backends from configuration.
    pub fn new(config: ForecastIqConfig) -> forecastiq_core::Result<Self> {
        let llm_config = Arc::new(RwLock::new(LLMConfig::load(
            &config.data_paths.llm_config_file,
        )));

        if !config.search.is_configured() {
            warn!("FORECASTIQ_SEARCH_ENDPOINT not set; historical context will be empty");
        }
        let search = Arc::new(HttpSearchBackend::new(config.search.clone())?);
        let llm = Arc::new(HttpChatBackend::new(llm_config.clone(), config.llm_timeout())?);
        if !llm.is_available() {
            warn!("No LLM provider configured; set one via PUT /api/chat/config");
        }

        Ok(Self::with_backends(config, llm_config, search, llm))
    }

    /// Assemble state around the given collaborators.
    pub fn with_backends(
        config: ForecastIqConfig,
        llm_config: Arc<RwLock<LLMConfig>>,
        search: Arc<dyn SearchBackend>,
        llm: Arc<dyn ChatBackend>,
    ) -> Self {
        let forecaster: Box<dyn Forecaster> = Box::new(SeasonalNaiveForecaster::default());
        info!("Forecast model: {}", forecaster.name());

        Self {
            config,
            session: Mutex::new(ConversationSession::new()),
            dispatcher: RetrievalDispatcher::new(search),
            llm_config,
            llm,
            forecaster,
        }
    }
}
