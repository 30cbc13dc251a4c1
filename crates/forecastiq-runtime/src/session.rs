//! Conversation session: history, phase and the turn cycle.

use forecastiq_chat::{build_messages, ChatBackend, ChatMode, ChatTurn, ContextAssembler};
use forecastiq_core::{Error, Result};
use forecastiq_forecast::ForecastSet;
use forecastiq_resolve::RetrievalDispatcher;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::types::*;

/// State owned by one user session.
///
/// `process` runs a whole turn. Callers that must not hold the session
/// across network calls use `begin_turn`, [`TurnPlan::execute`] and
/// `finish_turn` instead.
pub struct ConversationSession {
    history: Vec<ChatTurn>,
    phase: ConversationPhase,
    pending_input: Option<String>,
    forecast: Option<ForecastSet>,
    turn_id: u64,
    in_flight: bool,
    cancel_token: Option<CancellationToken>,
}

impl ConversationSession {
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
            phase: ConversationPhase::Idle,
            pending_input: None,
            forecast: None,
            turn_id: 0,
            in_flight: false,
            cancel_token: None,
        }
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn phase(&self) -> ConversationPhase {
        self.phase
    }

    pub fn pending_input(&self) -> Option<&str> {
        self.pending_input.as_deref()
    }

    pub fn forecast(&self) -> Option<&ForecastSet> {
        self.forecast.as_ref()
    }

    /// Install the forecast for a newly uploaded dataset.
    pub fn set_forecast(&mut self, forecast: ForecastSet) {
        info!("Forecast loaded: {} months", forecast.len());
        self.forecast = Some(forecast);
    }

    /// Accept a user turn. Ignored unless the session is idle.
    pub fn submit(&mut self, text: &str) -> SubmitOutcome {
        if self.phase != ConversationPhase::Idle {
            debug!("Submit ignored: a turn is awaiting its reply");
            return SubmitOutcome::Busy;
        }
        if text.trim().is_empty() {
            return SubmitOutcome::Empty;
        }

        self.history.push(ChatTurn::user(text));
        self.pending_input = Some(text.to_string());
        self.turn_id += 1;
        self.cancel_token = Some(CancellationToken::new());
        self.phase = ConversationPhase::AwaitingReply;
        SubmitOutcome::Accepted
    }

    /// Abandon the pending turn. The user turn stays in history.
    ///
    /// Returns false when there was nothing to cancel.
    pub fn cancel(&mut self) -> bool {
        if self.phase != ConversationPhase::AwaitingReply {
            return false;
        }
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        info!("Turn {} cancelled", self.turn_id);
        self.reset_turn();
        true
    }

    /// Token that cancels the pending turn, for use from another task.
    pub fn cancel_handle(&self) -> Option<CancellationToken> {
        self.cancel_token.clone()
    }

    /// Snapshot everything the pending turn needs. `None` when idle or when
    /// the turn is already executing.
    pub fn begin_turn(&mut self, mode: ChatMode) -> Option<TurnPlan> {
        if self.phase != ConversationPhase::AwaitingReply || self.in_flight {
            return None;
        }
        let query = self.pending_input.clone()?;
        let token = self.cancel_token.clone().unwrap_or_default();

        self.in_flight = true;
        Some(TurnPlan {
            turn_id: self.turn_id,
            query,
            mode,
            history: self.history.clone(),
            forecast_block: self.forecast.as_ref().map(|f| f.prompt_block().to_string()),
            token,
        })
    }

    /// Apply an executed turn. Outcomes of cancelled or superseded turns
    /// are discarded.
    pub fn finish_turn(&mut self, outcome: TurnOutcome) -> Result<Option<TurnReport>> {
        if outcome.turn_id != self.turn_id || !self.in_flight {
            debug!("Discarding outcome of stale turn {}", outcome.turn_id);
            return Ok(None);
        }

        match outcome.result {
            TurnResult::Replied(report) => {
                self.history.push(ChatTurn::assistant(report.reply.clone()));
                self.reset_turn();
                info!(
                    "Turn {} complete ({} history turns)",
                    outcome.turn_id,
                    self.history.len()
                );
                Ok(Some(report))
            }
            TurnResult::Failed(e) => {
                warn!("Turn {} failed: {}", outcome.turn_id, e);
                self.reset_turn();
                Err(Error::Llm(e.to_string()))
            }
            TurnResult::Cancelled => {
                self.reset_turn();
                Ok(None)
            }
        }
    }

    /// Run the pending turn to completion. `Ok(None)` when idle or cancelled.
    pub async fn process(
        &mut self,
        mode: ChatMode,
        dispatcher: &RetrievalDispatcher,
        llm: &dyn ChatBackend,
    ) -> Result<Option<TurnReport>> {
        let Some(plan) = self.begin_turn(mode) else {
            return Ok(None);
        };
        let outcome = plan.execute(dispatcher, llm).await;
        self.finish_turn(outcome)
    }

    pub fn status(&self) -> SessionStatus {
        let forecast_loaded = self.forecast.is_some();
        SessionStatus {
            phase: self.phase,
            history_length: self.history.len(),
            pending_input: self.pending_input.clone(),
            turn_in_flight: self.in_flight,
            forecast_loaded,
            available_modes: ChatMode::available(forecast_loaded),
        }
    }

    fn reset_turn(&mut self) {
        self.pending_input = None;
        self.cancel_token = None;
        self.in_flight = false;
        self.phase = ConversationPhase::Idle;
    }
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Inputs of one turn, detached from the session.
#[derive(Debug)]
pub struct TurnPlan {
    turn_id: u64,
    query: String,
    mode: ChatMode,
    history: Vec<ChatTurn>,
    forecast_block: Option<String>,
    token: CancellationToken,
}

impl TurnPlan {
    pub fn turn_id(&self) -> u64 {
        self.turn_id
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Retrieval, assembly and the LLM call, abandoned as soon as the turn
    /// is cancelled.
    pub async fn execute(
        self,
        dispatcher: &RetrievalDispatcher,
        llm: &dyn ChatBackend,
    ) -> TurnOutcome {
        let turn_id = self.turn_id;
        let token = self.token.clone();

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => TurnResult::Cancelled,
            result = self.run(dispatcher, llm) => result,
        };

        TurnOutcome { turn_id, result }
    }

    async fn run(self, dispatcher: &RetrievalDispatcher, llm: &dyn ChatBackend) -> TurnResult {
        let documents = if self.mode.uses_history_search() {
            dispatcher.retrieve(&self.query).await
        } else {
            Vec::new()
        };

        let context =
            ContextAssembler::assemble(self.mode, self.forecast_block.as_deref(), &documents);
        let messages = build_messages(&context.system_prompt, &self.history);
        debug!(
            "Turn {}: {} messages, {} documents, mode {}",
            self.turn_id,
            messages.len(),
            documents.len(),
            self.mode
        );

        match llm.complete(messages).await {
            Ok(reply) => TurnResult::Replied(TurnReport {
                reply,
                mode: self.mode,
                warnings: context.warnings,
                documents,
            }),
            Err(e) => TurnResult::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use forecastiq_chat::{ChatError, ChatMessage, ChatRole, ContextWarning, TurnRole};
    use forecastiq_forecast::ForecastPoint;
    use forecastiq_resolve::{RetrievalError, SearchBackend, SearchDocument, SearchRequest};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct StaticSearch {
        docs: Vec<&'static str>,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl SearchBackend for StaticSearch {
        async fn search(
            &self,
            _request: &SearchRequest,
        ) -> std::result::Result<Vec<SearchDocument>, RetrievalError> {
            *self.calls.lock().unwrap() += 1;
            Ok(self
                .docs
                .iter()
                .map(|d| SearchDocument {
                    content: d.to_string(),
                })
                .collect())
        }
    }

    struct BrokenSearch;

    #[async_trait]
    impl SearchBackend for BrokenSearch {
        async fn search(
            &self,
            _request: &SearchRequest,
        ) -> std::result::Result<Vec<SearchDocument>, RetrievalError> {
            Err(RetrievalError::Transport("connection refused".into()))
        }
    }

    /// Replies with a fixed text and records what it was sent.
    struct EchoLlm {
        reply: std::result::Result<&'static str, ()>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl EchoLlm {
        fn replying(reply: &'static str) -> Self {
            Self {
                reply: Ok(reply),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn last_messages(&self) -> Vec<ChatMessage> {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl ChatBackend for EchoLlm {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
        ) -> std::result::Result<String, ChatError> {
            self.seen.lock().unwrap().push(messages);
            match self.reply {
                Ok(r) => Ok(r.to_string()),
                Err(()) => Err(ChatError::Api {
                    status: 500,
                    body: "boom".into(),
                }),
            }
        }
    }

    /// Never answers within a test's lifetime.
    struct StalledLlm;

    #[async_trait]
    impl ChatBackend for StalledLlm {
        async fn complete(
            &self,
            _messages: Vec<ChatMessage>,
        ) -> std::result::Result<String, ChatError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("too late".into())
        }
    }

    fn dispatcher(docs: Vec<&'static str>) -> (RetrievalDispatcher, Arc<StaticSearch>) {
        let search = Arc::new(StaticSearch {
            docs,
            calls: Mutex::new(0),
        });
        (RetrievalDispatcher::new(search.clone()), search)
    }

    fn forecast() -> ForecastSet {
        ForecastSet::from_points(vec![ForecastPoint {
            month: "Jan-2026".into(),
            sales_qty: 321,
        }])
        .unwrap()
    }

    #[test]
    fn test_submit_from_idle() {
        let mut session = ConversationSession::new();
        assert_eq!(session.submit("X"), SubmitOutcome::Accepted);
        assert_eq!(session.phase(), ConversationPhase::AwaitingReply);
        assert_eq!(session.history(), &[ChatTurn::user("X")]);
        assert_eq!(session.pending_input(), Some("X"));
    }

    #[test]
    fn test_submit_while_waiting_is_noop() {
        let mut session = ConversationSession::new();
        session.submit("X");
        assert_eq!(session.submit("Y"), SubmitOutcome::Busy);
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.pending_input(), Some("X"));
    }

    #[test]
    fn test_blank_submit_ignored() {
        let mut session = ConversationSession::new();
        assert_eq!(session.submit("   "), SubmitOutcome::Empty);
        assert_eq!(session.phase(), ConversationPhase::Idle);
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_cancel_keeps_user_turn() {
        let mut session = ConversationSession::new();
        assert!(!session.cancel());
        session.submit("X");
        let handle = session.cancel_handle().unwrap();
        assert!(session.cancel());
        assert!(handle.is_cancelled());
        assert_eq!(session.phase(), ConversationPhase::Idle);
        assert_eq!(session.history(), &[ChatTurn::user("X")]);
        assert!(session.pending_input().is_none());
    }

    #[tokio::test]
    async fn test_process_historical_turn() {
        let (dispatcher, search) = dispatcher(vec!["Jan-2024: 120 units"]);
        let llm = EchoLlm::replying("January sold 120 units.");
        let mut session = ConversationSession::new();
        session.submit("sales in january 2024");

        let report = session
            .process(ChatMode::Historical, &dispatcher, &llm)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.reply, "January sold 120 units.");
        assert_eq!(report.documents, vec!["Jan-2024: 120 units".to_string()]);
        assert!(report.warnings.is_empty());
        assert_eq!(*search.calls.lock().unwrap(), 1);
        assert_eq!(session.phase(), ConversationPhase::Idle);
        assert!(session.pending_input().is_none());
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history()[1].role, TurnRole::Assistant);

        let messages = llm.last_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::System);
        assert!(messages[0]
            .content
            .starts_with("Historical Context:\nJan-2024: 120 units"));
        assert_eq!(messages[1].content, "sales in january 2024");
    }

    #[tokio::test]
    async fn test_forecast_mode_skips_retrieval() {
        let (dispatcher, search) = dispatcher(vec!["unused"]);
        let llm = EchoLlm::replying("321 units.");
        let mut session = ConversationSession::new();
        session.set_forecast(forecast());
        session.submit("what about january?");

        let report = session
            .process(ChatMode::Forecast, &dispatcher, &llm)
            .await
            .unwrap()
            .unwrap();

        assert!(report.documents.is_empty());
        assert_eq!(*search.calls.lock().unwrap(), 0);
        let system = &llm.last_messages()[0].content;
        assert!(system.contains("\"salesQty\": 321"));
        assert!(!system.contains("Historical Context"));
    }

    #[tokio::test]
    async fn test_missing_forecast_warns_but_answers() {
        let (dispatcher, _) = dispatcher(vec![]);
        let llm = EchoLlm::replying("No forecast yet.");
        let mut session = ConversationSession::new();
        session.submit("next month?");

        let report = session
            .process(ChatMode::Both, &dispatcher, &llm)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.warnings, vec![ContextWarning::ForecastUnavailable]);
        assert!(llm.last_messages()[0]
            .content
            .contains("Historical Context:\nNo historical data found."));
    }

    #[tokio::test]
    async fn test_retrieval_failure_does_not_abort_turn() {
        let dispatcher = RetrievalDispatcher::new(Arc::new(BrokenSearch));
        let llm = EchoLlm::replying("I have no records.");
        let mut session = ConversationSession::new();
        session.submit("top 3 products");

        let report = session
            .process(ChatMode::Historical, &dispatcher, &llm)
            .await
            .unwrap()
            .unwrap();
        assert!(report.documents.is_empty());
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn test_history_is_sent_in_order() {
        let (dispatcher, _) = dispatcher(vec![]);
        let llm = EchoLlm::replying("ok");
        let mut session = ConversationSession::new();

        session.submit("first");
        session.process(ChatMode::Historical, &dispatcher, &llm).await.unwrap();
        session.submit("second");
        session.process(ChatMode::Historical, &dispatcher, &llm).await.unwrap();

        let contents: Vec<String> = llm
            .last_messages()
            .iter()
            .skip(1)
            .map(|m| m.content.clone())
            .collect();
        assert_eq!(contents, vec!["first", "ok", "second"]);
        assert_eq!(session.history().len(), 4);
    }

    #[tokio::test]
    async fn test_llm_failure_reverts_to_idle() {
        let (dispatcher, _) = dispatcher(vec![]);
        let llm = EchoLlm::failing();
        let mut session = ConversationSession::new();
        session.submit("X");

        let err = session
            .process(ChatMode::Historical, &dispatcher, &llm)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Llm(_)));
        assert_eq!(session.phase(), ConversationPhase::Idle);
        assert_eq!(session.history(), &[ChatTurn::user("X")]);
        assert_eq!(session.submit("retry"), SubmitOutcome::Accepted);
    }

    #[tokio::test]
    async fn test_process_when_idle() {
        let (dispatcher, _) = dispatcher(vec![]);
        let llm = EchoLlm::replying("unused");
        let mut session = ConversationSession::new();
        let result = session
            .process(ChatMode::Historical, &dispatcher, &llm)
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(llm.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_aborts_inflight_call() {
        let (dispatcher, _) = dispatcher(vec![]);
        let mut session = ConversationSession::new();
        session.submit("X");

        let handle = session.cancel_handle().unwrap();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            session.process(ChatMode::Historical, &dispatcher, &StalledLlm),
        )
        .await
        .expect("cancellation should end the turn")
        .unwrap();

        assert!(result.is_none());
        assert_eq!(session.phase(), ConversationPhase::Idle);
        assert_eq!(session.history(), &[ChatTurn::user("X")]);
    }

    #[test]
    fn test_stale_outcome_discarded() {
        let mut session = ConversationSession::new();
        session.submit("X");
        let plan = session.begin_turn(ChatMode::Historical).unwrap();
        let stale_id = plan.turn_id();
        assert!(session.begin_turn(ChatMode::Historical).is_none());

        session.cancel();
        session.submit("Y");

        let outcome = TurnOutcome {
            turn_id: stale_id,
            result: TurnResult::Replied(TurnReport {
                reply: "answer to X".into(),
                mode: ChatMode::Historical,
                warnings: Vec::new(),
                documents: Vec::new(),
            }),
        };
        assert!(session.finish_turn(outcome).unwrap().is_none());
        assert_eq!(session.phase(), ConversationPhase::AwaitingReply);
        assert_eq!(
            session.history(),
            &[ChatTurn::user("X"), ChatTurn::user("Y")]
        );
    }

    #[test]
    fn test_status() {
        let mut session = ConversationSession::new();
        let status = session.status();
        assert_eq!(status.available_modes, vec![ChatMode::Historical]);
        assert!(!status.forecast_loaded);

        session.set_forecast(forecast());
        session.submit("X");
        let status = session.status();
        assert_eq!(status.phase, ConversationPhase::AwaitingReply);
        assert_eq!(status.history_length, 1);
        assert_eq!(status.available_modes.len(), 3);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["phase"], "awaitingReply");
        assert_eq!(json["pendingInput"], "X");
    }
}
