//! Runtime types.

use forecastiq_chat::{ChatError, ChatMode, ContextWarning};
use serde::Serialize;

/// Where the session is in its turn cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConversationPhase {
    /// Ready for a new user turn.
    Idle,
    /// A user turn was accepted and has no reply yet.
    AwaitingReply,
}

/// Result of a `submit` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SubmitOutcome {
    Accepted,
    /// A turn is already awaiting its reply; nothing changed.
    Busy,
    /// Blank input; nothing changed.
    Empty,
}

/// A completed turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnReport {
    pub reply: String,
    pub mode: ChatMode,
    pub warnings: Vec<ContextWarning>,
    /// Historical documents the prompt was built from.
    pub documents: Vec<String>,
}

/// What happened to an executed turn.
#[derive(Debug)]
pub enum TurnResult {
    Replied(TurnReport),
    Failed(ChatError),
    Cancelled,
}

/// A turn result tagged with the turn it belongs to.
#[derive(Debug)]
pub struct TurnOutcome {
    pub turn_id: u64,
    pub result: TurnResult,
}

/// Snapshot for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub phase: ConversationPhase,
    #[serde(rename = "historyLength")]
    pub history_length: usize,
    #[serde(rename = "pendingInput")]
    pub pending_input: Option<String>,
    #[serde(rename = "turnInFlight")]
    pub turn_in_flight: bool,
    #[serde(rename = "forecastLoaded")]
    pub forecast_loaded: bool,
    #[serde(rename = "availableModes")]
    pub available_modes: Vec<ChatMode>,
}
