//! Chat routes: the conversation turn cycle and LLM configuration.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use forecastiq_chat::providers;
use forecastiq_chat::{ChatMode, ContextWarning, LLMConfigUpdate, TestKeyRequest};
use forecastiq_runtime::{ConversationPhase, SubmitOutcome, TurnReport};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use super::error_json;
use crate::state::AppState;

type ApiResponse = (StatusCode, Json<Value>);

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat/status", get(get_status))
        .route("/chat/history", get(get_history))
        .route("/chat/submit", post(submit))
        .route("/chat/process", post(process))
        .route("/chat/cancel", post(cancel))
        .route("/chat/config", get(get_config).put(update_config))
        .route("/chat/config/test", post(test_key))
}

#[derive(Debug, Deserialize)]
struct SubmitRequest {
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct ProcessRequest {
    #[serde(default)]
    mode: Option<ChatMode>,
}

// ---------------------------------------------------------------
// Status & history
// ---------------------------------------------------------------

async fn get_status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let session = state.session.lock().status();
    let config = state.llm_config.read();
    let resolved = config.resolve_provider();

    Json(json!({
        "phase": session.phase,
        "historyLength": session.history_length,
        "pendingInput": session.pending_input,
        "turnInFlight": session.turn_in_flight,
        "forecastLoaded": session.forecast_loaded,
        "availableModes": session.available_modes,
        "defaultMode": ChatMode::default_for(session.forecast_loaded),
        "llmAvailable": resolved.is_some(),
        "llmProvider": resolved.as_ref().map(|r| r.provider.to_string()),
        "defaultModel": resolved.as_ref().map(|r| r.model.clone()),
        "availableModels": config.available_models(),
        "searchConfigured": state.config.search.is_configured(),
    }))
}

async fn get_history(State(state): State<Arc<AppState>>) -> Json<Value> {
    let session = state.session.lock();
    Json(json!({ "history": session.history() }))
}

// ---------------------------------------------------------------
// Turn cycle
// ---------------------------------------------------------------

async fn submit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitRequest>,
) -> ApiResponse {
    let mut session = state.session.lock();
    match session.submit(&req.message) {
        SubmitOutcome::Accepted => (
            StatusCode::ACCEPTED,
            Json(json!({ "accepted": true, "status": session.status() })),
        ),
        SubmitOutcome::Busy => {
            error_json(StatusCode::CONFLICT, "A message is already awaiting its reply")
        }
        SubmitOutcome::Empty => error_json(StatusCode::BAD_REQUEST, "Message is empty"),
    }
}

/// Run the pending turn. The session lock is released while the search
/// and LLM calls are outstanding so `cancel` stays responsive. The turn runs
/// on its own task and settles the session even if this request is dropped.
async fn process(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResponse {
    let req: ProcessRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ProcessRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(req) => req,
            Err(e) => {
                return error_json(StatusCode::BAD_REQUEST, &format!("Invalid request: {}", e))
            }
        }
    };

    let plan = {
        let mut session = state.session.lock();
        if session.phase() == ConversationPhase::Idle {
            return error_json(StatusCode::CONFLICT, "No message is awaiting a reply");
        }
        let mode = req
            .mode
            .unwrap_or_else(|| ChatMode::default_for(session.forecast().is_some()));
        match session.begin_turn(mode) {
            Some(plan) => plan,
            None => {
                return error_json(
                    StatusCode::CONFLICT,
                    "The pending message is already being processed",
                )
            }
        }
    };

    let turn_id = plan.turn_id();
    debug!("Processing turn {}", turn_id);
    let turn_state = state.clone();
    let turn = tokio::spawn(async move {
        let outcome = plan
            .execute(&turn_state.dispatcher, turn_state.llm.as_ref())
            .await;
        let finished = turn_state.session.lock().finish_turn(outcome);
        finished
    });

    match turn.await {
        Ok(Ok(Some(report))) => (StatusCode::OK, Json(report_json(&report))),
        Ok(Ok(None)) => {
            info!("Turn {} ended without a reply (cancelled)", turn_id);
            (StatusCode::OK, Json(json!({ "cancelled": true })))
        }
        Ok(Err(e)) => error_json(StatusCode::BAD_GATEWAY, &e.to_string()),
        Err(e) => {
            error!("Turn {} task failed: {}", turn_id, e);
            state.session.lock().cancel();
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "Turn processing failed")
        }
    }
}

async fn cancel(State(state): State<Arc<AppState>>) -> Json<Value> {
    let mut session = state.session.lock();
    let cancelled = session.cancel();
    Json(json!({ "cancelled": cancelled, "status": session.status() }))
}

fn report_json(report: &TurnReport) -> Value {
    json!({
        "reply": report.reply,
        "mode": report.mode,
        "warnings": report.warnings.iter().map(warning_json).collect::<Vec<_>>(),
        "documents": report.documents,
    })
}

fn warning_json(warning: &ContextWarning) -> Value {
    json!({ "code": warning, "message": warning.message() })
}

// ---------------------------------------------------------------
// Config
// ---------------------------------------------------------------

async fn get_config(State(state): State<Arc<AppState>>) -> ApiResponse {
    let config = state.llm_config.read();
    match serde_json::to_value(config.to_response()) {
        Ok(value) => (StatusCode::OK, Json(value)),
        Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(update): Json<LLMConfigUpdate>,
) -> ApiResponse {
    let mut config = state.llm_config.write();
    config.apply_update(&update);

    if let Err(e) = config.save() {
        return error_json(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("Failed to save config: {}", e),
        );
    }

    match serde_json::to_value(config.to_response()) {
        Ok(value) => (StatusCode::OK, Json(value)),
        Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

async fn test_key(Json(req): Json<TestKeyRequest>) -> Json<Value> {
    match providers::test_api_key(&req.provider, &req.api_key, req.endpoint.as_deref()).await {
        Ok(()) => Json(json!({ "success": true })),
        Err(e) => Json(json!({ "success": false, "error": e })),
    }
}
