//! System prompt assembly.
//!
//! Which blocks appear is decided by [`ContextPlan::for_mode`] from the
//! mode's sources and whether a forecast is available. Rendering then joins
//! the forecast block, the historical block and the mode instruction with
//! blank lines, skipping absent blocks.

use serde::Serialize;
use tracing::warn;

use crate::types::{ChatMessage, ChatMode, ChatTurn, ContextWarning};

pub const HISTORICAL_HEADER: &str = "Historical Context:\n";
pub const NO_HISTORICAL_DATA: &str = "No historical data found.";

/// Blocks to include for one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextPlan {
    pub include_forecast: bool,
    pub include_historical: bool,
    /// Mode wanted a forecast that does not exist.
    pub forecast_missing: bool,
}

impl ContextPlan {
    pub fn for_mode(mode: ChatMode, forecast_available: bool) -> Self {
        Self {
            include_forecast: mode.uses_forecast() && forecast_available,
            include_historical: mode.uses_history_search(),
            forecast_missing: mode.uses_forecast() && !forecast_available,
        }
    }
}

/// The system prompt plus anything the caller should surface to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssembledContext {
    #[serde(rename = "systemPrompt")]
    pub system_prompt: String,
    pub warnings: Vec<ContextWarning>,
}

/// Builds the system prompt for a turn.
pub struct ContextAssembler;

impl ContextAssembler {
    /// Assemble the system prompt. History is not part of it; see
    /// [`build_messages`].
    pub fn assemble(
        mode: ChatMode,
        forecast_block: Option<&str>,
        retrieved_docs: &[String],
    ) -> AssembledContext {
        let forecast_block = forecast_block.filter(|b| !b.trim().is_empty());
        let plan = ContextPlan::for_mode(mode, forecast_block.is_some());

        let mut warnings = Vec::new();
        if plan.forecast_missing {
            warn!("Chat mode {} requested without forecast data", mode);
            warnings.push(ContextWarning::ForecastUnavailable);
        }

        let mut sections: Vec<String> = Vec::with_capacity(3);
        if plan.include_forecast {
            if let Some(block) = forecast_block {
                sections.push(block.trim_end().to_string());
            }
        }
        if plan.include_historical {
            sections.push(Self::historical_block(retrieved_docs));
        }
        sections.push(Self::instruction_suffix(mode).to_string());

        AssembledContext {
            system_prompt: sections.join("\n\n"),
            warnings,
        }
    }

    /// `Historical Context:` followed by one document per line.
    pub fn historical_block(retrieved_docs: &[String]) -> String {
        if retrieved_docs.is_empty() {
            format!("{}{}", HISTORICAL_HEADER, NO_HISTORICAL_DATA)
        } else {
            format!("{}{}", HISTORICAL_HEADER, retrieved_docs.join("\n"))
        }
    }

    pub fn instruction_suffix(mode: ChatMode) -> &'static str {
        match mode {
            ChatMode::Both => {
                "Use both the forecast data and (if present) the historical context above to answer. Be concise and factual."
            }
            ChatMode::Forecast => "Use only the forecast data to answer. Be concise and factual.",
            ChatMode::Historical => {
                "Use only the historical context above to answer. Be concise and factual."
            }
        }
    }
}

/// `[system] + one message per turn`, in history order.
pub fn build_messages(system_prompt: &str, history: &[ChatTurn]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend(history.iter().map(|turn| ChatMessage {
        role: turn.role.into(),
        content: turn.text.clone(),
    }));
    messages
}
