//! Chat types: conversation turns, LLM messages, modes and config DTOs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// LLM provider identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LLMProvider {
    Azure,
    OpenAI,
    Anthropic,
    Groq,
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::Azure => write!(f, "azure"),
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::Anthropic => write!(f, "anthropic"),
            LLMProvider::Groq => write!(f, "groq"),
        }
    }
}

/// Role of a message sent to the LLM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// Message in the LLM request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl From<TurnRole> for ChatRole {
    fn from(role: TurnRole) -> Self {
        match role {
            TurnRole::User => ChatRole::User,
            TurnRole::Assistant => ChatRole::Assistant,
        }
    }
}

/// One entry of the append-only conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            text: text.into(),
        }
    }
}

/// Which context a turn is answered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    #[serde(alias = "Forecast")]
    Forecast,
    #[serde(alias = "Historical")]
    Historical,
    #[serde(alias = "Both")]
    Both,
}

impl ChatMode {
    pub fn uses_forecast(self) -> bool {
        matches!(self, ChatMode::Forecast | ChatMode::Both)
    }

    pub fn uses_history_search(self) -> bool {
        matches!(self, ChatMode::Historical | ChatMode::Both)
    }

    /// Default selection: both sources when a forecast exists.
    pub fn default_for(forecast_loaded: bool) -> Self {
        if forecast_loaded {
            ChatMode::Both
        } else {
            ChatMode::Historical
        }
    }

    /// Modes offered to the user.
    pub fn available(forecast_loaded: bool) -> Vec<ChatMode> {
        if forecast_loaded {
            vec![ChatMode::Forecast, ChatMode::Historical, ChatMode::Both]
        } else {
            vec![ChatMode::Historical]
        }
    }
}

impl std::fmt::Display for ChatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatMode::Forecast => write!(f, "forecast"),
            ChatMode::Historical => write!(f, "historical"),
            ChatMode::Both => write!(f, "both"),
        }
    }
}

/// Non-fatal condition reported alongside an assembled prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ContextWarning {
    /// The mode asks for forecast data but none has been computed.
    ForecastUnavailable,
}

impl ContextWarning {
    pub fn message(&self) -> &'static str {
        match self {
            ContextWarning::ForecastUnavailable => {
                "No forecast data available. Upload a sales series to access forecast chat."
            }
        }
    }
}

/// LLM call failure.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("No LLM provider configured")]
    NotConfigured,

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Empty reply from {0}")]
    EmptyReply(String),
}

impl From<ChatError> for forecastiq_core::Error {
    fn from(e: ChatError) -> Self {
        forecastiq_core::Error::Llm(e.to_string())
    }
}

/// LLM config response (keys masked).
#[derive(Debug, Clone, Serialize)]
pub struct LLMConfigResponse {
    #[serde(rename = "preferredProvider")]
    pub preferred_provider: String,
    #[serde(rename = "azureConfigured")]
    pub azure_configured: bool,
    #[serde(rename = "openaiConfigured")]
    pub openai_configured: bool,
    #[serde(rename = "anthropicConfigured")]
    pub anthropic_configured: bool,
    #[serde(rename = "groqConfigured")]
    pub groq_configured: bool,
    #[serde(rename = "azureDeployment")]
    pub azure_deployment: String,
    #[serde(rename = "openaiModel")]
    pub openai_model: String,
    #[serde(rename = "anthropicModel")]
    pub anthropic_model: String,
    #[serde(rename = "groqModel")]
    pub groq_model: String,
    pub temperature: f64,
    #[serde(rename = "maxTokens")]
    pub max_tokens: usize,
    #[serde(rename = "activeProvider")]
    pub active_provider: Option<String>,
}

/// LLM config update request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LLMConfigUpdate {
    #[serde(rename = "preferredProvider")]
    pub preferred_provider: Option<String>,
    #[serde(rename = "azureApiKey")]
    pub azure_api_key: Option<String>,
    #[serde(rename = "azureEndpoint")]
    pub azure_endpoint: Option<String>,
    #[serde(rename = "azureDeployment")]
    pub azure_deployment: Option<String>,
    #[serde(rename = "openaiApiKey")]
    pub openai_api_key: Option<String>,
    #[serde(rename = "anthropicApiKey")]
    pub anthropic_api_key: Option<String>,
    #[serde(rename = "groqApiKey")]
    pub groq_api_key: Option<String>,
    #[serde(rename = "openaiModel")]
    pub openai_model: Option<String>,
    #[serde(rename = "anthropicModel")]
    pub anthropic_model: Option<String>,
    #[serde(rename = "groqModel")]
    pub groq_model: Option<String>,
    pub temperature: Option<f64>,
    #[serde(rename = "maxTokens")]
    pub max_tokens: Option<usize>,
}

/// API key test request.
#[derive(Debug, Clone, Deserialize)]
pub struct TestKeyRequest {
    pub provider: String,
    #[serde(rename = "apiKey")]
    pub api_key: String,
    /// Required for Azure, ignored otherwise.
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        let m: ChatMode = serde_json::from_str("\"Both\"").unwrap();
        assert_eq!(m, ChatMode::Both);
        let m: ChatMode = serde_json::from_str("\"historical\"").unwrap();
        assert_eq!(m, ChatMode::Historical);
        assert!(serde_json::from_str::<ChatMode>("\"sideways\"").is_err());
    }

    #[test]
    fn test_mode_gates() {
        assert!(ChatMode::Forecast.uses_forecast());
        assert!(!ChatMode::Forecast.uses_history_search());
        assert!(ChatMode::Both.uses_forecast() && ChatMode::Both.uses_history_search());
        assert!(!ChatMode::Historical.uses_forecast());
    }

    #[test]
    fn test_default_mode() {
        assert_eq!(ChatMode::default_for(true), ChatMode::Both);
        assert_eq!(ChatMode::default_for(false), ChatMode::Historical);
        assert_eq!(ChatMode::available(false), vec![ChatMode::Historical]);
        assert_eq!(ChatMode::available(true).len(), 3);
    }

    #[test]
    fn test_turn_wire_shape() {
        let json = serde_json::to_value(ChatTurn::assistant("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "assistant", "text": "hi"}));
        let msg = ChatMessage::system("rules");
        let json = serde_json::to_value(msg).unwrap();
        assert_eq!(json, serde_json::json!({"role": "system", "content": "rules"}));
    }
}
