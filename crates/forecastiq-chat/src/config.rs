//! LLM configuration persistence and provider selection.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{LLMConfigResponse, LLMConfigUpdate, LLMProvider};

pub const DEFAULT_AZURE_DEPLOYMENT: &str = "gpt-35-turbo";
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-12-01-preview";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: usize = 500;

pub const OPENAI_MODELS: &[&str] = &["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "gpt-3.5-turbo"];
pub const ANTHROPIC_MODELS: &[&str] = &[
    "claude-sonnet-4-20250514",
    "claude-3-5-sonnet-20241022",
    "claude-3-5-haiku-20241022",
];
pub const GROQ_MODELS: &[&str] = &[
    "llama-3.3-70b-versatile",
    "llama-3.1-8b-instant",
    "mixtral-8x7b-32768",
    "gemma2-9b-it",
];

/// Everything needed to call one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProvider {
    pub provider: LLMProvider,
    /// Model name, or the deployment name for Azure.
    pub model: String,
    pub api_key: String,
    /// Resource endpoint (Azure only).
    pub endpoint: Option<String>,
    pub api_version: Option<String>,
}

/// Stored LLM configuration (persisted to llm-config.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    #[serde(default = "default_preferred")]
    pub preferred_provider: String,
    #[serde(default)]
    pub azure_api_key: Option<String>,
    #[serde(default)]
    pub azure_endpoint: Option<String>,
    #[serde(default = "default_azure_deployment")]
    pub azure_deployment: String,
    #[serde(default = "default_azure_api_version")]
    pub azure_api_version: String,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    #[serde(default)]
    pub groq_api_key: Option<String>,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,
    #[serde(default = "default_groq_model")]
    pub groq_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Path to config file for saving.
    #[serde(skip)]
    pub config_path: PathBuf,
}

fn default_preferred() -> String {
    "auto".into()
}
fn default_azure_deployment() -> String {
    DEFAULT_AZURE_DEPLOYMENT.into()
}
fn default_azure_api_version() -> String {
    DEFAULT_AZURE_API_VERSION.into()
}
fn default_openai_model() -> String {
    DEFAULT_OPENAI_MODEL.into()
}
fn default_anthropic_model() -> String {
    DEFAULT_ANTHROPIC_MODEL.into()
}
fn default_groq_model() -> String {
    DEFAULT_GROQ_MODEL.into()
}
fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}
fn default_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            preferred_provider: "auto".into(),
            azure_api_key: None,
            azure_endpoint: None,
            azure_deployment: DEFAULT_AZURE_DEPLOYMENT.into(),
            azure_api_version: DEFAULT_AZURE_API_VERSION.into(),
            openai_api_key: None,
            anthropic_api_key: None,
            groq_api_key: None,
            openai_model: DEFAULT_OPENAI_MODEL.into(),
            anthropic_model: DEFAULT_ANTHROPIC_MODEL.into(),
            groq_model: DEFAULT_GROQ_MODEL.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            config_path: PathBuf::new(),
        }
    }
}

impl LLMConfig {
    /// Load config from file, falling back to env vars and defaults.
    pub fn load(config_path: &Path) -> Self {
        let mut config: LLMConfig = std::fs::read_to_string(config_path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();

        config.config_path = config_path.to_path_buf();

        // Env vars as fallback for API keys
        if config.azure_api_key.is_none() {
            config.azure_api_key = std::env::var("AZURE_OPENAI_API_KEY").ok();
        }
        if config.azure_endpoint.is_none() {
            config.azure_endpoint = std::env::var("AZURE_OPENAI_ENDPOINT").ok();
        }
        if config.openai_api_key.is_none() {
            config.openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        }
        if config.anthropic_api_key.is_none() {
            config.anthropic_api_key = std::env::var("ANTHROPIC_API_KEY").ok();
        }
        if config.groq_api_key.is_none() {
            config.groq_api_key = std::env::var("GROQ_API_KEY").ok();
        }

        config
    }

    /// Save config to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&self.config_path, json)?;
        info!("Saved LLM config to {}", self.config_path.display());
        Ok(())
    }

    /// Apply an update, merging with existing config.
    pub fn apply_update(&mut self, update: &LLMConfigUpdate) {
        if let Some(p) = &update.preferred_provider {
            self.preferred_provider = p.clone();
        }
        if let Some(k) = &update.azure_api_key {
            self.azure_api_key = Some(k.clone());
        }
        if let Some(e) = &update.azure_endpoint {
            self.azure_endpoint = Some(e.trim_end_matches('/').to_string());
        }
        if let Some(d) = &update.azure_deployment {
            self.azure_deployment = d.clone();
        }
        if let Some(k) = &update.openai_api_key {
            self.openai_api_key = Some(k.clone());
        }
        if let Some(k) = &update.anthropic_api_key {
            self.anthropic_api_key = Some(k.clone());
        }
        if let Some(k) = &update.groq_api_key {
            self.groq_api_key = Some(k.clone());
        }
        if let Some(m) = &update.openai_model {
            self.openai_model = m.clone();
        }
        if let Some(m) = &update.anthropic_model {
            self.anthropic_model = m.clone();
        }
        if let Some(m) = &update.groq_model {
            self.groq_model = m.clone();
        }
        if let Some(t) = update.temperature {
            self.temperature = t.clamp(0.0, 2.0);
        }
        if let Some(n) = update.max_tokens {
            self.max_tokens = n.max(1);
        }
    }

    fn azure(&self) -> Option<ResolvedProvider> {
        match (&self.azure_api_key, &self.azure_endpoint) {
            (Some(k), Some(e)) => Some(ResolvedProvider {
                provider: LLMProvider::Azure,
                model: self.azure_deployment.clone(),
                api_key: k.clone(),
                endpoint: Some(e.trim_end_matches('/').to_string()),
                api_version: Some(self.azure_api_version.clone()),
            }),
            _ => None,
        }
    }

    fn keyed(provider: LLMProvider, model: &str, key: &Option<String>) -> Option<ResolvedProvider> {
        key.as_ref().map(|k| ResolvedProvider {
            provider,
            model: model.to_string(),
            api_key: k.clone(),
            endpoint: None,
            api_version: None,
        })
    }

    /// Resolve which provider and model to use.
    pub fn resolve_provider(&self) -> Option<ResolvedProvider> {
        // Explicit preference
        if self.preferred_provider != "auto" {
            return match self.preferred_provider.as_str() {
                "azure" => self.azure(),
                "openai" => {
                    Self::keyed(LLMProvider::OpenAI, &self.openai_model, &self.openai_api_key)
                }
                "anthropic" => Self::keyed(
                    LLMProvider::Anthropic,
                    &self.anthropic_model,
                    &self.anthropic_api_key,
                ),
                "groq" => Self::keyed(LLMProvider::Groq, &self.groq_model, &self.groq_api_key),
                _ => None,
            };
        }

        // Auto mode: Azure > Anthropic > Groq > OpenAI
        self.azure()
            .or_else(|| {
                Self::keyed(
                    LLMProvider::Anthropic,
                    &self.anthropic_model,
                    &self.anthropic_api_key,
                )
            })
            .or_else(|| Self::keyed(LLMProvider::Groq, &self.groq_model, &self.groq_api_key))
            .or_else(|| Self::keyed(LLMProvider::OpenAI, &self.openai_model, &self.openai_api_key))
    }

    /// Build the public config response (no API keys exposed).
    pub fn to_response(&self) -> LLMConfigResponse {
        let resolved = self.resolve_provider();
        LLMConfigResponse {
            preferred_provider: self.preferred_provider.clone(),
            azure_configured: self.azure().is_some(),
            openai_configured: self.openai_api_key.is_some(),
            anthropic_configured: self.anthropic_api_key.is_some(),
            groq_configured: self.groq_api_key.is_some(),
            azure_deployment: self.azure_deployment.clone(),
            openai_model: self.openai_model.clone(),
            anthropic_model: self.anthropic_model.clone(),
            groq_model: self.groq_model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            active_provider: resolved.map(|r| r.provider.to_string()),
        }
    }

    /// Get available models for the active provider.
    pub fn available_models(&self) -> Vec<String> {
        match self.resolve_provider().map(|r| r.provider) {
            Some(LLMProvider::Azure) => vec![self.azure_deployment.clone()],
            Some(LLMProvider::OpenAI) => OPENAI_MODELS.iter().map(|s| s.to_string()).collect(),
            Some(LLMProvider::Anthropic) => {
                ANTHROPIC_MODELS.iter().map(|s| s.to_string()).collect()
            }
            Some(LLMProvider::Groq) => GROQ_MODELS.iter().map(|s| s.to_string()).collect(),
            None => Vec::new(),
        }
    }
}
