//! External LLM provider implementations.
//!
//! Each provider streams tokens via SSE from its API; a turn collects the
//! stream into one reply. Azure OpenAI, OpenAI and Groq share the same wire
//! format. Anthropic uses a different one.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use parking_lot::RwLock;
use reqwest::Client;
use serde_json::json;
use tokio_stream::StreamExt;
use tracing::{debug, error, info};

use crate::config::{LLMConfig, ResolvedProvider};
use crate::types::{ChatError, ChatMessage, ChatRole, LLMProvider};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Boxed stream type for returning different stream implementations.
pub type BoxedStream = Pin<Box<dyn Stream<Item = StreamChunk> + Send>>;

/// A single streamed token or error.
#[derive(Debug)]
pub enum StreamChunk {
    Token(String),
    Done { tokens_used: usize },
    Error(ChatError),
}

/// The LLM collaborator: ordered messages in, one assistant reply out.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, ChatError>;
}

/// Calls whichever provider the shared [`LLMConfig`] currently resolves to.
pub struct HttpChatBackend {
    client: Client,
    config: Arc<RwLock<LLMConfig>>,
}

impl HttpChatBackend {
    /// Build a client whose every request is bounded by `timeout`.
    pub fn new(config: Arc<RwLock<LLMConfig>>, timeout: Duration) -> forecastiq_core::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                forecastiq_core::Error::Http(format!("Failed to build LLM client: {}", e))
            })?;
        Ok(Self { client, config })
    }

    pub fn is_available(&self) -> bool {
        self.config.read().resolve_provider().is_some()
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, ChatError> {
        let (resolved, temperature, max_tokens) = {
            let config = self.config.read();
            let resolved = config.resolve_provider().ok_or(ChatError::NotConfigured)?;
            (resolved, config.temperature, config.max_tokens)
        };

        let provider = resolved.provider;
        let stream = stream_llm(&self.client, &resolved, messages, temperature, max_tokens);
        let (reply, tokens_used) = collect_reply(stream).await?;
        if reply.trim().is_empty() {
            return Err(ChatError::EmptyReply(provider.to_string()));
        }

        info!("{} replied with {} tokens", provider, tokens_used);
        Ok(reply)
    }
}

/// Drain a token stream into the full reply text and token count.
pub async fn collect_reply(stream: BoxedStream) -> Result<(String, usize), ChatError> {
    tokio::pin!(stream);

    let mut full_response = String::new();
    let mut tokens_used = 0;

    while let Some(chunk) = stream.next().await {
        match chunk {
            StreamChunk::Token(text) => full_response.push_str(&text),
            StreamChunk::Done { tokens_used: t } => {
                tokens_used = t;
                break;
            }
            StreamChunk::Error(e) => return Err(e),
        }
    }

    Ok((full_response, tokens_used))
}

/// Stream tokens from the resolved provider.
pub fn stream_llm(
    client: &Client,
    resolved: &ResolvedProvider,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: usize,
) -> BoxedStream {
    let bearer = || ("Authorization", format!("Bearer {}", resolved.api_key));
    match resolved.provider {
        LLMProvider::Azure => Box::pin(stream_openai_compat(
            client.clone(),
            azure_chat_url(resolved),
            ("api-key", resolved.api_key.clone()),
            messages,
            resolved.model.clone(),
            temperature,
            max_tokens,
        )),
        LLMProvider::OpenAI => Box::pin(stream_openai_compat(
            client.clone(),
            "https://api.openai.com/v1/chat/completions".into(),
            bearer(),
            messages,
            resolved.model.clone(),
            temperature,
            max_tokens,
        )),
        LLMProvider::Groq => Box::pin(stream_openai_compat(
            client.clone(),
            "https://api.groq.com/openai/v1/chat/completions".into(),
            bearer(),
            messages,
            resolved.model.clone(),
            temperature,
            max_tokens,
        )),
        LLMProvider::Anthropic => Box::pin(stream_anthropic(
            client.clone(),
            messages,
            resolved.model.clone(),
            resolved.api_key.clone(),
            temperature,
            max_tokens,
        )),
    }
}

/// Deployment-scoped chat completions URL.
fn azure_chat_url(resolved: &ResolvedProvider) -> String {
    format!(
        "{}/openai/deployments/{}/chat/completions?api-version={}",
        resolved.endpoint.as_deref().unwrap_or_default(),
        resolved.model,
        resolved.api_version.as_deref().unwrap_or_default()
    )
}

/// Pop the next complete line off an SSE buffer.
fn next_sse_line(buffer: &mut String) -> Option<String> {
    let line_end = buffer.find('\n')?;
    let line = buffer[..line_end].trim().to_string();
    buffer.drain(..=line_end);
    Some(line)
}

fn request_error(e: reqwest::Error) -> ChatError {
    if e.is_timeout() {
        ChatError::Timeout
    } else {
        ChatError::Request(e.to_string())
    }
}

/// Meaning of one SSE `data:` payload.
#[derive(Debug, PartialEq)]
enum SseEvent {
    Token(String),
    Done,
    Error(String),
    Skip,
}

/// Send `request` and turn its SSE body into chunks using `parse`.
fn sse_stream(
    request: reqwest::RequestBuilder,
    parse: fn(&str) -> SseEvent,
) -> impl Stream<Item = StreamChunk> + Send + 'static {
    async_stream::stream! {
        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                yield StreamChunk::Error(request_error(e));
                return;
            }
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            yield StreamChunk::Error(ChatError::Api { status, body });
            return;
        }

        let mut body = response.bytes_stream();
        let mut buffer = String::new();
        let mut token_count = 0usize;

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => buffer.push_str(&String::from_utf8_lossy(&bytes)),
                Err(e) => {
                    yield StreamChunk::Error(ChatError::Stream(e.to_string()));
                    return;
                }
            }

            while let Some(line) = next_sse_line(&mut buffer) {
                // Comments, blank separators and `event:` lines carry nothing.
                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };
                match parse(data.trim()) {
                    SseEvent::Token(text) => {
                        token_count += 1;
                        yield StreamChunk::Token(text);
                    }
                    SseEvent::Done => {
                        yield StreamChunk::Done { tokens_used: token_count };
                        return;
                    }
                    SseEvent::Error(msg) => {
                        error!("Provider stream error: {}", msg);
                        yield StreamChunk::Error(ChatError::Stream(msg));
                        return;
                    }
                    SseEvent::Skip => {}
                }
            }
        }

        yield StreamChunk::Done { tokens_used: token_count };
    }
}

/// Chat-completions delta format (Azure OpenAI, OpenAI, Groq).
fn parse_openai_event(data: &str) -> SseEvent {
    if data == "[DONE]" {
        return SseEvent::Done;
    }
    let Ok(parsed) = serde_json::from_str::<serde_json::Value>(data) else {
        return SseEvent::Skip;
    };
    if let Some(msg) = parsed["error"]["message"].as_str() {
        return SseEvent::Error(msg.to_string());
    }
    // Azure opens with a chunk whose `choices` is empty.
    match parsed["choices"][0]["delta"]["content"].as_str() {
        Some(text) if !text.is_empty() => SseEvent::Token(text.to_string()),
        _ => SseEvent::Skip,
    }
}

/// Anthropic Messages event format.
fn parse_anthropic_event(data: &str) -> SseEvent {
    let Ok(parsed) = serde_json::from_str::<serde_json::Value>(data) else {
        return SseEvent::Skip;
    };
    match parsed["type"].as_str() {
        Some("content_block_delta") => match parsed["delta"]["text"].as_str() {
            Some(text) if !text.is_empty() => SseEvent::Token(text.to_string()),
            _ => SseEvent::Skip,
        },
        Some("message_stop") => SseEvent::Done,
        Some("error") => SseEvent::Error(
            parsed["error"]["message"]
                .as_str()
                .unwrap_or("Unknown error")
                .to_string(),
        ),
        _ => SseEvent::Skip,
    }
}

/// Stream from OpenAI-compatible APIs (Azure OpenAI, OpenAI, Groq).
fn stream_openai_compat(
    client: Client,
    url: String,
    auth: (&'static str, String),
    messages: Vec<ChatMessage>,
    model: String,
    temperature: f64,
    max_tokens: usize,
) -> impl Stream<Item = StreamChunk> + Send + 'static {
    debug!("Streaming from {} with model {}", url, model);
    let request = client
        .post(&url)
        .header(auth.0, auth.1)
        .json(&json!({
            "model": model,
            "messages": messages,
            "temperature": temperature,
            "max_tokens": max_tokens,
            "stream": true,
        }));
    sse_stream(request, parse_openai_event)
}

/// Stream from Anthropic's Messages API. The system prompt travels in its
/// own field rather than as a message.
fn stream_anthropic(
    client: Client,
    messages: Vec<ChatMessage>,
    model: String,
    api_key: String,
    temperature: f64,
    max_tokens: usize,
) -> impl Stream<Item = StreamChunk> + Send + 'static {
    let (system, conversation): (Vec<ChatMessage>, Vec<ChatMessage>) = messages
        .into_iter()
        .partition(|m| m.role == ChatRole::System);

    let mut body = json!({
        "model": model,
        "messages": conversation,
        "temperature": temperature,
        "max_tokens": max_tokens,
        "stream": true,
    });
    if !system.is_empty() {
        let prompt: Vec<&str> = system.iter().map(|m| m.content.as_str()).collect();
        body["system"] = json!(prompt.join("\n\n"));
    }

    debug!("Streaming from Anthropic with model {}", model);
    let request = client
        .post("https://api.anthropic.com/v1/messages")
        .header("x-api-key", api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .json(&body);
    sse_stream(request, parse_anthropic_event)
}

/// Test an API key by making a minimal request.
pub async fn test_api_key(
    provider: &str,
    api_key: &str,
    endpoint: Option<&str>,
) -> Result<(), String> {
    let client = Client::new();

    let resp = match provider {
        "azure" => {
            let endpoint = endpoint.ok_or("Azure requires an endpoint")?;
            client
                .get(format!(
                    "{}/openai/models?api-version={}",
                    endpoint.trim_end_matches('/'),
                    crate::config::DEFAULT_AZURE_API_VERSION
                ))
                .header("api-key", api_key)
                .send()
                .await
        }
        "openai" => {
            client
                .get("https://api.openai.com/v1/models")
                .header("Authorization", format!("Bearer {}", api_key))
                .send()
                .await
        }
        "anthropic" => {
            let resp = client
                .post("https://api.anthropic.com/v1/messages")
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("Content-Type", "application/json")
                .json(&json!({
                    "model": "claude-3-5-haiku-20241022",
                    "max_tokens": 1,
                    "messages": [{"role": "user", "content": "Hi"}],
                }))
                .send()
                .await
                .map_err(|e| e.to_string())?;
            // 400 with valid key means key works (may be quota/model issue)
            return if resp.status().is_success() || resp.status().as_u16() == 400 {
                Ok(())
            } else {
                Err(format!("API returned status {}", resp.status()))
            };
        }
        "groq" => {
            client
                .get("https://api.groq.com/openai/v1/models")
                .header("Authorization", format!("Bearer {}", api_key))
                .send()
                .await
        }
        _ => return Err(format!("Unknown provider: {}", provider)),
    }
    .map_err(|e| e.to_string())?;

    if resp.status().is_success() {
        Ok(())
    } else {
        Err(format!("API returned status {}", resp.status()))
    }
}
