//! Chat side of a turn: system prompt assembly and the external LLM call.
//!
//! LLM calls go to external APIs; no local model is required.

pub mod assembler;
pub mod config;
pub mod providers;
pub mod types;

pub use assembler::{build_messages, AssembledContext, ContextAssembler, ContextPlan};
pub use config::LLMConfig;
pub use providers::{ChatBackend, HttpChatBackend};
pub use types::*;
