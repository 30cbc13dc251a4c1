//! Conversation runtime: one session, one turn in flight.
//!
//! A turn moves `Idle → AwaitingReply → Idle`: submit, then retrieval,
//! prompt assembly and the LLM call, then the reply lands in history.

pub mod session;
pub mod types;

pub use session::{ConversationSession, TurnPlan};
pub use types::*;
