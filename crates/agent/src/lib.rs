//! Conversational quoting agent for the concierge.
//!
//! A chat turn flows through [`runtime::ChatOrchestrator`]: the system prompt is
//! assembled from the channel and what we know about the client, the model is
//! called with the tool schema, requested tools run concurrently against the
//! catalog, and every tool result is stripped of internal financials by
//! [`guardrails`] before the model sees it. Lead scoring, memory and locale
//! updates are handed to a background worker and never delay the reply.
//!
//! The model never prices anything itself: figures come from the catalog and
//! the decimal pricing rules in `concierge-core`.

pub mod executor;
pub mod guardrails;
pub mod language;
pub mod llm;
pub mod prompt;
pub mod runtime;
pub mod scoring;
pub mod side_effects;
pub mod tools;

pub use executor::CatalogToolExecutor;
pub use llm::{ChatModel, DeepSeekClient, LlmError};
pub use prompt::{Channel, PromptAssembler};
pub use runtime::{AgentError, ChatOrchestrator, ChatRequest, ChatResponse};
pub use side_effects::{SideEffect, SideEffectQueue};
pub use tools::{ToolContext, ToolError, ToolExecutor, ToolName};
