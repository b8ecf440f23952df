//! Medgate - fault-tolerant answer pipeline for a medical assistant
//!
//! This crate turns a user question (optionally scoped to a patient's
//! medical context) into an answer by walking a priority-ordered list of
//! LLM providers, augmenting the prompt with scored web-search evidence,
//! caching results and rate limiting callers. When every provider is down
//! it still answers, with deterministic guidance flagged as fallback.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use medgate::providers::{OpenAiCompatibleClient, ProviderDescriptor};
//! use medgate::{ChatOutcome, ChatRequest, Medgate};
//!
//! #[tokio::main]
//! async fn main() -> medgate::Result<()> {
//!     let orchestrator = Medgate::builder()
//!         .provider(
//!             ProviderDescriptor::new("groq", 0).timeout(Duration::from_secs(8)),
//!             Arc::new(OpenAiCompatibleClient::groq("gsk-your-key", "llama-3.1-8b-instant")),
//!         )
//!         .provider(
//!             ProviderDescriptor::new("openai", 1),
//!             Arc::new(OpenAiCompatibleClient::openai("sk-your-key", "gpt-4o-mini")),
//!         )
//!         .build()?;
//!
//!     let request = ChatRequest::new("user-42", "What helps a headache?");
//!     match orchestrator.handle(&request).await {
//!         ChatOutcome::Answered(response) => {
//!             println!("[{}] {}", response.model_used, response.content);
//!         }
//!         ChatOutcome::RateLimited { retry_after } => {
//!             println!("slow down, retry in {retry_after:?}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod prompt;
pub mod providers;
pub mod ratelimit;
pub mod search;
pub mod telemetry;
pub mod types;

/// Crate version, as published.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export main types at crate root
pub use error::{MedgateError, Result};
pub use gateway::{AuditRecord, AuditSink, Medgate, MedgateBuilder, Orchestrator};

// Re-export configuration types
pub use cache::CacheConfig;
pub use config::{Config, Secrets};
pub use prompt::PromptConfig;
pub use providers::{CooldownPolicy, RetryConfig};
pub use ratelimit::RateLimitConfig;
pub use search::{ScoringConfig, SearchConfig};

// Re-export all types
pub use types::{
    ChatOutcome, ChatRequest, ChatResponse, Citation, Mode, PatientContext, ResultKind, Role,
    SearchResult, Turn,
};
