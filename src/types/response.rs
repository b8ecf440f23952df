//! Response types returned to the caller

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Citation;

/// `model_used` value for deterministic fallback answers.
pub const FALLBACK_MODEL: &str = "fallback";

/// Answer produced by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    /// Provider name that generated the answer, or [`FALLBACK_MODEL`].
    pub model_used: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    pub created_at: DateTime<Utc>,
    /// True when no live model produced this answer.
    #[serde(default)]
    pub is_fallback: bool,
    /// True when served from the response cache.
    #[serde(default)]
    pub cached: bool,
}

impl ChatResponse {
    pub(crate) fn generated(
        content: String,
        model_used: impl Into<String>,
        citations: Vec<Citation>,
    ) -> Self {
        Self {
            content,
            model_used: model_used.into(),
            citations,
            created_at: Utc::now(),
            is_fallback: false,
            cached: false,
        }
    }

    pub(crate) fn fallback(content: String) -> Self {
        Self {
            content,
            model_used: FALLBACK_MODEL.to_string(),
            citations: Vec::new(),
            created_at: Utc::now(),
            is_fallback: true,
            cached: false,
        }
    }
}

/// Result of [`Orchestrator::handle`](crate::Orchestrator::handle).
///
/// Rate limiting is the only case where no answer is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutcome {
    Answered(ChatResponse),
    RateLimited { retry_after: Duration },
}

impl ChatOutcome {
    /// The answer, if one was produced.
    pub fn response(&self) -> Option<&ChatResponse> {
        match self {
            ChatOutcome::Answered(r) => Some(r),
            ChatOutcome::RateLimited { .. } => None,
        }
    }

    pub fn into_response(self) -> Option<ChatResponse> {
        match self {
            ChatOutcome::Answered(r) => Some(r),
            ChatOutcome::RateLimited { .. } => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ChatOutcome::RateLimited { .. })
    }
}
