//! The provider capability trait.
//!
//! Every LLM backend implements [`ProviderClient`]: a composed prompt goes
//! in, completion text or a typed [`MedgateError`](crate::MedgateError)
//! comes out. Backends differ only in their wire format; ordering, timeouts
//! and cooldowns are applied uniformly by the orchestrator.
//!
//! # Error contract
//!
//! Implementations map backend failures onto the provider variants:
//! - `ProviderAuth`: rejected or missing credential
//! - `ProviderQuotaExhausted`: 429 / billing limits, with `retry_after` when known
//! - `ProviderTimeout`: the HTTP call itself timed out
//! - `ProviderMalformedResponse`: a 2xx body without usable completion text
//!
//! Any of these causes the orchestrator to cool the provider down and move on.

use async_trait::async_trait;

use crate::Result;
use crate::prompt::Prompt;

/// A single LLM backend.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Provider name for logging, metrics and `model_used`.
    fn name(&self) -> &str;

    /// Produce a completion for `prompt`, generating at most `max_tokens`.
    async fn complete(&self, prompt: &Prompt, max_tokens: u32) -> Result<String>;
}
