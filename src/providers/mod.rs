//! LLM provider clients and the machinery that orders and guards them.
//!
//! - [`traits::ProviderClient`]: the single capability every backend implements
//! - [`registry::ProviderRegistry`]: providers sorted by static priority
//! - [`availability::AvailabilityTracker`]: per-provider cooldown state
//! - [`retry::RetryingProvider`]: opt-in retry decorator

#[cfg(feature = "anthropic")]
pub mod anthropic;
pub mod availability;
#[cfg(feature = "gemini")]
pub mod gemini;
mod http;
#[cfg(feature = "openai")]
pub mod openai;
pub mod registry;
pub mod retry;
pub mod traits;

#[cfg(feature = "anthropic")]
pub use anthropic::AnthropicClient;
pub use availability::{
    AvailabilityTracker, CooldownPolicy, DEFAULT_BASE_COOLDOWN, DEFAULT_COOLDOWN_CEILING,
    ProviderState, ProviderStatus,
};
#[cfg(feature = "gemini")]
pub use gemini::GeminiClient;
#[cfg(feature = "openai")]
pub use openai::OpenAiCompatibleClient;
pub use registry::{
    DEFAULT_MAX_TOKENS, DEFAULT_PROVIDER_TIMEOUT, ProviderDescriptor, ProviderRegistry,
    RegisteredProvider,
};
pub use retry::{RetryConfig, RetryingProvider};
pub use traits::ProviderClient;
