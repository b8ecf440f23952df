//! Provider registry with fixed priority order.
//!
//! The `ProviderRegistry` stores providers sorted by their descriptor's
//! priority (lowest rank first). Order is static configuration: it is never
//! adjusted from observed latency or error rates. The orchestrator walks the
//! registry front to back, skipping providers the
//! [`AvailabilityTracker`](super::AvailabilityTracker) reports as cooling down.
//!
//! # Retry Wrapping
//!
//! When a `RetryConfig` is set, providers are wrapped in [`RetryingProvider`]
//! at registration time, so each provider retries internally before the
//! orchestrator sees a failure.
//!
//! ```text
//!   priority 0   openai ──► fails ──► cooldown, advance
//!   priority 1   groq   ──► cooling down, skip
//!   priority 2   gemini ──► answers
//! ```

use std::sync::Arc;
use std::time::Duration;

use super::availability::{AvailabilityTracker, CooldownPolicy};
use super::retry::{RetryConfig, RetryingProvider};
use super::traits::ProviderClient;
use crate::{MedgateError, Result};

/// Default timeout for a single provider call.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Default completion budget.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Static description of one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDescriptor {
    pub name: String,
    /// Lower ranks are tried first. Ties keep registration order.
    pub priority: u32,
    /// Timeout for one call, including internal retries.
    pub timeout: Duration,
    /// Cooldown after a first failure; `None` uses the tracker policy's base.
    pub base_cooldown: Option<Duration>,
    /// Maximum completion tokens requested.
    pub max_tokens: u32,
}

impl ProviderDescriptor {
    pub fn new(name: impl Into<String>, priority: u32) -> Self {
        Self {
            name: name.into(),
            priority,
            timeout: DEFAULT_PROVIDER_TIMEOUT,
            base_cooldown: None,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_cooldown(mut self, cooldown: Duration) -> Self {
        self.base_cooldown = Some(cooldown);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A provider client together with its descriptor.
#[derive(Clone)]
pub struct RegisteredProvider {
    pub descriptor: ProviderDescriptor,
    pub client: Arc<dyn ProviderClient>,
}

/// Providers in priority order.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<RegisteredProvider>,
    retry_config: Option<RetryConfig>,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry configuration.
    ///
    /// Providers registered after this call are wrapped in [`RetryingProvider`].
    pub fn set_retry_config(&mut self, config: RetryConfig) {
        self.retry_config = Some(config);
    }

    /// Register a provider, keeping the list sorted by priority.
    ///
    /// The descriptor name is authoritative; it must be unique.
    pub fn register(
        &mut self,
        descriptor: ProviderDescriptor,
        client: Arc<dyn ProviderClient>,
    ) -> Result<()> {
        if self.contains(&descriptor.name) {
            return Err(MedgateError::Configuration(format!(
                "duplicate provider name '{}'",
                descriptor.name
            )));
        }
        let client = match &self.retry_config {
            Some(config) if config.max_attempts > 1 => {
                Arc::new(RetryingProvider::new(client, config.clone())) as Arc<dyn ProviderClient>
            }
            _ => client,
        };
        // Insert after every provider with the same or lower rank (stable)
        let idx = self
            .providers
            .partition_point(|p| p.descriptor.priority <= descriptor.priority);
        self.providers
            .insert(idx, RegisteredProvider { descriptor, client });
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.iter().any(|p| p.descriptor.name == name)
    }

    /// Providers in the order they should be tried.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredProvider> {
        self.providers.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers
            .iter()
            .map(|p| p.descriptor.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Build an availability tracker covering every registered provider.
    pub fn availability_tracker(&self, policy: CooldownPolicy) -> AvailabilityTracker {
        let mut tracker = AvailabilityTracker::new(policy);
        for p in &self.providers {
            let base = p.descriptor.base_cooldown.unwrap_or(policy.base);
            tracker.register_with_base(p.descriptor.name.clone(), base);
        }
        tracker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::Prompt;
    use async_trait::async_trait;

    struct Named(&'static str);

    #[async_trait]
    impl ProviderClient for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn complete(&self, _prompt: &Prompt, _max_tokens: u32) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn register(registry: &mut ProviderRegistry, name: &'static str, priority: u32) {
        registry
            .register(ProviderDescriptor::new(name, priority), Arc::new(Named(name)))
            .unwrap();
    }

    #[test]
    fn sorted_by_priority() {
        let mut registry = ProviderRegistry::new();
        register(&mut registry, "c", 2);
        register(&mut registry, "a", 0);
        register(&mut registry, "b", 1);
        assert_eq!(registry.names(), ["a", "b", "c"]);
    }

    #[test]
    fn equal_priority_keeps_registration_order() {
        let mut registry = ProviderRegistry::new();
        register(&mut registry, "first", 1);
        register(&mut registry, "second", 1);
        register(&mut registry, "zero", 0);
        assert_eq!(registry.names(), ["zero", "first", "second"]);
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut registry = ProviderRegistry::new();
        register(&mut registry, "a", 0);
        let err = registry
            .register(ProviderDescriptor::new("a", 1), Arc::new(Named("a")))
            .unwrap_err();
        assert!(matches!(err, MedgateError::Configuration(_)));
    }
}
