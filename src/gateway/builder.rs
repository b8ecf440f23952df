//! Builder for configuring orchestrator instances

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::audit::{AuditSink, TracingAuditSink};
use super::orchestrator::{DEFAULT_REQUEST_TIMEOUT, Orchestrator};
use crate::cache::{CacheBackend, CacheConfig, ResponseCache};
use crate::config::{Config, ProviderConfig, ProviderKind, SEARCH_SECRET, Secrets};
use crate::prompt::{PromptComposer, PromptConfig};
use crate::providers::{CooldownPolicy, ProviderClient, ProviderDescriptor, ProviderRegistry, RetryConfig};
use crate::ratelimit::{RateLimitConfig, RateLimiter};
use crate::search::{SearchAugmenter, SearchBackend, SearchConfig, SerpApiClient};
use crate::{MedgateError, Result};

/// Main entry point for creating orchestrator instances.
pub struct Medgate;

impl Medgate {
    /// Create a new builder for configuring the pipeline.
    pub fn builder() -> MedgateBuilder {
        MedgateBuilder::new()
    }
}

/// Builder for configuring orchestrator instances.
pub struct MedgateBuilder {
    providers: Vec<(ProviderDescriptor, Arc<dyn ProviderClient>)>,
    cooldown: CooldownPolicy,
    retry: Option<RetryConfig>,
    cache: Option<CacheConfig>,
    cache_backend: Option<Arc<dyn CacheBackend>>,
    rate_limit: RateLimitConfig,
    search_backend: Option<Arc<dyn SearchBackend>>,
    search_config: SearchConfig,
    prompt: PromptConfig,
    request_timeout: Duration,
    audit: Option<Arc<dyn AuditSink>>,
}

impl Default for MedgateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MedgateBuilder {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            cooldown: CooldownPolicy::default(),
            retry: None,
            cache: Some(CacheConfig::default()),
            cache_backend: None,
            rate_limit: RateLimitConfig::default(),
            search_backend: None,
            search_config: SearchConfig::default(),
            prompt: PromptConfig::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            audit: None,
        }
    }

    /// Add a provider. Providers are tried in ascending `descriptor.priority`.
    pub fn provider(mut self, descriptor: ProviderDescriptor, client: Arc<dyn ProviderClient>) -> Self {
        self.providers.push((descriptor, client));
        self
    }

    /// Set the cooldown schedule (default: 30s base, 10 min ceiling).
    pub fn cooldown(mut self, policy: CooldownPolicy) -> Self {
        self.cooldown = policy;
        self
    }

    /// Retry transient provider errors before moving to the next provider.
    ///
    /// Retries happen inside the provider's timeout.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = Some(config);
        self
    }

    /// Configure the response cache.
    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = Some(config);
        self
    }

    /// Store cache entries in a custom backend instead of the in-process one.
    pub fn cache_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.cache_backend = Some(backend);
        self
    }

    /// Disable response caching.
    pub fn disable_cache(mut self) -> Self {
        self.cache = None;
        self.cache_backend = None;
        self
    }

    /// Per-caller rate limit (default: 20 requests per 60s).
    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    /// Enable web search augmentation with the given backend.
    pub fn search(mut self, backend: Arc<dyn SearchBackend>) -> Self {
        self.search_backend = Some(backend);
        self
    }

    pub fn search_config(mut self, config: SearchConfig) -> Self {
        self.search_config = config;
        self
    }

    pub fn prompt(mut self, config: PromptConfig) -> Self {
        self.prompt = config;
        self
    }

    /// Total budget for one request, search and provider walk included.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Receive an audit record for every handled request (default: log only).
    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Put a Redis store in front of the in-process cache.
    #[cfg(feature = "redis")]
    pub async fn redis_cache(self, url: &str) -> Result<Self> {
        use crate::cache::{InMemoryCache, RedisCache, TieredCache};

        let redis = RedisCache::connect(url).await?;
        let max_entries = self
            .cache
            .as_ref()
            .map(|c| c.max_entries)
            .unwrap_or_else(|| CacheConfig::default().max_entries);
        let tiered = TieredCache::new(Arc::new(redis), InMemoryCache::new(max_entries));
        Ok(self.cache_backend(Arc::new(tiered)))
    }

    /// Apply a loaded configuration file.
    ///
    /// Providers without an API key are skipped with a warning. The Redis
    /// store named by `cache.redis_url` is not connected here; see
    /// `redis_cache`.
    pub fn from_config(config: &Config, secrets: &Secrets) -> Result<Self> {
        let mut builder = Self::new()
            .cooldown(config.cooldown.policy())
            .rate_limit(config.rate_limit.clone())
            .search_config(config.search.search_config())
            .prompt(config.prompt.clone())
            .request_timeout(config.request_timeout());

        builder = if config.cache.enabled {
            builder.cache(config.cache.cache_config())
        } else {
            builder.disable_cache()
        };

        for provider in &config.providers {
            let Some(api_key) = secrets.provider_key(provider) else {
                warn!(provider = %provider.name, "no API key configured, skipping provider");
                continue;
            };
            let client = client_for(provider, api_key)?;
            builder = builder.provider(provider.descriptor(), client);
        }

        if config.search.enabled {
            match secrets.api_key(SEARCH_SECRET) {
                Some(key) => {
                    let client = match &config.search.base_url {
                        Some(url) => SerpApiClient::with_base_url(key, url.clone()),
                        None => SerpApiClient::new(key),
                    };
                    builder = builder.search(Arc::new(client));
                }
                None => warn!("no search API key configured, answering without citations"),
            }
        }

        Ok(builder)
    }

    /// Build the orchestrator.
    ///
    /// Fails with [`MedgateError::NoProvider`] when no provider was added.
    pub fn build(self) -> Result<Orchestrator> {
        if self.providers.is_empty() {
            return Err(MedgateError::NoProvider);
        }
        if self.request_timeout.is_zero() {
            return Err(MedgateError::Configuration(
                "request timeout must be greater than zero".into(),
            ));
        }
        if self.cooldown.base > self.cooldown.ceiling {
            return Err(MedgateError::Configuration(
                "base cooldown must not exceed the ceiling".into(),
            ));
        }

        let mut registry = ProviderRegistry::new();
        if let Some(retry) = self.retry {
            registry.set_retry_config(retry);
        }
        for (descriptor, client) in self.providers {
            registry.register(descriptor, client)?;
        }
        let tracker = Arc::new(registry.availability_tracker(self.cooldown));

        let cache = match (self.cache, self.cache_backend) {
            (Some(config), Some(backend)) => Some(ResponseCache::with_backend(backend, config)),
            (Some(config), None) => Some(ResponseCache::new(config)),
            (None, _) => None,
        };

        let search = match self.search_backend {
            Some(backend) => SearchAugmenter::new(backend, self.search_config),
            None => SearchAugmenter::disabled(),
        };

        Ok(Orchestrator {
            registry,
            tracker,
            cache,
            limiter: RateLimiter::new(self.rate_limit)?,
            search,
            composer: PromptComposer::new(self.prompt),
            request_timeout: self.request_timeout,
            audit: self.audit.unwrap_or_else(|| Arc::new(TracingAuditSink)),
        })
    }
}

/// Construct the client for one configured provider.
fn client_for(provider: &ProviderConfig, api_key: String) -> Result<Arc<dyn ProviderClient>> {
    let base_url = provider.base_url.clone();
    let model = provider.model.clone();
    let name = provider.name.clone();

    let client: Arc<dyn ProviderClient> = match provider.kind {
        #[cfg(feature = "openai")]
        ProviderKind::Openai | ProviderKind::Groq | ProviderKind::Openrouter | ProviderKind::OpenaiCompatible => {
            use crate::providers::openai::{
                GROQ_BASE_URL, OPENAI_BASE_URL, OPENROUTER_BASE_URL, OpenAiCompatibleClient,
            };
            let default_url = match provider.kind {
                ProviderKind::Groq => GROQ_BASE_URL,
                ProviderKind::Openrouter => OPENROUTER_BASE_URL,
                _ => OPENAI_BASE_URL,
            };
            let url = base_url.unwrap_or_else(|| default_url.to_string());
            Arc::new(OpenAiCompatibleClient::with_base_url(name, api_key, model, url))
        }
        #[cfg(feature = "anthropic")]
        ProviderKind::Anthropic => {
            use crate::providers::AnthropicClient;
            match base_url {
                Some(url) => Arc::new(AnthropicClient::with_base_url(api_key, model, url)),
                None => Arc::new(AnthropicClient::new(api_key, model)),
            }
        }
        #[cfg(feature = "gemini")]
        ProviderKind::Gemini => {
            use crate::providers::GeminiClient;
            match base_url {
                Some(url) => Arc::new(GeminiClient::with_base_url(api_key, model, url)),
                None => Arc::new(GeminiClient::new(api_key, model)),
            }
        }
        #[allow(unreachable_patterns)]
        other => {
            return Err(MedgateError::Configuration(format!(
                "provider '{}' uses kind {other:?}, which this build does not include",
                provider.name
            )));
        }
    };
    Ok(client)
}
