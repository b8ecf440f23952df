//! The request pipeline.
//!
//! # Flow
//!
//! ```text
//!  ChatRequest
//!      │
//!      ▼
//!  RateLimiter ──denied──► ChatOutcome::RateLimited
//!      │
//!      ▼
//!  ResponseCache ──hit──► cached answer
//!      │ miss
//!      ▼
//!  SearchAugmenter (best effort) ─► PromptComposer
//!      │
//!      ▼
//!  providers in priority order ──all skipped/failed──► canned guidance
//!      │ first success                                        │
//!      ▼                                                      ▼
//!  ResponseCache::store ◄─────────────────────────────────────┘
//! ```
//!
//! Everything after admission runs inside one request budget. Each provider
//! call is bounded by the smaller of its own timeout and what is left of the
//! budget; once the budget is spent the remaining providers are skipped.
//!
//! Tracker and cache are only mutated after a call completes, so dropping
//! the [`handle`](Orchestrator::handle) future mid-flight leaves no partial
//! state behind.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::audit::{AuditRecord, AuditSink};
use super::fallback::fallback_answer;
use crate::MedgateError;
use crate::cache::{Fingerprint, ResponseCache};
use crate::prompt::{Prompt, PromptComposer};
use crate::providers::{AvailabilityTracker, ProviderRegistry, RegisteredProvider};
use crate::ratelimit::RateLimiter;
use crate::search::SearchAugmenter;
use crate::telemetry;
use crate::types::{ChatOutcome, ChatRequest, ChatResponse};

/// Default end-to-end budget for one request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on a single cache lookup or store.
pub const CACHE_OP_TIMEOUT: Duration = Duration::from_millis(500);

/// Answers chat requests; never fails except by rate limiting.
///
/// Build one with [`Medgate::builder()`](super::Medgate::builder) and share
/// it (e.g. in an `Arc`) across request tasks.
pub struct Orchestrator {
    pub(super) registry: ProviderRegistry,
    pub(super) tracker: Arc<AvailabilityTracker>,
    pub(super) cache: Option<ResponseCache>,
    pub(super) limiter: RateLimiter,
    pub(super) search: SearchAugmenter,
    pub(super) composer: PromptComposer,
    pub(super) request_timeout: Duration,
    pub(super) audit: Arc<dyn AuditSink>,
}

impl Orchestrator {
    /// Handle one request.
    ///
    /// Returns [`ChatOutcome::RateLimited`] when the caller is over its
    /// rate; otherwise always an answer: cached, generated, or the
    /// deterministic fallback.
    #[instrument(skip(self, request), fields(caller = %request.caller_id, mode = request.mode.as_str()))]
    pub async fn handle(&self, request: &ChatRequest) -> ChatOutcome {
        let start = Instant::now();
        let deadline = start + self.request_timeout;

        if let Err(e) = self.limiter.check(&request.caller_id) {
            let retry_after = e.retry_after().unwrap_or_default();
            Self::record_outcome("rate_limited", start);
            self.audit
                .record(&AuditRecord::rate_limited(request, start.elapsed()));
            return ChatOutcome::RateLimited { retry_after };
        }

        let fingerprint = Fingerprint::for_request(request);
        if let Some(response) = self.lookup(&fingerprint).await {
            debug!("cache hit");
            return ChatOutcome::Answered(self.finish(request, response, start));
        }

        let budget = deadline.saturating_duration_since(Instant::now());
        let results = self.search.search_within(&request.message, budget).await;
        let citations = SearchAugmenter::citations(&results);
        let prompt = self.composer.compose(request, &citations);

        let response = match self.walk_providers(&prompt, deadline).await {
            Some((provider, content)) => {
                metrics::counter!(telemetry::CITATIONS_TOTAL).increment(citations.len() as u64);
                ChatResponse::generated(content, provider, citations)
            }
            None => {
                let answer = fallback_answer(&request.message);
                metrics::counter!(telemetry::FALLBACK_RESPONSES_TOTAL).increment(1);
                info!(
                    topic = answer.topic.unwrap_or("generic"),
                    "no provider answered, serving fallback guidance"
                );
                ChatResponse::fallback(answer.content)
            }
        };

        self.store(&fingerprint, &response).await;
        ChatOutcome::Answered(self.finish(request, response, start))
    }

    /// Try each provider in priority order until one answers.
    ///
    /// Returns the provider name and completion, or `None` when every
    /// provider was skipped or failed or the budget ran out.
    async fn walk_providers(&self, prompt: &Prompt, deadline: Instant) -> Option<(String, String)> {
        for provider in self.registry.iter() {
            let name = provider.descriptor.name.as_str();
            if !self.tracker.is_available(name) {
                metrics::counter!(telemetry::PROVIDER_SKIPS_TOTAL, "provider" => name.to_owned())
                    .increment(1);
                debug!(provider = name, "provider cooling down, skipping");
                continue;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(provider = name, "request budget exhausted, skipping remaining providers");
                break;
            }

            match self.call(provider, prompt, remaining).await {
                Ok(content) => {
                    self.tracker.mark_success(name);
                    return Some((name.to_string(), content));
                }
                Err(CallError::BudgetExhausted) => {
                    warn!(provider = name, "request budget exhausted during provider call");
                    break;
                }
                Err(CallError::Provider(e)) => {
                    if e.is_provider_failure() {
                        self.tracker.mark_failure(name);
                    }
                    warn!(provider = name, error = %e, "provider failed, trying next");
                }
            }
        }
        None
    }

    /// One bounded provider call, with metrics.
    async fn call(
        &self,
        provider: &RegisteredProvider,
        prompt: &Prompt,
        remaining: Duration,
    ) -> Result<String, CallError> {
        let descriptor = &provider.descriptor;
        let limit = descriptor.timeout.min(remaining);
        let started = Instant::now();

        let result = match tokio::time::timeout(
            limit,
            provider.client.complete(prompt, descriptor.max_tokens),
        )
        .await
        {
            Ok(result) => result.map_err(CallError::Provider),
            // Cut short by the request budget rather than the provider's own timeout
            Err(_) if limit < descriptor.timeout => Err(CallError::BudgetExhausted),
            Err(_) => Err(CallError::Provider(MedgateError::ProviderTimeout {
                provider: descriptor.name.clone(),
                after: limit,
            })),
        };

        let status = match &result {
            Ok(_) => "ok",
            Err(CallError::BudgetExhausted) => "budget_exhausted",
            Err(CallError::Provider(e)) => e.kind(),
        };
        metrics::counter!(telemetry::PROVIDER_CALLS_TOTAL,
            "provider" => descriptor.name.clone(),
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::PROVIDER_CALL_DURATION_SECONDS,
            "provider" => descriptor.name.clone(),
        )
        .record(started.elapsed().as_secs_f64());

        result
    }

    /// Cache lookup; backend trouble is a miss.
    async fn lookup(&self, fingerprint: &Fingerprint) -> Option<ChatResponse> {
        let cache = self.cache.as_ref()?;
        match tokio::time::timeout(CACHE_OP_TIMEOUT, cache.get(fingerprint)).await {
            Ok(Ok(entry)) => entry.map(|e| ChatResponse {
                cached: true,
                ..e.response
            }),
            Ok(Err(e)) => {
                metrics::counter!(telemetry::CACHE_ERRORS_TOTAL).increment(1);
                warn!(backend = cache.backend_name(), error = %e, "cache lookup failed, bypassing cache");
                None
            }
            Err(_) => {
                metrics::counter!(telemetry::CACHE_ERRORS_TOTAL).increment(1);
                warn!(backend = cache.backend_name(), "cache lookup timed out, bypassing cache");
                None
            }
        }
    }

    /// Cache store; failures are logged and absorbed.
    async fn store(&self, fingerprint: &Fingerprint, response: &ChatResponse) {
        let Some(cache) = &self.cache else {
            return;
        };
        match tokio::time::timeout(CACHE_OP_TIMEOUT, cache.store(fingerprint, response)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                metrics::counter!(telemetry::CACHE_ERRORS_TOTAL).increment(1);
                warn!(backend = cache.backend_name(), error = %e, "cache store failed");
            }
            Err(_) => {
                metrics::counter!(telemetry::CACHE_ERRORS_TOTAL).increment(1);
                warn!(backend = cache.backend_name(), "cache store timed out");
            }
        }
    }

    fn finish(&self, request: &ChatRequest, response: ChatResponse, start: Instant) -> ChatResponse {
        let record = AuditRecord::answered(request, &response, start.elapsed());
        Self::record_outcome(record.outcome, start);
        self.audit.record(&record);
        response
    }

    fn record_outcome(outcome: &'static str, start: Instant) {
        metrics::counter!(telemetry::REQUESTS_TOTAL, "outcome" => outcome).increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS, "outcome" => outcome)
            .record(start.elapsed().as_secs_f64());
    }

    /// Provider availability, shared with any background sweeper.
    pub fn tracker(&self) -> &Arc<AvailabilityTracker> {
        &self.tracker
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn cache(&self) -> Option<&ResponseCache> {
        self.cache.as_ref()
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Spawn a task calling [`AvailabilityTracker::reset_stale`] every
    /// `interval`. The task ends when the returned handle is aborted.
    pub fn spawn_stale_sweeper(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let tracker = Arc::clone(&self.tracker);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let changed = tracker.reset_stale(Instant::now());
                if changed > 0 {
                    debug!(changed, "reset stale provider state");
                }
            }
        })
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("providers", &self.registry.names())
            .field("cache", &self.cache.as_ref().map(|c| c.backend_name()))
            .field("search", &self.search.is_enabled())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

enum CallError {
    /// The request budget ran out mid-call; not the provider's fault.
    BudgetExhausted,
    Provider(MedgateError),
}
