//! Telemetry metric name constants.
//!
//! Centralised metric names for medgate operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `medgate_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider` — provider name (e.g. "openai", "groq")
//! - `status` — outcome: "ok" or an error kind ("timeout", "auth", ...)
//! - `outcome` — request outcome: "generated", "cached", "fallback", "rate_limited"

/// Total chat requests handled by the orchestrator.
///
/// Labels: `outcome`.
pub const REQUESTS_TOTAL: &str = "medgate_requests_total";

/// End-to-end request duration in seconds.
pub const REQUEST_DURATION_SECONDS: &str = "medgate_request_duration_seconds";

/// Total provider calls.
///
/// Labels: `provider`, `status`.
pub const PROVIDER_CALLS_TOTAL: &str = "medgate_provider_calls_total";

/// Provider call duration in seconds.
///
/// Labels: `provider`.
pub const PROVIDER_CALL_DURATION_SECONDS: &str = "medgate_provider_call_duration_seconds";

/// Providers skipped because they were cooling down.
///
/// Labels: `provider`.
pub const PROVIDER_SKIPS_TOTAL: &str = "medgate_provider_skips_total";

/// Times a provider entered (or extended) a cooldown.
///
/// Labels: `provider`.
pub const COOLDOWNS_TOTAL: &str = "medgate_cooldowns_total";

/// Total retry attempts (not counting the initial call).
///
/// Labels: `provider`.
pub const RETRIES_TOTAL: &str = "medgate_retries_total";

/// Response cache hits.
pub const CACHE_HITS_TOTAL: &str = "medgate_cache_hits_total";

/// Response cache misses.
pub const CACHE_MISSES_TOTAL: &str = "medgate_cache_misses_total";

/// Cache operations that failed against the backend and were bypassed.
pub const CACHE_ERRORS_TOTAL: &str = "medgate_cache_errors_total";

/// Requests denied by the rate limiter.
pub const RATE_LIMITED_TOTAL: &str = "medgate_rate_limited_total";

/// Deterministic fallback responses served.
pub const FALLBACK_RESPONSES_TOTAL: &str = "medgate_fallback_responses_total";

/// Web searches that failed and were replaced by zero citations.
pub const SEARCH_FAILURES_TOTAL: &str = "medgate_search_failures_total";

/// Citations attached to generated responses.
pub const CITATIONS_TOTAL: &str = "medgate_citations_total";
