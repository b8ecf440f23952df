//! Medgate error types

use std::time::Duration;

/// Medgate error types
#[derive(Debug, thiserror::Error)]
pub enum MedgateError {
    // Provider errors (recovered by advancing to the next provider)
    #[error("provider '{provider}' timed out after {after:?}")]
    ProviderTimeout { provider: String, after: Duration },

    #[error("provider '{provider}' rejected credentials")]
    ProviderAuth { provider: String },

    #[error("provider '{provider}' quota exhausted")]
    ProviderQuotaExhausted {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("provider '{provider}' returned a malformed response: {detail}")]
    ProviderMalformedResponse { provider: String, detail: String },

    // Network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    // Search errors (recovered by proceeding without citations)
    #[error("search unavailable: {0}")]
    SearchUnavailable(String),

    /// The only condition surfaced to callers.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    // Cache errors (recovered by bypassing the cache)
    #[error("cache backend unavailable: {0}")]
    CacheBackendUnavailable(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Configuration errors
    #[error("no provider configured")]
    NoProvider,

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl MedgateError {
    /// Whether a retry of the same call might succeed.
    ///
    /// Timeouts, quota pushback with a short hint, connection failures and
    /// 5xx responses are transient. Credentials and malformed payloads are not.
    pub fn is_transient(&self) -> bool {
        match self {
            MedgateError::ProviderTimeout { .. } | MedgateError::Http(_) => true,
            MedgateError::ProviderQuotaExhausted { retry_after, .. } => retry_after.is_some(),
            MedgateError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Server-provided retry hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            MedgateError::ProviderQuotaExhausted { retry_after, .. } => *retry_after,
            MedgateError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Whether this error should put the provider that produced it into cooldown.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            MedgateError::ProviderTimeout { .. }
                | MedgateError::ProviderAuth { .. }
                | MedgateError::ProviderQuotaExhausted { .. }
                | MedgateError::ProviderMalformedResponse { .. }
                | MedgateError::Http(_)
                | MedgateError::Api { .. }
                | MedgateError::Json(_)
        )
    }

    /// Short, stable label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            MedgateError::ProviderTimeout { .. } => "timeout",
            MedgateError::ProviderAuth { .. } => "auth",
            MedgateError::ProviderQuotaExhausted { .. } => "quota",
            MedgateError::ProviderMalformedResponse { .. } => "malformed",
            MedgateError::Http(_) => "http",
            MedgateError::Api { .. } => "api",
            MedgateError::SearchUnavailable(_) => "search_unavailable",
            MedgateError::RateLimited { .. } => "rate_limited",
            MedgateError::CacheBackendUnavailable(_) => "cache_unavailable",
            MedgateError::Json(_) => "json",
            MedgateError::NoProvider => "no_provider",
            MedgateError::Configuration(_) => "configuration",
        }
    }
}

/// Result type alias for Medgate operations
pub type Result<T> = std::result::Result<T, MedgateError>;
