//! Web search augmentation.
//!
//! [`SearchAugmenter`] wraps a [`SearchBackend`] and a
//! [`RelevanceScorer`](scoring::RelevanceScorer). It is best-effort by
//! construction: a disabled augmenter, a backend error or a timeout all
//! produce an empty result list, never an error.

pub mod scoring;
pub mod serpapi;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::telemetry;
use crate::types::{Citation, SearchResult};
use crate::{MedgateError, Result};

pub use scoring::{RelevanceScorer, ScoringConfig};
pub use serpapi::SerpApiClient;

/// Default timeout for one search call.
pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(5);

/// An external web search API.
///
/// Implementations return unscored results; scoring is applied by the
/// augmenter.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>>;
}

/// Search settings.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Timeout for the search call. Default: 5s.
    pub timeout: Duration,
    pub scoring: ScoringConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SEARCH_TIMEOUT,
            scoring: ScoringConfig::default(),
        }
    }
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }
}

/// Best-effort evidence lookup.
pub struct SearchAugmenter {
    backend: Option<Arc<dyn SearchBackend>>,
    scorer: RelevanceScorer,
    timeout: Duration,
}

impl SearchAugmenter {
    pub fn new(backend: Arc<dyn SearchBackend>, config: SearchConfig) -> Self {
        Self {
            backend: Some(backend),
            scorer: RelevanceScorer::new(config.scoring),
            timeout: config.timeout,
        }
    }

    /// An augmenter that never searches.
    pub fn disabled() -> Self {
        Self {
            backend: None,
            scorer: RelevanceScorer::default(),
            timeout: DEFAULT_SEARCH_TIMEOUT,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Ranked, filtered, trimmed results for `query`.
    pub async fn search(&self, query: &str) -> Vec<SearchResult> {
        self.search_within(query, self.timeout).await
    }

    /// Like [`search`](Self::search) but bounded by `budget` when it is
    /// tighter than the configured timeout.
    pub async fn search_within(&self, query: &str, budget: Duration) -> Vec<SearchResult> {
        let Some(backend) = &self.backend else {
            return Vec::new();
        };
        let budget = budget.min(self.timeout);

        let outcome = match tokio::time::timeout(budget, backend.search(query)).await {
            Ok(result) => result,
            Err(_) => Err(MedgateError::SearchUnavailable(format!(
                "timed out after {budget:?}"
            ))),
        };

        match outcome {
            Ok(raw) => {
                let found = raw.len();
                let ranked = self.scorer.rank(query, raw);
                debug!(
                    backend = backend.name(),
                    found,
                    kept = ranked.len(),
                    "search results ranked"
                );
                ranked
            }
            Err(e) => {
                metrics::counter!(telemetry::SEARCH_FAILURES_TOTAL).increment(1);
                warn!(backend = backend.name(), error = %e, "search failed, continuing without citations");
                Vec::new()
            }
        }
    }

    /// Citations for ranked results, in rank order.
    pub fn citations(results: &[SearchResult]) -> Vec<Citation> {
        results.iter().map(Citation::from).collect()
    }
}
