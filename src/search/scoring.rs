//! Relevance scoring for search evidence.
//!
//! ```text
//! relevance = trust_weight   * domain_trust
//!           + overlap_weight * keyword_overlap
//!           + kind_weight    * kind_score
//! ```
//!
//! - `domain_trust` is 1.0 when the host is (a subdomain of) a curated
//!   medical domain, [`ScoringConfig::untrusted_trust`] otherwise.
//! - `keyword_overlap` is the fraction of distinct query terms (stop-words
//!   removed) found in title + snippet.
//! - `kind_score` ranks knowledge-graph > featured-snippet > organic.

use std::collections::HashSet;

use serde::Deserialize;

use crate::types::{ResultKind, SearchResult};

/// Curated trusted medical domains.
pub const DEFAULT_TRUSTED_DOMAINS: &[&str] = &[
    "who.int",
    "cdc.gov",
    "nih.gov",
    "medlineplus.gov",
    "fda.gov",
    "nhs.uk",
    "mayoclinic.org",
    "clevelandclinic.org",
    "hopkinsmedicine.org",
    "merckmanuals.com",
    "cochranelibrary.com",
    "bmj.com",
    "nejm.org",
    "thelancet.com",
    "jamanetwork.com",
    "webmd.com",
    "healthline.com",
];

const STOP_WORDS: &[&str] = &[
    "a", "about", "an", "and", "are", "be", "can", "do", "does", "for", "how", "i", "if", "in",
    "is", "it", "me", "my", "of", "on", "or", "should", "the", "to", "what", "when", "which",
    "who", "why", "with", "you",
];

/// Scoring weights, thresholds and the trusted-domain list.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Weight of domain trust. Default: 0.5.
    pub trust_weight: f32,
    /// Weight of keyword overlap. Default: 0.3.
    pub overlap_weight: f32,
    /// Weight of result kind. Default: 0.2.
    pub kind_weight: f32,
    /// Results scoring below this are discarded. Default: 0.3.
    pub min_relevance: f32,
    /// Maximum results kept. Default: 3.
    pub top_k: usize,
    /// Snippets are cut to this many characters. Default: 300.
    pub max_snippet_chars: usize,
    /// Trust assigned to domains outside the curated list. Default: 0.3.
    pub untrusted_trust: f32,
    pub trusted_domains: Vec<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            trust_weight: 0.5,
            overlap_weight: 0.3,
            kind_weight: 0.2,
            min_relevance: 0.3,
            top_k: 3,
            max_snippet_chars: 300,
            untrusted_trust: 0.3,
            trusted_domains: DEFAULT_TRUSTED_DOMAINS
                .iter()
                .map(|d| d.to_string())
                .collect(),
        }
    }
}

impl ScoringConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weights(mut self, trust: f32, overlap: f32, kind: f32) -> Self {
        self.trust_weight = trust;
        self.overlap_weight = overlap;
        self.kind_weight = kind;
        self
    }

    pub fn min_relevance(mut self, threshold: f32) -> Self {
        self.min_relevance = threshold;
        self
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    pub fn max_snippet_chars(mut self, n: usize) -> Self {
        self.max_snippet_chars = n;
        self
    }

    pub fn trusted_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trusted_domains = domains.into_iter().map(Into::into).collect();
        self
    }
}

/// Weight of a result kind, in `[0, 1]`.
pub fn kind_score(kind: ResultKind) -> f32 {
    match kind {
        ResultKind::KnowledgeGraph => 1.0,
        ResultKind::FeaturedSnippet => 0.7,
        ResultKind::Organic => 0.4,
    }
}

/// Scores, filters and ranks search results.
#[derive(Debug, Clone, Default)]
pub struct RelevanceScorer {
    config: ScoringConfig,
}

impl RelevanceScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Trust of the URL's host.
    pub fn domain_trust(&self, url: &str) -> f32 {
        let Some(host) = reqwest::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        else {
            return self.config.untrusted_trust;
        };
        let trusted = self.config.trusted_domains.iter().any(|domain| {
            let domain = domain.to_ascii_lowercase();
            host == domain || host.ends_with(&format!(".{domain}"))
        });
        if trusted {
            1.0
        } else {
            self.config.untrusted_trust
        }
    }

    /// Fill in `domain_trust` and `relevance` for one result.
    pub fn score(&self, query_terms: &HashSet<String>, result: &mut SearchResult) {
        let c = &self.config;
        result.domain_trust = self.domain_trust(&result.url);
        let text = format!("{} {}", result.title, result.snippet);
        let overlap = keyword_overlap(query_terms, &text);
        let relevance = c.trust_weight * result.domain_trust
            + c.overlap_weight * overlap
            + c.kind_weight * kind_score(result.kind);
        result.relevance = relevance.clamp(0.0, 1.0);
    }

    /// Score every result, drop those under the threshold, sort descending,
    /// keep the top-K and trim their snippets.
    pub fn rank(&self, query: &str, results: Vec<SearchResult>) -> Vec<SearchResult> {
        let terms = query_terms(query);
        let mut scored: Vec<SearchResult> = results
            .into_iter()
            .map(|mut r| {
                self.score(&terms, &mut r);
                r
            })
            .filter(|r| r.relevance >= self.config.min_relevance)
            .collect();
        scored.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(self.config.top_k);
        for r in &mut scored {
            r.snippet = truncate_chars(&r.snippet, self.config.max_snippet_chars);
        }
        scored
    }
}

/// Distinct lowercase terms of a query, stop-words removed.
pub fn query_terms(query: &str) -> HashSet<String> {
    tokenize(query)
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

/// Fraction of `terms` present in `text`.
pub fn keyword_overlap(terms: &HashSet<String>, text: &str) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }
    let words: HashSet<String> = tokenize(text).collect();
    let hits = terms.iter().filter(|t| words.contains(*t)).count();
    hits as f32 / terms.len() as f32
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// Cut `text` to at most `max` characters, marking the cut with an ellipsis.
pub fn truncate_chars(text: &str, max: usize) -> String {
    let text = text.trim();
    if max == 0 {
        return String::new();
    }
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
