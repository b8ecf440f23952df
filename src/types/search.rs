//! Web search evidence types

use serde::{Deserialize, Serialize};

/// Which block of the search response a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Organic,
    FeaturedSnippet,
    KnowledgeGraph,
}

/// A scored candidate from the search API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub kind: ResultKind,
    /// 1.0 for curated medical domains, lower otherwise.
    pub domain_trust: f32,
    /// Combined score in `[0, 1]`, filled in by the scorer.
    pub relevance: f32,
}

impl SearchResult {
    /// Unscored result; trust and relevance start at zero.
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        snippet: impl Into<String>,
        kind: ResultKind,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
            kind,
            domain_trust: 0.0,
            relevance: 0.0,
        }
    }
}

/// Evidence attached to a generated answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub score: f32,
}

impl From<&SearchResult> for Citation {
    fn from(r: &SearchResult) -> Self {
        Citation {
            title: r.title.clone(),
            url: r.url.clone(),
            snippet: r.snippet.clone(),
            score: r.relevance,
        }
    }
}
