//! SerpAPI Google search client.
//!
//! See: <https://serpapi.com/search-api>
//!
//! Maps the three blocks the pipeline cares about:
//! - `organic_results[]` → [`ResultKind::Organic`]
//! - `answer_box` → [`ResultKind::FeaturedSnippet`]
//! - `knowledge_graph` → [`ResultKind::KnowledgeGraph`]

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use super::SearchBackend;
use crate::types::{ResultKind, SearchResult};
use crate::{MedgateError, Result};

/// Default base URL for SerpAPI
pub const SERPAPI_BASE_URL: &str = "https://serpapi.com";

/// Organic results requested per query.
const DEFAULT_NUM_RESULTS: u32 = 10;

#[derive(Clone)]
pub struct SerpApiClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl SerpApiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, SERPAPI_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            http: Client::new(),
        }
    }

    pub fn http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }
}

#[async_trait]
impl SearchBackend for SerpApiClient {
    fn name(&self) -> &str {
        "serpapi"
    }

    #[instrument(skip(self, query))]
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let url = format!("{}/search.json", self.base_url.trim_end_matches('/'));
        let num = DEFAULT_NUM_RESULTS.to_string();

        let response = self
            .http
            .get(&url)
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("num", num.as_str()),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| MedgateError::SearchUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MedgateError::SearchUnavailable(format!(
                "search API returned {status}"
            )));
        }

        let body: SerpResponse = response
            .json()
            .await
            .map_err(|e| MedgateError::SearchUnavailable(e.to_string()))?;

        if let Some(error) = body.error {
            return Err(MedgateError::SearchUnavailable(error));
        }

        Ok(body.into_results())
    }
}

#[derive(Deserialize)]
struct SerpResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
    #[serde(default)]
    answer_box: Option<AnswerBox>,
    #[serde(default)]
    knowledge_graph: Option<KnowledgeGraph>,
}

#[derive(Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

#[derive(Deserialize)]
struct AnswerBox {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    answer: Option<String>,
}

#[derive(Deserialize)]
struct KnowledgeGraph {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    source: Option<KnowledgeGraphSource>,
}

#[derive(Deserialize)]
struct KnowledgeGraphSource {
    #[serde(default)]
    link: Option<String>,
}

impl SerpResponse {
    fn into_results(self) -> Vec<SearchResult> {
        let mut results = Vec::new();

        if let Some(kg) = self.knowledge_graph {
            let url = kg.source.and_then(|s| s.link).or(kg.website);
            if let (Some(url), Some(description)) = (url, kg.description) {
                results.push(SearchResult::new(
                    url,
                    kg.title.unwrap_or_default(),
                    description,
                    ResultKind::KnowledgeGraph,
                ));
            }
        }

        if let Some(answer) = self.answer_box {
            let text = answer.snippet.or(answer.answer);
            if let (Some(url), Some(text)) = (answer.link, text) {
                results.push(SearchResult::new(
                    url,
                    answer.title.unwrap_or_default(),
                    text,
                    ResultKind::FeaturedSnippet,
                ));
            }
        }

        results.extend(
            self.organic_results
                .into_iter()
                .filter(|r| !r.link.is_empty())
                .map(|r| SearchResult::new(r.link, r.title, r.snippet, ResultKind::Organic)),
        );

        results
    }
}
