//! OpenAI-compatible chat completions client.
//!
//! Covers OpenAI itself and the many backends that mirror its
//! `/chat/completions` contract (Groq, OpenRouter, DeepSeek, local servers).
//! See: <https://platform.openai.com/docs/api-reference/chat>

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::http::{check_status, decode_body, default_client, map_send_error, non_empty};
use super::traits::ProviderClient;
use crate::Result;
use crate::prompt::Prompt;

/// Default base URL for OpenAI
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
/// Default base URL for Groq's OpenAI-compatible endpoint
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
/// Default base URL for OpenRouter
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Client for any OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    name: String,
    api_key: String,
    model: String,
    base_url: String,
    http: Client,
}

impl OpenAiCompatibleClient {
    /// Client for api.openai.com.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url("openai", api_key, model, OPENAI_BASE_URL)
    }

    /// Client for Groq.
    pub fn groq(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url("groq", api_key, model, GROQ_BASE_URL)
    }

    /// Client for OpenRouter.
    pub fn openrouter(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url("openrouter", api_key, model, OPENROUTER_BASE_URL)
    }

    /// Client for an arbitrary compatible endpoint (also used for testing with wiremock).
    pub fn with_base_url(
        name: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
            http: default_client(),
        }
    }

    /// Share a connection pool with other clients.
    pub fn http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ProviderClient for OpenAiCompatibleClient {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, prompt), fields(provider = %self.name, model = %self.model))]
    async fn complete(&self, prompt: &Prompt, max_tokens: u32) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let request = CompletionRequest {
            model: &self.model,
            messages: vec![
                WireMessage {
                    role: "system",
                    content: &prompt.system,
                },
                WireMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            max_tokens,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_error(e, &self.name))?;

        check_status(&response, &self.name)?;

        let body: CompletionResponse = decode_body(response, &self.name).await?;
        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        non_empty(text, &self.name)
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
