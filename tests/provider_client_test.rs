//! Wire-level tests for the provider clients using wiremock.

use medgate::MedgateError;
use medgate::prompt::Prompt;

fn prompt() -> Prompt {
    Prompt {
        system: "You are a careful medical assistant.".to_string(),
        user: "What helps a headache?".to_string(),
    }
}

#[cfg(feature = "openai")]
mod openai {
    use super::*;

    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use medgate::providers::{OpenAiCompatibleClient, ProviderClient};

    fn client(server: &MockServer) -> OpenAiCompatibleClient {
        OpenAiCompatibleClient::with_base_url("groq", "sk-test", "llama-3.1-8b", server.uri())
    }

    #[tokio::test]
    async fn completion_text_returned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "llama-3.1-8b",
                "max_tokens": 256,
                "messages": [
                    { "role": "system", "content": "You are a careful medical assistant." },
                    { "role": "user", "content": "What helps a headache?" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-1",
                "choices": [
                    { "index": 0, "message": { "role": "assistant", "content": "Rest and fluids." } }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = client(&server).complete(&prompt(), 256).await.unwrap();
        assert_eq!(text, "Rest and fluids.");
        assert_eq!(client(&server).name(), "groq");
    }

    #[tokio::test]
    async fn unauthorized_maps_to_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client(&server).complete(&prompt(), 256).await.unwrap_err();
        assert!(matches!(err, MedgateError::ProviderAuth { ref provider } if provider == "groq"));
        assert!(err.is_provider_failure());
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn too_many_requests_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "12"))
            .mount(&server)
            .await;

        let err = client(&server).complete(&prompt(), 256).await.unwrap_err();
        assert!(matches!(err, MedgateError::ProviderQuotaExhausted { .. }));
        assert_eq!(err.retry_after(), Some(std::time::Duration::from_secs(12)));
    }

    #[tokio::test]
    async fn server_error_maps_to_api() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client(&server).complete(&prompt(), 256).await.unwrap_err();
        assert!(matches!(err, MedgateError::Api { status: 503, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn garbage_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client(&server).complete(&prompt(), 256).await.unwrap_err();
        assert!(matches!(err, MedgateError::ProviderMalformedResponse { .. }));
    }

    #[tokio::test]
    async fn empty_choices_are_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let err = client(&server).complete(&prompt(), 256).await.unwrap_err();
        assert!(matches!(err, MedgateError::ProviderMalformedResponse { .. }));
    }

    #[tokio::test]
    async fn connection_refused_is_http_error() {
        let client = OpenAiCompatibleClient::with_base_url(
            "local",
            "sk-test",
            "model",
            "http://127.0.0.1:1",
        );
        let err = client.complete(&prompt(), 16).await.unwrap_err();
        assert!(matches!(err, MedgateError::Http(_)));
        assert!(err.is_provider_failure());
    }
}

#[cfg(feature = "anthropic")]
mod anthropic {
    use super::*;

    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use medgate::providers::{AnthropicClient, ProviderClient};

    #[tokio::test]
    async fn text_blocks_are_joined() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "ak-test"))
            .and(header_exists("anthropic-version"))
            .and(body_partial_json(json!({
                "model": "claude-haiku",
                "max_tokens": 128,
                "system": "You are a careful medical assistant.",
                "messages": [{ "role": "user", "content": "What helps a headache?" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "type": "message",
                "content": [
                    { "type": "text", "text": "Rest, " },
                    { "type": "tool_use", "id": "t1", "name": "noop", "input": {} },
                    { "type": "text", "text": "and fluids." }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = AnthropicClient::with_base_url("ak-test", "claude-haiku", server.uri());
        let text = client.complete(&prompt(), 128).await.unwrap();
        assert_eq!(text, "Rest, and fluids.");
    }

    #[tokio::test]
    async fn forbidden_maps_to_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = AnthropicClient::with_base_url("ak-test", "claude-haiku", server.uri());
        let err = client.complete(&prompt(), 128).await.unwrap_err();
        assert!(matches!(err, MedgateError::ProviderAuth { ref provider } if provider == "anthropic"));
    }
}

#[cfg(feature = "gemini")]
mod gemini {
    use super::*;

    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use medgate::providers::{GeminiClient, ProviderClient};

    #[tokio::test]
    async fn candidate_parts_are_joined() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .and(header("x-goog-api-key", "g-test"))
            .and(body_partial_json(json!({
                "systemInstruction": { "parts": [{ "text": "You are a careful medical assistant." }] },
                "generationConfig": { "maxOutputTokens": 64 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [{ "text": "Rest " }, { "text": "helps." }] }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url("g-test", "gemini-1.5-flash", server.uri());
        let text = client.complete(&prompt(), 64).await.unwrap();
        assert_eq!(text, "Rest helps.");
    }

    #[tokio::test]
    async fn blocked_candidate_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "finishReason": "SAFETY" }]
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url("g-test", "gemini-1.5-flash", server.uri());
        let err = client.complete(&prompt(), 64).await.unwrap_err();
        assert!(matches!(err, MedgateError::ProviderMalformedResponse { .. }));
    }
}
