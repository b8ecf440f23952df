//! HTTP helpers shared by the backend clients.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::{MedgateError, Result};

/// Default per-request timeout for the underlying HTTP client.
///
/// The orchestrator applies the tighter per-provider timeout on top.
pub(crate) const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Build the HTTP client used when none is shared in.
pub(crate) fn default_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(DEFAULT_HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Map a transport-level failure.
pub(crate) fn map_send_error(err: reqwest::Error, provider: &str) -> MedgateError {
    if err.is_timeout() {
        MedgateError::ProviderTimeout {
            provider: provider.to_string(),
            after: DEFAULT_HTTP_TIMEOUT,
        }
    } else {
        MedgateError::Http(err.to_string())
    }
}

/// Check response status and map to the provider error taxonomy.
pub(crate) fn check_status(response: &reqwest::Response, provider: &str) -> Result<()> {
    let status = response.status();

    if status.is_success() {
        return Ok(());
    }

    match status.as_u16() {
        401 | 403 => Err(MedgateError::ProviderAuth {
            provider: provider.to_string(),
        }),
        402 | 429 => {
            // Try to parse retry-after header
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);
            Err(MedgateError::ProviderQuotaExhausted {
                provider: provider.to_string(),
                retry_after,
            })
        }
        408 | 504 => Err(MedgateError::ProviderTimeout {
            provider: provider.to_string(),
            after: DEFAULT_HTTP_TIMEOUT,
        }),
        code => Err(MedgateError::Api {
            status: code,
            message: format!("{provider} API error: {status}"),
        }),
    }
}

/// Decode a 2xx body; anything undecodable is a malformed response.
pub(crate) async fn decode_body<T: DeserializeOwned>(
    response: reqwest::Response,
    provider: &str,
) -> Result<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| map_send_error(e, provider))?;
    serde_json::from_slice(&bytes).map_err(|e| MedgateError::ProviderMalformedResponse {
        provider: provider.to_string(),
        detail: e.to_string(),
    })
}

/// Reject empty completions.
pub(crate) fn non_empty(text: String, provider: &str) -> Result<String> {
    if text.trim().is_empty() {
        return Err(MedgateError::ProviderMalformedResponse {
            provider: provider.to_string(),
            detail: "empty completion".to_string(),
        });
    }
    Ok(text)
}
