//! Outbound client for the generative-AI provider.
//!
//! The provider is opaque to the rest of the system: it takes a system
//! instruction plus a prompt and returns review text. Everything is behind
//! the [`GenerateReview`] trait so callers (and tests) never depend on the
//! concrete HTTP client.

use crate::config::ProviderConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error as ThisError;
use tracing::debug;
use url::Url;

#[derive(ThisError, Debug)]
pub enum ProviderError {
    /// The provider did not respond within the configured timeout
    #[error("provider call timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// Network-level failure reaching the provider
    #[error("provider request failed: {0}")]
    Http(reqwest::Error),

    /// The provider answered with a non-success status
    #[error("provider returned status {status}")]
    Status { status: u16, body: String },

    /// The provider answered 2xx but the body was not a usable response
    #[error("provider returned a malformed response: {detail}")]
    MalformedResponse { detail: String },
}

/// A trait for generating a review from a prompt.
/// In practise this is an HTTP call to the Gemini `generateContent` endpoint
/// using the `reqwest` library. See `GeminiProvider` for more info.
#[async_trait]
pub trait GenerateReview: Send + Sync {
    async fn generate(&self, system_instruction: &str, prompt: &str) -> Result<String, ProviderError>;
}

/// The concrete implementation of `GenerateReview`.
pub struct GeminiProvider {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    model: String,
    request_timeout: Duration,
}

impl GeminiProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            request_timeout: config.request_timeout,
        }
    }
}

/// Makes sure a url has a trailing slash.
///
/// This fixes a weird idiosyncracy in rusts 'join' method on urls, where joining URLs like
/// '/hello', 'world' gives you '/world', but '/hello/', 'world' gives you '/hello/world'.
/// Basically, call this before calling .join
fn ensure_slash(url: &Url) -> Url {
    if url.path().ends_with('/') {
        url.clone()
    } else {
        let mut new_url = url.clone();
        let mut path = new_url.path().to_string();
        path.push('/');
        new_url.set_path(&path);
        new_url
    }
}

// Gemini generateContent wire format

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GenerateContentResponse {
    /// Concatenate the text parts of the first candidate.
    fn into_text(self) -> Option<String> {
        let candidate = self.candidates.into_iter().next()?;
        let parts = candidate.content?.parts;
        if parts.is_empty() {
            return None;
        }
        Some(parts.into_iter().map(|p| p.text).collect::<Vec<_>>().join(""))
    }
}

#[async_trait]
impl GenerateReview for GeminiProvider {
    async fn generate(&self, system_instruction: &str, prompt: &str) -> Result<String, ProviderError> {
        let url = ensure_slash(&self.base_url)
            .join(&format!("models/{}:generateContent", self.model))
            .map_err(|e| ProviderError::MalformedResponse {
                detail: format!("failed to construct provider URL: {e}"),
            })?;

        debug!("Requesting review from {}", url);

        let body = GenerateContentRequest {
            system_instruction: Content {
                parts: vec![Part { text: system_instruction }],
            },
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let mut request = self.client.post(url.clone()).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.header("x-goog-api-key", api_key);
        }

        let response = request.timeout(self.request_timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout {
                    timeout: self.request_timeout,
                }
            } else {
                ProviderError::Http(e)
            }
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Provider API error {}: {}", status, body);
            return Err(ProviderError::Status { status, body });
        }

        // Get the response body as text first for logging
        let body_text = response.text().await.map_err(ProviderError::Http)?;
        tracing::debug!("Provider response body: {}", body_text);

        let parsed: GenerateContentResponse = serde_json::from_str(&body_text).map_err(|e| {
            tracing::error!("Failed to parse provider response as JSON. Error: {}", e);
            tracing::error!("Response body was: {}", body_text);
            ProviderError::MalformedResponse { detail: e.to_string() }
        })?;

        parsed.into_text().ok_or_else(|| {
            tracing::error!("Provider response contained no candidate text");
            ProviderError::MalformedResponse {
                detail: "no candidate text in response".to_string(),
            }
        })
    }
}

/// A static implementation of GenerateReview that returns predefined text.
/// Used in tests where no real provider is available.
pub struct StaticReviewProvider {
    review: String,
}

impl StaticReviewProvider {
    pub fn new(review: impl Into<String>) -> Self {
        Self { review: review.into() }
    }
}

#[async_trait]
impl GenerateReview for StaticReviewProvider {
    async fn generate(&self, _system_instruction: &str, _prompt: &str) -> Result<String, ProviderError> {
        Ok(self.review.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_provider(server_uri: &str, timeout: Duration) -> GeminiProvider {
        GeminiProvider::new(&ProviderConfig {
            base_url: Url::parse(server_uri).unwrap(),
            api_key: Some("test-key".to_string()),
            model: "gemini-2.0-flash".to_string(),
            request_timeout: timeout,
        })
    }

    fn candidate_body(text: &str) -> serde_json::Value {
        json!({
            "candidates": [
                { "content": { "parts": [{ "text": text }] } }
            ]
        })
    }

    #[tokio::test]
    async fn test_generate_returns_candidate_text() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(json!({
                "contents": [{ "parts": [{ "text": "Please review this code:\n\nfn main() {}" }] }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body("Looks good")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = test_provider(&mock_server.uri(), Duration::from_secs(5));
        let review = provider
            .generate("You are a reviewer", "Please review this code:\n\nfn main() {}")
            .await
            .unwrap();
        assert_eq!(review, "Looks good");
    }

    #[tokio::test]
    async fn test_generate_concatenates_parts() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [
                    { "content": { "parts": [{ "text": "part one " }, { "text": "part two" }] } }
                ]
            })))
            .mount(&mock_server)
            .await;

        let provider = test_provider(&mock_server.uri(), Duration::from_secs(5));
        let review = provider.generate("sys", "prompt").await.unwrap();
        assert_eq!(review, "part one part two");
    }

    #[tokio::test]
    async fn test_generate_surfaces_provider_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream blew up"))
            .mount(&mock_server)
            .await;

        let provider = test_provider(&mock_server.uri(), Duration::from_secs(5));
        let err = provider.generate("sys", "prompt").await.unwrap_err();
        match err {
            ProviderError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "upstream blew up");
            }
            other => panic!("expected Status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_rejects_malformed_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let provider = test_provider(&mock_server.uri(), Duration::from_secs(5));
        let err = provider.generate("sys", "prompt").await.unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_generate_rejects_empty_candidates() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&mock_server)
            .await;

        let provider = test_provider(&mock_server.uri(), Duration::from_secs(5));
        let err = provider.generate("sys", "prompt").await.unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_generate_times_out() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)).set_body_json(candidate_body("late")))
            .mount(&mock_server)
            .await;

        let provider = test_provider(&mock_server.uri(), Duration::from_millis(200));
        let err = provider.generate("sys", "prompt").await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout { .. }));
    }
}
