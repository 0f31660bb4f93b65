//! Review client: the editor-side state machine.
//!
//! Holds the current code text and the latest review state, and drives the
//! HTTP call to the review endpoint. One submission is one round trip:
//! `idle -> loading -> (ready | failed)`, with `clear` resetting from any
//! state. No retry, no debounce; exclusive `&mut self` access keeps a
//! single request outstanding.

use crate::render::{Block, render_blocks};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use url::Url;

/// Where the client is in the submit cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewState {
    Idle,
    Loading,
    Ready(String),
    Failed(String),
}

/// Wire shape of the endpoint's responses, success or error.
#[derive(Debug, Deserialize)]
struct WireResponse {
    success: bool,
    review: Option<String>,
    error: Option<String>,
}

pub struct ReviewClient {
    endpoint: Url,
    http: reqwest::Client,
    code: String,
    state: ReviewState,
}

impl ReviewClient {
    /// `endpoint` is the full review URL, e.g. `http://host:3000/ai/get-review`.
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            http: reqwest::Client::new(),
            code: String::new(),
            state: ReviewState::Idle,
        }
    }

    pub fn set_code(&mut self, code: impl Into<String>) {
        self.code = code.into();
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn state(&self) -> &ReviewState {
        &self.state
    }

    /// Submit the current code for review.
    ///
    /// A loose client-side guard rejects empty input without a network
    /// call; the server remains the authority on what counts as code.
    pub async fn submit(&mut self) {
        if self.code.trim().is_empty() {
            self.state = ReviewState::Failed("Please enter some code to review.".to_string());
            return;
        }

        self.state = ReviewState::Loading;

        let response = self.http.post(self.endpoint.clone()).json(&json!({ "code": self.code })).send().await;

        self.state = match response {
            Ok(response) => {
                let status = response.status();
                match response.json::<WireResponse>().await {
                    Ok(WireResponse {
                        success: true,
                        review: Some(review),
                        ..
                    }) => ReviewState::Ready(review),
                    Ok(WireResponse { error: Some(error), .. }) => ReviewState::Failed(error),
                    Ok(_) | Err(_) => {
                        debug!("Unexpected response from review endpoint (status {})", status);
                        ReviewState::Failed("Failed to get AI review".to_string())
                    }
                }
            }
            Err(e) => {
                debug!("Review request failed: {}", e);
                ReviewState::Failed("Failed to reach the review service".to_string())
            }
        };
    }

    /// Reset code and review state. Synchronous, no side effects.
    pub fn clear(&mut self) {
        self.code.clear();
        self.state = ReviewState::Idle;
    }

    /// Display blocks for the current review, empty unless a review is ready.
    pub fn blocks(&self) -> Vec<Block> {
        match &self.state {
            ReviewState::Ready(review) => render_blocks(review),
            _ => Vec::new(),
        }
    }
}
