//! The review service: input validation, prompt construction, and the
//! provider call. This is the server-side core of the system - everything
//! else is transport.

pub mod heuristic;

use crate::errors::{Error, Result};
use crate::provider::GenerateReview;
use std::sync::Arc;
use tracing::instrument;

pub use heuristic::looks_like_code;

/// Fixed instruction preamble prepended to the submitted code.
pub const PROMPT_PREAMBLE: &str = "Please review this code:\n\n";

/// The system instruction sent with every provider call. Treated as opaque
/// configuration: the service never inspects or varies it per request.
pub const SYSTEM_INSTRUCTION: &str = r#"You are a senior software engineer and expert code reviewer with broad
experience across programming languages. Given a code snippet, produce a
comprehensive, structured review.

Always answer in Markdown using this exact structure:

## Overview
Briefly summarize what the code does and its intended purpose.

## Issues / Observations
List problems in bullet form, categorized as:
- **Logic Issues** - incorrect or incomplete behavior.
- **Performance Bottlenecks** - inefficiencies, unnecessary computations.
- **Security Risks** - unsafe practices or vulnerabilities.
- **Best Practice Violations** - style, naming, DRY/SOLID violations.
- **Maintainability & Readability** - clarity, modularity, comments.

## Recommendations
Explain how to fix or improve each issue above, with rationale.

## Refactored Code
Provide a clean, corrected version of the code in a fenced code block with
the appropriate language tag, following modern conventions.

## Final Thoughts
Summarize the impact of your improvements and any further suggestions for
scalability, testing, or documentation.

Guidelines: maintain a constructive, encouraging tone; prefer clarity over
extreme optimization; highlight testability, error handling, and security
hygiene where relevant; keep the response well-structured with consistent
headings."#;

/// Orchestrates a single review: validate, build the prompt, call the provider.
///
/// Constructed once at process start from configuration and shared across
/// requests; it holds no per-request state.
pub struct ReviewService {
    provider: Arc<dyn GenerateReview>,
}

impl ReviewService {
    pub fn new(provider: Arc<dyn GenerateReview>) -> Self {
        Self { provider }
    }

    /// Validate the submitted code and return the provider's review text.
    ///
    /// Validation failures never reach the provider.
    #[instrument(skip_all, fields(code_len = code.len()))]
    pub async fn review(&self, code: &str) -> Result<String> {
        if code.is_empty() {
            return Err(Error::validation("Code is required"));
        }
        if code.len() < 2 {
            return Err(Error::validation("Input is too short to be valid code"));
        }
        if !looks_like_code(code) {
            return Err(Error::validation(
                "Input doesn't appear to be code. Please submit valid programming code for review.",
            ));
        }

        let prompt = format!("{PROMPT_PREAMBLE}{code}");
        let review = self.provider.generate(SYSTEM_INSTRUCTION, &prompt).await?;
        Ok(review)
    }
}
