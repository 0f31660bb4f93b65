use serde::{Deserialize, Serialize};

/// Body of `POST /ai/get-review`.
///
/// `code` is optional at the wire level so a missing field produces our 400
/// rather than a deserialization rejection. Unknown fields (some clients
/// send an unused `language`) are ignored.
#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub code: Option<String>,
}

/// Successful review response.
#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub success: bool,
    pub review: String,
}

impl ReviewResponse {
    pub fn new(review: String) -> Self {
        Self { success: true, review }
    }
}
