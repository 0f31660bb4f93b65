use crate::AppState;
use crate::api::models::review::{ReviewRequest, ReviewResponse};
use crate::errors::Error;
use axum::{Json, extract::State};

// POST /ai/get-review - Validate the submitted code and return the AI review
pub async fn get_review(
    State(state): State<AppState>,
    Json(request): Json<ReviewRequest>,
) -> Result<Json<ReviewResponse>, Error> {
    let code = request.code.unwrap_or_default();
    if code.is_empty() {
        return Err(Error::validation("Code is required"));
    }

    let review = state.service.review(&code).await?;
    Ok(Json(ReviewResponse::new(review)))
}

// GET / - Static greeting, health-check-like
pub async fn greeting() -> &'static str {
    "coderev is running"
}
