//! Verification endpoint.

use axum::{debug_handler, extract::State};

use gatehouse_model::{request::VerifyRequest, response::VerifyResponse};

use crate::app::{AppError, AppJson, AppState, Payload};
use crate::verify::Verification;

/// Runs a verification for the code the callback page received.
#[debug_handler]
pub async fn process(
    State(state): State<AppState>,
    Payload(request): Payload<VerifyRequest>,
) -> Result<AppJson<VerifyResponse>, AppError> {
    let verified = Verification::new(&state).run(&request).await?;

    Ok(AppJson(verified.into()))
}
