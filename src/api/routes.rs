use axum::{
    routing::post,
    Router,
    extract::{Json, State, rejection::JsonRejection},
    response::IntoResponse,
};
use tower_http::cors::{CorsLayer, Any};
use chrono::Utc;
use std::time::Duration;

use crate::api::models::CaptureResponse;
use crate::api::response;
use crate::capture::CaptureOutcome;
use crate::extract::CapturedRequest;
use crate::AppState;

// Upper bound for one capture: discovery, update and create, each with its own timeout.
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(90);

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/capture", post(capture_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state)
}

/// The response is the host's `done` signal, so every path answers with the envelope.
async fn capture_handler(
    State(state): State<AppState>,
    payload: Result<Json<CapturedRequest>, JsonRejection>,
) -> impl IntoResponse {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            let message = rejection.body_text();
            tracing::warn!("Rejected capture payload: {}", message);
            return response::failure(
                rejection.status(),
                CaptureResponse {
                    outcome: CaptureOutcome::rejected(message.clone()),
                    processed_at: Utc::now(),
                },
                message,
            );
        }
    };

    let start_time = std::time::Instant::now();

    let result = tokio::time::timeout(CAPTURE_TIMEOUT, state.capture.process(&req)).await;

    let elapsed = start_time.elapsed();
    tracing::info!("Capture processing took {:?}", elapsed);

    match result {
        Ok(outcome) => response::success(CaptureResponse {
            outcome,
            processed_at: Utc::now(),
        }),
        Err(_) => {
            tracing::error!("Capture timed out after {:?}", elapsed);
            response::error(
                axum::http::StatusCode::GATEWAY_TIMEOUT,
                "Capture processing timed out".to_string(),
            )
        }
    }
}
