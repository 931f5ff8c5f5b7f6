use crate::application::use_cases::generate_badge::{
    GenerateBadgeUseCase, GenerateBadgeUseCaseInput,
};
use crate::infrastructures::adapters::primary::params::FormValues;
use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

// Structure to hold application state (AppState)
pub struct AppState<U> {
    pub use_case: Arc<U>,
    pub badge_service_url: String,
}

#[tracing::instrument(name = "badge_handler", skip(state, params))]
pub async fn badge_handler<U: GenerateBadgeUseCase + Send + Sync + 'static>(
    State(state): State<Arc<AppState<U>>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let input = match GenerateBadgeUseCaseInput::try_from(&FormValues(params)) {
        Ok(input) => input,
        Err(e) => {
            tracing::warn!("Rejected request: {}", e);
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    match state.use_case.execute(input).await {
        Ok(badge) => {
            let url = badge.url(&state.badge_service_url);
            tracing::info!("Redirecting to {}", url);
            Redirect::to(&url).into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

#[tracing::instrument(name = "health_check")]
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub fn create_router<U: GenerateBadgeUseCase + Send + Sync + 'static>(
    app_state: Arc<AppState<U>>,
) -> Router {
    Router::new()
        .route("/", get(badge_handler::<U>))
        .route("/badge", get(badge_handler::<U>))
        .route("/health", get(health_check))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
}
