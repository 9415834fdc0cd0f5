pub mod health;
pub mod index;
pub mod tailor;
pub mod upload;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index::index_handler))
        .route("/health", get(health::health_handler))
        .route("/api/v1/resumes/tailor", post(tailor::handle_tailor))
        .route("/api/v1/resumes/tailor/pdf", post(tailor::handle_tailor_pdf))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .with_state(state)
}
