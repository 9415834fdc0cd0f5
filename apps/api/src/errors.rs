use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::extract::ExtractError;
use crate::llm_client::GenerationError;
use crate::prompts::TemplateError;
use crate::render::RenderError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Render failed: {0}")]
    Render(#[from] RenderError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ExtractError> for AppError {
    fn from(e: ExtractError) -> Self {
        match e {
            ExtractError::UnsupportedFormat(ext) => AppError::UnsupportedFormat(ext),
            ExtractError::Extraction(reason) => AppError::Extraction(reason),
        }
    }
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::UnsupportedFormat(_) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_FORMAT")
            }
            AppError::Extraction(_) => (StatusCode::UNPROCESSABLE_ENTITY, "EXTRACTION_FAILED"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Template(_) => (StatusCode::INTERNAL_SERVER_ERROR, "TEMPLATE_ERROR"),
            AppError::Generation(GenerationError::Timeout(_)) => {
                (StatusCode::GATEWAY_TIMEOUT, "GENERATION_FAILED")
            }
            AppError::Generation(_) => (StatusCode::BAD_GATEWAY, "GENERATION_FAILED"),
            AppError::Render(_) => (StatusCode::INTERNAL_SERVER_ERROR, "RENDER_FAILED"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::UnsupportedFormat(ext) => {
                format!("Unsupported file format '{ext}'. Upload a .pdf, .docx, .doc, or .txt file.")
            }
            AppError::Extraction(msg) | AppError::Validation(msg) => msg.clone(),
            AppError::Template(e) => {
                tracing::error!("Template error: {e}");
                "A prompt template is misconfigured".to_string()
            }
            AppError::Generation(e) => {
                tracing::error!("Generation error: {e}");
                match e {
                    GenerationError::Timeout(_) => {
                        "The AI provider did not respond in time. Please try again.".to_string()
                    }
                    GenerationError::RateLimited(_) => {
                        "The AI provider is rate limiting requests. Please try again shortly."
                            .to_string()
                    }
                    _ => "The AI provider could not generate a tailored resume".to_string(),
                }
            }
            AppError::Render(e) => {
                tracing::error!("Render error: {e}");
                format!("Could not render the PDF: {e}")
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                "An internal server error occurred".to_string()
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
