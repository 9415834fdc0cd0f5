use axum::{
    extract::{Multipart, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::upload::parse_tailor_form;
use crate::errors::AppError;
use crate::models::resume::{OptimizationLevel, SourceFormat};
use crate::pipeline::TailoredResume;
use crate::render::RenderError;
use crate::sections::RefinementReport;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TailorResponse {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub source_format: SourceFormat,
    pub optimization_level: OptimizationLevel,
    pub markdown: String,
    pub html: String,
    pub pdf_base64: Option<String>,
    pub pdf_error: Option<String>,
    pub refinement: RefinementReport,
}

impl From<TailoredResume> for TailorResponse {
    fn from(result: TailoredResume) -> Self {
        Self {
            run_id: result.run_id,
            generated_at: result.generated_at,
            source_format: result.source_format,
            optimization_level: result.optimization_level,
            markdown: result.output.markdown,
            html: result.output.html,
            pdf_base64: result.output.pdf.map(|bytes| STANDARD.encode(bytes)),
            pdf_error: result.output.pdf_error,
            refinement: result.refinement,
        }
    }
}

/// POST /api/v1/resumes/tailor
pub async fn handle_tailor(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<TailorResponse>, AppError> {
    let request = parse_tailor_form(multipart).await?;
    let result = state.pipeline.run(request).await?;
    Ok(Json(result.into()))
}

/// POST /api/v1/resumes/tailor/pdf
/// Same input as `handle_tailor`; responds with the PDF alone.
pub async fn handle_tailor_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let request = parse_tailor_form(multipart).await?;
    let result = state.pipeline.run(request).await?;

    match result.output.pdf {
        Some(bytes) => Ok((
            [
                (header::CONTENT_TYPE, "application/pdf"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"tailored-resume.pdf\"",
                ),
            ],
            bytes,
        )
            .into_response()),
        None => Err(AppError::Render(RenderError::Pdf(
            result
                .output
                .pdf_error
                .unwrap_or_else(|| "no PDF was produced".to_string()),
        ))),
    }
}
