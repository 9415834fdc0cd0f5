use axum::extract::Multipart;
use bytes::Bytes;

use crate::errors::AppError;
use crate::models::resume::OptimizationLevel;
use crate::pipeline::TailorRequest;

/// Parses the tailoring form: `resume` (file), `job_description` (text),
/// and an optional `optimization_level`. Unknown fields are ignored.
pub async fn parse_tailor_form(mut multipart: Multipart) -> Result<TailorRequest, AppError> {
    let mut resume: Option<(String, Bytes)> = None;
    let mut job_description: Option<String> = None;
    let mut level = OptimizationLevel::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read form field: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "resume" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read resume file: {e}")))?;
                resume = Some((file_name, data));
            }
            "job_description" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read job_description: {e}")))?;
                job_description = Some(text);
            }
            "optimization_level" => {
                let text = field.text().await.map_err(|e| {
                    AppError::Validation(format!("Failed to read optimization_level: {e}"))
                })?;
                level = text.parse().map_err(AppError::Validation)?;
            }
            _ => {
                // Unknown fields are drained and ignored
                field.bytes().await.map_err(|e| {
                    AppError::Validation(format!("Failed to read form field '{name}': {e}"))
                })?;
            }
        }
    }

    let (file_name, data) =
        resume.ok_or_else(|| AppError::Validation("A resume file is required".to_string()))?;
    if data.is_empty() {
        return Err(AppError::Validation("The uploaded resume file is empty".to_string()));
    }
    let job_description = job_description
        .filter(|jd| !jd.trim().is_empty())
        .ok_or_else(|| AppError::Validation("job_description is required".to_string()))?;

    Ok(TailorRequest {
        file_name,
        data,
        job_description,
        level,
    })
}
