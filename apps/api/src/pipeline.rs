//! Resume tailoring: orchestrates the full pipeline for one request.
//!
//! Flow: extract → build prompt → generate (with retry) → split →
//!       refine Experience/Skills → merge → export.
//!
//! Nothing is returned until every stage has finished, so a cancelled or
//! failed run never exposes a half-merged resume.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{error, info};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;
use crate::extract::extract_blocking;
use crate::llm_client::{complete_with_retry, GenerationError, RetryPolicy, TextGenerator};
use crate::models::resume::{OptimizationLevel, SourceFormat};
use crate::prompts::{self, Placeholder, PromptVars, TemplateId};
use crate::render::{export_blocking, RenderedOutput};
use crate::sections::validation::accept_document;
use crate::sections::{merge, refine, split, RefinementReport};

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// One tailoring request as received from the interface layer.
#[derive(Debug, Clone)]
pub struct TailorRequest {
    pub file_name: String,
    pub data: Bytes,
    pub job_description: String,
    pub level: OptimizationLevel,
}

/// The finished run: every export format plus what refinement did.
#[derive(Debug, Clone)]
pub struct TailoredResume {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub source_format: SourceFormat,
    pub optimization_level: OptimizationLevel,
    pub output: RenderedOutput,
    pub refinement: RefinementReport,
}

/// Sampling and retry settings, fixed at startup.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub resume_temperature: f32,
    pub section_temperature: f32,
    pub retry: RetryPolicy,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            resume_temperature: config.resume_temperature,
            section_temperature: config.section_temperature,
            retry: RetryPolicy::from_config(config),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct TailorPipeline {
    generator: Arc<dyn TextGenerator>,
    settings: PipelineSettings,
}

impl TailorPipeline {
    pub fn new(generator: Arc<dyn TextGenerator>, settings: PipelineSettings) -> Self {
        Self {
            generator,
            settings,
        }
    }

    /// Runs every stage for one upload.
    ///
    /// Steps:
    /// 1. validate the job description
    /// 2. extract resume text (format dispatch, blocking pool)
    /// 3. build the transformation prompt for the chosen level
    /// 4. generate the tailored resume (retried on transient failures)
    /// 5. split into sections
    /// 6. refine Experience and Skills concurrently (falls back per section)
    /// 7. merge back to markdown
    /// 8. export markdown, HTML and PDF
    pub async fn run(&self, request: TailorRequest) -> Result<TailoredResume, AppError> {
        let run_id = Uuid::new_v4();
        let level = request.level;

        // Step 1
        let job_description = request.job_description.trim().to_string();
        if job_description.is_empty() {
            return Err(AppError::Validation(
                "job_description must not be empty".to_string(),
            ));
        }

        // Step 2
        info!("Run {run_id}: extracting '{}'", request.file_name);
        let document = extract_blocking(request.file_name, request.data).await?;
        info!(
            "Run {run_id}: extracted {} chars from {:?}",
            document.text.len(),
            document.format
        );

        // Step 3
        let vars = PromptVars::new()
            .set(Placeholder::ResumeText, document.text.as_str())
            .set(Placeholder::JobDescription, job_description.as_str())
            .set(Placeholder::OptimizationLevel, level.directive());
        let prompt = prompts::build(TemplateId::ResumeTransformation, &vars).map_err(|e| {
            error!("Run {run_id}: transformation template is broken: {e}");
            AppError::Template(e)
        })?;

        // Step 4
        info!("Run {run_id}: generating tailored resume (level={level})");
        let raw = complete_with_retry(
            self.generator.as_ref(),
            &prompt,
            self.settings.resume_temperature,
            &self.settings.retry,
        )
        .await?;
        let generated = accept_document(&raw)
            .map_err(|e| AppError::Generation(GenerationError::Rejected(e.to_string())))?;

        // Step 5
        let sections = split(&generated);
        info!("Run {run_id}: split into sections {:?}", sections.kinds());

        // Step 6
        let (refined, refinement) = refine(
            self.generator.as_ref(),
            sections,
            &job_description,
            self.settings.section_temperature,
            &self.settings.retry,
        )
        .await;

        // Step 7
        let markdown = merge(&refined);

        // Step 8
        let output = export_blocking(markdown)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("export task failed: {e}")))?;
        info!(
            "Run {run_id}: done ({} chars markdown, pdf={})",
            output.markdown.len(),
            output.pdf.is_some()
        );

        Ok(TailoredResume {
            run_id,
            generated_at: Utc::now(),
            source_format: document.format,
            optimization_level: level,
            output,
            refinement,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::models::resume::SectionKind;

    pub(crate) const GENERATED_RESUME: &str = "\
# Jane Doe
jane@example.com | Berlin

## Summary
Backend engineer with 5 years of Python.

## Experience
- Built payment APIs at Acme

## Skills
- Python, PostgreSQL

## Education
BSc Computer Science, TU Berlin
";

    /// Answers every prompt through a closure and records what it was asked.
    pub(crate) struct StubGenerator<F> {
        respond: F,
        pub(crate) calls: AtomicU32,
        pub(crate) prompts: Mutex<Vec<String>>,
    }

    impl<F> StubGenerator<F>
    where
        F: Fn(&str) -> Result<String, GenerationError> + Send + Sync,
    {
        pub(crate) fn new(respond: F) -> Self {
            Self {
                respond,
                calls: AtomicU32::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl<F> TextGenerator for StubGenerator<F>
    where
        F: Fn(&str) -> Result<String, GenerationError> + Send + Sync,
    {
        async fn complete(&self, prompt: &str, _t: f32) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            (self.respond)(prompt)
        }
    }

    fn between<'a>(text: &'a str, start: &str, end: &str) -> &'a str {
        let from = text.find(start).map(|i| i + start.len()).unwrap_or(0);
        let to = text[from..].find(end).map(|i| from + i).unwrap_or(text.len());
        &text[from..to]
    }

    /// Full rewrites get the fixture; section rewrites echo the job text.
    pub(crate) fn echo(prompt: &str) -> Result<String, GenerationError> {
        if prompt.contains("ORIGINAL SECTION") {
            let job = between(prompt, "JOB REQUIREMENTS:\n<<<\n", "\n>>>");
            Ok(format!("TAILORED: {job}"))
        } else {
            Ok(GENERATED_RESUME.to_string())
        }
    }

    fn pipeline<F>(generator: Arc<StubGenerator<F>>) -> TailorPipeline
    where
        F: Fn(&str) -> Result<String, GenerationError> + Send + Sync + 'static,
    {
        TailorPipeline::new(
            generator,
            PipelineSettings::from_config(&Config::for_tests()),
        )
    }

    fn request(file_name: &str, job: &str, level: OptimizationLevel) -> TailorRequest {
        TailorRequest {
            file_name: file_name.to_string(),
            data: Bytes::from_static(b"Jane Doe\nSoftware Engineer, 5 years Python\n"),
            job_description: job.to_string(),
            level,
        }
    }

    #[tokio::test]
    async fn test_end_to_end_with_echoing_stub() {
        let generator = Arc::new(StubGenerator::new(echo));
        let result = pipeline(generator.clone())
            .run(request(
                "resume.txt",
                "Senior Backend Engineer, distributed systems",
                OptimizationLevel::Balanced,
            ))
            .await
            .unwrap();

        let markdown = &result.output.markdown;
        assert!(markdown.contains("TAILORED: Senior Backend Engineer, distributed systems"));
        assert!(markdown.contains("BSc Computer Science, TU Berlin"));
        assert!(markdown.starts_with("# Jane Doe"));
        assert_eq!(
            result.refinement.refined,
            vec![SectionKind::Experience, SectionKind::Skills]
        );
        assert_eq!(result.source_format, SourceFormat::Txt);
        assert!(result.output.html.contains("section-education"));
        assert!(result.output.pdf.is_some());
        // one full rewrite plus two section rewrites
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_level_and_texts_reach_the_prompt() {
        let generator = Arc::new(StubGenerator::new(echo));
        pipeline(generator.clone())
            .run(request("cv.txt", "Platform Engineer", OptimizationLevel::Aggressive))
            .await
            .unwrap();

        let prompts = generator.prompts.lock().unwrap();
        let first = prompts
            .iter()
            .find(|p| !p.contains("ORIGINAL SECTION"))
            .unwrap();
        assert!(first.contains("Aggressive:"));
        assert!(first.contains("Software Engineer, 5 years Python"));
        assert!(first.contains("Platform Engineer"));
    }

    #[tokio::test]
    async fn test_unsupported_format_makes_no_generation_call() {
        let generator = Arc::new(StubGenerator::new(echo));
        let err = pipeline(generator.clone())
            .run(request("resume.rtf", "Backend Engineer", OptimizationLevel::Balanced))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedFormat(ref ext) if ext == "rtf"));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_job_description_is_rejected() {
        let generator = Arc::new(StubGenerator::new(echo));
        let err = pipeline(generator.clone())
            .run(request("resume.txt", "  \n ", OptimizationLevel::Balanced))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_permanent_generation_failure_aborts() {
        let generator = Arc::new(StubGenerator::new(|_: &str| {
            Err(GenerationError::Authentication {
                status: 401,
                message: "invalid x-api-key".into(),
            })
        }));
        let err = pipeline(generator.clone())
            .run(request("resume.txt", "Backend Engineer", OptimizationLevel::Balanced))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Generation(GenerationError::Authentication { .. })
        ));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_then_success() {
        let attempts = AtomicU32::new(0);
        let generator = Arc::new(StubGenerator::new(move |prompt: &str| {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                return Err(GenerationError::Timeout(Duration::from_secs(60)));
            }
            echo(prompt)
        }));
        let result = pipeline(generator.clone())
            .run(request("resume.txt", "Backend Engineer", OptimizationLevel::Balanced))
            .await
            .unwrap();
        assert!(result.output.markdown.contains("TAILORED: Backend Engineer"));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_refinement_failures_keep_generated_sections() {
        let generator = Arc::new(StubGenerator::new(|prompt: &str| {
            if prompt.contains("ORIGINAL SECTION") {
                Err(GenerationError::InvalidRequest {
                    status: 400,
                    message: "prompt too long".into(),
                })
            } else {
                Ok(GENERATED_RESUME.to_string())
            }
        }));
        let result = pipeline(generator)
            .run(request("resume.txt", "Backend Engineer", OptimizationLevel::Balanced))
            .await
            .unwrap();
        assert!(result.output.markdown.contains("- Built payment APIs at Acme"));
        assert!(result.output.markdown.contains("- Python, PostgreSQL"));
        assert_eq!(result.refinement.fallbacks.len(), 2);
    }

    #[tokio::test]
    async fn test_ai_wording_in_resume_is_not_a_refusal() {
        let generator = Arc::new(StubGenerator::new(|prompt: &str| {
            if prompt.contains("ORIGINAL SECTION") {
                echo(prompt)
            } else {
                Ok(GENERATED_RESUME.replace(
                    "Backend engineer with 5 years of Python.",
                    "As an AI platform lead, served as an Air Force analyst first.",
                ))
            }
        }));
        let result = pipeline(generator)
            .run(request("resume.txt", "ML Engineer", OptimizationLevel::Balanced))
            .await
            .unwrap();
        assert!(result.output.markdown.contains("As an AI platform lead"));
        assert!(result.refinement.fallbacks.is_empty());
    }

    #[tokio::test]
    async fn test_refused_rewrite_is_a_generation_error() {
        let generator = Arc::new(StubGenerator::new(|_: &str| {
            Ok("I'm sorry, but I can't help with that.".to_string())
        }));
        let err = pipeline(generator)
            .run(request("resume.txt", "Backend Engineer", OptimizationLevel::Balanced))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Generation(GenerationError::Rejected(_))));
    }
}
