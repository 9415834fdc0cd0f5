//! Per-section refinement: a second, focused rewrite of the sections that
//! benefit most from tailoring. Failures never abort the run; the section
//! keeps whatever the full-resume pass produced.

use futures_util::future::join_all;
use serde::Serialize;
use tracing::{error, info, warn};

use super::validation::accept_section_rewrite;
use crate::llm_client::{complete_with_retry, RetryPolicy, TextGenerator};
use crate::models::resume::{GeneratedResume, Section, SectionKind};
use crate::prompts::{self, Placeholder, PromptVars, TemplateId};

/// What happened to each refinement target.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RefinementReport {
    pub refined: Vec<SectionKind>,
    pub fallbacks: Vec<SectionFallback>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionFallback {
    pub section: SectionKind,
    pub reason: String,
}

/// Rewrites every refinement-target section against `job_description`.
///
/// Calls run concurrently and are all awaited before any body is replaced.
/// Every section present on entry is present on return.
pub async fn refine(
    generator: &dyn TextGenerator,
    mut resume: GeneratedResume,
    job_description: &str,
    temperature: f32,
    policy: &RetryPolicy,
) -> (GeneratedResume, RefinementReport) {
    let targets: Vec<Section> = resume
        .sections()
        .iter()
        .filter(|s| s.kind.is_refinement_target())
        .cloned()
        .collect();

    let outcomes = join_all(
        targets
            .iter()
            .map(|section| refine_section(generator, section, job_description, temperature, policy)),
    )
    .await;

    let mut report = RefinementReport::default();
    for (section, outcome) in targets.iter().zip(outcomes) {
        match outcome {
            Ok(body) => {
                resume.replace_body(section.kind, body);
                report.refined.push(section.kind);
            }
            Err(reason) => {
                warn!("Keeping prior {} content: {}", section.kind.slug(), reason);
                report.fallbacks.push(SectionFallback {
                    section: section.kind,
                    reason,
                });
            }
        }
    }

    info!(
        "Refinement finished: {} rewritten, {} kept",
        report.refined.len(),
        report.fallbacks.len()
    );
    (resume, report)
}

async fn refine_section(
    generator: &dyn TextGenerator,
    section: &Section,
    job_description: &str,
    temperature: f32,
    policy: &RetryPolicy,
) -> Result<String, String> {
    let vars = PromptVars::new()
        .set(Placeholder::SectionName, section.heading.as_str())
        .set(Placeholder::SectionContent, section.body.as_str())
        .set(Placeholder::JobRequirements, job_description);

    let prompt = prompts::build(TemplateId::SectionRefinement, &vars).map_err(|e| {
        error!("Section refinement template is broken: {e}");
        format!("template error: {e}")
    })?;

    let raw = complete_with_retry(generator, &prompt, temperature, policy)
        .await
        .map_err(|e| format!("generation failed: {e}"))?;

    accept_section_rewrite(section, &raw).map_err(|e| format!("rewrite rejected: {e}"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::llm_client::GenerationError;
    use crate::sections::split;

    const RESUME: &str = "\
## Summary
Backend engineer.

## Experience
- Built payment APIs in Python

## Skills
- Python, PostgreSQL

## Education
BSc Computer Science
";

    /// Fails every call with a timeout until `failures` calls have been made.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl TextGenerator for Flaky {
        async fn complete(&self, prompt: &str, _t: f32) -> Result<String, GenerationError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(GenerationError::Timeout(Duration::from_secs(60)));
            }
            Ok(refined_body(prompt))
        }
    }

    fn section_of(prompt: &str) -> &'static str {
        if prompt.contains("this Skills section") {
            "skills"
        } else {
            "experience"
        }
    }

    fn refined_body(prompt: &str) -> String {
        format!("- Refined {} aligned with distributed systems", section_of(prompt))
    }

    /// Times out on the first two calls for each section, then succeeds.
    #[derive(Default)]
    struct FailsTwicePerSection {
        calls: Mutex<HashMap<&'static str, u32>>,
    }

    #[async_trait]
    impl TextGenerator for FailsTwicePerSection {
        async fn complete(&self, prompt: &str, _t: f32) -> Result<String, GenerationError> {
            let attempt = {
                let mut calls = self.calls.lock().unwrap();
                let count = calls.entry(section_of(prompt)).or_insert(0);
                *count += 1;
                *count
            };
            if attempt <= 2 {
                return Err(GenerationError::Timeout(Duration::from_secs(60)));
            }
            Ok(refined_body(prompt))
        }
    }

    fn flaky(failures: u32) -> Flaky {
        Flaky {
            failures,
            calls: AtomicU32::new(0),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_third_attempt_success_is_used_for_every_section() {
        let generator = FailsTwicePerSection::default();
        let (resume, report) =
            refine(&generator, split(RESUME), "Distributed systems", 0.7, &RetryPolicy::default()).await;

        assert_eq!(report.refined, vec![SectionKind::Experience, SectionKind::Skills]);
        assert!(report.fallbacks.is_empty());
        assert_eq!(
            resume.get(SectionKind::Experience).unwrap().body,
            "- Refined experience aligned with distributed systems"
        );
        assert_eq!(
            resume.get(SectionKind::Skills).unwrap().body,
            "- Refined skills aligned with distributed systems"
        );

        let calls = generator.calls.lock().unwrap();
        assert_eq!(calls.get("experience"), Some(&3));
        assert_eq!(calls.get("skills"), Some(&3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_transient_failures_are_absorbed() {
        // Two timeouts spread across both sections; retries absorb them.
        let generator = flaky(2);
        let (resume, report) =
            refine(&generator, split(RESUME), "Distributed systems", 0.7, &RetryPolicy::default()).await;

        assert_eq!(report.refined, vec![SectionKind::Experience, SectionKind::Skills]);
        assert!(report.fallbacks.is_empty());
        assert_eq!(
            resume.get(SectionKind::Experience).unwrap().body,
            "- Refined experience aligned with distributed systems"
        );
        assert_eq!(
            resume.get(SectionKind::Skills).unwrap().body,
            "- Refined skills aligned with distributed systems"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_attempts_failing_keeps_prior_content() {
        let generator = flaky(u32::MAX);
        let original = split(RESUME);
        let (resume, report) =
            refine(&generator, original.clone(), "Distributed systems", 0.7, &RetryPolicy::default()).await;

        assert_eq!(resume, original);
        assert!(report.refined.is_empty());
        assert_eq!(report.fallbacks.len(), 2);
        assert!(report.fallbacks[0].reason.contains("timed out"));
        // first attempt plus two retries, per section
        assert_eq!(generator.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_non_target_sections_pass_through() {
        let generator = flaky(0);
        let (resume, _) =
            refine(&generator, split(RESUME), "Distributed systems", 0.7, &RetryPolicy::default()).await;
        assert_eq!(resume.get(SectionKind::Summary).unwrap().body, "Backend engineer.");
        assert_eq!(resume.get(SectionKind::Education).unwrap().body, "BSc Computer Science");
        assert_eq!(resume.kinds(), split(RESUME).kinds());
    }

    #[tokio::test]
    async fn test_rejected_rewrite_falls_back() {
        struct Refuses;

        #[async_trait]
        impl TextGenerator for Refuses {
            async fn complete(&self, _prompt: &str, _t: f32) -> Result<String, GenerationError> {
                Ok("I'm sorry, I cannot help with that request.".into())
            }
        }

        let original = split(RESUME);
        let (resume, report) =
            refine(&Refuses, original.clone(), "Distributed systems", 0.7, &RetryPolicy::default()).await;
        assert_eq!(resume, original);
        assert!(report.fallbacks.iter().all(|f| f.reason.contains("refusal")));
    }

    #[tokio::test]
    async fn test_resume_without_targets_makes_no_calls() {
        let generator = flaky(0);
        let (_, report) = refine(
            &generator,
            split("## Education\nBSc\n"),
            "Distributed systems",
            0.7,
            &RetryPolicy::default(),
        )
        .await;
        assert_eq!(report, RefinementReport::default());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }
}
