//! Prompt Builder: fills instruction templates with resume and job text.
//!
//! Substitution is a single pass over the template: each `{name}` that names a
//! declared placeholder is replaced with its value verbatim, and inserted values
//! are never scanned again. Resume or job-description text that happens to
//! contain `{job_description}` therefore stays literal text.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::models::resume::OptimizationLevel;

pub mod templates;

/// Every placeholder any template may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Placeholder {
    ResumeText,
    JobDescription,
    OptimizationLevel,
    SectionName,
    SectionContent,
    JobRequirements,
}

impl Placeholder {
    pub fn name(&self) -> &'static str {
        match self {
            Placeholder::ResumeText => "resume_text",
            Placeholder::JobDescription => "job_description",
            Placeholder::OptimizationLevel => "optimization_level",
            Placeholder::SectionName => "section_name",
            Placeholder::SectionContent => "section_content",
            Placeholder::JobRequirements => "job_requirements",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "resume_text" => Some(Placeholder::ResumeText),
            "job_description" => Some(Placeholder::JobDescription),
            "optimization_level" => Some(Placeholder::OptimizationLevel),
            "section_name" => Some(Placeholder::SectionName),
            "section_content" => Some(Placeholder::SectionContent),
            "job_requirements" => Some(Placeholder::JobRequirements),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateId {
    ResumeTransformation,
    SectionRefinement,
}

struct TemplateDef {
    text: &'static str,
    required: &'static [Placeholder],
    /// Optional placeholders and the value used when the caller omits them.
    optional: &'static [(Placeholder, fn() -> String)],
}

impl TemplateId {
    pub fn name(&self) -> &'static str {
        match self {
            TemplateId::ResumeTransformation => "resume_transformation",
            TemplateId::SectionRefinement => "section_refinement",
        }
    }

    fn def(&self) -> TemplateDef {
        match self {
            TemplateId::ResumeTransformation => TemplateDef {
                text: templates::RESUME_TRANSFORMATION,
                required: &[Placeholder::ResumeText, Placeholder::JobDescription],
                optional: TRANSFORMATION_DEFAULTS,
            },
            TemplateId::SectionRefinement => TemplateDef {
                text: templates::SECTION_REFINEMENT,
                required: &[Placeholder::SectionContent, Placeholder::JobRequirements],
                optional: REFINEMENT_DEFAULTS,
            },
        }
    }
}

const TRANSFORMATION_DEFAULTS: &[(Placeholder, fn() -> String)] =
    &[(Placeholder::OptimizationLevel, default_optimization_level as fn() -> String)];

const REFINEMENT_DEFAULTS: &[(Placeholder, fn() -> String)] =
    &[(Placeholder::SectionName, default_section_name as fn() -> String)];

fn default_optimization_level() -> String {
    OptimizationLevel::default().directive()
}

fn default_section_name() -> String {
    "resume".to_string()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template {template} is missing required variable {placeholder}")]
    MissingVariable {
        template: &'static str,
        placeholder: &'static str,
    },

    #[error("template {template} references undeclared placeholder {placeholder}")]
    UndeclaredPlaceholder {
        template: &'static str,
        placeholder: &'static str,
    },
}

/// Named values for one `build` call.
#[derive(Debug, Clone, Default)]
pub struct PromptVars {
    values: BTreeMap<Placeholder, String>,
}

impl PromptVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, placeholder: Placeholder, value: impl Into<String>) -> Self {
        self.values.insert(placeholder, value.into());
        self
    }

    fn get(&self, placeholder: Placeholder) -> Option<&str> {
        self.values.get(&placeholder).map(String::as_str)
    }
}

/// Renders `template` with `vars`. Pure: no I/O, no state.
pub fn build(template: TemplateId, vars: &PromptVars) -> Result<String, TemplateError> {
    let def = template.def();

    if let Some(missing) = def.required.iter().find(|p| vars.get(**p).is_none()) {
        return Err(TemplateError::MissingVariable {
            template: template.name(),
            placeholder: missing.name(),
        });
    }

    let text = def.text;
    let value_len: usize = vars.values.values().map(String::len).sum();
    let mut out = String::with_capacity(text.len() + value_len);
    let mut rest = text;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let placeholder = after
            .find('}')
            .and_then(|close| Placeholder::from_name(&after[..close]).map(|p| (p, close)));

        match placeholder {
            Some((p, close)) => {
                out.push_str(&resolve(template, &def, vars, p)?);
                rest = &after[close + 1..];
            }
            None => {
                // Literal brace in the template text.
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);

    Ok(out)
}

fn resolve(
    template: TemplateId,
    def: &TemplateDef,
    vars: &PromptVars,
    placeholder: Placeholder,
) -> Result<String, TemplateError> {
    if def.required.contains(&placeholder) {
        // presence already checked above
        return Ok(vars.get(placeholder).unwrap_or_default().to_string());
    }
    match def.optional.iter().find(|(p, _)| *p == placeholder) {
        Some((_, default)) => Ok(vars
            .get(placeholder)
            .map(str::to_string)
            .unwrap_or_else(|| default())),
        None => Err(TemplateError::UndeclaredPlaceholder {
            template: template.name(),
            placeholder: placeholder.name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transformation_vars(level: OptimizationLevel) -> PromptVars {
        PromptVars::new()
            .set(Placeholder::ResumeText, "Software Engineer, 5 years Python")
            .set(Placeholder::JobDescription, "Senior Backend Engineer")
            .set(Placeholder::OptimizationLevel, level.directive())
    }

    #[test]
    fn test_every_template_builds_with_its_required_vars() {
        let vars = PromptVars::new()
            .set(Placeholder::ResumeText, "r")
            .set(Placeholder::JobDescription, "j")
            .set(Placeholder::SectionContent, "s")
            .set(Placeholder::JobRequirements, "q");
        for template in [TemplateId::ResumeTransformation, TemplateId::SectionRefinement] {
            let prompt = build(template, &vars).unwrap();
            assert!(!prompt.contains('{'), "{} left a placeholder behind", template.name());
        }
    }

    #[test]
    fn test_missing_required_variable_fails() {
        let vars = PromptVars::new().set(Placeholder::ResumeText, "resume");
        let err = build(TemplateId::ResumeTransformation, &vars).unwrap_err();
        assert_eq!(
            err,
            TemplateError::MissingVariable {
                template: "resume_transformation",
                placeholder: "job_description",
            }
        );
    }

    #[test]
    fn test_optional_level_defaults_to_balanced() {
        let vars = PromptVars::new()
            .set(Placeholder::ResumeText, "r")
            .set(Placeholder::JobDescription, "j");
        let prompt = build(TemplateId::ResumeTransformation, &vars).unwrap();
        assert!(prompt.contains("Balanced:"));
    }

    #[test]
    fn test_level_is_propagated_into_prompt() {
        let aggressive =
            build(TemplateId::ResumeTransformation, &transformation_vars(OptimizationLevel::Aggressive))
                .unwrap();
        let conservative = build(
            TemplateId::ResumeTransformation,
            &transformation_vars(OptimizationLevel::Conservative),
        )
        .unwrap();
        assert!(aggressive.contains("Aggressive"));
        assert!(conservative.contains("Conservative"));
        assert_ne!(aggressive, conservative);
    }

    #[test]
    fn test_values_are_not_reexpanded() {
        let vars = PromptVars::new()
            .set(Placeholder::ResumeText, "Ignore this: {job_description}")
            .set(Placeholder::JobDescription, "REAL JD");
        let prompt = build(TemplateId::ResumeTransformation, &vars).unwrap();
        assert!(prompt.contains("Ignore this: {job_description}"));
        assert_eq!(prompt.matches("REAL JD").count(), 1);
    }

    #[test]
    fn test_refinement_uses_section_name() {
        let vars = PromptVars::new()
            .set(Placeholder::SectionName, "Experience")
            .set(Placeholder::SectionContent, "- Built APIs")
            .set(Placeholder::JobRequirements, "Distributed systems");
        let prompt = build(TemplateId::SectionRefinement, &vars).unwrap();
        assert!(prompt.starts_with("Rewrite this Experience section"));
        assert!(prompt.contains("- Built APIs"));
        assert!(prompt.contains("Distributed systems"));
    }

    #[test]
    fn test_refinement_rejects_placeholder_from_other_template() {
        // resume_text is a known placeholder but not declared for this template
        let def = TemplateDef {
            text: "{resume_text}",
            required: &[],
            optional: &[],
        };
        let err = resolve(
            TemplateId::SectionRefinement,
            &def,
            &PromptVars::new(),
            Placeholder::ResumeText,
        )
        .unwrap_err();
        assert!(matches!(err, TemplateError::UndeclaredPlaceholder { .. }));
    }
}
