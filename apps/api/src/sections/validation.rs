//! Sanity checks applied to model output before it replaces resume content.

use thiserror::Error;

use super::classify_heading;
use crate::models::resume::Section;

/// Rewrites shorter than this are rejected outright.
const MIN_OUTPUT_CHARS: usize = 20;
/// Originals at least this long must not shrink below `MIN_RETAINED_RATIO`.
const RATIO_CHECK_MIN_ORIGINAL: usize = 200;
const MIN_RETAINED_RATIO: f32 = 0.2;

/// Phrases a refusal opens with. Only matched at the very start of the
/// response and on whole words, so resume text such as "served as an
/// Air Force officer" never counts.
const REFUSAL_OPENINGS: &[&str] = &[
    "i'm sorry",
    "i am sorry",
    "sorry, but",
    "i cannot",
    "i can't",
    "i can not",
    "i am unable",
    "i'm unable",
    "i won't",
    "unfortunately, i",
    "as an ai,",
    "as an ai language model",
    "as an ai assistant",
    "as an ai model",
    "as a language model",
];

/// Lead-ins the model sometimes puts before the content it was asked for.
const LEAD_IN_PREFIXES: &[&str] = &["here is", "here's", "sure", "certainly"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("response was empty")]
    Empty,

    #[error("response too short ({chars} chars)")]
    TooShort { chars: usize },

    #[error("response looks truncated ({chars} chars from a {original}-char original)")]
    Truncated { chars: usize, original: usize },

    #[error("response looks like a refusal")]
    Refusal,
}

/// Cleans a section rewrite and decides whether it may replace `original`.
pub fn accept_section_rewrite(original: &Section, candidate: &str) -> Result<String, RejectReason> {
    let text = strip_repeated_heading(original, unwrap_response(candidate));

    if text.is_empty() {
        return Err(RejectReason::Empty);
    }
    if looks_like_refusal(text) {
        return Err(RejectReason::Refusal);
    }

    let chars = text.chars().count();
    if chars < MIN_OUTPUT_CHARS {
        return Err(RejectReason::TooShort { chars });
    }
    let original_chars = original.body.chars().count();
    if original_chars >= RATIO_CHECK_MIN_ORIGINAL
        && (chars as f32) < original_chars as f32 * MIN_RETAINED_RATIO
    {
        return Err(RejectReason::Truncated {
            chars,
            original: original_chars,
        });
    }

    Ok(text.to_string())
}

/// Cleans a whole-resume rewrite. Only emptiness and refusals are rejected;
/// the splitter copes with any remaining shape.
pub fn accept_document(candidate: &str) -> Result<String, RejectReason> {
    let text = unwrap_response(candidate);
    if text.is_empty() {
        return Err(RejectReason::Empty);
    }
    if looks_like_refusal(text) {
        return Err(RejectReason::Refusal);
    }
    Ok(text.to_string())
}

/// True when the response opens with a refusal instead of content.
pub fn looks_like_refusal(text: &str) -> bool {
    let first_line = text.trim_start().lines().next().unwrap_or("");
    let opening = first_line
        .trim_start_matches(|c: char| matches!(c, '*' | '_' | '>' | '"') || c.is_whitespace())
        .replace('\u{2019}', "'")
        .to_lowercase();
    REFUSAL_OPENINGS
        .iter()
        .any(|phrase| starts_with_phrase(&opening, phrase))
}

/// Prefix match that ends on a word boundary.
fn starts_with_phrase(text: &str, phrase: &str) -> bool {
    text.strip_prefix(phrase)
        .is_some_and(|rest| !rest.starts_with(|c: char| c.is_alphanumeric()))
}

/// Peels a conversational lead-in and a code fence off, in either order.
fn unwrap_response(raw: &str) -> &str {
    strip_lead_in(strip_code_fences(strip_lead_in(raw.trim())))
}

/// Removes a wrapping ```markdown fence if present.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // skip the info string (```markdown, ```md)
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().trim_end_matches("```").trim()
}

fn strip_lead_in(text: &str) -> &str {
    let (first, rest) = text.split_once('\n').unwrap_or((text, ""));
    let lower = first.trim().to_lowercase();
    if lower.ends_with(':') && LEAD_IN_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        rest.trim()
    } else {
        text
    }
}

/// Drops a first line that only repeats the section's own header.
fn strip_repeated_heading<'a>(original: &Section, text: &'a str) -> &'a str {
    let (first, rest) = text.split_once('\n').unwrap_or((text, ""));
    let heading = first
        .trim()
        .trim_start_matches('#')
        .trim()
        .trim_matches('*')
        .trim_end_matches(':')
        .trim();
    let repeats = !heading.is_empty()
        && (heading.eq_ignore_ascii_case(&original.heading)
            || (first.trim_start().starts_with('#') && classify_heading(heading) == Some(original.kind)));
    if repeats {
        rest.trim()
    } else {
        text
    }
}
