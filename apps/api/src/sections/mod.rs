//! Section Splitter/Merger.
//!
//! `split` turns generated markdown into a `GeneratedResume` keyed by
//! `SectionKind`; `merge` turns it back into markdown in canonical order.
//! Together they satisfy `split(merge(split(x))) == split(x)`.

use crate::models::resume::{GeneratedResume, Section, SectionKind};

pub mod refine;
pub mod validation;

pub use refine::{refine, RefinementReport};

// ────────────────────────────────────────────────────────────────────────────
// Header vocabulary
// ────────────────────────────────────────────────────────────────────────────

/// Heading terms and the section each one opens. Matched on whole words.
const VOCABULARY: &[(&str, SectionKind)] = &[
    ("summary", SectionKind::Summary),
    ("objective", SectionKind::Summary),
    ("profile", SectionKind::Summary),
    ("about me", SectionKind::Summary),
    ("experience", SectionKind::Experience),
    ("work history", SectionKind::Experience),
    ("employment", SectionKind::Experience),
    ("skills", SectionKind::Skills),
    ("competencies", SectionKind::Skills),
    ("education", SectionKind::Education),
    ("academic", SectionKind::Education),
    ("projects", SectionKind::Other),
    ("certifications", SectionKind::Other),
    ("awards", SectionKind::Other),
    ("publications", SectionKind::Other),
    ("languages", SectionKind::Other),
    ("interests", SectionKind::Other),
    ("volunteer", SectionKind::Other),
];

/// Headings longer than this are treated as prose, not section headers.
const MAX_HEADING_WORDS: usize = 6;
/// Bare (non-`#`) header lines must be shorter still.
const MAX_BARE_HEADING_WORDS: usize = 4;

/// Classifies heading text against the vocabulary.
///
/// When several terms occur, the one that appears earliest in the heading
/// wins, so "Skills & Experience" is a skills section.
pub fn classify_heading(heading: &str) -> Option<SectionKind> {
    let words = words_of(heading);
    if words.is_empty() || words.len() > MAX_HEADING_WORDS {
        return None;
    }

    VOCABULARY
        .iter()
        .filter_map(|(term, kind)| {
            let term_words: Vec<&str> = term.split(' ').collect();
            words
                .windows(term_words.len())
                .position(|w| w == term_words.as_slice())
                .map(|pos| (pos, *kind))
        })
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, kind)| kind)
}

fn words_of(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn is_exact_term(heading: &str) -> bool {
    let normalized = words_of(heading).join(" ");
    VOCABULARY.iter().any(|(term, _)| *term == normalized)
}

/// Recognizes a section header line and returns its display text and kind.
fn parse_header(line: &str) -> Option<(String, SectionKind)> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if hashes > 0 {
        let rest = &trimmed[hashes..];
        if hashes > 6 || !(rest.is_empty() || rest.starts_with(char::is_whitespace)) {
            return None;
        }
        let heading = clean_heading(rest.trim().trim_end_matches('#'));
        return classify_heading(&heading).map(|kind| (heading, kind));
    }

    // Bare lines need a visible header cue, or must be a vocabulary term
    // on their own, before they count.
    let emphasized = is_wrapped(trimmed, "**") || is_wrapped(trimmed, "__");
    let heading = clean_heading(trimmed);
    let has_colon = trimmed.trim_end_matches(['*', '_']).ends_with(':');
    let shouting = heading.chars().any(char::is_alphabetic)
        && !heading.chars().any(char::is_lowercase);

    if heading.contains(['.', ',', ';'])
        || words_of(&heading).len() > MAX_BARE_HEADING_WORDS
        || !(emphasized || has_colon || shouting || is_exact_term(&heading))
    {
        return None;
    }
    classify_heading(&heading).map(|kind| (heading, kind))
}

fn is_wrapped(text: &str, marker: &str) -> bool {
    text.len() > marker.len() * 2 && text.starts_with(marker) && text.ends_with(marker)
}

/// Strips emphasis markers and a trailing colon from heading text.
fn clean_heading(text: &str) -> String {
    let text = text.trim();
    let text = text
        .strip_prefix("**")
        .and_then(|t| t.strip_suffix("**"))
        .or_else(|| text.strip_prefix("__").and_then(|t| t.strip_suffix("__")))
        .unwrap_or(text);
    text.trim().trim_end_matches(':').trim().to_string()
}

// ────────────────────────────────────────────────────────────────────────────
// Split / merge
// ────────────────────────────────────────────────────────────────────────────

struct OpenSection<'a> {
    kind: SectionKind,
    heading: String,
    /// Body collected before the section was reopened by a repeated header.
    prior: String,
    lines: Vec<&'a str>,
}

impl<'a> OpenSection<'a> {
    fn new(kind: SectionKind, heading: String) -> Self {
        Self {
            kind,
            heading,
            prior: String::new(),
            lines: Vec::new(),
        }
    }

    fn reopen(section: Section) -> Self {
        Self {
            kind: section.kind,
            heading: section.heading,
            prior: section.body,
            lines: Vec::new(),
        }
    }

    fn close(self, resume: &mut GeneratedResume) {
        let block = trim_blank_lines(&self.lines);
        let body = match (self.prior.is_empty(), block.is_empty()) {
            (true, _) => block,
            (false, true) => self.prior,
            (false, false) => format!("{}\n\n{}", self.prior, block),
        };
        if self.kind == SectionKind::Preamble && body.is_empty() {
            return;
        }
        resume.insert(Section {
            kind: self.kind,
            heading: self.heading,
            body,
        });
    }
}

/// Drops leading and trailing blank lines; interior lines are kept verbatim.
fn trim_blank_lines(lines: &[&str]) -> String {
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(start), Some(end)) => lines[start..=end].join("\n"),
        _ => String::new(),
    }
}

/// Splits a markdown resume into sections.
///
/// Unrecognized headers stay in the body of the section they appear in.
/// A header repeating the current section's kind stays in its body too.
/// A header repeating an earlier, already closed kind reopens that section,
/// and the header line and what follows are appended to it. Every body
/// therefore only ever contains recognized headers of its own kind.
pub fn split(text: &str) -> GeneratedResume {
    let mut resume = GeneratedResume::default();
    let mut current = OpenSection::new(SectionKind::Preamble, String::new());

    for line in text.lines() {
        if let Some((heading, kind)) = parse_header(line) {
            if kind != current.kind {
                let next = match resume.remove(kind) {
                    Some(existing) => {
                        let mut reopened = OpenSection::reopen(existing);
                        reopened.lines.push(line);
                        reopened
                    }
                    None => OpenSection::new(kind, heading),
                };
                std::mem::replace(&mut current, next).close(&mut resume);
                continue;
            }
        }
        current.lines.push(line);
    }
    current.close(&mut resume);

    resume
}

/// Renders sections back to markdown in canonical order.
pub fn merge(resume: &GeneratedResume) -> String {
    let blocks: Vec<String> = resume
        .sections()
        .iter()
        .filter_map(|section| match section.kind {
            SectionKind::Preamble if section.body.is_empty() => None,
            SectionKind::Preamble => Some(section.body.clone()),
            _ if section.body.is_empty() => Some(format!("## {}", section.heading)),
            _ => Some(format!("## {}\n\n{}", section.heading, section.body)),
        })
        .collect();

    let mut out = blocks.join("\n\n");
    out.push('\n');
    out
}
