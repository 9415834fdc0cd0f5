//! Markdown → styled HTML.

use pulldown_cmark::{html, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use crate::models::resume::SectionKind;
use crate::sections::classify_heading;

const RESUME_TEMPLATE: &str = include_str!("../../templates/resume.html");
const DEFAULT_TITLE: &str = "Resume";

fn options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH
}

/// Converts resume markdown to an HTML fragment.
///
/// Soft line breaks are kept as `<br />` since resume lines are meaningful.
/// Raw HTML in the input is escaped, not passed through. Every `h1`/`h2`
/// opens a `<section class="resume-section section-<kind>">` that runs to
/// the next one.
pub fn markdown_to_html(markdown: &str) -> String {
    let events = parse(markdown);

    // Only top-level headings open a section; one inside a list or quote
    // stays where it is.
    let mut starts = Vec::new();
    let mut depth = 0usize;
    for (i, event) in events.iter().enumerate() {
        match event {
            Event::Start(_) => {
                if depth == 0 && section_level(event).is_some() {
                    starts.push(i);
                }
                depth += 1;
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    let mut out = String::with_capacity(markdown.len() * 2);
    let first = starts.first().copied().unwrap_or(events.len());
    html::push_html(&mut out, events[..first].iter().cloned());

    for (n, &start) in starts.iter().enumerate() {
        let end = starts.get(n + 1).copied().unwrap_or(events.len());
        let chunk = &events[start..end];
        out.push_str(&format!(
            "<section class=\"resume-section section-{}\">\n",
            chunk_kind(chunk).slug()
        ));
        html::push_html(&mut out, chunk.iter().cloned());
        out.push_str("</section>\n");
    }

    out
}

/// Full HTML page: the converted body inside the resume style template.
pub fn render_document(markdown: &str) -> String {
    let body = markdown_to_html(markdown);
    let title = document_title(markdown).unwrap_or_else(|| DEFAULT_TITLE.to_string());

    // The body is spliced in last so its text is never scanned for markers.
    match RESUME_TEMPLATE.split_once("{{ body }}") {
        Some((head, tail)) => {
            let head = head.replace("{{ title }}", &escape_html(&title));
            let mut page = String::with_capacity(head.len() + body.len() + tail.len());
            page.push_str(&head);
            page.push_str(&body);
            page.push_str(tail);
            page
        }
        None => body,
    }
}

fn parse(markdown: &str) -> Vec<Event<'_>> {
    Parser::new_ext(markdown, options())
        .map(|event| match event {
            Event::SoftBreak => Event::HardBreak,
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            other => other,
        })
        .collect()
}

fn section_level(event: &Event<'_>) -> Option<HeadingLevel> {
    match event {
        Event::Start(Tag::Heading { level, .. })
            if matches!(level, HeadingLevel::H1 | HeadingLevel::H2) =>
        {
            Some(*level)
        }
        _ => None,
    }
}

/// Section kind for a chunk that starts with an `h1`/`h2`.
/// Unrecognized `h1`s are the name line; unrecognized `h2`s are "other".
fn chunk_kind(chunk: &[Event<'_>]) -> SectionKind {
    let text = heading_text(chunk);
    classify_heading(&text).unwrap_or(match chunk.first().and_then(section_level) {
        Some(HeadingLevel::H1) => SectionKind::Preamble,
        _ => SectionKind::Other,
    })
}

fn heading_text(events: &[Event<'_>]) -> String {
    let mut text = String::new();
    for event in events.iter().skip(1) {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            Event::End(TagEnd::Heading(_)) => break,
            _ => {}
        }
    }
    text
}

fn document_title(markdown: &str) -> Option<String> {
    let events = parse(markdown);
    let start = events.iter().position(|e| {
        matches!(
            e,
            Event::Start(Tag::Heading {
                level: HeadingLevel::H1,
                ..
            })
        )
    })?;
    let title = heading_text(&events[start..]);
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
