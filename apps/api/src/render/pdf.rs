//! Styled HTML → PDF.
//!
//! The page is parsed with `scraper` into a flat list of blocks (headings,
//! paragraphs, list items, rules, preformatted text) carrying bold/italic
//! runs, then laid out on US-letter pages with the built-in Helvetica faces.
//! Line breaking is greedy over the static width tables in `font_metrics`.

use std::io::BufWriter;

use printpdf::{
    BuiltinFont, Color, CustomPdfConformance, IndirectFontRef, Mm, PdfConformance, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Rgb,
};
use scraper::{ElementRef, Html, Node};

use super::font_metrics::{width_mm, FontStyle, PT_TO_MM};
use super::RenderError;
use crate::models::resume::SectionKind;

// ────────────────────────────────────────────────────────────────────────────
// Page geometry
// ────────────────────────────────────────────────────────────────────────────

const PAGE_WIDTH_MM: f32 = 215.9;
const PAGE_HEIGHT_MM: f32 = 279.4;
const MARGIN_MM: f32 = 18.0;
const CONTENT_WIDTH_MM: f32 = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;
const TOP_MM: f32 = PAGE_HEIGHT_MM - MARGIN_MM;

const BODY_SIZE_PT: f32 = 10.0;
const PRE_SIZE_PT: f32 = 9.0;
const LINE_HEIGHT: f32 = 1.35;
/// Fraction of the line box below the baseline.
const BASELINE_OFFSET: f32 = 0.25;

const LIST_INDENT_MM: f32 = 5.0;
const MARKER_OFFSET_MM: f32 = 3.5;
const COLUMN_GAP_MM: f32 = 10.0;
const ITEM_GAP_MM: f32 = 0.8;
const PARAGRAPH_GAP_MM: f32 = 1.5;

const LAYER_NAME: &str = "Layer 1";
const DOCUMENT_ID: &str = "resume-tailor";
const DEFAULT_TITLE: &str = "Resume";

fn line_height(size_pt: f32) -> f32 {
    size_pt * LINE_HEIGHT * PT_TO_MM
}

fn rgb(hex: u32) -> Color {
    let channel = |shift: u32| ((hex >> shift) & 0xff) as f32 / 255.0;
    Color::Rgb(Rgb::new(channel(16), channel(8), channel(0), None))
}

const TEXT_COLOR: u32 = 0x1f2328;
const NAME_COLOR: u32 = 0x111827;

fn section_color(section: Option<SectionKind>) -> u32 {
    match section {
        Some(SectionKind::Summary) => 0x1d3557,
        Some(SectionKind::Experience) => 0x0f766e,
        Some(SectionKind::Skills) => 0x6d28d9,
        Some(SectionKind::Education) => 0x15803d,
        Some(SectionKind::Other) => 0x4b5563,
        Some(SectionKind::Preamble) | None => NAME_COLOR,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Block model
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Run {
    Text { text: String, style: FontStyle },
    Break,
}

#[derive(Debug, Clone, PartialEq)]
enum BlockKind {
    Heading(u8),
    Paragraph,
    ListItem { depth: usize, marker: String },
    Rule,
    Preformatted,
}

#[derive(Debug, Clone, PartialEq)]
struct Block {
    kind: BlockKind,
    runs: Vec<Run>,
    section: Option<SectionKind>,
}

impl Block {
    fn plain_text(&self) -> String {
        let mut out = String::new();
        for run in &self.runs {
            match run {
                Run::Text { text, .. } => out.push_str(text),
                Run::Break => out.push(' '),
            }
        }
        out.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn is_two_column_item(&self) -> bool {
        self.section == Some(SectionKind::Skills)
            && matches!(self.kind, BlockKind::ListItem { depth: 1, .. })
    }
}

fn has_visible_text(runs: &[Run]) -> bool {
    runs.iter().any(|r| match r {
        Run::Text { text, .. } => !text.trim().is_empty(),
        Run::Break => false,
    })
}

fn heading_level(name: &str) -> Option<u8> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

fn is_inline(name: &str) -> bool {
    matches!(
        name,
        "a" | "abbr" | "b" | "br" | "code" | "del" | "em" | "i" | "s" | "small" | "span" | "strong"
            | "sub" | "sup" | "u"
    )
}

/// Walks the DOM and flattens it into blocks, tracking the enclosing
/// `section-<kind>` class.
#[derive(Default)]
struct BlockCollector {
    blocks: Vec<Block>,
    section: Option<SectionKind>,
    pending: Vec<Run>,
}

impl BlockCollector {
    fn push(&mut self, kind: BlockKind, runs: Vec<Run>) {
        if kind != BlockKind::Rule && !has_visible_text(&runs) {
            return;
        }
        self.blocks.push(Block {
            kind,
            runs,
            section: self.section,
        });
    }

    /// Loose inline content between blocks becomes its own paragraph.
    fn flush_pending(&mut self) {
        let runs = std::mem::take(&mut self.pending);
        self.push(BlockKind::Paragraph, runs);
    }

    fn walk_children(&mut self, parent: ElementRef<'_>) {
        for child in parent.children() {
            match child.value() {
                Node::Text(text) => self.pending.push(Run::Text {
                    text: text.to_string(),
                    style: FontStyle::Regular,
                }),
                Node::Element(_) => {
                    if let Some(el) = ElementRef::wrap(child) {
                        if is_inline(el.value().name()) {
                            collect_inline(el, FontStyle::Regular, &mut self.pending);
                        } else {
                            self.flush_pending();
                            self.walk_block(el);
                        }
                    }
                }
                _ => {}
            }
        }
        self.flush_pending();
    }

    fn walk_block(&mut self, el: ElementRef<'_>) {
        let name = el.value().name();
        if let Some(level) = heading_level(name) {
            let mut runs = Vec::new();
            collect_inline(el, FontStyle::Bold, &mut runs);
            self.push(BlockKind::Heading(level), runs);
            return;
        }

        match name {
            "head" | "script" | "style" | "template" | "title" => {}
            "p" => {
                let mut runs = Vec::new();
                collect_inline(el, FontStyle::Regular, &mut runs);
                self.push(BlockKind::Paragraph, runs);
            }
            "ul" | "ol" => self.walk_list(el, 1),
            "hr" => self.push(BlockKind::Rule, Vec::new()),
            "pre" => {
                let text: String = el.text().collect();
                let mut runs = Vec::new();
                for (n, line) in text.trim_end().lines().enumerate() {
                    if n > 0 {
                        runs.push(Run::Break);
                    }
                    runs.push(Run::Text {
                        text: line.to_string(),
                        style: FontStyle::Regular,
                    });
                }
                self.push(BlockKind::Preformatted, runs);
            }
            "table" => self.walk_table(el),
            "section" => {
                let previous = self.section;
                self.section = el
                    .value()
                    .classes()
                    .filter_map(|c| c.strip_prefix("section-"))
                    .find_map(SectionKind::from_slug)
                    .or(previous);
                self.walk_children(el);
                self.section = previous;
            }
            _ => self.walk_children(el),
        }
    }

    fn walk_list(&mut self, list: ElementRef<'_>, depth: usize) {
        let ordered = list.value().name() == "ol";
        let mut number = 0;

        for item in list.children().filter_map(ElementRef::wrap) {
            if item.value().name() != "li" {
                continue;
            }
            number += 1;

            let mut runs = Vec::new();
            let mut nested = Vec::new();
            for node in item.children() {
                match node.value() {
                    Node::Text(text) => runs.push(Run::Text {
                        text: text.to_string(),
                        style: FontStyle::Regular,
                    }),
                    Node::Element(_) => {
                        let Some(el) = ElementRef::wrap(node) else { continue };
                        match el.value().name() {
                            "ul" | "ol" => nested.push(el),
                            "p" => {
                                // paragraphs of a loose item run together
                                runs.push(Run::Text {
                                    text: " ".to_string(),
                                    style: FontStyle::Regular,
                                });
                                collect_inline(el, FontStyle::Regular, &mut runs);
                            }
                            _ => collect_inline(el, FontStyle::Regular, &mut runs),
                        }
                    }
                    _ => {}
                }
            }

            let marker = if ordered {
                format!("{number}.")
            } else {
                "\u{2022}".to_string()
            };
            self.push(BlockKind::ListItem { depth, marker }, runs);

            for list in nested {
                self.walk_list(list, depth + 1);
            }
        }
    }

    fn walk_table(&mut self, table: ElementRef<'_>) {
        let rows = table
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|e| e.value().name() == "tr");
        for row in rows {
            let cells: Vec<String> = row
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|c| matches!(c.value().name(), "td" | "th"))
                .map(|c| c.text().collect::<String>().trim().to_string())
                .collect();
            let runs = vec![Run::Text {
                text: cells.join(" | "),
                style: FontStyle::Regular,
            }];
            self.push(BlockKind::Paragraph, runs);
        }
    }
}

fn collect_inline(el: ElementRef<'_>, style: FontStyle, out: &mut Vec<Run>) {
    let style = match el.value().name() {
        "strong" | "b" => FontStyle::from_flags(true, style.is_italic()),
        "em" | "i" => FontStyle::from_flags(style.is_bold(), true),
        "br" => {
            out.push(Run::Break);
            return;
        }
        "ul" | "ol" | "script" | "style" => return,
        _ => style,
    };

    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push(Run::Text {
                text: text.to_string(),
                style,
            }),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_inline(child, style, out);
                }
            }
            _ => {}
        }
    }
}

fn collect_blocks(html: &str) -> Vec<Block> {
    let document = Html::parse_document(html);
    let mut collector = BlockCollector::default();
    collector.walk_children(document.root_element());
    collector.blocks
}

// ────────────────────────────────────────────────────────────────────────────
// Line breaking
// ────────────────────────────────────────────────────────────────────────────

/// A run of same-style text placed at `x` mm from the line start.
#[derive(Debug, Clone, PartialEq)]
struct Segment {
    text: String,
    style: FontStyle,
    x: f32,
}

type Line = Vec<Segment>;

#[derive(Debug, PartialEq)]
enum Token {
    Word {
        text: String,
        style: FontStyle,
        space_before: bool,
    },
    Break,
}

fn tokenize(runs: &[Run]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut pending_space = false;

    for run in runs {
        let (text, style) = match run {
            Run::Break => {
                tokens.push(Token::Break);
                pending_space = false;
                continue;
            }
            Run::Text { text, style } => (sanitize(text), *style),
        };

        let mut word = String::new();
        for c in text.chars() {
            if c.is_whitespace() {
                if !word.is_empty() {
                    tokens.push(Token::Word {
                        text: std::mem::take(&mut word),
                        style,
                        space_before: pending_space,
                    });
                }
                pending_space = true;
            } else {
                word.push(c);
            }
        }
        if !word.is_empty() {
            tokens.push(Token::Word {
                text: word,
                style,
                space_before: pending_space,
            });
            pending_space = false;
        }
    }

    tokens
}

/// Maps text onto what the WinAnsi-encoded base fonts can show.
fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{00a0}' | '\u{2002}'..='\u{200a}' => ' ',
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2212}' => '-',
            '\u{25aa}' | '\u{25cf}' | '\u{25e6}' | '\u{2023}' => '\u{2022}',
            c if is_win_ansi(c) || c.is_whitespace() => c,
            _ => '?',
        })
        .collect()
}

fn is_win_ansi(c: char) -> bool {
    matches!(c, ' '..='~' | '\u{00a1}'..='\u{00ff}')
        || "€‚ƒ„…†‡ˆ‰Š‹ŒŽ‘’“”•–—˜™š›œžŸ".contains(c)
}

/// Greedy line breaking of `runs` into lines no wider than `width` mm.
fn wrap_runs(runs: &[Run], width: f32, size_pt: f32) -> Vec<Line> {
    let mut lines: Vec<Line> = Vec::new();
    let mut line: Line = Vec::new();
    let mut x = 0.0f32;

    for token in tokenize(runs) {
        let (text, style, space_before) = match token {
            Token::Break => {
                lines.push(std::mem::take(&mut line));
                x = 0.0;
                continue;
            }
            Token::Word {
                text,
                style,
                space_before,
            } => (text, style, space_before),
        };

        for (n, piece) in split_long_word(&text, style, width, size_pt)
            .into_iter()
            .enumerate()
        {
            let w = width_mm(&piece, style, size_pt);
            let mut space = if space_before && n == 0 && x > 0.0 {
                width_mm(" ", style, size_pt)
            } else {
                0.0
            };
            if x > 0.0 && x + space + w > width {
                lines.push(std::mem::take(&mut line));
                x = 0.0;
                space = 0.0;
            }

            match line.last_mut() {
                Some(last) if last.style == style => {
                    if space > 0.0 {
                        last.text.push(' ');
                    }
                    last.text.push_str(&piece);
                }
                _ => line.push(Segment {
                    text: piece,
                    style,
                    x: x + space,
                }),
            }
            x += space + w;
        }
    }

    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Splits a word wider than a full line into line-sized pieces.
fn split_long_word(word: &str, style: FontStyle, width: f32, size_pt: f32) -> Vec<String> {
    if width_mm(word, style, size_pt) <= width {
        return vec![word.to_string()];
    }
    let mut pieces = Vec::new();
    let mut piece = String::new();
    for c in word.chars() {
        piece.push(c);
        if piece.chars().count() > 1 && width_mm(&piece, style, size_pt) > width {
            piece.pop();
            pieces.push(std::mem::take(&mut piece));
            piece.push(c);
        }
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

// ────────────────────────────────────────────────────────────────────────────
// Page writer
// ────────────────────────────────────────────────────────────────────────────

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    italic: IndirectFontRef,
    bold_italic: IndirectFontRef,
}

impl Fonts {
    fn load(doc: &PdfDocumentReference) -> Result<Self, RenderError> {
        let load = |font: BuiltinFont| {
            doc.add_builtin_font(font)
                .map_err(|e| RenderError::Pdf(format!("failed to load font: {e}")))
        };
        Ok(Self {
            regular: load(BuiltinFont::Helvetica)?,
            bold: load(BuiltinFont::HelveticaBold)?,
            italic: load(BuiltinFont::HelveticaOblique)?,
            bold_italic: load(BuiltinFont::HelveticaBoldOblique)?,
        })
    }

    fn get(&self, style: FontStyle) -> &IndirectFontRef {
        match style {
            FontStyle::Regular => &self.regular,
            FontStyle::Bold => &self.bold,
            FontStyle::Italic => &self.italic,
            FontStyle::BoldItalic => &self.bold_italic,
        }
    }
}

struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    fonts: Fonts,
    /// Top of the free area on the current page, mm from the bottom edge.
    y: f32,
}

impl PageWriter {
    fn new(title: &str) -> Result<Self, RenderError> {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), LAYER_NAME);
        // Fixed id and no XMP packet keep the output stable across runs.
        let doc = doc
            .with_document_id(DOCUMENT_ID.to_string())
            .with_conformance(PdfConformance::Custom(CustomPdfConformance {
                requires_icc_profile: false,
                requires_xmp_metadata: false,
                ..Default::default()
            }));
        let fonts = Fonts::load(&doc)?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            fonts,
            y: TOP_MM,
        })
    }

    fn at_page_top(&self) -> bool {
        self.y >= TOP_MM
    }

    fn new_page(&mut self) {
        let (page, layer) = self
            .doc
            .add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), LAYER_NAME);
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = TOP_MM;
    }

    fn ensure_room(&mut self, height: f32) {
        if self.y - height < MARGIN_MM && !self.at_page_top() {
            self.new_page();
        }
    }

    /// Vertical gap, dropped at the top of a page.
    fn space(&mut self, mm: f32) {
        if !self.at_page_top() {
            self.y = (self.y - mm).max(MARGIN_MM);
        }
    }

    fn draw_text(&self, text: &str, style: FontStyle, x: f32, baseline: f32, size_pt: f32, color: u32) {
        self.layer.set_fill_color(rgb(color));
        self.layer
            .use_text(text, size_pt, Mm(x), Mm(baseline), self.fonts.get(style));
    }

    fn draw_line(&self, line: &Line, x0: f32, baseline: f32, size_pt: f32, color: u32) {
        for segment in line {
            self.draw_text(&segment.text, segment.style, x0 + segment.x, baseline, size_pt, color);
        }
    }

    /// Reserves one line box and returns its baseline.
    fn next_baseline(&mut self, size_pt: f32) -> f32 {
        let h = line_height(size_pt);
        self.ensure_room(h);
        self.y -= h;
        self.y + h * BASELINE_OFFSET
    }

    fn block(&mut self, block: &Block) {
        let (size, color, before, after) = match &block.kind {
            BlockKind::Heading(1) => (20.0, NAME_COLOR, 3.0, 1.0),
            BlockKind::Heading(2) => (13.0, section_color(block.section), 4.0, 1.5),
            BlockKind::Heading(_) => (11.0, TEXT_COLOR, 2.5, 0.8),
            BlockKind::Paragraph => (BODY_SIZE_PT, TEXT_COLOR, 0.0, PARAGRAPH_GAP_MM),
            BlockKind::ListItem { .. } => (BODY_SIZE_PT, TEXT_COLOR, 0.0, ITEM_GAP_MM),
            BlockKind::Preformatted => (PRE_SIZE_PT, TEXT_COLOR, 0.0, PARAGRAPH_GAP_MM),
            BlockKind::Rule => {
                self.space(3.0);
                return;
            }
        };

        let indent = match &block.kind {
            BlockKind::ListItem { depth, .. } => LIST_INDENT_MM * *depth as f32,
            _ => 0.0,
        };
        let x0 = MARGIN_MM + indent;

        self.space(before);
        // keep a heading with at least one line of what follows
        if matches!(block.kind, BlockKind::Heading(_)) {
            self.ensure_room(line_height(size) + line_height(BODY_SIZE_PT));
        }

        let lines = wrap_runs(&block.runs, CONTENT_WIDTH_MM - indent, size);
        for (n, line) in lines.iter().enumerate() {
            let baseline = self.next_baseline(size);
            if n == 0 {
                if let BlockKind::ListItem { marker, .. } = &block.kind {
                    self.draw_text(marker, FontStyle::Regular, x0 - MARKER_OFFSET_MM, baseline, size, TEXT_COLOR);
                }
            }
            self.draw_line(line, x0, baseline, size, color);
        }
        self.space(after);
    }

    /// Lays top-level list items out in two columns, row by row.
    fn two_column_list(&mut self, items: &[Block]) {
        let size = BODY_SIZE_PT;
        let line_h = line_height(size);
        let column_width = (CONTENT_WIDTH_MM - LIST_INDENT_MM - COLUMN_GAP_MM) / 2.0;

        for pair in items.chunks(2) {
            let wrapped: Vec<(&Block, Vec<Line>)> = pair
                .iter()
                .map(|item| (item, wrap_runs(&item.runs, column_width, size)))
                .collect();
            let rows = wrapped.iter().map(|(_, lines)| lines.len()).max().unwrap_or(0);
            if rows == 0 {
                continue;
            }

            self.ensure_room(rows as f32 * line_h);
            let top = self.y;
            for (column, (item, lines)) in wrapped.iter().enumerate() {
                let x0 = MARGIN_MM + LIST_INDENT_MM + column as f32 * (column_width + COLUMN_GAP_MM);
                for (n, line) in lines.iter().enumerate() {
                    let baseline = top - (n as f32 + 1.0) * line_h + line_h * BASELINE_OFFSET;
                    if n == 0 {
                        if let BlockKind::ListItem { marker, .. } = &item.kind {
                            self.draw_text(marker, FontStyle::Regular, x0 - MARKER_OFFSET_MM, baseline, size, TEXT_COLOR);
                        }
                    }
                    self.draw_line(line, x0, baseline, size, TEXT_COLOR);
                }
            }
            self.y = top - rows as f32 * line_h;
            self.space(ITEM_GAP_MM);
        }
    }

    fn finish(self) -> Result<Vec<u8>, RenderError> {
        let mut writer = BufWriter::new(Vec::new());
        self.doc
            .save(&mut writer)
            .map_err(|e| RenderError::Pdf(format!("failed to serialize PDF: {e}")))?;
        writer
            .into_inner()
            .map_err(|e| RenderError::Pdf(format!("failed to flush PDF buffer: {e}")))
    }
}

/// Renders a styled HTML page to PDF bytes.
pub fn html_to_pdf(html: &str) -> Result<Vec<u8>, RenderError> {
    let blocks = collect_blocks(html);
    if blocks.is_empty() {
        return Err(RenderError::EmptyDocument);
    }

    let title = blocks
        .iter()
        .find(|b| b.kind == BlockKind::Heading(1))
        .map(Block::plain_text)
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    let mut writer = PageWriter::new(&sanitize(&title))?;
    let mut i = 0;
    while i < blocks.len() {
        if blocks[i].is_two_column_item() {
            let end = blocks[i..]
                .iter()
                .position(|b| !b.is_two_column_item())
                .map_or(blocks.len(), |p| i + p);
            writer.two_column_list(&blocks[i..end]);
            i = end;
        } else {
            writer.block(&blocks[i]);
            i += 1;
        }
    }

    writer.finish()
}
