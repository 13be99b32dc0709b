//! Writer prose to HTML.
//!
//! Math spans (`\[...\]` block, `\(...\)` inline) are lifted out of the source
//! and replaced by placeholder tokens before the markdown pass, so the
//! markdown parser never sees (or escapes) LaTeX. The parser's event stream is
//! then rewritten: placeholder-only paragraphs become block containers, other
//! placeholders become inline containers, and remaining plain text goes
//! through the parenthesized-math heuristic.

use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, TagEnd};

use super::heuristic::{split_parenthesized, Segment};
use super::html::escape;
use super::math::{MathMode, MathRenderer, RenderedMath};
use crate::protocol::Event as StreamPayload;
use crate::views::writer_view;

const TOKEN_OPEN: char = '\u{E000}';
const TOKEN_CLOSE: char = '\u{E001}';

/// A math span lifted out of the source
#[derive(Debug, Clone, PartialEq, Eq)]
struct MathSpan {
    expr: String,
    mode: MathMode,
    /// Exact source text including delimiters
    source: String,
}

#[derive(Debug, Default)]
struct Extracted {
    text: String,
    spans: Vec<MathSpan>,
}

#[derive(Clone)]
pub struct ProseRenderer {
    math: MathRenderer,
    options: Options,
}

impl Default for ProseRenderer {
    fn default() -> Self {
        Self::new(MathRenderer::default())
    }
}

/// Render one prose fragment with the default math typesetter.
pub fn render_markdown(source: &str) -> String {
    ProseRenderer::default().render(source)
}

impl ProseRenderer {
    pub fn new(math: MathRenderer) -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        Self { math, options }
    }

    /// Render a prose fragment to HTML. Never fails; math that cannot be
    /// typeset degrades to escaped literal text.
    pub fn render(&self, source: &str) -> String {
        let extracted = extract_math(source);
        let parser = Parser::new_ext(&extracted.text, self.options);
        let events = self.rewrite(merge_text(parser), &extracted.spans);

        let mut out = String::with_capacity(source.len() * 2);
        pulldown_cmark::html::push_html(&mut out, events.into_iter());
        out
    }

    /// Render every writer message in `events`, in order.
    pub fn render_writer_feed(&self, events: &[StreamPayload]) -> String {
        let mut out = String::new();
        for message in writer_view(events) {
            let Some(content) = message.content.as_deref() else {
                continue;
            };
            out.push_str(&format!(
                "<section class=\"writer-message\" data-id=\"{}\">\n",
                escape(&message.id)
            ));
            out.push_str(&self.render(content));
            out.push_str("</section>\n");
        }
        out
    }

    fn rewrite<'a>(&self, events: Vec<Event<'a>>, spans: &[MathSpan]) -> Vec<Event<'a>> {
        let mut out = Vec::with_capacity(events.len());
        let mut code_depth = 0usize;
        let mut i = 0;

        while i < events.len() {
            // A paragraph holding nothing but one block span
            if let (Some(Event::Start(Tag::Paragraph)), Some(Event::Text(text)), Some(Event::End(TagEnd::Paragraph))) =
                (events.get(i), events.get(i + 1), events.get(i + 2))
            {
                if let Some(span) = sole_block_span(text, spans) {
                    let markup = self.math.render(&span.expr, MathMode::Block).into_markup();
                    out.push(Event::Html(CowStr::from(format!(
                        "<div class=\"math-block\">{}</div>\n",
                        markup
                    ))));
                    i += 3;
                    continue;
                }
            }

            let event = events[i].clone();
            i += 1;
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    code_depth += 1;
                    out.push(Event::Start(Tag::CodeBlock(kind)));
                }
                Event::End(TagEnd::CodeBlock) => {
                    code_depth = code_depth.saturating_sub(1);
                    out.push(Event::End(TagEnd::CodeBlock));
                }
                Event::Text(text) if code_depth > 0 => {
                    out.push(Event::Text(CowStr::from(restore_source(&text, spans))));
                }
                Event::Text(text) => self.expand_text(&text, spans, &mut out),
                Event::Code(code) => out.push(Event::Code(CowStr::from(restore_source(&code, spans)))),
                // Untrusted markup is shown, never interpreted
                Event::Html(raw) | Event::InlineHtml(raw) => {
                    out.push(Event::Text(CowStr::from(restore_source(&raw, spans))));
                }
                Event::Start(Tag::HtmlBlock) => out.push(Event::Start(Tag::Paragraph)),
                Event::End(TagEnd::HtmlBlock) => out.push(Event::End(TagEnd::Paragraph)),
                Event::Start(Tag::Link {
                    link_type,
                    dest_url,
                    title,
                    id,
                }) => out.push(Event::Start(Tag::Link {
                    link_type,
                    dest_url: safe_url(&dest_url, spans),
                    title,
                    id,
                })),
                Event::Start(Tag::Image {
                    link_type,
                    dest_url,
                    title,
                    id,
                }) => out.push(Event::Start(Tag::Image {
                    link_type,
                    dest_url: safe_url(&dest_url, spans),
                    title,
                    id,
                })),
                Event::SoftBreak if code_depth == 0 => out.push(Event::HardBreak),
                other => out.push(other),
            }
        }
        out
    }

    /// Substitute math placeholders and run the heuristic over plain runs.
    fn expand_text<'a>(&self, text: &str, spans: &[MathSpan], out: &mut Vec<Event<'a>>) {
        for piece in split_tokens(text, spans) {
            match piece {
                Piece::Plain(plain) => self.expand_plain(plain, out),
                Piece::Math(span) => {
                    let class = match span.mode {
                        MathMode::Inline => "math-inline",
                        MathMode::Block => "math-display",
                    };
                    let markup = self.math.render(&span.expr, span.mode).into_markup();
                    out.push(Event::InlineHtml(CowStr::from(format!(
                        "<span class=\"{}\">{}</span>",
                        class, markup
                    ))));
                }
            }
        }
    }

    fn expand_plain<'a>(&self, text: &str, out: &mut Vec<Event<'a>>) {
        for segment in split_parenthesized(text) {
            match segment {
                Segment::Plain(plain) => out.push(Event::Text(CowStr::from(plain.to_string()))),
                Segment::Math { inner, original } => match self.math.render(inner, MathMode::Inline) {
                    RenderedMath::Typeset(markup) => out.push(Event::InlineHtml(CowStr::from(format!(
                        "<span class=\"math-inline\">{}</span>",
                        markup
                    )))),
                    RenderedMath::Raw(_) => out.push(Event::Text(CowStr::from(original.to_string()))),
                },
            }
        }
    }
}

/// The parser splits text at delimiter candidates; join adjacent runs so
/// placeholders and parenthesized spans are seen whole.
fn merge_text<'a>(events: impl Iterator<Item = Event<'a>>) -> Vec<Event<'a>> {
    let mut out: Vec<Event<'a>> = Vec::new();
    for event in events {
        if let (Some(Event::Text(prev)), Event::Text(next)) = (out.last_mut(), &event) {
            let mut joined = prev.to_string();
            joined.push_str(next);
            *prev = CowStr::from(joined);
            continue;
        }
        out.push(event);
    }
    out
}

enum Piece<'t, 's> {
    Plain(&'t str),
    Math(&'s MathSpan),
}

/// Split text into plain runs and placeholder references.
fn split_tokens<'t, 's>(text: &'t str, spans: &'s [MathSpan]) -> Vec<Piece<'t, 's>> {
    let mut pieces = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(TOKEN_OPEN) {
        let after = &rest[start + TOKEN_OPEN.len_utf8()..];
        let Some(end) = after.find(TOKEN_CLOSE) else {
            break;
        };
        let span = after[..end].parse::<usize>().ok().and_then(|idx| spans.get(idx));
        let Some(span) = span else {
            break;
        };
        if start > 0 {
            pieces.push(Piece::Plain(&rest[..start]));
        }
        pieces.push(Piece::Math(span));
        rest = &after[end + TOKEN_CLOSE.len_utf8()..];
    }
    if !rest.is_empty() {
        pieces.push(Piece::Plain(rest));
    }
    pieces
}

fn sole_block_span<'s>(text: &str, spans: &'s [MathSpan]) -> Option<&'s MathSpan> {
    match split_tokens(text.trim(), spans).as_slice() {
        [Piece::Math(span)] if span.mode == MathMode::Block => Some(*span),
        _ => None,
    }
}

/// Put the original delimited source back where a placeholder landed in a
/// context that is not typeset (code, escaped markup, URLs).
fn restore_source(text: &str, spans: &[MathSpan]) -> String {
    let mut out = String::with_capacity(text.len());
    for piece in split_tokens(text, spans) {
        match piece {
            Piece::Plain(plain) => out.push_str(plain),
            Piece::Math(span) => out.push_str(&span.source),
        }
    }
    out
}

fn safe_url<'a>(dest: &str, spans: &[MathSpan]) -> CowStr<'a> {
    let dest = restore_source(dest, spans);
    let scheme: String = dest
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .take(12)
        .collect::<String>()
        .to_ascii_lowercase();
    if ["javascript:", "vbscript:", "data:"]
        .iter()
        .any(|bad| scheme.starts_with(bad))
    {
        CowStr::Borrowed("#")
    } else {
        CowStr::from(dest)
    }
}

/// Lift math spans out of `source`, leaving placeholder tokens. Fenced code
/// blocks and inline code spans are copied through untouched. A block span
/// written over several lines becomes a single token on one line.
fn extract_math(source: &str) -> Extracted {
    let cleaned: String = source
        .chars()
        .filter(|&c| c != TOKEN_OPEN && c != TOKEN_CLOSE)
        .collect();

    let mut extracted = Extracted {
        text: String::with_capacity(cleaned.len()),
        spans: Vec::new(),
    };
    for (is_code, chunk) in split_fences(&cleaned) {
        if is_code {
            extracted.text.push_str(chunk);
        } else {
            scan_prose(chunk, &mut extracted);
        }
    }
    extracted
}

/// Split into alternating prose / fenced-code chunks.
fn split_fences(text: &str) -> Vec<(bool, &str)> {
    let mut chunks = Vec::new();
    let mut chunk_start = 0;
    let mut offset = 0;
    let mut open: Option<(char, usize)> = None;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let fence = fence_marker(line);
        match (open, fence) {
            (None, Some(marker)) => {
                if line_start > chunk_start {
                    chunks.push((false, &text[chunk_start..line_start]));
                }
                chunk_start = line_start;
                open = Some(marker);
            }
            (Some((ch, len)), Some((close_ch, close_len)))
                if close_ch == ch && close_len >= len && line.trim()[close_len..].is_empty() =>
            {
                chunks.push((true, &text[chunk_start..offset]));
                chunk_start = offset;
                open = None;
            }
            _ => {}
        }
    }
    if chunk_start < text.len() {
        chunks.push((open.is_some(), &text[chunk_start..]));
    }
    chunks
}

/// Fence character and run length if `line` opens or closes a code fence.
fn fence_marker(line: &str) -> Option<(char, usize)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let body = &line[indent..];
    let ch = body.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let run = body.chars().take_while(|c| *c == ch).count();
    (run >= 3).then_some((ch, run))
}

fn scan_prose(text: &str, extracted: &mut Extracted) {
    let mut i = 0;
    while i < text.len() {
        let rest = &text[i..];

        if rest.starts_with('`') {
            let run = rest.chars().take_while(|c| *c == '`').count();
            let consumed = match closing_backticks(&rest[run..], run) {
                Some(end) => run + end + run,
                None => run,
            };
            extracted.text.push_str(&rest[..consumed]);
            i += consumed;
            continue;
        }

        if let Some(consumed) = take_math(rest, extracted) {
            i += consumed;
            continue;
        }

        // A delimiter that opens no span stays visible; markdown would
        // otherwise read `\(` as an escaped parenthesis.
        if rest.starts_with(r"\(") || rest.starts_with(r"\[") {
            extracted.text.push_str(r"\\");
            extracted.text.push_str(&rest[1..2]);
            i += 2;
            continue;
        }

        let ch = rest.chars().next().unwrap_or(' ');
        extracted.text.push(ch);
        i += ch.len_utf8();
    }
}

/// True if a line strictly inside `inner` is blank.
fn crosses_blank_line(inner: &str) -> bool {
    let lines: Vec<&str> = inner.split('\n').collect();
    lines.len() > 2 && lines[1..lines.len() - 1].iter().any(|line| line.trim().is_empty())
}

/// Offset of a backtick run of exactly `run` length in `text`.
fn closing_backticks(text: &str, run: usize) -> Option<usize> {
    let mut i = 0;
    while i < text.len() {
        let rest = &text[i..];
        if rest.starts_with('`') {
            let len = rest.chars().take_while(|c| *c == '`').count();
            if len == run {
                return Some(i);
            }
            i += len;
        } else {
            i += rest.chars().next().map_or(1, char::len_utf8);
        }
    }
    None
}

/// If `rest` starts a delimited math span, record it, emit its token and
/// return the number of source bytes consumed.
fn take_math(rest: &str, extracted: &mut Extracted) -> Option<usize> {
    let (mode, close) = if rest.starts_with(r"\[") {
        (MathMode::Block, r"\]")
    } else if rest.starts_with(r"\(") {
        (MathMode::Inline, r"\)")
    } else {
        return None;
    };

    let body = &rest[2..];
    let end = body.find(close)?;
    let inner = &body[..end];
    // Math never crosses a paragraph break; a block may span single lines
    if crosses_blank_line(inner) {
        return None;
    }

    let consumed = 2 + end + close.len();
    let idx = extracted.spans.len();
    extracted.spans.push(MathSpan {
        expr: inner.replace('\n', " ").trim().to_string(),
        mode,
        source: rest[..consumed].to_string(),
    });
    extracted.text.push(TOKEN_OPEN);
    extracted.text.push_str(&idx.to_string());
    extracted.text.push(TOKEN_CLOSE);
    Some(consumed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{SystemEvent, WriterEvent};
    use crate::render::math::tests::FailingTypesetter;
    use std::sync::Arc;

    fn failing() -> ProseRenderer {
        ProseRenderer::new(MathRenderer::new(Arc::new(FailingTypesetter)))
    }

    #[test]
    fn test_full_block_expression() {
        let html = render_markdown(r"\[ x + 1 = 2 \]");
        assert!(html.starts_with("<div class=\"math-block\"><math"), "{}", html);
        assert!(html.ends_with("</math></div>\n"), "{}", html);
        assert!(!html.contains("<p>"));
    }

    #[test]
    fn test_inline_math_keeps_surrounding_text() {
        let html = render_markdown(r"The result is \(a+b\) today.");
        assert!(
            html.starts_with("<p>The result is <span class=\"math-inline\"><math"),
            "{}",
            html
        );
        assert!(html.ends_with("</math></span> today.</p>\n"), "{}", html);
        assert!(!html.contains(r"\("));
    }

    #[test]
    fn test_heuristic_leaves_plain_parentheses() {
        assert_eq!(render_markdown("see the result (final)"), "<p>see the result (final)</p>\n");
    }

    #[test]
    fn test_heuristic_promotes_math_parentheses() {
        let html = render_markdown("check (a+b=c)");
        assert!(html.starts_with("<p>check <span class=\"math-inline\"><math"), "{}", html);
        assert!(!html.contains("(a+b=c)"), "{}", html);
    }

    #[test]
    fn test_failed_promotion_keeps_original_text() {
        assert_eq!(failing().render("check (a+b=c)"), "<p>check (a+b=c)</p>\n");
    }

    #[test]
    fn test_failed_math_degrades_to_escaped_text() {
        let renderer = failing();
        assert_eq!(
            renderer.render(r"\[ x < 2 \]"),
            "<div class=\"math-block\">x &lt; 2</div>\n"
        );
        assert_eq!(
            renderer.render(r"so \(a+b\) holds"),
            "<p>so <span class=\"math-inline\">a+b</span> holds</p>\n"
        );
    }

    #[test]
    fn test_malformed_math_does_not_panic() {
        let html = render_markdown(r"bad \(x^{2\) here");
        assert!(html.contains("<span class=\"math-inline\">x^{2</span>"), "{}", html);
    }

    #[test]
    fn test_multiline_block_is_collapsed() {
        let html = render_markdown("Intro\n\n\\[\nx = 1\n+ y\n\\]\n\nAfter");
        assert!(html.starts_with("<p>Intro</p>\n<div class=\"math-block\"><math"), "{}", html);
        assert!(html.ends_with("</div>\n<p>After</p>\n"), "{}", html);
    }

    #[test]
    fn test_block_math_inside_paragraph_is_display_span() {
        let html = render_markdown(r"so that \[ E = mc^2 \] holds");
        assert!(html.contains("<span class=\"math-display\"><math"), "{}", html);
        assert!(html.starts_with("<p>so that "));
    }

    #[test]
    fn test_markdown_constructs_render() {
        let html = render_markdown("# Title\n\n- **bold** item\n- plain");
        assert!(html.contains("<h1>Title</h1>"), "{}", html);
        assert!(html.contains("<li><strong>bold</strong> item</li>"), "{}", html);
    }

    #[test]
    fn test_code_is_left_untouched() {
        let html = render_markdown(r"use `\(x\)` and `(a+b)` here");
        assert!(html.contains(r"<code>\(x\)</code>"), "{}", html);
        assert!(html.contains("<code>(a+b)</code>"), "{}", html);
        assert!(!html.contains("math-inline"));

        let fenced = render_markdown("```\n\\[ y \\]\nf(a+b)\n```\n");
        assert_eq!(fenced, "<pre><code>\\[ y \\]\nf(a+b)\n</code></pre>\n");
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let html = render_markdown("<script>alert(1)</script>\n\nHi <b>there</b>");
        assert!(!html.contains("<script>"), "{}", html);
        assert!(html.contains("&lt;script&gt;"), "{}", html);
        assert!(html.contains("&lt;b&gt;there&lt;/b&gt;"), "{}", html);
    }

    #[test]
    fn test_dangerous_link_schemes_are_neutralized() {
        let html = render_markdown("[x](javascript:alert(1)) and [y](https://example.com)");
        assert!(html.contains("<a href=\"#\">x</a>"), "{}", html);
        assert!(html.contains("<a href=\"https://example.com\">y</a>"), "{}", html);
        assert!(!html.contains("javascript"));
    }

    #[test]
    fn test_soft_breaks_become_line_breaks() {
        assert_eq!(render_markdown("one\ntwo"), "<p>one<br />\ntwo</p>\n");
    }

    #[test]
    fn test_placeholder_characters_in_input_are_stripped() {
        let html = render_markdown("a\u{E000}0\u{E001}b");
        assert_eq!(html, "<p>a0b</p>\n");
    }

    #[test]
    fn test_unterminated_delimiters_stay_literal() {
        let html = render_markdown(r"open \( never closed");
        assert_eq!(html, "<p>open \\( never closed</p>\n");

        let html = render_markdown(r"open \[ never closed");
        assert_eq!(html, "<p>open \\[ never closed</p>\n");
    }

    #[test]
    fn test_block_math_does_not_swallow_paragraphs() {
        let html = render_markdown("First \\[ a\n\nSecond paragraph prose\n\nThird \\]");
        assert!(!html.contains("<math"), "{}", html);
        assert!(html.starts_with("<p>First \\[ a</p>\n"), "{}", html);
        assert!(html.contains("<p>Second paragraph prose</p>"), "{}", html);
    }

    #[test]
    fn test_inline_math_does_not_cross_blank_line() {
        let html = render_markdown("so \\(a\n\nb\\) end");
        assert!(!html.contains("math-inline"), "{}", html);
        assert!(html.starts_with("<p>so \\(a</p>\n"), "{}", html);
    }

    #[test]
    fn test_crosses_blank_line() {
        assert!(crosses_blank_line("a\n\nb"));
        assert!(crosses_blank_line("a\n   \nb"));
        assert!(!crosses_blank_line("\nx = 1\n+ y\n"));
        assert!(!crosses_blank_line(" x "));
    }

    #[test]
    fn test_parse_error_in_promoted_span_keeps_original() {
        assert_eq!(render_markdown("check (a^) now"), "<p>check (a^) now</p>\n");
    }

    #[test]
    fn test_render_writer_feed() {
        let events = vec![
            StreamPayload::Writer(WriterEvent {
                id: "w\"1".into(),
                content: Some("Hello *world*".into()),
            }),
            StreamPayload::System(SystemEvent {
                id: "s1".into(),
                severity: Default::default(),
                content: Some("ignored".into()),
            }),
            StreamPayload::Writer(WriterEvent {
                id: "w2".into(),
                content: None,
            }),
        ];
        let html = ProseRenderer::default().render_writer_feed(&events);
        assert_eq!(
            html,
            "<section class=\"writer-message\" data-id=\"w&quot;1\">\n<p>Hello <em>world</em></p>\n</section>\n"
        );
    }
}
