//! Restricted Markdown rendering for note text.
//!
//! # Responsibility
//! - Render the small inline-oriented Markdown subset notes support.
//! - Neutralize everything else so note HTML is safe to embed as-is.
//!
//! # Invariants
//! - Raw HTML is always escaped, never passed through.
//! - Headings, block quotes, code blocks, HTML blocks, thematic breaks,
//!   link reference definitions, links, autolinks and images are not
//!   rendered; their source text is emitted as escaped plain text in place.
//! - Unsupported block syntax never splits a paragraph: a line that would
//!   interrupt one is read as its continuation.
//! - A fenced block whose fences are backtick runs reads as one inline code
//!   span, the way backticks behave inside a paragraph.
//! - Emphasis, strong, strikethrough, inline code, entities, backslash
//!   escapes, lists and paragraphs render normally. Only backslash line
//!   breaks produce `<br />`; trailing spaces do not.

use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use std::ops::Range;

/// Renders note Markdown into an HTML fragment.
pub fn render_note_html(source: &str) -> String {
    let prepared = neutralize_blocks(source);

    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(&prepared, options);
    let events = restrict_events(&prepared, parser.into_offset_iter());

    let mut output = String::with_capacity(source.len() + source.len() / 2);
    html::push_html(&mut output, events.into_iter());
    output
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fence {
    marker: u8,
    len: usize,
}

#[derive(Debug, PartialEq, Eq)]
enum BlockStart {
    /// Ordinary paragraph text (or an indented line).
    Plain,
    /// A list marker with nothing after it.
    Bare,
    /// Unsupported block syntax; a backslash goes in at this byte offset.
    Escape(usize),
    Fence(Fence),
}

/// Rewrites unsupported block syntax so the parser reads it as paragraph
/// text. Backslash escapes keep the visible text unchanged; lines that would
/// interrupt a paragraph are indented past every list container so they
/// become lazy continuation lines instead.
fn neutralize_blocks(source: &str) -> String {
    let mut out = String::with_capacity(source.len() + 16);
    let mut in_paragraph = false;
    let mut fence: Option<Fence> = None;
    let mut widest_prefix = 0usize;

    for line in source.split_inclusive('\n') {
        if let Some(open) = fence {
            out.push_str(line);
            if closes_fence(line, open) {
                fence = None;
            }
            continue;
        }

        let content = line.trim_end_matches(['\n', '\r']);
        if content.trim().is_empty() {
            in_paragraph = false;
            out.push_str(line);
            continue;
        }

        widest_prefix = widest_prefix.max(container_width(content));
        if in_paragraph && interrupts_paragraph(content) {
            out.extend(std::iter::repeat(' ').take(widest_prefix + 4));
            out.push_str(line);
            continue;
        }

        match block_start(content) {
            BlockStart::Plain => {
                out.push_str(line);
                in_paragraph = true;
            }
            BlockStart::Bare => out.push_str(line),
            BlockStart::Escape(at) => {
                out.push_str(&line[..at]);
                out.push('\\');
                out.push_str(&line[at..]);
                in_paragraph = true;
            }
            BlockStart::Fence(open) => {
                out.push_str(line);
                fence = Some(open);
                in_paragraph = false;
            }
        }
    }

    out
}

fn block_start(content: &str) -> BlockStart {
    let (mut pos, indent) = leading_whitespace(content);
    if indent >= 4 {
        return BlockStart::Plain;
    }

    loop {
        let rest = &content[pos..];
        if rest.trim().is_empty() {
            return BlockStart::Bare;
        }
        if is_thematic_break(rest) {
            return BlockStart::Escape(pos);
        }
        if let Some(fence) = fence_open(rest) {
            return BlockStart::Fence(fence);
        }
        if let Some(marker) = list_marker_len(rest) {
            let after = &rest[marker..];
            let spacing = after.len() - after.trim_start_matches([' ', '\t']).len();
            if after.trim().is_empty() {
                return BlockStart::Bare;
            }
            // Item content indented this far is a code block.
            if spacing > 4 {
                return BlockStart::Plain;
            }
            pos += marker + spacing;
            continue;
        }
        if is_atx_heading(rest) || rest.starts_with(['>', '<']) || is_reference_definition(rest) {
            return BlockStart::Escape(pos);
        }
        return BlockStart::Plain;
    }
}

fn interrupts_paragraph(content: &str) -> bool {
    let (pos, indent) = leading_whitespace(content);
    if indent >= 4 {
        return false;
    }
    let rest = &content[pos..];
    is_atx_heading(rest)
        || rest.starts_with(['>', '<'])
        || fence_open(rest).is_some()
        || is_thematic_break(rest)
        || is_setext_underline(rest)
}

/// Byte offset and column width of the leading spaces and tabs.
fn leading_whitespace(content: &str) -> (usize, usize) {
    let mut columns = 0;
    for (at, ch) in content.char_indices() {
        match ch {
            ' ' => columns += 1,
            '\t' => columns += 4 - columns % 4,
            _ => return (at, columns),
        }
    }
    (content.len(), columns)
}

/// Columns taken by leading list markers and indentation.
fn container_width(content: &str) -> usize {
    let mut columns = 0;
    for ch in content.chars() {
        match ch {
            '\t' => columns += 4 - columns % 4,
            ' ' | '-' | '+' | '*' | '>' | '.' | ')' | '0'..='9' => columns += 1,
            _ => break,
        }
    }
    columns
}

fn is_thematic_break(rest: &str) -> bool {
    let Some(marker) = rest.chars().next().filter(|c| matches!(c, '*' | '-' | '_')) else {
        return false;
    };
    let mut count = 0;
    for ch in rest.chars() {
        match ch {
            ' ' | '\t' => {}
            c if c == marker => count += 1,
            _ => return false,
        }
    }
    count >= 3
}

fn is_setext_underline(rest: &str) -> bool {
    let rest = rest.trim_end();
    !rest.is_empty() && (rest.bytes().all(|b| b == b'=') || rest.bytes().all(|b| b == b'-'))
}

fn is_atx_heading(rest: &str) -> bool {
    let hashes = rest.bytes().take_while(|b| *b == b'#').count();
    (1..=6).contains(&hashes) && matches!(rest.as_bytes().get(hashes), None | Some(b' ' | b'\t'))
}

fn is_reference_definition(rest: &str) -> bool {
    rest.starts_with('[') && rest.contains("]:")
}

fn fence_open(rest: &str) -> Option<Fence> {
    let marker = *rest.as_bytes().first()?;
    if marker != b'`' && marker != b'~' {
        return None;
    }
    let len = rest.bytes().take_while(|b| *b == marker).count();
    if len < 3 || (marker == b'`' && rest[len..].contains('`')) {
        return None;
    }
    Some(Fence { marker, len })
}

fn closes_fence(line: &str, open: Fence) -> bool {
    let line = line.trim();
    let run = line.bytes().take_while(|b| *b == open.marker).count();
    run >= open.len && run == line.len()
}

/// Length of a bullet or ordered list marker at the start of `rest`.
fn list_marker_len(rest: &str) -> Option<usize> {
    let bytes = rest.as_bytes();
    let len = match bytes.first()? {
        b'-' | b'+' | b'*' => 1,
        b'0'..=b'9' => {
            let digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
            if digits > 9 || !matches!(bytes.get(digits), Some(b'.' | b')')) {
                return None;
            }
            digits + 1
        }
        _ => return None,
    };
    matches!(bytes.get(len), None | Some(b' ' | b'\t')).then_some(len)
}

fn restrict_events<'a>(
    source: &'a str,
    events: impl Iterator<Item = (Event<'a>, Range<usize>)>,
) -> Vec<Event<'a>> {
    let mut out = Vec::new();
    // Nesting depth inside a disallowed construct whose source was already emitted.
    let mut skip_depth = 0usize;

    for (event, range) in events {
        if skip_depth > 0 {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(_))) => {
                push_fence(&mut out, &source[range]);
                skip_depth = 1;
            }
            Event::Start(tag) if is_disallowed_block(&tag) => {
                push_raw_paragraphs(&mut out, &source[range]);
                skip_depth = 1;
            }
            Event::Start(tag) if is_disallowed_inline(&tag) => {
                out.push(Event::Text(CowStr::Borrowed(&source[range])));
                skip_depth = 1;
            }
            Event::HardBreak if !source[range.clone()].starts_with('\\') => {
                out.push(Event::SoftBreak);
            }
            Event::Rule => push_raw_paragraphs(&mut out, &source[range]),
            Event::Html(raw) | Event::InlineHtml(raw) => out.push(Event::Text(raw)),
            Event::FootnoteReference(_) | Event::TaskListMarker(_) => {
                out.push(Event::Text(CowStr::Borrowed(&source[range])));
            }
            other => out.push(other),
        }
    }

    out
}

fn push_fence<'a>(out: &mut Vec<Event<'a>>, raw: &str) {
    match fence_as_code_span(raw) {
        Some(code) => {
            out.push(Event::Start(Tag::Paragraph));
            out.push(Event::Code(CowStr::from(code)));
            out.push(Event::End(TagEnd::Paragraph));
        }
        None => push_raw_paragraphs(out, raw),
    }
}

/// Reads a backtick fenced block as a code span: the runs must match
/// exactly, nothing may sit between blank lines, and line ends become
/// spaces.
fn fence_as_code_span(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let run = raw.bytes().take_while(|b| *b == b'`').count();
    let closing = raw.bytes().rev().take_while(|b| *b == b'`').count();
    if run == 0 || closing != run || raw.len() <= 2 * run {
        return None;
    }
    if raw.lines().any(|line| line.trim().is_empty()) {
        return None;
    }

    let inner = &raw[run..raw.len() - run];
    let has_same_run = inner
        .split(|c| c != '`')
        .any(|backticks| backticks.len() == run);
    if has_same_run {
        return None;
    }

    let code = inner
        .split('\n')
        .map(|line| line.trim_end_matches('\r').trim_start())
        .collect::<Vec<_>>()
        .join(" ");
    let stripped = code
        .strip_prefix(' ')
        .and_then(|code| code.strip_suffix(' '))
        .filter(|_| !code.bytes().all(|b| b == b' '));
    Some(stripped.map(str::to_owned).unwrap_or(code))
}

/// Emits `raw` as escaped text, one paragraph per blank-line-separated run.
fn push_raw_paragraphs<'a>(out: &mut Vec<Event<'a>>, raw: &str) {
    let mut lines: Vec<&str> = Vec::new();
    for line in raw.lines().chain(std::iter::once("")) {
        let line = line.trim();
        if !line.is_empty() {
            lines.push(line);
            continue;
        }
        if lines.is_empty() {
            continue;
        }
        out.push(Event::Start(Tag::Paragraph));
        out.push(Event::Text(CowStr::from(lines.join("\n"))));
        out.push(Event::End(TagEnd::Paragraph));
        lines.clear();
    }
}

fn is_disallowed_block(tag: &Tag<'_>) -> bool {
    matches!(
        tag,
        Tag::Heading { .. }
            | Tag::BlockQuote
            | Tag::CodeBlock(_)
            | Tag::HtmlBlock
            | Tag::Table(_)
            | Tag::FootnoteDefinition(_)
            | Tag::MetadataBlock(_)
    )
}

fn is_disallowed_inline(tag: &Tag<'_>) -> bool {
    matches!(tag, Tag::Link { .. } | Tag::Image { .. })
}

#[cfg(test)]
mod tests {
    use super::render_note_html;

    #[test]
    fn renders_emphasis_and_inline_code() {
        let html = render_note_html("*italic* **bold** ~~gone~~ `os.urandom(16)`");
        assert!(html.contains("<em>italic</em>"));
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<del>gone</del>"));
        assert!(html.contains("<code>os.urandom(16)</code>"));
    }

    #[test]
    fn renders_nested_lists() {
        let html = render_note_html("- Unordered list\n- Foo\n    - Indented list item\n- Bar");
        assert!(html.contains("<ul>"));
        assert!(html.contains("<li>Indented list item</li>"));
        let ordered = render_note_html("1. Ordered list\n2. Second item");
        assert!(ordered.contains("<ol>"));
        assert!(ordered.contains("<li>Second item</li>"));
    }

    #[test]
    fn decodes_entities_and_honours_escapes() {
        let html = render_note_html("HTML entities: &copy;.\n\n\\*not emphasis*");
        assert!(html.contains("HTML entities: ©."));
        assert!(html.contains("*not emphasis*"));
        assert!(!html.contains("<em>"));
    }

    #[test]
    fn escapes_raw_html() {
        let html = render_note_html("<pre>An HTML block.</pre>\n\ninline <b>bold</b>");
        assert!(html.contains("&lt;pre&gt;An HTML block.&lt;/pre&gt;"));
        assert!(html.contains("&lt;b&gt;bold&lt;/b&gt;"));
        assert!(!html.contains("<pre>"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn headings_and_quotes_stay_plain_text() {
        let html = render_note_html("# An ATX heading\n\n> This is a blockquote.");
        assert!(html.contains("<p># An ATX heading</p>"));
        assert!(html.contains("<p>&gt; This is a blockquote.</p>"));
        assert!(!html.contains("<h1>"));
        assert!(!html.contains("<blockquote>"));
    }

    #[test]
    fn links_and_images_are_not_rendered() {
        let html = render_note_html(
            "[A link](https://example.com/) and ![Image](https://example.com/a.jpg) and <https://example.com/>",
        );
        assert!(!html.contains("<a "));
        assert!(!html.contains("<img"));
        assert!(html.contains("[A link](https://example.com/)"));
        assert!(html.contains("![Image](https://example.com/a.jpg)"));
        assert!(html.contains("&lt;https://example.com/&gt;"));
    }

    #[test]
    fn reference_definitions_stay_visible() {
        assert_eq!(
            render_note_html("see [1]\n\n[1]: https://example.com/x"),
            "<p>see [1]</p>\n<p>[1]: https://example.com/x</p>\n"
        );
        let listed = render_note_html("- [docs]: https://example.com/docs \"Docs\"");
        assert!(listed.contains("[docs]: https://example.com/docs"));
        assert!(!listed.contains("<a "));
    }

    #[test]
    fn only_backslash_line_breaks_render() {
        assert_eq!(
            render_note_html("line one  \nline two"),
            "<p>line one\nline two</p>\n"
        );
        assert_eq!(render_note_html("a\\\nb"), "<p>a<br />\nb</p>\n");
    }

    #[test]
    fn unsupported_blocks_do_not_split_paragraphs() {
        assert_eq!(render_note_html("text\n# head"), "<p>text\n# head</p>\n");
        assert_eq!(
            render_note_html("A setext heading\n========="),
            "<p>A setext heading\n=========</p>\n"
        );
        assert_eq!(
            render_note_html("before\n> quoted\n<div>"),
            "<p>before\n&gt; quoted\n&lt;div&gt;</p>\n"
        );
        let listed = render_note_html("- item\n# head");
        assert!(listed.contains("<li>item\n# head</li>"));
        assert!(!listed.contains("<h1>"));
    }

    #[test]
    fn thematic_breaks_stay_plain_text() {
        assert_eq!(render_note_html("***"), "<p>***</p>\n");
        assert_eq!(render_note_html("above\n\n- - -"), "<p>above</p>\n<p>- - -</p>\n");
    }

    #[test]
    fn fenced_blocks_read_as_code_spans() {
        assert_eq!(
            render_note_html("```\n# fenced code block\nimport uuid\nuuid.uuid4()\n```"),
            "<p><code># fenced code block import uuid uuid.uuid4()</code></p>\n"
        );
        let tilde = render_note_html("~~~\nplain\n~~~");
        assert!(!tilde.contains("<pre>"));
        assert!(tilde.contains("plain"));
    }

    #[test]
    fn code_blocks_are_not_rendered() {
        let html = render_note_html("para\n\n    # indented code block\n    import random\n");
        assert!(!html.contains("<pre>"));
        assert!(html.contains("<p># indented code block\nimport random</p>"));
    }
}
