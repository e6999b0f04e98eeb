//! Converts a raw answer from the question-answering service into plain text
//! and an injection-safe HTML fragment.
//!
//! The whole text is escaped before anything else looks at it. Every later
//! stage works on escaped text only, and every tag in the output is written by
//! [`SafeHtml::from_blocks`] from the block tree, never copied from input.

use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::constants::{DEFAULT_MAX_RESPONSE_BYTES, HEADER_TOKEN};

/// Text that went through [`escape_html`]. Only this module can build one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Escaped(String);

impl Escaped {
    fn from_escaped(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The text as it should appear to a reader.
    pub fn to_display(&self) -> String {
        unescape_html(&self.0)
    }
}

/// An HTML fragment produced by [`Renderer`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SafeHtml(String);

impl SafeHtml {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn from_blocks(blocks: &[Block]) -> Self {
        let mut out = String::new();
        for block in blocks {
            write_block(block, &mut out);
        }
        Self(out)
    }
}

impl fmt::Display for SafeHtml {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(Escaped),
    Code(Vec<Inline>),
    Strong(Vec<Inline>),
    Emphasis(Vec<Inline>),
    Link { href: Escaped, label: Vec<Inline> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, content: Vec<Inline> },
    List(Vec<Vec<Inline>>),
    Paragraph(Vec<Inline>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderedResponse {
    /// Header-stripped text, before any HTML is generated.
    pub plain_text: String,
    pub safe_html: SafeHtml,
    #[serde(skip)]
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone)]
pub struct Renderer {
    header_token: String,
    max_input_bytes: usize,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(HEADER_TOKEN, DEFAULT_MAX_RESPONSE_BYTES)
    }
}

impl Renderer {
    pub fn new(header_token: impl Into<String>, max_input_bytes: usize) -> Self {
        Self {
            header_token: header_token.into(),
            max_input_bytes,
        }
    }

    pub fn render(&self, raw: &str) -> RenderedResponse {
        let bounded = truncate_on_char_boundary(raw, self.max_input_bytes);
        if bounded.len() < raw.len() {
            warn!(
                original_bytes = raw.len(),
                kept_bytes = bounded.len(),
                "response exceeds render limit, truncating"
            );
        }
        let plain_text = strip_header_token(bounded, &self.header_token).to_string();
        let escaped = escape_html(&plain_text);
        let blocks = structure_blocks(&escaped);
        let safe_html = SafeHtml::from_blocks(&blocks);
        RenderedResponse {
            plain_text,
            safe_html,
            blocks,
        }
    }
}

/// Removes leading copies of `token` and trims what remains. Text that does
/// not start with the token is returned untouched.
pub fn strip_header_token<'a>(text: &'a str, token: &str) -> &'a str {
    if token.is_empty() {
        return text;
    }
    let mut rest = text;
    while let Some(after) = rest.strip_prefix(token) {
        rest = after.trim();
    }
    rest
}

pub fn escape_html(text: &str) -> Escaped {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    Escaped(out)
}

pub fn unescape_html(text: &str) -> String {
    const ENTITIES: [(&str, char); 5] = [
        ("&amp;", '&'),
        ("&lt;", '<'),
        ("&gt;", '>'),
        ("&quot;", '"'),
        ("&#39;", '\''),
    ];
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find('&') {
        out.push_str(&rest[..idx]);
        rest = &rest[idx..];
        match ENTITIES.iter().find(|(entity, _)| rest.starts_with(entity)) {
            Some((entity, ch)) => {
                out.push(*ch);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// True when following `url` would run script instead of navigating.
pub fn is_script_url(url: &str) -> bool {
    let normalized: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .take(16)
        .collect::<String>()
        .to_ascii_lowercase();
    ["javascript:", "vbscript:", "data:"]
        .iter()
        .any(|scheme| normalized.starts_with(scheme))
}

fn truncate_on_char_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut idx = max_bytes;
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    &text[..idx]
}

enum LineKind<'a> {
    Heading(u8, &'a str),
    Item(&'a str),
    Blank,
    Text(&'a str),
}

fn classify(line: &str) -> LineKind<'_> {
    if line.is_empty() {
        return LineKind::Blank;
    }
    for (level, marker) in [(3u8, "###"), (2, "##"), (1, "#")] {
        if let Some(rest) = after_marker(line, marker) {
            return LineKind::Heading(level, rest);
        }
    }
    for marker in ["*", "-", "+"] {
        if let Some(rest) = after_marker(line, marker) {
            return LineKind::Item(rest);
        }
    }
    LineKind::Text(line)
}

/// `marker`, at least one whitespace character, then a non-empty rest.
fn after_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(marker)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start();
    (!rest.is_empty()).then_some(rest)
}

fn structure_blocks(escaped: &Escaped) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut open_list: Option<Vec<Vec<Inline>>> = None;

    // Inline markup, links included, never spans a line feed.
    for raw_line in escaped.as_str().split('\n') {
        let kind = classify(raw_line.trim());
        if let LineKind::Item(rest) = kind {
            open_list.get_or_insert_with(Vec::new).push(parse_inline(rest));
            continue;
        }
        if let Some(items) = open_list.take() {
            blocks.push(Block::List(items));
        }
        match kind {
            LineKind::Heading(level, rest) => blocks.push(Block::Heading {
                level,
                content: parse_inline(rest),
            }),
            LineKind::Text(rest) => blocks.push(Block::Paragraph(parse_inline(rest))),
            LineKind::Blank | LineKind::Item(_) => {}
        }
    }
    if let Some(items) = open_list.take() {
        blocks.push(Block::List(items));
    }
    blocks
}

/// One character of line text, or an element built by an earlier pass.
/// Elements never match a delimiter.
enum Unit {
    Char(char),
    Node(Inline),
}

impl Unit {
    fn is(&self, ch: char) -> bool {
        matches!(self, Unit::Char(c) if *c == ch)
    }
}

fn parse_inline(text: &str) -> Vec<Inline> {
    let units = tokenize_links(text);
    let units = code_pass(units);
    let units = strong_pass(units);
    let units = emphasis_pass(units);
    collapse(units)
}

fn parse_label(text: &str) -> Vec<Inline> {
    let units = text.chars().map(Unit::Char).collect();
    collapse(emphasis_pass(strong_pass(code_pass(units))))
}

/// First-occurrence lookup that remembers its last answer, so repeated
/// searches from increasing offsets stay linear overall.
struct NextByte {
    byte: u8,
    searched_from: usize,
    found: Option<Option<usize>>,
}

impl NextByte {
    fn new(byte: u8) -> Self {
        Self {
            byte,
            searched_from: 0,
            found: None,
        }
    }

    fn find(&mut self, haystack: &[u8], from: usize) -> Option<usize> {
        if let Some(found) = self.found {
            if from >= self.searched_from {
                match found {
                    Some(pos) if pos >= from => return Some(pos),
                    None => return None,
                    Some(_) => {}
                }
            }
        }
        let found = haystack
            .get(from..)
            .and_then(|tail| tail.iter().position(|b| *b == self.byte))
            .map(|rel| from + rel);
        self.searched_from = from;
        self.found = Some(found);
        found
    }
}

/// `[label](target)`: the label runs to the first `]`, the target to the
/// first `)`, both non-empty.
fn tokenize_links(line: &str) -> Vec<Unit> {
    let bytes = line.as_bytes();
    let mut units = Vec::with_capacity(line.len());
    let mut close_bracket = NextByte::new(b']');
    let mut close_paren = NextByte::new(b')');
    let mut emitted = 0usize;
    let mut search = 0usize;

    while let Some(rel) = line[search..].find('[') {
        let open = search + rel;
        let label_start = open + 1;
        let Some(label_end) = close_bracket.find(bytes, label_start) else {
            break;
        };
        if label_end == label_start || bytes.get(label_end + 1) != Some(&b'(') {
            search = open + 1;
            continue;
        }
        let target_start = label_end + 2;
        let Some(target_end) = close_paren.find(bytes, target_start) else {
            break;
        };
        if target_end == target_start {
            search = open + 1;
            continue;
        }

        units.extend(line[emitted..open].chars().map(Unit::Char));
        let target = &line[target_start..target_end];
        let href = if is_script_url(&unescape_html(target)) {
            Escaped::from_escaped("#")
        } else {
            Escaped::from_escaped(target)
        };
        units.push(Unit::Node(Inline::Link {
            href,
            label: parse_label(&line[label_start..label_end]),
        }));
        emitted = target_end + 1;
        search = emitted;
    }
    units.extend(line[emitted..].chars().map(Unit::Char));
    units
}

fn find_delim(units: &[Unit], from: usize, delim: &[char]) -> Option<usize> {
    let last = units.len().checked_sub(delim.len())?;
    (from..=last).find(|&at| starts_with_delim(units, at, delim))
}

fn starts_with_delim(units: &[Unit], at: usize, delim: &[char]) -> bool {
    at + delim.len() <= units.len()
        && delim.iter().enumerate().all(|(k, ch)| units[at + k].is(*ch))
}

/// Leftmost `delim content delim` spans as `(opener, closer)` positions. The
/// content holds at least one unit and ends at the first closing delimiter.
/// With `content_excludes_delim` a delimiter right after the opener fails the
/// match instead of becoming content.
fn find_spans(units: &[Unit], delim: &[char], content_excludes_delim: bool) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut i = 0usize;
    while i < units.len() {
        if !starts_with_delim(units, i, delim) {
            i += 1;
            continue;
        }
        let content_start = i + delim.len();
        let search_from = if content_excludes_delim {
            content_start
        } else {
            content_start + 1
        };
        // No closer past this opener means none past any later opener either.
        match find_delim(units, search_from, delim) {
            None => break,
            Some(close) if close == content_start => i += 1,
            Some(close) => {
                spans.push((i, close));
                i = close + delim.len();
            }
        }
    }
    spans
}

fn span_pass(
    units: Vec<Unit>,
    delim: &[char],
    content_excludes_delim: bool,
    build: impl Fn(Vec<Unit>) -> Inline,
) -> Vec<Unit> {
    let spans = find_spans(&units, delim, content_excludes_delim);
    if spans.is_empty() {
        return units;
    }
    let mut out = Vec::with_capacity(units.len());
    let mut iter = units.into_iter();
    let mut pos = 0usize;
    for (open, close) in spans {
        out.extend(iter.by_ref().take(open - pos));
        let content: Vec<Unit> = iter
            .by_ref()
            .skip(delim.len())
            .take(close - open - delim.len())
            .collect();
        iter.by_ref().take(delim.len()).for_each(drop);
        out.push(Unit::Node(build(content)));
        pos = close + delim.len();
    }
    out.extend(iter);
    out
}

fn code_pass(units: Vec<Unit>) -> Vec<Unit> {
    span_pass(units, &['`'], true, |content| Inline::Code(collapse(content)))
}

fn strong_pass(units: Vec<Unit>) -> Vec<Unit> {
    span_pass(units, &['*', '*'], false, |content| {
        Inline::Strong(collapse(emphasis_pass(content)))
    })
}

fn emphasis_pass(units: Vec<Unit>) -> Vec<Unit> {
    span_pass(units, &['*'], false, |content| Inline::Emphasis(collapse(content)))
}

fn collapse(units: Vec<Unit>) -> Vec<Inline> {
    let mut nodes = Vec::new();
    let mut text = String::new();
    for unit in units {
        match unit {
            Unit::Char(ch) => text.push(ch),
            Unit::Node(node) => {
                if !text.is_empty() {
                    nodes.push(Inline::Text(Escaped(std::mem::take(&mut text))));
                }
                nodes.push(node);
            }
        }
    }
    if !text.is_empty() {
        nodes.push(Inline::Text(Escaped(text)));
    }
    nodes
}

fn write_block(block: &Block, out: &mut String) {
    match block {
        Block::Heading { level, content } => {
            out.push_str(&format!("<h{level}>"));
            write_inlines(content, out);
            out.push_str(&format!("</h{level}>"));
        }
        Block::List(items) => {
            out.push_str("<ul>");
            for item in items {
                out.push_str("<li>");
                write_inlines(item, out);
                out.push_str("</li>");
            }
            out.push_str("</ul>");
        }
        Block::Paragraph(content) => {
            out.push_str("<p>");
            write_inlines(content, out);
            out.push_str("</p>");
        }
    }
}

fn write_inlines(nodes: &[Inline], out: &mut String) {
    for node in nodes {
        match node {
            Inline::Text(text) => out.push_str(text.as_str()),
            Inline::Code(children) => wrap_inlines("code", children, out),
            Inline::Strong(children) => wrap_inlines("strong", children, out),
            Inline::Emphasis(children) => wrap_inlines("em", children, out),
            Inline::Link { href, label } => {
                out.push_str("<a href=\"");
                out.push_str(href.as_str());
                out.push_str("\" target=\"_blank\" rel=\"noopener noreferrer\">");
                write_inlines(label, out);
                out.push_str("</a>");
            }
        }
    }
}

fn wrap_inlines(tag: &str, children: &[Inline], out: &mut String) {
    out.push('<');
    out.push_str(tag);
    out.push('>');
    write_inlines(children, out);
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}
