//! Lenient HTML reader.
//!
//! Accepts arbitrary, possibly malformed markup and never fails. Parsing runs
//! in two passes: a tokenizer plus a forgiving tree builder produce a loose
//! element tree, which is then coerced into document blocks. Anything the
//! document model cannot represent degrades to a paragraph holding its text.

use smol_str::SmolStr;

use crate::document::{Block, BlockKind, Document, HeadingLevel, Node, TextRun};
use crate::marks::{HexColor, Mark, MarkSet, TextAlign};

/// Elements whose start tag implicitly closes an open `<p>`.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "dd", "details", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "hr", "html", "li", "main", "nav", "ol", "p", "pre", "section", "summary", "table",
    "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

/// Containers that stop the implicit closing of `<p>`.
const SCOPE_TAGS: &[&str] = &[
    "blockquote", "div", "li", "ol", "section", "article", "td", "th", "table", "ul",
];

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements whose content is never shown.
const RAW_TEXT_TAGS: &[&str] = &["script", "style", "template", "noscript", "title"];

type Attrs = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Start {
        name: String,
        attrs: Attrs,
        self_closing: bool,
    },
    End(String),
    Text(String),
}

#[derive(Debug, Clone, Default)]
struct Element {
    name: String,
    attrs: Attrs,
    children: Vec<Dom>,
}

#[derive(Debug, Clone)]
enum Dom {
    Element(Element),
    Text(String),
}

/// Parse HTML into a normalized document.
pub(crate) fn parse(html: &str) -> Document {
    let dom = build_tree(tokenize(html));
    Document::from_nodes(blocks_from(&dom))
}

// Tokenizer

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.src[start..self.pos]
    }
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = input;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("<!--") {
            rest = after.find("-->").map(|i| &after[i + 3..]).unwrap_or("");
            continue;
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            rest = rest.find('>').map(|i| &rest[i + 1..]).unwrap_or("");
            continue;
        }
        if let Some(after) = rest.strip_prefix("</") {
            if after.starts_with(|c: char| c.is_ascii_alphabetic()) {
                let end = after.find('>').unwrap_or(after.len());
                let name = after[..end]
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .to_ascii_lowercase();
                tokens.push(Token::End(name));
                rest = after.get(end + 1..).unwrap_or("");
                continue;
            }
        }
        if let Some(after) = rest.strip_prefix('<') {
            if after.starts_with(|c: char| c.is_ascii_alphabetic()) {
                let (token, consumed) = parse_tag(after);
                rest = &after[consumed..];
                if let Token::Start {
                    name,
                    self_closing: false,
                    ..
                } = &token
                {
                    if RAW_TEXT_TAGS.contains(&name.as_str()) {
                        rest = skip_raw_text(rest, name);
                        tracing::debug!(target: "folio::html", tag = %name, "dropped raw text element");
                        continue;
                    }
                }
                tokens.push(token);
                continue;
            }
        }

        let skip = rest.chars().next().map(char::len_utf8).unwrap_or(1);
        let end = rest[skip..]
            .find('<')
            .map(|i| i + skip)
            .unwrap_or(rest.len());
        tokens.push(Token::Text(decode_entities(&rest[..end])));
        rest = &rest[end..];
    }
    tokens
}

/// Parse a start tag after its `<`. Returns the token and bytes consumed.
fn parse_tag(src: &str) -> (Token, usize) {
    let mut cur = Cursor::new(src);
    let name = cur
        .eat_while(|c| c.is_ascii_alphanumeric() || c == '-')
        .to_ascii_lowercase();
    let mut attrs = Vec::new();
    let mut self_closing = false;
    loop {
        cur.eat_while(char::is_whitespace);
        match cur.peek() {
            None => break,
            Some('>') => {
                cur.bump();
                break;
            }
            Some('/') => {
                cur.bump();
                if cur.peek() == Some('>') {
                    cur.bump();
                    self_closing = true;
                    break;
                }
            }
            Some(_) => {
                let key = cur
                    .eat_while(|c| !c.is_whitespace() && !matches!(c, '=' | '>' | '/'))
                    .to_ascii_lowercase();
                if key.is_empty() {
                    cur.bump();
                    continue;
                }
                cur.eat_while(char::is_whitespace);
                let value = if cur.peek() == Some('=') {
                    cur.bump();
                    cur.eat_while(char::is_whitespace);
                    match cur.peek() {
                        Some(quote @ ('"' | '\'')) => {
                            cur.bump();
                            let raw = cur.eat_while(|c| c != quote);
                            cur.bump();
                            decode_entities(raw)
                        }
                        _ => decode_entities(cur.eat_while(|c| !c.is_whitespace() && c != '>')),
                    }
                } else {
                    String::new()
                };
                attrs.push((key, value));
            }
        }
    }
    (
        Token::Start {
            name,
            attrs,
            self_closing,
        },
        cur.pos,
    )
}

fn skip_raw_text<'a>(rest: &'a str, name: &str) -> &'a str {
    // ASCII lowercasing keeps byte offsets intact.
    let lower = rest.to_ascii_lowercase();
    match lower.find(&format!("</{name}")) {
        Some(start) => rest[start..]
            .find('>')
            .map(|end| &rest[start + end + 1..])
            .unwrap_or(""),
        None => "",
    }
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(i) = rest.find('&') {
        out.push_str(&rest[..i]);
        let tail = &rest[i + 1..];
        let decoded = tail
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_entity(&tail[..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

// Tree builder

fn build_tree(tokens: Vec<Token>) -> Vec<Dom> {
    let mut stack = vec![Element::default()];
    for token in tokens {
        match token {
            Token::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    top.children.push(Dom::Text(text));
                }
            }
            Token::Start {
                name,
                attrs,
                self_closing,
            } => {
                close_implied(&mut stack, &name);
                let element = Element {
                    name,
                    attrs,
                    children: Vec::new(),
                };
                if self_closing || VOID_TAGS.contains(&element.name.as_str()) {
                    if let Some(top) = stack.last_mut() {
                        top.children.push(Dom::Element(element));
                    }
                } else {
                    stack.push(element);
                }
            }
            Token::End(name) => {
                // Stray end tags are ignored.
                if let Some(depth) = stack.iter().rposition(|e| e.name == name) {
                    if depth > 0 {
                        close_to(&mut stack, depth);
                    }
                }
            }
        }
    }
    close_to(&mut stack, 1);
    stack.pop().map(|root| root.children).unwrap_or_default()
}

/// Pop elements until only `depth` remain, attaching each to its parent.
fn close_to(stack: &mut Vec<Element>, depth: usize) {
    while stack.len() > depth {
        let Some(element) = stack.pop() else { break };
        if let Some(parent) = stack.last_mut() {
            parent.children.push(Dom::Element(element));
        }
    }
}

fn close_implied(stack: &mut Vec<Element>, name: &str) {
    if BLOCK_TAGS.contains(&name) {
        close_open(stack, "p", SCOPE_TAGS);
    }
    if name == "li" {
        close_open(stack, "li", &["ul", "ol"]);
    }
}

fn close_open(stack: &mut Vec<Element>, target: &str, boundaries: &[&str]) {
    for depth in (1..stack.len()).rev() {
        let name = stack[depth].name.as_str();
        if name == target {
            close_to(stack, depth);
            return;
        }
        if boundaries.contains(&name) {
            return;
        }
    }
}

// Coercion into document blocks

fn is_block_level(dom: &Dom) -> bool {
    matches!(dom, Dom::Element(e) if BLOCK_TAGS.contains(&e.name.as_str()))
}

fn is_blank(dom: &Dom) -> bool {
    matches!(dom, Dom::Text(t) if t.chars().all(|c| c.is_ascii_whitespace()))
}

/// Convert a sequence of siblings in block context.
fn blocks_from(children: &[Dom]) -> Vec<Node> {
    let mut out = Vec::new();
    let mut inline = InlineBuf::new(BlockKind::Paragraph, None, false);
    for child in children {
        if is_block_level(child) {
            inline.flush_into(&mut out);
            if let Dom::Element(element) = child {
                out.extend(block_from(element));
            }
        } else if inline.is_empty() && is_blank(child) {
            continue;
        } else {
            inline.push(child, &MarkSet::new());
        }
    }
    inline.flush_into(&mut out);
    out
}

fn block_from(element: &Element) -> Vec<Node> {
    let align = block_align(&element.attrs);
    match element.name.as_str() {
        "p" => textblock(BlockKind::Paragraph, align, &element.children),
        "h1" => textblock(BlockKind::Heading(HeadingLevel::H1), align, &element.children),
        "h2" => textblock(BlockKind::Heading(HeadingLevel::H2), align, &element.children),
        "h3" => textblock(BlockKind::Heading(HeadingLevel::H3), align, &element.children),
        "h4" | "h5" | "h6" => {
            tracing::debug!(target: "folio::html", tag = %element.name, "heading level coerced to 3");
            textblock(BlockKind::Heading(HeadingLevel::H3), align, &element.children)
        }
        "pre" => {
            let mut text = String::new();
            raw_text(&element.children, &mut text);
            vec![Node::Block(Block::code_block(text))]
        }
        "blockquote" => vec![Node::Block(Block::new(
            BlockKind::Blockquote,
            blocks_from(&element.children),
        ))],
        "ul" | "ol" => {
            let kind = if element.name == "ul" {
                BlockKind::BulletList
            } else {
                BlockKind::OrderedList
            };
            let mut items = Vec::new();
            for child in &element.children {
                match child {
                    Dom::Element(li) if li.name == "li" => items.push(Node::Block(Block::new(
                        BlockKind::ListItem,
                        blocks_from(&li.children),
                    ))),
                    other if is_blank(other) => {}
                    other => items.extend(blocks_from(std::slice::from_ref(other))),
                }
            }
            vec![Node::Block(Block::new(kind, items))]
        }
        "hr" => Vec::new(),
        // Structural containers are transparent when they hold blocks.
        _ if element.children.iter().any(is_block_level) => blocks_from(&element.children),
        other => {
            if !matches!(other, "div" | "li" | "section" | "article" | "td" | "th") {
                tracing::debug!(target: "folio::html", tag = %other, "coerced element to paragraph");
            }
            textblock(BlockKind::Paragraph, align, &element.children)
        }
    }
}

fn textblock(kind: BlockKind, align: Option<TextAlign>, children: &[Dom]) -> Vec<Node> {
    let mut buf = InlineBuf::new(kind, align, true);
    for child in children {
        buf.push(child, &MarkSet::new());
    }
    let mut out = Vec::new();
    buf.flush_into(&mut out);
    out
}

fn raw_text(children: &[Dom], out: &mut String) {
    for child in children {
        match child {
            Dom::Text(text) => out.push_str(text),
            Dom::Element(e) if e.name == "br" => out.push('\n'),
            Dom::Element(e) => raw_text(&e.children, out),
        }
    }
}

/// Accumulates inline content for one textblock element.
///
/// `<br>` ends the current line and starts another block of the same kind;
/// images are hoisted out as sibling blocks.
struct InlineBuf {
    kind: BlockKind,
    align: Option<TextAlign>,
    runs: Vec<TextRun>,
    /// The current line ends in a space produced by collapsing source
    /// formatting whitespace.
    soft_tail: bool,
    /// Emit an empty textblock if nothing else came out.
    keep_empty: bool,
    out: Vec<Node>,
}

impl InlineBuf {
    fn new(kind: BlockKind, align: Option<TextAlign>, keep_empty: bool) -> Self {
        Self {
            kind,
            align,
            runs: Vec::new(),
            soft_tail: false,
            keep_empty,
            out: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    fn push(&mut self, dom: &Dom, marks: &MarkSet) {
        match dom {
            Dom::Text(text) => self.push_text(text, marks),
            Dom::Element(e) => match e.name.as_str() {
                "br" => self.end_line(true),
                "img" => {
                    if let Some(image) = image_from(&e.attrs) {
                        self.end_line(false);
                        self.out.push(Node::Block(image));
                    }
                }
                name => {
                    let marks = element_marks(marks, name, &e.attrs);
                    for child in &e.children {
                        self.push(child, &marks);
                    }
                }
            },
        }
    }

    fn push_text(&mut self, text: &str, marks: &MarkSet) {
        let mut buf = String::with_capacity(text.len());
        let mut soft = self.soft_tail;
        let mut rest = text;
        while !rest.is_empty() {
            let ws = rest
                .find(|c: char| !c.is_ascii_whitespace())
                .unwrap_or(rest.len());
            if ws > 0 {
                let run = &rest[..ws];
                if run.contains(['\n', '\r', '\t', '\x0C']) {
                    let at_start = self.runs.is_empty() && buf.is_empty();
                    let after_space = if buf.is_empty() {
                        self.last_char() == Some(' ')
                    } else {
                        buf.ends_with(' ')
                    };
                    if !at_start && !after_space {
                        buf.push(' ');
                        soft = true;
                    }
                } else {
                    buf.push_str(run);
                    soft = false;
                }
                rest = &rest[ws..];
            } else {
                let word = rest
                    .find(|c: char| c.is_ascii_whitespace())
                    .unwrap_or(rest.len());
                buf.push_str(&rest[..word]);
                soft = false;
                rest = &rest[word..];
            }
        }
        if buf.is_empty() {
            return;
        }
        self.soft_tail = soft;
        self.runs.push(TextRun::new(buf, marks.clone()));
    }

    fn last_char(&self) -> Option<char> {
        self.runs.last().and_then(|r| r.text.chars().last())
    }

    /// Emit the current line. With `force`, an empty line still produces a
    /// block.
    fn end_line(&mut self, force: bool) {
        if self.soft_tail {
            if let Some(last) = self.runs.last_mut() {
                last.text.pop();
            }
            self.soft_tail = false;
        }
        let runs = std::mem::take(&mut self.runs);
        if runs.iter().all(|r| r.text.is_empty()) && !force {
            return;
        }
        let block = Block {
            kind: self.kind.clone(),
            align: self.align,
            children: runs.into_iter().map(Node::Text).collect(),
        };
        self.out.push(Node::Block(block));
    }

    fn flush_into(&mut self, out: &mut Vec<Node>) {
        let force = self.keep_empty && self.out.is_empty();
        self.end_line(force);
        out.append(&mut self.out);
    }
}

fn attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn style_value<'a>(attrs: &'a [(String, String)], prop: &str) -> Option<&'a str> {
    attr(attrs, "style")?
        .split(';')
        .filter_map(|decl| decl.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case(prop))
        .map(|(_, v)| v.trim())
}

fn block_align(attrs: &[(String, String)]) -> Option<TextAlign> {
    style_value(attrs, "text-align")
        .or_else(|| attr(attrs, "align"))
        .and_then(TextAlign::from_css)
        .filter(|a| *a != TextAlign::Left)
}

fn image_from(attrs: &[(String, String)]) -> Option<Block> {
    let src = attr(attrs, "src")?.trim();
    if src.is_empty() {
        return None;
    }
    let alt = attr(attrs, "alt").map(SmolStr::new);
    Some(Block::image(src, alt))
}

fn element_marks(marks: &MarkSet, name: &str, attrs: &[(String, String)]) -> MarkSet {
    let mut marks = marks.clone();
    match name {
        "strong" | "b" => {
            marks.insert(Mark::Bold);
        }
        "em" | "i" => {
            marks.insert(Mark::Italic);
        }
        "u" | "ins" => {
            marks.insert(Mark::Underline);
        }
        "s" | "strike" | "del" => {
            marks.insert(Mark::Strike);
        }
        "a" => {
            if let Some(href) = attr(attrs, "href").map(str::trim).filter(|h| !h.is_empty()) {
                marks.insert(Mark::Link {
                    href: href.into(),
                    target: attr(attrs, "target").map(SmolStr::new),
                });
            }
        }
        "mark" => {
            let color = attr(attrs, "data-color")
                .or_else(|| style_value(attrs, "background-color"))
                .and_then(|c| HexColor::parse(c).ok())
                .unwrap_or_else(HexColor::default_highlight);
            marks.insert(Mark::Highlight(color));
        }
        _ => {}
    }

    if let Some(color) = style_value(attrs, "color") {
        match HexColor::parse(color) {
            Ok(color) => {
                marks.insert(Mark::Color(color));
            }
            Err(_) => {
                tracing::trace!(target: "folio::html", %color, "ignored non-hex colour");
            }
        }
    }
    if let Some(weight) = style_value(attrs, "font-weight") {
        if weight == "bold" || weight == "bolder" || weight.parse::<u16>().is_ok_and(|w| w >= 600) {
            marks.insert(Mark::Bold);
        }
    }
    if style_value(attrs, "font-style").is_some_and(|s| s == "italic") {
        marks.insert(Mark::Italic);
    }
    if let Some(decoration) = style_value(attrs, "text-decoration") {
        if decoration.contains("underline") {
            marks.insert(Mark::Underline);
        }
        if decoration.contains("line-through") {
            marks.insert(Mark::Strike);
        }
    }
    marks
}
