//! HTML serializer.
//!
//! Output is the canonical markup for a document: one element per block, and
//! inline marks nested in `MarkType` order (links outermost) so that equal
//! documents always serialize to byte-identical HTML.
//!
//! `href` and `src` are entity-escaped but never percent-encoded, so a URL
//! reads back exactly as it was stored.

use std::convert::Infallible;
use std::fmt;

use markdown_weaver_escape::{StrWrite, escape_html};

use crate::document::{Block, BlockKind, HeadingLevel, Node};
use crate::marks::{Mark, TextAlign};

/// String-backed output for the serializer.
#[derive(Debug, Clone, Default)]
pub struct HtmlWriter {
    out: String,
}

impl HtmlWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_string(self) -> String {
        self.out
    }
}

impl StrWrite for HtmlWriter {
    type Error = Infallible;

    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        self.out.push_str(s);
        Ok(())
    }

    fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<(), Self::Error> {
        // Formatting into a String never fails.
        let _ = fmt::Write::write_fmt(&mut self.out, args);
        Ok(())
    }
}

pub(crate) fn write_nodes<W: StrWrite>(w: &mut W, nodes: &[Node]) -> Result<(), W::Error> {
    for node in nodes {
        if let Node::Block(block) = node {
            write_block(w, block)?;
        }
    }
    Ok(())
}

fn write_block<W: StrWrite>(w: &mut W, block: &Block) -> Result<(), W::Error> {
    match &block.kind {
        BlockKind::Paragraph => {
            open_textblock(w, "p", block.align)?;
            write_inline(w, &block.children)?;
            w.write_str("</p>")
        }
        BlockKind::Heading(level) => {
            let tag = heading_tag(*level);
            open_textblock(w, tag, block.align)?;
            write_inline(w, &block.children)?;
            w.write_str("</")?;
            w.write_str(tag)?;
            w.write_str(">")
        }
        BlockKind::CodeBlock => {
            w.write_str("<pre><code>")?;
            escape_html(&mut *w, &block.text())?;
            w.write_str("</code></pre>")
        }
        BlockKind::Blockquote => wrap(w, "blockquote", &block.children),
        BlockKind::BulletList => wrap(w, "ul", &block.children),
        BlockKind::OrderedList => wrap(w, "ol", &block.children),
        BlockKind::ListItem => wrap(w, "li", &block.children),
        BlockKind::Image { src, alt } => {
            w.write_str("<img src=\"")?;
            escape_html(&mut *w, src)?;
            w.write_str("\"")?;
            if let Some(alt) = alt {
                w.write_str(" alt=\"")?;
                escape_html(&mut *w, alt)?;
                w.write_str("\"")?;
            }
            w.write_str(">")
        }
    }
}

fn wrap<W: StrWrite>(w: &mut W, tag: &str, children: &[Node]) -> Result<(), W::Error> {
    write!(w, "<{tag}>")?;
    write_nodes(w, children)?;
    write!(w, "</{tag}>")
}

fn heading_tag(level: HeadingLevel) -> &'static str {
    match level {
        HeadingLevel::H1 => "h1",
        HeadingLevel::H2 => "h2",
        HeadingLevel::H3 => "h3",
    }
}

fn open_textblock<W: StrWrite>(
    w: &mut W,
    tag: &str,
    align: Option<TextAlign>,
) -> Result<(), W::Error> {
    match align {
        Some(align) => write!(w, "<{tag} style=\"text-align: {}\">", align.as_str()),
        None => write!(w, "<{tag}>"),
    }
}

/// Write runs, keeping shared outer marks open across neighbouring runs.
fn write_inline<W: StrWrite>(w: &mut W, children: &[Node]) -> Result<(), W::Error> {
    let mut open: Vec<&Mark> = Vec::new();
    for run in children.iter().filter_map(Node::as_text) {
        let wanted: Vec<&Mark> = run.marks.iter().collect();
        let keep = open
            .iter()
            .zip(&wanted)
            .take_while(|(a, b)| a == b)
            .count();
        while open.len() > keep {
            if let Some(mark) = open.pop() {
                close_mark(w, mark)?;
            }
        }
        for &mark in &wanted[keep..] {
            open_mark(w, mark)?;
            open.push(mark);
        }
        escape_html(&mut *w, &run.text)?;
    }
    while let Some(mark) = open.pop() {
        close_mark(w, mark)?;
    }
    Ok(())
}

fn open_mark<W: StrWrite>(w: &mut W, mark: &Mark) -> Result<(), W::Error> {
    match mark {
        Mark::Bold => w.write_str("<strong>"),
        Mark::Italic => w.write_str("<em>"),
        Mark::Underline => w.write_str("<u>"),
        Mark::Strike => w.write_str("<s>"),
        Mark::Link { href, target } => {
            w.write_str("<a href=\"")?;
            escape_html(&mut *w, href)?;
            w.write_str("\"")?;
            if let Some(target) = target {
                w.write_str(" target=\"")?;
                escape_html(&mut *w, target)?;
                w.write_str("\"")?;
            }
            w.write_str(">")
        }
        Mark::Color(color) => write!(w, "<span style=\"color: {color}\">"),
        Mark::Highlight(color) => write!(
            w,
            "<mark data-color=\"{color}\" style=\"background-color: {color}\">"
        ),
    }
}

fn close_mark<W: StrWrite>(w: &mut W, mark: &Mark) -> Result<(), W::Error> {
    w.write_str(match mark {
        Mark::Bold => "</strong>",
        Mark::Italic => "</em>",
        Mark::Underline => "</u>",
        Mark::Strike => "</s>",
        Mark::Link { .. } => "</a>",
        Mark::Color(_) => "</span>",
        Mark::Highlight(_) => "</mark>",
    })
}
