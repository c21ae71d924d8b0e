//! Document model: the node tree behind the editor.
//!
//! A `Document` is an ordered list of top-level block nodes. Blocks either
//! hold inline text runs (textblocks: paragraph, heading, code block), hold
//! other blocks (blockquote, lists, list items), or hold nothing (image).
//!
//! Every mutation goes through `&mut Document` accessors that drop the cached
//! text statistics, and is followed by `normalize()` which restores the tree
//! invariants:
//! - the document always contains at least one textblock (an empty paragraph
//!   at minimum);
//! - text runs are non-empty and adjacent runs never share the same mark set;
//! - images always carry a non-empty `src`;
//! - lists only contain list items, and list items are never empty.

use std::sync::OnceLock;

use smol_str::SmolStr;

use crate::error::EditorError;
use crate::marks::{MarkSet, MarkType, TextAlign};
use crate::types::{Path, Position};

/// Heading level. Only three levels are supported by the editor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HeadingLevel {
    H1,
    H2,
    H3,
}

impl HeadingLevel {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::H1 => 1,
            Self::H2 => 2,
            Self::H3 => 3,
        }
    }
}

impl TryFrom<u8> for HeadingLevel {
    type Error = EditorError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            1 => Ok(Self::H1),
            2 => Ok(Self::H2),
            3 => Ok(Self::H3),
            other => Err(EditorError::InvalidHeadingLevel(other)),
        }
    }
}

/// Block node type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Paragraph,
    Heading(HeadingLevel),
    Blockquote,
    CodeBlock,
    BulletList,
    OrderedList,
    ListItem,
    Image {
        src: SmolStr,
        alt: Option<SmolStr>,
    },
}

impl BlockKind {
    /// Blocks whose children are text runs.
    pub fn is_textblock(&self) -> bool {
        matches!(self, Self::Paragraph | Self::Heading(_) | Self::CodeBlock)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::BulletList | Self::OrderedList)
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }

    /// Whether text inside this block may carry marks and alignment.
    pub fn allows_formatting(&self) -> bool {
        matches!(self, Self::Paragraph | Self::Heading(_))
    }
}

/// A run of text sharing one mark set.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct TextRun {
    pub text: String,
    pub marks: MarkSet,
}

impl TextRun {
    pub fn new(text: impl Into<String>, marks: MarkSet) -> Self {
        Self {
            text: text.into(),
            marks,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, MarkSet::new())
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A single element of the document tree.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Node {
    Text(TextRun),
    Block(Block),
}

impl Node {
    pub fn as_block(&self) -> Option<&Block> {
        match self {
            Node::Block(b) => Some(b),
            Node::Text(_) => None,
        }
    }

    pub fn as_block_mut(&mut self) -> Option<&mut Block> {
        match self {
            Node::Block(b) => Some(b),
            Node::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextRun> {
        match self {
            Node::Text(t) => Some(t),
            Node::Block(_) => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Node::Text(_))
    }
}

impl From<Block> for Node {
    fn from(b: Block) -> Self {
        Node::Block(b)
    }
}

impl From<TextRun> for Node {
    fn from(t: TextRun) -> Self {
        Node::Text(t)
    }
}

/// A block container.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Block {
    pub kind: BlockKind,
    /// Only meaningful on paragraphs and headings.
    pub align: Option<TextAlign>,
    pub children: Vec<Node>,
}

impl Block {
    pub fn new(kind: BlockKind, children: Vec<Node>) -> Self {
        Self {
            kind,
            align: None,
            children,
        }
    }

    pub fn paragraph(runs: impl IntoIterator<Item = TextRun>) -> Self {
        Self::new(BlockKind::Paragraph, runs.into_iter().map(Node::Text).collect())
    }

    pub fn empty_paragraph() -> Self {
        Self::new(BlockKind::Paragraph, Vec::new())
    }

    pub fn heading(level: HeadingLevel, runs: impl IntoIterator<Item = TextRun>) -> Self {
        Self::new(
            BlockKind::Heading(level),
            runs.into_iter().map(Node::Text).collect(),
        )
    }

    pub fn code_block(text: impl Into<String>) -> Self {
        Self::new(BlockKind::CodeBlock, vec![Node::Text(TextRun::plain(text))])
    }

    pub fn image(src: impl Into<SmolStr>, alt: Option<SmolStr>) -> Self {
        Self::new(
            BlockKind::Image {
                src: src.into(),
                alt,
            },
            Vec::new(),
        )
    }

    pub fn container(kind: BlockKind, blocks: impl IntoIterator<Item = Block>) -> Self {
        Self::new(kind, blocks.into_iter().map(Node::Block).collect())
    }

    pub fn with_align(mut self, align: Option<TextAlign>) -> Self {
        self.align = align;
        self
    }

    pub fn is_textblock(&self) -> bool {
        self.kind.is_textblock()
    }

    /// Direct text runs of this block.
    pub fn runs(&self) -> impl Iterator<Item = &TextRun> {
        self.children.iter().filter_map(Node::as_text)
    }

    /// Length in chars of the direct inline content.
    pub fn text_len(&self) -> usize {
        self.runs().map(TextRun::char_len).sum()
    }

    /// Concatenated direct inline content.
    pub fn text(&self) -> String {
        self.runs().map(|r| r.text.as_str()).collect()
    }

    /// Marks of the char at `offset`, if any.
    pub fn marks_of_char(&self, offset: usize) -> Option<&MarkSet> {
        let mut pos = 0;
        for run in self.runs() {
            let len = run.char_len();
            if offset < pos + len {
                return Some(&run.marks);
            }
            pos += len;
        }
        None
    }

    /// Marks that text typed at `offset` inherits.
    ///
    /// Takes the marks of the char before the offset, falling back to the char
    /// after it at the start of a block. Links do not extend past their end.
    pub fn marks_at(&self, offset: usize) -> MarkSet {
        if !self.kind.allows_formatting() {
            return MarkSet::new();
        }
        if offset == 0 {
            return self
                .marks_of_char(0)
                .cloned()
                .map(|mut m| {
                    m.remove(MarkType::Link);
                    m
                })
                .unwrap_or_default();
        }
        let Some(before) = self.marks_of_char(offset - 1) else {
            return self.runs().last().map(|r| r.marks.clone()).unwrap_or_default();
        };
        let mut marks = before.clone();
        if let Some(link) = before.get(MarkType::Link) {
            let continues = self
                .marks_of_char(offset)
                .is_some_and(|after| after.contains(link));
            if !continues {
                marks.remove(MarkType::Link);
            }
        }
        marks
    }
}

/// One step of a document laid out linearly: a character, the end of a
/// textblock, or an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Step<'a> {
    Char(char),
    Break,
    Image(&'a BlockKind),
}

/// Cached derived text statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct TextStats {
    pub characters: usize,
    pub words: usize,
}

/// The editable document.
#[derive(Clone, Debug)]
pub struct Document {
    children: Vec<Node>,
    stats: OnceLock<TextStats>,
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        // Stats are a cache, not content.
        self.children == other.children
    }
}

impl Eq for Document {}

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}

impl Document {
    /// A document holding a single empty paragraph.
    pub fn empty() -> Self {
        Self {
            children: vec![Node::Block(Block::empty_paragraph())],
            stats: OnceLock::new(),
        }
    }

    /// Build a normalized document from top-level blocks.
    pub fn from_blocks(blocks: impl IntoIterator<Item = Block>) -> Self {
        Self::from_nodes(blocks.into_iter().map(Node::Block).collect())
    }

    /// Build a normalized document from arbitrary nodes.
    pub fn from_nodes(children: Vec<Node>) -> Self {
        let mut doc = Self {
            children,
            stats: OnceLock::new(),
        };
        doc.normalize();
        doc
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Mutable access to the top-level nodes. Invalidates cached stats.
    pub fn children_mut(&mut self) -> &mut Vec<Node> {
        self.stats = OnceLock::new();
        &mut self.children
    }

    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        node_at(&self.children, path)
    }

    /// Mutable node access. Invalidates cached stats.
    pub fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        self.stats = OnceLock::new();
        node_at_mut(&mut self.children, path)
    }

    pub fn block_at(&self, path: &[usize]) -> Option<&Block> {
        self.node_at(path).and_then(Node::as_block)
    }

    pub fn block_at_mut(&mut self, path: &[usize]) -> Option<&mut Block> {
        self.node_at_mut(path).and_then(Node::as_block_mut)
    }

    /// The textblock at `path`, if the path addresses one.
    pub fn textblock(&self, path: &[usize]) -> Option<&Block> {
        self.block_at(path).filter(|b| b.is_textblock())
    }

    /// The sibling list that contains the node at `path`.
    pub fn siblings_mut(&mut self, path: &[usize]) -> Option<&mut Vec<Node>> {
        let (_, parent) = path.split_last()?;
        if parent.is_empty() {
            return Some(self.children_mut());
        }
        self.block_at_mut(parent).map(|b| &mut b.children)
    }

    /// Paths of all textblocks in document order.
    pub fn textblock_paths(&self) -> Vec<Path> {
        let mut out = Vec::new();
        collect_paths(&self.children, &mut Vec::new(), &mut out, &|b: &Block| {
            b.is_textblock()
        });
        out
    }

    /// Paths of all leaf blocks (textblocks and images) in document order.
    pub fn leaf_paths(&self) -> Vec<Path> {
        let mut out = Vec::new();
        collect_paths(&self.children, &mut Vec::new(), &mut out, &|b: &Block| {
            b.is_textblock() || b.kind.is_image()
        });
        out
    }

    /// Paths of the textblocks touched by the range `from..=to`.
    pub fn textblocks_between(&self, from: &Position, to: &Position) -> Vec<Path> {
        self.textblock_paths()
            .into_iter()
            .filter(|p| *p >= from.path && *p <= to.path)
            .collect()
    }

    /// Count of top-level and nested blocks, for diagnostics and tests.
    pub fn block_count(&self) -> usize {
        fn count(nodes: &[Node]) -> usize {
            nodes
                .iter()
                .filter_map(Node::as_block)
                .map(|b| 1 + count(&b.children))
                .sum()
        }
        count(&self.children)
    }

    /// Number of image blocks anywhere in the tree.
    pub fn image_count(&self) -> usize {
        self.leaf_paths()
            .iter()
            .filter(|p| self.block_at(p).is_some_and(|b| b.kind.is_image()))
            .count()
    }

    /// Position at the very start of the document.
    pub fn start(&self) -> Position {
        self.textblock_paths()
            .into_iter()
            .next()
            .map(|p| Position::new(p, 0))
            .unwrap_or_else(|| Position::top(0, 0))
    }

    /// Position at the very end of the document.
    pub fn end(&self) -> Position {
        self.textblock_paths()
            .into_iter()
            .last()
            .map(|p| {
                let len = self.textblock(&p).map(Block::text_len).unwrap_or(0);
                Position::new(p, len)
            })
            .unwrap_or_else(|| Position::top(0, 0))
    }

    /// Re-clamp a position so it is valid against this document.
    ///
    /// Offsets past the end of a block snap to its end. Paths that no longer
    /// address a textblock snap to the end of the nearest preceding textblock,
    /// or the document start if there is none.
    pub fn clamp(&self, pos: &Position) -> Position {
        if let Some(block) = self.textblock(&pos.path) {
            return pos.with_offset(pos.offset.min(block.text_len()));
        }
        let paths = self.textblock_paths();
        match paths.iter().rev().find(|p| **p <= pos.path) {
            Some(p) => {
                let len = self.textblock(p).map(Block::text_len).unwrap_or(0);
                Position::new(p.clone(), len)
            }
            None => self.start(),
        }
    }

    /// The document as a flat sequence of steps, in reading order.
    pub(crate) fn steps(&self) -> Vec<Step<'_>> {
        let mut out = Vec::new();
        for path in self.leaf_paths() {
            let Some(block) = self.block_at(&path) else {
                continue;
            };
            if block.kind.is_image() {
                out.push(Step::Image(&block.kind));
            } else {
                out.extend(block.text().chars().map(Step::Char));
                out.push(Step::Break);
            }
        }
        out
    }

    /// Offset of `pos` when every character, textblock end and image counts
    /// as one step.
    pub fn linear_offset(&self, pos: &Position) -> usize {
        let pos = self.clamp(pos);
        let mut offset = 0;
        for path in self.leaf_paths() {
            if path == pos.path {
                return offset + pos.offset;
            }
            offset += match self.block_at(&path) {
                Some(block) if block.is_textblock() => block.text_len() + 1,
                _ => 1,
            };
        }
        offset
    }

    /// The textblock position at a linear offset. Offsets that fall on an
    /// image resolve to the start of the next textblock.
    pub fn position_at(&self, offset: usize) -> Position {
        let mut rest = offset;
        for path in self.leaf_paths() {
            let Some(block) = self.block_at(&path) else {
                continue;
            };
            if !block.is_textblock() {
                rest = rest.saturating_sub(1);
                continue;
            }
            let len = block.text_len();
            if rest <= len {
                return Position::new(path, rest);
            }
            rest -= len + 1;
        }
        self.end()
    }

    /// Plain-text projection: textblocks joined by newlines.
    pub fn plain_text(&self) -> String {
        self.textblock_paths()
            .iter()
            .filter_map(|p| self.textblock(p))
            .map(Block::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Character and word counts, cached until the next mutation.
    pub fn stats(&self) -> TextStats {
        *self.stats.get_or_init(|| {
            let mut stats = TextStats::default();
            for path in self.textblock_paths() {
                if let Some(block) = self.textblock(&path) {
                    let text = block.text();
                    stats.characters += text.chars().count();
                    stats.words += text.split_whitespace().count();
                }
            }
            stats
        })
    }

    /// Whether the document is the single empty paragraph.
    pub fn is_blank(&self) -> bool {
        match self.children.as_slice() {
            [Node::Block(b)] => b.kind == BlockKind::Paragraph && b.children.is_empty(),
            _ => false,
        }
    }

    /// Restore tree invariants after a mutation.
    pub fn normalize(&mut self) {
        self.stats = OnceLock::new();
        normalize_blocks(&mut self.children);
        if !contains_textblock(&self.children) {
            self.children.push(Node::Block(Block::empty_paragraph()));
        }
    }
}

fn node_at<'a>(nodes: &'a [Node], path: &[usize]) -> Option<&'a Node> {
    let (first, rest) = path.split_first()?;
    let node = nodes.get(*first)?;
    if rest.is_empty() {
        Some(node)
    } else {
        node_at(&node.as_block()?.children, rest)
    }
}

fn node_at_mut<'a>(nodes: &'a mut [Node], path: &[usize]) -> Option<&'a mut Node> {
    let (first, rest) = path.split_first()?;
    let node = nodes.get_mut(*first)?;
    if rest.is_empty() {
        Some(node)
    } else {
        node_at_mut(&mut node.as_block_mut()?.children, rest)
    }
}

fn collect_paths(
    nodes: &[Node],
    prefix: &mut Vec<usize>,
    out: &mut Vec<Path>,
    pred: &dyn Fn(&Block) -> bool,
) {
    for (i, node) in nodes.iter().enumerate() {
        let Node::Block(block) = node else { continue };
        prefix.push(i);
        if pred(block) {
            out.push(prefix.clone());
        } else {
            collect_paths(&block.children, prefix, out, pred);
        }
        prefix.pop();
    }
}

fn contains_textblock(nodes: &[Node]) -> bool {
    nodes.iter().filter_map(Node::as_block).any(|b| {
        b.is_textblock() || contains_textblock(&b.children)
    })
}

/// Normalize a list of block-level nodes in place.
pub(crate) fn normalize_blocks(nodes: &mut Vec<Node>) {
    let mut out = Vec::with_capacity(nodes.len());
    let mut stray = Vec::new();
    for node in nodes.drain(..) {
        match node {
            Node::Text(run) => stray.push(Node::Text(run)),
            Node::Block(mut block) => {
                flush_stray(&mut stray, &mut out);
                if block.kind == BlockKind::ListItem {
                    // A list item outside a list gives up its content.
                    normalize_blocks(&mut block.children);
                    out.extend(block.children);
                } else if normalize_block(&mut block) {
                    out.push(Node::Block(block));
                }
            }
        }
    }
    flush_stray(&mut stray, &mut out);
    *nodes = out;
}

fn flush_stray(stray: &mut Vec<Node>, out: &mut Vec<Node>) {
    if stray.is_empty() {
        return;
    }
    let mut para = Block::new(BlockKind::Paragraph, std::mem::take(stray));
    normalize_inline(&mut para.children);
    if !para.children.is_empty() {
        out.push(Node::Block(para));
    }
}

/// Normalize a single block. Returns false if the block should be removed.
fn normalize_block(block: &mut Block) -> bool {
    match block.kind.clone() {
        BlockKind::Image { src, .. } => {
            block.children.clear();
            block.align = None;
            !src.trim().is_empty()
        }
        BlockKind::Paragraph | BlockKind::Heading(_) => {
            block.children.retain(Node::is_text);
            normalize_inline(&mut block.children);
            true
        }
        BlockKind::CodeBlock => {
            block.align = None;
            block.children.retain(Node::is_text);
            for child in &mut block.children {
                if let Node::Text(run) = child {
                    run.marks.clear();
                }
            }
            normalize_inline(&mut block.children);
            true
        }
        BlockKind::BulletList | BlockKind::OrderedList => {
            block.align = None;
            let mut items = Vec::with_capacity(block.children.len());
            for child in block.children.drain(..) {
                let mut item = match child {
                    Node::Block(b) if b.kind == BlockKind::ListItem => b,
                    Node::Block(b) => Block::container(BlockKind::ListItem, [b]),
                    Node::Text(run) => {
                        Block::container(BlockKind::ListItem, [Block::paragraph([run])])
                    }
                };
                normalize_list_item(&mut item);
                items.push(Node::Block(item));
            }
            block.children = items;
            !block.children.is_empty()
        }
        BlockKind::ListItem => {
            normalize_list_item(block);
            true
        }
        BlockKind::Blockquote => {
            block.align = None;
            normalize_blocks(&mut block.children);
            !block.children.is_empty()
        }
    }
}

fn normalize_list_item(item: &mut Block) {
    item.align = None;
    normalize_blocks(&mut item.children);
    if !contains_textblock(&item.children) {
        item.children.insert(0, Node::Block(Block::empty_paragraph()));
    }
}

/// Drop empty runs and merge neighbours that share a mark set.
pub(crate) fn normalize_inline(children: &mut Vec<Node>) {
    let mut out: Vec<Node> = Vec::with_capacity(children.len());
    for node in children.drain(..) {
        let Node::Text(run) = node else { continue };
        if run.text.is_empty() {
            continue;
        }
        if let Some(Node::Text(prev)) = out.last_mut() {
            if prev.marks == run.marks {
                prev.text.push_str(&run.text);
                continue;
            }
        }
        out.push(Node::Text(run));
    }
    *children = out;
}

/// Split inline content at a char offset.
pub(crate) fn split_inline(children: Vec<Node>, offset: usize) -> (Vec<Node>, Vec<Node>) {
    let mut before = Vec::new();
    let mut after = Vec::new();
    let mut pos = 0;
    for node in children {
        let Node::Text(run) = node else { continue };
        let len = run.char_len();
        if pos + len <= offset {
            before.push(Node::Text(run));
        } else if pos >= offset {
            after.push(Node::Text(run));
        } else {
            let split = char_to_byte(&run.text, offset - pos);
            let (head, tail) = run.text.split_at(split);
            before.push(Node::Text(TextRun::new(head, run.marks.clone())));
            after.push(Node::Text(TextRun::new(tail, run.marks)));
        }
        pos += len;
    }
    (before, after)
}

/// Apply `f` to the marks of every run inside `from..to` of a textblock.
/// Returns true if any mark set changed.
pub(crate) fn map_marks_in(
    block: &mut Block,
    from: usize,
    to: usize,
    mut f: impl FnMut(&mut MarkSet) -> bool,
) -> bool {
    if from >= to {
        return false;
    }
    let children = std::mem::take(&mut block.children);
    let (before, rest) = split_inline(children, from);
    let (mut middle, after) = split_inline(rest, to - from);
    let mut changed = false;
    for node in &mut middle {
        if let Node::Text(run) = node {
            changed |= f(&mut run.marks);
        }
    }
    block.children = before;
    block.children.extend(middle);
    block.children.extend(after);
    normalize_inline(&mut block.children);
    changed
}

pub(crate) fn char_to_byte(s: &str, char_offset: usize) -> usize {
    s.char_indices()
        .nth(char_offset)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}
