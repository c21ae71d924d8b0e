//! Command engine.
//!
//! A command is a pure transition `(state, args) -> {state, ok}`. `ok = false`
//! means nothing happened: the returned state is the input state and no
//! history was recorded. `is_active` and `can_execute` are pure queries over
//! `EditorState`, which is all a toolbar ever needs to look at.

use smol_str::SmolStr;
use web_time::Instant;

use crate::document::{Block, BlockKind, Document, HeadingLevel, Node, TextRun};
use crate::marks::{HexColor, Mark, MarkSet, MarkType, TextAlign};
use crate::state::EditorState;
use crate::transform::{
    ancestor_where, apply_mark, clear_marks, delete_range, insert_node, insert_text, lift,
    link_span, remove_block, remove_mark, set_align, set_block_type, set_list_kind, split_block,
    wrap_in,
};
use crate::types::{Path, Position, Selection};
use crate::undo::{EditKind, HistoryEntry, UndoManager};

/// Every operation the editor exposes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    ToggleBold,
    ToggleItalic,
    ToggleUnderline,
    ToggleStrike,
    SetHeading(HeadingLevel),
    SetParagraph,
    ToggleBlockquote,
    ToggleCodeBlock,
    ToggleBulletList,
    ToggleOrderedList,
    SetTextAlign(TextAlign),
    /// `None` removes the link under the selection.
    SetLink(Option<SmolStr>),
    SetColor(HexColor),
    UnsetColor,
    SetHighlight(HexColor),
    UnsetHighlight,
    ClearFormatting,
    InsertImage {
        src: SmolStr,
        alt: Option<SmolStr>,
    },
    Undo,
    Redo,
    InsertText(String),
    DeleteBackward,
    DeleteForward,
    SplitBlock,
    SetSelection(Selection),
    SelectAll,
}

/// Outcome of a command.
#[derive(Clone, Debug)]
pub struct CommandResult {
    pub state: EditorState,
    pub ok: bool,
}

/// Something a toolbar control can show as pressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActiveQuery {
    Mark(MarkType),
    Paragraph,
    Heading(HeadingLevel),
    Blockquote,
    CodeBlock,
    BulletList,
    OrderedList,
    Align(TextAlign),
}

/// Run a command against a state.
pub fn execute(state: &EditorState, command: &Command, now: Instant) -> CommandResult {
    let next = match command {
        Command::Undo => undo(state, now),
        Command::Redo => redo(state, now),
        _ => apply(state, command).map(|next| commit(state, next, edit_kind(state, command), now)),
    };
    match next {
        Some(next) => {
            tracing::debug!(target: "folio::commands", ?command, "command applied");
            CommandResult {
                state: next,
                ok: true,
            }
        }
        None => {
            tracing::trace!(target: "folio::commands", ?command, "command was a no-op");
            CommandResult {
                state: state.clone(),
                ok: false,
            }
        }
    }
}

/// Whether `command` would do anything in `state`.
pub fn can_execute(state: &EditorState, command: &Command) -> bool {
    match command {
        Command::Undo => state.history.can_undo(),
        Command::Redo => state.history.can_redo(),
        _ => apply(state, command).is_some(),
    }
}

/// Whether the selection is entirely covered by `query`.
pub fn is_active(state: &EditorState, query: ActiveQuery) -> bool {
    let doc = &state.doc;
    match query {
        ActiveQuery::Mark(ty) => {
            if state.selection.is_collapsed() {
                return state.active_marks.has(ty);
            }
            let (from, to) = state.selection.range();
            let marks = marks_in_range(doc, &from, &to);
            !marks.is_empty() && marks.iter().all(|m| m.has(ty))
        }
        ActiveQuery::Paragraph => all_blocks(state, |b| b.kind == BlockKind::Paragraph),
        ActiveQuery::Heading(level) => all_blocks(state, |b| b.kind == BlockKind::Heading(level)),
        ActiveQuery::CodeBlock => all_blocks(state, |b| b.kind == BlockKind::CodeBlock),
        ActiveQuery::Blockquote => all_paths(state, |p| {
            ancestor_where(doc, p, |k| *k == BlockKind::Blockquote).is_some()
        }),
        ActiveQuery::BulletList => all_paths(state, |p| {
            nearest_list(doc, p) == Some(BlockKind::BulletList)
        }),
        ActiveQuery::OrderedList => all_paths(state, |p| {
            nearest_list(doc, p) == Some(BlockKind::OrderedList)
        }),
        ActiveQuery::Align(align) => {
            let target = align_attr(align);
            let paths = formattable_paths(state);
            !paths.is_empty()
                && paths
                    .iter()
                    .all(|p| doc.textblock(p).is_some_and(|b| b.align == target))
        }
    }
}

/// Record history for a transition. One that leaves the document alone still
/// closes any open typing group.
pub(crate) fn commit(
    before: &EditorState,
    mut next: EditorState,
    kind: EditKind,
    now: Instant,
) -> EditorState {
    if next.doc != before.doc {
        next.history
            .record(&before.doc, &before.selection, kind, now);
    } else {
        // Caret moves and stored-mark toggles end a typing burst.
        next.history.break_coalescing();
    }
    next
}

fn edit_kind(state: &EditorState, command: &Command) -> EditKind {
    match command {
        Command::InsertText(text) if state.selection.is_collapsed() && !text.contains('\n') => {
            EditKind::Typing
        }
        _ => EditKind::Other,
    }
}

fn undo(state: &EditorState, now: Instant) -> Option<EditorState> {
    let mut next = state.clone();
    let current = HistoryEntry::new(&state.doc, &state.selection, now);
    let entry = next.history.undo(current)?;
    restore(&mut next, entry);
    Some(next)
}

fn redo(state: &EditorState, now: Instant) -> Option<EditorState> {
    let mut next = state.clone();
    let current = HistoryEntry::new(&state.doc, &state.selection, now);
    let entry = next.history.redo(current)?;
    restore(&mut next, entry);
    Some(next)
}

fn restore(state: &mut EditorState, entry: HistoryEntry) {
    state.doc = std::sync::Arc::unwrap_or_clone(entry.document);
    state.set_selection(entry.selection);
}

/// The transition for every command except undo/redo, or `None` for a no-op.
fn apply(state: &EditorState, command: &Command) -> Option<EditorState> {
    let (from, to) = state.selection.range();
    let collapsed = state.selection.is_collapsed();
    let next = match command {
        Command::ToggleBold => toggle_mark(state, Mark::Bold)?,
        Command::ToggleItalic => toggle_mark(state, Mark::Italic)?,
        Command::ToggleUnderline => toggle_mark(state, Mark::Underline)?,
        Command::ToggleStrike => toggle_mark(state, Mark::Strike)?,
        Command::SetHeading(level) => {
            set_block_type(state, &from, &to, &BlockKind::Heading(*level))
        }
        Command::SetParagraph => set_block_type(state, &from, &to, &BlockKind::Paragraph),
        Command::ToggleCodeBlock => {
            let kind = if is_active(state, ActiveQuery::CodeBlock) {
                BlockKind::Paragraph
            } else {
                BlockKind::CodeBlock
            };
            set_block_type(state, &from, &to, &kind)
        }
        Command::ToggleBlockquote => {
            if is_active(state, ActiveQuery::Blockquote) {
                lift(state, &from, &to, |k| *k == BlockKind::Blockquote)
            } else {
                wrap_in(state, &from, &to, BlockKind::Blockquote)
            }
        }
        Command::ToggleBulletList => toggle_list(state, BlockKind::BulletList),
        Command::ToggleOrderedList => toggle_list(state, BlockKind::OrderedList),
        Command::SetTextAlign(align) => {
            if formattable_paths(state).is_empty() {
                return None;
            }
            set_align(state, &from, &to, align_attr(*align))
        }
        Command::SetLink(href) => set_link(state, href.as_deref())?,
        Command::SetColor(color) => set_mark(state, Mark::Color(color.clone()))?,
        Command::UnsetColor => unset_mark(state, MarkType::Color),
        Command::SetHighlight(color) => set_mark(state, Mark::Highlight(color.clone()))?,
        Command::UnsetHighlight => unset_mark(state, MarkType::Highlight),
        Command::ClearFormatting => {
            let next = clear_marks(state, &from, &to);
            let next = set_block_type(&next, &from, &to, &BlockKind::Paragraph);
            let mut next = set_align(&next, &from, &to, None);
            next.active_marks.clear();
            next
        }
        Command::InsertImage { src, alt } => {
            let src = src.trim();
            if src.is_empty() {
                return None;
            }
            let base = if collapsed {
                state.clone()
            } else {
                delete_range(state, &from, &to)
            };
            let at = base.selection.head.clone();
            insert_node(&base, &at, Node::Block(Block::image(src, alt.clone())))
        }
        Command::InsertText(text) => {
            if text.is_empty() {
                return None;
            }
            if collapsed {
                insert_text(state, &from, text)
            } else {
                let mut base = delete_range(state, &from, &to);
                base.active_marks = state.active_marks.clone();
                insert_text(&base, &from, text)
            }
        }
        Command::DeleteBackward => delete_backward(state)?,
        Command::DeleteForward => delete_forward(state)?,
        Command::SplitBlock => {
            let base = if collapsed {
                state.clone()
            } else {
                delete_range(state, &from, &to)
            };
            split_block(&base, &from)
        }
        Command::SetSelection(selection) => state.clone().with_selection(selection.clone()),
        Command::SelectAll => state
            .clone()
            .with_selection(Selection::new(state.doc.start(), state.doc.end())),
        Command::Undo | Command::Redo => return None,
    };
    let changed = next.doc != state.doc
        || next.selection != state.selection
        || next.active_marks != state.active_marks;
    changed.then_some(next)
}

fn toggle_mark(state: &EditorState, mark: Mark) -> Option<EditorState> {
    if formattable_paths(state).is_empty() {
        return None;
    }
    let ty = mark.mark_type();
    if state.selection.is_collapsed() {
        let mut next = state.clone();
        if !next.active_marks.remove(ty) {
            next.active_marks.insert(mark);
        }
        return Some(next);
    }
    let (from, to) = state.selection.range();
    if is_active(state, ActiveQuery::Mark(ty)) {
        Some(remove_mark(state, &from, &to, ty))
    } else {
        Some(apply_mark(state, &from, &to, &mark))
    }
}

fn set_mark(state: &EditorState, mark: Mark) -> Option<EditorState> {
    if formattable_paths(state).is_empty() {
        return None;
    }
    if state.selection.is_collapsed() {
        let mut next = state.clone();
        next.active_marks.insert(mark);
        return Some(next);
    }
    let (from, to) = state.selection.range();
    Some(apply_mark(state, &from, &to, &mark))
}

fn unset_mark(state: &EditorState, ty: MarkType) -> EditorState {
    if state.selection.is_collapsed() {
        let mut next = state.clone();
        next.active_marks.remove(ty);
        return next;
    }
    let (from, to) = state.selection.range();
    remove_mark(state, &from, &to, ty)
}

fn set_link(state: &EditorState, href: Option<&str>) -> Option<EditorState> {
    if formattable_paths(state).is_empty() {
        return None;
    }
    let href = href.map(str::trim).filter(|h| !h.is_empty());
    let (from, to) = state.selection.range();
    if !state.selection.is_collapsed() {
        return Some(match href {
            Some(href) => apply_mark(state, &from, &to, &Mark::link(href)),
            None => remove_mark(state, &from, &to, MarkType::Link),
        });
    }

    let head = &state.selection.head;
    let span = state
        .doc
        .textblock(&head.path)
        .and_then(|b| link_span(b, head.offset));
    match (href, span) {
        (Some(href), Some((start, end, existing))) => {
            let target = match existing {
                Mark::Link { target, .. } => target,
                _ => None,
            };
            let link = Mark::Link {
                href: href.into(),
                target,
            };
            Some(apply_mark(
                state,
                &head.with_offset(start),
                &head.with_offset(end),
                &link,
            ))
        }
        (None, Some((start, end, _))) => Some(remove_mark(
            state,
            &head.with_offset(start),
            &head.with_offset(end),
            MarkType::Link,
        )),
        (Some(href), None) => {
            let marks = state.active_marks.clone().with(Mark::link(href));
            let label: String = href
                .chars()
                .map(|c| if c.is_ascii_whitespace() { ' ' } else { c })
                .collect();
            Some(insert_node(
                state,
                head,
                Node::Text(TextRun::new(label, marks)),
            ))
        }
        (None, None) => None,
    }
}

fn toggle_list(state: &EditorState, kind: BlockKind) -> EditorState {
    let (from, to) = state.selection.range();
    let doc = &state.doc;
    if all_paths(state, |p| nearest_list(doc, p).as_ref() == Some(&kind)) {
        lift(state, &from, &to, BlockKind::is_list)
    } else if all_paths(state, |p| nearest_list(doc, p).is_some()) {
        set_list_kind(state, &from, &to, kind)
    } else {
        wrap_in(state, &from, &to, kind)
    }
}

fn delete_backward(state: &EditorState) -> Option<EditorState> {
    let (from, to) = state.selection.range();
    if !state.selection.is_collapsed() {
        return Some(delete_range(state, &from, &to));
    }
    let pos = &state.selection.head;
    if pos.offset > 0 {
        return Some(delete_range(state, &pos.with_offset(pos.offset - 1), pos));
    }

    // At the start of a textblock: leave a list item or quote first.
    if let Some((&0, parent)) = pos.path.split_last() {
        match state.doc.block_at(parent).map(|b| &b.kind) {
            Some(BlockKind::ListItem) => return Some(lift(state, pos, pos, BlockKind::is_list)),
            Some(BlockKind::Blockquote) => {
                return Some(lift(state, pos, pos, |k| *k == BlockKind::Blockquote));
            }
            _ => {}
        }
    }

    let leaves = state.doc.leaf_paths();
    let Some(prev) = leaves.iter().rev().find(|p| **p < pos.path) else {
        // Nothing before: a heading or code block reverts to a paragraph.
        return Some(set_block_type(state, pos, pos, &BlockKind::Paragraph));
    };
    match state.doc.block_at(prev) {
        Some(b) if b.kind.is_image() => Some(remove_block(state, prev)),
        Some(b) => {
            let end = Position::new(prev.clone(), b.text_len());
            Some(delete_range(state, &end, pos))
        }
        None => None,
    }
}

fn delete_forward(state: &EditorState) -> Option<EditorState> {
    let (from, to) = state.selection.range();
    if !state.selection.is_collapsed() {
        return Some(delete_range(state, &from, &to));
    }
    let pos = &state.selection.head;
    let len = state.doc.textblock(&pos.path).map(Block::text_len)?;
    if pos.offset < len {
        return Some(delete_range(state, pos, &pos.with_offset(pos.offset + 1)));
    }
    let leaves = state.doc.leaf_paths();
    let next = leaves.iter().find(|p| **p > pos.path)?;
    match state.doc.block_at(next) {
        Some(b) if b.kind.is_image() => Some(remove_block(state, next)),
        Some(_) => Some(delete_range(state, pos, &Position::new(next.clone(), 0))),
        None => None,
    }
}

fn align_attr(align: TextAlign) -> Option<TextAlign> {
    match align {
        TextAlign::Left => None,
        other => Some(other),
    }
}

fn nearest_list(doc: &Document, path: &[usize]) -> Option<BlockKind> {
    let list = ancestor_where(doc, path, BlockKind::is_list)?;
    doc.block_at(&list).map(|b| b.kind.clone())
}

fn selected_paths(state: &EditorState) -> Vec<Path> {
    let (from, to) = state.selection.range();
    state.doc.textblocks_between(&from, &to)
}

fn formattable_paths(state: &EditorState) -> Vec<Path> {
    selected_paths(state)
        .into_iter()
        .filter(|p| {
            state
                .doc
                .textblock(p)
                .is_some_and(|b| b.kind.allows_formatting())
        })
        .collect()
}

fn all_paths(state: &EditorState, pred: impl Fn(&Path) -> bool) -> bool {
    let paths = selected_paths(state);
    !paths.is_empty() && paths.iter().all(pred)
}

fn all_blocks(state: &EditorState, pred: impl Fn(&Block) -> bool) -> bool {
    all_paths(state, |p| state.doc.textblock(p).is_some_and(&pred))
}

/// Mark sets of the runs overlapping a range, in formattable blocks only.
fn marks_in_range<'a>(doc: &'a Document, from: &Position, to: &Position) -> Vec<&'a MarkSet> {
    let mut out = Vec::new();
    for path in doc.textblocks_between(from, to) {
        let Some(block) = doc.textblock(&path) else {
            continue;
        };
        if !block.kind.allows_formatting() {
            continue;
        }
        let start = if path == from.path { from.offset } else { 0 };
        let end = if path == to.path {
            to.offset
        } else {
            block.text_len()
        };
        let mut pos = 0;
        for run in block.runs() {
            let len = run.char_len();
            if pos < end && pos + len > start {
                out.push(&run.marks);
            }
            pos += len;
        }
    }
    out
}
