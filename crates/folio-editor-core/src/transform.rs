//! Document Model operations.
//!
//! Every function here is pure: it takes an `EditorState` by reference and
//! returns a new one with a normalized document and a selection that is valid
//! against it. None of them touch history; recording is the command engine's
//! job.
//!
//! Structural edits (wrapping, lifting) never reorder textblocks, so the
//! selection is carried across them by textblock index and offset.

use crate::document::{
    Block, BlockKind, Document, Node, TextRun, map_marks_in, normalize_inline, split_inline,
};
use crate::marks::{Mark, MarkSet, MarkType, TextAlign};
use crate::state::EditorState;
use crate::types::{Path, Position, Selection};

/// Insert text at `pos`, using the state's stored marks.
///
/// Newlines split the block, except inside code blocks where they are kept
/// literally. Outside code blocks a lone `\r` is a newline and tabs and form
/// feeds become spaces.
pub fn insert_text(state: &EditorState, pos: &Position, text: &str) -> EditorState {
    let mut next = state.clone();
    let text = text.replace("\r\n", "\n");
    if text.is_empty() {
        return next;
    }
    let pos = next.doc.clamp(pos);
    let marks = state.active_marks.clone();

    let literal = next
        .doc
        .textblock(&pos.path)
        .is_some_and(|b| b.kind == BlockKind::CodeBlock);
    if literal {
        insert_inline(&mut next, &pos, &text, &marks);
        return next;
    }

    let text = flow_text(&text);
    let mut cursor = pos;
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            next = split_block(&next, &cursor);
            cursor = next.selection.head.clone();
        }
        insert_inline(&mut next, &cursor, line, &marks);
        cursor = next.selection.head.clone();
    }
    next
}

/// Map whitespace that HTML collapses onto what survives it: `\r` to a
/// newline, tabs and form feeds to a space.
fn flow_text(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\r' => '\n',
            '\t' | '\x0C' => ' ',
            c => c,
        })
        .collect()
}

fn insert_inline(state: &mut EditorState, pos: &Position, text: &str, marks: &MarkSet) {
    if text.is_empty() {
        state.set_cursor(pos.clone());
        return;
    }
    let Some(block) = state.doc.block_at_mut(&pos.path) else {
        return;
    };
    let marks = if block.kind.allows_formatting() {
        marks.clone()
    } else {
        MarkSet::new()
    };
    let (mut content, after) = split_inline(std::mem::take(&mut block.children), pos.offset);
    content.push(Node::Text(TextRun::new(text, marks)));
    content.extend(after);
    normalize_inline(&mut content);
    block.children = content;

    state.set_cursor(pos.with_offset(pos.offset + text.chars().count()));
}

/// Split the textblock at `pos` in two (Enter).
///
/// Inside a list item the item is split; an empty item is lifted out of its
/// list instead. Code blocks get a literal newline.
pub fn split_block(state: &EditorState, pos: &Position) -> EditorState {
    let mut next = state.clone();
    let pos = next.doc.clamp(pos);
    let Some(block) = next.doc.textblock(&pos.path).cloned() else {
        return next;
    };
    if block.kind == BlockKind::CodeBlock {
        insert_inline(&mut next, &pos, "\n", &MarkSet::new());
        return next;
    }
    let Some((&idx, parent)) = pos.path.split_last() else {
        return next;
    };
    let parent = parent.to_vec();
    let in_item = next
        .doc
        .block_at(&parent)
        .is_some_and(|b| b.kind == BlockKind::ListItem);

    if in_item && block.text_len() == 0 {
        return lift(&next, &pos, &pos, BlockKind::is_list);
    }

    let (head, tail) = split_inline(block.children, pos.offset);
    let tail_kind = match block.kind {
        BlockKind::Heading(_) if tail.is_empty() => BlockKind::Paragraph,
        ref kind => kind.clone(),
    };
    let head = Block {
        kind: block.kind.clone(),
        align: block.align,
        children: head,
    };
    let tail = Block {
        kind: tail_kind,
        align: block.align,
        children: tail,
    };

    let cursor_path = if in_item {
        let Some((&item_idx, list_path)) = parent.split_last() else {
            return next;
        };
        let list_path = list_path.to_vec();
        let Some(list) = children_at_mut(&mut next.doc, &list_path) else {
            return next;
        };
        let mut rest = match list.get_mut(item_idx) {
            Some(Node::Block(item)) if idx < item.children.len() => {
                let rest = item.children.split_off(idx);
                item.children.push(Node::Block(head));
                rest
            }
            _ => return next,
        };
        if let Some(first) = rest.first_mut() {
            *first = Node::Block(tail);
        }
        list.insert(item_idx + 1, Node::Block(Block::new(BlockKind::ListItem, rest)));
        let mut path = list_path;
        path.extend([item_idx + 1, 0]);
        path
    } else {
        let Some(siblings) = children_at_mut(&mut next.doc, &parent) else {
            return next;
        };
        let Some(slot) = siblings.get_mut(idx) else {
            return next;
        };
        *slot = Node::Block(head);
        siblings.insert(idx + 1, Node::Block(tail));
        let mut path = parent;
        path.push(idx + 1);
        path
    };

    next.doc.normalize();
    next.set_cursor(Position::new(cursor_path, 0));
    next
}

/// Remove everything between two positions.
///
/// When the range crosses blocks, the first block absorbs what remains of
/// the last one, and same-kind lists or quotes left touching are joined.
pub fn delete_range(state: &EditorState, from: &Position, to: &Position) -> EditorState {
    let mut next = state.clone();
    let (from, to) = ordered(next.doc.clamp(from), next.doc.clamp(to));
    if from == to {
        next.set_cursor(from);
        return next;
    }

    if from.same_block(&to) {
        if let Some(block) = next.doc.block_at_mut(&from.path) {
            let (mut head, rest) = split_inline(std::mem::take(&mut block.children), from.offset);
            let (_, tail) = split_inline(rest, to.offset - from.offset);
            head.extend(tail);
            normalize_inline(&mut head);
            block.children = head;
        }
    } else {
        let tail = next
            .doc
            .textblock(&to.path)
            .map(|b| split_inline(b.children.clone(), to.offset).1)
            .unwrap_or_default();
        if let Some(block) = next.doc.block_at_mut(&from.path) {
            let (mut head, _) = split_inline(std::mem::take(&mut block.children), from.offset);
            head.extend(tail);
            normalize_inline(&mut head);
            block.children = head;
        }

        let doomed: Vec<Path> = next
            .doc
            .leaf_paths()
            .into_iter()
            .filter(|p| *p > from.path && *p <= to.path)
            .collect();
        // Reverse document order keeps the remaining paths valid.
        for path in doomed.iter().rev() {
            remove_node(&mut next.doc, path);
        }
        prune_empty(next.doc.children_mut());
        join_adjacent(&mut next.doc, &from.path);
    }

    next.doc.normalize();
    next.set_cursor(from);
    next
}

/// Add `mark` to all text in the range. Applying it twice is a no-op.
pub fn apply_mark(state: &EditorState, from: &Position, to: &Position, mark: &Mark) -> EditorState {
    map_marks(state, from, to, |marks| marks.insert(mark.clone()))
}

/// Remove marks of type `ty` from all text in the range.
pub fn remove_mark(
    state: &EditorState,
    from: &Position,
    to: &Position,
    ty: MarkType,
) -> EditorState {
    map_marks(state, from, to, |marks| marks.remove(ty))
}

/// Remove every mark from all text in the range.
pub fn clear_marks(state: &EditorState, from: &Position, to: &Position) -> EditorState {
    map_marks(state, from, to, |marks| {
        let changed = !marks.is_empty();
        marks.clear();
        changed
    })
}

fn map_marks(
    state: &EditorState,
    from: &Position,
    to: &Position,
    mut f: impl FnMut(&mut MarkSet) -> bool,
) -> EditorState {
    let mut next = state.clone();
    let (from, to) = ordered(next.doc.clamp(from), next.doc.clamp(to));
    for path in next.doc.textblocks_between(&from, &to) {
        let Some(block) = next.doc.block_at_mut(&path) else {
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
        map_marks_in(block, start, end, &mut f);
    }
    next.clamp_selection();
    next
}

/// Retype every textblock touched by the range, keeping inline content.
pub fn set_block_type(
    state: &EditorState,
    from: &Position,
    to: &Position,
    kind: &BlockKind,
) -> EditorState {
    let mut next = state.clone();
    if !kind.is_textblock() {
        return next;
    }
    let (from, to) = ordered(next.doc.clamp(from), next.doc.clamp(to));
    for path in next.doc.textblocks_between(&from, &to) {
        if let Some(block) = next.doc.block_at_mut(&path) {
            block.kind = kind.clone();
            if !kind.allows_formatting() {
                block.align = None;
            }
        }
    }
    next.doc.normalize();
    next.clamp_selection();
    next
}

/// Set (or with `None`, reset) alignment on every formattable textblock in
/// the range.
pub fn set_align(
    state: &EditorState,
    from: &Position,
    to: &Position,
    align: Option<TextAlign>,
) -> EditorState {
    let mut next = state.clone();
    let (from, to) = ordered(next.doc.clamp(from), next.doc.clamp(to));
    for path in next.doc.textblocks_between(&from, &to) {
        if let Some(block) = next.doc.block_at_mut(&path) {
            if block.kind.allows_formatting() {
                block.align = align;
            }
        }
    }
    next.clamp_selection();
    next
}

/// Insert a node at `pos`.
///
/// Text nodes are inserted inline with their own marks. Block nodes split the
/// containing textblock; empty halves are dropped, so inserting into an empty
/// paragraph replaces it. After an image the caret moves to the next
/// textblock, which is created if the image ended up last.
pub fn insert_node(state: &EditorState, pos: &Position, node: Node) -> EditorState {
    let mut next = state.clone();
    let pos = next.doc.clamp(pos);
    let block = match node {
        Node::Text(run) => {
            insert_inline(&mut next, &pos, &run.text, &run.marks);
            return next;
        }
        Node::Block(block) => block,
    };
    let Some(target) = next.doc.textblock(&pos.path).cloned() else {
        return next;
    };
    let Some((&idx, parent)) = pos.path.split_last() else {
        return next;
    };
    let parent = parent.to_vec();
    let is_image = block.kind.is_image();

    let (head, tail) = split_inline(target.children, pos.offset);
    let mut replacement = Vec::with_capacity(4);
    let mut inserted_at = idx;
    if !head.is_empty() {
        replacement.push(Node::Block(Block {
            kind: target.kind.clone(),
            align: target.align,
            children: head,
        }));
        inserted_at += 1;
    }
    replacement.push(Node::Block(block));
    let tail_empty = tail.is_empty();
    if !tail_empty {
        replacement.push(Node::Block(Block {
            kind: target.kind,
            align: target.align,
            children: tail,
        }));
    }

    let Some(siblings) = children_at_mut(&mut next.doc, &parent) else {
        return next;
    };
    if idx >= siblings.len() {
        return next;
    }
    if is_image && tail_empty && idx + 1 == siblings.len() {
        replacement.push(Node::Block(Block::empty_paragraph()));
    }
    siblings.splice(idx..=idx, replacement);
    next.doc.normalize();

    let mut node_path = parent;
    node_path.push(inserted_at);
    let paths = next.doc.textblock_paths();
    let caret = if is_image {
        paths
            .into_iter()
            .find(|p| *p > node_path)
            .map(|p| Position::new(p, 0))
    } else {
        paths
            .into_iter()
            .filter(|p| p.starts_with(&node_path))
            .last()
            .map(|p| {
                let len = next.doc.textblock(&p).map(Block::text_len).unwrap_or(0);
                Position::new(p, len)
            })
    };
    match caret {
        Some(caret) => next.set_cursor(caret),
        None => next.clamp_selection(),
    }
    next
}

/// Remove a whole block (used for images adjacent to the caret).
pub fn remove_block(state: &EditorState, path: &[usize]) -> EditorState {
    let mut next = state.clone();
    remove_node(&mut next.doc, path);
    prune_empty(next.doc.children_mut());
    next.doc.normalize();
    remap_selection(&state.doc, &state.selection, &mut next);
    next
}

/// Wrap the blocks covering the range in a blockquote or list.
pub fn wrap_in(state: &EditorState, from: &Position, to: &Position, kind: BlockKind) -> EditorState {
    let mut next = state.clone();
    let (from, to) = ordered(next.doc.clamp(from), next.doc.clamp(to));
    let Some((mut parent, mut start, mut end)) = sibling_range(&from, &to) else {
        return next;
    };
    // Wrap a whole list rather than individual items.
    if next.doc.block_at(&parent).is_some_and(|b| b.kind.is_list()) {
        if let Some((&idx, up)) = parent.clone().split_last() {
            start = idx;
            end = idx;
            parent = up.to_vec();
        }
    }

    let Some(siblings) = children_at_mut(&mut next.doc, &parent) else {
        return next;
    };
    if end >= siblings.len() || start > end {
        return next;
    }
    let nodes: Vec<Node> = siblings.drain(start..=end).collect();
    let wrapper = if kind.is_list() {
        let mut items = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node {
                Node::Block(list) if list.kind.is_list() => items.extend(list.children),
                other => items.push(Node::Block(Block::new(BlockKind::ListItem, vec![other]))),
            }
        }
        Block::new(kind, items)
    } else {
        Block::new(kind, nodes)
    };
    siblings.insert(start, Node::Block(wrapper));

    next.doc.normalize();
    remap_selection(&state.doc, &state.selection, &mut next);
    next
}

/// Move the selected children of the nearest ancestor matching `target` out
/// of it. Lifted list items give up their content.
pub fn lift(
    state: &EditorState,
    from: &Position,
    to: &Position,
    target: impl Fn(&BlockKind) -> bool,
) -> EditorState {
    let mut next = state.clone();
    let (from, to) = ordered(next.doc.clamp(from), next.doc.clamp(to));
    let Some(anchor) = ancestor_where(&next.doc, &from.path, &target) else {
        return next;
    };
    let depth = anchor.len();
    let Some(&start) = from.path.get(depth) else {
        return next;
    };
    let end = if to.path.starts_with(&anchor) {
        to.path.get(depth).copied().unwrap_or(start)
    } else {
        next.doc
            .block_at(&anchor)
            .map(|b| b.children.len().saturating_sub(1))
            .unwrap_or(start)
    };
    let Some((&idx, parent)) = anchor.split_last() else {
        return next;
    };

    let Some(siblings) = children_at_mut(&mut next.doc, parent) else {
        return next;
    };
    let container = match siblings.get(idx) {
        Some(Node::Block(b)) if end < b.children.len() && start <= end => b.clone(),
        _ => return next,
    };
    let mut before = container.children;
    let after = before.split_off(end + 1);
    let selected = before.split_off(start);
    let lifted: Vec<Node> = if container.kind.is_list() {
        selected
            .into_iter()
            .flat_map(|node| match node {
                Node::Block(item) if item.kind == BlockKind::ListItem => item.children,
                other => vec![other],
            })
            .collect()
    } else {
        selected
    };

    let mut replacement = Vec::with_capacity(lifted.len() + 2);
    if !before.is_empty() {
        replacement.push(Node::Block(Block::new(container.kind.clone(), before)));
    }
    replacement.extend(lifted);
    if !after.is_empty() {
        replacement.push(Node::Block(Block::new(container.kind, after)));
    }
    siblings.splice(idx..=idx, replacement);

    next.doc.normalize();
    remap_selection(&state.doc, &state.selection, &mut next);
    next
}

/// Change the kind of every list holding a textblock in the range.
pub fn set_list_kind(
    state: &EditorState,
    from: &Position,
    to: &Position,
    kind: BlockKind,
) -> EditorState {
    let mut next = state.clone();
    if !kind.is_list() {
        return next;
    }
    let (from, to) = ordered(next.doc.clamp(from), next.doc.clamp(to));
    let mut lists: Vec<Path> = next
        .doc
        .textblocks_between(&from, &to)
        .iter()
        .filter_map(|p| ancestor_where(&next.doc, p, BlockKind::is_list))
        .collect();
    lists.dedup();
    for path in lists {
        if let Some(list) = next.doc.block_at_mut(&path) {
            list.kind = kind.clone();
        }
    }
    next.clamp_selection();
    next
}

/// Carry a position in `before` across an edit that produced `after`.
///
/// `edit_start` is the linear offset (see [`Document::linear_offset`]) where
/// the edit began; repeated content around it counts as coming before the
/// edit. Pass `usize::MAX` when it is unknown. Content ahead of the edit keeps
/// its place and content behind it shifts by the change in length. A position
/// inside replaced content lands at the end of the replacement.
pub fn map_position(
    before: &Document,
    after: &Document,
    edit_start: usize,
    pos: &Position,
) -> Position {
    let old = before.steps();
    let new = after.steps();
    let prefix = old
        .iter()
        .zip(&new)
        .take_while(|(a, b)| a == b)
        .count()
        .min(edit_start);
    let room = old.len().min(new.len()) - prefix;
    let suffix = old
        .iter()
        .rev()
        .zip(new.iter().rev())
        .take_while(|(a, b)| a == b)
        .count()
        .min(room);

    let offset = before.linear_offset(pos);
    let mapped = if offset <= prefix {
        offset
    } else if offset >= old.len() - suffix {
        offset + new.len() - old.len()
    } else {
        new.len() - suffix
    };
    after.position_at(mapped)
}

/// Char range and mark of the link touching `offset`, if any.
pub fn link_span(block: &Block, offset: usize) -> Option<(usize, usize, Mark)> {
    let probe = [Some(offset), offset.checked_sub(1)]
        .into_iter()
        .flatten()
        .find(|&o| block.marks_of_char(o).is_some_and(|m| m.has(MarkType::Link)))?;
    let link = block.marks_of_char(probe)?.get(MarkType::Link)?.clone();

    let mut pos = 0;
    let runs: Vec<(usize, usize, bool)> = block
        .runs()
        .map(|run| {
            let start = pos;
            pos += run.char_len();
            (start, pos, run.marks.contains(&link))
        })
        .collect();
    let idx = runs.iter().position(|(s, e, _)| probe >= *s && probe < *e)?;
    let mut first = idx;
    while first > 0 && runs[first - 1].2 {
        first -= 1;
    }
    let mut last = idx;
    while last + 1 < runs.len() && runs[last + 1].2 {
        last += 1;
    }
    Some((runs[first].0, runs[last].1, link))
}

/// Path of the nearest proper ancestor of `path` whose kind matches.
pub(crate) fn ancestor_where(
    doc: &Document,
    path: &[usize],
    pred: impl Fn(&BlockKind) -> bool,
) -> Option<Path> {
    (1..path.len())
        .rev()
        .map(|len| &path[..len])
        .find(|p| doc.block_at(p).is_some_and(|b| pred(&b.kind)))
        .map(<[usize]>::to_vec)
}

fn ordered(a: Position, b: Position) -> (Position, Position) {
    if a <= b { (a, b) } else { (b, a) }
}

fn children_at_mut<'a>(doc: &'a mut Document, parent: &[usize]) -> Option<&'a mut Vec<Node>> {
    if parent.is_empty() {
        Some(doc.children_mut())
    } else {
        doc.block_at_mut(parent).map(|b| &mut b.children)
    }
}

fn remove_node(doc: &mut Document, path: &[usize]) {
    let Some((&idx, parent)) = path.split_last() else {
        return;
    };
    if let Some(siblings) = children_at_mut(doc, parent) {
        if idx < siblings.len() {
            siblings.remove(idx);
        }
    }
}

/// Drop containers left without children.
fn prune_empty(nodes: &mut Vec<Node>) {
    nodes.retain_mut(|node| match node {
        Node::Block(b) if !b.is_textblock() && !b.kind.is_image() => {
            prune_empty(&mut b.children);
            !b.children.is_empty()
        }
        _ => true,
    });
}

/// Join same-kind lists or quotes that ended up adjacent along `path`.
fn join_adjacent(doc: &mut Document, path: &[usize]) {
    for depth in 0..path.len() {
        let idx = path[depth];
        let Some(siblings) = children_at_mut(doc, &path[..depth]) else {
            return;
        };
        if idx + 1 >= siblings.len() {
            continue;
        }
        let joinable = match (&siblings[idx], &siblings[idx + 1]) {
            (Node::Block(a), Node::Block(b)) => {
                a.kind == b.kind && (a.kind.is_list() || a.kind == BlockKind::Blockquote)
            }
            _ => false,
        };
        if !joinable {
            continue;
        }
        if let Node::Block(b) = siblings.remove(idx + 1) {
            if let Some(Node::Block(a)) = siblings.get_mut(idx) {
                a.children.extend(b.children);
            }
        }
    }
}

/// Siblings covering both positions: parent path and first/last child index.
fn sibling_range(from: &Position, to: &Position) -> Option<(Path, usize, usize)> {
    let max = from.path.len().min(to.path.len()).saturating_sub(1);
    let mut depth = 0;
    while depth < max && from.path[depth] == to.path[depth] {
        depth += 1;
    }
    Some((
        from.path[..depth].to_vec(),
        *from.path.get(depth)?,
        *to.path.get(depth)?,
    ))
}

fn locate(doc: &Document, pos: &Position) -> (usize, usize) {
    let idx = doc
        .textblock_paths()
        .iter()
        .position(|p| *p == pos.path)
        .unwrap_or(0);
    (idx, pos.offset)
}

fn resolve(doc: &Document, (idx, offset): (usize, usize)) -> Position {
    let paths = doc.textblock_paths();
    match paths.get(idx).or(paths.last()) {
        Some(path) => doc.clamp(&Position::new(path.clone(), offset)),
        None => doc.start(),
    }
}

fn remap_selection(before: &Document, selection: &Selection, next: &mut EditorState) {
    let anchor = resolve(&next.doc, locate(before, &selection.anchor));
    let head = resolve(&next.doc, locate(before, &selection.head));
    next.set_selection(Selection::new(anchor, head));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::HeadingLevel;
    use crate::undo::History;

    fn state_of(blocks: impl IntoIterator<Item = Block>) -> EditorState {
        EditorState::new(Document::from_blocks(blocks), History::default())
    }

    fn para(text: &str) -> Block {
        Block::paragraph([TextRun::plain(text)])
    }

    fn list(kind: BlockKind, items: &[&str]) -> Block {
        Block::container(
            kind,
            items
                .iter()
                .map(|t| Block::container(BlockKind::ListItem, [para(t)])),
        )
    }

    #[test]
    fn test_insert_text_into_run() {
        let state = state_of([para("helo")]);
        let next = insert_text(&state, &Position::top(0, 3), "l");
        assert_eq!(next.doc.plain_text(), "hello");
        assert_eq!(next.selection.head, Position::top(0, 4));
        // Input state untouched.
        assert_eq!(state.doc.plain_text(), "helo");
    }

    #[test]
    fn test_insert_text_with_newline_splits() {
        let state = state_of([para("ab")]);
        let next = insert_text(&state, &Position::top(0, 1), "x\ny");
        assert_eq!(next.doc.plain_text(), "ax\nyb");
        assert_eq!(next.selection.head, Position::top(1, 1));
    }

    #[test]
    fn test_insert_text_in_code_block_is_literal() {
        let state = state_of([Block::code_block("fn")]);
        let next = insert_text(&state, &Position::top(0, 2), "\n}");
        assert_eq!(next.doc.children().len(), 1);
        assert_eq!(next.doc.plain_text(), "fn\n}");
    }

    #[test]
    fn test_insert_text_uses_stored_marks() {
        let mut state = state_of([para("")]);
        state.active_marks.insert(Mark::Bold);
        let next = insert_text(&state, &Position::top(0, 0), "hi");
        let run = next.doc.block_at(&[0]).unwrap().runs().next().unwrap().clone();
        assert!(run.marks.has(MarkType::Bold));
        assert!(next.active_marks.has(MarkType::Bold));
    }

    #[test]
    fn test_split_heading_at_end_makes_paragraph() {
        let state = state_of([Block::heading(HeadingLevel::H1, [TextRun::plain("Title")])]);
        let next = split_block(&state, &Position::top(0, 5));
        assert_eq!(next.doc.block_at(&[1]).unwrap().kind, BlockKind::Paragraph);
        assert_eq!(next.selection.head, Position::top(1, 0));
    }

    #[test]
    fn test_split_list_item() {
        let state = state_of([list(BlockKind::BulletList, &["onetwo"])]);
        let next = split_block(&state, &Position::new(vec![0, 0, 0], 3));
        assert_eq!(next.doc.block_at(&[0]).unwrap().children.len(), 2);
        assert_eq!(next.doc.plain_text(), "one\ntwo");
        assert_eq!(next.selection.head, Position::new(vec![0, 1, 0], 0));
    }

    #[test]
    fn test_split_empty_list_item_exits_list() {
        let state = state_of([list(BlockKind::BulletList, &["one", ""])]);
        let next = split_block(&state, &Position::new(vec![0, 1, 0], 0));
        assert_eq!(next.doc.children().len(), 2);
        assert_eq!(next.doc.block_at(&[1]).unwrap().kind, BlockKind::Paragraph);
        assert_eq!(next.selection.head, Position::top(1, 0));
    }

    #[test]
    fn test_delete_within_block() {
        let state = state_of([para("hello world")]);
        let next = delete_range(&state, &Position::top(0, 5), &Position::top(0, 11));
        assert_eq!(next.doc.plain_text(), "hello");
    }

    #[test]
    fn test_delete_across_blocks_joins() {
        let state = state_of([para("abc"), para("middle"), para("xyz")]);
        let next = delete_range(&state, &Position::top(0, 1), &Position::top(2, 2));
        assert_eq!(next.doc.plain_text(), "az");
        assert_eq!(next.doc.children().len(), 1);
        assert_eq!(next.selection.head, Position::top(0, 1));
    }

    #[test]
    fn test_delete_everything_leaves_empty_paragraph() {
        let state = state_of([para("only")]);
        let next = delete_range(&state, &Position::top(0, 0), &Position::top(0, 4));
        assert!(next.doc.is_blank());
        assert_eq!(next.doc.children().len(), 1);
    }

    #[test]
    fn test_delete_joins_adjacent_lists() {
        let state = state_of([
            list(BlockKind::BulletList, &["a", "b"]),
            para("gap"),
            list(BlockKind::BulletList, &["c", "d"]),
        ]);
        let next = delete_range(
            &state,
            &Position::new(vec![0, 1, 0], 1),
            &Position::new(vec![2, 0, 0], 1),
        );
        assert_eq!(next.doc.children().len(), 1);
        assert_eq!(next.doc.plain_text(), "a\nb\nd");
    }

    #[test]
    fn test_apply_mark_idempotent() {
        let state = state_of([para("hello")]);
        let (a, b) = (Position::top(0, 0), Position::top(0, 5));
        let once = apply_mark(&state, &a, &b, &Mark::Bold);
        let twice = apply_mark(&once, &a, &b, &Mark::Bold);
        assert_eq!(once.doc, twice.doc);
        let removed = remove_mark(&twice, &a, &b, MarkType::Bold);
        assert_eq!(removed.doc, state.doc);
    }

    #[test]
    fn test_marks_skip_code_blocks() {
        let state = state_of([para("a"), Block::code_block("b")]);
        let next = apply_mark(&state, &Position::top(0, 0), &Position::top(1, 1), &Mark::Italic);
        let code = next.doc.block_at(&[1]).unwrap();
        assert!(code.runs().all(|r| r.marks.is_empty()));
    }

    #[test]
    fn test_set_block_type_preserves_content() {
        let state = state_of([para("one"), para("two")]);
        let next = set_block_type(
            &state,
            &Position::top(0, 1),
            &Position::top(1, 1),
            &BlockKind::Heading(HeadingLevel::H2),
        );
        assert_eq!(next.doc.plain_text(), "one\ntwo");
        assert!(
            next.doc
                .children()
                .iter()
                .all(|n| n.as_block().unwrap().kind == BlockKind::Heading(HeadingLevel::H2))
        );
    }

    #[test]
    fn test_insert_image_splits_paragraph() {
        let state = state_of([para("before after")]);
        let next = insert_node(
            &state,
            &Position::top(0, 7),
            Node::Block(Block::image("cat.png", None)),
        );
        assert_eq!(next.doc.children().len(), 3);
        assert!(next.doc.block_at(&[1]).unwrap().kind.is_image());
        assert_eq!(next.selection.head, Position::top(2, 0));
    }

    #[test]
    fn test_insert_image_last_gets_trailing_paragraph() {
        let state = state_of([para("text")]);
        let next = insert_node(
            &state,
            &Position::top(0, 4),
            Node::Block(Block::image("cat.png", None)),
        );
        assert_eq!(next.doc.children().len(), 3);
        assert!(next.doc.block_at(&[2]).unwrap().children.is_empty());
        assert_eq!(next.selection.head, Position::top(2, 0));
    }

    #[test]
    fn test_insert_image_into_empty_paragraph_replaces_it() {
        let state = state_of([para("a"), Block::empty_paragraph(), para("b")]);
        let next = insert_node(
            &state,
            &Position::top(1, 0),
            Node::Block(Block::image("cat.png", None)),
        );
        assert_eq!(next.doc.children().len(), 3);
        assert_eq!(next.doc.plain_text(), "a\nb");
    }

    #[test]
    fn test_wrap_and_lift_blockquote() {
        let (from, to) = (Position::top(0, 0), Position::top(1, 1));
        let state = state_of([para("a"), para("b"), para("c")])
            .with_selection(Selection::new(from.clone(), to.clone()));
        let wrapped = wrap_in(&state, &from, &to, BlockKind::Blockquote);
        assert_eq!(wrapped.doc.children().len(), 2);
        assert_eq!(
            wrapped.doc.block_at(&[0]).unwrap().kind,
            BlockKind::Blockquote
        );
        assert_eq!(wrapped.selection.head, Position::new(vec![0, 1], 1));

        let lifted = lift(
            &wrapped,
            &wrapped.selection.anchor,
            &wrapped.selection.head,
            |k| *k == BlockKind::Blockquote,
        );
        assert_eq!(lifted.doc, state.doc);
        assert_eq!(lifted.selection.head, Position::top(1, 1));
    }

    #[test]
    fn test_wrap_in_list_and_switch_kind() {
        let state = state_of([para("a"), para("b")]);
        let (from, to) = (Position::top(0, 0), Position::top(1, 0));
        let listed = wrap_in(&state, &from, &to, BlockKind::BulletList);
        assert_eq!(listed.doc.block_at(&[0]).unwrap().children.len(), 2);

        let (from, to) = listed.selection.range();
        let ordered_list = set_list_kind(&listed, &from, &to, BlockKind::OrderedList);
        assert_eq!(
            ordered_list.doc.block_at(&[0]).unwrap().kind,
            BlockKind::OrderedList
        );
    }

    #[test]
    fn test_lift_middle_list_item_splits_list() {
        let state = state_of([list(BlockKind::OrderedList, &["a", "b", "c"])]);
        let pos = Position::new(vec![0, 1, 0], 0);
        let next = lift(&state, &pos, &pos, BlockKind::is_list);
        assert_eq!(next.doc.children().len(), 3);
        assert_eq!(next.doc.block_at(&[1]).unwrap().kind, BlockKind::Paragraph);
        assert_eq!(next.doc.plain_text(), "a\nb\nc");
    }

    #[test]
    fn test_link_span() {
        let link = MarkSet::new().with(Mark::link("/a"));
        let bold_link = link.clone().with(Mark::Bold);
        let block = Block::paragraph([
            TextRun::plain("x "),
            TextRun::new("li", link),
            TextRun::new("nk", bold_link),
            TextRun::plain(" y"),
        ]);
        let (start, end, mark) = link_span(&block, 3).unwrap();
        assert_eq!((start, end), (2, 6));
        assert_eq!(mark, Mark::link("/a"));
        assert_eq!(link_span(&block, 6).map(|s| (s.0, s.1)), Some((2, 6)));
        assert!(link_span(&block, 1).is_none());
    }

    #[test]
    fn test_map_position_through_typing() {
        let state = state_of([para("ab")]);
        let captured = Position::top(0, 2);

        let typed = insert_text(&state, &Position::top(0, 0), "XYZ");
        let mapped = map_position(&state.doc, &typed.doc, 0, &captured);
        assert_eq!(mapped, Position::top(0, 5));

        // Typing at the captured point leaves it ahead of the new text.
        let typed = insert_text(&state, &captured, "b");
        assert_eq!(map_position(&state.doc, &typed.doc, 2, &captured), captured);

        // Repeated characters are attributed to the side before the edit.
        let typed = insert_text(&state, &Position::top(0, 1), "b");
        assert_eq!(typed.doc.plain_text(), "abb");
        assert_eq!(
            map_position(&state.doc, &typed.doc, 1, &captured),
            Position::top(0, 3)
        );
    }

    #[test]
    fn test_map_position_through_structure() {
        let state = state_of([para("one"), para("two")]);
        let captured = Position::top(1, 2);

        let split = split_block(&state, &Position::top(0, 1));
        let mapped = map_position(&state.doc, &split.doc, 1, &captured);
        assert_eq!(mapped, Position::top(2, 2));

        let deleted = delete_range(&state, &Position::top(0, 1), &Position::top(1, 1));
        assert_eq!(deleted.doc.plain_text(), "owo");
        let mapped = map_position(&state.doc, &deleted.doc, 1, &captured);
        assert_eq!(mapped, Position::top(0, 2));

        let wrapped = wrap_in(
            &state,
            &Position::top(0, 0),
            &Position::top(1, 0),
            BlockKind::Blockquote,
        );
        let mapped = map_position(&state.doc, &wrapped.doc, 0, &captured);
        assert_eq!(mapped, Position::new(vec![0, 1], 2));
    }
}
