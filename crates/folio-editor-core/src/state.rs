//! Editor state: document, selection, stored marks and history.
//!
//! `EditorState` is a plain value. Every command takes one by reference and
//! produces a new one; nothing holds a live handle into it.

use serde::{Deserialize, Serialize};

use crate::document::{Block, Document};
use crate::html;
use crate::marks::MarkSet;
use crate::types::{Position, Selection};
use crate::undo::History;

/// The controlled value exchanged with the owner of the editor.
///
/// `html` is canonical; `text` is a plain-text projection of it.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EditorValue {
    pub html: String,
    pub text: String,
}

impl EditorValue {
    pub fn new(html: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            text: text.into(),
        }
    }

    /// Value carrying only markup; the text projection is derived from it.
    pub fn from_html(markup: &str) -> Self {
        html::serialize(&html::deserialize(markup))
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Complete editing state.
#[derive(Clone, Debug)]
pub struct EditorState {
    pub doc: Document,
    pub selection: Selection,
    /// Marks applied to text typed at the current selection.
    pub active_marks: MarkSet,
    pub history: History,
}

impl EditorState {
    /// New state with the caret at the start of the document.
    pub fn new(doc: Document, history: History) -> Self {
        let selection = Selection::collapsed(doc.start());
        let mut state = Self {
            doc,
            selection,
            active_marks: MarkSet::new(),
            history,
        };
        state.refresh_active_marks();
        state
    }

    pub fn from_html(markup: &str, history: History) -> Self {
        Self::new(html::deserialize(markup), history)
    }

    /// Replace the selection, clamping it against the document.
    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = Selection::new(
            self.doc.clamp(&selection.anchor),
            self.doc.clamp(&selection.head),
        );
        self.refresh_active_marks();
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.set_selection(selection);
        self
    }

    /// Collapse the selection at `pos`.
    pub fn set_cursor(&mut self, pos: Position) {
        self.set_selection(Selection::collapsed(pos));
    }

    /// Re-clamp the selection after a mutation shortened content.
    pub fn clamp_selection(&mut self) {
        let sel = self.selection.clone();
        self.set_selection(sel);
    }

    /// Recompute stored marks from the document at the selection.
    pub fn refresh_active_marks(&mut self) {
        let start = self.selection.start();
        let marks = match self.doc.textblock(&start.path) {
            Some(block) if self.selection.is_collapsed() => block.marks_at(start.offset),
            Some(block) => match block.marks_of_char(start.offset) {
                Some(marks) if block.kind.allows_formatting() => marks.clone(),
                _ => block.marks_at(start.offset),
            },
            None => MarkSet::new(),
        };
        self.active_marks = marks;
    }

    /// The textblock holding the selection head.
    pub fn head_block(&self) -> Option<&Block> {
        self.doc.textblock(&self.selection.head.path)
    }

    /// Plain text covered by the selection, blocks joined by newlines.
    pub fn selected_text(&self) -> String {
        let (from, to) = self.selection.range();
        let mut parts = Vec::new();
        for path in self.doc.textblocks_between(&from, &to) {
            let Some(block) = self.doc.textblock(&path) else {
                continue;
            };
            let start = if path == from.path { from.offset } else { 0 };
            let end = if path == to.path {
                to.offset
            } else {
                block.text_len()
            };
            parts.push(
                block
                    .text()
                    .chars()
                    .skip(start)
                    .take(end.saturating_sub(start))
                    .collect::<String>(),
            );
        }
        parts.join("\n")
    }

    /// Serialize the document for the owner.
    pub fn value(&self) -> EditorValue {
        html::serialize(&self.doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::TextRun;
    use crate::marks::{Mark, MarkType};

    fn state() -> EditorState {
        let doc = Document::from_blocks([
            Block::paragraph([
                TextRun::plain("plain "),
                TextRun::new("bold", MarkSet::new().with(Mark::Bold)),
            ]),
            Block::paragraph([TextRun::plain("second")]),
        ]);
        EditorState::new(doc, History::default())
    }

    #[test]
    fn test_new_state_starts_at_document_start() {
        let state = state();
        assert_eq!(state.selection, Selection::collapsed(Position::top(0, 0)));
    }

    #[test]
    fn test_set_selection_clamps() {
        let mut state = state();
        state.set_cursor(Position::top(1, 99));
        assert_eq!(state.selection.head, Position::top(1, 6));
    }

    #[test]
    fn test_active_marks_follow_cursor() {
        let mut state = state();
        state.set_cursor(Position::top(0, 8));
        assert!(state.active_marks.has(MarkType::Bold));
        state.set_cursor(Position::top(0, 3));
        assert!(state.active_marks.is_empty());
    }

    #[test]
    fn test_selected_text_spans_blocks() {
        let state = state().with_selection(Selection::new(
            Position::top(0, 6),
            Position::top(1, 3),
        ));
        assert_eq!(state.selected_text(), "bold\nsec");
    }
}
