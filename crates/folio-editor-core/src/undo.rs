//! Undo/redo management for editor operations.
//!
//! Provides:
//! - `UndoManager` trait for abstracting undo implementations
//! - `History` - bounded snapshot stacks with typing coalescence
//!
//! Snapshots are whole documents behind `Arc`, so cloning an `EditorState`
//! (and the history inside it) never deep-copies past documents.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use web_time::Instant;

use crate::document::Document;
use crate::types::Selection;

/// Default number of undo steps kept.
pub const DEFAULT_CAPACITY: usize = 100;

/// Default idle window for merging consecutive typing into one step.
pub const DEFAULT_COALESCE_WINDOW: Duration = Duration::from_millis(300);

/// Trait for managing undo/redo operations.
///
/// Implementations trade the current snapshot for a stored one; the caller
/// restores whatever comes back.
pub trait UndoManager {
    /// Check if undo is available.
    fn can_undo(&self) -> bool;

    /// Check if redo is available.
    fn can_redo(&self) -> bool;

    /// Step back. Returns the snapshot to restore, or None if there is none.
    fn undo(&mut self, current: HistoryEntry) -> Option<HistoryEntry>;

    /// Step forward. Returns the snapshot to restore, or None if there is none.
    fn redo(&mut self, current: HistoryEntry) -> Option<HistoryEntry>;

    /// Clear all undo/redo history.
    fn clear_history(&mut self);
}

/// How an edit participates in history grouping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditKind {
    /// Plain text insertion. Consecutive typing within the idle window
    /// shares one entry.
    Typing,
    /// Anything else. Always starts a fresh entry.
    Other,
}

/// An immutable document snapshot.
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    pub document: Arc<Document>,
    pub selection: Selection,
    pub timestamp: Instant,
}

impl HistoryEntry {
    pub fn new(document: &Document, selection: &Selection, timestamp: Instant) -> Self {
        Self {
            document: Arc::new(document.clone()),
            selection: selection.clone(),
            timestamp,
        }
    }
}

/// Two bounded stacks of document snapshots.
#[derive(Clone, Debug)]
pub struct History {
    past: VecDeque<HistoryEntry>,
    future: Vec<HistoryEntry>,
    capacity: usize,
    coalesce_window: Duration,
    /// Time of the last typing edit while a typing group is open.
    typing_since: Option<Instant>,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_COALESCE_WINDOW)
    }
}

impl History {
    pub fn new(capacity: usize, coalesce_window: Duration) -> Self {
        Self {
            past: VecDeque::new(),
            future: Vec::new(),
            capacity: capacity.max(1),
            coalesce_window,
            typing_since: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn undo_depth(&self) -> usize {
        self.past.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.future.len()
    }

    /// Record the pre-edit snapshot of a committed edit.
    ///
    /// Returns true if a new entry was pushed, false if the edit was merged
    /// into the open typing group.
    pub fn record(
        &mut self,
        before: &Document,
        selection: &Selection,
        kind: EditKind,
        now: Instant,
    ) -> bool {
        self.future.clear();

        if kind == EditKind::Typing {
            if let Some(last) = self.typing_since {
                if now.saturating_duration_since(last) <= self.coalesce_window
                    && !self.past.is_empty()
                {
                    self.typing_since = Some(now);
                    tracing::trace!(target: "folio::history", "typing coalesced");
                    return false;
                }
            }
        }

        self.past.push_back(HistoryEntry::new(before, selection, now));
        while self.past.len() > self.capacity {
            self.past.pop_front();
        }
        self.typing_since = match kind {
            EditKind::Typing => Some(now),
            EditKind::Other => None,
        };
        tracing::debug!(
            target: "folio::history",
            depth = self.past.len(),
            ?kind,
            "history entry recorded"
        );
        true
    }

    /// Close the open typing group, if any.
    pub fn break_coalescing(&mut self) {
        self.typing_since = None;
    }

    /// A history with the same limits and no entries.
    pub fn cleared(&self) -> Self {
        Self::new(self.capacity, self.coalesce_window)
    }
}

impl UndoManager for History {
    fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    fn undo(&mut self, current: HistoryEntry) -> Option<HistoryEntry> {
        let entry = self.past.pop_back()?;
        self.future.push(current);
        self.typing_since = None;
        Some(entry)
    }

    fn redo(&mut self, current: HistoryEntry) -> Option<HistoryEntry> {
        let entry = self.future.pop()?;
        self.past.push_back(current);
        while self.past.len() > self.capacity {
            self.past.pop_front();
        }
        self.typing_since = None;
        Some(entry)
    }

    fn clear_history(&mut self) {
        self.past.clear();
        self.future.clear();
        self.typing_since = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Block, TextRun};

    fn doc(text: &str) -> Document {
        Document::from_blocks([Block::paragraph([TextRun::plain(text)])])
    }

    fn entry(text: &str, at: Instant) -> HistoryEntry {
        HistoryEntry::new(&doc(text), &Selection::default(), at)
    }

    #[test]
    fn test_record_undo_redo() {
        let t0 = Instant::now();
        let mut history = History::default();
        assert!(!history.can_undo());

        assert!(history.record(&doc("a"), &Selection::default(), EditKind::Other, t0));
        assert!(history.can_undo());

        let restored = history.undo(entry("ab", t0)).unwrap();
        assert_eq!(*restored.document, doc("a"));
        assert!(history.can_redo());

        let redone = history.redo(entry("a", t0)).unwrap();
        assert_eq!(*redone.document, doc("ab"));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let t0 = Instant::now();
        let mut history = History::default();
        history.record(&doc(""), &Selection::default(), EditKind::Other, t0);
        history.undo(entry("x", t0));
        assert!(history.can_redo());

        history.record(&doc(""), &Selection::default(), EditKind::Other, t0);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let t0 = Instant::now();
        let mut history = History::new(3, DEFAULT_COALESCE_WINDOW);
        for text in ["a", "b", "c", "d"] {
            history.record(&doc(text), &Selection::default(), EditKind::Other, t0);
        }
        assert_eq!(history.undo_depth(), 3);

        let mut current = entry("e", t0);
        let mut seen = Vec::new();
        while let Some(e) = history.undo(current) {
            seen.push(e.document.plain_text());
            current = e;
        }
        // "a" was evicted from the bottom.
        assert_eq!(seen, vec!["d", "c", "b"]);
    }

    #[test]
    fn test_typing_coalesces_within_window() {
        let t0 = Instant::now();
        let mut history = History::default();
        assert!(history.record(&doc(""), &Selection::default(), EditKind::Typing, t0));
        assert!(!history.record(
            &doc("h"),
            &Selection::default(),
            EditKind::Typing,
            t0 + Duration::from_millis(100)
        ));
        assert!(!history.record(
            &doc("he"),
            &Selection::default(),
            EditKind::Typing,
            t0 + Duration::from_millis(350)
        ));
        assert_eq!(history.undo_depth(), 1);

        // Idle gap beyond the window starts a new group.
        assert!(history.record(
            &doc("hel"),
            &Selection::default(),
            EditKind::Typing,
            t0 + Duration::from_millis(1000)
        ));
        assert_eq!(history.undo_depth(), 2);
    }

    #[test]
    fn test_other_edit_breaks_coalescing() {
        let t0 = Instant::now();
        let mut history = History::default();
        history.record(&doc(""), &Selection::default(), EditKind::Typing, t0);
        history.record(&doc("a"), &Selection::default(), EditKind::Other, t0);
        assert!(history.record(&doc("a"), &Selection::default(), EditKind::Typing, t0));
        assert_eq!(history.undo_depth(), 3);
    }

    #[test]
    fn test_clear_history() {
        let t0 = Instant::now();
        let mut history = History::default();
        history.record(&doc(""), &Selection::default(), EditKind::Other, t0);
        history.clear_history();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }
}
