//! Controlled-value synchronization.
//!
//! The owner of an editor holds the canonical `{html, text}` value. Every
//! committed edit is emitted to the owner, who typically hands the same value
//! straight back. `SyncController` remembers what it emitted last so those
//! echoes leave the document and selection alone, while anything else is
//! treated as an external overwrite.

use crate::html;
use crate::state::{EditorState, EditorValue};
use crate::types::Selection;

/// Tracks the last value this editor produced.
#[derive(Clone, Debug, Default)]
pub struct SyncController {
    last_emitted: Option<EditorValue>,
}

impl SyncController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a value handed to the owner.
    pub fn record_emitted(&mut self, value: &EditorValue) {
        self.last_emitted = Some(value.clone());
    }

    pub fn last_emitted(&self) -> Option<&EditorValue> {
        self.last_emitted.as_ref()
    }

    /// Whether an incoming value is an echo of our own output.
    pub fn is_echo(&self, incoming: &EditorValue) -> bool {
        self.last_emitted
            .as_ref()
            .is_some_and(|last| last.html == incoming.html)
    }

    /// Reconcile an externally supplied value against the current state.
    ///
    /// Returns `None` when nothing should change: the value is an echo, or it
    /// parses to the document already held. Otherwise returns the replacement
    /// state, with history cleared and the caret at the end of the document.
    /// Reconciliation itself never counts as an emitted change.
    pub fn reconcile(
        &mut self,
        incoming: &EditorValue,
        state: &EditorState,
    ) -> Option<EditorState> {
        if self.is_echo(incoming) {
            tracing::trace!(target: "folio::sync", "ignoring echoed value");
            return None;
        }

        let doc = html::deserialize(&incoming.html);
        self.last_emitted = Some(incoming.clone());
        if doc == state.doc {
            tracing::trace!(target: "folio::sync", "incoming value matches document");
            return None;
        }

        tracing::debug!(
            target: "folio::sync",
            blocks = doc.block_count(),
            "external value overwrote document"
        );
        let end = doc.end();
        let mut next = EditorState::new(doc, state.history.cleared());
        next.set_selection(Selection::collapsed(end));
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Position;
    use crate::undo::{EditKind, History, UndoManager};
    use web_time::Instant;

    fn state_with(markup: &str) -> EditorState {
        EditorState::from_html(markup, History::default())
    }

    #[test]
    fn test_echo_is_ignored() {
        let state = state_with("<p>abc</p>").with_selection(Selection::collapsed(Position::top(0, 1)));
        let mut sync = SyncController::new();
        let emitted = state.value();
        sync.record_emitted(&emitted);

        assert!(sync.is_echo(&emitted));
        assert!(sync.reconcile(&emitted, &state).is_none());
    }

    #[test]
    fn test_external_value_overwrites() {
        let mut state = state_with("<p>abc</p>");
        state
            .history
            .record(&state.doc.clone(), &state.selection.clone(), EditKind::Other, Instant::now());
        let mut sync = SyncController::new();
        sync.record_emitted(&state.value());

        let incoming = EditorValue::new("<h1>New</h1><p>body</p>", "New\nbody");
        let next = sync.reconcile(&incoming, &state).unwrap();
        assert_eq!(next.value().html, "<h1>New</h1><p>body</p>");
        assert_eq!(next.selection, Selection::collapsed(Position::top(1, 4)));
        assert!(!next.history.can_undo());
        assert_eq!(next.history.capacity(), state.history.capacity());

        // The same value supplied again is now an echo.
        assert!(sync.reconcile(&incoming, &next).is_none());
        assert_eq!(sync.last_emitted(), Some(&incoming));
    }

    #[test]
    fn test_equivalent_markup_keeps_state() {
        let state = state_with("<p><b>x</b></p>");
        let mut sync = SyncController::new();
        let incoming = EditorValue::new("<p><strong>x</strong></p>", "x");
        assert!(sync.reconcile(&incoming, &state).is_none());
    }

    #[test]
    fn test_malformed_value_still_overwrites() {
        let state = state_with("<p>old</p>");
        let mut sync = SyncController::new();
        let next = sync
            .reconcile(&EditorValue::new("<div><<span>new", ""), &state)
            .unwrap();
        assert_eq!(next.doc.plain_text(), "<new");
    }
}
