//! The editing session.
//!
//! `Editor` owns one `EditorState` and threads it through the command engine,
//! emitting the serialized value to the owner after every committed edit and
//! reconciling values the owner pushes back. It is the only stateful piece of
//! the crate; everything it calls is a pure function of `EditorState`.

use std::fmt;

use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::commands::{self, ActiveQuery, Command, commit};
use crate::config::EditorConfig;
use crate::document::{Block, Document, Node};
use crate::error::EditorError;
use crate::html;
use crate::state::{EditorState, EditorValue};
use crate::sync::SyncController;
use crate::transform::{insert_node, map_position};
use crate::undo::EditKind;
use crate::upload::{
    ImageFile, PendingUpload, UploadId, UploadOutcome, UploadPipeline, UploadStrategy,
    UploadTask, UploadTicket,
};

/// Everything the owner configures an editor with.
#[derive(Clone, Debug, Default)]
pub struct EditorOptions {
    /// Controlled value. Takes precedence over `default_value`.
    pub value: Option<EditorValue>,
    /// Initial value, used only when `value` is absent.
    pub default_value: Option<EditorValue>,
    pub disabled: bool,
    pub placeholder: Option<String>,
    /// Overrides `config.character_limit` when set.
    pub character_limit: Option<usize>,
    /// Upload strategy; defaults to inline data URLs.
    pub upload: UploadStrategy,
    pub config: EditorConfig,
}

/// Lifecycle of an editing session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionPhase {
    Uninitialized,
    Ready,
    Editing,
    Preview,
    Destroyed,
}

/// Soft character counter for display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterCount {
    pub characters: usize,
    pub words: usize,
    pub limit: Option<usize>,
}

impl CharacterCount {
    pub fn is_over_limit(&self) -> bool {
        self.limit.is_some_and(|limit| self.characters > limit)
    }
}

type ChangeHandler = Box<dyn FnMut(&EditorValue)>;

pub struct Editor {
    state: EditorState,
    sync: SyncController,
    uploads: UploadPipeline,
    phase: SessionPhase,
    disabled: bool,
    placeholder: Option<String>,
    character_limit: Option<usize>,
    on_change: Option<ChangeHandler>,
}

impl Editor {
    pub fn new(options: EditorOptions) -> Result<Self, EditorError> {
        options.config.validate()?;
        let EditorOptions {
            value,
            default_value,
            disabled,
            placeholder,
            character_limit,
            upload,
            config,
        } = options;

        let mut sync = SyncController::new();
        let doc = match (&value, &default_value) {
            (Some(value), _) => {
                sync.record_emitted(value);
                html::deserialize(&value.html)
            }
            (None, Some(initial)) => html::deserialize(&initial.html),
            (None, None) => Document::empty(),
        };

        let mut editor = Self {
            state: EditorState::new(doc, config.history()),
            sync,
            uploads: UploadPipeline::new(config.allowed_image_types.iter().cloned(), upload),
            phase: SessionPhase::Uninitialized,
            disabled,
            placeholder,
            character_limit: character_limit.or(config.character_limit),
            on_change: None,
        };
        editor.phase = SessionPhase::Ready;
        tracing::debug!(
            target: "folio::commands",
            blocks = editor.state.doc.block_count(),
            disabled,
            "editor session ready"
        );
        Ok(editor)
    }

    /// Register the owner's change callback, replacing any previous one.
    pub fn on_change(&mut self, handler: impl FnMut(&EditorValue) + 'static) {
        self.on_change = Some(Box::new(handler));
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn value(&self) -> EditorValue {
        self.state.value()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Whether commands currently reach the document.
    pub fn is_editable(&self) -> bool {
        !self.disabled && matches!(self.phase, SessionPhase::Ready | SessionPhase::Editing)
    }

    /// Run a command now.
    pub fn dispatch(&mut self, command: Command) -> bool {
        self.dispatch_at(command, Instant::now())
    }

    /// Run a command at an explicit time.
    pub fn dispatch_at(&mut self, command: Command, now: Instant) -> bool {
        if !self.is_editable() {
            tracing::trace!(
                target: "folio::commands",
                ?command,
                phase = ?self.phase,
                disabled = self.disabled,
                "command suppressed"
            );
            return false;
        }
        let result = commands::execute(&self.state, &command, now);
        if !result.ok {
            return false;
        }
        let edit_start = self
            .state
            .doc
            .linear_offset(self.state.selection.start())
            .min(result.state.doc.linear_offset(result.state.selection.start()));
        let changed = self.advance(result.state, edit_start);
        self.phase = SessionPhase::Editing;
        if changed {
            self.emit();
        }
        true
    }

    /// Replace the state, carrying captured upload positions across the
    /// edit. Returns true if the document changed.
    fn advance(&mut self, next: EditorState, edit_start: usize) -> bool {
        let changed = next.doc != self.state.doc;
        if changed {
            let (before, after) = (&self.state.doc, &next.doc);
            self.uploads
                .remap_positions(|pos| map_position(before, after, edit_start, pos));
        }
        self.state = next;
        changed
    }

    fn emit(&mut self) {
        let value = self.state.value();
        self.sync.record_emitted(&value);
        if let Some(handler) = self.on_change.as_mut() {
            handler(&value);
        }
    }

    /// Accept a controlled value from the owner.
    ///
    /// Returns true if it replaced the document. Echoes of emitted values are
    /// ignored, and reconciliation never calls the change handler.
    pub fn set_value(&mut self, value: &EditorValue) -> bool {
        if self.phase == SessionPhase::Destroyed {
            return false;
        }
        match self.sync.reconcile(value, &self.state) {
            Some(next) => self.advance(next, usize::MAX),
            None => false,
        }
    }

    pub fn is_active(&self, query: ActiveQuery) -> bool {
        commands::is_active(&self.state, query)
    }

    /// Whether dispatching `command` would do anything. Always false while
    /// the editor is not editable.
    pub fn can_execute(&self, command: &Command) -> bool {
        self.is_editable() && commands::can_execute(&self.state, command)
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        if self.disabled != disabled {
            tracing::debug!(target: "folio::commands", disabled, "disabled flag changed");
        }
        self.disabled = disabled;
    }

    /// Switch to preview. Returns false if the session cannot preview.
    pub fn enter_preview(&mut self) -> bool {
        match self.phase {
            SessionPhase::Ready | SessionPhase::Editing => {
                self.phase = SessionPhase::Preview;
                true
            }
            _ => false,
        }
    }

    pub fn exit_preview(&mut self) -> bool {
        if self.phase != SessionPhase::Preview {
            return false;
        }
        self.phase = SessionPhase::Editing;
        true
    }

    /// Placeholder to show, only while the document has no text.
    pub fn placeholder(&self) -> Option<&str> {
        if self.state.doc.stats().characters == 0 && self.state.doc.image_count() == 0 {
            self.placeholder.as_deref()
        } else {
            None
        }
    }

    pub fn character_count(&self) -> CharacterCount {
        let stats = self.state.doc.stats();
        CharacterCount {
            characters: stats.characters,
            words: stats.words,
            limit: self.character_limit,
        }
    }

    /// Start uploading a chosen file. The image will land at the caret as it
    /// is now. Returns `None` while the editor is not editable.
    pub fn select_image(&mut self, file: ImageFile) -> Option<UploadTicket> {
        if !self.is_editable() {
            return None;
        }
        let position = self.state.selection.head.clone();
        Some(self.uploads.begin(file, position))
    }

    /// Feed back a settled upload. Returns true if an image was inserted.
    pub fn finish_upload(&mut self, outcome: UploadOutcome) -> bool {
        self.finish_upload_at(outcome, Instant::now())
    }

    pub fn finish_upload_at(&mut self, outcome: UploadOutcome, now: Instant) -> bool {
        let Some(insertion) = self.uploads.complete(outcome) else {
            return false;
        };
        let position = self.state.doc.clamp(&insertion.position);
        let image = Block::image(insertion.src, insertion.alt);
        let next = insert_node(&self.state, &position, Node::Block(image));
        if next.doc == self.state.doc {
            tracing::warn!(target: "folio::upload", id = %insertion.id, at = %position, "image insertion left the document unchanged");
            return false;
        }
        let next = commit(&self.state, next, EditKind::Other, now);
        let edit_start = self.state.doc.linear_offset(&position);
        self.advance(next, edit_start);
        tracing::debug!(target: "folio::upload", id = %insertion.id, at = %position, "image inserted");
        self.emit();
        true
    }

    pub fn retry_upload(&mut self, id: UploadId) -> Option<PendingUpload> {
        if self.phase == SessionPhase::Destroyed {
            return None;
        }
        self.uploads.retry(id)
    }

    pub fn upload_tasks(&self) -> &[UploadTask] {
        self.uploads.tasks()
    }

    pub fn set_upload_strategy(&mut self, strategy: UploadStrategy) {
        self.uploads.set_strategy(strategy);
    }

    /// End the session. In-flight uploads are abandoned and the change
    /// handler is dropped.
    pub fn teardown(&mut self) {
        if self.phase == SessionPhase::Destroyed {
            return;
        }
        self.uploads.close();
        self.on_change = None;
        self.phase = SessionPhase::Destroyed;
        tracing::debug!(target: "folio::commands", "editor session destroyed");
    }
}

impl fmt::Debug for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Editor")
            .field("phase", &self.phase)
            .field("disabled", &self.disabled)
            .field("state", &self.state)
            .field("uploads", &self.uploads)
            .finish_non_exhaustive()
    }
}
