//! folio-editor-core: structured rich-text editing without a rendering surface.
//!
//! This crate provides:
//! - `Document` - block/inline node tree with marks, normalized on every edit
//! - `transform` - pure document operations over `EditorState`
//! - `html` - `serialize` / lenient `deserialize` for the controlled value
//! - `commands` - the command engine plus `is_active` / `can_execute` queries
//! - `History` - bounded undo/redo with typing coalescence
//! - `SyncController` - echo suppression for externally owned values
//! - `UploadPipeline` - async image uploads landing at a captured position
//! - `Editor` - an editing session tying the above together
//! - `toolbar` - presentation-only controls over `ToolbarHost`

pub mod commands;
pub mod config;
pub mod document;
pub mod editor;
pub mod error;
pub mod html;
pub mod marks;
pub mod state;
pub mod sync;
pub mod toolbar;
pub mod transform;
pub mod types;
pub mod undo;
pub mod upload;

pub use commands::{ActiveQuery, Command, CommandResult, can_execute, execute, is_active};
pub use config::EditorConfig;
pub use document::{Block, BlockKind, Document, HeadingLevel, Node, TextRun, TextStats};
pub use editor::{CharacterCount, Editor, EditorOptions, SessionPhase};
pub use error::{EditorError, UploadError};
pub use html::{deserialize, serialize};
pub use marks::{HexColor, Mark, MarkSet, MarkType, TextAlign};
pub use smol_str::SmolStr;
pub use state::{EditorState, EditorValue};
pub use sync::SyncController;
pub use toolbar::{ToolbarControl, ToolbarHost, ToolbarItem, activate, toolbar_items};
pub use types::{Path, Position, Selection};
pub use undo::{EditKind, History, HistoryEntry, UndoManager};
pub use upload::{
    ImageFile, ImageInsertion, PendingUpload, UploadId, UploadOutcome, UploadPipeline,
    UploadStatus, UploadStrategy, UploadTask, UploadTicket,
};
