//! Toolbar presentation.
//!
//! A toolbar holds no editing state. It asks its host which controls are
//! pressed and which are enabled, and turns activation into a command.

use crate::commands::{ActiveQuery, Command};
use crate::document::HeadingLevel;
use crate::editor::Editor;
use crate::marks::{MarkType, TextAlign};

/// The queries and dispatch a toolbar needs from an editor.
pub trait ToolbarHost {
    fn is_active(&self, query: ActiveQuery) -> bool;
    fn can_execute(&self, command: &Command) -> bool;
    fn dispatch(&mut self, command: Command) -> bool;
}

impl ToolbarHost for Editor {
    fn is_active(&self, query: ActiveQuery) -> bool {
        Editor::is_active(self, query)
    }

    fn can_execute(&self, command: &Command) -> bool {
        Editor::can_execute(self, command)
    }

    fn dispatch(&mut self, command: Command) -> bool {
        Editor::dispatch(self, command)
    }
}

/// An argument-free toolbar button.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToolbarControl {
    Bold,
    Italic,
    Underline,
    Strike,
    Paragraph,
    Heading(HeadingLevel),
    Blockquote,
    CodeBlock,
    BulletList,
    OrderedList,
    Align(TextAlign),
    Unlink,
    ClearFormatting,
    Undo,
    Redo,
}

pub const DEFAULT_LAYOUT: &[ToolbarControl] = &[
    ToolbarControl::Undo,
    ToolbarControl::Redo,
    ToolbarControl::Paragraph,
    ToolbarControl::Heading(HeadingLevel::H1),
    ToolbarControl::Heading(HeadingLevel::H2),
    ToolbarControl::Heading(HeadingLevel::H3),
    ToolbarControl::Bold,
    ToolbarControl::Italic,
    ToolbarControl::Underline,
    ToolbarControl::Strike,
    ToolbarControl::Unlink,
    ToolbarControl::Align(TextAlign::Left),
    ToolbarControl::Align(TextAlign::Center),
    ToolbarControl::Align(TextAlign::Right),
    ToolbarControl::Align(TextAlign::Justify),
    ToolbarControl::BulletList,
    ToolbarControl::OrderedList,
    ToolbarControl::Blockquote,
    ToolbarControl::CodeBlock,
    ToolbarControl::ClearFormatting,
];

impl ToolbarControl {
    pub fn label(self) -> &'static str {
        match self {
            Self::Bold => "Bold",
            Self::Italic => "Italic",
            Self::Underline => "Underline",
            Self::Strike => "Strikethrough",
            Self::Paragraph => "Normal text",
            Self::Heading(HeadingLevel::H1) => "Heading 1",
            Self::Heading(HeadingLevel::H2) => "Heading 2",
            Self::Heading(HeadingLevel::H3) => "Heading 3",
            Self::Blockquote => "Quote",
            Self::CodeBlock => "Code block",
            Self::BulletList => "Bullet list",
            Self::OrderedList => "Numbered list",
            Self::Align(TextAlign::Left) => "Align left",
            Self::Align(TextAlign::Center) => "Align center",
            Self::Align(TextAlign::Right) => "Align right",
            Self::Align(TextAlign::Justify) => "Justify",
            Self::Unlink => "Remove link",
            Self::ClearFormatting => "Clear formatting",
            Self::Undo => "Undo",
            Self::Redo => "Redo",
        }
    }

    /// What makes the control render as pressed, if anything.
    pub fn active_query(self) -> Option<ActiveQuery> {
        match self {
            Self::Bold => Some(ActiveQuery::Mark(MarkType::Bold)),
            Self::Italic => Some(ActiveQuery::Mark(MarkType::Italic)),
            Self::Underline => Some(ActiveQuery::Mark(MarkType::Underline)),
            Self::Strike => Some(ActiveQuery::Mark(MarkType::Strike)),
            Self::Unlink => Some(ActiveQuery::Mark(MarkType::Link)),
            Self::Paragraph => Some(ActiveQuery::Paragraph),
            Self::Heading(level) => Some(ActiveQuery::Heading(level)),
            Self::Blockquote => Some(ActiveQuery::Blockquote),
            Self::CodeBlock => Some(ActiveQuery::CodeBlock),
            Self::BulletList => Some(ActiveQuery::BulletList),
            Self::OrderedList => Some(ActiveQuery::OrderedList),
            Self::Align(align) => Some(ActiveQuery::Align(align)),
            Self::ClearFormatting | Self::Undo | Self::Redo => None,
        }
    }

    /// The command activation dispatches. Pressed headings revert to a
    /// paragraph and pressed alignments revert to left.
    pub fn command(self, pressed: bool) -> Command {
        match self {
            Self::Bold => Command::ToggleBold,
            Self::Italic => Command::ToggleItalic,
            Self::Underline => Command::ToggleUnderline,
            Self::Strike => Command::ToggleStrike,
            Self::Paragraph => Command::SetParagraph,
            Self::Heading(_) if pressed => Command::SetParagraph,
            Self::Heading(level) => Command::SetHeading(level),
            Self::Blockquote => Command::ToggleBlockquote,
            Self::CodeBlock => Command::ToggleCodeBlock,
            Self::BulletList => Command::ToggleBulletList,
            Self::OrderedList => Command::ToggleOrderedList,
            Self::Align(_) if pressed => Command::SetTextAlign(TextAlign::Left),
            Self::Align(align) => Command::SetTextAlign(align),
            Self::Unlink => Command::SetLink(None),
            Self::ClearFormatting => Command::ClearFormatting,
            Self::Undo => Command::Undo,
            Self::Redo => Command::Redo,
        }
    }
}

/// Render state of one control.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToolbarItem {
    pub control: ToolbarControl,
    pub pressed: bool,
    pub enabled: bool,
}

fn pressed(host: &impl ToolbarHost, control: ToolbarControl) -> bool {
    control.active_query().is_some_and(|q| host.is_active(q))
}

pub fn toolbar_items(host: &impl ToolbarHost, layout: &[ToolbarControl]) -> Vec<ToolbarItem> {
    layout
        .iter()
        .map(|&control| {
            let pressed = pressed(host, control);
            ToolbarItem {
                control,
                pressed,
                enabled: host.can_execute(&control.command(pressed)),
            }
        })
        .collect()
}

/// Dispatch the command behind a control. Returns false if it was disabled
/// or did nothing.
pub fn activate(host: &mut impl ToolbarHost, control: ToolbarControl) -> bool {
    let command = control.command(pressed(host, control));
    if !host.can_execute(&command) {
        return false;
    }
    host.dispatch(command)
}
