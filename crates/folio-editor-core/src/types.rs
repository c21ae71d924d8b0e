//! Core editor types: positions and selections.
//!
//! These types are framework-agnostic. A position addresses a textblock by its
//! path from the document root and a character offset inside that block.

use std::fmt;

/// Child indices from the document root down to a textblock.
pub type Path = Vec<usize>;

/// A caret position inside a textblock.
///
/// `offset` is measured in chars (Unicode scalar values), NOT bytes.
/// Positions order by path first, which matches document order because a
/// textblock never contains another block.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub path: Path,
    pub offset: usize,
}

impl Position {
    /// Create a new position.
    pub fn new(path: impl Into<Path>, offset: usize) -> Self {
        Self {
            path: path.into(),
            offset,
        }
    }

    /// Position at the given offset of a top-level block.
    pub fn top(index: usize, offset: usize) -> Self {
        Self::new(vec![index], offset)
    }

    /// Same textblock, different offset.
    pub fn with_offset(&self, offset: usize) -> Self {
        Self {
            path: self.path.clone(),
            offset,
        }
    }

    /// Whether both positions address the same textblock.
    pub fn same_block(&self, other: &Position) -> bool {
        self.path == other.path
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path: Vec<String> = self.path.iter().map(|i| i.to_string()).collect();
        write!(f, "{}:{}", path.join("."), self.offset)
    }
}

/// Text selection with anchor and head positions.
///
/// The anchor is where the selection started, the head is where the cursor is now.
/// They may be in any order - use `start()` and `end()` for ordered bounds.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Selection {
    /// Where selection started
    pub anchor: Position,
    /// Where cursor is now
    pub head: Position,
}

impl Selection {
    /// Create a new selection.
    pub fn new(anchor: Position, head: Position) -> Self {
        Self { anchor, head }
    }

    /// Create a collapsed selection (cursor position).
    pub fn collapsed(pos: Position) -> Self {
        Self {
            anchor: pos.clone(),
            head: pos,
        }
    }

    /// Get the start (lower bound) of the selection.
    pub fn start(&self) -> &Position {
        if self.anchor <= self.head {
            &self.anchor
        } else {
            &self.head
        }
    }

    /// Get the end (upper bound) of the selection.
    pub fn end(&self) -> &Position {
        if self.anchor <= self.head {
            &self.head
        } else {
            &self.anchor
        }
    }

    /// Check if the selection is collapsed (empty, cursor only).
    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.head
    }

    /// Check if the selection is backwards (head before anchor).
    pub fn is_backwards(&self) -> bool {
        self.head < self.anchor
    }

    /// Ordered `(start, end)` pair.
    pub fn range(&self) -> (Position, Position) {
        (self.start().clone(), self.end().clone())
    }

    /// Check if the selection lies inside a single textblock.
    pub fn is_single_block(&self) -> bool {
        self.anchor.same_block(&self.head)
    }
}
