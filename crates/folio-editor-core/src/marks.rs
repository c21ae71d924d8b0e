//! Inline marks and block-level text alignment.
//!
//! A `MarkSet` holds at most one mark per `MarkType`, kept sorted by type so
//! that two sets with the same marks compare equal regardless of the order
//! they were applied in. The sort order is also the nesting order used when
//! serializing (links outermost).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::EditorError;

/// A `#rgb` or `#rrggbb` colour, stored lowercase.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor(SmolStr);

impl HexColor {
    pub fn parse(s: &str) -> Result<Self, EditorError> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix('#')
            .ok_or_else(|| EditorError::InvalidColor(trimmed.into()))?;
        let valid_len = digits.len() == 3 || digits.len() == 6;
        if !valid_len || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(EditorError::InvalidColor(trimmed.into()));
        }
        Ok(Self(SmolStr::new(trimmed.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Colour used for highlights imported without one.
    pub fn default_highlight() -> Self {
        Self(SmolStr::new_static("#ffff00"))
    }
}

impl FromStr for HexColor {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for HexColor {
    type Error = EditorError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<HexColor> for String {
    fn from(c: HexColor) -> Self {
        c.0.to_string()
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-block text alignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    Center,
    Right,
    Justify,
}

impl TextAlign {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
            Self::Justify => "justify",
        }
    }

    pub fn from_css(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" | "start" => Some(Self::Left),
            "center" => Some(Self::Center),
            "right" | "end" => Some(Self::Right),
            "justify" => Some(Self::Justify),
            _ => None,
        }
    }
}

/// Discriminant of a `Mark`, used for removal and activity queries.
///
/// Declaration order is nesting order: earlier types wrap later ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MarkType {
    Link,
    Bold,
    Italic,
    Underline,
    Strike,
    Color,
    Highlight,
}

/// An inline formatting attribute attached to a run of text.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Mark {
    Bold,
    Italic,
    Underline,
    Strike,
    Link {
        href: SmolStr,
        target: Option<SmolStr>,
    },
    Color(HexColor),
    Highlight(HexColor),
}

impl Mark {
    pub fn link(href: impl Into<SmolStr>) -> Self {
        Self::Link {
            href: href.into(),
            target: None,
        }
    }

    pub fn mark_type(&self) -> MarkType {
        match self {
            Self::Bold => MarkType::Bold,
            Self::Italic => MarkType::Italic,
            Self::Underline => MarkType::Underline,
            Self::Strike => MarkType::Strike,
            Self::Link { .. } => MarkType::Link,
            Self::Color(_) => MarkType::Color,
            Self::Highlight(_) => MarkType::Highlight,
        }
    }
}

/// Sorted set of marks, unique by `MarkType`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct MarkSet(Vec<Mark>);

impl MarkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mark> {
        self.0.iter()
    }

    /// Get the mark of the given type, if present.
    pub fn get(&self, ty: MarkType) -> Option<&Mark> {
        self.0.iter().find(|m| m.mark_type() == ty)
    }

    pub fn has(&self, ty: MarkType) -> bool {
        self.get(ty).is_some()
    }

    /// Exact match, including attributes.
    pub fn contains(&self, mark: &Mark) -> bool {
        self.0.iter().any(|m| m == mark)
    }

    /// Insert a mark, replacing any existing mark of the same type.
    /// Returns true if the set changed.
    pub fn insert(&mut self, mark: Mark) -> bool {
        let ty = mark.mark_type();
        match self.0.binary_search_by(|m| m.mark_type().cmp(&ty)) {
            Ok(idx) => {
                if self.0[idx] == mark {
                    false
                } else {
                    self.0[idx] = mark;
                    true
                }
            }
            Err(idx) => {
                self.0.insert(idx, mark);
                true
            }
        }
    }

    /// Remove the mark of the given type. Returns true if the set changed.
    pub fn remove(&mut self, ty: MarkType) -> bool {
        let before = self.0.len();
        self.0.retain(|m| m.mark_type() != ty);
        before != self.0.len()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn with(mut self, mark: Mark) -> Self {
        self.insert(mark);
        self
    }
}

impl FromIterator<Mark> for MarkSet {
    fn from_iter<I: IntoIterator<Item = Mark>>(iter: I) -> Self {
        let mut set = MarkSet::new();
        for mark in iter {
            set.insert(mark);
        }
        set
    }
}

impl<'a> IntoIterator for &'a MarkSet {
    type Item = &'a Mark;
    type IntoIter = std::slice::Iter<'a, Mark>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markset_order_independent() {
        let a: MarkSet = [Mark::Italic, Mark::Bold, Mark::link("/x")]
            .into_iter()
            .collect();
        let b: MarkSet = [Mark::link("/x"), Mark::Bold, Mark::Italic]
            .into_iter()
            .collect();
        assert_eq!(a, b);
        assert_eq!(a.iter().next().map(Mark::mark_type), Some(MarkType::Link));
    }

    #[test]
    fn test_markset_insert_replaces_same_type() {
        let mut set = MarkSet::new();
        let red = HexColor::parse("#f00").unwrap();
        let blue = HexColor::parse("#0000FF").unwrap();
        assert!(set.insert(Mark::Color(red)));
        assert!(set.insert(Mark::Color(blue.clone())));
        assert!(!set.insert(Mark::Color(blue.clone())));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(MarkType::Color), Some(&Mark::Color(blue)));
    }

    #[test]
    fn test_markset_remove() {
        let mut set = MarkSet::new().with(Mark::Bold).with(Mark::Strike);
        assert!(set.remove(MarkType::Bold));
        assert!(!set.remove(MarkType::Bold));
        assert!(set.has(MarkType::Strike));
    }

    #[test]
    fn test_hex_color_parse() {
        assert_eq!(HexColor::parse("#ABCDEF").unwrap().as_str(), "#abcdef");
        assert!(HexColor::parse("#abc").is_ok());
        assert!(HexColor::parse("abc").is_err());
        assert!(HexColor::parse("#abcd").is_err());
        assert!(HexColor::parse("#ggg").is_err());
    }

    #[test]
    fn test_text_align_from_css() {
        assert_eq!(TextAlign::from_css(" Center "), Some(TextAlign::Center));
        assert_eq!(TextAlign::from_css("start"), Some(TextAlign::Left));
        assert_eq!(TextAlign::from_css("middle"), None);
    }
}
