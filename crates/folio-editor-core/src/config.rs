use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EditorError;
use crate::undo::{DEFAULT_CAPACITY, DEFAULT_COALESCE_WINDOW, History};

/// Tunables for an editing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Maximum number of undo steps kept.
    pub history_capacity: usize,
    /// Idle window, in milliseconds, within which typing merges into one
    /// undo step.
    pub coalesce_window_ms: u64,
    /// MIME types accepted by the image upload pipeline.
    pub allowed_image_types: Vec<String>,
    /// Soft limit shown by the character counter. Never enforced.
    pub character_limit: Option<usize>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_CAPACITY,
            coalesce_window_ms: DEFAULT_COALESCE_WINDOW.as_millis() as u64,
            allowed_image_types: ["image/png", "image/jpg", "image/jpeg", "image/webp"]
                .map(String::from)
                .to_vec(),
            character_limit: None,
        }
    }
}

impl EditorConfig {
    pub fn validate(&self) -> Result<(), EditorError> {
        if self.history_capacity == 0 {
            return Err(EditorError::InvalidConfig(
                "history_capacity must be at least 1".into(),
            ));
        }
        if self.character_limit == Some(0) {
            return Err(EditorError::InvalidConfig(
                "character_limit must be positive when set".into(),
            ));
        }
        Ok(())
    }

    pub fn coalesce_window(&self) -> Duration {
        Duration::from_millis(self.coalesce_window_ms)
    }

    /// An empty history with these limits.
    pub fn history(&self) -> History {
        History::new(self.history_capacity, self.coalesce_window())
    }
}
