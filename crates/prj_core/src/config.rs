//! Runtime configuration for board parsing and sync.
//!
//! # Responsibility
//! - Hold markers and locale choices consumed by the kanban engine.
//! - Load configuration from JSON; missing fields fall back to defaults.
//!
//! # Invariants
//! - Configuration is read-only at runtime; nothing here writes it back.

use crate::tracking::proxy::PrivateKeys;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Kanban and task-note settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KanbanConfig {
    /// Locales whose headings translate to statuses, in priority order.
    pub locales: Vec<String>,
    /// Heading text of the archive list.
    pub archive_marker: String,
    /// Text that marks a list as holding completed cards.
    pub completed_marker: String,
    /// Frontmatter `subType` identifying kanban documents.
    pub kanban_sub_type: String,
    /// Frontmatter `type` identifying task notes.
    pub task_type: String,
    /// Frontmatter keys with this prefix are stored without tracking.
    pub private_key_prefix: Option<String>,
}

impl Default for KanbanConfig {
    fn default() -> Self {
        Self {
            locales: vec!["en".to_string(), "de".to_string()],
            archive_marker: "Archiv".to_string(),
            completed_marker: "**Fertiggestellt**".to_string(),
            kanban_sub_type: "Kanban".to_string(),
            task_type: "Task".to_string(),
            private_key_prefix: Some("_".to_string()),
        }
    }
}

impl KanbanConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(ConfigError::Parse)
    }

    /// Loads configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Private-key policy for tracked task frontmatter.
    pub fn private_keys(&self) -> PrivateKeys {
        match self.private_key_prefix.as_deref() {
            Some(prefix) => PrivateKeys::with_prefix(prefix),
            None => PrivateKeys::none(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::KanbanConfig;

    #[test]
    fn partial_json_keeps_defaults_for_missing_fields() {
        let config = KanbanConfig::from_json_str(r#"{"archive_marker": "Archive"}"#)
            .expect("partial config should parse");
        assert_eq!(config.archive_marker, "Archive");
        assert_eq!(config.completed_marker, "**Fertiggestellt**");
        assert_eq!(config.locales, vec!["en", "de"]);
    }

    #[test]
    fn null_prefix_disables_private_keys() {
        let config = KanbanConfig::from_json_str(r#"{"private_key_prefix": null}"#)
            .expect("config should parse");
        assert!(!config.private_keys().is_private("_file"));
        assert!(KanbanConfig::default().private_keys().is_private("_file"));
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = KanbanConfig::from_json_str("{").expect_err("malformed config must fail");
        assert!(err.to_string().contains("invalid config"));
    }
}
