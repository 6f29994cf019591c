//! Vault collaborator contracts.
//!
//! # Responsibility
//! - Define the narrow host services the core consumes: document I/O, link
//!   resolution, backlinks, frontmatter metadata and task record access.
//! - Bundle those services for the kanban engine (`VaultServices`).
//!
//! # Invariants
//! - `FileRef` paths are vault-relative and `/`-separated.
//! - Lookups return `None` instead of failing when a file is unknown.
//!
//! # See also
//! - `vault::fs` for the directory-backed implementation.

pub mod frontmatter;
pub mod fs;
pub mod wikilink;

use crate::config::KanbanConfig;
use crate::i18n::{LocaleTranslator, StatusTranslator};
use crate::model::status::TaskStatus;
use crate::tracking::proxy::ProxyResult;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

pub use frontmatter::Frontmatter;
pub use wikilink::WikiLink;

pub type VaultResult<T> = Result<T, VaultError>;

/// Vault-relative reference to one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileRef {
    path: String,
}

impl FileRef {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into().replace('\\', "/");
        Self {
            path: path.trim_start_matches('/').to_string(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// File name without directory and extension.
    pub fn basename(&self) -> &str {
        let name = self.name();
        match name.rfind('.') {
            Some(index) if index > 0 => &name[..index],
            _ => name,
        }
    }

    /// File name without directory.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(self.path.as_str())
    }

    pub fn extension(&self) -> Option<&str> {
        let name = self.name();
        match name.rfind('.') {
            Some(index) if index > 0 => Some(&name[index + 1..]),
            _ => None,
        }
    }

    /// Directory part, empty for files at the vault root.
    pub fn parent(&self) -> &str {
        match self.path.rfind('/') {
            Some(index) => &self.path[..index],
            None => "",
        }
    }

    /// Path without the `.md` extension.
    pub fn path_without_markdown_extension(&self) -> &str {
        self.path.strip_suffix(".md").unwrap_or(self.path.as_str())
    }
}

impl Display for FileRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path)
    }
}

/// Errors from vault storage and metadata access.
#[derive(Debug)]
pub enum VaultError {
    NotFound(String),
    Io {
        path: String,
        source: std::io::Error,
    },
    InvalidFrontmatter {
        path: String,
        message: String,
    },
}

impl Display for VaultError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "document not found: {path}"),
            Self::Io { path, source } => write!(f, "io error on `{path}`: {source}"),
            Self::InvalidFrontmatter { path, message } => {
                write!(f, "invalid frontmatter in `{path}`: {message}")
            }
        }
    }
}

impl Error for VaultError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::NotFound(_) | Self::InvalidFrontmatter { .. } => None,
        }
    }
}

/// Reads and writes whole documents.
pub trait DocumentStore {
    fn read(&self, file: &FileRef) -> VaultResult<String>;
    fn write(&self, file: &FileRef, text: &str) -> VaultResult<()>;
}

/// Resolves wikilink text to documents and back.
pub trait LinkResolver {
    /// Resolves `link_text` as written inside `context`.
    fn resolve_link(&self, link_text: &str, context: &FileRef) -> Option<FileRef>;
    /// Shortest link text that resolves to `file` from `context`.
    fn link_text_for(&self, file: &FileRef, context: &FileRef) -> String;
}

/// Lists documents linking to a file.
pub trait BacklinkIndex {
    fn backlinks(&self, file: &FileRef) -> Vec<FileRef>;
}

/// Frontmatter lookup.
pub trait MetadataCache {
    fn frontmatter(&self, file: &FileRef) -> Option<Frontmatter>;
}

/// Task-like record with a status and transaction controls.
pub trait TaskRecord {
    fn title(&self) -> Option<String>;
    fn set_title(&self, title: &str) -> ProxyResult<()>;
    fn tags(&self) -> Vec<String>;
    fn set_tags(&self, tags: &[String]) -> ProxyResult<()>;
    fn status(&self) -> Option<TaskStatus>;
    fn set_status(&self, status: TaskStatus) -> ProxyResult<()>;
    fn start_transaction(&self);
    fn finish_transaction(&self);
}

/// Looks up the task record behind a file, if the file is one.
pub trait TaskRecordSource {
    fn task_for(&self, file: &FileRef) -> Option<Rc<dyn TaskRecord>>;
}

/// Collaborators used by the kanban engine.
#[derive(Clone)]
pub struct VaultServices {
    pub store: Rc<dyn DocumentStore>,
    pub links: Rc<dyn LinkResolver>,
    pub backlinks: Rc<dyn BacklinkIndex>,
    pub metadata: Rc<dyn MetadataCache>,
    pub translator: Rc<dyn StatusTranslator>,
    pub tasks: Rc<dyn TaskRecordSource>,
    pub config: Rc<KanbanConfig>,
}

impl VaultServices {
    /// Wires every vault-side service to one vault implementation.
    ///
    /// The translator is built from `config.locales`.
    pub fn from_vault<V>(vault: Rc<V>, tasks: Rc<dyn TaskRecordSource>, config: KanbanConfig) -> Self
    where
        V: DocumentStore + LinkResolver + BacklinkIndex + MetadataCache + 'static,
    {
        let translator = LocaleTranslator::new(&config.locales);
        Self {
            store: vault.clone(),
            links: vault.clone(),
            backlinks: vault.clone(),
            metadata: vault,
            translator: Rc::new(translator),
            tasks,
            config: Rc::new(config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FileRef;

    #[test]
    fn file_ref_splits_name_parts() {
        let file = FileRef::new("/Projects/Alpha/Task 1.md");
        assert_eq!(file.path(), "Projects/Alpha/Task 1.md");
        assert_eq!(file.name(), "Task 1.md");
        assert_eq!(file.basename(), "Task 1");
        assert_eq!(file.extension(), Some("md"));
        assert_eq!(file.parent(), "Projects/Alpha");
        assert_eq!(file.path_without_markdown_extension(), "Projects/Alpha/Task 1");
    }

    #[test]
    fn file_ref_at_root_has_empty_parent() {
        let file = FileRef::new("Board.md");
        assert_eq!(file.parent(), "");
        assert_eq!(FileRef::new(".hidden").basename(), ".hidden");
    }
}
