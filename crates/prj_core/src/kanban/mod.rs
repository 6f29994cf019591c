//! Kanban board documents.
//!
//! # Responsibility
//! - Parse kanban markdown into lists and cards (`parser`, `lexer`).
//! - Move cards between status lists (`model`) and regenerate the document
//!   (`generator`).
//! - Synchronize card placement with task note statuses (`sync`).
//!
//! # Invariants
//! - Regenerating an unmodified board reproduces the source text exactly.
//! - Parse and sync problems are logged and degrade to no-ops.
//!
//! # See also
//! - `service::kanban_sync_service` for event wiring.

pub mod generator;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod sync;

use std::error::Error;
use std::fmt::{Display, Formatter};

pub use generator::KanbanMarkdownGenerator;
pub use model::{CardId, KanbanBoard, KanbanCard, KanbanList};
pub use parser::{parse_board, KanbanParser};
pub use sync::{KanbanSync, SkipReason, SyncDirection, SyncOutcome};

/// Structural problems that make a document un-syncable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KanbanParseError {
    MissingFrontmatter,
    UnterminatedFrontmatter,
    MissingSettings,
    UnterminatedSettings,
}

impl Display for KanbanParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingFrontmatter => write!(f, "document does not start with frontmatter"),
            Self::UnterminatedFrontmatter => write!(f, "frontmatter block is not closed"),
            Self::MissingSettings => write!(f, "kanban settings block is missing"),
            Self::UnterminatedSettings => write!(f, "kanban settings block is not closed"),
        }
    }
}

impl Error for KanbanParseError {}
