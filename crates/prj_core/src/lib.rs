//! Core logic for PRJ project and task notes.
//! Change tracking, transactional frontmatter writes and kanban board sync.

pub mod config;
pub mod i18n;
pub mod kanban;
pub mod logging;
pub mod model;
pub mod service;
pub mod task;
pub mod tracking;
pub mod transaction;
pub mod vault;

pub use config::{ConfigError, KanbanConfig};
pub use i18n::{LocaleTranslator, StatusTranslator};
pub use kanban::{
    parse_board, CardId, KanbanBoard, KanbanCard, KanbanList, KanbanMarkdownGenerator,
    KanbanParseError, KanbanParser, KanbanSync, SkipReason, SyncDirection, SyncOutcome,
};
pub use logging::{active_logging, init_logging, LogLevel, LogTarget, LoggingConfig, LoggingError};
pub use model::status::{ListStatus, TaskStatus};
pub use service::kanban_sync_service::KanbanSyncService;
pub use task::{TaskNote, VaultTaskSource};
pub use tracking::proxy::{
    Field, PrivateKeys, ProxyError, ProxyHandler, ProxyResult, TrackedObject,
};
pub use tracking::value::{Node, Value};
pub use transaction::{ChangeSet, PendingWrite, TransactionModel, WriteChanges, WriteError};
pub use vault::fs::FsVault;
pub use vault::{FileRef, VaultError, VaultResult, VaultServices};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
