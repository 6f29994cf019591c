//! Kanban sync use-case service.
//!
//! # Responsibility
//! - React to "task file changed" by syncing every kanban board linking to it.
//! - React to "kanban document changed" by pushing statuses to its tasks.
//!
//! # Invariants
//! - Only documents whose frontmatter `subType` matches the configured
//!   kanban marker are treated as boards.
//! - Each board is synced independently; one failure never stops the rest.

use crate::kanban::{KanbanSync, SkipReason, SyncDirection, SyncOutcome};
use crate::vault::{FileRef, VaultServices};
use log::debug;

/// Event entry points for kanban synchronization.
pub struct KanbanSyncService {
    services: VaultServices,
}

impl KanbanSyncService {
    pub fn new(services: VaultServices) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &VaultServices {
        &self.services
    }

    /// Whether `file` declares itself a kanban document.
    pub fn is_kanban_file(&self, file: &FileRef) -> bool {
        self.services
            .metadata
            .frontmatter(file)
            .and_then(|frontmatter| frontmatter.sub_type)
            .is_some_and(|sub_type| sub_type == self.services.config.kanban_sub_type)
    }

    /// Kanban documents linking to `file`.
    pub fn kanban_boards_linking(&self, file: &FileRef) -> Vec<FileRef> {
        self.services
            .backlinks
            .backlinks(file)
            .into_iter()
            .filter(|candidate| self.is_kanban_file(candidate))
            .collect()
    }

    /// Moves the card of a changed task on every board linking to it.
    ///
    /// Returns one outcome per board; empty when `file` is not a task note.
    pub fn on_task_file_changed(&self, file: &FileRef) -> Vec<(FileRef, SyncOutcome)> {
        let Some(record) = self.services.tasks.task_for(file) else {
            debug!(
                "event=task_changed module=service status=skipped reason=not_a_task path={}",
                file
            );
            return Vec::new();
        };

        let boards = self.kanban_boards_linking(file);
        debug!(
            "event=task_changed module=service status=ok path={} boards={}",
            file,
            boards.len()
        );
        boards
            .into_iter()
            .map(|board| {
                let direction = SyncDirection::In {
                    task_file: file.clone(),
                    record: record.clone(),
                };
                let outcome =
                    KanbanSync::new(self.services.clone(), board.clone(), direction).sync();
                (board, outcome)
            })
            .collect()
    }

    /// Pushes card statuses of a changed board to its task notes.
    pub fn on_kanban_changed(&self, file: &FileRef) -> SyncOutcome {
        if !self.is_kanban_file(file) {
            debug!(
                "event=kanban_changed module=service status=skipped reason=not_kanban path={}",
                file
            );
            return SyncOutcome::Skipped(SkipReason::NotKanban);
        }
        KanbanSync::new(self.services.clone(), file.clone(), SyncDirection::Out).sync()
    }
}
