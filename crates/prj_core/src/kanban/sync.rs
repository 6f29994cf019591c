//! Board/task status synchronization.
//!
//! # Responsibility
//! - Outbound: push each card's list status into its linked task note.
//! - Inbound: move the card of one changed task note to the note's status
//!   and write the board back when it changed.
//!
//! # Invariants
//! - The board document is written only when a card actually moved.
//! - Failures are logged and reported as `SyncOutcome::Skipped`.

use super::generator::KanbanMarkdownGenerator;
use super::model::KanbanBoard;
use super::parser::KanbanParser;
use crate::model::status::TaskStatus;
use crate::tracking::proxy::ProxyResult;
use crate::vault::{FileRef, TaskRecord, VaultServices};
use log::{debug, error, info, warn};
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

/// Which side of the sync is the source of truth.
pub enum SyncDirection {
    /// Board to tasks.
    Out,
    /// One task to the board.
    In {
        task_file: FileRef,
        record: Rc<dyn TaskRecord>,
    },
}

impl Debug for SyncDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Out => f.write_str("Out"),
            Self::In { task_file, .. } => f
                .debug_struct("In")
                .field("task_file", task_file)
                .finish_non_exhaustive(),
        }
    }
}

/// Result of one sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Outbound sync touched this many task records.
    Updated { records: usize },
    /// Inbound sync moved a card and wrote the board.
    Written,
    /// Inbound sync found the card already in place.
    Unchanged,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Document could not be read or parsed.
    Unparsable,
    /// File is not a kanban document.
    NotKanban,
    /// No card links to the changed task.
    CardNotFound,
    /// Changed task carries no known status.
    NoStatus,
    WriteFailed(String),
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unparsable => f.write_str("unparsable"),
            Self::NotKanban => f.write_str("not_kanban"),
            Self::CardNotFound => f.write_str("card_not_found"),
            Self::NoStatus => f.write_str("no_status"),
            Self::WriteFailed(message) => write!(f, "write_failed: {message}"),
        }
    }
}

/// One sync run over one kanban document.
pub struct KanbanSync {
    services: VaultServices,
    file: FileRef,
    direction: SyncDirection,
    parser: KanbanParser,
}

impl KanbanSync {
    pub fn new(services: VaultServices, file: FileRef, direction: SyncDirection) -> Self {
        let parser = KanbanParser::new(services.clone(), file.clone());
        Self {
            services,
            file,
            direction,
            parser,
        }
    }

    pub fn direction(&self) -> &SyncDirection {
        &self.direction
    }

    pub fn sync(&mut self) -> SyncOutcome {
        let Some(mut board) = self.parser.parse() else {
            return self.skipped(SkipReason::Unparsable);
        };
        match &self.direction {
            SyncDirection::Out => self.sync_out(&board),
            SyncDirection::In { task_file, record } => {
                self.sync_in(&mut board, task_file, record.as_ref())
            }
        }
    }

    fn sync_out(&self, board: &KanbanBoard) -> SyncOutcome {
        let tags = self
            .services
            .metadata
            .frontmatter(&self.file)
            .map(|frontmatter| frontmatter.tags)
            .unwrap_or_default();

        let mut records = 0;
        for status in TaskStatus::ALL {
            for card in board.cards_with_status(status) {
                let Some(task_file) = card.linked_file.as_ref() else {
                    continue;
                };
                let Some(record) = self.services.tasks.task_for(task_file) else {
                    debug!(
                        "event=kanban_sync module=kanban status=skipped reason=not_a_task board={} task={}",
                        self.file, task_file
                    );
                    continue;
                };

                record.start_transaction();
                if record.title().is_none() {
                    self.log_failure(task_file, record.set_title(task_file.basename()));
                    self.log_failure(task_file, record.set_tags(&tags));
                }
                if record.status() != Some(status) {
                    self.log_failure(task_file, record.set_status(status));
                }
                record.finish_transaction();
                records += 1;
            }
        }

        info!(
            "event=kanban_sync module=kanban status=ok direction=out board={} records={}",
            self.file, records
        );
        SyncOutcome::Updated { records }
    }

    fn sync_in(
        &self,
        board: &mut KanbanBoard,
        task_file: &FileRef,
        record: &dyn TaskRecord,
    ) -> SyncOutcome {
        let Some(card_id) = board.card_for_file(task_file).map(|card| card.id) else {
            return self.skipped(SkipReason::CardNotFound);
        };
        let Some(status) = record.status() else {
            return self.skipped(SkipReason::NoStatus);
        };

        board.move_card_to_status(card_id, status);
        if !board.is_changed() {
            debug!(
                "event=kanban_sync module=kanban status=unchanged direction=in board={} task={}",
                self.file, task_file
            );
            return SyncOutcome::Unchanged;
        }

        let text = KanbanMarkdownGenerator::new(board, self.services.links.as_ref()).generate();
        match self.services.store.write(&self.file, &text) {
            Ok(()) => {
                info!(
                    "event=kanban_sync module=kanban status=ok direction=in board={} task={} target={}",
                    self.file, task_file, status
                );
                SyncOutcome::Written
            }
            Err(err) => {
                error!(
                    "event=kanban_write module=kanban status=error board={} error={}",
                    self.file, err
                );
                SyncOutcome::Skipped(SkipReason::WriteFailed(err.to_string()))
            }
        }
    }

    fn skipped(&self, reason: SkipReason) -> SyncOutcome {
        warn!(
            "event=kanban_sync module=kanban status=skipped board={} reason={}",
            self.file, reason
        );
        SyncOutcome::Skipped(reason)
    }

    fn log_failure(&self, task_file: &FileRef, result: ProxyResult<()>) {
        if let Err(err) = result {
            error!(
                "event=kanban_sync module=kanban status=error board={} task={} error={}",
                self.file, task_file, err
            );
        }
    }
}
