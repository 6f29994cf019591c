//! Task status model.
//!
//! # Responsibility
//! - Define the closed set of task states shared by task notes and boards.
//! - Distinguish board lists that map to a state from the archive list.
//!
//! # Invariants
//! - `TaskStatus::ALL` lists every state exactly once, in board order.
//! - Serialized names are the variant names (`Active`, `Waiting`, ...).

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Being worked on.
    Active,
    /// Blocked on someone or something else.
    Waiting,
    /// Planned, not started.
    Later,
    /// Not planned yet.
    Someday,
    /// Finished.
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Active,
        TaskStatus::Waiting,
        TaskStatus::Later,
        TaskStatus::Someday,
        TaskStatus::Done,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Waiting => "Waiting",
            Self::Later => "Later",
            Self::Someday => "Someday",
            Self::Done => "Done",
        }
    }
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when text does not name a `TaskStatus`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl Display for UnknownStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown task status `{}`", self.0)
    }
}

impl Error for UnknownStatus {}

impl FromStr for TaskStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownStatus(trimmed.to_string()))
    }
}

/// Status carried by one board list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListStatus {
    Task(TaskStatus),
    /// Retired cards; not part of the task state set.
    Archive,
}

impl ListStatus {
    pub fn task_status(self) -> Option<TaskStatus> {
        match self {
            Self::Task(status) => Some(status),
            Self::Archive => None,
        }
    }

    pub fn is_archive(self) -> bool {
        matches!(self, Self::Archive)
    }
}

impl From<TaskStatus> for ListStatus {
    fn from(status: TaskStatus) -> Self {
        Self::Task(status)
    }
}

impl Display for ListStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Task(status) => write!(f, "{status}"),
            Self::Archive => f.write_str("Archive"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ListStatus, TaskStatus, UnknownStatus};

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("done".parse::<TaskStatus>(), Ok(TaskStatus::Done));
        assert_eq!(" Waiting ".parse::<TaskStatus>(), Ok(TaskStatus::Waiting));
        assert_eq!(
            "blocked".parse::<TaskStatus>(),
            Err(UnknownStatus("blocked".to_string()))
        );
    }

    #[test]
    fn archive_has_no_task_status() {
        assert_eq!(ListStatus::Archive.task_status(), None);
        assert_eq!(
            ListStatus::from(TaskStatus::Later).task_status(),
            Some(TaskStatus::Later)
        );
    }
}
