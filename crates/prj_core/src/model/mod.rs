//! Domain model shared by task notes and kanban boards.
//!
//! # Responsibility
//! - Define the task status value objects used across sync directions.

pub mod status;
