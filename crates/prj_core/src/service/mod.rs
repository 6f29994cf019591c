//! Core use-case services.
//!
//! # Responsibility
//! - Turn host notifications into kanban sync runs.
//! - Keep CLI callers decoupled from parser and sync details.

pub mod kanban_sync_service;
