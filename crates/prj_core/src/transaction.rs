//! Path-keyed change buffer with transactional flushes.
//!
//! # Responsibility
//! - Merge dotted-path updates into one nested change-set.
//! - Flush the change-set to an external writer, either immediately or when
//!   an explicit transaction is finished.
//! - Hand each writer call the previous pending write so writes stay ordered.
//!
//! # Invariants
//! - Without a writer the model starts (and stays) active; changes are kept.
//! - A flush clears `changes` before the write completes.
//! - Write failures are logged, never returned to the mutating caller.
//! - A finished transaction is not reopened implicitly.
//! - A write is polled once when dispatched. A writer that does not finish
//!   on that first poll only makes progress while someone awaits
//!   `pending_write()`.

use crate::tracking::proxy::SinkError;
use crate::tracking::value::{list_index, LENGTH_KEY, MAX_LIST_LEN};
use futures::future::{FutureExt, LocalBoxFuture, Shared};
use log::{debug, error, warn};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::cell::{Cell, RefCell};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

/// Nested change-set: dotted paths expanded into objects.
pub type ChangeSet = JsonMap<String, JsonValue>;

pub type WriteResult = Result<(), WriteError>;

/// Shared handle to an in-flight (or finished) write.
pub type PendingWrite = Shared<LocalBoxFuture<'static, WriteResult>>;

/// External persistence function.
///
/// Receives the accumulated change-set and the previous pending write, which
/// it should await before touching storage.
pub type WriteChanges =
    Box<dyn Fn(ChangeSet, Option<PendingWrite>) -> LocalBoxFuture<'static, WriteResult>>;

/// Failure reported by a writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteError {
    message: String,
}

impl WriteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for WriteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "write failed: {}", self.message)
    }
}

impl Error for WriteError {}

/// Change buffer shared between a tracked record and its writer.
pub struct TransactionModel {
    changes: RefCell<ChangeSet>,
    active: Cell<bool>,
    write_changes: RefCell<Option<WriteChanges>>,
    pending_write: RefCell<Option<PendingWrite>>,
}

impl TransactionModel {
    /// Creates a model; it is active exactly when no writer is supplied.
    pub fn new(write_changes: Option<WriteChanges>) -> Self {
        Self {
            changes: RefCell::new(ChangeSet::new()),
            active: Cell::new(write_changes.is_none()),
            write_changes: RefCell::new(write_changes),
            pending_write: RefCell::new(None),
        }
    }

    pub fn is_transaction_active(&self) -> bool {
        self.active.get()
    }

    /// Snapshot of changes not yet flushed.
    pub fn changes(&self) -> ChangeSet {
        self.changes.borrow().clone()
    }

    /// Most recently dispatched write, if any.
    ///
    /// The model polls each write once and never again. Callers whose writer
    /// awaits real I/O must await this handle (or a later one, which chains
    /// on it) to drive the write to completion.
    pub fn pending_write(&self) -> Option<PendingWrite> {
        self.pending_write.borrow().clone()
    }

    pub fn start_transaction(&self) {
        if self.active.get() {
            warn!("event=transaction_start module=transaction status=skipped reason=already_active");
            return;
        }
        self.active.set(true);
    }

    /// Flushes buffered changes and closes the transaction.
    ///
    /// Stays active when no writer is configured.
    pub fn finish_transaction(&self) {
        if !self.active.get() {
            warn!("event=transaction_finish module=transaction status=skipped reason=not_active");
            return;
        }
        if self.call_write_changes() {
            self.active.set(false);
        }
    }

    /// Discards buffered changes without calling the writer.
    pub fn abort_transaction(&self) {
        if !self.active.get() || self.write_changes.borrow().is_none() {
            warn!(
                "event=transaction_abort module=transaction status=skipped active={} has_writer={}",
                self.active.get(),
                self.write_changes.borrow().is_some()
            );
            return;
        }
        self.changes.borrow_mut().clear();
        self.active.set(false);
    }

    /// Installs or replaces the writer.
    ///
    /// An open transaction is finished when it holds changes and aborted
    /// when it is empty.
    pub fn set_write_changes(&self, write_changes: WriteChanges) {
        *self.write_changes.borrow_mut() = Some(write_changes);
        if !self.active.get() {
            return;
        }
        let has_changes = !self.changes.borrow().is_empty();
        if has_changes {
            self.finish_transaction();
        } else {
            self.abort_transaction();
        }
    }

    /// Merges `value` at dotted `path`; flushes at once outside a transaction.
    pub fn update_key_value(&self, path: &str, value: JsonValue) {
        merge_at_path(&mut self.changes.borrow_mut(), path, value);
        if !self.active.get() {
            self.call_write_changes();
        }
    }

    /// Returns a proxy sink that feeds this model.
    pub fn sink(self: Rc<Self>) -> impl Fn(&str, JsonValue) -> Result<(), SinkError> + 'static {
        move |path: &str, value: JsonValue| {
            self.update_key_value(path, value);
            Ok(())
        }
    }

    /// Dispatches the buffered change-set; returns whether a writer ran.
    fn call_write_changes(&self) -> bool {
        let pending = {
            let write_changes = self.write_changes.borrow();
            let Some(write_changes) = write_changes.as_ref() else {
                debug!("event=write_changes module=transaction status=deferred reason=no_writer");
                return false;
            };

            let changes = std::mem::take(&mut *self.changes.borrow_mut());
            let previous = self.pending_write.borrow_mut().take();
            let key_count = changes.len();
            let write = write_changes(changes, previous);
            let pending = async move {
                let result = write.await;
                match &result {
                    Ok(()) => debug!(
                        "event=write_changes module=transaction status=ok keys={}",
                        key_count
                    ),
                    Err(err) => error!(
                        "event=write_changes module=transaction status=error keys={} error={}",
                        key_count, err
                    ),
                }
                result
            }
            .boxed_local()
            .shared();
            *self.pending_write.borrow_mut() = Some(pending.clone());
            pending
        };

        // Start the write now; later awaits only pick up the result.
        let _ = pending.now_or_never();
        true
    }
}

impl Debug for TransactionModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionModel")
            .field("changes", &self.changes.borrow())
            .field("active", &self.active.get())
            .field("has_writer", &self.write_changes.borrow().is_some())
            .field("has_pending_write", &self.pending_write.borrow().is_some())
            .finish()
    }
}

fn merge_at_path(changes: &mut ChangeSet, path: &str, value: JsonValue) {
    let segments: Vec<&str> = path.split('.').collect();
    let mut root = JsonValue::Object(std::mem::take(changes));
    merge_into(&mut root, &segments, value);
    if let JsonValue::Object(map) = root {
        *changes = map;
    }
}

/// Merges `value` below `target` along `segments`.
///
/// Buffered lists stay lists: index and `length` segments write into them.
/// Only scalar parents are replaced by an empty map.
fn merge_into(target: &mut JsonValue, segments: &[&str], value: JsonValue) {
    let Some((key, rest)) = segments.split_first() else {
        deep_merge(target, value);
        return;
    };
    if !target.is_object() && !target.is_array() {
        *target = JsonValue::Object(JsonMap::new());
    }

    if let JsonValue::Array(items) = target {
        if *key == LENGTH_KEY && rest.is_empty() {
            match value
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .filter(|length| *length <= MAX_LIST_LEN)
            {
                Some(length) => items.resize(length, JsonValue::Null),
                None => warn!(
                    "event=change_merge module=transaction status=skipped reason=invalid_length path={}",
                    segments.join(".")
                ),
            }
            return;
        }
    }

    match child_slot(target, key) {
        Some(slot) => merge_into(slot, rest, value),
        None => warn!(
            "event=change_merge module=transaction status=skipped reason=invalid_index key={}",
            key
        ),
    }
}

fn child_slot<'a>(target: &'a mut JsonValue, key: &str) -> Option<&'a mut JsonValue> {
    match target {
        JsonValue::Object(map) => Some(map.entry(key.to_string()).or_insert(JsonValue::Null)),
        JsonValue::Array(items) => {
            let index = list_index(key)?;
            if index >= items.len() {
                items.resize(index + 1, JsonValue::Null);
            }
            items.get_mut(index)
        }
        _ => None,
    }
}

fn deep_merge(target: &mut JsonValue, value: JsonValue) {
    match (target, value) {
        (JsonValue::Object(target_map), JsonValue::Object(value_map)) => {
            for (key, value) in value_map {
                match target_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target_map.insert(key, value);
                    }
                }
            }
        }
        (target, value) => *target = value,
    }
}
