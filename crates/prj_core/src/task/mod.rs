//! Frontmatter-backed task records.
//!
//! # Responsibility
//! - Expose a task note's frontmatter as a tracked object.
//! - Route tracked changes through a `TransactionModel` whose writer merges
//!   them back into the note's frontmatter.
//!
//! # Invariants
//! - Writes are ordered per note: each write awaits the previous one.
//! - The note body below the frontmatter is never modified.
//! - Empty change-sets do not touch the document.

use crate::config::KanbanConfig;
use crate::model::status::TaskStatus;
use crate::tracking::proxy::{Field, PrivateKeys, ProxyHandler, ProxyResult, TrackedObject};
use crate::tracking::value::Value;
use crate::transaction::{ChangeSet, PendingWrite, TransactionModel, WriteChanges, WriteError};
use crate::vault::frontmatter::{apply_change_set, frontmatter_map, replace_frontmatter};
use crate::vault::{
    DocumentStore, FileRef, MetadataCache, TaskRecord, TaskRecordSource, VaultError, VaultResult,
};
use futures::FutureExt;
use log::{debug, warn};
use serde_json::Value as JsonValue;
use std::rc::Rc;

/// Task note whose frontmatter is tracked and written back on change.
pub struct TaskNote {
    file: FileRef,
    data: TrackedObject,
    transaction: Rc<TransactionModel>,
    _handler: ProxyHandler,
}

impl TaskNote {
    /// Loads the frontmatter of `file` and starts tracking it.
    ///
    /// # Errors
    /// - Propagates read failures and malformed frontmatter.
    pub fn load(
        store: Rc<dyn DocumentStore>,
        file: FileRef,
        private_keys: PrivateKeys,
    ) -> VaultResult<Self> {
        let text = store.read(&file)?;
        let root = Value::from(JsonValue::Object(frontmatter_map(&text, &file)?));

        let transaction = Rc::new(TransactionModel::new(Some(frontmatter_writer(
            store,
            file.clone(),
        ))));
        let handler =
            ProxyHandler::with_private_keys(Rc::clone(&transaction).sink(), private_keys);
        let data = handler
            .create_proxy(&root)
            .map_err(|err| VaultError::InvalidFrontmatter {
                path: file.path().to_string(),
                message: err.to_string(),
            })?;

        Ok(Self {
            file,
            data,
            transaction,
            _handler: handler,
        })
    }

    pub fn file(&self) -> &FileRef {
        &self.file
    }

    /// Tracked frontmatter root.
    pub fn data(&self) -> &TrackedObject {
        &self.data
    }

    pub fn transaction(&self) -> &TransactionModel {
        &self.transaction
    }

    fn string_field(&self, key: &str) -> Option<String> {
        self.data
            .get(key)
            .and_then(|field| field.as_str().map(str::to_string))
            .filter(|value| !value.trim().is_empty())
    }
}

impl TaskRecord for TaskNote {
    fn title(&self) -> Option<String> {
        self.string_field("title")
    }

    fn set_title(&self, title: &str) -> ProxyResult<()> {
        self.data.set("title", title)
    }

    fn tags(&self) -> Vec<String> {
        match self.data.get("tags") {
            Some(Field::Object(tags)) => tags
                .to_json()
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|item| item.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default(),
            Some(field) => field.as_str().map(|tag| vec![tag.to_string()]).unwrap_or_default(),
            None => Vec::new(),
        }
    }

    fn set_tags(&self, tags: &[String]) -> ProxyResult<()> {
        let items = tags.iter().map(|tag| Value::from(tag.as_str())).collect::<Vec<_>>();
        self.data.set("tags", items)
    }

    fn status(&self) -> Option<TaskStatus> {
        self.string_field("status")?.parse().ok()
    }

    fn set_status(&self, status: TaskStatus) -> ProxyResult<()> {
        self.data.set("status", status.as_str())
    }

    fn start_transaction(&self) {
        self.transaction.start_transaction();
    }

    fn finish_transaction(&self) {
        self.transaction.finish_transaction();
    }
}

fn frontmatter_writer(store: Rc<dyn DocumentStore>, file: FileRef) -> WriteChanges {
    Box::new(move |changes: ChangeSet, previous: Option<PendingWrite>| {
        let store = Rc::clone(&store);
        let file = file.clone();
        async move {
            if let Some(previous) = previous {
                if let Err(err) = previous.await {
                    debug!(
                        "event=task_write module=task status=continue path={} previous_error={}",
                        file, err
                    );
                }
            }
            write_frontmatter_changes(store.as_ref(), &file, changes)
                .map_err(|err| WriteError::new(err.to_string()))
        }
        .boxed_local()
    })
}

fn write_frontmatter_changes(
    store: &dyn DocumentStore,
    file: &FileRef,
    changes: ChangeSet,
) -> VaultResult<()> {
    if changes.is_empty() {
        debug!("event=task_write module=task status=skipped reason=no_changes path={}", file);
        return Ok(());
    }
    let text = store.read(file)?;
    let mut map = frontmatter_map(&text, file)?;
    apply_change_set(&mut map, changes);
    let updated = replace_frontmatter(&text, &map, file)?;
    store.write(file, &updated)
}

/// Resolves task notes by their frontmatter `type`.
pub struct VaultTaskSource {
    store: Rc<dyn DocumentStore>,
    metadata: Rc<dyn MetadataCache>,
    task_type: String,
    private_keys: PrivateKeys,
}

impl VaultTaskSource {
    pub fn new(
        store: Rc<dyn DocumentStore>,
        metadata: Rc<dyn MetadataCache>,
        config: &KanbanConfig,
    ) -> Self {
        Self {
            store,
            metadata,
            task_type: config.task_type.clone(),
            private_keys: config.private_keys(),
        }
    }
}

impl TaskRecordSource for VaultTaskSource {
    fn task_for(&self, file: &FileRef) -> Option<Rc<dyn TaskRecord>> {
        let frontmatter = self.metadata.frontmatter(file)?;
        if frontmatter.kind.as_deref() != Some(self.task_type.as_str()) {
            return None;
        }
        match TaskNote::load(
            Rc::clone(&self.store),
            file.clone(),
            self.private_keys.clone(),
        ) {
            Ok(note) => Some(Rc::new(note)),
            Err(err) => {
                warn!(
                    "event=task_load module=task status=error path={} error={}",
                    file, err
                );
                None
            }
        }
    }
}
