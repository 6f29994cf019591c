#![allow(dead_code)]

use prj_core::tracking::proxy::SinkError;
use prj_core::vault::frontmatter::parse_frontmatter;
use prj_core::vault::{
    BacklinkIndex, DocumentStore, FileRef, Frontmatter, LinkResolver, MetadataCache, VaultError,
    VaultResult, WikiLink,
};
use prj_core::{KanbanConfig, VaultServices, VaultTaskSource};
use serde_json::Value as JsonValue;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

pub const BOARD: &str = "Projects/Board.md";

pub const EXAMPLE_BOARD: &str = "---\nkanban-plugin: basic\ntype: Topic\nsubType: Kanban\ntags: project/alpha\n---\n\n## Active\n\n- [ ] [[Task1]]\n\n\n## Done\n\n**Fertiggestellt**\n\n\n%% kanban:settings\n```\n{\"kanban-plugin\":\"basic\"}\n```\n%%\n";

/// In-memory vault with write accounting.
#[derive(Default)]
pub struct MemoryVault {
    files: RefCell<BTreeMap<String, String>>,
    writes: Cell<usize>,
    fail_writes: Cell<bool>,
}

impl MemoryVault {
    pub fn with_files(files: &[(&str, &str)]) -> Rc<Self> {
        let vault = Self::default();
        for (path, text) in files {
            vault
                .files
                .borrow_mut()
                .insert((*path).to_string(), (*text).to_string());
        }
        Rc::new(vault)
    }

    pub fn text(&self, path: &str) -> String {
        self.files
            .borrow()
            .get(path)
            .cloned()
            .expect("fixture file should exist")
    }

    pub fn writes(&self) -> usize {
        self.writes.get()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    fn paths(&self) -> Vec<String> {
        self.files.borrow().keys().cloned().collect()
    }
}

impl DocumentStore for MemoryVault {
    fn read(&self, file: &FileRef) -> VaultResult<String> {
        self.files
            .borrow()
            .get(file.path())
            .cloned()
            .ok_or_else(|| VaultError::NotFound(file.path().to_string()))
    }

    fn write(&self, file: &FileRef, text: &str) -> VaultResult<()> {
        if self.fail_writes.get() {
            return Err(VaultError::Io {
                path: file.path().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            });
        }
        self.files
            .borrow_mut()
            .insert(file.path().to_string(), text.to_string());
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }
}

impl LinkResolver for MemoryVault {
    fn resolve_link(&self, link_text: &str, _context: &FileRef) -> Option<FileRef> {
        let target = link_text.split('#').next().unwrap_or_default();
        let wanted = format!("{target}.md");
        let suffix = format!("/{wanted}");
        self.paths()
            .into_iter()
            .find(|path| *path == wanted || path.ends_with(&suffix))
            .map(FileRef::new)
    }

    fn link_text_for(&self, file: &FileRef, _context: &FileRef) -> String {
        file.basename().to_string()
    }
}

impl BacklinkIndex for MemoryVault {
    fn backlinks(&self, file: &FileRef) -> Vec<FileRef> {
        let files = self.files.borrow().clone();
        files
            .iter()
            .filter(|(path, _)| path.as_str() != file.path())
            .filter(|(path, text)| {
                let context = FileRef::new(path.as_str());
                WikiLink::find_all(text)
                    .iter()
                    .any(|link| self.resolve_link(&link.target, &context).as_ref() == Some(file))
            })
            .map(|(path, _)| FileRef::new(path.as_str()))
            .collect()
    }
}

impl MetadataCache for MemoryVault {
    fn frontmatter(&self, file: &FileRef) -> Option<Frontmatter> {
        let text = self.read(file).ok()?;
        parse_frontmatter(&text, file).ok().flatten()
    }
}

pub fn services(vault: &Rc<MemoryVault>) -> VaultServices {
    let config = KanbanConfig::default();
    let tasks = Rc::new(VaultTaskSource::new(vault.clone(), vault.clone(), &config));
    VaultServices::from_vault(vault.clone(), tasks, config)
}

pub fn task_note(title: Option<&str>, status: &str) -> String {
    let title = title.map(|title| format!("title: {title}\n")).unwrap_or_default();
    format!("---\ntype: Task\n{title}status: {status}\n---\nNotes stay here.\n")
}

/// Sink that records every reported change.
pub fn recording_sink() -> (
    Rc<RefCell<Vec<(String, JsonValue)>>>,
    impl Fn(&str, JsonValue) -> Result<(), SinkError> + 'static,
) {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let recorded = Rc::clone(&calls);
    let sink = move |path: &str, value: JsonValue| {
        recorded.borrow_mut().push((path.to_string(), value));
        Ok::<(), SinkError>(())
    };
    (calls, sink)
}
