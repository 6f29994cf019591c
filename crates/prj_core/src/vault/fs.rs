//! Directory-backed vault.
//!
//! # Responsibility
//! - Serve document I/O, link resolution, backlinks and frontmatter from a
//!   vault directory on disk.
//!
//! # Invariants
//! - Only `.md` files take part in link resolution and backlink scans.
//! - Hidden entries (`.obsidian`, `.trash`, ...) are never scanned.
//! - Link resolution prefers the context folder, then the shortest path,
//!   then path order, so results are deterministic.

use super::frontmatter::parse_frontmatter;
use super::wikilink::WikiLink;
use super::{
    BacklinkIndex, DocumentStore, FileRef, Frontmatter, LinkResolver, MetadataCache, VaultError,
    VaultResult,
};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Vault rooted at one directory.
#[derive(Debug, Clone)]
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    /// Opens an existing vault directory.
    ///
    /// # Errors
    /// - `VaultError::NotFound` when `root` is not a directory.
    pub fn open(root: impl Into<PathBuf>) -> VaultResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(VaultError::NotFound(root.display().to_string()));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn absolute(&self, file: &FileRef) -> PathBuf {
        self.root.join(file.path())
    }

    /// All markdown files, sorted by path.
    pub fn markdown_files(&self) -> Vec<FileRef> {
        let mut files: Vec<FileRef> = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_hidden(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("event=vault_scan module=vault status=error error={}", err);
                    None
                }
            })
            .filter(|entry| {
                entry.file_type().is_file()
                    && entry.path().extension().is_some_and(|ext| ext == "md")
            })
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(&self.root)
                    .ok()
                    .map(|relative| FileRef::new(relative.to_string_lossy().into_owned()))
            })
            .collect();
        files.sort();
        files
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

fn resolve_among(files: &[FileRef], link_text: &str, context: &FileRef) -> Option<FileRef> {
    let target = link_text
        .split(['#', '|'])
        .next()
        .unwrap_or_default()
        .trim()
        .trim_start_matches('/');
    if target.is_empty() {
        return None;
    }
    let wanted = if target.ends_with(".md") {
        target.to_string()
    } else {
        format!("{target}.md")
    };
    let suffix = format!("/{wanted}");

    let mut candidates: Vec<&FileRef> = files
        .iter()
        .filter(|file| file.path() == wanted || file.path().ends_with(&suffix))
        .collect();
    candidates.sort_by(|a, b| {
        let a_local = a.parent() == context.parent();
        let b_local = b.parent() == context.parent();
        b_local
            .cmp(&a_local)
            .then(a.path().len().cmp(&b.path().len()))
            .then(a.cmp(b))
    });
    candidates.first().map(|file| (*file).clone())
}

impl DocumentStore for FsVault {
    fn read(&self, file: &FileRef) -> VaultResult<String> {
        std::fs::read_to_string(self.absolute(file)).map_err(|source| io_error(file, source))
    }

    fn write(&self, file: &FileRef, text: &str) -> VaultResult<()> {
        let path = self.absolute(file);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| io_error(file, source))?;
        }
        std::fs::write(&path, text).map_err(|source| io_error(file, source))?;
        debug!(
            "event=vault_write module=vault status=ok path={} bytes={}",
            file,
            text.len()
        );
        Ok(())
    }
}

impl LinkResolver for FsVault {
    fn resolve_link(&self, link_text: &str, context: &FileRef) -> Option<FileRef> {
        resolve_among(&self.markdown_files(), link_text, context)
    }

    fn link_text_for(&self, file: &FileRef, _context: &FileRef) -> String {
        let same_name = self
            .markdown_files()
            .iter()
            .filter(|candidate| candidate.name() == file.name())
            .count();
        if same_name <= 1 {
            file.basename().to_string()
        } else {
            file.path_without_markdown_extension().to_string()
        }
    }
}

impl BacklinkIndex for FsVault {
    fn backlinks(&self, file: &FileRef) -> Vec<FileRef> {
        let files = self.markdown_files();
        files
            .iter()
            .filter(|candidate| *candidate != file)
            .filter(|candidate| {
                let text = match self.read(candidate) {
                    Ok(text) => text,
                    Err(err) => {
                        warn!(
                            "event=backlink_scan module=vault status=error path={} error={}",
                            candidate, err
                        );
                        return false;
                    }
                };
                WikiLink::find_all(&text).iter().any(|link| {
                    resolve_among(&files, &link.target, candidate).as_ref() == Some(file)
                })
            })
            .cloned()
            .collect()
    }
}

impl MetadataCache for FsVault {
    fn frontmatter(&self, file: &FileRef) -> Option<Frontmatter> {
        let text = match self.read(file) {
            Ok(text) => text,
            Err(err) => {
                debug!(
                    "event=frontmatter_read module=vault status=skipped path={} error={}",
                    file, err
                );
                return None;
            }
        };
        match parse_frontmatter(&text, file) {
            Ok(frontmatter) => frontmatter,
            Err(err) => {
                warn!(
                    "event=frontmatter_read module=vault status=error path={} error={}",
                    file, err
                );
                None
            }
        }
    }
}

fn io_error(file: &FileRef, source: std::io::Error) -> VaultError {
    if source.kind() == std::io::ErrorKind::NotFound {
        VaultError::NotFound(file.path().to_string())
    } else {
        VaultError::Io {
            path: file.path().to_string(),
            source,
        }
    }
}
