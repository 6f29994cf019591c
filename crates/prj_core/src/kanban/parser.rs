//! Kanban document parser.
//!
//! # Responsibility
//! - Load a kanban document once and parse it into a `KanbanBoard`.
//! - Map list headings to statuses and resolve card links.
//!
//! # Invariants
//! - Every byte of the markdown body lands in exactly one board field, so
//!   regeneration without moves is byte-identical.
//! - Unknown headings drop their list but keep its text as filler.
//! - Unresolved card links keep the card, without a file.

use super::lexer::{classify_line, split_document, split_line_ending, Line};
use super::model::{KanbanBoard, KanbanCard, KanbanList};
use super::KanbanParseError;
use crate::config::KanbanConfig;
use crate::i18n::StatusTranslator;
use crate::model::status::ListStatus;
use crate::vault::{FileRef, LinkResolver, VaultServices};
use log::{debug, error, warn};

/// Reads and parses one kanban document.
pub struct KanbanParser {
    services: VaultServices,
    file: FileRef,
    source: Option<String>,
    loaded: bool,
}

impl KanbanParser {
    pub fn new(services: VaultServices, file: FileRef) -> Self {
        Self {
            services,
            file,
            source: None,
            loaded: false,
        }
    }

    /// Parser over already loaded text; the store is not read.
    pub fn with_source(services: VaultServices, file: FileRef, text: impl Into<String>) -> Self {
        Self {
            services,
            file,
            source: Some(text.into()),
            loaded: true,
        }
    }

    pub fn file(&self) -> &FileRef {
        &self.file
    }

    fn load(&mut self) {
        if self.loaded {
            return;
        }
        self.loaded = true;
        match self.services.store.read(&self.file) {
            Ok(text) => self.source = Some(text),
            Err(err) => error!(
                "event=kanban_load module=kanban status=error board={} error={}",
                self.file, err
            ),
        }
    }

    /// Parses the document; `None` when it cannot be read or is malformed.
    pub fn parse(&mut self) -> Option<KanbanBoard> {
        self.load();
        let text = self.source.as_deref()?;
        match parse_board(
            text,
            &self.file,
            self.services.links.as_ref(),
            self.services.translator.as_ref(),
            &self.services.config,
        ) {
            Ok(board) => Some(board),
            Err(err) => {
                error!(
                    "event=kanban_parse module=kanban status=error board={} error={}",
                    self.file, err
                );
                None
            }
        }
    }
}

struct Section<'a> {
    title: &'a str,
    prefix: String,
    heading_line: &'a str,
    body: Vec<&'a str>,
}

/// Parses kanban document text.
///
/// # Errors
/// - `KanbanParseError` when frontmatter or settings are missing.
pub fn parse_board(
    text: &str,
    file: &FileRef,
    links: &dyn LinkResolver,
    translator: &dyn StatusTranslator,
    config: &KanbanConfig,
) -> Result<KanbanBoard, KanbanParseError> {
    let parts = split_document(text)?;
    let mut board = KanbanBoard::new(
        file.clone(),
        parts.frontmatter,
        parts.markdown,
        parts.settings,
    );
    let context = ParseContext {
        file,
        links,
        translator,
        config,
    };

    let mut pending = String::new();
    let mut section: Option<Section<'_>> = None;
    let mut seen_heading = false;

    for line in parts.markdown.split_inclusive('\n') {
        match classify_line(line) {
            Line::Heading(title) => {
                if let Some(done) = section.take() {
                    context.close_section(&mut board, done);
                }
                if !seen_heading {
                    board.preamble = std::mem::take(&mut pending);
                    seen_heading = true;
                }
                section = Some(Section {
                    title,
                    prefix: std::mem::take(&mut pending),
                    heading_line: line,
                    body: Vec::new(),
                });
            }
            kind if kind.is_rule() => {
                if let Some(done) = section.take() {
                    context.close_section(&mut board, done);
                }
                pending.push_str(line);
            }
            _ => match section.as_mut() {
                Some(open) => open.body.push(line),
                None => pending.push_str(line),
            },
        }
    }
    if let Some(done) = section.take() {
        context.close_section(&mut board, done);
    }
    if seen_heading {
        board.epilogue = pending;
    } else {
        board.preamble = pending;
    }

    debug!(
        "event=kanban_parse module=kanban status=ok board={} lists={} cards={}",
        file,
        board.lists.len(),
        board.cards().count()
    );
    Ok(board)
}

struct ParseContext<'a> {
    file: &'a FileRef,
    links: &'a dyn LinkResolver,
    translator: &'a dyn StatusTranslator,
    config: &'a KanbanConfig,
}

impl ParseContext<'_> {
    fn heading_status(&self, title: &str) -> Option<ListStatus> {
        if title.trim() == self.config.archive_marker {
            return Some(ListStatus::Archive);
        }
        self.translator
            .heading_to_status(title)
            .map(ListStatus::from)
    }

    fn close_section(&self, board: &mut KanbanBoard, section: Section<'_>) {
        let Some(status) = self.heading_status(section.title) else {
            error!(
                "event=kanban_parse module=kanban status=error reason=unknown_heading board={} heading={}",
                self.file, section.title
            );
            let mut raw = section.prefix;
            raw.push_str(section.heading_line);
            raw.extend(section.body);
            match board.lists.last_mut() {
                Some(list) => list.trailing.push_str(&raw),
                None => board.preamble.push_str(&raw),
            }
            return;
        };

        let is_completed = section
            .body
            .iter()
            .any(|line| line.contains(self.config.completed_marker.as_str()));
        let mut list = KanbanList::from_parts(
            section.title,
            status,
            is_completed,
            section.prefix,
            section.heading_line,
        );

        let mut tail = String::new();
        for line in section.body {
            match classify_line(line) {
                Line::Checklist { mark, content } => {
                    if let Some(previous) = list.items.last_mut() {
                        previous.continuation.push_str(&std::mem::take(&mut tail));
                    }
                    let (_, ending) = split_line_ending(line);
                    list.items.push(self.card(mark, content, ending));
                }
                _ if list.items.is_empty() => list.leading.push_str(line),
                _ if tail.is_empty() && is_indented(line) => {
                    if let Some(previous) = list.items.last_mut() {
                        previous.continuation.push_str(line);
                    }
                }
                _ => tail.push_str(line),
            }
        }
        if list.items.is_empty() {
            let keep = leading_len(&list.leading);
            list.trailing = list.leading.split_off(keep);
        } else {
            list.trailing = tail;
        }
        board.lists.push(list);
    }

    fn card(&self, mark: char, content: &str, ending: &str) -> KanbanCard {
        let mut card = KanbanCard::parsed(mark, content, ending);
        if let Some(link) = card.link.as_ref() {
            card.linked_file = self.links.resolve_link(&link.target, self.file);
            if card.linked_file.is_none() {
                warn!(
                    "event=kanban_parse module=kanban status=warn reason=unresolved_link board={} link={}",
                    self.file, link.target
                );
            }
        }
        card
    }
}

/// Length of a card-less body up to its last non-blank line, or its first
/// blank line when all are blank. New cards are inserted at that point.
fn leading_len(body: &str) -> usize {
    let mut offset = 0;
    let mut keep = None;
    for line in body.split_inclusive('\n') {
        offset += line.len();
        if !line.trim().is_empty() {
            keep = Some(offset);
        } else if keep.is_none() && offset == line.len() {
            keep = Some(offset);
        }
    }
    keep.unwrap_or(0)
}

fn is_indented(line: &str) -> bool {
    line.starts_with([' ', '\t']) && !line.trim().is_empty()
}
