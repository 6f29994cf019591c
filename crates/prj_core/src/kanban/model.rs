//! In-memory kanban board.
//!
//! # Responsibility
//! - Hold the lists and cards of one parsed kanban document together with
//!   the verbatim text around them.
//! - Move and add cards by status.
//!
//! # Invariants
//! - A card lives in exactly one list; moving never copies it.
//! - A list's status never changes after construction.
//! - `changed` is only set by a move or an add.

use crate::model::status::ListStatus;
use crate::vault::{FileRef, WikiLink};
use log::{debug, trace, warn};
use uuid::Uuid;

/// Stable identifier of one card within a parsed board.
pub type CardId = Uuid;

/// One checklist line, optionally linked to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KanbanCard {
    pub id: CardId,
    pub is_checked: bool,
    /// Resolved link target; `None` for plain cards and unresolved links.
    pub linked_file: Option<FileRef>,
    /// Parsed wikilink when the content is exactly one link.
    pub link: Option<WikiLink>,
    /// Text after the checkbox marker.
    pub raw_content: String,
    /// Lines following the card line up to the next card.
    pub continuation: String,
    pub(crate) mark: char,
    pub(crate) line_ending: String,
}

impl KanbanCard {
    /// Plain text card.
    pub fn new(raw_content: impl Into<String>) -> Self {
        let raw_content = raw_content.into();
        let link = WikiLink::parse(&raw_content);
        Self {
            id: Uuid::new_v4(),
            is_checked: false,
            linked_file: None,
            link,
            raw_content,
            continuation: String::new(),
            mark: ' ',
            line_ending: "\n".to_string(),
        }
    }

    /// Card linking to `file` through `link_text`.
    pub fn linked(file: FileRef, link_text: &str) -> Self {
        let mut card = Self::new(format!("[[{link_text}]]"));
        card.linked_file = Some(file);
        card
    }

    pub(crate) fn parsed(mark: char, raw_content: &str, line_ending: &str) -> Self {
        let mut card = Self::new(raw_content);
        card.is_checked = mark != ' ';
        card.mark = mark;
        card.line_ending = line_ending.to_string();
        card
    }

    /// Checkbox character to emit for the current state.
    pub(crate) fn check_mark(&self) -> char {
        match (self.is_checked, self.mark) {
            (true, 'x' | 'X') => self.mark,
            (true, _) => 'x',
            (false, _) => ' ',
        }
    }
}

/// Heading-delimited group of cards sharing one status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KanbanList {
    pub title: String,
    status: ListStatus,
    /// Set when the list body carries the completed marker.
    pub is_completed: bool,
    /// Text between the previous section and the heading (rules, blanks).
    pub prefix: String,
    pub heading_line: String,
    /// Body lines before the first card.
    pub leading: String,
    pub items: Vec<KanbanCard>,
    /// Body lines after the last card.
    pub trailing: String,
}

impl KanbanList {
    /// Fresh list laid out the way new boards are written.
    pub fn new(
        title: impl Into<String>,
        status: impl Into<ListStatus>,
        completed_marker: Option<&str>,
    ) -> Self {
        let title = title.into();
        let status = status.into();
        let mut leading = "\n".to_string();
        if let Some(marker) = completed_marker {
            leading.push_str(marker);
            leading.push('\n');
        }
        Self {
            heading_line: format!("## {title}\n"),
            title,
            status,
            is_completed: completed_marker.is_some(),
            prefix: if status.is_archive() {
                "***\n\n".to_string()
            } else {
                String::new()
            },
            leading,
            items: Vec::new(),
            trailing: "\n\n".to_string(),
        }
    }

    pub(crate) fn from_parts(
        title: &str,
        status: ListStatus,
        is_completed: bool,
        prefix: String,
        heading_line: &str,
    ) -> Self {
        Self {
            title: title.to_string(),
            status,
            is_completed,
            prefix,
            heading_line: heading_line.to_string(),
            leading: String::new(),
            items: Vec::new(),
            trailing: String::new(),
        }
    }

    pub fn status(&self) -> ListStatus {
        self.status
    }

    fn position(&self, id: CardId) -> Option<usize> {
        self.items.iter().position(|card| card.id == id)
    }

    /// Archive lists keep the card's checkbox as it was.
    fn append(&mut self, mut card: KanbanCard) {
        if !self.status.is_archive() {
            card.is_checked = self.is_completed;
        }
        if card.line_ending.is_empty() {
            card.line_ending.push('\n');
        }
        self.items.push(card);
    }
}

/// Parsed kanban document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KanbanBoard {
    pub file: FileRef,
    pub content_frontmatter: String,
    pub content_markdown: String,
    pub content_kanban_settings: String,
    /// Body text before the first list.
    pub preamble: String,
    pub lists: Vec<KanbanList>,
    /// Body text after the last list.
    pub epilogue: String,
    changed: bool,
}

impl KanbanBoard {
    pub fn new(
        file: FileRef,
        content_frontmatter: impl Into<String>,
        content_markdown: impl Into<String>,
        content_kanban_settings: impl Into<String>,
    ) -> Self {
        Self {
            file,
            content_frontmatter: content_frontmatter.into(),
            content_markdown: content_markdown.into(),
            content_kanban_settings: content_kanban_settings.into(),
            preamble: String::new(),
            lists: Vec::new(),
            epilogue: String::new(),
            changed: false,
        }
    }

    /// True once a card was moved or added.
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn cards(&self) -> impl Iterator<Item = &KanbanCard> {
        self.lists.iter().flat_map(|list| list.items.iter())
    }

    pub fn card(&self, id: CardId) -> Option<&KanbanCard> {
        self.cards().find(|card| card.id == id)
    }

    /// First card linked to `file`.
    pub fn card_for_file(&self, file: &FileRef) -> Option<&KanbanCard> {
        self.cards()
            .find(|card| card.linked_file.as_ref() == Some(file))
    }

    pub fn status_for_file(&self, file: &FileRef) -> Option<ListStatus> {
        self.lists
            .iter()
            .find(|list| {
                list.items
                    .iter()
                    .any(|card| card.linked_file.as_ref() == Some(file))
            })
            .map(KanbanList::status)
    }

    pub fn status_for_card(&self, id: CardId) -> Option<ListStatus> {
        self.lists
            .iter()
            .find(|list| list.position(id).is_some())
            .map(KanbanList::status)
    }

    /// Cards of every list carrying `status`, in document order.
    pub fn cards_with_status(&self, status: impl Into<ListStatus>) -> Vec<&KanbanCard> {
        let status = status.into();
        self.lists
            .iter()
            .filter(|list| list.status == status)
            .flat_map(|list| list.items.iter())
            .collect()
    }

    fn first_list_index(&self, status: ListStatus) -> Option<usize> {
        self.lists.iter().position(|list| list.status == status)
    }

    /// Moves a card to the first list carrying `status`.
    ///
    /// Returns `true` when the card moved. Outside the archive the card's
    /// checkbox follows the destination's completed flag.
    pub fn move_card_to_status(&mut self, id: CardId, status: impl Into<ListStatus>) -> bool {
        let status = status.into();
        let Some((source, index)) = self
            .lists
            .iter()
            .enumerate()
            .find_map(|(list_index, list)| list.position(id).map(|index| (list_index, index)))
        else {
            warn!(
                "event=card_move module=kanban status=skipped reason=card_not_found board={} card={}",
                self.file, id
            );
            return false;
        };

        if self.lists[source].status == status {
            trace!(
                "event=card_move module=kanban status=noop board={} card={} target={}",
                self.file,
                id,
                status
            );
            return false;
        }

        let Some(destination) = self.first_list_index(status) else {
            warn!(
                "event=card_move module=kanban status=skipped reason=no_target_list board={} card={} target={}",
                self.file, id, status
            );
            return false;
        };

        let card = self.lists[source].items.remove(index);
        self.lists[destination].append(card);
        self.changed = true;
        debug!(
            "event=card_move module=kanban status=ok board={} card={} from={} to={}",
            self.file, id, self.lists[source].status, status
        );
        true
    }

    /// Appends `card` to the first list carrying `status`.
    ///
    /// Returns the card id, or `None` when no list carries the status.
    pub fn add_card_to_status(
        &mut self,
        card: KanbanCard,
        status: impl Into<ListStatus>,
    ) -> Option<CardId> {
        let status = status.into();
        let Some(destination) = self.first_list_index(status) else {
            warn!(
                "event=card_add module=kanban status=skipped reason=no_target_list board={} target={}",
                self.file, status
            );
            return None;
        };
        let id = card.id;
        self.lists[destination].append(card);
        self.changed = true;
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::{KanbanBoard, KanbanCard, KanbanList};
    use crate::model::status::{ListStatus, TaskStatus};
    use crate::vault::FileRef;

    fn board() -> KanbanBoard {
        let mut board = KanbanBoard::new(FileRef::new("Board.md"), "---\n---\n", "", "");
        board.lists.push(KanbanList::new("Active", TaskStatus::Active, None));
        board.lists.push(KanbanList::new(
            "Done",
            TaskStatus::Done,
            Some("**Fertiggestellt**"),
        ));
        board.lists.push(KanbanList::new("Archiv", ListStatus::Archive, None));
        board
    }

    #[test]
    fn new_archive_list_is_prefixed_with_rule() {
        let archive = KanbanList::new("Archiv", ListStatus::Archive, None);
        assert_eq!(archive.prefix, "***\n\n");
        let done = KanbanList::new("Done", TaskStatus::Done, Some("**Fertiggestellt**"));
        assert!(done.is_completed);
        assert_eq!(done.leading, "\n**Fertiggestellt**\n");
        assert!(done.prefix.is_empty());
    }

    #[test]
    fn add_then_move_updates_checkbox_and_changed_flag() {
        let mut board = board();
        let task = FileRef::new("Task1.md");
        let id = board
            .add_card_to_status(KanbanCard::linked(task.clone(), "Task1"), TaskStatus::Active)
            .expect("active list exists");
        assert!(board.is_changed());
        assert_eq!(board.status_for_file(&task), Some(ListStatus::Task(TaskStatus::Active)));

        assert!(board.move_card_to_status(id, TaskStatus::Done));
        let card = board.card(id).expect("card still on board");
        assert!(card.is_checked);
        assert_eq!(card.check_mark(), 'x');
        assert_eq!(board.status_for_card(id), Some(ListStatus::Task(TaskStatus::Done)));
        assert_eq!(board.cards().count(), 1);
    }

    #[test]
    fn move_to_missing_status_keeps_card_in_place() {
        let mut board = board();
        let id = board
            .add_card_to_status(KanbanCard::new("plain"), TaskStatus::Active)
            .expect("active list exists");
        assert!(!board.move_card_to_status(id, TaskStatus::Someday));
        assert_eq!(board.status_for_card(id), Some(ListStatus::Task(TaskStatus::Active)));
        assert!(board.add_card_to_status(KanbanCard::new("x"), TaskStatus::Later).is_none());
    }

    #[test]
    fn archive_keeps_checkbox_state() {
        let mut board = board();
        let id = board
            .add_card_to_status(KanbanCard::new("plain"), TaskStatus::Done)
            .expect("done list exists");
        assert!(board.card(id).expect("card").is_checked);
        assert!(board.move_card_to_status(id, ListStatus::Archive));
        assert!(board.card(id).expect("card").is_checked);
        assert_eq!(board.cards_with_status(ListStatus::Archive).len(), 1);
    }
}
