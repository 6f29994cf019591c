//! Kanban document regeneration.

use super::model::{KanbanBoard, KanbanCard};
use crate::vault::LinkResolver;
use std::borrow::Cow;

/// Serializes a board back to document text.
///
/// Output order: frontmatter, preamble, lists, epilogue, settings. Only card
/// lines are rebuilt; everything else is emitted as parsed.
pub struct KanbanMarkdownGenerator<'a> {
    board: &'a KanbanBoard,
    links: &'a dyn LinkResolver,
}

impl<'a> KanbanMarkdownGenerator<'a> {
    pub fn new(board: &'a KanbanBoard, links: &'a dyn LinkResolver) -> Self {
        Self { board, links }
    }

    pub fn generate(&self) -> String {
        let board = self.board;
        let mut out = String::with_capacity(
            board.content_frontmatter.len()
                + board.content_markdown.len()
                + board.content_kanban_settings.len(),
        );
        out.push_str(&board.content_frontmatter);
        out.push_str(&board.preamble);
        for list in &board.lists {
            out.push_str(&list.prefix);
            out.push_str(&list.heading_line);
            out.push_str(&list.leading);
            for card in &list.items {
                self.push_card(&mut out, card);
            }
            out.push_str(&list.trailing);
        }
        out.push_str(&board.epilogue);
        out.push_str(&board.content_kanban_settings);
        out
    }

    fn push_card(&self, out: &mut String, card: &KanbanCard) {
        out.push_str("- [");
        out.push(card.check_mark());
        out.push_str("] ");
        out.push_str(&self.card_content(card));
        out.push_str(&card.line_ending);
        out.push_str(&card.continuation);
    }

    /// Written link text is kept while it still resolves to the card's file.
    fn card_content<'c>(&self, card: &'c KanbanCard) -> Cow<'c, str> {
        let (Some(file), Some(link)) = (card.linked_file.as_ref(), card.link.as_ref()) else {
            return Cow::Borrowed(card.raw_content.as_str());
        };
        let context = &self.board.file;
        if self.links.resolve_link(&link.target, context).as_ref() == Some(file) {
            Cow::Borrowed(card.raw_content.as_str())
        } else {
            Cow::Owned(link.render(&self.links.link_text_for(file, context)))
        }
    }
}
