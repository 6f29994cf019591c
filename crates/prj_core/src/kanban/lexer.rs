//! Line classifier and document splitter for kanban documents.
//!
//! # Responsibility
//! - Classify single markdown lines into the few shapes the board cares about.
//! - Split a document into frontmatter, markdown body and settings block.
//!
//! # Invariants
//! - `DocumentParts` slices concatenate back to the input text.
//! - Classification ignores the trailing line ending only.

use super::KanbanParseError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Literal line opening the trailing settings block.
pub const SETTINGS_MARKER: &str = "%% kanban:settings";
const SETTINGS_END: &str = "%%";
const FENCE: &str = "---";

static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^##[ \t]+(.*?)[ \t]*$").expect("valid heading regex"));
static RULE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^ {0,3}(?:(?:\*[ \t]*){3,}|(?:-[ \t]*){3,}|(?:_[ \t]*){3,})$")
        .expect("valid horizontal rule regex")
});
static CHECKLIST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^- \[([ xX])\] (.*)$").expect("valid checklist regex"));

/// Shape of one markdown line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    /// `---` exactly.
    Fence,
    /// Second-level heading with its title.
    Heading(&'a str),
    HorizontalRule,
    SettingsStart,
    SettingsEnd,
    /// `- [ ] content` or `- [x] content`.
    Checklist {
        mark: char,
        content: &'a str,
    },
    Text,
}

impl Line<'_> {
    /// Lines that close a list section.
    pub fn is_rule(&self) -> bool {
        matches!(self, Self::Fence | Self::HorizontalRule)
    }
}

/// Splits `line` into its content and line ending (`\n`, `\r\n` or empty).
pub fn split_line_ending(line: &str) -> (&str, &str) {
    let content = line.trim_end_matches(['\n', '\r']);
    (content, &line[content.len()..])
}

pub fn classify_line(line: &str) -> Line<'_> {
    let (line, _) = split_line_ending(line);
    let trimmed = line.trim_end();

    if trimmed == FENCE {
        return Line::Fence;
    }
    if trimmed == SETTINGS_MARKER {
        return Line::SettingsStart;
    }
    if trimmed == SETTINGS_END {
        return Line::SettingsEnd;
    }
    if let Some(captures) = HEADING_RE.captures(line) {
        if let Some(title) = captures.get(1) {
            return Line::Heading(title.as_str());
        }
    }
    if RULE_RE.is_match(trimmed) {
        return Line::HorizontalRule;
    }
    if let Some(captures) = CHECKLIST_RE.captures(line) {
        let mark = captures
            .get(1)
            .and_then(|m| m.as_str().chars().next())
            .unwrap_or(' ');
        let content = captures.get(2).map_or("", |m| m.as_str());
        return Line::Checklist { mark, content };
    }
    Line::Text
}

/// The three regions of a kanban document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentParts<'a> {
    /// Frontmatter including both `---` fences.
    pub frontmatter: &'a str,
    pub markdown: &'a str,
    /// Settings block from its marker to the end of the text.
    pub settings: &'a str,
}

/// Splits a kanban document into frontmatter, body and settings.
///
/// # Errors
/// - Fails unless all three regions are present and terminated.
pub fn split_document(text: &str) -> Result<DocumentParts<'_>, KanbanParseError> {
    let mut lines = text.split_inclusive('\n').scan(0usize, |offset, line| {
        let start = *offset;
        *offset += line.len();
        Some((start, line))
    });

    match lines.next() {
        Some((_, line)) if classify_line(line) == Line::Fence => {}
        _ => return Err(KanbanParseError::MissingFrontmatter),
    }

    let frontmatter_end = lines
        .by_ref()
        .find(|(_, line)| classify_line(line) == Line::Fence)
        .map(|(start, line)| start + line.len())
        .ok_or(KanbanParseError::UnterminatedFrontmatter)?;

    let settings_start = lines
        .by_ref()
        .find(|(_, line)| classify_line(line) == Line::SettingsStart)
        .map(|(start, _)| start)
        .ok_or(KanbanParseError::MissingSettings)?;

    if !lines.any(|(_, line)| classify_line(line) == Line::SettingsEnd) {
        return Err(KanbanParseError::UnterminatedSettings);
    }

    Ok(DocumentParts {
        frontmatter: &text[..frontmatter_end],
        markdown: &text[frontmatter_end..settings_start],
        settings: &text[settings_start..],
    })
}
