//! Wikilink syntax (`[[target#subpath|alias]]`).

use once_cell::sync::Lazy;
use regex::Regex;

static WIKILINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\[([^\[\]|#]*)(#[^\[\]|]*)?(\|[^\[\]]*)?\]\]").expect("valid wikilink regex")
});

/// One parsed wikilink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiLink {
    /// Link target as written (no subpath, no alias).
    pub target: String,
    /// Heading/block suffix including the leading `#`.
    pub subpath: Option<String>,
    /// Display alias including the leading `|`.
    pub alias: Option<String>,
}

impl WikiLink {
    /// Parses `text` when it is exactly one wikilink (surrounding whitespace
    /// ignored).
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        let captures = WIKILINK_RE.captures(trimmed)?;
        if captures.get(0)?.as_str() != trimmed {
            return None;
        }
        Some(Self::from_captures(&captures))
    }

    /// Every wikilink occurring in `text`, in order.
    pub fn find_all(text: &str) -> Vec<Self> {
        WIKILINK_RE
            .captures_iter(text)
            .map(|captures| Self::from_captures(&captures))
            .collect()
    }

    /// Renders the link with `link_text` as target, keeping subpath and alias.
    pub fn render(&self, link_text: &str) -> String {
        format!(
            "[[{link_text}{}{}]]",
            self.subpath.as_deref().unwrap_or_default(),
            self.alias.as_deref().unwrap_or_default()
        )
    }

    fn from_captures(captures: &regex::Captures<'_>) -> Self {
        Self {
            target: captures
                .get(1)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default(),
            subpath: captures.get(2).map(|m| m.as_str().to_string()),
            alias: captures.get(3).map(|m| m.as_str().to_string()),
        }
    }
}
