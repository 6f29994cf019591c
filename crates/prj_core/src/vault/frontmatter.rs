//! YAML frontmatter access for markdown documents.
//!
//! # Responsibility
//! - Split a document into frontmatter YAML and body.
//! - Decode the typed `Frontmatter` view and the raw key map.
//! - Apply tracked change-sets and re-serialize the block.
//!
//! # Invariants
//! - The body after the closing fence is preserved byte-for-byte.
//! - A `null` change removes the key; list slots are set to `null` instead.

use super::{FileRef, VaultError, VaultResult};
use crate::tracking::value::{list_index, LENGTH_KEY, MAX_LIST_LEN};
use crate::transaction::ChangeSet;
use log::warn;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

const FENCE: &str = "---";

/// Typed view of the frontmatter keys the core reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frontmatter {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub sub_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TagsField {
    One(String),
    Many(Vec<String>),
}

fn deserialize_tags<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Option::<TagsField>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(TagsField::One(tag)) => vec![tag],
        Some(TagsField::Many(tags)) => tags,
    })
}

/// Frontmatter YAML and the body following it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontmatterBlock<'a> {
    pub yaml: &'a str,
    pub body: &'a str,
}

/// Splits `---` fenced frontmatter from the start of `text`.
pub fn split_frontmatter(text: &str) -> Option<FrontmatterBlock<'_>> {
    let mut lines = text.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != FENCE {
        return None;
    }

    let yaml_start = first.len();
    let mut offset = yaml_start;
    for line in lines {
        if line.trim_end() == FENCE {
            return Some(FrontmatterBlock {
                yaml: &text[yaml_start..offset],
                body: &text[offset + line.len()..],
            });
        }
        offset += line.len();
    }
    None
}

/// Decodes the typed frontmatter; `None` when the document has none.
pub fn parse_frontmatter(text: &str, file: &FileRef) -> VaultResult<Option<Frontmatter>> {
    let Some(block) = split_frontmatter(text) else {
        return Ok(None);
    };
    if block.yaml.trim().is_empty() {
        return Ok(Some(Frontmatter::default()));
    }
    serde_yaml::from_str(block.yaml)
        .map(Some)
        .map_err(|err| invalid(file, err))
}

/// Decodes the frontmatter as a JSON key map; empty when absent.
pub fn frontmatter_map(text: &str, file: &FileRef) -> VaultResult<JsonMap<String, JsonValue>> {
    let Some(block) = split_frontmatter(text) else {
        return Ok(JsonMap::new());
    };
    if block.yaml.trim().is_empty() {
        return Ok(JsonMap::new());
    }
    match serde_yaml::from_str::<JsonValue>(block.yaml).map_err(|err| invalid(file, err))? {
        JsonValue::Object(map) => Ok(map),
        JsonValue::Null => Ok(JsonMap::new()),
        other => Err(VaultError::InvalidFrontmatter {
            path: file.path().to_string(),
            message: format!("expected a mapping, found `{other}`"),
        }),
    }
}

/// Replaces (or prepends) the frontmatter block of `text`.
pub fn replace_frontmatter(
    text: &str,
    map: &JsonMap<String, JsonValue>,
    file: &FileRef,
) -> VaultResult<String> {
    let body = split_frontmatter(text).map_or(text, |block| block.body);
    let yaml = if map.is_empty() {
        String::new()
    } else {
        serde_yaml::to_string(map).map_err(|err| invalid(file, err))?
    };
    Ok(format!("{FENCE}\n{yaml}{FENCE}\n{body}"))
}

/// Deep-merges a tracked change-set into a frontmatter map.
pub fn apply_change_set(map: &mut JsonMap<String, JsonValue>, changes: ChangeSet) {
    for (key, change) in changes {
        if change.is_null() {
            map.remove(&key);
            continue;
        }
        match map.get_mut(&key) {
            Some(existing) => apply_change(existing, change),
            None => {
                map.insert(key, change);
            }
        }
    }
}

fn apply_change(target: &mut JsonValue, change: JsonValue) {
    match (target, change) {
        (JsonValue::Object(target_map), JsonValue::Object(changes)) => {
            apply_change_set(target_map, changes);
        }
        (JsonValue::Array(items), JsonValue::Object(changes)) => {
            for (key, change) in changes {
                if key == LENGTH_KEY {
                    match change
                        .as_u64()
                        .and_then(|n| usize::try_from(n).ok())
                        .filter(|length| *length <= MAX_LIST_LEN)
                    {
                        Some(length) => items.resize(length, JsonValue::Null),
                        None => warn!(
                            "event=frontmatter_merge module=vault status=skipped reason=invalid_length length={}",
                            change
                        ),
                    }
                    continue;
                }
                let Some(index) = list_index(&key) else {
                    warn!(
                        "event=frontmatter_merge module=vault status=skipped reason=invalid_index key={}",
                        key
                    );
                    continue;
                };
                if index >= items.len() {
                    items.resize(index + 1, JsonValue::Null);
                }
                apply_change(&mut items[index], change);
            }
        }
        (target, change) => *target = change,
    }
}

fn invalid(file: &FileRef, err: impl std::fmt::Display) -> VaultError {
    VaultError::InvalidFrontmatter {
        path: file.path().to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        apply_change_set, frontmatter_map, parse_frontmatter, replace_frontmatter,
        split_frontmatter,
    };
    use crate::tracking::value::MAX_LIST_LEN;
    use crate::vault::FileRef;
    use serde_json::json;

    #[test]
    fn split_keeps_body_bytes() {
        let text = "---\ntitle: A\n---\n# Body\n---\nrule above\n";
        let block = split_frontmatter(text).expect("frontmatter present");
        assert_eq!(block.yaml, "title: A\n");
        assert_eq!(block.body, "# Body\n---\nrule above\n");
        assert!(split_frontmatter("# no frontmatter\n").is_none());
        assert!(split_frontmatter("---\nunterminated: true\n").is_none());
    }

    #[test]
    fn typed_view_accepts_single_tag_and_camel_case_keys() {
        let file = FileRef::new("Board.md");
        let frontmatter = parse_frontmatter(
            "---\ntype: Topic\nsubType: Kanban\ntags: project/alpha\n---\n",
            &file,
        )
        .expect("frontmatter should parse")
        .expect("frontmatter present");
        assert_eq!(frontmatter.kind.as_deref(), Some("Topic"));
        assert_eq!(frontmatter.sub_type.as_deref(), Some("Kanban"));
        assert_eq!(frontmatter.tags, vec!["project/alpha"]);
    }

    #[test]
    fn change_set_merges_nested_values_and_list_slots() {
        let mut map = json!({
            "title": "Old",
            "status": "Active",
            "tags": ["a", "b"],
            "meta": {"keep": 1}
        })
        .as_object()
        .cloned()
        .expect("object fixture");

        let changes = json!({
            "title": "New",
            "status": null,
            "tags": {"2": "c", "length": 3},
            "meta": {"added": true}
        })
        .as_object()
        .cloned()
        .expect("object fixture");

        apply_change_set(&mut map, changes);
        assert_eq!(
            serde_json::Value::Object(map),
            json!({
                "title": "New",
                "tags": ["a", "b", "c"],
                "meta": {"keep": 1, "added": true}
            })
        );
    }

    #[test]
    fn change_set_ignores_list_positions_past_the_limit() {
        let mut map = json!({"tags": ["a"]})
            .as_object()
            .cloned()
            .expect("object fixture");
        let mut slots = serde_json::Map::new();
        slots.insert(usize::MAX.to_string(), json!("x"));
        slots.insert(MAX_LIST_LEN.to_string(), json!("y"));
        slots.insert("length".to_string(), json!(MAX_LIST_LEN as u64 + 1));
        let mut changes = serde_json::Map::new();
        changes.insert("tags".to_string(), serde_json::Value::Object(slots));

        apply_change_set(&mut map, changes);
        assert_eq!(serde_json::Value::Object(map), json!({"tags": ["a"]}));
    }

    #[test]
    fn replace_frontmatter_rewrites_block_and_keeps_body() {
        let file = FileRef::new("Task.md");
        let text = "---\ntitle: Old\n---\nBody line\n";
        let mut map = frontmatter_map(text, &file).expect("map should decode");
        map.insert("status".to_string(), json!("Done"));

        let updated = replace_frontmatter(text, &map, &file).expect("rewrite should succeed");
        assert!(updated.starts_with("---\n"));
        assert!(updated.ends_with("---\nBody line\n"));
        let reparsed = frontmatter_map(&updated, &file).expect("rewritten block decodes");
        assert_eq!(reparsed.get("status"), Some(&json!("Done")));
        assert_eq!(reparsed.get("title"), Some(&json!("Old")));
    }
}
