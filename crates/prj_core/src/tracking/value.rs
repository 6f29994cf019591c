//! Shared object graph observed by the change-tracking layer.
//!
//! # Responsibility
//! - Model plain data (maps, lists, scalars) with reference identity.
//! - Convert to and from `serde_json::Value` at the persistence boundary.
//!
//! # Invariants
//! - Maps and lists live in shared `Node`s; cloning a `Value` shares the node.
//! - `Value::detached()` never shares a node with its source.
//! - A frozen node rejects every write and delete.

use serde_json::{Map as JsonMap, Number, Value as JsonValue};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

/// Key reported for list length changes.
pub const LENGTH_KEY: &str = "length";

/// Largest length a list may grow to through writes.
pub const MAX_LIST_LEN: usize = 1 << 16;

/// Parses a list index key, keeping only indices below `MAX_LIST_LEN`.
pub fn list_index(key: &str) -> Option<usize> {
    key.parse::<usize>()
        .ok()
        .filter(|index| *index < MAX_LIST_LEN)
}

/// Plain value stored inside a tracked graph.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    /// Map or list, shared by reference.
    Object(Node),
}

/// Reference-identity container for map or list entries.
#[derive(Debug, Clone)]
pub struct Node(Rc<RefCell<NodeData>>);

#[derive(Debug)]
struct NodeData {
    entries: Entries,
    frozen: bool,
}

#[derive(Debug)]
enum Entries {
    Map(BTreeMap<String, Value>),
    List(Vec<Value>),
}

/// Reason a node rejected a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteRejection {
    /// Node was frozen before the write.
    Frozen,
    /// Key is not addressable on a list (non-numeric, non-`length`).
    InvalidKey(String),
    /// `length` was assigned a value that is not a non-negative integer.
    InvalidLength,
    /// Index or length would grow the list past `MAX_LIST_LEN`.
    OutOfBounds(String),
}

impl Display for WriteRejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Frozen => write!(f, "object is frozen"),
            Self::InvalidKey(key) => write!(f, "key `{key}` is not a valid list index"),
            Self::InvalidLength => write!(f, "length must be a non-negative integer"),
            Self::OutOfBounds(key) => {
                write!(f, "list position `{key}` exceeds {MAX_LIST_LEN} entries")
            }
        }
    }
}

impl Error for WriteRejection {}

impl Node {
    /// Creates an empty map node.
    pub fn map() -> Self {
        Self::from_entries(Entries::Map(BTreeMap::new()))
    }

    /// Creates an empty list node.
    pub fn list() -> Self {
        Self::from_entries(Entries::List(Vec::new()))
    }

    fn from_entries(entries: Entries) -> Self {
        Self(Rc::new(RefCell::new(NodeData {
            entries,
            frozen: false,
        })))
    }

    /// Returns whether both handles point at the same node.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Address-based identity used by proxy memoization.
    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub fn is_array(&self) -> bool {
        matches!(self.0.borrow().entries, Entries::List(_))
    }

    pub fn is_frozen(&self) -> bool {
        self.0.borrow().frozen
    }

    /// Makes every later write or delete on this node fail.
    pub fn freeze(&self) {
        self.0.borrow_mut().frozen = true;
    }

    pub fn len(&self) -> usize {
        match &self.0.borrow().entries {
            Entries::Map(map) => map.len(),
            Entries::List(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns map keys, or list indices as strings.
    pub fn keys(&self) -> Vec<String> {
        match &self.0.borrow().entries {
            Entries::Map(map) => map.keys().cloned().collect(),
            Entries::List(items) => (0..items.len()).map(|index| index.to_string()).collect(),
        }
    }

    /// Reads one member. Lists answer numeric indices and `length`.
    pub fn get(&self, key: &str) -> Option<Value> {
        match &self.0.borrow().entries {
            Entries::Map(map) => map.get(key).cloned(),
            Entries::List(items) => {
                if key == LENGTH_KEY {
                    return Some(Value::Number(Number::from(items.len())));
                }
                key.parse::<usize>()
                    .ok()
                    .and_then(|index| items.get(index).cloned())
            }
        }
    }

    /// Stores one member and returns the value as stored.
    ///
    /// Lists grow with `Null` padding when an index past the end is written,
    /// and `length` truncates or pads.
    pub fn set(&self, key: &str, value: Value) -> Result<Value, WriteRejection> {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return Err(WriteRejection::Frozen);
        }
        match &mut data.entries {
            Entries::Map(map) => {
                map.insert(key.to_string(), value.clone());
                Ok(value)
            }
            Entries::List(items) => {
                if key == LENGTH_KEY {
                    let length = value
                        .as_u64()
                        .and_then(|length| usize::try_from(length).ok())
                        .ok_or(WriteRejection::InvalidLength)?;
                    if length > MAX_LIST_LEN {
                        return Err(WriteRejection::OutOfBounds(length.to_string()));
                    }
                    items.resize(length, Value::Null);
                    return Ok(Value::Number(Number::from(length)));
                }
                let index = key
                    .parse::<usize>()
                    .map_err(|_| WriteRejection::InvalidKey(key.to_string()))?;
                let end = index
                    .checked_add(1)
                    .filter(|end| *end <= MAX_LIST_LEN)
                    .ok_or_else(|| WriteRejection::OutOfBounds(key.to_string()))?;
                if end > items.len() {
                    items.resize(end, Value::Null);
                }
                items[index] = value.clone();
                Ok(value)
            }
        }
    }

    /// Removes one member and returns the previous value.
    ///
    /// List slots are cleared to `Null`; the length is unchanged.
    pub fn remove(&self, key: &str) -> Result<Option<Value>, WriteRejection> {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return Err(WriteRejection::Frozen);
        }
        match &mut data.entries {
            Entries::Map(map) => Ok(map.remove(key)),
            Entries::List(items) => {
                let index = key
                    .parse::<usize>()
                    .map_err(|_| WriteRejection::InvalidKey(key.to_string()))?;
                Ok(items
                    .get_mut(index)
                    .map(|slot| std::mem::replace(slot, Value::Null)))
            }
        }
    }

    fn to_json(&self) -> JsonValue {
        match &self.0.borrow().entries {
            Entries::Map(map) => JsonValue::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect::<JsonMap<String, JsonValue>>(),
            ),
            Entries::List(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
        }
    }

    fn detached(&self) -> Node {
        match &self.0.borrow().entries {
            Entries::Map(map) => Node::from_entries(Entries::Map(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.detached()))
                    .collect(),
            )),
            Entries::List(items) => {
                Node::from_entries(Entries::List(items.iter().map(Value::detached).collect()))
            }
        }
    }
}

impl Value {
    /// Creates a fresh, empty map value.
    pub fn object() -> Self {
        Self::Object(Node::map())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Self::Object(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Number(number) => number.as_u64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(number) => number.as_f64(),
            _ => None,
        }
    }

    /// Resolves the graph into plain JSON data.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(value) => JsonValue::Bool(*value),
            Self::Number(number) => JsonValue::Number(number.clone()),
            Self::String(value) => JsonValue::String(value.clone()),
            Self::Object(node) => node.to_json(),
        }
    }

    /// Deep copy that shares no node with `self`.
    pub fn detached(&self) -> Value {
        match self {
            Self::Object(node) => Self::Object(node.detached()),
            scalar => scalar.clone(),
        }
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(value) => Self::Bool(value),
            JsonValue::Number(number) => Self::Number(number),
            JsonValue::String(value) => Self::String(value),
            JsonValue::Array(items) => Self::Object(Node::from_entries(Entries::List(
                items.into_iter().map(Value::from).collect(),
            ))),
            JsonValue::Object(map) => Self::Object(Node::from_entries(Entries::Map(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ))),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Number(Number::from(value))
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Self::Number(Number::from(value))
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Self::Number(Number::from(value))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Object(Node::from_entries(Entries::List(items)))
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Self::Object(node)
    }
}

#[cfg(test)]
mod tests {
    use super::{list_index, Node, Value, WriteRejection, MAX_LIST_LEN};
    use serde_json::json;

    #[test]
    fn json_round_trip_keeps_nested_shape() {
        let source = json!({"title": "Plan", "tags": ["a", "b"], "meta": {"n": 3}});
        let value = Value::from(source.clone());
        assert_eq!(value.to_json(), source);
    }

    #[test]
    fn clone_shares_node_but_detached_does_not() {
        let value = Value::from(json!({"a": {"b": 1}}));
        let shared = value.clone();
        let copy = value.detached();

        let node = value.as_node().expect("object node");
        assert!(node.ptr_eq(shared.as_node().expect("object node")));
        assert!(!node.ptr_eq(copy.as_node().expect("object node")));
        assert_eq!(copy.to_json(), value.to_json());
    }

    #[test]
    fn list_writes_pad_and_truncate() {
        let node = Node::list();
        node.set("2", Value::from("c")).expect("index write");
        assert_eq!(node.len(), 3);
        assert!(node.get("0").expect("padded slot").is_null());

        node.set("length", Value::from(1_u64)).expect("truncate");
        assert_eq!(node.len(), 1);
        assert_eq!(
            node.set("name", Value::Null).unwrap_err(),
            WriteRejection::InvalidKey("name".to_string())
        );
    }

    #[test]
    fn list_writes_past_the_size_limit_are_rejected() {
        let node = Node::list();
        let huge = usize::MAX.to_string();
        assert_eq!(
            node.set(&huge, Value::from("x")).unwrap_err(),
            WriteRejection::OutOfBounds(huge.clone())
        );
        let limit = MAX_LIST_LEN.to_string();
        assert_eq!(
            node.set(&limit, Value::from("x")).unwrap_err(),
            WriteRejection::OutOfBounds(limit)
        );
        assert!(matches!(
            node.set("length", Value::from(MAX_LIST_LEN as u64 + 1)),
            Err(WriteRejection::OutOfBounds(_))
        ));
        assert!(node.is_empty());

        assert_eq!(list_index("3"), Some(3));
        assert_eq!(list_index(&huge), None);
        assert_eq!(list_index("x"), None);
    }

    #[test]
    fn frozen_node_rejects_writes_and_deletes() {
        let node = Node::map();
        node.set("a", Value::from(true)).expect("write before freeze");
        node.freeze();

        assert_eq!(
            node.set("a", Value::from(false)).unwrap_err(),
            WriteRejection::Frozen
        );
        assert_eq!(node.remove("a").unwrap_err(), WriteRejection::Frozen);
        assert_eq!(node.get("a").and_then(|value| value.as_bool()), Some(true));
    }
}
