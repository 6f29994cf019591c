//! Change-tracking wrappers over a shared object graph.
//!
//! # Responsibility
//! - Wrap map/list nodes so that every leaf write is reported as a dotted
//!   path plus the stored plain value.
//! - Hand out exactly one wrapper per live node (reference-stable reads).
//!
//! # Invariants
//! - The identity map holds weak references only; wrappers are reclaimed
//!   once no caller holds them.
//! - Values are deep-resolved before storage, so a node is never shared
//!   between the caller's graph and the tracked graph.
//! - Private keys bypass path reporting and wrapping entirely.
//! - A failing sink never undoes or blocks the mutation it reports.

use super::value::{Node, Value, WriteRejection, LENGTH_KEY};
use log::{error, trace};
use serde_json::Value as JsonValue;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::rc::{Rc, Weak};

/// Boxed error returned by a change sink.
pub type SinkError = Box<dyn Error>;

/// Receiver of `(dotted path, stored value)` change notifications.
pub type ProxySink = Box<dyn Fn(&str, JsonValue) -> Result<(), SinkError>>;

pub type ProxyResult<T> = Result<T, ProxyError>;

/// Errors raised by proxy creation and tracked writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    /// Proxy target is null or a scalar.
    InvalidTarget,
    /// Underlying node rejected the write.
    NotWritable {
        path: String,
        reason: WriteRejection,
    },
    /// List operation on a map node.
    NotAnArray { path: String },
}

impl Display for ProxyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTarget => write!(f, "proxy target must be an object or array"),
            Self::NotWritable { path, reason } => {
                write!(f, "cannot write `{path}`: {reason}")
            }
            Self::NotAnArray { path } => write!(f, "`{path}` is not an array"),
        }
    }
}

impl Error for ProxyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotWritable { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// Keys that are stored without tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateKeys {
    prefix: Option<String>,
    exact: BTreeSet<String>,
}

impl Default for PrivateKeys {
    /// Underscore-prefixed keys are private.
    fn default() -> Self {
        Self::with_prefix("_")
    }
}

impl PrivateKeys {
    /// No key is private.
    pub fn none() -> Self {
        Self {
            prefix: None,
            exact: BTreeSet::new(),
        }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: (!prefix.is_empty()).then_some(prefix),
            exact: BTreeSet::new(),
        }
    }

    /// Adds one exact private key.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.exact.insert(key.into());
        self
    }

    pub fn is_private(&self, key: &str) -> bool {
        self.exact.contains(key)
            || self
                .prefix
                .as_deref()
                .is_some_and(|prefix| key.starts_with(prefix))
    }
}

/// Factory and identity map for tracked objects.
pub struct ProxyHandler {
    inner: Rc<HandlerInner>,
}

struct HandlerInner {
    sink: ProxySink,
    private_keys: PrivateKeys,
    proxies: RefCell<HashMap<usize, Weak<ProxyInner>>>,
}

impl HandlerInner {
    fn notify(&self, path: &str, value: JsonValue) {
        if let Err(err) = (self.sink)(path, value) {
            error!(
                "event=proxy_notify module=tracking status=error path={} error={}",
                path, err
            );
        }
    }
}

impl ProxyHandler {
    /// Creates a handler with the default private-key policy.
    pub fn new(sink: impl Fn(&str, JsonValue) -> Result<(), SinkError> + 'static) -> Self {
        Self::with_private_keys(sink, PrivateKeys::default())
    }

    pub fn with_private_keys(
        sink: impl Fn(&str, JsonValue) -> Result<(), SinkError> + 'static,
        private_keys: PrivateKeys,
    ) -> Self {
        Self {
            inner: Rc::new(HandlerInner {
                sink: Box::new(sink),
                private_keys,
                proxies: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// Wraps `target` at the root path.
    ///
    /// # Errors
    /// - `ProxyError::InvalidTarget` when `target` is null or a scalar.
    pub fn create_proxy(&self, target: &Value) -> ProxyResult<TrackedObject> {
        self.create_proxy_at(target, "")
    }

    /// Wraps `target`, reporting writes below `path`.
    ///
    /// Returns the existing wrapper when `target` is already wrapped, even if
    /// it was first reached through another path.
    pub fn create_proxy_at(&self, target: &Value, path: &str) -> ProxyResult<TrackedObject> {
        match target {
            Value::Object(node) => Ok(wrap(&self.inner, node, path)),
            _ => Err(ProxyError::InvalidTarget),
        }
    }

    /// Number of wrappers currently alive.
    pub fn live_proxies(&self) -> usize {
        self.inner
            .proxies
            .borrow()
            .values()
            .filter(|proxy| proxy.strong_count() > 0)
            .count()
    }
}

impl Debug for ProxyHandler {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyHandler")
            .field("private_keys", &self.inner.private_keys)
            .field("live_proxies", &self.live_proxies())
            .finish()
    }
}

fn wrap(handler: &Rc<HandlerInner>, node: &Node, path: &str) -> TrackedObject {
    let identity = node.identity();
    let mut proxies = handler.proxies.borrow_mut();
    if let Some(existing) = proxies.get(&identity).and_then(Weak::upgrade) {
        return TrackedObject { inner: existing };
    }

    proxies.retain(|_, proxy| proxy.strong_count() > 0);
    let inner = Rc::new(ProxyInner {
        node: node.clone(),
        path: path.to_string(),
        handler: Rc::clone(handler),
    });
    proxies.insert(identity, Rc::downgrade(&inner));
    TrackedObject { inner }
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

/// Member read through a tracked object.
#[derive(Debug, Clone)]
pub enum Field {
    /// Scalar member.
    Scalar(Value),
    /// Map or list member, wrapped for tracking.
    Object(TrackedObject),
    /// Private member, returned untouched.
    Raw(Value),
}

impl Field {
    pub fn as_object(&self) -> Option<&TrackedObject> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(value) | Self::Raw(value) => value.as_str(),
            Self::Object(_) => None,
        }
    }

    /// Plain JSON view of the member.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Scalar(value) | Self::Raw(value) => value.to_json(),
            Self::Object(object) => object.to_json(),
        }
    }
}

/// Tracking wrapper around one map or list node.
///
/// Equality is reference identity of the wrapper.
#[derive(Clone)]
pub struct TrackedObject {
    inner: Rc<ProxyInner>,
}

struct ProxyInner {
    node: Node,
    path: String,
    handler: Rc<HandlerInner>,
}

impl PartialEq for TrackedObject {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for TrackedObject {}

impl Debug for TrackedObject {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedObject")
            .field("path", &self.inner.path)
            .field("value", &self.inner.node)
            .finish()
    }
}

impl From<&TrackedObject> for Value {
    fn from(object: &TrackedObject) -> Self {
        Value::Object(object.inner.node.clone())
    }
}

impl From<TrackedObject> for Value {
    fn from(object: TrackedObject) -> Self {
        Value::from(&object)
    }
}

impl TrackedObject {
    /// Dotted path this wrapper reports under.
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Underlying node, unwrapped.
    pub fn node(&self) -> &Node {
        &self.inner.node
    }

    pub fn is_array(&self) -> bool {
        self.inner.node.is_array()
    }

    pub fn len(&self) -> usize {
        self.inner.node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.node.is_empty()
    }

    pub fn to_json(&self) -> JsonValue {
        Value::from(self).to_json()
    }

    fn handler(&self) -> &HandlerInner {
        &self.inner.handler
    }

    /// Reads one member; nested maps and lists come back wrapped.
    pub fn get(&self, key: &str) -> Option<Field> {
        let value = self.inner.node.get(key)?;
        if self.handler().private_keys.is_private(key) {
            return Some(Field::Raw(value));
        }
        match value {
            Value::Object(node) => Some(Field::Object(wrap(
                &self.inner.handler,
                &node,
                &child_path(&self.inner.path, key),
            ))),
            scalar => Some(Field::Scalar(scalar)),
        }
    }

    /// Writes one member and reports `(path, stored value)` to the sink.
    ///
    /// # Errors
    /// - `ProxyError::NotWritable` when the node is frozen or `key` is not
    ///   addressable; the sink is not called.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> ProxyResult<()> {
        let value = value.into();
        let path = child_path(&self.inner.path, key);

        if self.handler().private_keys.is_private(key) {
            return self
                .inner
                .node
                .set(key, value)
                .map(|_| ())
                .map_err(|reason| self.rejected("set", path, reason));
        }

        let resolved = value.detached();
        match self.inner.node.set(key, resolved) {
            Ok(stored) => {
                trace!("event=proxy_set module=tracking status=ok path={}", path);
                self.handler().notify(&path, stored.to_json());
                Ok(())
            }
            Err(reason) => Err(self.rejected("set", path, reason)),
        }
    }

    /// Removes one member and reports `(path, null)` to the sink.
    pub fn delete(&self, key: &str) -> ProxyResult<()> {
        let path = child_path(&self.inner.path, key);
        let private = self.handler().private_keys.is_private(key);
        match self.inner.node.remove(key) {
            Ok(_) => {
                if !private {
                    trace!("event=proxy_delete module=tracking status=ok path={}", path);
                    self.handler().notify(&path, JsonValue::Null);
                }
                Ok(())
            }
            Err(reason) => Err(self.rejected("delete", path, reason)),
        }
    }

    /// Appends to a list: reports the new index, then `length`.
    pub fn push(&self, value: impl Into<Value>) -> ProxyResult<()> {
        self.require_array()?;
        let length = self.len();
        self.set(&length.to_string(), value)?;
        self.set(LENGTH_KEY, length + 1)
    }

    /// Removes the last list entry: reports the index deletion, then `length`.
    pub fn pop(&self) -> ProxyResult<Option<Value>> {
        self.require_array()?;
        let length = self.len();
        if length == 0 {
            self.set(LENGTH_KEY, 0_usize)?;
            return Ok(None);
        }
        let last_key = (length - 1).to_string();
        let last = self.inner.node.get(&last_key);
        self.delete(&last_key)?;
        self.set(LENGTH_KEY, length - 1)?;
        Ok(last)
    }

    fn require_array(&self) -> ProxyResult<()> {
        if self.is_array() {
            Ok(())
        } else {
            Err(ProxyError::NotAnArray {
                path: self.inner.path.clone(),
            })
        }
    }

    fn rejected(&self, operation: &str, path: String, reason: WriteRejection) -> ProxyError {
        error!(
            "event=proxy_{} module=tracking status=error path={} reason={}",
            operation, path, reason
        );
        ProxyError::NotWritable { path, reason }
    }
}
