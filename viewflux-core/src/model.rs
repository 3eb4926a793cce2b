//! Observable attribute map owned by a view
//!
//! Listeners are tagged with the [`OwnerId`] that registered them so a view
//! can drop all of its own subscriptions at once before rebinding.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifies who registered a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(pub u64);

/// How `set` decides whether a value changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangePolicy {
    /// Structurally equal values are unchanged
    #[default]
    Structural,
    /// Arrays and objects always count as changed; scalars compare by value
    Identity,
}

impl ChangePolicy {
    fn changed(self, old: Option<&Value>, new: &Value) -> bool {
        match (self, old) {
            (_, None) => true,
            (ChangePolicy::Identity, Some(_)) if new.is_array() || new.is_object() => true,
            (_, Some(old)) => old != new,
        }
    }
}

type ChangeFn = Rc<dyn Fn(&str, &Value)>;

#[derive(Clone)]
struct Listener {
    owner: OwnerId,
    /// `None` listens to every key
    key: Option<String>,
    callback: ChangeFn,
}

/// Flat attribute map with per-key change notification
///
/// # Example
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use serde_json::{json, Value};
/// use viewflux_core::model::{Model, OwnerId};
///
/// let mut model = Model::new();
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let sink = Rc::clone(&seen);
/// model.listen(OwnerId(1), "name", move |_key: &str, value: &Value| {
///     sink.borrow_mut().push(value.clone());
/// });
///
/// assert!(model.set("name", json!("Alice")));
/// assert!(!model.set("name", json!("Alice")));
/// assert_eq!(*seen.borrow(), vec![json!("Alice")]);
/// ```
#[derive(Default)]
pub struct Model {
    attributes: Map<String, Value>,
    listeners: Vec<Listener>,
    policy: ChangePolicy,
}

impl Clone for Model {
    /// Copies attributes and policy; listeners stay with the original.
    fn clone(&self) -> Self {
        Self {
            attributes: self.attributes.clone(),
            listeners: Vec::new(),
            policy: self.policy,
        }
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("attributes", &self.attributes)
            .field("listeners", &self.listeners.len())
            .field("policy", &self.policy)
            .finish()
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.attributes == other.attributes
    }
}

impl From<Map<String, Value>> for Model {
    fn from(attributes: Map<String, Value>) -> Self {
        Self {
            attributes,
            ..Default::default()
        }
    }
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON value; non-objects give an empty model
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(attributes) => Self::from(attributes),
            _ => Self::new(),
        }
    }

    pub fn with_policy(mut self, policy: ChangePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> ChangePolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: ChangePolicy) {
        self.policy = policy;
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Snapshot of all attributes as a JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(self.attributes.clone())
    }

    /// Set a value and notify listeners if it changed
    ///
    /// Returns whether listeners were notified.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> bool {
        let key = key.into();
        if !self.policy.changed(self.attributes.get(&key), &value) {
            return false;
        }
        self.attributes.insert(key.clone(), value);
        self.notify(&key);
        true
    }

    /// Set a value without notifying
    pub fn set_silent(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
    }

    /// Set several values; returns the keys that changed
    ///
    /// All values are stored before any listener runs.
    pub fn set_many(&mut self, attributes: Map<String, Value>) -> Vec<String> {
        let mut changed = Vec::new();
        for (key, value) in attributes {
            if self.policy.changed(self.attributes.get(&key), &value) {
                self.attributes.insert(key.clone(), value);
                changed.push(key);
            }
        }
        for key in &changed {
            self.notify(key);
        }
        changed
    }

    /// Remove a key; listeners for it receive `null`
    pub fn unset(&mut self, key: &str) -> Option<Value> {
        let previous = self.attributes.remove(key)?;
        self.notify(key);
        Some(previous)
    }

    /// Remove every attribute without notifying
    pub fn clear(&mut self) {
        self.attributes.clear();
    }

    /// Listen for changes of one key
    pub fn listen(
        &mut self,
        owner: OwnerId,
        key: impl Into<String>,
        callback: impl Fn(&str, &Value) + 'static,
    ) {
        self.listeners.push(Listener {
            owner,
            key: Some(key.into()),
            callback: Rc::new(callback),
        });
    }

    /// Listen for changes of any key
    pub fn listen_any(&mut self, owner: OwnerId, callback: impl Fn(&str, &Value) + 'static) {
        self.listeners.push(Listener {
            owner,
            key: None,
            callback: Rc::new(callback),
        });
    }

    /// Drop an owner's listeners for one key
    pub fn off(&mut self, owner: OwnerId, key: &str) {
        self.listeners
            .retain(|l| !(l.owner == owner && l.key.as_deref() == Some(key)));
    }

    /// Drop every listener registered by `owner`
    pub fn stop_listening(&mut self, owner: OwnerId) {
        self.listeners.retain(|l| l.owner != owner);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn listener_count_for(&self, owner: OwnerId) -> usize {
        self.listeners.iter().filter(|l| l.owner == owner).count()
    }

    fn notify(&self, key: &str) {
        let value = self.attributes.get(key).cloned().unwrap_or(Value::Null);
        let callbacks: Vec<ChangeFn> = self
            .listeners
            .iter()
            .filter(|l| l.key.as_deref().is_none_or(|k| k == key))
            .map(|l| Rc::clone(&l.callback))
            .collect();
        for callback in callbacks {
            callback(key, &value);
        }
    }
}
