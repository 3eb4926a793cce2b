//! Action type for serialized state mutations

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How an action travels once a view dispatches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Queued and handed to the reducer registered for its type.
    #[default]
    Action,
    /// Triggered synchronously as a DOM event on the dispatching view's root
    /// element, where parent views pick it up through `@event` delegation.
    Event,
}

/// A typed request for a state mutation
///
/// Actions are immutable once dispatched: the queue takes ownership and the
/// reducer only ever sees the `data` payload.
///
/// # Example
/// ```
/// use serde_json::json;
/// use viewflux_core::Action;
///
/// let action = Action::new("save-user-profile", json!({ "id": 7 }))
///     .with_option("source", json!("form"));
/// assert_eq!(action.name(), "save-user-profile");
/// assert!(!action.is_event());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Reducer lookup key.
    #[serde(rename = "type")]
    pub action_type: String,
    /// Payload handed to the reducer.
    #[serde(default)]
    pub data: Value,
    /// Caller supplied metadata.
    #[serde(default)]
    pub options: Map<String, Value>,
    #[serde(default)]
    pub kind: ActionKind,
}

impl Action {
    /// Create a queued action.
    pub fn new(action_type: impl Into<String>, data: Value) -> Self {
        Self {
            action_type: action_type.into(),
            data,
            options: Map::new(),
            kind: ActionKind::Action,
        }
    }

    /// Create an event-kind action carrying positional arguments.
    pub fn event(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            action_type: name.into(),
            data: Value::Array(args),
            options: Map::new(),
            kind: ActionKind::Event,
        }
    }

    /// Attach one option.
    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Merge a set of options, overwriting existing keys.
    pub fn with_options(mut self, options: Map<String, Value>) -> Self {
        self.options.extend(options);
        self
    }

    /// The action type, used for reducer lookup and logging.
    pub fn name(&self) -> &str {
        &self.action_type
    }

    pub fn is_event(&self) -> bool {
        self.kind == ActionKind::Event
    }

    /// Positional arguments of an event-kind action.
    ///
    /// A non-array payload is treated as a single argument; `null` as none.
    pub fn event_args(&self) -> Vec<Value> {
        match &self.data {
            Value::Array(args) => args.clone(),
            Value::Null => Vec::new(),
            other => vec![other.clone()],
        }
    }
}
