//! Reducers and the registry that resolves them by action type

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use crate::context::AppContext;
use crate::schema::Schema;
use crate::Action;

/// A completion callback receiving the reducer's result.
pub type Callback = Box<dyn FnOnce(Value)>;

/// Listener attached to a queued action
pub enum Subscriber {
    /// Invoked once with the value the reducer completes with
    Callback(Callback),
    /// A handler name that did not resolve to anything callable
    ///
    /// Rejected with [`DispatchError::InvalidSubscriber`](crate::DispatchError::InvalidSubscriber)
    /// when the item reaches the head of the queue.
    Unresolved(String),
}

impl Subscriber {
    pub fn callback(f: impl FnOnce(Value) + 'static) -> Self {
        Self::Callback(Box::new(f))
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subscriber::Callback(_) => f.write_str("Subscriber::Callback(..)"),
            Subscriber::Unresolved(name) => f.debug_tuple("Subscriber::Unresolved").field(name).finish(),
        }
    }
}

/// Holds back completions while the reducer still borrows the state
#[derive(Default)]
pub(crate) struct CompletionGate {
    holding: bool,
    parked: Option<(Callback, Value)>,
}

impl CompletionGate {
    pub(crate) fn holding() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            holding: true,
            parked: None,
        }))
    }

    /// Stop holding; returns a completion delivered in the meantime
    pub(crate) fn release(&mut self) -> Option<(Callback, Value)> {
        self.holding = false;
        self.parked.take()
    }
}

/// The completion handed to a reducer
///
/// Consumed by [`complete`](Completion::complete), so a reducer can answer
/// its dispatcher at most once. Dropping it without completing is allowed;
/// the subscriber is then never called.
///
/// Completing inside the reducer body delivers the value once the reducer
/// returns and the state is no longer borrowed. Completing later delivers it
/// immediately.
pub struct Completion {
    action_type: String,
    callback: Callback,
    context: AppContext,
    gate: Rc<RefCell<CompletionGate>>,
}

impl Completion {
    pub(crate) fn new(
        action_type: String,
        callback: Callback,
        context: AppContext,
        gate: Rc<RefCell<CompletionGate>>,
    ) -> Self {
        Self {
            action_type,
            callback,
            context,
            gate,
        }
    }

    /// Deliver the result to the dispatch site
    pub fn complete(self, value: Value) {
        let Completion {
            action_type,
            callback,
            gate,
            ..
        } = self;
        debug!(action = %action_type, "Reducer completed");
        {
            let mut gate = gate.borrow_mut();
            if gate.holding {
                gate.parked = Some((callback, value));
                return;
            }
        }
        callback(value)
    }

    /// Type of the action being reduced
    pub fn action_type(&self) -> &str {
        &self.action_type
    }

    /// Application context, for follow-up dispatches and work tracking
    pub fn context(&self) -> &AppContext {
        &self.context
    }

    /// Queue a follow-up action; it runs on a later tick.
    pub fn dispatch(&self, action: Action) {
        self.context.dispatch(action);
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("action_type", &self.action_type)
            .finish_non_exhaustive()
    }
}

type Handler<S> = Box<dyn Fn(&mut S, Value, Completion)>;

/// The handler for one action type
///
/// # Example
/// ```
/// use serde_json::{json, Value};
/// use viewflux_core::schema::{FieldRule, ObjectSchema};
/// use viewflux_core::Reducer;
///
/// #[derive(Default)]
/// struct AppState {
///     count: i64,
/// }
///
/// let reducer = Reducer::new("add", |state: &mut AppState, data: Value, done| {
///     state.count += data["by"].as_i64().unwrap_or(1);
///     done.complete(json!(state.count));
/// })
/// .with_schema(ObjectSchema::new().field("by", FieldRule::integer()));
///
/// assert_eq!(reducer.action_name(), "add");
/// assert!(reducer.schema().is_some());
/// ```
pub struct Reducer<S> {
    action_name: String,
    schema: Option<Box<dyn Schema>>,
    handler: Handler<S>,
}

impl<S> Reducer<S> {
    pub fn new(
        action_name: impl Into<String>,
        handler: impl Fn(&mut S, Value, Completion) + 'static,
    ) -> Self {
        Self {
            action_name: action_name.into(),
            schema: None,
            handler: Box::new(handler),
        }
    }

    /// Validate payloads before the handler runs
    pub fn with_schema(mut self, schema: impl Schema + 'static) -> Self {
        self.schema = Some(Box::new(schema));
        self
    }

    pub fn action_name(&self) -> &str {
        &self.action_name
    }

    pub fn schema(&self) -> Option<&dyn Schema> {
        self.schema.as_deref()
    }

    pub(crate) fn invoke(&self, state: &mut S, data: Value, done: Completion) {
        (self.handler)(state, data, done)
    }
}

impl<S> fmt::Debug for Reducer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reducer")
            .field("action_name", &self.action_name)
            .field("schema", &self.schema.is_some())
            .finish()
    }
}

/// Reducers keyed by exact action type
pub struct ReducerRegistry<S> {
    reducers: HashMap<String, Reducer<S>>,
}

impl<S> Default for ReducerRegistry<S> {
    fn default() -> Self {
        Self {
            reducers: HashMap::new(),
        }
    }
}

impl<S> fmt::Debug for ReducerRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReducerRegistry")
            .field("reducers", &self.names())
            .finish()
    }
}

impl<S> ReducerRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reducer under its action name
    ///
    /// The last registration for a name wins; the replaced reducer is returned.
    pub fn bind(&mut self, reducer: Reducer<S>) -> Option<Reducer<S>> {
        let name = reducer.action_name.clone();
        let previous = self.reducers.insert(name, reducer);
        if let Some(previous) = &previous {
            debug!(action = %previous.action_name, "Replaced reducer");
        }
        previous
    }

    /// Register several reducers in order
    pub fn combine(&mut self, reducers: impl IntoIterator<Item = Reducer<S>>) {
        for reducer in reducers {
            self.bind(reducer);
        }
    }

    pub fn get(&self, action_type: &str) -> Option<&Reducer<S>> {
        self.reducers.get(action_type)
    }

    pub fn contains(&self, action_type: &str) -> bool {
        self.reducers.contains_key(action_type)
    }

    pub fn len(&self) -> usize {
        self.reducers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reducers.is_empty()
    }

    /// Registered action names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.reducers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
