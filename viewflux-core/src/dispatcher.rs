//! Serialized action queue
//!
//! [`DispatchHandle`] is the producer side: it enqueues and returns
//! immediately. [`Dispatcher`] is the single consumer: each call to
//! [`Dispatcher::tick`] pops at most one item and runs at most one reducer.
//! A reducer that dispatches again only appends to the queue, so its
//! follow-up runs on a later tick instead of nesting on the stack.
//!
//! # Example
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use serde_json::{json, Value};
//! use viewflux_core::{Action, Dispatcher, Reducer, TickOutcome};
//!
//! #[derive(Default)]
//! struct AppState {
//!     count: i64,
//! }
//!
//! let mut dispatcher = Dispatcher::new(AppState::default());
//! dispatcher.bind_reducer(Reducer::new("increment", |state: &mut AppState, _data: Value, done| {
//!     state.count += 1;
//!     done.complete(json!(state.count));
//! }));
//!
//! let seen = Rc::new(RefCell::new(None));
//! let sink = Rc::clone(&seen);
//! dispatcher.dispatch_with(Action::new("increment", json!({})), move |v| *sink.borrow_mut() = Some(v));
//! assert_eq!(dispatcher.number_of_action(), 1);
//!
//! let outcome = dispatcher.tick().unwrap();
//! assert!(matches!(outcome, TickOutcome::Reduced { .. }));
//! assert_eq!(*seen.borrow(), Some(json!(1)));
//! assert_eq!(dispatcher.number_of_action(), 0);
//! ```

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::bus::{ErrorReport, EventBus};
use crate::context::AppContext;
use crate::error::DispatchError;
use crate::plugin::Plugin;
use crate::reducer::{Callback, Completion, CompletionGate, Reducer, ReducerRegistry, Subscriber};
use crate::schema::ValidationErrors;
use crate::store::{Middleware, NoopMiddleware, Store};
use crate::view::{Layout, ViewClass};
use crate::work::WorkKey;
use crate::Action;

/// A queued action with its optional listener
#[derive(Debug)]
pub struct QueueItem {
    pub action: Action,
    pub subscriber: Option<Subscriber>,
}

/// Cloneable producer side of the action queue
#[derive(Clone)]
pub struct DispatchHandle {
    tx: mpsc::UnboundedSender<QueueItem>,
    pending: Rc<Cell<usize>>,
}

impl fmt::Debug for DispatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchHandle")
            .field("pending", &self.pending.get())
            .finish()
    }
}

impl DispatchHandle {
    fn new(tx: mpsc::UnboundedSender<QueueItem>) -> Self {
        Self {
            tx,
            pending: Rc::new(Cell::new(0)),
        }
    }

    /// Enqueue an action without a listener
    pub fn dispatch(&self, action: Action) {
        self.enqueue(QueueItem {
            action,
            subscriber: None,
        });
    }

    /// Enqueue an action whose reducer result is passed to `subscriber`
    pub fn dispatch_with(&self, action: Action, subscriber: impl FnOnce(Value) + 'static) {
        self.enqueue(QueueItem {
            action,
            subscriber: Some(Subscriber::callback(subscriber)),
        });
    }

    /// Enqueue with an explicit subscriber and extra options merged into the action
    pub fn dispatch_with_options(
        &self,
        action: Action,
        subscriber: Option<Subscriber>,
        options: Map<String, Value>,
    ) {
        self.enqueue(QueueItem {
            action: action.with_options(options),
            subscriber,
        });
    }

    /// Number of queued items not yet taken by a tick
    pub fn pending(&self) -> usize {
        self.pending.get()
    }

    fn enqueue(&self, item: QueueItem) {
        let action_type = item.action.action_type.clone();
        match self.tx.send(item) {
            Ok(()) => {
                self.pending.set(self.pending.get() + 1);
                debug!(action = %action_type, pending = self.pending.get(), "Dispatched action");
            }
            Err(_) => warn!(action = %action_type, "Dispatcher dropped, action discarded"),
        }
    }

    fn taken(&self) {
        self.pending.set(self.pending.get().saturating_sub(1));
    }
}

/// Result of one successful [`Dispatcher::tick`]
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The queue was empty
    Idle,
    /// The reducer for the head item was invoked
    Reduced { action_type: String },
    /// The head item's payload failed its schema and was dropped
    Rejected {
        action_type: String,
        errors: ValidationErrors,
    },
}

impl TickOutcome {
    pub fn is_idle(&self) -> bool {
        matches!(self, TickOutcome::Idle)
    }
}

/// Tagged registration accepted by [`Dispatcher::use_module`]
pub enum Module<S> {
    Reducer(Reducer<S>),
    Layout(Layout),
    Store(S),
    Component { name: String, view: Rc<ViewClass> },
    Popup { name: String, view: Rc<ViewClass> },
    Plugin { kind: String, plugin: Plugin },
}

impl<S> fmt::Debug for Module<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Module::Reducer(reducer) => f.debug_tuple("Reducer").field(reducer).finish(),
            Module::Layout(layout) => f.debug_tuple("Layout").field(&layout.name).finish(),
            Module::Store(_) => f.write_str("Store(..)"),
            Module::Component { name, .. } => f.debug_tuple("Component").field(name).finish(),
            Module::Popup { name, .. } => f.debug_tuple("Popup").field(name).finish(),
            Module::Plugin { kind, .. } => f.debug_tuple("Plugin").field(kind).finish(),
        }
    }
}

/// Single consumer of the action queue
///
/// Owns the store, the reducer registry and the receiving end of the queue.
/// Drive it with [`Scheduler`](crate::Scheduler) or call [`tick`](Self::tick)
/// directly.
pub struct Dispatcher<S, M: Middleware = NoopMiddleware> {
    store: Store<S>,
    reducers: ReducerRegistry<S>,
    rx: mpsc::UnboundedReceiver<QueueItem>,
    context: AppContext,
    middleware: M,
}

impl<S: 'static> Dispatcher<S, NoopMiddleware> {
    pub fn new(state: S) -> Self {
        Self::with_middleware(state, NoopMiddleware)
    }
}

impl<S: 'static, M: Middleware> Dispatcher<S, M> {
    /// Create a dispatcher that runs `middleware` around every reducer
    pub fn with_middleware(state: S, middleware: M) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = Store::new(state);
        let context = AppContext::new(DispatchHandle::new(tx), EventBus::new());
        context.attach_store(store.cell());

        Self {
            store,
            reducers: ReducerRegistry::new(),
            rx,
            context,
            middleware,
        }
    }

    /// Process at most one queued item
    ///
    /// The item is always consumed before an error is returned; it is never
    /// re-queued. The dispatcher stays usable after any error.
    pub fn tick(&mut self) -> Result<TickOutcome, DispatchError> {
        let Ok(QueueItem { action, subscriber }) = self.rx.try_recv() else {
            return Ok(TickOutcome::Idle);
        };
        self.context.handle().taken();

        let Some(reducer) = self.reducers.get(action.name()) else {
            error!(action = %action.name(), "No reducer registered for action");
            return Err(DispatchError::UnregisteredReducer {
                action_type: action.action_type,
            });
        };

        let callback: Callback = match subscriber {
            None => Box::new(|_| {}),
            Some(Subscriber::Callback(callback)) => callback,
            Some(Subscriber::Unresolved(name)) => {
                error!(action = %action.name(), subscriber = %name, "Subscriber is not callable");
                return Err(DispatchError::InvalidSubscriber {
                    action_type: action.action_type,
                    subscriber: name,
                });
            }
        };

        self.middleware.before(&action);

        if let Some(errors) = reducer.schema().and_then(|schema| schema.validate(&action.data)) {
            warn!(action = %action.name(), %errors, "Payload rejected by schema");
            self.middleware.after(&action, false);
            self.context.bus().report(ErrorReport::Validation {
                action_type: action.action_type.clone(),
                errors: errors.clone(),
            });
            return Ok(TickOutcome::Rejected {
                action_type: action.action_type,
                errors,
            });
        }

        let Action {
            action_type, data, ..
        } = action.clone();
        debug!(action = %action_type, "Invoking reducer");
        let gate = CompletionGate::holding();
        let done = Completion::new(
            action_type.clone(),
            callback,
            self.context.clone(),
            Rc::clone(&gate),
        );
        {
            let mut state = self.store.state_mut();
            reducer.invoke(&mut state, data, done);
        }
        let parked = gate.borrow_mut().release();
        self.middleware.after(&action, true);
        if let Some((callback, value)) = parked {
            callback(value);
        }

        Ok(TickOutcome::Reduced { action_type })
    }

    pub fn dispatch(&self, action: Action) {
        self.context.handle().dispatch(action);
    }

    pub fn dispatch_with(&self, action: Action, subscriber: impl FnOnce(Value) + 'static) {
        self.context.handle().dispatch_with(action, subscriber);
    }

    pub fn dispatch_with_options(
        &self,
        action: Action,
        subscriber: Option<Subscriber>,
        options: Map<String, Value>,
    ) {
        self.context
            .handle()
            .dispatch_with_options(action, subscriber, options);
    }

    /// Register a reducer, returning the one it replaced
    pub fn bind_reducer(&mut self, reducer: Reducer<S>) -> Option<Reducer<S>> {
        self.reducers.bind(reducer)
    }

    pub fn combine_reducer(&mut self, reducers: impl IntoIterator<Item = Reducer<S>>) {
        self.reducers.combine(reducers);
    }

    /// Replace the application state, returning the previous one
    pub fn bind_store(&mut self, state: S) -> S {
        self.store.replace(state)
    }

    /// Register a presentation plugin for a `data-type` tag
    pub fn bind_plugin(&mut self, kind: &str, plugin: Plugin) {
        self.context.plugins().bind(kind, plugin);
    }

    /// Route a tagged module to its registry
    pub fn use_module(&mut self, module: Module<S>) {
        debug!(module = ?module, "Registering module");
        match module {
            Module::Reducer(reducer) => {
                self.bind_reducer(reducer);
            }
            Module::Layout(layout) => self.context.bind_layout(layout),
            Module::Store(state) => {
                self.bind_store(state);
            }
            Module::Component { name, view } => self.context.bind_component(name, view),
            Module::Popup { name, view } => self.context.bind_popup(name, view),
            Module::Plugin { kind, plugin } => self.bind_plugin(&kind, plugin),
        }
    }

    pub fn use_modules(&mut self, modules: impl IntoIterator<Item = Module<S>>) {
        for module in modules {
            self.use_module(module);
        }
    }

    /// Track in-flight asynchronous work
    pub fn add_action(&self, key: impl Into<WorkKey>) -> bool {
        self.context.work().add(key)
    }

    pub fn remove_action(&self, key: impl Into<WorkKey>) -> bool {
        self.context.work().remove(key)
    }

    /// Report an application error on the `error` channel
    pub fn add_error(&self, error: Value) {
        self.context.bus().report(ErrorReport::Reported { error });
    }

    /// Number of queued actions
    pub fn number_of_action(&self) -> usize {
        self.context.handle().pending()
    }

    /// Number of tracked in-flight work items
    pub fn number_of_work_action(&self) -> usize {
        self.context.work().len()
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub fn bus(&self) -> &EventBus {
        self.context.bus()
    }

    pub fn store(&self) -> &Store<S> {
        &self.store
    }

    pub fn reducers(&self) -> &ReducerRegistry<S> {
        &self.reducers
    }

    pub fn middleware(&self) -> &M {
        &self.middleware
    }

    pub fn middleware_mut(&mut self) -> &mut M {
        &mut self.middleware
    }
}

impl<S, M: Middleware> fmt::Debug for Dispatcher<S, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("reducers", &self.reducers)
            .field("pending", &self.context.handle().pending())
            .finish_non_exhaustive()
    }
}
