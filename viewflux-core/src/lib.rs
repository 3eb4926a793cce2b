//! Core types for viewflux
//!
//! This crate provides a single-threaded action pipeline and a view layer
//! bound to observable models, following a Flux-inspired architecture.
//!
//! # Core Concepts
//!
//! - **Action**: a named request with a JSON payload, queued FIFO
//! - **Reducer**: the handler for one action type, completing with a value
//! - **Dispatcher**: the single consumer that runs one reducer per tick
//! - **Scheduler**: the interval loop driving the dispatcher
//! - **Model**: observable attributes that push changes into bound elements
//! - **ViewTree**: mounted views, their event maps and child views
//! - **EventBus**: `start`, `finish`, `error` and `fatal` notifications
//!
//! # Basic Example
//!
//! ```
//! use serde_json::{json, Value};
//! use viewflux_core::prelude::*;
//!
//! #[derive(Default)]
//! struct AppState {
//!     counter: i64,
//! }
//!
//! let mut dispatcher = Dispatcher::new(AppState::default());
//! dispatcher.bind_reducer(Reducer::new(
//!     "increment",
//!     |state: &mut AppState, _data: Value, done: Completion| {
//!         state.counter += 1;
//!         done.complete(json!({ "count": state.counter }));
//!     },
//! ));
//!
//! let document = Document::parse(r#"<main id="app"></main>"#).unwrap();
//! let mut tree = ViewTree::new(dispatcher.context().clone(), document);
//!
//! let counter = ViewClass::builder("Counter")
//!     .template(r#"<div><span data-role="bind" data-name="count">0</span><button>+</button></div>"#)
//!     .handler("onIncrement", |scope: &mut ViewScope<'_>, _: &Invocation| {
//!         scope.dispatch_with(Action::new("increment", json!({})), "onIncremented");
//!     })
//!     .handler("onIncremented", |scope: &mut ViewScope<'_>, result: &Invocation| {
//!         if let Some(count) = result.arg(0).map(|r| r["count"].clone()) {
//!             scope.set_attr("count", count);
//!         }
//!     })
//!     .event("click button", "onIncrement")
//!     .build()
//!     .unwrap();
//!
//! let id = tree.create(counter, "#app", None).unwrap();
//! let button = tree.document().query_first("button").unwrap().unwrap();
//! tree.trigger(&button, "click", Vec::new());
//!
//! dispatcher.tick().unwrap();
//! tree.pump();
//!
//! let span = tree.element(id).unwrap().select_first("span").unwrap().unwrap();
//! assert_eq!(span.text(), "1");
//! ```
//!
//! # Hosting
//!
//! Hosts own the dispatcher and the view tree on one thread. A
//! [`Scheduler`] ticks the dispatcher on a fixed interval; after every tick
//! the host calls [`ViewTree::pump`] to deliver results to views and then
//! redraws from the document.

pub mod action;
pub mod binding;
pub mod bus;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod dom;
pub mod error;
pub mod logger;
pub mod model;
pub mod plugin;
pub mod reducer;
pub mod refs;
pub mod routes;
pub mod scheduler;
pub mod schema;
pub mod store;
pub mod testing;
pub mod view;
pub mod work;

// Queue and reducer exports
pub use action::{Action, ActionKind};
pub use dispatcher::{DispatchHandle, Dispatcher, Module, QueueItem, TickOutcome};
pub use reducer::{Completion, Reducer, ReducerRegistry, Subscriber};
pub use scheduler::{FatalPolicy, Scheduler, SchedulerConfig};
pub use schema::{FieldRule, FieldType, ObjectSchema, Schema, ValidationErrors};

// Store exports
pub use store::{ComposedMiddleware, LoggingMiddleware, Middleware, NoopMiddleware, Store};

// Notification exports
pub use bus::{AppEvent, ErrorReport, EventBus, EventType, ListenerId};
pub use work::{WorkKey, WorkTracker};

// Model and binding exports
pub use binding::{bind_model, unbind_model, Binding};
pub use model::{ChangePolicy, Model, OwnerId};
pub use plugin::{Plugin, PluginRegistry};
pub use refs::{Ref, Refs};

// View exports
pub use context::AppContext;
pub use dom::{Document, Element, Selector};
pub use routes::{RouteMiss, RouteTable};
pub use view::{
    Container, DomEvent, EventTarget, Handler, Invocation, Layout, Lifecycle, ModelInput,
    Placement, Template, ViewClass, ViewClassBuilder, ViewId, ViewScope, ViewTree, ViewUpdate,
};

pub use config::Config;
pub use error::{ConfigError, DispatchError, MarkupError, SelectorError, ViewError};
pub use logger::{ActionLogConfig, ActionLoggerConfig, ActionLoggerMiddleware};

// Testing exports
pub use testing::{capture, DispatchHarness, EventRecorder};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::action::Action;
    pub use crate::bus::{AppEvent, ErrorReport, EventBus, EventType};
    pub use crate::context::AppContext;
    pub use crate::dispatcher::{Dispatcher, Module, TickOutcome};
    pub use crate::dom::{Document, Element};
    pub use crate::error::{DispatchError, ViewError};
    pub use crate::model::Model;
    pub use crate::reducer::{Completion, Reducer};
    pub use crate::scheduler::{FatalPolicy, Scheduler, SchedulerConfig};
    pub use crate::schema::{FieldRule, ObjectSchema};
    pub use crate::store::Middleware;
    pub use crate::view::{
        Invocation, Layout, ModelInput, Placement, ViewClass, ViewId, ViewScope, ViewTree,
        ViewUpdate,
    };
}
