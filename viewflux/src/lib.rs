//! viewflux: serialized action dispatch and model-bound views
//!
//! Actions are queued FIFO and reduced one per scheduler tick. Views render
//! markup into a headless document, bind elements to observable models and
//! receive reducer results through named handlers.
//!
//! # Example
//! ```
//! use serde_json::{json, Value};
//! use viewflux::prelude::*;
//!
//! let mut dispatcher = Dispatcher::new(Vec::<String>::new());
//! dispatcher.bind_reducer(Reducer::new(
//!     "note",
//!     |notes: &mut Vec<String>, data: Value, done: Completion| {
//!         notes.push(data["text"].as_str().unwrap_or_default().to_string());
//!         done.complete(json!(notes.len()));
//!     },
//! ));
//!
//! dispatcher.dispatch(Action::new("note", json!({ "text": "hello" })));
//! assert_eq!(dispatcher.tick().unwrap(), TickOutcome::Reduced { action_type: "note".into() });
//! assert_eq!(dispatcher.store().state().len(), 1);
//! ```

// Re-export everything from core
pub use viewflux_core::*;

/// Prelude for convenient imports
pub mod prelude {
    // Queue
    pub use viewflux_core::{Action, Completion, Dispatcher, Module, Reducer, TickOutcome};

    // Scheduling
    pub use viewflux_core::{FatalPolicy, Scheduler, SchedulerConfig};

    // Notifications
    pub use viewflux_core::{AppEvent, ErrorReport, EventBus, EventType};

    // Store
    pub use viewflux_core::{
        ComposedMiddleware, LoggingMiddleware, Middleware, NoopMiddleware, Store,
    };

    // Schemas
    pub use viewflux_core::{FieldRule, ObjectSchema, Schema};

    // Views
    pub use viewflux_core::{
        AppContext, Document, Element, Invocation, Layout, Lifecycle, Model, ModelInput, Placement,
        ViewClass, ViewId, ViewScope, ViewTree, ViewUpdate,
    };

    // Errors
    pub use viewflux_core::{DispatchError, ViewError};

    // Debug
    pub use viewflux_core::{ActionLoggerConfig, ActionLoggerMiddleware};
}
