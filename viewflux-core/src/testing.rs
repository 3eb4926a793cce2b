//! Test utilities for viewflux applications
//!
//! - [`DispatchHarness`]: a dispatcher plus a recorder of every bus event,
//!   with helpers to drain the queue
//! - [`capture`]: record bus events for any [`EventBus`]
//! - Assertion macros for recorded events
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use viewflux_core::testing::DispatchHarness;
//! use viewflux_core::{assert_event, Action, AppEvent, Reducer};
//!
//! let mut harness = DispatchHarness::new(0_i64).with_reducer(Reducer::new(
//!     "add",
//!     |count: &mut i64, data, done| {
//!         *count += data["by"].as_i64().unwrap_or(1);
//!         done.complete(json!(*count));
//!     },
//! ));
//!
//! harness.dispatch(Action::new("add", json!({ "by": 2 })));
//! harness.dispatcher().add_action("load");
//! harness.tick_until_idle();
//!
//! assert_eq!(*harness.state(), 2);
//! assert_event!(harness.events(), AppEvent::Start);
//! ```

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use crate::bus::{AppEvent, EventBus, EventType, ListenerId};
use crate::dispatcher::{Dispatcher, TickOutcome};
use crate::error::DispatchError;
use crate::reducer::Reducer;
use crate::store::{Middleware, NoopMiddleware};
use crate::Action;

const CHANNELS: [EventType; 4] = [
    EventType::Start,
    EventType::Finish,
    EventType::Error,
    EventType::Fatal,
];

/// Upper bound on ticks taken by [`DispatchHarness::tick_until_idle`]
pub const MAX_IDLE_TICKS: usize = 10_000;

/// Records every event emitted on a bus until dropped
pub struct EventRecorder {
    bus: EventBus,
    ids: Vec<ListenerId>,
    events: Rc<RefCell<Vec<AppEvent>>>,
}

/// Start recording every channel of `bus`
pub fn capture(bus: &EventBus) -> EventRecorder {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    let ids = bus.subscribe_many(&CHANNELS, move |event| sink.borrow_mut().push(event.clone()));
    EventRecorder {
        bus: bus.clone(),
        ids,
        events,
    }
}

impl EventRecorder {
    /// Events recorded so far, in emit order
    pub fn events(&self) -> Vec<AppEvent> {
        self.events.borrow().clone()
    }

    pub fn drain(&self) -> Vec<AppEvent> {
        self.events.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

impl Drop for EventRecorder {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            self.bus.unsubscribe(id);
        }
    }
}

/// A dispatcher wired to an [`EventRecorder`]
pub struct DispatchHarness<S, M: Middleware = NoopMiddleware> {
    dispatcher: Dispatcher<S, M>,
    recorder: EventRecorder,
}

impl<S: 'static> DispatchHarness<S, NoopMiddleware> {
    pub fn new(state: S) -> Self {
        Self::from_dispatcher(Dispatcher::new(state))
    }
}

impl<S: 'static, M: Middleware> DispatchHarness<S, M> {
    pub fn from_dispatcher(dispatcher: Dispatcher<S, M>) -> Self {
        let recorder = capture(dispatcher.bus());
        Self {
            dispatcher,
            recorder,
        }
    }

    pub fn with_reducer(mut self, reducer: Reducer<S>) -> Self {
        self.dispatcher.bind_reducer(reducer);
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher<S, M> {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher<S, M> {
        &mut self.dispatcher
    }

    pub fn dispatch(&self, action: Action) {
        self.dispatcher.dispatch(action);
    }

    pub fn tick(&mut self) -> Result<TickOutcome, DispatchError> {
        self.dispatcher.tick()
    }

    /// Tick until the queue reports idle, collecting every outcome
    ///
    /// Errors do not stop the loop; the failing item is consumed like any
    /// other. Actions dispatched by reducers are drained too.
    ///
    /// # Panics
    /// Panics after [`MAX_IDLE_TICKS`] ticks without reaching idle, which
    /// means reducers keep dispatching each other.
    pub fn tick_until_idle(&mut self) -> Vec<Result<TickOutcome, DispatchError>> {
        let mut outcomes = Vec::new();
        for _ in 0..MAX_IDLE_TICKS {
            match self.dispatcher.tick() {
                Ok(TickOutcome::Idle) => return outcomes,
                outcome => outcomes.push(outcome),
            }
        }
        let recent: Vec<_> = outcomes.iter().rev().take(5).collect();
        panic!(
            "queue did not drain within {MAX_IDLE_TICKS} ticks ({} still queued); last outcomes: {recent:?}",
            self.dispatcher.number_of_action()
        );
    }

    pub fn state(&self) -> Ref<'_, S> {
        self.dispatcher.store().state()
    }

    pub fn events(&self) -> Vec<AppEvent> {
        self.recorder.events()
    }

    pub fn drain_events(&mut self) -> Vec<AppEvent> {
        self.recorder.drain()
    }
}

/// Assert that an event matching a pattern was recorded.
///
/// ```ignore
/// assert_event!(harness.events(), AppEvent::Error(ErrorReport::Validation { .. }));
/// ```
#[macro_export]
macro_rules! assert_event {
    ($events:expr, $pattern:pat $(if $guard:expr)?) => {
        assert!(
            $events.iter().any(|e| matches!(e, $pattern $(if $guard)?)),
            "Expected event matching `{}`, but got: {:?}",
            stringify!($pattern),
            $events
        );
    };
}

/// Assert that no recorded event matches a pattern.
#[macro_export]
macro_rules! assert_no_event {
    ($events:expr, $pattern:pat $(if $guard:expr)?) => {
        assert!(
            !$events.iter().any(|e| matches!(e, $pattern $(if $guard)?)),
            "Expected no event matching `{}`, but got: {:?}",
            stringify!($pattern),
            $events
        );
    };
}

/// Count recorded events matching a pattern.
#[macro_export]
macro_rules! count_events {
    ($events:expr, $pattern:pat $(if $guard:expr)?) => {
        $events.iter().filter(|e| matches!(e, $pattern $(if $guard)?)).count()
    };
}
