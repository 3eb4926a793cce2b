//! Process-wide notification channels
//!
//! The bus carries the busy/idle signal of the [`WorkTracker`](crate::WorkTracker),
//! non-fatal error reports, and fatal errors the scheduler chose to resume after.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::schema::ValidationErrors;

/// Channel an [`AppEvent`] is delivered on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// In-flight work went from zero to one item
    Start,
    /// In-flight work went from one to zero items
    Finish,
    /// A recoverable error was reported
    Error,
    /// A fatal dispatch error was caught by the scheduler
    Fatal,
}

/// Non-fatal error carried on the `error` channel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorReport {
    /// An action payload was rejected by its reducer's schema
    Validation {
        action_type: String,
        errors: ValidationErrors,
    },
    /// A lookup or binding failed and the operation was skipped
    Runtime { message: String },
    /// Reported by application code through `add_error`
    Reported { error: Value },
}

impl ErrorReport {
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorReport::Validation {
                action_type,
                errors,
            } => write!(f, "invalid payload for `{action_type}`: {errors}"),
            ErrorReport::Runtime { message } => f.write_str(message),
            ErrorReport::Reported { error } => write!(f, "{error}"),
        }
    }
}

/// A notification delivered to bus listeners
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    Start,
    Finish,
    Error(ErrorReport),
    Fatal(String),
}

impl AppEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            AppEvent::Start => EventType::Start,
            AppEvent::Finish => EventType::Finish,
            AppEvent::Error(_) => EventType::Error,
            AppEvent::Fatal(_) => EventType::Fatal,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Listener = Rc<dyn Fn(&AppEvent)>;

#[derive(Default)]
struct BusInner {
    next_id: Cell<u64>,
    listeners: RefCell<HashMap<EventType, Vec<(ListenerId, Listener)>>>,
}

/// Notification hub shared by the dispatcher, work tracker and views
///
/// Cloning the bus clones the handle. Listeners may subscribe or unsubscribe
/// from inside a notification; the change takes effect on the next emit.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<BusInner>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.inner.listeners.borrow();
        let counts: HashMap<_, _> = listeners.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("EventBus").field("listeners", &counts).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a listener to one channel
    pub fn subscribe(
        &self,
        event_type: EventType,
        listener: impl Fn(&AppEvent) + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        self.inner
            .listeners
            .borrow_mut()
            .entry(event_type)
            .or_default()
            .push((id, Rc::new(listener)));
        id
    }

    /// Subscribe one listener to several channels
    pub fn subscribe_many(
        &self,
        event_types: &[EventType],
        listener: impl Fn(&AppEvent) + 'static,
    ) -> Vec<ListenerId> {
        let listener: Listener = Rc::new(listener);
        event_types
            .iter()
            .map(|&event_type| {
                let listener = Rc::clone(&listener);
                self.subscribe(event_type, move |event| listener(event))
            })
            .collect()
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        let mut removed = false;
        for entries in listeners.values_mut() {
            let before = entries.len();
            entries.retain(|(entry, _)| *entry != id);
            removed |= entries.len() != before;
        }
        removed
    }

    /// Remove every listener of one channel
    pub fn unsubscribe_all(&self, event_type: EventType) {
        self.inner.listeners.borrow_mut().remove(&event_type);
    }

    pub fn listener_count(&self, event_type: EventType) -> usize {
        self.inner
            .listeners
            .borrow()
            .get(&event_type)
            .map_or(0, Vec::len)
    }

    /// Deliver an event to the listeners of its channel
    pub fn emit(&self, event: AppEvent) {
        let event_type = event.event_type();
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .borrow()
            .get(&event_type)
            .map(|entries| entries.iter().map(|(_, l)| Rc::clone(l)).collect())
            .unwrap_or_default();

        debug!(event = ?event_type, listeners = listeners.len(), "Emitting bus event");
        for listener in listeners {
            listener(&event);
        }
    }

    /// Report a non-fatal error on the `error` channel
    pub fn report(&self, report: ErrorReport) {
        self.emit(AppEvent::Error(report));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(bus: &EventBus, event_type: EventType) -> Rc<RefCell<Vec<AppEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        bus.subscribe(event_type, move |event| sink.borrow_mut().push(event.clone()));
        seen
    }

    #[test]
    fn test_emit_routes_by_type() {
        let bus = EventBus::new();
        let starts = recorder(&bus, EventType::Start);
        let errors = recorder(&bus, EventType::Error);

        bus.emit(AppEvent::Start);
        bus.report(ErrorReport::runtime("boom"));

        assert_eq!(*starts.borrow(), vec![AppEvent::Start]);
        assert_eq!(
            *errors.borrow(),
            vec![AppEvent::Error(ErrorReport::runtime("boom"))]
        );
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let seen = Rc::new(Cell::new(0));
        let sink = Rc::clone(&seen);
        let id = bus.subscribe(EventType::Finish, move |_| sink.set(sink.get() + 1));

        bus.emit(AppEvent::Finish);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(AppEvent::Finish);

        assert_eq!(seen.get(), 1);
        assert_eq!(bus.listener_count(EventType::Finish), 0);
    }

    #[test]
    fn test_subscribe_many_and_unsubscribe_all() {
        let bus = EventBus::new();
        let seen = Rc::new(Cell::new(0));
        let sink = Rc::clone(&seen);
        let ids = bus.subscribe_many(&[EventType::Start, EventType::Finish], move |_| {
            sink.set(sink.get() + 1)
        });
        assert_eq!(ids.len(), 2);

        bus.emit(AppEvent::Start);
        bus.emit(AppEvent::Finish);
        bus.unsubscribe_all(EventType::Start);
        bus.emit(AppEvent::Start);

        assert_eq!(seen.get(), 2);
    }

    #[test]
    fn test_listener_may_subscribe_during_emit() {
        let bus = EventBus::new();
        let inner_bus = bus.clone();
        bus.subscribe(EventType::Error, move |_| {
            inner_bus.subscribe(EventType::Error, |_| {});
        });

        bus.report(ErrorReport::runtime("first"));
        assert_eq!(bus.listener_count(EventType::Error), 2);
    }

    #[test]
    fn test_error_report_display() {
        let mut errors = ValidationErrors::new();
        errors.push("id", "is required");
        let report = ErrorReport::Validation {
            action_type: "save".into(),
            errors,
        };
        assert_eq!(report.to_string(), "invalid payload for `save`: id: is required");
    }
}
