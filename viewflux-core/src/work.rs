//! In-flight work tracking
//!
//! Independent of the action queue: reducers that start asynchronous work
//! register it here so the UI can show a busy indicator.
//!
//! - [`WorkTracker::add`] emits [`AppEvent::Start`] when the first item arrives
//! - [`WorkTracker::remove`] emits [`AppEvent::Finish`] when the last item leaves
//!
//! Re-adding a tracked key or removing an unknown one changes nothing and
//! emits nothing.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tokio::time::Instant;
use tracing::debug;

use crate::bus::{AppEvent, EventBus};

/// Identifies one piece of in-flight work.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct WorkKey(String);

impl WorkKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WorkKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for WorkKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for WorkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shared registry of in-flight work keyed by id with start time.
///
/// Cloning shares the registry.
#[derive(Clone)]
pub struct WorkTracker {
    work: Rc<RefCell<HashMap<WorkKey, Instant>>>,
    bus: EventBus,
}

impl fmt::Debug for WorkTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkTracker")
            .field("in_flight", &self.len())
            .finish()
    }
}

impl WorkTracker {
    pub fn new(bus: EventBus) -> Self {
        Self {
            work: Rc::new(RefCell::new(HashMap::new())),
            bus,
        }
    }

    /// Track a work item. Returns `false` if the key was already tracked.
    pub fn add(&self, key: impl Into<WorkKey>) -> bool {
        let key = key.into();
        let len = {
            let mut work = self.work.borrow_mut();
            if work.contains_key(&key) {
                return false;
            }
            debug!(work = %key, "Work started");
            work.insert(key, Instant::now());
            work.len()
        };

        if len == 1 {
            self.bus.emit(AppEvent::Start);
        }
        true
    }

    /// Stop tracking a work item. Returns `false` if the key was unknown.
    pub fn remove(&self, key: impl Into<WorkKey>) -> bool {
        let key = key.into();
        let len = {
            let mut work = self.work.borrow_mut();
            if work.remove(&key).is_none() {
                return false;
            }
            debug!(work = %key, "Work finished");
            work.len()
        };

        if len == 0 {
            self.bus.emit(AppEvent::Finish);
        }
        true
    }

    pub fn contains(&self, key: &WorkKey) -> bool {
        self.work.borrow().contains_key(key)
    }

    /// When a tracked item was added.
    pub fn started_at(&self, key: &WorkKey) -> Option<Instant> {
        self.work.borrow().get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.work.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.work.borrow().is_empty()
    }

    /// Tracked keys, oldest first.
    pub fn ids(&self) -> Vec<WorkKey> {
        let work = self.work.borrow();
        let mut ids: Vec<_> = work.iter().map(|(k, at)| (*at, k.clone())).collect();
        ids.sort();
        ids.into_iter().map(|(_, k)| k).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventType;
    use std::cell::Cell;
    use std::time::Duration;

    fn counting(bus: &EventBus, event_type: EventType) -> Rc<Cell<usize>> {
        let count = Rc::new(Cell::new(0));
        let sink = Rc::clone(&count);
        bus.subscribe(event_type, move |_| sink.set(sink.get() + 1));
        count
    }

    #[test]
    fn test_start_and_finish_only_on_edges() {
        let bus = EventBus::new();
        let starts = counting(&bus, EventType::Start);
        let finishes = counting(&bus, EventType::Finish);
        let work = WorkTracker::new(bus);

        assert!(work.add("a"));
        assert!(work.add("b"));
        assert_eq!(work.len(), 2);
        assert!(work.remove("a"));
        assert_eq!((starts.get(), finishes.get()), (1, 0));

        assert!(work.remove("b"));
        assert_eq!((starts.get(), finishes.get()), (1, 1));
        assert!(work.is_empty());
    }

    #[test]
    fn test_duplicate_add_and_unknown_remove_are_silent() {
        let bus = EventBus::new();
        let starts = counting(&bus, EventType::Start);
        let finishes = counting(&bus, EventType::Finish);
        let work = WorkTracker::new(bus);

        assert!(!work.remove("missing"));
        assert!(work.add("a"));
        assert!(!work.add("a"));
        assert_eq!(work.len(), 1);
        assert_eq!((starts.get(), finishes.get()), (1, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ids_oldest_first() {
        let work = WorkTracker::new(EventBus::new());
        work.add("late");
        tokio::time::advance(Duration::from_millis(5)).await;
        work.add("later");

        assert_eq!(work.ids(), vec![WorkKey::new("late"), WorkKey::new("later")]);
        let first = work.started_at(&WorkKey::new("late")).unwrap();
        let second = work.started_at(&WorkKey::new("later")).unwrap();
        assert!(second > first);
        assert!(work.contains(&"late".into()));
    }
}
