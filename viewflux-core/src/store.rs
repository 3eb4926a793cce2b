//! Shared application state and dispatch middleware

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::Action;

/// Process-wide application state container
///
/// The store is a shared cell: the dispatcher hands `&mut S` to reducers
/// and views read it through [`AppContext::with_states`](crate::AppContext::with_states).
/// Cloning a `Store` clones the handle, not the state.
///
/// # Example
/// ```
/// use viewflux_core::Store;
///
/// #[derive(Default)]
/// struct AppState {
///     count: i64,
/// }
///
/// let store = Store::new(AppState::default());
/// store.with_state_mut(|state| state.count += 1);
/// assert_eq!(store.state().count, 1);
/// ```
pub struct Store<S> {
    state: Rc<RefCell<S>>,
}

impl<S> Store<S> {
    pub fn new(state: S) -> Self {
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    /// Borrow the current state
    ///
    /// # Panics
    /// Panics if a reducer is currently mutating the state.
    pub fn state(&self) -> Ref<'_, S> {
        self.state.borrow()
    }

    /// Borrow the current state, or `None` while a reducer holds it.
    pub fn try_state(&self) -> Option<Ref<'_, S>> {
        self.state.try_borrow().ok()
    }

    /// Run a closure against the current state.
    pub fn with_state<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.state.borrow())
    }

    /// Mutate the state directly
    ///
    /// Use this sparingly - reducers are the intended writers.
    /// This is useful for initializing state or for tests.
    pub fn with_state_mut<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.state.borrow_mut())
    }

    pub(crate) fn state_mut(&self) -> RefMut<'_, S> {
        self.state.borrow_mut()
    }

    /// Replace the whole state, returning the previous value.
    pub fn replace(&self, state: S) -> S {
        self.state.replace(state)
    }

    pub(crate) fn cell(&self) -> Rc<RefCell<S>> {
        Rc::clone(&self.state)
    }
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<S: Default> Default for Store<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S: fmt::Debug> fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state.try_borrow() {
            Ok(state) => f.debug_struct("Store").field("state", &*state).finish(),
            Err(_) => f.debug_struct("Store").field("state", &"<borrowed>").finish(),
        }
    }
}

/// Middleware trait for intercepting actions
///
/// Implement this trait to add logging, persistence, or other
/// cross-cutting concerns to the dispatcher.
pub trait Middleware {
    /// Called once the reducer for the action has been resolved
    fn before(&mut self, action: &Action);

    /// Called after the item is processed
    ///
    /// `reduced` is `false` when the payload was rejected by the reducer's schema.
    fn after(&mut self, action: &Action, reduced: bool);
}

/// A no-op middleware that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMiddleware;

impl Middleware for NoopMiddleware {
    fn before(&mut self, _action: &Action) {}
    fn after(&mut self, _action: &Action, _reduced: bool) {}
}

/// Middleware that logs actions (for debugging)
#[derive(Debug, Clone, Default)]
pub struct LoggingMiddleware {
    /// Whether to log before the reducer runs
    pub log_before: bool,
    /// Whether to log after the reducer runs
    pub log_after: bool,
}

impl LoggingMiddleware {
    /// Create a new logging middleware with default settings (log after only)
    pub fn new() -> Self {
        Self {
            log_before: false,
            log_after: true,
        }
    }

    /// Create a logging middleware that logs both before and after
    pub fn verbose() -> Self {
        Self {
            log_before: true,
            log_after: true,
        }
    }
}

impl Middleware for LoggingMiddleware {
    fn before(&mut self, action: &Action) {
        if self.log_before {
            tracing::debug!(action = %action.name(), "Reducing action");
        }
    }

    fn after(&mut self, action: &Action, reduced: bool) {
        if self.log_after {
            tracing::debug!(action = %action.name(), reduced, "Action processed");
        }
    }
}

/// Compose multiple middleware into a single middleware
#[derive(Default)]
pub struct ComposedMiddleware {
    middlewares: Vec<Box<dyn Middleware>>,
}

impl fmt::Debug for ComposedMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposedMiddleware")
            .field("middlewares_count", &self.middlewares.len())
            .finish()
    }
}

impl ComposedMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a middleware to the composition
    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Box::new(middleware));
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

impl Middleware for ComposedMiddleware {
    fn before(&mut self, action: &Action) {
        for middleware in &mut self.middlewares {
            middleware.before(action);
        }
    }

    fn after(&mut self, action: &Action, reduced: bool) {
        // Reverse order for proper nesting
        for middleware in self.middlewares.iter_mut().rev() {
            middleware.after(action, reduced);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[derive(Debug, Default, PartialEq)]
    struct TestState {
        counter: i32,
    }

    #[test]
    fn test_store_shared_handle() {
        let store = Store::new(TestState::default());
        let other = store.clone();

        other.with_state_mut(|s| s.counter = 5);
        assert_eq!(store.state().counter, 5);
        assert_eq!(store.with_state(|s| s.counter), 5);
    }

    #[test]
    fn test_store_replace() {
        let store = Store::new(TestState { counter: 1 });
        let old = store.replace(TestState { counter: 9 });
        assert_eq!(old.counter, 1);
        assert_eq!(store.state().counter, 9);
    }

    #[test]
    fn test_try_state_while_mutating() {
        let store = Store::new(TestState::default());
        let guard = store.state_mut();
        assert!(store.try_state().is_none());
        drop(guard);
        assert!(store.try_state().is_some());
    }

    #[derive(Default)]
    struct CountingMiddleware {
        before_count: usize,
        after_count: usize,
        rejected: usize,
    }

    impl Middleware for CountingMiddleware {
        fn before(&mut self, _action: &Action) {
            self.before_count += 1;
        }

        fn after(&mut self, _action: &Action, reduced: bool) {
            self.after_count += 1;
            if !reduced {
                self.rejected += 1;
            }
        }
    }

    #[test]
    fn test_counting_middleware() {
        let mut middleware = CountingMiddleware::default();
        let action = Action::new("x", Value::Null);

        middleware.before(&action);
        middleware.after(&action, true);
        middleware.before(&action);
        middleware.after(&action, false);

        assert_eq!(middleware.before_count, 2);
        assert_eq!(middleware.after_count, 2);
        assert_eq!(middleware.rejected, 1);
    }

    struct OrderMiddleware {
        tag: &'static str,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Middleware for OrderMiddleware {
        fn before(&mut self, _action: &Action) {
            self.log.borrow_mut().push(format!("before:{}", self.tag));
        }

        fn after(&mut self, _action: &Action, _reduced: bool) {
            self.log.borrow_mut().push(format!("after:{}", self.tag));
        }
    }

    #[test]
    fn test_composed_middleware_nests() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut composed = ComposedMiddleware::new();
        composed.add(OrderMiddleware {
            tag: "a",
            log: Rc::clone(&log),
        });
        composed.add(OrderMiddleware {
            tag: "b",
            log: Rc::clone(&log),
        });
        assert_eq!(composed.len(), 2);

        let action = Action::new("x", Value::Null);
        composed.before(&action);
        composed.after(&action, true);

        assert_eq!(
            *log.borrow(),
            vec!["before:a", "before:b", "after:b", "after:a"]
        );
    }
}
