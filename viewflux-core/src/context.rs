//! Application context shared by the dispatcher, reducers and views
//!
//! Constructed by [`Dispatcher`](crate::Dispatcher) and handed out by
//! reference. Cloning shares the same registries, so several independent
//! applications can live in one process.

use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};
use tracing::warn;

use crate::bus::{ErrorReport, EventBus};
use crate::dispatcher::DispatchHandle;
use crate::plugin::PluginRegistry;
use crate::routes::RouteTable;
use crate::view::{Layout, ViewClass};
use crate::work::WorkTracker;
use crate::Action;

struct ContextInner {
    handle: DispatchHandle,
    bus: EventBus,
    work: WorkTracker,
    plugins: PluginRegistry,
    components: RefCell<HashMap<String, Rc<ViewClass>>>,
    popups: RefCell<HashMap<String, Rc<ViewClass>>>,
    layouts: RefCell<HashMap<String, Layout>>,
    routes: RefCell<RouteTable>,
    store: RefCell<Option<Rc<dyn Any>>>,
}

#[derive(Clone)]
pub struct AppContext {
    inner: Rc<ContextInner>,
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("pending", &self.inner.handle.pending())
            .field("work", &self.inner.work.len())
            .field("plugins", &self.inner.plugins)
            .field("components", &self.inner.components.borrow().len())
            .field("popups", &self.inner.popups.borrow().len())
            .field("layouts", &self.inner.layouts.borrow().len())
            .finish_non_exhaustive()
    }
}

impl AppContext {
    pub fn new(handle: DispatchHandle, bus: EventBus) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                handle,
                work: WorkTracker::new(bus.clone()),
                bus,
                plugins: PluginRegistry::new(),
                components: RefCell::new(HashMap::new()),
                popups: RefCell::new(HashMap::new()),
                layouts: RefCell::new(HashMap::new()),
                routes: RefCell::new(RouteTable::new()),
                store: RefCell::new(None),
            }),
        }
    }

    pub(crate) fn attach_store<S: 'static>(&self, state: Rc<RefCell<S>>) {
        *self.inner.store.borrow_mut() = Some(state as Rc<dyn Any>);
    }

    pub fn handle(&self) -> &DispatchHandle {
        &self.inner.handle
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn work(&self) -> &WorkTracker {
        &self.inner.work
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.inner.plugins
    }

    pub fn dispatch(&self, action: Action) {
        self.inner.handle.dispatch(action);
    }

    pub fn dispatch_with(&self, action: Action, subscriber: impl FnOnce(Value) + 'static) {
        self.inner.handle.dispatch_with(action, subscriber);
    }

    pub fn number_of_action(&self) -> usize {
        self.inner.handle.pending()
    }

    /// Read the application state
    ///
    /// Returns `None` when the state is not of type `S`, or while a reducer
    /// holds it mutably.
    pub fn with_states<S: 'static, R>(&self, f: impl FnOnce(&S) -> R) -> Option<R> {
        let store = self.inner.store.borrow().clone()?;
        let cell = store.downcast_ref::<RefCell<S>>()?;
        let state = cell.try_borrow().ok()?;
        Some(f(&state))
    }

    // Registries

    pub fn bind_component(&self, name: impl Into<String>, view: Rc<ViewClass>) {
        self.inner.components.borrow_mut().insert(name.into(), view);
    }

    pub fn component(&self, name: &str) -> Option<Rc<ViewClass>> {
        let found = self.inner.components.borrow().get(name).cloned();
        found.or_else(|| self.miss("component", name))
    }

    pub fn bind_popup(&self, name: impl Into<String>, view: Rc<ViewClass>) {
        self.inner.popups.borrow_mut().insert(name.into(), view);
    }

    pub fn popup(&self, name: &str) -> Option<Rc<ViewClass>> {
        let found = self.inner.popups.borrow().get(name).cloned();
        found.or_else(|| self.miss("popup", name))
    }

    pub fn bind_layout(&self, layout: Layout) {
        self.inner
            .layouts
            .borrow_mut()
            .insert(layout.name.clone(), layout);
    }

    pub fn layout(&self, name: &str) -> Option<Layout> {
        let found = self.inner.layouts.borrow().get(name).cloned();
        found.or_else(|| self.miss("layout", name))
    }

    fn miss<T>(&self, kind: &str, name: &str) -> Option<T> {
        warn!(kind, name, "Lookup of unregistered name");
        self.inner
            .bus
            .report(ErrorReport::runtime(format!("{kind} \"{name}\" not found")));
        None
    }

    // Routes

    pub fn bind_route(&self, name: impl Into<String>, pattern: impl Into<String>) {
        self.inner.routes.borrow_mut().bind(name, pattern);
    }

    /// The whole route table, name to pattern
    pub fn route_tables(&self) -> BTreeMap<String, String> {
        self.inner.routes.borrow().tables().clone()
    }

    /// Resolve a named route; misses are reported and give `None`
    pub fn route(&self, name: &str, params: &Map<String, Value>, query: Option<&str>) -> Option<String> {
        let resolved = self.inner.routes.borrow().resolve(name, params, query);
        match resolved {
            Ok(path) => Some(path),
            Err(miss) => {
                warn!(route = name, %miss, "Route not resolved");
                self.inner.bus.report(ErrorReport::runtime(miss.to_string()));
                None
            }
        }
    }
}
