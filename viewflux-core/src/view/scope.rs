//! The handle view handlers and hooks work through

use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::{Map, Value};
use tracing::warn;

use super::class::ViewClass;
use super::tree::{ModelInput, Routed, RoutedCall, ViewId, ViewTree, ViewUpdate};
use crate::context::AppContext;
use crate::dom::Element;
use crate::error::ViewError;
use crate::model::Model;
use crate::reducer::Subscriber;
use crate::refs::Refs;
use crate::Action;

/// One view's access to its tree, model and application context
pub struct ViewScope<'a> {
    tree: &'a mut ViewTree,
    id: ViewId,
}

impl<'a> ViewScope<'a> {
    pub(crate) fn new(tree: &'a mut ViewTree, id: ViewId) -> Self {
        Self { tree, id }
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn tree(&mut self) -> &mut ViewTree {
        &mut *self.tree
    }

    pub fn context(&self) -> AppContext {
        self.tree.context().clone()
    }

    pub fn element(&self) -> Option<Element> {
        self.tree.element(self.id)
    }

    pub fn refs(&self) -> Option<&Refs> {
        self.tree.refs(self.id)
    }

    pub fn ref_element(&self, name: &str) -> Option<Element> {
        self.refs().and_then(|refs| refs.element(name).cloned())
    }

    /// Elements under the view root matching `selector`
    pub fn find(&self, selector: &str) -> Vec<Element> {
        let Some(root) = self.element() else {
            return Vec::new();
        };
        root.select(selector).unwrap_or_else(|err| {
            warn!(id = %self.id, %err, "Invalid selector in view query");
            Vec::new()
        })
    }

    pub fn find_first(&self, selector: &str) -> Option<Element> {
        self.find(selector).into_iter().next()
    }

    // Model

    pub fn get_model(&self) -> Value {
        self.tree.get_model(self.id).unwrap_or(Value::Null)
    }

    pub fn get_model_attr(&self, key: &str) -> Option<Value> {
        self.tree.get_model_attr(self.id, key).ok().flatten()
    }

    pub fn set_model(&mut self, input: impl Into<ModelInput>) -> Result<(), ViewError> {
        self.tree.set_model(self.id, input.into())
    }

    /// Set one attribute, updating bound elements; returns whether it changed
    pub fn set_attr(&mut self, key: &str, value: Value) -> bool {
        self.tree
            .model_mut(self.id)
            .is_ok_and(|model| model.set(key, value))
    }

    pub fn model_mut(&mut self) -> Result<&mut Model, ViewError> {
        self.tree.model_mut(self.id)
    }

    // Dispatch

    /// Queue an action, or trigger it on the view root if it is an event
    pub fn dispatch(&mut self, action: Action) {
        self.dispatch_routed(action, None, Map::new());
    }

    /// Queue an action whose reducer result is delivered to the named handler
    ///
    /// The handler runs on the next [`ViewTree::pump`] after the reducer
    /// completes. A name the view class does not define is queued as an
    /// unresolved subscriber and fails when the action reaches the head of
    /// the queue.
    pub fn dispatch_with(&mut self, action: Action, handler: &str) {
        self.dispatch_with_options(action, handler, Map::new());
    }

    pub fn dispatch_with_options(&mut self, action: Action, handler: &str, options: Map<String, Value>) {
        self.dispatch_routed(action, Some(handler), options);
    }

    /// Queue an action whose result is delivered to `f` with this view's scope
    pub fn dispatch_fn(&mut self, action: Action, f: impl FnOnce(&mut ViewScope<'_>, Value) + 'static) {
        if action.is_event() {
            self.trigger_event(action);
            return;
        }
        let subscriber = self.route(RoutedCall::Once(Box::new(f)));
        self.tree
            .context()
            .handle()
            .dispatch_with_options(action, Some(subscriber), Map::new());
    }

    fn dispatch_routed(&mut self, action: Action, handler: Option<&str>, options: Map<String, Value>) {
        if action.is_event() {
            self.trigger_event(action);
            return;
        }
        let subscriber = handler.map(|name| match self.class().and_then(|c| c.handler(name)) {
            Some(handler) => self.route(RoutedCall::Handler(handler)),
            None => {
                warn!(id = %self.id, handler = name, "Dispatch subscriber is not a view handler");
                Subscriber::Unresolved(name.to_string())
            }
        });
        self.tree
            .context()
            .handle()
            .dispatch_with_options(action, subscriber, options);
    }

    fn route(&self, call: RoutedCall) -> Subscriber {
        let inbox = Rc::clone(&self.tree.inbox);
        let view = self.id;
        Subscriber::callback(move |value| {
            inbox.borrow_mut().push_back(Routed { view, call, value });
        })
    }

    fn trigger_event(&mut self, action: Action) {
        let Some(root) = self.element() else {
            warn!(id = %self.id, event = %action.name(), "Event dispatched from an unmounted view");
            return;
        };
        let args = action.event_args();
        self.tree.trigger(&root, action.name(), args);
    }

    /// Raise a DOM event on the view root
    pub fn trigger(&mut self, event: &str, args: Vec<Value>) -> usize {
        match self.element() {
            Some(root) => self.tree.trigger(&root, event, args),
            None => 0,
        }
    }

    // Child views

    pub fn add_view(
        &mut self,
        container: &str,
        class: Rc<ViewClass>,
        model: Option<ModelInput>,
    ) -> Result<ViewId, ViewError> {
        self.tree.add_view(self.id, container, class, model)
    }

    pub fn update_view(&mut self, update: ViewUpdate) -> Result<Option<ViewId>, ViewError> {
        self.tree.update_view(self.id, update)
    }

    pub fn remove_view(&mut self, container: &str) -> Result<(), ViewError> {
        self.tree.remove_view(self.id, container)
    }

    pub fn child(&self, container: &str) -> Option<ViewId> {
        self.tree.child(self.id, container)
    }

    // Collections

    pub fn reload(&mut self, data: Value) -> Result<usize, ViewError> {
        self.tree.reload(self.id, data)
    }

    pub fn add_row(&mut self, item: Value) -> Result<ViewId, ViewError> {
        self.tree.add_row(self.id, item)
    }

    pub fn collection(&self) -> Result<Vec<Value>, ViewError> {
        self.tree.collection(self.id)
    }

    // Popups

    /// Open a registered popup; `on_close` runs with this view's scope
    ///
    /// Returns `Ok(None)` when no popup is registered under `name`; the miss
    /// is reported on the error channel.
    pub fn add_popup(
        &mut self,
        name: &str,
        on_close: impl FnOnce(&mut ViewScope<'_>, Value) + 'static,
    ) -> Result<Option<ViewId>, ViewError> {
        self.tree.open_popup(self.id, name, Box::new(on_close))
    }

    /// Close this popup, handing `data` to the opener's callback
    pub fn close_popup(&mut self, data: Value) -> Result<bool, ViewError> {
        self.tree.close_popup(self.id, data)
    }

    // Application

    pub fn class(&self) -> Option<Rc<ViewClass>> {
        self.tree.class(self.id)
    }

    pub fn get_states<S: 'static, R>(&self, f: impl FnOnce(&S) -> R) -> Option<R> {
        self.tree.context().with_states(f)
    }

    pub fn component(&self, name: &str) -> Option<Rc<ViewClass>> {
        self.tree.context().component(name)
    }

    pub fn popup(&self, name: &str) -> Option<Rc<ViewClass>> {
        self.tree.context().popup(name)
    }

    pub fn route_tables(&self) -> BTreeMap<String, String> {
        self.tree.context().route_tables()
    }

    pub fn route_path(&self, name: &str, params: &Map<String, Value>, query: Option<&str>) -> Option<String> {
        self.tree.context().route(name, params, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use crate::error::DispatchError;
    use crate::reducer::{Completion, Reducer};
    use crate::view::Invocation;
    use crate::Dispatcher;
    use serde_json::json;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Todos {
        saved: Vec<String>,
    }

    fn save_reducer() -> Reducer<Todos> {
        Reducer::new("save", |state: &mut Todos, data: Value, done: Completion| {
            state.saved.push(data["title"].as_str().unwrap_or_default().to_string());
            done.complete(json!(state.saved.len()));
        })
    }

    fn setup() -> (Dispatcher<Todos>, ViewTree) {
        let mut dispatcher = Dispatcher::new(Todos::default());
        dispatcher.bind_reducer(save_reducer());
        let tree = ViewTree::new(
            dispatcher.context().clone(),
            Document::parse(r#"<main id="app"></main>"#).unwrap(),
        );
        (dispatcher, tree)
    }

    #[test]
    fn test_result_routed_to_named_handler() {
        let (mut dispatcher, mut tree) = setup();
        let form = ViewClass::builder("Form")
            .template(r#"<form><input id="title" value="milk"><span data-role="bind" data-name="count"></span></form>"#)
            .handler("onSave", |scope: &mut ViewScope<'_>, _: &Invocation| {
                let title = scope.find_first("#title").map(|el| el.value()).unwrap_or_default();
                scope.dispatch_with(Action::new("save", json!({ "title": title })), "onSaved");
            })
            .handler("onSaved", |scope: &mut ViewScope<'_>, invocation: &Invocation| {
                let count = invocation.arg(0).cloned().unwrap_or(Value::Null);
                scope.set_attr("count", count);
            })
            .event("submit", "onSave")
            .build()
            .unwrap();
        let id = tree.create(form, "#app", None).unwrap();
        let root = tree.element(id).unwrap();

        tree.trigger(&root, "submit", Vec::new());
        assert_eq!(dispatcher.number_of_action(), 1);
        dispatcher.tick().unwrap();
        assert_eq!(dispatcher.store().state().saved, vec!["milk"]);

        assert!(tree.has_pending());
        tree.pump();
        assert_eq!(root.select_first("span").unwrap().unwrap().text(), "1");
        assert_eq!(tree.get_model_attr(id, "count").unwrap(), Some(json!(1)));
    }

    #[test]
    fn test_unknown_handler_name_fails_at_tick() {
        let (mut dispatcher, mut tree) = setup();
        let view = ViewClass::builder("View").template("<p></p>").build().unwrap();
        let id = tree.create(view, "#app", None).unwrap();

        ViewScope::new(&mut tree, id).dispatch_with(Action::new("save", json!({})), "onNothing");
        assert!(matches!(
            dispatcher.tick(),
            Err(DispatchError::InvalidSubscriber { ref subscriber, .. }) if subscriber == "onNothing"
        ));
        assert!(dispatcher.store().state().saved.is_empty());
    }

    #[test]
    fn test_event_actions_trigger_on_root() {
        let (dispatcher, mut tree) = setup();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let view = ViewClass::builder("View")
            .template("<p></p>")
            .event_fn("refresh", move |_: &mut ViewScope<'_>, invocation: &Invocation| {
                sink.borrow_mut().extend(invocation.args.clone());
            })
            .build()
            .unwrap();
        let id = tree.create(view, "#app", None).unwrap();

        ViewScope::new(&mut tree, id).dispatch(Action::event("refresh", vec![json!(1), json!("a")]));
        assert_eq!(*seen.borrow(), vec![json!(1), json!("a")]);
        assert_eq!(dispatcher.number_of_action(), 0);
    }

    #[test]
    fn test_dispatch_fn_and_states() {
        let (mut dispatcher, mut tree) = setup();
        let view = ViewClass::builder("View").template("<p></p>").build().unwrap();
        let id = tree.create(view, "#app", None).unwrap();

        let seen = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&seen);
        ViewScope::new(&mut tree, id).dispatch_fn(
            Action::new("save", json!({ "title": "eggs" })),
            move |scope, value| {
                let saved = scope.get_states(|s: &Todos| s.saved.clone());
                *sink.borrow_mut() = Some((value, saved));
            },
        );
        dispatcher.tick().unwrap();
        tree.pump();

        assert_eq!(
            *seen.borrow(),
            Some((json!(1), Some(vec!["eggs".to_string()])))
        );
    }

    #[test]
    fn test_results_for_closed_views_are_dropped() {
        let (mut dispatcher, mut tree) = setup();
        let view = ViewClass::builder("View")
            .template("<p></p>")
            .handler("onSaved", |_: &mut ViewScope<'_>, _: &Invocation| panic!("view is gone"))
            .build()
            .unwrap();
        let id = tree.create(view, "#app", None).unwrap();
        tree.pump();

        ViewScope::new(&mut tree, id).dispatch_with(Action::new("save", json!({})), "onSaved");
        tree.destroy(id).unwrap();
        dispatcher.tick().unwrap();
        assert_eq!(tree.pump(), 0);
    }

    #[test]
    fn test_popup_round_trip() {
        let (dispatcher, mut tree) = setup();
        let confirm = ViewClass::builder("Confirm")
            .template(r#"<div class="confirm"><button>ok</button></div>"#)
            .handler("onOk", |scope: &mut ViewScope<'_>, _: &Invocation| {
                scope.close_popup(json!("yes")).unwrap();
            })
            .event("click button", "onOk")
            .build()
            .unwrap();
        dispatcher.context().bind_popup("confirm", confirm);

        let page = ViewClass::builder("Page").template("<section></section>").build().unwrap();
        let id = tree.create(page, "#app", None).unwrap();

        let answer = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&answer);
        let popup = ViewScope::new(&mut tree, id)
            .add_popup("confirm", move |scope, data| {
                *sink.borrow_mut() = Some((scope.id(), data));
            })
            .unwrap()
            .unwrap();

        let slot = tree
            .document()
            .query_first("div[data-ref=confirmContainer]")
            .unwrap()
            .unwrap();
        assert!(slot.parent().unwrap().is("body"));
        assert_eq!(tree.child(id, "div[data-ref=confirmContainer]"), Some(popup));

        let button = slot.select_first("button").unwrap().unwrap();
        tree.trigger(&button, "click", Vec::new());

        assert_eq!(*answer.borrow(), Some((id, json!("yes"))));
        assert!(!tree.contains(popup));
        assert!(slot.children().is_empty());

        assert_eq!(ViewScope::new(&mut tree, id).add_popup("missing", |_, _| {}), Ok(None));
    }
}
