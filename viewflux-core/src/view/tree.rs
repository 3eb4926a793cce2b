//! The view arena
//!
//! Every live view is a node in one [`ViewTree`], addressed by a stable
//! [`ViewId`]. Parents own their children by id; closing a view closes and
//! removes its children from the arena before the parent's own refs are
//! cleared.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::class::{Handler, Placement, ViewClass};
use super::events::{DomEvent, Invocation};
use super::scope::ViewScope;
use crate::binding::{bind_model, unbind_model, Binding};
use crate::context::AppContext;
use crate::dom::{parse_fragment, Document, Element, Selector};
use crate::error::ViewError;
use crate::model::{ChangePolicy, Model, OwnerId};
use crate::refs::Refs;

/// Stable handle of a view in its [`ViewTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub u64);

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl ViewId {
    fn owner(self) -> OwnerId {
        OwnerId(self.0)
    }
}

/// Where a view mounts
#[derive(Debug, Clone, PartialEq)]
pub enum Container {
    /// Resolved at every mount: inside the parent view first, then the document
    Selector(String),
    Element(Element),
}

impl From<&str> for Container {
    fn from(selector: &str) -> Self {
        Container::Selector(selector.to_string())
    }
}

impl From<String> for Container {
    fn from(selector: String) -> Self {
        Container::Selector(selector)
    }
}

impl From<Element> for Container {
    fn from(element: Element) -> Self {
        Container::Element(element)
    }
}

impl From<&Element> for Container {
    fn from(element: &Element) -> Self {
        Container::Element(element.clone())
    }
}

/// New model contents for [`ViewTree::set_model`]
#[derive(Debug, Clone)]
pub enum ModelInput {
    /// Adopt a copy; the caller's instance is never aliased
    Model(Model),
    /// Merge attributes, notifying bindings of the ones that changed
    Attrs(Map<String, Value>),
    /// Start over with an empty model
    Reset,
}

impl From<Model> for ModelInput {
    fn from(model: Model) -> Self {
        ModelInput::Model(model)
    }
}

impl From<Map<String, Value>> for ModelInput {
    fn from(attrs: Map<String, Value>) -> Self {
        ModelInput::Attrs(attrs)
    }
}

impl From<Value> for ModelInput {
    /// Objects merge, `null` resets, anything else is ignored
    fn from(value: Value) -> Self {
        match value {
            Value::Object(attrs) => ModelInput::Attrs(attrs),
            Value::Null => ModelInput::Reset,
            _ => ModelInput::Attrs(Map::new()),
        }
    }
}

/// Argument of [`ViewTree::update_view`]
pub enum ViewUpdate {
    /// Close and mount the view again in place
    Remount,
    /// Close and discard the child at a container key
    Discard { container: String },
    /// Update the child at a container key, or create it from `class`
    Child {
        container: String,
        class: Rc<ViewClass>,
        model: Option<ModelInput>,
    },
}

/// Notifications delivered to [`ViewTree::on_lifecycle`] listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Delivered by the first [`ViewTree::pump`] after a mount
    DidMount,
    /// The view was closed and its element detached
    Closed,
}

type LifecycleListener = Rc<dyn Fn(ViewId, Lifecycle)>;

pub(crate) enum RoutedCall {
    Handler(Handler),
    Once(Box<dyn FnOnce(&mut ViewScope<'_>, Value)>),
}

/// A reducer result waiting to be delivered to its view
pub(crate) struct Routed {
    pub view: ViewId,
    pub call: RoutedCall,
    pub value: Value,
}

pub(crate) type Inbox = Rc<RefCell<VecDeque<Routed>>>;

pub(crate) struct PopupLink {
    pub opener: ViewId,
    pub container: String,
    pub on_close: Box<dyn FnOnce(&mut ViewScope<'_>, Value)>,
}

pub(crate) struct ViewNode {
    pub class: Rc<ViewClass>,
    pub parent: Option<ViewId>,
    pub container: Container,
    pub placement: Placement,
    pub element: Option<Element>,
    pub model: Model,
    pub refs: Refs,
    pub bindings: Vec<Binding>,
    pub children: BTreeMap<String, ViewId>,
    pub rows: Vec<ViewId>,
    pub mounted: bool,
    pub popup: Option<PopupLink>,
}

/// Arena of live views over one [`Document`]
pub struct ViewTree {
    cx: AppContext,
    document: Document,
    pub(crate) views: BTreeMap<ViewId, ViewNode>,
    next_id: u64,
    pub(crate) inbox: Inbox,
    deferred: VecDeque<ViewId>,
    lifecycle: Vec<LifecycleListener>,
    policy: ChangePolicy,
}

impl fmt::Debug for ViewTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewTree")
            .field("views", &self.views.len())
            .field("inbox", &self.inbox.borrow().len())
            .field("deferred", &self.deferred.len())
            .finish_non_exhaustive()
    }
}

impl ViewTree {
    pub fn new(cx: AppContext, document: Document) -> Self {
        Self {
            cx,
            document,
            views: BTreeMap::new(),
            next_id: 1,
            inbox: Rc::new(RefCell::new(VecDeque::new())),
            deferred: VecDeque::new(),
            lifecycle: Vec::new(),
            policy: ChangePolicy::default(),
        }
    }

    /// Equality policy of models created from now on
    pub fn with_change_policy(mut self, policy: ChangePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn context(&self) -> &AppContext {
        &self.cx
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn contains(&self, id: ViewId) -> bool {
        self.views.contains_key(&id)
    }

    pub fn class(&self, id: ViewId) -> Option<Rc<ViewClass>> {
        self.views.get(&id).map(|node| Rc::clone(&node.class))
    }

    pub fn parent(&self, id: ViewId) -> Option<ViewId> {
        self.views.get(&id).and_then(|node| node.parent)
    }

    /// The view's root element while mounted
    pub fn element(&self, id: ViewId) -> Option<Element> {
        self.views.get(&id).and_then(|node| node.element.clone())
    }

    pub fn refs(&self, id: ViewId) -> Option<&Refs> {
        self.views.get(&id).map(|node| &node.refs)
    }

    pub fn bindings(&self, id: ViewId) -> &[Binding] {
        self.views
            .get(&id)
            .map(|node| node.bindings.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_mounted(&self, id: ViewId) -> bool {
        self.views
            .get(&id)
            .is_some_and(|node| node.mounted && node.element.is_some())
    }

    /// Child occupying a container key
    pub fn child(&self, id: ViewId, container: &str) -> Option<ViewId> {
        self.views
            .get(&id)
            .and_then(|node| node.children.get(container).copied())
    }

    /// Keyed children followed by collection rows
    pub fn children(&self, id: ViewId) -> Vec<ViewId> {
        self.views.get(&id).map_or_else(Vec::new, |node| {
            node.children.values().chain(node.rows.iter()).copied().collect()
        })
    }

    /// Listen for mount and close notifications of every view
    pub fn on_lifecycle(&mut self, listener: impl Fn(ViewId, Lifecycle) + 'static) {
        self.lifecycle.push(Rc::new(listener));
    }

    pub(super) fn node(&self, id: ViewId) -> Result<&ViewNode, ViewError> {
        self.views.get(&id).ok_or(ViewError::UnknownView { id })
    }

    pub(super) fn node_mut(&mut self, id: ViewId) -> Result<&mut ViewNode, ViewError> {
        self.views.get_mut(&id).ok_or(ViewError::UnknownView { id })
    }

    fn notify(&self, id: ViewId, event: Lifecycle) {
        for listener in self.lifecycle.clone() {
            listener(id, event);
        }
    }

    // Creation

    /// Create and mount a top-level view
    pub fn create(
        &mut self,
        class: Rc<ViewClass>,
        container: impl Into<Container>,
        model: Option<ModelInput>,
    ) -> Result<ViewId, ViewError> {
        self.spawn(class, container.into(), None, None, model)
    }

    /// Mount a registered layout into its container
    pub fn mount_layout(&mut self, name: &str) -> Result<Option<ViewId>, ViewError> {
        let Some(layout) = self.cx.layout(name) else {
            return Ok(None);
        };
        self.create(layout.view, layout.container.as_str(), None).map(Some)
    }

    pub(crate) fn spawn(
        &mut self,
        class: Rc<ViewClass>,
        container: Container,
        parent: Option<ViewId>,
        placement: Option<Placement>,
        model: Option<ModelInput>,
    ) -> Result<ViewId, ViewError> {
        let id = ViewId(self.next_id);
        self.next_id += 1;

        self.views.insert(
            id,
            ViewNode {
                placement: placement.unwrap_or(class.placement()),
                class,
                parent,
                container,
                element: None,
                model: Model::new().with_policy(self.policy),
                refs: Refs::new(),
                bindings: Vec::new(),
                children: BTreeMap::new(),
                rows: Vec::new(),
                mounted: false,
                popup: None,
            },
        );

        if let Some(model) = model {
            self.set_model(id, model)?;
        }
        if let Err(err) = self.mount(id) {
            self.views.remove(&id);
            return Err(err);
        }
        Ok(id)
    }

    // Mounting

    fn resolve_container(&self, id: ViewId) -> Result<Element, ViewError> {
        let node = self.node(id)?;
        let view = node.class.name().to_string();
        let selector = match &node.container {
            Container::Element(el) => return Ok(el.clone()),
            Container::Selector(s) if s.trim().is_empty() => {
                return Err(ViewError::MissingContainer { view })
            }
            Container::Selector(s) => s,
        };

        let parsed = Selector::parse(selector).map_err(|source| ViewError::InvalidSelector {
            view: view.clone(),
            source,
        })?;
        let in_parent = node
            .parent
            .and_then(|parent| self.element(parent))
            .and_then(|root| root.find_first(&parsed));
        in_parent
            .or_else(|| self.document.find(&parsed).into_iter().next())
            .ok_or_else(|| ViewError::EmptyContainer {
                view,
                selector: selector.clone(),
            })
    }

    fn render_root(class: &ViewClass, data: &Value) -> Result<Option<Element>, ViewError> {
        let Some(template) = class.template() else {
            return Ok(None);
        };
        let markup = template.render(data);
        let markup_error = |source| ViewError::Markup {
            view: class.name().to_string(),
            source,
        };

        let fragment = parse_fragment(&markup).map_err(markup_error)?;
        let top = fragment.children();
        let single_root = top.len() == 1 && top[0].text() == fragment.text();

        let root = match (class.tag_name(), single_root) {
            (None, true) => top[0].clone(),
            (tag, _) => {
                let tag = tag.unwrap_or("div");
                let wrapped = parse_fragment(&format!("<{tag}>{markup}</{tag}>")).map_err(markup_error)?;
                match wrapped.children().into_iter().next() {
                    Some(root) => root,
                    None => Element::new(tag),
                }
            }
        };
        root.remove();
        if let Some(class_name) = class.class_name() {
            root.add_class(class_name);
        }
        Ok(Some(root))
    }

    pub(crate) fn mount(&mut self, id: ViewId) -> Result<(), ViewError> {
        let container = self.resolve_container(id)?;
        let class = Rc::clone(&self.node(id)?.class);
        let snapshot = self.node(id)?.model.to_json();
        let data = class.will_mount(&snapshot).unwrap_or(snapshot);
        let rendered = Self::render_root(&class, &data)?;

        let plugins = self.cx.plugins().clone();
        let bus = self.cx.bus().clone();
        let node = self.node_mut(id)?;

        let root = match rendered {
            None => container.clone(),
            Some(root) => {
                match (&node.element, node.mounted) {
                    (Some(old), true) if container.contains(old) => {
                        old.replace_with(&root);
                    }
                    (_, true) => container.set_children([root.clone()]),
                    (_, false) => match node.placement {
                        Placement::Replace => container.set_children([root.clone()]),
                        Placement::Append => container.append(&root),
                        Placement::After => {
                            if !container.insert_after(&root) {
                                warn!(view = %class.name(), "Container is detached, appending instead");
                                container.append(&root);
                            }
                        }
                    },
                }
                root
            }
        };

        node.element = Some(root.clone());
        node.mounted = true;
        node.refs = Refs::rebuild(&root, &node.refs);
        node.bindings = bind_model(&root, &mut node.model, id.owner(), &plugins, &bus);
        debug!(view = %class.name(), %id, refs = node.refs.len(), "View mounted");

        if let Some(hook) = class.did_mount_hook() {
            hook(&mut ViewScope::new(self, id), &root);
        }
        self.deferred.push_back(id);
        Ok(())
    }

    /// Close the view and mount it again in place
    pub fn remount(&mut self, id: ViewId) -> Result<(), ViewError> {
        self.close(id, false)?;
        self.mount(id)
    }

    /// Render the view again, keeping its child views and their models
    ///
    /// Runs the unmount hook and drops bindings like [`close`](Self::close),
    /// then mounts in place and renders every child and row again into the
    /// new markup.
    fn refresh(&mut self, id: ViewId) -> Result<(), ViewError> {
        let class = Rc::clone(&self.node(id)?.class);
        if let Some(hook) = class.will_unmount_hook() {
            hook(&mut ViewScope::new(self, id));
        }

        let node = self.node_mut(id)?;
        unbind_model(&mut node.model, id.owner());
        node.bindings.clear();
        let children: Vec<ViewId> = node.children.values().copied().collect();
        let rows = node.rows.clone();

        self.mount(id)?;
        for child in children {
            if self.views.contains_key(&child) {
                self.refresh(child)?;
            }
        }
        if !rows.is_empty() {
            let container = self.row_container(id)?;
            for row in rows {
                let Some(node) = self.views.get_mut(&row) else {
                    continue;
                };
                node.container = Container::Element(container.clone());
                node.element = None;
                node.mounted = false;
                self.refresh(row)?;
            }
        }
        debug!(view = %class.name(), %id, "View refreshed");
        Ok(())
    }

    /// Unmount the view
    ///
    /// Runs the unmount hook, drops model bindings and closes every child
    /// depth-first, removing them from the arena. With `remove` the refs are
    /// cleared and the root element is detached; the node itself stays in
    /// the arena until [`destroy`](Self::destroy).
    pub fn close(&mut self, id: ViewId, remove: bool) -> Result<(), ViewError> {
        let class = Rc::clone(&self.node(id)?.class);
        if let Some(hook) = class.will_unmount_hook() {
            hook(&mut ViewScope::new(self, id));
        }

        let node = self.node_mut(id)?;
        unbind_model(&mut node.model, id.owner());
        node.bindings.clear();
        let children: Vec<ViewId> = std::mem::take(&mut node.children)
            .into_values()
            .chain(std::mem::take(&mut node.rows))
            .collect();

        for child in children {
            if self.views.contains_key(&child) {
                self.close(child, true)?;
                self.views.remove(&child);
            }
        }

        if remove {
            let node = self.node_mut(id)?;
            node.refs.clear();
            node.mounted = false;
            if let Some(el) = node.element.take() {
                el.remove();
            }
            debug!(view = %class.name(), %id, "View closed");
            self.notify(id, Lifecycle::Closed);
        }
        Ok(())
    }

    /// Close the view, drop it from the arena and from its parent
    pub fn destroy(&mut self, id: ViewId) -> Result<(), ViewError> {
        self.close(id, true)?;
        if let Some(node) = self.views.remove(&id) {
            if let Some(parent) = node.parent.and_then(|p| self.views.get_mut(&p)) {
                parent.children.retain(|_, child| *child != id);
                parent.rows.retain(|row| *row != id);
            }
        }
        Ok(())
    }

    // Child views

    /// Remount, discard a child, or update-or-create a child
    ///
    /// Returns the child for [`ViewUpdate::Child`]. An existing child keeps
    /// its class whatever `class` says; it takes the new model and is
    /// rendered again with its own child views left in place.
    pub fn update_view(&mut self, id: ViewId, update: ViewUpdate) -> Result<Option<ViewId>, ViewError> {
        match update {
            ViewUpdate::Remount => {
                self.remount(id)?;
                Ok(None)
            }
            ViewUpdate::Discard { container } => {
                let child = self.node_mut(id)?.children.remove(&container);
                if let Some(child) = child {
                    if self.views.contains_key(&child) {
                        self.close(child, true)?;
                        self.views.remove(&child);
                    }
                }
                Ok(None)
            }
            ViewUpdate::Child {
                container,
                class,
                model,
            } => {
                if let Some(child) = self.child(id, &container) {
                    if let Some(model) = model {
                        self.set_model(child, model)?;
                    }
                    self.refresh(child)?;
                    return Ok(Some(child));
                }
                let child = self.spawn(class, Container::Selector(container.clone()), Some(id), None, model)?;
                self.node_mut(id)?.children.insert(container, child);
                Ok(Some(child))
            }
        }
    }

    /// Replace whatever occupies `container` with a new child
    pub fn add_view(
        &mut self,
        id: ViewId,
        container: &str,
        class: Rc<ViewClass>,
        model: Option<ModelInput>,
    ) -> Result<ViewId, ViewError> {
        self.remove_view(id, container)?;
        let child = self.update_view(
            id,
            ViewUpdate::Child {
                container: container.to_string(),
                class,
                model,
            },
        )?;
        child.ok_or(ViewError::UnknownView { id })
    }

    pub fn remove_view(&mut self, id: ViewId, container: &str) -> Result<(), ViewError> {
        self.update_view(
            id,
            ViewUpdate::Discard {
                container: container.to_string(),
            },
        )
        .map(|_| ())
    }

    // Models

    pub fn set_model(&mut self, id: ViewId, input: ModelInput) -> Result<(), ViewError> {
        let policy = self.policy;
        let plugins = self.cx.plugins().clone();
        let bus = self.cx.bus().clone();
        let node = self.node_mut(id)?;

        let replacement = match input {
            ModelInput::Attrs(attrs) => {
                node.model.set_many(attrs);
                return Ok(());
            }
            ModelInput::Model(model) => model.clone(),
            ModelInput::Reset => Model::new().with_policy(policy),
        };

        unbind_model(&mut node.model, id.owner());
        node.model = replacement;
        if node.mounted {
            if let Some(root) = node.element.clone() {
                node.bindings = bind_model(&root, &mut node.model, id.owner(), &plugins, &bus);
            }
        }
        Ok(())
    }

    /// Snapshot of the model; changing it does not touch the view
    pub fn get_model(&self, id: ViewId) -> Result<Value, ViewError> {
        Ok(self.node(id)?.model.to_json())
    }

    pub fn get_model_attr(&self, id: ViewId, key: &str) -> Result<Option<Value>, ViewError> {
        Ok(self.node(id)?.model.get(key).cloned())
    }

    pub fn model(&self, id: ViewId) -> Result<&Model, ViewError> {
        Ok(&self.node(id)?.model)
    }

    /// The live model; `set` on it updates bound elements immediately
    pub fn model_mut(&mut self, id: ViewId) -> Result<&mut Model, ViewError> {
        Ok(&mut self.node_mut(id)?.model)
    }

    // Events

    /// Raise a DOM event on `target` and run the delegated handlers
    ///
    /// The event bubbles from `target` up through its ancestors. At each
    /// element, every view rooted there runs its matching event map entries.
    /// Handlers are collected before any runs; a handler whose view was
    /// closed by an earlier one is skipped. Returns how many handlers ran.
    pub fn trigger(&mut self, target: &Element, event: &str, args: Vec<Value>) -> usize {
        let mut path = vec![target.clone()];
        path.extend(target.ancestors());

        let mut calls: Vec<(ViewId, Handler, Invocation)> = Vec::new();
        for node_el in &path {
            for (&id, node) in &self.views {
                let Some(root) = node.element.as_ref().filter(|root| root.ptr_eq(node_el)) else {
                    continue;
                };
                for binding in node.class.events().iter().filter(|b| b.event == event) {
                    let Some(current_target) = binding.current_target(target, root) else {
                        continue;
                    };
                    let mut call_args = binding.child_args(root, &current_target);
                    call_args.extend(args.iter().cloned());
                    calls.push((
                        id,
                        Rc::clone(&binding.handler),
                        Invocation {
                            event: Some(DomEvent {
                                event_type: event.to_string(),
                                target: target.clone(),
                                current_target,
                            }),
                            args: call_args,
                        },
                    ));
                }
                if event == "click" {
                    if let Some(call) = self.row_selection(id, root, target) {
                        calls.push(call);
                    }
                }
            }
        }

        let mut ran = 0;
        for (id, handler, invocation) in calls {
            if !self.views.contains_key(&id) {
                continue;
            }
            handler(&mut ViewScope::new(self, id), &invocation);
            ran += 1;
        }
        if ran > 0 {
            debug!(event, handlers = ran, "Event delivered");
        }
        ran
    }

    /// Deliver deferred mount notifications and routed reducer results
    ///
    /// Only work queued before the call is processed; anything it queues
    /// waits for the next pump. Returns the number of items delivered.
    pub fn pump(&mut self) -> usize {
        let deferred: Vec<ViewId> = self.deferred.drain(..).collect();
        let routed: Vec<Routed> = self.inbox.borrow_mut().drain(..).collect();
        let mut delivered = 0;

        for id in deferred {
            let Some(root) = self.element(id).filter(|_| self.is_mounted(id)) else {
                continue;
            };
            self.trigger(&root, "viewDidMount", Vec::new());
            self.notify(id, Lifecycle::DidMount);
            delivered += 1;
        }

        for Routed { view, call, value } in routed {
            if !self.views.contains_key(&view) {
                debug!(id = %view, "Result for a closed view dropped");
                continue;
            }
            let mut scope = ViewScope::new(self, view);
            match call {
                RoutedCall::Handler(handler) => {
                    handler(&mut scope, &Invocation::with_args(vec![value]))
                }
                RoutedCall::Once(f) => f(&mut scope, value),
            }
            delivered += 1;
        }
        delivered
    }

    /// Whether [`pump`](Self::pump) has anything to deliver
    pub fn has_pending(&self) -> bool {
        !self.deferred.is_empty() || !self.inbox.borrow().is_empty()
    }

    // Popups

    pub(crate) fn open_popup(
        &mut self,
        opener: ViewId,
        name: &str,
        on_close: Box<dyn FnOnce(&mut ViewScope<'_>, Value)>,
    ) -> Result<Option<ViewId>, ViewError> {
        let Some(class) = self.cx.popup(name) else {
            return Ok(None);
        };
        let slot = format!("{name}Container");
        let key = format!("div[data-ref={slot}]");

        let container = match self.document.query_first(&key) {
            Ok(Some(el)) => el,
            _ => Element::new("div").with_attr("data-ref", &slot),
        };
        self.document.body().append(&container);

        let popup = self.add_view(opener, &key, class, None)?;
        self.node_mut(popup)?.popup = Some(PopupLink {
            opener,
            container: key,
            on_close,
        });
        info!(popup = name, id = %popup, "Popup opened");
        Ok(Some(popup))
    }

    pub(crate) fn close_popup(&mut self, popup: ViewId, data: Value) -> Result<bool, ViewError> {
        let Some(link) = self.node_mut(popup)?.popup.take() else {
            warn!(id = %popup, "close_popup called on a view that is not a popup");
            return Ok(false);
        };
        if self.views.contains_key(&link.opener) {
            (link.on_close)(&mut ViewScope::new(self, link.opener), data);
            self.remove_view(link.opener, &link.container)?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{AppEvent, ErrorReport, EventType};
    use crate::Dispatcher;
    use serde_json::json;

    fn tree(markup: &str) -> (Dispatcher<()>, ViewTree) {
        let dispatcher = Dispatcher::new(());
        let tree = ViewTree::new(
            dispatcher.context().clone(),
            Document::parse(markup).unwrap(),
        );
        (dispatcher, tree)
    }

    fn class(markup: &str) -> Rc<ViewClass> {
        ViewClass::builder("Card").template(markup).build().unwrap()
    }

    #[test]
    fn test_mount_replaces_container_contents() {
        let (_d, mut tree) = tree(r#"<main id="app"><p>loading</p></main>"#);
        let id = tree
            .create(class(r#"<section data-ref="body">hi</section>"#), "#app", None)
            .unwrap();

        let app = tree.document().query_first("#app").unwrap().unwrap();
        assert_eq!(app.inner_html(), r#"<section data-ref="body">hi</section>"#);
        assert!(tree.is_mounted(id));
        assert!(tree.refs(id).unwrap().element("body").is_some());
    }

    #[test]
    fn test_container_errors_leave_no_node() {
        let (_d, mut tree) = tree("<main></main>");
        assert_eq!(
            tree.create(class("<p></p>"), "", None),
            Err(ViewError::MissingContainer { view: "Card".into() })
        );
        assert_eq!(
            tree.create(class("<p></p>"), "#nope", None),
            Err(ViewError::EmptyContainer {
                view: "Card".into(),
                selector: "#nope".into()
            })
        );
        assert!(tree.is_empty());
    }

    #[test]
    fn test_wrapping_and_class_name() {
        let (_d, mut tree) = tree(r#"<main id="app"></main>"#);
        let multi = ViewClass::builder("Multi")
            .template("<p>a</p><p>b</p>")
            .class_name("pair")
            .build()
            .unwrap();
        let id = tree.create(multi, "#app", None).unwrap();
        assert_eq!(
            tree.element(id).unwrap().outer_html(),
            r#"<div class="pair"><p>a</p><p>b</p></div>"#
        );

        let tagged = ViewClass::builder("Tagged")
            .template("<p>a</p>")
            .tag_name("article")
            .build()
            .unwrap();
        let id = tree.create(tagged, "#app", None).unwrap();
        assert_eq!(tree.element(id).unwrap().outer_html(), "<article><p>a</p></article>");
    }

    #[test]
    fn test_no_template_adopts_container() {
        let (_d, mut tree) = tree(r#"<main id="app"><b data-ref="x"></b></main>"#);
        let bare = ViewClass::builder("Bare").build().unwrap();
        let id = tree.create(bare, "#app", None).unwrap();
        assert!(tree.element(id).unwrap().is("main"));
        assert!(tree.refs(id).unwrap().element("x").is_some());
    }

    #[test]
    fn test_append_and_after_placement() {
        let (_d, mut tree) = tree(r#"<ul id="list"><li>0</li></ul>"#);
        let appended = ViewClass::builder("Item")
            .template("<li>1</li>")
            .placement(Placement::Append)
            .build()
            .unwrap();
        tree.create(appended, "#list", None).unwrap();
        let after = ViewClass::builder("Footer")
            .template("<p>end</p>")
            .placement(Placement::After)
            .build()
            .unwrap();
        tree.create(after, "#list", None).unwrap();

        assert_eq!(
            tree.document().body().inner_html(),
            r#"<ul id="list"><li>0</li><li>1</li></ul><p>end</p>"#
        );
    }

    #[test]
    fn test_remount_is_idempotent() {
        let (_d, mut tree) = tree(r#"<main id="app"></main>"#);
        let id = tree
            .create(class(r#"<div><i data-ref="icon"></i></div>"#), "#app", None)
            .unwrap();
        let first = tree.refs(id).unwrap().element("icon").cloned().unwrap();

        tree.update_view(id, ViewUpdate::Remount).unwrap();
        tree.update_view(id, ViewUpdate::Remount).unwrap();

        let app = tree.document().query_first("#app").unwrap().unwrap();
        assert_eq!(app.children().len(), 1);
        let icon = tree.refs(id).unwrap().element("icon").cloned().unwrap();
        assert!(!icon.ptr_eq(&first));
        assert!(app.contains(&icon));
    }

    #[test]
    fn test_will_mount_shapes_render_input() {
        let (_d, mut tree) = tree(r#"<main id="app"></main>"#);
        let greet = ViewClass::builder("Greet")
            .render(|data| format!("<p>{}</p>", data["greeting"].as_str().unwrap_or("?")))
            .will_mount(|data| {
                let name = data["name"].as_str().unwrap_or("nobody");
                Some(json!({ "greeting": format!("hello {name}") }))
            })
            .build()
            .unwrap();
        let id = tree
            .create(greet, "#app", Some(json!({ "name": "Kim" }).into()))
            .unwrap();
        assert_eq!(tree.element(id).unwrap().text(), "hello Kim");
    }

    #[test]
    fn test_get_model_is_a_copy() {
        let (_d, mut tree) = tree(r#"<main id="app"></main>"#);
        let id = tree.create(class("<p></p>"), "#app", None).unwrap();
        tree.set_model(id, json!({ "a": 1 }).into()).unwrap();

        let mut snapshot = tree.get_model(id).unwrap();
        assert_eq!(snapshot["a"], json!(1));
        snapshot["a"] = json!(2);
        assert_eq!(tree.get_model_attr(id, "a").unwrap(), Some(json!(1)));

        let mut mine = Model::new();
        mine.set("b", json!(true));
        tree.set_model(id, ModelInput::Model(mine.clone())).unwrap();
        mine.set("b", json!(false));
        assert_eq!(tree.get_model_attr(id, "b").unwrap(), Some(json!(true)));
        assert!(tree.get_model_attr(id, "a").unwrap().is_none());
    }

    #[test]
    fn test_set_model_rebinds_when_mounted() {
        let (_d, mut tree) = tree(r#"<main id="app"></main>"#);
        let id = tree
            .create(class(r#"<p data-role="bind" data-name="name"></p>"#), "#app", None)
            .unwrap();

        tree.set_model(id, ModelInput::Reset).unwrap();
        tree.model_mut(id).unwrap().set("name", json!("Alice"));
        assert_eq!(tree.element(id).unwrap().text(), "Alice");
        assert_eq!(tree.model(id).unwrap().listener_count(), 1);
    }

    #[test]
    fn test_children_close_before_parent() {
        let (_d, mut tree) = tree(r#"<main id="app"></main>"#);
        let order = Rc::new(RefCell::new(Vec::new()));

        let log = Rc::clone(&order);
        let leaf = ViewClass::builder("Leaf")
            .template("<span></span>")
            .will_unmount(move |_| log.borrow_mut().push("leaf"))
            .build()
            .unwrap();
        let log = Rc::clone(&order);
        let parent = ViewClass::builder("Parent")
            .template(r#"<div><aside class="slot"></aside></div>"#)
            .will_unmount(move |_| log.borrow_mut().push("parent"))
            .build()
            .unwrap();

        let id = tree.create(parent, "#app", None).unwrap();
        let child = tree.add_view(id, ".slot", leaf, None).unwrap();
        assert_eq!(tree.child(id, ".slot"), Some(child));
        assert_eq!(tree.parent(child), Some(id));

        tree.destroy(id).unwrap();
        assert_eq!(*order.borrow(), vec!["parent", "leaf"]);
        assert!(tree.is_empty());
        assert!(tree.document().query("aside").unwrap().is_empty());
    }

    #[test]
    fn test_update_existing_child_in_place() {
        let (_d, mut tree) = tree(r#"<main id="app"></main>"#);
        let parent = class(r#"<div><aside class="slot"></aside></div>"#);
        let label = ViewClass::builder("Label")
            .render(|data| format!("<b>{}</b>", data["text"].as_str().unwrap_or_default()))
            .build()
            .unwrap();

        let id = tree.create(parent, "#app", None).unwrap();
        let update = |text: &str| ViewUpdate::Child {
            container: ".slot".into(),
            class: Rc::clone(&label),
            model: Some(json!({ "text": text }).into()),
        };
        let first = tree.update_view(id, update("one")).unwrap().unwrap();
        let second = tree.update_view(id, update("two")).unwrap().unwrap();

        assert_eq!(first, second);
        let slot = tree.document().query_first(".slot").unwrap().unwrap();
        assert_eq!(slot.inner_html(), "<b>two</b>");

        tree.update_view(id, ViewUpdate::Discard { container: ".slot".into() })
            .unwrap();
        assert!(tree.child(id, ".slot").is_none());
        assert!(!tree.contains(first));
        assert_eq!(slot.inner_html(), "");
    }

    #[test]
    fn test_update_existing_child_keeps_class_and_grandchildren() {
        let (_d, mut tree) = tree(r#"<main id="app"></main>"#);
        let parent = class(r#"<div><aside class="slot"></aside></div>"#);
        let panel = ViewClass::builder("Panel")
            .render(|data| {
                format!(
                    r#"<section><h2>{}</h2><div class="inner"></div></section>"#,
                    data["title"].as_str().unwrap_or_default()
                )
            })
            .build()
            .unwrap();
        let other = ViewClass::builder("Other").template("<p>other</p>").build().unwrap();
        let leaf = ViewClass::builder("Leaf")
            .render(|data| format!(r#"<em data-role="bind" data-name="n">{}</em>"#, data["n"]))
            .build()
            .unwrap();

        let id = tree.create(parent, "#app", None).unwrap();
        let child = tree
            .add_view(id, ".slot", panel, Some(json!({ "title": "one" }).into()))
            .unwrap();
        let grandchild = tree.add_view(child, ".inner", leaf, None).unwrap();
        tree.model_mut(grandchild).unwrap().set("n", json!(7));

        let updated = tree
            .update_view(
                id,
                ViewUpdate::Child {
                    container: ".slot".into(),
                    class: other,
                    model: Some(json!({ "title": "two" }).into()),
                },
            )
            .unwrap();

        assert_eq!(updated, Some(child));
        assert_eq!(tree.class(child).unwrap().name(), "Panel");
        assert_eq!(tree.child(child, ".inner"), Some(grandchild));
        assert_eq!(tree.get_model(grandchild).unwrap(), json!({ "n": 7 }));

        let slot = tree.document().query_first(".slot").unwrap().unwrap();
        assert_eq!(slot.select_first("h2").unwrap().unwrap().text(), "two");
        let em = tree.element(grandchild).unwrap();
        assert!(slot.contains(&em));
        assert_eq!(em.text(), "7");

        tree.model_mut(grandchild).unwrap().set("n", json!(8));
        assert_eq!(em.text(), "8");
    }

    #[test]
    fn test_delegated_click_bubbles() {
        let (_d, mut tree) = tree(r#"<main id="app"></main>"#);
        let hits = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&hits);
        let list = ViewClass::builder("List")
            .template(r#"<ul><li class="row" data-id="7"><b>x</b></li></ul>"#)
            .event_fn("click .row", move |_, invocation| {
                let event = invocation.event.as_ref().unwrap();
                sink.borrow_mut()
                    .push(event.current_target.data("id").unwrap_or_default());
            })
            .build()
            .unwrap();
        tree.create(list, "#app", None).unwrap();

        let bold = tree.document().query_first("b").unwrap().unwrap();
        assert_eq!(tree.trigger(&bold, "click", Vec::new()), 1);
        assert_eq!(tree.trigger(&bold, "keyup", Vec::new()), 0);
        assert_eq!(*hits.borrow(), vec!["7"]);
    }

    #[test]
    fn test_child_form_submit_arguments() {
        let (_d, mut tree) = tree(r#"<main id="app"></main>"#);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let form = ViewClass::builder("Signup")
            .template(concat!(
                r#"<form><input id="nick" name="nick" value="kim">"#,
                r#"<input id="agree" type="checkbox" name="agree" checked></form>"#,
            ))
            .handler("onSubmit", move |_, invocation| {
                *sink.borrow_mut() = invocation.args.clone();
            })
            .event("@submit", "onSubmit(#nick, #agree)")
            .build()
            .unwrap();
        let id = tree.create(form, "#app", None).unwrap();

        let root = tree.element(id).unwrap();
        tree.trigger(&root, "submit", vec![json!("extra")]);
        assert_eq!(
            *seen.borrow(),
            vec![
                json!("kim"),
                json!(true),
                json!({ "nick": "kim", "agree": true }),
                json!("extra"),
            ]
        );
    }

    #[test]
    fn test_pump_delivers_did_mount_once() {
        let (_d, mut tree) = tree(r#"<main id="app"></main>"#);
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        tree.on_lifecycle(move |id, event| sink.borrow_mut().push((id, event)));

        let hits = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&hits);
        let view = ViewClass::builder("Ready")
            .template("<p></p>")
            .event_fn("viewDidMount", move |_, _| *counter.borrow_mut() += 1)
            .build()
            .unwrap();
        let id = tree.create(view, "#app", None).unwrap();

        assert!(events.borrow().is_empty());
        assert!(tree.has_pending());
        assert_eq!(tree.pump(), 1);
        assert_eq!(tree.pump(), 0);
        assert_eq!(*events.borrow(), vec![(id, Lifecycle::DidMount)]);
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn test_unknown_view() {
        let (_d, tree) = tree("");
        assert_eq!(
            tree.get_model(ViewId(99)),
            Err(ViewError::UnknownView { id: ViewId(99) })
        );
    }

    #[test]
    fn test_missing_layout_reports() {
        let (dispatcher, mut tree) = tree("");
        let errors = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&errors);
        dispatcher.bus().subscribe(EventType::Error, move |e| {
            if matches!(e, AppEvent::Error(ErrorReport::Runtime { .. })) {
                *sink.borrow_mut() += 1;
            }
        });
        assert_eq!(tree.mount_layout("main"), Ok(None));
        assert_eq!(*errors.borrow(), 1);
    }
}
