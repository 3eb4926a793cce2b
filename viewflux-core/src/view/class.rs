//! View class definitions
//!
//! A [`ViewClass`] is static metadata shared by every instance: template,
//! root tag, class name, placement, named handlers and the event map. Event
//! handler names are resolved once in [`ViewClassBuilder::build`], so an
//! instance can never reference a handler that does not exist.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use super::events::{parse_declaration, EventBinding, Invocation};
use super::scope::ViewScope;
use crate::dom::{Element, Selector};
use crate::error::ViewError;

/// A view method, invoked for DOM events and routed reducer results
pub type Handler = Rc<dyn Fn(&mut ViewScope<'_>, &Invocation)>;

/// Renders the model snapshot into markup
pub type RenderFn = Rc<dyn Fn(&Value) -> String>;

type WillMountFn = Rc<dyn Fn(&Value) -> Option<Value>>;
type DidMountFn = Rc<dyn Fn(&mut ViewScope<'_>, &Element)>;
type WillUnmountFn = Rc<dyn Fn(&mut ViewScope<'_>)>;

#[derive(Clone)]
pub enum Template {
    Static(String),
    Render(RenderFn),
}

impl Template {
    pub fn render(&self, data: &Value) -> String {
        match self {
            Template::Static(markup) => markup.clone(),
            Template::Render(render) => render(data),
        }
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Template::Static(markup) => f.debug_tuple("Static").field(markup).finish(),
            Template::Render(_) => f.write_str("Render(..)"),
        }
    }
}

/// Where a first mount puts the rendered root relative to its container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    /// Overwrite the container's contents
    #[default]
    Replace,
    /// Append as the container's last child
    Append,
    /// Insert as the container's next sibling
    After,
}

/// Target of an event map entry
#[derive(Clone)]
pub enum EventTarget {
    /// `"handler"` or `"handler(p1, p2)"`, looked up in the handler table
    Named(String),
    Direct(Handler),
}

impl From<&str> for EventTarget {
    fn from(spec: &str) -> Self {
        EventTarget::Named(spec.to_string())
    }
}

impl From<String> for EventTarget {
    fn from(spec: String) -> Self {
        EventTarget::Named(spec)
    }
}

#[derive(Clone)]
struct CollectionDecl {
    row_container: String,
    row_view: Rc<ViewClass>,
    on_selected_row: Option<String>,
}

/// Row layout of a collection view
#[derive(Clone)]
pub(crate) struct CollectionSpec {
    pub row_container: Selector,
    pub row_view: Rc<ViewClass>,
    pub on_selected_row: Option<Handler>,
}

#[derive(Clone, Default)]
struct Hooks {
    will_mount: Option<WillMountFn>,
    did_mount: Option<DidMountFn>,
    will_unmount: Option<WillUnmountFn>,
}

/// Shared definition of a kind of view
pub struct ViewClass {
    name: String,
    template: Option<Template>,
    tag_name: Option<String>,
    class_name: Option<String>,
    placement: Placement,
    handlers: HashMap<String, Handler>,
    declarations: Vec<(String, EventTarget)>,
    events: Vec<EventBinding>,
    hooks: Hooks,
    collection_decl: Option<CollectionDecl>,
    collection: Option<CollectionSpec>,
}

impl fmt::Debug for ViewClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handlers: Vec<_> = self.handlers.keys().collect();
        handlers.sort();
        f.debug_struct("ViewClass")
            .field("name", &self.name)
            .field("template", &self.template)
            .field("tag_name", &self.tag_name)
            .field("class_name", &self.class_name)
            .field("placement", &self.placement)
            .field("handlers", &handlers)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl ViewClass {
    /// Start a new class definition
    pub fn builder(name: impl Into<String>) -> ViewClassBuilder {
        ViewClassBuilder::new(name)
    }

    /// Start a class that inherits everything `parent` declares
    ///
    /// Anything set on the returned builder overrides the parent; handlers
    /// and event entries are merged by name and key.
    pub fn extend(parent: &ViewClass, name: impl Into<String>) -> ViewClassBuilder {
        ViewClassBuilder {
            name: name.into(),
            template: parent.template.clone(),
            tag_name: parent.tag_name.clone(),
            class_name: parent.class_name.clone(),
            placement: parent.placement,
            handlers: parent.handlers.clone(),
            declarations: parent.declarations.clone(),
            hooks: parent.hooks.clone(),
            collection: parent.collection_decl.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> Option<&Template> {
        self.template.as_ref()
    }

    /// Root tag override, if this class or an ancestor declares one
    pub fn tag_name(&self) -> Option<&str> {
        self.tag_name.as_deref()
    }

    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    pub fn handler(&self, name: &str) -> Option<Handler> {
        self.handlers.get(name).cloned()
    }

    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Event map keys, in declaration order
    pub fn event_keys(&self) -> impl Iterator<Item = &str> {
        self.events.iter().map(|binding| binding.key.as_str())
    }

    pub fn is_collection(&self) -> bool {
        self.collection.is_some()
    }

    pub(crate) fn events(&self) -> &[EventBinding] {
        &self.events
    }

    pub(crate) fn collection(&self) -> Option<&CollectionSpec> {
        self.collection.as_ref()
    }

    pub(crate) fn will_mount(&self, data: &Value) -> Option<Value> {
        self.hooks.will_mount.as_ref().and_then(|hook| hook(data))
    }

    pub(crate) fn did_mount_hook(&self) -> Option<DidMountFn> {
        self.hooks.did_mount.clone()
    }

    pub(crate) fn will_unmount_hook(&self) -> Option<WillUnmountFn> {
        self.hooks.will_unmount.clone()
    }
}

/// Builder for [`ViewClass`]
///
/// # Example
/// ```
/// use viewflux_core::view::ViewClass;
///
/// let counter = ViewClass::builder("Counter")
///     .template(r#"<div><span data-role="bind" data-name="count"></span><button>+</button></div>"#)
///     .handler("onIncrement", |scope, _invocation| {
///         let next = scope.get_model_attr("count").and_then(|v| v.as_i64()).unwrap_or(0) + 1;
///         scope.set_attr("count", next.into());
///     })
///     .event("click button", "onIncrement")
///     .build()
///     .unwrap();
///
/// assert_eq!(counter.event_keys().collect::<Vec<_>>(), vec!["click button"]);
/// assert!(ViewClass::builder("Broken").event("click", "nope").build().is_err());
/// ```
#[must_use]
pub struct ViewClassBuilder {
    name: String,
    template: Option<Template>,
    tag_name: Option<String>,
    class_name: Option<String>,
    placement: Placement,
    handlers: HashMap<String, Handler>,
    declarations: Vec<(String, EventTarget)>,
    hooks: Hooks,
    collection: Option<CollectionDecl>,
}

impl ViewClassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: None,
            tag_name: None,
            class_name: None,
            placement: Placement::Replace,
            handlers: HashMap::new(),
            declarations: Vec::new(),
            hooks: Hooks::default(),
            collection: None,
        }
    }

    /// Static markup
    pub fn template(mut self, markup: impl Into<String>) -> Self {
        self.template = Some(Template::Static(markup.into()));
        self
    }

    /// Markup rendered from the model snapshot on every mount
    pub fn render(mut self, render: impl Fn(&Value) -> String + 'static) -> Self {
        self.template = Some(Template::Render(Rc::new(render)));
        self
    }

    /// Wrap rendered markup in this tag instead of adopting its single root
    pub fn tag_name(mut self, tag: impl Into<String>) -> Self {
        self.tag_name = Some(tag.into());
        self
    }

    pub fn class_name(mut self, class: impl Into<String>) -> Self {
        self.class_name = Some(class.into());
        self
    }

    pub fn placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    pub fn handler(
        mut self,
        name: impl Into<String>,
        handler: impl Fn(&mut ViewScope<'_>, &Invocation) + 'static,
    ) -> Self {
        self.handlers.insert(name.into(), Rc::new(handler));
        self
    }

    /// Add an event map entry, replacing one with the same key
    pub fn event(mut self, key: impl Into<String>, target: impl Into<EventTarget>) -> Self {
        let key = key.into();
        let target = target.into();
        match self.declarations.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = target,
            None => self.declarations.push((key, target)),
        }
        self
    }

    /// Add an event map entry with an inline handler
    pub fn event_fn(
        self,
        key: impl Into<String>,
        handler: impl Fn(&mut ViewScope<'_>, &Invocation) + 'static,
    ) -> Self {
        self.event(key, EventTarget::Direct(Rc::new(handler)))
    }

    /// Called before rendering; a returned value replaces the render input
    pub fn will_mount(mut self, hook: impl Fn(&Value) -> Option<Value> + 'static) -> Self {
        self.hooks.will_mount = Some(Rc::new(hook));
        self
    }

    /// Called synchronously once the root is attached and bound
    pub fn did_mount(mut self, hook: impl Fn(&mut ViewScope<'_>, &Element) + 'static) -> Self {
        self.hooks.did_mount = Some(Rc::new(hook));
        self
    }

    pub fn will_unmount(mut self, hook: impl Fn(&mut ViewScope<'_>) + 'static) -> Self {
        self.hooks.will_unmount = Some(Rc::new(hook));
        self
    }

    /// Make this a collection view whose rows are `row_view` instances
    /// appended to the element matching `row_container`
    pub fn collection(mut self, row_container: impl Into<String>, row_view: Rc<ViewClass>) -> Self {
        let on_selected_row = self.collection.take().and_then(|decl| decl.on_selected_row);
        self.collection = Some(CollectionDecl {
            row_container: row_container.into(),
            row_view,
            on_selected_row,
        });
        self
    }

    /// Handler called with `[index, row model]` when a row is clicked
    ///
    /// Has no effect unless [`collection`](Self::collection) was called first.
    pub fn on_selected_row(mut self, handler: impl Into<String>) -> Self {
        if let Some(decl) = self.collection.as_mut() {
            decl.on_selected_row = Some(handler.into());
        }
        self
    }

    pub fn build(self) -> Result<Rc<ViewClass>, ViewError> {
        let name = self.name;
        let handlers = self.handlers;
        let resolve = |handler: &str| handlers.get(handler).cloned();

        let events = self
            .declarations
            .iter()
            .map(|(key, target)| parse_declaration(&name, key, target, resolve))
            .collect::<Result<Vec<_>, _>>()?;

        let collection = match &self.collection {
            None => None,
            Some(decl) => {
                let row_container = Selector::parse(&decl.row_container).map_err(|source| {
                    ViewError::InvalidSelector {
                        view: name.clone(),
                        source,
                    }
                })?;
                let on_selected_row = match &decl.on_selected_row {
                    None => None,
                    Some(handler) => Some(resolve(handler).ok_or_else(|| {
                        ViewError::UnresolvedHandler {
                            view: name.clone(),
                            handler: handler.clone(),
                        }
                    })?),
                };
                Some(CollectionSpec {
                    row_container,
                    row_view: Rc::clone(&decl.row_view),
                    on_selected_row,
                })
            }
        };

        Ok(Rc::new(ViewClass {
            name,
            template: self.template,
            tag_name: self.tag_name,
            class_name: self.class_name,
            placement: self.placement,
            handlers,
            declarations: self.declarations,
            events,
            hooks: self.hooks,
            collection_decl: self.collection,
            collection,
        }))
    }
}

/// A named top-level view and the container it mounts into
#[derive(Debug, Clone)]
pub struct Layout {
    pub name: String,
    pub container: String,
    pub view: Rc<ViewClass>,
}

impl Layout {
    pub fn new(name: impl Into<String>, container: impl Into<String>, view: Rc<ViewClass>) -> Self {
        Self {
            name: name.into(),
            container: container.into(),
            view,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut ViewScope<'_>, _: &Invocation) {}

    #[test]
    fn test_build_resolves_handlers() {
        let class = ViewClass::builder("List")
            .template("<ul></ul>")
            .handler("onClick", noop)
            .event("click li", "onClick")
            .event("@submit form", "onClick(#name)")
            .event_fn("dblclick", noop)
            .build()
            .unwrap();

        assert_eq!(class.events().len(), 3);
        assert!(class.has_handler("onClick"));
        assert_eq!(class.placement(), Placement::Replace);
        assert!(class.tag_name().is_none());
    }

    #[test]
    fn test_same_key_replaces_entry() {
        let class = ViewClass::builder("List")
            .handler("a", noop)
            .handler("b", noop)
            .event("click li", "a")
            .event("click li", "b")
            .build()
            .unwrap();
        assert_eq!(class.event_keys().collect::<Vec<_>>(), vec!["click li"]);
    }

    #[test]
    fn test_unresolved_handler_is_a_build_error() {
        let err = ViewClass::builder("List")
            .event("click li", "onMissing")
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "[List] event handler `onMissing` is not defined"
        );
    }

    #[test]
    fn test_extend_inherits_and_overrides() {
        let base = ViewClass::builder("Base")
            .tag_name("section")
            .class_name("card")
            .template("<p>base</p>")
            .handler("onClick", noop)
            .event("click", "onClick")
            .build()
            .unwrap();

        let child = ViewClass::extend(&base, "Child")
            .template("<p>child</p>")
            .build()
            .unwrap();
        assert_eq!(child.name(), "Child");
        assert_eq!(child.tag_name(), Some("section"));
        assert_eq!(child.class_name(), Some("card"));
        assert_eq!(child.events().len(), 1);
        assert_eq!(
            child.template().map(|t| t.render(&Value::Null)).as_deref(),
            Some("<p>child</p>")
        );
    }

    #[test]
    fn test_collection_declaration() {
        let row = ViewClass::builder("Row").template("<li></li>").build().unwrap();
        let list = ViewClass::builder("List")
            .template("<ul></ul>")
            .handler("onPick", noop)
            .collection("ul", Rc::clone(&row))
            .on_selected_row("onPick")
            .build()
            .unwrap();
        assert!(list.is_collection());
        assert!(list.collection().unwrap().on_selected_row.is_some());

        let broken = ViewClass::builder("List")
            .collection("ul", row)
            .on_selected_row("onMissing")
            .build();
        assert!(matches!(broken, Err(ViewError::UnresolvedHandler { .. })));
    }

    #[test]
    fn test_render_template() {
        let class = ViewClass::builder("Hello")
            .render(|data| format!("<p>{}</p>", data["name"].as_str().unwrap_or_default()))
            .build()
            .unwrap();
        let markup = class
            .template()
            .unwrap()
            .render(&serde_json::json!({ "name": "Kim" }));
        assert_eq!(markup, "<p>Kim</p>");
    }
}
