//! Declarative event maps
//!
//! Two key forms are accepted:
//!
//! - `"<event> <selector>"` delegates a DOM event raised on, or bubbling
//!   through, an element matching `selector` inside the view. An empty
//!   selector listens on the view root itself.
//! - `"@<event> <selector>"` with a target `"handler(p1, p2)"` reads the
//!   value of each parameter element and passes them to the handler. For
//!   `submit` a map of every named `input`, `select` and `textarea` under
//!   the matched element is appended.

use serde_json::{Map, Value};

use super::class::{EventTarget, Handler};
use crate::dom::{Element, Selector};
use crate::error::ViewError;

const FORM_FIELDS: &str = "input, select, textarea";

/// The DOM side of a handler invocation
#[derive(Debug, Clone, PartialEq)]
pub struct DomEvent {
    pub event_type: String,
    /// Element the event was raised on
    pub target: Element,
    /// Element the handler was delegated to
    pub current_target: Element,
}

/// Arguments a view handler is called with
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Invocation {
    pub event: Option<DomEvent>,
    pub args: Vec<Value>,
}

impl Invocation {
    pub fn with_args(args: Vec<Value>) -> Self {
        Self { event: None, args }
    }

    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }
}

#[derive(Debug, Clone)]
pub(crate) enum EventForm {
    Dom,
    Child { params: Vec<Selector> },
}

/// A parsed and resolved event map entry
#[derive(Clone)]
pub(crate) struct EventBinding {
    pub key: String,
    pub event: String,
    pub selector: Option<Selector>,
    pub form: EventForm,
    pub handler: Handler,
}

impl std::fmt::Debug for EventBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBinding")
            .field("key", &self.key)
            .field("form", &self.form)
            .finish_non_exhaustive()
    }
}

fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Split a key into `(is_child_form, event, selector)`
fn split_key(key: &str) -> Option<(bool, &str, &str)> {
    if let Some(rest) = key.strip_prefix('@') {
        let end = rest.find(|c: char| !is_word(c)).unwrap_or(rest.len());
        if end == 0 {
            return None;
        }
        return Some((true, &rest[..end], rest[end..].trim()));
    }

    let key = key.trim_start();
    let end = key.find(char::is_whitespace).unwrap_or(key.len());
    if end == 0 {
        return None;
    }
    Some((false, &key[..end], key[end..].trim()))
}

/// Split `"name(a, b)"` into the name and its parameters
fn split_target(target: &str) -> Option<(&str, Vec<&str>)> {
    let target = target.trim();
    let Some(open) = target.find('(') else {
        return Some((target, Vec::new()));
    };
    let inner = target[open + 1..].strip_suffix(')')?;
    let params = inner
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    Some((target[..open].trim(), params))
}

pub(crate) fn parse_declaration(
    view: &str,
    key: &str,
    target: &EventTarget,
    resolve: impl Fn(&str) -> Option<Handler>,
) -> Result<EventBinding, ViewError> {
    let malformed = || ViewError::MalformedEvent {
        view: view.to_string(),
        key: key.to_string(),
    };
    let invalid = |source| ViewError::InvalidSelector {
        view: view.to_string(),
        source,
    };

    let (child, event, selector) = split_key(key).ok_or_else(malformed)?;
    let selector = match selector {
        "" => None,
        s => Some(Selector::parse(s).map_err(invalid)?),
    };

    let (handler, params) = match target {
        EventTarget::Direct(handler) => (handler.clone(), Vec::new()),
        EventTarget::Named(spec) => {
            let (name, params) = split_target(spec).ok_or_else(malformed)?;
            if !child && !params.is_empty() {
                return Err(malformed());
            }
            let handler = resolve(name).ok_or_else(|| ViewError::UnresolvedHandler {
                view: view.to_string(),
                handler: name.to_string(),
            })?;
            let params = params
                .into_iter()
                .map(|p| Selector::parse(p).map_err(invalid))
                .collect::<Result<Vec<_>, _>>()?;
            (handler, params)
        }
    };

    Ok(EventBinding {
        key: key.to_string(),
        event: event.to_string(),
        selector,
        form: if child {
            EventForm::Child { params }
        } else {
            EventForm::Dom
        },
        handler,
    })
}

impl EventBinding {
    /// Element this binding fires for when `event` reaches `root`
    ///
    /// Without a selector that is the root; otherwise the nearest element
    /// matching the selector on the way from `target` up to, but excluding,
    /// the root.
    pub(crate) fn current_target(&self, target: &Element, root: &Element) -> Option<Element> {
        let Some(selector) = &self.selector else {
            return Some(root.clone());
        };
        let mut node = Some(target.clone());
        while let Some(el) = node {
            if el.ptr_eq(root) {
                return None;
            }
            if el.matches(selector) {
                return Some(el);
            }
            node = el.parent();
        }
        None
    }

    /// Build the handler arguments for the child form
    pub(crate) fn child_args(&self, root: &Element, current_target: &Element) -> Vec<Value> {
        let EventForm::Child { params } = &self.form else {
            return Vec::new();
        };
        let mut args: Vec<Value> = params
            .iter()
            .map(|param| root.find_first(param).map_or(Value::Null, |el| element_value(&el)))
            .collect();
        if self.event == "submit" {
            args.push(Value::Object(form_values(current_target)));
        }
        args
    }
}

/// Value of an input-like element
///
/// Checkboxes and radios give their checked state, selects their value, and
/// anything else its value, or its text when the value is empty.
pub fn element_value(el: &Element) -> Value {
    let checkable = el.is("input")
        && matches!(el.attr("type").as_deref(), Some("checkbox") | Some("radio"));
    if checkable {
        return Value::Bool(el.checked());
    }
    if el.is("select") {
        return Value::String(el.value());
    }
    let value = el.value();
    if value.is_empty() {
        Value::String(el.text())
    } else {
        Value::String(value)
    }
}

/// Named form fields under `root`, name to value
pub fn form_values(root: &Element) -> Map<String, Value> {
    let mut values = Map::new();
    for field in root.select(FORM_FIELDS).unwrap_or_default() {
        if let Some(name) = field.attr("name").filter(|n| !n.is_empty()) {
            values.insert(name, element_value(&field));
        }
    }
    values
}
