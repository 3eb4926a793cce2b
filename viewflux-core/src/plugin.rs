//! Presentation plugins keyed by `data-type`
//!
//! A plugin renders one model value into one element. The registry is shared
//! by every view of an application and can be extended at runtime.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::dom::Element;

/// Renders a model value into a bound element
pub type Plugin = Rc<dyn Fn(&Element, &Value)>;

/// Plain-text rendering of a value: strings unquoted, `null` empty
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn text_plugin(el: &Element, value: &Value) {
    el.set_text(&display_value(value));
}

fn input_text_plugin(el: &Element, value: &Value) {
    el.set_value(&display_value(value));
}

fn checkbox_plugin(el: &Element, value: &Value) {
    el.set_checked(truthy(value));
}

fn select_plugin(el: &Element, value: &Value) {
    let value = display_value(value);
    for option in el.select("option").unwrap_or_default() {
        if option.value() == value {
            option.set_attr("selected", "");
        } else {
            option.remove_attr("selected");
        }
    }
    el.set_value(&value);
}

/// Shared, case-insensitive plugin registry
#[derive(Clone)]
pub struct PluginRegistry {
    plugins: Rc<RefCell<HashMap<String, Plugin>>>,
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds = self.kinds();
        kinds.sort();
        f.debug_struct("PluginRegistry").field("kinds", &kinds).finish()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        let registry = Self::empty();
        registry.bind("text", Rc::new(text_plugin));
        registry.bind("input-text", Rc::new(input_text_plugin));
        registry.bind("checkbox", Rc::new(checkbox_plugin));
        registry.bind("select", Rc::new(select_plugin));
        registry
    }
}

impl PluginRegistry {
    /// Registry preloaded with `text`, `input-text`, `checkbox` and `select`
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty() -> Self {
        Self {
            plugins: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Register or replace the plugin for `kind`
    pub fn bind(&self, kind: &str, plugin: Plugin) -> Option<Plugin> {
        self.plugins
            .borrow_mut()
            .insert(kind.to_ascii_lowercase(), plugin)
    }

    pub fn get(&self, kind: &str) -> Option<Plugin> {
        self.plugins
            .borrow()
            .get(&kind.to_ascii_lowercase())
            .cloned()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.plugins
            .borrow()
            .contains_key(&kind.to_ascii_lowercase())
    }

    pub fn kinds(&self) -> Vec<String> {
        self.plugins.borrow().keys().cloned().collect()
    }
}
