//! Model-to-element bindings
//!
//! Bind targets are marked with `data-role="bind"`, name the attribute they
//! follow in `data-name` and pick a plugin with `data-type` (`text` when
//! absent). Bindings are derived from the rendered surface on every mount and
//! never outlive it.

use serde_json::Value;
use tracing::{debug, warn};

use crate::bus::{ErrorReport, EventBus};
use crate::dom::{Element, Selector};
use crate::model::{Model, OwnerId};
use crate::plugin::PluginRegistry;

const BIND_TARGETS: &str = "[data-role=bind]";

/// Plugin tag used when an element declares none
pub const DEFAULT_PLUGIN: &str = "text";

/// One element following one model attribute
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub element: Element,
    pub attribute: String,
    pub plugin: String,
}

/// Scan `root` for bind targets and subscribe them to `model`
///
/// Listeners previously registered by `owner` are dropped first, so calling
/// this on every mount never accumulates duplicates. The plugin is resolved
/// when the listener fires; an unknown tag is reported on the bus and the
/// update is skipped.
pub fn bind_model(
    root: &Element,
    model: &mut Model,
    owner: OwnerId,
    plugins: &PluginRegistry,
    bus: &EventBus,
) -> Vec<Binding> {
    unbind_model(model, owner);

    let mut targets = Vec::new();
    if let Ok(selector) = Selector::parse(BIND_TARGETS) {
        if root.matches(&selector) {
            targets.push(root.clone());
        }
        targets.extend(root.find(&selector));
    }

    let mut bindings = Vec::with_capacity(targets.len());
    for element in targets {
        let Some(attribute) = element.data("name").filter(|name| !name.is_empty()) else {
            warn!(tag = %element.tag(), "Bind target without data-name skipped");
            continue;
        };
        let plugin = element
            .data("type")
            .filter(|kind| !kind.is_empty())
            .unwrap_or_else(|| DEFAULT_PLUGIN.to_string());

        let target = element.clone();
        let kind = plugin.clone();
        let plugins = plugins.clone();
        let bus = bus.clone();
        model.listen(owner, attribute.clone(), move |key: &str, value: &Value| {
            match plugins.get(&kind) {
                Some(render) => render(&target, value),
                None => {
                    warn!(plugin = %kind, attribute = %key, "No plugin registered for bind target");
                    bus.report(ErrorReport::runtime(format!(
                        "plugin `{kind}` bound to `{key}` is not registered"
                    )));
                }
            }
        });

        bindings.push(Binding {
            element,
            attribute,
            plugin,
        });
    }

    debug!(owner = owner.0, bindings = bindings.len(), "Model bindings rebuilt");
    bindings
}

/// Drop every binding listener registered by `owner`
pub fn unbind_model(model: &mut Model, owner: OwnerId) {
    model.stop_listening(owner);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{AppEvent, EventType};
    use crate::dom::parse_fragment;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    const OWNER: OwnerId = OwnerId(7);

    fn surface() -> Element {
        parse_fragment(concat!(
            r#"<div>"#,
            r#"<span data-role="bind" data-name="name"></span>"#,
            r#"<input data-role="bind" data-name="name" data-type="input-text">"#,
            r#"<input type="checkbox" data-role="bind" data-name="done" data-type="checkbox">"#,
            r#"<b data-role="bind"></b>"#,
            r#"</div>"#,
        ))
        .unwrap()
    }

    #[test]
    fn test_text_binding_updates_synchronously() {
        let root = surface();
        let mut model = Model::new();
        let bindings = bind_model(&root, &mut model, OWNER, &PluginRegistry::new(), &EventBus::new());

        assert_eq!(bindings.len(), 3);
        assert_eq!(bindings[0].plugin, "text");

        model.set("name", json!("Alice"));
        assert_eq!(bindings[0].element.text(), "Alice");
        assert_eq!(bindings[1].element.value(), "Alice");

        model.set("done", json!(true));
        assert!(bindings[2].element.checked());
    }

    #[test]
    fn test_rebinding_does_not_duplicate_listeners() {
        let root = surface();
        let mut model = Model::new();
        let plugins = PluginRegistry::new();
        let bus = EventBus::new();

        bind_model(&root, &mut model, OWNER, &plugins, &bus);
        bind_model(&root, &mut model, OWNER, &plugins, &bus);
        assert_eq!(model.listener_count_for(OWNER), 3);

        unbind_model(&mut model, OWNER);
        assert_eq!(model.listener_count(), 0);
    }

    #[test]
    fn test_plugin_resolved_at_fire_time() {
        let root = parse_fragment(r#"<p data-role="bind" data-name="n" data-type="stars"></p>"#).unwrap();
        let mut model = Model::new();
        let plugins = PluginRegistry::new();
        let bus = EventBus::new();
        let errors = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&errors);
        bus.subscribe(EventType::Error, move |e| {
            if matches!(e, AppEvent::Error(ErrorReport::Runtime { .. })) {
                *sink.borrow_mut() += 1;
            }
        });

        let bindings = bind_model(&root, &mut model, OWNER, &plugins, &bus);
        model.set("n", json!(2));
        assert_eq!(*errors.borrow(), 1);

        plugins.bind(
            "stars",
            Rc::new(|el: &Element, value: &Value| {
                el.set_text(&"*".repeat(value.as_u64().unwrap_or(0) as usize))
            }),
        );
        model.set("n", json!(3));
        assert_eq!(bindings[0].element.text(), "***");
        assert_eq!(*errors.borrow(), 1);
    }

    #[test]
    fn test_other_owners_survive_rebind() {
        let root = surface();
        let mut model = Model::new();
        model.listen_any(OwnerId(1), |_: &str, _: &Value| {});
        bind_model(&root, &mut model, OWNER, &PluginRegistry::new(), &EventBus::new());
        assert_eq!(model.listener_count_for(OwnerId(1)), 1);
    }
}
