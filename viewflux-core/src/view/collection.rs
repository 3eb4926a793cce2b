//! Collection views
//!
//! A collection view renders one row view per item, appended to its row
//! container. Rows are children of the collection and close with it.

use std::rc::Rc;

use serde_json::{Map, Value};
use tracing::debug;

use super::class::{Handler, Placement};
use super::events::{DomEvent, Invocation};
use super::tree::{Container, ModelInput, ViewId, ViewTree};
use crate::dom::Element;
use crate::error::ViewError;

/// Model attribute holding a row item that is not an object
pub const ROW_VALUE_KEY: &str = "value";

/// Objects become the row's attributes; other items are kept under
/// [`ROW_VALUE_KEY`]
fn row_model(item: Value) -> ModelInput {
    match item {
        Value::Object(attrs) => ModelInput::Attrs(attrs),
        Value::Null => ModelInput::Attrs(Map::new()),
        other => {
            let mut attrs = Map::new();
            attrs.insert(ROW_VALUE_KEY.to_string(), other);
            ModelInput::Attrs(attrs)
        }
    }
}

impl ViewTree {
    /// Drop every row and add one per item of `data`
    ///
    /// An array gives one row per element, `null` gives none and anything
    /// else a single row. Returns the number of rows added.
    pub fn reload(&mut self, id: ViewId, data: Value) -> Result<usize, ViewError> {
        self.row_container(id)?;

        let rows = std::mem::take(&mut self.node_mut(id)?.rows);
        for row in rows {
            if self.views.contains_key(&row) {
                self.close(row, true)?;
                self.views.remove(&row);
            }
        }

        let items = match data {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            item => vec![item],
        };
        let count = items.len();
        for item in items {
            self.add_row(id, item)?;
        }
        debug!(id = %id, rows = count, "Collection reloaded");
        Ok(count)
    }

    /// Append one row view for `item`
    ///
    /// An object item becomes the row model; any other value is stored
    /// under [`ROW_VALUE_KEY`].
    pub fn add_row(&mut self, id: ViewId, item: Value) -> Result<ViewId, ViewError> {
        let container = self.row_container(id)?;
        let row_view = match self.node(id)?.class.collection() {
            Some(spec) => Rc::clone(&spec.row_view),
            None => return Err(self.not_a_collection(id)),
        };

        let row = self.spawn(
            row_view,
            Container::Element(container),
            Some(id),
            Some(Placement::Append),
            Some(row_model(item)),
        )?;
        self.node_mut(id)?.rows.push(row);
        Ok(row)
    }

    /// Close the row at `index`, returning its model
    pub fn remove_row(&mut self, id: ViewId, index: usize) -> Result<Option<Value>, ViewError> {
        let Some(row) = self.node(id)?.rows.get(index).copied() else {
            return Ok(None);
        };
        let model = self.get_model(row)?;
        self.destroy(row)?;
        Ok(Some(model))
    }

    /// Model snapshots of every row, in order
    pub fn collection(&self, id: ViewId) -> Result<Vec<Value>, ViewError> {
        self.node(id)?
            .rows
            .iter()
            .map(|row| self.get_model(*row))
            .collect()
    }

    pub fn rows(&self, id: ViewId) -> Vec<ViewId> {
        self.views
            .get(&id)
            .map(|node| node.rows.clone())
            .unwrap_or_default()
    }

    fn not_a_collection(&self, id: ViewId) -> ViewError {
        match self.class(id) {
            Some(class) => ViewError::NotACollection {
                view: class.name().to_string(),
            },
            None => ViewError::UnknownView { id },
        }
    }

    /// First descendant matching the row container selector, else the root
    /// itself when it matches
    pub(super) fn row_container(&self, id: ViewId) -> Result<Element, ViewError> {
        let node = self.node(id)?;
        let Some(spec) = node.class.collection() else {
            return Err(self.not_a_collection(id));
        };
        let missing = || ViewError::MissingRowContainer {
            view: node.class.name().to_string(),
            selector: spec.row_container.to_string(),
        };
        let root = node.element.clone().ok_or_else(missing)?;
        root.find_first(&spec.row_container)
            .or_else(|| root.matches(&spec.row_container).then(|| root.clone()))
            .ok_or_else(missing)
    }

    /// The selection handler call for a click reaching a row's root
    pub(super) fn row_selection(
        &self,
        row: ViewId,
        root: &Element,
        target: &Element,
    ) -> Option<(ViewId, Handler, Invocation)> {
        let collection = self.views.get(&row)?.parent?;
        let node = self.views.get(&collection)?;
        let handler = node.class.collection()?.on_selected_row.clone()?;
        let index = node.rows.iter().position(|r| *r == row)?;
        let model = self.get_model(row).ok()?;

        Some((
            collection,
            handler,
            Invocation {
                event: Some(DomEvent {
                    event_type: "click".to_string(),
                    target: target.clone(),
                    current_target: root.clone(),
                }),
                args: vec![Value::from(index), model],
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use crate::view::{ViewClass, ViewScope, ViewUpdate};
    use crate::Dispatcher;
    use serde_json::json;
    use std::cell::RefCell;

    fn row() -> Rc<ViewClass> {
        ViewClass::builder("Row")
            .render(|data| format!("<li>{}</li>", data["name"].as_str().unwrap_or_default()))
            .build()
            .unwrap()
    }

    fn setup(list: Rc<ViewClass>) -> (Dispatcher<()>, ViewTree, ViewId) {
        let dispatcher = Dispatcher::new(());
        let mut tree = ViewTree::new(
            dispatcher.context().clone(),
            Document::parse(r#"<main id="app"></main>"#).unwrap(),
        );
        let id = tree.create(list, "#app", None).unwrap();
        (dispatcher, tree, id)
    }

    #[test]
    fn test_reload_renders_rows_in_order() {
        let list = ViewClass::builder("List")
            .template(r#"<div><h1>people</h1><ul class="rows"></ul></div>"#)
            .collection("ul.rows", row())
            .build()
            .unwrap();
        let (_d, mut tree, id) = setup(list);

        let count = tree
            .reload(id, json!([{ "name": "kim" }, { "name": "lee" }]))
            .unwrap();
        assert_eq!(count, 2);
        let ul = tree.document().query_first("ul.rows").unwrap().unwrap();
        assert_eq!(ul.inner_html(), "<li>kim</li><li>lee</li>");

        tree.reload(id, json!({ "name": "park" })).unwrap();
        assert_eq!(ul.inner_html(), "<li>park</li>");
        assert_eq!(tree.collection(id).unwrap(), vec![json!({ "name": "park" })]);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_scalar_items_keep_their_value() {
        let list = ViewClass::builder("Tags")
            .template("<ul></ul>")
            .collection(
                "ul",
                ViewClass::builder("Tag")
                    .render(|data| format!("<li>{}</li>", data[ROW_VALUE_KEY]))
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();
        let (_d, mut tree, id) = setup(list);

        tree.reload(id, json!(["rust", 7, [1, 2]])).unwrap();
        assert_eq!(
            tree.collection(id).unwrap(),
            vec![
                json!({ "value": "rust" }),
                json!({ "value": 7 }),
                json!({ "value": [1, 2] }),
            ]
        );
        let texts: Vec<String> = tree
            .element(id)
            .unwrap()
            .children()
            .iter()
            .map(|li| li.text())
            .collect();
        assert_eq!(texts, vec![r#""rust""#, "7", "[1,2]"]);
    }

    #[test]
    fn test_root_as_row_container() {
        let list = ViewClass::builder("List")
            .template("<ul></ul>")
            .collection("ul", row())
            .build()
            .unwrap();
        let (_d, mut tree, id) = setup(list);
        tree.add_row(id, json!({ "name": "a" })).unwrap();
        assert_eq!(tree.element(id).unwrap().inner_html(), "<li>a</li>");
    }

    #[test]
    fn test_row_container_errors() {
        let list = ViewClass::builder("List")
            .template("<div></div>")
            .collection("ul", row())
            .build()
            .unwrap();
        let (_d, mut tree, id) = setup(list);
        assert_eq!(
            tree.add_row(id, json!({})),
            Err(ViewError::MissingRowContainer {
                view: "List".into(),
                selector: "ul".into()
            })
        );

        let plain = ViewClass::builder("Plain").template("<div></div>").build().unwrap();
        let (_d, mut tree, id) = setup(plain);
        assert_eq!(
            tree.reload(id, json!([])),
            Err(ViewError::NotACollection { view: "Plain".into() })
        );
    }

    #[test]
    fn test_remove_row() {
        let list = ViewClass::builder("List")
            .template("<ul></ul>")
            .collection("ul", row())
            .build()
            .unwrap();
        let (_d, mut tree, id) = setup(list);
        tree.reload(id, json!([{ "name": "a" }, { "name": "b" }])).unwrap();

        assert_eq!(tree.remove_row(id, 0).unwrap(), Some(json!({ "name": "a" })));
        assert_eq!(tree.remove_row(id, 5).unwrap(), None);
        assert_eq!(tree.element(id).unwrap().inner_html(), "<li>b</li>");
        assert_eq!(tree.rows(id).len(), 1);
    }

    #[test]
    fn test_row_click_selects() {
        let picked = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&picked);
        let list = ViewClass::builder("List")
            .template("<ul></ul>")
            .handler("onPick", move |_: &mut ViewScope<'_>, invocation: &Invocation| {
                *sink.borrow_mut() = Some(invocation.args.clone());
            })
            .collection("ul", row())
            .on_selected_row("onPick")
            .build()
            .unwrap();
        let (_d, mut tree, id) = setup(list);
        tree.reload(id, json!([{ "name": "a" }, { "name": "b" }])).unwrap();

        let second = tree.element(tree.rows(id)[1]).unwrap();
        assert_eq!(tree.trigger(&second, "click", Vec::new()), 1);
        assert_eq!(
            *picked.borrow(),
            Some(vec![json!(1), json!({ "name": "b" })])
        );
    }

    #[test]
    fn test_rows_survive_child_update() {
        let list = ViewClass::builder("List")
            .render(|data| {
                format!(
                    r#"<div><h1>{}</h1><ul></ul></div>"#,
                    data["title"].as_str().unwrap_or_default()
                )
            })
            .collection("ul", row())
            .build()
            .unwrap();
        let page = ViewClass::builder("Page")
            .template(r#"<div><section class="slot"></section></div>"#)
            .build()
            .unwrap();
        let (_d, mut tree, id) = setup(page);
        let child = tree
            .add_view(id, ".slot", Rc::clone(&list), Some(json!({ "title": "a" }).into()))
            .unwrap();
        tree.reload(child, json!([{ "name": "kim" }, { "name": "lee" }])).unwrap();
        let rows = tree.rows(child);

        tree.update_view(
            id,
            ViewUpdate::Child {
                container: ".slot".into(),
                class: list,
                model: Some(json!({ "title": "b" }).into()),
            },
        )
        .unwrap();

        assert_eq!(tree.rows(child), rows);
        let root = tree.element(child).unwrap();
        assert_eq!(root.select_first("h1").unwrap().unwrap().text(), "b");
        assert_eq!(
            root.select_first("ul").unwrap().unwrap().inner_html(),
            "<li>kim</li><li>lee</li>"
        );
    }

    #[test]
    fn test_rows_close_with_collection() {
        let list = ViewClass::builder("List")
            .template("<ul></ul>")
            .collection("ul", row())
            .build()
            .unwrap();
        let (_d, mut tree, id) = setup(list);
        tree.reload(id, json!([{}, {}, {}])).unwrap();
        assert_eq!(tree.len(), 4);

        tree.destroy(id).unwrap();
        assert!(tree.is_empty());
    }
}
