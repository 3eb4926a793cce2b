use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use super::markup::{escape_attr, escape_text, is_void};
use super::selector::Selector;
use crate::error::SelectorError;

#[derive(Clone)]
enum Child {
    Element(Element),
    Text(String),
}

struct Node {
    tag: String,
    attrs: BTreeMap<String, String>,
    /// Live form value, diverging from the `value` attribute once edited
    value: Option<String>,
    checked: bool,
    children: Vec<Child>,
    parent: Weak<RefCell<Node>>,
}

/// Shared handle to a node of the in-memory document
///
/// Cloning clones the handle; equality is identity.
#[derive(Clone)]
pub struct Element {
    node: Rc<RefCell<Node>>,
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Element {}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.node.borrow();
        f.debug_struct("Element")
            .field("tag", &node.tag)
            .field("attrs", &node.attrs)
            .field("children", &node.children.len())
            .finish()
    }
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            node: Rc::new(RefCell::new(Node {
                tag: tag.into().to_ascii_lowercase(),
                attrs: BTreeMap::new(),
                value: None,
                checked: false,
                children: Vec::new(),
                parent: Weak::new(),
            })),
        }
    }

    /// Builder-style attribute setter
    pub fn with_attr(self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn ptr_eq(&self, other: &Element) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }

    /// Stable identity for the lifetime of the node
    pub fn node_id(&self) -> usize {
        Rc::as_ptr(&self.node) as usize
    }

    pub fn tag(&self) -> String {
        self.node.borrow().tag.clone()
    }

    pub fn is(&self, tag: &str) -> bool {
        self.node.borrow().tag.eq_ignore_ascii_case(tag)
    }

    // Attributes

    pub fn attr(&self, name: &str) -> Option<String> {
        self.node.borrow().attrs.get(name).cloned()
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.node.borrow().attrs.contains_key(name)
    }

    pub fn set_attr(&self, name: &str, value: &str) {
        self.node
            .borrow_mut()
            .attrs
            .insert(name.to_ascii_lowercase(), value.to_string());
    }

    pub fn remove_attr(&self, name: &str) -> Option<String> {
        self.node.borrow_mut().attrs.remove(name)
    }

    /// Read a `data-*` attribute by its suffix
    pub fn data(&self, key: &str) -> Option<String> {
        self.attr(&format!("data-{key}"))
    }

    pub fn id(&self) -> Option<String> {
        self.attr("id")
    }

    pub fn classes(&self) -> Vec<String> {
        self.attr("class")
            .map(|c| c.split_whitespace().map(String::from).collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.node
            .borrow()
            .attrs
            .get("class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == class))
    }

    /// Add one or more space-separated classes
    pub fn add_class(&self, classes: &str) {
        let mut current = self.classes();
        for class in classes.split_whitespace() {
            if !current.iter().any(|c| c == class) {
                current.push(class.to_string());
            }
        }
        self.set_classes(current);
    }

    pub fn remove_class(&self, classes: &str) {
        let remove: Vec<&str> = classes.split_whitespace().collect();
        let mut current = self.classes();
        current.retain(|c| !remove.contains(&c.as_str()));
        self.set_classes(current);
    }

    /// Returns whether the class is present afterwards
    pub fn toggle_class(&self, class: &str) -> bool {
        if self.has_class(class) {
            self.remove_class(class);
            false
        } else {
            self.add_class(class);
            true
        }
    }

    fn set_classes(&self, classes: Vec<String>) {
        if classes.is_empty() {
            self.remove_attr("class");
        } else {
            self.set_attr("class", &classes.join(" "));
        }
    }

    // Content

    /// Concatenated text of all descendants
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in self.node.borrow().children.iter() {
            match child {
                Child::Text(text) => out.push_str(text),
                Child::Element(el) => el.collect_text(out),
            }
        }
    }

    /// Replace all children with a single text node
    pub fn set_text(&self, text: &str) {
        self.detach_children();
        if !text.is_empty() {
            self.node
                .borrow_mut()
                .children
                .push(Child::Text(text.to_string()));
        }
    }

    pub fn append_text(&self, text: &str) {
        self.node
            .borrow_mut()
            .children
            .push(Child::Text(text.to_string()));
    }

    /// Current form value
    ///
    /// Falls back to the `value` attribute, and for `option` to its text.
    pub fn value(&self) -> String {
        let node = self.node.borrow();
        if let Some(value) = &node.value {
            return value.clone();
        }
        if let Some(value) = node.attrs.get("value") {
            return value.clone();
        }
        let is_option = node.tag == "option";
        drop(node);
        if is_option {
            self.text()
        } else {
            String::new()
        }
    }

    pub fn set_value(&self, value: &str) {
        self.node.borrow_mut().value = Some(value.to_string());
    }

    pub fn checked(&self) -> bool {
        self.node.borrow().checked
    }

    pub fn set_checked(&self, checked: bool) {
        self.node.borrow_mut().checked = checked;
    }

    // Tree

    pub fn parent(&self) -> Option<Element> {
        self.node
            .borrow()
            .parent
            .upgrade()
            .map(|node| Element { node })
    }

    /// Parent chain, nearest first
    pub fn ancestors(&self) -> Vec<Element> {
        let mut out = Vec::new();
        let mut current = self.parent();
        while let Some(el) = current {
            current = el.parent();
            out.push(el);
        }
        out
    }

    /// Element children in document order
    pub fn children(&self) -> Vec<Element> {
        self.node
            .borrow()
            .children
            .iter()
            .filter_map(|c| match c {
                Child::Element(el) => Some(el.clone()),
                Child::Text(_) => None,
            })
            .collect()
    }

    /// All descendant elements in document order, excluding `self`
    pub fn descendants(&self) -> Vec<Element> {
        let mut out = Vec::new();
        self.collect_descendants(&mut out);
        out
    }

    fn collect_descendants(&self, out: &mut Vec<Element>) {
        for child in self.children() {
            out.push(child.clone());
            child.collect_descendants(out);
        }
    }

    /// Whether `other` is a strict descendant
    pub fn contains(&self, other: &Element) -> bool {
        other.ancestors().iter().any(|a| a.ptr_eq(self))
    }

    /// Append a child, moving it from its previous parent
    pub fn append(&self, child: &Element) {
        child.remove();
        child.node.borrow_mut().parent = Rc::downgrade(&self.node);
        self.node
            .borrow_mut()
            .children
            .push(Child::Element(child.clone()));
    }

    /// Insert `sibling` right after `self`. Returns `false` when detached.
    pub fn insert_after(&self, sibling: &Element) -> bool {
        let Some(parent) = self.parent() else {
            return false;
        };
        sibling.remove();
        let Some(index) = parent.index_of(self) else {
            return false;
        };
        sibling.node.borrow_mut().parent = Rc::downgrade(&parent.node);
        parent
            .node
            .borrow_mut()
            .children
            .insert(index + 1, Child::Element(sibling.clone()));
        true
    }

    /// Put `replacement` where `self` is and detach `self`
    pub fn replace_with(&self, replacement: &Element) -> bool {
        if replacement.ptr_eq(self) {
            return true;
        }
        if !self.insert_after(replacement) {
            return false;
        }
        self.remove();
        true
    }

    /// Overwrite all children
    pub fn set_children(&self, children: impl IntoIterator<Item = Element>) {
        self.detach_children();
        for child in children {
            self.append(&child);
        }
    }

    /// Remove all children
    pub fn empty(&self) {
        self.detach_children();
    }

    fn detach_children(&self) {
        let children = std::mem::take(&mut self.node.borrow_mut().children);
        for child in children {
            if let Child::Element(el) = child {
                el.node.borrow_mut().parent = Weak::new();
            }
        }
    }

    /// Detach from the parent, if any
    pub fn remove(&self) {
        if let Some(parent) = self.parent() {
            if let Some(index) = parent.index_of(self) {
                parent.node.borrow_mut().children.remove(index);
            }
        }
        self.node.borrow_mut().parent = Weak::new();
    }

    fn index_of(&self, child: &Element) -> Option<usize> {
        self.node
            .borrow()
            .children
            .iter()
            .position(|c| matches!(c, Child::Element(el) if el.ptr_eq(child)))
    }

    // Selection

    pub fn matches(&self, selector: &Selector) -> bool {
        selector.matches(self)
    }

    /// Descendants matching `selector`, in document order
    pub fn find(&self, selector: &Selector) -> Vec<Element> {
        self.descendants()
            .into_iter()
            .filter(|el| selector.matches(el))
            .collect()
    }

    pub fn find_first(&self, selector: &Selector) -> Option<Element> {
        self.descendants()
            .into_iter()
            .find(|el| selector.matches(el))
    }

    /// Parse `selector` and run [`find`](Self::find)
    pub fn select(&self, selector: &str) -> Result<Vec<Element>, SelectorError> {
        Ok(self.find(&Selector::parse(selector)?))
    }

    pub fn select_first(&self, selector: &str) -> Result<Option<Element>, SelectorError> {
        Ok(self.find_first(&Selector::parse(selector)?))
    }

    /// Nearest of `self` and its ancestors that matches
    pub fn closest(&self, selector: &Selector) -> Option<Element> {
        if selector.matches(self) {
            return Some(self.clone());
        }
        self.ancestors().into_iter().find(|a| selector.matches(a))
    }

    // Serialization

    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        self.write_children(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        let node = self.node.borrow();
        out.push('<');
        out.push_str(&node.tag);
        for (name, value) in &node.attrs {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }
        out.push('>');
        if is_void(&node.tag) {
            return;
        }
        drop(node);
        self.write_children(out);
        out.push_str("</");
        out.push_str(&self.node.borrow().tag);
        out.push('>');
    }

    fn write_children(&self, out: &mut String) {
        for child in self.node.borrow().children.iter() {
            match child {
                Child::Text(text) => out.push_str(&escape_text(text)),
                Child::Element(el) => el.write_html(out),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> (Element, Element, Element) {
        let ul = Element::new("ul");
        let a = Element::new("li").with_attr("id", "a");
        let b = Element::new("li").with_attr("id", "b");
        ul.append(&a);
        ul.append(&b);
        (ul, a, b)
    }

    #[test]
    fn test_append_moves_between_parents() {
        let (ul, a, _) = list();
        let other = Element::new("ol");
        other.append(&a);

        assert_eq!(ul.children().len(), 1);
        assert!(other.contains(&a));
        assert!(!ul.contains(&a));
        assert!(a.parent().unwrap().ptr_eq(&other));
    }

    #[test]
    fn test_insert_after_and_replace() {
        let (ul, a, b) = list();
        let c = Element::new("li").with_attr("id", "c");
        assert!(a.insert_after(&c));
        let ids: Vec<_> = ul.children().iter().filter_map(Element::id).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);

        let d = Element::new("li").with_attr("id", "d");
        assert!(c.replace_with(&d));
        let ids: Vec<_> = ul.children().iter().filter_map(Element::id).collect();
        assert_eq!(ids, vec!["a", "d", "b"]);
        assert!(c.parent().is_none());
        assert!(!Element::new("p").insert_after(&b));
    }

    #[test]
    fn test_set_children_detaches_old() {
        let (ul, a, b) = list();
        let c = Element::new("li");
        ul.set_children([c.clone()]);

        assert!(a.parent().is_none());
        assert!(b.parent().is_none());
        assert_eq!(ul.children(), vec![c]);
    }

    #[test]
    fn test_classes() {
        let el = Element::new("div");
        el.add_class("a b");
        el.add_class("b c");
        assert_eq!(el.attr("class").as_deref(), Some("a b c"));
        el.remove_class("b");
        assert!(!el.has_class("b"));
        assert!(el.toggle_class("b"));
        assert!(!el.toggle_class("a"));
        assert_eq!(el.classes(), vec!["c", "b"]);
    }

    #[test]
    fn test_text_and_value() {
        let p = Element::new("p");
        p.append_text("Hello ");
        let b = Element::new("b");
        b.set_text("world");
        p.append(&b);
        assert_eq!(p.text(), "Hello world");

        p.set_text("bye");
        assert_eq!(p.text(), "bye");
        assert!(b.parent().is_none());

        let input = Element::new("input").with_attr("value", "initial");
        assert_eq!(input.value(), "initial");
        input.set_value("typed");
        assert_eq!(input.value(), "typed");
        assert_eq!(input.attr("value").as_deref(), Some("initial"));

        let option = Element::new("option");
        option.set_text("Seoul");
        assert_eq!(option.value(), "Seoul");
    }

    #[test]
    fn test_find_and_closest() {
        let (ul, a, _) = list();
        let selector = Selector::parse("li#a").unwrap();
        assert_eq!(ul.find(&selector), vec![a.clone()]);
        assert_eq!(
            a.closest(&Selector::parse("ul").unwrap()),
            Some(ul.clone())
        );
        assert_eq!(ul.select("li").unwrap().len(), 2);
        assert!(ul.select("li[").is_err());
    }

    #[test]
    fn test_outer_html() {
        let div = Element::new("div").with_attr("class", "box");
        let input = Element::new("input").with_attr("name", "q");
        div.append(&input);
        div.append_text("a<b");
        assert_eq!(
            div.outer_html(),
            r#"<div class="box"><input name="q">a&lt;b</div>"#
        );
    }
}
