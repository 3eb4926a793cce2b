//! Named element cache of a mounted view
//!
//! - `data-ref="name"` caches a single element
//! - `data-ref-group="name"` collects every element sharing the name
//! - `data-ref-form-restore` on a `data-ref` element carries the live value
//!   and checked state of the element it replaces across a remount

use std::collections::BTreeMap;

use tracing::trace;

use crate::dom::{Element, Selector};

/// A cached ref
#[derive(Debug, Clone, PartialEq)]
pub enum Ref {
    Single(Element),
    Group(Vec<Element>),
}

impl Ref {
    /// The element, or the first of a group
    pub fn first(&self) -> Option<&Element> {
        match self {
            Ref::Single(el) => Some(el),
            Ref::Group(els) => els.first(),
        }
    }

    pub fn elements(&self) -> Vec<Element> {
        match self {
            Ref::Single(el) => vec![el.clone()],
            Ref::Group(els) => els.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Refs {
    refs: BTreeMap<String, Ref>,
}

impl Refs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from scratch by scanning `root` and its descendants
    ///
    /// `previous` is the cache from the last mount; it is only read to restore
    /// form state into `data-ref-form-restore` elements.
    pub fn rebuild(root: &Element, previous: &Refs) -> Self {
        let mut refs = BTreeMap::new();

        for el in scan(root, "[data-ref]") {
            let Some(name) = el.data("ref").filter(|n| !n.is_empty()) else {
                continue;
            };
            if el.has_attr("data-ref-form-restore") {
                if let Some(old) = previous.element(&name) {
                    if !old.ptr_eq(&el) {
                        el.set_value(&old.value());
                        el.set_checked(old.checked());
                    }
                }
            }
            refs.insert(name, Ref::Single(el));
        }

        for el in scan(root, "[data-ref-group]") {
            let Some(name) = el.data("ref-group").filter(|n| !n.is_empty()) else {
                continue;
            };
            match refs.entry(name).or_insert_with(|| Ref::Group(Vec::new())) {
                Ref::Group(els) => els.push(el),
                // A data-ref of the same name wins
                Ref::Single(_) => {}
            }
        }

        trace!(refs = refs.len(), "Refs rebuilt");
        Self { refs }
    }

    pub fn get(&self, name: &str) -> Option<&Ref> {
        self.refs.get(name)
    }

    pub fn element(&self, name: &str) -> Option<&Element> {
        self.refs.get(name).and_then(Ref::first)
    }

    pub fn group(&self, name: &str) -> Vec<Element> {
        self.refs.get(name).map(Ref::elements).unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.refs.clear();
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.refs.keys().map(String::as_str)
    }
}

fn scan(root: &Element, selector: &str) -> Vec<Element> {
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };
    let mut found = Vec::new();
    if root.matches(&selector) {
        found.push(root.clone());
    }
    found.extend(root.find(&selector));
    found
}
