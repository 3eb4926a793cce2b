//! Headless document the views render into
//!
//! The element-locator surface views need: selection, attribute and
//! `data-*` reads, text and form value access, class toggling, insertion,
//! removal and containment tests. Hosts render the tree however they like.

mod element;
pub mod markup;
mod selector;

pub use element::Element;
pub use markup::parse_fragment;
pub use selector::Selector;

use crate::error::{MarkupError, SelectorError};

/// Root of a rendered surface
#[derive(Debug, Clone)]
pub struct Document {
    body: Element,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            body: Element::new("body"),
        }
    }

    /// Build a document whose body holds the parsed markup
    pub fn parse(markup: &str) -> Result<Self, MarkupError> {
        let document = Self::new();
        document.body.set_children(parse_fragment(markup)?.children());
        Ok(document)
    }

    pub fn body(&self) -> &Element {
        &self.body
    }

    /// Body and its descendants matching `selector`, in document order
    pub fn find(&self, selector: &Selector) -> Vec<Element> {
        let mut found = Vec::new();
        if self.body.matches(selector) {
            found.push(self.body.clone());
        }
        found.extend(self.body.find(selector));
        found
    }

    pub fn query(&self, selector: &str) -> Result<Vec<Element>, SelectorError> {
        Ok(self.find(&Selector::parse(selector)?))
    }

    pub fn query_first(&self, selector: &str) -> Result<Option<Element>, SelectorError> {
        Ok(self.find(&Selector::parse(selector)?).into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_query() {
        let document = Document::parse(r#"<main id="app"><p class="x">1</p><p>2</p></main>"#).unwrap();
        assert_eq!(document.query("p").unwrap().len(), 2);
        assert_eq!(document.query_first("p.x").unwrap().unwrap().text(), "1");
        assert_eq!(document.query("body").unwrap().len(), 1);
        assert!(document.query_first("#missing").unwrap().is_none());
        assert!(document.query(">").is_err());
    }

    #[test]
    fn test_detached_nodes_are_not_found() {
        let document = Document::parse("<div id=a></div>").unwrap();
        let div = document.query_first("#a").unwrap().unwrap();
        div.remove();
        assert!(document.query("#a").unwrap().is_empty());
        assert!(!document.body().contains(&div));
    }
}
