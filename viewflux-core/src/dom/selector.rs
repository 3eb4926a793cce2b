//! A small CSS selector subset
//!
//! Supported: comma-separated groups, the descendant combinator, and
//! compounds of `tag`, `*`, `#id`, `.class`, `[attr]` and `[attr=value]`
//! (value bare, single- or double-quoted).

use std::fmt;
use std::str::FromStr;

use super::Element;
use crate::error::SelectorError;

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrTest {
    name: String,
    value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
}

impl Compound {
    fn matches(&self, el: &Element) -> bool {
        if let Some(tag) = &self.tag {
            if !el.is(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if el.id().as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.iter().all(|c| el.has_class(c)) {
            return false;
        }
        self.attrs.iter().all(|test| match (&test.value, el.attr(&test.name)) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(expected), Some(actual)) => *expected == actual,
        })
    }
}

/// Compounds joined by descendant combinators; the last one is the subject
#[derive(Debug, Clone, PartialEq, Eq)]
struct Chain(Vec<Compound>);

impl Chain {
    fn matches(&self, el: &Element) -> bool {
        let Some((subject, rest)) = self.0.split_last() else {
            return false;
        };
        if !subject.matches(el) {
            return false;
        }

        let mut ancestors = el.ancestors().into_iter();
        rest.iter()
            .rev()
            .all(|compound| ancestors.by_ref().any(|a| compound.matches(&a)))
    }
}

/// A parsed selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    groups: Vec<Chain>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        Parser::new(source).parse()
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, el: &Element) -> bool {
        self.groups.iter().any(|chain| chain.matches(el))
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn unexpected(&self, found: char) -> SelectorError {
        SelectorError::Unexpected {
            selector: self.source.to_string(),
            found,
            position: self.pos,
        }
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn ident(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_ident) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn parse(mut self) -> Result<Selector, SelectorError> {
        let mut groups = Vec::new();
        let mut chain = Vec::new();

        self.skip_whitespace();
        loop {
            match self.peek() {
                None => break,
                Some(',') => {
                    if chain.is_empty() {
                        return Err(self.unexpected(','));
                    }
                    groups.push(Chain(std::mem::take(&mut chain)));
                    self.pos += 1;
                    self.skip_whitespace();
                }
                Some(_) => {
                    chain.push(self.compound()?);
                    self.skip_whitespace();
                }
            }
        }

        if chain.is_empty() {
            return Err(if groups.is_empty() {
                SelectorError::Empty
            } else {
                self.unexpected(',')
            });
        }
        groups.push(Chain(chain));

        Ok(Selector {
            source: self.source.trim().to_string(),
            groups,
        })
    }

    fn compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        let start = self.pos;

        match self.peek() {
            Some('*') => self.pos += 1,
            Some(c) if is_ident(c) => compound.tag = Some(self.ident().to_ascii_lowercase()),
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.id = Some(self.required_ident()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.required_ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attrs.push(self.attribute()?);
                }
                Some(c) if c.is_whitespace() || c == ',' => break,
                None => break,
                Some(c) => return Err(self.unexpected(c)),
            }
        }

        if self.pos == start {
            if let Some(c) = self.peek() {
                return Err(self.unexpected(c));
            }
        }
        Ok(compound)
    }

    fn required_ident(&mut self) -> Result<String, SelectorError> {
        let ident = self.ident();
        if ident.is_empty() {
            return Err(match self.peek() {
                Some(c) => self.unexpected(c),
                None => SelectorError::Empty,
            });
        }
        Ok(ident)
    }

    fn attribute(&mut self) -> Result<AttrTest, SelectorError> {
        let source = self.source;
        let unterminated = move || SelectorError::UnterminatedAttribute(source.to_string());

        self.skip_whitespace();
        let name = self.ident().to_ascii_lowercase();
        if name.is_empty() {
            return Err(self.peek().map_or_else(unterminated, |c| self.unexpected(c)));
        }
        self.skip_whitespace();

        let value = match self.peek() {
            Some(']') => None,
            Some('=') => {
                self.pos += 1;
                self.skip_whitespace();
                Some(self.attr_value().ok_or_else(unterminated)?)
            }
            Some(c) => return Err(self.unexpected(c)),
            None => return Err(unterminated()),
        };

        self.skip_whitespace();
        match self.peek() {
            Some(']') => {
                self.pos += 1;
                Ok(AttrTest { name, value })
            }
            Some(c) => Err(self.unexpected(c)),
            None => Err(unterminated()),
        }
    }

    fn attr_value(&mut self) -> Option<String> {
        match self.peek()? {
            quote @ ('"' | '\'') => {
                self.pos += 1;
                let start = self.pos;
                while self.peek()? != quote {
                    self.pos += 1;
                }
                let value = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                Some(value)
            }
            _ => {
                let start = self.pos;
                while self.peek().is_some_and(|c| c != ']' && !c.is_whitespace()) {
                    self.pos += 1;
                }
                Some(self.chars[start..self.pos].iter().collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> (Element, Element, Element) {
        // <form class="user"><div data-ref="row"><input name="email" type="text"></div></form>
        let form = Element::new("form").with_attr("class", "user main");
        let row = Element::new("div").with_attr("data-ref", "row");
        let input = Element::new("input")
            .with_attr("name", "email")
            .with_attr("type", "text")
            .with_attr("id", "email");
        form.append(&row);
        row.append(&input);
        (form, row, input)
    }

    #[test]
    fn test_compounds() {
        let (form, row, input) = tree();
        assert!(Selector::parse("form.user.main").unwrap().matches(&form));
        assert!(!Selector::parse("form.admin").unwrap().matches(&form));
        assert!(Selector::parse("#email").unwrap().matches(&input));
        assert!(Selector::parse("*[data-ref]").unwrap().matches(&row));
        assert!(Selector::parse("div[data-ref=row]").unwrap().matches(&row));
        assert!(Selector::parse(r#"input[name="email"][type='text']"#)
            .unwrap()
            .matches(&input));
        assert!(!Selector::parse("input[name=phone]").unwrap().matches(&input));
    }

    #[test]
    fn test_descendant_and_groups() {
        let (form, _, input) = tree();
        assert!(Selector::parse("form input").unwrap().matches(&input));
        assert!(Selector::parse(".user  [data-ref=row] #email").unwrap().matches(&input));
        assert!(!Selector::parse("div form input").unwrap().matches(&input));
        assert!(!Selector::parse("input form").unwrap().matches(&form));

        let group = Selector::parse("select, textarea, input").unwrap();
        assert!(group.matches(&input));
        assert_eq!(form.find(&group).len(), 1);
    }

    #[test]
    fn test_case_insensitive_tags() {
        let (form, _, _) = tree();
        assert!(Selector::parse("FORM").unwrap().matches(&form));
    }

    #[test]
    fn test_errors() {
        assert_eq!(Selector::parse("   "), Err(SelectorError::Empty));
        assert!(matches!(
            Selector::parse("div > p"),
            Err(SelectorError::Unexpected { found: '>', .. })
        ));
        assert!(matches!(
            Selector::parse("a,,b"),
            Err(SelectorError::Unexpected { found: ',', .. })
        ));
        assert!(matches!(
            Selector::parse("a,"),
            Err(SelectorError::Unexpected { found: ',', .. })
        ));
        assert!(matches!(
            Selector::parse("input[name"),
            Err(SelectorError::UnterminatedAttribute(_))
        ));
        assert!(matches!(
            Selector::parse("input[name='x]"),
            Err(SelectorError::UnterminatedAttribute(_))
        ));
        assert!(Selector::parse("div.").is_err());
    }

    #[test]
    fn test_display_keeps_source() {
        let selector: Selector = " div[data-ref=list] ".parse().unwrap();
        assert_eq!(selector.to_string(), "div[data-ref=list]");
    }
}
