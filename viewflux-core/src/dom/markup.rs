//! Markup parser for template output
//!
//! Accepts well-formed HTML-like markup: elements, quoted, bare and boolean
//! attributes, text, comments, void elements and self-closing tags.
//! Whitespace-only text between elements is dropped.

use super::Element;
use crate::error::MarkupError;

const VOID: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

pub(crate) fn is_void(tag: &str) -> bool {
    VOID.contains(&tag)
}

/// Parse markup into a detached `#fragment` element holding the top-level nodes
///
/// ```
/// use viewflux_core::dom::parse_fragment;
///
/// let fragment = parse_fragment(r#"<p class="hi">Hello <b>you</b></p><br/>"#).unwrap();
/// let children = fragment.children();
/// assert_eq!(children.len(), 2);
/// assert_eq!(children[0].text(), "Hello you");
/// ```
pub fn parse_fragment(markup: &str) -> Result<Element, MarkupError> {
    let root = Element::new("#fragment");
    let mut stack: Vec<Element> = vec![root.clone()];
    let bytes = markup.as_bytes();
    let mut pos = 0;

    while pos < markup.len() {
        let Some(open) = markup[pos..].find('<').map(|i| pos + i) else {
            push_text(current(&stack), &markup[pos..]);
            break;
        };
        if open > pos {
            push_text(current(&stack), &markup[pos..open]);
        }
        pos = open;

        if markup[pos..].starts_with("<!--") {
            pos = markup[pos..]
                .find("-->")
                .map(|i| pos + i + 3)
                .ok_or(MarkupError::MalformedTag(pos))?;
            continue;
        }
        if markup[pos..].starts_with("<!") {
            pos = markup[pos..]
                .find('>')
                .map(|i| pos + i + 1)
                .ok_or(MarkupError::MalformedTag(pos))?;
            continue;
        }

        if bytes.get(pos + 1) == Some(&b'/') {
            let close = markup[pos..]
                .find('>')
                .map(|i| pos + i)
                .ok_or(MarkupError::MalformedTag(pos))?;
            let name = markup[pos + 2..close].trim().to_ascii_lowercase();
            close_element(&mut stack, &name, pos)?;
            pos = close + 1;
            continue;
        }

        let (el, self_closing, end) = parse_open_tag(markup, pos)?;
        current(&stack).append(&el);
        pos = end;

        let tag = el.tag();
        if tag == "textarea" {
            let close = find_ci(markup, pos, "</textarea")
                .ok_or_else(|| MarkupError::Unclosed(tag.clone()))?;
            let content = decode_entities(&markup[pos..close]);
            if !content.is_empty() {
                el.append_text(&content);
            }
            el.set_value(&content);
            pos = markup[close..]
                .find('>')
                .map(|i| close + i + 1)
                .ok_or(MarkupError::MalformedTag(close))?;
        } else if !self_closing && !is_void(&tag) {
            stack.push(el);
        } else {
            init_form_state(&el);
        }
    }

    if stack.len() > 1 {
        return Err(MarkupError::Unclosed(current(&stack).tag()));
    }
    Ok(root)
}

fn current(stack: &[Element]) -> &Element {
    // The fragment root is never popped
    &stack[stack.len() - 1]
}

fn push_text(parent: &Element, raw: &str) {
    if raw.trim().is_empty() {
        return;
    }
    parent.append_text(&decode_entities(raw));
}

fn close_element(stack: &mut Vec<Element>, name: &str, position: usize) -> Result<(), MarkupError> {
    if stack.len() == 1 {
        return Err(MarkupError::UnexpectedClose {
            found: name.to_string(),
            position,
        });
    }
    let open = current(stack).tag();
    if open != name {
        return Err(MarkupError::MismatchedClose {
            expected: open,
            found: name.to_string(),
            position,
        });
    }
    if let Some(el) = stack.pop() {
        init_form_state(&el);
    }
    Ok(())
}

/// Derive live value and checked state from attributes
fn init_form_state(el: &Element) {
    match el.tag().as_str() {
        "input" => {
            if let Some(value) = el.attr("value") {
                el.set_value(&value);
            }
            el.set_checked(el.has_attr("checked"));
        }
        "select" => {
            let options = el.select("option").unwrap_or_default();
            let selected = options
                .iter()
                .find(|o| o.has_attr("selected"))
                .or_else(|| options.first());
            if let Some(option) = selected {
                el.set_value(&option.value());
            }
        }
        _ => {}
    }
}

fn find_ci(haystack: &str, from: usize, needle: &str) -> Option<usize> {
    haystack[from..]
        .to_ascii_lowercase()
        .find(needle)
        .map(|i| from + i)
}

fn parse_open_tag(markup: &str, start: usize) -> Result<(Element, bool, usize), MarkupError> {
    // Every delimiter is ASCII, so byte offsets always land on char boundaries.
    let bytes = markup.as_bytes();
    let malformed = || MarkupError::MalformedTag(start);
    let skip_space = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        i
    };
    let mut i = start + 1;

    let name_start = i;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'-') {
        i += 1;
    }
    if i == name_start {
        return Err(malformed());
    }
    let el = Element::new(&markup[name_start..i]);

    loop {
        i = skip_space(i);
        match bytes.get(i) {
            None => return Err(malformed()),
            Some(b'>') => return Ok((el, false, i + 1)),
            Some(b'/') => {
                if bytes.get(i + 1) == Some(&b'>') {
                    return Ok((el, true, i + 2));
                }
                return Err(malformed());
            }
            Some(_) => {}
        }

        let attr_start = i;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && !matches!(bytes[i], b'=' | b'>' | b'/')
        {
            i += 1;
        }
        if i == attr_start {
            return Err(malformed());
        }
        let attr = &markup[attr_start..i];

        i = skip_space(i);
        if bytes.get(i) != Some(&b'=') {
            el.set_attr(attr, "");
            continue;
        }
        i = skip_space(i + 1);

        let value = match bytes.get(i) {
            Some(&quote @ (b'"' | b'\'')) => {
                let value_start = i + 1;
                let end = markup[value_start..]
                    .find(quote as char)
                    .map(|offset| value_start + offset)
                    .ok_or_else(malformed)?;
                i = end + 1;
                &markup[value_start..end]
            }
            Some(_) => {
                let value_start = i;
                while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                    i += 1;
                }
                &markup[value_start..i]
            }
            None => return Err(malformed()),
        };
        el.set_attr(attr, &decode_entities(value));
    }
}

/// Decode the handful of entities templates produce
pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').and_then(|semi| {
            let entity = &rest[1..semi];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, semi))
        });
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

pub(crate) fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub(crate) fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}
