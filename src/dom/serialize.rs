//! Arena DOM to HTML string serialization.

use super::arena::{Dom, NodeData, NodeId};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements whose text content is emitted raw (no entity escaping).
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Serialize a node and its subtree to an HTML string.
pub fn serialize_node(dom: &Dom, id: NodeId) -> String {
    let mut out = String::new();
    write_node(dom, id, &mut out, false);
    out
}

/// Serialize only the children of a node, in order. Used to emit fragment
/// output without the synthetic wrapper element.
pub fn serialize_children(dom: &Dom, id: NodeId) -> String {
    let mut out = String::new();
    let raw = is_raw_text(dom, id);
    for child in dom.children(id) {
        write_node(dom, child, &mut out, raw);
    }
    out
}

fn is_raw_text(dom: &Dom, id: NodeId) -> bool {
    dom.element_name(id)
        .is_some_and(|n| RAW_TEXT_ELEMENTS.contains(&n.as_ref()))
}

fn write_node(dom: &Dom, id: NodeId, out: &mut String, raw_text: bool) {
    let node = match dom.get(id) {
        Some(n) => n,
        None => return,
    };

    match &node.data {
        NodeData::Document => {
            for child in dom.children(id) {
                write_node(dom, child, out, false);
            }
        }
        NodeData::Doctype { name } => {
            out.push_str("<!DOCTYPE ");
            out.push_str(name);
            out.push('>');
        }
        NodeData::Comment(_) => {}
        NodeData::Text(text) => {
            if raw_text {
                out.push_str(text);
            } else {
                out.push_str(&escape_text(text));
            }
        }
        NodeData::Element { name, attrs, .. } => {
            let tag = name.local.as_ref();
            out.push('<');
            out.push_str(tag);
            for attr in attrs {
                out.push(' ');
                out.push_str(attr.name.local.as_ref());
                out.push_str("=\"");
                out.push_str(&escape_attr(&attr.value));
                out.push('"');
            }
            out.push('>');

            if VOID_ELEMENTS.contains(&tag) {
                return;
            }

            let raw = RAW_TEXT_ELEMENTS.contains(&tag);
            for child in dom.children(id) {
                write_node(dom, child, out, raw);
            }

            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_fragment;

    #[test]
    fn test_roundtrip_simple() {
        let (dom, body) = parse_fragment(r#"<p class="a">Hi &amp; bye</p>"#);
        let html = serialize_children(&dom, body);
        assert_eq!(html, r#"<p class="a">Hi &amp; bye</p>"#);
    }

    #[test]
    fn test_void_elements() {
        let (dom, body) = parse_fragment(r#"<p>a<br>b</p><img src="x.png">"#);
        let html = serialize_children(&dom, body);
        assert!(html.contains("<br>"));
        assert!(!html.contains("</br>"));
        assert!(html.contains(r#"<img src="x.png">"#));
        assert!(!html.contains("</img>"));
    }

    #[test]
    fn test_attr_escaping() {
        let (dom, body) = parse_fragment(r#"<a href="x?a=1&amp;b=2" title="say &quot;hi&quot;">link</a>"#);
        let html = serialize_children(&dom, body);
        assert!(html.contains("a=1&amp;b=2"));
        assert!(html.contains("&quot;hi&quot;"));
    }

    #[test]
    fn test_comments_dropped() {
        let (dom, body) = parse_fragment("<p>a</p><!-- hidden --><p>b</p>");
        let html = serialize_children(&dom, body);
        assert!(!html.contains("hidden"));
        assert_eq!(html, "<p>a</p><p>b</p>");
    }
}
