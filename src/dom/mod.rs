//! Arena DOM, HTML parsing, selector matching, and serialization.

pub mod arena;
pub mod element_ref;
pub mod serialize;
pub mod tree_sink;

pub use arena::{Attribute, Dom, Node, NodeData, NodeId};
pub use element_ref::{ElementRef, WeimarkSelectors, matches};
pub use serialize::{serialize_children, serialize_node};
pub use tree_sink::DomSink;

use html5ever::driver::ParseOpts;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;

/// Parse an HTML document into an arena DOM.
pub fn parse_html(html: &str) -> Dom {
    let sink = DomSink::new();
    let result = parse_document(sink, ParseOpts::default())
        .from_utf8()
        .one(html.as_bytes());
    result.into_dom()
}

/// Parse an HTML fragment. Returns the DOM together with the `body` node
/// whose children are the fragment's top-level nodes.
///
/// html5ever always builds a full document around the input, so the body
/// element is the stable container for fragment content.
pub fn parse_fragment(html: &str) -> (Dom, NodeId) {
    let dom = parse_html(html);
    let body = dom.find_by_tag("body").unwrap_or(dom.document());
    (dom, body)
}
