//! Computed-style resolution against a stylesheet.
//!
//! WeChat strips `<style>` blocks, so every declaration that should survive
//! must be resolved to a per-element value and inlined. The resolver runs a
//! small cascade: user-agent defaults, then matching stylesheet rules
//! ordered by importance, specificity, and source order, with inherited
//! properties flowing down from ancestors.

use crate::css::{PropertyMap, Stylesheet};
use crate::dom::{Dom, NodeId, matches};

/// Supplies the effective styles for an element. The adaptation engine is
/// generic over this so tests can feed canned styles.
pub trait StyleResolver {
    fn resolve(&self, dom: &Dom, id: NodeId) -> PropertyMap;
}

/// Properties that inherit from ancestor elements.
const INHERITED_PROPS: &[&str] = &[
    "color",
    "font-family",
    "font-size",
    "font-style",
    "font-weight",
    "line-height",
    "letter-spacing",
    "word-spacing",
    "text-align",
    "text-indent",
    "text-transform",
];

/// Cascade resolver over a parsed stylesheet.
pub struct CascadeResolver {
    sheet: Stylesheet,
}

impl CascadeResolver {
    pub fn new(sheet: Stylesheet) -> Self {
        Self { sheet }
    }

    /// Declarations that apply directly to `id`, cascade-ordered.
    fn own_styles(&self, dom: &Dom, id: NodeId) -> PropertyMap {
        let mut map = ua_defaults(dom, id);

        // (important, specificity, source order) ascending, so later
        // inserts win.
        let mut matched: Vec<(bool, _, usize, &crate::css::CssRule)> = Vec::new();
        for (order, rule) in self.sheet.rules.iter().enumerate() {
            if rule.pseudo.is_some() {
                continue;
            }
            if rule.selectors.iter().any(|s| matches(dom, id, s)) {
                let any_important = rule.declarations.iter().any(|d| d.important);
                matched.push((any_important, rule.specificity, order, rule));
            }
        }
        matched.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        for (_, _, _, rule) in matched {
            for decl in &rule.declarations {
                map.set(&decl.property, &decl.value);
            }
        }
        map
    }
}

impl StyleResolver for CascadeResolver {
    fn resolve(&self, dom: &Dom, id: NodeId) -> PropertyMap {
        // Ancestor chain, root first
        let mut chain = Vec::new();
        let mut current = id;
        while current.is_some() {
            if dom.is_element(current) {
                chain.push(current);
            }
            current = dom.get(current).map(|n| n.parent).unwrap_or(NodeId::NONE);
        }
        chain.reverse();

        let mut resolved = PropertyMap::new();
        for (idx, ancestor) in chain.iter().enumerate() {
            let own = self.own_styles(dom, *ancestor);
            if idx + 1 == chain.len() {
                for (prop, value) in own.iter() {
                    resolved.set(prop, value);
                }
            } else {
                // Only inherited properties flow down
                for (prop, value) in own.iter() {
                    if INHERITED_PROPS.contains(&prop) {
                        resolved.set(prop, value);
                    }
                }
            }
        }
        resolved
    }
}

/// Minimal user-agent defaults for tags whose rendering WeChat readers
/// expect even without template rules.
fn ua_defaults(dom: &Dom, id: NodeId) -> PropertyMap {
    let mut map = PropertyMap::new();
    let Some(name) = dom.element_name(id) else {
        return map;
    };
    match name.as_ref() {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "strong" | "b" | "th" => {
            map.set("font-weight", "bold");
        }
        "em" | "i" => {
            map.set("font-style", "italic");
        }
        "a" => {
            map.set("text-decoration", "underline");
        }
        "code" | "pre" | "kbd" | "samp" => {
            map.set("font-family", "monospace");
        }
        _ => {}
    }
    map
}
