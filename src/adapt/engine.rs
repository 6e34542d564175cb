//! HTML adaptation for the WeChat editor.
//!
//! The editor strips `<style>` blocks, class-based styling, unknown tags,
//! and most attributes when content is pasted in, so everything the reader
//! should see must be carried as inline styles on a safelisted tag set.
//! Stages run in a fixed order over an arena DOM:
//!
//! 1. apply template styles (container global + per-selector)
//! 2. inline resolved styles on every element
//! 3. strip unsafe attributes
//! 4. replace or remove unsupported tags
//! 5. materialize `::before`/`::after` rules as real spans
//! 6. add fallback classes for elements the editor restyles
//! 7. strip unsafe attributes again (stages 4-6 create elements)
//! 8. per-tag fixups (img, a, table, pre)

use log::warn;

use crate::css::{
    PropertyMap, PseudoKind, Stylesheet, apply_css_fallbacks, is_valid_style_value,
    normalize_color,
};
use crate::dom::{Dom, NodeId, matches, parse_fragment, serialize_node};
use crate::template::Template;

use super::resolver::{CascadeResolver, StyleResolver};

/// Tags the WeChat editor keeps when content is pasted in.
pub const WECHAT_SAFE_TAGS: &[&str] = &[
    "p", "div", "span", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li", "strong", "em",
    "b", "i", "u", "table", "thead", "tbody", "tr", "td", "th", "blockquote", "img", "a", "br",
    "hr", "pre", "code",
];

/// Attributes allowed to survive adaptation.
pub const SAFE_ATTRIBUTES: &[&str] = &[
    "style", "class", "id", "src", "href", "alt", "title", "width", "height", "colspan",
    "rowspan",
];

/// Properties worth inlining. Everything else the resolver computes is
/// presentation the editor either keeps anyway or cannot honor.
const CRITICAL_STYLES: &[&str] = &[
    "color",
    "background-color",
    "background",
    "font-size",
    "font-family",
    "font-weight",
    "font-style",
    "line-height",
    "text-align",
    "text-decoration",
    "text-indent",
    "letter-spacing",
    "word-spacing",
    "margin",
    "margin-top",
    "margin-right",
    "margin-bottom",
    "margin-left",
    "padding",
    "padding-top",
    "padding-right",
    "padding-bottom",
    "padding-left",
    "border",
    "border-top",
    "border-right",
    "border-bottom",
    "border-left",
    "border-color",
    "border-width",
    "border-style",
    "border-radius",
    "width",
    "max-width",
    "height",
    "min-height",
    "max-height",
    "display",
    "position",
    "float",
    "clear",
    "overflow",
];

/// Property prefixes that need `!important` to survive the editor's own
/// stylesheet.
const NEEDS_IMPORTANT: &[&str] = &[
    "color",
    "background-color",
    "font-size",
    "font-weight",
    "text-align",
    "line-height",
    "margin",
    "padding",
    "border",
    "width",
    "max-width",
    "display",
];

/// Adapts rendered HTML for pasting into the WeChat editor.
pub struct AdaptEngine<'a> {
    template: &'a Template,
}

impl<'a> AdaptEngine<'a> {
    pub fn new(template: &'a Template) -> Self {
        Self { template }
    }

    /// Run the full adaptation pipeline. Empty input yields empty output.
    /// A failure anywhere in the stages returns the input unchanged rather
    /// than losing the document.
    pub fn adapt(&self, html: &str) -> String {
        if html.trim().is_empty() {
            return String::new();
        }

        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| self.adapt_inner(html))) {
            Ok(out) => out,
            Err(_) => {
                warn!("adaptation failed, returning input unchanged");
                html.to_string()
            }
        }
    }

    fn adapt_inner(&self, html: &str) -> String {
        let (mut dom, body) = parse_fragment(html);

        // Wrap everything in a container div that carries the template's
        // global styles, the way the WeChat editor expects article bodies.
        let container = dom.create_html_element("div");
        let children: Vec<NodeId> = dom.children(body).collect();
        dom.append(body, container);
        for child in children {
            dom.detach(child);
            dom.append(container, child);
        }

        let sheet = self.template.styles.stylesheet();

        self.apply_template(&mut dom, container, &sheet);
        self.inline_all_styles(&mut dom, container, &sheet);
        filter_unsafe_attributes(&mut dom, container);
        filter_unsupported_tags(&mut dom, container);
        self.process_pseudo_elements(&mut dom, container, &sheet);
        simplify_complex_selectors(&mut dom, container);
        filter_unsafe_attributes(&mut dom, container);
        optimize_for_wechat(&mut dom, container);

        serialize_node(&dom, container)
    }

    /// Put the global declaration block on the container and merge each
    /// rule's declarations into the matching elements' inline styles. The
    /// template's declarations go before any author inline style, so the
    /// author's declarations win when the merged block is parsed.
    fn apply_template(&self, dom: &mut Dom, container: NodeId, sheet: &Stylesheet) {
        if !self.template.styles.global.trim().is_empty() {
            dom.set_attr(container, "style", self.template.styles.global.trim());
        }

        for id in dom.descendant_elements(container) {
            let mut decls: Vec<String> = Vec::new();
            for rule in &sheet.rules {
                if rule.pseudo.is_some() {
                    continue;
                }
                if rule.selectors.iter().any(|s| matches(dom, id, s)) {
                    decls.extend(
                        rule.declarations
                            .iter()
                            .map(|d| format!("{}: {}", d.property, d.value)),
                    );
                }
            }
            if decls.is_empty() {
                continue;
            }

            let template_style = decls.join("; ");
            let existing = dom.get_attr(id, "style").map(|s| s.to_string());
            let merged = match existing {
                Some(author) if !author.trim().is_empty() => {
                    format!("{template_style}; {author}")
                }
                _ => template_style,
            };
            dom.set_attr(id, "style", &merged);
        }
    }

    /// Resolve the cascade for every element and write the critical subset
    /// back as the element's `style` attribute.
    fn inline_all_styles(&self, dom: &mut Dom, container: NodeId, sheet: &Stylesheet) {
        let resolver = CascadeResolver::new(sheet.clone());

        for id in dom.descendant_elements(container) {
            let computed = resolver.resolve(dom, id);

            let mut inline = PropertyMap::new();
            for prop in CRITICAL_STYLES {
                if let Some(value) = computed.get(prop) {
                    if !is_valid_style_value(value) {
                        continue;
                    }
                    let value = if prop.contains("color") {
                        normalize_color(value)
                    } else {
                        value.to_string()
                    };
                    inline.set(prop, &value);
                }
            }

            // Existing inline styles win over resolved ones
            if let Some(existing) = dom.get_attr(id, "style") {
                for (prop, value) in PropertyMap::parse(existing).iter() {
                    let value = if prop.contains("color") {
                        normalize_color(value)
                    } else {
                        value.to_string()
                    };
                    inline.set(prop, &value);
                }
            }

            inline.expand_shorthands();
            apply_css_fallbacks(&mut inline);

            if inline.is_empty() {
                dom.remove_attr(id, "style");
            } else {
                let style = inline.to_style_string_with(needs_important);
                dom.set_attr(id, "style", &style);
            }
        }
    }

    /// Materialize `::before`/`::after` rules as literal spans, since the
    /// editor strips the stylesheet that would generate them.
    fn process_pseudo_elements(&self, dom: &mut Dom, container: NodeId, sheet: &Stylesheet) {
        for rule in sheet.pseudo_rules() {
            let kind = match rule.pseudo {
                Some(k) => k,
                None => continue,
            };

            let targets: Vec<NodeId> = dom
                .descendant_elements(container)
                .into_iter()
                .filter(|&id| rule.selectors.iter().any(|s| matches(dom, id, s)))
                .collect();

            for target in targets {
                let mut content = String::new();
                let mut styles = PropertyMap::new();
                for decl in &rule.declarations {
                    if decl.property == "content" {
                        content = pseudo_content_text(&decl.value);
                    } else {
                        styles.set(&decl.property, &decl.value);
                    }
                }
                if content.is_empty() && styles.is_empty() {
                    continue;
                }

                apply_css_fallbacks(&mut styles);

                let span = dom.create_html_element("span");
                let class = match kind {
                    PseudoKind::Before => "pseudo-before",
                    PseudoKind::After => "pseudo-after",
                };
                dom.set_attr(span, "class", class);
                if !styles.is_empty() {
                    // Pseudo styles always carry !important so the editor
                    // cannot restyle the injected span
                    dom.set_attr(span, "style", &styles.to_style_string_with(|_| true));
                }
                if !content.is_empty() {
                    let text = dom.create_text(content.clone());
                    dom.append(span, text);
                }

                match kind {
                    PseudoKind::Before => dom.prepend(target, span),
                    PseudoKind::After => dom.append(target, span),
                }
            }
        }
    }
}

fn needs_important(prop: &str) -> bool {
    NEEDS_IMPORTANT.iter().any(|p| prop.starts_with(p))
}

/// Translate a `content` declaration value into literal text. Counters are
/// approximated with fixed markers.
fn pseudo_content_text(value: &str) -> String {
    let text = value.replace(['"', '\''], "");
    match text.trim() {
        "counter(section)" => "\u{2022}".to_string(),
        "counter(subsection, upper-roman)" => "I.".to_string(),
        // Literal content keeps its spacing (e.g. a marker with a
        // trailing space)
        _ => text,
    }
}

/// Drop attributes outside the safelist. `on*` handlers always go;
/// `data-*` attributes survive only with benign values.
fn filter_unsafe_attributes(dom: &mut Dom, container: NodeId) {
    let mut ids = vec![container];
    ids.extend(dom.descendant_elements(container));

    for id in ids {
        let to_remove: Vec<String> = dom
            .attrs(id)
            .iter()
            .filter_map(|attr| {
                let name = attr.name.local.as_ref().to_lowercase();
                if SAFE_ATTRIBUTES.contains(&name.as_str()) {
                    None
                } else if name.starts_with("on") {
                    Some(name)
                } else if name.starts_with("data-") {
                    if is_data_attribute_safe(&attr.value) {
                        None
                    } else {
                        Some(name)
                    }
                } else {
                    Some(name)
                }
            })
            .collect();

        for name in to_remove {
            dom.remove_attr(id, &name);
        }
    }
}

/// A `data-*` value is unsafe when it smells like executable content.
fn is_data_attribute_safe(value: &str) -> bool {
    let lower = value.to_lowercase();
    let dangerous = lower.contains("javascript:")
        || lower.contains("<script")
        || lower.contains("eval(")
        || lower.contains("function(")
        || on_attr_in_value(&lower);
    !dangerous
}

// Matches on\w+= inside an attribute value (inline handler injection)
fn on_attr_in_value(value: &str) -> bool {
    let mut rest = value;
    while let Some(pos) = rest.find("on") {
        let tail = &rest[pos + 2..];
        let word_len = tail.chars().take_while(|c| c.is_alphanumeric()).count();
        if word_len > 0 && tail[word_len..].starts_with('=') {
            return true;
        }
        rest = &rest[pos + 2..];
    }
    false
}

/// Replacement tag for an unsupported element. `None` removes the element
/// and its content.
fn tag_replacement(tag: &str) -> Option<&'static str> {
    match tag {
        "section" | "article" | "aside" | "nav" | "header" | "footer" | "main" | "figure"
        | "figcaption" => Some("div"),
        "mark" | "small" | "sub" | "sup" | "time" | "abbr" | "cite" | "dfn" | "kbd" | "samp"
        | "var" => Some("span"),
        "script" | "style" | "iframe" | "object" | "embed" | "form" | "input" | "button"
        | "select" | "textarea" => None,
        "dl" => Some("ul"),
        "dt" | "dd" => Some("li"),
        _ => Some("div"),
    }
}

/// Replace unsupported tags in place, or remove them outright.
fn filter_unsupported_tags(dom: &mut Dom, container: NodeId) {
    for id in dom.descendant_elements(container) {
        // A node detached in an earlier iteration may still be in the list
        if !dom.is_attached_to(id, container) {
            continue;
        }
        let Some(tag) = dom.element_name(id).map(|n| n.as_ref().to_string()) else {
            continue;
        };
        if WECHAT_SAFE_TAGS.contains(&tag.as_str()) {
            continue;
        }
        match tag_replacement(&tag) {
            Some(new_tag) => {
                dom.retag(id, new_tag, |attr| SAFE_ATTRIBUTES.contains(&attr));
            }
            None => dom.detach(id),
        }
    }
}

/// Add fallback classes the editor's own stylesheet knows, so elements keep
/// a recognizable shape even if inline styles are dropped.
fn simplify_complex_selectors(dom: &mut Dom, container: NodeId) {
    for id in dom.descendant_elements(container) {
        let Some(tag) = dom.element_name(id).map(|n| n.as_ref().to_string()) else {
            continue;
        };

        // Marker checks look at the classes the element arrived with, not
        // the generic class added just above
        let original_classes: Vec<String> = dom.element_classes(id).to_vec();

        if WECHAT_SAFE_TAGS.contains(&tag.as_str()) && original_classes.is_empty() {
            dom.append_class(id, &format!("wechat-{tag}"));
        }

        match tag.as_str() {
            "blockquote" => {
                if !original_classes.iter().any(|c| c.contains("quote")) {
                    dom.append_class(id, "wechat-quote");
                }
            }
            "pre" => {
                if !original_classes.iter().any(|c| c.contains("code")) {
                    dom.append_class(id, "wechat-code-block");
                }
            }
            "code" => {
                let parent = dom.get(id).map(|n| n.parent).unwrap_or(NodeId::NONE);
                let parent_is_pre = dom
                    .element_name(parent)
                    .is_some_and(|n| n.as_ref() == "pre");
                if !parent_is_pre {
                    dom.append_class(id, "wechat-inline-code");
                }
            }
            _ => {}
        }
    }
}

/// Per-tag fixups known to matter in the WeChat reader.
fn optimize_for_wechat(dom: &mut Dom, container: NodeId) {
    for id in dom.descendant_elements(container) {
        let Some(tag) = dom.element_name(id).map(|n| n.as_ref().to_string()) else {
            continue;
        };
        match tag.as_str() {
            "img" => {
                dom.append_style(
                    id,
                    "max-width: 100% !important; height: auto !important; display: block !important",
                );
                if dom.get_attr(id, "alt").is_none_or(str::is_empty) {
                    dom.set_attr(id, "alt", "image");
                }
            }
            "a" => {
                dom.remove_attr(id, "target");
                dom.append_style(id, "text-decoration: underline !important");
            }
            "table" => {
                dom.append_style(
                    id,
                    "width: 100% !important; border-collapse: collapse !important",
                );
            }
            "td" | "th" => {
                dom.append_style(
                    id,
                    "border: 1px solid #ddd !important; padding: 8px !important",
                );
            }
            "pre" => {
                dom.append_style(
                    id,
                    "white-space: pre-wrap !important; word-wrap: break-word !important",
                );
            }
            _ => {}
        }
    }
}
