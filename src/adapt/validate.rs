//! Post-adaptation compatibility checks.

use serde::Serialize;

use crate::dom::parse_fragment;

/// Tags that must never appear in adapted output.
const FORBIDDEN_TAGS: &[&str] = &["script", "style", "iframe", "form", "input", "button"];

/// Result of checking adapted HTML for WeChat compatibility.
///
/// `issues` are violations that make the content unsafe to paste;
/// `warnings` flag things the editor will accept but may mangle.
#[derive(Debug, Clone, Serialize)]
pub struct Validation {
    pub is_valid: bool,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
}

/// Inspect adapted HTML and report compatibility problems.
pub fn validate_for_wechat(html: &str) -> Validation {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    let (dom, body) = parse_fragment(html);

    let mut external_images = 0usize;
    for id in dom.descendant_elements(body) {
        let Some(tag) = dom.element_name(id).map(|n| n.as_ref().to_string()) else {
            continue;
        };
        if FORBIDDEN_TAGS.contains(&tag.as_str()) {
            issues.push(format!("unsupported tag <{tag}> present in output"));
        }
        if tag == "img"
            && dom
                .get_attr(id, "src")
                .is_some_and(|src| src.starts_with("http"))
        {
            external_images += 1;
        }
    }

    if external_images > 0 {
        warnings.push(format!(
            "{external_images} external image(s); WeChat requires uploading images to its media library"
        ));
    }

    Validation {
        is_valid: issues.is_empty(),
        issues,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_html_valid() {
        let v = validate_for_wechat(r#"<div><p style="color: #333">hi</p></div>"#);
        assert!(v.is_valid);
        assert!(v.issues.is_empty());
        assert!(v.warnings.is_empty());
    }

    #[test]
    fn test_forbidden_tag_invalidates() {
        let v = validate_for_wechat("<div><iframe src=\"x\"></iframe></div>");
        assert!(!v.is_valid);
        assert_eq!(v.issues.len(), 1);
        assert!(v.issues[0].contains("iframe"));
    }

    #[test]
    fn test_external_images_warn_only() {
        let v = validate_for_wechat(r#"<img src="https://cdn.example.com/a.png" alt="a">"#);
        assert!(v.is_valid);
        assert_eq!(v.warnings.len(), 1);
        assert!(v.warnings[0].contains("1 external image"));
    }

    #[test]
    fn test_local_image_no_warning() {
        let v = validate_for_wechat(r#"<img src="data:image/png;base64,AAAA" alt="a">"#);
        assert!(v.warnings.is_empty());
    }
}
