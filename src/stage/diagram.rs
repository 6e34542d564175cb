//! Mermaid diagram extraction and rendering.
//!
//! ```` ```mermaid ```` fences are lifted out before the Markdown pass and
//! substituted back with sanitized SVG (renderer present), a source-code
//! fallback card (no renderer), or an error card (renderer failed).

use regex::Regex;
use std::sync::OnceLock;

use crate::dom::serialize::escape_text;
use crate::protect::{Kind, Protected, Vault};

/// Renders Mermaid source to SVG. `id` is a unique element id for the
/// diagram within the current run.
pub trait DiagramRenderer {
    fn render(&self, id: &str, code: &str) -> Result<String, String>;
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```mermaid\n([\s\S]*?)\n```").unwrap())
}

/// Replace mermaid fences with placeholder tokens.
pub fn extract(content: &str, vault: &mut Vault) -> String {
    fence_re()
        .replace_all(content, |caps: &regex::Captures| {
            vault.protect(Kind::Diagram, &caps[1])
        })
        .into_owned()
}

/// Identify the diagram type from the first line of its source.
pub fn detect_type(code: &str) -> Option<&'static str> {
    static TYPES: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    let types = TYPES.get_or_init(|| {
        vec![
            ("flowchart", Regex::new(r"(?i)^(graph|flowchart)\s+(TD|TB|BT|RL|LR)").unwrap()),
            ("sequence", Regex::new(r"(?i)^sequenceDiagram").unwrap()),
            ("gantt", Regex::new(r"(?i)^gantt").unwrap()),
            ("pie", Regex::new(r"(?i)^pie(\s+title\s+.+)?").unwrap()),
            ("gitgraph", Regex::new(r"(?i)^gitGraph").unwrap()),
            ("erDiagram", Regex::new(r"(?i)^erDiagram").unwrap()),
            ("journey", Regex::new(r"(?i)^journey").unwrap()),
            ("requirement", Regex::new(r"(?i)^requirementDiagram").unwrap()),
            ("stateDiagram", Regex::new(r"(?i)^stateDiagram(-v2)?").unwrap()),
            ("classDiagram", Regex::new(r"(?i)^classDiagram").unwrap()),
        ]
    });

    let first_line = code.lines().next().unwrap_or("").trim();
    types
        .iter()
        .find(|(_, re)| re.is_match(first_line))
        .map(|(name, _)| *name)
}

/// Strip `<script>` elements, `on*` event attributes, and `javascript:`
/// hrefs from renderer-produced SVG.
pub fn sanitize_svg(svg: &str) -> String {
    static SCRIPT_RE: OnceLock<Regex> = OnceLock::new();
    static ON_ATTR_DQ_RE: OnceLock<Regex> = OnceLock::new();
    static ON_ATTR_SQ_RE: OnceLock<Regex> = OnceLock::new();
    static JS_HREF_RE: OnceLock<Regex> = OnceLock::new();

    let script = SCRIPT_RE
        .get_or_init(|| Regex::new(r"(?is)<script[\s\S]*?</script>").unwrap());
    let on_dq = ON_ATTR_DQ_RE
        .get_or_init(|| Regex::new(r#"(?i)\s*on\w+\s*=\s*"[^"]*""#).unwrap());
    let on_sq = ON_ATTR_SQ_RE
        .get_or_init(|| Regex::new(r"(?i)\s*on\w+\s*=\s*'[^']*'").unwrap());
    let js_href = JS_HREF_RE
        .get_or_init(|| Regex::new(r#"(?i)href\s*=\s*["']javascript:[^"']*["']"#).unwrap());

    let cleaned = script.replace_all(svg, "");
    let cleaned = on_dq.replace_all(&cleaned, "");
    let cleaned = on_sq.replace_all(&cleaned, "");
    js_href.replace_all(&cleaned, "").into_owned()
}

/// Render a protected diagram back to HTML. `id` must be unique per run.
pub fn render_protected(
    entry: &Protected,
    id: &str,
    renderer: Option<&dyn DiagramRenderer>,
) -> String {
    let code = &entry.source;
    let Some(renderer) = renderer else {
        return fallback_card(code);
    };

    match renderer.render(id, code) {
        Ok(svg) => wrap_diagram(&svg, code),
        Err(message) => error_card(code, &message),
    }
}

fn wrap_diagram(svg: &str, code: &str) -> String {
    let diagram_type = detect_type(code).unwrap_or("unknown");
    let clean = sanitize_svg(svg);
    format!(
        r#"<div class="mermaid-diagram" data-type="{diagram_type}" style="text-align: center; margin: 1.5em 0; overflow-x: auto; background-color: #fff; border: 1px solid #e1e8ed; border-radius: 6px; padding: 1em;">{clean}</div>"#
    )
}

fn error_card(code: &str, message: &str) -> String {
    format!(
        concat!(
            r#"<div class="mermaid-error" style="background-color: #fff5f5; border: 1px solid #feb2b2; border-radius: 4px; padding: 1em; margin: 1.5em 0; color: #c53030;">"#,
            r#"<div style="font-weight: bold; margin-bottom: 0.5em;">Diagram rendering failed</div>"#,
            r#"<div style="margin-bottom: 0.5em; font-size: 0.9em;">{}</div>"#,
            r#"<pre style="background-color: #f7fafc; padding: 0.5em; border-radius: 3px; margin-top: 0.5em; font-size: 0.8em; overflow-x: auto;"><code>{}</code></pre>"#,
            r#"</div>"#
        ),
        escape_text(message),
        escape_text(code)
    )
}

fn fallback_card(code: &str) -> String {
    format!(
        concat!(
            r#"<div class="mermaid-fallback" style="background-color: #f8f9fa; border: 1px solid #dee2e6; border-radius: 4px; padding: 1em; margin: 1.5em 0;">"#,
            r#"<div style="font-weight: bold; margin-bottom: 0.5em; color: #495057;">Mermaid diagram</div>"#,
            r#"<pre style="background-color: #ffffff; padding: 0.8em; border: 1px solid #e9ecef; border-radius: 3px; overflow-x: auto; font-family: 'Monaco', 'Consolas', monospace; font-size: 0.85em;"><code>{}</code></pre>"#,
            r#"</div>"#
        ),
        escape_text(code)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeRenderer;
    impl DiagramRenderer for FakeRenderer {
        fn render(&self, id: &str, _code: &str) -> Result<String, String> {
            Ok(format!(r#"<svg id="{id}"><g/></svg>"#))
        }
    }

    struct FailingRenderer;
    impl DiagramRenderer for FailingRenderer {
        fn render(&self, _id: &str, _code: &str) -> Result<String, String> {
            Err("syntax error at line 2".to_string())
        }
    }

    #[test]
    fn test_extract_fence() {
        let mut vault = Vault::new();
        let src = "a\n```mermaid\ngraph TD\nA-->B\n```\nb";
        let out = extract(src, &mut vault);
        assert_eq!(out, "a\nDIAGRAM_0\nb");
        assert_eq!(vault.entries()[0].source, "graph TD\nA-->B");
    }

    #[test]
    fn test_plain_code_fence_untouched() {
        let mut vault = Vault::new();
        let src = "```rust\nfn main() {}\n```";
        assert_eq!(extract(src, &mut vault), src);
        assert!(vault.is_empty());
    }

    #[test]
    fn test_detect_types() {
        assert_eq!(detect_type("graph TD\nA-->B"), Some("flowchart"));
        assert_eq!(detect_type("flowchart LR\nA-->B"), Some("flowchart"));
        assert_eq!(detect_type("sequenceDiagram\nA->>B: hi"), Some("sequence"));
        assert_eq!(detect_type("pie title Pets\n\"Dogs\": 3"), Some("pie"));
        assert_eq!(detect_type("stateDiagram-v2\n[*] --> S1"), Some("stateDiagram"));
        assert_eq!(detect_type("something else"), None);
    }

    #[test]
    fn test_sanitize_svg() {
        let dirty = r#"<svg onclick="evil()"><script>alert(1)</script><a href="javascript:x()">l</a></svg>"#;
        let clean = sanitize_svg(dirty);
        assert!(!clean.contains("script"));
        assert!(!clean.contains("onclick"));
        assert!(!clean.contains("javascript:"));
        assert!(clean.contains("<svg"));
    }

    #[test]
    fn test_render_wraps_and_sanitizes() {
        let entry = Protected {
            token: "DIAGRAM_0".into(),
            kind: Kind::Diagram,
            source: "graph TD\nA-->B".into(),
        };
        let html = render_protected(&entry, "mermaid-diagram-0", Some(&FakeRenderer));
        assert!(html.contains(r#"class="mermaid-diagram""#));
        assert!(html.contains(r#"data-type="flowchart""#));
        assert!(html.contains(r#"<svg id="mermaid-diagram-0">"#));
    }

    #[test]
    fn test_render_failure_error_card() {
        let entry = Protected {
            token: "DIAGRAM_0".into(),
            kind: Kind::Diagram,
            source: "graph TD\nbroken <tag>".into(),
        };
        let html = render_protected(&entry, "d0", Some(&FailingRenderer));
        assert!(html.contains("mermaid-error"));
        assert!(html.contains("syntax error at line 2"));
        assert!(html.contains("broken &lt;tag&gt;"));
    }

    #[test]
    fn test_no_renderer_fallback_card() {
        let entry = Protected {
            token: "DIAGRAM_0".into(),
            kind: Kind::Diagram,
            source: "gantt\ntitle T".into(),
        };
        let html = render_protected(&entry, "d0", None);
        assert!(html.contains("mermaid-fallback"));
        assert!(html.contains("gantt"));
    }
}
