//! Math region extraction and rendering.
//!
//! LaTeX regions are lifted out of the Markdown source before rendering
//! (`$$...$$` blocks first, then `$...$` inline spans, then
//! `\begin{env}...\end{env}` environments) and substituted back afterwards.
//! Rendering goes through an optional [`MathRenderer`]; with no renderer
//! the formula degrades to a styled plain-text fragment, and a renderer
//! failure produces a visible error fragment echoing the raw source.

use regex::Regex;
use std::sync::OnceLock;

use crate::dom::serialize::escape_text;
use crate::protect::{Kind, Protected, Vault};

/// Renders a LaTeX formula to HTML. `display_mode` selects block layout.
pub trait MathRenderer {
    fn render(&self, latex: &str, display_mode: bool) -> Result<String, String>;
}

fn block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\$\$\n?(.+?)\n?\$\$").unwrap())
}

fn inline_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$([^$\n]+?)\$").unwrap())
}

/// Replace math regions with placeholder tokens, registering each region
/// in the vault. Block formulas are taken first so the inline pass never
/// sees a `$$` delimiter.
pub fn extract(content: &str, vault: &mut Vault) -> String {
    let content = block_re().replace_all(content, |caps: &regex::Captures| {
        vault.protect(Kind::MathBlock, &caps[1])
    });

    let content = inline_re().replace_all(&content, |caps: &regex::Captures| {
        vault.protect(Kind::MathInline, &caps[1])
    });

    extract_environments(&content, vault)
}

/// Scan for `\begin{env}...\end{env}` pairs. The regex crate has no
/// backreferences, so the matching `\end` is located manually.
fn extract_environments(content: &str, vault: &mut Vault) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("\\begin{") {
        let after_begin = &rest[start + "\\begin{".len()..];
        let Some(name_end) = after_begin.find('}') else {
            break;
        };
        let env = &after_begin[..name_end];
        let end_marker = format!("\\end{{{env}}}");

        let body_start = start + "\\begin{".len() + name_end + 1;
        let Some(end_rel) = rest[body_start..].find(&end_marker) else {
            // Unterminated environment, leave the rest untouched
            break;
        };
        let end = body_start + end_rel + end_marker.len();

        out.push_str(&rest[..start]);
        let token = vault.protect(Kind::MathEnv, &rest[start..end]);
        out.push_str(&token);
        rest = &rest[end..];
    }

    out.push_str(rest);
    out
}

/// Render a protected math region back to HTML.
pub fn render_protected(entry: &Protected, renderer: Option<&dyn MathRenderer>) -> String {
    let source = entry.source.trim();
    let display = !matches!(entry.kind, Kind::MathInline);

    let Some(renderer) = renderer else {
        return plain_fallback(entry.kind, source);
    };

    match renderer.render(source, display) {
        Ok(rendered) => match entry.kind {
            Kind::MathBlock => format!(
                r#"<div class="math-block" style="text-align: center; margin: 1em 0; overflow-x: auto;">{rendered}</div>"#
            ),
            Kind::MathInline => format!(
                r#"<span class="math-inline" style="display: inline-block; vertical-align: middle;">{rendered}</span>"#
            ),
            Kind::MathEnv => format!(
                r#"<div class="math-environment" style="text-align: center; margin: 1.5em 0; overflow-x: auto;">{rendered}</div>"#
            ),
            Kind::Diagram => rendered,
        },
        Err(_) => error_fragment(source),
    }
}

/// Visible error fragment quoting the raw formula.
pub fn error_fragment(source: &str) -> String {
    format!(
        r#"<span class="math-error" style="color: #cc0000; background: #fff2f2; padding: 0.1em 0.3em; border-radius: 2px;"><strong>Math error:</strong> {}</span>"#,
        escape_text(source)
    )
}

/// Styled plain-text rendering used when no renderer is configured.
fn plain_fallback(kind: Kind, source: &str) -> String {
    let escaped = escape_text(source);
    match kind {
        Kind::MathInline => format!(
            r#"<span style="font-family: serif; font-style: italic;">{escaped}</span>"#
        ),
        _ => format!(
            r#"<div style="text-align: center; margin: 1em 0; font-family: serif; font-size: 1.1em;">{escaped}</div>"#
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeRenderer;
    impl MathRenderer for FakeRenderer {
        fn render(&self, latex: &str, display_mode: bool) -> Result<String, String> {
            Ok(format!("<k d={display_mode}>{latex}</k>"))
        }
    }

    struct FailingRenderer;
    impl MathRenderer for FailingRenderer {
        fn render(&self, _latex: &str, _display_mode: bool) -> Result<String, String> {
            Err("parse error".to_string())
        }
    }

    #[test]
    fn test_extract_block_before_inline() {
        let mut vault = Vault::new();
        let out = extract("before $$x^2$$ and $y$ after", &mut vault);
        assert_eq!(out, "before MATH_BLOCK_0 and MATH_INLINE_0 after");
        assert_eq!(vault.entries()[0].source, "x^2");
        assert_eq!(vault.entries()[1].source, "y");
    }

    #[test]
    fn test_block_with_newlines() {
        let mut vault = Vault::new();
        let out = extract("$$\n\\sum_i x_i\n$$", &mut vault);
        assert_eq!(out, "MATH_BLOCK_0");
        assert_eq!(vault.entries()[0].source, "\\sum_i x_i");
    }

    #[test]
    fn test_inline_does_not_cross_lines() {
        let mut vault = Vault::new();
        let out = extract("a $x\nb$ c", &mut vault);
        assert_eq!(out, "a $x\nb$ c");
        assert!(vault.is_empty());
    }

    #[test]
    fn test_environment_extraction() {
        let mut vault = Vault::new();
        let src = "text \\begin{align}a &= b\\\\c &= d\\end{align} more";
        let out = extract(src, &mut vault);
        assert_eq!(out, "text MATH_ENV_0 more");
        assert!(vault.entries()[0].source.starts_with("\\begin{align}"));
        assert!(vault.entries()[0].source.ends_with("\\end{align}"));
    }

    #[test]
    fn test_unterminated_environment_left_alone() {
        let mut vault = Vault::new();
        let src = "\\begin{align}a = b";
        let out = extract(src, &mut vault);
        assert_eq!(out, src);
        assert!(vault.is_empty());
    }

    #[test]
    fn test_render_block_wrapper() {
        let entry = Protected {
            token: "MATH_BLOCK_0".into(),
            kind: Kind::MathBlock,
            source: "x^2".into(),
        };
        let html = render_protected(&entry, Some(&FakeRenderer));
        assert!(html.starts_with(r#"<div class="math-block""#));
        assert!(html.contains("<k d=true>x^2</k>"));
    }

    #[test]
    fn test_render_inline_wrapper() {
        let entry = Protected {
            token: "MATH_INLINE_0".into(),
            kind: Kind::MathInline,
            source: "y".into(),
        };
        let html = render_protected(&entry, Some(&FakeRenderer));
        assert!(html.starts_with(r#"<span class="math-inline""#));
        assert!(html.contains("<k d=false>y</k>"));
    }

    #[test]
    fn test_render_failure_produces_error_fragment() {
        let entry = Protected {
            token: "MATH_BLOCK_0".into(),
            kind: Kind::MathBlock,
            source: "x^2 <script>".into(),
        };
        let html = render_protected(&entry, Some(&FailingRenderer));
        assert!(html.contains("math-error"));
        assert!(html.contains("x^2 &lt;script&gt;"));
    }

    #[test]
    fn test_no_renderer_plain_fallback() {
        let entry = Protected {
            token: "MATH_INLINE_0".into(),
            kind: Kind::MathInline,
            source: "E = mc^2".into(),
        };
        let html = render_protected(&entry, None);
        assert!(html.contains("font-style: italic"));
        assert!(html.contains("E = mc^2"));
        assert!(!html.contains("math-error"));
    }
}
