use weimark::{MathRenderer, Pipeline, PipelineOptions};

fn pipeline_with(template: &str) -> Pipeline {
    Pipeline::new(PipelineOptions {
        template: template.to_string(),
        ..PipelineOptions::default()
    })
}

#[test]
fn test_heading_gets_inlined_template_styles() {
    let pipeline = pipeline_with("minimal");
    let out = pipeline.convert("# Title\n\nBody paragraph.");

    assert!(out.validation.is_valid);
    assert!(out.html.contains("<h1"));
    // Minimal template's h1 declarations, inlined with forcing
    assert!(out.html.contains("color: #2c3e50 !important"));
    assert!(out.html.contains("font-size: 1.8em !important"));
    assert!(out.html.contains("border-bottom: 2px solid #3498db !important"));
}

#[test]
fn test_python_fence_renders_with_language_label() {
    let pipeline = pipeline_with("minimal");
    let out = pipeline.convert("```python\ndef f():\n    return 1\n```");

    assert!(out.html.contains("Python"));
    assert!(out.html.contains("def"));
    assert!(out.html.contains("return"));
    // Keyword spans must not swallow the code around them
    assert!(out.html.contains("return</span> 1"));
    assert!(!out.html.contains("&quot;color"));
    assert!(!out.html.contains("code-placeholder"));
    assert!(out.validation.is_valid);
}

struct ThrowingMath;
impl MathRenderer for ThrowingMath {
    fn render(&self, _latex: &str, _display_mode: bool) -> Result<String, String> {
        Err("renderer exploded".to_string())
    }
}

#[test]
fn test_failing_math_renderer_yields_error_fragment() {
    let pipeline = pipeline_with("minimal").with_math_renderer(Box::new(ThrowingMath));
    let out = pipeline.convert("Before\n\n$$x^2$$\n\nAfter");

    // Pipeline completes; the failure is visible inline, quoting the source
    assert!(out.html.contains("Math error:"));
    assert!(out.html.contains("x^2"));
    assert!(out.html.contains("After"));
    assert_eq!(out.unresolved, 0);
}

#[test]
fn test_template_switch_changes_inlined_styles() {
    let mut pipeline = pipeline_with("minimal");
    let markdown = "# Title\n\nA paragraph.";

    let minimal = pipeline.convert(markdown).html;
    assert!(pipeline.set_template("academic"));
    let academic = pipeline.convert(markdown).html;

    assert!(minimal.contains("-apple-system"));
    assert!(academic.contains("Times New Roman"));
    assert!(academic.contains("line-height: 2 !important"));
    assert_ne!(minimal, academic);
}

#[test]
fn test_many_formulas_restore_without_collisions() {
    let pipeline = pipeline_with("minimal");
    let markdown: String = (0..12)
        .map(|i| format!("item $a_{{{i}}}$\n\n"))
        .collect();
    let out = pipeline.convert(&markdown);

    assert_eq!(out.unresolved, 0);
    assert!(!out.html.contains("MATH_INLINE"));
    // Ordinal 11 must not have been consumed by ordinal 1
    assert!(out.html.contains("a_{11}"));
    assert!(out.html.contains("a_{1}"));
}

#[test]
fn test_mixed_document_end_to_end() {
    let pipeline = pipeline_with("tech");
    let markdown = "\
# Report

Inline math $E = mc^2$ and a diagram:

```mermaid
graph TD
A-->B
```

```rust
fn main() {}
```

- [x] shipped
- [ ] pending
";
    let out = pipeline.convert(markdown);

    assert!(out.validation.is_valid, "issues: {:?}", out.validation.issues);
    assert!(out.html.contains("E = mc^2"));
    assert!(out.html.contains("mermaid-fallback"));
    assert!(out.html.contains("Rust"));
    assert!(out.html.contains('\u{2705}'));
    assert!(out.html.contains('\u{2b1c}'));
    assert_eq!(out.unresolved, 0);
}

#[test]
fn test_stale_run_detection() {
    let pipeline = pipeline_with("minimal");
    let old = pipeline.convert("first");
    let new = pipeline.convert("second");

    assert!(pipeline.is_current(new.run));
    assert!(!pipeline.is_current(old.run));
}
