//! Code block and inline code rendering.
//!
//! Fenced code never rides through the Markdown pass as text tokens; the
//! renderer emits placeholder elements whose source travels base64-encoded
//! in a `data-code` attribute, immune to inline transforms. After the
//! Markdown pass the placeholders are resolved into styled code blocks.
//!
//! Highlighting goes through an optional [`Highlighter`]; without one a
//! built-in rule set covers the common language families.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use regex::Regex;
use std::sync::OnceLock;

use crate::dom::serialize::{escape_attr, escape_text};

/// Syntax highlighter for fenced code. Returns highlighted HTML with the
/// code already entity-escaped.
pub trait Highlighter {
    fn highlight(&self, code: &str, language: &str) -> Result<String, String>;
}

/// Rendering options for code blocks.
#[derive(Debug, Clone)]
pub struct CodeOptions {
    pub show_language: bool,
    pub max_lines: usize,
    pub wrap_lines: bool,
}

impl Default for CodeOptions {
    fn default() -> Self {
        Self {
            show_language: true,
            max_lines: 50,
            wrap_lines: true,
        }
    }
}

const LANGUAGE_ALIASES: &[(&str, &str)] = &[
    ("js", "javascript"),
    ("ts", "typescript"),
    ("py", "python"),
    ("cs", "csharp"),
    ("yml", "yaml"),
    ("sh", "bash"),
    ("md", "markdown"),
];

const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("javascript", "JavaScript"),
    ("typescript", "TypeScript"),
    ("python", "Python"),
    ("java", "Java"),
    ("c", "C"),
    ("cpp", "C++"),
    ("csharp", "C#"),
    ("php", "PHP"),
    ("ruby", "Ruby"),
    ("go", "Go"),
    ("rust", "Rust"),
    ("swift", "Swift"),
    ("kotlin", "Kotlin"),
    ("scala", "Scala"),
    ("html", "HTML"),
    ("xml", "XML"),
    ("css", "CSS"),
    ("scss", "SCSS"),
    ("sass", "Sass"),
    ("less", "Less"),
    ("json", "JSON"),
    ("yaml", "YAML"),
    ("sql", "SQL"),
    ("bash", "Bash"),
    ("shell", "Shell"),
    ("powershell", "PowerShell"),
    ("dockerfile", "Dockerfile"),
    ("markdown", "Markdown"),
    ("r", "R"),
    ("matlab", "MATLAB"),
    ("latex", "LaTeX"),
    ("vim", "Vim"),
    ("diff", "Diff"),
    ("git", "Git"),
    ("regex", "RegExp"),
];

/// Resolve aliases and lowercase the language tag. Empty input maps to
/// `text`.
pub fn normalize_language(language: &str) -> String {
    if language.is_empty() {
        return "text".to_string();
    }
    let lower = language.to_lowercase();
    LANGUAGE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(lower)
}

/// Human-readable language label for the code block header.
pub fn display_name(language: &str) -> String {
    if language.is_empty() {
        return "Text".to_string();
    }
    LANGUAGE_NAMES
        .iter()
        .find(|(lang, _)| *lang == language)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| language.to_string())
}

// Matches the JS encodeURIComponent unreserved set, so payloads written by
// either side decode identically.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Encode code for transport in a `data-code` attribute:
/// base64(percent-encode(text)).
pub fn encode_payload(text: &str) -> String {
    let encoded = utf8_percent_encode(text, URI_COMPONENT).to_string();
    BASE64.encode(encoded.as_bytes())
}

/// Inverse of [`encode_payload`].
pub fn decode_payload(encoded: &str) -> Option<String> {
    let bytes = BASE64.decode(encoded).ok()?;
    let percent_encoded = String::from_utf8(bytes).ok()?;
    percent_decode_str(&percent_encoded)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

/// Placeholder element emitted in place of a fenced code block.
pub fn block_placeholder(language: &str, code: &str) -> String {
    format!(
        "<div class=\"code-placeholder\" data-language=\"{}\" data-code=\"{}\"></div>\n",
        escape_attr(language),
        encode_payload(code)
    )
}

/// Placeholder element emitted in place of inline code.
pub fn inline_placeholder(code: &str) -> String {
    format!(
        r#"<span class="inline-code-placeholder" data-code="{}"></span>"#,
        encode_payload(code)
    )
}

fn block_placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<div class="code-placeholder" data-language="([^"]*)" data-code="([^"]*)"></div>"#)
            .unwrap()
    })
}

fn inline_placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<span class="inline-code-placeholder" data-code="([^"]*)"></span>"#).unwrap()
    })
}

/// Resolve all code placeholders in rendered HTML into styled code blocks.
pub fn resolve_placeholders(
    html: &str,
    options: &CodeOptions,
    highlighter: Option<&dyn Highlighter>,
) -> String {
    let html = block_placeholder_re().replace_all(html, |caps: &regex::Captures| {
        match decode_payload(&caps[2]) {
            Some(code) => highlight_code(&code, &caps[1], options, highlighter),
            None => format!(
                r#"<pre style="background: #f4f4f4; padding: 1em; border-radius: 4px; overflow-x: auto;"><code>{}</code></pre>"#,
                escape_text(&caps[2])
            ),
        }
    });

    inline_placeholder_re()
        .replace_all(&html, |caps: &regex::Captures| {
            match decode_payload(&caps[1]) {
                Some(code) => highlight_inline(&code),
                None => format!(
                    r#"<code style="background: #f1f1f1; padding: 0.2em 0.4em; border-radius: 3px;">{}</code>"#,
                    escape_text(&caps[1])
                ),
            }
        })
        .into_owned()
}

/// Render a fenced code block with header bar and highlighting.
pub fn highlight_code(
    code: &str,
    language: &str,
    options: &CodeOptions,
    highlighter: Option<&dyn Highlighter>,
) -> String {
    if code.trim().is_empty() {
        return code_block_error(language, "No code content");
    }

    // Truncate before highlighting so the notice itself is never colored
    let lines: Vec<&str> = code.split('\n').collect();
    let code = if lines.len() > options.max_lines {
        let truncated = lines[..options.max_lines].join("\n");
        format!(
            "{truncated}\n... (code truncated, {} lines total)",
            lines.len()
        )
    } else {
        code.to_string()
    };

    let language = normalize_language(language);

    let highlighted = match highlighter {
        Some(h) => h
            .highlight(&code, &language)
            .unwrap_or_else(|_| basic_highlight(&code, &language)),
        None => basic_highlight(&code, &language),
    };

    code_block(&highlighted, &language, options)
}

/// Styled inline code fragment.
pub fn highlight_inline(code: &str) -> String {
    format!(
        r#"<code style="background-color: #f3f4f6; padding: 0.2em 0.4em; border-radius: 3px; font-family: 'Monaco', 'Menlo', 'Ubuntu Mono', 'Consolas', monospace; font-size: 0.9em; color: #e73c7e; border: 1px solid #e5e7eb;">{}</code>"#,
        escape_text(code)
    )
}

const KEYWORD_STYLE: &str = "color: #d73a49; font-weight: bold;";
const COMMENT_STYLE: &str = "color: #6a737d; font-style: italic;";
const STRING_STYLE: &str = "color: #032f62;";
const TAG_PUNCT_STYLE: &str = "color: #22863a;";
const TAG_NAME_STYLE: &str = "color: #6f42c1;";
const TAG_ATTR_STYLE: &str = "color: #032f62;";
const CSS_SELECTOR_STYLE: &str = "color: #6f42c1;";
const CSS_PROPERTY_STYLE: &str = "color: #e36209;";

/// A colored region of the raw code, addressed by byte offsets.
struct ColorSpan {
    start: usize,
    end: usize,
    style: &'static str,
}

/// Run every rule's regex over the raw code and keep the earliest-starting
/// non-overlapping matches. A comment swallows the string literal inside
/// it, a string literal swallows the keyword inside it, and so on, because
/// the outer region starts first.
fn collect_spans(code: &str, rules: &[(&Regex, usize, &'static str)]) -> Vec<ColorSpan> {
    let mut found: Vec<(usize, usize, usize, &'static str)> = Vec::new();
    for (priority, &(re, group, style)) in rules.iter().enumerate() {
        for caps in re.captures_iter(code) {
            if let Some(m) = caps.get(group)
                && m.end() > m.start()
            {
                found.push((m.start(), m.end(), priority, style));
            }
        }
    }
    found.sort_by_key(|&(start, _, priority, _)| (start, priority));

    let mut spans = Vec::with_capacity(found.len());
    let mut cursor = 0;
    for (start, end, _, style) in found {
        if start >= cursor {
            spans.push(ColorSpan { start, end, style });
            cursor = end;
        }
    }
    spans
}

/// Stitch the highlighted output, escaping each segment as it is emitted.
/// The injected markup is never rescanned by any rule.
fn render_spans(code: &str, spans: &[ColorSpan]) -> String {
    let mut out = String::with_capacity(code.len() + spans.len() * 40);
    let mut cursor = 0;
    for span in spans {
        out.push_str(&escape_text(&code[cursor..span.start]));
        out.push_str("<span style=\"");
        out.push_str(span.style);
        out.push_str("\">");
        out.push_str(&escape_text(&code[span.start..span.end]));
        out.push_str("</span>");
        cursor = span.end;
    }
    out.push_str(&escape_text(&code[cursor..]));
    out
}

/// Keyword, comment, and string coloring for common language families.
/// Matching runs on the raw code in a single pass; escaping happens per
/// segment during output.
pub fn basic_highlight(code: &str, language: &str) -> String {
    static JS_KEYWORD: OnceLock<Regex> = OnceLock::new();
    static PY_KEYWORD: OnceLock<Regex> = OnceLock::new();
    static LINE_COMMENT: OnceLock<Regex> = OnceLock::new();
    static HASH_COMMENT: OnceLock<Regex> = OnceLock::new();
    static STRING: OnceLock<Regex> = OnceLock::new();
    static CSS_SELECTOR: OnceLock<Regex> = OnceLock::new();
    static CSS_PROPERTY: OnceLock<Regex> = OnceLock::new();
    static HTML_TAG: OnceLock<Regex> = OnceLock::new();

    let string = || STRING.get_or_init(|| Regex::new(r#"(['"`].*?['"`])"#).unwrap());

    let rules: Vec<(&Regex, usize, &'static str)> = match language {
        "javascript" | "typescript" => vec![
            (
                LINE_COMMENT.get_or_init(|| Regex::new(r"(?m)(//.*$)").unwrap()),
                1,
                COMMENT_STYLE,
            ),
            (string(), 1, STRING_STYLE),
            (
                JS_KEYWORD.get_or_init(|| {
                    Regex::new(r"\b(const|let|var|function|return|if|else|for|while|class|extends|import|export|from|async|await|try|catch|finally)\b").unwrap()
                }),
                1,
                KEYWORD_STYLE,
            ),
        ],
        "python" => vec![
            (
                HASH_COMMENT.get_or_init(|| Regex::new(r"(?m)(#.*$)").unwrap()),
                1,
                COMMENT_STYLE,
            ),
            (string(), 1, STRING_STYLE),
            (
                PY_KEYWORD.get_or_init(|| {
                    Regex::new(r"\b(def|class|import|from|return|if|elif|else|for|while|try|except|finally|with|as|pass|break|continue)\b").unwrap()
                }),
                1,
                KEYWORD_STYLE,
            ),
        ],
        "css" | "scss" | "sass" | "less" => vec![
            (
                CSS_SELECTOR.get_or_init(|| Regex::new(r"([.#]?[\w-]+)\s*\{").unwrap()),
                1,
                CSS_SELECTOR_STYLE,
            ),
            (
                CSS_PROPERTY.get_or_init(|| Regex::new(r"([\w-]+)\s*:").unwrap()),
                1,
                CSS_PROPERTY_STYLE,
            ),
        ],
        "html" | "xml" => {
            let tag = HTML_TAG.get_or_init(|| Regex::new(r"(</?)(\w+)([^<>]*?)(>)").unwrap());
            vec![
                (tag, 1, TAG_PUNCT_STYLE),
                (tag, 2, TAG_NAME_STYLE),
                (tag, 3, TAG_ATTR_STYLE),
                (tag, 4, TAG_PUNCT_STYLE),
            ]
        }
        _ => return escape_text(code),
    };

    render_spans(code, &collect_spans(code, &rules))
}

fn code_block(highlighted: &str, language: &str, options: &CodeOptions) -> String {
    let header = if options.show_language {
        format!(
            r#"<div class="code-header" style="background: linear-gradient(90deg, #f6f8fa, #e1e4e8); padding: 0.5em 1em; border-bottom: 1px solid #e1e4e8; font-size: 0.85em; color: #586069; font-weight: 500; border-radius: 6px 6px 0 0;"><span class="code-language">{}</span></div>"#,
            escape_text(&display_name(language))
        )
    } else {
        String::new()
    };

    let white_space = if options.wrap_lines {
        "white-space: pre-wrap; word-wrap: break-word;"
    } else {
        "white-space: pre;"
    };

    format!(
        concat!(
            r#"<div class="code-block" style="margin: 1.5em 0; border: 1px solid #e1e4e8; border-radius: 6px; overflow: hidden; background-color: #ffffff;">"#,
            "{header}",
            r#"<pre class="code-content" style="margin: 0; padding: 1em; overflow-x: auto; font-family: 'Monaco', 'Menlo', 'Ubuntu Mono', 'Consolas', monospace; font-size: 0.85em; line-height: 1.4; background-color: #f6f8fa; color: #24292e; {white_space}"><code class="language-{language}">{code}</code></pre>"#,
            r#"</div>"#
        ),
        header = header,
        white_space = white_space,
        language = escape_attr(language),
        code = highlighted
    )
}

fn code_block_error(language: &str, message: &str) -> String {
    format!(
        concat!(
            r#"<div class="code-block" style="margin: 1.5em 0; border: 1px solid #e1e4e8; border-radius: 6px; overflow: hidden; background-color: #ffffff;">"#,
            r#"<div style="color: #d73a49; background: #ffeaea; padding: 1em; font-family: monospace; font-size: 0.9em;"><strong>{}:</strong> {}</div>"#,
            r#"</div>"#
        ),
        display_name(&normalize_language(language)),
        escape_text(message)
    )
}
