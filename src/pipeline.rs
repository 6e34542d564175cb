//! End-to-end Markdown to WeChat HTML conversion.
//!
//! A conversion run protects math and diagram regions, renders Markdown,
//! substitutes the protected regions back, resolves code placeholders,
//! and finally adapts the HTML for the WeChat editor. Runs are numbered so
//! a caller driving conversions concurrently can discard stale results.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, html as cmark_html};
use regex::Regex;
use serde::Serialize;

use crate::adapt::{AdaptEngine, Validation, validate_for_wechat};
use crate::protect::{Kind, Vault};
use crate::stage::code::{self, CodeOptions};
use crate::stage::{DiagramRenderer, Highlighter, MathRenderer, diagram, math};
use crate::template::TemplateRegistry;

/// Conversion settings a caller fixes up front.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Template key; unknown keys fall back to `minimal`.
    pub template: String,
    pub code: CodeOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            template: crate::template::DEFAULT_TEMPLATE.to_string(),
            code: CodeOptions::default(),
        }
    }
}

/// Result of one conversion run.
#[derive(Debug)]
pub struct ConversionOutput {
    pub html: String,
    pub validation: Validation,
    /// Placeholder tokens whose text is still visible in the output after
    /// substitution.
    pub unresolved: usize,
    /// Run sequence number; see [`Pipeline::is_current`].
    pub run: u64,
}

/// Counters over a Markdown source document, for editor status displays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DocumentStats {
    pub words: usize,
    pub characters: usize,
    pub lines: usize,
    pub headings: usize,
    pub links: usize,
    pub images: usize,
}

/// Count words, lines, and Markdown constructs in a source document.
/// Every non-whitespace character counts as a word, which keeps the count
/// meaningful for CJK prose.
pub fn document_stats(markdown: &str) -> DocumentStats {
    if markdown.is_empty() {
        return DocumentStats::default();
    }

    static HEADING: OnceLock<Regex> = OnceLock::new();
    static LINK: OnceLock<Regex> = OnceLock::new();
    static IMAGE: OnceLock<Regex> = OnceLock::new();

    let heading = HEADING.get_or_init(|| Regex::new(r"(?m)^#+\s+").unwrap());
    let link = LINK.get_or_init(|| Regex::new(r"\[[^\]]+\]\([^)]+\)").unwrap());
    let image = IMAGE.get_or_init(|| Regex::new(r"!\[[^\]]*\]\([^)]+\)").unwrap());

    DocumentStats {
        words: markdown.chars().filter(|c| !c.is_whitespace()).count(),
        characters: markdown.chars().count(),
        lines: markdown.split('\n').count(),
        headings: heading.find_iter(markdown).count(),
        links: link.find_iter(markdown).count(),
        images: image.find_iter(markdown).count(),
    }
}

/// Markdown to WeChat HTML converter.
pub struct Pipeline {
    options: PipelineOptions,
    templates: TemplateRegistry,
    math_renderer: Option<Box<dyn MathRenderer>>,
    diagram_renderer: Option<Box<dyn DiagramRenderer>>,
    highlighter: Option<Box<dyn Highlighter>>,
    run_seq: AtomicU64,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        let mut templates = TemplateRegistry::new();
        templates.set_current(&options.template);
        Self {
            options,
            templates,
            math_renderer: None,
            diagram_renderer: None,
            highlighter: None,
            run_seq: AtomicU64::new(0),
        }
    }

    pub fn with_math_renderer(mut self, renderer: Box<dyn MathRenderer>) -> Self {
        self.math_renderer = Some(renderer);
        self
    }

    pub fn with_diagram_renderer(mut self, renderer: Box<dyn DiagramRenderer>) -> Self {
        self.diagram_renderer = Some(renderer);
        self
    }

    pub fn with_highlighter(mut self, highlighter: Box<dyn Highlighter>) -> Self {
        self.highlighter = Some(highlighter);
        self
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    pub fn templates_mut(&mut self) -> &mut TemplateRegistry {
        &mut self.templates
    }

    /// Switch the active template. Unknown keys are ignored.
    pub fn set_template(&mut self, key: &str) -> bool {
        self.templates.set_current(key)
    }

    /// True when `run` is the most recently started conversion. Callers
    /// racing conversions drop outputs for which this returns false.
    pub fn is_current(&self, run: u64) -> bool {
        run == self.run_seq.load(Ordering::SeqCst)
    }

    /// Convert Markdown to WeChat-ready HTML.
    pub fn convert(&self, markdown: &str) -> ConversionOutput {
        let run = self.run_seq.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!("conversion run {run} started ({} bytes)", markdown.len());

        let mut vault = Vault::new();
        let content = math::extract(markdown, &mut vault);
        let content = diagram::extract(&content, &mut vault);

        let html = self.render_markdown(&content);

        let mut diagram_seq = 0usize;
        let (html, unresolved) = vault.restore(&html, |entry| match entry.kind {
            Kind::Diagram => {
                let id = format!("mermaid-diagram-{diagram_seq}");
                diagram_seq += 1;
                diagram::render_protected(entry, &id, self.diagram_renderer.as_deref())
            }
            _ => math::render_protected(entry, self.math_renderer.as_deref()),
        });

        let html =
            code::resolve_placeholders(&html, &self.options.code, self.highlighter.as_deref());

        let template = self.templates.resolve(self.templates.current());
        let html = AdaptEngine::new(template).adapt(&html);

        let validation = validate_for_wechat(&html);
        if !validation.is_valid {
            log::warn!("conversion run {run}: {} issue(s)", validation.issues.len());
        }

        ConversionOutput {
            html,
            validation,
            unresolved,
            run,
        }
    }

    /// Markdown rendering with code fences and inline code routed through
    /// placeholders, soft breaks hardened, and task markers replaced with
    /// symbols WeChat can display.
    fn render_markdown(&self, content: &str) -> String {
        let mut opts = Options::empty();
        opts.insert(Options::ENABLE_TABLES);
        opts.insert(Options::ENABLE_STRIKETHROUGH);
        opts.insert(Options::ENABLE_TASKLISTS);

        let mut events: Vec<Event> = Vec::new();
        let mut code_block: Option<(String, String)> = None;

        for event in Parser::new_ext(content, opts) {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let language = match &kind {
                        CodeBlockKind::Fenced(info) => {
                            info.split_whitespace().next().unwrap_or("").to_string()
                        }
                        CodeBlockKind::Indented => String::new(),
                    };
                    code_block = Some((language, String::new()));
                }
                Event::End(Tag::CodeBlock(_)) => {
                    if let Some((language, body)) = code_block.take() {
                        let body = body.strip_suffix('\n').unwrap_or(&body);
                        events.push(Event::Html(
                            code::block_placeholder(&language, body).into(),
                        ));
                    }
                }
                Event::Text(text) if code_block.is_some() => {
                    if let Some((_, body)) = code_block.as_mut() {
                        body.push_str(&text);
                    }
                }
                Event::Code(inline) => {
                    events.push(Event::Html(code::inline_placeholder(&inline).into()));
                }
                Event::SoftBreak => events.push(Event::HardBreak),
                Event::TaskListMarker(checked) => {
                    let marker = if checked { "\u{2705} " } else { "\u{2b1c} " };
                    events.push(Event::Text(marker.into()));
                }
                other => events.push(other),
            }
        }

        let mut html = String::with_capacity(content.len() * 2);
        cmark_html::push_html(&mut html, events.into_iter());
        html
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineOptions::default())
    }
}
