//! # weimark
//!
//! Markdown to WeChat Official Account HTML conversion. The WeChat editor
//! strips `<style>` blocks, class-based styling, unknown tags, and most
//! attributes when content is pasted in, so this crate renders Markdown and
//! then rewrites the result with every surviving style inlined on a
//! restricted tag/attribute vocabulary.
//!
//! ## Features
//!
//! - GFM Markdown rendering (tables, strikethrough, task lists)
//! - Math (`$...$`, `$$...$$`, LaTeX environments), Mermaid diagrams, and
//!   highlighted code fences, shielded from the Markdown pass through
//!   placeholder tokens and restored afterwards
//! - Style templates (minimal, tech, academic, plus custom templates) with
//!   cascade resolution and inline-style emission
//! - Post-adaptation validation, image ingestion, and standalone HTML
//!   export with a bounded history
//!
//! ## Quick Start
//!
//! ```
//! use weimark::{Pipeline, PipelineOptions};
//!
//! let pipeline = Pipeline::new(PipelineOptions::default());
//! let output = pipeline.convert("# Hello\n\nSome *Markdown*.");
//! assert!(output.validation.is_valid);
//! assert!(output.html.contains("<h1"));
//! ```
//!
//! External renderers for math, diagrams, and syntax highlighting plug in
//! through the [`MathRenderer`], [`DiagramRenderer`], and [`Highlighter`]
//! traits; without them the pipeline degrades to styled plain fallbacks.

pub mod adapt;
pub mod css;
pub mod dom;
pub mod error;
pub mod export;
pub mod image;
pub mod pipeline;
pub mod protect;
pub mod stage;
pub mod template;

pub use adapt::{AdaptEngine, Validation, validate_for_wechat};
pub use error::{Error, Result};
pub use export::{ExportManager, ExportMetadata, export_document, import_markdown};
pub use image::{ImageArtifact, ImageProcessor};
pub use pipeline::{ConversionOutput, DocumentStats, Pipeline, PipelineOptions, document_stats};
pub use stage::{CodeOptions, DiagramRenderer, Highlighter, MathRenderer};
pub use template::{Template, TemplateRegistry, TemplateStyles};
