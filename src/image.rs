//! Image ingestion for article embedding.
//!
//! WeChat articles cannot reference local files, so small images are
//! inlined as base64 data URLs and larger ones are kept as named artifacts
//! for the packaged export to carry alongside the HTML. Batches are
//! processed one file at a time; a rejected file never aborts the rest of
//! the batch.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{Error, Result};

/// Hard cap on accepted file size.
const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// How an ingested image is carried into the exported document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Small file, inlined directly as a data URL.
    Base64,
    /// Too large to inline; carried as a file in the packaged export.
    Compressed,
    /// Reduced in size (minified SVG) and then inlined.
    CompressedBase64,
}

/// A processed image. Immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct ImageArtifact {
    pub id: String,
    pub file_name: String,
    pub original_size: u64,
    pub original_type: String,
    pub strategy: Strategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<(u32, u32)>,
    /// Creation time, seconds since the Unix epoch.
    pub created: u64,
}

impl ImageArtifact {
    /// The `src` value to use in generated HTML or Markdown.
    pub fn source(&self) -> String {
        match &self.base64 {
            Some(data) => format!("data:{};base64,{}", self.original_type, data),
            None => self.file_name.clone(),
        }
    }

    /// Markdown image reference for insertion into the editor.
    pub fn markdown_reference(&self) -> String {
        format!("![{}]({})", self.file_name, self.source())
    }
}

/// Ingestion settings.
#[derive(Debug, Clone)]
pub struct ImageOptions {
    /// Files at or below this size are inlined as base64.
    pub max_inline_size: u64,
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            max_inline_size: 500 * 1024,
            max_width: 800,
            max_height: 600,
        }
    }
}

/// Scale dimensions to fit inside a bounding box, preserving aspect ratio.
pub fn scale_to_fit(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let mut w = width as f64;
    let mut h = height as f64;

    if w > max_width as f64 {
        h = h * max_width as f64 / w;
        w = max_width as f64;
    }
    if h > max_height as f64 {
        w = w * max_height as f64 / h;
        h = max_height as f64;
    }

    (w.round() as u32, h.round() as u32)
}

fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

/// Collapse whitespace runs in an oversized SVG. Returns the minified text
/// when that brings it under the inline threshold; raster formats and SVGs
/// that stay too big return `None`.
fn minify_svg(mime: &str, data: &[u8], max_inline_size: u64) -> Option<String> {
    if mime != "image/svg+xml" {
        return None;
    }
    let text = std::str::from_utf8(data).ok()?;

    let mut minified = String::with_capacity(text.len());
    let mut in_whitespace = false;
    for c in text.chars() {
        if c.is_whitespace() {
            in_whitespace = true;
        } else {
            if in_whitespace && !minified.is_empty() {
                minified.push(' ');
            }
            in_whitespace = false;
            minified.push(c);
        }
    }

    (minified.len() as u64 <= max_inline_size).then_some(minified)
}

fn epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Ingests image files and keeps the resulting artifacts for the export
/// stage to pick up.
pub struct ImageProcessor {
    options: ImageOptions,
    images: IndexMap<String, ImageArtifact>,
    next_id: u64,
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new(ImageOptions::default())
    }
}

impl ImageProcessor {
    pub fn new(options: ImageOptions) -> Self {
        Self {
            options,
            images: IndexMap::new(),
            next_id: 0,
        }
    }

    pub fn get(&self, id: &str) -> Option<&ImageArtifact> {
        self.images.get(id)
    }

    pub fn artifacts(&self) -> impl Iterator<Item = &ImageArtifact> {
        self.images.values()
    }

    /// Ingest a single image file. Unsupported types and files over 10MB
    /// are rejected.
    pub fn process_file(&mut self, path: &Path) -> Result<&ImageArtifact> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let mime = mime_for_extension(ext)
            .ok_or_else(|| Error::Image(format!("unsupported image type: .{ext}")))?;

        let data = std::fs::read(path)?;
        let size = data.len() as u64;
        if size > MAX_FILE_SIZE {
            return Err(Error::Image(format!(
                "file is {size} bytes; images over 10MB are not accepted"
            )));
        }

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image")
            .to_string();

        let (strategy, base64, compressed_size) = if size <= self.options.max_inline_size {
            (Strategy::Base64, Some(BASE64.encode(&data)), None)
        } else if let Some(minified) = minify_svg(mime, &data, self.options.max_inline_size) {
            let minified_size = minified.len() as u64;
            (
                Strategy::CompressedBase64,
                Some(BASE64.encode(minified.as_bytes())),
                Some(minified_size),
            )
        } else {
            (Strategy::Compressed, None, None)
        };

        let id = format!("img_{}", self.next_id);
        self.next_id += 1;

        let artifact = ImageArtifact {
            id: id.clone(),
            file_name,
            original_size: size,
            original_type: mime.to_string(),
            strategy,
            base64,
            compressed_size,
            dimensions: None,
            created: epoch_seconds(),
        };
        log::debug!(
            "ingested image {id} ({size} bytes, {:?})",
            artifact.strategy
        );

        self.images.insert(id.clone(), artifact);
        Ok(&self.images[&id])
    }

    /// Ingest a batch sequentially. Failures are collected per file; the
    /// batch never aborts early.
    pub fn process_batch(&mut self, paths: &[PathBuf]) -> (Vec<String>, Vec<(PathBuf, Error)>) {
        let mut processed = Vec::new();
        let mut failures = Vec::new();

        for path in paths {
            match self.process_file(path) {
                Ok(artifact) => processed.push(artifact.id.clone()),
                Err(err) => {
                    log::warn!("image {} rejected: {err}", path.display());
                    failures.push((path.clone(), err));
                }
            }
        }

        (processed, failures)
    }

    /// Drop artifacts older than `max_age`. Returns how many were removed.
    pub fn cleanup(&mut self, max_age: Duration) -> usize {
        let cutoff = epoch_seconds().saturating_sub(max_age.as_secs());
        let before = self.images.len();
        self.images.retain(|_, artifact| artifact.created >= cutoff);
        before - self.images.len()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        path
    }

    #[test]
    fn test_small_image_inlined() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "dot.png", b"\x89PNG\r\n\x1a\nfake");

        let mut processor = ImageProcessor::default();
        let artifact = processor.process_file(&path).unwrap();

        assert_eq!(artifact.strategy, Strategy::Base64);
        assert!(artifact.base64.is_some());
        assert!(artifact.source().starts_with("data:image/png;base64,"));
        assert!(artifact.markdown_reference().starts_with("![dot.png]("));
    }

    #[test]
    fn test_large_image_not_inlined() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "big.jpg", &vec![0u8; 600 * 1024]);

        let mut processor = ImageProcessor::default();
        let artifact = processor.process_file(&path).unwrap();

        assert_eq!(artifact.strategy, Strategy::Compressed);
        assert!(artifact.base64.is_none());
        assert_eq!(artifact.source(), "big.jpg");
    }

    #[test]
    fn test_oversized_svg_minified_and_inlined() {
        let dir = tempfile::tempdir().unwrap();
        // Padding whitespace pushes the file over the inline threshold;
        // minification brings it back under.
        let svg = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\">{}<circle r=\"4\"/></svg>",
            "    \n".repeat(120 * 1024)
        );
        let path = write_temp(&dir, "big.svg", svg.as_bytes());

        let mut processor = ImageProcessor::default();
        let artifact = processor.process_file(&path).unwrap();

        assert_eq!(artifact.strategy, Strategy::CompressedBase64);
        assert!(artifact.base64.is_some());
        assert!(artifact.compressed_size.unwrap() < artifact.original_size);
        assert!(artifact.source().starts_with("data:image/svg+xml;base64,"));
    }

    #[test]
    fn test_oversized_raster_not_minified() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "big.jpg", &vec![b' '; 600 * 1024]);

        let mut processor = ImageProcessor::default();
        let artifact = processor.process_file(&path).unwrap();
        assert_eq!(artifact.strategy, Strategy::Compressed);
    }

    #[test]
    fn test_unsupported_type_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "doc.pdf", b"%PDF-1.4");

        let mut processor = ImageProcessor::default();
        let err = processor.process_file(&path).unwrap_err();
        assert!(matches!(err, Error::Image(_)));
    }

    #[test]
    fn test_batch_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_temp(&dir, "a.png", b"data");
        let bad = write_temp(&dir, "b.txt", b"nope");
        let missing = dir.path().join("missing.png");

        let mut processor = ImageProcessor::default();
        let (processed, failures) =
            processor.process_batch(&[good, bad, missing]);

        assert_eq!(processed.len(), 1);
        assert_eq!(failures.len(), 2);
        assert_eq!(processor.len(), 1);
    }

    #[test]
    fn test_cleanup_keeps_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "a.png", b"data");

        let mut processor = ImageProcessor::default();
        processor.process_file(&path).unwrap();

        assert_eq!(processor.cleanup(Duration::from_secs(3600)), 0);
        assert_eq!(processor.len(), 1);
        assert_eq!(processor.cleanup(Duration::from_secs(0)), 0);
    }

    #[test]
    fn test_scale_to_fit() {
        assert_eq!(scale_to_fit(1600, 1200, 800, 600), (800, 600));
        assert_eq!(scale_to_fit(400, 300, 800, 600), (400, 300));
        assert_eq!(scale_to_fit(1600, 400, 800, 600), (800, 200));
    }
}
