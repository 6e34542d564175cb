//! Document import/export and export history.
//!
//! Export produces a standalone HTML document wrapping the adapted article
//! body; every export is recorded in a bounded history (newest first, ten
//! entries) that round-trips through JSON.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MAX_HISTORY: usize = 10;

/// Markdown file extensions accepted for import.
const IMPORT_EXTENSIONS: &[&str] = &["md", "markdown", "txt"];

/// Metadata carried in the exported document head.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub title: String,
    pub template: String,
}

/// One entry in the export history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRecord {
    pub file_name: String,
    pub title: String,
    pub template: String,
    pub size: usize,
    /// Seconds since the Unix epoch.
    pub exported_at: u64,
}

fn epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Read a Markdown source file. Only `.md`, `.markdown`, and `.txt` are
/// accepted.
pub fn import_markdown(path: &Path) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();
    if !IMPORT_EXTENSIONS.contains(&ext.as_str()) {
        return Err(Error::UnsupportedFormat(format!(
            ".{ext} (expected .md, .markdown, or .txt)"
        )));
    }
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8(bytes)?)
}

/// Wrap adapted article HTML in a standalone document.
pub fn export_document(html: &str, metadata: &ExportMetadata) -> String {
    format!(
        concat!(
            "<!DOCTYPE html>\n",
            "<html lang=\"zh-CN\">\n",
            "<head>\n",
            "    <meta charset=\"UTF-8\">\n",
            "    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
            "    <title>{title}</title>\n",
            "    <meta name=\"generator\" content=\"weimark\">\n",
            "    <meta name=\"template\" content=\"{template}\">\n",
            "</head>\n",
            "<body>\n",
            "{body}\n",
            "</body>\n",
            "</html>\n"
        ),
        title = escape_meta(&metadata.title),
        template = escape_meta(&metadata.template),
        body = html
    )
}

fn escape_meta(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Performs exports and keeps the bounded history.
#[derive(Debug, Default)]
pub struct ExportManager {
    history: Vec<ExportRecord>,
}

impl ExportManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a standalone HTML document to `path` and record the export.
    pub fn export_to_file(
        &mut self,
        path: &Path,
        html: &str,
        metadata: &ExportMetadata,
    ) -> Result<()> {
        if html.trim().is_empty() {
            return Err(Error::Export("nothing to export".to_string()));
        }

        let document = export_document(html, metadata);
        std::fs::write(path, &document)?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("export.html")
            .to_string();
        self.record(ExportRecord {
            file_name,
            title: metadata.title.clone(),
            template: metadata.template.clone(),
            size: document.len(),
            exported_at: epoch_seconds(),
        });
        Ok(())
    }

    /// Push a record, newest first, keeping at most ten entries.
    pub fn record(&mut self, record: ExportRecord) {
        self.history.insert(0, record);
        self.history.truncate(MAX_HISTORY);
    }

    pub fn history(&self) -> &[ExportRecord] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Persist the history as JSON.
    pub fn serialize_history(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.history)?)
    }

    /// Restore a history persisted by [`serialize_history`](Self::serialize_history).
    pub fn deserialize_history(blob: &str) -> Result<Self> {
        let mut history: Vec<ExportRecord> = serde_json::from_str(blob)?;
        history.truncate(MAX_HISTORY);
        Ok(Self { history })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> ExportMetadata {
        ExportMetadata {
            title: "My Article".to_string(),
            template: "minimal".to_string(),
        }
    }

    fn sample_record(n: usize) -> ExportRecord {
        ExportRecord {
            file_name: format!("a{n}.html"),
            title: format!("t{n}"),
            template: "minimal".to_string(),
            size: n,
            exported_at: n as u64,
        }
    }

    #[test]
    fn test_standalone_document_shape() {
        let doc = export_document("<div><p>hi</p></div>", &metadata());
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains("<title>My Article</title>"));
        assert!(doc.contains(r#"<meta name="template" content="minimal">"#));
        assert!(doc.contains("<div><p>hi</p></div>"));
    }

    #[test]
    fn test_title_escaped() {
        let doc = export_document(
            "<p>x</p>",
            &ExportMetadata {
                title: r#"a<b>"c""#.to_string(),
                template: "minimal".to_string(),
            },
        );
        assert!(doc.contains("<title>a&lt;b&gt;&quot;c&quot;</title>"));
    }

    #[test]
    fn test_export_to_file_records_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.html");

        let mut manager = ExportManager::new();
        manager
            .export_to_file(&path, "<p>hello</p>", &metadata())
            .unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("<p>hello</p>"));
        assert_eq!(manager.history().len(), 1);
        assert_eq!(manager.history()[0].file_name, "out.html");
    }

    #[test]
    fn test_empty_export_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.html");

        let mut manager = ExportManager::new();
        let err = manager.export_to_file(&path, "  ", &metadata()).unwrap_err();
        assert!(matches!(err, Error::Export(_)));
        assert!(manager.history().is_empty());
    }

    #[test]
    fn test_history_bounded_newest_first() {
        let mut manager = ExportManager::new();
        for n in 0..15 {
            manager.record(sample_record(n));
        }
        assert_eq!(manager.history().len(), 10);
        assert_eq!(manager.history()[0].file_name, "a14.html");
        assert_eq!(manager.history()[9].file_name, "a5.html");
    }

    #[test]
    fn test_history_roundtrip() {
        let mut manager = ExportManager::new();
        manager.record(sample_record(1));
        manager.record(sample_record(2));

        let blob = manager.serialize_history().unwrap();
        let restored = ExportManager::deserialize_history(&blob).unwrap();
        assert_eq!(restored.history().len(), 2);
        assert_eq!(restored.history()[0].file_name, "a2.html");
    }

    #[test]
    fn test_import_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.md");
        std::fs::write(&path, "# Title").unwrap();

        assert_eq!(import_markdown(&path).unwrap(), "# Title");

        let bad = dir.path().join("doc.docx");
        std::fs::write(&bad, "x").unwrap();
        assert!(matches!(
            import_markdown(&bad),
            Err(Error::UnsupportedFormat(_))
        ));
    }
}
