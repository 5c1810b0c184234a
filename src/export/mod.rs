//! Document exporter: generated text to a paginated PDF artifact.
//!
//! The exporter splits text into rows, lays the rows out on fixed-size pages
//! (starting a new page at the bottom margin) and writes the result to a
//! single file that is overwritten on every export.

mod layout;
mod pdf;

pub use layout::{paginate, Document, PageLayout, MM_TO_PT};

use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::config::ExportConfig;

/// Default artifact file name
pub const DEFAULT_FILE_NAME: &str = "blog_output.pdf";

/// Media type of the artifact
pub const MEDIA_TYPE: &str = "application/pdf";

/// Errors that can occur while exporting
#[derive(Debug, thiserror::Error)]
pub enum DocumentWriteError {
    #[error("failed to encode PDF: {0}")]
    Encode(String),

    #[error("failed to write {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<lopdf::Error> for DocumentWriteError {
    fn from(err: lopdf::Error) -> Self {
        DocumentWriteError::Encode(err.to_string())
    }
}

/// A written artifact, ready to be transferred to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentHandle {
    /// Location of the artifact
    pub path: PathBuf,

    /// File name offered for download
    pub file_name: String,

    /// Declared media type
    pub media_type: &'static str,

    /// Number of text rows rendered
    pub rows: usize,

    /// Number of pages rendered
    pub pages: usize,
}

impl DocumentHandle {
    /// Reopen the artifact for reading
    pub fn open(&self) -> std::io::Result<File> {
        File::open(&self.path)
    }

    /// Size of the artifact in bytes
    pub fn size(&self) -> std::io::Result<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }
}

/// Writes generated text to a PDF file
#[derive(Debug, Clone)]
pub struct DocumentExporter {
    layout: PageLayout,
    output_dir: PathBuf,
    file_name: String,
}

impl DocumentExporter {
    /// Exporter with the default layout writing `blog_output.pdf` into `output_dir`
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            layout: PageLayout::default(),
            output_dir: output_dir.into(),
            file_name: DEFAULT_FILE_NAME.to_string(),
        }
    }

    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            layout: PageLayout::from_config(config),
            output_dir: config.output_dir.clone(),
            file_name: config.file_name.clone(),
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    /// Where the artifact will be written
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.file_name)
    }

    /// Render `text` and write it to [`Self::output_path`], replacing any
    /// previous artifact.
    pub fn export(&self, text: &str) -> Result<DocumentHandle, DocumentWriteError> {
        let document = Document::from_text(text);
        let rendered = pdf::render(document.lines(), &self.layout)?;

        let path = self.output_path();
        write_artifact(&path, &rendered.bytes)?;

        tracing::info!(
            path = %path.display(),
            rows = document.row_count(),
            pages = rendered.pages,
            bytes = rendered.bytes.len(),
            "Exported document"
        );

        Ok(DocumentHandle {
            path,
            file_name: self.file_name.clone(),
            media_type: MEDIA_TYPE,
            rows: document.row_count(),
            pages: rendered.pages,
        })
    }
}

fn write_artifact(path: &Path, bytes: &[u8]) -> Result<(), DocumentWriteError> {
    let io_err = |source| DocumentWriteError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, bytes).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::Content;
    use tempfile::tempdir;

    fn shown_rows(path: &Path) -> Vec<usize> {
        let doc = lopdf::Document::load(path).unwrap();
        doc.get_pages()
            .values()
            .map(|page_id| {
                let bytes = doc.get_page_content(*page_id).unwrap();
                Content::decode(&bytes)
                    .unwrap()
                    .operations
                    .iter()
                    .filter(|op| op.operator == "Tj")
                    .count()
            })
            .collect()
    }

    #[test]
    fn test_export_three_lines() {
        let dir = tempdir().unwrap();
        let exporter = DocumentExporter::new(dir.path());

        let handle = exporter.export("Line1\nLine2\nLine3").unwrap();

        assert_eq!(handle.rows, 3);
        assert_eq!(handle.pages, 1);
        assert_eq!(handle.file_name, "blog_output.pdf");
        assert_eq!(handle.media_type, "application/pdf");
        assert_eq!(handle.path, dir.path().join("blog_output.pdf"));
        assert!(handle.size().unwrap() > 0);
        assert_eq!(shown_rows(&handle.path), vec![3]);
    }

    #[test]
    fn test_export_breaks_pages() {
        let dir = tempdir().unwrap();
        let exporter = DocumentExporter::new(dir.path());
        let text = (1..=60)
            .map(|i| format!("Row {}", i))
            .collect::<Vec<_>>()
            .join("\n");

        let handle = exporter.export(&text).unwrap();

        assert_eq!(handle.rows, 60);
        assert_eq!(handle.pages, 3);
        assert_eq!(shown_rows(&handle.path), vec![27, 27, 6]);
    }

    #[test]
    fn test_export_overwrites_previous_artifact() {
        let dir = tempdir().unwrap();
        let exporter = DocumentExporter::new(dir.path());

        let long_text = vec!["x"; 100].join("\n");
        let first = exporter.export(&long_text).unwrap();
        let second = exporter.export("short").unwrap();

        assert_eq!(first.path, second.path);
        assert_eq!(shown_rows(&second.path), vec![1]);
    }

    #[test]
    fn test_export_creates_output_dir() {
        let dir = tempdir().unwrap();
        let exporter = DocumentExporter::new(dir.path().join("out").join("posts"))
            .with_file_name("post.pdf");

        let handle = exporter.export("hello").unwrap();
        assert!(handle.path.ends_with("out/posts/post.pdf"));
        assert!(handle.open().is_ok());
    }

    #[test]
    fn test_export_write_failure() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let exporter = DocumentExporter::new(&blocker);
        let err = exporter.export("hello").unwrap_err();
        assert!(matches!(err, DocumentWriteError::Io { .. }));
        assert!(err.to_string().contains("not-a-dir"));
    }

    #[test]
    fn test_export_non_latin_text() {
        let dir = tempdir().unwrap();
        let exporter = DocumentExporter::new(dir.path());

        let handle = exporter.export("\u{1F4DD} Blog\nna\u{ef}ve caf\u{e9}").unwrap();
        assert_eq!(handle.rows, 2);
        assert!(lopdf::Document::load(&handle.path).is_ok());
    }

    #[test]
    fn test_from_config() {
        let config = ExportConfig {
            output_dir: PathBuf::from("/tmp/blogs"),
            file_name: "draft.pdf".to_string(),
            ..Default::default()
        };
        let exporter = DocumentExporter::from_config(&config);
        assert_eq!(exporter.output_path(), PathBuf::from("/tmp/blogs/draft.pdf"));
        assert_eq!(exporter.layout().rows_per_page(), 27);
    }
}
