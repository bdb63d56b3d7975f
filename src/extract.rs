//! Format-specific loaders that turn a file on disk into text segments.
//!
//! The format is resolved once from the file extension into a
//! [`DocumentFormat`]; each supported variant has a [`Loader`] with a single
//! `extract` method. Loaders are synchronous and CPU/IO bound, so the
//! ingestion pipeline runs them on the blocking pool.

use std::io::Read;
use std::path::Path;

use crate::error::{DocentError, Result};
use crate::models::ContentSegment;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Supported document formats, keyed by extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Text,
    Docx,
    Unsupported(String),
}

impl DocumentFormat {
    /// Resolve the format from a path's extension (case-insensitive).
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => DocumentFormat::Pdf,
            "txt" => DocumentFormat::Text,
            "docx" => DocumentFormat::Docx,
            _ => DocumentFormat::Unsupported(ext),
        }
    }

    /// The loader for this format, or `UnsupportedFormat`.
    pub fn loader(&self, path: &Path) -> Result<Box<dyn Loader>> {
        match self {
            DocumentFormat::Pdf => Ok(Box::new(PdfLoader)),
            DocumentFormat::Text => Ok(Box::new(TextLoader)),
            DocumentFormat::Docx => Ok(Box::new(DocxLoader)),
            DocumentFormat::Unsupported(ext) => Err(DocentError::UnsupportedFormat {
                extension: ext.clone(),
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Extracts one or more content segments from a file.
pub trait Loader: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Vec<ContentSegment>>;
}

/// Resolve the loader for `path` and extract it.
pub fn load_file(path: &Path) -> Result<Vec<ContentSegment>> {
    DocumentFormat::from_path(path).loader(path)?.extract(path)
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| DocentError::extraction(path, e))
}

/// One segment per page, each tagged with its 1-based page number.
pub struct PdfLoader;

impl Loader for PdfLoader {
    fn extract(&self, path: &Path) -> Result<Vec<ContentSegment>> {
        let bytes = read_bytes(path)?;
        let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
            .map_err(|e| DocentError::extraction(path, format!("PDF: {}", e)))?;
        Ok(pages
            .into_iter()
            .enumerate()
            .map(|(i, text)| ContentSegment::with_page(text, i as u32 + 1))
            .collect())
    }
}

/// The whole file as a single segment; invalid UTF-8 is replaced.
pub struct TextLoader;

impl Loader for TextLoader {
    fn extract(&self, path: &Path) -> Result<Vec<ContentSegment>> {
        let bytes = read_bytes(path)?;
        Ok(vec![ContentSegment::new(
            String::from_utf8_lossy(&bytes).into_owned(),
        )])
    }
}

/// Text runs of `word/document.xml`, one line per paragraph.
pub struct DocxLoader;

impl Loader for DocxLoader {
    fn extract(&self, path: &Path) -> Result<Vec<ContentSegment>> {
        let bytes = read_bytes(path)?;
        let text = extract_docx(&bytes).map_err(|e| DocentError::extraction(path, e))?;
        Ok(vec![ContentSegment::new(text)])
    }
}

fn extract_docx(bytes: &[u8]) -> std::result::Result<String, String> {
    let mut archive =
        zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| "word/document.xml not found".to_string())?;

    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| e.to_string())?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err("word/document.xml exceeds size limit".to_string());
    }

    extract_paragraph_text(&doc_xml)
}

fn extract_paragraph_text(xml: &[u8]) -> std::result::Result<String, String> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file(
                "word/document.xml",
                zip::write::SimpleFileOptions::default(),
            )
            .unwrap();
            let body: String = paragraphs
                .iter()
                .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
                .collect();
            let xml = format!(
                "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
                body
            );
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(DocumentFormat::from_path(Path::new("a.pdf")), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::from_path(Path::new("A.PDF")), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::from_path(Path::new("b.txt")), DocumentFormat::Text);
        assert_eq!(DocumentFormat::from_path(Path::new("c.docx")), DocumentFormat::Docx);
        assert_eq!(
            DocumentFormat::from_path(Path::new("d.xlsx")),
            DocumentFormat::Unsupported("xlsx".to_string())
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("README")),
            DocumentFormat::Unsupported(String::new())
        );
    }

    #[test]
    fn unsupported_format_has_no_loader() {
        let err = load_file(Path::new("/tmp/sheet.xlsx")).unwrap_err();
        assert!(matches!(err, DocentError::UnsupportedFormat { .. }));
    }

    #[test]
    fn text_loader_reads_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "line one\n\nline two").unwrap();
        let segments = load_file(&path).unwrap();
        assert_eq!(segments, vec![ContentSegment::new("line one\n\nline two")]);
    }

    #[test]
    fn docx_paragraphs_become_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memo.docx");
        std::fs::write(&path, docx_bytes(&["First paragraph", "Second &amp; last"])).unwrap();
        let segments = load_file(&path).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "First paragraph\nSecond & last");
    }

    #[test]
    fn corrupt_pdf_is_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();
        let err = load_file(&path).unwrap_err();
        assert!(matches!(err, DocentError::Extraction { .. }));
    }

    #[test]
    fn docx_without_document_xml_fails() {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file("other.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"<x/>").unwrap();
            zip.finish().unwrap();
        }
        let err = extract_docx(&buf).unwrap_err();
        assert!(err.contains("word/document.xml"));
    }
}
