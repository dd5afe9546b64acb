//! Raw text extraction for PDF, DOCX, plain text, and images.
//!
//! Each format is a black box returning raw UTF-8 text; normalization and
//! chunking happen downstream. Extraction never panics on bad input: a
//! corrupt or unsupported file becomes an [`ExtractError`] and the pipeline
//! marks the document failed.

use std::io::Read;
use std::path::Path;
use std::process::Command;

use thiserror::Error;

use crate::config::ExtractionConfig;
use crate::models::FileDescriptor;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Marker placed before DOCX table rows in the extracted text.
pub const TABLES_MARKER: &str = "--- Tables ---";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("DOCX extraction failed: {0}")]
    Ooxml(String),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// How a file's text was obtained, recorded in extraction logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    Pdf,
    Docx,
    Text,
    Ocr,
}

impl ExtractionMethod {
    pub fn for_extension(extension: &str) -> Option<Self> {
        match extension {
            "pdf" => Some(ExtractionMethod::Pdf),
            "docx" => Some(ExtractionMethod::Docx),
            "txt" => Some(ExtractionMethod::Text),
            "png" | "jpg" | "jpeg" => Some(ExtractionMethod::Ocr),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Pdf => "pdf",
            ExtractionMethod::Docx => "docx",
            ExtractionMethod::Text => "txt",
            ExtractionMethod::Ocr => "ocr",
        }
    }
}

/// Extract raw text from a discovered file, dispatching on its extension.
pub fn extract_file(
    file: &FileDescriptor,
    options: &ExtractionConfig,
) -> Result<String, ExtractError> {
    let method = ExtractionMethod::for_extension(&file.extension)
        .ok_or_else(|| ExtractError::UnsupportedType(file.extension.clone()))?;

    match method {
        ExtractionMethod::Ocr => extract_image(&file.path, options),
        _ => {
            let bytes = std::fs::read(&file.path).map_err(|source| ExtractError::Io {
                path: file.path.display().to_string(),
                source,
            })?;
            extract_bytes(&bytes, method)
        }
    }
}

/// Extract text from in-memory content. OCR needs a file on disk and is
/// rejected here.
pub fn extract_bytes(bytes: &[u8], method: ExtractionMethod) -> Result<String, ExtractError> {
    match method {
        ExtractionMethod::Pdf => extract_pdf(bytes),
        ExtractionMethod::Docx => extract_docx(bytes),
        ExtractionMethod::Text => Ok(decode_text(bytes)),
        ExtractionMethod::Ocr => Err(ExtractError::UnsupportedType(
            "image content without a file path".to_string(),
        )),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    // pdf-extract panics on some malformed inputs instead of erroring.
    let outcome = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes));
    match outcome {
        Ok(Ok(text)) => {
            if text.trim().is_empty() {
                tracing::warn!("PDF contains no extractable text");
            }
            Ok(text)
        }
        Ok(Err(e)) => Err(ExtractError::Pdf(e.to_string())),
        Err(_) => Err(ExtractError::Pdf("parser panicked on malformed input".to_string())),
    }
}

/// UTF-8 with an optional BOM, otherwise Latin-1 (every byte maps to a char).
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            tracing::debug!("text is not valid UTF-8, decoding as Latin-1");
            bytes.iter().map(|&b| b as char).collect()
        }
    }
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
    let body = parse_document_xml(&xml)?;

    let mut sections = Vec::new();
    if !body.paragraphs.is_empty() {
        sections.push(body.paragraphs.join("\n"));
    }
    if !body.table_rows.is_empty() {
        sections.push(TABLES_MARKER.to_string());
        sections.push(body.table_rows.join("\n"));
    }
    Ok(sections.join("\n\n"))
}

#[derive(Debug, Default)]
struct DocxBody {
    paragraphs: Vec<String>,
    table_rows: Vec<String>,
}

/// Walk `word/document.xml`: top-level paragraphs go to `paragraphs`,
/// table rows become `" | "`-joined lines of their non-empty cells.
fn parse_document_xml(xml: &[u8]) -> Result<DocxBody, ExtractError> {
    use quick_xml::events::Event;

    let mut body = DocxBody::default();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut table_depth = 0usize;
    let mut in_text = false;
    let mut para = String::new();
    let mut cell = String::new();
    let mut row: Vec<String> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"tbl" => table_depth += 1,
                b"tr" => row.clear(),
                b"tc" => cell.clear(),
                b"p" => para.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if matches!(e.local_name().as_ref(), b"tab" | b"br") {
                    para.push(' ');
                }
            }
            Ok(Event::Text(te)) if in_text => {
                para.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let text = para.trim();
                    if !text.is_empty() {
                        if table_depth == 0 {
                            body.paragraphs.push(text.to_string());
                        } else {
                            if !cell.is_empty() {
                                cell.push(' ');
                            }
                            cell.push_str(text);
                        }
                    }
                    para.clear();
                }
                b"tc" => {
                    let text = cell.trim();
                    if !text.is_empty() {
                        row.push(text.to_string());
                    }
                    cell.clear();
                }
                b"tr" => {
                    if !row.is_empty() {
                        body.table_rows.push(row.join(" | "));
                    }
                    row.clear();
                }
                b"tbl" => table_depth = table_depth.saturating_sub(1),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(body)
}

/// OCR an image with the configured command (tesseract-compatible CLI).
fn extract_image(path: &Path, options: &ExtractionConfig) -> Result<String, ExtractError> {
    let output = Command::new(&options.ocr_command)
        .arg(path)
        .arg("stdout")
        .args(["-l", &options.ocr_languages, "--psm", "6"])
        .output()
        .map_err(|e| ExtractError::Ocr(format!("could not run '{}': {}", options.ocr_command, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ExtractError::Ocr(format!(
            "'{}' exited with {}: {}",
            options.ocr_command,
            output.status,
            stderr.trim()
        )));
    }

    let text = String::from_utf8_lossy(&output.stdout).into_owned();
    if text.trim().is_empty() {
        tracing::warn!(path = %path.display(), "no text found in image");
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_with_body(body_xml: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            let xml = format!(
                "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
                body_xml
            );
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn unsupported_extension_returns_error() {
        assert!(ExtractionMethod::for_extension("exe").is_none());
        let file = FileDescriptor {
            path: "/tmp/x.exe".into(),
            name: "x.exe".to_string(),
            size: 1,
            extension: "exe".to_string(),
            readable: true,
            mime_type: "application/octet-stream".to_string(),
            modified_at: chrono::Utc::now(),
        };
        let err = extract_file(&file, &ExtractionConfig::default()).unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedType(_)));
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_bytes(b"not a pdf", ExtractionMethod::Pdf).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn invalid_zip_returns_error_for_docx() {
        let err = extract_bytes(b"not a zip", ExtractionMethod::Docx).unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }

    #[test]
    fn docx_paragraphs_are_line_separated() {
        let bytes = docx_with_body(
            "<w:p><w:r><w:t>First</w:t></w:r><w:r><w:t xml:space=\"preserve\"> line</w:t></w:r></w:p>\
             <w:p><w:r><w:t>   </w:t></w:r></w:p>\
             <w:p><w:r><w:t>Second line</w:t></w:r></w:p>",
        );
        let text = extract_bytes(&bytes, ExtractionMethod::Docx).unwrap();
        assert_eq!(text, "First line\nSecond line");
    }

    #[test]
    fn docx_tables_follow_paragraphs() {
        let bytes = docx_with_body(
            "<w:p><w:r><w:t>Intro</w:t></w:r></w:p>\
             <w:tbl>\
               <w:tr><w:tc><w:p><w:r><w:t>Name</w:t></w:r></w:p></w:tc>\
                     <w:tc><w:p><w:r><w:t>Total</w:t></w:r></w:p></w:tc></w:tr>\
               <w:tr><w:tc><w:p><w:r><w:t>Q1</w:t></w:r></w:p></w:tc>\
                     <w:tc><w:p/></w:tc>\
                     <w:tc><w:p><w:r><w:t>42</w:t></w:r></w:p></w:tc></w:tr>\
             </w:tbl>",
        );
        let text = extract_bytes(&bytes, ExtractionMethod::Docx).unwrap();
        assert_eq!(
            text,
            format!("Intro\n\n{}\n\nName | Total\nQ1 | 42", TABLES_MARKER)
        );
    }

    #[test]
    fn decode_text_strips_bom_and_falls_back_to_latin1() {
        assert_eq!(decode_text(b"\xEF\xBB\xBFhello"), "hello");
        assert_eq!(decode_text("καλημέρα".as_bytes()), "καλημέρα");
        assert_eq!(decode_text(b"caf\xE9"), "café");
    }

    #[test]
    fn missing_ocr_binary_is_an_ocr_error() {
        let options = ExtractionConfig {
            ocr_command: "/nonexistent/ocr-binary".to_string(),
            ocr_languages: "eng".to_string(),
        };
        let err = extract_image(Path::new("/tmp/scan.png"), &options).unwrap_err();
        assert!(matches!(err, ExtractError::Ocr(_)));
    }
}
