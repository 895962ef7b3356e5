//! Text extraction for uploaded files.
//!
//! [`FileExtractor`] is the default [`TextExtractor`]: it turns the bytes of
//! a PDF, an OOXML document (docx, pptx, xlsx) or a plain-text file into a
//! UTF-8 string. Anything else is reported as unsupported and the document
//! is degraded by the pipeline.

use std::io::{Cursor, Read};
use std::path::Path;

use antiplag_core::collaborators::{CollabResult, CollaboratorError, TextExtractor};
use quick_xml::events::Event;
use thiserror::Error;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_PPTX: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";

const XLSX_MAX_SHEETS: usize = 100;
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Cap on decompressed bytes read from one archive member.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported content-type: {0}")]
    UnsupportedContentType(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
    #[error("text is not valid UTF-8")]
    Encoding,
}

impl From<ExtractError> for CollaboratorError {
    fn from(err: ExtractError) -> Self {
        CollaboratorError::Unsupported(err.to_string())
    }
}

/// Guesses a MIME type from a file extension. Used by the CLI and for
/// multipart parts that arrive without a content type.
pub fn content_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(MIME_PDF),
        "docx" => Some(MIME_DOCX),
        "pptx" => Some(MIME_PPTX),
        "xlsx" => Some(MIME_XLSX),
        "txt" | "text" => Some(MIME_TEXT),
        "md" | "markdown" => Some(MIME_MARKDOWN),
        _ => None,
    }
}

/// Extracts plain text from `bytes` interpreted as `content_type`.
///
/// Parameters after `;` (e.g. `charset=utf-8`) are ignored.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String, ExtractError> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        MIME_PDF => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ExtractError::Pdf(e.to_string())),
        MIME_DOCX => {
            let mut pkg = Package::open(bytes)?;
            let xml = pkg.read("word/document.xml")?;
            collect_text_runs(&xml, " ")
        }
        MIME_PPTX => extract_pptx(bytes),
        MIME_XLSX => extract_xlsx(bytes),
        MIME_TEXT | MIME_MARKDOWN => std::str::from_utf8(bytes)
            .map(|s| s.trim_start_matches('\u{feff}').to_string())
            .map_err(|_| ExtractError::Encoding),
        _ => Err(ExtractError::UnsupportedContentType(content_type.to_string())),
    }
}

/// Default [`TextExtractor`] backed by [`extract_text`].
#[derive(Debug, Default, Clone, Copy)]
pub struct FileExtractor;

impl TextExtractor for FileExtractor {
    fn extract_text(&self, data: &[u8], content_type: &str) -> CollabResult<String> {
        Ok(extract_text(data, content_type)?)
    }
}

/// An OOXML package (a zip archive of XML parts).
struct Package<'a> {
    archive: zip::ZipArchive<Cursor<&'a [u8]>>,
}

impl<'a> Package<'a> {
    fn open(bytes: &'a [u8]) -> Result<Self, ExtractError> {
        let archive =
            zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::Ooxml(e.to_string()))?;
        Ok(Self { archive })
    }

    fn read(&mut self, name: &str) -> Result<Vec<u8>, ExtractError> {
        let entry = self
            .archive
            .by_name(name)
            .map_err(|e| ExtractError::Ooxml(format!("{}: {}", name, e)))?;
        let mut out = Vec::new();
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut out)
            .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
        if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
            return Err(ExtractError::Ooxml(format!(
                "{} exceeds size limit ({} bytes)",
                name, MAX_XML_ENTRY_BYTES
            )));
        }
        Ok(out)
    }

    /// Members named `{prefix}{n}.xml`, ordered by `n`.
    fn numbered_parts(&self, prefix: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .archive
            .file_names()
            .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
            .map(str::to_string)
            .collect();
        names.sort_by_key(|name| {
            name[prefix.len()..]
                .trim_end_matches(".xml")
                .parse::<u32>()
                .unwrap_or(u32::MAX)
        });
        names
    }
}

/// Concatenates the text of every `<*:t>` element, separated by `sep`.
fn collect_text_runs(xml: &[u8], sep: &str) -> Result<String, ExtractError> {
    let mut runs: Vec<String> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_t = true,
            Ok(Event::End(e)) if e.local_name().as_ref() == b"t" => in_t = false,
            Ok(Event::Text(te)) if in_t => {
                let text = te.unescape().map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                if !text.is_empty() {
                    runs.push(text.into_owned());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(runs.join(sep))
}

fn extract_pptx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut pkg = Package::open(bytes)?;
    let mut slides = Vec::new();
    for name in pkg.numbered_parts("ppt/slides/slide") {
        let text = collect_text_runs(&pkg.read(&name)?, " ")?;
        if !text.is_empty() {
            slides.push(text);
        }
    }
    Ok(slides.join("\n"))
}

fn extract_xlsx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut pkg = Package::open(bytes)?;
    let shared = shared_strings(&pkg.read("xl/sharedStrings.xml")?)?;
    let mut sheets = Vec::new();
    for name in pkg
        .numbered_parts("xl/worksheets/sheet")
        .into_iter()
        .take(XLSX_MAX_SHEETS)
    {
        let cells = sheet_cells(&pkg.read(&name)?, &shared)?;
        if !cells.is_empty() {
            sheets.push(cells.join(" "));
        }
    }
    Ok(sheets.join("\n"))
}

/// One entry per `<si>`, concatenating its rich-text runs.
fn shared_strings(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_t = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"si" => strings.extend(current.take()),
                b"t" => in_t = false,
                _ => {}
            },
            Ok(Event::Text(te)) if in_t => {
                if let Some(s) = current.as_mut() {
                    let text = te.unescape().map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                    s.push_str(&text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Shared-string cells of one worksheet, in document order.
fn sheet_cells(xml: &[u8], shared: &[String]) -> Result<Vec<String>, ExtractError> {
    let mut cells = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut shared_cell = false;
    let mut in_v = false;
    while cells.len() < XLSX_MAX_CELLS_PER_SHEET {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"c" => {
                    shared_cell = e.attributes().flatten().any(|a| {
                        a.key.as_ref() == b"t" && a.value.as_ref() == b"s"
                    })
                }
                b"v" => in_v = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"c" => shared_cell = false,
                b"v" => in_v = false,
                _ => {}
            },
            Ok(Event::Text(te)) if in_v && shared_cell => {
                let raw = te.unescape().map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                if let Some(s) = raw.trim().parse::<usize>().ok().and_then(|i| shared.get(i)) {
                    cells.push(s.clone());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zip_with(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let opts = zip::write::SimpleFileOptions::default();
            for (name, body) in parts {
                zip.start_file(*name, opts).unwrap();
                zip.write_all(body.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn unsupported_content_type_returns_error() {
        let err = extract_text(b"foo", "application/octet-stream").unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedContentType(_)));
    }

    #[test]
    fn unsupported_maps_to_collaborator_unsupported() {
        let err = FileExtractor.extract_text(b"foo", "image/png").unwrap_err();
        assert!(matches!(err, CollaboratorError::Unsupported(_)));
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_text(b"not a pdf", MIME_PDF).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn invalid_zip_returns_error_for_docx() {
        let err = extract_text(b"not a zip", MIME_DOCX).unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }

    #[test]
    fn plain_text_with_charset_parameter() {
        let text = extract_text("Dobrý deň".as_bytes(), "text/plain; charset=utf-8").unwrap();
        assert_eq!(text, "Dobrý deň");
    }

    #[test]
    fn plain_text_rejects_invalid_utf8() {
        let err = extract_text(&[0xff, 0xfe, 0x00], MIME_TEXT).unwrap_err();
        assert!(matches!(err, ExtractError::Encoding));
    }

    #[test]
    fn docx_text_runs_are_joined() {
        let bytes = zip_with(&[(
            "word/document.xml",
            r#"<w:document xmlns:w="x"><w:body><w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t>world</w:t></w:r></w:p></w:body></w:document>"#,
        )]);
        assert_eq!(extract_text(&bytes, MIME_DOCX).unwrap(), "Hello world");
    }

    #[test]
    fn pptx_slides_are_numerically_ordered() {
        let bytes = zip_with(&[
            ("ppt/slides/slide10.xml", r#"<p:sld xmlns:a="x"><a:t>ten</a:t></p:sld>"#),
            ("ppt/slides/slide2.xml", r#"<p:sld xmlns:a="x"><a:t>two</a:t></p:sld>"#),
        ]);
        assert_eq!(extract_text(&bytes, MIME_PPTX).unwrap(), "two\nten");
    }

    #[test]
    fn xlsx_reads_shared_string_cells() {
        let bytes = zip_with(&[
            ("xl/sharedStrings.xml", r#"<sst><si><t>alpha</t></si><si><t>beta</t></si></sst>"#),
            (
                "xl/worksheets/sheet1.xml",
                r#"<worksheet><sheetData><row><c t="s"><v>1</v></c><c><v>42</v></c><c t="s"><v>0</v></c></row></sheetData></worksheet>"#,
            ),
        ]);
        assert_eq!(extract_text(&bytes, MIME_XLSX).unwrap(), "beta alpha");
    }

    #[test]
    fn content_type_from_extension() {
        assert_eq!(content_type_for_path(Path::new("a/B.PDF")), Some(MIME_PDF));
        assert_eq!(content_type_for_path(Path::new("notes.txt")), Some(MIME_TEXT));
        assert_eq!(content_type_for_path(Path::new("image.png")), None);
        assert_eq!(content_type_for_path(Path::new("README")), None);
    }
}
