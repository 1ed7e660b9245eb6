use crate::error::IngestError;
use crate::models::FileType;
use lopdf::Document;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

/// Extract the full text of a supported document. Parsing is delegated to
/// format-specific libraries; the result is plain UTF-8 with paragraphs
/// separated by blank lines.
pub fn extract_text(path: &Path, file_type: FileType) -> Result<String, IngestError> {
    match file_type {
        FileType::Pdf => extract_pdf(path),
        FileType::Text => extract_txt(path),
        FileType::Docx => extract_docx(path),
    }
}

fn extract_pdf(path: &Path) -> Result<String, IngestError> {
    let document =
        Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

    let mut pages = Vec::new();
    for (page_no, _page_id) in document.get_pages() {
        let text = document
            .extract_text(&[page_no])
            .map_err(|error| IngestError::PdfParse(error.to_string()))?;

        if !text.trim().is_empty() {
            pages.push(text.trim().to_string());
        }
    }

    if pages.is_empty() {
        return Err(IngestError::PdfParse(format!(
            "pdf had no readable page text: {}",
            path.display()
        )));
    }

    Ok(pages.join("\n\n"))
}

fn extract_txt(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    String::from_utf8(bytes).map_err(|error| {
        IngestError::Encoding(format!("{} is not valid UTF-8: {error}", path.display()))
    })
}

/// DOCX files are ZIP containers; the body lives in `word/document.xml`.
/// Text runs (`w:t`) are collected per paragraph (`w:p`). docx-rs is
/// writer-only, so the container is read directly.
fn extract_docx(path: &Path) -> Result<String, IngestError> {
    let file = File::open(path)?;
    let mut archive =
        ZipArchive::new(file).map_err(|error| IngestError::DocxParse(error.to_string()))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|error| IngestError::DocxParse(error.to_string()))?
        .read_to_string(&mut xml)?;

    let paragraphs = document_xml_paragraphs(&xml)?;

    if paragraphs.is_empty() {
        return Err(IngestError::DocxParse(format!(
            "docx had no readable text: {}",
            path.display()
        )));
    }

    Ok(paragraphs.join("\n\n"))
}

fn document_xml_paragraphs(xml: &str) -> Result<Vec<String>, IngestError> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => match element.name().as_ref() {
                b"w:p" => current.clear(),
                b"w:t" => in_text_run = true,
                _ => {}
            },
            Ok(Event::Empty(element)) => match element.name().as_ref() {
                b"w:tab" => current.push('\t'),
                b"w:br" => current.push('\n'),
                _ => {}
            },
            Ok(Event::Text(text)) if in_text_run => {
                let unescaped = text
                    .unescape()
                    .map_err(|error| IngestError::DocxParse(error.to_string()))?;
                current.push_str(&unescaped);
            }
            Ok(Event::End(element)) => match element.name().as_ref() {
                b"w:t" => in_text_run = false,
                b"w:p" => {
                    if !current.trim().is_empty() {
                        paragraphs.push(current.trim().to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(error) => return Err(IngestError::DocxParse(error.to_string())),
            _ => {}
        }
    }

    Ok(paragraphs)
}
