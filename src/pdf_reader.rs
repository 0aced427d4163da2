use std::collections::BTreeMap;
use std::path::Path;

use encoding_rs::{UTF_16BE, WINDOWS_1252};
use lopdf::content::Content;
use lopdf::{Document, Object};
use tracing::debug;

use crate::error::ConvertError;
use crate::extract::split_line_into_cells;
use crate::model::StatementPage;
use crate::options::PageSelection;

fn split_text_into_pages(raw_text: &str) -> Vec<String> {
    let mut pages = raw_text
        .split('\u{000C}')
        .map(str::to_string)
        .collect::<Vec<_>>();
    if pages.last().is_some_and(String::is_empty) {
        pages.pop();
    }
    pages
}

fn looks_decoding_broken(text: &str) -> bool {
    if text.contains("?Identity-H Unimplemented?") {
        return true;
    }

    let total = text.chars().count();
    if total == 0 {
        return false;
    }

    let replacement = text.matches('\u{FFFD}').count();
    let control = text
        .chars()
        .filter(|ch| ch.is_control() && !matches!(ch, '\n' | '\r' | '\t' | '\u{000C}'))
        .count();

    replacement * 8 > total || control * 5 > total
}

fn decode_pdf_bytes(encoding: Option<&str>, bytes: &[u8]) -> String {
    let decoded = Document::decode_text(encoding, bytes);
    if !looks_decoding_broken(&decoded) {
        return decoded;
    }

    if bytes.starts_with(&[0xFE, 0xFF]) || bytes.starts_with(&[0xFF, 0xFE]) {
        let bytes = if bytes.len() > 2 { &bytes[2..] } else { bytes };
        let (utf16, had_errors) = UTF_16BE.decode_without_bom_handling(bytes);
        if !had_errors && !utf16.is_empty() {
            return utf16.into_owned();
        }
    }

    if let Some(name) = encoding {
        let lower = name.to_ascii_lowercase();
        if lower.contains("utf16")
            || lower.contains("ucs2")
            || lower.contains("identity-h")
            || lower.contains("unicode")
        {
            let (utf16, had_errors) = UTF_16BE.decode_without_bom_handling(bytes);
            if !had_errors && !utf16.is_empty() {
                return utf16.into_owned();
            }
        }
    }

    let (latin, _, _) = WINDOWS_1252.decode(bytes);
    latin.into_owned()
}

/// Prefers text with many multi-column lines that carry amounts.
fn extraction_quality_score(text: &str) -> i64 {
    if text.trim().is_empty() {
        return i64::MIN / 4;
    }

    let mut non_empty_lines = 0_i64;
    let mut multi_cell_lines = 0_i64;
    let mut amount_like_lines = 0_i64;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        non_empty_lines += 1;
        if split_line_into_cells(line).len() >= 3 {
            multi_cell_lines += 1;
        }

        let has_digit = line.chars().any(|ch| ch.is_ascii_digit());
        if has_digit && (line.contains('.') || line.contains(',')) {
            amount_like_lines += 1;
        }
    }

    let broken_penalty = if looks_decoding_broken(text) { 800 } else { 0 };
    multi_cell_lines * 50 + amount_like_lines * 15 + non_empty_lines - broken_penalty
}

fn choose_best_text(candidates: &[String]) -> Option<String> {
    candidates
        .iter()
        .max_by_key(|text| extraction_quality_score(text))
        .cloned()
}

fn extract_text_from_page_content(document: &Document, page_id: lopdf::ObjectId) -> Option<String> {
    fn collect_text(text: &mut String, encoding: Option<&str>, operands: &[Object]) {
        for operand in operands {
            match operand {
                Object::String(bytes, _) => {
                    text.push_str(&decode_pdf_bytes(encoding, bytes));
                }
                Object::Array(items) => {
                    collect_text(text, encoding, items);
                }
                Object::Integer(value) => {
                    if *value < -100 {
                        text.push(' ');
                    }
                }
                _ => {}
            }
        }
    }

    let raw_content = document.get_page_content(page_id).ok()?;
    let content = Content::decode(&raw_content).ok()?;
    let encodings = document
        .get_page_fonts(page_id)
        .into_iter()
        .map(|(name, font)| (name, font.get_font_encoding()))
        .collect::<BTreeMap<Vec<u8>, &str>>();

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_encoding = None;
    for operation in content.operations {
        match operation.operator.as_str() {
            "Tf" => {
                if let Some(font_name) = operation
                    .operands
                    .first()
                    .and_then(|operand| operand.as_name().ok())
                {
                    current_encoding = encodings.get(font_name).copied();
                }
            }
            "Tj" | "TJ" | "'" | "\"" => {
                collect_text(&mut current, current_encoding, &operation.operands);
            }
            "T*" | "Td" | "TD" | "ET" => {
                if !current.trim().is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
            }
            _ => {}
        }
    }

    if !current.trim().is_empty() {
        lines.push(current);
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn collect_pages(
    document: &Document,
    whole_text: Option<String>,
    page_selection: Option<&PageSelection>,
    max_pages: usize,
) -> Result<Vec<StatementPage>, ConvertError> {
    let pages_map = document.get_pages();
    if pages_map.len() > max_pages {
        return Err(ConvertError::CeilingExceeded {
            resource: "page",
            limit: max_pages,
            actual: pages_map.len(),
        });
    }

    let per_page_text = whole_text
        .map(|text| split_text_into_pages(&text))
        .filter(|pages| pages.len() == pages_map.len());

    let mut pages = Vec::new();
    for (index, (page_no, page_id)) in pages_map.iter().enumerate() {
        if page_selection.is_some_and(|selection| !selection.contains(*page_no)) {
            continue;
        }

        let mut candidates = Vec::new();
        if let Some(text) = per_page_text
            .as_ref()
            .and_then(|texts| texts.get(index).cloned())
            .filter(|text| !text.trim().is_empty())
        {
            candidates.push(text);
        }
        if let Some(text) = extract_text_from_page_content(document, *page_id) {
            candidates.push(text);
        }
        if let Some(text) = document
            .extract_text(&[*page_no])
            .ok()
            .filter(|text| !text.trim().is_empty())
        {
            candidates.push(text);
        }

        let page = match choose_best_text(&candidates) {
            Some(text) if looks_decoding_broken(&text) => {
                StatementPage::undecodable(*page_no, "text layer uses an unsupported encoding")
            }
            Some(text) => StatementPage::text(*page_no, text),
            None => StatementPage::undecodable(*page_no, "page has no extractable text layer"),
        };
        debug!(page = *page_no, candidates = candidates.len(), "read PDF page");
        pages.push(page);
    }

    if pages.is_empty() {
        return Err(ConvertError::NoPagesSelected);
    }

    Ok(pages)
}

pub(crate) fn read_pdf_pages(
    input_pdf: &Path,
    page_selection: Option<&PageSelection>,
    max_pages: usize,
) -> Result<Vec<StatementPage>, ConvertError> {
    let document = Document::load(input_pdf)?;
    let whole_text = pdf_extract::extract_text(input_pdf).ok();
    collect_pages(&document, whole_text, page_selection, max_pages)
}

pub(crate) fn read_pdf_pages_from_bytes(
    input_pdf: &[u8],
    page_selection: Option<&PageSelection>,
    max_pages: usize,
) -> Result<Vec<StatementPage>, ConvertError> {
    let document = Document::load_mem(input_pdf)?;
    let whole_text = pdf_extract::extract_text_from_mem(input_pdf).ok();
    collect_pages(&document, whole_text, page_selection, max_pages)
}
