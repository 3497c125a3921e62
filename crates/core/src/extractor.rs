use crate::error::IngestError;
use crate::models::DocumentFormat;
use calamine::Reader;
use lopdf::Document;
use std::io::Cursor;

/// Extracts a single plain-text blob from an uploaded file.
///
/// Extraction is best effort: the contract is a readable text rendition,
/// not byte-exact fidelity. Corrupt or structurally unreadable input maps
/// to [`IngestError::ExtractionFailed`]; input that parses but contains
/// no text comes back as an empty string so the caller can classify it
/// as empty content.
pub fn extract(bytes: &[u8], format: DocumentFormat) -> Result<String, IngestError> {
    match format {
        DocumentFormat::Pdf => extract_pdf(bytes),
        DocumentFormat::Spreadsheet => extract_spreadsheet(bytes),
        DocumentFormat::Csv => extract_csv(bytes),
    }
}

fn extraction_failed(format: DocumentFormat, details: impl ToString) -> IngestError {
    IngestError::ExtractionFailed {
        format: format.label().to_string(),
        details: details.to_string(),
    }
}

/// Per-page text, pages joined with a paragraph separator.
fn extract_pdf(bytes: &[u8]) -> Result<String, IngestError> {
    let document =
        Document::load_mem(bytes).map_err(|error| extraction_failed(DocumentFormat::Pdf, error))?;

    let mut pages = Vec::new();
    for (page_no, _page_id) in document.get_pages() {
        let text = document
            .extract_text(&[page_no])
            .map_err(|error| extraction_failed(DocumentFormat::Pdf, error))?;

        if !text.trim().is_empty() {
            pages.push(text.trim().to_string());
        }
    }

    Ok(pages.join("\n\n"))
}

/// Every sheet rendered as a labeled block, blocks separated by a blank
/// line so sheet boundaries survive as paragraph boundaries.
fn extract_spreadsheet(bytes: &[u8]) -> Result<String, IngestError> {
    let cursor = Cursor::new(bytes);
    let mut workbook = calamine::open_workbook_auto_from_rs(cursor)
        .map_err(|error| extraction_failed(DocumentFormat::Spreadsheet, error))?;

    let mut blocks = Vec::new();
    for sheet_name in workbook.sheet_names().to_vec() {
        let range = match workbook.worksheet_range(&sheet_name) {
            Ok(range) => range,
            Err(error) => return Err(extraction_failed(DocumentFormat::Spreadsheet, error)),
        };

        let mut block = format!("---Sheet: {sheet_name}---\n");
        for row in range.rows() {
            let cells: Vec<String> = row.iter().map(render_cell).collect();
            if cells.iter().all(|cell| cell.is_empty()) {
                continue;
            }
            block.push_str(&cells.join(" | "));
            block.push('\n');
        }
        blocks.push(block);
    }

    Ok(blocks.join("\n\n"))
}

fn render_cell(cell: &calamine::Data) -> String {
    match cell {
        calamine::Data::Empty => String::new(),
        calamine::Data::String(value) => value.clone(),
        calamine::Data::Float(value) => value.to_string(),
        calamine::Data::Int(value) => value.to_string(),
        calamine::Data::Bool(value) => value.to_string(),
        calamine::Data::DateTime(value) => value.to_string(),
        other => other.to_string(),
    }
}

/// The whole table as one text block, header first.
fn extract_csv(bytes: &[u8]) -> Result<String, IngestError> {
    let mut reader = csv::Reader::from_reader(bytes);
    let mut content = String::new();

    let headers = reader
        .headers()
        .map_err(|error| extraction_failed(DocumentFormat::Csv, error))?;
    if !headers.is_empty() {
        content.push_str(&headers.iter().collect::<Vec<_>>().join(" | "));
        content.push('\n');
    }

    for record in reader.records() {
        let record = record.map_err(|error| extraction_failed(DocumentFormat::Csv, error))?;
        content.push_str(&record.iter().collect::<Vec<_>>().join(" | "));
        content.push('\n');
    }

    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_renders_header_and_rows_as_one_block() {
        let bytes = b"department,amount\nHealth,4500000\nEducation,1200000\n";
        let text = extract(bytes, DocumentFormat::Csv).expect("csv should extract");

        assert!(text.starts_with("department | amount\n"));
        assert!(text.contains("Health | 4500000"));
        assert!(text.contains("Education | 1200000"));
    }

    #[test]
    fn corrupt_pdf_is_reported_as_extraction_failure() {
        let result = extract(b"%PDF-1.4\n%broken", DocumentFormat::Pdf);
        assert!(matches!(
            result,
            Err(IngestError::ExtractionFailed { ref format, .. }) if format == "pdf"
        ));
    }

    #[test]
    fn corrupt_spreadsheet_is_reported_as_extraction_failure() {
        let result = extract(b"not a workbook at all", DocumentFormat::Spreadsheet);
        assert!(matches!(
            result,
            Err(IngestError::ExtractionFailed { ref format, .. }) if format == "spreadsheet"
        ));
    }
}
