//! PDF table extraction via `lopdf`.
//!
//! Text is read page by page. A line is tabular when it splits into at least
//! two cells on tabs or runs of two or more spaces; a maximal run of at least
//! two tabular lines on one page is a table region.

use std::sync::LazyLock;

use budgetlens_shared::{BudgetLensError, Result};
use lopdf::Document;
use regex::Regex;

use crate::grid::ExtractionGrid;

static CELL_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\t+|\s{2,}").expect("valid regex"));

/// Minimum number of consecutive tabular lines that form a table.
const MIN_TABLE_ROWS: usize = 2;

/// Load a PDF and return one grid per detected table region, in page order.
pub fn extract_tables(bytes: &[u8]) -> Result<Vec<ExtractionGrid>> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| BudgetLensError::extraction(format!("failed to load PDF: {e}")))?;

    let mut tables = Vec::new();
    for (page_num, _) in doc.get_pages() {
        match doc.extract_text(&[page_num]) {
            Ok(text) => tables.extend(detect_tables(&text)),
            Err(e) => tracing::warn!(page = page_num, error = %e, "failed to read PDF page text"),
        }
    }

    tracing::debug!(tables = tables.len(), "PDF table regions detected");
    Ok(tables)
}

/// Split raw page text into table regions.
pub fn detect_tables(page_text: &str) -> Vec<ExtractionGrid> {
    let mut tables = Vec::new();
    let mut current: Vec<Vec<String>> = Vec::new();

    for line in page_text.lines() {
        match split_cells(line) {
            Some(cells) => current.push(cells),
            None => flush(&mut current, &mut tables),
        }
    }
    flush(&mut current, &mut tables);
    tables
}

fn flush(current: &mut Vec<Vec<String>>, tables: &mut Vec<ExtractionGrid>) {
    if current.len() >= MIN_TABLE_ROWS {
        tables.push(ExtractionGrid::new(std::mem::take(current)));
    } else {
        current.clear();
    }
}

fn split_cells(line: &str) -> Option<Vec<String>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let cells: Vec<String> = CELL_BREAK
        .split(line)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    (cells.len() >= 2).then_some(cells)
}

#[cfg(test)]
pub(crate) mod tests {
    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};

    use super::*;

    /// A one-page PDF with each entry of `lines` in its own text object.
    pub(crate) fn pdf(lines: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut operations = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            let y = 780 - 14 * idx as i64;
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), Object::Integer(10)]));
            operations.push(Operation::new("Td", vec![Object::Integer(40), Object::Integer(y)]));
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations }.encode().expect("encode content");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => Object::Integer(1),
                "Resources" => resources_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(595),
                    Object::Integer(842),
                ],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("save pdf");
        bytes
    }

    #[test]
    fn tables_are_read_from_pdf_pages() {
        let bytes = pdf(&[
            "UBND TINH LAO CAI",
            "1   Chi su nghiep giao duc   1.200",
            "2   Chi su nghiep y te   850",
            "Ghi chu",
        ]);
        let tables = extract_tables(&bytes).expect("pdf loads");
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows().len(), 2);
        assert_eq!(tables[0].rows()[1], vec!["2", "Chi su nghiep y te", "850"]);
    }

    #[test]
    fn pdf_without_tabular_lines_has_no_tables() {
        let bytes = pdf(&["BAO CAO", "Ghi chu mot dong"]);
        assert!(extract_tables(&bytes).expect("pdf loads").is_empty());
    }

    #[test]
    fn detects_separate_regions() {
        let text = "UBND TỈNH LÀO CAI\n\
                    1   Chi sự nghiệp giáo dục   1.200\n\
                    2\tChi sự nghiệp y tế\t850\n\
                    Ghi chú một dòng duy nhất\n\
                    a   Chi hỗ trợ\n\
                    b   Chi khác\n\
                    c   Chi dự phòng\n";
        let tables = detect_tables(text);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].rows()[1], vec!["2", "Chi sự nghiệp y tế", "850"]);
        assert_eq!(tables[1].rows().len(), 3);
    }

    #[test]
    fn single_tabular_line_is_not_a_table() {
        let text = "Tiêu đề\n1   Chi thường xuyên\nKết thúc\n";
        assert!(detect_tables(text).is_empty());
    }

    #[test]
    fn invalid_pdf_is_extraction_error() {
        let err = extract_tables(b"not a pdf").unwrap_err();
        assert!(matches!(err, BudgetLensError::Extraction { .. }));
    }
}
