//! Extraction of candidate budget items from uploaded documents.
//!
//! Flow per file: format dispatch → grids (one per sheet, table region, or
//! image) → column selection per grid. Filtering happens afterwards over the
//! pooled items with [`TextFilter`].
//!
//! Extraction never fails as a whole: a file, sheet or table that cannot be
//! read yields an error string and no items, and the rest of the batch
//! continues.

pub mod column;
pub mod filter;
pub mod grid;
pub mod ocr;
pub mod spreadsheet;
pub mod table_doc;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

use std::sync::Arc;

use budgetlens_shared::{Item, SourceFormat};
use serde::Serialize;

pub use column::{best_column, is_valid_text, select_column};
pub use filter::TextFilter;
pub use grid::{ExtractionGrid, find_task_column};
pub use ocr::{TesseractOcr, TextRecognizer};
pub use spreadsheet::{Sheet, Workbook, read_sheets};

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Items plus per-unit error messages from one or more files.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionOutcome {
    pub items: Vec<Item>,
    pub errors: Vec<String>,
}

impl ExtractionOutcome {
    /// Outcome for a unit that produced nothing but one error.
    pub fn failed(file: &str, message: impl std::fmt::Display) -> Self {
        Self {
            items: Vec::new(),
            errors: vec![format!("{file}: {message}")],
        }
    }

    /// Append another outcome, keeping item and error order.
    pub fn absorb(&mut self, other: ExtractionOutcome) {
        self.items.extend(other.items);
        self.errors.extend(other.errors);
    }
}

/// Format-dispatching extractor.
#[derive(Clone)]
pub struct Extractor {
    filter: TextFilter,
    recognizer: Arc<dyn TextRecognizer>,
}

impl Extractor {
    pub fn new(filter: TextFilter, recognizer: Arc<dyn TextRecognizer>) -> Self {
        Self { filter, recognizer }
    }

    pub fn filter(&self) -> &TextFilter {
        &self.filter
    }

    /// Extract column-selected candidates from one file. Blocking.
    pub fn extract(&self, file: &SourceFile) -> ExtractionOutcome {
        let Some(format) = SourceFormat::from_filename(&file.name) else {
            return ExtractionOutcome::failed(&file.name, "unsupported file format");
        };
        tracing::debug!(file = %file.name, %format, "extracting");

        let outcome = match format {
            SourceFormat::Spreadsheet => self.extract_spreadsheet(file),
            SourceFormat::TableDocument => self.extract_table_document(file),
            SourceFormat::Image => self.extract_image(file),
        };

        tracing::info!(
            file = %file.name,
            items = outcome.items.len(),
            errors = outcome.errors.len(),
            "file extracted"
        );
        outcome
    }

    fn extract_spreadsheet(&self, file: &SourceFile) -> ExtractionOutcome {
        let workbook = match spreadsheet::extract_sheets(&file.bytes) {
            Ok(workbook) => workbook,
            Err(e) => return ExtractionOutcome::failed(&file.name, e),
        };

        let mut outcome = ExtractionOutcome::default();
        outcome.errors.extend(
            workbook
                .errors
                .into_iter()
                .map(|e| format!("{}: {e}", file.name)),
        );
        for sheet in workbook.sheets {
            let items = select_column(&sheet.grid, &self.filter);
            if items.is_empty() {
                outcome.errors.push(format!(
                    "{}: no valid texts found in sheet '{}'",
                    file.name, sheet.name
                ));
            }
            outcome.items.extend(items);
        }
        outcome
    }

    fn extract_table_document(&self, file: &SourceFile) -> ExtractionOutcome {
        let tables = match table_doc::extract_tables(&file.bytes) {
            Ok(tables) => tables,
            Err(e) => return ExtractionOutcome::failed(&file.name, e),
        };
        if tables.is_empty() {
            return ExtractionOutcome::failed(&file.name, "no tables found");
        }
        self.select_from_tables(&file.name, &tables)
    }

    fn select_from_tables(&self, file: &str, tables: &[ExtractionGrid]) -> ExtractionOutcome {
        let mut outcome = ExtractionOutcome::default();
        for (idx, table) in tables.iter().enumerate() {
            let items = select_column(table, &self.filter);
            if items.is_empty() {
                outcome
                    .errors
                    .push(format!("{file}: no valid texts found in table {}", idx + 1));
            }
            outcome.items.extend(items);
        }
        outcome
    }

    fn extract_image(&self, file: &SourceFile) -> ExtractionOutcome {
        match ocr::extract_image(&file.bytes, self.recognizer.as_ref()) {
            Ok(grid) => {
                let items = select_column(&grid, &self.filter);
                if items.is_empty() {
                    return ExtractionOutcome::failed(&file.name, "no valid texts found in image");
                }
                ExtractionOutcome {
                    items,
                    errors: Vec::new(),
                }
            }
            Err(e) => ExtractionOutcome::failed(&file.name, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use budgetlens_shared::{BudgetLensError, Result};

    use super::*;
    use crate::testing::workbook;

    struct CannedText(&'static str);

    impl TextRecognizer for CannedText {
        fn recognize(&self, _image_bytes: &[u8]) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct BrokenOcr;

    impl TextRecognizer for BrokenOcr {
        fn recognize(&self, _image_bytes: &[u8]) -> Result<String> {
            Err(BudgetLensError::extraction("tesseract not installed"))
        }
    }

    fn extractor(recognizer: impl TextRecognizer + 'static) -> Extractor {
        Extractor::new(TextFilter::default(), Arc::new(recognizer))
    }

    #[test]
    fn unsupported_format_is_per_file_error() {
        let outcome = extractor(BrokenOcr).extract(&SourceFile::new("notes.docx", vec![1, 2]));
        assert!(outcome.items.is_empty());
        assert_eq!(outcome.errors, vec!["notes.docx: unsupported file format"]);
    }

    #[test]
    fn unreadable_pdf_is_per_file_error() {
        let outcome = extractor(BrokenOcr).extract(&SourceFile::new("bang.pdf", b"junk".to_vec()));
        assert!(outcome.items.is_empty());
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].starts_with("bang.pdf: "));
    }

    #[test]
    fn image_goes_through_recognizer_and_selector() {
        let ocr = CannedText(
            "1. Chi sự nghiệp giáo dục\nvà đào tạo\n2. Chi sự nghiệp y tế\n",
        );
        let outcome = extractor(ocr).extract(&SourceFile::new("scan.PNG", vec![0]));
        assert!(outcome.errors.is_empty());
        let names: Vec<&str> = outcome.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Chi sự nghiệp giáo dục và đào tạo", "Chi sự nghiệp y tế"]
        );
    }

    #[test]
    fn ocr_failure_is_per_file_error() {
        let outcome = extractor(BrokenOcr).extract(&SourceFile::new("scan.jpg", vec![0]));
        assert!(outcome.items.is_empty());
        assert!(outcome.errors[0].contains("tesseract not installed"));
    }

    #[test]
    fn empty_table_reports_its_position() {
        let tables = vec![
            table_doc::detect_tables("1   Chi thường xuyên\n2   Chi đầu tư\n").remove(0),
            table_doc::detect_tables("1   100\n2   200\n").remove(0),
        ];
        let outcome = extractor(BrokenOcr).select_from_tables("bang.pdf", &tables);
        assert_eq!(outcome.items.len(), 2);
        assert_eq!(outcome.errors, vec!["bang.pdf: no valid texts found in table 2"]);
    }

    #[test]
    fn unreadable_sheet_keeps_items_from_the_others() {
        let good: &[&[&str]] = &[
            &["STT", "Nội dung", "Dự toán"],
            &["1", "Chi sự nghiệp giáo dục", "1.200"],
            &["2", "Chi sự nghiệp y tế", "850"],
        ];
        let file = SourceFile::new(
            "two_sheets.xlsx",
            workbook(&[("Good", Some(good)), ("Broken", None)]),
        );

        let outcome = extractor(BrokenOcr).extract(&file);
        let names: Vec<&str> = outcome.items.iter().map(|i| i.name.as_str()).collect();
        assert!(names.contains(&"Chi sự nghiệp giáo dục"));
        assert!(names.contains(&"Chi sự nghiệp y tế"));
        assert_eq!(outcome.errors.len(), 1);
        assert!(
            outcome.errors[0].starts_with("two_sheets.xlsx: failed to read sheet 'Broken'"),
            "{:?}",
            outcome.errors
        );
    }

    #[test]
    fn spreadsheet_fills_merged_gaps_before_selecting_the_column() {
        let rows: &[&[&str]] = &[
            &["1", "Chi sự nghiệp giáo dục", "1.200"],
            &["", "", "300"],
            &["2", "Chi sự nghiệp y tế", "850"],
        ];
        let outcome = extractor(BrokenOcr)
            .extract(&SourceFile::new("du_toan.xlsx", workbook(&[("Sheet1", Some(rows))])));

        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        let names: Vec<&str> = outcome.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Chi sự nghiệp giáo dục",
                "Chi sự nghiệp giáo dục",
                "Chi sự nghiệp y tế",
            ]
        );
    }

    #[test]
    fn sheet_without_texts_is_reported_by_name() {
        let numbers: &[&[&str]] = &[&["1", "100"], &["2", "200"]];
        let outcome = extractor(BrokenOcr).extract(&SourceFile::new(
            "so_lieu.xls",
            workbook(&[("Số liệu", Some(numbers))]),
        ));
        assert!(outcome.items.is_empty());
        assert_eq!(
            outcome.errors,
            vec!["so_lieu.xls: no valid texts found in sheet 'Số liệu'"]
        );
    }

    #[test]
    fn pdf_tables_go_through_the_selector() {
        let bytes = table_doc::tests::pdf(&[
            "DU TOAN CHI NGAN SACH",
            "1   Chi su nghiep giao duc   1.200",
            "2   Chi su nghiep y te   850",
        ]);
        let outcome = extractor(BrokenOcr).extract(&SourceFile::new("bang.pdf", bytes));
        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        let names: Vec<&str> = outcome.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Chi su nghiep giao duc", "Chi su nghiep y te"]);
    }
}
