//! Normalized cell grids shared by every extractor.

use serde::Serialize;

/// An ordered sequence of rows, each an ordered sequence of cell strings.
///
/// Missing cells are empty strings. Rows may be ragged; consumers index by
/// column and treat absent cells as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionGrid {
    rows: Vec<Vec<String>>,
}

impl ExtractionGrid {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<String>> {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Width of the widest row.
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Cell at `(row, col)`, empty for ragged rows.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Carry the last non-blank value of each column down into blank cells,
    /// then back-fill any leading blanks from the first value below them.
    ///
    /// Merged spreadsheet cells only carry their value in the top-left cell;
    /// this materializes it into every row the merge spans.
    pub fn fill_down(&mut self) {
        let width = self.column_count();
        for row in &mut self.rows {
            row.resize(width, String::new());
        }

        for col in 0..width {
            let mut last: Option<String> = None;
            let mut leading_blanks = 0usize;
            for row in &mut self.rows {
                let cell = &mut row[col];
                if is_blank(cell) {
                    match &last {
                        Some(value) => cell.clone_from(value),
                        None => leading_blanks += 1,
                    }
                } else {
                    last = Some(cell.clone());
                }
            }

            if leading_blanks > 0 {
                if let Some(first) = self
                    .rows
                    .iter()
                    .map(|r| &r[col])
                    .find(|c| !is_blank(c))
                    .cloned()
                {
                    for row in self.rows.iter_mut().take(leading_blanks) {
                        row[col].clone_from(&first);
                    }
                }
            }
        }
    }

    /// Split into `(header, data_rows)`, promoting the next row to header for
    /// as long as the current header contains blank cells.
    ///
    /// Returns `None` when the grid is empty. If no row is fully populated the
    /// last row becomes the header and there are no data rows.
    pub fn promote_header(&self) -> Option<(Vec<String>, Vec<Vec<String>>)> {
        let width = self.column_count();
        let start = self
            .rows
            .iter()
            .position(|row| row.len() == width && row.iter().all(|c| !is_blank(c)))
            .unwrap_or(self.rows.len().checked_sub(1)?);

        let header = self.rows[start]
            .iter()
            .map(|c| c.trim().to_string())
            .collect();
        let data = self.rows[start + 1..].to_vec();
        Some((header, data))
    }
}

/// Whether a cell counts as missing.
pub(crate) fn is_blank(cell: &str) -> bool {
    cell.trim().is_empty()
}

/// Locate the task column of a header row by known name.
///
/// Names are compared case-insensitively after trimming; the first entry of
/// `known_names` that matches wins, regardless of where it sits in the header.
pub fn find_task_column(header: &[String], known_names: &[String]) -> Option<usize> {
    known_names.iter().find_map(|known| {
        let known = known.trim().to_lowercase();
        header
            .iter()
            .position(|h| h.trim().to_lowercase() == known)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> ExtractionGrid {
        ExtractionGrid::new(
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn fill_down_carries_merged_values() {
        let mut g = grid(&[
            &["", "Chi sự nghiệp giáo dục"],
            &["A", ""],
            &["", "Chi đào tạo"],
            &["B", ""],
        ]);
        g.fill_down();
        assert_eq!(g.cell(0, 0), "A");
        assert_eq!(g.cell(1, 1), "Chi sự nghiệp giáo dục");
        assert_eq!(g.cell(2, 0), "A");
        assert_eq!(g.cell(3, 1), "Chi đào tạo");
    }

    #[test]
    fn fill_down_pads_ragged_rows() {
        let mut g = grid(&[&["x", "y", "z"], &["a"]]);
        g.fill_down();
        assert_eq!(g.rows()[1], vec!["a", "y", "z"]);
    }

    #[test]
    fn header_promotion_skips_unnamed_rows() {
        let g = grid(&[
            &["PHỤ BIỂU 01", "", ""],
            &["STT", "Nội dung", ""],
            &["STT", "Nội dung", "Dự toán"],
            &["1", "Chi thường xuyên", "100"],
        ]);
        let (header, data) = g.promote_header().expect("header");
        assert_eq!(header, vec!["STT", "Nội dung", "Dự toán"]);
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn header_promotion_on_empty_grid() {
        assert!(ExtractionGrid::default().promote_header().is_none());
    }

    #[test]
    fn known_column_lookup_is_case_insensitive() {
        let header: Vec<String> = ["STT", " Nội Dung ", "Nhiệm vụ"]
            .into_iter()
            .map(String::from)
            .collect();
        let known: Vec<String> = vec!["nhiệm vụ".into(), "nội dung".into()];
        assert_eq!(find_task_column(&header, &known), Some(2));
        assert_eq!(find_task_column(&header, &["tên".to_string()]), None);
    }
}
