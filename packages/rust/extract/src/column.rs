//! Column selection: pick the one column most likely to hold item names.
//!
//! This is a frequency heuristic. The item-name column of a budget table is
//! the one with the most long, non-numeric, non-boilerplate cells.

use std::sync::LazyLock;

use budgetlens_shared::Item;
use regex::Regex;

use crate::filter::TextFilter;
use crate::grid::ExtractionGrid;

/// Cells shorter than this (in characters) are never item names.
const MIN_TEXT_CHARS: usize = 5;

/// Grouped digits with an optional two-digit decimal part: `1.250.000`, `12,50`.
static MONEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{1,3}(?:[.,]\d{3})*(?:[.,]\d{2})?$").expect("valid regex")
});

/// Plain number, optionally signed or with a decimal separator.
static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+[.,]?\d*$").expect("valid regex"));

/// Table-separator artifacts emitted by text-based table renderers.
static SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:?-{3,}").expect("valid regex"));

/// Whether a cell could be an item name.
pub fn is_valid_text(text: &str, filter: &TextFilter) -> bool {
    let text = text.trim();
    if text.chars().count() < MIN_TEXT_CHARS {
        return false;
    }
    if MONEY.is_match(text) || NUMBER.is_match(text) || SEPARATOR.is_match(text) {
        return false;
    }
    !filter.starts_with_noise(&text.to_lowercase())
}

/// Index of the column with the most valid cells, ties going to the lowest
/// index. `None` when no column has a single valid cell.
pub fn best_column(grid: &ExtractionGrid, filter: &TextFilter) -> Option<usize> {
    let mut counts = vec![0usize; grid.column_count()];
    for row in grid.rows() {
        for (col, cell) in row.iter().enumerate() {
            if is_valid_text(cell, filter) {
                counts[col] += 1;
            }
        }
    }

    let (best, &count) = counts
        .iter()
        .enumerate()
        .rev()
        .max_by_key(|(_, count)| **count)?;
    tracing::trace!(?counts, "valid cells per column");
    (count > 0).then_some(best)
}

/// Select the [`best_column`] and emit one [`Item`] per valid cell in it, in
/// row order. Returns an empty list when no column qualifies.
pub fn select_column(grid: &ExtractionGrid, filter: &TextFilter) -> Vec<Item> {
    let Some(best) = best_column(grid, filter) else {
        return Vec::new();
    };
    tracing::debug!(column = best, "selected item column");

    grid.rows()
        .iter()
        .filter_map(|row| row.get(best))
        .filter(|cell| is_valid_text(cell, filter))
        .map(|cell| Item::new(cell.trim()))
        .collect()
}
