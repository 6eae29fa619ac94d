//! End-to-end flows over uploaded files.
//!
//! - [`analyze_files`]: files → extraction (on the pool) → text filter → scoring.
//! - [`outline`]: one spreadsheet + label column → items with order paths.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, instrument, warn};

use budgetlens_classifier::Classifier;
use budgetlens_extract::{
    ExtractionGrid, ExtractionOutcome, SourceFile, TextFilter, best_column, find_task_column,
    read_sheets,
};
use budgetlens_shared::{BudgetLensError, FiltersConfig, Item, Result, SourceFormat};

use crate::context::AppContext;
use crate::enrichment::EnrichmentProgress;
use crate::hierarchy::assign_order_paths;

/// Message added when every extracted candidate was filtered out.
pub const NO_CANDIDATES: &str = "no candidate items survived filtering";

/// Result of [`analyze_files`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisResult {
    /// Scored candidates, in completion order.
    pub items: Vec<Item>,
    /// Per-file, per-table and extraction-quality messages.
    pub errors: Vec<String>,
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Extract, filter and score candidates from a batch of files.
///
/// Only an empty batch is an error; anything that goes wrong with a single
/// file, table or item is reported in [`AnalysisResult::errors`] or as a
/// sentinel score.
#[instrument(skip_all, fields(files = files.len()))]
pub async fn analyze_files<C: Classifier>(
    ctx: &AppContext<C>,
    files: Vec<SourceFile>,
    progress: &dyn EnrichmentProgress,
) -> Result<AnalysisResult> {
    if files.is_empty() {
        return Err(BudgetLensError::validation("no files provided"));
    }
    let start = Instant::now();

    let outcome = extract_all(ctx, files, progress).await;
    let extracted = outcome.items.len();
    let mut errors = outcome.errors;

    let candidates = ctx.extractor.filter().apply(outcome.items);
    info!(extracted, kept = candidates.len(), "text filter applied");

    if candidates.is_empty() {
        errors.push(NO_CANDIDATES.to_string());
        return Ok(AnalysisResult {
            items: Vec::new(),
            errors,
        });
    }

    let items = ctx.orchestrator().score_items(candidates, progress).await;

    info!(
        items = items.len(),
        errors = errors.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "analysis complete"
    );
    Ok(AnalysisResult { items, errors })
}

/// Run the blocking extractor for every file on the shared pool.
async fn extract_all<C: Classifier>(
    ctx: &AppContext<C>,
    files: Vec<SourceFile>,
    progress: &dyn EnrichmentProgress,
) -> ExtractionOutcome {
    progress.phase("Extracting");
    let total = files.len();
    let extractor = ctx.extractor.clone();
    let files: Vec<Arc<SourceFile>> = files.into_iter().map(Arc::new).collect();

    let outcomes = ctx
        .pool
        .map_unordered(
            files,
            move |file: &Arc<SourceFile>| {
                let file = Arc::clone(file);
                let extractor = extractor.clone();
                async move {
                    let name = file.name.clone();
                    tokio::task::spawn_blocking(move || extractor.extract(&file))
                        .await
                        .unwrap_or_else(|e| {
                            warn!(file = %name, error = %e, "extraction task failed");
                            ExtractionOutcome::failed(&name, "extraction task failed")
                        })
                }
            },
            |file| ExtractionOutcome::failed(&file.name, "extraction task failed"),
            |done| progress.task_progress(done, total, "extracted"),
        )
        .await;

    let mut combined = ExtractionOutcome::default();
    for outcome in outcomes {
        combined.absorb(outcome);
    }
    combined
}

// ---------------------------------------------------------------------------
// Outline
// ---------------------------------------------------------------------------

/// Compute order paths for every row of a spreadsheet.
///
/// Each sheet is re-headed, searched for `label_column`, and its rows paired
/// with the task-name column. Sheets without the label column, and sheets
/// that cannot be read, are skipped; if no sheet has it the call fails.
#[instrument(skip_all, fields(file = %file.name, label_column = %label_column))]
pub fn outline(file: &SourceFile, label_column: &str, filters: &FiltersConfig) -> Result<Vec<Item>> {
    if SourceFormat::from_filename(&file.name) != Some(SourceFormat::Spreadsheet) {
        return Err(BudgetLensError::validation(format!(
            "{}: outline needs a spreadsheet",
            file.name
        )));
    }

    let filter = TextFilter::from_config(filters);
    let mut items = Vec::new();
    let mut matched = false;

    let workbook = read_sheets(&file.bytes)?;
    for error in &workbook.errors {
        warn!(file = %file.name, %error, "sheet skipped");
    }
    for sheet in workbook.sheets {
        let Some((header, rows)) = sheet.grid.promote_header() else {
            continue;
        };
        match outline_sheet(&header, rows, label_column, &filters.task_columns, &filter) {
            Some(sheet_items) => {
                matched = true;
                tracing::debug!(sheet = %sheet.name, items = sheet_items.len(), "sheet outlined");
                items.extend(sheet_items);
            }
            None => tracing::debug!(sheet = %sheet.name, "label column not in sheet"),
        }
    }

    if !matched {
        return Err(BudgetLensError::validation(format!(
            "label column '{label_column}' not found in {}",
            file.name
        )));
    }
    info!(items = items.len(), "outline complete");
    Ok(items)
}

/// Outline one re-headed sheet. `None` when the sheet has no `label_column`.
fn outline_sheet(
    header: &[String],
    rows: Vec<Vec<String>>,
    label_column: &str,
    task_columns: &[String],
    filter: &TextFilter,
) -> Option<Vec<Item>> {
    let wanted = label_column.trim().to_lowercase();
    let label_idx = header.iter().position(|h| h.trim().to_lowercase() == wanted)?;

    let data = ExtractionGrid::new(rows);
    let name_idx = find_task_column(header, task_columns)
        .filter(|&idx| idx != label_idx)
        .or_else(|| best_column(&data, filter))?;

    let paths = assign_order_paths(
        data.rows()
            .iter()
            .map(|row| row.get(label_idx).map_or("", String::as_str)),
    );

    let items = data
        .rows()
        .iter()
        .zip(paths)
        .filter_map(|(row, path)| {
            let name = row.get(name_idx).map(|c| c.trim()).unwrap_or_default();
            if name.is_empty() {
                return None;
            }
            let mut item = Item::new(name);
            item.order_path = path;
            Some(item)
        })
        .collect();
    Some(items)
}
