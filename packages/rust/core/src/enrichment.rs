//! Enrichment orchestrator.
//!
//! Fans classifier calls out over the shared [`WorkerPool`] and writes the
//! parsed results back onto each item. Three stages use it: relevance
//! scoring, field enrichment (category codes and funding source), and parent
//! assignment.
//!
//! A failed call (transport error, timeout, unparsable answer) never aborts a
//! stage: the affected field gets its sentinel, the failure is logged, and the
//! stage still returns one item per input. Output order is completion order.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use budgetlens_classifier::{
    ChoiceResult, Classifier, ClassifyRequest, CodeListResult, ScoreResult, instructions,
};
use budgetlens_shared::{
    AppConfig, BudgetLensError, Item, Result, UNKNOWN_FUNDING_SOURCE, UNKNOWN_SCORE,
};

use crate::pool::WorkerPool;

// ---------------------------------------------------------------------------
// Options and hints
// ---------------------------------------------------------------------------

/// Per-call limits for the orchestrator.
#[derive(Debug, Clone)]
pub struct EnrichmentOptions {
    /// Answer bound for score, code and funding-source calls.
    pub max_output_tokens: u32,
    /// Answer bound for parent selection.
    pub parent_max_output_tokens: u32,
    /// Per-call timeout; an expired call counts as failed.
    pub call_timeout: Duration,
    /// How many preceding items are offered as parent candidates.
    pub parent_window: usize,
}

impl Default for EnrichmentOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl EnrichmentOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_output_tokens: config.classifier.max_output_tokens,
            parent_max_output_tokens: config.classifier.parent_max_output_tokens,
            call_timeout: config.classifier.timeout(),
            parent_window: config.defaults.parent_window,
        }
    }
}

/// Candidate labels shared by every item of a field-enrichment batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldHints {
    /// Candidate budget classification codes.
    pub category_codes: Vec<String>,
    /// Optional descriptions of `category_codes`, paired by position.
    pub category_info: Vec<String>,
    /// Candidate funding-source codes.
    pub funding_sources: Vec<String>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs classification stages over batches of items.
pub struct Orchestrator<C> {
    classifier: Arc<C>,
    pool: WorkerPool,
    options: EnrichmentOptions,
}

impl<C> Clone for Orchestrator<C> {
    fn clone(&self) -> Self {
        Self {
            classifier: self.classifier.clone(),
            pool: self.pool.clone(),
            options: self.options.clone(),
        }
    }
}

impl<C: Classifier> Orchestrator<C> {
    pub fn new(classifier: Arc<C>, pool: WorkerPool, options: EnrichmentOptions) -> Self {
        Self {
            classifier,
            pool,
            options,
        }
    }

    pub fn options(&self) -> &EnrichmentOptions {
        &self.options
    }

    /// Set `score` on every item. Failures get [`UNKNOWN_SCORE`].
    #[instrument(skip_all, fields(items = items.len()))]
    pub async fn score_items(
        &self,
        items: Vec<Item>,
        progress: &dyn EnrichmentProgress,
    ) -> Vec<Item> {
        progress.phase("Scoring items");
        let total = items.len();
        let classifier = self.classifier.clone();
        let options = self.options.clone();

        let scored = self
            .pool
            .map_unordered(
                items,
                move |item: &Item| {
                    let mut item = item.clone();
                    let classifier = classifier.clone();
                    let options = options.clone();
                    async move {
                        let request =
                            instructions::relevance_score(&item.name, options.max_output_tokens);
                        let score = match call(&*classifier, request, options.call_timeout).await {
                            Ok(raw) => match ScoreResult::parse(&raw) {
                                ScoreResult::Score(score) => score,
                                ScoreResult::Invalid(raw) => {
                                    warn!(item = %item.name, answer = %raw, "unparsable score");
                                    UNKNOWN_SCORE
                                }
                            },
                            Err(e) => {
                                warn!(item = %item.name, error = %e, "scoring failed");
                                UNKNOWN_SCORE
                            }
                        };
                        item.score = Some(score);
                        item
                    }
                },
                |item| {
                    let mut item = item.clone();
                    item.score = Some(UNKNOWN_SCORE);
                    item
                },
                |done| progress.task_progress(done, total, "scored"),
            )
            .await;

        info!(items = scored.len(), "scoring complete");
        scored
    }

    /// Set `category_codes` and `funding_source` on every item.
    ///
    /// Each item is handled by a single task making two sequential calls;
    /// a failure in one leaves the other unaffected.
    #[instrument(skip_all, fields(items = items.len()))]
    pub async fn enrich_fields(
        &self,
        items: Vec<Item>,
        hints: &FieldHints,
        progress: &dyn EnrichmentProgress,
    ) -> Vec<Item> {
        progress.phase("Enriching fields");
        let total = items.len();
        let classifier = self.classifier.clone();
        let options = self.options.clone();
        let hints = Arc::new(hints.clone());

        let enriched = self
            .pool
            .map_unordered(
                items,
                move |item: &Item| {
                    let mut item = item.clone();
                    let classifier = classifier.clone();
                    let options = options.clone();
                    let hints = hints.clone();
                    async move {
                        item.category_codes =
                            Some(classify_codes(&*classifier, &item.name, &hints, &options).await);
                        item.funding_source =
                            Some(classify_source(&*classifier, &item.name, &hints, &options).await);
                        item
                    }
                },
                |item| {
                    let mut item = item.clone();
                    item.category_codes = Some(Vec::new());
                    item.funding_source = Some(UNKNOWN_FUNDING_SOURCE.to_string());
                    item
                },
                |done| progress.task_progress(done, total, "enriched"),
            )
            .await;

        info!(items = enriched.len(), "field enrichment complete");
        enriched
    }

    /// Set `parent_name` on every item.
    ///
    /// Item `i` is offered the names of the up to `parent_window` items right
    /// before it in `items`. An answer is accepted only if it is verbatim the
    /// name of some item in the batch (other than the item itself); anything
    /// else leaves the parent empty.
    #[instrument(skip_all, fields(items = items.len()))]
    pub async fn assign_parents(
        &self,
        items: Vec<Item>,
        progress: &dyn EnrichmentProgress,
    ) -> Vec<Item> {
        progress.phase("Assigning parents");
        let total = items.len();
        let window = self.options.parent_window;
        let all_names: Arc<Vec<String>> = Arc::new(items.iter().map(|i| i.name.clone()).collect());

        let inputs: Vec<(Item, Vec<String>)> = items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| {
                let start = idx.saturating_sub(window);
                (item, all_names[start..idx].to_vec())
            })
            .collect();

        let classifier = self.classifier.clone();
        let options = self.options.clone();

        let assigned = self
            .pool
            .map_unordered(
                inputs,
                move |input: &(Item, Vec<String>)| {
                    let (mut item, candidates) = input.clone();
                    let classifier = classifier.clone();
                    let options = options.clone();
                    let all_names = all_names.clone();
                    async move {
                        item.parent_name = Some(
                            classify_parent(&*classifier, &item.name, &candidates, &all_names, &options)
                                .await,
                        );
                        item
                    }
                },
                |(item, _)| {
                    let mut item = item.clone();
                    item.parent_name = Some(String::new());
                    item
                },
                |done| progress.task_progress(done, total, "parent assigned"),
            )
            .await;

        info!(items = assigned.len(), "parent assignment complete");
        assigned
    }
}

/// One classifier call bounded by `timeout`.
async fn call<C: Classifier>(
    classifier: &C,
    request: ClassifyRequest,
    timeout: Duration,
) -> Result<String> {
    with_timeout(classifier.classify(request), timeout).await
}

async fn with_timeout(
    fut: impl Future<Output = Result<String>>,
    timeout: Duration,
) -> Result<String> {
    tokio::time::timeout(timeout, fut).await.map_err(|_| {
        BudgetLensError::Classifier(format!("timed out after {}s", timeout.as_secs_f32()))
    })?
}

async fn classify_codes<C: Classifier>(
    classifier: &C,
    name: &str,
    hints: &FieldHints,
    options: &EnrichmentOptions,
) -> Vec<String> {
    let request = instructions::category_codes(
        name,
        &hints.category_codes,
        &hints.category_info,
        options.max_output_tokens,
    );
    match call(classifier, request, options.call_timeout).await {
        Ok(raw) => match CodeListResult::parse(&raw, &hints.category_codes) {
            CodeListResult::Invalid(raw) => {
                warn!(item = %name, answer = %raw, "unparsable category codes");
                Vec::new()
            }
            parsed => parsed.into_codes(),
        },
        Err(e) => {
            warn!(item = %name, error = %e, "category classification failed");
            Vec::new()
        }
    }
}

async fn classify_source<C: Classifier>(
    classifier: &C,
    name: &str,
    hints: &FieldHints,
    options: &EnrichmentOptions,
) -> String {
    if hints.funding_sources.is_empty() {
        return UNKNOWN_FUNDING_SOURCE.to_string();
    }
    let request =
        instructions::funding_source(name, &hints.funding_sources, options.max_output_tokens);
    match call(classifier, request, options.call_timeout).await {
        Ok(raw) => {
            let parsed = ChoiceResult::parse(&raw, &hints.funding_sources);
            if let ChoiceResult::Unmatched(raw) = &parsed {
                warn!(item = %name, answer = %raw, "funding source not among candidates");
            }
            parsed.into_funding_source()
        }
        Err(e) => {
            warn!(item = %name, error = %e, "funding source classification failed");
            UNKNOWN_FUNDING_SOURCE.to_string()
        }
    }
}

async fn classify_parent<C: Classifier>(
    classifier: &C,
    name: &str,
    window: &[String],
    all_names: &[String],
    options: &EnrichmentOptions,
) -> String {
    if window.is_empty() {
        return String::new();
    }
    let request = instructions::parent(name, window, options.parent_max_output_tokens);
    match call(classifier, request, options.call_timeout).await {
        Ok(raw) => {
            let parsed = ChoiceResult::parse(&raw, all_names);
            if let ChoiceResult::Unmatched(raw) = &parsed {
                tracing::debug!(item = %name, answer = %raw, "parent answer not among candidates");
            }
            if parsed.chosen() == Some(name) {
                return String::new();
            }
            parsed.into_parent_name()
        }
        Err(e) => {
            warn!(item = %name, error = %e, "parent classification failed");
            String::new()
        }
    }
}

/// Keep items whose score is at least `threshold`; a missing score counts as
/// [`UNKNOWN_SCORE`].
pub fn filter_by_score(items: Vec<Item>, threshold: u8) -> Vec<Item> {
    items
        .into_iter()
        .filter(|item| item.score_or_unknown() >= threshold)
        .collect()
}

// ---------------------------------------------------------------------------
// Progress trait
// ---------------------------------------------------------------------------

/// Progress callback for long-running stages.
pub trait EnrichmentProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Task-level progress within the current phase.
    fn task_progress(&self, current: usize, total: usize, detail: &str);
}

/// No-op enrichment progress.
pub struct SilentEnrichmentProgress;

impl EnrichmentProgress for SilentEnrichmentProgress {
    fn phase(&self, _name: &str) {}
    fn task_progress(&self, _current: usize, _total: usize, _detail: &str) {}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
