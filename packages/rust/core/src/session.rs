//! Multi-step session workflow.
//!
//! A client keeps its working item list in the session store and refines it
//! step by step: append more items, ask for parents, ask for field labels.
//! Every write back into a session goes through [`SessionStore::update`], so
//! the get → merge → put sequence for one key never interleaves with another
//! writer in this process.
//!
//! [`SessionStore::update`]: budgetlens_storage::SessionStore::update

use tracing::{info, instrument, warn};
use uuid::Uuid;

use budgetlens_classifier::Classifier;
use budgetlens_shared::{BudgetLensError, Item, Result};
use budgetlens_storage::{SessionStore, dedupe_by_name, merge_items};

use crate::context::AppContext;
use crate::enrichment::{EnrichmentProgress, FieldHints, filter_by_score};

/// What field enrichment runs over.
#[derive(Debug, Clone)]
pub enum EnrichTarget {
    /// The items stored in a session; results are merged back into it.
    Session(String),
    /// A caller-supplied list; nothing is stored.
    Items(Vec<Item>),
}

/// Store `items` under a fresh session key and return the key.
#[instrument(skip_all, fields(items = items.len()))]
pub async fn create_session<C: Classifier>(ctx: &AppContext<C>, items: &[Item]) -> Result<String> {
    let key = Uuid::now_v7().to_string();
    ctx.store.put(&key, items).await?;
    info!(session = %key, "session created");
    Ok(key)
}

/// Merge `items` into the session and return the deduplicated result.
///
/// The session must exist; an absent or expired key is a validation error.
#[instrument(skip_all, fields(session = %key, items = items.len()))]
pub async fn append_and_merge(
    store: &SessionStore,
    key: &str,
    items: Vec<Item>,
) -> Result<Vec<Item>> {
    require_session(store, key).await?;
    let merged = store
        .update(key, |cached| Ok(merge_items(cached, items)))
        .await?;
    Ok(dedupe_by_name(merged))
}

async fn require_session(store: &SessionStore, key: &str) -> Result<()> {
    if store.exists(key).await? {
        return Ok(());
    }
    warn!(session = %key, "session not found or expired");
    Err(BudgetLensError::validation(format!(
        "session '{key}' not found or expired"
    )))
}

/// Stored items for `key`, deduplicated. Empty when absent or expired.
pub async fn show_session(store: &SessionStore, key: &str) -> Result<Vec<Item>> {
    Ok(dedupe_by_name(store.get(key).await?))
}

/// Parent-assignment workflow.
///
/// Merges `items` into the session, keeps items at or above the configured
/// score threshold, asks for a parent for each of those (candidates are the
/// items preceding it in the merged list), and merges the answers back.
#[instrument(skip_all, fields(session = %key, items = items.len()))]
pub async fn assign_parents<C: Classifier>(
    ctx: &AppContext<C>,
    key: &str,
    items: Vec<Item>,
    progress: &dyn EnrichmentProgress,
) -> Result<Vec<Item>> {
    let merged = append_and_merge(&ctx.store, key, items).await?;
    let threshold = ctx.config.defaults.score_threshold;
    let relevant = filter_by_score(merged, threshold);
    info!(relevant = relevant.len(), threshold, "items selected for parent assignment");

    let assigned = ctx.orchestrator().assign_parents(relevant, progress).await;
    let stored = assigned.clone();
    ctx.store
        .update(key, |cached| Ok(merge_items(cached, stored)))
        .await?;
    Ok(dedupe_by_name(assigned))
}

/// Field-enrichment workflow: set category codes and funding source.
#[instrument(skip_all)]
pub async fn enrich<C: Classifier>(
    ctx: &AppContext<C>,
    target: EnrichTarget,
    hints: &FieldHints,
    progress: &dyn EnrichmentProgress,
) -> Result<Vec<Item>> {
    let orchestrator = ctx.orchestrator();
    match target {
        EnrichTarget::Items(items) => {
            let enriched = orchestrator.enrich_fields(items, hints, progress).await;
            Ok(dedupe_by_name(enriched))
        }
        EnrichTarget::Session(key) => {
            require_session(&ctx.store, &key).await?;
            let items = ctx.store.get(&key).await?;
            let enriched = orchestrator.enrich_fields(items, hints, progress).await;
            let stored = enriched.clone();
            ctx.store
                .update(&key, |cached| Ok(merge_items(cached, stored)))
                .await?;
            info!(session = %key, items = enriched.len(), "session enriched");
            Ok(dedupe_by_name(enriched))
        }
    }
}

/// Delete every expired session; returns how many were removed.
pub async fn purge_expired(store: &SessionStore) -> Result<u64> {
    let purged = store.purge_expired().await?;
    info!(purged, "expired sessions purged");
    Ok(purged)
}
