//! Core workflows for BudgetLens.
//!
//! This crate ties extraction, classification and the session store together:
//! the analysis pipeline, the outline flow, the enrichment orchestrator, and
//! the multi-step session workflow. Everything shares one [`WorkerPool`] and
//! receives its collaborators through an [`AppContext`].

pub mod context;
pub mod enrichment;
pub mod hierarchy;
pub mod pipeline;
pub mod pool;
pub mod session;

pub use context::AppContext;
pub use enrichment::{
    EnrichmentOptions, EnrichmentProgress, FieldHints, Orchestrator, SilentEnrichmentProgress,
    filter_by_score,
};
pub use hierarchy::{
    HierarchyState, ancestor_paths, assign_order_paths, find_ancestors, retain_with_ancestors,
};
pub use pipeline::{AnalysisResult, analyze_files, outline};
pub use pool::WorkerPool;
pub use session::EnrichTarget;
