//! Remote text classification.
//!
//! A classifier answers one instruction + input pair with free text. Callers
//! never consume that text directly: every operation kind has a tagged result
//! type in [`parse`] that either holds a validated value or degrades to the
//! operation's sentinel.

pub mod http;
pub mod instructions;
pub mod parse;

use std::future::Future;

use budgetlens_shared::Result;

pub use http::OpenAiClassifier;
pub use parse::{ChoiceResult, CodeListResult, ScoreResult};

/// One classification call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifyRequest {
    /// System instruction describing the task and the answer format.
    pub instruction: String,
    /// The text being classified.
    pub text: String,
    /// Upper bound on the answer length, in tokens.
    pub max_output_tokens: u32,
}

/// External text classifier.
///
/// Implementations may fail, return an empty string, or return text that does
/// not parse; callers are expected to convert all of these into sentinels.
pub trait Classifier: Send + Sync + 'static {
    fn classify(&self, request: ClassifyRequest) -> impl Future<Output = Result<String>> + Send;
}
