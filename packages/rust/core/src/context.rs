//! Application context: the collaborators every workflow needs, built once.

use std::sync::Arc;

use budgetlens_classifier::{Classifier, OpenAiClassifier};
use budgetlens_extract::{Extractor, TesseractOcr, TextFilter};
use budgetlens_shared::{AppConfig, Result, session_db_path};
use budgetlens_storage::SessionStore;

use crate::enrichment::{EnrichmentOptions, Orchestrator};
use crate::pool::WorkerPool;

/// Shared handles passed into every pipeline and session operation.
pub struct AppContext<C> {
    pub config: AppConfig,
    pub classifier: Arc<C>,
    pub store: Arc<SessionStore>,
    pub pool: WorkerPool,
    pub extractor: Extractor,
}

impl<C: Classifier> AppContext<C> {
    /// Assemble a context from already-built parts. The pool is sized from
    /// `config.defaults.max_workers`.
    pub fn new(config: AppConfig, classifier: C, store: SessionStore, extractor: Extractor) -> Self {
        let pool = WorkerPool::new(config.defaults.max_workers);
        Self {
            config,
            classifier: Arc::new(classifier),
            store: Arc::new(store),
            pool,
            extractor,
        }
    }

    /// Orchestrator over this context's classifier and pool.
    pub fn orchestrator(&self) -> Orchestrator<C> {
        Orchestrator::new(
            self.classifier.clone(),
            self.pool.clone(),
            EnrichmentOptions::from_config(&self.config),
        )
    }
}

impl AppContext<OpenAiClassifier> {
    /// Production context: HTTP classifier, on-disk session store, Tesseract OCR.
    pub async fn open(config: AppConfig) -> Result<Self> {
        let classifier = OpenAiClassifier::from_config(&config.classifier)?;
        let db_path = session_db_path(&config)?;
        let store = SessionStore::open(&db_path, config.session.ttl()).await?;
        let extractor = Extractor::new(
            TextFilter::from_config(&config.filters),
            Arc::new(TesseractOcr::new(config.ocr.clone())),
        );
        tracing::debug!(
            db = %db_path.display(),
            workers = config.defaults.max_workers,
            model = classifier.model(),
            "application context ready"
        );
        Ok(Self::new(config, classifier, store, extractor))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use budgetlens_extract::TextRecognizer;
    use uuid::Uuid;

    use super::*;

    /// Recognizer returning fixed text for every image.
    pub(crate) struct CannedText(pub &'static str);

    impl TextRecognizer for CannedText {
        fn recognize(&self, _image_bytes: &[u8]) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    /// Context over a throwaway database and canned OCR output.
    pub(crate) async fn test_context<C: Classifier>(
        classifier: C,
        ocr_text: &'static str,
    ) -> AppContext<C> {
        let db = std::env::temp_dir().join(format!("bl_test_{}.db", Uuid::now_v7()));
        let store = SessionStore::open(&db, Duration::from_secs(3600))
            .await
            .expect("open test db");
        let extractor = Extractor::new(TextFilter::default(), Arc::new(CannedText(ocr_text)));
        AppContext::new(AppConfig::default(), classifier, store, extractor)
    }

    #[tokio::test]
    async fn pool_is_sized_from_config() {
        let ctx = test_context(
            crate::enrichment::tests::ScriptedClassifier::answering("5"),
            "",
        )
        .await;
        assert_eq!(ctx.pool.size(), ctx.config.defaults.max_workers);
        assert_eq!(ctx.orchestrator().options().parent_window, 10);
    }
}
