use std::sync::Arc;

use crate::core::config::Settings;
use crate::repositories::PipelineStore;
use crate::services::analyzer::QualityAnalyzer;

/// Shared application state. The data store and the external quality
/// analyzer sit behind traits: both are external collaborators of the
/// pipeline, and tests substitute in-memory doubles for them.
#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    store: Arc<dyn PipelineStore>,
    analyzer: Arc<dyn QualityAnalyzer>,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        store: Arc<dyn PipelineStore>,
        analyzer: Arc<dyn QualityAnalyzer>,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, store, analyzer }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn store(&self) -> &dyn PipelineStore {
        self.inner.store.as_ref()
    }

    pub(crate) fn analyzer(&self) -> &dyn QualityAnalyzer {
        self.inner.analyzer.as_ref()
    }
}
