use std::sync::Arc;

use crate::core::config::Settings;
use crate::services::pipeline::GradingPipeline;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    pipeline: GradingPipeline,
}

impl AppState {
    pub(crate) fn new(settings: Settings, pipeline: GradingPipeline) -> Self {
        Self { inner: Arc::new(InnerState { settings, pipeline }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn pipeline(&self) -> &GradingPipeline {
        &self.inner.pipeline
    }
}
