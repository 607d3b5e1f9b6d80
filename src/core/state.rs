use std::sync::Arc;

use crate::collaborators::Collaborators;
use crate::core::config::Settings;
use crate::store::ExamStore;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    store: Arc<dyn ExamStore>,
    collaborators: Collaborators,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        store: Arc<dyn ExamStore>,
        collaborators: Collaborators,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, store, collaborators }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn store(&self) -> &dyn ExamStore {
        self.inner.store.as_ref()
    }

    pub(crate) fn collaborators(&self) -> &Collaborators {
        &self.inner.collaborators
    }
}
