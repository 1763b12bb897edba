use crate::services::classifier::batch::BatchOptions;
use crate::services::classifier::{Classify, Settings};
use crate::services::intake::FileStore;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Everything the commands need, cheap to clone into spawned tasks.
#[derive(Clone)]
pub struct AppState {
    pub store: FileStore,
    pub settings: Arc<Mutex<Settings>>,
    pub classifier: Arc<dyn Classify>,
    pub batch: BatchOptions,
}

impl AppState {
    pub fn new(store: FileStore, classifier: Arc<dyn Classify>, settings: Settings, batch: BatchOptions) -> Self {
        Self {
            store,
            settings: Arc::new(Mutex::new(settings)),
            classifier,
            batch,
        }
    }

    /// Release every held file. Also happens when the last clone is dropped.
    pub fn teardown(&self) -> usize {
        self.store.clear()
    }
}
