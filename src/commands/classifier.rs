use crate::error::AppError;
use crate::models::classify_types::ClassifyReport;
use crate::services::classifier::batch::{self, BatchOptions};
use crate::services::classifier::{CandidateLabels, ModelType, Settings};
use crate::state::AppState;

/// Classify every file that still needs a result.
pub async fn classify_files(state: &AppState, reclassify: bool) -> Result<ClassifyReport, AppError> {
    // Snapshot settings so edits made mid-run only apply to the next run
    let settings = state.settings.lock().await.clone();
    let options = BatchOptions {
        reclassify,
        ..state.batch.clone()
    };
    batch::classify_collection(&state.store, state.classifier.as_ref(), &settings, &options).await
}

pub async fn get_settings(state: &AppState) -> Settings {
    state.settings.lock().await.clone()
}

pub async fn set_model_type(state: &AppState, model_id: &str) -> Result<ModelType, AppError> {
    let model: ModelType = model_id.parse()?;
    state.settings.lock().await.model = model;
    Ok(model)
}

pub async fn set_labels(state: &AppState, joined: &str) -> Result<CandidateLabels, AppError> {
    let labels = CandidateLabels::parse(joined)?;
    state.settings.lock().await.labels = labels.clone();
    Ok(labels)
}
