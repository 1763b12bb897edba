use crate::error::AppError;
use crate::models::classify_types::{ClassificationState, ClassifyReport};
use crate::models::file_types::ManagedFile;
use crate::services::classifier::client::Classify;
use crate::services::classifier::settings::Settings;
use crate::services::intake::FileStore;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Clone, Debug, Default)]
pub struct BatchOptions {
    /// Cap on requests in flight. `None` issues every request at once.
    pub max_concurrency: Option<usize>,
    /// Re-run files that already have a result.
    pub reclassify: bool,
}

/// Classify every file that still needs a result and wait for all of them.
///
/// Each completion is written by file id, so files removed while their
/// request was in flight are skipped and counted as `dropped`. A failed
/// request marks its file `Failed`; there is no retry.
pub async fn classify_collection<C>(
    store: &FileStore,
    classifier: &C,
    settings: &Settings,
    options: &BatchOptions,
) -> Result<ClassifyReport, AppError>
where
    C: Classify + ?Sized,
{
    let _run = store
        .begin_run()
        .ok_or_else(|| AppError::Other("a classification run is already in progress".into()))?;

    let snapshot = store.snapshot();
    let targets: Vec<Arc<ManagedFile>> = snapshot
        .files()
        .iter()
        .filter(|f| options.reclassify || f.state.result().is_none())
        .cloned()
        .collect();

    let total = targets.len();
    if total == 0 {
        return Ok(ClassifyReport::default());
    }

    for file in &targets {
        if !file.state.is_pending() {
            store.set_classification_state(file.id, ClassificationState::Pending);
        }
    }

    let limit = options.max_concurrency.unwrap_or(total).max(1);
    let model_id = settings.model.id();
    let labels = settings.labels.as_slice();
    let start = Instant::now();
    info!(total, limit, model = model_id, "starting classification run");

    let mut report = ClassifyReport {
        total,
        ..Default::default()
    };

    let mut completions = futures::stream::iter(targets.into_iter().map(|file| async move {
        let outcome = classifier.classify(&file.bytes, model_id, labels).await;
        (file, outcome)
    }))
    .buffer_unordered(limit);

    while let Some((file, outcome)) = completions.next().await {
        let state = match outcome {
            Ok(predictions) => {
                debug!(file = %file.name, top = ?predictions.top().map(|p| &p.label), "classified");
                ClassificationState::Classified { predictions }
            }
            Err(e) => {
                warn!(file = %file.name, error = %e, "classification failed");
                ClassificationState::Failed { reason: e.to_string() }
            }
        };
        let failed = state.is_failed();

        if !store.set_classification_state(file.id, state) {
            warn!(file = %file.name, id = %file.id, "file removed mid-flight, dropping result");
            report.dropped += 1;
        } else if failed {
            report.failed += 1;
        } else {
            report.classified += 1;
        }
    }

    info!(
        classified = report.classified,
        failed = report.failed,
        dropped = report.dropped,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "classification run finished"
    );
    Ok(report)
}
