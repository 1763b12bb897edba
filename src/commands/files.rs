use crate::error::AppError;
use crate::models::file_types::{FileEntry, IntakeReport};
use crate::services::{fs_service, thumbnail_service};
use crate::state::AppState;
use std::path::{Path, PathBuf};
use tracing::info;

pub async fn add_paths(state: &AppState, inputs: &[PathBuf], recursive: bool) -> Result<IntakeReport, AppError> {
    let paths = fs_service::collect_paths(inputs, recursive)?;
    let candidates = fs_service::read_candidates(&paths, state.store.policy()).await;
    let report = state.store.add_files(candidates);
    info!(
        accepted = report.accepted.len(),
        rejected_type = report.rejected_type.len(),
        duplicates = report.duplicates.len(),
        oversized = report.oversized.len(),
        "intake finished"
    );
    Ok(report)
}

pub fn list_files(state: &AppState) -> Vec<FileEntry> {
    state
        .store
        .snapshot()
        .files()
        .iter()
        .enumerate()
        .map(|(i, f)| FileEntry::from_file(i, f))
        .collect()
}

pub fn remove_file(state: &AppState, index: usize) -> Result<FileEntry, AppError> {
    state
        .store
        .remove_file(index)
        .map(|f| FileEntry::from_file(index, &f))
        .ok_or_else(|| AppError::Validation(format!("no file at index {}", index)))
}

pub fn clear_files(state: &AppState) -> usize {
    state.teardown()
}

/// Write a JPEG preview of the file at `index` into `dir`.
pub fn write_preview(state: &AppState, index: usize, dir: &Path) -> Result<PathBuf, AppError> {
    let snapshot = state.store.snapshot();
    let file = snapshot
        .get(index)
        .ok_or_else(|| AppError::Validation(format!("no file at index {}", index)))?;
    let thumb = state.store.displays().thumbnail(file.display)?;
    std::fs::create_dir_all(dir)?;
    let dest = dir.join(thumbnail_service::thumbnail_file_name(&file.name));
    std::fs::write(&dest, thumb)?;
    Ok(dest)
}

/// Previews for every held file. Files that fail to decode are skipped.
pub fn write_previews(state: &AppState, dir: &Path) -> Vec<PathBuf> {
    (0..state.store.snapshot().len())
        .filter_map(|i| match write_preview(state, i, dir) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(index = i, error = %e, "failed to write preview");
                None
            }
        })
        .collect()
}
