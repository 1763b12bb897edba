use crate::error::AppError;
use crate::models::file_types::FileCandidate;
use crate::services::intake::IntakePolicy;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

const MIME_BY_EXTENSION: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("webp", "image/webp"),
    ("gif", "image/gif"),
    ("bmp", "image/bmp"),
    ("tiff", "image/tiff"),
    ("tif", "image/tiff"),
    ("ico", "image/x-icon"),
    ("svg", "image/svg+xml"),
];

/// Mime type the way a browser reports it for a picked file: by extension.
pub fn mime_type_for(path: &Path) -> &'static str {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .and_then(|ext| {
            MIME_BY_EXTENSION
                .iter()
                .find(|(e, _)| *e == ext)
                .map(|(_, mime)| *mime)
        })
        .unwrap_or("application/octet-stream")
}

pub fn is_image_file(path: &Path) -> bool {
    mime_type_for(path).starts_with("image/")
}

/// Expand the user's inputs into file paths.
///
/// Files are passed through untouched so intake can report rejected types.
/// Directories contribute their image files, sorted by name; subfolders are
/// only walked when `recursive` is set. Hidden entries are skipped.
pub fn collect_paths(inputs: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>, AppError> {
    let mut paths = Vec::new();

    for input in inputs {
        if !input.exists() {
            return Err(AppError::Validation(format!("Path does not exist: {}", input.display())));
        }
        if input.is_file() {
            paths.push(input.clone());
            continue;
        }

        let max_depth = if recursive { usize::MAX } else { 1 };
        let mut images: Vec<PathBuf> = WalkDir::new(input)
            .max_depth(max_depth)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_image_file(e.path()))
            .map(|e| e.into_path())
            .collect();

        images.sort_by(|a, b| {
            a.to_string_lossy()
                .to_lowercase()
                .cmp(&b.to_string_lossy().to_lowercase())
        });
        paths.extend(images);
    }

    Ok(paths)
}

/// Read one path into an intake candidate.
///
/// The size comes from metadata first. A file intake would reject for its
/// type or size is returned without its content.
pub async fn read_candidate(path: &Path, policy: &IntakePolicy) -> Result<FileCandidate, AppError> {
    let with_path = |e: std::io::Error| {
        AppError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to read {}: {}", path.display(), e),
        ))
    };

    let name = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    let mime_type = mime_type_for(path);
    let size = tokio::fs::metadata(path).await.map_err(with_path)?.len();

    if !policy.allows(mime_type) || size > policy.max_file_size {
        debug!(name = %name, size, mime = mime_type, "not loading content");
        return Ok(FileCandidate::metadata_only(name, mime_type, size));
    }

    let bytes = tokio::fs::read(path).await.map_err(with_path)?;
    Ok(FileCandidate::new(name, mime_type, bytes))
}

/// Read every path, skipping the ones that cannot be read.
pub async fn read_candidates(paths: &[PathBuf], policy: &IntakePolicy) -> Vec<FileCandidate> {
    let mut candidates = Vec::with_capacity(paths.len());
    for path in paths {
        match read_candidate(path, policy).await {
            Ok(candidate) => candidates.push(candidate),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable file"),
        }
    }
    candidates
}
