use crate::models::classify_types::ClassificationState;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_FILE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of an accepted file. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FileId(u64);

impl FileId {
    pub fn next() -> Self {
        FileId(NEXT_FILE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Revocable reference used to render a held file without re-reading it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DisplayHandle(pub(crate) u64);

impl DisplayHandle {
    pub fn url(&self) -> String {
        format!("blob:deep-img/{}", self.0)
    }
}

/// A file offered for intake: name, size, mime type and content.
#[derive(Debug, Clone)]
pub struct FileCandidate {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub bytes: Arc<[u8]>,
}

impl FileCandidate {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Candidate intake will reject on its metadata alone, so its content is
    /// never loaded.
    pub fn metadata_only(name: impl Into<String>, mime_type: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: mime_type.into(),
            bytes: Vec::<u8>::new().into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ManagedFile {
    pub id: FileId,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    #[serde(skip)]
    pub bytes: Arc<[u8]>,
    pub display: DisplayHandle,
    pub state: ClassificationState,
}

impl ManagedFile {
    pub fn key(&self) -> (&str, u64) {
        (&self.name, self.size)
    }
}

/// Outcome of one AddFiles batch.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct IntakeReport {
    pub accepted: Vec<FileId>,
    pub rejected_type: Vec<String>,
    pub duplicates: Vec<String>,
    pub oversized: Vec<String>,
}

impl IntakeReport {
    pub fn has_oversized(&self) -> bool {
        !self.oversized.is_empty()
    }
}

/// Row of the file list as shown to the user.
#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub index: usize,
    pub id: FileId,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub display_url: String,
    pub state: ClassificationState,
    /// Top prediction as "<display name>, <pct>%".
    pub badge: Option<String>,
}

impl FileEntry {
    pub fn from_file(index: usize, file: &ManagedFile) -> Self {
        let badge = file
            .state
            .result()
            .and_then(|r| r.top())
            .map(|top| format!("{}, {}%", top.display_name(), top.percent()));
        Self {
            index,
            id: file.id,
            name: file.name.clone(),
            size: file.size,
            mime_type: file.mime_type.clone(),
            display_url: file.display.url(),
            state: file.state.clone(),
            badge,
        }
    }
}
