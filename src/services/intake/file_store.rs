use crate::models::classify_types::{ClassificationResult, ClassificationState};
use crate::models::file_types::{DisplayHandle, FileCandidate, FileId, IntakeReport, ManagedFile};
use crate::services::intake::display_store::DisplayStore;
use crate::services::intake::notice::OversizeNotice;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

pub const MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;
pub const ALLOWED_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

#[derive(Debug, Clone)]
pub struct IntakePolicy {
    pub max_file_size: u64,
    pub allowed_mime_types: Vec<String>,
}

impl Default for IntakePolicy {
    fn default() -> Self {
        Self {
            max_file_size: MAX_FILE_SIZE,
            allowed_mime_types: ALLOWED_MIME_TYPES.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl IntakePolicy {
    pub fn allows(&self, mime_type: &str) -> bool {
        self.allowed_mime_types.iter().any(|m| m == mime_type)
    }
}

/// Immutable snapshot of the accepted files, in arrival order.
///
/// Each record carries its display handle and classification slot, so the
/// three parallel views below always have the same length.
#[derive(Debug, Clone, Default)]
pub struct FileCollection {
    files: Vec<Arc<ManagedFile>>,
}

impl FileCollection {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> &[Arc<ManagedFile>] {
        &self.files
    }

    pub fn get(&self, index: usize) -> Option<&Arc<ManagedFile>> {
        self.files.get(index)
    }

    pub fn position(&self, id: FileId) -> Option<usize> {
        self.files.iter().position(|f| f.id == id)
    }

    pub fn find(&self, id: FileId) -> Option<&Arc<ManagedFile>> {
        self.files.iter().find(|f| f.id == id)
    }

    pub fn contains_key(&self, name: &str, size: u64) -> bool {
        self.files.iter().any(|f| f.key() == (name, size))
    }

    pub fn display_handles(&self) -> Vec<DisplayHandle> {
        self.files.iter().map(|f| f.display).collect()
    }

    pub fn classification_outputs(&self) -> Vec<Option<&ClassificationResult>> {
        self.files.iter().map(|f| f.state.result()).collect()
    }

    /// True when no file is still waiting for a classification.
    pub fn all_settled(&self) -> bool {
        self.files.iter().all(|f| !f.state.is_pending())
    }

    fn with_state(&self, index: usize, state: ClassificationState) -> FileCollection {
        let mut files = self.files.clone();
        let mut record = (*files[index]).clone();
        record.state = state;
        files[index] = Arc::new(record);
        FileCollection { files }
    }
}

struct StoreInner {
    state: Mutex<Arc<FileCollection>>,
    displays: DisplayStore,
    notice: OversizeNotice,
    policy: IntakePolicy,
    run_in_flight: AtomicBool,
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for file in state.files() {
            self.displays.release(file.display);
        }
    }
}

/// Single owner of the file collection.
///
/// All mutators swap the whole collection under one lock, so readers only
/// ever see complete snapshots. Display handles are created on intake and
/// released on removal, on [`FileStore::clear`], or when the last clone of
/// the store is dropped.
#[derive(Clone)]
pub struct FileStore {
    inner: Arc<StoreInner>,
}

impl FileStore {
    pub fn new(policy: IntakePolicy, notice_delay: Duration) -> Self {
        Self::with_displays(policy, notice_delay, DisplayStore::new())
    }

    pub fn with_displays(policy: IntakePolicy, notice_delay: Duration, displays: DisplayStore) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(Arc::new(FileCollection::default())),
                displays,
                notice: OversizeNotice::new(notice_delay),
                policy,
                run_in_flight: AtomicBool::new(false),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Arc<FileCollection>> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Arc<FileCollection> {
        Arc::clone(&self.lock())
    }

    pub fn displays(&self) -> &DisplayStore {
        &self.inner.displays
    }

    pub fn notice(&self) -> &OversizeNotice {
        &self.inner.notice
    }

    pub fn policy(&self) -> &IntakePolicy {
        &self.inner.policy
    }

    /// AddFiles: accept allowed, unseen candidates up to the size limit.
    pub fn add_files(&self, candidates: Vec<FileCandidate>) -> IntakeReport {
        let policy = &self.inner.policy;
        let mut report = IntakeReport::default();
        let mut guard = self.lock();

        let mut seen: HashSet<(String, u64)> = HashSet::new();
        let mut filtered = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if !policy.allows(&candidate.mime_type) {
                debug!(name = %candidate.name, mime = %candidate.mime_type, "skipping unsupported type");
                report.rejected_type.push(candidate.name);
                continue;
            }
            if guard.contains_key(&candidate.name, candidate.size)
                || !seen.insert((candidate.name.clone(), candidate.size))
            {
                debug!(name = %candidate.name, size = candidate.size, "skipping duplicate");
                report.duplicates.push(candidate.name);
                continue;
            }
            filtered.push(candidate);
        }

        if filtered.is_empty() {
            return report;
        }

        let mut files = guard.files.clone();
        for candidate in filtered {
            if candidate.size > policy.max_file_size {
                debug!(name = %candidate.name, size = candidate.size, "skipping oversized file");
                report.oversized.push(candidate.name);
                continue;
            }
            let display = self.inner.displays.create(&candidate.mime_type, Arc::clone(&candidate.bytes));
            let id = FileId::next();
            files.push(Arc::new(ManagedFile {
                id,
                name: candidate.name,
                size: candidate.size,
                mime_type: candidate.mime_type,
                bytes: candidate.bytes,
                display,
                state: ClassificationState::Pending,
            }));
            report.accepted.push(id);
        }
        *guard = Arc::new(FileCollection { files });
        drop(guard);

        if report.has_oversized() {
            self.inner.notice.raise();
        } else {
            self.inner.notice.clear();
        }

        report
    }

    /// RemoveFile: out-of-range indices are ignored and return `None`.
    pub fn remove_file(&self, index: usize) -> Option<Arc<ManagedFile>> {
        let mut guard = self.lock();
        if index >= guard.len() {
            return None;
        }
        let mut files = guard.files.clone();
        let removed = files.remove(index);
        self.inner.displays.release(removed.display);
        *guard = Arc::new(FileCollection { files });
        Some(removed)
    }

    pub fn remove_file_by_id(&self, id: FileId) -> Option<Arc<ManagedFile>> {
        let mut guard = self.lock();
        let index = guard.position(id)?;
        let mut files = guard.files.clone();
        let removed = files.remove(index);
        self.inner.displays.release(removed.display);
        *guard = Arc::new(FileCollection { files });
        Some(removed)
    }

    /// SetClassificationResult by position. Last write wins; out-of-range is ignored.
    pub fn set_classification_result(&self, index: usize, result: ClassificationResult) -> bool {
        let mut guard = self.lock();
        if index >= guard.len() {
            return false;
        }
        let next = guard.with_state(index, ClassificationState::Classified { predictions: result });
        *guard = Arc::new(next);
        true
    }

    /// Writes a classification slot keyed by id. Writes for removed files are dropped.
    pub fn set_classification_state(&self, id: FileId, state: ClassificationState) -> bool {
        let mut guard = self.lock();
        let Some(index) = guard.position(id) else {
            debug!(%id, "dropping classification state for removed file");
            return false;
        };
        let next = guard.with_state(index, state);
        *guard = Arc::new(next);
        true
    }

    /// Teardown: releases every display handle and empties the collection.
    pub fn clear(&self) -> usize {
        let mut guard = self.lock();
        let count = guard.len();
        for file in guard.files() {
            self.inner.displays.release(file.display);
        }
        *guard = Arc::new(FileCollection::default());
        count
    }

    /// Marks a classification run as started. `None` if one is already running.
    pub fn begin_run(&self) -> Option<RunGuard> {
        self.inner
            .run_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RunGuard {
                store: self.clone(),
            })
    }

    pub fn is_running(&self) -> bool {
        self.inner.run_in_flight.load(Ordering::SeqCst)
    }
}

/// Clears the in-flight flag when the run ends, however it ends.
pub struct RunGuard {
    store: FileStore,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.store.inner.run_in_flight.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::classify_types::Prediction;

    fn store() -> FileStore {
        FileStore::new(IntakePolicy::default(), Duration::from_millis(4000))
    }

    fn image(name: &str, mime: &str, size: usize) -> FileCandidate {
        FileCandidate::new(name, mime, vec![0u8; size])
    }

    fn assert_parallel(collection: &FileCollection) {
        assert_eq!(collection.files().len(), collection.display_handles().len());
        assert_eq!(collection.files().len(), collection.classification_outputs().len());
    }

    #[test]
    fn metadata_only_candidates_are_reported_without_content() {
        let store = store();
        let report = store.add_files(vec![
            FileCandidate::metadata_only("huge.jpg", "image/jpeg", 2 * 1024 * 1024 * 1024),
            FileCandidate::metadata_only("clip.gif", "image/gif", 12),
        ]);

        assert!(report.accepted.is_empty());
        assert_eq!(report.oversized, vec!["huge.jpg".to_string()]);
        assert_eq!(report.rejected_type, vec!["clip.gif".to_string()]);
        assert!(store.snapshot().is_empty());
        assert_eq!(store.displays().created_count(), 0);
        assert!(store.notice().is_visible());
    }

    #[test]
    fn mixed_batch_keeps_parallel_views_aligned() {
        let store = store();
        let report = store.add_files(vec![
            image("a.jpg", "image/jpeg", 10),
            image("b.gif", "image/gif", 10),
            image("c.png", "image/png", (MAX_FILE_SIZE + 1) as usize),
            image("d.webp", "image/webp", 20),
            image("a.jpg", "image/jpeg", 10),
        ]);

        let snapshot = store.snapshot();
        assert_parallel(&snapshot);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(report.accepted.len(), 2);
        assert_eq!(report.rejected_type, vec!["b.gif".to_string()]);
        assert_eq!(report.oversized, vec!["c.png".to_string()]);
        assert_eq!(report.duplicates, vec!["a.jpg".to_string()]);
        assert_eq!(snapshot.get(0).unwrap().name, "a.jpg");
        assert_eq!(snapshot.get(1).unwrap().name, "d.webp");
        assert!(snapshot.classification_outputs().iter().all(|o| o.is_none()));
    }

    #[test]
    fn duplicate_name_and_size_never_grows_collection() {
        let store = store();
        store.add_files(vec![image("cat.png", "image/png", 100)]);
        let report = store.add_files(vec![image("cat.png", "image/png", 100)]);
        assert_eq!(store.snapshot().len(), 1);
        assert!(report.accepted.is_empty());

        // Same name with a different size is a different file.
        store.add_files(vec![image("cat.png", "image/png", 101)]);
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn exactly_limit_is_accepted_one_over_is_rejected() {
        let store = store();
        let report = store.add_files(vec![image("ok.jpg", "image/jpeg", MAX_FILE_SIZE as usize)]);
        assert_eq!(report.accepted.len(), 1);
        assert!(!store.notice().is_visible());

        let report = store.add_files(vec![image("big.jpg", "image/jpeg", MAX_FILE_SIZE as usize + 1)]);
        assert!(report.accepted.is_empty());
        assert!(report.has_oversized());
        assert!(store.notice().is_visible());
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn empty_filtered_batch_is_a_no_op() {
        let store = store();
        store.add_files(vec![image("a.jpg", "image/jpeg", 10)]);
        let before = store.snapshot();
        let created = store.displays().created_count();

        store.add_files(vec![image("x.bmp", "image/bmp", 10), image("a.jpg", "image/jpeg", 10)]);
        let after = store.snapshot();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(store.displays().created_count(), created);
    }

    #[test]
    fn valid_batch_clears_previous_notice() {
        let store = store();
        store.add_files(vec![image("big.jpg", "image/jpeg", MAX_FILE_SIZE as usize + 1)]);
        assert!(store.notice().is_visible());
        store.add_files(vec![image("small.jpg", "image/jpeg", 1)]);
        assert!(!store.notice().is_visible());
    }

    #[test]
    fn remove_shifts_later_entries_and_releases_handle() {
        let store = store();
        store.add_files(vec![
            image("a.jpg", "image/jpeg", 1),
            image("b.jpg", "image/jpeg", 2),
            image("c.jpg", "image/jpeg", 3),
        ]);
        store.set_classification_result(2, vec![Prediction::new("art", 0.7)].into());
        let before = store.snapshot();
        let handle_b = before.get(1).unwrap().display;

        let removed = store.remove_file(1).unwrap();
        assert_eq!(removed.name, "b.jpg");
        assert!(!store.displays().is_live(handle_b));

        let after = store.snapshot();
        assert_eq!(after.len(), before.len() - 1);
        assert_parallel(&after);
        assert_eq!(after.get(0).unwrap().id, before.get(0).unwrap().id);
        assert_eq!(after.get(1).unwrap().id, before.get(2).unwrap().id);
        assert_eq!(after.get(1).unwrap().display, before.get(2).unwrap().display);
        assert_eq!(after.get(1).unwrap().state, before.get(2).unwrap().state);
    }

    #[test]
    fn remove_out_of_range_is_ignored() {
        let store = store();
        store.add_files(vec![image("a.jpg", "image/jpeg", 1)]);
        assert!(store.remove_file(1).is_none());
        assert!(store.remove_file(usize::MAX).is_none());
        assert_eq!(store.snapshot().len(), 1);
        assert_eq!(store.displays().released_count(), 0);
    }

    #[test]
    fn set_result_twice_is_idempotent() {
        let store = store();
        store.add_files(vec![image("a.jpg", "image/jpeg", 1), image("b.jpg", "image/jpeg", 2)]);
        let result: ClassificationResult = vec![Prediction::new("food", 0.9)].into();

        assert!(store.set_classification_result(0, result.clone()));
        let once: Vec<_> = store.snapshot().files().iter().map(|f| f.state.clone()).collect();
        assert!(store.set_classification_result(0, result.clone()));
        let twice: Vec<_> = store.snapshot().files().iter().map(|f| f.state.clone()).collect();
        assert_eq!(once, twice);
        assert!(!store.set_classification_result(5, result));
    }

    #[test]
    fn state_write_for_removed_id_is_dropped() {
        let store = store();
        let report = store.add_files(vec![image("a.jpg", "image/jpeg", 1), image("b.jpg", "image/jpeg", 2)]);
        let (first, second) = (report.accepted[0], report.accepted[1]);

        store.remove_file_by_id(first);
        let written = store.set_classification_state(
            first,
            ClassificationState::Classified {
                predictions: vec![Prediction::new("dog", 0.8)].into(),
            },
        );
        assert!(!written);
        // The file that shifted into index 0 is untouched.
        assert_eq!(store.snapshot().get(0).unwrap().id, second);
        assert!(store.snapshot().get(0).unwrap().state.is_pending());
    }

    #[test]
    fn every_handle_released_exactly_once() {
        let displays = DisplayStore::new();
        {
            let store = FileStore::with_displays(IntakePolicy::default(), Duration::from_secs(4), displays.clone());
            store.add_files(vec![
                image("a.jpg", "image/jpeg", 1),
                image("b.jpg", "image/jpeg", 2),
                image("c.jpg", "image/jpeg", 3),
            ]);
            store.remove_file(0);
            store.add_files(vec![image("d.jpg", "image/jpeg", 4)]);
            assert_eq!(store.clear(), 3);
            store.add_files(vec![image("e.jpg", "image/jpeg", 5)]);
            // e.jpg is released when the store goes away.
        }
        assert_eq!(displays.live_count(), 0);
        assert_eq!(displays.created_count(), 5);
        assert_eq!(displays.released_count(), 5);
    }

    #[test]
    fn only_one_run_at_a_time() {
        let store = store();
        let guard = store.begin_run().unwrap();
        assert!(store.is_running());
        assert!(store.begin_run().is_none());
        drop(guard);
        assert!(!store.is_running());
        assert!(store.begin_run().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn oversize_notice_clears_after_delay() {
        let store = store();
        let two_mb = 2 * 1024 * 1024;
        let six_mb = 6 * 1024 * 1024;
        store.add_files(vec![image("photo.jpg", "image/jpeg", two_mb), image("scan.png", "image/png", six_mb)]);

        assert_eq!(store.snapshot().len(), 1);
        assert!(store.notice().is_visible());

        tokio::time::sleep(Duration::from_millis(4100)).await;
        assert!(!store.notice().is_visible());
    }
}
