use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const DEFAULT_NOTICE_DELAY: Duration = Duration::from_millis(4000);

struct NoticeInner {
    tx: watch::Sender<bool>,
    delay: Duration,
    generation: AtomicU64,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl NoticeInner {
    /// Every generation bump and flag write happens with this held.
    fn timer(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clear the flag unless a raise or clear came after `generation`.
    fn expire(&self, generation: u64) -> bool {
        let _timer = self.timer();
        if self.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        self.tx.send_replace(false);
        true
    }
}

/// Transient "some files were too large" flag.
///
/// Raising it shows the notice and schedules an automatic clear after
/// `delay`. A newer raise restarts the countdown. Outside a tokio runtime the
/// flag stays up until [`OversizeNotice::clear`] is called.
#[derive(Clone)]
pub struct OversizeNotice {
    inner: Arc<NoticeInner>,
}

impl OversizeNotice {
    pub fn new(delay: Duration) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            inner: Arc::new(NoticeInner {
                tx,
                delay,
                generation: AtomicU64::new(0),
                timer: Mutex::new(None),
            }),
        }
    }

    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    pub fn is_visible(&self) -> bool {
        *self.inner.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.tx.subscribe()
    }

    pub fn raise(&self) {
        let mut timer = self.inner.timer();
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.tx.send_replace(true);
        if let Some(previous) = timer.take() {
            previous.abort();
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(&self.inner);
                *timer = Some(handle.spawn(async move {
                    tokio::time::sleep(inner.delay).await;
                    inner.expire(generation);
                }));
            }
            Err(_) => {
                tracing::debug!("no runtime available, oversize notice stays up until cleared");
            }
        }
    }

    pub fn clear(&self) {
        let mut timer = self.inner.timer();
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(previous) = timer.take() {
            previous.abort();
        }
        self.inner.tx.send_replace(false);
    }
}

impl Default for OversizeNotice {
    fn default() -> Self {
        Self::new(DEFAULT_NOTICE_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn clears_after_delay() {
        let notice = OversizeNotice::new(Duration::from_millis(4000));
        notice.raise();
        assert!(notice.is_visible());

        tokio::time::sleep(Duration::from_millis(3900)).await;
        assert!(notice.is_visible());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!notice.is_visible());
    }

    #[tokio::test(start_paused = true)]
    async fn second_raise_restarts_countdown() {
        let notice = OversizeNotice::new(Duration::from_millis(1000));
        notice.raise();
        tokio::time::sleep(Duration::from_millis(800)).await;
        notice.raise();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(notice.is_visible());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(!notice.is_visible());
    }

    #[test]
    fn without_runtime_flag_persists_until_cleared() {
        let notice = OversizeNotice::default();
        notice.raise();
        assert!(notice.is_visible());
        notice.clear();
        assert!(!notice.is_visible());
    }

    #[test]
    fn stale_timer_leaves_a_newer_raise_visible() {
        let notice = OversizeNotice::default();
        notice.raise();
        let stale = notice.inner.generation.load(Ordering::SeqCst);
        notice.raise();

        assert!(!notice.inner.expire(stale));
        assert!(notice.is_visible());

        let current = notice.inner.generation.load(Ordering::SeqCst);
        assert!(notice.inner.expire(current));
        assert!(!notice.is_visible());
    }

    #[test]
    fn clear_invalidates_pending_expiry() {
        let notice = OversizeNotice::default();
        notice.raise();
        let raised = notice.inner.generation.load(Ordering::SeqCst);
        notice.clear();
        notice.raise();

        assert!(!notice.inner.expire(raised));
        assert!(notice.is_visible());
    }
}
