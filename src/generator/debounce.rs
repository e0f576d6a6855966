//! Commit-on-settle input: edits re-arm a timer, the value is committed
//! once the input has been quiet for `delay`, and blur commits at once.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

type Commit<T> = Arc<dyn Fn(T) + Send + Sync>;

pub struct Debouncer<T> {
    delay: Duration,
    commit: Commit<T>,
    latest: Arc<Mutex<Option<T>>>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl<T> Debouncer<T>
where
    T: Clone + Send + 'static,
{
    pub fn new(delay: Duration, commit: impl Fn(T) + Send + Sync + 'static) -> Self {
        Self {
            delay,
            commit: Arc::new(commit),
            latest: Arc::new(Mutex::new(None)),
            pending: Mutex::new(None),
        }
    }

    /// Record an edit and restart the quiet-period timer.
    /// Must be called from within a tokio runtime.
    pub fn edit(&self, value: T) {
        *self.latest.lock() = Some(value);

        let delay = self.delay;
        let latest = Arc::clone(&self.latest);
        let commit = Arc::clone(&self.commit);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let value = latest.lock().clone();
            if let Some(value) = value {
                commit(value);
            }
        });

        if let Some(previous) = self.pending.lock().replace(task) {
            previous.abort();
        }
    }

    /// Focus loss: cancel the timer and commit the last edit right away,
    /// even if the timer already committed it.
    pub fn flush(&self) {
        self.cancel();
        let value = self.latest.lock().clone();
        if let Some(value) = value {
            (self.commit)(value);
        }
    }

    /// Drop any pending commit without applying it.
    pub fn cancel(&self) {
        if let Some(task) = self.pending.lock().take() {
            task.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(task) = self.pending.get_mut().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording() -> (Arc<Mutex<Vec<String>>>, impl Fn(String) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |value: String| sink.lock().push(value))
    }

    #[tokio::test(start_paused = true)]
    async fn commits_only_after_quiet_period() {
        let (seen, commit) = recording();
        let debouncer = Debouncer::new(DEFAULT_DEBOUNCE, commit);

        debouncer.edit("#1".into());
        tokio::time::sleep(Duration::from_millis(200)).await;
        debouncer.edit("#12".into());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(seen.lock().is_empty());
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(seen.lock().as_slice(), ["#12"]);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn flush_commits_immediately() {
        let (seen, commit) = recording();
        let debouncer = Debouncer::new(DEFAULT_DEBOUNCE, commit);

        debouncer.edit("#abc".into());
        debouncer.flush();
        assert_eq!(seen.lock().as_slice(), ["#abc"]);

        // The cancelled timer must not commit a second time
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(seen.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_reapplies_after_settle() {
        let (seen, commit) = recording();
        let debouncer = Debouncer::new(DEFAULT_DEBOUNCE, commit);

        debouncer.edit("#fff".into());
        tokio::time::sleep(Duration::from_secs(1)).await;
        debouncer.flush();
        assert_eq!(seen.lock().as_slice(), ["#fff", "#fff"]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_pending_edit() {
        let (seen, commit) = recording();
        let debouncer = Debouncer::new(DEFAULT_DEBOUNCE, commit);

        debouncer.edit("#000".into());
        debouncer.cancel();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(seen.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn flush_without_edits_is_a_noop() {
        let (seen, commit) = recording();
        let debouncer = Debouncer::<String>::new(DEFAULT_DEBOUNCE, commit);
        debouncer.flush();
        assert!(seen.lock().is_empty());
    }
}
