use std::future::Future;
use tokio::task::JoinHandle;
use tokio::time::Duration;

struct PendingTask {
    token: u64,
    handle: JoinHandle<()>,
}

/// Cancellable delayed task. Scheduling again aborts whatever is still
/// waiting, so at most one commit is ever pending.
pub struct Debouncer {
    delay: Duration,
    next_token: u64,
    pending: Option<PendingTask>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_token: 0,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Spawns `task(token)` after the quiet period. The task should call
    /// [`Debouncer::complete`] with its token before committing anything.
    /// Must be called from within a tokio runtime.
    pub fn schedule<F, Fut>(&mut self, task: F) -> u64
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.cancel() {
            tracing::trace!("superseded pending debounced task");
        }
        self.next_token += 1;
        let token = self.next_token;
        let delay = self.delay;
        let work = task(token);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            work.await;
        });
        self.pending = Some(PendingTask { token, handle });
        token
    }

    /// Marks the task identified by `token` as fired. Returns false when it was
    /// superseded or cancelled in the meantime.
    pub fn complete(&mut self, token: u64) -> bool {
        match &self.pending {
            Some(pending) if pending.token == token => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::Debouncer;
    use std::sync::{Arc, Mutex};
    use tokio::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn only_last_scheduled_task_runs() {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let mut debouncer = Debouncer::new(Duration::from_millis(300));

        for value in ["a", "ab", "abc"] {
            let fired = fired.clone();
            debouncer.schedule(move |_| async move {
                fired.lock().expect("fired lock").push(value.to_string());
            });
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(*fired.lock().expect("fired lock"), vec!["abc".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_pending_task() {
        let fired = Arc::new(Mutex::new(0usize));
        let mut debouncer = Debouncer::new(Duration::from_millis(50));
        let counter = fired.clone();
        debouncer.schedule(move |_| async move {
            *counter.lock().expect("counter lock") += 1;
        });
        assert!(debouncer.is_pending());
        assert!(debouncer.cancel());
        assert!(!debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(*fired.lock().expect("counter lock"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn complete_rejects_stale_tokens() {
        let mut debouncer = Debouncer::new(Duration::from_millis(10));
        let first = debouncer.schedule(|_| async {});
        let second = debouncer.schedule(|_| async {});
        assert!(!debouncer.complete(first));
        assert!(debouncer.complete(second));
        assert!(!debouncer.complete(second));
    }
}
