//! Shared rate-limited call queue
//!
//! One instance is constructed at startup and handed to every component that
//! issues frequent/cheap provider calls. It guarantees, across all callers:
//! - at most `max_concurrent` tasks in flight
//! - dispatch starts at least `min_spacing` apart
//! - FIFO dispatch order (completion order is unconstrained)
//!
//! All state lives behind one mutex and a scheduling pass never awaits or
//! spawns while holding it, so the ceiling and spacing checks are atomic with respect to
//! each other.

use super::backoff_retrier::{with_backoff, RetryPolicy};
use super::provider::{GenerateRequest, GenerativeModel, ModelResponse};
use crate::error::CallError;
use futures::future::BoxFuture;
use icoach_common::config::QueueSettings;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;

type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Queue limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    pub max_concurrent: usize,
    pub min_spacing: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            min_spacing: Duration::from_millis(500),
        }
    }
}

impl From<&QueueSettings> for QueueConfig {
    fn from(settings: &QueueSettings) -> Self {
        Self {
            max_concurrent: settings.max_concurrent.max(1),
            min_spacing: Duration::from_millis(settings.min_spacing_ms),
        }
    }
}

/// Snapshot of queue depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub in_flight: usize,
}

struct QueueState {
    pending: VecDeque<Job>,
    in_flight: usize,
    last_dispatch: Option<Instant>,
    /// A deferred re-check is already scheduled
    recheck_armed: bool,
}

struct Inner {
    config: QueueConfig,
    state: Mutex<QueueState>,
}

/// Concurrency- and spacing-limited FIFO of provider calls
///
/// Cloning is cheap and yields a handle to the same queue.
#[derive(Clone)]
pub struct RateLimitedQueue {
    inner: Arc<Inner>,
}

impl RateLimitedQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config: QueueConfig {
                    max_concurrent: config.max_concurrent.max(1),
                    min_spacing: config.min_spacing,
                },
                state: Mutex::new(QueueState {
                    pending: VecDeque::new(),
                    in_flight: 0,
                    last_dispatch: None,
                    recheck_armed: false,
                }),
            }),
        }
    }

    pub fn config(&self) -> QueueConfig {
        self.inner.config
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.inner.lock();
        QueueStats {
            pending: state.pending.len(),
            in_flight: state.in_flight,
        }
    }

    /// Enqueue `task`; resolves with exactly what the task resolves with
    ///
    /// The task is not started until the concurrency and spacing limits
    /// allow it. If the task is dropped before completing (panic, runtime
    /// shutdown) the caller gets [`CallError::TaskAborted`].
    pub async fn add<F, Fut, T>(&self, task: F) -> Result<T, CallError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, CallError>> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        let job: Job = Box::new(move || {
            Box::pin(async move {
                let _ = tx.send(task().await);
            })
        });

        {
            let mut state = self.inner.lock();
            state.pending.push_back(job);
            debug!(pending = state.pending.len(), "Task queued");
        }

        Inner::schedule(&self.inner);

        rx.await
            .map_err(|_| CallError::TaskAborted("task dropped before completion".to_string()))?
    }

    /// Queue one provider call, retried per `policy` once dispatched
    ///
    /// The slot is held for the whole retry loop, so backoff sleeps count
    /// against the concurrency ceiling.
    pub async fn call(
        &self,
        model: Arc<dyn GenerativeModel>,
        request: GenerateRequest,
        policy: RetryPolicy,
    ) -> Result<ModelResponse, CallError> {
        self.add(move || async move {
            with_backoff(&policy, || model.generate(request.clone())).await
        })
        .await
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Scheduling pass: dispatch as many pending tasks as the limits allow,
    /// arming a single deferred re-check when spacing is the blocker
    fn schedule(this: &Arc<Inner>) {
        // Guards dropped during runtime shutdown have nowhere to spawn
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        // Spawn only with the lock released: a runtime that is shutting down
        // drops the future immediately, and the guard's drop re-locks.
        let (ready, recheck) = Inner::take_ready(this);

        for job in ready {
            let guard = InFlightGuard {
                inner: Arc::clone(this),
            };
            runtime.spawn(async move {
                let _guard = guard;
                job().await;
            });
        }

        if let Some(wait) = recheck {
            let inner = Arc::clone(this);
            runtime.spawn(async move {
                tokio::time::sleep(wait).await;
                inner.lock().recheck_armed = false;
                Inner::schedule(&inner);
            });
        }
    }

    /// Claim every job the limits allow right now
    ///
    /// Claimed jobs already count as in flight. Returns the wait before the
    /// next re-check when spacing blocks and no re-check is armed yet.
    fn take_ready(this: &Arc<Inner>) -> (Vec<Job>, Option<Duration>) {
        let mut state = this.lock();
        let mut ready = Vec::new();

        loop {
            if state.in_flight >= this.config.max_concurrent || state.pending.is_empty() {
                return (ready, None);
            }

            let now = Instant::now();
            if let Some(last) = state.last_dispatch {
                let elapsed = now.saturating_duration_since(last);
                if elapsed < this.config.min_spacing {
                    if state.recheck_armed {
                        return (ready, None);
                    }
                    state.recheck_armed = true;
                    return (ready, Some(this.config.min_spacing - elapsed));
                }
            }

            let Some(job) = state.pending.pop_front() else {
                return (ready, None);
            };
            state.in_flight += 1;
            state.last_dispatch = Some(now);
            debug!(
                in_flight = state.in_flight,
                pending = state.pending.len(),
                "Dispatching queued task"
            );
            ready.push(job);
        }
    }
}

/// Releases the in-flight slot when the task finishes, panics or is dropped
struct InFlightGuard {
    inner: Arc<Inner>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        {
            let mut state = self.inner.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        Inner::schedule(&self.inner);
    }
}
