//! Generation-keyed debounced jobs.
//!
//! Every `schedule` call bumps the generation and spawns a sleeper. When the
//! sleeper wakes it runs its job only if no newer call happened meanwhile, so
//! a burst of changes collapses into one run with the latest state.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, trace};

/// Shared cancellation for every debouncer of one owner.
#[derive(Debug, Default)]
pub struct Shutdown {
    closed: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn trigger(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct Debouncer {
    name: &'static str,
    delay: Duration,
    generation: Arc<AtomicU64>,
    shutdown: Arc<Shutdown>,
}

impl Debouncer {
    pub fn new(name: &'static str, delay: Duration, shutdown: Arc<Shutdown>) -> Self {
        Self {
            name,
            delay,
            generation: Arc::new(AtomicU64::new(0)),
            shutdown,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// True while no newer schedule or cancel happened since `generation`.
    pub fn is_current(&self, generation: u64) -> bool {
        !self.shutdown.is_closed() && self.generation() == generation
    }

    /// Make every pending sleeper stale.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Schedule `job` to run after the debounce delay, unless superseded.
    /// The job receives its generation so it can re-check staleness after
    /// waiting on locks. Without a Tokio runtime nothing is scheduled.
    pub fn schedule<F, Fut>(&self, job: F)
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.shutdown.is_closed() {
            return;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                debug!(job = self.name, "No runtime, debounced job not scheduled");
                return;
            }
        };

        let this = self.clone();
        handle.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(this.delay) => {}
                _ = this.shutdown.notify.notified() => {
                    trace!(job = this.name, "Debounced job cancelled");
                    return;
                }
            }
            if !this.is_current(generation) {
                trace!(job = this.name, generation, "Debounced job superseded");
                return;
            }
            job(generation).await;
        });
    }
}
