//! Off-thread execution for waveform reduction.
//!
//! - Inside a Tokio runtime: work runs on the runtime's blocking pool
//!   (`spawn_blocking`)
//! - Outside a runtime: work runs on a dedicated named OS thread
//!
//! Every submission carries a [`Completion`] that fires exactly once. If the
//! work panics, or the executor drops the job without running it, the
//! completion fires with its fallback value instead.
//!
//! # Examples
//!
//! ```rust
//! use core_audiofile::runner::{Completion, TaskRunner};
//! use std::sync::mpsc;
//!
//! let (tx, rx) = mpsc::channel();
//! let completion = Completion::new(move |value: u32| { let _ = tx.send(value); }, || 0);
//! TaskRunner::new().submit(|| 6 * 7, completion);
//! assert_eq!(rx.recv().unwrap(), 42);
//! ```

use std::fmt;
use tokio::runtime::Handle;
use tracing::{debug, error, warn};

const WORKER_THREAD_NAME: &str = "audiofile-waveform";

type Callback<T> = Box<dyn FnOnce(T) + Send>;
type Fallback<T> = Box<dyn FnOnce() -> T + Send>;

/// Exactly-once result delivery.
pub struct Completion<T> {
    callback: Option<Callback<T>>,
    fallback: Option<Fallback<T>>,
}

impl<T> Completion<T> {
    /// Create a completion invoking `callback` with the work's result, or with
    /// `fallback()` if the work never produces one.
    pub fn new<C, F>(callback: C, fallback: F) -> Self
    where
        C: FnOnce(T) + Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        Self {
            callback: Some(Box::new(callback)),
            fallback: Some(Box::new(fallback)),
        }
    }

    /// Deliver `value`.
    pub fn complete(mut self, value: T) {
        if let Some(callback) = self.callback.take() {
            callback(value);
        }
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        if let (Some(callback), Some(fallback)) = (self.callback.take(), self.fallback.take()) {
            warn!("Task ended without a result, delivering fallback");
            callback(fallback());
        }
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("pending", &self.callback.is_some())
            .finish()
    }
}

/// Schedules blocking work off the caller's thread.
#[derive(Debug, Clone, Default)]
pub struct TaskRunner {
    handle: Option<Handle>,
}

impl TaskRunner {
    /// Use the Tokio runtime current at submission time, if any.
    pub fn new() -> Self {
        Self::default()
    }

    /// Always use the blocking pool of `handle`.
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    /// Run `work` off the calling thread and hand its result to `completion`.
    pub fn submit<T, W>(&self, work: W, completion: Completion<T>)
    where
        T: Send + 'static,
        W: FnOnce() -> T + Send + 'static,
    {
        let job = move || {
            let value = work();
            completion.complete(value);
        };

        match self.handle.clone().or_else(|| Handle::try_current().ok()) {
            Some(handle) => {
                debug!("Submitting task to the Tokio blocking pool");
                // Detached: the completion reports the outcome
                drop(handle.spawn_blocking(job));
            }
            None => {
                debug!("No Tokio runtime, submitting task to a worker thread");
                if let Err(e) = std::thread::Builder::new()
                    .name(WORKER_THREAD_NAME.to_string())
                    .spawn(job)
                {
                    error!("Failed to spawn {} thread: {}", WORKER_THREAD_NAME, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc};
    use std::time::Duration;

    fn counted(counter: Arc<AtomicUsize>, tx: mpsc::Sender<u32>) -> Completion<u32> {
        Completion::new(
            move |value| {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send(value);
            },
            || 0,
        )
    }

    #[test]
    fn runs_on_named_thread_without_runtime() {
        let (tx, rx) = mpsc::channel();
        let completion = Completion::new(
            move |name: Option<String>| {
                let _ = tx.send(name);
            },
            || None,
        );

        TaskRunner::new().submit(
            || std::thread::current().name().map(str::to_string),
            completion,
        );

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some(WORKER_THREAD_NAME));
    }

    #[test]
    fn panicking_work_delivers_fallback_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel();

        TaskRunner::new().submit(
            || -> u32 { panic!("reduction failed") },
            counted(calls.clone(), tx),
        );

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 0);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_completion_delivers_fallback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel();

        drop(counted(calls.clone(), tx));

        assert_eq!(rx.recv().unwrap(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn uses_blocking_pool_inside_runtime() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel();

        TaskRunner::new().submit(|| 7u32, counted(calls.clone(), tx));

        let value = tokio::task::spawn_blocking(move || rx.recv_timeout(Duration::from_secs(5)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
