//! Worker threads.
//!
//! Each worker runs one user closure on its own named OS thread. The bridge
//! keeps the worker's [`AbortToken`] in a registry for as long as the thread
//! lives, so a reset can interrupt every worker in one pass. Cancellation is
//! cooperative: a worker notices the interrupt the next time it schedules a
//! command, checkpoints or sleeps. A worker blocked in [`crate::Bridge::call`]
//! or [`crate::future::Future::result_in`] is woken immediately; a plain
//! [`crate::future::Future::result`] only wakes on reset.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::cx::{AbortToken, Cx};
use crate::dispatch::BridgeConfig;
use crate::error::{panic_message, Error, Result};
use crate::tracing_compat::{debug, warn};
use crate::types::{CancelReason, WorkerId};

/// Live worker tokens, keyed by worker id.
#[derive(Debug, Default)]
pub(crate) struct WorkerRegistry {
    live: Mutex<HashMap<WorkerId, AbortToken>>,
}

impl WorkerRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.live.lock().len()
    }

    /// Interrupts every live worker. Returns how many tokens flipped.
    pub(crate) fn interrupt_all(&self, reason: &CancelReason) -> usize {
        let tokens: Vec<AbortToken> = self.live.lock().values().cloned().collect();
        tokens
            .iter()
            .filter(|token| token.interrupt(reason.clone()))
            .count()
    }

    fn deregister(&self, id: WorkerId) {
        self.live.lock().remove(&id);
    }

    /// Starts `f` on a new thread.
    ///
    /// The token is registered before the generation is read and before the
    /// thread starts, so a reset racing with this call either sees the token
    /// or bumps the generation first.
    pub(crate) fn spawn<F>(
        self: &Arc<Self>,
        config: &BridgeConfig,
        generation: impl FnOnce() -> u64,
        f: F,
    ) -> Result<WorkerHandle>
    where
        F: FnOnce(Cx) -> Result<()> + Send + 'static,
    {
        let id = WorkerId::next();
        let token = AbortToken::new();
        self.live.lock().insert(id, token.clone());
        let generation = generation();

        let name = format!("{}-{}", config.thread_name_prefix, id.as_u64());
        let mut builder = thread::Builder::new().name(name);
        if let Some(size) = config.thread_stack_size {
            builder = builder.stack_size(size);
        }

        let registry = Arc::clone(self);
        let thread_token = token.clone();
        let spawned = builder.spawn(move || {
            let _registration = Registration { registry, id };
            let cx = Cx::worker(id, thread_token, generation);
            debug!(worker = %id, generation, "worker started");
            match f(cx) {
                Ok(()) => {
                    debug!(worker = %id, "worker finished");
                    Ok(())
                }
                Err(err) if err.is_interrupted() => {
                    debug!(worker = %id, reason = %err, "worker interrupted");
                    Ok(())
                }
                Err(err) => {
                    warn!(worker = %id, error = %err, "worker failed");
                    Err(err)
                }
            }
        });

        match spawned {
            Ok(thread) => Ok(WorkerHandle {
                id,
                token,
                thread: Some(thread),
            }),
            Err(io) => {
                self.deregister(id);
                warn!(worker = %id, error = %io, "failed to start worker thread");
                Err(Error::spawn_failed(id, io))
            }
        }
    }
}

/// Removes the worker's token when the thread exits, including by panic.
struct Registration {
    registry: Arc<WorkerRegistry>,
    id: WorkerId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        if thread::panicking() {
            warn!(worker = %self.id, "worker panicked");
        }
        self.registry.deregister(self.id);
    }
}

/// Handle to a worker thread started by [`crate::Bridge::spawn`].
///
/// Dropping the handle detaches the thread; the bridge still tracks and can
/// interrupt it.
#[derive(Debug)]
pub struct WorkerHandle {
    id: WorkerId,
    token: AbortToken,
    thread: Option<JoinHandle<Result<()>>>,
}

impl WorkerHandle {
    /// Returns the worker id.
    #[must_use]
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Interrupts this worker only, waking it if it is blocked in a
    /// context-aware wait. Returns false if it was already interrupted.
    pub fn interrupt(&self) -> bool {
        self.token.interrupt(CancelReason::user("worker interrupted by handle"))
    }

    /// Returns true once this worker's token was interrupted.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.token.is_interrupted()
    }

    /// Returns true once the thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Waits for the thread to exit.
    ///
    /// Returns the closure's error unless it was an interruption, and
    /// `ErrorKind::Panicked` if the closure panicked.
    pub fn join(mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        match thread.join() {
            Ok(result) => result,
            Err(payload) => Err(Error::worker_panicked(
                self.id,
                &panic_message(payload.as_ref()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_utils::{init_test_logging, wait_until};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    fn registry() -> Arc<WorkerRegistry> {
        Arc::new(WorkerRegistry::new())
    }

    #[test]
    fn worker_runs_on_named_thread() {
        init_test("worker_runs_on_named_thread");
        let registry = registry();
        let config = BridgeConfig {
            thread_name_prefix: "test-worker".into(),
            ..BridgeConfig::default()
        };
        let (tx, rx) = std::sync::mpsc::channel();
        let handle = registry
            .spawn(&config, || 3, move |cx| {
                let name = thread::current().name().map(str::to_string);
                tx.send((name, cx.generation(), cx.worker_id())).ok();
                Ok(())
            })
            .unwrap();
        let id = handle.id();
        handle.join().unwrap();

        let (name, generation, worker) = rx.recv().unwrap();
        assert_eq!(name, Some(format!("test-worker-{}", id.as_u64())));
        assert_eq!(generation, Some(3));
        assert_eq!(worker, Some(id));
        assert!(wait_until(Duration::from_secs(5), || registry.len() == 0));
        crate::test_complete!("worker_runs_on_named_thread");
    }

    #[test]
    fn interrupt_all_stops_sleeping_workers_cleanly() {
        init_test("interrupt_all_stops_sleeping_workers_cleanly");
        let registry = registry();
        let config = BridgeConfig::default();
        let handles: Vec<_> = (0..3)
            .map(|_| {
                registry
                    .spawn(&config, || 0, |cx| loop {
                        cx.sleep(Duration::from_millis(5))?;
                    })
                    .unwrap()
            })
            .collect();
        assert_eq!(registry.len(), 3);

        let flipped = registry.interrupt_all(&CancelReason::reset());
        crate::assert_with_log!(flipped == 3, "interrupted", 3, flipped);
        for handle in handles {
            assert!(handle.is_interrupted());
            handle.join().unwrap();
        }
        assert!(wait_until(Duration::from_secs(5), || registry.len() == 0));
        crate::test_complete!("interrupt_all_stops_sleeping_workers_cleanly");
    }

    #[test]
    fn errors_and_panics_surface_at_join() {
        init_test("errors_and_panics_surface_at_join");
        let registry = registry();
        let config = BridgeConfig::default();

        let failing = registry
            .spawn(&config, || 0, |_| Err(Error::user("lost connection")))
            .unwrap();
        let err = failing.join().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::User);

        let panicking = registry
            .spawn(&config, || 0, |_| panic!("worker blew up"))
            .unwrap();
        let err = panicking.join().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Panicked);
        assert!(err.to_string().contains("worker blew up"));
        assert!(wait_until(Duration::from_secs(5), || registry.len() == 0));
        crate::test_complete!("errors_and_panics_surface_at_join");
    }

    #[test]
    fn handle_interrupts_single_worker() {
        init_test("handle_interrupts_single_worker");
        let registry = registry();
        let config = BridgeConfig::default();
        let loops = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&loops);
        let handle = registry
            .spawn(&config, || 0, move |cx| loop {
                cx.checkpoint()?;
                counter.fetch_add(1, Ordering::Relaxed);
                cx.sleep(Duration::from_millis(1))?;
            })
            .unwrap();

        assert!(wait_until(Duration::from_secs(5), || loops.load(Ordering::Relaxed) > 0));
        assert!(!handle.is_finished());
        assert!(handle.interrupt());
        assert!(!handle.interrupt());
        handle.join().unwrap();
        crate::test_complete!("handle_interrupts_single_worker");
    }
}
