//! Single-assignment result cells shared between a producer and any number
//! of blocked readers.
//!
//! A [`Future`] starts pending and moves to exactly one terminal
//! [`Outcome`]: a value, a failure, or an interruption. The write half,
//! [`Resolver`], is consumed by the write, so the owner of a command can
//! resolve its future at most once. Anyone holding the read half may still
//! call [`Future::interrupt`]; whichever write lands first wins and every
//! later write is rejected with [`ErrorKind::AlreadyResolved`].
//!
//! # Example
//!
//! ```
//! use hostbridge::future;
//!
//! let (resolver, fut) = future::channel::<u32>();
//! assert!(!fut.has_result());
//! resolver.set_result(7).unwrap();
//! assert_eq!(fut.result().unwrap(), 7);
//! ```
//!
//! [`ErrorKind::AlreadyResolved`]: crate::ErrorKind::AlreadyResolved

mod waiters;

pub use waiters::WaiterRegistry;
pub(crate) use waiters::{Waiter, WaiterGuard};

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::cx::{AbortToken, Cx};
use crate::error::{Error, Result};
use crate::tracing_compat::trace;
use crate::types::{CancelReason, FutureId, Outcome};

struct Shared<T> {
    id: FutureId,
    state: Mutex<Option<Outcome<T>>>,
    cond: Condvar,
}

impl<T> Shared<T> {
    fn new() -> Self {
        Self {
            id: FutureId::next(),
            state: Mutex::new(None),
            cond: Condvar::new(),
        }
    }

    fn complete(&self, outcome: Outcome<T>) -> Result<()> {
        let mut state = self.state.lock();
        if state.is_some() {
            return Err(Error::already_resolved(self.id));
        }
        trace!(future = %self.id, outcome = %outcome, "future resolved");
        *state = Some(outcome);
        drop(state);
        self.cond.notify_all();
        Ok(())
    }
}

impl<T: Send> Waiter for Shared<T> {
    fn interrupt_waiter(&self, reason: &CancelReason) -> bool {
        self.complete(Outcome::Interrupted(reason.clone())).is_ok()
    }

    fn wake_waiter(&self) {
        let _state = self.state.lock();
        self.cond.notify_all();
    }
}

/// The read half of a single-assignment result cell.
///
/// Cloning a future yields another reader of the same cell.
pub struct Future<T> {
    shared: Arc<Shared<T>>,
    waiters: Option<Arc<WaiterRegistry>>,
}

/// The write half of a single-assignment result cell.
///
/// Dropping a resolver that never wrote interrupts the future with
/// [`crate::CancelKind::Abandoned`], so readers never hang on a lost command.
pub struct Resolver<T> {
    shared: Option<Arc<Shared<T>>>,
}

/// Creates a pending future that is not tracked by any waiter registry.
#[must_use]
pub fn channel<T>() -> (Resolver<T>, Future<T>) {
    let shared = Arc::new(Shared::new());
    (
        Resolver {
            shared: Some(Arc::clone(&shared)),
        },
        Future {
            shared,
            waiters: None,
        },
    )
}

/// Creates a pending future whose blocked readers register in `waiters`.
pub(crate) fn tracked<T>(waiters: &Arc<WaiterRegistry>) -> (Resolver<T>, Future<T>) {
    let (resolver, mut future) = channel();
    future.waiters = Some(Arc::clone(waiters));
    (resolver, future)
}

impl<T> Future<T> {
    /// A pending future with no write half; only [`Future::interrupt`] can
    /// resolve it.
    pub(crate) fn unbound() -> Self {
        Self {
            shared: Arc::new(Shared::new()),
            waiters: None,
        }
    }

    /// Returns this future's identifier.
    #[must_use]
    pub fn id(&self) -> FutureId {
        self.shared.id
    }

    /// Returns true once any terminal outcome is stored.
    #[must_use]
    pub fn has_result(&self) -> bool {
        self.shared.state.lock().is_some()
    }

    /// Returns true if the future was interrupted.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.shared
            .state
            .lock()
            .as_ref()
            .is_some_and(Outcome::is_interrupted)
    }

    /// Returns the interruption reason, if the future was interrupted.
    #[must_use]
    pub fn interrupt_reason(&self) -> Option<CancelReason> {
        match self.shared.state.lock().as_ref() {
            Some(Outcome::Interrupted(reason)) => Some(reason.clone()),
            _ => None,
        }
    }

    /// Interrupts the future if it is still pending.
    ///
    /// Wakes every blocked reader. Fails with `AlreadyResolved` if a value,
    /// failure or earlier interruption was already stored.
    pub fn interrupt(&self, reason: CancelReason) -> Result<()> {
        self.shared.complete(Outcome::Interrupted(reason))
    }
}

impl<T: Clone + Send + 'static> Future<T> {
    /// Returns a snapshot of the outcome without blocking.
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome<T>> {
        self.shared.state.lock().clone()
    }

    /// Blocks until the future resolves.
    ///
    /// A stored failure is returned as an `ErrorKind::Failed` error and an
    /// interruption as `ErrorKind::Interrupted`.
    pub fn result(&self) -> Result<T> {
        self.wait(None, None)
    }

    /// Blocks until the future resolves or `cx`'s abort token is interrupted.
    ///
    /// An interrupted token returns `ErrorKind::Interrupted` with the token's
    /// reason and leaves the future itself pending for other readers. Host
    /// and detached contexts have no token and wait like [`Future::result`].
    pub fn result_in(&self, cx: &Cx) -> Result<T> {
        self.wait(None, cx.abort_token())
    }

    /// [`Future::result_timeout`] that also returns early when `cx`'s abort
    /// token is interrupted.
    pub fn result_timeout_in(&self, cx: &Cx, timeout: Duration) -> Result<T> {
        self.wait(Some(timeout), cx.abort_token())
    }

    /// Blocks for at most `timeout`.
    ///
    /// Returns `ErrorKind::Timeout` if the future is still pending when the
    /// wait elapses; a zero timeout never blocks. Timing out does not cancel
    /// the work that will eventually resolve the future.
    pub fn result_timeout(&self, timeout: Duration) -> Result<T> {
        self.wait(Some(timeout), None)
    }

    fn wait(&self, timeout: Option<Duration>, token: Option<&AbortToken>) -> Result<T> {
        let mut state = self.shared.state.lock();
        if let Some(outcome) = state.as_ref() {
            return outcome.clone().into_result();
        }
        if let Some(reason) = token.and_then(AbortToken::reason) {
            return Err(Error::interrupted(&reason));
        }
        if timeout == Some(Duration::ZERO) {
            return Err(Error::timeout(self.shared.id, Duration::ZERO));
        }

        let strong: Arc<dyn Waiter> = self.shared.clone();
        let _guard = self
            .waiters
            .as_ref()
            .map(|registry| registry.register(self.shared.id, Arc::downgrade(&strong)));
        // Must be registered with the token before the loop re-checks it.
        let _token_guard = token.map(|t| t.blocked_on(self.shared.id, Arc::downgrade(&strong)));
        drop(strong);

        // A deadline past the end of the clock waits without one.
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        loop {
            if let Some(outcome) = state.as_ref() {
                return outcome.clone().into_result();
            }
            if let Some(reason) = token.and_then(AbortToken::reason) {
                trace!(
                    future = %self.shared.id,
                    reason = %reason,
                    "wait abandoned: context interrupted"
                );
                return Err(Error::interrupted(&reason));
            }
            match deadline {
                None => self.shared.cond.wait(&mut state),
                Some(deadline) => {
                    if self.shared.cond.wait_until(&mut state, deadline).timed_out()
                        && state.is_none()
                    {
                        let waited = timeout.unwrap_or_default();
                        return Err(Error::timeout(self.shared.id, waited));
                    }
                }
            }
        }
    }
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            waiters: self.waiters.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.shared.state.lock().as_ref() {
            None => "pending",
            Some(Outcome::Ok(_)) => "resolved",
            Some(Outcome::Failed(_)) => "failed",
            Some(Outcome::Interrupted(_)) => "interrupted",
        };
        f.debug_struct("Future")
            .field("id", &self.shared.id)
            .field("state", &state)
            .finish()
    }
}

impl<T> Resolver<T> {
    /// Returns the identifier of the future this resolver writes.
    #[must_use]
    pub fn id(&self) -> Option<FutureId> {
        self.shared.as_ref().map(|s| s.id)
    }

    /// Returns true if the future was already resolved by someone else
    /// (normally an interruption).
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.shared
            .as_ref()
            .map_or(true, |s| s.state.lock().is_some())
    }

    /// Stores a value and wakes all readers.
    pub fn set_result(mut self, value: T) -> Result<()> {
        self.finish(Outcome::Ok(value))
    }

    /// Stores a failure and wakes all readers.
    ///
    /// Whatever the kind of `error`, readers observe `ErrorKind::Failed`.
    pub fn set_failure(mut self, error: Error) -> Result<()> {
        self.finish(Outcome::Failed(error.into_failure()))
    }

    /// Interrupts the future and wakes all readers.
    pub fn interrupt(mut self, reason: CancelReason) -> Result<()> {
        self.finish(Outcome::Interrupted(reason))
    }

    fn finish(&mut self, outcome: Outcome<T>) -> Result<()> {
        match self.shared.take() {
            Some(shared) => shared.complete(outcome),
            None => Err(Error::internal("resolver already consumed")),
        }
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            let _ = shared.complete(Outcome::Interrupted(CancelReason::abandoned()));
        }
    }
}

impl<T> std::fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver").field("id", &self.id()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_utils::{init_test_logging, wait_until};
    use crate::types::CancelKind;
    use std::thread;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn resolve_then_read_is_stable() {
        init_test("resolve_then_read_is_stable");
        let (resolver, fut) = channel::<String>();
        resolver.set_result("hello".to_string()).unwrap();

        assert!(fut.has_result());
        assert_eq!(fut.result().unwrap(), "hello");
        assert_eq!(fut.result().unwrap(), "hello");
        crate::assert_outcome!(fut.outcome().unwrap(), Ok(v) => assert_eq!(v, "hello"));
        crate::test_complete!("resolve_then_read_is_stable");
    }

    #[test]
    fn second_write_is_rejected() {
        init_test("second_write_is_rejected");
        let (resolver, fut) = channel::<u8>();
        resolver.set_result(1).unwrap();

        let err = fut.interrupt(CancelReason::reset()).unwrap_err();
        crate::assert_with_log!(
            err.kind() == ErrorKind::AlreadyResolved,
            "interrupt after resolve",
            ErrorKind::AlreadyResolved,
            err.kind()
        );
        assert_eq!(fut.result().unwrap(), 1);
        crate::test_complete!("second_write_is_rejected");
    }

    #[test]
    fn interrupt_then_resolver_write_is_rejected() {
        init_test("interrupt_then_resolver_write_is_rejected");
        let (resolver, fut) = channel::<u8>();
        fut.interrupt(CancelReason::reset()).unwrap();
        assert!(resolver.is_resolved());

        let err = resolver.set_result(5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyResolved);
        let err = fut.result().unwrap_err();
        assert!(err.is_interrupted());
        assert_eq!(fut.interrupt_reason().map(|r| r.kind), Some(CancelKind::Reset));
        crate::test_complete!("interrupt_then_resolver_write_is_rejected");
    }

    #[test]
    fn failure_reports_failed_kind() {
        init_test("failure_reports_failed_kind");
        let (resolver, fut) = channel::<()>();
        resolver.set_failure(Error::user("bad source")).unwrap();

        let err = fut.result().unwrap_err();
        assert!(err.is_failure());
        assert!(err.to_string().contains("bad source"));
        crate::assert_outcome!(fut.outcome().unwrap(), Failed);
        crate::test_complete!("failure_reports_failed_kind");
    }

    #[test]
    fn zero_timeout_on_pending_returns_immediately() {
        init_test("zero_timeout_on_pending_returns_immediately");
        let (resolver, fut) = channel::<u32>();

        let err = fut.result_timeout(Duration::ZERO).unwrap_err();
        assert!(err.is_timeout());

        resolver.set_result(42).unwrap();
        assert_eq!(fut.result().unwrap(), 42);
        crate::test_complete!("zero_timeout_on_pending_returns_immediately");
    }

    #[test]
    fn bounded_wait_elapses() {
        init_test("bounded_wait_elapses");
        let (_resolver, fut) = channel::<u32>();
        let start = Instant::now();
        let err = fut.result_timeout(Duration::from_millis(20)).unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert!(!fut.has_result());
        crate::test_complete!("bounded_wait_elapses");
    }

    #[test]
    fn dropped_resolver_abandons() {
        init_test("dropped_resolver_abandons");
        let (resolver, fut) = channel::<u32>();
        drop(resolver);
        let err = fut.result().unwrap_err();
        assert!(err.is_interrupted());
        assert_eq!(
            err.cancel_reason().map(|r| r.kind),
            Some(CancelKind::Abandoned)
        );
        crate::test_complete!("dropped_resolver_abandons");
    }

    #[test]
    fn all_cloned_readers_wake() {
        init_test("all_cloned_readers_wake");
        let (resolver, fut) = channel::<u64>();
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let fut = fut.clone();
                thread::spawn(move || fut.result())
            })
            .collect();

        thread::sleep(Duration::from_millis(10));
        resolver.set_result(99).unwrap();
        for reader in readers {
            assert_eq!(reader.join().unwrap().unwrap(), 99);
        }
        crate::test_complete!("all_cloned_readers_wake");
    }

    #[test]
    fn registry_interrupts_blocked_readers() {
        init_test("registry_interrupts_blocked_readers");
        let registry = Arc::new(WaiterRegistry::new());
        let (_resolver, fut) = tracked::<u32>(&registry);
        let (_resolver2, other) = tracked::<u32>(&registry);

        let a = {
            let fut = fut.clone();
            thread::spawn(move || fut.result())
        };
        let b = {
            let fut = fut.clone();
            thread::spawn(move || fut.result_timeout(Duration::from_secs(30)))
        };
        let c = thread::spawn(move || other.result());

        assert!(wait_until(Duration::from_secs(5), || registry.len() == 3));
        let interrupted = registry.interrupt_all(&CancelReason::reset());
        crate::assert_with_log!(interrupted == 2, "distinct futures", 2, interrupted);

        for handle in [a, b, c] {
            let err = handle.join().unwrap().unwrap_err();
            assert!(err.is_interrupted());
        }
        assert!(registry.is_empty());
        crate::test_complete!("registry_interrupts_blocked_readers");
    }

    #[test]
    fn resolved_futures_leave_registry() {
        init_test("resolved_futures_leave_registry");
        let registry = Arc::new(WaiterRegistry::new());
        let (resolver, fut) = tracked::<u32>(&registry);
        let reader = thread::spawn(move || fut.result());

        assert!(wait_until(Duration::from_secs(5), || registry.len() == 1));
        resolver.set_result(3).unwrap();
        assert_eq!(reader.join().unwrap().unwrap(), 3);
        assert!(registry.is_empty());
        assert_eq!(registry.interrupt_all(&CancelReason::reset()), 0);
        crate::test_complete!("resolved_futures_leave_registry");
    }

    #[test]
    fn huge_timeout_waits_without_a_deadline() {
        init_test("huge_timeout_waits_without_a_deadline");
        let (resolver, fut) = channel::<u32>();
        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            resolver.set_result(11).unwrap();
        });

        assert_eq!(fut.result_timeout(Duration::MAX).unwrap(), 11);
        writer.join().unwrap();
        crate::test_complete!("huge_timeout_waits_without_a_deadline");
    }

    #[test]
    fn token_interrupt_wakes_context_wait_and_leaves_future_pending() {
        init_test("token_interrupt_wakes_context_wait_and_leaves_future_pending");
        let registry = Arc::new(WaiterRegistry::new());
        let (resolver, fut) = tracked::<u32>(&registry);
        let token = AbortToken::new();

        let reader = {
            let fut = fut.clone();
            let token = token.clone();
            thread::spawn(move || {
                let cx = Cx::for_testing_worker(token, 0);
                fut.result_in(&cx)
            })
        };
        assert!(wait_until(Duration::from_secs(5), || token.blocked_waits() == 1));
        assert_eq!(registry.len(), 1);

        assert!(token.interrupt(CancelReason::user("worker stopped")));
        let err = reader.join().unwrap().unwrap_err();
        assert!(err.is_interrupted());
        assert_eq!(err.cancel_reason().map(|r| r.kind), Some(CancelKind::User));
        assert_eq!(token.blocked_waits(), 0);
        assert!(registry.is_empty());

        crate::assert_with_log!(!fut.has_result(), "future still pending", false, fut.has_result());
        resolver.set_result(5).unwrap();
        assert_eq!(fut.result().unwrap(), 5);
        crate::test_complete!("token_interrupt_wakes_context_wait_and_leaves_future_pending");
    }

    #[test]
    fn interrupted_context_does_not_block() {
        init_test("interrupted_context_does_not_block");
        let (resolver, fut) = channel::<u32>();
        let token = AbortToken::new();
        token.interrupt(CancelReason::reset());
        let cx = Cx::for_testing_worker(token, 0);

        let err = fut.result_timeout_in(&cx, Duration::from_secs(30)).unwrap_err();
        assert!(err.is_interrupted());

        resolver.set_result(1).unwrap();
        assert_eq!(fut.result_in(&cx).unwrap(), 1, "stored outcome wins over the token");
        assert_eq!(fut.result_in(&Cx::detached()).unwrap(), 1);
        crate::test_complete!("interrupted_context_does_not_block");
    }
}
