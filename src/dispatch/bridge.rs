//! The dispatch bridge.
//!
//! [`Bridge`] owns the command queue and the host collaborator. Producers on
//! any thread call [`Bridge::schedule`] and friends; the host thread drains
//! the queue in FIFO order through [`Bridge::tick`].
//!
//! # Ordering
//!
//! Commands from one producer run in the order they were scheduled.
//! Commands from different producers interleave in lock-acquisition order.
//! Host callers take an inline fast path and run immediately, ahead of
//! anything still queued.
//!
//! # Failure
//!
//! A command that errors or panics during `tick()` resolves its future with
//! the failure and stops the loop: the tick is unregistered, the fault is
//! reported to the host, and the remaining queue waits until
//! [`Bridge::start`] or [`Bridge::reset`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::cx::Cx;
use crate::dispatch::command::{Call, Command, Dispatchable};
use crate::dispatch::config::BridgeConfig;
use crate::dispatch::host::Host;
use crate::error::{Error, Result};
use crate::future::{self, Future, WaiterRegistry};
use crate::tracing_compat::{debug, debug_span, error, info, trace, warn};
use crate::types::{CancelReason, CommandId};
use crate::worker::{WorkerHandle, WorkerRegistry};

/// Whether host callers may run a command inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Policy {
    /// Host callers run inline; everyone else enqueues.
    Auto,
    /// Always enqueue, even on the host thread.
    Deferred,
}

/// Summary of one [`Bridge::tick`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Commands popped and run (including a failing one).
    pub executed: usize,
    /// Commands still queued after the tick.
    pub remaining: usize,
    /// True if a command failure stopped the loop.
    pub faulted: bool,
}

/// Summary of one [`Bridge::reset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetReport {
    /// The generation that is current after the reset.
    pub generation: u64,
    /// Queued commands dropped without running.
    pub discarded_commands: usize,
    /// Live workers whose abort token was interrupted.
    pub interrupted_workers: usize,
    /// Blocked futures interrupted through the waiter registry.
    pub interrupted_waiters: usize,
}

struct QueueState<H> {
    generation: u64,
    commands: VecDeque<Command<H>>,
}

struct BridgeInner<H> {
    host: H,
    config: BridgeConfig,
    host_thread: ThreadId,
    queue: Mutex<QueueState<H>>,
    pending: AtomicUsize,
    generation: AtomicU64,
    tick_registered: Mutex<bool>,
    started: AtomicBool,
    waiters: Arc<WaiterRegistry>,
    workers: Arc<WorkerRegistry>,
}

/// Host-thread dispatch bridge.
///
/// Cloning a bridge yields another handle to the same queue.
pub struct Bridge<H: Host> {
    inner: Arc<BridgeInner<H>>,
}

impl<H: Host> Bridge<H> {
    /// Creates a bridge with the default configuration.
    ///
    /// The calling thread becomes the host thread.
    #[must_use]
    pub fn new(host: H) -> Self {
        Self::with_config(host, BridgeConfig::default())
    }

    /// Creates a bridge with an explicit configuration.
    ///
    /// The calling thread becomes the host thread. The tick is not
    /// registered until [`Bridge::start`]. See
    /// [`BridgeBuilder`](crate::dispatch::BridgeBuilder) for environment and
    /// file based configuration.
    #[must_use]
    pub fn with_config(host: H, mut config: BridgeConfig) -> Self {
        config.normalize();
        debug!(
            tick_interval_ms = config.tick_interval.as_millis() as u64,
            steps_per_tick = config.steps_per_tick,
            "bridge created"
        );
        Self {
            inner: Arc::new(BridgeInner {
                host,
                config,
                host_thread: thread::current().id(),
                queue: Mutex::new(QueueState {
                    generation: 0,
                    commands: VecDeque::new(),
                }),
                pending: AtomicUsize::new(0),
                generation: AtomicU64::new(0),
                tick_registered: Mutex::new(false),
                started: AtomicBool::new(false),
                waiters: Arc::new(WaiterRegistry::new()),
                workers: Arc::new(WorkerRegistry::new()),
            }),
        }
    }

    /// Returns the host context.
    ///
    /// Fails with `ErrorKind::WrongThread` off the thread that created the
    /// bridge.
    pub fn host_cx(&self) -> Result<Cx> {
        if self.is_host_thread() {
            Ok(Cx::host())
        } else {
            Err(Error::wrong_thread(
                "host context requested off the host thread",
            ))
        }
    }

    /// Returns true on the thread that created the bridge.
    #[must_use]
    pub fn is_host_thread(&self) -> bool {
        thread::current().id() == self.inner.host_thread
    }

    /// Returns the host collaborator.
    #[must_use]
    pub fn host(&self) -> &H {
        &self.inner.host
    }

    /// Returns the effective configuration.
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    // =====================================================================
    // Producers
    // =====================================================================

    /// Submits `f` and returns a future for its result.
    ///
    /// Host callers run `f` before this returns; the future is already
    /// resolved. Other callers enqueue. Interrupted or stale-generation
    /// worker contexts fail with `ErrorKind::Interrupted` and nothing is
    /// enqueued.
    pub fn schedule<T, F>(&self, cx: &Cx, label: &'static str, f: F) -> Result<Future<T>>
    where
        F: FnOnce(&H) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (resolver, fut) = future::tracked(&self.inner.waiters);
        self.submit(cx, label, Policy::Auto, Box::new(Call::new(f, Some(resolver))))?;
        Ok(fut)
    }

    /// Like [`Bridge::schedule`], but always enqueues.
    ///
    /// The command runs strictly after everything already queued, even when
    /// called on the host thread.
    pub fn schedule_deferred<T, F>(&self, cx: &Cx, label: &'static str, f: F) -> Result<Future<T>>
    where
        F: FnOnce(&H) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (resolver, fut) = future::tracked(&self.inner.waiters);
        self.submit(
            cx,
            label,
            Policy::Deferred,
            Box::new(Call::new(f, Some(resolver))),
        )?;
        Ok(fut)
    }

    /// Submits `f` without a future.
    pub fn post<T, F>(&self, cx: &Cx, label: &'static str, f: F) -> Result<()>
    where
        F: FnOnce(&H) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.submit(cx, label, Policy::Auto, Box::new(Call::new(f, None)))
    }

    /// Submits `f` without a future, always enqueueing.
    pub fn post_deferred<T, F>(&self, cx: &Cx, label: &'static str, f: F) -> Result<()>
    where
        F: FnOnce(&H) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.submit(cx, label, Policy::Deferred, Box::new(Call::new(f, None)))
    }

    /// Submits `f` and blocks until it resolves.
    pub fn call<T, F>(&self, cx: &Cx, label: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&H) -> Result<T> + Send + 'static,
        T: Clone + Send + 'static,
    {
        self.schedule(cx, label, f)?.result_in(cx)
    }

    fn submit(
        &self,
        cx: &Cx,
        label: &'static str,
        policy: Policy,
        body: Box<dyn Dispatchable<H>>,
    ) -> Result<()> {
        if let Some(token) = cx.abort_token() {
            if let Some(reason) = token.reason() {
                trace!(label, reason = %reason, "schedule refused: context interrupted");
                body.abandon(&reason);
                return Err(Error::interrupted(&reason));
            }
        }

        if cx.is_host() && policy == Policy::Auto {
            let command = Command::new(label, self.generation(), body);
            trace!(command = %command.meta().id, label, "running inline on host thread");
            if let Err(err) = command.run(&self.inner.host) {
                self.inner.host.report_error(label, &err);
            }
            return Ok(());
        }

        self.enqueue(cx, label, body).map(|_| ())
    }

    fn enqueue(
        &self,
        cx: &Cx,
        label: &'static str,
        body: Box<dyn Dispatchable<H>>,
    ) -> Result<CommandId> {
        let mut queue = self.inner.queue.lock();
        if let Some(spawned_in) = cx.generation() {
            if spawned_in != queue.generation {
                let current = queue.generation;
                drop(queue);
                let reason = CancelReason::stale_generation();
                if let Some(token) = cx.abort_token() {
                    token.interrupt(reason.clone());
                }
                debug!(
                    label,
                    spawned_in,
                    current,
                    "schedule refused: producer from a retired generation"
                );
                body.abandon(&reason);
                return Err(Error::interrupted(&reason));
            }
        }
        let command = Command::new(label, queue.generation, body);
        let id = command.meta().id;
        queue.commands.push_back(command);
        self.inner.pending.fetch_add(1, Ordering::Release);
        trace!(command = %id, label, depth = queue.commands.len(), "command enqueued");
        Ok(id)
    }

    // =====================================================================
    // Dispatch loop
    // =====================================================================

    /// Runs up to `steps_per_tick` queued commands.
    ///
    /// Called by the host on its own thread. A call from any other thread
    /// is refused and logged. Returns immediately when the loop is stopped
    /// or the queue is empty.
    pub fn tick(&self) -> TickReport {
        if !self.is_host_thread() {
            warn!("tick called off the host thread; ignored");
            return TickReport {
                remaining: self.pending_commands(),
                ..TickReport::default()
            };
        }
        if !self.is_started() || self.inner.pending.load(Ordering::Acquire) == 0 {
            return TickReport {
                remaining: self.pending_commands(),
                ..TickReport::default()
            };
        }

        let span = debug_span!("tick", steps = self.inner.config.steps_per_tick);
        let _guard = span.enter();
        let mut executed = 0;
        while executed < self.inner.config.steps_per_tick && self.is_started() {
            let Some(command) = self.pop() else {
                break;
            };
            let meta = *command.meta();
            executed += 1;
            if let Err(err) = command.run(&self.inner.host) {
                self.fault(meta.label, &err);
                return TickReport {
                    executed,
                    remaining: self.pending_commands(),
                    faulted: true,
                };
            }
            trace!(command = %meta.id, label = meta.label, "command executed");
        }
        TickReport {
            executed,
            remaining: self.pending_commands(),
            faulted: false,
        }
    }

    fn pop(&self) -> Option<Command<H>> {
        let mut queue = self.inner.queue.lock();
        let command = queue.commands.pop_front()?;
        self.inner.pending.fetch_sub(1, Ordering::Release);
        Some(command)
    }

    fn fault(&self, label: &'static str, err: &Error) {
        error!(label, error = %err, "command failed; stopping dispatch loop");
        self.stop();
        self.inner.host.report_error(label, &Error::queue_fault(err));
    }

    /// Registers the periodic tick with the host.
    ///
    /// Idempotent: returns false if the tick was already registered.
    pub fn start(&self) -> bool {
        let mut registered = self.inner.tick_registered.lock();
        if *registered {
            return false;
        }
        self.inner.host.register_tick(self.inner.config.tick_interval);
        *registered = true;
        self.inner.started.store(true, Ordering::Release);
        debug!(generation = self.generation(), "dispatch loop started");
        true
    }

    /// Unregisters the periodic tick.
    ///
    /// Queued commands stay queued. Returns false if the loop was not
    /// running.
    pub fn stop(&self) -> bool {
        let mut registered = self.inner.tick_registered.lock();
        if !*registered {
            return false;
        }
        self.inner.started.store(false, Ordering::Release);
        self.inner.host.unregister_tick();
        *registered = false;
        debug!(generation = self.generation(), "dispatch loop stopped");
        true
    }

    /// Discards all pending work and restarts the loop.
    ///
    /// Under the queue lock the generation is bumped and the queue swapped
    /// for an empty one, so no producer can slip a command into the old
    /// generation afterwards. Then every discarded command's future, every
    /// live worker's abort token and every blocked future is interrupted
    /// with [`CancelKind::Reset`](crate::CancelKind::Reset), and the tick
    /// is registered again.
    ///
    /// A command executing inside `tick()` at the time is not affected.
    pub fn reset(&self) -> ResetReport {
        let reason = CancelReason::reset();
        let (generation, discarded) = {
            let mut queue = self.inner.queue.lock();
            queue.generation += 1;
            self.inner
                .generation
                .store(queue.generation, Ordering::SeqCst);
            self.inner.pending.store(0, Ordering::Release);
            (queue.generation, std::mem::take(&mut queue.commands))
        };

        let discarded_commands = discarded.len();
        for command in discarded {
            command.abandon(&reason);
        }
        let interrupted_workers = self.inner.workers.interrupt_all(&reason);
        let interrupted_waiters = self.inner.waiters.interrupt_all(&reason);
        self.start();

        let report = ResetReport {
            generation,
            discarded_commands,
            interrupted_workers,
            interrupted_waiters,
        };
        info!(
            generation,
            discarded_commands, interrupted_workers, interrupted_waiters, "bridge reset"
        );
        report
    }

    // =====================================================================
    // Workers
    // =====================================================================

    /// Starts `f` on a new worker thread.
    ///
    /// The worker receives a [`Cx`] with its own abort token and the current
    /// generation. An `Interrupted` result is treated as a clean exit.
    pub fn spawn<F>(&self, f: F) -> Result<WorkerHandle>
    where
        F: FnOnce(Cx) -> Result<()> + Send + 'static,
    {
        let inner = &self.inner;
        inner
            .workers
            .spawn(&inner.config, || inner.generation.load(Ordering::SeqCst), f)
    }

    // =====================================================================
    // Introspection
    // =====================================================================

    /// Returns the current generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Returns true while the tick is registered.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::Acquire)
    }

    /// Returns the number of queued commands.
    #[must_use]
    pub fn pending_commands(&self) -> usize {
        self.inner.pending.load(Ordering::Acquire)
    }

    /// Returns the number of readers blocked on bridge futures.
    #[must_use]
    pub fn blocked_waiters(&self) -> usize {
        self.inner.waiters.len()
    }

    /// Returns the number of live worker threads.
    #[must_use]
    pub fn live_workers(&self) -> usize {
        self.inner.workers.len()
    }
}

impl<H: Host> Clone for Bridge<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: Host> std::fmt::Debug for Bridge<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("generation", &self.generation())
            .field("started", &self.is_started())
            .field("pending", &self.pending_commands())
            .field("workers", &self.live_workers())
            .finish_non_exhaustive()
    }
}
