//! A real host thread driving a bridge.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

use crate::cx::Cx;
use crate::dispatch::{Bridge, BridgeConfig, Host};
use crate::error::{Error, Result};
use crate::tracing_compat::{debug, warn};

type Job<H> = Box<dyn FnOnce(&Bridge<H>, &Cx) + Send>;

/// Owns a host thread that constructs the bridge and ticks it.
///
/// The thread waits for submitted jobs with a timeout of one tick interval
/// and calls `tick()` after every wake-up, the way a host timer would.
/// Jobs run on the host thread with the host [`Cx`], which is how tests
/// simulate host callbacks such as UI events or a script reload.
pub struct HostLoop<H: Host> {
    bridge: Bridge<H>,
    stop: Arc<AtomicBool>,
    jobs: Option<mpsc::Sender<Job<H>>>,
    thread: Option<JoinHandle<()>>,
}

impl<H: Host> HostLoop<H> {
    /// Starts the host thread, builds the bridge on it and starts the tick.
    pub fn spawn<F>(config: BridgeConfig, make_host: F) -> Result<Self>
    where
        F: FnOnce() -> H + Send + 'static,
    {
        let (ready_tx, ready_rx) = mpsc::channel();
        let (jobs_tx, jobs_rx) = mpsc::channel::<Job<H>>();
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        let thread = thread::Builder::new()
            .name("hostbridge-host".to_string())
            .spawn(move || {
                let bridge = Bridge::with_config(make_host(), config);
                bridge.start();
                let Ok(cx) = bridge.host_cx() else {
                    return;
                };
                if ready_tx.send(bridge.clone()).is_err() {
                    return;
                }
                let interval = bridge.config().tick_interval;
                debug!(interval_ms = interval.as_millis() as u64, "host loop running");
                while !thread_stop.load(Ordering::Acquire) {
                    match jobs_rx.recv_timeout(interval) {
                        Ok(job) => job(&bridge, &cx),
                        Err(mpsc::RecvTimeoutError::Timeout) => {}
                        Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    }
                    bridge.tick();
                }
                bridge.stop();
                debug!("host loop exited");
            })
            .map_err(|e| Error::internal("failed to start host thread").with_source(e))?;

        let bridge = ready_rx
            .recv()
            .map_err(|_| Error::internal("host thread exited during startup"))?;
        Ok(Self {
            bridge,
            stop,
            jobs: Some(jobs_tx),
            thread: Some(thread),
        })
    }

    /// Returns a handle to the bridge.
    #[must_use]
    pub fn bridge(&self) -> &Bridge<H> {
        &self.bridge
    }

    /// Runs `f` on the host thread with the host context and returns its
    /// result.
    pub fn run_on_host<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&Bridge<H>, &Cx) -> R + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(1);
        let job: Job<H> = Box::new(move |bridge: &Bridge<H>, cx: &Cx| {
            let _ = tx.send(f(bridge, cx));
        });
        self.jobs
            .as_ref()
            .ok_or_else(|| Error::internal("host loop is shut down"))?
            .send(job)
            .map_err(|_| Error::internal("host thread is gone"))?;
        rx.recv()
            .map_err(|_| Error::internal("host job did not complete"))
    }

    /// Stops the host thread and waits for it.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.stop.store(true, Ordering::Release);
        self.jobs.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("host thread panicked");
            }
        }
    }
}

impl<H: Host> Drop for HostLoop<H> {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

impl<H: Host> std::fmt::Debug for HostLoop<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostLoop")
            .field("bridge", &self.bridge)
            .field("running", &self.thread.is_some())
            .finish()
    }
}
