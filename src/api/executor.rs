//! The host thread.
//!
//! One OS thread owns the [`HostState`]. Everything else reaches it by
//! posting closures into an unbounded mailbox. Code already running on the
//! host thread, including a task that is itself inside a host job, runs
//! inline against the same state; the host thread never waits on its own
//! queue.

use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use std::thread::{self, JoinHandle, ThreadId};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use super::curator::{LeakReport, ResourceCurator};
use crate::host::HostContext;

/// State only the host thread may touch.
///
/// Tasks get shared access so they can nest. The curator is the only part
/// that changes while the host runs; borrow it for single operations only.
#[derive(Debug)]
pub struct HostState {
    pub context: HostContext,
    pub curator: RefCell<ResourceCurator>,
}

pub type HostTask = Box<dyn FnOnce(&HostState) + Send + 'static>;

enum Job {
    Run(HostTask),
    Shutdown,
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("host executor is not running")]
    Closed,
    #[error("failed to spawn host thread: {0}")]
    Spawn(#[from] std::io::Error),
}

thread_local! {
    static HOST_STATE: RefCell<Option<Rc<HostState>>> = const { RefCell::new(None) };
}

/// Run `task` against this thread's host state, handing it back if this
/// thread has none.
fn run_here(task: HostTask) -> Result<(), HostTask> {
    // Release the slot before running so nested tasks can take it too.
    let state = HOST_STATE.with(|cell| cell.borrow().clone());
    match state {
        Some(state) => {
            task(&state);
            Ok(())
        }
        None => Err(task),
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

fn guarded(job: impl FnOnce()) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
        tracing::error!(panic = panic_message(payload.as_ref()), "Host task panicked");
    }
}

/// Cheap, cloneable sender side of the host thread.
#[derive(Clone)]
pub struct HostHandle {
    jobs: mpsc::UnboundedSender<Job>,
    thread: ThreadId,
}

impl HostHandle {
    pub fn is_host_thread(&self) -> bool {
        thread::current().id() == self.thread
    }

    /// Run inline on the host thread, queue from anywhere else.
    pub fn execute(&self, task: HostTask) -> Result<(), HostError> {
        if !self.is_host_thread() {
            return self.post(task);
        }
        run_here(task).map_err(|_| HostError::Closed)
    }

    /// Always queue, even from the host thread.
    pub fn post(&self, task: HostTask) -> Result<(), HostError> {
        self.jobs
            .send(Job::Run(task))
            .map_err(|_| HostError::Closed)
    }

    /// Run `f` on the host thread and wait for its result.
    pub fn query<R, F>(&self, f: F) -> Result<R, HostError>
    where
        R: Send + 'static,
        F: FnOnce(&HostState) -> R + Send + 'static,
    {
        let (tx, mut rx) = oneshot::channel();
        let task: HostTask = Box::new(move |state| {
            let _ = tx.send(f(state));
        });
        if self.is_host_thread() {
            run_here(task).map_err(|_| HostError::Closed)?;
            return rx.try_recv().map_err(|_| HostError::Closed);
        }
        self.post(task)?;
        rx.blocking_recv().map_err(|_| HostError::Closed)
    }
}

impl std::fmt::Debug for HostHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostHandle")
            .field("thread", &self.thread)
            .field("closed", &self.jobs.is_closed())
            .finish()
    }
}

/// Owner of the host thread.
pub struct HostExecutor {
    handle: HostHandle,
    worker: Option<JoinHandle<Vec<LeakReport>>>,
}

impl HostExecutor {
    pub fn spawn(context: HostContext) -> Result<Self, HostError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = HostState {
            context,
            curator: RefCell::new(ResourceCurator::new()),
        };
        let worker = thread::Builder::new()
            .name("voxlink-host".into())
            .spawn(move || run(rx, state))?;
        let handle = HostHandle {
            jobs: tx,
            thread: worker.thread().id(),
        };
        tracing::info!("Host executor started");
        Ok(Self {
            handle,
            worker: Some(worker),
        })
    }

    pub fn handle(&self) -> HostHandle {
        self.handle.clone()
    }

    /// Stop the thread after the queued jobs ahead of the request and
    /// return every buffer plugins never freed.
    pub fn shutdown(mut self) -> Vec<LeakReport> {
        self.stop()
    }

    fn stop(&mut self) -> Vec<LeakReport> {
        let Some(worker) = self.worker.take() else {
            return Vec::new();
        };
        let _ = self.handle.jobs.send(Job::Shutdown);
        match worker.join() {
            Ok(leaks) => {
                tracing::info!(leaks = leaks.len(), "Host executor stopped");
                leaks
            }
            Err(payload) => {
                tracing::error!(
                    panic = panic_message(payload.as_ref()),
                    "Host thread panicked during shutdown"
                );
                Vec::new()
            }
        }
    }
}

impl Drop for HostExecutor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for HostExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostExecutor")
            .field("handle", &self.handle)
            .field("running", &self.worker.is_some())
            .finish()
    }
}

fn run(mut jobs: mpsc::UnboundedReceiver<Job>, state: HostState) -> Vec<LeakReport> {
    HOST_STATE.with(|cell| *cell.borrow_mut() = Some(Rc::new(state)));

    while let Some(job) = jobs.blocking_recv() {
        match job {
            Job::Run(task) => guarded(|| {
                if run_here(task).is_err() {
                    tracing::error!("Host state unavailable on the host thread");
                }
            }),
            Job::Shutdown => break,
        }
    }

    jobs.close();
    let dropped = std::iter::from_fn(|| jobs.try_recv().ok()).count();
    if dropped > 0 {
        tracing::warn!(dropped, "Discarded jobs queued after shutdown");
    }

    let state = HOST_STATE.with(|cell| cell.borrow_mut().take());
    match state.map(Rc::try_unwrap) {
        Some(Ok(state)) => state.curator.into_inner().shutdown(),
        Some(Err(_)) => {
            tracing::error!("Host state still shared at shutdown, leak report skipped");
            Vec::new()
        }
        None => Vec::new(),
    }
}
