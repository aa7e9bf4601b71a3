//! Thread-safe FIFO work queue with a single-consumer execution loop.
//!
//! The queue side ([`WorkQueue`]) is owned by the host and usable from any
//! thread; the consumer side ([`TaskRunner`]) is handed to the spawned
//! execution thread, which runs the loop once the engine environment is up.
//! Suspension is cooperative: a placeholder task blocks the loop on a
//! channel whose sender the controller holds until `resume`.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, oneshot};

use crate::Env;
use crate::error::HostError;

/// A queued unit of work: runs once with the live environment, or is
/// discarded unexecuted on shutdown.
pub(crate) type Task = Box<dyn FnOnce(&Env) + Send + 'static>;

pub(crate) struct WorkQueue {
    task_tx: mpsc::UnboundedSender<Task>,
    cancel: Arc<AtomicBool>,
    suspension: Mutex<Option<oneshot::Sender<()>>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

/// Consumer half, moved onto the execution thread at spawn.
pub(crate) struct TaskRunner {
    task_rx: mpsc::UnboundedReceiver<Task>,
    cancel: Arc<AtomicBool>,
}

impl WorkQueue {
    /// Spawns the execution thread. `thread_proc` receives the runner and
    /// must eventually call [`TaskRunner::run`] with the environment it
    /// creates; the queue accepts work immediately either way.
    pub(crate) fn new<F>(thread_proc: F) -> Self
    where
        F: FnOnce(TaskRunner) + Send + 'static,
    {
        let (task_tx, task_rx) = mpsc::unbounded_channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let runner = TaskRunner {
            task_rx,
            cancel: cancel.clone(),
        };
        let thread = std::thread::Builder::new()
            .name("scripthost-exec".into())
            .spawn(move || thread_proc(runner))
            .expect("failed to spawn the execution thread");

        Self {
            task_tx,
            cancel,
            suspension: Mutex::new(None),
            thread: Some(thread),
        }
    }

    /// Thread-safe append. Submission order is preserved per calling thread.
    pub(crate) fn append(&self, task: Task) -> Result<(), HostError> {
        self.task_tx.send(task).map_err(|_| HostError::QueueClosed)
    }

    /// Enqueues a suspension token. Every task appended after this call
    /// waits behind the token until [`resume`](Self::resume). Suspending
    /// while already suspended replaces the token, releasing the previous
    /// one.
    pub(crate) fn suspend(&self) {
        let (tx, rx) = oneshot::channel::<()>();
        *self.suspension.lock().unwrap() = Some(tx);
        let _ = self.append(Box::new(move |_env| {
            // Parks the loop until the controller drops the sender.
            let _ = rx.blocking_recv();
        }));
    }

    /// Releases the pending suspension token. No-op when not suspended.
    pub(crate) fn resume(&self) {
        self.suspension.lock().unwrap().take();
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        // Cancellation is flagged before the suspension token is released so
        // that the loop observes it the moment it unparks; anything still
        // queued is then discarded rather than executed.
        self.cancel.store(true, Ordering::SeqCst);
        self.resume();
        // Wake the loop if it is parked on an empty queue.
        let _ = self.task_tx.send(Box::new(|_env| {}));
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            log::error!("execution thread panicked during shutdown");
        }
    }
}

impl TaskRunner {
    /// Consumer loop. Called exactly once, on the execution thread, with the
    /// live environment. Pops and executes tasks in FIFO order until
    /// cancellation is observed; tasks still queued at that point are
    /// dropped unexecuted.
    pub(crate) fn run(mut self, env: &Env) {
        while !self.cancel.load(Ordering::SeqCst) {
            match self.task_rx.blocking_recv() {
                Some(task) => {
                    if self.cancel.load(Ordering::SeqCst) {
                        break;
                    }
                    task(env);
                }
                None => break,
            }
        }

        // Discard whatever is left without running it.
        self.task_rx.close();
        while self.task_rx.try_recv().is_ok() {}
    }
}
