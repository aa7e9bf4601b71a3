//! Execution host: three-tier bootstrap plus the dispatch exception
//! boundary.
//!
//! The bootstrap runs on the spawned execution thread in three tiers, each
//! calling the next: the platform tier performs one-time process-wide engine
//! setup, the environment tier creates the engine instance on the thread's
//! stack and mints the one [`Env`], and the run tier enters the work-queue
//! loop. Teardown happens in reverse order once the loop exits.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::Env;
use crate::engine;
use crate::error::ScriptError;
use crate::work_queue::{TaskRunner, WorkQueue};

/// Receives every script-level error that escapes a dispatched task.
pub type UnhandledExceptionHandler = Arc<dyn Fn(&ScriptError) + Send + Sync>;

/// Host configuration.
#[derive(Clone)]
pub struct Options {
    pub unhandled_exception_handler: UnhandledExceptionHandler,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            unhandled_exception_handler: Arc::new(default_unhandled_exception_handler),
        }
    }
}

/// Default unhandled-exception handler: logs the error.
pub fn default_unhandled_exception_handler(error: &ScriptError) {
    log::error!("[Uncaught Error] {error}");
}

/// An embeddable script execution host.
///
/// Owns one dedicated execution thread bound to one engine environment. All
/// engine access happens through [`dispatch`](Self::dispatch); dropping the
/// host cancels the loop, discards queued work, and joins the thread.
pub struct ScriptHost {
    work_queue: WorkQueue,
    options: Options,
}

impl ScriptHost {
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        let work_queue = WorkQueue::new(run_platform_tier);
        Self {
            work_queue,
            options,
        }
    }

    /// Queues `callback` to run on the execution thread with the live
    /// environment, bounded by the host's exception boundary. Callable from
    /// any thread, including from a running task.
    pub fn dispatch<F>(&self, callback: F)
    where
        F: FnOnce(&Env) + Send + 'static,
    {
        let handler = self.options.unhandled_exception_handler.clone();
        let queued = self.work_queue.append(Box::new(move |env| {
            execute(env, callback, &handler);
        }));
        if queued.is_err() {
            log::warn!("dispatch after shutdown; task dropped");
        }
    }

    /// Pauses the execution loop after the currently running task. Work
    /// dispatched while suspended is preserved in order.
    pub fn suspend(&self) {
        self.work_queue.suspend();
    }

    /// Resumes a suspended loop. No-op when not suspended.
    pub fn resume(&self) {
        self.work_queue.resume();
    }
}

impl Default for ScriptHost {
    fn default() -> Self {
        Self::new()
    }
}

/// Exception boundary around one task.
///
/// Per-task lifecycle: Queued -> Executing -> Completed | ErrorHandled |
/// FatalAbort. A pending engine exception becomes a structured error for the
/// configured handler; a host-level panic with a printable payload takes the
/// generic path to the same handler; any other payload aborts the process,
/// since the engine state it left behind cannot be trusted. Failed tasks are
/// never re-queued.
fn execute<F>(env: &Env, callback: F, handler: &UnhandledExceptionHandler)
where
    F: FnOnce(&Env),
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(env)));

    if let Some(error) = env.take_pending_script_error() {
        handler(&error);
    }

    match outcome {
        Ok(()) => {}
        Err(payload) => {
            if let Some(message) = payload.downcast_ref::<&str>() {
                handler(&ScriptError::from_message(*message));
            } else if let Some(message) = payload.downcast_ref::<String>() {
                handler(&ScriptError::from_message(message.clone()));
            } else {
                std::process::abort();
            }
        }
    }

    // Promise continuations settled by this task run before the next one.
    env.run_microtasks();
}

/// Platform tier: one-time engine platform setup, then down into the
/// environment tier. Runs on the execution thread.
fn run_platform_tier(runner: TaskRunner) {
    engine::platform::initialize();
    engine::bootstrap::run_environment_tier(runner);
}
