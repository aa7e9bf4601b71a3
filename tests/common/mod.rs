use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use scripthost::{Env, Options, ScriptError, ScriptHost};

/// Dispatches `f` to `host` inside a handle scope and waits for its result.
pub fn run_on<T, F>(host: &ScriptHost, f: F) -> T
where
    F: FnOnce(&Env) -> T + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    host.dispatch(move |env| {
        let scope = env.open_handle_scope();
        let result = f(env);
        env.close_handle_scope(scope)
            .expect("test scope closes in LIFO order");
        tx.send(result).expect("result receiver dropped");
    });
    rx.recv().expect("execution thread dropped the task")
}

/// Runs `f` on a fresh host's execution thread and returns the result.
#[allow(dead_code)]
pub fn with_env<T, F>(f: F) -> T
where
    F: FnOnce(&Env) -> T + Send + 'static,
    T: Send + 'static,
{
    let host = ScriptHost::new();
    run_on(&host, f)
}

/// A host whose unhandled-exception handler records every error it sees.
#[allow(dead_code)]
pub fn host_with_error_sink() -> (ScriptHost, Arc<Mutex<Vec<ScriptError>>>) {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = errors.clone();
    let options = Options {
        unhandled_exception_handler: Arc::new(move |error: &ScriptError| {
            sink.lock().unwrap().push(error.clone());
        }),
    };
    (ScriptHost::with_options(options), errors)
}
