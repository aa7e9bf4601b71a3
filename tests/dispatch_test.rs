//! Dispatcher ordering, suspension, teardown, and the exception boundary.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{host_with_error_sink, run_on};
use scripthost::{ScriptHost, Status};

#[test]
fn tasks_run_in_submission_order() {
    let host = ScriptHost::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    for i in 0..16 {
        let order = order.clone();
        host.dispatch(move |_env| order.lock().unwrap().push(i));
    }
    run_on(&host, |_env| ());

    assert_eq!(*order.lock().unwrap(), (0..16).collect::<Vec<_>>());
}

#[test]
fn dispatch_is_thread_safe() {
    let host = Arc::new(ScriptHost::new());
    let counter = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let host = host.clone();
            let counter = counter.clone();
            std::thread::spawn(move || {
                for _ in 0..10 {
                    let counter = counter.clone();
                    host.dispatch(move |_env| {
                        counter.fetch_add(1, Ordering::SeqCst);
                    });
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    run_on(&host, |_env| ());

    assert_eq!(counter.load(Ordering::SeqCst), 40);
}

#[test]
fn dispatch_from_a_task_runs_after_it() {
    let host = Arc::new(ScriptHost::new());
    let order = Arc::new(Mutex::new(Vec::new()));

    {
        let host2 = host.clone();
        let order = order.clone();
        let inner_order = order.clone();
        host.dispatch(move |_env| {
            host2.dispatch(move |_env| inner_order.lock().unwrap().push("inner"));
            order.lock().unwrap().push("outer");
        });
    }
    // Two barriers: the inner task is only queued once the outer one ran.
    run_on(&host, |_env| ());
    run_on(&host, |_env| ());

    assert_eq!(*order.lock().unwrap(), vec!["outer", "inner"]);
}

#[test]
fn suspend_holds_queued_tasks_until_resume() {
    let host = ScriptHost::new();
    run_on(&host, |_env| ());

    host.suspend();

    let order = Arc::new(Mutex::new(Vec::new()));
    for i in 0..5 {
        let order = order.clone();
        host.dispatch(move |_env| order.lock().unwrap().push(i));
    }

    std::thread::sleep(Duration::from_millis(100));
    assert!(
        order.lock().unwrap().is_empty(),
        "no task may run while suspended"
    );

    host.resume();
    run_on(&host, |_env| ());
    assert_eq!(*order.lock().unwrap(), (0..5).collect::<Vec<_>>());
}

#[test]
fn resume_without_suspend_is_a_noop() {
    let host = ScriptHost::new();
    host.resume();
    assert_eq!(run_on(&host, |_env| 7), 7);
}

#[test]
fn teardown_discards_tasks_queued_behind_a_suspension() {
    let host = ScriptHost::new();
    run_on(&host, |_env| ());

    host.suspend();
    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..2 {
        let counter = counter.clone();
        host.dispatch(move |_env| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    }

    // Dropping the host resumes, cancels, and joins; the two queued tasks
    // must be discarded, never executed.
    drop(host);
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[test]
fn engine_error_reaches_the_handler_with_structure() {
    let (host, errors) = host_with_error_sink();

    run_on(&host, |env| {
        // The throw sits on line 10 of the script.
        let source = format!("{}throw new Error('boom');", "\n".repeat(9));
        let result = env.run_script(&source, Some("app.js"));
        assert!(matches!(result, Err(Status::PendingException)));
    });
    run_on(&host, |_env| ());

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1, "exactly one unhandled error: {errors:?}");
    assert!(errors[0].message.contains("boom"), "got: {:?}", errors[0]);
    assert_eq!(errors[0].line, Some(10));
    assert_eq!(errors[0].resource_name.as_deref(), Some("app.js"));
    assert!(errors[0].stack.is_some());
}

#[test]
fn host_panic_takes_the_generic_path_and_the_host_survives() {
    let (host, errors) = host_with_error_sink();

    host.dispatch(|_env| panic!("host-level failure"));
    assert_eq!(run_on(&host, |_env| 1), 1, "host must survive the panic");

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "host-level failure");
    assert!(errors[0].line.is_none());
    assert!(errors[0].stack.is_none());
}
