//! Explicitly-counted references.

mod common;

use std::time::Duration;

use common::{run_on, with_env};
use scripthost::{ScriptHost, Status};

#[test]
fn count_lifecycle_and_null_sentinel() {
    with_env(|env| {
        let value = env.create_string("kept").unwrap();
        let reference = env.create_reference(value, 1).unwrap();

        assert_eq!(env.reference_ref(reference).unwrap(), 2);
        assert_eq!(env.reference_unref(reference).unwrap(), 1);
        assert_eq!(env.reference_unref(reference).unwrap(), 0);

        // Inert at zero, but the record itself persists.
        assert_eq!(env.get_reference_value(reference).unwrap(), None);
        // The count saturates rather than going negative.
        assert_eq!(env.reference_unref(reference).unwrap(), 0);

        // Delete succeeds exactly once.
        env.delete_reference(reference).unwrap();
        assert_eq!(env.delete_reference(reference), Err(Status::InvalidArg));
    });
}

#[test]
fn reference_outlives_handle_scopes() {
    with_env(|env| {
        let reference = {
            let scope = env.open_handle_scope();
            let value = env.create_string("survivor").unwrap();
            let reference = env.create_reference(value, 1).unwrap();
            env.close_handle_scope(scope).unwrap();
            reference
        };

        let revived = env.get_reference_value(reference).unwrap().unwrap();
        assert_eq!(env.get_value_string(revived).unwrap(), "survivor");
        env.delete_reference(reference).unwrap();
    });
}

#[test]
fn reference_usable_across_suspend_and_resume() {
    let host = ScriptHost::new();
    let reference = run_on(&host, |env| {
        let value = env.create_string("across").unwrap();
        env.create_reference(value, 1).unwrap()
    });

    host.suspend();

    let (tx, rx) = std::sync::mpsc::channel();
    host.dispatch(move |env| {
        let scope = env.open_handle_scope();
        let value = env.get_reference_value(reference).unwrap().unwrap();
        tx.send(env.get_value_string(value).unwrap()).unwrap();
        env.close_handle_scope(scope).unwrap();
    });

    std::thread::sleep(Duration::from_millis(50));
    assert!(rx.try_recv().is_err(), "task must wait behind the suspension");

    host.resume();
    assert_eq!(rx.recv().unwrap(), "across");
}

#[test]
fn stale_value_handles_cannot_be_referenced() {
    with_env(|env| {
        let scope = env.open_handle_scope();
        let value = env.create_string("gone").unwrap();
        env.close_handle_scope(scope).unwrap();
        assert_eq!(env.create_reference(value, 1), Err(Status::InvalidArg));
    });
}
