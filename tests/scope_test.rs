//! Handle-scope lifetime and escape semantics.

mod common;

use common::with_env;
use scripthost::{ScriptHost, Status};

#[test]
fn closing_a_scope_releases_only_its_values() {
    with_env(|env| {
        let outer = env.create_string("outer").unwrap();

        let scope = env.open_handle_scope();
        let a = env.create_string("a").unwrap();
        let b = env.create_string("b").unwrap();
        assert_eq!(env.get_value_string(a).unwrap(), "a");
        env.close_handle_scope(scope).unwrap();

        // Handles recorded in the closed scope are stale now.
        assert_eq!(env.get_value_string(a), Err(Status::InvalidArg));
        assert_eq!(env.get_value_string(b), Err(Status::InvalidArg));
        // The enclosing scope's value is untouched and still usable.
        assert_eq!(env.get_value_string(outer).unwrap(), "outer");
    });
}

#[test]
fn value_producing_call_without_an_open_scope_is_rejected() {
    // Bypasses the common helper on purpose: no scope is opened here.
    let host = ScriptHost::new();
    let (tx, rx) = std::sync::mpsc::channel();
    host.dispatch(move |env| {
        tx.send(env.get_undefined()).unwrap();
    });
    assert_eq!(rx.recv().unwrap(), Err(Status::HandleScopeMismatch));
}

#[test]
fn scopes_must_close_in_lifo_order() {
    with_env(|env| {
        let outer = env.open_handle_scope();
        let inner = env.open_handle_scope();

        assert_eq!(
            env.close_handle_scope(outer),
            Err(Status::HandleScopeMismatch),
            "closing a non-innermost scope is rejected"
        );
        env.close_handle_scope(inner).unwrap();
        env.close_handle_scope(outer).unwrap();
    });
}

#[test]
fn scopes_nest_within_a_single_task() {
    with_env(|env| {
        let first = env.create_string("first").unwrap();
        for _ in 0..3 {
            let scope = env.open_handle_scope();
            let nested = env.open_handle_scope();
            let tmp = env.create_string("tmp").unwrap();
            assert_eq!(env.get_value_string(tmp).unwrap(), "tmp");
            env.close_handle_scope(nested).unwrap();
            env.close_handle_scope(scope).unwrap();
        }
        assert_eq!(env.get_value_string(first).unwrap(), "first");
    });
}

#[test]
fn escape_promotes_one_value_past_the_scope() {
    with_env(|env| {
        let scope = env.open_escapable_handle_scope();
        let keeper = env.create_string("keeper").unwrap();
        let doomed = env.create_string("doomed").unwrap();
        let escaped = env.escape_handle(&scope, keeper).unwrap();
        env.close_escapable_handle_scope(scope).unwrap();

        assert_eq!(env.get_value_string(escaped).unwrap(), "keeper");
        assert_eq!(env.get_value_string(keeper), Err(Status::InvalidArg));
        assert_eq!(env.get_value_string(doomed), Err(Status::InvalidArg));
    });
}

#[test]
fn escape_is_allowed_once_per_scope() {
    with_env(|env| {
        let scope = env.open_escapable_handle_scope();
        let value = env.create_string("once").unwrap();
        env.escape_handle(&scope, value).unwrap();
        assert_eq!(
            env.escape_handle(&scope, value),
            Err(Status::EscapeCalledTwice)
        );
        env.close_escapable_handle_scope(scope).unwrap();
    });
}

#[test]
fn escaped_value_lands_in_the_enclosing_scope() {
    with_env(|env| {
        let outer = env.open_handle_scope();
        let escaped = {
            let inner = env.open_escapable_handle_scope();
            let value = env.create_string("promoted").unwrap();
            let escaped = env.escape_handle(&inner, value).unwrap();
            env.close_escapable_handle_scope(inner).unwrap();
            escaped
        };
        assert_eq!(env.get_value_string(escaped).unwrap(), "promoted");
        env.close_handle_scope(outer).unwrap();
        // Closing the enclosing scope finally releases it.
        assert_eq!(env.get_value_string(escaped), Err(Status::InvalidArg));
    });
}
