//! Trampoline semantics: calls, construct calls, user data, and exception
//! propagation.

mod common;

use std::cell::Cell;
use std::rc::Rc;

use common::with_env;
use scripthost::{Status, ValueType};

#[test]
fn plain_call_returns_the_callback_value() {
    with_env(|env| {
        let add = env
            .create_function(
                Some("add"),
                Box::new(|env, info| {
                    let a = env.get_value_double(info.arg(0).ok_or(Status::InvalidArg)?)?;
                    let b = env.get_value_double(info.arg(1).ok_or(Status::InvalidArg)?)?;
                    Ok(Some(env.create_double(a + b)?))
                }),
                None,
            )
            .unwrap();

        let recv = env.get_undefined().unwrap();
        let args = [
            env.create_double(2.0).unwrap(),
            env.create_double(40.0).unwrap(),
        ];
        let result = env.call_function(recv, add, &args).unwrap();
        assert_eq!(env.get_value_double(result).unwrap(), 42.0);

        // The function name is visible to script.
        let name = env.get_named_property(add, "name").unwrap();
        assert_eq!(env.get_value_string(name).unwrap(), "add");
    });
}

#[test]
fn plain_call_without_return_yields_undefined() {
    with_env(|env| {
        let noop = env
            .create_function(None, Box::new(|_env, _info| Ok(None)), None)
            .unwrap();
        let recv = env.get_undefined().unwrap();
        let result = env.call_function(recv, noop, &[]).unwrap();
        assert_eq!(env.type_of(result).unwrap(), ValueType::Undefined);
    });
}

#[test]
fn constructor_returning_nothing_yields_this() {
    with_env(|env| {
        let ctor = env
            .create_constructor(
                Some("Widget"),
                Box::new(|env, info| {
                    let tag = env.get_boolean(true)?;
                    env.set_named_property(info.this(), "tagged", tag)?;
                    Ok(None)
                }),
                None,
            )
            .unwrap();

        let instance = env.new_instance(ctor, &[]).unwrap();
        let tagged = env.get_named_property(instance, "tagged").unwrap();
        assert_eq!(env.get_value_bool(tagged).unwrap(), true);
    });
}

#[test]
fn constructor_returning_object_overrides_this() {
    with_env(|env| {
        let ctor = env
            .create_constructor(
                None,
                Box::new(|env, info| {
                    let tag = env.get_boolean(true)?;
                    env.set_named_property(info.this(), "tagged", tag)?;
                    let replacement = env.create_object()?;
                    env.set_named_property(replacement, "replaced", tag)?;
                    Ok(Some(replacement))
                }),
                None,
            )
            .unwrap();

        let instance = env.new_instance(ctor, &[]).unwrap();
        assert!(env.has_named_property(instance, "replaced").unwrap());
        assert!(!env.has_named_property(instance, "tagged").unwrap());
    });
}

#[test]
fn constructor_returning_non_object_keeps_this() {
    with_env(|env| {
        let ctor = env
            .create_constructor(
                None,
                Box::new(|env, info| {
                    let tag = env.get_boolean(true)?;
                    env.set_named_property(info.this(), "tagged", tag)?;
                    Ok(Some(env.create_string("ignored")?))
                }),
                None,
            )
            .unwrap();

        let instance = env.new_instance(ctor, &[]).unwrap();
        assert!(env.has_named_property(instance, "tagged").unwrap());
        assert_eq!(env.type_of(instance).unwrap(), ValueType::Object);
    });
}

#[test]
fn construct_calls_expose_the_new_target() {
    with_env(|env| {
        let seen = Rc::new(Cell::new((false, false)));
        let ctor = env
            .create_constructor(
                None,
                Box::new(|_env, info| {
                    let seen = info
                        .data()
                        .unwrap()
                        .downcast_ref::<Cell<(bool, bool)>>()
                        .unwrap();
                    seen.set((info.is_construct_call(), info.new_target().is_some()));
                    Ok(None)
                }),
                Some(seen.clone()),
            )
            .unwrap();

        env.new_instance(ctor, &[]).unwrap();
        assert_eq!(seen.get(), (true, true));

        let recv = env.get_undefined().unwrap();
        env.call_function(recv, ctor, &[]).unwrap();
        assert_eq!(seen.get(), (false, false));
    });
}

#[test]
fn callback_data_round_trips() {
    with_env(|env| {
        let counter = Rc::new(Cell::new(0u32));
        let bump = env
            .create_function(
                None,
                Box::new(|_env, info| {
                    let counter = info.data().unwrap().downcast_ref::<Cell<u32>>().unwrap();
                    counter.set(counter.get() + 1);
                    Ok(None)
                }),
                Some(counter.clone()),
            )
            .unwrap();

        let recv = env.get_undefined().unwrap();
        env.call_function(recv, bump, &[]).unwrap();
        env.call_function(recv, bump, &[]).unwrap();
        assert_eq!(counter.get(), 2);
    });
}

#[test]
fn script_can_invoke_native_functions() {
    with_env(|env| {
        let double = env
            .create_function(
                Some("double"),
                Box::new(|env, info| {
                    let n = env.get_value_double(info.arg(0).ok_or(Status::InvalidArg)?)?;
                    Ok(Some(env.create_double(n * 2.0)?))
                }),
                None,
            )
            .unwrap();
        let global = env.get_global().unwrap();
        env.set_named_property(global, "double", double).unwrap();

        let result = env.run_script("double(21)", None).unwrap();
        assert_eq!(env.get_value_double(result).unwrap(), 42.0);
    });
}

#[test]
fn error_status_from_native_code_becomes_an_engine_exception() {
    with_env(|env| {
        let failing = env
            .create_function(None, Box::new(|_env, _info| Err(Status::GenericFailure)), None)
            .unwrap();
        let recv = env.get_undefined().unwrap();

        let result = env.call_function(recv, failing, &[]);
        assert!(matches!(result, Err(Status::PendingException)));

        let exception = env.get_and_clear_last_exception().unwrap().unwrap();
        assert!(env.is_error(exception).unwrap());
        let message = env.get_named_property(exception, "message").unwrap();
        assert!(env.get_value_string(message).unwrap().contains("Unknown failure"));
    });
}

#[test]
fn native_throw_becomes_an_engine_exception() {
    with_env(|env| {
        let failing = env
            .create_function(
                None,
                Box::new(|env, _info| {
                    env.throw_type_error("explicit refusal")?;
                    Ok(None)
                }),
                None,
            )
            .unwrap();
        let recv = env.get_undefined().unwrap();

        assert!(matches!(
            env.call_function(recv, failing, &[]),
            Err(Status::PendingException)
        ));
        let exception = env.get_and_clear_last_exception().unwrap().unwrap();
        let message = env.get_named_property(exception, "message").unwrap();
        assert_eq!(env.get_value_string(message).unwrap(), "explicit refusal");
    });
}

#[test]
fn native_panic_becomes_an_engine_exception() {
    with_env(|env| {
        let panicking = env
            .create_function(None, Box::new(|_env, _info| panic!("kaboom")), None)
            .unwrap();
        let recv = env.get_undefined().unwrap();

        assert!(matches!(
            env.call_function(recv, panicking, &[]),
            Err(Status::PendingException)
        ));
        let exception = env.get_and_clear_last_exception().unwrap().unwrap();
        let message = env.get_named_property(exception, "message").unwrap();
        assert!(env.get_value_string(message).unwrap().contains("kaboom"));
    });
}

#[test]
fn script_throw_sets_the_pending_slot() {
    with_env(|env| {
        assert!(matches!(
            env.run_script("throw new TypeError('nope')", None),
            Err(Status::PendingException)
        ));
        assert!(env.is_exception_pending());

        // Operations that would re-enter script refuse to run while an
        // exception is pending.
        assert!(matches!(
            env.run_script("1 + 1", None),
            Err(Status::PendingException)
        ));

        let exception = env.get_and_clear_last_exception().unwrap().unwrap();
        assert!(env.is_error(exception).unwrap());
        assert!(!env.is_exception_pending());

        // Cleared: script runs again.
        let value = env.run_script("1 + 1", None).unwrap();
        assert_eq!(env.get_value_int32(value).unwrap(), 2);
    });
}
