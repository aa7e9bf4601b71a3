//! Callback trampolines, function calls, and script execution.
//!
//! The trampoline is the seam between engine frames and native code: it
//! captures the invocation (this/args/new-target), runs the native callback
//! behind a panic barrier, and converts every failure mode into an engine
//! exception. Nothing native ever unwinds into the engine; nothing
//! engine-side unwinds into native frames.

use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use v8;

use crate::abi::{AbiResult, CallbackInfo, NativeCallback, Status, Value};

use super::env::{Env, EnvInner};

struct TrampolineData {
    env: Weak<RefCell<EnvInner>>,
    callback: NativeCallback,
    data: Option<Rc<dyn Any>>,
    constructor: bool,
}

enum Completion {
    Return(Option<v8::Global<v8::Value>>),
    Exception(v8::Global<v8::Value>),
    Error(String),
}

impl Env {
    /// Binds a native callback (plus opaque user data) to an engine
    /// callable.
    pub fn create_function(
        &self,
        name: Option<&str>,
        callback: NativeCallback,
        data: Option<Rc<dyn Any>>,
    ) -> AbiResult<Value> {
        self.create_callable(name, callback, data, false)
    }

    /// Like [`create_function`](Self::create_function), but flagged as
    /// invocable with `new`: construct calls expose the new-target through
    /// `CallbackInfo` and apply the constructor return-value rules.
    pub fn create_constructor(
        &self,
        name: Option<&str>,
        callback: NativeCallback,
        data: Option<Rc<dyn Any>>,
    ) -> AbiResult<Value> {
        self.create_callable(name, callback, data, true)
    }

    fn create_callable(
        &self,
        name: Option<&str>,
        callback: NativeCallback,
        data: Option<Rc<dyn Any>>,
        constructor: bool,
    ) -> AbiResult<Value> {
        self.with_scope(|scope| {
            let tramp = Box::into_raw(Box::new(TrampolineData {
                env: self.downgrade(),
                callback,
                data,
                constructor,
            }));
            let external = v8::External::new(scope, tramp as *mut std::ffi::c_void);
            let func = v8::Function::builder(trampoline)
                .data(external.into())
                .build(scope)
                .ok_or(Status::GenericFailure)?;
            if let Some(name) = name {
                let name = v8::String::new(scope, name).ok_or(Status::GenericFailure)?;
                func.set_name(name);
            }

            // Reclaims the trampoline state when the engine collects the
            // data cell, or at teardown.
            let weak = v8::Weak::with_guaranteed_finalizer(
                scope,
                external,
                Box::new(move || {
                    drop(unsafe { Box::from_raw(tramp) });
                }),
            );
            self.inner.borrow_mut().finalizers.push(weak);

            self.register_value(scope, func.into())
        })
    }

    /// Calls `func` with the given receiver and arguments. A throw from
    /// script lands in the pending-exception slot and surfaces as
    /// `PendingException`.
    pub fn call_function(&self, recv: Value, func: Value, args: &[Value]) -> AbiResult<Value> {
        self.try_with_scope(|scope| {
            let func = self.local_function(scope, func)?;
            let recv = self.local_value(scope, recv)?;
            let mut argv = Vec::with_capacity(args.len());
            for arg in args {
                argv.push(self.local_value(scope, *arg)?);
            }
            let result = func
                .call(scope, recv, &argv)
                .ok_or(Status::GenericFailure)?;
            self.register_value(scope, result)
        })
    }

    /// Construct-calls `constructor` with the given arguments.
    pub fn new_instance(&self, constructor: Value, args: &[Value]) -> AbiResult<Value> {
        self.try_with_scope(|scope| {
            let constructor = self.local_function(scope, constructor)?;
            let mut argv = Vec::with_capacity(args.len());
            for arg in args {
                argv.push(self.local_value(scope, *arg)?);
            }
            let result = constructor
                .new_instance(scope, &argv)
                .ok_or(Status::GenericFailure)?;
            self.register_value(scope, result.into())
        })
    }

    /// Compiles and runs `source` in the active context. `resource_name`
    /// becomes the script URL in error locations and stack traces.
    pub fn run_script(&self, source: &str, resource_name: Option<&str>) -> AbiResult<Value> {
        self.try_with_scope(|scope| {
            let code = v8::String::new(scope, source).ok_or(Status::GenericFailure)?;
            let origin = match resource_name {
                Some(name) => {
                    let name = v8::String::new(scope, name).ok_or(Status::GenericFailure)?;
                    Some(v8::ScriptOrigin::new(
                        scope,
                        name.into(),
                        0,
                        0,
                        false,
                        0,
                        None,
                        false,
                        false,
                        false,
                        None,
                    ))
                }
                None => None,
            };
            let script =
                v8::Script::compile(scope, code, origin.as_ref()).ok_or(Status::GenericFailure)?;
            let result = script.run(scope).ok_or(Status::GenericFailure)?;
            self.register_value(scope, result)
        })
    }
}

/// The engine-facing callback every created function routes through.
fn trampoline<'s>(
    scope: &mut v8::PinScope<'s, '_>,
    args: v8::FunctionCallbackArguments<'s>,
    mut rv: v8::ReturnValue,
) {
    let Ok(external) = v8::Local::<v8::External>::try_from(args.data()) else {
        return;
    };
    let tramp = unsafe { &*(external.value() as *const TrampolineData) };
    let Some(inner) = tramp.env.upgrade() else {
        return;
    };
    let env = Env { inner };

    // Reentrancy: ABI operations issued by the native callback must target
    // the context this invocation entered, not the attach-time context.
    let invoked_context = scope.get_current_context();
    let invoked_context = v8::Global::new(scope.as_ref(), invoked_context);
    let saved_context = env
        .inner
        .borrow_mut()
        .current_context
        .replace(invoked_context);

    // Values captured for the callback live in a scope of their own.
    let abi_scope = env.open_handle_scope();

    let completion = match build_callback_info(&env, scope, &args, tramp) {
        Ok(info) => {
            match panic::catch_unwind(AssertUnwindSafe(|| (tramp.callback)(&env, &info))) {
                Ok(result) => {
                    if let Some(exception) = env.take_pending_exception() {
                        Completion::Exception(exception)
                    } else {
                        match result {
                            Ok(Some(value)) => match env.dup_global(value) {
                                Ok(global) => Completion::Return(Some(global)),
                                Err(status) => Completion::Error(status.message().to_string()),
                            },
                            Ok(None) => Completion::Return(None),
                            Err(status) => Completion::Error(status.message().to_string()),
                        }
                    }
                }
                Err(payload) => Completion::Error(panic_message(payload)),
            }
        }
        Err(status) => Completion::Error(status.message().to_string()),
    };

    let _ = env.close_handle_scope(abi_scope);
    env.inner.borrow_mut().current_context = saved_context;

    let construct_call = !args.new_target().is_undefined();
    match completion {
        Completion::Return(Some(global)) => {
            let local = v8::Local::new(scope, &global);
            if construct_call {
                // A constructor returning a non-object keeps the freshly
                // allocated `this`; an object replaces it.
                if local.is_object() {
                    rv.set(local);
                }
            } else {
                rv.set(local);
            }
        }
        Completion::Return(None) => {
            // Construct calls fall back to `this`; plain calls to undefined.
            if !construct_call {
                rv.set_undefined();
            }
        }
        Completion::Exception(global) => {
            let local = v8::Local::new(scope, &global);
            scope.throw_exception(local);
        }
        Completion::Error(message) => {
            let message =
                v8::String::new(scope, &message).unwrap_or_else(|| v8::String::empty(scope));
            let exception = v8::Exception::error(scope, message);
            scope.throw_exception(exception);
        }
    }
}

fn build_callback_info<'s>(
    env: &Env,
    scope: &mut v8::PinScope<'s, '_>,
    args: &v8::FunctionCallbackArguments<'s>,
    tramp: &TrampolineData,
) -> AbiResult<CallbackInfo> {
    let this = env.register_value(scope, args.this().into())?;
    let mut argv = Vec::with_capacity(args.length() as usize);
    for i in 0..args.length() {
        argv.push(env.register_value(scope, args.get(i))?);
    }
    let construct_call = !args.new_target().is_undefined();
    let new_target = if construct_call && tramp.constructor {
        Some(env.register_value(scope, args.new_target())?)
    } else {
        None
    };
    Ok(CallbackInfo {
        this,
        args: argv,
        new_target,
        construct_call,
        data: tramp.data.clone(),
    })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("native callback panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("native callback panicked: {message}")
    } else {
        "native callback panicked".to_string()
    }
}
