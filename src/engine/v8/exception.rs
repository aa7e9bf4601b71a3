//! Exception bridging: throws, error construction, and the pending slot.
//!
//! A thrown value never unwinds through an ABI frame. Throws from script are
//! captured at the boundary into the per-Env pending-exception slot (see
//! `Env::try_with_scope`); throws from native code are recorded in the same
//! slot and re-raised by the trampoline on its way back into the engine.

use v8;

use crate::abi::{AbiResult, Status, Value};
use crate::error::ScriptError;

use super::env::Env;

enum ErrorKind {
    Error,
    TypeError,
    RangeError,
}

impl Env {
    /// Records `error` as the pending exception.
    pub fn throw(&self, error: Value) -> AbiResult<()> {
        self.check_thread();
        let global = self.dup_global(error)?;
        self.set_pending_exception(global);
        Ok(())
    }

    /// Records a fresh `Error` with the given message as pending.
    pub fn throw_error(&self, message: &str) -> AbiResult<()> {
        self.throw_new(ErrorKind::Error, message)
    }

    pub fn throw_type_error(&self, message: &str) -> AbiResult<()> {
        self.throw_new(ErrorKind::TypeError, message)
    }

    pub fn throw_range_error(&self, message: &str) -> AbiResult<()> {
        self.throw_new(ErrorKind::RangeError, message)
    }

    pub fn create_error(&self, message: Value) -> AbiResult<Value> {
        self.create_error_value(ErrorKind::Error, message)
    }

    pub fn create_type_error(&self, message: Value) -> AbiResult<Value> {
        self.create_error_value(ErrorKind::TypeError, message)
    }

    pub fn create_range_error(&self, message: Value) -> AbiResult<Value> {
        self.create_error_value(ErrorKind::RangeError, message)
    }

    pub fn is_error(&self, value: Value) -> AbiResult<bool> {
        self.with_scope(|scope| Ok(self.local_value(scope, value)?.is_native_error()))
    }

    pub fn is_exception_pending(&self) -> bool {
        self.has_pending_exception()
    }

    /// Takes the pending exception, if any, as a scope-recorded value and
    /// clears the slot. The slot is left untouched if no scope is open to
    /// record the value in.
    pub fn get_and_clear_last_exception(&self) -> AbiResult<Option<Value>> {
        self.with_scope(|scope| {
            let exception = {
                let inner = self.inner.borrow();
                let Some(pending) = &inner.pending_exception else {
                    return Ok(None);
                };
                let iso: &v8::OwnedIsolate = unsafe { &*inner.isolate };
                v8::Global::new(iso, pending)
            };
            let local = v8::Local::new(scope, &exception);
            let value = self.register_value(scope, local)?;
            self.inner.borrow_mut().pending_exception = None;
            Ok(Some(value))
        })
    }

    fn throw_new(&self, kind: ErrorKind, message: &str) -> AbiResult<()> {
        self.check_thread();
        self.with_scope(|scope| {
            let message = v8::String::new(scope, message).ok_or(Status::GenericFailure)?;
            let exception = make_error(scope, kind, message);
            let global = v8::Global::new(scope.as_ref(), exception);
            self.set_pending_exception(global);
            Ok(())
        })
    }

    fn create_error_value(&self, kind: ErrorKind, message: Value) -> AbiResult<Value> {
        self.with_scope(|scope| {
            let local = self.local_value(scope, message)?;
            let message =
                v8::Local::<v8::String>::try_from(local).map_err(|_| Status::StringExpected)?;
            let exception = make_error(scope, kind, message);
            self.register_value(scope, exception)
        })
    }
}

fn make_error<'s>(
    scope: &mut v8::PinScope<'s, '_>,
    kind: ErrorKind,
    message: v8::Local<'s, v8::String>,
) -> v8::Local<'s, v8::Value> {
    match kind {
        ErrorKind::Error => v8::Exception::error(scope, message),
        ErrorKind::TypeError => v8::Exception::type_error(scope, message),
        ErrorKind::RangeError => v8::Exception::range_error(scope, message),
    }
}

/// Structured error record for an escaped exception, with whatever source
/// attribution the engine can provide.
pub(crate) fn script_error_from_exception<'s>(
    scope: &mut v8::PinScope<'s, '_>,
    exception: v8::Local<'s, v8::Value>,
) -> ScriptError {
    let message = v8::Exception::create_message(scope, exception);

    let text = exception
        .to_object(scope)
        .and_then(|object| {
            let key = v8::String::new(scope, "message")?;
            object.get(scope, key.into())
        })
        .filter(|value| value.is_string())
        .map(|value| value.to_rust_string_lossy(scope))
        .unwrap_or_else(|| exception.to_rust_string_lossy(scope));

    let stack = exception
        .to_object(scope)
        .and_then(|object| {
            let key = v8::String::new(scope, "stack")?;
            object.get(scope, key.into())
        })
        .filter(|value| value.is_string())
        .map(|value| value.to_rust_string_lossy(scope));

    let start = message.get_start_column();
    let end = message.get_end_column();

    ScriptError {
        message: text,
        source_line: message
            .get_source_line(scope)
            .map(|line| line.to_rust_string_lossy(scope)),
        resource_name: message
            .get_script_resource_name(scope)
            .filter(|name| !name.is_undefined())
            .map(|name| name.to_rust_string_lossy(scope)),
        line: message.get_line_number(scope).map(|line| line as u32),
        column: Some(start as u32),
        length: (end > start).then(|| (end - start) as u32),
        stack,
    }
}
