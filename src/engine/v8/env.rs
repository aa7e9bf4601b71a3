//! Environment handle: per-attach state for the V8 adapter.
//!
//! An [`Env`] is minted once per attach by the environment tier and is bound
//! to one isolate, one context, and one thread. It carries the bookkeeping
//! the ABI contract requires: the handle-scope slot table, the reference
//! table, the pending-exception slot, and the private-key table used for
//! object wrapping.

use std::cell::RefCell;
use std::collections::HashMap;
use std::pin::pin;
use std::rc::{Rc, Weak};
use std::thread::ThreadId;

use v8;

use crate::abi::{AbiResult, Reference, Status, Value};
use crate::error::ScriptError;

use super::exception::script_error_from_exception;

pub(crate) struct RefEntry {
    pub(crate) value: v8::Global<v8::Value>,
    pub(crate) count: u32,
}

pub(crate) struct ScopeRecord {
    pub(crate) start: usize,
    pub(crate) escapable: bool,
    pub(crate) escaped: bool,
}

pub(crate) struct EnvInner {
    /// Owning isolate. It lives on the execution thread's stack frame for
    /// the whole run (see bootstrap) and is only ever touched from that
    /// thread, so the raw pointer stays valid for the life of the Env.
    pub(crate) isolate: *mut v8::OwnedIsolate,
    /// Context created at attach time.
    pub(crate) context: v8::Global<v8::Context>,
    /// Context installed by a reentrant trampoline invocation, if any.
    pub(crate) current_context: Option<v8::Global<v8::Context>>,
    /// Persistent handles recorded by open handle scopes, keyed by value id.
    pub(crate) slots: HashMap<u64, v8::Global<v8::Value>>,
    /// Creation order of live value ids; scopes are ranges over this list.
    pub(crate) entries: Vec<u64>,
    pub(crate) scopes: Vec<ScopeRecord>,
    pub(crate) next_value_id: u64,
    pub(crate) references: HashMap<u64, RefEntry>,
    pub(crate) next_ref_id: u64,
    pub(crate) pending_exception: Option<v8::Global<v8::Value>>,
    /// Host metadata key used to attach wrapped native data to objects.
    pub(crate) wrap_key: v8::Global<v8::Private>,
    /// Keeps guaranteed finalizers registered until teardown.
    pub(crate) finalizers: Vec<v8::Weak<v8::External>>,
    pub(crate) thread: ThreadId,
}

/// Opaque environment handle.
///
/// Cheap to clone; `!Send`, so the compiler enforces that every ABI
/// operation stays on the thread the environment was attached on.
#[derive(Clone)]
pub struct Env {
    pub(crate) inner: Rc<RefCell<EnvInner>>,
}

impl Env {
    /// Mints the environment handle for an isolate/context pair. Called
    /// exactly once per attach, from the environment tier, on the thread
    /// that owns the isolate.
    pub(crate) fn attach(
        isolate: *mut v8::OwnedIsolate,
        context: v8::Global<v8::Context>,
    ) -> Self {
        let wrap_key = {
            let iso = unsafe { &mut *isolate };
            let scope = pin!(v8::HandleScope::new(iso));
            let mut scope = scope.init();
            let local = v8::Local::new(&scope, &context);
            let scope = &mut v8::ContextScope::new(&mut scope, local);
            let name = v8::String::new(scope, "scripthost.wrap").unwrap();
            let key = v8::Private::for_api(scope, Some(name));
            v8::Global::new(scope.as_ref(), key)
        };

        Env {
            inner: Rc::new(RefCell::new(EnvInner {
                isolate,
                context,
                current_context: None,
                slots: HashMap::new(),
                entries: Vec::new(),
                scopes: Vec::new(),
                next_value_id: 1,
                references: HashMap::new(),
                next_ref_id: 1,
                pending_exception: None,
                wrap_key,
                finalizers: Vec::new(),
                thread: std::thread::current().id(),
            })),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<RefCell<EnvInner>> {
        Rc::downgrade(&self.inner)
    }

    #[inline]
    pub(crate) fn check_thread(&self) {
        debug_assert_eq!(
            std::thread::current().id(),
            self.inner.borrow().thread,
            "ABI operation invoked off the environment's owning thread"
        );
    }

    pub(crate) fn isolate_ptr(&self) -> *mut v8::OwnedIsolate {
        self.inner.borrow().isolate
    }

    /// Duplicate of the context the environment should execute in right now:
    /// the attach-time context unless a reentrant callback installed the one
    /// it was invoked under.
    pub(crate) fn active_context(&self) -> v8::Global<v8::Context> {
        let inner = self.inner.borrow();
        let iso: &v8::OwnedIsolate = unsafe { &*inner.isolate };
        match &inner.current_context {
            Some(current) => v8::Global::new(iso, current),
            None => v8::Global::new(iso, &inner.context),
        }
    }

    /// Runs `f` inside a fresh engine handle scope entered into the active
    /// context. No `RefCell` borrow is held while `f` runs, so ABI
    /// operations may nest (trampoline reentrancy).
    pub(crate) fn with_scope<T>(
        &self,
        f: impl for<'s, 'i> FnOnce(&mut v8::PinScope<'s, 'i>) -> T,
    ) -> T {
        self.check_thread();
        let isolate = self.isolate_ptr();
        let context = self.active_context();

        let iso = unsafe { &mut *isolate };
        let scope = pin!(v8::HandleScope::new(iso));
        let mut scope = scope.init();
        let local = v8::Local::new(&scope, &context);
        let mut scope = v8::ContextScope::new(&mut scope, local);
        f(&mut scope)
    }

    /// Like [`with_scope`](Self::with_scope), but refuses to run while an
    /// exception is pending and captures anything thrown by the engine into
    /// the pending-exception slot. This is the bridge that keeps engine
    /// throws from unwinding through ABI frames.
    pub(crate) fn try_with_scope<T>(
        &self,
        f: impl for<'s, 'i> FnOnce(&mut v8::PinScope<'s, 'i>) -> AbiResult<T>,
    ) -> AbiResult<T> {
        if self.has_pending_exception() {
            return Err(Status::PendingException);
        }
        self.with_scope(|scope| {
            let tc = pin!(v8::TryCatch::new(scope));
            let mut tc = tc.init();
            let result = f(&mut tc);
            if tc.has_caught() {
                if let Some(exception) = tc.exception() {
                    let global = v8::Global::new(tc.as_ref(), exception);
                    self.inner.borrow_mut().pending_exception = Some(global);
                }
                return Err(Status::PendingException);
            }
            result
        })
    }

    /// Records a freshly produced engine value in the innermost open handle
    /// scope and returns its opaque handle. This is the "dup" half of the
    /// dup-on-create/free-on-close discipline: the persistent handle created
    /// here is dropped when the scope closes.
    pub(crate) fn register_value<'s>(
        &self,
        scope: &mut v8::PinScope<'s, '_>,
        local: v8::Local<'s, v8::Value>,
    ) -> AbiResult<Value> {
        let mut inner = self.inner.borrow_mut();
        if inner.scopes.is_empty() {
            return Err(Status::HandleScopeMismatch);
        }
        let id = inner.next_value_id;
        inner.next_value_id += 1;
        let global = v8::Global::new(scope.as_ref(), local);
        inner.slots.insert(id, global);
        inner.entries.push(id);
        Ok(Value(id))
    }

    /// Materializes the engine value behind a handle into `scope`. Stale
    /// handles (scope already closed) yield `InvalidArg`.
    pub(crate) fn local_value<'s>(
        &self,
        scope: &mut v8::PinScope<'s, '_>,
        value: Value,
    ) -> AbiResult<v8::Local<'s, v8::Value>> {
        let inner = self.inner.borrow();
        match inner.slots.get(&value.0) {
            Some(global) => Ok(v8::Local::new(scope, global)),
            None => Err(Status::InvalidArg),
        }
    }

    pub(crate) fn local_object<'s>(
        &self,
        scope: &mut v8::PinScope<'s, '_>,
        value: Value,
    ) -> AbiResult<v8::Local<'s, v8::Object>> {
        let local = self.local_value(scope, value)?;
        v8::Local::<v8::Object>::try_from(local).map_err(|_| Status::ObjectExpected)
    }

    pub(crate) fn local_function<'s>(
        &self,
        scope: &mut v8::PinScope<'s, '_>,
        value: Value,
    ) -> AbiResult<v8::Local<'s, v8::Function>> {
        let local = self.local_value(scope, value)?;
        v8::Local::<v8::Function>::try_from(local).map_err(|_| Status::FunctionExpected)
    }

    /// Duplicate of the persistent handle behind `value`, independent of any
    /// scope. Internal stepping stone for references and escapes.
    pub(crate) fn dup_global(&self, value: Value) -> AbiResult<v8::Global<v8::Value>> {
        let inner = self.inner.borrow();
        let iso: &v8::OwnedIsolate = unsafe { &*inner.isolate };
        match inner.slots.get(&value.0) {
            Some(global) => Ok(v8::Global::new(iso, global)),
            None => Err(Status::InvalidArg),
        }
    }

    pub(crate) fn set_pending_exception(&self, exception: v8::Global<v8::Value>) {
        self.inner.borrow_mut().pending_exception = Some(exception);
    }

    pub(crate) fn has_pending_exception(&self) -> bool {
        self.inner.borrow().pending_exception.is_some()
    }

    pub(crate) fn take_pending_exception(&self) -> Option<v8::Global<v8::Value>> {
        self.inner.borrow_mut().pending_exception.take()
    }

    /// Converts and clears a pending engine exception into a structured
    /// error record. Used by the host's dispatch boundary.
    pub(crate) fn take_pending_script_error(&self) -> Option<ScriptError> {
        let exception = self.take_pending_exception()?;
        Some(self.with_scope(|scope| {
            let local = v8::Local::new(scope, &exception);
            script_error_from_exception(scope, local)
        }))
    }

    /// Drains the engine's microtask queue. The host calls this once per
    /// dispatched task.
    pub(crate) fn run_microtasks(&self) {
        self.check_thread();
        let iso = unsafe { &mut *self.isolate_ptr() };
        iso.perform_microtask_checkpoint();
    }
}

// Reference management: explicitly-counted handles that outlive scopes.
impl Env {
    /// Creates a reference on `value` with the given initial count. The
    /// engine value stays alive until [`delete_reference`]
    /// (Self::delete_reference), independent of the count.
    pub fn create_reference(&self, value: Value, initial_count: u32) -> AbiResult<Reference> {
        self.check_thread();
        let global = self.dup_global(value)?;
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_ref_id;
        inner.next_ref_id += 1;
        inner.references.insert(
            id,
            RefEntry {
                value: global,
                count: initial_count,
            },
        );
        Ok(Reference(id))
    }

    /// Increments the count, returning the new value.
    pub fn reference_ref(&self, reference: Reference) -> AbiResult<u32> {
        self.check_thread();
        let mut inner = self.inner.borrow_mut();
        let entry = inner
            .references
            .get_mut(&reference.0)
            .ok_or(Status::InvalidArg)?;
        entry.count += 1;
        Ok(entry.count)
    }

    /// Decrements the count, saturating at zero, returning the new value.
    pub fn reference_unref(&self, reference: Reference) -> AbiResult<u32> {
        self.check_thread();
        let mut inner = self.inner.borrow_mut();
        let entry = inner
            .references
            .get_mut(&reference.0)
            .ok_or(Status::InvalidArg)?;
        if entry.count > 0 {
            entry.count -= 1;
        }
        Ok(entry.count)
    }

    /// Produces a scope-recorded handle for the referenced value, or `None`
    /// once the count has reached zero (the record itself persists until
    /// deleted).
    pub fn get_reference_value(&self, reference: Reference) -> AbiResult<Option<Value>> {
        self.with_scope(|scope| {
            let global = {
                let inner = self.inner.borrow();
                let entry = inner
                    .references
                    .get(&reference.0)
                    .ok_or(Status::InvalidArg)?;
                if entry.count == 0 {
                    return Ok(None);
                }
                let iso: &v8::OwnedIsolate = unsafe { &*inner.isolate };
                v8::Global::new(iso, &entry.value)
            };
            let local = v8::Local::new(scope, &global);
            self.register_value(scope, local).map(Some)
        })
    }

    /// Deletes the reference record and releases the underlying engine
    /// ownership immediately, regardless of the count. A second delete on
    /// the same reference fails with `InvalidArg`.
    pub fn delete_reference(&self, reference: Reference) -> AbiResult<()> {
        self.check_thread();
        let mut inner = self.inner.borrow_mut();
        inner
            .references
            .remove(&reference.0)
            .map(|_| ())
            .ok_or(Status::InvalidArg)
    }
}
