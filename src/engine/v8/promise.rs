//! Promise/deferred bridging.
//!
//! A deferred is a reference-table entry holding the engine's resolver, so
//! any later native code — typically a different dispatched task — can
//! settle the promise. Settling consumes the `Deferred` and deletes the
//! entry, enforcing exactly-once at the type level.

use v8;

use crate::abi::{AbiResult, Deferred, Status, Value};

use super::env::{Env, RefEntry};

impl Env {
    /// Creates a promise plus the deferred that controls it. The promise
    /// handle lives in the current scope; the deferred is scope-independent.
    pub fn create_promise(&self) -> AbiResult<(Deferred, Value)> {
        self.with_scope(|scope| {
            let resolver = v8::PromiseResolver::new(scope).ok_or(Status::GenericFailure)?;
            let promise = resolver.get_promise(scope);
            let promise = self.register_value(scope, promise.into())?;

            let resolver: v8::Local<v8::Value> = resolver.into();
            let global = v8::Global::new(scope.as_ref(), resolver);
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_ref_id;
            inner.next_ref_id += 1;
            inner.references.insert(
                id,
                RefEntry {
                    value: global,
                    count: 1,
                },
            );
            Ok((Deferred(id), promise))
        })
    }

    /// Resolves the promise behind `deferred` with `resolution`.
    pub fn resolve_deferred(&self, deferred: Deferred, resolution: Value) -> AbiResult<()> {
        self.settle_deferred(deferred, resolution, true)
    }

    /// Rejects the promise behind `deferred` with `rejection`.
    pub fn reject_deferred(&self, deferred: Deferred, rejection: Value) -> AbiResult<()> {
        self.settle_deferred(deferred, rejection, false)
    }

    pub fn is_promise(&self, value: Value) -> AbiResult<bool> {
        self.with_scope(|scope| Ok(self.local_value(scope, value)?.is_promise()))
    }

    fn settle_deferred(&self, deferred: Deferred, value: Value, resolve: bool) -> AbiResult<()> {
        self.try_with_scope(|scope| {
            let value = self.local_value(scope, value)?;
            let entry = self
                .inner
                .borrow_mut()
                .references
                .remove(&deferred.0)
                .ok_or(Status::InvalidArg)?;
            let local = v8::Local::new(scope, &entry.value);
            // `entry.value` always holds a resolver (see `create_promise`); v8 140
            // exposes no checked downcast to `PromiseResolver`, so cast unchecked.
            let resolver =
                unsafe { v8::Local::<v8::PromiseResolver>::cast_unchecked(local) };
            let settled = if resolve {
                resolver.resolve(scope, value)
            } else {
                resolver.reject(scope, value)
            };
            settled.ok_or(Status::GenericFailure)?;
            Ok(())
        })
    }
}
