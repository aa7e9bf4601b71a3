//! Objects, arrays, property access, and wrapped native data.

use std::any::Any;
use std::rc::Rc;

use v8;

use crate::abi::{AbiResult, Finalizer, Status, Value};

use super::env::Env;

/// Heap cell behind a `v8::External`. Reclaimed by the guaranteed finalizer
/// once the engine collects the external (or at isolate teardown).
pub(crate) struct ExternalCell {
    pub(crate) data: Rc<dyn Any>,
}

impl Env {
    pub fn create_object(&self) -> AbiResult<Value> {
        self.with_scope(|scope| {
            let local = v8::Object::new(scope);
            self.register_value(scope, local.into())
        })
    }

    pub fn create_array(&self) -> AbiResult<Value> {
        self.with_scope(|scope| {
            let local = v8::Array::new(scope, 0);
            self.register_value(scope, local.into())
        })
    }

    pub fn create_array_with_length(&self, length: usize) -> AbiResult<Value> {
        self.with_scope(|scope| {
            let local = v8::Array::new(scope, length as i32);
            self.register_value(scope, local.into())
        })
    }

    pub fn is_array(&self, value: Value) -> AbiResult<bool> {
        self.with_scope(|scope| Ok(self.local_value(scope, value)?.is_array()))
    }

    pub fn get_array_length(&self, value: Value) -> AbiResult<u32> {
        self.with_scope(|scope| {
            let local = self.local_value(scope, value)?;
            let array =
                v8::Local::<v8::Array>::try_from(local).map_err(|_| Status::ArrayExpected)?;
            Ok(array.length())
        })
    }

    /// Property get. Getters may run script, so a throw surfaces as
    /// `PendingException`.
    pub fn get_property(&self, object: Value, key: Value) -> AbiResult<Value> {
        self.try_with_scope(|scope| {
            let object = self.local_object(scope, object)?;
            let key = self.local_value(scope, key)?;
            let result = object.get(scope, key).ok_or(Status::GenericFailure)?;
            self.register_value(scope, result)
        })
    }

    pub fn set_property(&self, object: Value, key: Value, value: Value) -> AbiResult<()> {
        self.try_with_scope(|scope| {
            let object = self.local_object(scope, object)?;
            let key = self.local_value(scope, key)?;
            let value = self.local_value(scope, value)?;
            object
                .set(scope, key, value)
                .ok_or(Status::GenericFailure)?;
            Ok(())
        })
    }

    pub fn has_property(&self, object: Value, key: Value) -> AbiResult<bool> {
        self.try_with_scope(|scope| {
            let object = self.local_object(scope, object)?;
            let key = self.local_value(scope, key)?;
            object.has(scope, key).ok_or(Status::GenericFailure)
        })
    }

    pub fn delete_property(&self, object: Value, key: Value) -> AbiResult<bool> {
        self.try_with_scope(|scope| {
            let object = self.local_object(scope, object)?;
            let key = self.local_value(scope, key)?;
            object.delete(scope, key).ok_or(Status::GenericFailure)
        })
    }

    pub fn get_named_property(&self, object: Value, name: &str) -> AbiResult<Value> {
        self.try_with_scope(|scope| {
            let object = self.local_object(scope, object)?;
            let key = v8::String::new(scope, name).ok_or(Status::GenericFailure)?;
            let result = object
                .get(scope, key.into())
                .ok_or(Status::GenericFailure)?;
            self.register_value(scope, result)
        })
    }

    pub fn set_named_property(&self, object: Value, name: &str, value: Value) -> AbiResult<()> {
        self.try_with_scope(|scope| {
            let object = self.local_object(scope, object)?;
            let key = v8::String::new(scope, name).ok_or(Status::GenericFailure)?;
            let value = self.local_value(scope, value)?;
            object
                .set(scope, key.into(), value)
                .ok_or(Status::GenericFailure)?;
            Ok(())
        })
    }

    pub fn has_named_property(&self, object: Value, name: &str) -> AbiResult<bool> {
        self.try_with_scope(|scope| {
            let object = self.local_object(scope, object)?;
            let key = v8::String::new(scope, name).ok_or(Status::GenericFailure)?;
            object.has(scope, key.into()).ok_or(Status::GenericFailure)
        })
    }

    pub fn get_element(&self, object: Value, index: u32) -> AbiResult<Value> {
        self.try_with_scope(|scope| {
            let object = self.local_object(scope, object)?;
            let result = object
                .get_index(scope, index)
                .ok_or(Status::GenericFailure)?;
            self.register_value(scope, result)
        })
    }

    pub fn set_element(&self, object: Value, index: u32, value: Value) -> AbiResult<()> {
        self.try_with_scope(|scope| {
            let object = self.local_object(scope, object)?;
            let value = self.local_value(scope, value)?;
            object
                .set_index(scope, index, value)
                .ok_or(Status::GenericFailure)?;
            Ok(())
        })
    }

    pub fn has_element(&self, object: Value, index: u32) -> AbiResult<bool> {
        self.try_with_scope(|scope| {
            let object = self.local_object(scope, object)?;
            object
                .has_index(scope, index)
                .ok_or(Status::GenericFailure)
        })
    }

    pub fn delete_element(&self, object: Value, index: u32) -> AbiResult<bool> {
        self.try_with_scope(|scope| {
            let object = self.local_object(scope, object)?;
            object
                .delete_index(scope, index)
                .ok_or(Status::GenericFailure)
        })
    }

    /// Own enumerable string-keyed property names, as an array value.
    pub fn get_property_names(&self, object: Value) -> AbiResult<Value> {
        self.try_with_scope(|scope| {
            let object = self.local_object(scope, object)?;
            let names = object
                .get_own_property_names(scope, Default::default())
                .ok_or(Status::GenericFailure)?;
            self.register_value(scope, names.into())
        })
    }

    pub fn get_prototype(&self, object: Value) -> AbiResult<Value> {
        self.try_with_scope(|scope| {
            let object = self.local_object(scope, object)?;
            let proto = object
                .get_prototype(scope)
                .ok_or(Status::GenericFailure)?;
            self.register_value(scope, proto)
        })
    }

    /// `value instanceof constructor`. May run script (`hasInstance`).
    pub fn instance_of(&self, value: Value, constructor: Value) -> AbiResult<bool> {
        self.try_with_scope(|scope| {
            let local = self.local_value(scope, value)?;
            let constructor = self.local_object(scope, constructor)?;
            local
                .instance_of(scope, constructor)
                .ok_or(Status::GenericFailure)
        })
    }

    /// Attaches native data to a fresh external value. The finalizer runs
    /// exactly once, when the engine collects the external or at
    /// environment teardown, and must not assume any handle scope is open.
    pub fn create_external(
        &self,
        data: Rc<dyn Any>,
        finalizer: Option<Finalizer>,
    ) -> AbiResult<Value> {
        self.with_scope(|scope| {
            let external = self.new_external(scope, data, finalizer);
            self.register_value(scope, external.into())
        })
    }

    pub fn get_value_external(&self, value: Value) -> AbiResult<Rc<dyn Any>> {
        self.with_scope(|scope| {
            let local = self.local_value(scope, value)?;
            let external =
                v8::Local::<v8::External>::try_from(local).map_err(|_| Status::InvalidArg)?;
            let cell = external.value() as *const ExternalCell;
            // The cell outlives every strong handle to the external; a live
            // Value handle therefore guarantees it has not been finalized.
            Ok(unsafe { (*cell).data.clone() })
        })
    }

    /// Wraps native data in `object` under the environment's private key.
    /// Fails with `InvalidArg` if the object is already wrapped.
    pub fn wrap(
        &self,
        object: Value,
        data: Rc<dyn Any>,
        finalizer: Option<Finalizer>,
    ) -> AbiResult<()> {
        self.with_scope(|scope| {
            let object = self.local_object(scope, object)?;
            let key = self.wrap_key_local(scope);
            if object
                .has_private(scope, key)
                .ok_or(Status::GenericFailure)?
            {
                return Err(Status::InvalidArg);
            }
            let external = self.new_external(scope, data, finalizer);
            object
                .set_private(scope, key, external.into())
                .ok_or(Status::GenericFailure)?;
            Ok(())
        })
    }

    /// Retrieves data previously attached with [`wrap`](Self::wrap).
    pub fn unwrap(&self, object: Value) -> AbiResult<Rc<dyn Any>> {
        self.with_scope(|scope| {
            let object = self.local_object(scope, object)?;
            let key = self.wrap_key_local(scope);
            let slot = object
                .get_private(scope, key)
                .ok_or(Status::GenericFailure)?;
            let external =
                v8::Local::<v8::External>::try_from(slot).map_err(|_| Status::InvalidArg)?;
            let cell = external.value() as *const ExternalCell;
            Ok(unsafe { (*cell).data.clone() })
        })
    }

    /// Detaches and returns wrapped data. The finalizer still runs when the
    /// engine collects the detached external.
    pub fn remove_wrap(&self, object: Value) -> AbiResult<Rc<dyn Any>> {
        self.with_scope(|scope| {
            let object = self.local_object(scope, object)?;
            let key = self.wrap_key_local(scope);
            let slot = object
                .get_private(scope, key)
                .ok_or(Status::GenericFailure)?;
            let external =
                v8::Local::<v8::External>::try_from(slot).map_err(|_| Status::InvalidArg)?;
            let cell = external.value() as *const ExternalCell;
            let data = unsafe { (*cell).data.clone() };
            object
                .delete_private(scope, key)
                .ok_or(Status::GenericFailure)?;
            Ok(data)
        })
    }

    fn wrap_key_local<'s>(
        &self,
        scope: &mut v8::PinScope<'s, '_>,
    ) -> v8::Local<'s, v8::Private> {
        let inner = self.inner.borrow();
        v8::Local::new(scope, &inner.wrap_key)
    }

    /// Builds an external cell with its reclamation finalizer registered.
    pub(crate) fn new_external<'s>(
        &self,
        scope: &mut v8::PinScope<'s, '_>,
        data: Rc<dyn Any>,
        finalizer: Option<Finalizer>,
    ) -> v8::Local<'s, v8::External> {
        let cell = Box::into_raw(Box::new(ExternalCell { data }));
        let external = v8::External::new(scope, cell as *mut std::ffi::c_void);

        // SAFETY: the cell pointer is owned by this finalizer alone; the
        // engine runs it exactly once, after which no handle to the external
        // can still be live.
        let weak = v8::Weak::with_guaranteed_finalizer(
            scope,
            external,
            Box::new(move || {
                let cell = unsafe { Box::from_raw(cell) };
                if let Some(finalizer) = finalizer {
                    finalizer(cell.data);
                }
            }),
        );
        self.inner.borrow_mut().finalizers.push(weak);
        external
    }
}
