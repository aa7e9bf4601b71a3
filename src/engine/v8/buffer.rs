//! Array buffers, typed arrays, and data views.

use v8;

use crate::abi::{AbiResult, Status, TypedArrayKind, Value};

use super::env::Env;

impl Env {
    /// A fresh, zero-initialized array buffer of `byte_length` bytes.
    pub fn create_arraybuffer(&self, byte_length: usize) -> AbiResult<Value> {
        self.with_scope(|scope| {
            let local = v8::ArrayBuffer::new(scope, byte_length);
            self.register_value(scope, local.into())
        })
    }

    /// An array buffer taking ownership of `data` without copying.
    pub fn create_arraybuffer_from_vec(&self, data: Vec<u8>) -> AbiResult<Value> {
        self.with_scope(|scope| {
            let local = if data.is_empty() {
                v8::ArrayBuffer::new(scope, 0)
            } else {
                let backing_store =
                    v8::ArrayBuffer::new_backing_store_from_vec(data).make_shared();
                v8::ArrayBuffer::with_backing_store(scope, &backing_store)
            };
            self.register_value(scope, local.into())
        })
    }

    pub fn is_arraybuffer(&self, value: Value) -> AbiResult<bool> {
        self.with_scope(|scope| Ok(self.local_value(scope, value)?.is_array_buffer()))
    }

    /// Byte length of an array buffer.
    pub fn get_arraybuffer_info(&self, value: Value) -> AbiResult<usize> {
        self.with_scope(|scope| {
            let local = self.local_value(scope, value)?;
            let buffer = v8::Local::<v8::ArrayBuffer>::try_from(local)
                .map_err(|_| Status::ArrayBufferExpected)?;
            Ok(buffer.byte_length())
        })
    }

    /// Copies the contents of an array buffer out to native memory.
    pub fn get_arraybuffer_data(&self, value: Value) -> AbiResult<Vec<u8>> {
        self.with_scope(|scope| {
            let local = self.local_value(scope, value)?;
            let buffer = v8::Local::<v8::ArrayBuffer>::try_from(local)
                .map_err(|_| Status::ArrayBufferExpected)?;
            let backing_store = buffer.get_backing_store();
            let len = backing_store.byte_length();
            let mut bytes = vec![0u8; len];
            if let Some(data) = backing_store.data() {
                // SAFETY: the backing store stays alive for the duration of
                // this scope and the ranges do not overlap.
                unsafe {
                    std::ptr::copy_nonoverlapping(
                        data.as_ptr() as *const u8,
                        bytes.as_mut_ptr(),
                        len,
                    );
                }
            }
            Ok(bytes)
        })
    }

    pub fn detach_arraybuffer(&self, value: Value) -> AbiResult<()> {
        self.with_scope(|scope| {
            let local = self.local_value(scope, value)?;
            let buffer = v8::Local::<v8::ArrayBuffer>::try_from(local)
                .map_err(|_| Status::ArrayBufferExpected)?;
            buffer.detach(None);
            Ok(())
        })
    }

    pub fn is_detached_arraybuffer(&self, value: Value) -> AbiResult<bool> {
        self.with_scope(|scope| {
            let local = self.local_value(scope, value)?;
            let buffer = v8::Local::<v8::ArrayBuffer>::try_from(local)
                .map_err(|_| Status::ArrayBufferExpected)?;
            Ok(buffer.was_detached())
        })
    }

    pub fn is_typedarray(&self, value: Value) -> AbiResult<bool> {
        self.with_scope(|scope| Ok(self.local_value(scope, value)?.is_typed_array()))
    }

    /// A typed array view of `length` elements over `buffer`, starting at
    /// `byte_offset`.
    pub fn create_typedarray(
        &self,
        kind: TypedArrayKind,
        length: usize,
        buffer: Value,
        byte_offset: usize,
    ) -> AbiResult<Value> {
        self.with_scope(|scope| {
            let local = self.local_value(scope, buffer)?;
            let buffer = v8::Local::<v8::ArrayBuffer>::try_from(local)
                .map_err(|_| Status::ArrayBufferExpected)?;
            let array: Option<v8::Local<v8::Value>> = match kind {
                TypedArrayKind::Int8 => {
                    v8::Int8Array::new(scope, buffer, byte_offset, length).map(Into::into)
                }
                TypedArrayKind::Uint8 => {
                    v8::Uint8Array::new(scope, buffer, byte_offset, length).map(Into::into)
                }
                TypedArrayKind::Uint8Clamped => {
                    v8::Uint8ClampedArray::new(scope, buffer, byte_offset, length).map(Into::into)
                }
                TypedArrayKind::Int16 => {
                    v8::Int16Array::new(scope, buffer, byte_offset, length).map(Into::into)
                }
                TypedArrayKind::Uint16 => {
                    v8::Uint16Array::new(scope, buffer, byte_offset, length).map(Into::into)
                }
                TypedArrayKind::Int32 => {
                    v8::Int32Array::new(scope, buffer, byte_offset, length).map(Into::into)
                }
                TypedArrayKind::Uint32 => {
                    v8::Uint32Array::new(scope, buffer, byte_offset, length).map(Into::into)
                }
                TypedArrayKind::Float32 => {
                    v8::Float32Array::new(scope, buffer, byte_offset, length).map(Into::into)
                }
                TypedArrayKind::Float64 => {
                    v8::Float64Array::new(scope, buffer, byte_offset, length).map(Into::into)
                }
                TypedArrayKind::BigInt64 => {
                    v8::BigInt64Array::new(scope, buffer, byte_offset, length).map(Into::into)
                }
                TypedArrayKind::BigUint64 => {
                    v8::BigUint64Array::new(scope, buffer, byte_offset, length).map(Into::into)
                }
            };
            let array = array.ok_or(Status::GenericFailure)?;
            self.register_value(scope, array)
        })
    }

    /// Element kind, element count, byte offset, and backing buffer of a
    /// typed array.
    pub fn get_typedarray_info(
        &self,
        value: Value,
    ) -> AbiResult<(TypedArrayKind, usize, usize, Value)> {
        self.with_scope(|scope| {
            let local = self.local_value(scope, value)?;
            let kind = typed_array_kind(local).ok_or(Status::InvalidArg)?;
            let array = v8::Local::<v8::TypedArray>::try_from(local)
                .map_err(|_| Status::InvalidArg)?;
            let length = array.length();
            let byte_offset = array.byte_offset();
            let buffer = array.buffer(scope).ok_or(Status::GenericFailure)?;
            let buffer = self.register_value(scope, buffer.into())?;
            Ok((kind, length, byte_offset, buffer))
        })
    }

    /// Copies the bytes covered by a typed array out to native memory.
    pub fn get_typedarray_data(&self, value: Value) -> AbiResult<Vec<u8>> {
        self.with_scope(|scope| {
            let local = self.local_value(scope, value)?;
            let array = v8::Local::<v8::TypedArray>::try_from(local)
                .map_err(|_| Status::InvalidArg)?;
            let mut bytes = vec![0u8; array.byte_length()];
            let copied = array.copy_contents(&mut bytes);
            bytes.truncate(copied);
            Ok(bytes)
        })
    }

    pub fn is_dataview(&self, value: Value) -> AbiResult<bool> {
        self.with_scope(|scope| Ok(self.local_value(scope, value)?.is_data_view()))
    }

    /// A DataView over `buffer`, built through the context's own
    /// constructor.
    pub fn create_dataview(
        &self,
        byte_length: usize,
        buffer: Value,
        byte_offset: usize,
    ) -> AbiResult<Value> {
        self.try_with_scope(|scope| {
            let local = self.local_value(scope, buffer)?;
            if !local.is_array_buffer() {
                return Err(Status::ArrayBufferExpected);
            }
            let global = scope.get_current_context().global(scope);
            let ctor_key = v8::String::new(scope, "DataView").ok_or(Status::GenericFailure)?;
            let ctor = global
                .get(scope, ctor_key.into())
                .ok_or(Status::GenericFailure)?;
            let ctor =
                v8::Local::<v8::Function>::try_from(ctor).map_err(|_| Status::GenericFailure)?;
            let offset = v8::Number::new(scope, byte_offset as f64);
            let length = v8::Number::new(scope, byte_length as f64);
            let view = ctor
                .new_instance(scope, &[local, offset.into(), length.into()])
                .ok_or(Status::GenericFailure)?;
            self.register_value(scope, view.into())
        })
    }
}

fn typed_array_kind(value: v8::Local<v8::Value>) -> Option<TypedArrayKind> {
    if value.is_int8_array() {
        Some(TypedArrayKind::Int8)
    } else if value.is_uint8_array() {
        Some(TypedArrayKind::Uint8)
    } else if value.is_uint8_clamped_array() {
        Some(TypedArrayKind::Uint8Clamped)
    } else if value.is_int16_array() {
        Some(TypedArrayKind::Int16)
    } else if value.is_uint16_array() {
        Some(TypedArrayKind::Uint16)
    } else if value.is_int32_array() {
        Some(TypedArrayKind::Int32)
    } else if value.is_uint32_array() {
        Some(TypedArrayKind::Uint32)
    } else if value.is_float32_array() {
        Some(TypedArrayKind::Float32)
    } else if value.is_float64_array() {
        Some(TypedArrayKind::Float64)
    } else if value.is_big_int64_array() {
        Some(TypedArrayKind::BigInt64)
    } else if value.is_big_uint64_array() {
        Some(TypedArrayKind::BigUint64)
    } else {
        None
    }
}
