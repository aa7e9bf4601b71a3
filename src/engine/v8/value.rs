//! Primitive value construction, inspection, and coercion.

use v8;

use crate::abi::{AbiResult, Status, Value, ValueType};

use super::env::Env;

impl Env {
    pub fn get_undefined(&self) -> AbiResult<Value> {
        self.with_scope(|scope| {
            let local = v8::undefined(scope);
            self.register_value(scope, local.into())
        })
    }

    pub fn get_null(&self) -> AbiResult<Value> {
        self.with_scope(|scope| {
            let local = v8::null(scope);
            self.register_value(scope, local.into())
        })
    }

    pub fn get_boolean(&self, value: bool) -> AbiResult<Value> {
        self.with_scope(|scope| {
            let local = v8::Boolean::new(scope, value);
            self.register_value(scope, local.into())
        })
    }

    /// The global object of the active context.
    pub fn get_global(&self) -> AbiResult<Value> {
        self.with_scope(|scope| {
            let global = scope.get_current_context().global(scope);
            self.register_value(scope, global.into())
        })
    }

    pub fn create_double(&self, value: f64) -> AbiResult<Value> {
        self.with_scope(|scope| {
            let local = v8::Number::new(scope, value);
            self.register_value(scope, local.into())
        })
    }

    pub fn create_int32(&self, value: i32) -> AbiResult<Value> {
        self.with_scope(|scope| {
            let local = v8::Integer::new(scope, value);
            self.register_value(scope, local.into())
        })
    }

    pub fn create_uint32(&self, value: u32) -> AbiResult<Value> {
        self.with_scope(|scope| {
            let local = v8::Integer::new_from_unsigned(scope, value);
            self.register_value(scope, local.into())
        })
    }

    pub fn create_int64(&self, value: i64) -> AbiResult<Value> {
        // Stored as a double, like every engine number.
        self.create_double(value as f64)
    }

    pub fn create_string(&self, value: &str) -> AbiResult<Value> {
        self.with_scope(|scope| {
            let local = v8::String::new(scope, value).ok_or(Status::GenericFailure)?;
            self.register_value(scope, local.into())
        })
    }

    /// Creates a unique symbol. `description` must be a string value when
    /// present.
    pub fn create_symbol(&self, description: Option<Value>) -> AbiResult<Value> {
        self.with_scope(|scope| {
            let desc = match description {
                Some(value) => {
                    let local = self.local_value(scope, value)?;
                    Some(
                        v8::Local::<v8::String>::try_from(local)
                            .map_err(|_| Status::StringExpected)?,
                    )
                }
                None => None,
            };
            let local = v8::Symbol::new(scope, desc);
            self.register_value(scope, local.into())
        })
    }

    pub fn create_bigint_int64(&self, value: i64) -> AbiResult<Value> {
        self.with_scope(|scope| {
            let local = v8::BigInt::new_from_i64(scope, value);
            self.register_value(scope, local.into())
        })
    }

    pub fn create_bigint_uint64(&self, value: u64) -> AbiResult<Value> {
        self.with_scope(|scope| {
            let local = v8::BigInt::new_from_u64(scope, value);
            self.register_value(scope, local.into())
        })
    }

    pub fn create_date(&self, time: f64) -> AbiResult<Value> {
        self.with_scope(|scope| {
            let local = v8::Date::new(scope, time).ok_or(Status::GenericFailure)?;
            self.register_value(scope, local.into())
        })
    }

    pub fn type_of(&self, value: Value) -> AbiResult<ValueType> {
        self.with_scope(|scope| {
            let local = self.local_value(scope, value)?;
            Ok(if local.is_undefined() {
                ValueType::Undefined
            } else if local.is_null() {
                ValueType::Null
            } else if local.is_boolean() {
                ValueType::Boolean
            } else if local.is_number() {
                ValueType::Number
            } else if local.is_string() {
                ValueType::String
            } else if local.is_symbol() {
                ValueType::Symbol
            } else if local.is_big_int() {
                ValueType::Bigint
            } else if local.is_external() {
                ValueType::External
            } else if local.is_function() {
                ValueType::Function
            } else {
                ValueType::Object
            })
        })
    }

    pub fn get_value_bool(&self, value: Value) -> AbiResult<bool> {
        self.with_scope(|scope| {
            let local = self.local_value(scope, value)?;
            if !local.is_boolean() {
                return Err(Status::BooleanExpected);
            }
            Ok(local.boolean_value(scope))
        })
    }

    pub fn get_value_double(&self, value: Value) -> AbiResult<f64> {
        self.with_scope(|scope| {
            let local = self.local_value(scope, value)?;
            if !local.is_number() {
                return Err(Status::NumberExpected);
            }
            local.number_value(scope).ok_or(Status::NumberExpected)
        })
    }

    pub fn get_value_int32(&self, value: Value) -> AbiResult<i32> {
        self.with_scope(|scope| {
            let local = self.local_value(scope, value)?;
            if !local.is_number() {
                return Err(Status::NumberExpected);
            }
            local.int32_value(scope).ok_or(Status::NumberExpected)
        })
    }

    pub fn get_value_uint32(&self, value: Value) -> AbiResult<u32> {
        self.with_scope(|scope| {
            let local = self.local_value(scope, value)?;
            if !local.is_number() {
                return Err(Status::NumberExpected);
            }
            local.uint32_value(scope).ok_or(Status::NumberExpected)
        })
    }

    pub fn get_value_int64(&self, value: Value) -> AbiResult<i64> {
        self.with_scope(|scope| {
            let local = self.local_value(scope, value)?;
            if !local.is_number() {
                return Err(Status::NumberExpected);
            }
            let n = local.number_value(scope).ok_or(Status::NumberExpected)?;
            // Non-finite doubles clamp to zero rather than wrapping.
            Ok(if n.is_finite() { n as i64 } else { 0 })
        })
    }

    pub fn get_value_string(&self, value: Value) -> AbiResult<String> {
        self.with_scope(|scope| {
            let local = self.local_value(scope, value)?;
            if !local.is_string() {
                return Err(Status::StringExpected);
            }
            Ok(local.to_rust_string_lossy(scope))
        })
    }

    /// Returns the bigint as `i64` plus a losslessness flag.
    pub fn get_value_bigint_int64(&self, value: Value) -> AbiResult<(i64, bool)> {
        self.with_scope(|scope| {
            let local = self.local_value(scope, value)?;
            if !local.is_big_int() {
                return Err(Status::BigintExpected);
            }
            let bigint = local.to_big_int(scope).ok_or(Status::BigintExpected)?;
            Ok(bigint.i64_value())
        })
    }

    pub fn get_value_bigint_uint64(&self, value: Value) -> AbiResult<(u64, bool)> {
        self.with_scope(|scope| {
            let local = self.local_value(scope, value)?;
            if !local.is_big_int() {
                return Err(Status::BigintExpected);
            }
            let bigint = local.to_big_int(scope).ok_or(Status::BigintExpected)?;
            Ok(bigint.u64_value())
        })
    }

    pub fn is_date(&self, value: Value) -> AbiResult<bool> {
        self.with_scope(|scope| Ok(self.local_value(scope, value)?.is_date()))
    }

    /// Epoch milliseconds of a Date value.
    pub fn get_date_value(&self, value: Value) -> AbiResult<f64> {
        self.with_scope(|scope| {
            let local = self.local_value(scope, value)?;
            if !local.is_date() {
                return Err(Status::DateExpected);
            }
            local.number_value(scope).ok_or(Status::DateExpected)
        })
    }

    pub fn strict_equals(&self, lhs: Value, rhs: Value) -> AbiResult<bool> {
        self.with_scope(|scope| {
            let lhs = self.local_value(scope, lhs)?;
            let rhs = self.local_value(scope, rhs)?;
            Ok(lhs.strict_equals(rhs))
        })
    }

    pub fn coerce_to_bool(&self, value: Value) -> AbiResult<Value> {
        self.with_scope(|scope| {
            let local = self.local_value(scope, value)?;
            let coerced = local.to_boolean(scope);
            self.register_value(scope, coerced.into())
        })
    }

    /// ToNumber coercion. May run script (`valueOf`), so a throw surfaces as
    /// `PendingException`.
    pub fn coerce_to_number(&self, value: Value) -> AbiResult<Value> {
        self.try_with_scope(|scope| {
            let local = self.local_value(scope, value)?;
            let coerced = local.to_number(scope).ok_or(Status::GenericFailure)?;
            self.register_value(scope, coerced.into())
        })
    }

    pub fn coerce_to_string(&self, value: Value) -> AbiResult<Value> {
        self.try_with_scope(|scope| {
            let local = self.local_value(scope, value)?;
            let coerced = local.to_string(scope).ok_or(Status::GenericFailure)?;
            self.register_value(scope, coerced.into())
        })
    }

    pub fn coerce_to_object(&self, value: Value) -> AbiResult<Value> {
        self.try_with_scope(|scope| {
            let local = self.local_value(scope, value)?;
            let coerced = local.to_object(scope).ok_or(Status::GenericFailure)?;
            self.register_value(scope, coerced.into())
        })
    }
}
