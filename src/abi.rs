//! Engine-neutral vocabulary of the native-value ABI.
//!
//! Everything here is plain data: status codes, value-type tags, and the
//! opaque handles native glue passes back into the environment. The
//! operations themselves live on [`crate::Env`], provided by whichever
//! engine backend is compiled in.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// Status codes returned by fallible ABI operations.
///
/// ABI calls never unwind across the boundary; anything that can fail
/// reports one of these instead. `PendingException` additionally leaves the
/// thrown value in the environment's pending-exception slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    InvalidArg,
    ObjectExpected,
    StringExpected,
    FunctionExpected,
    NumberExpected,
    BooleanExpected,
    ArrayExpected,
    GenericFailure,
    PendingException,
    EscapeCalledTwice,
    HandleScopeMismatch,
    BigintExpected,
    DateExpected,
    ArrayBufferExpected,
}

impl Status {
    /// Human-readable description, mirroring the status-message table of the
    /// underlying engine adapters.
    pub fn message(self) -> &'static str {
        match self {
            Status::InvalidArg => "Invalid argument",
            Status::ObjectExpected => "An object was expected",
            Status::StringExpected => "A string was expected",
            Status::FunctionExpected => "A function was expected",
            Status::NumberExpected => "A number was expected",
            Status::BooleanExpected => "A boolean was expected",
            Status::ArrayExpected => "An array was expected",
            Status::GenericFailure => "Unknown failure",
            Status::PendingException => "An exception is pending",
            Status::EscapeCalledTwice => "escape_handle already called on scope",
            Status::HandleScopeMismatch => "Invalid handle scope usage",
            Status::BigintExpected => "A bigint was expected",
            Status::DateExpected => "A date was expected",
            Status::ArrayBufferExpected => "An arraybuffer was expected",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Result alias used across the ABI surface.
pub type AbiResult<T> = Result<T, Status>;

/// Engine-neutral classification of a value, as reported by `Env::type_of`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Undefined,
    Null,
    Boolean,
    Number,
    String,
    Symbol,
    Object,
    Function,
    External,
    Bigint,
}

/// Element type of a typed array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypedArrayKind {
    Int8,
    Uint8,
    Uint8Clamped,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
    BigInt64,
    BigUint64,
}

/// Opaque handle to an engine value.
///
/// Valid only while the handle scope it was recorded in remains open; using
/// a stale handle yields [`Status::InvalidArg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Value(pub(crate) u64);

/// Explicitly-counted handle that outlives handle scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference(pub(crate) u64);

/// Control handle for a promise created through `Env::create_promise`.
///
/// Settling consumes the handle, so a deferred can be resolved or rejected
/// exactly once.
#[derive(Debug)]
pub struct Deferred(pub(crate) u64);

/// Token for an open handle scope. A failed close (LIFO violation) leaves
/// the scope open and the token usable.
#[derive(Debug, Clone, Copy)]
pub struct HandleScope {
    pub(crate) depth: usize,
}

/// Token for an open escapable handle scope.
#[derive(Debug, Clone, Copy)]
pub struct EscapableHandleScope {
    pub(crate) depth: usize,
}

/// Invocation context handed to a native callback by the trampoline.
pub struct CallbackInfo {
    pub(crate) this: Value,
    pub(crate) args: Vec<Value>,
    pub(crate) new_target: Option<Value>,
    pub(crate) construct_call: bool,
    pub(crate) data: Option<Rc<dyn Any>>,
}

impl CallbackInfo {
    /// The `this` value of the invocation. For a construct call this is the
    /// freshly allocated instance.
    pub fn this(&self) -> Value {
        self.this
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn arg(&self, index: usize) -> Option<Value> {
        self.args.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Whether the callable was invoked as a constructor.
    pub fn is_construct_call(&self) -> bool {
        self.construct_call
    }

    /// The new-target of a construct call on a constructor-flagged callable.
    pub fn new_target(&self) -> Option<Value> {
        self.new_target
    }

    /// Opaque user data bound at trampoline creation.
    pub fn data(&self) -> Option<&Rc<dyn Any>> {
        self.data.as_ref()
    }
}

/// Native function bound to an engine callable by the trampoline.
///
/// Returning `Ok(None)` yields `undefined` for a plain call and the freshly
/// allocated `this` for a construct call. An `Err` status, a pending
/// exception recorded through `Env::throw*`, or a panic is translated into
/// an engine exception by the trampoline; none of them unwind into engine
/// frames.
pub type NativeCallback = Box<dyn Fn(&crate::Env, &CallbackInfo) -> AbiResult<Option<Value>>>;

/// Finalizer for external data. Runs exactly once, at the engine's
/// discretion (a collection pass, or environment teardown at the latest),
/// and must not assume any handle scope is open.
pub type Finalizer = Box<dyn FnOnce(Rc<dyn Any>)>;
