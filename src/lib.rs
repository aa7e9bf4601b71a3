//! scripthost — an embeddable JavaScript execution host.
//!
//! One dedicated thread per [`ScriptHost`] owns the engine; work reaches it
//! through [`ScriptHost::dispatch`], and native glue manipulates engine
//! values through the engine-agnostic ABI exposed on [`Env`]. The engine
//! backend is selected at build time (`engine-v8` by default).
//!
//! ```no_run
//! use scripthost::ScriptHost;
//!
//! let host = ScriptHost::new();
//! host.dispatch(|env| {
//!     let scope = env.open_handle_scope();
//!     let value = env.run_script("6 * 7", None).unwrap();
//!     assert_eq!(env.get_value_int32(value), Ok(42));
//!     env.close_handle_scope(scope).unwrap();
//! });
//! ```

mod abi;
mod engine;
mod error;
mod host;
mod work_queue;

pub use abi::{
    AbiResult, CallbackInfo, Deferred, EscapableHandleScope, Finalizer, HandleScope,
    NativeCallback, Reference, Status, TypedArrayKind, Value, ValueType,
};
pub use engine::Env;
pub use error::{HostError, ScriptError};
pub use host::{
    Options, ScriptHost, UnhandledExceptionHandler, default_unhandled_exception_handler,
};
