//! Build-time engine selection.
//!
//! Exactly one engine adapter is compiled into a given binary; the ABI is a
//! fixed interface, not a runtime vtable. Additional backends slot in as
//! sibling modules behind their own features.

#[cfg(feature = "engine-v8")]
pub(crate) mod v8;

#[cfg(feature = "engine-v8")]
pub use self::v8::Env;
#[cfg(feature = "engine-v8")]
pub(crate) use self::v8::{bootstrap, platform};

#[cfg(not(any(feature = "engine-v8")))]
compile_error!("scripthost requires an engine backend; enable the `engine-v8` feature");
