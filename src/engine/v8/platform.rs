//! Global V8 platform initialization.
//!
//! V8 can only be initialized once per process. This module provides the
//! single entry point used by every host instance. Re-initialization after
//! teardown is not supported: once the platform is up it stays up for the
//! life of the process.

use std::sync::OnceLock;

use v8;

static PLATFORM: OnceLock<v8::SharedRef<v8::Platform>> = OnceLock::new();

/// Get the global V8 platform, initializing it on first use.
///
/// This is safe to call from multiple threads - the platform is only
/// initialized once and the same reference is returned to all callers.
pub(crate) fn initialize() -> &'static v8::SharedRef<v8::Platform> {
    PLATFORM.get_or_init(|| {
        // Set V8 flags before initialization.
        // Incremental marking buys nothing for small embedder heaps.
        v8::V8::set_flags_from_string("--noincremental-marking");

        let platform = v8::new_default_platform(0, false).make_shared();
        v8::V8::initialize_platform(platform.clone());
        v8::V8::initialize();
        log::debug!("V8 platform initialized");
        platform
    })
}
