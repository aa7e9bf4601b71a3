//! Environment tier of the host bootstrap.
//!
//! Creates the isolate and context on the execution thread's own stack,
//! mints the one environment handle, runs the work-queue loop, and tears
//! everything down in reverse order once the loop returns. V8 requires this
//! state to live on the stack of the thread that uses it; the platform tier
//! must already have run.

use std::pin::pin;

use v8;

use crate::work_queue::TaskRunner;

use super::env::Env;

pub(crate) fn run_environment_tier(runner: TaskRunner) {
    let mut isolate = v8::Isolate::new(v8::CreateParams::default());
    // Microtasks are pumped by the host once per dispatched task, not by
    // engine call depth.
    isolate.set_microtasks_policy(v8::MicrotasksPolicy::Explicit);

    {
        let context = {
            let scope = pin!(v8::HandleScope::new(&mut isolate));
            let mut scope = scope.init();
            let context = v8::Context::new(&scope, Default::default());
            let scope = &mut v8::ContextScope::new(&mut scope, context);
            v8::Global::new(scope.as_ref(), context)
        };

        // The only place an environment handle is minted.
        let env = Env::attach(&mut isolate, context);

        runner.run(&env);

        // Detach before the isolate goes away: dropping the environment
        // releases every persistent handle it still tracks.
        drop(env);
    }

    // The isolate is disposed here, after everything that referenced it.
}
