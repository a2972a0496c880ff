//! Bridges the blocking (`enter_read`/`enter_write`) and suspending
//! (`enter_read_async`/`enter_write_async`) acquisition styles onto one
//! shared async implementation.
//!
//! [`crate::AsyncRwLock`] is implemented once, as async code, against
//! `tokio::sync` primitives. The blocking entry points drive that same
//! implementation to completion with [`block_on_current`], so a single
//! lock object can correctly arbitrate between blocking callers and
//! suspending callers without duplicating any bookkeeping.

use std::future::Future;

/// Run `fut` to completion, blocking the current OS thread.
///
/// If a Tokio runtime is already running on this thread, the blocking wait
/// is done via `block_in_place` so the runtime's other workers keep making
/// progress. Otherwise a throwaway current-thread runtime is spun up for the
/// duration of the call, mirroring the pattern used by GUI-embedding hosts
/// that need to call async code from a synchronous entry point.
pub fn block_on_current<F: Future>(fut: F) -> F::Output {
   if tokio::runtime::Handle::try_current().is_ok() {
      tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(fut))
   } else {
      tokio::runtime::Builder::new_current_thread()
         .enable_time()
         .build()
         .expect("failed to start a fallback runtime for blocking lock acquisition")
         .block_on(fut)
   }
}
