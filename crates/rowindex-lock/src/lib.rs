//! # rowindex-lock
//!
//! A writer-priority async reader/writer lock, usable from both blocking and
//! suspending call sites without maintaining two separate implementations.
//!
//! ## Core Types
//!
//! - **[`AsyncRwLock`]**: the lock itself. Always held behind an `Arc`.
//! - **[`ReadGuard`] / [`WriteGuard`]**: RAII guards releasing the lock on drop.
//! - **[`LockTimeout`]**: how long a caller is willing to wait.
//! - **[`LockConfig`]**: the default timeout applied when a caller omits one.
//! - **[`Lockable`]**: a dyn-safe trait letting callers coordinate a lock
//!   without naming its concrete type, used by scopes that acquire several
//!   locks of different kinds in one transaction.
//! - **[`Error`]**: error type for lock operations.
//!
//! ## Architecture
//!
//! - **Writer priority**: a writer that has announced intent is observed by
//!   every reader that checks in after it, so it can never be starved by a
//!   steady stream of new readers.
//! - **Single implementation**: the lock is implemented once, as async code
//!   against `tokio::sync` primitives. Blocking callers drive the same
//!   implementation to completion via [`block_on_current`].
//! - **RAII release**: both guard types release the lock in their `Drop`
//!   impl, so a caller cannot forget to exit or exit twice.
mod config;
mod error;
mod lockable;
mod runtime;
mod rwlock;
mod timeout;

pub use config::LockConfig;
pub use error::Error;
pub use lockable::{LockGuard, LockMode, Lockable};
pub use runtime::block_on_current;
pub use rwlock::{AsyncRwLock, ReadGuard, WriteGuard};
pub use timeout::LockTimeout;

/// A type alias for Results with our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
