//! Error types for the root `rowindex` crate.
//!
//! Aggregates the three sub-crate error types with `#[from]` conversions,
//! the way the teacher's root `src/error.rs` aggregates
//! `sqlx_sqlite_conn_mgr::Error` and friends, and adds the two error kinds
//! that only make sense at the scope level.

use thiserror::Error;

/// A type alias for Results with our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the root crate: everything from the lock, event, and
/// index layers, plus `LockingTransactionScope`'s own bookkeeping errors.
#[derive(Error, Debug)]
pub enum Error {
   /// Error acquiring, releasing, or timing out on an [`rowindex_lock::AsyncRwLock`].
   #[error(transparent)]
   Lock(#[from] rowindex_lock::Error),

   /// Error from a [`rowindex_core::UniqueIndex`] or [`rowindex_core::ForeignIndex`]
   /// operation: duplicate key, missing parent key, constraint violation, etc.
   /// This is also how a rejected change event surfaces — `rowindex-events`
   /// has no error type of its own; a [`rowindex_events::ChangeChannel`]'s
   /// only subscriber in this workspace rejects with this same type.
   #[error(transparent)]
   Index(#[from] rowindex_core::Error),

   /// `dispose()` was called on a scope that had already finalized (either
   /// via an earlier explicit `dispose()` or by being dropped).
   #[error("transaction scope has already been finalized")]
   ScopeAlreadyFinalized,
}
