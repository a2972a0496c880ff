//! Error types for rowindex-lock

use thiserror::Error;

/// Errors that may occur when acquiring or releasing [`crate::AsyncRwLock`].
#[derive(Error, Debug)]
pub enum Error {
   /// A timed acquisition did not succeed before its deadline (or, for a
   /// `Try` acquisition, the lock was not immediately available).
   #[error("lock acquisition timed out")]
   LockTimeout,

   /// The lock was used incorrectly: an exit call with no matching enter,
   /// or a timeout value other than `-1` (infinite) that is negative.
   #[error("invalid lock state: {0}")]
   InvalidLockState(String),

   /// The wait was cancelled before the lock was acquired. Bookkeeping has
   /// already been rewound to the pre-wait state.
   #[error("lock acquisition was cancelled")]
   Cancelled,
}

/// A type alias for Results with our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
