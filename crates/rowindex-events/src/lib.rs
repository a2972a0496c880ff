//! # rowindex-events
//!
//! A synchronous, unbuffered, fallible multicast channel for change
//! notifications, used to couple a unique index to the foreign indexes that
//! depend on it for referential integrity.
//!
//! ## Core Types
//!
//! - **[`ChangeChannel`]**: the multicast channel. A publisher calls
//!   [`ChangeChannel::notify`] inline with its mutation; subscribers run
//!   synchronously, in registration order, on the publisher's own thread.
//! - **[`ChangeEvent`]** / **[`ChangeAction`]**: what changed.
//!
//! ## Why not a buffered, async broadcast channel
//!
//! A referential-integrity subscriber must be able to reject a mutation
//! (for example, "this row still has children") before the mutating method
//! returns, so the caller's own undo record — already pushed — is what gets
//! rolled back. A buffered channel delivered on another task can't satisfy
//! that: by the time a subscriber objects, the publisher has already
//! returned success. [`ChangeChannel`] is deliberately synchronous and
//! unbuffered for this reason.
//!
//! ## Errors are the subscriber's, not ours
//!
//! [`ChangeChannel<K, E>`] is generic over the subscriber's own error type
//! rather than defining one of its own: the only subscriber in this
//! workspace, [`rowindex_core::ForeignIndex`], rejects with its own
//! `rowindex_core::Error::ConstraintViolation`, and a channel-local error
//! type would either go unused or require every subscriber to wrap its real
//! error in a second, redundant one.
mod channel;
mod event;

pub use channel::ChangeChannel;
pub use event::{ChangeAction, ChangeEvent};
