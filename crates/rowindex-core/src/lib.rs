//! # rowindex-core
//!
//! The in-memory index types of the engine: [`UniqueIndex`] (a map from a
//! key to a single row, analogous to a primary key) and [`ForeignIndex`] (a
//! map from a key to a set of rows, constrained to keys present in a parent
//! `UniqueIndex`).
//!
//! Both index types:
//!
//! - are generic over an opaque key type (see [`IndexKey`]) and a row type,
//!   since neither is meant to bake in any particular application's types;
//! - accumulate an undo log of tagged [`undo`] records while a write lock is
//!   held, and implement [`TransactionParticipant`] so a transaction scope
//!   can commit (discard the log) or roll back (drain it in LIFO order);
//! - implement [`rowindex_lock::Lockable`] by delegating to an internal
//!   [`rowindex_lock::AsyncRwLock`], so a transaction scope can lock indexes,
//!   tables, and rows uniformly.
//!
//! A `UniqueIndex` additionally owns a [`rowindex_events::ChangeChannel`]
//! that every `ForeignIndex` built against it as a parent subscribes to,
//! enforcing that a parent row cannot be deleted or re-keyed while a
//! `ForeignIndex` still has children bucketed under its old key.
mod error;
mod foreign_index;
mod key;
mod participant;
mod undo;
mod unique_index;

pub use error::Error;
pub use foreign_index::ForeignIndex;
pub use key::IndexKey;
pub use participant::{PrepareVote, TransactionParticipant};
pub use undo::{ForeignUndo, UniqueUndo};
pub use unique_index::UniqueIndex;

/// A type alias for Results with our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
