//! Error types for rowindex-core.

use thiserror::Error;

/// Errors produced by [`crate::UniqueIndex`] and [`crate::ForeignIndex`]
/// operations.
#[derive(Error, Debug)]
pub enum Error {
   /// `UniqueIndex::add`, or `ForeignIndex::add`/`update`, collided with a
   /// key already present.
   #[error("duplicate key in index '{index}': {key}")]
   DuplicateKey { index: String, key: String },

   /// A `ForeignIndex` mutation referenced a key not present in its parent
   /// `UniqueIndex`.
   #[error("missing parent key in index '{index}': {key}")]
   MissingParentKey { index: String, key: String },

   /// A `UniqueIndex` row was deleted or had its key changed while a
   /// `ForeignIndex` still had children bucketed under its previous key.
   #[error("{operation} on index '{index}' would orphan children")]
   ConstraintViolation { operation: String, index: String },

   /// A find-by-key lookup that must succeed found nothing.
   #[error("record not found in '{table}': {key}")]
   RecordNotFound { table: String, key: String },

   /// A mutation was attempted before `has_index` configured a key
   /// function.
   #[error("index '{0}' has no key function configured")]
   KeyFunctionNotSet(String),

   /// `TransactionParticipant::in_doubt` was invoked; not supported.
   #[error("in-doubt transaction state is not supported")]
   InDoubtNotSupported,

   /// Error acquiring or releasing an index's lock.
   #[error(transparent)]
   Lock(#[from] rowindex_lock::Error),
}

/// A type alias for Results with our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
