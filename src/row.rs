//! The `Row` contract (spec §3, §4.E): an external collaborator the engine
//! locks and enlists uniformly, but never constructs or destroys itself.

use rowindex_core::TransactionParticipant;
use rowindex_lock::Lockable;

/// Which snapshot of a row's fields to return from [`Row::version`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowVersion {
   /// The row as it was first inserted, before any uncommitted change.
   Original,
   /// The row as it was immediately before the current uncommitted change.
   Previous,
   /// The row's tentative, not-yet-committed state.
   Current,
}

/// A polymorphic record held by the engine's indexes by reference only.
///
/// Generated table code constructs and destroys rows; `rowindex` never
/// does. A row must be lockable (so a transaction scope can acquire it
/// alongside the indexes it is enlisted in) and a transaction participant
/// (so field-level changes roll back along with the index mutations that
/// referenced them) to be usable with [`crate::LockingTransactionScope`].
pub trait Row: TransactionParticipant + Lockable {
   /// Returns a snapshot of this row at the given version. `UniqueIndex::update`
   /// and `ForeignIndex::update` call this with [`RowVersion::Previous`] to
   /// recover the key a row was last indexed under.
   fn version(&self, which: RowVersion) -> Self;
}
