//! The `Table` contract (spec §4.E): a named registry of a table's indexes,
//! plus iteration over its live rows.

use std::sync::Arc;

use indexmap::IndexMap;
use rowindex_core::TransactionParticipant;
use rowindex_lock::Lockable;

use crate::row::Row;

/// An object-safe handle to a unique or foreign index, as held generically
/// in a [`Table`]'s registries.
///
/// A table's registries only need to lock and enlist their indexes, never
/// call their typed `add`/`remove`/`find` operations (callers that need
/// those already hold the concretely-typed `Arc<UniqueIndex<K, R>>` or
/// `Arc<ForeignIndex<K, P, C>>` returned by the index's own `build()`), so
/// this trait exists purely to erase the `K`/`R` type parameters that would
/// otherwise make a single `IndexMap` impossible.
pub trait IndexHandle: Lockable + TransactionParticipant {}

impl<T> IndexHandle for T where T: Lockable + TransactionParticipant + ?Sized {}

/// A generated table: a named registry of its unique and foreign indexes,
/// plus iteration over its currently live rows.
///
/// `Table` is itself [`Lockable`] (per spec §4.E, "Both implement the
/// Lockable capability so the transaction scope can lock them uniformly
/// with indexes") but, unlike an index or a row, a table owns no undo log
/// of its own — locking a table only gates a consistent view for iteration,
/// it does not need two-phase-commit enlistment.
pub trait Table: Lockable {
   /// The row type this table holds.
   type Row: Row;

   /// This table's name, matching the name its indexes were constructed with.
   fn name(&self) -> &str;

   /// This table's unique indexes, keyed by the name each was constructed
   /// with (e.g. `"pk"`).
   fn unique_indexes(&self) -> &IndexMap<&'static str, Arc<dyn IndexHandle>>;

   /// This table's foreign indexes, keyed by the name each was constructed
   /// with (e.g. `"fk_customer"`).
   fn foreign_indexes(&self) -> &IndexMap<&'static str, Arc<dyn IndexHandle>>;

   /// Every row currently live in this table, in no particular order.
   fn rows(&self) -> Vec<Self::Row>;
}
