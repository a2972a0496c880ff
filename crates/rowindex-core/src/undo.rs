//! Undo records pushed by index mutations and drained in LIFO order on
//! rollback.
//!
//! Recorded as tagged variants rather than closures: a stack of closures
//! would need every captured key and row to be `Send + 'static` regardless
//! of whether a given index's mutation actually needs that, and variants
//! keep the undo stack inspectable for diagnostics.

/// Reverse-mutation record for a [`crate::UniqueIndex`].
#[derive(Debug)]
pub enum UniqueUndo<K, R> {
   /// Undoes an insertion: remove `key` from the map.
   Remove(K),
   /// Undoes a removal: reinsert `row` under `key`.
   Restore(K, R),
}

/// Reverse-mutation record for a [`crate::ForeignIndex`].
#[derive(Debug)]
pub enum ForeignUndo<K, R> {
   /// Undoes an insertion into a bucket: remove `row` from the bucket under
   /// `key`, dropping the bucket if it becomes empty.
   RemoveFromBucket(K, R),
   /// Undoes a removal from a bucket: reinsert `row` into the bucket under
   /// `key`, creating it if absent.
   AddToBucket(K, R),
}
