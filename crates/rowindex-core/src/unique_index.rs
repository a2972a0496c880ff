//! A map from a key to a single row, analogous to a primary key index.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rowindex_events::{ChangeChannel, ChangeEvent};
use rowindex_lock::{AsyncRwLock, LockGuard, LockMode, Lockable, LockTimeout};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::key::IndexKey;
use crate::participant::{PrepareVote, TransactionParticipant};
use crate::undo::UniqueUndo;

type KeyFn<K, R> = Box<dyn Fn(&R) -> K + Send + Sync>;
type FilterFn<R> = Box<dyn Fn(&R) -> bool + Send + Sync>;

struct State<K, R> {
   map: HashMap<K, R>,
   undo: Vec<UniqueUndo<K, R>>,
}

/// A unique index over rows of type `R`, keyed by `K`.
///
/// Guarded by its own reader/writer lock ([`AsyncRwLock`]), which is the
/// *logical* lock a [`LockingTransactionScope`](https://docs.rs) acquires
/// before a mutation; the internal map additionally needs its own
/// *physical* interior-mutability guard ([`parking_lot::Mutex`]) because,
/// unlike an implicit object monitor, Rust's borrow checker requires one
/// regardless of what logical lock a caller is already holding.
pub struct UniqueIndex<K: IndexKey, R: Clone + Send + Sync + 'static> {
   name: String,
   lock: Arc<AsyncRwLock>,
   state: Mutex<State<K, R>>,
   key_fn: Option<KeyFn<K, R>>,
   filter_fn: FilterFn<R>,
   changed: Arc<ChangeChannel<K, Error>>,
}

impl<K: IndexKey, R: Clone + Send + Sync + 'static> UniqueIndex<K, R> {
   /// Creates an unconfigured index. Chain [`Self::has_index`] (required
   /// before first use) and optionally [`Self::has_filter`].
   pub fn new(name: impl Into<String>) -> Self {
      let name = name.into();
      Self {
         lock: AsyncRwLock::new(format!("unique:{name}")),
         state: Mutex::new(State {
            map: HashMap::new(),
            undo: Vec::new(),
         }),
         key_fn: None,
         filter_fn: Box::new(|_| true),
         changed: ChangeChannel::new(),
         name,
      }
   }

   /// Registers the function used to derive a row's key. Required before
   /// any mutating operation; absence surfaces as
   /// [`Error::KeyFunctionNotSet`] on first use rather than at construction,
   /// since a table may wire up several indexes before any of them see
   /// data.
   pub fn has_index<F>(mut self, key_fn: F) -> Self
   where
      F: Fn(&R) -> K + Send + Sync + 'static,
   {
      self.key_fn = Some(Box::new(key_fn));
      self
   }

   /// Registers a predicate gating which rows this index admits. Defaults
   /// to admitting every row.
   pub fn has_filter<F>(mut self, filter_fn: F) -> Self
   where
      F: Fn(&R) -> bool + Send + Sync + 'static,
   {
      self.filter_fn = Box::new(filter_fn);
      self
   }

   /// Finalizes configuration, returning a shared handle suitable for
   /// attaching to a table and subscribing foreign indexes to.
   pub fn build(self) -> Arc<Self> {
      Arc::new(self)
   }

   pub fn name(&self) -> &str {
      &self.name
   }

   /// The change channel this index publishes to after every mutation that
   /// actually changes its map. [`crate::ForeignIndex::new`] subscribes to
   /// this to enforce referential integrity.
   pub fn changes(&self) -> Arc<ChangeChannel<K, Error>> {
      Arc::clone(&self.changed)
   }

   fn key_of(&self, row: &R) -> Result<K> {
      self
         .key_fn
         .as_ref()
         .map(|key_fn| key_fn(row))
         .ok_or_else(|| Error::KeyFunctionNotSet(self.name.clone()))
   }

   pub fn contains(&self, key: &K) -> bool {
      self.state.lock().map.contains_key(key)
   }

   pub fn find(&self, key: &K) -> Option<R> {
      self.state.lock().map.get(key).cloned()
   }

   /// Every row currently indexed, in no particular order. Backs generated
   /// `Table::rows()` implementations.
   pub fn values(&self) -> Vec<R> {
      self.state.lock().map.values().cloned().collect()
   }

   pub fn get_key(&self, row: &R) -> Result<K> {
      self.key_of(row)
   }

   /// Inserts `row`. A no-op if the index's filter rejects `row`.
   pub fn add(&self, row: R) -> Result<()> {
      if !(self.filter_fn)(&row) {
         return Ok(());
      }
      let key = self.key_of(&row)?;
      {
         let mut state = self.state.lock();
         if state.map.contains_key(&key) {
            warn!(index = %self.name, key = ?key, "add rejected: duplicate key");
            return Err(Error::DuplicateKey {
               index: self.name.clone(),
               key: format!("{key:?}"),
            });
         }
         state.map.insert(key.clone(), row);
         state.undo.push(UniqueUndo::Remove(key.clone()));
      }
      trace!(index = %self.name, key = ?key, "row added");
      self.changed.notify(&ChangeEvent::add(key))
   }

   /// Removes `row`. A silent no-op if the index's filter rejects `row` or
   /// the row's key is not present.
   pub fn remove(&self, row: &R) -> Result<()> {
      if !(self.filter_fn)(row) {
         return Ok(());
      }
      let key = self.key_of(row)?;
      let removed_row = {
         let mut state = self.state.lock();
         let removed_row = state.map.remove(&key);
         if let Some(removed_row) = &removed_row {
            state
               .undo
               .push(UniqueUndo::Restore(key.clone(), removed_row.clone()));
         }
         removed_row
      };
      if removed_row.is_none() {
         return Ok(());
      }
      trace!(index = %self.name, key = ?key, "row removed");
      self.changed.notify(&ChangeEvent::delete(key))
   }

   /// Replaces `previous` with `current`. Only has an effect when the row's
   /// key actually changed between the two versions; a non-key-changing
   /// update is the table's concern, not the index's, since the index only
   /// stores a key-to-row mapping.
   ///
   /// Each side is filter-gated independently: a `previous` rejected by the
   /// filter was never indexed, so there is nothing to remove; a `current`
   /// rejected by the filter is not inserted. This lets `update` double as
   /// an add (previous side filtered out) or a remove (current side
   /// filtered out) when a row crosses the filter boundary.
   pub fn update(&self, previous: &R, current: R) -> Result<()> {
      let previous_key = (self.filter_fn)(previous)
         .then(|| self.key_of(previous))
         .transpose()?;
      let current_key = (self.filter_fn)(&current)
         .then(|| self.key_of(&current))
         .transpose()?;
      if previous_key == current_key {
         return Ok(());
      }

      {
         let mut state = self.state.lock();
         if let Some(previous_key) = &previous_key {
            if let Some(prev_row) = state.map.remove(previous_key) {
               state
                  .undo
                  .push(UniqueUndo::Restore(previous_key.clone(), prev_row));
            }
         }
         if let Some(current_key) = &current_key {
            if state.map.contains_key(current_key) {
               warn!(index = %self.name, key = ?current_key, "update rejected: duplicate key");
               return Err(Error::DuplicateKey {
                  index: self.name.clone(),
                  key: format!("{current_key:?}"),
               });
            }
            state.map.insert(current_key.clone(), current);
            state.undo.push(UniqueUndo::Remove(current_key.clone()));
         }
      }
      trace!(index = %self.name, previous = ?previous_key, current = ?current_key, "row updated");
      let event = match (previous_key, current_key) {
         (Some(previous_key), Some(current_key)) => ChangeEvent::update(previous_key, current_key),
         (Some(previous_key), None) => ChangeEvent::delete(previous_key),
         (None, Some(current_key)) => ChangeEvent::add(current_key),
         (None, None) => unreachable!("previous_key == current_key returned earlier"),
      };
      self.changed.notify(&event)
   }
}

#[async_trait]
impl<K: IndexKey, R: Clone + Send + Sync + 'static> TransactionParticipant for UniqueIndex<K, R> {
   async fn prepare(&self) -> Result<PrepareVote> {
      if self.state.lock().undo.is_empty() {
         Ok(PrepareVote::Done)
      } else {
         Ok(PrepareVote::Prepared)
      }
   }

   async fn commit(&self) -> Result<()> {
      let mut state = self.state.lock();
      let discarded = state.undo.len();
      state.undo.clear();
      debug!(index = %self.name, discarded, "committed");
      Ok(())
   }

   async fn rollback(&self) -> Result<()> {
      let mut state = self.state.lock();
      debug!(index = %self.name, pending = state.undo.len(), "rolling back");
      while let Some(undo) = state.undo.pop() {
         match undo {
            UniqueUndo::Remove(key) => {
               state.map.remove(&key);
            }
            UniqueUndo::Restore(key, row) => {
               state.map.insert(key, row);
            }
         }
      }
      Ok(())
   }
}

#[async_trait]
impl<K: IndexKey, R: Clone + Send + Sync + 'static> Lockable for UniqueIndex<K, R> {
   fn lock_name(&self) -> &str {
      self.lock.name()
   }

   async fn acquire(
      &self,
      mode: LockMode,
      timeout: LockTimeout,
   ) -> rowindex_lock::Result<Box<dyn LockGuard>> {
      self.lock.acquire(mode, timeout).await
   }
}

impl<K: IndexKey, R: Clone + Send + Sync + 'static> std::fmt::Debug for UniqueIndex<K, R> {
   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      f.debug_struct("UniqueIndex")
         .field("name", &self.name)
         .field("len", &self.state.lock().map.len())
         .finish()
   }
}
