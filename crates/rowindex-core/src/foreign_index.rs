//! A map from a key to a set of child rows, with the key required to exist
//! in a designated parent unique index.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use rowindex_events::ChangeAction;
use rowindex_lock::{AsyncRwLock, LockGuard, LockMode, Lockable, LockTimeout};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::key::IndexKey;
use crate::participant::{PrepareVote, TransactionParticipant};
use crate::undo::ForeignUndo;
use crate::unique_index::UniqueIndex;

type KeyFn<K, C> = Box<dyn Fn(&C) -> K + Send + Sync>;
type FilterFn<C> = Box<dyn Fn(&C) -> bool + Send + Sync>;

struct State<K, C> {
   buckets: HashMap<K, Vec<C>>,
   undo: Vec<ForeignUndo<K, C>>,
}

/// A foreign index over child rows of type `C`, keyed by `K`, referencing a
/// parent [`UniqueIndex<K, P>`] for referential integrity.
///
/// `P` and `C` are kept as distinct type parameters rather than folded into
/// one: a parent (say, an order) and its children (that order's line items)
/// are ordinarily different row types.
pub struct ForeignIndex<K, P, C>
where
   K: IndexKey,
   P: Clone + Send + Sync + 'static,
   C: Clone + PartialEq + Send + Sync + 'static,
{
   name: String,
   parent: Arc<UniqueIndex<K, P>>,
   lock: Arc<AsyncRwLock>,
   state: Mutex<State<K, C>>,
   key_fn: Option<KeyFn<K, C>>,
   filter_fn: FilterFn<C>,
}

impl<K, P, C> ForeignIndex<K, P, C>
where
   K: IndexKey,
   P: Clone + Send + Sync + 'static,
   C: Clone + PartialEq + Send + Sync + 'static,
{
   /// Creates an unconfigured index over `parent`. Chain [`Self::has_index`]
   /// and optionally [`Self::has_filter`], then [`Self::build`].
   pub fn new(name: impl Into<String>, parent: Arc<UniqueIndex<K, P>>) -> Self {
      let name = name.into();
      Self {
         lock: AsyncRwLock::new(format!("foreign:{name}")),
         state: Mutex::new(State {
            buckets: HashMap::new(),
            undo: Vec::new(),
         }),
         key_fn: None,
         filter_fn: Box::new(|_| true),
         parent,
         name,
      }
   }

   /// Registers the function used to derive a child row's foreign key.
   pub fn has_index<F>(mut self, key_fn: F) -> Self
   where
      F: Fn(&C) -> K + Send + Sync + 'static,
   {
      self.key_fn = Some(Box::new(key_fn));
      self
   }

   /// Registers a predicate gating which child rows this index admits.
   /// Defaults to admitting every row.
   pub fn has_filter<F>(mut self, filter_fn: F) -> Self
   where
      F: Fn(&C) -> bool + Send + Sync + 'static,
   {
      self.filter_fn = Box::new(filter_fn);
      self
   }

   /// Finalizes configuration and subscribes to the parent's change
   /// channel.
   ///
   /// The subscription closure captures only a [`Weak`] reference to this
   /// index, so the parent's channel does not root this index past its own
   /// lifetime; if the index has already been dropped when an event
   /// arrives, the upgrade fails and the event is silently ignored (the
   /// parent cannot still have live children pointing at a dropped index).
   pub fn build(self) -> Arc<Self> {
      let foreign = Arc::new(self);
      let weak: Weak<Self> = Arc::downgrade(&foreign);
      foreign.parent.changes().subscribe(move |event| match weak.upgrade() {
         Some(foreign) => foreign.on_parent_change(event),
         None => Ok(()),
      });
      foreign
   }

   pub fn name(&self) -> &str {
      &self.name
   }

   fn key_of(&self, row: &C) -> Result<K> {
      self
         .key_fn
         .as_ref()
         .map(|key_fn| key_fn(row))
         .ok_or_else(|| Error::KeyFunctionNotSet(self.name.clone()))
   }

   /// Raised when the parent's change channel reports a `Delete` or
   /// `Update` whose previous key still has children bucketed here. Aborts
   /// the parent's mutation: the caller's `UniqueIndex::remove`/`update`
   /// returns this error after already pushing its own undo, so the
   /// enclosing transaction scope rolls the parent back.
   fn on_parent_change(&self, event: &rowindex_events::ChangeEvent<K>) -> Result<()> {
      if !matches!(event.action, ChangeAction::Delete | ChangeAction::Update) {
         return Ok(());
      }
      let Some(previous_key) = &event.previous_key else {
         return Ok(());
      };
      if self.state.lock().buckets.contains_key(previous_key) {
         warn!(
            foreign = %self.name,
            parent = %self.parent.name(),
            key = ?previous_key,
            operation = ?event.action,
            "constraint violation: parent mutation would orphan children"
         );
         return Err(Error::ConstraintViolation {
            operation: format!("{:?}", event.action),
            index: self.parent.name().to_string(),
         });
      }
      Ok(())
   }

   pub fn get_children(&self, parent_row: &P) -> Result<Vec<C>> {
      let key = self.parent.get_key(parent_row)?;
      Ok(self
         .state
         .lock()
         .buckets
         .get(&key)
         .cloned()
         .unwrap_or_default())
   }

   pub fn get_parent(&self, child_row: &C) -> Result<Option<P>> {
      let key = self.key_of(child_row)?;
      Ok(self.parent.find(&key))
   }

   /// `true` when the filter rejects `child_row` (it is not indexed, so it
   /// has no orphan-able parent reference) or the parent row is found.
   pub fn has_parent(&self, child_row: &C) -> Result<bool> {
      if !(self.filter_fn)(child_row) {
         return Ok(true);
      }
      let key = self.key_of(child_row)?;
      Ok(self.parent.contains(&key))
   }

   /// Inserts `row` into the bucket for its key. A no-op if the filter
   /// rejects `row`.
   pub fn add(&self, row: C) -> Result<()> {
      if !(self.filter_fn)(&row) {
         return Ok(());
      }
      let key = self.key_of(&row)?;
      if !self.parent.contains(&key) {
         warn!(index = %self.name, key = ?key, "add rejected: missing parent key");
         return Err(Error::MissingParentKey {
            index: self.name.clone(),
            key: format!("{key:?}"),
         });
      }
      let mut state = self.state.lock();
      let already_present = state
         .buckets
         .get(&key)
         .is_some_and(|bucket| bucket.contains(&row));
      if already_present {
         warn!(index = %self.name, key = ?key, "add rejected: duplicate row in bucket");
         return Err(Error::DuplicateKey {
            index: self.name.clone(),
            key: format!("{key:?}"),
         });
      }
      state.buckets.entry(key.clone()).or_default().push(row.clone());
      state.undo.push(ForeignUndo::RemoveFromBucket(key.clone(), row));
      trace!(index = %self.name, key = ?key, "row added to bucket");
      Ok(())
   }

   /// Removes `row` from its bucket, dropping the bucket if it becomes
   /// empty. A silent no-op if the filter rejects `row` or it is not found.
   pub fn remove(&self, row: &C) -> Result<()> {
      if !(self.filter_fn)(row) {
         return Ok(());
      }
      let key = self.key_of(row)?;
      let mut state = self.state.lock();
      let found = match state.buckets.get_mut(&key) {
         Some(bucket) => match bucket.iter().position(|candidate| candidate == row) {
            Some(position) => {
               bucket.remove(position);
               true
            }
            None => false,
         },
         None => false,
      };
      if !found {
         return Ok(());
      }
      if state.buckets.get(&key).is_some_and(|bucket| bucket.is_empty()) {
         state.buckets.remove(&key);
      }
      trace!(index = %self.name, key = ?key, "row removed from bucket");
      state.undo.push(ForeignUndo::AddToBucket(key, row.clone()));
      Ok(())
   }

   /// Moves `current` to the bucket for its key if that key differs from
   /// `previous`'s. Each side is filter-gated independently, mirroring
   /// [`crate::UniqueIndex::update`]: a filtered-out `previous` was never
   /// bucketed, and a filtered-out `current` is not bucketed.
   pub fn update(&self, previous: &C, current: C) -> Result<()> {
      let previous_key = (self.filter_fn)(previous)
         .then(|| self.key_of(previous))
         .transpose()?;
      let current_key = (self.filter_fn)(&current)
         .then(|| self.key_of(&current))
         .transpose()?;
      if previous_key == current_key {
         return Ok(());
      }

      if let Some(previous_key) = &previous_key {
         let mut state = self.state.lock();
         let found = match state.buckets.get_mut(previous_key) {
            Some(bucket) => match bucket.iter().position(|candidate| candidate == previous) {
               Some(position) => {
                  bucket.remove(position);
                  true
               }
               None => false,
            },
            None => false,
         };
         if found {
            if state
               .buckets
               .get(previous_key)
               .is_some_and(|bucket| bucket.is_empty())
            {
               state.buckets.remove(previous_key);
            }
            state
               .undo
               .push(ForeignUndo::AddToBucket(previous_key.clone(), previous.clone()));
         }
      }

      if let Some(current_key) = &current_key {
         if !self.parent.contains(current_key) {
            warn!(index = %self.name, key = ?current_key, "update rejected: missing parent key");
            return Err(Error::MissingParentKey {
               index: self.name.clone(),
               key: format!("{current_key:?}"),
            });
         }

         let mut state = self.state.lock();
         let already_present = state
            .buckets
            .get(current_key)
            .is_some_and(|bucket| bucket.contains(&current));
         if already_present {
            warn!(index = %self.name, key = ?current_key, "update rejected: duplicate row in bucket");
            return Err(Error::DuplicateKey {
               index: self.name.clone(),
               key: format!("{current_key:?}"),
            });
         }
         state
            .buckets
            .entry(current_key.clone())
            .or_default()
            .push(current.clone());
         state
            .undo
            .push(ForeignUndo::RemoveFromBucket(current_key.clone(), current));
      }
      trace!(index = %self.name, previous = ?previous_key, current = ?current_key, "child moved between buckets");
      Ok(())
   }
}

#[async_trait]
impl<K, P, C> TransactionParticipant for ForeignIndex<K, P, C>
where
   K: IndexKey,
   P: Clone + Send + Sync + 'static,
   C: Clone + PartialEq + Send + Sync + 'static,
{
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
            ForeignUndo::RemoveFromBucket(key, row) => {
               if let Some(bucket) = state.buckets.get_mut(&key) {
                  if let Some(position) = bucket.iter().position(|candidate| *candidate == row) {
                     bucket.remove(position);
                  }
               }
               if state.buckets.get(&key).is_some_and(|bucket| bucket.is_empty()) {
                  state.buckets.remove(&key);
               }
            }
            ForeignUndo::AddToBucket(key, row) => {
               state.buckets.entry(key).or_default().push(row);
            }
         }
      }
      Ok(())
   }
}

#[async_trait]
impl<K, P, C> Lockable for ForeignIndex<K, P, C>
where
   K: IndexKey,
   P: Clone + Send + Sync + 'static,
   C: Clone + PartialEq + Send + Sync + 'static,
{
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

impl<K, P, C> std::fmt::Debug for ForeignIndex<K, P, C>
where
   K: IndexKey,
   P: Clone + Send + Sync + 'static,
   C: Clone + PartialEq + Send + Sync + 'static,
{
   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      f.debug_struct("ForeignIndex")
         .field("name", &self.name)
         .field("buckets", &self.state.lock().buckets.len())
         .finish()
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::unique_index::UniqueIndex;

   #[derive(Debug, Clone, PartialEq)]
   struct Person {
      id: i64,
      name: String,
   }

   #[derive(Debug, Clone, PartialEq)]
   struct Order {
      id: i64,
      customer_id: i64,
   }

   fn people() -> Arc<UniqueIndex<i64, Person>> {
      UniqueIndex::new("people").has_index(|p: &Person| p.id).build()
   }

   fn orders(parent: Arc<UniqueIndex<i64, Person>>) -> Arc<ForeignIndex<i64, Person, Order>> {
      ForeignIndex::new("orders", parent)
         .has_index(|o: &Order| o.customer_id)
         .build()
   }

   #[test]
   fn missing_parent_key_is_rejected() {
      let people = people();
      let orders = orders(people);
      let result = orders.add(Order {
         id: 1,
         customer_id: 99,
      });
      assert!(matches!(result, Err(Error::MissingParentKey { .. })));
   }

   #[test]
   fn get_children_and_has_parent() {
      let people = people();
      let orders = orders(Arc::clone(&people));
      let ada = Person {
         id: 7,
         name: "Ada".into(),
      };
      people.add(ada.clone()).unwrap();
      let order = Order {
         id: 1,
         customer_id: 7,
      };
      orders.add(order.clone()).unwrap();

      assert!(orders.has_parent(&order).unwrap());
      assert_eq!(orders.get_parent(&order).unwrap(), Some(ada));
   }

   #[test]
   fn duplicate_row_in_bucket_is_rejected() {
      let people = people();
      let orders = orders(Arc::clone(&people));
      people
         .add(Person {
            id: 7,
            name: "Ada".into(),
         })
         .unwrap();
      let order = Order {
         id: 1,
         customer_id: 7,
      };
      orders.add(order.clone()).unwrap();
      let result = orders.add(order);
      assert!(matches!(result, Err(Error::DuplicateKey { .. })));
   }

   #[test]
   fn remove_of_absent_row_is_a_silent_no_op() {
      let people = people();
      let orders = orders(Arc::clone(&people));
      people
         .add(Person {
            id: 7,
            name: "Ada".into(),
         })
         .unwrap();
      let order = Order {
         id: 1,
         customer_id: 7,
      };
      assert!(orders.remove(&order).is_ok());
   }

   #[test]
   fn filtered_out_child_has_no_orphan_able_parent() {
      let people = people();
      let orders = ForeignIndex::new("orders", Arc::clone(&people))
         .has_index(|o: &Order| o.customer_id)
         .has_filter(|o: &Order| o.id != 0)
         .build();
      let stray = Order {
         id: 0,
         customer_id: 99,
      };
      assert!(orders.add(stray.clone()).is_ok());
      assert!(orders.has_parent(&stray).unwrap());
   }
}
