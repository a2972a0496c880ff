//! Exercises the `Row`/`Table` contracts (spec §3, §4.E) against a minimal
//! concrete implementation, the way generated table code would shape one:
//! a row that is both `Lockable` and a `TransactionParticipant`, and a
//! table that is `Lockable` and registers its indexes by name.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use rowindex::{
   AsyncRwLock, IndexHandle, LockGuard, LockMode, LockTarget, LockTimeout, Lockable, LockingTransactionScope,
   PrepareVote, Row, RowVersion, Table, TransactionParticipant,
};
use rowindex_core::UniqueIndex;

#[derive(Debug, Clone, PartialEq)]
struct Customer {
   id: i64,
   name: String,
}

/// A row wraps its own lock but carries no undo log of its own: field-level
/// changes are expressed as key-changing updates against the index that
/// owns it, so `prepare`/`commit`/`rollback` here are no-ops. `version`
/// only ever has one snapshot to offer since this row keeps no history.
#[derive(Debug, Clone)]
struct CustomerRow {
   lock: Arc<AsyncRwLock>,
   data: Customer,
}

impl CustomerRow {
   fn new(data: Customer) -> Self {
      Self {
         lock: AsyncRwLock::new(format!("customer:{}", data.id)),
         data,
      }
   }
}

#[async_trait]
impl Lockable for CustomerRow {
   fn lock_name(&self) -> &str {
      self.lock.lock_name()
   }

   async fn acquire(&self, mode: LockMode, timeout: LockTimeout) -> rowindex_lock::Result<Box<dyn LockGuard>> {
      self.lock.acquire(mode, timeout).await
   }
}

#[async_trait]
impl TransactionParticipant for CustomerRow {
   async fn prepare(&self) -> rowindex_core::Result<PrepareVote> {
      Ok(PrepareVote::Done)
   }

   async fn commit(&self) -> rowindex_core::Result<()> {
      Ok(())
   }

   async fn rollback(&self) -> rowindex_core::Result<()> {
      Ok(())
   }
}

impl Row for CustomerRow {
   fn version(&self, _which: RowVersion) -> Self {
      self.clone()
   }
}

/// A generated table: a named registry of one unique index, lockable in
/// its own right for a consistent view during iteration, but with no undo
/// log since a table never mutates directly.
struct CustomerTable {
   lock: Arc<AsyncRwLock>,
   pk: Arc<UniqueIndex<i64, Customer>>,
   unique_indexes: IndexMap<&'static str, Arc<dyn IndexHandle>>,
   foreign_indexes: IndexMap<&'static str, Arc<dyn IndexHandle>>,
}

impl std::fmt::Debug for CustomerTable {
   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      f.debug_struct("CustomerTable")
         .field("unique_indexes", &self.unique_indexes.keys().collect::<Vec<_>>())
         .field("foreign_indexes", &self.foreign_indexes.keys().collect::<Vec<_>>())
         .finish()
   }
}

impl CustomerTable {
   fn new() -> Arc<Self> {
      let pk = UniqueIndex::<i64, Customer>::new("pk").has_index(|c: &Customer| c.id).build();
      let mut unique_indexes: IndexMap<&'static str, Arc<dyn IndexHandle>> = IndexMap::new();
      unique_indexes.insert("pk", Arc::clone(&pk) as Arc<dyn IndexHandle>);
      Arc::new(Self {
         lock: AsyncRwLock::new("customers"),
         pk,
         unique_indexes,
         foreign_indexes: IndexMap::new(),
      })
   }
}

#[async_trait]
impl Lockable for CustomerTable {
   fn lock_name(&self) -> &str {
      self.lock.lock_name()
   }

   async fn acquire(&self, mode: LockMode, timeout: LockTimeout) -> rowindex_lock::Result<Box<dyn LockGuard>> {
      self.lock.acquire(mode, timeout).await
   }
}

impl Table for CustomerTable {
   type Row = CustomerRow;

   fn name(&self) -> &str {
      "customers"
   }

   fn unique_indexes(&self) -> &IndexMap<&'static str, Arc<dyn IndexHandle>> {
      &self.unique_indexes
   }

   fn foreign_indexes(&self) -> &IndexMap<&'static str, Arc<dyn IndexHandle>> {
      &self.foreign_indexes
   }

   fn rows(&self) -> Vec<Self::Row> {
      self.pk.values().into_iter().map(CustomerRow::new).collect()
   }
}

#[tokio::test]
async fn table_locks_alongside_its_indexes_and_reports_live_rows() {
   let table = CustomerTable::new();

   let scope = LockingTransactionScope::new(std::time::Duration::from_secs(5));
   scope
      .wait_writer_async(LockTarget::lockable(Arc::clone(&table)))
      .await
      .unwrap();
   scope
      .wait_writer_async(LockTarget::participant(Arc::clone(&table.pk)))
      .await
      .unwrap();

   table
      .pk
      .add(Customer {
         id: 1,
         name: "Ada".into(),
      })
      .unwrap();

   scope.complete();
   scope.dispose().await.unwrap();

   let rows = table.rows();
   assert_eq!(rows.len(), 1);
   assert_eq!(rows[0].data, Customer { id: 1, name: "Ada".into() });
   assert_eq!(rows[0].version(RowVersion::Current).data.id, 1);
}

#[tokio::test]
async fn row_is_independently_lockable_from_its_table() {
   let row = CustomerRow::new(Customer {
      id: 2,
      name: "Grace".into(),
   });

   let scope = LockingTransactionScope::new(std::time::Duration::from_secs(5));
   scope
      .wait_reader_async(LockTarget::participant(Arc::new(row)))
      .await
      .unwrap();
   assert_eq!(scope.reader_lock_count(), 1);

   scope.complete();
   scope.dispose().await.unwrap();
}
