//! [`LockingTransactionScope`]: binds lock acquisition, two-phase-commit
//! enlistment, and release-on-dispose into one unit (spec §4.D).

use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use parking_lot::Mutex;
use rowindex_core::TransactionParticipant;
use rowindex_lock::{LockGuard, LockMode, Lockable, LockTimeout, block_on_current};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};
use crate::transaction::AmbientTransaction;

/// A key acquired through a scope, paired with its two-phase-commit
/// identity if it has one.
///
/// A table has no undo log of its own and so is constructed with
/// [`LockTarget::lockable`]; an index or row, which does, is constructed
/// with [`LockTarget::participant`]. Requiring the caller to make this
/// distinction at the call site (rather than the scope probing for it at
/// runtime) sidesteps needing a dynamic downcast: generated code already
/// knows statically, for each table/index/row it emits, which case applies.
#[derive(Clone)]
pub struct LockTarget {
   lockable: Arc<dyn Lockable>,
   participant: Option<Arc<dyn TransactionParticipant>>,
}

impl LockTarget {
   /// A lockable that also carries an undo log — a `UniqueIndex`,
   /// `ForeignIndex`, or `Row` — and so must be enlisted in the ambient
   /// transaction when first acquired.
   pub fn participant<T>(value: Arc<T>) -> Self
   where
      T: Lockable + TransactionParticipant + 'static,
   {
      let participant = Arc::clone(&value) as Arc<dyn TransactionParticipant>;
      Self {
         lockable: value as Arc<dyn Lockable>,
         participant: Some(participant),
      }
   }

   /// A lockable with no two-phase-commit identity of its own — a `Table`.
   pub fn lockable<T>(value: Arc<T>) -> Self
   where
      T: Lockable + 'static,
   {
      Self {
         lockable: value as Arc<dyn Lockable>,
         participant: None,
      }
   }
}

/// Identifies a [`LockTarget`] by the address of its underlying allocation,
/// giving the scope's "at most once per scope per mode" rule (spec §4.D)
/// without requiring `Lockable` itself to be `Eq`/`Hash`.
#[derive(Clone, Copy)]
struct ArcKey(*const ());

// The pointer is only ever compared and hashed, never dereferenced; the
// `Arc` it was taken from is kept alive in `held` for as long as the key
// lives in `reader_locks`/`writer_locks`.
unsafe impl Send for ArcKey {}
unsafe impl Sync for ArcKey {}

impl ArcKey {
   fn new(lockable: &Arc<dyn Lockable>) -> Self {
      Self(Arc::as_ptr(lockable) as *const ())
   }
}

impl PartialEq for ArcKey {
   fn eq(&self, other: &Self) -> bool {
      self.0 == other.0
   }
}

impl Eq for ArcKey {}

impl Hash for ArcKey {
   fn hash<H: Hasher>(&self, state: &mut H) {
      self.0.hash(state);
   }
}

struct Held {
   // Kept alive so the guard's `Drop` (the lock release) is never racing
   // the underlying object's own destruction.
   _lockable: Arc<dyn Lockable>,
   _guard: Box<dyn LockGuard>,
}

/// Wraps an ambient transaction with the lock bookkeeping a generated
/// table/row/index implementation needs: deduplicated lock acquisition,
/// two-phase-commit enlistment, and guaranteed release on dispose.
///
/// A scope owns no rows; it owns only the obligation to finalize its
/// ambient transaction and release every lock it acquired.
#[must_use = "if unused, the transaction is immediately rolled back"]
pub struct LockingTransactionScope {
   transaction: AmbientTransaction,
   cancellation: CancellationToken,
   deadline: Option<Instant>,
   reader_locks: Mutex<IndexMap<ArcKey, Held>>,
   writer_locks: Mutex<IndexMap<ArcKey, Held>>,
   complete: AtomicBool,
   finalized: AtomicBool,
}

impl LockingTransactionScope {
   /// Derives an internal cancellation source whose deadline is `timeout`
   /// from now.
   pub fn new(timeout: Duration) -> Self {
      Self {
         transaction: AmbientTransaction::new(),
         cancellation: CancellationToken::new(),
         deadline: Some(Instant::now() + timeout),
         reader_locks: Mutex::new(IndexMap::new()),
         writer_locks: Mutex::new(IndexMap::new()),
         complete: AtomicBool::new(false),
         finalized: AtomicBool::new(false),
      }
   }

   /// No deadline; the caller owns `cancellation` and may cancel it from
   /// elsewhere (e.g. a surrounding request-cancellation signal).
   pub fn with_cancellation(cancellation: CancellationToken) -> Self {
      Self {
         transaction: AmbientTransaction::new(),
         cancellation,
         deadline: None,
         reader_locks: Mutex::new(IndexMap::new()),
         writer_locks: Mutex::new(IndexMap::new()),
         complete: AtomicBool::new(false),
         finalized: AtomicBool::new(false),
      }
   }

   /// Acquires shared access to `target`, unless this scope already holds a
   /// reader lock on it (in which case this is a no-op per spec §4.D's
   /// recursion policy). If `target` carries a two-phase-commit identity,
   /// it is enlisted in the ambient transaction on first acquisition.
   pub async fn wait_reader_async(&self, target: LockTarget) -> Result<()> {
      let key = ArcKey::new(&target.lockable);
      if self.reader_locks.lock().contains_key(&key) {
         return Ok(());
      }
      let guard = self.acquire(&target.lockable, LockMode::Read).await?;
      if let Some(participant) = target.participant.clone() {
         self.transaction.enlist(participant);
      }
      debug!(lock = target.lockable.lock_name(), "scope acquired reader lock");
      self.reader_locks.lock().insert(
         key,
         Held {
            _lockable: target.lockable,
            _guard: guard,
         },
      );
      Ok(())
   }

   /// Acquires exclusive access to `target`, unless this scope already
   /// holds a writer lock on it. If `target` carries a two-phase-commit
   /// identity, it is enlisted in the ambient transaction on first
   /// acquisition.
   pub async fn wait_writer_async(&self, target: LockTarget) -> Result<()> {
      let key = ArcKey::new(&target.lockable);
      if self.writer_locks.lock().contains_key(&key) {
         return Ok(());
      }
      let guard = self.acquire(&target.lockable, LockMode::Write).await?;
      if let Some(participant) = target.participant.clone() {
         self.transaction.enlist(participant);
      }
      debug!(lock = target.lockable.lock_name(), "scope acquired writer lock");
      self.writer_locks.lock().insert(
         key,
         Held {
            _lockable: target.lockable,
            _guard: guard,
         },
      );
      Ok(())
   }

   /// Number of distinct lockables this scope currently holds a reader
   /// lock on. Exposed for diagnostics and tests of the "at most once per
   /// scope per mode" dedup rule (spec §4.D, §8 property 7).
   pub fn reader_lock_count(&self) -> usize {
      self.reader_locks.lock().len()
   }

   /// Number of distinct lockables this scope currently holds a writer
   /// lock on.
   pub fn writer_lock_count(&self) -> usize {
      self.writer_locks.lock().len()
   }

   async fn acquire(&self, lockable: &Arc<dyn Lockable>, mode: LockMode) -> Result<Box<dyn LockGuard>> {
      if self.cancellation.is_cancelled() {
         return Err(Error::Lock(rowindex_lock::Error::Cancelled));
      }
      let timeout = match self.deadline {
         None => LockTimeout::Infinite,
         Some(deadline) => {
            let now = Instant::now();
            if now >= deadline {
               return Err(Error::Lock(rowindex_lock::Error::LockTimeout));
            }
            LockTimeout::After(deadline - now)
         }
      };
      tokio::select! {
         biased;
         () = self.cancellation.cancelled() => Err(Error::Lock(rowindex_lock::Error::Cancelled)),
         result = lockable.acquire(mode, timeout) => result.map_err(Error::from),
      }
   }

   /// Signals that, on dispose, the ambient transaction should commit
   /// rather than roll back.
   pub fn complete(&self) {
      self.complete.store(true, Ordering::SeqCst);
   }

   /// Finalizes the ambient transaction — commit if [`Self::complete`] was
   /// called, rollback otherwise — then releases every lock this scope
   /// acquired.
   ///
   /// Locks are released only after the transaction has finalized (spec
   /// §4.D's ordering rule), so participants' `commit`/`rollback` callbacks
   /// observe the same lock state their mutations ran under. Calling this
   /// more than once is an error; calling it at all is optional, since
   /// `Drop` finalizes an unfinalized scope automatically, but only the
   /// explicit form lets a caller observe a participant failure.
   pub async fn dispose(&self) -> Result<()> {
      if self.finalized.swap(true, Ordering::SeqCst) {
         return Err(Error::ScopeAlreadyFinalized);
      }
      let result = if self.complete.load(Ordering::SeqCst) {
         self.transaction.commit().await
      } else {
         self.transaction.rollback().await
      };
      self.writer_locks.lock().clear();
      self.reader_locks.lock().clear();
      result
   }
}

impl Drop for LockingTransactionScope {
   fn drop(&mut self) {
      if self.finalized.load(Ordering::SeqCst) {
         return;
      }
      // `Drop` cannot be `async` or fallible, so an unfinalized scope is
      // driven to completion synchronously here, mirroring the teacher's
      // `run_async_command` bridge (now generalized as
      // `rowindex_lock::block_on_current`). Any participant failure is
      // swallowed; callers that need to observe it must call `dispose()`
      // explicitly before the scope goes out of scope.
      let _ = block_on_current(self.dispose());
   }
}

impl std::fmt::Debug for LockingTransactionScope {
   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      f.debug_struct("LockingTransactionScope")
         .field("reader_locks", &self.reader_locks.lock().len())
         .field("writer_locks", &self.writer_locks.lock().len())
         .field("complete", &self.complete.load(Ordering::SeqCst))
         .field("finalized", &self.finalized.load(Ordering::SeqCst))
         .finish()
   }
}
