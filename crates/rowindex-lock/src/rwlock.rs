//! The writer-priority async reader/writer lock described in spec §4.A.
//!
//! The lock is built from two coordination primitives plus a small shared
//! state block, matching the design-level algorithm: a writer gate
//! (`tokio::sync::Semaphore`, capacity 1) that serializes writer candidates,
//! a reader-drain notification that a newly-admitted writer waits on until
//! the last concurrent reader exits, and a `parking_lot::Mutex`-guarded
//! state block (`active_readers`, `pending_writers`, `writer_active`).
//!
//! Readers re-check `pending_writers` every time they (re)try to enter,
//! which is what gives writers priority: a writer that has announced intent
//! before a reader takes the state mutex will be observed by that reader,
//! which then queues behind the writer instead of proceeding.
//!
//! Only one implementation exists, and it is async; the blocking
//! `enter_read`/`enter_write` operations named in spec §4.A are obtained by
//! driving that same implementation via [`crate::runtime::block_on_current`],
//! so a single lock object can arbitrate between blocking and suspending
//! callers without duplicating bookkeeping (spec §5).

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::runtime::block_on_current;
use crate::timeout::LockTimeout;

#[derive(Debug, Default)]
struct State {
   active_readers: u32,
   pending_writers: u32,
   writer_active: bool,
}

/// A multi-reader / single-writer lock with strict writer priority.
///
/// Must be held behind an `Arc` (construct with [`AsyncRwLock::new`], which
/// already returns one) since guards hold a clone of that `Arc` rather than
/// borrowing the lock, letting guards outlive the call that acquired them.
#[derive(Debug)]
pub struct AsyncRwLock {
   name: String,
   state: Mutex<State>,
   /// Held as its own `Arc` so writer candidates can obtain an
   /// `OwnedSemaphorePermit` that outlives the call that acquired it,
   /// without making the guard types borrow from `AsyncRwLock` directly.
   writer_gate: Arc<Semaphore>,
   /// A writer waits here for the last active reader to exit.
   reader_drain: Notify,
   /// Queued readers wait here for the active writer to exit.
   readers_released: Notify,
}

impl AsyncRwLock {
   /// Creates a new lock, unlocked, identified by `name` for diagnostics.
   pub fn new(name: impl Into<String>) -> Arc<Self> {
      Arc::new(Self {
         name: name.into(),
         state: Mutex::new(State::default()),
         writer_gate: Arc::new(Semaphore::new(1)),
         reader_drain: Notify::new(),
         readers_released: Notify::new(),
      })
   }

   /// The name this lock was constructed with.
   pub fn name(&self) -> &str {
      &self.name
   }

   /// Number of readers currently holding the lock.
   pub fn active_readers(&self) -> u32 {
      self.state.lock().active_readers
   }

   /// Whether a writer currently holds the lock.
   pub fn is_write_locked(&self) -> bool {
      self.state.lock().writer_active
   }

   /// Whether at least one reader currently holds the lock.
   pub fn is_read_locked(&self) -> bool {
      self.state.lock().active_readers > 0
   }

   /// Acquire shared (read) access, suspending the caller until it is
   /// available or `timeout` elapses.
   pub async fn read_async(self: &Arc<Self>, timeout: LockTimeout) -> Result<ReadGuard> {
      match timeout {
         LockTimeout::Try => self.try_acquire_read(),
         LockTimeout::Infinite => Ok(self.wait_for_read().await),
         LockTimeout::After(duration) => tokio::time::timeout(duration, self.wait_for_read())
            .await
            .map_err(|_| Error::LockTimeout),
      }
   }

   /// Acquire exclusive (write) access, suspending the caller until it is
   /// available or `timeout` elapses.
   pub async fn write_async(self: &Arc<Self>, timeout: LockTimeout) -> Result<WriteGuard> {
      {
         let mut state = self.state.lock();
         state.pending_writers += 1;
      }

      let permit = match timeout {
         LockTimeout::Try => match Arc::clone(&self.writer_gate).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
               self.undo_pending_writer();
               return Err(Error::LockTimeout);
            }
         },
         LockTimeout::Infinite => Arc::clone(&self.writer_gate)
            .acquire_owned()
            .await
            .expect("writer gate semaphore is never closed"),
         LockTimeout::After(duration) => {
            match tokio::time::timeout(duration, Arc::clone(&self.writer_gate).acquire_owned())
               .await
            {
               Ok(Ok(permit)) => permit,
               _ => {
                  self.undo_pending_writer();
                  return Err(Error::LockTimeout);
               }
            }
         }
      };

      let needs_drain = {
         let mut state = self.state.lock();
         state.pending_writers -= 1;
         state.writer_active = true;
         state.active_readers > 0
      };

      if needs_drain {
         let drained = match timeout {
            LockTimeout::Try => self.state.lock().active_readers == 0,
            LockTimeout::Infinite => {
               self.wait_for_drain().await;
               true
            }
            LockTimeout::After(duration) => {
               tokio::time::timeout(duration, self.wait_for_drain())
                  .await
                  .is_ok()
            }
         };
         if !drained {
            // Rewind: undo admission to writer-active so the lock is left
            // exactly as it was before this acquisition attempt. The
            // `permit` local is dropped when we return, releasing the
            // writer gate for the next candidate.
            let mut state = self.state.lock();
            state.writer_active = false;
            drop(state);
            self.readers_released.notify_waiters();
            return Err(Error::LockTimeout);
         }
      }

      debug!(lock = %self.name, "writer entered");
      Ok(WriteGuard {
         lock: Arc::clone(self),
         _permit: permit,
      })
   }

   /// Blocking counterpart of [`Self::read_async`], implemented by driving
   /// the same async path to completion on whatever runtime is available.
   pub fn read(self: &Arc<Self>, timeout: LockTimeout) -> Result<ReadGuard> {
      block_on_current(self.read_async(timeout))
   }

   /// Blocking counterpart of [`Self::write_async`].
   pub fn write(self: &Arc<Self>, timeout: LockTimeout) -> Result<WriteGuard> {
      block_on_current(self.write_async(timeout))
   }

   /// Non-blocking attempt to acquire shared access.
   pub fn try_read(self: &Arc<Self>) -> Result<ReadGuard> {
      self.try_acquire_read()
   }

   /// Non-blocking attempt to acquire exclusive access.
   pub fn try_write(self: &Arc<Self>) -> Result<WriteGuard> {
      block_on_current(self.write_async(LockTimeout::Try))
   }

   fn try_acquire_read(self: &Arc<Self>) -> Result<ReadGuard> {
      let mut state = self.state.lock();
      if !state.writer_active && state.pending_writers == 0 {
         state.active_readers += 1;
         trace!(lock = %self.name, readers = state.active_readers, "reader entered");
         Ok(ReadGuard {
            lock: Arc::clone(self),
         })
      } else {
         Err(Error::LockTimeout)
      }
   }

   async fn wait_for_read(self: &Arc<Self>) -> ReadGuard {
      loop {
         // Register interest before checking, so a wakeup that lands
         // between the check and the await below is not missed.
         let notified = self.readers_released.notified();
         {
            let mut state = self.state.lock();
            if !state.writer_active && state.pending_writers == 0 {
               state.active_readers += 1;
               trace!(lock = %self.name, readers = state.active_readers, "reader entered");
               return ReadGuard {
                  lock: Arc::clone(self),
               };
            }
         }
         notified.await;
      }
   }

   async fn wait_for_drain(self: &Arc<Self>) {
      loop {
         let notified = self.reader_drain.notified();
         if self.state.lock().active_readers == 0 {
            return;
         }
         notified.await;
      }
   }

   fn undo_pending_writer(&self) {
      self.state.lock().pending_writers -= 1;
   }
}

/// RAII guard for shared (read) access. Dropping it releases the lock.
#[derive(Debug)]
pub struct ReadGuard {
   lock: Arc<AsyncRwLock>,
}

impl Drop for ReadGuard {
   fn drop(&mut self) {
      let should_wake = {
         let mut state = self.lock.state.lock();
         state.active_readers -= 1;
         trace!(lock = %self.lock.name, readers = state.active_readers, "reader exited");
         state.active_readers == 0 && state.writer_active
      };
      if should_wake {
         self.lock.reader_drain.notify_waiters();
      }
   }
}

/// RAII guard for exclusive (write) access. Dropping it releases the lock.
#[derive(Debug)]
pub struct WriteGuard {
   lock: Arc<AsyncRwLock>,
   _permit: OwnedSemaphorePermit,
}

impl Drop for WriteGuard {
   fn drop(&mut self) {
      {
         let mut state = self.lock.state.lock();
         state.writer_active = false;
      }
      debug!(lock = %self.lock.name, "writer exited");
      // Queued readers recheck the state once this writer's presence is
      // cleared; the next writer candidate is released when `_permit`
      // drops after this function returns.
      self.lock.readers_released.notify_waiters();
   }
}
