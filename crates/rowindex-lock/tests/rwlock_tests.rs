use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rowindex_lock::{AsyncRwLock, Error, LockTimeout};
use tokio::sync::Barrier;

#[tokio::test]
async fn concurrent_reads_are_allowed() {
   let lock = AsyncRwLock::new("numbers");
   let barrier = Arc::new(Barrier::new(3));
   let active = Arc::new(AtomicUsize::new(0));
   let max_seen = Arc::new(AtomicUsize::new(0));

   let handles: Vec<_> = (0..3)
      .map(|_| {
         let (lock, barrier, active, max_seen) = (
            Arc::clone(&lock),
            Arc::clone(&barrier),
            Arc::clone(&active),
            Arc::clone(&max_seen),
         );
         tokio::spawn(async move {
            let guard = lock.read_async(LockTimeout::Infinite).await.unwrap();
            barrier.wait().await;
            max_seen.fetch_max(active.fetch_add(1, Ordering::SeqCst) + 1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            active.fetch_sub(1, Ordering::SeqCst);
            drop(guard);
         })
      })
      .collect();

   for handle in handles {
      handle.await.unwrap();
   }

   assert_eq!(max_seen.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn writer_excludes_readers() {
   let lock = AsyncRwLock::new("exclusive");
   let write_guard = lock.write_async(LockTimeout::Infinite).await.unwrap();

   assert!(matches!(
      lock.read_async(LockTimeout::Try).await,
      Err(Error::LockTimeout)
   ));

   drop(write_guard);
   assert!(lock.read_async(LockTimeout::Try).await.is_ok());
}

#[tokio::test]
async fn pending_writer_blocks_new_readers() {
   // A writer that has announced intent must be observed by a reader that
   // checks in afterwards, even though the writer has not yet been admitted
   // because an earlier reader is still active.
   let lock = AsyncRwLock::new("priority");
   let first_reader = lock.read_async(LockTimeout::Infinite).await.unwrap();

   let writer_lock = Arc::clone(&lock);
   let writer_task = tokio::spawn(async move { writer_lock.write_async(LockTimeout::Infinite).await });

   // Give the writer a chance to register its intent before the next reader
   // arrives.
   tokio::time::sleep(Duration::from_millis(20)).await;

   assert!(matches!(
      lock.read_async(LockTimeout::Try).await,
      Err(Error::LockTimeout)
   ));

   drop(first_reader);
   let write_guard = writer_task.await.unwrap().unwrap();
   drop(write_guard);
}

#[tokio::test]
async fn write_times_out_when_reader_never_releases() {
   let lock = AsyncRwLock::new("timeout");
   let _reader = lock.read_async(LockTimeout::Infinite).await.unwrap();

   let result = lock
      .write_async(LockTimeout::After(Duration::from_millis(20)))
      .await;
   assert!(matches!(result, Err(Error::LockTimeout)));

   // The lock must be left exactly as it was before the failed attempt: a
   // reader can still acquire it, and a later writer is not blocked by
   // leftover bookkeeping from the timed-out attempt.
   assert!(lock.read_async(LockTimeout::Try).await.is_ok());
}

#[tokio::test]
async fn try_write_fails_immediately_without_waiting() {
   let lock = AsyncRwLock::new("try");
   let _write_guard = lock.write_async(LockTimeout::Infinite).await.unwrap();

   let started = std::time::Instant::now();
   let result = lock.write_async(LockTimeout::Try).await;
   assert!(matches!(result, Err(Error::LockTimeout)));
   assert!(started.elapsed() < Duration::from_millis(50));
}
