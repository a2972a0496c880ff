//! A dyn-safe lock abstraction for callers that coordinate several locks of
//! possibly different concrete types without naming them, such as a
//! transaction scope acquiring one lock per index touched.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::rwlock::{AsyncRwLock, ReadGuard, WriteGuard};
use crate::timeout::LockTimeout;

/// Which mode a lock is acquired in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
   /// Shared access; any number of readers may hold the lock concurrently.
   Read,
   /// Exclusive access; no other reader or writer may hold the lock.
   Write,
}

/// A held lock, released when dropped. Object-safe so a scope can hold a
/// `Vec<Box<dyn LockGuard>>` spanning several concrete lock types.
pub trait LockGuard: fmt::Debug + Send + Sync {}

impl LockGuard for ReadGuard {}
impl LockGuard for WriteGuard {}

/// A lock that can be acquired through a uniform, object-safe interface.
///
/// Implemented for `Arc<AsyncRwLock>` rather than `AsyncRwLock` itself,
/// since acquisition needs an owned `Arc` to hand to the returned guard.
#[async_trait]
pub trait Lockable: fmt::Debug + Send + Sync {
   /// A name for diagnostics; need not be unique.
   fn lock_name(&self) -> &str;

   /// Acquire this lock in the given mode, suspending until it is available
   /// or `timeout` elapses.
   async fn acquire(&self, mode: LockMode, timeout: LockTimeout) -> Result<Box<dyn LockGuard>>;
}

#[async_trait]
impl Lockable for Arc<AsyncRwLock> {
   fn lock_name(&self) -> &str {
      AsyncRwLock::name(self)
   }

   async fn acquire(&self, mode: LockMode, timeout: LockTimeout) -> Result<Box<dyn LockGuard>> {
      match mode {
         LockMode::Read => self
            .read_async(timeout)
            .await
            .map(|guard| Box::new(guard) as Box<dyn LockGuard>),
         LockMode::Write => self
            .write_async(timeout)
            .await
            .map(|guard| Box::new(guard) as Box<dyn LockGuard>),
      }
   }
}
