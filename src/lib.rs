//! # rowindex
//!
//! The in-process transactional indexing engine that a generated,
//! strongly-typed, code-first data model links against: unique and foreign
//! indexes over rows held entirely in memory, a writer-priority async
//! reader/writer lock, and a locking transaction scope that binds lock
//! acquisition, two-phase-commit enlistment, and rollback into one unit.
//!
//! This crate is the root of a three-crate workspace:
//!
//! - [`rowindex_lock`]: the async reader/writer lock (re-exported here).
//! - [`rowindex_events`]: the synchronous change-event channel.
//! - [`rowindex_core`]: `UniqueIndex` and `ForeignIndex`.
//!
//! and adds, at this level, the pieces that only make sense once all three
//! are in play: [`LockingTransactionScope`], the [`Row`]/[`Table`]
//! contracts external collaborators implement, and the minimal
//! [`AmbientTransaction`] two-phase-commit coordinator the scope drives.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use rowindex::{LockTarget, LockingTransactionScope};
//! use rowindex_core::UniqueIndex;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Customer {
//!    id: i64,
//!    name: String,
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> rowindex::Result<()> {
//! let customers = UniqueIndex::<i64, Customer>::new("pk")
//!    .has_index(|c: &Customer| c.id)
//!    .build();
//!
//! let scope = LockingTransactionScope::new(Duration::from_secs(5));
//! scope
//!    .wait_writer_async(LockTarget::participant(Arc::clone(&customers)))
//!    .await?;
//!
//! customers.add(Customer { id: 1, name: "Ada".into() })?;
//!
//! scope.complete();
//! scope.dispose().await?;
//!
//! assert_eq!(customers.find(&1).unwrap().name, "Ada");
//! # Ok(())
//! # }
//! ```
mod error;
mod row;
mod scope;
mod table;
mod transaction;

pub use error::{Error, Result};
pub use row::{Row, RowVersion};
pub use scope::{LockTarget, LockingTransactionScope};
pub use table::{IndexHandle, Table};
pub use transaction::AmbientTransaction;

// Re-exported so a caller depending only on `rowindex` has everything it
// needs — the lock, event, and index primitives plus the scope that ties
// them together — without also depending on the sub-crates directly.
pub use rowindex_core::{ForeignIndex, PrepareVote, TransactionParticipant, UniqueIndex};
pub use rowindex_events::{ChangeAction, ChangeChannel, ChangeEvent};
pub use rowindex_lock::{AsyncRwLock, LockConfig, LockGuard, LockMode, LockTimeout, Lockable, ReadGuard, WriteGuard};
