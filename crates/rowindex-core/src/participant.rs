//! The two-phase-commit callback set every index, row, and table implements
//! so a transaction scope can enlist them uniformly.

use async_trait::async_trait;

use crate::Result;

/// A participant's response to `prepare`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareVote {
   /// The participant has uncommitted work; it must be visited again at
   /// commit or rollback time.
   Prepared,
   /// The participant had nothing to do (its undo stack was empty); it may
   /// be skipped in the second phase.
   Done,
}

/// A two-phase-commit participant.
///
/// There is no ambient transaction coordinator built into the Rust
/// ecosystem for this purpose, so a scope supplies its own minimal one
/// (see the root crate's `AmbientTransaction`) that drives every enlisted
/// participant through this trait.
#[async_trait]
pub trait TransactionParticipant: Send + Sync {
   /// Vote on whether this participant has anything to commit or roll back.
   async fn prepare(&self) -> Result<PrepareVote>;

   /// Discard this participant's undo log. Called on every participant that
   /// voted [`PrepareVote::Prepared`] when every participant prepared
   /// successfully.
   async fn commit(&self) -> Result<()>;

   /// Apply this participant's undo log in LIFO order. Called on every
   /// enlisted participant when any participant failed to prepare, or when
   /// the scope is disposed without being completed.
   async fn rollback(&self) -> Result<()>;

   /// Recover a participant left in an indeterminate state after a crash
   /// between `prepare` and the coordinator's decision. Not supported: a
   /// participant that reaches this state can only be treated as fatal.
   async fn in_doubt(&self) -> Result<()> {
      Err(crate::Error::InDoubtNotSupported)
   }
}
