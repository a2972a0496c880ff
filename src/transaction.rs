//! The minimal two-phase-commit coordinator a [`crate::LockingTransactionScope`]
//! drives its enlisted participants through.
//!
//! Spec §9's Design Notes are explicit that the core does not implement an
//! ambient transaction itself — it requires one from the host — and that,
//! absent a built-in ambient-transaction facility, implementers must supply
//! a minimal coordinator: `prepare` on every enlisted participant, then
//! `commit` on all if every `prepare` succeeded, or `rollback` on all
//! otherwise. This is that coordinator.

use std::sync::Arc;

use parking_lot::Mutex;
use rowindex_core::{PrepareVote, TransactionParticipant};
use tracing::error;

use crate::error::Result;

/// Drives a set of enlisted [`TransactionParticipant`]s through prepare,
/// then commit or rollback.
///
/// Participants enlist themselves (or are enlisted on their behalf by
/// [`crate::LockingTransactionScope::wait_reader_async`] /
/// `wait_writer_async`) as they are touched during the scope's lifetime; a
/// participant enlisted more than once is invoked more than once, since
/// `commit`/`rollback` on an already-quiescent participant (empty undo
/// stack) is a no-op per spec §4.B/§4.C.
pub struct AmbientTransaction {
   participants: Mutex<Vec<Arc<dyn TransactionParticipant>>>,
}

impl AmbientTransaction {
   pub fn new() -> Self {
      Self {
         participants: Mutex::new(Vec::new()),
      }
   }

   /// Enlists `participant` as volatile in this transaction.
   pub fn enlist(&self, participant: Arc<dyn TransactionParticipant>) {
      self.participants.lock().push(participant);
   }

   /// Runs the commit path: `prepare` on every enlisted participant; if all
   /// vote [`PrepareVote::Prepared`] or [`PrepareVote::Done`], `commit` on
   /// every participant that voted `Prepared`. If any `prepare` call fails,
   /// every already-enlisted participant is rolled back instead (including
   /// ones that had already voted `Done`, which must tolerate rolling back
   /// a no-op) and the triggering error is returned.
   pub async fn commit(&self) -> Result<()> {
      let participants = self.participants.lock().clone();
      let mut prepared = Vec::new();
      for participant in &participants {
         match participant.prepare().await {
            Ok(PrepareVote::Prepared) => prepared.push(Arc::clone(participant)),
            Ok(PrepareVote::Done) => {}
            Err(err) => {
               self.rollback_all(&participants).await;
               return Err(err.into());
            }
         }
      }

      let mut first_err = None;
      for participant in &prepared {
         if let Err(err) = participant.commit().await {
            error!(error = %err, "participant commit failed; continuing with remaining participants");
            if first_err.is_none() {
               first_err = Some(err);
            }
         }
      }
      match first_err {
         Some(err) => Err(err.into()),
         None => Ok(()),
      }
   }

   /// Runs the rollback path: `rollback` on every enlisted participant, in
   /// enlistment order. A participant's rollback failing never stops the
   /// remaining participants from getting their own chance to roll back.
   pub async fn rollback(&self) -> Result<()> {
      let participants = self.participants.lock().clone();
      self.rollback_all(&participants).await;
      Ok(())
   }

   /// Rolls back every participant, logging (but not propagating) any
   /// individual failure: a participant's rollback failing must never stop
   /// the remaining participants from getting their own chance, per spec
   /// §9's undo-closures-never-throw guidance applied to the coordinator.
   async fn rollback_all(&self, participants: &[Arc<dyn TransactionParticipant>]) {
      for participant in participants {
         if let Err(err) = participant.rollback().await {
            error!(error = %err, "participant rollback failed; continuing with remaining participants");
         }
      }
   }
}

impl Default for AmbientTransaction {
   fn default() -> Self {
      Self::new()
   }
}

impl std::fmt::Debug for AmbientTransaction {
   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      f.debug_struct("AmbientTransaction")
         .field("enlisted", &self.participants.lock().len())
         .finish()
   }
}
