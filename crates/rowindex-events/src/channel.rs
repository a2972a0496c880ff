//! A synchronous, unbuffered, fallible multicast channel.
//!
//! This is deliberately not built on `tokio::sync::broadcast`: a broadcast
//! channel can't propagate a subscriber's rejection back to the publisher,
//! and delivery happens on the subscriber's own task rather than inline with
//! the mutation that produced the event. Referential-integrity subscribers
//! need the opposite of both: a synchronous call, on the publisher's own
//! thread, whose failure aborts the mutation before it returns.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::event::ChangeEvent;

type Subscriber<K, E> = Box<dyn Fn(&ChangeEvent<K>) -> Result<(), E> + Send + Sync>;

/// A multicast channel of [`ChangeEvent`]s with synchronous, fallible
/// delivery.
///
/// A publisher calls [`ChangeChannel::notify`] inline with its mutation.
/// Subscribers run in registration order on the caller's thread; the first
/// one to return `Err` stops delivery to any remaining subscriber and its
/// error is returned to the publisher, which is expected to abort (and roll
/// back) the mutation that triggered the event.
pub struct ChangeChannel<K, E> {
   subscribers: Mutex<Vec<Subscriber<K, E>>>,
}

impl<K, E> ChangeChannel<K, E> {
   pub fn new() -> Arc<Self> {
      Arc::new(Self {
         subscribers: Mutex::new(Vec::new()),
      })
   }

   /// Registers a subscriber. There is no unsubscribe: subscriptions are
   /// expected to live as long as the channel itself (typically the process),
   /// matching a foreign index's non-owning, teardown-free hold on its
   /// parent's channel.
   pub fn subscribe<F>(&self, subscriber: F)
   where
      F: Fn(&ChangeEvent<K>) -> Result<(), E> + Send + Sync + 'static,
   {
      self.subscribers.lock().push(Box::new(subscriber));
   }

   /// Delivers `event` to every subscriber, in registration order, stopping
   /// at the first rejection.
   pub fn notify(&self, event: &ChangeEvent<K>) -> Result<(), E> {
      trace!(action = ?event.action, subscribers = self.subscriber_count(), "notifying subscribers");
      for (position, subscriber) in self.subscribers.lock().iter().enumerate() {
         if let Err(err) = subscriber(event) {
            debug!(action = ?event.action, subscriber = position, "subscriber rejected change event");
            return Err(err);
         }
      }
      Ok(())
   }

   /// Number of currently registered subscribers. Exposed for diagnostics
   /// and tests.
   pub fn subscriber_count(&self) -> usize {
      self.subscribers.lock().len()
   }
}

impl<K, E> std::fmt::Debug for ChangeChannel<K, E> {
   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      f.debug_struct("ChangeChannel")
         .field("subscriber_count", &self.subscriber_count())
         .finish()
   }
}

#[cfg(test)]
mod tests {
   use std::sync::atomic::{AtomicUsize, Ordering};
   use std::sync::Arc;

   use super::*;

   #[derive(Debug, PartialEq, Eq)]
   struct Rejected(&'static str);

   #[test]
   fn delivers_to_all_subscribers_in_order() {
      let channel: Arc<ChangeChannel<i64, Rejected>> = ChangeChannel::new();
      let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

      for label in ["first", "second", "third"] {
         let seen = Arc::clone(&seen);
         channel.subscribe(move |_event| {
            seen.lock().unwrap().push(label);
            Ok(())
         });
      }

      channel.notify(&ChangeEvent::add(7)).unwrap();

      assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
   }

   #[test]
   fn first_rejection_short_circuits_remaining_subscribers() {
      let channel: Arc<ChangeChannel<i64, Rejected>> = ChangeChannel::new();
      let calls = Arc::new(AtomicUsize::new(0));

      {
         let calls = Arc::clone(&calls);
         channel.subscribe(move |_event| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Rejected("cannot orphan children"))
         });
      }
      {
         let calls = Arc::clone(&calls);
         channel.subscribe(move |_event| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
         });
      }

      let result = channel.notify(&ChangeEvent::delete(7));

      assert_eq!(result, Err(Rejected("cannot orphan children")));
      assert_eq!(calls.load(Ordering::SeqCst), 1);
   }

   #[test]
   fn channel_with_no_subscribers_always_succeeds() {
      let channel: Arc<ChangeChannel<i64, Rejected>> = ChangeChannel::new();
      assert!(channel.notify(&ChangeEvent::add(1)).is_ok());
      assert_eq!(channel.subscriber_count(), 0);
   }
}
