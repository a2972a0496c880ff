//! Integration tests exercising a `UniqueIndex` and its dependent
//! `ForeignIndex` together (referential integrity, cascade protection,
//! two-phase commit) — the cross-type scenarios from spec.md §8. Unit
//! tests of a single index type's own logic live inline in
//! `#[cfg(test)]` modules in `src/unique_index.rs` and
//! `src/foreign_index.rs`.

use std::sync::Arc;

use rowindex_core::{Error, ForeignIndex, TransactionParticipant, UniqueIndex};

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

fn people_index() -> Arc<UniqueIndex<i64, Person>> {
   UniqueIndex::new("people").has_index(|p: &Person| p.id).build()
}

fn orders_index(parent: Arc<UniqueIndex<i64, Person>>) -> Arc<ForeignIndex<i64, Person, Order>> {
   ForeignIndex::new("orders", parent)
      .has_index(|o: &Order| o.customer_id)
      .build()
}

// S4 — foreign cascade protection.
#[tokio::test]
async fn cannot_orphan_children_and_rollback_preserves_both() {
   let people = people_index();
   let orders = orders_index(Arc::clone(&people));

   let ada = Person {
      id: 7,
      name: "Ada".into(),
   };
   people.add(ada.clone()).unwrap();
   orders
      .add(Order {
         id: 100,
         customer_id: 7,
      })
      .unwrap();

   let result = people.remove(&ada);
   assert!(matches!(result, Err(Error::ConstraintViolation { .. })));

   // Dispose without complete: the scope would roll back every enlisted
   // participant. Here we drive that directly since there is no scope yet.
   people.rollback().await.unwrap();

   assert_eq!(people.find(&7), Some(ada.clone()));
   let children = orders.get_children(&ada).unwrap();
   assert_eq!(children.len(), 1);
   assert_eq!(children[0].id, 100);
}

// S5 — rollback of a key-changing update.
#[tokio::test]
async fn rollback_reverts_key_changing_update() {
   let people = people_index();
   let original = Person {
      id: 10,
      name: "Ada".into(),
   };
   people.add(original.clone()).unwrap();

   let renumbered = Person {
      id: 11,
      ..original.clone()
   };
   people.update(&original, renumbered.clone()).unwrap();
   assert_eq!(people.find(&11), Some(renumbered));
   assert_eq!(people.find(&10), None);

   people.rollback().await.unwrap();

   assert_eq!(people.find(&10), Some(original));
   assert_eq!(people.find(&11), None);
}

#[tokio::test]
async fn commit_clears_undo_log() {
   let people = people_index();
   people
      .add(Person {
         id: 1,
         name: "Ada".into(),
      })
      .unwrap();

   assert!(matches!(
      people.prepare().await.unwrap(),
      rowindex_core::PrepareVote::Prepared
   ));
   people.commit().await.unwrap();
   assert!(matches!(
      people.prepare().await.unwrap(),
      rowindex_core::PrepareVote::Done
   ));
}
