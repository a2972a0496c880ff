//! The bound placed on index keys.
//!
//! Keys are heterogeneous in practice (an integer primary key, a string
//! code, a composite tuple); the core never bakes a concrete key type in, it
//! only requires that a key can be compared, hashed, cloned, and printed for
//! diagnostics.

use std::fmt::Debug;
use std::hash::Hash;

/// Anything usable as an index key.
pub trait IndexKey: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

impl<T> IndexKey for T where T: Eq + Hash + Clone + Debug + Send + Sync + 'static {}
