//! Configuration for [`crate::AsyncRwLock`].

use serde::{Deserialize, Serialize};

use crate::LockTimeout;

/// Configuration controlling the default acquisition behavior of a lock.
///
/// # Examples
///
/// ```
/// use rowindex_lock::LockConfig;
///
/// let config = LockConfig::default();
/// assert!(config.default_timeout_ms.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
   /// Default timeout (in milliseconds) applied when a caller does not
   /// specify one explicitly. `None` means wait forever.
   ///
   /// Default: `None` (infinite)
   pub default_timeout_ms: Option<u64>,
}

impl Default for LockConfig {
   fn default() -> Self {
      Self {
         default_timeout_ms: None,
      }
   }
}

impl LockConfig {
   /// Resolve this configuration's default into a [`LockTimeout`].
   pub fn default_timeout(&self) -> LockTimeout {
      match self.default_timeout_ms {
         Some(ms) => LockTimeout::from_millis(ms),
         None => LockTimeout::Infinite,
      }
   }
}
