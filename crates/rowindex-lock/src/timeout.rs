//! Timeout semantics for lock acquisition.

use std::time::Duration;

use crate::error::Error;

/// How long a caller is willing to wait to acquire [`crate::AsyncRwLock`].
///
/// This is the idiomatic replacement for the original system's convention of
/// passing a raw millisecond count where `-1` means "wait forever" and `0`
/// means "don't wait at all". [`LockTimeout::try_from`] accepts that
/// convention directly for callers (or generated code) still thinking in
/// those terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockTimeout {
   /// Wait until the lock becomes available, however long that takes.
   #[default]
   Infinite,
   /// Attempt to acquire the lock without waiting; fail immediately if it
   /// is not already available.
   Try,
   /// Wait up to the given duration before failing with
   /// [`Error::LockTimeout`].
   After(Duration),
}

impl LockTimeout {
   /// Convenience constructor from a millisecond count.
   pub fn from_millis(ms: u64) -> Self {
      LockTimeout::After(Duration::from_millis(ms))
   }
}

impl TryFrom<i64> for LockTimeout {
   type Error = Error;

   /// `-1` maps to [`LockTimeout::Infinite`], `0` to [`LockTimeout::Try`],
   /// any positive value to [`LockTimeout::After`] in milliseconds. Any
   /// other negative value is rejected as an invalid-lock-state argument
   /// error, per the original system's contract.
   fn try_from(timeout_ms: i64) -> Result<Self, Self::Error> {
      match timeout_ms {
         -1 => Ok(LockTimeout::Infinite),
         0 => Ok(LockTimeout::Try),
         ms if ms > 0 => Ok(LockTimeout::After(Duration::from_millis(ms as u64))),
         other => Err(Error::InvalidLockState(format!(
            "negative timeout {other} is not valid (use -1 for infinite)"
         ))),
      }
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn minus_one_is_infinite_and_zero_is_try() {
      assert_eq!(LockTimeout::try_from(-1).unwrap(), LockTimeout::Infinite);
      assert_eq!(LockTimeout::try_from(0).unwrap(), LockTimeout::Try);
   }

   #[test]
   fn positive_value_is_milliseconds() {
      assert_eq!(
         LockTimeout::try_from(250).unwrap(),
         LockTimeout::After(Duration::from_millis(250))
      );
   }

   #[test]
   fn other_negative_values_are_rejected() {
      assert!(matches!(
         LockTimeout::try_from(-2),
         Err(Error::InvalidLockState(_))
      ));
   }
}
