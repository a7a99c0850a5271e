use gss_types::TypedValue;

use crate::error::StoreResult;

/// Typed key-value state store.
///
/// All implementations must satisfy these invariants:
/// - At most one value per key; absence is observable and distinct from any
///   value.
/// - `set` always succeeds for a non-empty key, regardless of the kind the
///   key previously held.
/// - Writes are applied one at a time, and each applied write is handed to
///   the change notifier before `set` returns.
pub trait StateStore: Send + Sync {
    /// Read the current value of `key`.
    ///
    /// Returns `Err(StoreError::KeyNotFound)` if the key was never set.
    fn get(&self, key: &str) -> StoreResult<TypedValue>;

    /// Insert or replace the value of `key` and publish the change.
    ///
    /// Returns the sequence number assigned to this write.
    fn set(&self, key: &str, value: TypedValue) -> StoreResult<u64>;

    /// Check whether `key` currently has a value.
    fn contains(&self, key: &str) -> StoreResult<bool>;
}
