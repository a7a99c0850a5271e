//! Typed key-value state store for the GameState Service.
//!
//! The store maps non-empty string keys to [`TypedValue`]s. It is the only
//! authoritative copy of service state and lives for the lifetime of the
//! process; nothing is persisted.
//!
//! # Storage Backends
//!
//! All backends implement the [`StateStore`] trait:
//!
//! - [`InMemoryStateStore`] -- `HashMap`-based store wired to a
//!   [`ChangeNotifier`](gss_notify::ChangeNotifier)
//!
//! # Design Rules
//!
//! 1. A key that was never written is absent, and reading it is an error,
//!    never a default value.
//! 2. Writes replace the whole value; a key may change kind between writes.
//! 3. Writes are serialized. Each write is published to the notifier before
//!    `set` returns, in the order writes were applied.
//! 4. Reads run concurrently with each other and only wait for the brief
//!    map update of an in-flight write.
//! 5. There is no delete: entries live as long as the store.
//!
//! [`TypedValue`]: gss_types::TypedValue

pub mod error;
pub mod memory;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStateStore;
pub use traits::StateStore;
