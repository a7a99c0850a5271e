//! Foundation types for the GameState Service (GSS).
//!
//! This crate provides the typed value model shared by the store, the
//! notifier, the wire protocol and the client SDK. Every other GSS crate
//! depends on `gss-types`.
//!
//! # Key Types
//!
//! - [`TypedValue`] -- Closed sum type over the six supported value kinds
//! - [`ValueKind`] -- Compact type tag (bus signature) for each kind
//! - [`ValueError`] -- Decode and parse failures, chiefly type mismatches

pub mod error;
pub mod kind;
pub mod value;

pub use error::{ValueError, ValueResult};
pub use kind::ValueKind;
pub use value::TypedValue;
