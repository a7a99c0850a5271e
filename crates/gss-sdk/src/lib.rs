//! Client SDK for the GameState Service.
//!
//! [`GameStateClient`] speaks the bus protocol over any byte stream (TCP,
//! Unix socket, or an in-memory duplex in tests). One connection carries
//! both call replies and `Changed` signals; a background task routes
//! replies to their callers by serial and fans signals out to every
//! [`ChangeStream`].

pub mod client;
pub mod error;

pub use client::{ChangeStream, GameStateClient};
pub use error::{SdkError, SdkResult};

// Re-export key types
pub use gss_notify::ChangeEvent;
pub use gss_protocol::{BusAddress, Fault, FaultCode, WireValue};
pub use gss_types::{TypedValue, ValueKind};
