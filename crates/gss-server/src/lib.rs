//! Bus service for the GameState Service.
//!
//! Hosts a single typed state store behind a local socket. Callers issue
//! `Get`/`Set` calls and may subscribe to `Changed` signals; every applied
//! `Set` is signalled to all attached subscribers, including the caller that
//! made it.
//!
//! The [`RequestHandler`] knows nothing about sockets: it maps calls to
//! store operations and errors to fault replies. A [`Session`] adapts one
//! connection onto the handler and the change notifier, and
//! [`GameStateService`] accepts connections on TCP or Unix sockets.

pub mod config;
pub mod error;
pub mod handler;
pub mod server;
pub mod session;

pub use config::{ListenAddr, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use handler::{Outcome, RequestHandler};
pub use server::GameStateService;
pub use session::Session;
