//! Bus protocol for the GameState Service.
//!
//! Defines the message types exchanged between callers and the service
//! (method calls, replies, change signals), the fault codes carried by
//! failed replies, the default bus addressing, and the length-prefixed frame
//! codec used on the wire.

pub mod address;
pub mod codec;
pub mod error;
pub mod fault;
pub mod message;

pub use address::BusAddress;
pub use codec::BusCodec;
pub use error::{ProtocolError, ProtocolResult};
pub use fault::{Fault, FaultCode};
pub use message::{
    BusMessage, Method, ReplyBody, SignalBody, WireValue, MAX_FRAME_SIZE, PROTOCOL_VERSION,
};
