use serde::{Deserialize, Serialize};

use gss_types::{TypedValue, ValueResult};

use crate::fault::Fault;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// A typed value as it travels on the wire: a type tag plus raw payload.
///
/// The payload is not trusted until [`WireValue::decode`] has checked it
/// against the signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireValue {
    pub signature: String,
    pub data: Vec<u8>,
}

impl WireValue {
    pub fn new(signature: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            signature: signature.into(),
            data,
        }
    }

    /// Validate the payload against the signature.
    pub fn decode(&self) -> ValueResult<TypedValue> {
        TypedValue::decode(&self.signature, &self.data)
    }
}

impl From<&TypedValue> for WireValue {
    fn from(value: &TypedValue) -> Self {
        Self::new(value.signature(), value.encode())
    }
}

/// Methods a caller can invoke on the state object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    Get { key: String },
    Set { key: String, value: WireValue },
    /// Attach the calling connection to `Changed`. `None` means every key.
    Subscribe { keys: Option<Vec<String>> },
    Unsubscribe,
    Ping,
}

impl Method {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Get { .. } => "Get",
            Self::Set { .. } => "Set",
            Self::Subscribe { .. } => "Subscribe",
            Self::Unsubscribe => "Unsubscribe",
            Self::Ping => "Ping",
        }
    }
}

/// Outcome of a method call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyBody {
    Value(WireValue),
    Ack,
    Fault(Fault),
}

/// Signals emitted by the state object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalBody {
    Changed {
        key: String,
        value: WireValue,
        sequence: u64,
    },
}

/// All messages on the bus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusMessage {
    Call {
        serial: u32,
        path: String,
        interface: String,
        method: Method,
    },
    Reply {
        serial: u32,
        body: ReplyBody,
    },
    Signal {
        path: String,
        interface: String,
        signal: SignalBody,
    },
}

impl BusMessage {
    pub const CALL_TAG: u8 = 1;
    pub const REPLY_TAG: u8 = 2;
    pub const SIGNAL_TAG: u8 = 3;

    pub fn type_tag(&self) -> u8 {
        match self {
            Self::Call { .. } => Self::CALL_TAG,
            Self::Reply { .. } => Self::REPLY_TAG,
            Self::Signal { .. } => Self::SIGNAL_TAG,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Call { .. } => "Call",
            Self::Reply { .. } => "Reply",
            Self::Signal { .. } => "Signal",
        }
    }

    pub fn is_known_tag(tag: u8) -> bool {
        matches!(tag, Self::CALL_TAG | Self::REPLY_TAG | Self::SIGNAL_TAG)
    }
}
