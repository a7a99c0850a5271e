use std::fmt;

use serde::{Deserialize, Serialize};

/// Failure classes a reply can carry instead of a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultCode {
    /// `Get` on a key that was never set.
    KeyNotFound,
    /// The value's payload does not match its declared type tag.
    TypeMismatch,
    /// The key cannot name an entry (empty).
    InvalidKey,
    /// The call was addressed to an object path the service does not serve.
    UnknownObject,
    /// The call was addressed to an interface the object does not implement.
    UnknownInterface,
    /// Anything else went wrong inside the service.
    Internal,
}

impl FaultCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeyNotFound => "KeyNotFound",
            Self::TypeMismatch => "TypeMismatch",
            Self::InvalidKey => "InvalidKey",
            Self::UnknownObject => "UnknownObject",
            Self::UnknownInterface => "UnknownInterface",
            Self::Internal => "Internal",
        }
    }

    /// Dotted fault name scoped under an interface, e.g.
    /// `com.example.State.Error.KeyNotFound`.
    pub fn qualified_name(&self, interface: &str) -> String {
        format!("{interface}.Error.{}", self.as_str())
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A protocol-level error reply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    pub code: FaultCode,
    pub message: String,
}

impl Fault {
    pub fn new(code: FaultCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}
