use std::cmp::Ordering;
use std::fmt;

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ValueError, ValueResult};
use crate::kind::ValueKind;

/// A value paired with its kind.
///
/// `TypedValue` is a closed sum type: the kind tag and the payload cannot
/// disagree because the variant *is* the tag. Values are immutable once
/// constructed; a store replaces them wholesale on every write.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum TypedValue {
    Bool(bool),
    Int64(i64),
    Double(f64),
    String(String),
    IntSequence(Vec<i64>),
    StringSequence(Vec<String>),
}

/// Payload codec: fixed-width integers, no trailing bytes.
fn payload_codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

fn decode_as<T: DeserializeOwned>(kind: ValueKind, data: &[u8]) -> ValueResult<T> {
    // Reads are bounded by the input length.
    payload_codec()
        .with_limit(data.len() as u64)
        .deserialize(data)
        .map_err(|e| ValueError::TypeMismatch {
            expected: kind.name(),
            reason: e.to_string(),
        })
}

impl TypedValue {
    /// The kind tag of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Int64(_) => ValueKind::Int64,
            Self::Double(_) => ValueKind::Double,
            Self::String(_) => ValueKind::String,
            Self::IntSequence(_) => ValueKind::IntSequence,
            Self::StringSequence(_) => ValueKind::StringSequence,
        }
    }

    /// The wire signature of this value's kind.
    pub fn signature(&self) -> &'static str {
        self.kind().signature()
    }

    /// Encode the payload for the wire. The kind travels separately as the
    /// signature; see [`TypedValue::decode`].
    pub fn encode(&self) -> Vec<u8> {
        // The encoder has no size limit, and plain scalars, strings and
        // length-prefixed vectors have no other way to fail.
        let codec = payload_codec();
        let encoded = match self {
            Self::Bool(v) => codec.serialize(v),
            Self::Int64(v) => codec.serialize(v),
            Self::Double(v) => codec.serialize(v),
            Self::String(v) => codec.serialize(v),
            Self::IntSequence(v) => codec.serialize(v),
            Self::StringSequence(v) => codec.serialize(v),
        };
        encoded.unwrap_or_default()
    }

    /// Decode a raw payload under the declared signature.
    ///
    /// Fails with a type mismatch when the signature is unknown or the bytes
    /// are not exactly one well-formed payload of that kind.
    pub fn decode(signature: &str, data: &[u8]) -> ValueResult<Self> {
        let kind = ValueKind::from_signature(signature)?;
        Self::decode_kind(kind, data)
    }

    /// Decode a raw payload under an already-resolved kind.
    pub fn decode_kind(kind: ValueKind, data: &[u8]) -> ValueResult<Self> {
        Ok(match kind {
            ValueKind::Bool => Self::Bool(decode_as(kind, data)?),
            ValueKind::Int64 => Self::Int64(decode_as(kind, data)?),
            ValueKind::Double => Self::Double(decode_as(kind, data)?),
            ValueKind::String => Self::String(decode_as(kind, data)?),
            ValueKind::IntSequence => Self::IntSequence(decode_as(kind, data)?),
            ValueKind::StringSequence => Self::StringSequence(decode_as(kind, data)?),
        })
    }

    /// Parse a textual representation under the given kind.
    ///
    /// Sequences are comma-separated; an empty input is the empty sequence.
    /// String elements are taken verbatim, integer elements are trimmed.
    pub fn parse(kind: ValueKind, text: &str) -> ValueResult<Self> {
        let mismatch = |reason: String| ValueError::TypeMismatch {
            expected: kind.name(),
            reason,
        };
        Ok(match kind {
            ValueKind::Bool => match text.trim() {
                "true" => Self::Bool(true),
                "false" => Self::Bool(false),
                other => return Err(mismatch(format!("expected true or false, got {other:?}"))),
            },
            ValueKind::Int64 => {
                Self::Int64(text.trim().parse().map_err(|e| mismatch(format!("{e}")))?)
            }
            ValueKind::Double => {
                Self::Double(text.trim().parse().map_err(|e| mismatch(format!("{e}")))?)
            }
            ValueKind::String => Self::String(text.to_string()),
            ValueKind::IntSequence => {
                if text.trim().is_empty() {
                    return Ok(Self::IntSequence(Vec::new()));
                }
                let items = text
                    .split(',')
                    .map(|item| item.trim().parse::<i64>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| mismatch(format!("{e}")))?;
                Self::IntSequence(items)
            }
            ValueKind::StringSequence => {
                if text.is_empty() {
                    return Ok(Self::StringSequence(Vec::new()));
                }
                Self::StringSequence(text.split(',').map(str::to_string).collect())
            }
        })
    }
}

impl PartialEq for TypedValue {
    /// Structural equality. Doubles compare by total order, so a `NaN`
    /// payload equals itself.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int64(a), Self::Int64(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a.total_cmp(b) == Ordering::Equal,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::IntSequence(a), Self::IntSequence(b)) => a == b,
            (Self::StringSequence(a), Self::StringSequence(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for TypedValue {}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::IntSequence(v) => write!(f, "{v:?}"),
            Self::StringSequence(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<bool> for TypedValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for TypedValue {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<f64> for TypedValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<String> for TypedValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for TypedValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<Vec<i64>> for TypedValue {
    fn from(v: Vec<i64>) -> Self {
        Self::IntSequence(v)
    }
}

impl From<Vec<String>> for TypedValue {
    fn from(v: Vec<String>) -> Self {
        Self::StringSequence(v)
    }
}
