use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// The closed set of value kinds a key can hold.
///
/// Each kind has a compact signature string used as its type tag on the
/// wire. The set is fixed; there is no way to register new kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    /// Boolean, signature `b`.
    Bool,
    /// Signed 64-bit integer, signature `x`.
    Int64,
    /// IEEE-754 double, signature `d`.
    Double,
    /// UTF-8 string, signature `s`.
    String,
    /// Ordered sequence of signed 64-bit integers, signature `ax`.
    IntSequence,
    /// Ordered sequence of UTF-8 strings, signature `as`.
    StringSequence,
}

impl ValueKind {
    /// All supported kinds, in tag order.
    pub const ALL: [ValueKind; 6] = [
        Self::Bool,
        Self::Int64,
        Self::Double,
        Self::String,
        Self::IntSequence,
        Self::StringSequence,
    ];

    /// The wire signature for this kind.
    pub const fn signature(&self) -> &'static str {
        match self {
            Self::Bool => "b",
            Self::Int64 => "x",
            Self::Double => "d",
            Self::String => "s",
            Self::IntSequence => "ax",
            Self::StringSequence => "as",
        }
    }

    /// Look up a kind by its wire signature.
    pub fn from_signature(signature: &str) -> Result<Self, ValueError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.signature() == signature)
            .ok_or_else(|| ValueError::UnknownSignature(signature.to_string()))
    }

    /// Human-readable kind name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bool => "boolean",
            Self::Int64 => "int64",
            Self::Double => "double",
            Self::String => "string",
            Self::IntSequence => "int64 sequence",
            Self::StringSequence => "string sequence",
        }
    }

    /// Returns `true` for the two sequence kinds.
    pub fn is_sequence(&self) -> bool {
        matches!(self, Self::IntSequence | Self::StringSequence)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.signature())
    }
}

impl FromStr for ValueKind {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_signature(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signatures_roundtrip() {
        for kind in ValueKind::ALL {
            assert_eq!(ValueKind::from_signature(kind.signature()).unwrap(), kind);
        }
    }

    #[test]
    fn signatures_unique() {
        let mut sigs: Vec<&str> = ValueKind::ALL.iter().map(|k| k.signature()).collect();
        sigs.sort();
        sigs.dedup();
        assert_eq!(sigs.len(), ValueKind::ALL.len());
    }

    #[test]
    fn unknown_signature_rejected() {
        let err = ValueKind::from_signature("ay").unwrap_err();
        assert_eq!(err, ValueError::UnknownSignature("ay".into()));
        assert!(ValueKind::from_signature("").is_err());
    }

    #[test]
    fn parse_via_from_str() {
        let kind: ValueKind = "as".parse().unwrap();
        assert_eq!(kind, ValueKind::StringSequence);
        assert!(kind.is_sequence());
        assert!(!ValueKind::Double.is_sequence());
    }

    #[test]
    fn display_is_signature() {
        assert_eq!(ValueKind::IntSequence.to_string(), "ax");
        assert_eq!(ValueKind::Bool.name(), "boolean");
    }
}
