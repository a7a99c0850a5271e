use std::fmt;

use serde::{Deserialize, Serialize};

use gss_types::TypedValue;

/// A single applied write, as seen by subscribers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Store-wide sequence number of the write, strictly increasing.
    pub sequence: u64,
    /// The key that was written.
    pub key: String,
    /// The value the key now holds.
    pub value: TypedValue,
}

impl ChangeEvent {
    pub fn new(sequence: u64, key: impl Into<String>, value: TypedValue) -> Self {
        Self {
            sequence,
            key: key.into(),
            value,
        }
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} = {}", self.sequence, self.key, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_sequence_key_and_value() {
        let event = ChangeEvent::new(3, "SAMPLE_002", TypedValue::Int64(10));
        assert_eq!(event.to_string(), "#3 SAMPLE_002 = 10");
    }
}
