use thiserror::Error;

/// Errors produced while decoding or parsing typed values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// The declared type tag is not one of the supported signatures.
    #[error("type mismatch: unknown signature {0:?}")]
    UnknownSignature(String),

    /// The raw payload cannot be interpreted under the declared tag.
    #[error("type mismatch: payload is not a valid {expected}: {reason}")]
    TypeMismatch { expected: &'static str, reason: String },
}

/// Result alias for value operations.
pub type ValueResult<T> = Result<T, ValueError>;
