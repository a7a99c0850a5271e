use thiserror::Error;

use gss_protocol::{Fault, FaultCode};
use gss_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("unknown object path: {0}")]
    UnknownObject(String),

    #[error("unknown interface: {0}")]
    UnknownInterface(String),

    #[error("value error: {0}")]
    Value(#[from] gss_types::ValueError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// The fault code this error is reported as on the bus.
    pub fn fault_code(&self) -> FaultCode {
        match self {
            Self::UnknownObject(_) => FaultCode::UnknownObject,
            Self::UnknownInterface(_) => FaultCode::UnknownInterface,
            Self::Value(_) => FaultCode::TypeMismatch,
            Self::Store(StoreError::KeyNotFound(_)) => FaultCode::KeyNotFound,
            Self::Store(StoreError::InvalidKey { .. }) => FaultCode::InvalidKey,
            Self::Store(StoreError::LockPoisoned(_))
            | Self::Config(_)
            | Self::Io(_)
            | Self::Internal(_) => FaultCode::Internal,
        }
    }

    pub fn to_fault(&self) -> Fault {
        Fault::new(self.fault_code(), self.to_string())
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_faults() {
        let err = ServerError::from(StoreError::KeyNotFound("SAMPLE_NOTFOUND".into()));
        let fault = err.to_fault();
        assert_eq!(fault.code, FaultCode::KeyNotFound);
        assert!(fault.message.contains("SAMPLE_NOTFOUND"));

        let err = ServerError::from(StoreError::InvalidKey {
            key: String::new(),
            reason: "empty".into(),
        });
        assert_eq!(err.fault_code(), FaultCode::InvalidKey);
    }

    #[test]
    fn value_errors_are_type_mismatches() {
        let err = ServerError::from(gss_types::ValueError::UnknownSignature("q".into()));
        assert_eq!(err.fault_code(), FaultCode::TypeMismatch);
    }

    #[test]
    fn everything_else_is_internal() {
        assert_eq!(ServerError::Internal("x".into()).fault_code(), FaultCode::Internal);
        assert_eq!(
            ServerError::from(StoreError::LockPoisoned("x".into())).fault_code(),
            FaultCode::Internal
        );
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "busy");
        assert_eq!(ServerError::from(io).fault_code(), FaultCode::Internal);
    }
}
