use thiserror::Error;

use gss_protocol::{Fault, FaultCode};

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("service fault: {0}")]
    Fault(Fault),

    #[error("unexpected reply to {method}: {reply}")]
    UnexpectedReply { method: &'static str, reply: String },

    #[error("connection to the service is closed")]
    Disconnected,

    #[error("value error: {0}")]
    Value(#[from] gss_types::ValueError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SdkError {
    /// The fault code, if the service rejected the call.
    pub fn fault_code(&self) -> Option<FaultCode> {
        match self {
            Self::Fault(fault) => Some(fault.code),
            _ => None,
        }
    }

    pub fn is_key_not_found(&self) -> bool {
        self.fault_code() == Some(FaultCode::KeyNotFound)
    }

    pub fn is_type_mismatch(&self) -> bool {
        self.fault_code() == Some(FaultCode::TypeMismatch)
    }
}

pub type SdkResult<T> = Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_service_faults_carry_a_code() {
        let fault = SdkError::Fault(Fault::new(FaultCode::KeyNotFound, "SAMPLE_NOTFOUND"));
        assert_eq!(fault.fault_code(), Some(FaultCode::KeyNotFound));
        assert!(fault.is_key_not_found());
        assert!(!fault.is_type_mismatch());

        let io = SdkError::from(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"));
        assert_eq!(io.fault_code(), None);
        assert_eq!(SdkError::Disconnected.fault_code(), None);
    }
}
