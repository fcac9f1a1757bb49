use std::io;

use thiserror::Error;

use crate::state::CipherState;

pub type CipherResult<T> = Result<T, CipherError>;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("malformed {field}: {reason}")]
    MalformedField { field: &'static str, reason: String },

    #[error("unsupported protocol version: {0}")]
    ProtocolVersion(u16),

    #[error("{what} length mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid MAC")]
    IntegrityFailure,

    /// Wrong password, wrong userCred, or ciphertext altered after a valid MAC.
    #[error("decryption failed")]
    CryptoOperationFailure,

    #[error("invalid state: {operation} not allowed in state {state:?}")]
    StateViolation {
        state: CipherState,
        operation: &'static str,
    },

    #[error("missing terminal data block")]
    MissingTerminal,

    #[error("terminal block already read")]
    ExtraTerminal,

    #[error("process cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl CipherError {
    pub(crate) fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedField {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }
}

/// Nested loop passes talk to each other through `AsyncRead`, so a
/// `CipherError` raised inside an inner pass arrives wrapped in an
/// `io::Error`. Unwrap it back into the typed error.
impl From<io::Error> for CipherError {
    fn from(err: io::Error) -> Self {
        let wraps_cipher_error = err
            .get_ref()
            .is_some_and(|inner| inner.is::<CipherError>());
        if !wraps_cipher_error {
            return CipherError::Io(err);
        }
        match err.into_inner().map(|inner| inner.downcast::<CipherError>()) {
            Some(Ok(cipher_err)) => *cipher_err,
            Some(Err(other)) => CipherError::Io(io::Error::other(other)),
            None => CipherError::Io(io::Error::other("empty wrapped error")),
        }
    }
}

impl From<CipherError> for io::Error {
    fn from(err: CipherError) -> Self {
        match err {
            CipherError::Io(inner) => inner,
            other => io::Error::other(other),
        }
    }
}
