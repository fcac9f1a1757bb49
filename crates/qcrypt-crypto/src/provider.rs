//! Lazy password supply.
//!
//! The engine asks for a password once per pass, after it knows the block0
//! metadata. When decrypting, that metadata (including the hint) has
//! already passed MAC verification.

use std::future::Future;

use secrecy::SecretString;

use crate::error::CipherResult;
use crate::types::CipherDataInfo;

#[derive(Debug)]
pub struct Credentials {
    pub password: SecretString,
    /// Only read when encrypting.
    pub hint: Option<String>,
}

impl Credentials {
    pub fn new(password: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            password: SecretString::from(password.into()),
            hint,
        }
    }
}

pub trait PasswordProvider: Send + Sync {
    /// Return credentials for the pass described by `info`, or
    /// [`CipherError::Cancelled`](crate::CipherError::Cancelled).
    fn password(&self, info: &CipherDataInfo) -> impl Future<Output = CipherResult<Credentials>> + Send;
}

impl<F, Fut> PasswordProvider for F
where
    F: Fn(CipherDataInfo) -> Fut + Send + Sync,
    Fut: Future<Output = CipherResult<Credentials>> + Send,
{
    fn password(&self, info: &CipherDataInfo) -> impl Future<Output = CipherResult<Credentials>> + Send {
        self(info.clone())
    }
}
