//! Key material handles. Everything here is zeroized on drop and redacted
//! from `Debug` output.

use zeroize::Zeroize;

use crate::consts::{KEY_BYTES, USERCRED_BYTES};
use crate::error::{CipherError, CipherResult};

/// A 256-bit key derived from a salt (cipher, signing, or hint key).
#[derive(Clone)]
pub struct DerivedKey {
    bytes: [u8; KEY_BYTES],
}

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_BYTES]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_BYTES] {
        &self.bytes
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// The 32-byte site-bound secret supplied by the credential layer.
#[derive(Clone)]
pub struct UserCred {
    bytes: [u8; USERCRED_BYTES],
}

impl UserCred {
    pub fn from_bytes(bytes: [u8; USERCRED_BYTES]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; USERCRED_BYTES] {
        &self.bytes
    }
}

impl TryFrom<&[u8]> for UserCred {
    type Error = CipherError;

    fn try_from(bytes: &[u8]) -> CipherResult<Self> {
        let bytes: [u8; USERCRED_BYTES] = bytes.try_into().map_err(|_| {
            CipherError::invalid(format!(
                "userCred must be {USERCRED_BYTES} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self { bytes })
    }
}

impl Drop for UserCred {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for UserCred {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCred")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
