//! Supported AEAD algorithms and their wire ids.
//!
//! | name        | id | iv | tag | layout               |
//! |-------------|----|----|-----|----------------------|
//! | `AES-GCM`   | 1  | 12 | 16  | ciphertext ‖ tag     |
//! | `X20-PLY`   | 2  | 24 | 16  | ciphertext ‖ tag     |
//! | `AEGIS-256` | 3  | 32 | 32  | ciphertext ‖ tag     |

use std::fmt;
use std::str::FromStr;

use aegis::aegis256::Aegis256;
use aes_gcm::Aes256Gcm;
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use serde::{Serialize, Serializer};

use crate::error::{CipherError, CipherResult};
use crate::keys::DerivedKey;

const AEGIS_256_TAG_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    AesGcm,
    XChaCha20Poly1305,
    Aegis256,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [
        Algorithm::AesGcm,
        Algorithm::XChaCha20Poly1305,
        Algorithm::Aegis256,
    ];

    pub fn id(self) -> u16 {
        match self {
            Algorithm::AesGcm => 1,
            Algorithm::XChaCha20Poly1305 => 2,
            Algorithm::Aegis256 => 3,
        }
    }

    pub fn from_id(id: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|alg| alg.id() == id)
    }

    /// Short wire-compatible name, e.g. `X20-PLY`.
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::AesGcm => "AES-GCM",
            Algorithm::XChaCha20Poly1305 => "X20-PLY",
            Algorithm::Aegis256 => "AEGIS-256",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Algorithm::AesGcm => "AES 256 Galois Counter Mode",
            Algorithm::XChaCha20Poly1305 => "XChaCha20 Poly1305",
            Algorithm::Aegis256 => "AEGIS 256",
        }
    }

    pub fn iv_bytes(self) -> usize {
        match self {
            Algorithm::AesGcm => 12,
            Algorithm::XChaCha20Poly1305 => 24,
            Algorithm::Aegis256 => 32,
        }
    }

    pub fn tag_bytes(self) -> usize {
        match self {
            Algorithm::AesGcm | Algorithm::XChaCha20Poly1305 => 16,
            Algorithm::Aegis256 => AEGIS_256_TAG_BYTES,
        }
    }

    /// Encrypt `clear`, binding `aad`. Output is `ciphertext ‖ tag`.
    pub fn seal(self, key: &DerivedKey, iv: &[u8], clear: &[u8], aad: &[u8]) -> CipherResult<Vec<u8>> {
        let iv = self.nonce(iv)?;
        match self {
            Algorithm::AesGcm => {
                let cipher = Aes256Gcm::new(key.as_bytes().into());
                cipher
                    .encrypt(aes_gcm::Nonce::from_slice(iv), Payload { msg: clear, aad })
                    .map_err(|_| CipherError::CryptoOperationFailure)
            }
            Algorithm::XChaCha20Poly1305 => {
                let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
                cipher
                    .encrypt(XNonce::from_slice(iv), Payload { msg: clear, aad })
                    .map_err(|_| CipherError::CryptoOperationFailure)
            }
            Algorithm::Aegis256 => {
                let nonce = aegis_nonce(iv)?;
                let (mut sealed, tag) =
                    Aegis256::<AEGIS_256_TAG_BYTES>::new(key.as_bytes(), nonce).encrypt(clear, aad);
                sealed.extend_from_slice(&tag);
                Ok(sealed)
            }
        }
    }

    /// Decrypt `ciphertext ‖ tag`. Any failure is reported as the opaque
    /// [`CipherError::CryptoOperationFailure`].
    pub fn open(self, key: &DerivedKey, iv: &[u8], sealed: &[u8], aad: &[u8]) -> CipherResult<Vec<u8>> {
        let iv = self.nonce(iv)?;
        if sealed.len() < self.tag_bytes() {
            return Err(CipherError::CryptoOperationFailure);
        }
        match self {
            Algorithm::AesGcm => {
                let cipher = Aes256Gcm::new(key.as_bytes().into());
                cipher
                    .decrypt(aes_gcm::Nonce::from_slice(iv), Payload { msg: sealed, aad })
                    .map_err(|_| CipherError::CryptoOperationFailure)
            }
            Algorithm::XChaCha20Poly1305 => {
                let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
                cipher
                    .decrypt(XNonce::from_slice(iv), Payload { msg: sealed, aad })
                    .map_err(|_| CipherError::CryptoOperationFailure)
            }
            Algorithm::Aegis256 => {
                let nonce = aegis_nonce(iv)?;
                let (ciphertext, tag) = sealed.split_at(sealed.len() - AEGIS_256_TAG_BYTES);
                let tag: &[u8; AEGIS_256_TAG_BYTES] = tag
                    .try_into()
                    .map_err(|_| CipherError::CryptoOperationFailure)?;
                Aegis256::<AEGIS_256_TAG_BYTES>::new(key.as_bytes(), nonce)
                    .decrypt(ciphertext, tag, aad)
                    .map_err(|_| CipherError::CryptoOperationFailure)
            }
        }
    }

    /// The nonce actually fed to the primitive. Only the first
    /// `iv_bytes()` of a longer iv are used.
    fn nonce(self, iv: &[u8]) -> CipherResult<&[u8]> {
        iv.get(..self.iv_bytes()).ok_or_else(|| {
            CipherError::invalid(format!(
                "{} needs a {} byte iv, got {}",
                self.name(),
                self.iv_bytes(),
                iv.len()
            ))
        })
    }
}

fn aegis_nonce(iv: &[u8]) -> CipherResult<&[u8; 32]> {
    iv.try_into()
        .map_err(|_| CipherError::invalid("AEGIS-256 needs a 32 byte iv"))
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = CipherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CipherError::invalid(format!("unknown algorithm: {s}")))
    }
}

impl Serialize for Algorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}
