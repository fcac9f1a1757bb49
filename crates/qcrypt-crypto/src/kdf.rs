//! Key derivation: three independent keys per salt.
//!
//! ```text
//! password ‖ userCred ──PBKDF2-HMAC-SHA512(salt, ic)──▶ cipher key
//! userCred ──HKDF-SHA512(salt, "cipherdata signing key")──▶ signing key
//! userCred ──HKDF-SHA512(salt, "hint encryption key")────▶ hint key
//! ```
//!
//! The info strings are part of the wire format and must never change.

use hkdf::Hkdf;
use hmac::Hmac;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha512;
use tracing::debug;
use zeroize::Zeroizing;

use crate::alg::Algorithm;
use crate::consts::{ICOUNT_MAX, ICOUNT_MIN, KEY_BYTES, SLT_BYTES};
use crate::error::{CipherError, CipherResult};
use crate::keys::{DerivedKey, UserCred};

const SIGNING_KEY_INFO: &[u8] = b"cipherdata signing key";
const HINT_KEY_INFO: &[u8] = b"hint encryption key";

pub(crate) fn check_ic(ic: u32) -> CipherResult<()> {
    if !(ICOUNT_MIN..=ICOUNT_MAX).contains(&ic) {
        return Err(CipherError::invalid(format!(
            "iteration count {ic} outside [{ICOUNT_MIN}, {ICOUNT_MAX}]"
        )));
    }
    Ok(())
}

fn check_salt(slt: &[u8]) -> CipherResult<()> {
    if slt.len() != SLT_BYTES {
        return Err(CipherError::invalid(format!(
            "salt must be {SLT_BYTES} bytes, got {}",
            slt.len()
        )));
    }
    Ok(())
}

/// Derive the data encryption key from the password and userCred.
///
/// CPU bound: at the default iteration count this takes on the order of a
/// second. Use [`derive_cipher_key_blocking`] from async code.
pub fn derive_cipher_key(
    alg: Algorithm,
    ic: u32,
    password: &SecretString,
    user_cred: &UserCred,
    slt: &[u8],
) -> CipherResult<DerivedKey> {
    check_ic(ic)?;
    check_salt(slt)?;
    let password = password.expose_secret();
    if password.is_empty() {
        return Err(CipherError::invalid("password must not be empty"));
    }

    let mut material = Zeroizing::new(Vec::with_capacity(password.len() + user_cred.as_bytes().len()));
    material.extend_from_slice(password.as_bytes());
    material.extend_from_slice(user_cred.as_bytes());

    let mut okm = [0u8; KEY_BYTES];
    pbkdf2::pbkdf2::<Hmac<Sha512>>(&material, slt, ic, &mut okm)
        .map_err(|e| CipherError::invalid(format!("PBKDF2 failed: {e}")))?;

    debug!(alg = %alg, ic, "derived cipher key");
    Ok(DerivedKey::from_bytes(okm))
}

/// [`derive_cipher_key`] on tokio's blocking pool.
pub async fn derive_cipher_key_blocking(
    alg: Algorithm,
    ic: u32,
    password: SecretString,
    user_cred: UserCred,
    slt: [u8; SLT_BYTES],
) -> CipherResult<DerivedKey> {
    // Validate up front so bad arguments never reach the pool.
    check_ic(ic)?;
    if password.expose_secret().is_empty() {
        return Err(CipherError::invalid("password must not be empty"));
    }
    tokio::task::spawn_blocking(move || derive_cipher_key(alg, ic, &password, &user_cred, &slt))
        .await
        .map_err(|e| CipherError::Io(std::io::Error::other(e)))?
}

/// Key for the per-block MAC.
pub fn derive_signing_key(user_cred: &UserCred, slt: &[u8]) -> CipherResult<DerivedKey> {
    hkdf_derive(user_cred, slt, SIGNING_KEY_INFO)
}

/// Key for the encrypted hint. The size is fixed whatever `alg` is.
pub fn derive_hint_key(alg: Algorithm, user_cred: &UserCred, slt: &[u8]) -> CipherResult<DerivedKey> {
    let key = hkdf_derive(user_cred, slt, HINT_KEY_INFO)?;
    debug!(alg = %alg, "derived hint key");
    Ok(key)
}

fn hkdf_derive(user_cred: &UserCred, slt: &[u8], info: &[u8]) -> CipherResult<DerivedKey> {
    check_salt(slt)?;
    let hkdf = Hkdf::<Sha512>::new(Some(slt), user_cred.as_bytes());
    let mut okm = [0u8; KEY_BYTES];
    hkdf.expand(info, &mut okm)
        .map_err(|e| CipherError::invalid(format!("HKDF expand failed: {e}")))?;
    Ok(DerivedKey::from_bytes(okm))
}
