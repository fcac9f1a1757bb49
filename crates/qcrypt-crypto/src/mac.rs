//! Block signatures.
//!
//! V4/V5 blocks use keyed BLAKE2b with a 32-byte digest; V1 messages use
//! HMAC-SHA256. Both are keyed with the HKDF signing key.

use blake2::digest::consts::U32;
use blake2::Blake2bMac;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::consts::MAC_BYTES;
use crate::error::{CipherError, CipherResult};
use crate::keys::DerivedKey;

type Blake2bMac256 = Blake2bMac<U32>;

/// MAC over `signed_header ‖ additional_data ‖ encrypted_data ‖ previous`.
///
/// `signed_header` is the header minus its MAC field (V5) or the V4
/// equivalent; `previous` is empty for block0 and for V4.
pub(crate) fn block_mac(
    signing_key: &DerivedKey,
    signed_header: &[u8],
    additional_data: &[u8],
    encrypted_data: &[u8],
    previous: &[u8],
) -> CipherResult<[u8; MAC_BYTES]> {
    let mut mac = <Blake2bMac256 as Mac>::new_from_slice(signing_key.as_bytes())
        .map_err(|e| CipherError::invalid(format!("BLAKE2b key: {e}")))?;
    mac.update(signed_header);
    mac.update(additional_data);
    mac.update(encrypted_data);
    mac.update(previous);
    Ok(mac.finalize().into_bytes().into())
}

/// HMAC-SHA256 over `additional_data ‖ encrypted_data`.
pub(crate) fn message_mac(
    signing_key: &DerivedKey,
    additional_data: &[u8],
    encrypted_data: &[u8],
) -> CipherResult<[u8; MAC_BYTES]> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(signing_key.as_bytes())
        .map_err(|e| CipherError::invalid(format!("HMAC key: {e}")))?;
    mac.update(additional_data);
    mac.update(encrypted_data);
    Ok(mac.finalize().into_bytes().into())
}

/// Constant-time comparison; a mismatch is an integrity failure.
pub(crate) fn verify(expected: &[u8], computed: &[u8]) -> CipherResult<()> {
    if bool::from(expected.ct_eq(computed)) {
        Ok(())
    } else {
        Err(CipherError::IntegrityFailure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> DerivedKey {
        DerivedKey::from_bytes([byte; 32])
    }

    #[test]
    fn test_block_mac_is_keyed() {
        let a = block_mac(&key(1), b"hdr", b"ad", b"ed", b"").unwrap();
        let b = block_mac(&key(2), b"hdr", b"ad", b"ed", b"").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_block_mac_covers_previous() {
        let first = block_mac(&key(1), b"hdr", b"ad", b"ed", b"").unwrap();
        let chained = block_mac(&key(1), b"hdr", b"ad", b"ed", &first).unwrap();
        assert_ne!(first, chained);
    }

    #[test]
    fn test_block_mac_is_concatenation() {
        // Field boundaries are not encoded; only the byte sequence matters.
        let a = block_mac(&key(1), b"h", b"ead", b"ed", b"").unwrap();
        let b = block_mac(&key(1), b"he", b"ad", b"ed", b"").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_message_mac_differs_from_block_mac() {
        let m = message_mac(&key(1), b"ad", b"ed").unwrap();
        let b = block_mac(&key(1), b"", b"ad", b"ed", b"").unwrap();
        assert_ne!(m, b);
    }

    #[test]
    fn test_verify() {
        let mac = block_mac(&key(1), b"h", b"a", b"e", b"").unwrap();
        assert!(verify(&mac, &mac).is_ok());
        let mut bad = mac;
        bad[0] ^= 1;
        assert!(matches!(verify(&mac, &bad), Err(CipherError::IntegrityFailure)));
        assert!(verify(&mac, &mac[..31]).is_err());
    }
}
