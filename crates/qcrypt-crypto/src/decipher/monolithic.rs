//! V1: the whole stream is one HMAC-signed message.
//!
//! ```text
//! mac(32) alg(2) iv(n) slt(16) ic(4) ver(2)=1 hintLen(1) hint edata
//!         └──────────── additional data ───────────────┘
//! ```
//!
//! There is no loop support, so every V1 message is pass 1 of 1.

use bytes::Bytes;

use super::Block0;
use crate::codec::Extractor;
use crate::consts::{MAC_BYTES, PAYLOAD_SIZE_MIN, VERSION1};
use crate::error::{CipherError, CipherResult};
use crate::kdf::{derive_hint_key, derive_signing_key};
use crate::keys::UserCred;
use crate::mac::{message_mac, verify};
use crate::types::CipherDataInfo;

pub(crate) fn decode_block0(message: Bytes, user_cred: &UserCred) -> CipherResult<Block0> {
    if message.len() < PAYLOAD_SIZE_MIN {
        return Err(CipherError::malformed(
            "size",
            format!("{} bytes is below {PAYLOAD_SIZE_MIN}", message.len()),
        ));
    }

    let mut ex = Extractor::new(&message);
    let mac = ex.mac()?;
    let alg = ex.alg()?;
    let iv = ex.iv()?.to_vec();
    let slt = ex.slt()?;
    let ic = ex.ic()?;
    let ver = ex.ver()?;
    if ver != VERSION1 {
        return Err(CipherError::ProtocolVersion(ver));
    }
    let encrypted_hint = ex.hint()?.to_vec();
    let ad_end = ex.offset();
    ex.remainder("edata")?;

    let additional_data = message.slice(MAC_BYTES..ad_end);
    let encrypted_data = message.slice(ad_end..);

    let signing_key = derive_signing_key(user_cred, &slt)?;
    let computed = message_mac(&signing_key, &additional_data, &encrypted_data)?;
    verify(&mac, &computed)?;

    let hint = if encrypted_hint.is_empty() {
        None
    } else {
        let hint_key = derive_hint_key(alg, user_cred, &slt)?;
        let clear = alg.open(&hint_key, &iv, &encrypted_hint, &[])?;
        Some(String::from_utf8_lossy(&clear).into_owned())
    };

    Ok(Block0 {
        info: CipherDataInfo {
            ver: VERSION1,
            alg,
            ic,
            lp: 1,
            lp_end: 1,
            iv,
            slt,
            hint,
        },
        signing_key,
        mac,
        flags: 0,
        additional_data,
        encrypted_data,
    })
}
