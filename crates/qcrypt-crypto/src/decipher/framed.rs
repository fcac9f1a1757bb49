//! V4 and V5: a sequence of `header ‖ payload` frames.
//!
//! Both share one header layout. V4 has a four-byte size field whose top
//! byte sits where V5 keeps its flags; payloads never exceed three bytes
//! of size, so that byte is always zero and both versions sign the same
//! six header bytes. Only V5 chains the previous MAC into the next.

use bytes::Bytes;

use super::{Block0, BlockN, Format};
use crate::additional_data::AdditionalData;
use crate::codec::Extractor;
use crate::consts::MAC_BYTES;
use crate::error::{CipherError, CipherResult};
use crate::kdf::{derive_hint_key, derive_signing_key};
use crate::keys::{DerivedKey, UserCred};
use crate::mac::{block_mac, verify};
use crate::types::CipherDataInfo;

#[derive(Debug)]
pub(crate) struct FrameHeader {
    pub mac: [u8; MAC_BYTES],
    pub size: usize,
    pub flags: u8,
}

pub(crate) fn parse_header(format: Format, header: &[u8]) -> CipherResult<FrameHeader> {
    let mut ex = Extractor::new(header);
    let mac = ex.mac()?;
    let ver = ex.ver()?;
    if ver != format.version() {
        return Err(CipherError::ProtocolVersion(ver));
    }
    let size = ex.size()?;
    let flags = match format {
        Format::V5 => ex.flags()?,
        _ => {
            if ex.remainder("size")? != [0] {
                return Err(CipherError::malformed("size", "V4 payload size above 3 bytes"));
            }
            0
        }
    };
    Ok(FrameHeader { mac, size, flags })
}

/// Split a payload at the end of its additional data. The encrypted part
/// always holds at least an authentication tag, so it cannot be empty.
fn split_payload(payload: &Bytes, ad_len: usize) -> CipherResult<(Bytes, Bytes)> {
    if ad_len >= payload.len() {
        return Err(CipherError::malformed("edata", "no encrypted data"));
    }
    Ok((payload.slice(..ad_len), payload.slice(ad_len..)))
}

pub(crate) fn decode_block0(
    format: Format,
    header: &[u8],
    frame: &FrameHeader,
    payload: Bytes,
    user_cred: &UserCred,
) -> CipherResult<Block0> {
    let (ad, ad_len) = AdditionalData::decode_block0(&payload)?;
    let (additional_data, encrypted_data) = split_payload(&payload, ad_len)?;
    let (Some(slt), Some(ic), Some(lpp)) = (ad.slt, ad.ic, ad.lpp) else {
        return Err(CipherError::malformed("additional data", "block0 fields missing"));
    };

    let signing_key = derive_signing_key(user_cred, &slt)?;
    let mac = block_mac(
        &signing_key,
        &header[MAC_BYTES..],
        &additional_data,
        &encrypted_data,
        &[],
    )?;
    verify(&frame.mac, &mac)?;

    let hint = match ad.encrypted_hint.as_deref() {
        Some(encrypted) if !encrypted.is_empty() => {
            let hint_key = derive_hint_key(ad.alg, user_cred, &slt)?;
            let clear = ad.alg.open(&hint_key, &ad.iv, encrypted, &[])?;
            Some(String::from_utf8_lossy(&clear).into_owned())
        }
        _ => None,
    };

    Ok(Block0 {
        info: CipherDataInfo {
            ver: format.version(),
            alg: ad.alg,
            ic,
            lp: lpp.lp,
            lp_end: lpp.lp_end,
            iv: ad.iv,
            slt,
            hint,
        },
        signing_key,
        mac,
        flags: frame.flags,
        additional_data,
        encrypted_data,
    })
}

/// Verify a continuation frame. `previous` is the prior block's MAC for
/// chained formats and empty otherwise.
pub(crate) fn decode_block_n(
    header: &[u8],
    frame: &FrameHeader,
    payload: Bytes,
    signing_key: &DerivedKey,
    previous: &[u8],
) -> CipherResult<BlockN> {
    let (ad, ad_len) = AdditionalData::decode_block_n(&payload)?;
    let (additional_data, encrypted_data) = split_payload(&payload, ad_len)?;

    let mac = block_mac(
        signing_key,
        &header[MAC_BYTES..],
        &additional_data,
        &encrypted_data,
        previous,
    )?;
    verify(&frame.mac, &mac)?;

    Ok(BlockN {
        alg: ad.alg,
        iv: Bytes::from(ad.iv),
        mac,
        flags: frame.flags,
        additional_data,
        encrypted_data,
    })
}
