//! Authenticated, unencrypted per-block metadata.
//!
//! ```text
//! block0: alg(2) iv(n) slt(16) ic(4) lpp(1) hintLen(1) hint(hintLen)
//! blockN: alg(2) iv(n)
//! ```
//!
//! The field order is part of the wire format.

use crate::alg::Algorithm;
use crate::codec::{Extractor, LoopPosition, Packer};
use crate::consts::{
    ALG_BYTES, ENCRYPTED_HINT_MAX_BYTES, HINT_LEN_BYTES, IC_BYTES, LPP_BYTES, SLT_BYTES,
};
use crate::error::{CipherError, CipherResult};
use crate::kdf::check_ic;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdditionalData {
    pub alg: Algorithm,
    pub iv: Vec<u8>,
    pub slt: Option<[u8; SLT_BYTES]>,
    pub ic: Option<u32>,
    pub lpp: Option<LoopPosition>,
    pub encrypted_hint: Option<Vec<u8>>,
}

impl AdditionalData {
    /// Metadata for a continuation block.
    pub fn block_n(alg: Algorithm, iv: &[u8]) -> Self {
        Self {
            alg,
            iv: iv.to_vec(),
            slt: None,
            ic: None,
            lpp: None,
            encrypted_hint: None,
        }
    }

    /// Metadata for the first block of a pass.
    pub fn block0(
        alg: Algorithm,
        iv: &[u8],
        slt: [u8; SLT_BYTES],
        ic: u32,
        lpp: LoopPosition,
        encrypted_hint: Vec<u8>,
    ) -> Self {
        Self {
            alg,
            iv: iv.to_vec(),
            slt: Some(slt),
            ic: Some(ic),
            lpp: Some(lpp),
            encrypted_hint: Some(encrypted_hint),
        }
    }

    pub fn validate(&self) -> CipherResult<()> {
        if self.iv.len() != self.alg.iv_bytes() {
            return Err(CipherError::malformed(
                "iv",
                format!("{} needs {} bytes, got {}", self.alg, self.alg.iv_bytes(), self.iv.len()),
            ));
        }
        match (self.slt, self.ic) {
            (Some(_), None) => return Err(CipherError::invalid("salt present without iteration count")),
            (None, Some(_)) => return Err(CipherError::invalid("iteration count present without salt")),
            (Some(_), Some(ic)) => check_ic(ic)?,
            (None, None) => {}
        }
        if let Some(lpp) = self.lpp {
            LoopPosition::new(lpp.lp, lpp.lp_end)?;
        }
        if let Some(hint) = &self.encrypted_hint {
            if hint.len() > ENCRYPTED_HINT_MAX_BYTES {
                return Err(CipherError::malformed(
                    "hint",
                    format!("{} bytes exceeds {ENCRYPTED_HINT_MAX_BYTES}", hint.len()),
                ));
            }
        }
        Ok(())
    }

    pub fn encoded_len(&self) -> usize {
        ALG_BYTES
            + self.iv.len()
            + self.slt.map_or(0, |_| SLT_BYTES)
            + self.ic.map_or(0, |_| IC_BYTES)
            + self.lpp.map_or(0, |_| LPP_BYTES)
            + self
                .encrypted_hint
                .as_ref()
                .map_or(0, |h| HINT_LEN_BYTES + h.len())
    }

    pub fn encode(&self) -> CipherResult<Vec<u8>> {
        self.validate()?;

        let mut packer = Packer::new(self.encoded_len());
        packer.alg(self.alg)?;
        packer.iv(self.alg, &self.iv)?;
        if let (Some(slt), Some(ic)) = (self.slt, self.ic) {
            packer.slt(&slt)?;
            packer.ic(ic)?;
        }
        if let Some(lpp) = self.lpp {
            packer.lpp(lpp)?;
        }
        if let Some(hint) = &self.encrypted_hint {
            packer.hint(hint)?;
        }
        Ok(packer.trim())
    }

    /// Split a block0 payload into its metadata and encrypted data.
    /// The returned offset is the length of the raw additional data.
    pub fn decode_block0(payload: &[u8]) -> CipherResult<(Self, usize)> {
        let mut ex = Extractor::new(payload);
        let alg = ex.alg()?;
        let iv = ex.iv()?;
        let slt = ex.slt()?;
        let ic = ex.ic()?;
        let lpp = ex.lpp()?;
        let hint = ex.hint()?;
        let ad = Self::block0(alg, iv, slt, ic, lpp, hint.to_vec());
        Ok((ad, ex.offset()))
    }

    /// Split a blockN payload into its metadata and encrypted data.
    pub fn decode_block_n(payload: &[u8]) -> CipherResult<(Self, usize)> {
        let mut ex = Extractor::new(payload);
        let alg = ex.alg()?;
        let iv = ex.iv()?;
        Ok((Self::block_n(alg, iv), ex.offset()))
    }
}
