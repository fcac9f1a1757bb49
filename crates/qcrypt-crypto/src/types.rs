use bytes::Bytes;
use serde::Serialize;

use crate::alg::Algorithm;
use crate::codec::LoopPosition;
use crate::consts::{ICOUNT_DEFAULT, LP_MAX, READ_SIZE_MAX, READ_SIZE_START, SLT_BYTES};
use crate::error::{CipherError, CipherResult};
use crate::kdf::check_ic;
use crate::state::CipherState;

/// Parameters of one encryption pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EParams {
    alg: Algorithm,
    ic: u32,
    pos: LoopPosition,
}

impl EParams {
    pub fn new(alg: Algorithm, ic: u32, lp: u8, lp_end: u8) -> CipherResult<Self> {
        check_ic(ic)?;
        let pos = LoopPosition::new(lp, lp_end)
            .map_err(|e| CipherError::invalid(format!("loop position: {e}")))?;
        Ok(Self { alg, ic, pos })
    }

    pub fn alg(&self) -> Algorithm {
        self.alg
    }

    pub fn ic(&self) -> u32 {
        self.ic
    }

    pub fn lp(&self) -> u8 {
        self.pos.lp
    }

    pub fn lp_end(&self) -> u8 {
        self.pos.lp_end
    }

    pub fn loop_position(&self) -> LoopPosition {
        self.pos
    }

    /// Same pass, different algorithm for the following blocks.
    pub fn with_alg(self, alg: Algorithm) -> Self {
        Self { alg, ..self }
    }
}

/// A whole multi-pass encryption request: one algorithm per loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EContext {
    algs: Vec<Algorithm>,
    ic: u32,
    read_start: usize,
}

impl EContext {
    pub fn new(algs: Vec<Algorithm>, ic: u32) -> CipherResult<Self> {
        if algs.is_empty() || algs.len() > usize::from(LP_MAX) {
            return Err(CipherError::invalid(format!(
                "between 1 and {LP_MAX} algorithms required, got {}",
                algs.len()
            )));
        }
        check_ic(ic)?;
        Ok(Self {
            algs,
            ic,
            read_start: READ_SIZE_START,
        })
    }

    /// Single pass with the default iteration count.
    pub fn single(alg: Algorithm) -> Self {
        Self {
            algs: vec![alg],
            ic: ICOUNT_DEFAULT,
            read_start: READ_SIZE_START,
        }
    }

    /// Initial clear-data read size; later blocks double it up to
    /// [`READ_SIZE_MAX`].
    pub fn with_read_start(mut self, bytes: usize) -> Self {
        self.read_start = bytes.clamp(1, READ_SIZE_MAX);
        self
    }

    pub fn algs(&self) -> &[Algorithm] {
        &self.algs
    }

    pub fn ic(&self) -> u32 {
        self.ic
    }

    pub fn read_start(&self) -> usize {
        self.read_start
    }

    pub fn lp_end(&self) -> u8 {
        self.algs.len() as u8
    }

    /// Parameters for every pass, innermost (lp = 1) first.
    pub fn passes(&self) -> CipherResult<Vec<EParams>> {
        let lp_end = self.lp_end();
        self.algs
            .iter()
            .zip(1..=lp_end)
            .map(|(&alg, lp)| EParams::new(alg, self.ic, lp, lp_end))
            .collect()
    }
}

/// Block0 metadata, shown to the password provider.
///
/// When decrypting, this only exists once the block0 MAC has verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CipherDataInfo {
    pub ver: u16,
    pub alg: Algorithm,
    pub ic: u32,
    pub lp: u8,
    pub lp_end: u8,
    pub iv: Vec<u8>,
    pub slt: [u8; SLT_BYTES],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// One encrypted block, in wire order.
#[derive(Debug, Clone)]
pub struct CipherDataBlock {
    pub header: Bytes,
    pub additional_data: Bytes,
    pub encrypted_data: Bytes,
    pub state: CipherState,
}

impl CipherDataBlock {
    pub fn is_empty(&self) -> bool {
        self.header.is_empty() && self.additional_data.is_empty() && self.encrypted_data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.header.len() + self.additional_data.len() + self.encrypted_data.len()
    }

    pub fn into_parts(self) -> [Bytes; 3] {
        [self.header, self.additional_data, self.encrypted_data]
    }

    /// Concatenation of all three parts.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        out.extend_from_slice(&self.header);
        out.extend_from_slice(&self.additional_data);
        out.extend_from_slice(&self.encrypted_data);
        out
    }
}
