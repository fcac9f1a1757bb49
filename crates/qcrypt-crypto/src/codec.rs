//! Field-level binary codec.
//!
//! [`Extractor`] reads typed fields from a byte slice, checking bounds and
//! value ranges before anything is handed back. [`Packer`] is the dual: it
//! validates each value and writes it into a pre-sized buffer.

use crate::alg::Algorithm;
use crate::consts::{
    ALG_BYTES, ENCRYPTED_HINT_MAX_BYTES, FLAGS_BYTES, FLAG_TERMINAL, HINT_LEN_BYTES, IC_BYTES,
    LPP_BYTES, LP_MAX, MAC_BYTES, PAYLOAD_SIZE_BYTES, PAYLOAD_SIZE_MAX, PAYLOAD_SIZE_MIN,
    SLT_BYTES, VER_BYTES, VERSION1, VERSION4, VERSION5,
};
use crate::error::{CipherError, CipherResult};
use crate::kdf::check_ic;

/// Loop position of a pass: `lp` of `lp_end`, both 1-based.
///
/// Packed into one byte as `(lp - 1) | (lp_end - 1) << 4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopPosition {
    pub lp: u8,
    pub lp_end: u8,
}

impl LoopPosition {
    pub fn new(lp: u8, lp_end: u8) -> CipherResult<Self> {
        if lp_end == 0 || lp_end > LP_MAX {
            return Err(CipherError::malformed("lpp", format!("lpEnd {lp_end} outside [1, {LP_MAX}]")));
        }
        if lp == 0 || lp > lp_end {
            return Err(CipherError::malformed("lpp", format!("lp {lp} outside [1, {lp_end}]")));
        }
        Ok(Self { lp, lp_end })
    }

    pub fn pack(self) -> u8 {
        (self.lp - 1) | ((self.lp_end - 1) << 4)
    }

    pub fn unpack(byte: u8) -> CipherResult<Self> {
        Self::new((byte & 0x0f) + 1, (byte >> 4) + 1)
    }
}

fn read_le(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .rev()
        .fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
}

fn check_version(ver: u16) -> CipherResult<u16> {
    match ver {
        VERSION1 | VERSION4 | VERSION5 => Ok(ver),
        other => Err(CipherError::ProtocolVersion(other)),
    }
}

fn check_size(size: usize) -> CipherResult<usize> {
    if !(PAYLOAD_SIZE_MIN..=PAYLOAD_SIZE_MAX).contains(&size) {
        return Err(CipherError::malformed(
            "size",
            format!("{size} outside [{PAYLOAD_SIZE_MIN}, {PAYLOAD_SIZE_MAX}]"),
        ));
    }
    Ok(size)
}

fn check_flags(flags: u8) -> CipherResult<u8> {
    if flags & !FLAG_TERMINAL != 0 {
        return Err(CipherError::malformed("flags", format!("unknown bits {flags:#04x}")));
    }
    Ok(flags)
}

/// Cursor-based reader of wire fields.
#[derive(Debug)]
pub struct Extractor<'a> {
    bytes: &'a [u8],
    offset: usize,
    alg: Option<Algorithm>,
}

impl<'a> Extractor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            alg: None,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn take(&mut self, field: &'static str, len: usize) -> CipherResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(CipherError::malformed(
                field,
                format!("needs {len} bytes, {} remain", self.remaining()),
            ));
        }
        let start = self.offset;
        self.offset += len;
        Ok(&self.bytes[start..self.offset])
    }

    fn take_array<const N: usize>(&mut self, field: &'static str) -> CipherResult<[u8; N]> {
        let bytes = self.take(field, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn mac(&mut self) -> CipherResult<[u8; MAC_BYTES]> {
        self.take_array("mac")
    }

    /// Reads the algorithm id; later `iv` reads are sized from it.
    pub fn alg(&mut self) -> CipherResult<Algorithm> {
        let id = read_le(self.take("alg", ALG_BYTES)?) as u16;
        let alg = Algorithm::from_id(id)
            .ok_or_else(|| CipherError::malformed("alg", format!("unknown algorithm id {id}")))?;
        self.alg = Some(alg);
        Ok(alg)
    }

    pub fn iv(&mut self) -> CipherResult<&'a [u8]> {
        let alg = self
            .alg
            .ok_or_else(|| CipherError::malformed("iv", "algorithm must be read first"))?;
        self.take("iv", alg.iv_bytes())
    }

    pub fn slt(&mut self) -> CipherResult<[u8; SLT_BYTES]> {
        self.take_array("slt")
    }

    pub fn ic(&mut self) -> CipherResult<u32> {
        let ic = read_le(self.take("ic", IC_BYTES)?);
        check_ic(ic).map_err(|_| CipherError::malformed("ic", format!("iteration count {ic} out of range")))?;
        Ok(ic)
    }

    pub fn ver(&mut self) -> CipherResult<u16> {
        let ver = read_le(self.take("ver", VER_BYTES)?) as u16;
        check_version(ver)
    }

    pub fn lpp(&mut self) -> CipherResult<LoopPosition> {
        let byte = self.take("lpp", LPP_BYTES)?[0];
        LoopPosition::unpack(byte)
    }

    pub fn flags(&mut self) -> CipherResult<u8> {
        let flags = self.take("flags", FLAGS_BYTES)?[0];
        check_flags(flags)
    }

    /// Length-prefixed encrypted hint; may be empty.
    pub fn hint(&mut self) -> CipherResult<&'a [u8]> {
        let start = self.offset;
        let len = usize::from(self.take("hint", HINT_LEN_BYTES)?[0]);
        self.take("hint", len).map_err(|e| {
            self.offset = start;
            e
        })
    }

    pub fn size(&mut self) -> CipherResult<usize> {
        let size = read_le(self.take("size", PAYLOAD_SIZE_BYTES)?) as usize;
        check_size(size)
    }

    /// Everything after the cursor. Must not be empty.
    pub fn remainder(&mut self, field: &'static str) -> CipherResult<&'a [u8]> {
        if self.remaining() == 0 {
            return Err(CipherError::malformed(field, "no bytes remain"));
        }
        let rest = &self.bytes[self.offset..];
        self.offset = self.bytes.len();
        Ok(rest)
    }
}

/// Cursor-based writer into a pre-sized buffer.
///
/// `trim` and `detach` consume the packer, so the finished buffer has a
/// single owner.
#[derive(Debug)]
pub struct Packer {
    buf: Vec<u8>,
    offset: usize,
}

impl Packer {
    pub fn new(size: usize) -> Self {
        Self::with_offset(size, 0)
    }

    /// Start writing at `offset`, leaving room for fields filled in later.
    pub fn with_offset(size: usize, offset: usize) -> Self {
        Self {
            buf: vec![0u8; size],
            offset: offset.min(size),
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn set_offset(&mut self, offset: usize) -> CipherResult<()> {
        if offset > self.buf.len() {
            return Err(CipherError::invalid(format!(
                "offset {offset} beyond buffer of {} bytes",
                self.buf.len()
            )));
        }
        self.offset = offset;
        Ok(())
    }

    /// Bytes written so far, up to the cursor.
    pub fn written(&self) -> &[u8] {
        &self.buf[..self.offset]
    }

    /// Whole buffer regardless of cursor.
    pub fn buffer(&self) -> &[u8] {
        &self.buf
    }

    fn put(&mut self, field: &'static str, bytes: &[u8]) -> CipherResult<()> {
        let end = self.offset + bytes.len();
        if end > self.buf.len() {
            return Err(CipherError::malformed(
                field,
                format!("needs {} bytes, {} free", bytes.len(), self.buf.len() - self.offset),
            ));
        }
        self.buf[self.offset..end].copy_from_slice(bytes);
        self.offset = end;
        Ok(())
    }

    fn put_le(&mut self, field: &'static str, value: u32, width: usize) -> CipherResult<()> {
        let bytes = value.to_le_bytes();
        if bytes[width..].iter().any(|&b| b != 0) {
            return Err(CipherError::malformed(field, format!("{value} does not fit in {width} bytes")));
        }
        self.put(field, &bytes[..width])
    }

    pub fn mac(&mut self, mac: &[u8]) -> CipherResult<()> {
        if mac.len() != MAC_BYTES {
            return Err(CipherError::malformed("mac", format!("must be {MAC_BYTES} bytes")));
        }
        self.put("mac", mac)
    }

    pub fn alg(&mut self, alg: Algorithm) -> CipherResult<()> {
        self.put_le("alg", u32::from(alg.id()), ALG_BYTES)
    }

    pub fn iv(&mut self, alg: Algorithm, iv: &[u8]) -> CipherResult<()> {
        if iv.len() != alg.iv_bytes() {
            return Err(CipherError::malformed(
                "iv",
                format!("{alg} needs {} bytes, got {}", alg.iv_bytes(), iv.len()),
            ));
        }
        self.put("iv", iv)
    }

    pub fn slt(&mut self, slt: &[u8]) -> CipherResult<()> {
        if slt.len() != SLT_BYTES {
            return Err(CipherError::malformed("slt", format!("must be {SLT_BYTES} bytes")));
        }
        self.put("slt", slt)
    }

    pub fn ic(&mut self, ic: u32) -> CipherResult<()> {
        check_ic(ic).map_err(|_| CipherError::malformed("ic", format!("iteration count {ic} out of range")))?;
        self.put_le("ic", ic, IC_BYTES)
    }

    pub fn ver(&mut self, ver: u16) -> CipherResult<()> {
        check_version(ver)?;
        self.put_le("ver", u32::from(ver), VER_BYTES)
    }

    pub fn lpp(&mut self, pos: LoopPosition) -> CipherResult<()> {
        let pos = LoopPosition::new(pos.lp, pos.lp_end)?;
        self.put("lpp", &[pos.pack()])
    }

    pub fn flags(&mut self, flags: u8) -> CipherResult<()> {
        self.put("flags", &[check_flags(flags)?])
    }

    pub fn hint(&mut self, encrypted_hint: &[u8]) -> CipherResult<()> {
        if encrypted_hint.len() > ENCRYPTED_HINT_MAX_BYTES {
            return Err(CipherError::malformed(
                "hint",
                format!("{} bytes exceeds {ENCRYPTED_HINT_MAX_BYTES}", encrypted_hint.len()),
            ));
        }
        let needed = HINT_LEN_BYTES + encrypted_hint.len();
        if self.offset + needed > self.buf.len() {
            return Err(CipherError::malformed(
                "hint",
                format!("needs {needed} bytes, {} free", self.buf.len() - self.offset),
            ));
        }
        self.put("hint", &[encrypted_hint.len() as u8])?;
        self.put("hint", encrypted_hint)
    }

    pub fn size(&mut self, size: usize) -> CipherResult<()> {
        let size = check_size(size)?;
        self.put_le("size", size as u32, PAYLOAD_SIZE_BYTES)
    }

    /// Raw bytes with no validation beyond space.
    pub fn bytes(&mut self, bytes: &[u8]) -> CipherResult<()> {
        self.put("bytes", bytes)
    }

    /// Buffer cut at the cursor.
    pub fn trim(mut self) -> Vec<u8> {
        self.buf.truncate(self.offset);
        self.buf
    }

    /// Whole buffer.
    pub fn detach(self) -> Vec<u8> {
        self.buf
    }
}
