//! Streaming decryption of every supported wire format.
//!
//! [`Decipher::from_stream`] reads one header's worth of bytes and sniffs
//! the format from the little-endian `u16` at offset 32:
//!
//! | value | format | layout |
//! |---|---|---|
//! | 5 | [`Format::V5`] | framed blocks, chained MACs, terminal flag |
//! | 4 | [`Format::V4`] | framed blocks, independent MACs |
//! | 1..=3 | [`Format::V1`] | one HMAC-signed message (the field is an algorithm id) |
//!
//! Nothing is decrypted or returned to the caller, hint included, until the
//! block MAC has verified.

mod framed;
mod monolithic;

use bytes::Bytes;
use tokio::io::AsyncRead;
use tracing::{debug, trace, warn};
use zeroize::Zeroize;

use crate::alg::Algorithm;
use crate::consts::{
    FLAG_TERMINAL, HEADER_BYTES, MAC_BYTES, PAYLOAD_SIZE_MAX, V1_BELOW, VERSION1, VERSION4, VERSION5,
};
use crate::error::{CipherError, CipherResult};
use crate::kdf::derive_cipher_key_blocking;
use crate::keys::{DerivedKey, UserCred};
use crate::provider::PasswordProvider;
use crate::reader::BlockReader;
use crate::state::CipherState;
use crate::types::CipherDataInfo;

/// Wire-format generation of a cipher stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    V1,
    V4,
    V5,
}

impl Format {
    /// Identify the format from the first [`HEADER_BYTES`] of a stream.
    pub fn sniff(header: &[u8]) -> CipherResult<Self> {
        if header.len() < HEADER_BYTES {
            return Err(CipherError::SizeMismatch {
                what: "cipher data header",
                expected: HEADER_BYTES,
                actual: header.len(),
            });
        }
        let marker = u16::from_le_bytes([header[MAC_BYTES], header[MAC_BYTES + 1]]);
        match marker {
            VERSION5 => Ok(Format::V5),
            VERSION4 => Ok(Format::V4),
            v if (1..V1_BELOW).contains(&v) => Ok(Format::V1),
            other => Err(CipherError::ProtocolVersion(other)),
        }
    }

    pub fn version(self) -> u16 {
        match self {
            Format::V1 => VERSION1,
            Format::V4 => VERSION4,
            Format::V5 => VERSION5,
        }
    }

    /// Each block's MAC covers the previous block's MAC.
    fn chains_macs(self) -> bool {
        matches!(self, Format::V5)
    }

    /// The last block of a pass must carry [`FLAG_TERMINAL`].
    fn requires_terminal(self) -> bool {
        matches!(self, Format::V5)
    }
}

/// A verified block0, waiting for a password.
pub(crate) struct Block0 {
    info: CipherDataInfo,
    signing_key: DerivedKey,
    mac: [u8; MAC_BYTES],
    flags: u8,
    additional_data: Bytes,
    encrypted_data: Bytes,
}

/// A verified blockN.
pub(crate) struct BlockN {
    alg: Algorithm,
    iv: Bytes,
    mac: [u8; MAC_BYTES],
    flags: u8,
    additional_data: Bytes,
    encrypted_data: Bytes,
}

pub struct Decipher<R> {
    format: Format,
    user_cred: UserCred,
    reader: BlockReader<R>,
    state: CipherState,
    /// First header, held until block0 is decoded.
    header: Option<Bytes>,
    block0: Option<Block0>,
    info: Option<CipherDataInfo>,
    cipher_key: Option<DerivedKey>,
    signing_key: Option<DerivedKey>,
    last_mac: Option<[u8; MAC_BYTES]>,
    last_flags: u8,
    blocks: u64,
}

impl<R: AsyncRead + Unpin> Decipher<R> {
    /// Read the first header and pick the matching format.
    pub async fn from_stream(user_cred: UserCred, cipher: R) -> CipherResult<Self> {
        let mut reader = BlockReader::new(cipher);
        let chunk = reader.read_fill(HEADER_BYTES).await?;
        let format = Format::sniff(&chunk.bytes)?;
        debug!(?format, "sniffed cipher stream");

        Ok(Self {
            format,
            user_cred,
            reader,
            state: CipherState::Initialized,
            header: Some(chunk.bytes),
            block0: None,
            info: None,
            cipher_key: None,
            signing_key: None,
            last_mac: None,
            last_flags: 0,
            blocks: 0,
        })
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn state(&self) -> CipherState {
        self.state
    }

    /// Verified block0 metadata, hint included. Needs no password and can
    /// be called any number of times before or after decryption starts.
    pub async fn cipher_data_info(&mut self) -> CipherResult<CipherDataInfo> {
        let result = self.decode_payload0().await;
        self.settle(result)
    }

    /// Block0 or blockN depending on progress so far.
    pub async fn decrypt_block<P: PasswordProvider>(&mut self, provider: &P) -> CipherResult<Bytes> {
        match self.state {
            CipherState::Initialized | CipherState::Block0Decoded => self.decrypt_block0(provider).await,
            _ => self.decrypt_block_n().await,
        }
    }

    /// Verify block0, ask `provider` for the password and decrypt.
    pub async fn decrypt_block0<P: PasswordProvider>(&mut self, provider: &P) -> CipherResult<Bytes> {
        let result = self.try_block0(provider).await;
        self.settle(result)
    }

    /// Decrypt the next block. An empty result with the state at
    /// [`CipherState::Finished`] means the pass is over.
    pub async fn decrypt_block_n(&mut self) -> CipherResult<Bytes> {
        let result = self.try_block_n().await;
        self.settle(result)
    }

    async fn decode_payload0(&mut self) -> CipherResult<CipherDataInfo> {
        if let Some(info) = &self.info {
            if self.state != CipherState::Error {
                return Ok(info.clone());
            }
        }
        self.state.require(&[CipherState::Initialized], "decode block0")?;

        let header = self.header.take().ok_or(CipherError::StateViolation {
            state: self.state,
            operation: "decode block0 without header",
        })?;

        let block0 = match self.format {
            Format::V1 => {
                let rest = self.reader.read_to_limit(PAYLOAD_SIZE_MAX).await?;
                let mut message = Vec::with_capacity(header.len() + rest.bytes.len());
                message.extend_from_slice(&header);
                message.extend_from_slice(&rest.bytes);
                monolithic::decode_block0(Bytes::from(message), &self.user_cred)?
            }
            Format::V4 | Format::V5 => {
                let frame = framed::parse_header(self.format, &header)?;
                let payload = self.read_payload(frame.size).await?;
                framed::decode_block0(self.format, &header, &frame, payload, &self.user_cred)?
            }
        };

        debug!(
            ver = block0.info.ver,
            alg = %block0.info.alg,
            ic = block0.info.ic,
            lp = block0.info.lp,
            lp_end = block0.info.lp_end,
            hint = block0.info.hint.is_some(),
            "decoded block0"
        );

        self.state = self.state.transition(CipherState::Block0Decoded)?;
        trace!(state = ?self.state, "decipher transition");
        let info = block0.info.clone();
        self.info = Some(info.clone());
        self.block0 = Some(block0);
        Ok(info)
    }

    async fn try_block0<P: PasswordProvider>(&mut self, provider: &P) -> CipherResult<Bytes> {
        self.state.require(
            &[CipherState::Initialized, CipherState::Block0Decoded],
            "decrypt block0",
        )?;
        let info = self.decode_payload0().await?;

        let Some(block0) = self.block0.take() else {
            return Err(CipherError::StateViolation {
                state: self.state,
                operation: "decrypt block0 twice",
            });
        };

        let creds = provider.password(&info).await?;
        let cipher_key = derive_cipher_key_blocking(
            info.alg,
            info.ic,
            creds.password,
            self.user_cred.clone(),
            info.slt,
        )
        .await?;

        let clear = info.alg.open(
            &cipher_key,
            &info.iv,
            &block0.encrypted_data,
            &block0.additional_data,
        )?;

        self.state = self.state.transition(CipherState::Block0Done)?;
        trace!(state = ?self.state, "decipher transition");
        self.cipher_key = Some(cipher_key);
        self.last_mac = Some(block0.mac);
        self.last_flags = block0.flags;
        self.signing_key = Some(block0.signing_key);
        self.blocks = 1;

        debug!(lp = info.lp, block = self.blocks, clear = clear.len(), "decrypted block0");
        Ok(Bytes::from(clear))
    }

    async fn try_block_n(&mut self) -> CipherResult<Bytes> {
        self.state.require(&[CipherState::Block0Done], "decrypt blockN")?;

        if self.format == Format::V1 {
            return self.finish();
        }

        let chunk = self.reader.read_fill(HEADER_BYTES).await?;
        if chunk.bytes.is_empty() {
            if self.format.requires_terminal() && self.last_flags & FLAG_TERMINAL == 0 {
                return Err(CipherError::MissingTerminal);
            }
            return self.finish();
        }
        if chunk.bytes.len() < HEADER_BYTES {
            return Err(CipherError::SizeMismatch {
                what: "cipher data header",
                expected: HEADER_BYTES,
                actual: chunk.bytes.len(),
            });
        }

        let frame = framed::parse_header(self.format, &chunk.bytes)?;
        let payload = self.read_payload(frame.size).await?;

        let (Some(cipher_key), Some(signing_key)) = (&self.cipher_key, &self.signing_key) else {
            return Err(CipherError::StateViolation {
                state: self.state,
                operation: "decrypt blockN without keys",
            });
        };
        let previous: &[u8] = match (&self.last_mac, self.format.chains_macs()) {
            (Some(mac), true) => mac,
            _ => &[],
        };
        let block = framed::decode_block_n(&chunk.bytes, &frame, payload, signing_key, previous)?;

        if self.format.requires_terminal() && self.last_flags & FLAG_TERMINAL != 0 {
            return Err(CipherError::ExtraTerminal);
        }

        let clear = block
            .alg
            .open(cipher_key, &block.iv, &block.encrypted_data, &block.additional_data)?;

        self.state = self.state.transition(CipherState::Block0Done)?;
        self.last_mac = Some(block.mac);
        self.last_flags = block.flags;
        self.blocks += 1;

        debug!(
            block = self.blocks,
            alg = %block.alg,
            clear = clear.len(),
            terminal = block.flags & FLAG_TERMINAL != 0,
            "decrypted block"
        );
        Ok(Bytes::from(clear))
    }

    async fn read_payload(&mut self, size: usize) -> CipherResult<Bytes> {
        let chunk = self.reader.read_fill(size).await?;
        if chunk.bytes.len() < size {
            return Err(CipherError::SizeMismatch {
                what: "cipher data payload",
                expected: size,
                actual: chunk.bytes.len(),
            });
        }
        Ok(chunk.bytes)
    }

    fn finish(&mut self) -> CipherResult<Bytes> {
        self.state = self.state.transition(CipherState::Finished)?;
        trace!(state = ?self.state, blocks = self.blocks, "decipher transition");
        self.drop_keys();
        Ok(Bytes::new())
    }

    fn settle<T>(&mut self, result: CipherResult<T>) -> CipherResult<T> {
        if let Err(err) = &result {
            if self.state != CipherState::Error {
                warn!(error = %err, format = ?self.format, blocks = self.blocks, "decipher invalidated");
            }
            self.state = CipherState::Error;
            self.block0 = None;
            self.drop_keys();
        }
        result
    }

    fn drop_keys(&mut self) {
        self.cipher_key = None;
        self.signing_key = None;
        if let Some(mac) = self.last_mac.as_mut() {
            mac.zeroize();
        }
    }
}
