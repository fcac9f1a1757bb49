//! Streaming V5 encryption.
//!
//! Each call reads the next chunk of clear data and returns one block:
//!
//! ```text
//! header          additional data                         encrypted data
//! ┌────┬───┬────┬─────┐┌───┬────┬─────┬────┬─────┬────────┐┌─────────────┐
//! │mac │ver│size│flags││alg│ iv │ slt │ ic │ lpp │hint    ││ AEAD(clear) │   block0
//! └────┴───┴────┴─────┘└───┴────┴─────┴────┴─────┴────────┘└─────────────┘
//! ┌────┬───┬────┬─────┐┌───┬────┐┌─────────────┐
//! │mac │ver│size│flags││alg│ iv ││ AEAD(clear) │                            blockN
//! └────┴───┴────┴─────┘└───┴────┘└─────────────┘
//! mac_i = BLAKE2b(sk; ver‖size‖flags ‖ AD ‖ ED ‖ mac_{i-1})
//! ```

use bytes::Bytes;
use rand::RngCore;
use tokio::io::AsyncRead;
use tracing::{debug, trace, warn};
use zeroize::{Zeroize, Zeroizing};

use crate::additional_data::AdditionalData;
use crate::alg::Algorithm;
use crate::codec::Packer;
use crate::consts::{
    BLOCK0_RANDOM_BYTES, CURRENT_VERSION, FLAG_TERMINAL, HEADER_BYTES, HINT_CLEAR_MAX_BYTES,
    HINT_MAX_LEN, MAC_BYTES, READ_SIZE_MAX, READ_SIZE_START, SLT_BYTES,
};
use crate::error::{CipherError, CipherResult};
use crate::kdf::{derive_cipher_key_blocking, derive_hint_key, derive_signing_key};
use crate::keys::{DerivedKey, UserCred};
use crate::mac::block_mac;
use crate::provider::PasswordProvider;
use crate::reader::{BlockReader, Chunk};
use crate::state::CipherState;
use crate::types::{CipherDataBlock, CipherDataInfo, EParams};

pub struct Encipher<R> {
    user_cred: UserCred,
    reader: BlockReader<R>,
    state: CipherState,
    read_target: usize,
    cipher_key: Option<DerivedKey>,
    signing_key: Option<DerivedKey>,
    last_mac: Option<[u8; MAC_BYTES]>,
    blocks: u64,
}

impl<R: AsyncRead + Unpin> Encipher<R> {
    pub fn new(user_cred: UserCred, clear: R) -> Self {
        Self {
            user_cred,
            reader: BlockReader::new(clear),
            state: CipherState::Initialized,
            read_target: READ_SIZE_START,
            cipher_key: None,
            signing_key: None,
            last_mac: None,
            blocks: 0,
        }
    }

    /// Size of the first clear-data read. Doubles per block up to
    /// [`READ_SIZE_MAX`].
    pub fn with_read_start(mut self, bytes: usize) -> Self {
        self.read_target = bytes.clamp(1, READ_SIZE_MAX);
        self
    }

    pub fn state(&self) -> CipherState {
        self.state
    }

    /// Block0 or blockN depending on progress so far.
    pub async fn encrypt_block<P: PasswordProvider>(
        &mut self,
        params: &EParams,
        provider: &P,
    ) -> CipherResult<CipherDataBlock> {
        match self.state {
            CipherState::Initialized => self.encrypt_block0(params, provider).await,
            _ => self.encrypt_block_n(params).await,
        }
    }

    /// Read the first chunk, ask `provider` for a password, derive keys and
    /// encrypt. An empty, non-terminal block means no input was ready yet.
    pub async fn encrypt_block0<P: PasswordProvider>(
        &mut self,
        params: &EParams,
        provider: &P,
    ) -> CipherResult<CipherDataBlock> {
        let result = self.try_block0(params, provider).await;
        self.settle(result)
    }

    /// Encrypt the next chunk with the keys from block0.
    pub async fn encrypt_block_n(&mut self, params: &EParams) -> CipherResult<CipherDataBlock> {
        let result = self.try_block_n(params).await;
        self.settle(result)
    }

    async fn try_block0<P: PasswordProvider>(
        &mut self,
        params: &EParams,
        provider: &P,
    ) -> CipherResult<CipherDataBlock> {
        self.state.require(&[CipherState::Initialized], "encrypt block0")?;

        let chunk = self.reader_chunk().await?;

        let alg = params.alg();
        let mut random = Zeroizing::new([0u8; BLOCK0_RANDOM_BYTES]);
        rand::thread_rng().fill_bytes(random.as_mut());
        let mut slt = [0u8; SLT_BYTES];
        slt.copy_from_slice(&random[..SLT_BYTES]);
        let iv = &random[SLT_BYTES..SLT_BYTES + alg.iv_bytes()];

        let info = CipherDataInfo {
            ver: CURRENT_VERSION,
            alg,
            ic: params.ic(),
            lp: params.lp(),
            lp_end: params.lp_end(),
            iv: iv.to_vec(),
            slt,
            hint: None,
        };
        let creds = provider.password(&info).await?;
        let hint = creds.hint.unwrap_or_default();
        if hint.chars().count() > HINT_MAX_LEN {
            return Err(CipherError::invalid(format!(
                "hint longer than {HINT_MAX_LEN} characters"
            )));
        }

        let signing_key = derive_signing_key(&self.user_cred, &slt)?;
        let hint_key = derive_hint_key(alg, &self.user_cred, &slt)?;
        let cipher_key =
            derive_cipher_key_blocking(alg, params.ic(), creds.password, self.user_cred.clone(), slt)
                .await?;

        let encrypted_hint = if hint.is_empty() {
            Vec::new()
        } else {
            alg.seal(&hint_key, iv, truncate_utf8(&hint, HINT_CLEAR_MAX_BYTES).as_bytes(), &[])?
        };
        let additional_data =
            AdditionalData::block0(alg, iv, slt, params.ic(), params.loop_position(), encrypted_hint)
                .encode()?;

        let sealed = seal_block(
            &cipher_key,
            &signing_key,
            &[],
            alg,
            iv,
            additional_data,
            &chunk.bytes,
            chunk.done,
        )?;

        self.cipher_key = Some(cipher_key);
        self.signing_key = Some(signing_key);
        self.finish_block(sealed, params, chunk.bytes.len(), chunk.done)
    }

    async fn try_block_n(&mut self, params: &EParams) -> CipherResult<CipherDataBlock> {
        self.state.require(&[CipherState::Block0Done], "encrypt blockN")?;

        let chunk = self.reader_chunk().await?;

        let alg = params.alg();
        let mut iv = vec![0u8; alg.iv_bytes()];
        rand::thread_rng().fill_bytes(&mut iv);
        let additional_data = AdditionalData::block_n(alg, &iv).encode()?;

        let (Some(cipher_key), Some(signing_key), Some(previous)) =
            (&self.cipher_key, &self.signing_key, &self.last_mac)
        else {
            return Err(CipherError::StateViolation {
                state: self.state,
                operation: "encrypt blockN without keys",
            });
        };
        let sealed = seal_block(
            cipher_key,
            signing_key,
            previous,
            alg,
            &iv,
            additional_data,
            &chunk.bytes,
            chunk.done,
        )?;

        self.finish_block(sealed, params, chunk.bytes.len(), chunk.done)
    }

    async fn reader_chunk(&mut self) -> CipherResult<Chunk> {
        let chunk = self.reader.read_available(self.read_target).await?;
        self.read_target = self.read_target.saturating_mul(2).min(READ_SIZE_MAX);
        Ok(chunk)
    }

    fn finish_block(
        &mut self,
        sealed: SealedBlock,
        params: &EParams,
        clear_len: usize,
        terminal: bool,
    ) -> CipherResult<CipherDataBlock> {
        let next = if terminal {
            CipherState::Finished
        } else {
            CipherState::Block0Done
        };
        self.state = self.state.transition(next)?;
        trace!(state = ?self.state, "encipher transition");
        self.last_mac = Some(sealed.mac);
        self.blocks += 1;

        let block = CipherDataBlock {
            header: Bytes::from(sealed.header),
            additional_data: Bytes::from(sealed.additional_data),
            encrypted_data: Bytes::from(sealed.encrypted_data),
            state: self.state,
        };

        debug!(
            lp = params.lp(),
            block = self.blocks,
            alg = %params.alg(),
            clear = clear_len,
            wire = block.len(),
            terminal,
            "encrypted block"
        );

        if terminal {
            self.drop_keys();
        }
        Ok(block)
    }

    fn settle<T>(&mut self, result: CipherResult<T>) -> CipherResult<T> {
        if let Err(err) = &result {
            if self.state != CipherState::Error {
                warn!(error = %err, blocks = self.blocks, "encipher invalidated");
            }
            self.state = CipherState::Error;
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

struct SealedBlock {
    header: Vec<u8>,
    additional_data: Vec<u8>,
    encrypted_data: Vec<u8>,
    mac: [u8; MAC_BYTES],
}

/// Encrypt `clear` and frame it.
#[allow(clippy::too_many_arguments)]
fn seal_block(
    cipher_key: &DerivedKey,
    signing_key: &DerivedKey,
    previous_mac: &[u8],
    alg: Algorithm,
    iv: &[u8],
    additional_data: Vec<u8>,
    clear: &[u8],
    terminal: bool,
) -> CipherResult<SealedBlock> {
    let encrypted_data = alg.seal(cipher_key, iv, clear, &additional_data)?;

    let mut packer = Packer::with_offset(HEADER_BYTES, MAC_BYTES);
    packer.ver(CURRENT_VERSION)?;
    packer.size(additional_data.len() + encrypted_data.len())?;
    packer.flags(if terminal { FLAG_TERMINAL } else { 0 })?;

    let mac = block_mac(
        signing_key,
        &packer.buffer()[MAC_BYTES..],
        &additional_data,
        &encrypted_data,
        previous_mac,
    )?;
    packer.set_offset(0)?;
    packer.mac(&mac)?;

    Ok(SealedBlock {
        header: packer.detach(),
        additional_data,
        encrypted_data,
        mac,
    })
}

/// Longest prefix of `s` within `max` bytes that ends on a char boundary.
fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
