//! Whole-stream encryption and decryption, including loop nesting.
//!
//! Every pass is a pull-driven `futures` stream of blocks exposed as an
//! `AsyncRead` through [`StreamReader`]. Passes nest by feeding one pass's
//! reader into the next:
//!
//! ```text
//! encrypt: clear ─▶ pass lp=1 ─▶ pass lp=2 ─▶ … ─▶ pass lp=lpEnd ─▶ cipher
//! decrypt: cipher ─▶ pass lp=lpEnd ─▶ … ─▶ pass lp=1 ─▶ clear
//! ```
//!
//! A [`CipherError`] raised inside an inner pass crosses the reader boundary
//! as an `io::Error` and is recovered on the other side.

use std::io;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use futures::stream;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;
use tracing::debug;

use crate::decipher::Decipher;
use crate::encipher::Encipher;
use crate::error::{CipherError, CipherResult};
use crate::keys::UserCred;
use crate::provider::PasswordProvider;
use crate::state::CipherState;
use crate::types::{CipherDataInfo, EContext, EParams};

/// Type-erased byte stream handed between passes and back to callers.
pub type BoxedReader = Pin<Box<dyn AsyncRead + Send>>;

/// Encrypt `clear` with one pass per algorithm in `ctx`.
///
/// Every pass's parameters are validated before any byte is read. The
/// provider is asked for a password once per pass, innermost first, as the
/// returned reader is consumed.
pub fn encrypt_stream<P, R>(
    ctx: &EContext,
    provider: P,
    user_cred: UserCred,
    clear: R,
) -> CipherResult<BoxedReader>
where
    P: PasswordProvider + 'static,
    R: AsyncRead + Send + Unpin + 'static,
{
    let passes = ctx.passes()?;
    let provider = Arc::new(provider);

    let mut reader: BoxedReader = Box::pin(clear);
    for params in passes {
        debug!(lp = params.lp(), lp_end = params.lp_end(), alg = %params.alg(), "encrypt pass");
        let encipher = Encipher::new(user_cred.clone(), reader).with_read_start(ctx.read_start());
        reader = encrypt_pass(encipher, params, Arc::clone(&provider));
    }
    Ok(reader)
}

fn encrypt_pass<P>(encipher: Encipher<BoxedReader>, params: EParams, provider: Arc<P>) -> BoxedReader
where
    P: PasswordProvider + 'static,
{
    let blocks = stream::try_unfold(
        (encipher, params, provider),
        |(mut encipher, params, provider)| async move {
            if encipher.state() == CipherState::Finished {
                return Ok::<_, io::Error>(None);
            }
            let block = encipher
                .encrypt_block(&params, provider.as_ref())
                .await
                .map_err(io::Error::from)?;
            Ok(Some((Bytes::from(block.to_vec()), (encipher, params, provider))))
        },
    );
    Box::pin(StreamReader::new(blocks))
}

/// Decrypt `cipher`, unwrapping as many passes as block0 says it holds.
///
/// Resolves once the outer block0 has been read and verified; decryption
/// proper happens as the returned reader is consumed.
pub async fn decrypt_stream<P, R>(provider: P, user_cred: UserCred, cipher: R) -> CipherResult<BoxedReader>
where
    P: PasswordProvider + 'static,
    R: AsyncRead + Send + Unpin + 'static,
{
    decrypt_pass(Arc::new(provider), user_cred, Box::pin(cipher)).await
}

fn decrypt_pass<P>(
    provider: Arc<P>,
    user_cred: UserCred,
    cipher: BoxedReader,
) -> BoxFuture<'static, CipherResult<BoxedReader>>
where
    P: PasswordProvider + 'static,
{
    async move {
        let mut decipher = Decipher::from_stream(user_cred.clone(), cipher).await?;
        let info = decipher.cipher_data_info().await?;
        debug!(lp = info.lp, lp_end = info.lp_end, alg = %info.alg, ver = info.ver, "decrypt pass");

        let clear = decrypt_blocks(decipher, Arc::clone(&provider));
        if info.lp > 1 {
            decrypt_pass(provider, user_cred, clear).await
        } else {
            Ok(clear)
        }
    }
    .boxed()
}

fn decrypt_blocks<P>(decipher: Decipher<BoxedReader>, provider: Arc<P>) -> BoxedReader
where
    P: PasswordProvider + 'static,
{
    let blocks = stream::try_unfold((decipher, provider), |(mut decipher, provider)| async move {
        if decipher.state() == CipherState::Finished {
            return Ok::<_, io::Error>(None);
        }
        let clear = decipher
            .decrypt_block(provider.as_ref())
            .await
            .map_err(io::Error::from)?;
        Ok(Some((clear, (decipher, provider))))
    });
    Box::pin(StreamReader::new(blocks))
}

/// Verified block0 metadata of the outermost pass. Needs no password.
pub async fn get_cipher_stream_info<R>(user_cred: UserCred, cipher: R) -> CipherResult<CipherDataInfo>
where
    R: AsyncRead + Unpin,
{
    let mut decipher = Decipher::from_stream(user_cred, cipher).await?;
    decipher.cipher_data_info().await
}

/// Drain `reader`, recovering typed errors from inner passes.
pub async fn read_all(mut reader: BoxedReader) -> CipherResult<Vec<u8>> {
    use tokio::io::AsyncReadExt;

    let mut out = Vec::new();
    reader
        .read_to_end(&mut out)
        .await
        .map_err(CipherError::from)?;
    Ok(out)
}
