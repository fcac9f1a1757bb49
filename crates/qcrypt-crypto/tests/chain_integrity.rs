//! Tampering with a V5 stream must never yield clear data.
//!
//! Block0 tampering is caught by its MAC before any password is needed.
//! Reordering, duplicating or dropping whole blocks is caught by the MAC
//! chain or the terminal flag.

use blake2::digest::consts::U32;
use blake2::digest::Mac;
use blake2::Blake2bMac;
use qcrypt_crypto::consts::{HEADER_BYTES, ICOUNT_MIN, MAC_BYTES};
use qcrypt_crypto::kdf::{derive_cipher_key, derive_signing_key};
use qcrypt_crypto::{
    decrypt_stream, encrypt_stream, get_cipher_stream_info, read_all, Algorithm, CipherDataInfo,
    CipherError, CipherResult, Credentials, EContext, UserCred,
};
use secrecy::SecretString;

const CRED: [u8; 32] = [0x33; 32];
const PASSWORD: &str = "chain of custody";

fn password() -> impl Fn(CipherDataInfo) -> std::future::Ready<CipherResult<Credentials>> + Send + Sync {
    |_info| std::future::ready(Ok(Credentials::new(PASSWORD, None)))
}

async fn encrypt(clear: &[u8], read_start: usize) -> Vec<u8> {
    let ctx = EContext::new(vec![Algorithm::XChaCha20Poly1305], ICOUNT_MIN)
        .unwrap()
        .with_read_start(read_start);
    let cipher = encrypt_stream(&ctx, password(), UserCred::from_bytes(CRED), std::io::Cursor::new(clear.to_vec()))
        .unwrap();
    read_all(cipher).await.unwrap()
}

async fn decrypt(wire: Vec<u8>) -> CipherResult<Vec<u8>> {
    let reader = decrypt_stream(password(), UserCred::from_bytes(CRED), std::io::Cursor::new(wire)).await?;
    read_all(reader).await
}

/// Split a V5 stream into whole blocks using each header's size field.
fn split_blocks(wire: &[u8]) -> Vec<Vec<u8>> {
    let mut blocks = Vec::new();
    let mut rest = wire;
    while !rest.is_empty() {
        let size = usize::from(rest[34]) | usize::from(rest[35]) << 8 | usize::from(rest[36]) << 16;
        let (block, tail) = rest.split_at(HEADER_BYTES + size);
        blocks.push(block.to_vec());
        rest = tail;
    }
    blocks
}

/// Four blocks of 8, 16, 32 and 4 clear bytes.
async fn four_blocks() -> (Vec<u8>, Vec<Vec<u8>>) {
    let clear: Vec<u8> = (0..60u8).collect();
    let wire = encrypt(&clear, 8).await;
    let blocks = split_blocks(&wire);
    assert_eq!(blocks.len(), 4);
    (clear, blocks)
}

#[tokio::test]
async fn untouched_stream_decrypts() {
    let (clear, blocks) = four_blocks().await;
    assert_eq!(decrypt(blocks.concat()).await.unwrap(), clear);
}

#[tokio::test]
async fn every_byte_of_block0_is_covered() {
    let wire = encrypt(b"single block", 1024).await;
    assert_eq!(split_blocks(&wire).len(), 1);

    for i in 0..wire.len() {
        let mut tampered = wire.clone();
        tampered[i] ^= 0x01;
        let err = decrypt(tampered).await.unwrap_err();
        assert!(
            matches!(
                err,
                CipherError::IntegrityFailure
                    | CipherError::MalformedField { .. }
                    | CipherError::ProtocolVersion(_)
                    | CipherError::SizeMismatch { .. }
            ),
            "byte {i}: {err:?}"
        );
    }
}

#[tokio::test]
async fn later_block_regions_are_covered() {
    let (_, blocks) = four_blocks().await;
    let offset: usize = blocks[..2].iter().map(Vec::len).sum();
    let len = blocks[2].len();
    // mac, ver, size, flags, alg, iv, encrypted data, tag
    for i in [0, 31, 32, 34, 37, 38, 41, len - 20, len - 1] {
        let mut wire = blocks.concat();
        wire[offset + i] ^= 0x01;
        assert!(decrypt(wire).await.is_err(), "byte {i} of block 2");
    }
}

#[tokio::test]
async fn swapped_blocks_fail_chain() {
    let (_, mut blocks) = four_blocks().await;
    blocks.swap(1, 2);
    assert!(matches!(decrypt(blocks.concat()).await, Err(CipherError::IntegrityFailure)));
}

#[tokio::test]
async fn duplicated_block_fails_chain() {
    let (_, mut blocks) = four_blocks().await;
    let copy = blocks[1].clone();
    blocks.insert(2, copy);
    assert!(matches!(decrypt(blocks.concat()).await, Err(CipherError::IntegrityFailure)));
}

#[tokio::test]
async fn deleted_block_fails_chain() {
    let (_, mut blocks) = four_blocks().await;
    blocks.remove(2);
    assert!(matches!(decrypt(blocks.concat()).await, Err(CipherError::IntegrityFailure)));
}

#[tokio::test]
async fn deleted_terminal_block_is_missing_terminal() {
    let (_, mut blocks) = four_blocks().await;
    blocks.pop();
    assert!(matches!(decrypt(blocks.concat()).await, Err(CipherError::MissingTerminal)));
}

#[tokio::test]
async fn duplicated_terminal_block_fails_chain() {
    let (_, mut blocks) = four_blocks().await;
    let last = blocks[3].clone();
    blocks.push(last);
    assert!(matches!(decrypt(blocks.concat()).await, Err(CipherError::IntegrityFailure)));
}

/// A correctly signed and chained block after the terminal one.
#[tokio::test]
async fn signed_block_after_terminal_is_rejected() {
    let (_, mut blocks) = four_blocks().await;
    let info = get_cipher_stream_info(UserCred::from_bytes(CRED), &blocks[0][..]).await.unwrap();
    let cred = UserCred::from_bytes(CRED);
    let sk = derive_signing_key(&cred, &info.slt).unwrap();
    let ek = derive_cipher_key(
        info.alg,
        info.ic,
        &SecretString::from(PASSWORD.to_string()),
        &cred,
        &info.slt,
    )
    .unwrap();

    let alg = Algorithm::AesGcm;
    let iv = [0x5a; 12];
    let mut additional_data = alg.id().to_le_bytes().to_vec();
    additional_data.extend_from_slice(&iv);
    let encrypted_data = alg.seal(&ek, &iv, b"smuggled", &additional_data).unwrap();

    let size = (additional_data.len() + encrypted_data.len()) as u32;
    let mut header = vec![0u8; HEADER_BYTES];
    header[32..34].copy_from_slice(&5u16.to_le_bytes());
    header[34..37].copy_from_slice(&size.to_le_bytes()[..3]);

    let previous = &blocks[3][..MAC_BYTES];
    let mut mac = <Blake2bMac<U32> as Mac>::new_from_slice(sk.as_bytes()).unwrap();
    mac.update(&header[MAC_BYTES..]);
    mac.update(&additional_data);
    mac.update(&encrypted_data);
    mac.update(previous);
    header[..MAC_BYTES].copy_from_slice(&mac.finalize().into_bytes());

    blocks.push([header, additional_data, encrypted_data].concat());
    assert!(matches!(decrypt(blocks.concat()).await, Err(CipherError::ExtraTerminal)));
}
