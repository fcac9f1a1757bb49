//! qcrypt-crypto: streaming password-based authenticated encryption
//!
//! Pipeline: clear bytes → blocks (AEAD + chained BLAKE2b MAC) → optional extra passes → wire bytes
//!
//! Key hierarchy, fresh per pass:
//! ```text
//! password ‖ userCred
//!   └── Cipher Key: PBKDF2-HMAC-SHA512(salt, ic)
//! userCred
//!   ├── Signing Key: HKDF-SHA512(salt, "cipherdata signing key")
//!   └── Hint Key: HKDF-SHA512(salt, "hint encryption key")
//! ```
//!
//! Algorithms: AES-256-GCM, XChaCha20-Poly1305, AEGIS-256. Encryption always
//! writes V5; decryption also reads V4 and V1.

pub mod additional_data;
pub mod alg;
pub mod bench;
pub mod codec;
pub mod consts;
pub mod decipher;
pub mod encipher;
pub mod error;
pub mod kdf;
pub mod keys;
mod mac;
pub mod provider;
pub mod reader;
pub mod state;
pub mod stream;
pub mod types;

pub use alg::Algorithm;
pub use bench::{benchmark, IterationEstimate};
pub use decipher::{Decipher, Format};
pub use encipher::Encipher;
pub use error::{CipherError, CipherResult};
pub use keys::{DerivedKey, UserCred};
pub use provider::{Credentials, PasswordProvider};
pub use state::CipherState;
pub use stream::{decrypt_stream, encrypt_stream, get_cipher_stream_info, read_all, BoxedReader};
pub use types::{CipherDataBlock, CipherDataInfo, EContext, EParams};
