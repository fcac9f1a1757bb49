//! Wire-format constants. All multi-byte integers are little-endian.

pub const MAC_BYTES: usize = 32;
pub const ALG_BYTES: usize = 2;
pub const SLT_BYTES: usize = 16;
pub const IC_BYTES: usize = 4;
pub const LPP_BYTES: usize = 1;
pub const VER_BYTES: usize = 2;
pub const PAYLOAD_SIZE_BYTES: usize = 3;
pub const FLAGS_BYTES: usize = 1;
pub const HINT_LEN_BYTES: usize = 1;
pub const USERCRED_BYTES: usize = 32;

/// Size of every derived key (cipher, signing, hint).
pub const KEY_BYTES: usize = 32;

/// Random bytes drawn per block0, split into salt then iv.
pub const BLOCK0_RANDOM_BYTES: usize = 48;

pub const IV_MIN_BYTES: usize = 12;
pub const IV_MAX_BYTES: usize = 32;

pub const AUTH_TAG_MIN_BYTES: usize = 16;
pub const AUTH_TAG_MAX_BYTES: usize = 32;

pub const ENCRYPTED_HINT_MAX_BYTES: usize = 255;
/// Hint length limit in characters, sized so that even multi-byte
/// characters usually fit in the encrypted hint field.
pub const HINT_MAX_LEN: usize = ENCRYPTED_HINT_MAX_BYTES / 2 - AUTH_TAG_MAX_BYTES;
/// Clear hint bytes are cut to this before encryption.
pub const HINT_CLEAR_MAX_BYTES: usize = ENCRYPTED_HINT_MAX_BYTES - AUTH_TAG_MAX_BYTES;

/// `mac ‖ ver ‖ payloadSize ‖ flags`
pub const HEADER_BYTES: usize = MAC_BYTES + VER_BYTES + PAYLOAD_SIZE_BYTES + FLAGS_BYTES;

pub const PAYLOAD_SIZE_MIN: usize = IV_MIN_BYTES + ALG_BYTES + AUTH_TAG_MIN_BYTES + 1;
pub const PAYLOAD_SIZE_MAX: usize = (1 << (8 * PAYLOAD_SIZE_BYTES)) - 1;

pub const ADDITIONAL_DATA_MAX_BYTES: usize = ALG_BYTES
    + IV_MAX_BYTES
    + IC_BYTES
    + SLT_BYTES
    + LPP_BYTES
    + HINT_LEN_BYTES
    + ENCRYPTED_HINT_MAX_BYTES;

pub const CLEAR_DATA_MAX_BYTES: usize =
    PAYLOAD_SIZE_MAX - ADDITIONAL_DATA_MAX_BYTES - AUTH_TAG_MAX_BYTES;

pub const ICOUNT_MIN: u32 = 420_000;
pub const ICOUNT_DEFAULT: u32 = 1_000_000;
/// Fits in 4 bytes, rounded down to millions.
pub const ICOUNT_MAX: u32 = 4_294_000_000;

pub const LP_MAX: u8 = 16;

pub const VERSION1: u16 = 1;
pub const VERSION4: u16 = 4;
pub const VERSION5: u16 = 5;
pub const CURRENT_VERSION: u16 = VERSION5;

/// V1 has no version field; the same offset holds an algorithm id, which is
/// always below this value.
pub const V1_BELOW: u16 = VERSION4;

/// Flags bit marking the final block of a pass (V5+).
pub const FLAG_TERMINAL: u8 = 0x01;

pub const READ_SIZE_START: usize = 1024 * 1024;
pub const READ_SIZE_MAX: usize = READ_SIZE_START * 8;

const _: () = assert!(READ_SIZE_MAX <= CLEAR_DATA_MAX_BYTES);
const _: () = assert!(HINT_MAX_LEN == 95);
