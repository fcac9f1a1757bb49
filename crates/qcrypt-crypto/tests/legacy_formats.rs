//! Streams produced by earlier releases must keep decrypting.
//!
//! The byte strings below were written by the web client at the time each
//! format was current; none of them can be regenerated by this crate.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use qcrypt_crypto::{
    decrypt_stream, get_cipher_stream_info, read_all, Algorithm, CipherDataInfo, CipherError,
    CipherResult, Credentials, Decipher, Format, UserCred,
};

const V45_USER_CRED: [u8; 32] = [
    58, 28, 170, 106, 54, 250, 156, 83, 166, 217, 142, 101, 57, 57, 8, 146, 23, 55, 184, 6, 133,
    242, 197, 43, 98, 180, 61, 166, 219, 54, 164, 55,
];
const V45_PASSWORD: &str = "a 🌲 of course";
const V45_HINT: &str = "🌧️";
const V45_CLEAR: &str = "A nice 🦫 came to say hello";

const V4_CIPHER: [u8; 154] = [
    117, 163, 250, 117, 59, 97, 3, 10, 139, 12, 55, 161, 115, 52, 28, 105, 246, 126, 220, 0, 129,
    151, 165, 136, 46, 97, 163, 160, 91, 9, 189, 218, 4, 0, 116, 0, 0, 0, 2, 0, 16, 242, 98, 46,
    102, 223, 79, 227, 209, 73, 22, 207, 92, 80, 75, 125, 125, 234, 18, 21, 88, 64, 43, 68, 25,
    193, 133, 31, 159, 156, 8, 184, 10, 164, 33, 46, 20, 159, 218, 222, 64, 119, 27, 0, 0, 23, 5,
    135, 172, 203, 4, 101, 163, 155, 133, 221, 40, 227, 91, 222, 227, 213, 97, 77, 24, 117, 60,
    188, 27, 153, 253, 134, 10, 112, 75, 76, 146, 132, 123, 217, 7, 171, 211, 24, 206, 186, 248,
    244, 119, 18, 165, 195, 59, 160, 76, 31, 90, 80, 53, 19, 39, 143, 99, 141, 109, 68, 72, 63,
    121, 199, 96, 95, 157, 81,
];

const V5_CIPHER: [u8; 154] = [
    166, 123, 188, 183, 212, 97, 47, 147, 59, 39, 78, 222, 101, 74, 221, 53, 27, 11, 194, 67, 156,
    235, 116, 104, 65, 64, 76, 166, 29, 220, 71, 179, 5, 0, 116, 0, 0, 1, 2, 0, 121, 78, 37, 8,
    192, 196, 110, 22, 164, 106, 59, 161, 122, 165, 176, 147, 49, 43, 41, 250, 163, 111, 218, 4,
    174, 61, 6, 169, 145, 216, 66, 166, 139, 82, 19, 207, 29, 75, 105, 149, 64, 119, 27, 0, 0, 23,
    93, 92, 56, 163, 242, 71, 208, 3, 190, 44, 140, 222, 149, 159, 152, 193, 162, 44, 177, 93,
    197, 119, 131, 88, 92, 53, 108, 167, 253, 64, 216, 200, 121, 212, 193, 153, 180, 39, 92, 35,
    142, 6, 240, 115, 51, 211, 198, 63, 12, 126, 128, 206, 178, 114, 65, 37, 246, 197, 19, 79, 58,
    96, 56, 86, 172, 162, 217, 70,
];

/// Valid block0 with the terminal flag clear and nothing after it.
const V5_NO_TERMINAL: [u8; 154] = [
    225, 67, 20, 31, 134, 179, 27, 202, 138, 52, 68, 42, 197, 34, 48, 209, 76, 235, 39, 166, 101,
    12, 253, 101, 237, 25, 234, 119, 91, 227, 169, 172, 5, 0, 116, 0, 0, 0, 2, 0, 53, 140, 213,
    212, 134, 206, 178, 102, 222, 97, 207, 8, 252, 103, 8, 64, 25, 112, 206, 146, 159, 150, 220,
    236, 162, 203, 172, 111, 119, 158, 192, 123, 81, 141, 89, 174, 126, 4, 65, 105, 64, 119, 27,
    0, 0, 23, 138, 253, 130, 153, 78, 2, 31, 195, 254, 142, 102, 116, 200, 50, 125, 8, 178, 151,
    113, 13, 205, 228, 10, 85, 83, 101, 57, 149, 191, 166, 4, 221, 153, 198, 0, 18, 185, 165, 203,
    53, 211, 218, 24, 198, 162, 13, 99, 240, 249, 210, 255, 200, 217, 232, 10, 187, 212, 92, 204,
    165, 217, 7, 202, 6, 114, 70, 200, 221,
];

const V1_USER_CRED: [u8; 32] = [
    198, 18, 166, 217, 14, 52, 226, 145, 164, 169, 245, 164, 79, 36, 247, 82, 135, 84, 71, 239,
    125, 108, 221, 48, 137, 177, 250, 178, 47, 110, 23, 194,
];
const V1_PASSWORD: &str = "9j5J4QnKD3D2R7Ks5gAAa";
const V1_HINT: &str = "royal";
const V1_CLEAR: &str = "physical farm bolt correct bee nonchalant glib high able pinch left quaint strip valuable exultant disgusted curved bless geese snatch zoom fat touch boot abject wink pretty accessible foamy";

const V1_AES_GCM: &str = "4FhRcUaBCS6rrfj8pmkyclbGORk-nVoo-Epq_0NZ3E0BAEE8XuQyAPODSpDZLh9fCrOSLERyCwWq9rzth9VAdxsAAQAV3pKmSTgTx99M_cAWV51Z2AFzgXyEQk-iZznhBgEsdTvIlwTdet5j7a8FqrlMlZiQRvlvLhOgAvsO0n5Pxkhxhv-lK9mLQ670gilLRTrRR-pKATz4hGMWIDCgC4ojnOMwluTtK0XosZ0dCcSy9nMgIhWP5co-LWwr-NWsY29uXFC9WZI5ZA4Ujt1BAsv-gUe7vhwFcPLkhFGgc6tIeo4ObcSm7oC7z4AjTQ9WtURpvgwoqA9ovHEMum2ViGSifXlemw304KMKGDQgsM3Fn9YacZjJO0YYMyiNi48ywQVCNkw_Fvo";
const V1_X20_PLY: &str = "D0WSIi0s18fTxqsg5CGOHV3boHS7yaCo9AGOmWM8G30CAKFIuXF7m1ZxGo4bL6P7SaXqw-IIv8N9ZKR44xaZKIdgys4pysPqkIRAdxsAAQAVSEeOnFNPWdrAli-fyq8dWfUK2aBmXWF7T6vt06Fl5ehzCOh9DtT4W6uckFBh7S_VFBpmeh1_VN1WWAVV-PUB8HvIRtrVAoRiZy6H-BhkOaZflJnIQpu15AkrZC5aY8e4ulwiWIrV_ep88a963_B5mme9TaVZyzeXuBbo6xFOuGsVoPybjU-DWBDKK3i2rGju62NOlthYTn3eP3e2UuT_wIt1IB30XNO3dsxmcKQAW70GwSDvlGH-KnNqoUw3BUf07PlOYaiP0YfwqxZa7Mr4FjZ-sgTZTg2yKB0Xc-LeuuRprvs";
const V1_AEGIS_256: &str = "ZhiPRZ7YOIjWXEMBFmyZsSWwor9WNId6oPXqBgJmCxkDAMCrHZhWSw5s_dZzPc-k9R2TqHmrs-8kYl2YCxT3PblxGLL51besQyoLQsuJHYvKGUB3GwABACXwMpAj4tQpvDM0yLAUJWwWFpSPHMxwMtxvB6xUvbQQDRdzkm1rFPPYm_PfWPXh_vekCrJTjXCp22hvGCr9NhPTCxnhrPu4hpVkIaPawZ77bB6uAoXI8htcZoLrf2CuSx2-F-v7XRCNYtFfOpwLQQx1u_df4xpFZWXwz_pZafMN6dvbYniu3-x4Iwcj1RtzqOajBPrgMO143pTu9n2LlKUkeUVR3VmeJIFeXhdbUaVWo498Jeboltf7XLUGy--Ox5yVFaCcmPiYUZFe0UolFPJLPIAEHB4Smdw83LoHwwjgjedzvuyzi5SHpq03OYME87dUQBVdgIDwaxwIyJDxpbLvXP9P";

fn fixed_password(
    pwd: &'static str,
) -> impl Fn(CipherDataInfo) -> std::future::Ready<CipherResult<Credentials>> + Send + Sync {
    move |_info| std::future::ready(Ok(Credentials::new(pwd, None)))
}

async fn decrypt(cred: [u8; 32], pwd: &'static str, wire: Vec<u8>) -> CipherResult<Vec<u8>> {
    let reader = decrypt_stream(fixed_password(pwd), UserCred::from_bytes(cred), std::io::Cursor::new(wire)).await?;
    read_all(reader).await
}

#[tokio::test]
async fn v5_fixture_decrypts() {
    let info = get_cipher_stream_info(UserCred::from_bytes(V45_USER_CRED), &V5_CIPHER[..])
        .await
        .unwrap();
    assert_eq!(info.ver, 5);
    assert_eq!(info.alg, Algorithm::XChaCha20Poly1305);
    assert_eq!(info.ic, 1_800_000);
    assert_eq!((info.lp, info.lp_end), (1, 1));
    assert_eq!(info.hint.as_deref(), Some(V45_HINT));

    let clear = decrypt(V45_USER_CRED, V45_PASSWORD, V5_CIPHER.to_vec()).await.unwrap();
    assert_eq!(String::from_utf8(clear).unwrap(), V45_CLEAR);
}

#[tokio::test]
async fn v4_fixture_decrypts() {
    let mut decipher = Decipher::from_stream(UserCred::from_bytes(V45_USER_CRED), &V4_CIPHER[..])
        .await
        .unwrap();
    assert_eq!(decipher.format(), Format::V4);
    let info = decipher.cipher_data_info().await.unwrap();
    assert_eq!(info.ver, 4);
    assert_eq!(info.alg, Algorithm::XChaCha20Poly1305);
    assert_eq!(info.ic, 1_800_000);
    assert_eq!(info.hint.as_deref(), Some(V45_HINT));

    let clear = decrypt(V45_USER_CRED, V45_PASSWORD, V4_CIPHER.to_vec()).await.unwrap();
    assert_eq!(String::from_utf8(clear).unwrap(), V45_CLEAR);
}

#[tokio::test]
async fn v5_without_terminal_block_fails() {
    let mut decipher = Decipher::from_stream(UserCred::from_bytes(V45_USER_CRED), &V5_NO_TERMINAL[..])
        .await
        .unwrap();
    let clear = decipher.decrypt_block0(&fixed_password(V45_PASSWORD)).await.unwrap();
    assert_eq!(&clear[..], V45_CLEAR.as_bytes());

    let err = decipher.decrypt_block_n().await.unwrap_err();
    assert!(matches!(err, CipherError::MissingTerminal), "got {err:?}");

    let err = decrypt(V45_USER_CRED, V45_PASSWORD, V5_NO_TERMINAL.to_vec())
        .await
        .unwrap_err();
    assert!(matches!(err, CipherError::MissingTerminal), "got {err:?}");
}

#[tokio::test]
async fn v5_fixture_wrong_password() {
    let err = decrypt(V45_USER_CRED, "a 🌲 of course!", V5_CIPHER.to_vec())
        .await
        .unwrap_err();
    assert!(matches!(err, CipherError::CryptoOperationFailure));
}

#[tokio::test]
async fn v5_fixture_wrong_user_cred() {
    let mut cred = V45_USER_CRED;
    cred[0] ^= 1;
    let err = decrypt(cred, V45_PASSWORD, V5_CIPHER.to_vec()).await.unwrap_err();
    assert!(matches!(err, CipherError::IntegrityFailure));
}

async fn check_v1(encoded: &str, alg: Algorithm) {
    let wire = URL_SAFE_NO_PAD.decode(encoded).unwrap();

    let mut decipher = Decipher::from_stream(UserCred::from_bytes(V1_USER_CRED), &wire[..])
        .await
        .unwrap();
    assert_eq!(decipher.format(), Format::V1);
    let info = decipher.cipher_data_info().await.unwrap();
    assert_eq!(info.ver, 1);
    assert_eq!(info.alg, alg);
    assert_eq!((info.lp, info.lp_end), (1, 1));
    assert_eq!(info.hint.as_deref(), Some(V1_HINT));

    let clear = decrypt(V1_USER_CRED, V1_PASSWORD, wire).await.unwrap();
    assert_eq!(String::from_utf8(clear).unwrap(), V1_CLEAR);
}

#[tokio::test]
async fn v1_aes_gcm_fixture_decrypts() {
    check_v1(V1_AES_GCM, Algorithm::AesGcm).await;
}

#[tokio::test]
async fn v1_xchacha_fixture_decrypts() {
    check_v1(V1_X20_PLY, Algorithm::XChaCha20Poly1305).await;
}

#[tokio::test]
async fn v1_aegis_fixture_decrypts() {
    check_v1(V1_AEGIS_256, Algorithm::Aegis256).await;
}

#[tokio::test]
async fn v1_tampered_fixture_fails_mac() {
    let mut wire = URL_SAFE_NO_PAD.decode(V1_AES_GCM).unwrap();
    let last = wire.len() - 1;
    wire[last] ^= 0x01;
    let err = decrypt(V1_USER_CRED, V1_PASSWORD, wire).await.unwrap_err();
    assert!(matches!(err, CipherError::IntegrityFailure));
}
