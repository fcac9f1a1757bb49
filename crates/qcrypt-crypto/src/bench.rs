//! PBKDF2 speed probe used to pick an iteration count for this machine.

use std::time::{Duration, Instant};

use hmac::Hmac;
use rand::RngCore;
use serde::Serialize;
use sha2::Sha512;
use tracing::info;

use crate::consts::{ICOUNT_DEFAULT, ICOUNT_MAX, ICOUNT_MIN, KEY_BYTES, SLT_BYTES, USERCRED_BYTES};
use crate::error::{CipherError, CipherResult};

/// Aim for this long per derivation.
pub const TARGET_HASH_MILLIS: u64 = 500;
/// Never recommend more than this.
pub const MAX_HASH_MILLIS: u64 = 5 * 60 * 1000;
pub const TEST_SIZE: u32 = ICOUNT_MIN;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IterationEstimate {
    /// Recommended iteration count.
    pub ic: u32,
    /// Upper bound worth offering.
    pub ic_max: u32,
    /// Iterations per millisecond.
    pub hash_rate: f64,
}

/// Time one derivation of `test_size` iterations and scale it to the
/// target and maximum durations.
pub async fn benchmark(test_size: u32, target: Duration, max: Duration) -> CipherResult<IterationEstimate> {
    if test_size == 0 {
        return Err(CipherError::invalid("benchmark test size must be positive"));
    }
    let elapsed = tokio::task::spawn_blocking(move || time_derivation(test_size))
        .await
        .map_err(|e| CipherError::Io(std::io::Error::other(e)))??;

    let estimate = estimate(test_size, elapsed, target, max);
    info!(
        test_size,
        elapsed_ms = elapsed.as_millis() as u64,
        rate = estimate.hash_rate.round(),
        ic = estimate.ic,
        ic_max = estimate.ic_max,
        "pbkdf2 benchmark"
    );
    Ok(estimate)
}

fn time_derivation(test_size: u32) -> CipherResult<Duration> {
    let mut user_cred = [0u8; USERCRED_BYTES];
    rand::thread_rng().fill_bytes(&mut user_cred);
    let mut material = b"AVeryBogusPwd".to_vec();
    material.extend_from_slice(&user_cred);

    let mut okm = [0u8; KEY_BYTES];
    let start = Instant::now();
    pbkdf2::pbkdf2::<Hmac<Sha512>>(&material, &[0u8; SLT_BYTES], test_size, &mut okm)
        .map_err(|e| CipherError::invalid(format!("PBKDF2 failed: {e}")))?;
    Ok(start.elapsed())
}

/// Pure scaling step of [`benchmark`].
pub fn estimate(test_size: u32, elapsed: Duration, target: Duration, max: Duration) -> IterationEstimate {
    // Sub-millisecond runs would divide by zero.
    let millis = elapsed.as_secs_f64().max(0.001) * 1000.0;
    let hash_rate = f64::from(test_size) / millis;

    let max_ms = max.as_secs_f64() * 1000.0;
    let target_ms = target.as_secs_f64() * 1000.0;

    let ic_max = ((max_ms * hash_rate / 1e6).round() * 1e6).min(f64::from(ICOUNT_MAX));
    let ic_target = (hash_rate * target_ms / 1e5).round() * 1e5 + f64::from(ICOUNT_MIN);
    let ic = ic_target.max(f64::from(ICOUNT_DEFAULT));

    IterationEstimate {
        ic: clamp_ic(ic),
        ic_max: clamp_ic(ic_max),
        hash_rate,
    }
}

fn clamp_ic(value: f64) -> u32 {
    value.clamp(f64::from(ICOUNT_MIN), f64::from(ICOUNT_MAX)) as u32
}
