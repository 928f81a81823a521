//! Payload masking (RFC 6455 Section 5.3).
//!
//! Masking is a XOR of each payload byte with `mask[i % 4]`, so applying the
//! same key twice restores the original data.

/// Scalar byte-by-byte XOR masking.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// Word-at-a-time masking, processing 4 bytes per step.
///
/// Produces the same output as [`apply_mask`].
#[inline]
pub fn apply_mask_fast(data: &mut [u8], mask: [u8; 4]) {
    let mask_u32 = u32::from_ne_bytes(mask);
    let mut chunks = data.chunks_exact_mut(4);

    for chunk in &mut chunks {
        let val = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        chunk.copy_from_slice(&(val ^ mask_u32).to_ne_bytes());
    }

    // Remainder starts on a 4-byte boundary, so the key index restarts at 0.
    for (i, byte) in chunks.into_remainder().iter_mut().enumerate() {
        *byte ^= mask[i];
    }
}

/// Generate a fresh 4-byte masking key.
///
/// Falls back to system time if the OS random source is unavailable.
#[must_use]
pub fn random_mask() -> [u8; 4] {
    let mut buf = [0u8; 4];
    if getrandom::getrandom(&mut buf).is_ok() {
        buf
    } else {
        use std::time::{SystemTime, UNIX_EPOCH};
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u32)
            .unwrap_or(0x1234_5678);
        nanos.wrapping_mul(0x85EB_CA6B).to_le_bytes()
    }
}
