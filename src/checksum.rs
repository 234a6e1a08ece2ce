//! Whole-page and whole-region checksum primitive.
//!
//! Every page of a [`crate::paged`] stream, and every self-checksummed
//! region of the delete log, ends in a `CHECKSUM_SIZE`-byte trailer computed
//! over the preceding bytes. The algorithm is CRC-32C (Castagnoli); it is
//! deterministic and byte-order stable across platforms, as required.

/// Size in bytes of a checksum trailer (`C` in spec terms).
pub const CHECKSUM_SIZE: usize = 4;

/// Compute the CRC-32C of `data` and append it as 4 little-endian bytes.
///
/// `buf[..len]` holds the content; bytes `[len - CHECKSUM_SIZE, len)` are
/// overwritten with the checksum of `buf[..len - CHECKSUM_SIZE]`. `buf` must
/// be at least `len` bytes long.
///
/// # Panics
///
/// Panics if `len < CHECKSUM_SIZE` or `buf.len() < len`.
pub fn append(buf: &mut [u8], len: usize) {
    assert!(len >= CHECKSUM_SIZE, "region too small for a checksum trailer");
    assert!(buf.len() >= len, "buffer shorter than len");
    let body_len = len - CHECKSUM_SIZE;
    let crc = crc32c::crc32c(&buf[..body_len]);
    buf[body_len..len].copy_from_slice(&crc.to_le_bytes());
}

/// Verify that `buf[..len]` ends in a valid checksum trailer of its own
/// preceding bytes.
///
/// Returns `true` iff the trailing 4 bytes equal the CRC-32C of
/// `buf[..len - CHECKSUM_SIZE]`.
pub fn verify(buf: &[u8], len: usize) -> bool {
    if len < CHECKSUM_SIZE || buf.len() < len {
        return false;
    }
    let body_len = len - CHECKSUM_SIZE;
    let stored = u32::from_le_bytes(buf[body_len..len].try_into().unwrap());
    let computed = crc32c::crc32c(&buf[..body_len]);
    stored == computed
}
