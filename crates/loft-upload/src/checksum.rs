//! CRC32 chunk checksums
//!
//! The same IEEE polynomial must be computed on sender and receiver; it is
//! cheap enough to run per chunk without slowing ingestion. A mismatch is
//! never fatal: the protocol layer asks the client to resend the chunk.

/// Compute the checksum a client is expected to send for `data`.
pub fn checksum_of(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Validate a chunk payload against the client-supplied checksum.
pub fn validate(payload: &[u8], declared: u32) -> bool {
    let calculated = crc32fast::hash(payload);
    let matched = calculated == declared;

    tracing::debug!(
        calculated,
        received = declared,
        matched,
        size_bytes = payload.len(),
        "Chunk checksum validation"
    );

    matched
}
