// crates/framepress-core/src/hashing.rs
// ============================================================================
// Module: Framepress Hashing
// Description: SHA-256 helpers with stable lowercase-hex encoding.
// Purpose: Verify template archive integrity against declared checksums.
// Dependencies: sha2
// ============================================================================

//! ## Overview
//! Archive digests are computed over raw bytes; file digests stream the
//! file in fixed 4 KiB blocks so large archives never load into memory.
//! All digests encode as lowercase hex for comparison against the
//! request-declared checksum.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io;
use std::io::Read;
use std::path::Path;

use sha2::Digest;
use sha2::Sha256;

/// Block size for streaming file digests.
const HASH_BLOCK_BYTES: usize = 4096;

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Returns the lowercase-hex SHA-256 of a byte slice.
#[must_use]
pub fn sha256_hex_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

/// Returns the lowercase-hex SHA-256 of a file, streamed in 4 KiB blocks.
///
/// # Errors
///
/// Returns the underlying I/O error when the file cannot be read.
pub fn sha256_hex_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut block = [0u8; HASH_BLOCK_BYTES];
    loop {
        let read = file.read(&mut block)?;
        if read == 0 {
            break;
        }
        hasher.update(&block[..read]);
    }
    Ok(hex_encode(&hasher.finalize()))
}

/// Encodes bytes as lowercase hex.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[usize::from(byte >> 4)] as char);
        out.push(HEX[usize::from(byte & 0x0f)] as char);
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================
