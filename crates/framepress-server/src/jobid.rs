// crates/framepress-server/src/jobid.rs
// ============================================================================
// Module: Job Identifier Generation
// Description: Per-request job identifier minting.
// Purpose: Mint unique, sortable-by-time job identifiers.
// Dependencies: rand
// ============================================================================

//! ## Overview
//! Job identifiers have the shape `job_{unix_millis}_{8 lowercase hex}`.
//! The millisecond prefix keeps identifiers roughly time-ordered; the
//! random suffix comes from the operating system RNG so concurrent
//! requests in the same millisecond stay distinct.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use framepress_core::JobId;
use rand::RngCore;
use rand::rngs::OsRng;

// ============================================================================
// SECTION: Generator
// ============================================================================

/// Job identifier generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobIdGenerator;

impl JobIdGenerator {
    /// Mints one job identifier.
    #[must_use]
    pub fn issue(&self) -> JobId {
        let unix_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis());
        let suffix = OsRng.next_u32();
        JobId::new(format!("job_{unix_millis}_{suffix:08x}"))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests minted identifiers match the documented shape.
    #[test]
    fn issued_ids_match_shape() {
        let id = JobIdGenerator.issue();
        let id = id.as_str();
        let mut parts = id.splitn(3, '_');
        assert_eq!(parts.next(), Some("job"));
        let millis = parts.next().expect("millis part");
        assert!(millis.bytes().all(|b| b.is_ascii_digit()));
        let suffix = parts.next().expect("suffix part");
        assert_eq!(suffix.len(), 8);
        assert!(suffix.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    }

    /// Tests consecutive identifiers are distinct.
    #[test]
    fn issued_ids_are_distinct() {
        let generator = JobIdGenerator;
        let first = generator.issue();
        let second = generator.issue();
        assert_ne!(first, second);
    }
}
