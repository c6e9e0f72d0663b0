// src/fingerprint.rs

//! Content fingerprinting for change detection.
//!
//! A fingerprint is a compact digest of a bounded prefix of the fetched
//! document. Most change signals show up early in the markup, so hashing a
//! prefix keeps checks cheap without storing full snapshots. Collision
//! resistance only needs to hold at the scale of the monitored site list;
//! this is change detection, not integrity verification.

use std::fmt;

use sha2::{Digest, Sha256};

/// A fixed-width content digest (64 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 8]);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Pluggable digest algorithm over a bounded content prefix.
///
/// Implementations must be deterministic: identical input yields identical
/// digests across calls. The prefix length is passed per call so the
/// scheduler can use different bounds for lightweight and rendered fetches.
pub trait Fingerprinter: Send + Sync {
    /// Digest the first `prefix_len` bytes of `content`.
    fn digest(&self, content: &str, prefix_len: usize) -> Fingerprint;
}

/// Default fingerprinter: SHA-256 over the prefix, truncated to 8 bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Fingerprinter;

impl Fingerprinter for Sha256Fingerprinter {
    fn digest(&self, content: &str, prefix_len: usize) -> Fingerprint {
        let bytes = content.as_bytes();
        let prefix = &bytes[..bytes.len().min(prefix_len)];

        let hash = Sha256::digest(prefix);
        let mut out = [0u8; 8];
        out.copy_from_slice(&hash[..8]);
        Fingerprint(out)
    }
}
