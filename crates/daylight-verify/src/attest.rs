//! Attestation records and covering-range selection.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::proof::Digest;

/// A target-ledger record binding a nonce and a contiguous source-ledger
/// height range to a tuple root.
///
/// Attestations are produced externally on a cadence and immutable once
/// observed. Nonces increase monotonically; the verifier does not assume the
/// ranges are globally contiguous, it only needs one that covers the height
/// in question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    /// Monotonically increasing identifier of the attestation
    pub nonce: u64,
    /// First source-ledger height covered (inclusive)
    pub start_height: u64,
    /// First source-ledger height not covered (exclusive)
    pub end_height: u64,
    /// Merkle root of the tuple tree over the covered range
    pub tuple_root: Digest,
}

impl Attestation {
    /// Whether `height` falls inside the committed `[start, end)` range
    pub fn covers(&self, height: u64) -> bool {
        self.start_height <= height && height < self.end_height
    }

    /// Number of tuple leaves committed by this attestation
    pub fn num_leaves(&self) -> u64 {
        self.end_height.saturating_sub(self.start_height)
    }
}

/// Select the attestation whose range covers `height`.
///
/// Returns `None` when no known attestation covers the height. Callers must
/// treat that as "cannot determine yet", a later attestation may still cover
/// it, and never as "not committed". Should several attestations cover the
/// same height (a malformed stream), the most recent nonce wins and the
/// ambiguity is logged at warn level rather than failing hard.
pub fn find_covering(height: u64, attestations: &[Attestation]) -> Option<&Attestation> {
    let covering: Vec<&Attestation> = attestations.iter().filter(|a| a.covers(height)).collect();
    let best = covering.iter().copied().max_by_key(|a| a.nonce)?;
    if covering.len() > 1 {
        warn!(
            height,
            candidates = covering.len(),
            chosen_nonce = best.nonce,
            "multiple attestations cover the same height, preferring the most recent"
        );
    }
    Some(best)
}
