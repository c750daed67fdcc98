//! Inclusion verification of a block's data root against a covering
//! attestation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attest::Attestation;
use crate::merkle;
use crate::proof::{DataRootTuple, Digest, MalformedProof, TupleInclusionProof};

/// Definitive outcome of a well-formed verification.
///
/// `NotCommitted` is a legitimate result, not an error: the proof is shaped
/// correctly but does not reconstruct the attested root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// The attestation covers the block's data root
    Committed,
    /// The proof is well-formed but does not reconstruct the attested root
    NotCommitted,
}

impl Verdict {
    pub fn is_committed(&self) -> bool {
        matches!(self, Verdict::Committed)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Committed => write!(f, "committed"),
            Verdict::NotCommitted => write!(f, "not committed"),
        }
    }
}

/// Verify that the data root of the block at `height` is covered by
/// `attestation`.
///
/// The proof's declared shape must match the attestation's range exactly:
/// `key == height - start_height` and `num_leaves == end_height -
/// start_height`. This guards against a proof generated for a different
/// range or height being replayed against an unrelated attestation.
///
/// Pure and synchronous; cost is proportional to `log2(num_leaves)`.
pub fn verify_inclusion(
    height: u64,
    data_root: &Digest,
    attestation: &Attestation,
    proof: &TupleInclusionProof,
) -> Result<Verdict, MalformedProof> {
    if !attestation.covers(height) {
        return Err(MalformedProof::HeightOutsideRange {
            height,
            start_height: attestation.start_height,
            end_height: attestation.end_height,
        });
    }

    let expected_key = height - attestation.start_height;
    let expected_leaves = attestation.num_leaves();
    if proof.key != expected_key || proof.num_leaves != expected_leaves {
        return Err(MalformedProof::RangeMismatch {
            proof_key: proof.key,
            proof_leaves: proof.num_leaves,
            expected_key,
            expected_leaves,
        });
    }

    let leaf = DataRootTuple {
        height,
        data_root: *data_root,
    }
    .encode();

    let ok = merkle::verify_inclusion_path(
        &leaf,
        &proof.side_nodes,
        proof.key,
        proof.num_leaves,
        &attestation.tuple_root,
    )?;

    Ok(if ok {
        Verdict::Committed
    } else {
        Verdict::NotCommitted
    })
}

/// Everything needed for one verification, assembled by the caller.
///
/// The core treats the request as an immutable value; it holds no state and
/// owns no resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    /// Source-ledger height of the block under scrutiny
    pub height: u64,
    /// The block's data root as fetched from the source ledger
    pub data_root: Digest,
    /// The attestation claimed to cover `height`
    pub attestation: Attestation,
    /// Inclusion proof of the tuple leaf against the attested root
    pub proof: TupleInclusionProof,
}

impl VerificationRequest {
    pub fn verify(&self) -> Result<Verdict, MalformedProof> {
        verify_inclusion(self.height, &self.data_root, &self.attestation, &self.proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::TupleTree;

    fn range_tuples(start: u64, end: u64) -> Vec<DataRootTuple> {
        (start..end)
            .map(|height| DataRootTuple {
                height,
                data_root: [height as u8; 32].into(),
            })
            .collect()
    }

    fn attested(nonce: u64, start: u64, end: u64) -> (Attestation, TupleTree) {
        let tree = TupleTree::from_tuples(&range_tuples(start, end));
        let attestation = Attestation {
            nonce,
            start_height: start,
            end_height: end,
            tuple_root: tree.root(),
        };
        (attestation, tree)
    }

    #[test]
    fn honest_proof_is_committed() {
        let (attestation, tree) = attested(0, 90, 105);
        let proof = tree.prove(10).unwrap();
        let verdict = verify_inclusion(100, &[100u8; 32].into(), &attestation, &proof).unwrap();
        assert_eq!(verdict, Verdict::Committed);
    }

    #[test]
    fn wrong_data_root_is_not_committed() {
        let (attestation, tree) = attested(0, 90, 105);
        let proof = tree.prove(10).unwrap();
        let mut data_root = [100u8; 32];
        data_root[7] ^= 0x01;
        let verdict = verify_inclusion(100, &data_root.into(), &attestation, &proof).unwrap();
        assert_eq!(verdict, Verdict::NotCommitted);
    }

    #[test]
    fn height_outside_range_is_malformed() {
        let (attestation, tree) = attested(0, 90, 105);
        let proof = tree.prove(10).unwrap();
        assert_eq!(
            verify_inclusion(105, &[0u8; 32].into(), &attestation, &proof),
            Err(MalformedProof::HeightOutsideRange {
                height: 105,
                start_height: 90,
                end_height: 105,
            })
        );
    }

    #[test]
    fn proof_for_another_range_is_malformed() {
        let (attestation, _) = attested(0, 90, 105);
        // Proof honestly generated for a different batch of 14 leaves
        let (_, other_tree) = attested(1, 90, 104);
        let proof = other_tree.prove(10).unwrap();
        assert_eq!(
            verify_inclusion(100, &[100u8; 32].into(), &attestation, &proof),
            Err(MalformedProof::RangeMismatch {
                proof_key: 10,
                proof_leaves: 14,
                expected_key: 10,
                expected_leaves: 15,
            })
        );
    }

    #[test]
    fn proof_for_another_key_is_malformed() {
        let (attestation, tree) = attested(0, 90, 105);
        let proof = tree.prove(9).unwrap();
        assert_eq!(
            verify_inclusion(100, &[100u8; 32].into(), &attestation, &proof),
            Err(MalformedProof::RangeMismatch {
                proof_key: 9,
                proof_leaves: 15,
                expected_key: 10,
                expected_leaves: 15,
            })
        );
    }

    #[test]
    fn request_value_delegates() {
        let (attestation, tree) = attested(0, 0, 4);
        let request = VerificationRequest {
            height: 2,
            data_root: [2u8; 32].into(),
            attestation,
            proof: tree.prove(2).unwrap(),
        };
        assert_eq!(request.verify(), Ok(Verdict::Committed));
    }
}
