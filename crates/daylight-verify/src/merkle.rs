//! Binary Merkle inclusion verification over data root tuples, plus an
//! in-memory tuple tree used for fixtures and local cross-checks.
//!
//! Leaf and internal nodes are hashed in separate domains (RFC 6962 style)
//! so a leaf pre-image can never be confused with an internal node.

use sha2::{Digest as _, Sha256};

use crate::proof::{DataRootTuple, Digest, MalformedProof, TupleInclusionProof};

/// Domain prefix for leaf hashes
const LEAF_PREFIX: u8 = 0x00;
/// Domain prefix for internal node hashes
const NODE_PREFIX: u8 = 0x01;

/// Hash a leaf pre-image into its leaf digest
pub fn leaf_digest(data: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(data);
    Digest::from(<[u8; 32]>::from(hasher.finalize()))
}

/// Hash two child digests into their parent digest
pub fn node_digest(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update([NODE_PREFIX]);
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Digest::from(<[u8; 32]>::from(hasher.finalize()))
}

/// Number of side nodes a well-formed proof must carry for `num_leaves`
/// leaves: `ceil(log2(num_leaves))`, zero for a single-leaf tree.
pub fn path_length(num_leaves: u64) -> usize {
    if num_leaves <= 1 {
        0
    } else {
        (u64::BITS - (num_leaves - 1).leading_zeros()) as usize
    }
}

/// Recompute the root implied by `leaf` and `side_nodes` and compare it to
/// `expected_root`.
///
/// Returns `Ok(false)` for an empty tree (no valid proof exists) and for a
/// well-formed proof that reconstructs a different root. Shape problems,
/// a key outside the tree or a side node count that does not match the tree
/// height, are reported as [`MalformedProof`], never as a boolean.
pub fn verify_inclusion_path(
    leaf: &[u8],
    side_nodes: &[Digest],
    key: u64,
    num_leaves: u64,
    expected_root: &Digest,
) -> Result<bool, MalformedProof> {
    if num_leaves == 0 {
        return Ok(false);
    }
    if key >= num_leaves {
        return Err(MalformedProof::KeyOutOfRange { key, num_leaves });
    }
    let expected = path_length(num_leaves);
    if side_nodes.len() != expected {
        return Err(MalformedProof::SideNodeCount {
            num_leaves,
            expected,
            got: side_nodes.len(),
        });
    }

    let mut node = leaf_digest(leaf);
    let mut key = key;
    for side in side_nodes {
        node = if key & 1 == 0 {
            node_digest(&node, side)
        } else {
            node_digest(side, &node)
        };
        key >>= 1;
    }

    // Full 32-byte comparison, no truncation
    Ok(node == *expected_root)
}

/// Complete binary Merkle tree over encoded data root tuples.
///
/// Leaf counts that are not a power of two are padded to the next power of
/// two with the digest of the empty leaf, so every inclusion proof carries
/// exactly [`path_length`] side nodes. The tree exists to build fixtures and
/// to cross-check remotely produced proofs and roots; it is not an
/// attestation production pipeline.
#[derive(Debug, Clone)]
pub struct TupleTree {
    num_leaves: u64,
    /// levels[0] holds the padded leaf digests, the last level the root
    levels: Vec<Vec<Digest>>,
}

impl TupleTree {
    /// Build the tree over the given tuples, in leaf order
    pub fn from_tuples(tuples: &[DataRootTuple]) -> Self {
        let mut leaves: Vec<Digest> = tuples.iter().map(|t| leaf_digest(&t.encode())).collect();
        let padded = leaves.len().max(1).next_power_of_two();
        leaves.resize(padded, leaf_digest(&[]));

        let mut levels = vec![leaves];
        while levels.last().map_or(false, |level| level.len() > 1) {
            let prev = levels.last().expect("levels is never empty");
            let next = prev
                .chunks(2)
                .map(|pair| node_digest(&pair[0], &pair[1]))
                .collect();
            levels.push(next);
        }

        Self {
            num_leaves: tuples.len() as u64,
            levels,
        }
    }

    /// Number of real (unpadded) leaves
    pub fn num_leaves(&self) -> u64 {
        self.num_leaves
    }

    /// Root digest of the tree
    pub fn root(&self) -> Digest {
        self.levels.last().expect("levels is never empty")[0]
    }

    /// Extract the inclusion proof for the leaf at `key`
    pub fn prove(&self, key: u64) -> Result<TupleInclusionProof, MalformedProof> {
        if key >= self.num_leaves {
            return Err(MalformedProof::KeyOutOfRange {
                key,
                num_leaves: self.num_leaves,
            });
        }
        let mut side_nodes = Vec::with_capacity(self.levels.len() - 1);
        let mut index = key as usize;
        for level in &self.levels[..self.levels.len() - 1] {
            side_nodes.push(level[index ^ 1]);
            index >>= 1;
        }
        Ok(TupleInclusionProof {
            side_nodes,
            key,
            num_leaves: self.num_leaves,
        })
    }
}
