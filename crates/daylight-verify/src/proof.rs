//! Value types shared across the verification pipeline: digests, the tuple
//! leaf codec, inclusion proofs, and the structural error taxonomy.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Size in bytes of every digest handled by the attestation protocol.
pub const DIGEST_SIZE: usize = 32;

/// Width in bytes of the encoded height inside a leaf pre-image.
///
/// The attestation network hashes ABI-encoded tuples, so the height occupies
/// a full big-endian EVM word.
pub const HEIGHT_WORD_SIZE: usize = 32;

/// Structural problems in proof or attestation data.
///
/// These always indicate a caller or data bug, never a transient condition.
/// A well-formed proof that simply does not reconstruct the attested root is
/// not an error, see [`crate::verify::Verdict::NotCommitted`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedProof {
    /// A supplied hash is not exactly [`DIGEST_SIZE`] bytes
    #[error("digest must be {DIGEST_SIZE} bytes, got {0}")]
    DigestLength(usize),
    /// A supplied hash string is not valid hex
    #[error("digest is not valid hex: {0}")]
    DigestEncoding(String),
    /// The leaf position does not fit the declared leaf count
    #[error("leaf key {key} is out of range for {num_leaves} leaves")]
    KeyOutOfRange { key: u64, num_leaves: u64 },
    /// The side node count does not match the tree height implied by the leaf count
    #[error("expected {expected} side nodes for {num_leaves} leaves, got {got}")]
    SideNodeCount {
        num_leaves: u64,
        expected: usize,
        got: usize,
    },
    /// The requested height falls outside the attestation's committed range
    #[error("height {height} is outside the attestation range [{start_height}, {end_height})")]
    HeightOutsideRange {
        height: u64,
        start_height: u64,
        end_height: u64,
    },
    /// The proof was generated for a different range or position than the
    /// attestation declares
    #[error(
        "proof shape (key {proof_key}, {proof_leaves} leaves) does not match \
         the attestation range (key {expected_key}, {expected_leaves} leaves)"
    )]
    RangeMismatch {
        proof_key: u64,
        proof_leaves: u64,
        expected_key: u64,
        expected_leaves: u64,
    },
}

/// A 32-byte hash: a transaction hash, a block's data root, an attested
/// tuple root, or a Merkle side node.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; DIGEST_SIZE]);

impl Digest {
    /// Raw bytes of the digest
    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }
}

impl From<[u8; DIGEST_SIZE]> for Digest {
    fn from(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Digest {
    type Error = MalformedProof;

    /// Length is validated at the boundary, never reinterpreted
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; DIGEST_SIZE] = bytes
            .try_into()
            .map_err(|_| MalformedProof::DigestLength(bytes.len()))?;
        Ok(Self(bytes))
    }
}

impl FromStr for Digest {
    type Err = MalformedProof;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes =
            hex::decode(s).map_err(|e| MalformedProof::DigestEncoding(e.to_string()))?;
        Self::try_from(bytes.as_slice())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// The pre-image hashed as a leaf of the attestation tree.
///
/// Conceptually one tuple exists per source-ledger block ever committed by an
/// attestation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRootTuple {
    /// Source-ledger block height
    pub height: u64,
    /// Data root of the block at `height`
    pub data_root: Digest,
}

impl DataRootTuple {
    /// Encode the tuple exactly as the attestation network hashed it when the
    /// tuple tree was built: a 32-byte big-endian height word followed by the
    /// raw bytes of the data root.
    ///
    /// This layout is a protocol constant. A deviation does not surface as an
    /// error, it silently turns honest proofs into false negatives.
    pub fn encode(&self) -> [u8; HEIGHT_WORD_SIZE + DIGEST_SIZE] {
        let mut out = [0u8; HEIGHT_WORD_SIZE + DIGEST_SIZE];
        out[HEIGHT_WORD_SIZE - 8..HEIGHT_WORD_SIZE].copy_from_slice(&self.height.to_be_bytes());
        out[HEIGHT_WORD_SIZE..].copy_from_slice(self.data_root.as_bytes());
        out
    }
}

/// Merkle inclusion proof of one tuple leaf against an attested tuple root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TupleInclusionProof {
    /// Sibling hash needed at each tree level, leaf to root
    pub side_nodes: Vec<Digest>,
    /// 0-based position of the leaf within the attested range
    pub key: u64,
    /// Total number of leaves committed by the attestation
    pub num_leaves: u64,
}
