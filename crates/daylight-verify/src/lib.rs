//! Daylight verification library
//!
//! This crate checks that a source-ledger block's data root is covered by an
//! attestation held on an independent target ledger. It provides the tuple
//! leaf codec, the binary Merkle inclusion verifier, covering-attestation
//! selection, and the service tying them together. Everything here is pure
//! and synchronous; fetching transactions, blocks, proofs, and attestations
//! is the job of the client crates.

pub mod attest;
pub mod merkle;
pub mod proof;
pub mod verify;

pub use attest::{find_covering, Attestation};
pub use proof::{DataRootTuple, Digest, MalformedProof, TupleInclusionProof, DIGEST_SIZE};
pub use verify::{verify_inclusion, VerificationRequest, Verdict};
