//! Narrow interfaces to the remote services the verification flow consumes.
//!
//! The flow only ever needs these few operations; the traits keep the
//! orchestration testable without a live ledger on either side.

use anyhow::Result;
use async_trait::async_trait;

use daylight_registry_client::RegistryClient;
use daylight_source_client::SourceLedgerClient;
use daylight_verify::{Attestation, Digest, TupleInclusionProof};

/// Read-only view of the source ledger
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceLedger {
    /// Height of the block containing the transaction, or an error if the
    /// hash is unknown
    async fn transaction_height(&self, tx_hash: &Digest) -> Result<u64>;

    /// Data root of the block at `height`
    async fn block_data_root(&self, height: u64) -> Result<Digest>;

    /// Inclusion proof of the data root at `height` within the tuple tree
    /// spanning `[start, end)`
    async fn range_inclusion_proof(
        &self,
        height: u64,
        start: u64,
        end: u64,
    ) -> Result<TupleInclusionProof>;
}

/// Read-only view of the attestation registry on the target ledger
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttestationRegistry {
    /// All attestations currently stored by the registry
    async fn attestations(&self) -> Result<Vec<Attestation>>;
}

#[async_trait]
impl SourceLedger for SourceLedgerClient {
    async fn transaction_height(&self, tx_hash: &Digest) -> Result<u64> {
        Ok(self.get_transaction(tx_hash).await?.height)
    }

    async fn block_data_root(&self, height: u64) -> Result<Digest> {
        Ok(self.get_block(height).await?.data_root)
    }

    async fn range_inclusion_proof(
        &self,
        height: u64,
        start: u64,
        end: u64,
    ) -> Result<TupleInclusionProof> {
        Ok(self.get_data_root_inclusion_proof(height, start, end).await?)
    }
}

#[async_trait]
impl AttestationRegistry for RegistryClient {
    async fn attestations(&self) -> Result<Vec<Attestation>> {
        Ok(RegistryClient::attestations(self).await?)
    }
}
