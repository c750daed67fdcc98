//! Daylight client library
//!
//! Orchestrates the end-to-end inclusion check: locate a transaction on the
//! source ledger, fetch its block's data root, find the covering attestation
//! in the target-ledger registry, fetch the matching inclusion proof, and
//! verify locally with `daylight-verify`.

pub mod collaborators;
pub mod fetch;

use daylight_registry_client::{Address, RegistryClient, RegistryClientError};
use daylight_source_client::{SourceClientError, SourceLedgerClient};

pub use fetch::{fetch_verification_request, FetchOutcome};

/// Explicit wiring for the remote collaborators; nothing is read from
/// ambient globals.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// RPC endpoint of the source ledger
    pub source_ledger_endpoint: String,
    /// RPC endpoint of the EVM chain holding the registry
    pub target_ledger_endpoint: String,
    /// Address of the attestation registry contract
    pub attestation_registry_address: Address,
}

impl ClientConfig {
    /// Build the source-ledger client for this configuration
    pub fn source_client(&self) -> Result<SourceLedgerClient, SourceClientError> {
        SourceLedgerClient::new(&self.source_ledger_endpoint)
    }

    /// Build the registry client for this configuration
    pub fn registry_client(&self) -> Result<RegistryClient, RegistryClientError> {
        RegistryClient::new(
            &self.target_ledger_endpoint,
            self.attestation_registry_address,
        )
    }
}
