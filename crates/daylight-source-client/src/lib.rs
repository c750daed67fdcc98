//! Source-ledger RPC client for looking up transactions, block data roots,
//! and data-root inclusion proofs.
//!
//! The source ledger speaks Tendermint-flavored JSON-RPC: integers travel as
//! decimal strings, the header's data hash as hex, and proof aunts as base64.
//! This crate only fetches and decodes; all consistency checking between the
//! proof and the covering attestation happens in `daylight-verify`.

use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::HttpClient;
use jsonrpsee::rpc_params;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use daylight_verify::{Digest, TupleInclusionProof};

/// Error types for source-ledger RPC operations
#[derive(Error, Debug)]
pub enum SourceClientError {
    /// RPC client errors
    #[error("RPC client error: {0}")]
    RpcClient(#[from] jsonrpsee::core::client::Error),
    /// The transaction hash is unknown to the ledger
    #[error("transaction {0} not found on the source ledger")]
    TxNotFound(Digest),
    /// Failed to decode a base64 response field
    #[error("failed to decode base64 response field: {0}")]
    Base64Decode(#[from] base64::DecodeError),
    /// The response did not match the expected shape
    #[error("malformed RPC response: {0}")]
    InvalidResponse(String),
}

/// Default HTTP request timeout
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a transaction landed on the source ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxInfo {
    /// Height of the block containing the transaction
    pub height: u64,
    /// Position of the transaction within the block
    pub index: u32,
}

/// The slice of a block this system cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Commitment to all transaction data in the block
    pub data_root: Digest,
}

#[derive(Deserialize)]
struct TxResponse {
    height: String,
    index: u32,
}

#[derive(Deserialize)]
struct BlockResponse {
    block: BlockBody,
}

#[derive(Deserialize)]
struct BlockBody {
    header: BlockHeader,
}

#[derive(Deserialize)]
struct BlockHeader {
    data_hash: String,
}

#[derive(Deserialize)]
struct DataRootInclusionProofResponse {
    proof: RawMerkleProof,
}

#[derive(Deserialize)]
struct RawMerkleProof {
    total: String,
    index: String,
    aunts: Vec<String>,
}

/// Source-ledger RPC client
pub struct SourceLedgerClient {
    client: HttpClient,
}

impl SourceLedgerClient {
    /// Create a new client against the given RPC endpoint
    pub fn new(url: &str) -> Result<Self, SourceClientError> {
        let client = HttpClient::builder()
            .request_timeout(HTTP_REQUEST_TIMEOUT)
            .build(url)?;
        Ok(Self { client })
    }

    /// Look up the transaction by hash and report where it landed
    pub async fn get_transaction(&self, tx_hash: &Digest) -> Result<TxInfo, SourceClientError> {
        let hash_b64 = general_purpose::STANDARD.encode(tx_hash.as_bytes());
        let response: Result<TxResponse, _> =
            self.client.request("tx", rpc_params![hash_b64, false]).await;
        let response = match response {
            Ok(response) => response,
            // The ledger reports an unknown hash as a call error whose detail
            // (in `data` or `message`) says the tx was not found
            Err(jsonrpsee::core::client::Error::Call(err))
                if err.message().contains("not found")
                    || err
                        .data()
                        .map_or(false, |data| data.get().contains("not found")) =>
            {
                return Err(SourceClientError::TxNotFound(*tx_hash));
            }
            Err(err) => return Err(err.into()),
        };
        debug!(height = %response.height, index = response.index, "transaction located");
        Ok(TxInfo {
            height: parse_decimal(&response.height, "tx.height")?,
            index: response.index,
        })
    }

    /// Fetch the data root of the block at `height`
    pub async fn get_block(&self, height: u64) -> Result<BlockInfo, SourceClientError> {
        let response: BlockResponse = self
            .client
            .request("block", rpc_params![height.to_string()])
            .await?;
        let data_root = response
            .block
            .header
            .data_hash
            .parse::<Digest>()
            .map_err(|e| SourceClientError::InvalidResponse(e.to_string()))?;
        Ok(BlockInfo { data_root })
    }

    /// Fetch the inclusion proof of the data root at `height` within the
    /// tuple tree spanning `[start, end)`.
    ///
    /// The returned proof's key and leaf count are whatever the ledger
    /// reported; `daylight_verify::verify_inclusion` enforces that they are
    /// consistent with the attestation's range.
    pub async fn get_data_root_inclusion_proof(
        &self,
        height: u64,
        start: u64,
        end: u64,
    ) -> Result<TupleInclusionProof, SourceClientError> {
        let response: DataRootInclusionProofResponse = self
            .client
            .request(
                "data_root_inclusion_proof",
                rpc_params![height.to_string(), start.to_string(), end.to_string()],
            )
            .await?;
        let proof = response.proof;

        let mut side_nodes = Vec::with_capacity(proof.aunts.len());
        for aunt in &proof.aunts {
            let bytes = general_purpose::STANDARD.decode(aunt)?;
            let digest = Digest::try_from(bytes.as_slice())
                .map_err(|e| SourceClientError::InvalidResponse(e.to_string()))?;
            side_nodes.push(digest);
        }

        Ok(TupleInclusionProof {
            side_nodes,
            key: parse_decimal(&proof.index, "proof.index")?,
            num_leaves: parse_decimal(&proof.total, "proof.total")?,
        })
    }
}

/// Tendermint-style JSON encodes 64-bit integers as decimal strings
fn parse_decimal(value: &str, field: &'static str) -> Result<u64, SourceClientError> {
    value
        .parse()
        .map_err(|_| SourceClientError::InvalidResponse(format!("{field}: {value:?} is not a u64")))
}
