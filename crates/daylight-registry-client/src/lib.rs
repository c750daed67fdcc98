//! Target-ledger client for the attestation registry contract.
//!
//! The registry lives on an EVM-compatible chain. Reads go through plain
//! JSON-RPC: `eth_call` for the latest-nonce cursor and the on-chain
//! cross-check, `eth_getLogs` for the stored attestations. The contract
//! surface is small enough that calldata and event words are encoded and
//! decoded by hand against the signatures pinned below.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::HttpClient;
use jsonrpsee::rpc_params;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tiny_keccak::{Hasher, Keccak};
use tracing::debug;

use daylight_verify::{Attestation, DataRootTuple, Digest, TupleInclusionProof};

/// Error types for registry RPC operations
#[derive(Error, Debug)]
pub enum RegistryClientError {
    /// RPC client errors
    #[error("RPC client error: {0}")]
    RpcClient(#[from] jsonrpsee::core::client::Error),
    /// A contract address string could not be parsed
    #[error("invalid contract address: {0}")]
    InvalidAddress(String),
    /// Failed to decode a hex response field
    #[error("failed to decode hex response field: {0}")]
    HexDecode(#[from] hex::FromHexError),
    /// The response did not match the expected shape
    #[error("malformed RPC response: {0}")]
    InvalidResponse(String),
}

/// Default HTTP request timeout
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Getter for the registry's monotonically increasing attestation cursor
const LATEST_NONCE_SIGNATURE: &str = "state_proofNonce()";

/// Event emitted once per stored attestation; the nonce is indexed, the
/// range bounds and tuple root travel in the data section
const ATTESTATION_EVENT_SIGNATURE: &str = "AttestationStored(uint256,uint64,uint64,bytes32)";

/// On-chain counterpart of the local verifier, kept as a cross-check
const VERIFY_ATTESTATION_SIGNATURE: &str =
    "verifyAttestation(uint256,(uint256,bytes32),(bytes32[],uint256,uint256))";

const WORD: usize = 32;

/// A 20-byte EVM contract address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address([u8; 20]);

impl Address {
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = RegistryClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped)
            .map_err(|_| RegistryClientError::InvalidAddress(s.to_string()))?;
        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|_| RegistryClientError::InvalidAddress(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut keccak = Keccak::v256();
    keccak.update(data);
    let mut out = [0u8; 32];
    keccak.finalize(&mut out);
    out
}

/// First four bytes of the keccak-256 of a function signature
fn selector(signature: &str) -> [u8; 4] {
    let digest = keccak256(signature.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

/// Full keccak-256 of an event signature, used as `topics[0]`
fn event_topic(signature: &str) -> [u8; 32] {
    keccak256(signature.as_bytes())
}

/// Encode a u64 right-aligned into a 32-byte ABI word
fn u64_word(value: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Decode a right-aligned u64 from a 32-byte ABI word, rejecting overflow
fn u64_from_word(word: &[u8; WORD]) -> Result<u64, RegistryClientError> {
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(RegistryClientError::InvalidResponse(format!(
            "word 0x{} does not fit a u64",
            hex::encode(word)
        )));
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&word[WORD - 8..]);
    Ok(u64::from_be_bytes(bytes))
}

/// Split `0x`-prefixed hex into 32-byte words
fn decode_words(data: &str) -> Result<Vec<[u8; WORD]>, RegistryClientError> {
    let bytes = hex::decode(data.strip_prefix("0x").unwrap_or(data))?;
    if bytes.len() % WORD != 0 {
        return Err(RegistryClientError::InvalidResponse(format!(
            "hex payload of {} bytes is not word-aligned",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks(WORD)
        .map(|chunk| {
            let mut word = [0u8; WORD];
            word.copy_from_slice(chunk);
            word
        })
        .collect())
}

/// Decode one `AttestationStored` log into an [`Attestation`]
fn decode_attestation_log(
    topics: &[String],
    data: &str,
) -> Result<Attestation, RegistryClientError> {
    let nonce_topic = topics.get(1).ok_or_else(|| {
        RegistryClientError::InvalidResponse("attestation log is missing the nonce topic".into())
    })?;
    let nonce_words = decode_words(nonce_topic)?;
    let [nonce_word] = nonce_words.as_slice() else {
        return Err(RegistryClientError::InvalidResponse(
            "nonce topic is not a single word".into(),
        ));
    };

    let words = decode_words(data)?;
    let [start_word, end_word, root_word] = words.as_slice() else {
        return Err(RegistryClientError::InvalidResponse(format!(
            "attestation log data has {} words, expected 3",
            words.len()
        )));
    };

    Ok(Attestation {
        nonce: u64_from_word(nonce_word)?,
        start_height: u64_from_word(start_word)?,
        end_height: u64_from_word(end_word)?,
        tuple_root: Digest::from(*root_word),
    })
}

/// ABI-encode the `verifyAttestation` calldata.
///
/// Layout: selector, then a four-word head (nonce, tuple height, tuple data
/// root, offset of the proof tuple), then the dynamic proof tuple (side-node
/// array offset, key, leaf count, array length, array items).
fn encode_verify_attestation_call(
    nonce: u64,
    tuple: &DataRootTuple,
    proof: &TupleInclusionProof,
) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + WORD * (8 + proof.side_nodes.len()));
    data.extend_from_slice(&selector(VERIFY_ATTESTATION_SIGNATURE));
    data.extend_from_slice(&u64_word(nonce));
    data.extend_from_slice(&u64_word(tuple.height));
    data.extend_from_slice(tuple.data_root.as_bytes());
    // Proof tuple sits right after the four head words
    data.extend_from_slice(&u64_word(4 * WORD as u64));
    // Side nodes sit after the proof tuple's three head words
    data.extend_from_slice(&u64_word(3 * WORD as u64));
    data.extend_from_slice(&u64_word(proof.key));
    data.extend_from_slice(&u64_word(proof.num_leaves));
    data.extend_from_slice(&u64_word(proof.side_nodes.len() as u64));
    for side in &proof.side_nodes {
        data.extend_from_slice(side.as_bytes());
    }
    data
}

#[derive(Deserialize)]
struct LogEntry {
    topics: Vec<String>,
    data: String,
}

/// Attestation registry RPC client
pub struct RegistryClient {
    client: HttpClient,
    address: Address,
}

impl RegistryClient {
    /// Create a new client against the given EVM RPC endpoint and registry
    /// contract address
    pub fn new(url: &str, address: Address) -> Result<Self, RegistryClientError> {
        let client = HttpClient::builder()
            .request_timeout(HTTP_REQUEST_TIMEOUT)
            .build(url)?;
        Ok(Self { client, address })
    }

    async fn eth_call(&self, calldata: &[u8]) -> Result<Vec<[u8; WORD]>, RegistryClientError> {
        let call = json!({
            "to": self.address.to_string(),
            "data": format!("0x{}", hex::encode(calldata)),
        });
        let result: String = self.client.request("eth_call", rpc_params![call, "latest"]).await?;
        decode_words(&result)
    }

    /// Read the registry's latest attestation nonce cursor
    pub async fn latest_nonce(&self) -> Result<u64, RegistryClientError> {
        let words = self.eth_call(&selector(LATEST_NONCE_SIGNATURE)).await?;
        let [word] = words.as_slice() else {
            return Err(RegistryClientError::InvalidResponse(format!(
                "latest nonce returned {} words, expected 1",
                words.len()
            )));
        };
        u64_from_word(word)
    }

    async fn get_attestation_logs(
        &self,
        nonce: Option<u64>,
    ) -> Result<Vec<Attestation>, RegistryClientError> {
        let topic0 = format!("0x{}", hex::encode(event_topic(ATTESTATION_EVENT_SIGNATURE)));
        let topics = match nonce {
            Some(nonce) => json!([topic0, format!("0x{}", hex::encode(u64_word(nonce)))]),
            None => json!([topic0]),
        };
        let filter = json!({
            "address": self.address.to_string(),
            "fromBlock": "earliest",
            "toBlock": "latest",
            "topics": topics,
        });
        let logs: Vec<LogEntry> = self
            .client
            .request("eth_getLogs", rpc_params![filter])
            .await?;
        debug!(count = logs.len(), "fetched attestation logs");
        logs.iter()
            .map(|log| decode_attestation_log(&log.topics, &log.data))
            .collect()
    }

    /// Fetch every attestation the registry has stored
    pub async fn attestations(&self) -> Result<Vec<Attestation>, RegistryClientError> {
        self.get_attestation_logs(None).await
    }

    /// Fetch the attestation stored under `nonce`, if any
    pub async fn attestation(
        &self,
        nonce: u64,
    ) -> Result<Option<Attestation>, RegistryClientError> {
        Ok(self.get_attestation_logs(Some(nonce)).await?.into_iter().next())
    }

    /// Ask the registry contract itself to verify the tuple against the
    /// attestation stored under `nonce`.
    ///
    /// The remote answer must agree with the local
    /// `daylight_verify::verify_inclusion`; it is a cross-check, not a
    /// replacement.
    pub async fn verify_attestation(
        &self,
        nonce: u64,
        tuple: &DataRootTuple,
        proof: &TupleInclusionProof,
    ) -> Result<bool, RegistryClientError> {
        let calldata = encode_verify_attestation_call(nonce, tuple, proof);
        let words = self.eth_call(&calldata).await?;
        let [word] = words.as_slice() else {
            return Err(RegistryClientError::InvalidResponse(format!(
                "verifyAttestation returned {} words, expected 1",
                words.len()
            )));
        };
        Ok(u64_from_word(word)? == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    /// Wraps a JSON-RPC result payload, echoing the caller's request id
    struct RpcResult(serde_json::Value);

    impl Respond for RpcResult {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
            ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": body["id"],
                "result": self.0,
            }))
        }
    }

    fn registry_address() -> Address {
        "0x8354693274eAe91Bc11B4b8981a8aB26d85F4A66".parse().unwrap()
    }

    #[test]
    fn keccak_hasher_matches_known_vector() {
        // keccak256 of the empty input
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn address_parsing_validates_length() {
        assert!("0x8354693274eAe91Bc11B4b8981a8aB26d85F4A66".parse::<Address>().is_ok());
        assert!(matches!(
            "0x1234".parse::<Address>(),
            Err(RegistryClientError::InvalidAddress(_))
        ));
        assert!(matches!(
            "not-hex".parse::<Address>(),
            Err(RegistryClientError::InvalidAddress(_))
        ));
    }

    #[test]
    fn u64_words_round_trip_and_reject_overflow() {
        let word = u64_word(1421175);
        assert_eq!(u64_from_word(&word).unwrap(), 1421175);

        let mut too_big = [0u8; WORD];
        too_big[0] = 1;
        assert!(matches!(
            u64_from_word(&too_big),
            Err(RegistryClientError::InvalidResponse(_))
        ));
    }

    #[test]
    fn decodes_attestation_logs() {
        let topics = vec![
            format!("0x{}", hex::encode(event_topic(ATTESTATION_EVENT_SIGNATURE))),
            format!("0x{}", hex::encode(u64_word(7))),
        ];
        let root = [0xabu8; 32];
        let mut data = Vec::new();
        data.extend_from_slice(&u64_word(1421160));
        data.extend_from_slice(&u64_word(1421175));
        data.extend_from_slice(&root);
        let attestation =
            decode_attestation_log(&topics, &format!("0x{}", hex::encode(&data))).unwrap();
        assert_eq!(
            attestation,
            Attestation {
                nonce: 7,
                start_height: 1421160,
                end_height: 1421175,
                tuple_root: root.into(),
            }
        );
    }

    #[test]
    fn truncated_log_data_is_invalid() {
        let topics = vec!["0x00".to_string(), format!("0x{}", hex::encode(u64_word(7)))];
        let data = format!("0x{}", hex::encode(u64_word(1421160)));
        assert!(matches!(
            decode_attestation_log(&topics, &data),
            Err(RegistryClientError::InvalidResponse(_))
        ));
    }

    #[test]
    fn verify_attestation_calldata_layout() {
        let tuple = DataRootTuple {
            height: 100,
            data_root: [0x11u8; 32].into(),
        };
        let proof = TupleInclusionProof {
            side_nodes: vec![[0x22u8; 32].into(), [0x33u8; 32].into()],
            key: 10,
            num_leaves: 15,
        };
        let data = encode_verify_attestation_call(0, &tuple, &proof);

        // selector + 4 head words + 4 proof head/length words + 2 items
        assert_eq!(data.len(), 4 + WORD * 10);
        assert_eq!(&data[..4], &selector(VERIFY_ATTESTATION_SIGNATURE));
        let words = decode_words(&hex::encode(&data[4..])).unwrap();
        assert_eq!(words[0], u64_word(0)); // nonce
        assert_eq!(words[1], u64_word(100)); // tuple.height
        assert_eq!(words[2], [0x11u8; 32]); // tuple.data_root
        assert_eq!(words[3], u64_word(128)); // offset of the proof tuple
        assert_eq!(words[4], u64_word(96)); // offset of side_nodes in the tuple
        assert_eq!(words[5], u64_word(10)); // key
        assert_eq!(words[6], u64_word(15)); // num_leaves
        assert_eq!(words[7], u64_word(2)); // side node count
        assert_eq!(words[8], [0x22u8; 32]);
        assert_eq!(words[9], [0x33u8; 32]);
    }

    #[tokio::test]
    async fn latest_nonce_reads_the_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "eth_call"})))
            .respond_with(RpcResult(json!(format!(
                "0x{}",
                hex::encode(u64_word(42))
            ))))
            .mount(&server)
            .await;

        let client = RegistryClient::new(&server.uri(), registry_address()).unwrap();
        assert_eq!(client.latest_nonce().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn attestations_decodes_the_log_stream() {
        let server = MockServer::start().await;
        let root = [0x5au8; 32];
        let mut data = Vec::new();
        data.extend_from_slice(&u64_word(90));
        data.extend_from_slice(&u64_word(105));
        data.extend_from_slice(&root);
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "eth_getLogs"})))
            .respond_with(RpcResult(json!([{
                "address": registry_address().to_string(),
                "topics": [
                    format!("0x{}", hex::encode(event_topic(ATTESTATION_EVENT_SIGNATURE))),
                    format!("0x{}", hex::encode(u64_word(0))),
                ],
                "data": format!("0x{}", hex::encode(&data)),
            }])))
            .mount(&server)
            .await;

        let client = RegistryClient::new(&server.uri(), registry_address()).unwrap();
        let attestations = client.attestations().await.unwrap();
        assert_eq!(
            attestations,
            vec![Attestation {
                nonce: 0,
                start_height: 90,
                end_height: 105,
                tuple_root: root.into(),
            }]
        );
    }
}
