//! Assembles a verification request from the remote collaborators.

use anyhow::Context;
use tracing::info;

use daylight_verify::{find_covering, Digest, VerificationRequest};

use crate::collaborators::{AttestationRegistry, SourceLedger};

/// Result of attempting to assemble a verification request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A covering attestation exists and the request is ready to verify
    Ready(VerificationRequest),
    /// No attestation covers the block yet.
    ///
    /// This is not a verdict: the height may be covered by a future
    /// attestation, so callers must not report it as "not committed".
    AwaitingAttestation { height: u64 },
}

/// Gather everything needed to verify that the data published by `tx_hash`
/// is covered by the registry.
///
/// Collaborator failures (unknown transaction, connectivity) propagate as
/// errors; they are never collapsed into a verification outcome.
pub async fn fetch_verification_request(
    tx_hash: &Digest,
    source: &impl SourceLedger,
    registry: &impl AttestationRegistry,
) -> Result<FetchOutcome, anyhow::Error> {
    info!("Looking up transaction {tx_hash} ...");
    let height = source
        .transaction_height(tx_hash)
        .await
        .context("failed to locate the transaction on the source ledger")?;

    info!("Fetching data root of block {height} ...");
    let data_root = source
        .block_data_root(height)
        .await
        .context("failed to fetch the block data root")?;

    info!("Scanning the attestation registry ...");
    let attestations = registry
        .attestations()
        .await
        .context("failed to fetch attestations from the registry")?;
    let Some(attestation) = find_covering(height, &attestations).copied() else {
        return Ok(FetchOutcome::AwaitingAttestation { height });
    };

    info!(
        "Fetching inclusion proof for range [{}, {}) ...",
        attestation.start_height, attestation.end_height
    );
    let proof = source
        .range_inclusion_proof(height, attestation.start_height, attestation.end_height)
        .await
        .context("failed to fetch the data root inclusion proof")?;

    Ok(FetchOutcome::Ready(VerificationRequest {
        height,
        data_root,
        attestation,
        proof,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    use daylight_verify::merkle::TupleTree;
    use daylight_verify::{Attestation, DataRootTuple, Verdict};

    use crate::collaborators::{MockAttestationRegistry, MockSourceLedger};

    const TX_HASH: [u8; 32] = [0xdd; 32];
    const HEIGHT: u64 = 100;

    fn data_root_for(height: u64) -> Digest {
        [height as u8; 32].into()
    }

    fn attested_batch(start: u64, end: u64) -> (Attestation, TupleTree) {
        let tuples: Vec<DataRootTuple> = (start..end)
            .map(|height| DataRootTuple {
                height,
                data_root: data_root_for(height),
            })
            .collect();
        let tree = TupleTree::from_tuples(&tuples);
        let attestation = Attestation {
            nonce: 0,
            start_height: start,
            end_height: end,
            tuple_root: tree.root(),
        };
        (attestation, tree)
    }

    fn source_for(tree: TupleTree) -> MockSourceLedger {
        let mut source = MockSourceLedger::new();
        source
            .expect_transaction_height()
            .returning(|_| Ok(HEIGHT));
        source
            .expect_block_data_root()
            .returning(|height| Ok(data_root_for(height)));
        source
            .expect_range_inclusion_proof()
            .returning(move |height, start, _| Ok(tree.prove(height - start).unwrap()));
        source
    }

    #[tokio::test]
    async fn assembles_a_verifiable_request() {
        let (attestation, tree) = attested_batch(90, 105);
        let source = source_for(tree);
        let mut registry = MockAttestationRegistry::new();
        registry
            .expect_attestations()
            .returning(move || Ok(vec![attestation]));

        let outcome = fetch_verification_request(&TX_HASH.into(), &source, &registry)
            .await
            .unwrap();
        let FetchOutcome::Ready(request) = outcome else {
            panic!("expected a ready request");
        };
        assert_eq!(request.height, HEIGHT);
        assert_eq!(request.attestation, attestation);
        assert_eq!(request.verify(), Ok(Verdict::Committed));
    }

    #[tokio::test]
    async fn uncovered_height_awaits_an_attestation() {
        let (_, tree) = attested_batch(90, 105);
        let source = source_for(tree);
        let mut registry = MockAttestationRegistry::new();
        // Registry is live but has not yet attested past block 100
        registry
            .expect_attestations()
            .returning(|| Ok(vec![]));

        let outcome = fetch_verification_request(&TX_HASH.into(), &source, &registry)
            .await
            .unwrap();
        assert_eq!(outcome, FetchOutcome::AwaitingAttestation { height: HEIGHT });
    }

    #[tokio::test]
    async fn collaborator_failures_propagate_as_errors() {
        let mut source = MockSourceLedger::new();
        source
            .expect_transaction_height()
            .returning(|_| Err(anyhow::anyhow!("transaction not found")));
        let registry = MockAttestationRegistry::new();

        let err = fetch_verification_request(&TX_HASH.into(), &source, &registry)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to locate the transaction"));
    }
}
