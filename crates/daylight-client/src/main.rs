#![doc = include_str!("../README.md")]

use clap::{command, Parser};
use tracing::{error, info, subscriber::set_global_default};
use tracing_subscriber::filter::EnvFilter;

use daylight_client::{fetch_verification_request, ClientConfig, FetchOutcome};
use daylight_registry_client::Address;
use daylight_verify::{DataRootTuple, Digest};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Hash of the source-ledger transaction that published the data
    #[arg(long)]
    tx_hash: Digest,
    /// Source ledger RPC URL
    #[arg(
        long,
        env = "SOURCE_RPC",
        default_value = "https://node.arabica.celenium.io:443"
    )]
    source_rpc_url: String,
    /// EVM RPC URL of the chain holding the attestation registry
    #[arg(long, env = "EVM_RPC")]
    evm_rpc_url: String,
    /// Address of the attestation registry contract
    #[arg(
        long,
        env = "REGISTRY_ADDRESS",
        default_value = "0x8354693274eAe91Bc11B4b8981a8aB26d85F4A66"
    )]
    registry_address: Address,
    /// Also ask the registry contract to verify and require agreement
    #[arg(long, default_value = "false")]
    cross_check: bool,
    /// Logging level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber_builder =
        tracing_subscriber::fmt::Subscriber::builder().with_env_filter(env_filter);

    let subscriber = subscriber_builder.with_writer(std::io::stderr).finish();
    set_global_default(subscriber).expect("Failed to set subscriber");
}

async fn run(cli: Cli) -> Result<(), anyhow::Error> {
    let config = ClientConfig {
        source_ledger_endpoint: cli.source_rpc_url,
        target_ledger_endpoint: cli.evm_rpc_url,
        attestation_registry_address: cli.registry_address,
    };
    let source = config.source_client()?;
    let registry = config.registry_client()?;

    match fetch_verification_request(&cli.tx_hash, &source, &registry).await? {
        FetchOutcome::AwaitingAttestation { height } => {
            info!("No attestation covers block {height} yet; retry once the registry catches up");
            println!("pending: block {height} is not yet covered by any attestation");
        }
        FetchOutcome::Ready(request) => {
            let verdict = request.verify()?;

            if cli.cross_check {
                info!("Cross-checking against the registry contract ...");
                let tuple = DataRootTuple {
                    height: request.height,
                    data_root: request.data_root,
                };
                let remote = registry
                    .verify_attestation(request.attestation.nonce, &tuple, &request.proof)
                    .await?;
                if remote != verdict.is_committed() {
                    anyhow::bail!(
                        "registry contract disagrees with the local verifier: \
                         remote says {remote}, local says {verdict}"
                    );
                }
                info!("Registry contract agrees with the local verdict");
            }

            println!(
                "{verdict}: data root of block {} against attestation nonce {}",
                request.height, request.attestation.nonce
            );
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match run(cli).await {
        Ok(_) => {
            info!("Daylight client has exited without errors");
            std::process::exit(0);
        }
        Err(err) => {
            error!("Daylight client has exited with error: {}", err);
            std::process::exit(1);
        }
    }
}
