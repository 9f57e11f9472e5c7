use super::{open, parse_address, print_receipt, save};
use anyhow::{anyhow, Context, Result};
use coinflip_core::{Address, Amount};
use coinflip_escrow::{FixedOracle, HashOracle, RandomnessSource};
use coinflip_runtime::{EscrowCall, Network, OracleService};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const ORACLE_TIMEOUT: Duration = Duration::from_secs(30);

fn caller_or_owner(network: &Network, caller: Option<&str>) -> Result<Address> {
    match caller {
        Some(raw) => parse_address(raw),
        None => Ok(network.ledger().config().owner.clone()),
    }
}

/// Run the oracle service until it has answered the outstanding request.
pub async fn fulfill(data_dir: &Path, value: Option<u128>, seed: Option<String>) -> Result<()> {
    let (store, network) = open(data_dir).await?;
    let request = network
        .pending_requests()
        .next()
        .cloned()
        .context("No randomness request outstanding")?;

    let source: Arc<dyn RandomnessSource> = match (value, seed) {
        (Some(value), _) => Arc::new(FixedOracle::new(value)),
        (None, Some(seed)) => Arc::new(HashOracle::from_hex(&seed).context("Invalid oracle seed")?),
        (None, None) => Arc::new(HashOracle::random()),
    };

    println!("Answering randomness request {}...", request.id);

    let shared = Arc::new(Mutex::new(network));
    let mut service = OracleService::spawn(shared.clone(), source);

    let outcome = tokio::time::timeout(ORACLE_TIMEOUT, service.next_outcome())
        .await
        .context("Oracle did not answer in time")?
        .context("Oracle service stopped")?;

    shared.lock().detach_oracle();
    service.shutdown().await;

    let network = Arc::try_unwrap(shared)
        .map_err(|_| anyhow!("Network is still shared with the oracle service"))?
        .into_inner();

    let receipt = outcome.result.context("Randomness delivery failed")?;
    save(&store, &network).await?;

    if let Some(value) = outcome.value {
        println!("Oracle delivered {}", value);
    }
    print_receipt(&receipt);
    Ok(())
}

pub async fn payout(data_dir: &Path, caller: Option<&str>) -> Result<()> {
    let (store, mut network) = open(data_dir).await?;
    let caller = caller_or_owner(&network, caller)?;

    let receipt = network.call_escrow(&caller, Amount::ZERO, EscrowCall::PerformPayout)?;
    save(&store, &network).await?;

    print_receipt(&receipt);
    Ok(())
}

pub async fn cancel(data_dir: &Path, caller: Option<&str>) -> Result<()> {
    let (store, mut network) = open(data_dir).await?;
    let caller = caller_or_owner(&network, caller)?;

    let receipt = network.call_escrow(&caller, Amount::ZERO, EscrowCall::CancelRequest)?;
    save(&store, &network).await?;

    println!("Randomness request cancelled, stakes returned");
    print_receipt(&receipt);
    Ok(())
}
