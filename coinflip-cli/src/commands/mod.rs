mod account;
mod round;
mod status;

pub use account::{bet, counter_stake, deposit, designate, owner_withdraw, stake, withdraw};
pub use round::{cancel, fulfill, payout};
pub use status::{balance, status};

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use coinflip_core::{Address, Amount, BetLimitSource};
use coinflip_escrow::Settlement;
use coinflip_runtime::{Event, Network, NetworkConfig, Receipt, StateStore};
use std::path::Path;

/// Which parity a bet is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Side {
    Even,
    Odd,
}

impl Side {
    pub fn prediction(self) -> bool {
        matches!(self, Side::Even)
    }
}

fn parse_address(raw: &str) -> Result<Address> {
    Address::parse(raw).with_context(|| format!("Invalid address '{}'", raw))
}

fn side_name(prediction: bool) -> &'static str {
    if prediction {
        "even"
    } else {
        "odd"
    }
}

async fn open(data_dir: &Path) -> Result<(StateStore, Network)> {
    let store = StateStore::new(data_dir);
    tracing::debug!("Using state file {}", store.path().display());
    if !store.exists().await {
        bail!(
            "No network in {}. Run 'coinflip init <owner> <oracle>' first",
            data_dir.display()
        );
    }

    let network = store
        .load()
        .await
        .with_context(|| format!("Failed to load {}", store.path().display()))?;
    Ok((store, network))
}

async fn save(store: &StateStore, network: &Network) -> Result<()> {
    store
        .save(network)
        .await
        .with_context(|| format!("Failed to write {}", store.path().display()))
}

fn print_receipt(receipt: &Receipt) {
    for event in &receipt.events {
        match event {
            Event::Transferred { from, to, amount } => {
                println!("  Transferred {} from {} to {}", amount, from, to);
            }
            Event::RandomnessRequested(request) => {
                println!("  Randomness requested: {}", request.id);
                println!("  Answer it with: coinflip fulfill");
            }
            Event::Settled(settlement) => print_settlement(settlement),
            Event::PayoutDeferred { player, reason } => {
                println!("  Payout for {} deferred: {}", player, reason);
                println!("  Retry with: coinflip payout");
            }
        }
    }
}

fn print_settlement(settlement: &Settlement) {
    println!();
    println!("------ ROUND SETTLED ------");
    println!("═══════════════════════════════════");
    println!("Player: {}", settlement.player);
    println!("Random value: {}", settlement.value);
    println!(
        "Called {}, {}",
        side_name(settlement.prediction),
        if settlement.won { "won!" } else { "lost" }
    );
    println!("Refund: {}", settlement.refund);
    println!("Pot returned to ledger: {}", settlement.pot);
}

pub async fn init(
    data_dir: &Path,
    owner: &str,
    oracle: &str,
    timeout: Option<u64>,
    authoritative_limit: bool,
    force: bool,
) -> Result<()> {
    let store = StateStore::new(data_dir);
    if store.exists().await && !force {
        bail!(
            "A network already exists in {}. Pass --force to replace it",
            data_dir.display()
        );
    }

    let mut config = NetworkConfig::new(parse_address(owner)?, parse_address(oracle)?)?;
    if let Some(secs) = timeout {
        config = config.with_request_timeout(secs);
    }
    if authoritative_limit {
        config = config.with_bet_limit(BetLimitSource::Authoritative);
    }

    let network = Network::new(config)?;
    save(&store, &network).await?;

    println!("Network initialized in {}", data_dir.display());
    println!("Ledger: {}", network.ledger().address());
    println!("Escrow: {}", network.escrow().address());
    println!("Owner: {}", network.ledger().config().owner);
    println!("Oracle: {}", network.oracle_address());
    match network.escrow().config().request_timeout_secs {
        Some(secs) => println!("Request timeout: {}s", secs),
        None => println!("Request timeout: none"),
    }
    println!();
    println!("Fund the house with:");
    println!("coinflip fund {} <amount>", network.ledger().address());

    Ok(())
}

pub async fn fund(data_dir: &Path, address: &str, amount: u64) -> Result<()> {
    let (store, mut network) = open(data_dir).await?;
    let address = parse_address(address)?;

    let balance = network.fund(&address, Amount::from_mutez(amount))?;
    save(&store, &network).await?;

    println!("Funded {} with {} mutez", address, amount);
    println!("Native balance: {}", balance);
    Ok(())
}
