use super::{open, parse_address, print_receipt, save, side_name, Side};
use anyhow::Result;
use coinflip_core::{Amount, StakeSide};
use coinflip_runtime::{EscrowCall, LedgerCall};
use std::path::Path;

pub async fn deposit(data_dir: &Path, player: &str, amount: u64) -> Result<()> {
    let (store, mut network) = open(data_dir).await?;
    let player = parse_address(player)?;

    network.call_ledger(&player, Amount::from_mutez(amount), LedgerCall::Deposit)?;
    save(&store, &network).await?;

    println!("Deposited {} mutez for {}", amount, player);
    println!("Ledger balance: {}", network.ledger().get_balance(&player));
    Ok(())
}

pub async fn withdraw(data_dir: &Path, player: &str) -> Result<()> {
    let (store, mut network) = open(data_dir).await?;
    let player = parse_address(player)?;

    let receipt = network.call_ledger(&player, Amount::ZERO, LedgerCall::Withdraw)?;
    save(&store, &network).await?;

    println!("Withdrawal for {} complete", player);
    print_receipt(&receipt);
    println!("Native balance: {}", network.balance_of(&player));
    Ok(())
}

pub async fn bet(
    data_dir: &Path,
    player: &str,
    amount: u64,
    side: Side,
    observed: Option<u64>,
) -> Result<()> {
    let (store, mut network) = open(data_dir).await?;
    let player = parse_address(player)?;

    // Without a reported figure, report what the ledger actually holds
    let observed_balance = observed
        .map(Amount::from_mutez)
        .unwrap_or_else(|| network.balance_of(network.ledger().address()));

    let receipt = network.call_ledger(
        &player,
        Amount::ZERO,
        LedgerCall::Bet {
            amount: Amount::from_mutez(amount),
            prediction: side.prediction(),
            observed_balance,
        },
    )?;
    save(&store, &network).await?;

    println!(
        "Bet of {} mutez on {} placed for {}",
        amount,
        side_name(side.prediction()),
        player
    );
    print_receipt(&receipt);
    if receipt.randomness_requested().is_none() {
        println!("Waiting for the house to stake the counter side...");
    }
    Ok(())
}

pub async fn stake(data_dir: &Path, player: &str, amount: u64, side: Side) -> Result<()> {
    let (store, mut network) = open(data_dir).await?;
    let player = parse_address(player)?;

    let receipt = network.call_escrow(
        &player,
        Amount::from_mutez(amount),
        EscrowCall::PlaceBet(StakeSide::Direct {
            prediction: side.prediction(),
        }),
    )?;
    save(&store, &network).await?;

    println!(
        "{} staked {} mutez on {} with the escrow",
        player,
        amount,
        side_name(side.prediction())
    );
    print_receipt(&receipt);
    Ok(())
}

pub async fn counter_stake(data_dir: &Path, amount: u64) -> Result<()> {
    let (store, mut network) = open(data_dir).await?;
    let owner = network.ledger().config().owner.clone();

    let receipt = network.call_ledger(
        &owner,
        Amount::ZERO,
        LedgerCall::CounterStake {
            amount: Amount::from_mutez(amount),
        },
    )?;
    save(&store, &network).await?;

    println!("House staked {} mutez", amount);
    print_receipt(&receipt);
    Ok(())
}

pub async fn designate(data_dir: &Path, player: &str) -> Result<()> {
    let (store, mut network) = open(data_dir).await?;
    let owner = network.ledger().config().owner.clone();
    let player = parse_address(player)?;

    network.call_ledger(&owner, Amount::ZERO, LedgerCall::DesignatePlayer(player.clone()))?;
    save(&store, &network).await?;

    println!("{} may now stake directly:", player);
    println!("coinflip stake {} <amount> <even|odd>", player);
    Ok(())
}

pub async fn owner_withdraw(data_dir: &Path, destination: &str, amount: u64) -> Result<()> {
    let (store, mut network) = open(data_dir).await?;
    let owner = network.ledger().config().owner.clone();
    let destination = parse_address(destination)?;

    let receipt = network.call_ledger(
        &owner,
        Amount::ZERO,
        LedgerCall::OwnerWithdraw {
            destination,
            amount: Amount::from_mutez(amount),
        },
    )?;
    save(&store, &network).await?;

    println!("House withdrawal complete");
    print_receipt(&receipt);
    Ok(())
}
