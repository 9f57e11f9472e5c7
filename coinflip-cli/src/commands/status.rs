use super::{open, parse_address, side_name};
use anyhow::Result;
use coinflip_escrow::{RoundState, Staked};
use comfy_table::{presets::UTF8_FULL, Table};
use std::path::Path;

pub async fn balance(data_dir: &Path, address: &str) -> Result<()> {
    let (_, network) = open(data_dir).await?;
    let address = parse_address(address)?;

    println!("Balance for '{}':", address);
    println!("  Native: {}", network.balance_of(&address));
    if network.ledger().is_registered(&address) {
        println!("  Ledger: {}", network.ledger().get_balance(&address));
    } else {
        println!("  Ledger: no account");
    }
    Ok(())
}

pub async fn status(data_dir: &Path) -> Result<()> {
    let (_, network) = open(data_dir).await?;
    let ledger = network.ledger();
    let escrow = network.escrow();
    let ledger_balance = network.balance_of(ledger.address());

    println!("Network Status");
    println!("═══════════════════════════════════");
    println!("Owner: {}", ledger.config().owner);
    println!("Oracle: {}", network.oracle_address());
    println!("Bet limit source: {:?}", ledger.config().bet_limit);
    println!("Player funds: {}", ledger.total_players_balance());
    println!("House funds: {}", ledger.house_funds(ledger_balance));
    println!();

    let mut contracts = Table::new();
    contracts.load_preset(UTF8_FULL);
    contracts.set_header(vec!["Contract", "Address", "Native Balance"]);
    contracts.add_row(vec![
        "Ledger",
        ledger.address().as_str(),
        &ledger_balance.to_string(),
    ]);
    contracts.add_row(vec![
        "Escrow",
        escrow.address().as_str(),
        &network.balance_of(escrow.address()).to_string(),
    ]);
    println!("{}", contracts);

    println!();
    println!("Round: {}", escrow.phase());
    if let Some(player) = escrow.designated_player() {
        println!("Designated player: {}", player);
    }

    let mut round = Table::new();
    round.load_preset(UTF8_FULL);
    round.set_header(vec!["Side", "Who", "Stake", "Call"]);

    match escrow.state() {
        RoundState::Empty => {}
        RoundState::OneSideStaked(Staked::House(amount)) => {
            round.add_row(vec!["House", "ledger", &amount.to_string(), "-"]);
        }
        RoundState::OneSideStaked(Staked::Player(stake))
        | RoundState::RequestPending { player: stake, .. }
        | RoundState::RandomnessReceived { player: stake, .. } => {
            round.add_row(vec![
                "Player",
                stake.player.as_str(),
                &stake.amount.to_string(),
                side_name(stake.prediction),
            ]);
            let house = escrow.state().house_stake();
            if !house.is_zero() {
                round.add_row(vec!["House", "ledger", &house.to_string(), "-"]);
            }
        }
    }
    if !matches!(escrow.state(), RoundState::Empty) {
        println!("{}", round);
    }

    if let Some(request) = escrow.pending_request() {
        println!(
            "Request {} sent {}",
            request.id,
            request.requested_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        if let Some(timeout) = escrow.config().request_timeout()? {
            match request.requested_at.checked_add_signed(timeout) {
                Some(deadline) => {
                    println!("Cancellable after {}", deadline.format("%Y-%m-%d %H:%M:%S UTC"))
                }
                None => println!("Cancellable: never"),
            }
        }
    }
    if let Some(value) = escrow.state().random_value() {
        println!("Random value {} received, payout pending", value);
        println!("Retry with: coinflip payout");
    }

    let mut accounts = Table::new();
    accounts.load_preset(UTF8_FULL);
    accounts.set_header(vec!["Player", "Ledger Balance", "Native Balance"]);

    let mut any = false;
    for (player, amount) in ledger.accounts() {
        any = true;
        accounts.add_row(vec![
            player.as_str(),
            &amount.to_string(),
            &network.balance_of(player).to_string(),
        ]);
    }

    println!();
    if any {
        println!("Accounts:");
        println!("{}", accounts);
    } else {
        println!("No player accounts.");
    }

    Ok(())
}
