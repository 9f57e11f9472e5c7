mod commands;
mod config;

use clap::{Parser, Subcommand};
use coinflip_core::WagerError;
use coinflip_runtime::RuntimeError;
use config::CliConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "coinflip")]
#[command(about = "Coinflip wagering - ledger, escrow and randomness oracle")]
#[command(version)]
struct Cli {
    /// Data directory for network state
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a fresh ledger and escrow
    Init {
        /// Ledger owner address
        owner: String,
        /// Oracle address allowed to deliver randomness
        oracle: String,
        /// Seconds after which an unanswered request can be cancelled
        #[arg(long)]
        timeout: Option<u64>,
        /// Compute the bet limit from the ledger's own balance
        #[arg(long)]
        authoritative_limit: bool,
        /// Overwrite an existing network
        #[arg(long)]
        force: bool,
    },
    /// Credit native value to an address
    Fund {
        address: String,
        /// Amount in mutez
        amount: u64,
    },
    /// Deposit native value into a ledger account
    Deposit {
        player: String,
        /// Amount in mutez
        amount: u64,
    },
    /// Withdraw a player's whole ledger balance
    Withdraw { player: String },
    /// Bet from a ledger account
    Bet {
        player: String,
        /// Amount in mutez
        amount: u64,
        #[arg(value_enum)]
        side: commands::Side,
        /// Contract balance to compute the 2% limit from (defaults to the ledger's)
        #[arg(long)]
        observed: Option<u64>,
    },
    /// Stake directly with the escrow as the designated player
    Stake {
        player: String,
        /// Amount in mutez
        amount: u64,
        #[arg(value_enum)]
        side: commands::Side,
    },
    /// Stake house funds on the counter side (owner)
    CounterStake {
        /// Amount in mutez
        amount: u64,
    },
    /// Designate the player allowed to stake directly (owner)
    Designate { player: String },
    /// Answer the outstanding randomness request
    Fulfill {
        /// Deliver this exact value
        #[arg(long, conflicts_with = "seed")]
        value: Option<u128>,
        /// Hex encoded 32 byte seed for the hash oracle
        #[arg(long)]
        seed: Option<String>,
    },
    /// Retry a deferred payout
    Payout {
        /// Caller address (defaults to the owner)
        #[arg(long)]
        caller: Option<String>,
    },
    /// Cancel an expired randomness request
    Cancel {
        /// Caller address (defaults to the owner)
        #[arg(long)]
        caller: Option<String>,
    },
    /// Withdraw house funds (owner)
    OwnerWithdraw {
        destination: String,
        /// Amount in mutez
        amount: u64,
    },
    /// Show native and ledger balance of an address
    Balance { address: String },
    /// Show round, accounts and balances
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = CliConfig::resolve(cli.data_dir, cli.verbose);

    // Initialize logging
    let log_level = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "coinflip={},coinflip_core={},coinflip_escrow={},coinflip_runtime={}",
            log_level, log_level, log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Ensure data directory exists
    tokio::fs::create_dir_all(&config.data_dir).await?;

    let data_dir = config.data_dir.as_path();
    let result = match cli.command {
        Commands::Init {
            owner,
            oracle,
            timeout,
            authoritative_limit,
            force,
        } => {
            commands::init(data_dir, &owner, &oracle, timeout, authoritative_limit, force).await
        }
        Commands::Fund { address, amount } => commands::fund(data_dir, &address, amount).await,
        Commands::Deposit { player, amount } => commands::deposit(data_dir, &player, amount).await,
        Commands::Withdraw { player } => commands::withdraw(data_dir, &player).await,
        Commands::Bet {
            player,
            amount,
            side,
            observed,
        } => commands::bet(data_dir, &player, amount, side, observed).await,
        Commands::Stake {
            player,
            amount,
            side,
        } => commands::stake(data_dir, &player, amount, side).await,
        Commands::CounterStake { amount } => commands::counter_stake(data_dir, amount).await,
        Commands::Designate { player } => commands::designate(data_dir, &player).await,
        Commands::Fulfill { value, seed } => commands::fulfill(data_dir, value, seed).await,
        Commands::Payout { caller } => commands::payout(data_dir, caller.as_deref()).await,
        Commands::Cancel { caller } => commands::cancel(data_dir, caller.as_deref()).await,
        Commands::OwnerWithdraw {
            destination,
            amount,
        } => commands::owner_withdraw(data_dir, &destination, amount).await,
        Commands::Balance { address } => commands::balance(data_dir, &address).await,
        Commands::Status => commands::status(data_dir).await,
    };

    if let Err(e) = result {
        match e.downcast_ref::<RuntimeError>() {
            Some(RuntimeError::Protocol(WagerError::InsufficientBalance { need, available })) => {
                eprintln!("Error: Insufficient balance");
                eprintln!("Need: {} mutez, Available: {} mutez", need, available);
            }
            Some(RuntimeError::Protocol(WagerError::NotRegistered(player))) => {
                eprintln!("Error: {} has no ledger account", player);
                eprintln!("Use 'coinflip deposit {} <amount>' to open one", player);
            }
            Some(RuntimeError::Protocol(WagerError::RequestNotExpired { deadline })) => {
                eprintln!("Error: Request cannot be cancelled yet");
                eprintln!("Deadline: {}", deadline.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            Some(RuntimeError::InsufficientFunds {
                address,
                need,
                available,
            }) => {
                eprintln!("Error: Insufficient native funds on {}", address);
                eprintln!("Need: {} mutez, Available: {} mutez", need, available);
            }
            _ => {
                eprintln!("Error: {:#}", e);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
