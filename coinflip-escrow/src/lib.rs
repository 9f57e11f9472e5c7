//! Coinflip round escrow
//!
//! Holds one two-sided bet at a time, asks an external oracle for a random
//! integer once both sides are in, and turns the answer into a ledger credit.

pub mod config;
pub mod error;
pub mod escrow;
pub mod oracle;
pub mod payout;
pub mod round;

pub use config::{EscrowConfig, DEFAULT_SPEC_ID, MAX_REQUEST_TIMEOUT_SECS};
pub use error::{OracleError, OracleResult};
pub use escrow::EscrowRound;
pub use oracle::{FixedOracle, HashOracle, RandomnessSource};
pub use payout::{compute_refund, is_win, Settlement, DEFAULT_HOUSE_FEE_PERCENT};
pub use round::{PlayerStake, RoundPhase, RoundState, StakeSource, Staked};
