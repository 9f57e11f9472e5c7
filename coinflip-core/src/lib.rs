//! Coinflip core - balance ledger and shared protocol types
//!
//! Holds player funds and the message types the ledger and the round escrow
//! exchange. Neither component calls the other directly: entrypoints return
//! [`Operation`]s and the hosting runtime executes them.

pub mod error;
pub mod ledger;
pub mod operation;
pub mod types;

pub use error::{Result, WagerError};
pub use ledger::{BalanceLedger, BetLimitSource, BetReservation, LedgerConfig};
pub use operation::{Operation, RandomnessRequest, StakeSide, RANDOMNESS_CALLBACK};
pub use types::{Address, Amount, CallContext, RequestId, ReservationId};
