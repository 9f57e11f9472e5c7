//! Coinflip runtime - hosts the ledger, the escrow and the oracle
//!
//! [`Network`] keeps native balances and executes the operations the
//! contracts emit. [`OracleService`] answers randomness requests on a tokio
//! task and [`StateStore`] persists the whole thing as JSON.

pub mod call;
pub mod error;
pub mod network;
pub mod oracle_service;
pub mod store;

pub use call::{Call, EscrowCall, Event, LedgerCall, Receipt};
pub use error::{Result, RuntimeError};
pub use network::{Network, NetworkConfig, SharedNetwork};
pub use oracle_service::{OracleOutcome, OracleService};
pub use store::StateStore;
