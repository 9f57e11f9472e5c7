use crate::types::{Address, ReservationId};
use chrono::{DateTime, Utc};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WagerError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WagerError {
    #[error("Unauthorized: {caller} may not call {operation}")]
    Unauthorized {
        caller: Address,
        operation: &'static str,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient balance: need {need}, have {available}")]
    InsufficientBalance { need: u64, available: u64 },

    #[error("Sender not registered: {0}")]
    NotRegistered(Address),

    #[error("Player not found: {0}")]
    UnknownPlayer(Address),

    #[error("Escrow not set")]
    EscrowNotConfigured,

    #[error("Bet amount {amount} exceeds maximum allowed {limit}")]
    BetExceedsLimit { amount: u64, limit: u64 },

    #[error("Random value not requested")]
    RandomnessNotRequested,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid round state: {0}")]
    InvalidState(String),

    #[error("Randomness request does not expire before {deadline}")]
    RequestNotExpired { deadline: DateTime<Utc> },

    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    #[error("Unknown bet reservation: {0}")]
    UnknownReservation(ReservationId),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl WagerError {
    pub fn unauthorized(caller: &Address, operation: &'static str) -> Self {
        Self::Unauthorized {
            caller: caller.clone(),
            operation,
        }
    }

    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::InvalidAmount(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
