use coinflip_core::{Address, RequestId, WagerError};
use coinflip_escrow::OracleError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] WagerError),

    #[error("Unknown contract: {0}")]
    UnknownContract(Address),

    #[error("Insufficient funds on {address}: need {need}, have {available}")]
    InsufficientFunds {
        address: Address,
        need: u64,
        available: u64,
    },

    #[error("Randomness request {0} is not outstanding")]
    UnknownRequest(RequestId),

    #[error("Payout failed: {0}")]
    PayoutFailed(String),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    /// The protocol error underneath, if this is one.
    pub fn protocol(&self) -> Option<&WagerError> {
        match self {
            RuntimeError::Protocol(e) => Some(e),
            _ => None,
        }
    }
}
