use crate::error::{Result, WagerError};
use crate::types::Address;
use serde::{Deserialize, Serialize};

/// 2% of the observed balance.
pub const DEFAULT_MAX_BET_DIVISOR: u64 = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub owner: Address,
    /// Trusted forwarder of oracle outcomes, the only sender allowed to call
    /// `finish_game`. In a wired deployment this is the escrow's address.
    pub oracle: Address,
    pub escrow: Option<Address>,
    pub bet_limit: BetLimitSource,
    pub max_bet_divisor: u64,
}

/// Where `bet` takes the balance its 2% ceiling is computed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BetLimitSource {
    /// The bettor reports the contract balance. Manipulable by the bettor.
    #[default]
    CallerReported,
    /// The ledger's own native balance as seen by the host.
    Authoritative,
}

impl LedgerConfig {
    pub fn new(owner: Address, oracle: Address) -> Self {
        Self {
            owner,
            oracle,
            escrow: None,
            bet_limit: BetLimitSource::default(),
            max_bet_divisor: DEFAULT_MAX_BET_DIVISOR,
        }
    }

    pub fn with_escrow(mut self, escrow: Address) -> Self {
        self.escrow = Some(escrow);
        self
    }

    pub fn with_bet_limit(mut self, bet_limit: BetLimitSource) -> Self {
        self.bet_limit = bet_limit;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_bet_divisor == 0 {
            return Err(WagerError::config("Max bet divisor must be greater than 0"));
        }

        if self.escrow.as_ref() == Some(&self.owner) {
            return Err(WagerError::config("Escrow cannot be the owner address"));
        }

        Ok(())
    }
}
