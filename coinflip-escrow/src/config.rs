use crate::payout::DEFAULT_HOUSE_FEE_PERCENT;
use chrono::Duration;
use coinflip_core::{Address, Result, WagerError};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SPEC_ID: &str = "coin_flip";

/// Longest accepted request timeout, ten years.
pub const MAX_REQUEST_TIMEOUT_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowConfig {
    pub ledger: Address,
    pub oracle: Address,
    /// Purpose tag carried by every randomness request.
    pub spec_id: String,
    pub fee_percent: u64,
    /// Seconds after which an unanswered request may be cancelled. `None`
    /// keeps a request pending until the oracle answers.
    pub request_timeout_secs: Option<u64>,
}

impl EscrowConfig {
    pub fn new(ledger: Address, oracle: Address) -> Self {
        Self {
            ledger,
            oracle,
            spec_id: DEFAULT_SPEC_ID.to_string(),
            fee_percent: DEFAULT_HOUSE_FEE_PERCENT,
            request_timeout_secs: None,
        }
    }

    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }

    /// `Ok(None)` when no timeout is configured.
    pub fn request_timeout(&self) -> Result<Option<Duration>> {
        self.request_timeout_secs
            .map(|secs| {
                i64::try_from(secs)
                    .ok()
                    .and_then(Duration::try_seconds)
                    .ok_or(WagerError::ArithmeticOverflow)
            })
            .transpose()
    }

    pub fn validate(&self) -> Result<()> {
        if self.spec_id.is_empty() {
            return Err(WagerError::config("Randomness spec id cannot be empty"));
        }

        if self.fee_percent > 100 {
            return Err(WagerError::config("House fee cannot exceed 100%"));
        }

        match self.request_timeout_secs {
            Some(0) => {
                return Err(WagerError::config("Request timeout must be greater than 0"));
            }
            Some(secs) if secs > MAX_REQUEST_TIMEOUT_SECS => {
                return Err(WagerError::config(format!(
                    "Request timeout cannot exceed {} seconds",
                    MAX_REQUEST_TIMEOUT_SECS
                )));
            }
            _ => {}
        }

        if self.ledger == self.oracle {
            return Err(WagerError::config("Ledger and oracle must be distinct"));
        }

        Ok(())
    }
}
