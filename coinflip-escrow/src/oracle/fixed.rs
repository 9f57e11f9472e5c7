use super::RandomnessSource;
use crate::error::{OracleError, OracleResult};
use async_trait::async_trait;
use coinflip_core::RandomnessRequest;

/// Answers every request with the same value.
#[derive(Debug, Clone)]
pub struct FixedOracle {
    value: u128,
    spec_id: Option<String>,
}

impl FixedOracle {
    pub fn new(value: u128) -> Self {
        Self {
            value,
            spec_id: None,
        }
    }

    /// Only serve requests tagged with `spec_id`.
    pub fn for_spec(mut self, spec_id: impl Into<String>) -> Self {
        self.spec_id = Some(spec_id.into());
        self
    }
}

#[async_trait]
impl RandomnessSource for FixedOracle {
    async fn fulfill(&self, request: &RandomnessRequest) -> OracleResult<u128> {
        if let Some(spec_id) = &self.spec_id {
            if &request.spec_id != spec_id {
                return Err(OracleError::UnsupportedRequest(request.id.to_string()));
            }
        }
        Ok(self.value)
    }
}
