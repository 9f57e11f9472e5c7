pub mod fixed;

pub use fixed::FixedOracle;

use crate::error::{OracleError, OracleResult};
use async_trait::async_trait;
use coinflip_core::RandomnessRequest;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Produces the random integer answering a request.
///
/// Implementations may take arbitrarily long; the escrow only ever looks at
/// the parity of the value.
#[async_trait]
pub trait RandomnessSource: Send + Sync {
    async fn fulfill(&self, request: &RandomnessRequest) -> OracleResult<u128>;
}

/// Hash based oracle: `sha256(seed || request id)` truncated to 128 bits.
#[derive(Clone)]
pub struct HashOracle {
    seed: [u8; 32],
}

impl HashOracle {
    pub fn new(seed: [u8; 32]) -> Self {
        Self { seed }
    }

    /// Rnd seed
    pub fn random() -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        Self::new(seed)
    }

    pub fn from_hex(seed_hex: &str) -> OracleResult<Self> {
        let bytes = hex::decode(seed_hex).map_err(|e| OracleError::InvalidSeed(e.to_string()))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| OracleError::InvalidSeed("seed must be 32 bytes".to_string()))?;
        Ok(Self::new(seed))
    }

    pub fn seed_hex(&self) -> String {
        hex::encode(self.seed)
    }

    pub fn derive(&self, request: &RandomnessRequest) -> u128 {
        let mut hasher = Sha256::new();
        hasher.update(self.seed);
        hasher.update(request.id.as_bytes());
        let digest = hasher.finalize();

        let mut value = [0u8; 16];
        value.copy_from_slice(&digest[..16]);
        u128::from_be_bytes(value)
    }
}

impl std::fmt::Debug for HashOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashOracle").finish_non_exhaustive()
    }
}

#[async_trait]
impl RandomnessSource for HashOracle {
    async fn fulfill(&self, request: &RandomnessRequest) -> OracleResult<u128> {
        let value = self.derive(request);
        tracing::debug!("Hash oracle answered request {} with {}", request.id, value);
        Ok(value)
    }
}
