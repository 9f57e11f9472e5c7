use crate::error::Result;
use crate::network::Network;
use std::path::{Path, PathBuf};

const STATE_FILE: &str = "coinflip_state.json";

/// Network state kept as pretty JSON in a data directory.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(STATE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    pub async fn load(&self) -> Result<Network> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        let network = serde_json::from_str(&contents)?;

        tracing::debug!("Loaded network state from {}", self.path.display());
        Ok(network)
    }

    pub async fn save(&self, network: &Network) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_string_pretty(network)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::debug!("Saved network state to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::LedgerCall;
    use crate::network::NetworkConfig;
    use coinflip_core::{Address, Amount};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = StateStore::new(temp_dir.path().join("nested"));
        assert!(!store.exists().await);

        let alice = Address::parse("alice").unwrap();
        let config = NetworkConfig::new(
            Address::parse("owner").unwrap(),
            Address::parse("oracle").unwrap(),
        )
        .unwrap();
        let mut network = Network::new(config).unwrap();
        network.fund(&alice, Amount::from_mutez(300)).unwrap();
        network
            .call_ledger(&alice, Amount::from_mutez(120), LedgerCall::Deposit)
            .unwrap();

        store.save(&network).await.unwrap();
        assert!(store.exists().await);

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.ledger().get_balance(&alice), Amount::from_mutez(120));
        assert_eq!(loaded.balance_of(&alice), Amount::from_mutez(180));
        assert_eq!(loaded.total_value().unwrap(), Amount::from_mutez(300));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = StateStore::new(temp_dir.path());

        assert!(store.load().await.is_err());
    }
}
