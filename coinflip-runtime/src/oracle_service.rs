use crate::call::Receipt;
use crate::error::Result;
use crate::network::SharedNetwork;
use coinflip_core::RequestId;
use coinflip_escrow::RandomnessSource;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// What happened to one randomness request.
#[derive(Debug)]
pub struct OracleOutcome {
    pub request: RequestId,
    pub value: Option<u128>,
    pub result: Result<Receipt>,
}

/// Background task answering the escrow's randomness requests.
///
/// Each request is handed to the [`RandomnessSource`]; the answer is then
/// delivered as a `receive_randomness` call from the oracle address. The
/// network lock is only taken for the synchronous delivery.
pub struct OracleService {
    handle: JoinHandle<()>,
    outcomes: mpsc::UnboundedReceiver<OracleOutcome>,
}

impl OracleService {
    pub fn spawn(network: SharedNetwork, source: Arc<dyn RandomnessSource>) -> Self {
        let mut requests = network.lock().attach_oracle();
        let (outcome_tx, outcomes) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            tracing::info!("Oracle service started");

            while let Some(request) = requests.recv().await {
                tracing::debug!("Oracle service picked up request {}", request.id);

                let outcome = match source.fulfill(&request).await {
                    Ok(value) => {
                        let result = network.lock().fulfill(request.id, value);
                        match &result {
                            Ok(_) => tracing::info!("Delivered {} for request {}", value, request.id),
                            Err(e) => tracing::warn!("Delivery for request {} failed: {}", request.id, e),
                        }
                        OracleOutcome {
                            request: request.id,
                            value: Some(value),
                            result,
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Oracle could not answer request {}: {}", request.id, e);
                        OracleOutcome {
                            request: request.id,
                            value: None,
                            result: Err(e.into()),
                        }
                    }
                };

                // nobody listening is fine
                let _ = outcome_tx.send(outcome);
            }

            tracing::info!("Oracle service stopped");
        });

        Self { handle, outcomes }
    }

    /// Wait for the next answered (or failed) request.
    pub async fn next_outcome(&mut self) -> Option<OracleOutcome> {
        self.outcomes.recv().await
    }

    pub async fn shutdown(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }
}
