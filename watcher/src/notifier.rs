//! Delivery of change-event batches to the ingestion endpoint.

use tracing::{debug, warn};

use crate::error::Result;
use crate::event::NotificationBatch;

/// HTTP notifier for the external ingestion endpoint.
///
/// Delivery is fire-and-forget: one attempt per batch, failures are logged
/// and the batch is dropped. There is no retry, persistence or backoff, so a
/// transient endpoint outage loses the notifications sent during it.
#[derive(Clone)]
pub struct IngestNotifier {
    endpoint: String,
    client: reqwest::Client,
}

impl IngestNotifier {
    /// Create a notifier posting to `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }

    /// The endpoint this notifier delivers to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Perform a single delivery attempt. Non-2xx responses are errors.
    pub async fn try_send(&self, batch: &NotificationBatch) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(batch)
            .send()
            .await?;
        response.error_for_status()?;
        Ok(())
    }

    /// Delivery policy used by the watch and reconcile loops: one attempt,
    /// failure is logged and the batch is dropped.
    pub async fn send(&self, batch: &NotificationBatch) {
        if batch.is_empty() {
            return;
        }
        match self.try_send(batch).await {
            Ok(()) => debug!("delivered {} event(s)", batch.len()),
            Err(err) => warn!("dropping batch of {} event(s): {err}", batch.len()),
        }
    }
}
