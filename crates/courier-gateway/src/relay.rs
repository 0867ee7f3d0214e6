use std::time::Duration;

use reqwest::StatusCode;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use courier_types::events::{ChatEventKind, RelayEnvelope, RelayTarget, RELAY_SECRET_HEADER};

/// Per-request timeout for relay calls.
const RELAY_TIMEOUT: Duration = Duration::from_secs(5);

/// Forwards events to the process hosting the push transport, authenticated
/// by a shared-secret header.
///
/// Fire-and-forget relative to the write path: `forward` only enqueues; a
/// single worker task drains the queue sequentially, which keeps one
/// producer's events in order on the remote side. Failures of any kind are
/// logged and never retried — a reconnecting client observes ground truth
/// through normal reads regardless.
#[derive(Clone)]
pub struct RelayClient {
    tx: mpsc::UnboundedSender<RelayEnvelope>,
}

impl RelayClient {
    /// Spawn the relay worker. `endpoint` is the full URL of the remote
    /// relay surface, e.g. `http://transport-host:4500/internal/relay`.
    pub fn spawn(endpoint: String, secret: String) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<RelayEnvelope>();

        let http = reqwest::Client::builder()
            .timeout(RELAY_TIMEOUT)
            .build()
            .expect("relay http client");

        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                deliver(&http, &endpoint, &secret, envelope).await;
            }
        });

        Self { tx }
    }

    pub fn forward(&self, event: ChatEventKind, target: RelayTarget) {
        // Only fails when the worker is gone, i.e. during shutdown.
        let _ = self.tx.send(RelayEnvelope { event, target });
    }
}

async fn deliver(
    http: &reqwest::Client,
    endpoint: &str,
    secret: &str,
    envelope: RelayEnvelope,
) {
    let result = http
        .post(endpoint)
        .header(RELAY_SECRET_HEADER, secret)
        .json(&envelope)
        .send()
        .await;

    match result {
        Ok(resp) if resp.status().is_success() => {
            debug!("relayed event for room {}", envelope.event.room_id());
        }
        Ok(resp) if resp.status() == StatusCode::UNAUTHORIZED => {
            warn!("relay rejected: shared secret mismatch");
        }
        Ok(resp) if resp.status() == StatusCode::SERVICE_UNAVAILABLE => {
            warn!("relay target hosts no active push transport");
        }
        Ok(resp) => {
            warn!("relay returned unexpected status {}", resp.status());
        }
        Err(e) => {
            warn!("relay call failed: {}", e);
        }
    }
}
