use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Progress reports from a dispatcher, for front ends that want to show
/// throttling and retries as they happen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum DispatchEvent {
    Throttled {
        waited_ms: u64,
    },
    RetryAttempt {
        attempt: u32,
        max_retries: u32,
        error: String,
        backoff_ms: u64,
    },
    Succeeded {
        attempts: u32,
    },
}

#[derive(Debug, Clone, Default)]
pub(crate) struct EventSender {
    tx: Option<mpsc::UnboundedSender<DispatchEvent>>,
}

impl EventSender {
    pub(crate) fn new(tx: mpsc::UnboundedSender<DispatchEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub(crate) fn send(&self, event: DispatchEvent) {
        if let Some(tx) = &self.tx {
            // A dropped receiver just means nobody is listening
            let _ = tx.send(event);
        }
    }
}
