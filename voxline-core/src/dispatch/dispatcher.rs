use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::cancel::CancelSignal;
use super::error::DispatchError;
use super::events::{DispatchEvent, EventSender};
use super::throttle::Throttle;
use crate::tts::error::{SynthesisError, SynthesisErrorKind};
use crate::tts::provider::TextToSpeech;
use crate::tts::types::{AudioData, SynthesisRequest};

pub const DEFAULT_MIN_INTERVAL_MS: u64 = 1500;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Minimum spacing between the starts of two issuances
    pub min_interval: Duration,
    /// Total attempts per request, including the first
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Upper bound on a single call, on top of whatever the binding enforces
    pub call_timeout: Option<Duration>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(DEFAULT_MIN_INTERVAL_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            call_timeout: None,
        }
    }
}

/// How long to back off after `attempt` (1-based) failed with `kind`.
/// Rate limits back off linearly, everything else waits a flat delay.
pub fn backoff_for(kind: SynthesisErrorKind, attempt: u32, retry_delay: Duration) -> Duration {
    match kind {
        SynthesisErrorKind::RateLimited => retry_delay.saturating_mul(attempt),
        _ => retry_delay,
    }
}

/// Throttling and retrying wrapper around a synthesis capability.
///
/// Every attempt, first or retry, passes through the throttle, so the
/// minimum interval holds across failures and across concurrent callers
/// sharing the same [`Throttle`].
#[derive(Clone)]
pub struct Dispatcher {
    provider: Arc<dyn TextToSpeech>,
    config: DispatcherConfig,
    throttle: Throttle,
    events: EventSender,
}

impl Dispatcher {
    pub fn new(provider: Arc<dyn TextToSpeech>, config: DispatcherConfig) -> Self {
        Self {
            provider,
            config,
            throttle: Throttle::new(),
            events: EventSender::default(),
        }
    }

    /// Join an existing throttling domain
    pub fn with_throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_events(mut self, tx: mpsc::UnboundedSender<DispatchEvent>) -> Self {
        self.events = EventSender::new(tx);
        self
    }

    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    pub async fn generate(
        &self,
        request: &SynthesisRequest,
        cancel: &CancelSignal,
    ) -> Result<AudioData, DispatchError> {
        self.generate_with_config(request, &self.config, cancel)
            .await
    }

    /// Like [`Dispatcher::generate`] with a per-call configuration. The
    /// throttle is still shared with every other call on this dispatcher.
    pub async fn generate_with_config(
        &self,
        request: &SynthesisRequest,
        config: &DispatcherConfig,
        cancel: &CancelSignal,
    ) -> Result<AudioData, DispatchError> {
        request.validate().map_err(DispatchError::InvalidRequest)?;
        self.provider
            .check_request(request)
            .map_err(DispatchError::InvalidRequest)?;

        let max_retries = config.max_retries.max(1);
        let mut attempt = 0;

        loop {
            let waited = self
                .throttle
                .acquire(config.min_interval, cancel)
                .await
                .map_err(|_| DispatchError::Cancelled { attempts: attempt })?;

            if !waited.is_zero() {
                self.events.send(DispatchEvent::Throttled {
                    waited_ms: waited.as_millis() as u64,
                });
            }

            attempt += 1;
            debug!(attempt, provider = self.provider.name(), "Issuing synthesis request");

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(attempt, "Synthesis cancelled while in flight");
                    return Err(DispatchError::Cancelled { attempts: attempt });
                }
                result = self.issue(request, config.call_timeout) => result,
            };

            let error = match result {
                Ok(audio) => {
                    if attempt > 1 {
                        info!("Request succeeded after {} retries", attempt - 1);
                    }
                    self.events.send(DispatchEvent::Succeeded { attempts: attempt });
                    return Ok(audio);
                }
                Err(error) => error,
            };

            if error.kind() == SynthesisErrorKind::ContentRejected {
                warn!(attempt, error = %error, "Synthesis rejected, not retrying");
                return Err(DispatchError::ContentRejected {
                    attempts: attempt,
                    source: error,
                });
            }

            if attempt >= max_retries {
                warn!(
                    attempt,
                    max_retries, "Request failed after {} attempts: {}", attempt, error
                );
                return Err(DispatchError::RetriesExhausted {
                    attempts: attempt,
                    last_error: error,
                });
            }

            let backoff = backoff_for(error.kind(), attempt, config.retry_delay);
            let backoff_ms = backoff.as_millis() as u64;

            self.events.send(DispatchEvent::RetryAttempt {
                attempt: attempt + 1,
                max_retries,
                error: error.to_string(),
                backoff_ms,
            });

            warn!(
                attempt = attempt + 1,
                max_retries,
                backoff_ms,
                error = %error,
                "Request failed, retrying after backoff"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(attempt, "Synthesis cancelled during backoff");
                    return Err(DispatchError::Cancelled { attempts: attempt });
                }
                _ = sleep(backoff) => {}
            }
        }
    }

    async fn issue(
        &self,
        request: &SynthesisRequest,
        call_timeout: Option<Duration>,
    ) -> Result<AudioData, SynthesisError> {
        let call = self.provider.synthesize(request);
        match call_timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
                Err(SynthesisError::Transient(anyhow!(
                    "Synthesis call timed out after {}ms",
                    limit.as_millis()
                )))
            }),
            None => call.await,
        }
    }
}
