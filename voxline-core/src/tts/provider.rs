use async_trait::async_trait;

use super::error::SynthesisError;
use super::types::{AudioData, SynthesisRequest};

/// Trait for text-to-speech providers
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    fn name(&self) -> &'static str;

    /// Provider-specific request checks, run once before any call is issued
    fn check_request(&self, _request: &SynthesisRequest) -> Result<(), String> {
        Ok(())
    }

    /// Synthesize a single request. Implementations classify every failure
    /// into a [`SynthesisError`] variant; callers never inspect messages.
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioData, SynthesisError>;
}
