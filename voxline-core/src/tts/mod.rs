//! Text-to-speech capability: request types, the provider trait, and the
//! bindings that implement it.

pub mod error;
pub mod gemini;
pub mod mock;
pub mod provider;
pub mod types;

pub use error::{SynthesisError, SynthesisErrorKind};
pub use gemini::{GeminiTts, GeminiTtsConfig};
pub use provider::TextToSpeech;
pub use types::{AudioData, SynthesisRequest, VoiceGender, VoicePreset, VoiceSelection};

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::settings::config::TtsProviderConfig;

pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Build the synthesis capability described by a provider config
pub fn create_provider(config: &TtsProviderConfig) -> anyhow::Result<Arc<dyn TextToSpeech>> {
    match config {
        TtsProviderConfig::Gemini {
            api_key,
            model_id,
            base_url,
            timeout_secs,
        } => {
            let api_key = match api_key {
                Some(key) => key.clone(),
                None => std::env::var(GEMINI_API_KEY_ENV).with_context(|| {
                    format!("No Gemini api_key in settings and {GEMINI_API_KEY_ENV} is not set")
                })?,
            };

            let mut gemini_config = GeminiTtsConfig::new(api_key);
            if let Some(model_id) = model_id {
                gemini_config.model_id = model_id.clone();
            }
            if let Some(base_url) = base_url {
                gemini_config.base_url = base_url.clone();
            }
            gemini_config.timeout = Duration::from_secs(*timeout_secs);

            Ok(Arc::new(GeminiTts::new(gemini_config)?))
        }
    }
}
