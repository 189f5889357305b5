use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::dispatch::dispatcher::{
    DispatcherConfig, DEFAULT_MAX_RETRIES, DEFAULT_MIN_INTERVAL_MS, DEFAULT_RETRY_DELAY_MS,
};
use crate::tts::types::VoicePreset;

pub const DEFAULT_TTS_PROVIDER: &str = "gemini";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TtsProviderConfig {
    #[serde(rename = "gemini")]
    Gemini {
        /// Falls back to the GEMINI_API_KEY environment variable when unset
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default)]
        model_id: Option<String>,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

impl Default for TtsProviderConfig {
    fn default() -> Self {
        Self::Gemini {
            api_key: None,
            model_id: None,
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtsSettings {
    #[serde(default)]
    pub default_tts: Option<String>,

    #[serde(default)]
    pub tts_providers: HashMap<String, TtsProviderConfig>,
}

impl Default for TtsSettings {
    fn default() -> Self {
        Self {
            default_tts: Some(DEFAULT_TTS_PROVIDER.to_string()),
            tts_providers: HashMap::from([(
                DEFAULT_TTS_PROVIDER.to_string(),
                TtsProviderConfig::default(),
            )]),
        }
    }
}

impl TtsSettings {
    pub fn active_tts(&self) -> Option<&TtsProviderConfig> {
        let name = self.default_tts.as_ref()?;
        self.tts_providers.get(name)
    }
}

/// Throttle and retry knobs, in the units they are written in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherSettings {
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default)]
    pub call_timeout_ms: Option<u64>,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            call_timeout_ms: None,
        }
    }
}

impl DispatcherSettings {
    pub fn to_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            min_interval: Duration::from_millis(self.min_interval_ms),
            max_retries: self.max_retries.max(1),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            call_timeout: self.call_timeout_ms.map(Duration::from_millis),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Voice used when a request does not name one
    #[serde(default)]
    pub default_voice: VoicePreset,

    /// Style directive applied when a request does not carry its own
    #[serde(default)]
    pub default_style: Option<String>,

    #[serde(default)]
    pub dispatcher: DispatcherSettings,

    #[serde(default)]
    pub tts: TtsSettings,
}

fn default_min_interval_ms() -> u64 {
    DEFAULT_MIN_INTERVAL_MS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

fn default_timeout_secs() -> u64 {
    60
}
