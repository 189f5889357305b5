//! Gemini text-to-speech implementation

use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use base64::Engine as _;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::SynthesisError;
use super::provider::TextToSpeech;
use super::types::{AudioData, SynthesisRequest, VoicePreset, VoiceSelection};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-tts";
const DEFAULT_SAMPLE_RATE: u32 = 24_000;
const MAX_SPEAKERS: usize = 2;

/// Finish reasons that mean the content was filtered rather than the call failing
const REJECTED_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "PROHIBITED_CONTENT",
    "BLOCKLIST",
    "SPII",
    "RECITATION",
];

#[derive(Debug, Clone)]
pub struct GeminiTtsConfig {
    pub api_key: String,
    pub model_id: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiTtsConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            model_id: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

pub struct GeminiTts {
    config: GeminiTtsConfig,
    client: Client,
}

impl GeminiTts {
    pub fn new(config: GeminiTtsConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model_id
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<RequestContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct RequestContent {
    parts: Vec<TextPart>,
}

#[derive(Serialize)]
struct TextPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
    speech_config: SpeechConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    voice_config: Option<VoiceConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    multi_speaker_voice_config: Option<MultiSpeakerVoiceConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MultiSpeakerVoiceConfig {
    speaker_voice_configs: Vec<SpeakerVoiceConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeakerVoiceConfig {
    speaker: String,
    voice_config: VoiceConfig,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: Option<String>,
    data: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

fn voice_config(voice: VoicePreset) -> VoiceConfig {
    VoiceConfig {
        prebuilt_voice_config: PrebuiltVoiceConfig {
            voice_name: voice.name(),
        },
    }
}

fn build_request(request: &SynthesisRequest) -> GenerateRequest {
    let speech_config = match request.voice() {
        VoiceSelection::Single(voice) => SpeechConfig {
            voice_config: Some(voice_config(*voice)),
            multi_speaker_voice_config: None,
        },
        VoiceSelection::MultiSpeaker(speakers) => SpeechConfig {
            voice_config: None,
            multi_speaker_voice_config: Some(MultiSpeakerVoiceConfig {
                speaker_voice_configs: speakers
                    .iter()
                    .map(|(speaker, voice)| SpeakerVoiceConfig {
                        speaker: speaker.clone(),
                        voice_config: voice_config(*voice),
                    })
                    .collect(),
            }),
        },
    };

    GenerateRequest {
        contents: vec![RequestContent {
            parts: vec![TextPart {
                text: request.prompt_text(),
            }],
        }],
        generation_config: GenerationConfig {
            response_modalities: vec!["AUDIO"],
            speech_config,
        },
    }
}

/// Maps a non-success HTTP response onto an error kind
fn classify_http_error(status: StatusCode, body: &str) -> SynthesisError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let api_status = parsed.as_ref().and_then(|e| e.error.status.as_deref());
    let message = parsed
        .as_ref()
        .map(|e| e.error.message.as_str())
        .filter(|m| !m.is_empty())
        .unwrap_or(body);

    let error = anyhow!("Gemini API error {status}: {message}");

    if status == StatusCode::TOO_MANY_REQUESTS || api_status == Some("RESOURCE_EXHAUSTED") {
        return SynthesisError::RateLimited(error);
    }

    SynthesisError::Transient(error)
}

/// Pulls the audio payload out of a successful response, surfacing content
/// filtering as [`SynthesisError::ContentRejected`].
fn extract_audio(response: GenerateResponse) -> Result<AudioData, SynthesisError> {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        return Err(SynthesisError::ContentRejected(anyhow!(
            "Prompt blocked by Gemini: {reason}"
        )));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| SynthesisError::Transient(anyhow!("No candidates in Gemini response")))?;

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if REJECTED_FINISH_REASONS.contains(&reason) {
            return Err(SynthesisError::ContentRejected(anyhow!(
                "Gemini stopped generation: {reason}"
            )));
        }
    }

    let inline = candidate
        .content
        .into_iter()
        .flat_map(|c| c.parts)
        .find_map(|p| p.inline_data)
        .ok_or_else(|| SynthesisError::Transient(anyhow!("No audio in Gemini response")))?;

    let pcm_data = base64::engine::general_purpose::STANDARD
        .decode(inline.data.as_bytes())
        .map_err(|e| SynthesisError::Transient(anyhow!("Invalid audio payload: {e}")))?;

    if pcm_data.is_empty() {
        return Err(SynthesisError::Transient(anyhow!(
            "Empty audio payload in Gemini response"
        )));
    }

    let sample_rate = inline
        .mime_type
        .as_deref()
        .and_then(sample_rate_from_mime)
        .unwrap_or(DEFAULT_SAMPLE_RATE);

    Ok(AudioData {
        pcm_data,
        sample_rate,
        channels: 1,
    })
}

/// Reads `rate=NNNN` from a mime type such as `audio/L16;codec=pcm;rate=24000`
fn sample_rate_from_mime(mime: &str) -> Option<u32> {
    mime.split(';')
        .filter_map(|param| param.trim().strip_prefix("rate="))
        .find_map(|rate| rate.parse().ok())
}

#[async_trait]
impl TextToSpeech for GeminiTts {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn check_request(&self, request: &SynthesisRequest) -> Result<(), String> {
        match request.voice() {
            VoiceSelection::MultiSpeaker(speakers) if speakers.len() > MAX_SPEAKERS => Err(
                format!(
                    "Gemini supports at most {MAX_SPEAKERS} speakers, got {}",
                    speakers.len()
                ),
            ),
            _ => Ok(()),
        }
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioData, SynthesisError> {
        let body = build_request(request);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                debug!(?e, "Gemini API call failed");
                SynthesisError::Transient(anyhow!("Network error: {e}"))
            })?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| SynthesisError::Transient(anyhow!("Failed to read response: {e}")))?;

        if !status.is_success() {
            debug!(?status, ?response_text, "Gemini API returned error");
            return Err(classify_http_error(status, &response_text));
        }

        let parsed: GenerateResponse = serde_json::from_str(&response_text).map_err(|e| {
            SynthesisError::Transient(anyhow!("Failed to parse Gemini response: {e}"))
        })?;

        extract_audio(parsed)
    }
}
