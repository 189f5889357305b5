use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::VariantArray;

/// Audio data returned from TTS synthesis
#[derive(Debug, Clone)]
pub struct AudioData {
    pub pcm_data: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioData {
    /// Playback length assuming 16-bit samples
    pub fn duration_ms(&self) -> u64 {
        let bytes_per_second = self.sample_rate as u64 * self.channels as u64 * 2;
        if bytes_per_second == 0 {
            return 0;
        }
        self.pcm_data.len() as u64 * 1000 / bytes_per_second
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoiceGender {
    Female,
    Male,
}

/// The prebuilt voices offered by the hosted speech service
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, strum::VariantArray,
)]
pub enum VoicePreset {
    Achernar,
    Achird,
    Algenib,
    Algieba,
    Alnilam,
    Aoede,
    Autonoe,
    Callirrhoe,
    Charon,
    Despina,
    Enceladus,
    Erinome,
    Fenrir,
    Gacrux,
    Iapetus,
    #[default]
    Kore,
    Laomedeia,
    Leda,
    Orus,
    Pulcherrima,
    Puck,
    Rasalgethi,
    Sadachbia,
    Sadaltager,
    Schedar,
    Sulafat,
    Umbriel,
    Vindemiatrix,
    Zephyr,
    Zubenelgenubi,
}

impl VoicePreset {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Achernar => "Achernar",
            Self::Achird => "Achird",
            Self::Algenib => "Algenib",
            Self::Algieba => "Algieba",
            Self::Alnilam => "Alnilam",
            Self::Aoede => "Aoede",
            Self::Autonoe => "Autonoe",
            Self::Callirrhoe => "Callirrhoe",
            Self::Charon => "Charon",
            Self::Despina => "Despina",
            Self::Enceladus => "Enceladus",
            Self::Erinome => "Erinome",
            Self::Fenrir => "Fenrir",
            Self::Gacrux => "Gacrux",
            Self::Iapetus => "Iapetus",
            Self::Kore => "Kore",
            Self::Laomedeia => "Laomedeia",
            Self::Leda => "Leda",
            Self::Orus => "Orus",
            Self::Pulcherrima => "Pulcherrima",
            Self::Puck => "Puck",
            Self::Rasalgethi => "Rasalgethi",
            Self::Sadachbia => "Sadachbia",
            Self::Sadaltager => "Sadaltager",
            Self::Schedar => "Schedar",
            Self::Sulafat => "Sulafat",
            Self::Umbriel => "Umbriel",
            Self::Vindemiatrix => "Vindemiatrix",
            Self::Zephyr => "Zephyr",
            Self::Zubenelgenubi => "Zubenelgenubi",
        }
    }

    pub const fn gender(self) -> VoiceGender {
        match self {
            Self::Achernar
            | Self::Aoede
            | Self::Autonoe
            | Self::Callirrhoe
            | Self::Despina
            | Self::Erinome
            | Self::Gacrux
            | Self::Kore
            | Self::Laomedeia
            | Self::Leda
            | Self::Pulcherrima
            | Self::Sulafat
            | Self::Vindemiatrix
            | Self::Zephyr => VoiceGender::Female,
            _ => VoiceGender::Male,
        }
    }

    pub fn all() -> &'static [VoicePreset] {
        Self::VARIANTS
    }
}

impl fmt::Display for VoicePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VoicePreset {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Self::VARIANTS
            .iter()
            .copied()
            .find(|preset| preset.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("Unknown voice preset: {trimmed}"))
    }
}

impl Serialize for VoicePreset {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for VoicePreset {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// Which voice(s) should speak the request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceSelection {
    Single(VoicePreset),
    /// Speaker label (as it appears in the text) to voice
    MultiSpeaker(BTreeMap<String, VoicePreset>),
}

impl Default for VoiceSelection {
    fn default() -> Self {
        Self::Single(VoicePreset::default())
    }
}

/// One logical "synthesize speech" operation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    text: String,
    voice: VoiceSelection,
    style: Option<String>,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: VoiceSelection::default(),
            style: None,
        }
    }

    pub fn with_voice(mut self, voice: VoicePreset) -> Self {
        self.voice = VoiceSelection::Single(voice);
        self
    }

    pub fn with_speakers(mut self, speakers: BTreeMap<String, VoicePreset>) -> Self {
        self.voice = VoiceSelection::MultiSpeaker(speakers);
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        let style = style.into();
        let style = style.trim();
        self.style = (!style.is_empty()).then(|| style.to_string());
        self
    }

    /// The normalized source text (surrounding whitespace removed)
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    pub fn voice(&self) -> &VoiceSelection {
        &self.voice
    }

    pub fn style(&self) -> Option<&str> {
        self.style.as_deref()
    }

    /// Text actually sent to the synthesis capability, with any style
    /// directive merged ahead of the source text.
    pub fn prompt_text(&self) -> String {
        match &self.style {
            Some(style) => format!("{}: {}", style.trim_end_matches(':'), self.text()),
            None => self.text().to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.text().is_empty() {
            return Err("Synthesis text must not be empty".to_string());
        }

        if let VoiceSelection::MultiSpeaker(speakers) = &self.voice {
            if speakers.is_empty() {
                return Err("Multi-speaker request needs at least one speaker".to_string());
            }
            if let Some(label) = speakers.keys().find(|label| label.trim().is_empty()) {
                return Err(format!("Invalid speaker label: {label:?}"));
            }
        }

        Ok(())
    }
}
