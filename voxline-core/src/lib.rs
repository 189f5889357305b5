pub mod dispatch;
pub mod settings;
pub mod tts;

// Public library API
pub use dispatch::{cancel_pair, CancelHandle, CancelSignal, DispatchError, Dispatcher};
pub use settings::{Settings, SettingsManager};
pub use tts::{AudioData, SynthesisRequest, TextToSpeech, VoicePreset};
