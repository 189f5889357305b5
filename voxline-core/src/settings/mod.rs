pub mod config;
pub mod manager;


pub use config::{DispatcherSettings, Settings, TtsProviderConfig, TtsSettings};
pub use manager::SettingsManager;
