use thiserror::Error;

use crate::tts::error::SynthesisError;

/// Terminal outcome of a failed `generate` call
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The request broke an invariant; nothing was sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Content rejected after {attempts} attempt(s): {source}")]
    ContentRejected {
        attempts: u32,
        source: SynthesisError,
    },

    #[error("Retries exhausted after {attempts} attempt(s): {last_error}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last_error: SynthesisError,
    },

    #[error("Cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
}

impl DispatchError {
    /// Number of calls that reached the synthesis capability
    pub fn attempts(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 0,
            Self::ContentRejected { attempts, .. }
            | Self::RetriesExhausted { attempts, .. }
            | Self::Cancelled { attempts } => *attempts,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
