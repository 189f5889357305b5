use std::sync::{Arc, Mutex};

use tokio::time::Instant;

use super::error::{SynthesisError, SynthesisErrorKind};
use super::provider::TextToSpeech;
use super::types::{AudioData, SynthesisRequest};

/// Mock behavior for the mock synthesizer
#[derive(Debug, Clone, Default)]
pub enum MockBehavior {
    /// Return a short audio clip
    #[default]
    Success,
    /// Fail with the given kind N times, then succeed
    ErrorThenSuccess {
        kind: SynthesisErrorKind,
        remaining_errors: usize,
    },
    /// Always fail with the given kind
    AlwaysError(SynthesisErrorKind),
    /// Never resolve
    Hang,
    /// Drive a scripted sequence of calls; falls back to Success once empty
    BehaviorQueue { behaviors: Vec<MockBehavior> },
}

/// Audio every successful mock call returns
pub const MOCK_PCM: [u8; 8] = [0, 1, 2, 3, 4, 5, 6, 7];

fn mock_error(kind: SynthesisErrorKind, detail: &str) -> SynthesisError {
    match kind {
        SynthesisErrorKind::RateLimited => {
            SynthesisError::RateLimited(anyhow::anyhow!("Mock quota exceeded ({detail})"))
        }
        SynthesisErrorKind::ContentRejected => {
            SynthesisError::ContentRejected(anyhow::anyhow!("Mock safety block ({detail})"))
        }
        SynthesisErrorKind::Transient => {
            SynthesisError::Transient(anyhow::anyhow!("Mock transient error ({detail})"))
        }
    }
}

fn mock_audio() -> AudioData {
    AudioData {
        pcm_data: MOCK_PCM.to_vec(),
        sample_rate: 24_000,
        channels: 1,
    }
}

/// Mock synthesis capability for testing. Clones share state.
#[derive(Clone)]
pub struct MockSynthesizer {
    behavior: Arc<Mutex<MockBehavior>>,
    call_times: Arc<Mutex<Vec<Instant>>>,
    captured_requests: Arc<Mutex<Vec<SynthesisRequest>>>,
}

impl MockSynthesizer {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior: Arc::new(Mutex::new(behavior)),
            call_times: Arc::new(Mutex::new(Vec::new())),
            captured_requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn pop_behavior_from_queue(behavior: &mut MockBehavior) -> MockBehavior {
        if let MockBehavior::BehaviorQueue { behaviors } = behavior {
            if behaviors.is_empty() {
                return MockBehavior::Success;
            }
            return behaviors.remove(0);
        }
        behavior.clone()
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn get_call_count(&self) -> usize {
        self.call_times.lock().unwrap().len()
    }

    /// When each call reached the synthesizer, in order
    pub fn get_call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }

    pub fn get_captured_requests(&self) -> Vec<SynthesisRequest> {
        self.captured_requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TextToSpeech for MockSynthesizer {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioData, SynthesisError> {
        self.captured_requests.lock().unwrap().push(request.clone());
        self.call_times.lock().unwrap().push(Instant::now());

        let effective = {
            let mut behavior = self.behavior.lock().unwrap();
            Self::pop_behavior_from_queue(&mut behavior)
        };

        match effective {
            MockBehavior::Success => Ok(mock_audio()),
            MockBehavior::ErrorThenSuccess {
                kind,
                mut remaining_errors,
            } => {
                if remaining_errors > 0 {
                    remaining_errors -= 1;
                    self.set_behavior(MockBehavior::ErrorThenSuccess {
                        kind,
                        remaining_errors,
                    });
                    Err(mock_error(
                        kind,
                        &format!("remaining: {remaining_errors}"),
                    ))
                } else {
                    Ok(mock_audio())
                }
            }
            MockBehavior::AlwaysError(kind) => Err(mock_error(kind, "always fails")),
            MockBehavior::Hang => std::future::pending().await,
            MockBehavior::BehaviorQueue { .. } => {
                unreachable!("queues are unwrapped by pop_behavior_from_queue")
            }
        }
    }
}
