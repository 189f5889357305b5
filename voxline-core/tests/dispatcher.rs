//! Timing and retry behavior of the dispatcher, run against the mock
//! synthesizer on a paused tokio clock.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use voxline_core::dispatch::{
    cancel_pair, CancelSignal, DispatchError, DispatchEvent, Dispatcher, DispatcherConfig,
    Throttle,
};
use voxline_core::tts::error::{SynthesisError, SynthesisErrorKind};
use voxline_core::tts::mock::{MockBehavior, MockSynthesizer, MOCK_PCM};
use voxline_core::tts::SynthesisRequest;

fn config(min_interval_ms: u64, max_retries: u32, retry_delay_ms: u64) -> DispatcherConfig {
    DispatcherConfig {
        min_interval: Duration::from_millis(min_interval_ms),
        max_retries,
        retry_delay: Duration::from_millis(retry_delay_ms),
        call_timeout: None,
    }
}

fn dispatcher(mock: &MockSynthesizer, config: DispatcherConfig) -> Dispatcher {
    Dispatcher::new(Arc::new(mock.clone()), config)
}

fn gaps(times: &[Instant]) -> Vec<Duration> {
    times.windows(2).map(|pair| pair[1] - pair[0]).collect()
}

fn request() -> SynthesisRequest {
    SynthesisRequest::new("Say hello to the listeners")
}

#[tokio::test(start_paused = true)]
async fn test_sequential_calls_respect_min_interval() {
    let mock = MockSynthesizer::new(MockBehavior::Success);
    let dispatcher = dispatcher(&mock, config(1000, 3, 2000));
    let never = CancelSignal::never();

    for _ in 0..5 {
        let audio = dispatcher.generate(&request(), &never).await.unwrap();
        assert_eq!(audio.pcm_data, MOCK_PCM.to_vec());
    }

    let times = mock.get_call_times();
    assert_eq!(times.len(), 5);
    for gap in gaps(&times) {
        assert!(gap >= Duration::from_millis(1000), "gap too short: {gap:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_calls_share_the_throttle() {
    let mock = MockSynthesizer::new(MockBehavior::Success);
    let dispatcher = dispatcher(&mock, config(1000, 3, 2000));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .generate(&request(), &CancelSignal::never())
                    .await
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    let mut times = mock.get_call_times();
    times.sort();
    assert_eq!(times.len(), 4);
    for gap in gaps(&times) {
        assert!(gap >= Duration::from_millis(1000), "gap too short: {gap:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_second_call_fired_100ms_later_is_delayed() {
    let mock = MockSynthesizer::new(MockBehavior::Success);
    let dispatcher = dispatcher(&mock, config(1000, 3, 2000));

    let first = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move { dispatcher.generate(&request(), &CancelSignal::never()).await })
    };

    sleep(Duration::from_millis(100)).await;
    let second_fired = Instant::now();
    let second = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move { dispatcher.generate(&request(), &CancelSignal::never()).await })
    };

    assert!(first.await.unwrap().is_ok());
    assert!(second.await.unwrap().is_ok());

    let times = mock.get_call_times();
    assert_eq!(times.len(), 2);
    assert!(times[1] - second_fired >= Duration::from_millis(900));
    assert!(times[1] - times[0] >= Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn test_content_rejection_is_never_retried() {
    let mock = MockSynthesizer::new(MockBehavior::AlwaysError(
        SynthesisErrorKind::ContentRejected,
    ));
    let dispatcher = dispatcher(&mock, config(1000, 5, 2000));

    let error = dispatcher
        .generate(&request(), &CancelSignal::never())
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        DispatchError::ContentRejected {
            attempts: 1,
            source: SynthesisError::ContentRejected(_)
        }
    ));
    assert_eq!(mock.get_call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_backs_off_linearly() {
    let mock = MockSynthesizer::new(MockBehavior::AlwaysError(SynthesisErrorKind::RateLimited));
    let dispatcher = dispatcher(&mock, config(1500, 4, 2000));

    let error = dispatcher
        .generate(&request(), &CancelSignal::never())
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        DispatchError::RetriesExhausted {
            attempts: 4,
            last_error: SynthesisError::RateLimited(_)
        }
    ));
    assert_eq!(
        gaps(&mock.get_call_times()),
        vec![
            Duration::from_millis(2000),
            Duration::from_millis(4000),
            Duration::from_millis(6000),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_transient_errors_back_off_flat_then_succeed() {
    let mock = MockSynthesizer::new(MockBehavior::ErrorThenSuccess {
        kind: SynthesisErrorKind::Transient,
        remaining_errors: 2,
    });
    let dispatcher = dispatcher(&mock, config(0, 3, 2000));

    let audio = dispatcher
        .generate(&request(), &CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(audio.pcm_data, MOCK_PCM.to_vec());
    assert_eq!(
        gaps(&mock.get_call_times()),
        vec![Duration::from_millis(2000), Duration::from_millis(2000)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_transient_errors_exhaust_retries() {
    let mock = MockSynthesizer::new(MockBehavior::AlwaysError(SynthesisErrorKind::Transient));
    let dispatcher = dispatcher(&mock, config(1000, 3, 2000));

    let error = dispatcher
        .generate(&request(), &CancelSignal::never())
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        DispatchError::RetriesExhausted {
            attempts: 3,
            last_error: SynthesisError::Transient(_)
        }
    ));
    assert_eq!(error.attempts(), 3);

    // Nothing else is attempted once the call has returned
    sleep(Duration::from_secs(60)).await;
    assert_eq!(mock.get_call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_throttle_wait_issues_nothing() {
    let mock = MockSynthesizer::new(MockBehavior::Success);
    let dispatcher = dispatcher(&mock, config(1000, 3, 2000));

    dispatcher
        .generate(&request(), &CancelSignal::never())
        .await
        .unwrap();

    let (handle, signal) = cancel_pair();
    let pending = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move { dispatcher.generate(&request(), &signal).await })
    };

    sleep(Duration::from_millis(200)).await;
    handle.cancel();

    let error = pending.await.unwrap().unwrap_err();
    assert!(matches!(error, DispatchError::Cancelled { attempts: 0 }));
    assert_eq!(mock.get_call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_already_cancelled_issues_nothing() {
    let mock = MockSynthesizer::new(MockBehavior::Success);
    let dispatcher = dispatcher(&mock, config(1000, 3, 2000));
    let (handle, signal) = cancel_pair();
    handle.cancel();

    let error = dispatcher.generate(&request(), &signal).await.unwrap_err();

    assert!(error.is_cancelled());
    assert_eq!(error.attempts(), 0);
    assert_eq!(mock.get_call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_aborts_in_flight_call() {
    let mock = MockSynthesizer::new(MockBehavior::Hang);
    let dispatcher = dispatcher(&mock, config(1000, 3, 2000));
    let (handle, signal) = cancel_pair();

    let pending = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move { dispatcher.generate(&request(), &signal).await })
    };

    sleep(Duration::from_secs(5)).await;
    handle.cancel();

    let error = pending.await.unwrap().unwrap_err();
    assert!(matches!(error, DispatchError::Cancelled { attempts: 1 }));
    assert_eq!(mock.get_call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff_stops_retrying() {
    let mock = MockSynthesizer::new(MockBehavior::AlwaysError(SynthesisErrorKind::RateLimited));
    let dispatcher = dispatcher(&mock, config(1000, 3, 10_000));
    let (handle, signal) = cancel_pair();

    let pending = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move { dispatcher.generate(&request(), &signal).await })
    };

    sleep(Duration::from_secs(3)).await;
    handle.cancel();

    let error = pending.await.unwrap().unwrap_err();
    assert!(matches!(error, DispatchError::Cancelled { attempts: 1 }));
    assert_eq!(mock.get_call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_call_timeout_counts_as_transient() {
    let mock = MockSynthesizer::new(MockBehavior::Hang);
    let mut config = config(0, 2, 100);
    config.call_timeout = Some(Duration::from_millis(500));
    let dispatcher = dispatcher(&mock, config);

    let error = dispatcher
        .generate(&request(), &CancelSignal::never())
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        DispatchError::RetriesExhausted {
            attempts: 2,
            last_error: SynthesisError::Transient(_)
        }
    ));
    assert_eq!(mock.get_call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_blank_request_is_rejected_before_any_call() {
    let mock = MockSynthesizer::new(MockBehavior::Success);
    let dispatcher = dispatcher(&mock, config(1000, 3, 2000));

    let error = dispatcher
        .generate(&SynthesisRequest::new("  \t "), &CancelSignal::never())
        .await
        .unwrap_err();

    assert!(matches!(error, DispatchError::InvalidRequest(_)));
    assert_eq!(error.attempts(), 0);
    assert_eq!(mock.get_call_count(), 0);
    assert!(dispatcher.throttle().last_issued().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_failed_attempts_still_advance_the_throttle() {
    let mock = MockSynthesizer::new(MockBehavior::BehaviorQueue {
        behaviors: vec![MockBehavior::AlwaysError(SynthesisErrorKind::ContentRejected)],
    });
    let dispatcher = dispatcher(&mock, config(1000, 3, 2000));
    let never = CancelSignal::never();

    assert!(dispatcher.generate(&request(), &never).await.is_err());
    assert!(dispatcher.generate(&request(), &never).await.is_ok());

    let times = mock.get_call_times();
    assert!(times[1] - times[0] >= Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn test_throttling_domains() {
    let mock = MockSynthesizer::new(MockBehavior::Success);
    let never = CancelSignal::never();
    let shared = Throttle::new();

    let first = dispatcher(&mock, config(1000, 3, 2000)).with_throttle(shared.clone());
    let joined = dispatcher(&mock, config(1000, 3, 2000)).with_throttle(shared);
    let independent = dispatcher(&mock, config(1000, 3, 2000));

    first.generate(&request(), &never).await.unwrap();
    let start = Instant::now();
    independent.generate(&request(), &never).await.unwrap();
    assert_eq!(Instant::now() - start, Duration::ZERO);

    joined.generate(&request(), &never).await.unwrap();
    assert!(Instant::now() - start >= Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn test_events_report_throttle_and_retries() {
    let mock = MockSynthesizer::new(MockBehavior::ErrorThenSuccess {
        kind: SynthesisErrorKind::RateLimited,
        remaining_errors: 2,
    });
    let (tx, mut rx) = mpsc::unbounded_channel();
    let dispatcher = dispatcher(&mock, config(5000, 3, 1000)).with_events(tx);

    dispatcher
        .generate(&request(), &CancelSignal::never())
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    let retries: Vec<(u32, u64)> = events
        .iter()
        .filter_map(|event| match event {
            DispatchEvent::RetryAttempt {
                attempt,
                backoff_ms,
                ..
            } => Some((*attempt, *backoff_ms)),
            _ => None,
        })
        .collect();
    assert_eq!(retries, vec![(2, 1000), (3, 2000)]);

    // Backoff is shorter than the interval, so each retry also waits on the throttle
    let throttled = events
        .iter()
        .filter(|event| matches!(event, DispatchEvent::Throttled { .. }))
        .count();
    assert_eq!(throttled, 2);

    assert_eq!(events.last(), Some(&DispatchEvent::Succeeded { attempts: 3 }));
}

#[tokio::test(start_paused = true)]
async fn test_per_call_config_overrides_retries() {
    let mock = MockSynthesizer::new(MockBehavior::AlwaysError(SynthesisErrorKind::Transient));
    let dispatcher = dispatcher(&mock, config(0, 5, 10));

    let error = dispatcher
        .generate_with_config(&request(), &config(0, 1, 10), &CancelSignal::never())
        .await
        .unwrap_err();

    assert_eq!(error.attempts(), 1);
    assert_eq!(mock.get_call_count(), 1);
}
