//! Circuit breaker and retry behavior through the executor
//!
//! Time-dependent tests run on a paused clock so recovery timeouts and
//! backoff delays elapse instantly.

use connectors::{ActionKind, ConnectorRegistry, ModerationRequest, SimulatedPlatforms};
use dispatch_engine::{
    ActionExecutor, CircuitBreakerConfig, CircuitState, ExecutorConfig, ExecutorError, RetryConfig,
};
use platform_client::{PlatformError, SimulationConfig};
use std::time::Duration;

const RECOVERY: Duration = Duration::from_secs(10);

fn executor_with(
    simulation: SimulationConfig,
    threshold: u32,
    max_retries: u32,
) -> (ActionExecutor, SimulatedPlatforms) {
    let (registry, platforms) = ConnectorRegistry::simulated(simulation);
    let config = ExecutorConfig::new()
        .with_circuit_breaker(
            CircuitBreakerConfig::new()
                .with_failure_threshold(threshold)
                .with_recovery_timeout(RECOVERY),
        )
        .with_retry(
            RetryConfig::new()
                .with_max_retries(max_retries)
                .with_base_delay(Duration::from_millis(100))
                .with_max_delay(Duration::from_secs(1)),
        );
    (ActionExecutor::new(registry, config), platforms)
}

fn block(user: &str) -> ModerationRequest {
    ModerationRequest::new("twitter", "org-1", ActionKind::BlockUser)
        .with_content("tweet-1")
        .with_author(user, None)
}

#[tokio::test(start_paused = true)]
async fn test_breaker_opens_after_threshold() {
    let (executor, platforms) = executor_with(SimulationConfig::instant(), 3, 0);
    platforms.twitter.fail_next(3);

    for _ in 0..3 {
        let err = executor.execute(&block("u1")).await.unwrap_err();
        assert!(matches!(err, ExecutorError::PlatformCall { attempts: 1, .. }));
    }
    assert_eq!(platforms.twitter.call_count(), 3);

    let err = executor.execute(&block("u1")).await.unwrap_err();
    match err {
        ExecutorError::CircuitOpen { platform, retry_in } => {
            assert_eq!(platform, "twitter");
            assert!(retry_in <= RECOVERY);
        }
        other => panic!("expected CircuitOpen, got {other:?}"),
    }
    assert_eq!(platforms.twitter.call_count(), 3, "open circuit must not reach the platform");

    let status = &executor.circuit_breaker_status()["twitter"];
    assert_eq!(status.state, CircuitState::Open);
    assert_eq!(status.failure_count, 3);
    assert!(status.last_failure_at.is_some());

    let metrics = executor.metrics();
    assert_eq!(metrics.circuit_breaker_trips, 1);
    assert_eq!(metrics.failed_actions, 4);
}

#[tokio::test(start_paused = true)]
async fn test_open_circuit_reports_remaining_wait() {
    let (executor, platforms) = executor_with(SimulationConfig::instant(), 1, 0);
    platforms.twitter.fail_next(1);
    executor.execute(&block("u1")).await.unwrap_err();

    tokio::time::advance(Duration::from_secs(4)).await;
    match executor.execute(&block("u1")).await.unwrap_err() {
        ExecutorError::CircuitOpen { retry_in, .. } => {
            assert!(retry_in <= Duration::from_secs(6));
            assert!(retry_in > Duration::from_secs(5));
        }
        other => panic!("expected CircuitOpen, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_other_platforms_unaffected_by_open_circuit() {
    let (executor, platforms) = executor_with(SimulationConfig::instant(), 1, 0);
    platforms.twitter.fail_next(1);
    executor.execute(&block("u1")).await.unwrap_err();

    let request = ModerationRequest::new("discord", "org-1", ActionKind::BlockUser)
        .with_content("msg-1")
        .with_author("u1", None)
        .with_metadata("guildId", "guild-1");
    assert!(executor.execute(&request).await.unwrap().success());
    assert_eq!(executor.circuit_breaker_status()["discord"].state, CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_half_open_success_closes_circuit() {
    let (executor, platforms) = executor_with(SimulationConfig::instant(), 2, 0);
    platforms.twitter.fail_next(2);
    executor.execute(&block("u1")).await.unwrap_err();
    executor.execute(&block("u1")).await.unwrap_err();
    assert_eq!(executor.circuit_breaker_status()["twitter"].state, CircuitState::Open);

    tokio::time::advance(RECOVERY).await;
    let outcome = executor.execute(&block("u1")).await.unwrap();
    assert!(outcome.success());
    assert_eq!(platforms.twitter.call_count(), 3, "probe is exactly one invocation");

    let status = &executor.circuit_breaker_status()["twitter"];
    assert_eq!(status.state, CircuitState::Closed);
    assert_eq!(status.failure_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_half_open_failure_reopens_immediately() {
    let (executor, platforms) = executor_with(SimulationConfig::instant(), 2, 3);
    platforms.twitter.fail_next(100);
    executor.execute(&block("u1")).await.unwrap_err();
    assert_eq!(executor.circuit_breaker_status()["twitter"].state, CircuitState::Open);
    let before_probe = platforms.twitter.call_count();

    tokio::time::advance(RECOVERY).await;
    let err = executor.execute(&block("u1")).await.unwrap_err();
    assert!(matches!(err, ExecutorError::PlatformCall { attempts: 1, .. }));
    assert_eq!(platforms.twitter.call_count(), before_probe + 1);
    assert_eq!(executor.circuit_breaker_status()["twitter"].state, CircuitState::Open);

    // The reopened circuit waits a full recovery timeout again
    let err = executor.execute(&block("u1")).await.unwrap_err();
    assert!(matches!(err, ExecutorError::CircuitOpen { .. }));
    assert_eq!(executor.metrics().circuit_breaker_trips, 2);
}

#[tokio::test(start_paused = true)]
async fn test_only_one_probe_in_flight() {
    let latency = Duration::from_millis(200);
    let (executor, platforms) =
        executor_with(SimulationConfig::instant().with_latency(latency, latency), 1, 0);
    platforms.twitter.fail_next(1);
    executor.execute(&block("u1")).await.unwrap_err();

    tokio::time::advance(RECOVERY).await;
    let (first_request, second_request) = (block("u1"), block("u2"));
    let (first, second) = tokio::join!(
        executor.execute(&first_request),
        executor.execute(&second_request)
    );

    assert!(first.unwrap().success());
    assert!(matches!(second.unwrap_err(), ExecutorError::CircuitOpen { .. }));
    assert_eq!(platforms.twitter.call_count(), 2);
    assert_eq!(executor.circuit_breaker_status()["twitter"].state, CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_reset_closes_open_circuit() {
    let (executor, platforms) = executor_with(SimulationConfig::instant(), 1, 0);
    platforms.twitter.fail_next(1);
    executor.execute(&block("u1")).await.unwrap_err();

    executor.reset_circuit_breaker("twitter");
    assert!(executor.execute(&block("u1")).await.unwrap().success());
}

#[tokio::test(start_paused = true)]
async fn test_succeeds_on_last_allowed_attempt() {
    let (executor, platforms) = executor_with(SimulationConfig::instant(), 10, 2);
    platforms.twitter.fail_next(2);

    let outcome = executor.execute(&block("u1")).await.unwrap();
    assert!(outcome.success());
    assert_eq!(platforms.twitter.call_count(), 3);
    assert_eq!(executor.metrics().successful_actions, 1);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_waits_between_attempts() {
    let (executor, platforms) = executor_with(SimulationConfig::instant(), 10, 2);
    platforms.twitter.fail_next(2);

    let start = tokio::time::Instant::now();
    executor.execute(&block("u1")).await.unwrap();

    // 100ms then 200ms base delays, jittered into [0.5, 1.5]
    let waited = start.elapsed();
    assert!(waited >= Duration::from_millis(150), "waited {waited:?}");
    assert!(waited <= Duration::from_millis(450), "waited {waited:?}");
}

fn too_many_requests(retry_after: Duration) -> PlatformError {
    PlatformError::rate_limited("Too Many Requests", Some(retry_after))
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_is_reported() {
    let (executor, platforms) = executor_with(SimulationConfig::instant(), 10, 0);
    platforms.twitter.fail_next_with(too_many_requests(Duration::from_secs(1)), 10);

    let err = executor.execute(&block("u1")).await.unwrap_err();
    assert!(matches!(err, ExecutorError::PlatformCall { rate_limited: true, attempts: 1, .. }));
    assert_eq!(platforms.twitter.call_count(), 1, "no retries hidden below the executor");
    assert_eq!(executor.circuit_breaker_status()["twitter"].failure_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_every_rate_limited_call_reaches_breaker() {
    let (executor, platforms) = executor_with(SimulationConfig::instant(), 3, 2);
    platforms.twitter.fail_next_with(too_many_requests(Duration::from_millis(500)), 10);

    let err = executor.execute(&block("u1")).await.unwrap_err();
    assert!(matches!(err, ExecutorError::PlatformCall { rate_limited: true, attempts: 3, .. }));
    assert_eq!(platforms.twitter.call_count(), 3);

    let status = &executor.circuit_breaker_status()["twitter"];
    assert_eq!(status.state, CircuitState::Open);
    assert_eq!(status.failure_count, 3);
    assert_eq!(executor.metrics().circuit_breaker_trips, 1);
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_floors_backoff() {
    let (executor, platforms) = executor_with(SimulationConfig::instant(), 10, 1);
    platforms.twitter.fail_next_with(too_many_requests(Duration::from_millis(900)), 1);

    let start = tokio::time::Instant::now();
    assert!(executor.execute(&block("u1")).await.unwrap().success());

    // The 100ms backoff would be at most 150ms; the platform asked for 900ms
    let waited = start.elapsed();
    assert!(waited >= Duration::from_millis(900), "waited {waited:?}");
    assert_eq!(platforms.twitter.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_is_capped_at_max_delay() {
    let (executor, platforms) = executor_with(SimulationConfig::instant(), 10, 1);
    platforms.twitter.fail_next_with(too_many_requests(Duration::from_secs(3600)), 1);

    let start = tokio::time::Instant::now();
    assert!(executor.execute(&block("u1")).await.unwrap().success());
    assert!(start.elapsed() <= Duration::from_secs(1), "waited {:?}", start.elapsed());
}

#[tokio::test(start_paused = true)]
async fn test_failed_fallback_is_escalated_not_propagated() {
    let (executor, platforms) = executor_with(SimulationConfig::instant(), 10, 1);
    platforms.twitter.fail_next(2);

    let request = ModerationRequest::new("twitter", "org-1", ActionKind::ReportUser)
        .with_content("tweet-1")
        .with_author("u1", None);
    let outcome = executor.execute(&request).await.unwrap();

    assert!(outcome.requires_manual_review());
    assert_eq!(platforms.twitter.call_count(), 2);
    assert_eq!(outcome.details["fallbackAction"], "blockUser");
}
