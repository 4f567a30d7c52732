//! Simulated transport
//!
//! Stands in for a platform API when running in mock mode or under test. It
//! answers every call with a synthetic 200 after a configurable latency,
//! fails a configurable fraction of calls with a 503, and can be scripted to
//! fail the next N calls with a specific error. Every call is logged so tests
//! can assert exactly what a connector sent.

use crate::transport::{PlatformCall, PlatformError, PlatformResponse, PlatformTransport};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::VecDeque;
use std::time::Duration;

/// Configuration for a simulated platform
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Minimum simulated latency
    pub min_latency: Duration,
    /// Maximum simulated latency
    pub max_latency: Duration,
    /// Fraction of calls (0.0 - 1.0) that fail with a 503
    pub failure_rate: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            min_latency: Duration::from_millis(10),
            max_latency: Duration::from_millis(50),
            failure_rate: 0.0,
        }
    }
}

impl SimulationConfig {
    /// Create a config with no latency and no failures
    pub fn instant() -> Self {
        Self {
            min_latency: Duration::ZERO,
            max_latency: Duration::ZERO,
            failure_rate: 0.0,
        }
    }

    /// Set the latency range
    pub fn with_latency(mut self, min: Duration, max: Duration) -> Self {
        self.min_latency = min;
        self.max_latency = max.max(min);
        self
    }

    /// Set the failure rate
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate.clamp(0.0, 1.0);
        self
    }
}

#[derive(Debug, Default)]
struct SimulationState {
    failure_rate: f64,
    scripted_failures: VecDeque<PlatformError>,
    response_overrides: Vec<(String, serde_json::Value)>,
    calls: Vec<PlatformCall>,
}

/// In-process [`PlatformTransport`] for mock mode and tests
#[derive(Debug)]
pub struct SimulatedTransport {
    platform: String,
    min_latency: Duration,
    max_latency: Duration,
    state: Mutex<SimulationState>,
}

impl SimulatedTransport {
    /// Create a simulated transport for a platform
    pub fn new(platform: impl Into<String>, config: SimulationConfig) -> Self {
        Self {
            platform: platform.into(),
            min_latency: config.min_latency,
            max_latency: config.max_latency.max(config.min_latency),
            state: Mutex::new(SimulationState {
                failure_rate: config.failure_rate.clamp(0.0, 1.0),
                ..Default::default()
            }),
        }
    }

    /// Platform this transport simulates
    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// Change the random failure rate at runtime
    pub fn set_failure_rate(&self, rate: f64) {
        self.state.lock().failure_rate = rate.clamp(0.0, 1.0);
    }

    /// Current random failure rate
    pub fn failure_rate(&self) -> f64 {
        self.state.lock().failure_rate
    }

    /// Fail the next `count` calls with a 503
    pub fn fail_next(&self, count: usize) {
        let error = PlatformError::new(503, "ServiceUnavailable", "Simulated outage");
        self.fail_next_with(error, count);
    }

    /// Fail the next `count` calls with the given error
    pub fn fail_next_with(&self, error: PlatformError, count: usize) {
        let mut state = self.state.lock();
        for _ in 0..count {
            state.scripted_failures.push_back(error.clone());
        }
    }

    /// Answer calls whose endpoint contains `fragment` with `data`
    pub fn respond_with(&self, fragment: impl Into<String>, data: serde_json::Value) {
        self.state.lock().response_overrides.push((fragment.into(), data));
    }

    /// All calls received so far
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.state.lock().calls.clone()
    }

    /// Number of calls received so far
    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    fn sample_latency(&self) -> Duration {
        if self.max_latency <= self.min_latency {
            return self.min_latency;
        }
        let min = self.min_latency.as_millis() as u64;
        let max = self.max_latency.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    fn should_fail_randomly(rate: f64) -> bool {
        rate > 0.0 && rand::thread_rng().gen::<f64>() < rate
    }
}

#[async_trait]
impl PlatformTransport for SimulatedTransport {
    async fn send(&self, call: PlatformCall) -> crate::Result<PlatformResponse> {
        let (scripted, random_rate, data) = {
            let mut state = self.state.lock();
            state.calls.push(call.clone());
            let scripted = state.scripted_failures.pop_front();
            let data = state
                .response_overrides
                .iter()
                .find(|(fragment, _)| call.endpoint.contains(fragment.as_str()))
                .map(|(_, data)| data.clone());
            (scripted, state.failure_rate, data)
        };

        let latency = self.sample_latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if let Some(error) = scripted {
            tracing::debug!(
                platform = %self.platform,
                endpoint = %call.endpoint,
                "Simulated scripted failure"
            );
            return Err(error);
        }

        if Self::should_fail_randomly(random_rate) {
            tracing::debug!(
                platform = %self.platform,
                endpoint = %call.endpoint,
                "Simulated random failure"
            );
            return Err(PlatformError::new(503, "ServiceUnavailable", "Simulated outage"));
        }

        let data = data.unwrap_or_else(|| {
            serde_json::json!({
                "simulated": true,
                "platform": self.platform,
                "method": call.method.as_str(),
                "endpoint": call.endpoint,
            })
        });

        Ok(PlatformResponse::new(200, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_success_records_call() {
        let transport = SimulatedTransport::new("twitter", SimulationConfig::instant());
        let response = transport
            .send(PlatformCall::put("/2/tweets/1/hidden"))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.data["platform"], "twitter");
        assert_eq!(transport.call_count(), 1);
        assert_eq!(transport.calls()[0].endpoint, "/2/tweets/1/hidden");
    }

    #[tokio::test]
    async fn test_scripted_failures_are_consumed_in_order() {
        let transport = SimulatedTransport::new("discord", SimulationConfig::instant());
        transport.fail_next_with(PlatformError::new(403, "Forbidden", "nope"), 1);
        transport.fail_next(1);

        let first = transport.send(PlatformCall::get("/a")).await.unwrap_err();
        assert_eq!(first.status(), 403);

        let second = transport.send(PlatformCall::get("/a")).await.unwrap_err();
        assert_eq!(second.status(), 503);

        assert!(transport.send(PlatformCall::get("/a")).await.is_ok());
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn test_full_failure_rate_always_fails() {
        let transport = SimulatedTransport::new("twitch", SimulationConfig::instant());
        transport.set_failure_rate(1.0);

        for _ in 0..5 {
            let err = transport.send(PlatformCall::get("/x")).await.unwrap_err();
            assert!(err.is_network_error());
        }
        assert_eq!(transport.failure_rate(), 1.0);
    }

    #[tokio::test]
    async fn test_response_override() {
        let transport = SimulatedTransport::new("twitter", SimulationConfig::instant());
        transport.respond_with("/hidden", serde_json::json!({ "data": { "hidden": false } }));

        let response = transport
            .send(PlatformCall::put("/2/tweets/9/hidden"))
            .await
            .unwrap();
        assert_eq!(response.data["data"]["hidden"], false);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_simulated() {
        let config = SimulationConfig::instant()
            .with_latency(Duration::from_millis(50), Duration::from_millis(100));
        let transport = SimulatedTransport::new("youtube", config);

        let start = tokio::time::Instant::now();
        transport.send(PlatformCall::get("/x")).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_config_clamps_failure_rate() {
        let config = SimulationConfig::default().with_failure_rate(3.0);
        assert_eq!(config.failure_rate, 1.0);
    }
}
