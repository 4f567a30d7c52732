//! Per-platform circuit breaker
//!
//! Stops calling a platform that keeps failing. Each platform has its own
//! state machine:
//!
//! - **closed**: calls pass; each failure bumps the counter and reaching the
//!   threshold opens the circuit.
//! - **open**: calls are rejected until the recovery timeout has elapsed. The
//!   first call after that moves the circuit to half-open (checked lazily, no
//!   timer).
//! - **half-open**: exactly one probe is let through. Success closes the
//!   circuit, failure reopens it at once.
//!
//! A call holds a [`BreakerPermit`] for its whole duration. Dropping a probe
//! permit without recording a result frees the probe slot again.

use crate::config::duration_ms;
use crate::error::ExecutorError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// Calls flow normally
    Closed,
    /// Calls are rejected
    Open,
    /// One probe call is testing whether the platform recovered
    HalfOpen,
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// How long the circuit stays open before allowing a probe
    #[serde(rename = "recoveryTimeoutMs", with = "duration_ms")]
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new config
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the failure threshold (at least 1)
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Set the recovery timeout
    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }
}

#[derive(Debug)]
struct PlatformCircuit {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<DateTime<Utc>>,
    next_attempt: Option<Instant>,
    probe_in_flight: bool,
    probe_generation: u64,
}

impl Default for PlatformCircuit {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_at: None,
            next_attempt: None,
            probe_in_flight: false,
            probe_generation: 0,
        }
    }
}

impl PlatformCircuit {
    fn open(&mut self, recovery_timeout: Duration) {
        self.state = CircuitState::Open;
        self.next_attempt = Some(Instant::now() + recovery_timeout);
        self.probe_in_flight = false;
    }

    fn retry_in(&self) -> Option<Duration> {
        match self.state {
            CircuitState::Open => self
                .next_attempt
                .map(|at| at.saturating_duration_since(Instant::now())),
            _ => None,
        }
    }
}

/// Snapshot of one platform's breaker
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerStatus {
    /// Current state
    pub state: CircuitState,
    /// Failures counted since the last reset
    pub failure_count: u32,
    /// When the last failure was recorded
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Time until a probe is allowed, while open
    pub retry_in_ms: Option<u64>,
}

/// Circuit breakers for every platform the executor has seen
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    circuits: Mutex<HashMap<String, Arc<Mutex<PlatformCircuit>>>>,
}

impl CircuitBreaker {
    /// Create a breaker set with the given config
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            circuits: Mutex::new(HashMap::new()),
        }
    }

    /// Breaker configuration
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn circuit(&self, platform: &str) -> Arc<Mutex<PlatformCircuit>> {
        self.circuits
            .lock()
            .entry(platform.to_string())
            .or_default()
            .clone()
    }

    /// Ask to call `platform`
    ///
    /// Fails with [`ExecutorError::CircuitOpen`] while the circuit is open or
    /// while another call holds the half-open probe.
    pub fn try_acquire(&self, platform: &str) -> Result<BreakerPermit, ExecutorError> {
        let circuit = self.circuit(platform);

        let probe = {
            let mut state = circuit.lock();
            let current = state.state;
            match current {
                CircuitState::Closed => None,
                CircuitState::Open => {
                    let now = Instant::now();
                    if let Some(at) = state.next_attempt.filter(|at| now < *at) {
                        debug!(platform = %platform, "Circuit open, rejecting call");
                        return Err(ExecutorError::CircuitOpen {
                            platform: platform.to_string(),
                            retry_in: at - now,
                        });
                    }
                    state.state = CircuitState::HalfOpen;
                    info!(platform = %platform, "Circuit breaker transitioning to half-open");
                    Some(Self::grant_probe(&mut state))
                }
                CircuitState::HalfOpen => {
                    if state.probe_in_flight {
                        return Err(ExecutorError::CircuitOpen {
                            platform: platform.to_string(),
                            retry_in: Duration::ZERO,
                        });
                    }
                    Some(Self::grant_probe(&mut state))
                }
            }
        };

        Ok(BreakerPermit {
            platform: platform.to_string(),
            circuit,
            config: self.config.clone(),
            probe,
        })
    }

    fn grant_probe(state: &mut PlatformCircuit) -> u64 {
        state.probe_in_flight = true;
        state.probe_generation += 1;
        state.probe_generation
    }

    /// Current state of a platform's circuit
    pub fn state(&self, platform: &str) -> CircuitState {
        self.circuits
            .lock()
            .get(platform)
            .map(|c| c.lock().state)
            .unwrap_or(CircuitState::Closed)
    }

    /// Force a platform's circuit closed
    pub fn reset(&self, platform: &str) {
        let circuit = self.circuit(platform);
        let mut state = circuit.lock();
        let generation = state.probe_generation;
        *state = PlatformCircuit {
            probe_generation: generation,
            ..Default::default()
        };
        info!(platform = %platform, "Circuit breaker reset");
    }

    /// Snapshot of one platform's circuit
    pub fn status(&self, platform: &str) -> CircuitBreakerStatus {
        let circuit = self.circuit(platform);
        let state = circuit.lock();
        CircuitBreakerStatus {
            state: state.state,
            failure_count: state.failure_count,
            last_failure_at: state.last_failure_at,
            retry_in_ms: state.retry_in().map(|d| d.as_millis() as u64),
        }
    }
}

/// Permission to make calls against a platform
///
/// Obtained from [`CircuitBreaker::try_acquire`]. Results are reported
/// through the permit so they land on the right circuit.
#[derive(Debug)]
pub struct BreakerPermit {
    platform: String,
    circuit: Arc<Mutex<PlatformCircuit>>,
    config: CircuitBreakerConfig,
    probe: Option<u64>,
}

impl BreakerPermit {
    /// Whether this permit is the half-open probe
    pub fn is_probe(&self) -> bool {
        self.probe.is_some()
    }

    /// Platform the permit is for
    pub fn platform(&self) -> &str {
        &self.platform
    }

    fn owns_probe(&self, state: &PlatformCircuit) -> bool {
        state.state == CircuitState::HalfOpen && self.probe == Some(state.probe_generation)
    }

    /// Report a successful call
    pub fn record_success(&self) {
        let mut state = self.circuit.lock();
        let current = state.state;
        match current {
            CircuitState::Closed => state.failure_count = 0,
            CircuitState::HalfOpen if self.owns_probe(&state) => {
                state.state = CircuitState::Closed;
                state.failure_count = 0;
                state.next_attempt = None;
                state.probe_in_flight = false;
                info!(platform = %self.platform, "Probe succeeded, circuit closed");
            }
            _ => {}
        }
    }

    /// Report a failed call; returns true if this failure opened the circuit
    pub fn record_failure(&self) -> bool {
        let mut state = self.circuit.lock();
        state.failure_count = state.failure_count.saturating_add(1);
        state.last_failure_at = Some(Utc::now());

        let current = state.state;
        match current {
            CircuitState::Closed if state.failure_count >= self.config.failure_threshold => {
                state.open(self.config.recovery_timeout);
                warn!(
                    platform = %self.platform,
                    failure_count = state.failure_count,
                    recovery_timeout_ms = self.config.recovery_timeout.as_millis() as u64,
                    "Circuit breaker opened"
                );
                true
            }
            CircuitState::HalfOpen if self.owns_probe(&state) => {
                state.open(self.config.recovery_timeout);
                warn!(
                    platform = %self.platform,
                    failure_count = state.failure_count,
                    "Probe failed, circuit breaker reopened"
                );
                true
            }
            _ => false,
        }
    }
}

impl Drop for BreakerPermit {
    fn drop(&mut self) {
        if self.probe.is_none() {
            return;
        }
        let mut state = self.circuit.lock();
        if self.owns_probe(&state) && state.probe_in_flight {
            state.probe_in_flight = false;
            debug!(platform = %self.platform, "Probe ended without a result, slot released");
        }
    }
}
