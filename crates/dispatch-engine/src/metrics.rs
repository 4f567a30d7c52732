//! Process-wide executor metrics
//!
//! Counts every action the executor finishes, including those that end in an
//! error, broken down by platform and by requested action.

use chrono::{DateTime, Utc};
use connectors::ActionKind;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;

/// How one finished action should be counted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    /// Executed or escalated
    pub success: bool,
    /// A substitute action was attempted
    pub fallback: bool,
    /// Handed to manual review
    pub manual_review: bool,
}

impl Tally {
    /// Executed as requested
    pub fn executed() -> Self {
        Self {
            success: true,
            fallback: false,
            manual_review: false,
        }
    }

    /// Failed or rejected
    pub fn failed() -> Self {
        Self {
            success: false,
            fallback: false,
            manual_review: false,
        }
    }

    /// Executed through a substitute action
    pub fn fallback() -> Self {
        Self {
            fallback: true,
            ..Self::executed()
        }
    }

    /// Escalated to manual review
    pub fn manual_review() -> Self {
        Self {
            manual_review: true,
            ..Self::executed()
        }
    }
}

/// Counters for one platform or one action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionCounters {
    /// Actions finished
    pub total: u64,
    /// Executed or escalated
    pub successful: u64,
    /// Failed or rejected
    pub failed: u64,
    /// Ran through a substitute action
    pub fallbacks: u64,
    /// Handed to manual review
    pub manual_reviews: u64,
    /// Times the circuit opened
    pub circuit_breaker_trips: u64,
}

impl ActionCounters {
    fn add(&mut self, tally: Tally) {
        self.total += 1;
        if tally.success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        if tally.fallback {
            self.fallbacks += 1;
        }
        if tally.manual_review {
            self.manual_reviews += 1;
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    totals: ActionCounters,
    by_platform: BTreeMap<String, ActionCounters>,
    by_action: BTreeMap<ActionKind, ActionCounters>,
}

/// Read-only copy of the metrics
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Actions finished
    pub total_actions: u64,
    /// Executed or escalated
    pub successful_actions: u64,
    /// Failed or rejected
    pub failed_actions: u64,
    /// Ran through a substitute action
    pub fallback_actions: u64,
    /// Handed to manual review
    pub manual_reviews: u64,
    /// Times any circuit opened
    pub circuit_breaker_trips: u64,
    /// Per-platform counters
    pub by_platform: BTreeMap<String, ActionCounters>,
    /// Per-action counters, keyed by requested action
    pub by_action: BTreeMap<ActionKind, ActionCounters>,
    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,
    /// Seconds since the metrics were created
    pub uptime_secs: f64,
}

/// Executor metrics behind a single mutex
#[derive(Debug)]
pub struct ExecutorMetrics {
    started: Instant,
    counters: Mutex<Counters>,
}

impl Default for ExecutorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutorMetrics {
    /// Create zeroed metrics
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            counters: Mutex::new(Counters::default()),
        }
    }

    /// Count a finished action
    pub fn record(&self, platform: &str, action: ActionKind, tally: Tally) {
        let mut counters = self.counters.lock();
        counters.totals.add(tally);
        counters
            .by_platform
            .entry(platform.to_string())
            .or_default()
            .add(tally);
        counters.by_action.entry(action).or_default().add(tally);
    }

    /// Count a circuit opening on `platform`
    pub fn record_circuit_trip(&self, platform: &str) {
        let mut counters = self.counters.lock();
        counters.totals.circuit_breaker_trips += 1;
        counters
            .by_platform
            .entry(platform.to_string())
            .or_default()
            .circuit_breaker_trips += 1;
    }

    /// Copy the current counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = self.counters.lock();
        MetricsSnapshot {
            total_actions: counters.totals.total,
            successful_actions: counters.totals.successful,
            failed_actions: counters.totals.failed,
            fallback_actions: counters.totals.fallbacks,
            manual_reviews: counters.totals.manual_reviews,
            circuit_breaker_trips: counters.totals.circuit_breaker_trips,
            by_platform: counters.by_platform.clone(),
            by_action: counters.by_action.clone(),
            timestamp: Utc::now(),
            uptime_secs: self.started.elapsed().as_secs_f64(),
        }
    }
}
