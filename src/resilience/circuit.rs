//! Circuit breaker and the named breaker registry.
//!
//! # States
//!
//! ```text
//! Closed ──(volume ≥ volume_threshold && error% ≥ error_threshold)──► Open
//! Open ──(reset_timeout elapsed, next call)──► HalfOpen
//! HalfOpen ──(probe succeeds)──► Closed
//! HalfOpen ──(probe fails)──► Open
//! ```
//!
//! While open every call is rejected with [`HuginnError::CircuitOpen`] without
//! invoking the wrapped operation. In half-open exactly one probe is let
//! through; concurrent callers are rejected until it settles.
//!
//! Each call is bounded by `timeout`. A call that overruns is dropped, counted
//! as a failure and reported as [`HuginnError::CircuitTimeout`].

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::telemetry;
use crate::{HuginnError, Result};

/// Name of the breaker guarding the completion upstream.
pub const UPSTREAM_BREAKER: &str = "llm-service";

/// Breaker mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Configuration for a circuit breaker.
///
/// ```rust
/// # use huginn::BreakerConfig;
/// # use std::time::Duration;
/// let config = BreakerConfig::new()
///     .volume_threshold(20)
///     .reset_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerConfig {
    /// Per-call time budget. Default: 10s.
    pub timeout: Duration,
    /// Error percentage (0-100) at which the breaker opens. Default: 50.
    pub error_threshold: f64,
    /// How long the breaker stays open before probing. Default: 30s.
    pub reset_timeout: Duration,
    /// Calls required in the window before the error rate is evaluated. Default: 10.
    pub volume_threshold: u32,
    /// Age after which outcomes leave the statistic. Default: 10s.
    pub rolling_window: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(10_000),
            error_threshold: 50.0,
            reset_timeout: Duration::from_millis(30_000),
            volume_threshold: 10,
            rolling_window: Duration::from_millis(10_000),
        }
    }
}

impl BreakerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn error_threshold(mut self, percent: f64) -> Self {
        self.error_threshold = percent;
        self
    }

    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    pub fn volume_threshold(mut self, calls: u32) -> Self {
        self.volume_threshold = calls;
        self
    }

    pub fn rolling_window(mut self, window: Duration) -> Self {
        self.rolling_window = window;
        self
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerStats {
    pub state: CircuitState,
    /// Outcomes currently inside the rolling window.
    pub window_calls: usize,
    pub window_failures: usize,
    /// Time since the last state transition.
    pub since_transition: Duration,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    last_transition: Instant,
    outcomes: VecDeque<(Instant, bool)>,
    probe_in_flight: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Pass,
    Probe,
}

/// A single named failure-isolation state machine.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                last_transition: Instant::now(),
                outcomes: VecDeque::new(),
                probe_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Current mode. An open breaker whose reset timeout has elapsed still
    /// reports `Open` until the next call arrives.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn stats(&self) -> BreakerStats {
        let mut inner = self.lock();
        let now = Instant::now();
        self.prune(&mut inner, now);
        BreakerStats {
            state: inner.state,
            window_calls: inner.outcomes.len(),
            window_failures: inner.outcomes.iter().filter(|(_, ok)| !ok).count(),
            since_transition: now.saturating_duration_since(inner.last_transition),
        }
    }

    /// Run `f` through the breaker.
    ///
    /// Returns [`HuginnError::CircuitOpen`] without calling `f` when the call
    /// is not admitted, and [`HuginnError::CircuitTimeout`] when `f` does not
    /// finish within the configured timeout. Any other error is `f`'s own.
    pub async fn fire<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut guard = CallGuard {
            breaker: self,
            admission: self.admit()?,
            settled: false,
        };

        let result = match tokio::time::timeout(self.config.timeout, f()).await {
            Ok(result) => result,
            Err(_) => Err(HuginnError::CircuitTimeout {
                breaker: self.name.clone(),
                timeout: self.config.timeout,
            }),
        };

        guard.settled = true;
        self.settle(guard.admission, result.is_ok());
        result
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn admit(&self) -> Result<Admission> {
        let mut inner = self.lock();
        let now = Instant::now();
        match inner.state {
            CircuitState::Closed => Ok(Admission::Pass),
            CircuitState::Open => {
                let reopen_at = inner.last_transition + self.config.reset_timeout;
                if now >= reopen_at {
                    self.transition(&mut inner, CircuitState::HalfOpen, now);
                    inner.probe_in_flight = true;
                    Ok(Admission::Probe)
                } else {
                    Err(self.reject())
                }
            }
            CircuitState::HalfOpen if !inner.probe_in_flight => {
                inner.probe_in_flight = true;
                Ok(Admission::Probe)
            }
            CircuitState::HalfOpen => Err(self.reject()),
        }
    }

    fn settle(&self, admission: Admission, success: bool) {
        let mut inner = self.lock();
        let now = Instant::now();
        match admission {
            Admission::Probe => {
                inner.probe_in_flight = false;
                if inner.state != CircuitState::HalfOpen {
                    return;
                }
                if success {
                    inner.outcomes.clear();
                    self.transition(&mut inner, CircuitState::Closed, now);
                } else {
                    self.transition(&mut inner, CircuitState::Open, now);
                }
            }
            Admission::Pass => {
                // Stragglers that finish after the breaker left Closed are ignored.
                if inner.state != CircuitState::Closed {
                    return;
                }
                inner.outcomes.push_back((now, success));
                self.prune(&mut inner, now);

                let total = inner.outcomes.len();
                if total < self.config.volume_threshold as usize {
                    return;
                }
                let failures = inner.outcomes.iter().filter(|(_, ok)| !ok).count();
                let error_pct = failures as f64 * 100.0 / total as f64;
                if failures > 0 && error_pct >= self.config.error_threshold {
                    warn!(
                        breaker = %self.name,
                        calls = total,
                        failures,
                        error_pct,
                        "error threshold reached"
                    );
                    self.transition(&mut inner, CircuitState::Open, now);
                }
            }
        }
    }

    fn prune(&self, inner: &mut BreakerInner, now: Instant) {
        while let Some((at, _)) = inner.outcomes.front() {
            if now.saturating_duration_since(*at) > self.config.rolling_window {
                inner.outcomes.pop_front();
            } else {
                break;
            }
        }
    }

    fn transition(&self, inner: &mut BreakerInner, to: CircuitState, now: Instant) {
        let from = inner.state;
        inner.state = to;
        inner.last_transition = now;
        if to == CircuitState::Open {
            inner.outcomes.clear();
        }
        metrics::counter!(telemetry::BREAKER_TRANSITIONS_TOTAL,
            "breaker" => self.name.clone(),
            "to" => to.as_str(),
        )
        .increment(1);
        match to {
            CircuitState::Open => {
                warn!(breaker = %self.name, from = from.as_str(), "circuit breaker is now OPEN")
            }
            CircuitState::HalfOpen => {
                info!(breaker = %self.name, from = from.as_str(), "circuit breaker is now HALF-OPEN")
            }
            CircuitState::Closed => {
                info!(breaker = %self.name, from = from.as_str(), "circuit breaker is now CLOSED")
            }
        }
    }

    fn reject(&self) -> HuginnError {
        metrics::counter!(telemetry::BREAKER_REJECTIONS_TOTAL, "breaker" => self.name.clone())
            .increment(1);
        warn!(breaker = %self.name, "circuit breaker rejected request");
        HuginnError::CircuitOpen {
            breaker: self.name.clone(),
        }
    }
}

/// Frees the half-open probe slot if a probe is dropped before it settles.
struct CallGuard<'a> {
    breaker: &'a CircuitBreaker,
    admission: Admission,
    settled: bool,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if !self.settled && self.admission == Admission::Probe {
            self.breaker.lock().probe_in_flight = false;
        }
    }
}

/// Lazily creates and memoizes one [`CircuitBreaker`] per name.
///
/// Thread-safe with double-checked locking: at most one breaker is ever
/// created for a name, even when the first lookups race. Breakers live for
/// the lifetime of the registry.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    defaults: BreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    /// Create a registry whose breakers use `defaults`.
    pub fn new(defaults: BreakerConfig) -> Self {
        Self {
            defaults,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create the breaker for `name` with the registry defaults.
    pub fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        self.get_or_create(name, || self.defaults.clone())
    }

    /// Get or create the breaker for `name`.
    ///
    /// `config` only applies when this call creates the breaker.
    pub fn get_with(&self, name: &str, config: BreakerConfig) -> Arc<CircuitBreaker> {
        self.get_or_create(name, || config)
    }

    /// Names of all breakers created so far.
    pub fn names(&self) -> Vec<String> {
        let breakers = self.breakers.read().unwrap_or_else(|e| e.into_inner());
        breakers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.breakers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_or_create(
        &self,
        name: &str,
        config: impl FnOnce() -> BreakerConfig,
    ) -> Arc<CircuitBreaker> {
        // Fast path: already created (read lock)
        {
            let breakers = self.breakers.read().unwrap_or_else(|e| e.into_inner());
            if let Some(breaker) = breakers.get(name) {
                return Arc::clone(breaker);
            }
        }

        // Slow path: double-check under the write lock
        let mut breakers = self.breakers.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            breakers
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(name, config()))),
        )
    }
}
