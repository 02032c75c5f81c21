//! Circuit breaker state machine

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::DomainError;

/// Circuit status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitStatus {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tuning for a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerSettings {
    /// Failures within the window that open the circuit
    pub failure_threshold: u32,
    /// Span after which a failure streak starts over
    pub failure_window: Duration,
    /// Time spent OPEN before a trial request is admitted
    pub cooldown: Duration,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window: Duration::from_secs(60),
            cooldown: Duration::from_secs(30),
        }
    }
}

/// Callback invoked on every status change with `(provider, from, to)`
pub type TransitionObserver = Arc<dyn Fn(&str, CircuitStatus, CircuitStatus) + Send + Sync>;

/// Point-in-time view of a breaker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitBreakerSnapshot {
    pub provider: String,
    pub status: CircuitStatus,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_state_change_at: DateTime<Utc>,
    pub manual_override: bool,
    pub trial_in_flight: bool,
}

#[derive(Debug)]
struct BreakerState {
    status: CircuitStatus,
    consecutive_failures: u32,
    window_started: Option<Instant>,
    last_failure: Option<DateTime<Utc>>,
    last_state_change: Instant,
    last_state_change_at: DateTime<Utc>,
    manual_override: bool,
    trial_in_flight: bool,
    /// Bumped by manual commands; permits issued before a bump are void
    generation: u64,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            status: CircuitStatus::Closed,
            consecutive_failures: 0,
            window_started: None,
            last_failure: None,
            last_state_change: Instant::now(),
            last_state_change_at: Utc::now(),
            manual_override: false,
            trial_in_flight: false,
            generation: 0,
        }
    }

    fn transition(&mut self, to: CircuitStatus) -> Option<(CircuitStatus, CircuitStatus)> {
        let from = self.status;
        self.status = to;
        self.last_state_change = Instant::now();
        self.last_state_change_at = Utc::now();

        (from != to).then_some((from, to))
    }
}

/// Per-provider circuit breaker.
///
/// All state sits behind one mutex that is never held across an await, so
/// a trip to OPEN updates the counter and both timestamps together.
pub struct CircuitBreaker {
    provider: String,
    settings: CircuitBreakerSettings,
    state: Mutex<BreakerState>,
    observer: Option<TransitionObserver>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("provider", &self.provider)
            .field("settings", &self.settings)
            .field("state", &self.state)
            .finish()
    }
}

impl CircuitBreaker {
    pub fn new(provider: impl Into<String>, settings: CircuitBreakerSettings) -> Self {
        Self {
            provider: provider.into(),
            settings,
            state: Mutex::new(BreakerState::new()),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: TransitionObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn settings(&self) -> &CircuitBreakerSettings {
        &self.settings
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        // A panic while holding the lock cannot leave the state half-written.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(&self, transition: Option<(CircuitStatus, CircuitStatus)>) {
        let Some((from, to)) = transition else {
            return;
        };

        match to {
            CircuitStatus::Open => {
                warn!(provider = %self.provider, from = %from, "Circuit opened")
            }
            CircuitStatus::HalfOpen => {
                info!(provider = %self.provider, "Circuit half-open, admitting trial request")
            }
            CircuitStatus::Closed => {
                info!(provider = %self.provider, from = %from, "Circuit closed")
            }
        }

        if let Some(observer) = &self.observer {
            observer(&self.provider, from, to);
        }
    }

    /// Ask to attempt a call.
    ///
    /// Returns a permit that must be settled with the call's outcome, or
    /// [`DomainError::CircuitOpen`] when the provider may not be attempted.
    pub fn try_acquire(self: &Arc<Self>) -> Result<CallPermit, DomainError> {
        let mut transition = None;

        let admitted = {
            let mut state = self.lock();

            let trial = match state.status {
                CircuitStatus::Closed => Some(false),
                CircuitStatus::Open if state.manual_override => None,
                CircuitStatus::Open => {
                    if state.last_state_change.elapsed() >= self.settings.cooldown {
                        transition = state.transition(CircuitStatus::HalfOpen);
                        state.trial_in_flight = true;
                        Some(true)
                    } else {
                        None
                    }
                }
                CircuitStatus::HalfOpen if state.trial_in_flight => None,
                CircuitStatus::HalfOpen => {
                    state.trial_in_flight = true;
                    Some(true)
                }
            };

            trial.map(|trial| (trial, state.generation))
        };

        self.notify(transition);

        match admitted {
            Some((trial, generation)) => Ok(CallPermit {
                breaker: Some(Arc::clone(self)),
                trial,
                generation,
            }),
            None => {
                debug!(provider = %self.provider, "Call rejected by open circuit");
                Err(DomainError::circuit_open(&self.provider))
            }
        }
    }

    fn on_success(&self, trial: bool, generation: u64) {
        let transition = {
            let mut state = self.lock();
            if state.generation != generation {
                return;
            }

            match state.status {
                CircuitStatus::Closed => {
                    state.consecutive_failures = 0;
                    state.window_started = None;
                    state.manual_override = false;
                    None
                }
                CircuitStatus::HalfOpen if trial => {
                    state.trial_in_flight = false;
                    state.consecutive_failures = 0;
                    state.window_started = None;
                    state.manual_override = false;
                    state.transition(CircuitStatus::Closed)
                }
                _ => None,
            }
        };

        self.notify(transition);
    }

    fn on_failure(&self, trial: bool, generation: u64) {
        let transition = {
            let mut state = self.lock();
            if state.generation != generation {
                return;
            }

            let now = Instant::now();
            state.last_failure = Some(Utc::now());

            match state.status {
                CircuitStatus::Closed => {
                    let window_expired = state
                        .window_started
                        .is_none_or(|started| now.duration_since(started) > self.settings.failure_window);

                    if window_expired {
                        state.consecutive_failures = 1;
                        state.window_started = Some(now);
                    } else {
                        state.consecutive_failures += 1;
                    }

                    if state.consecutive_failures >= self.settings.failure_threshold {
                        state.manual_override = false;
                        state.transition(CircuitStatus::Open)
                    } else {
                        None
                    }
                }
                CircuitStatus::HalfOpen if trial => {
                    state.trial_in_flight = false;
                    state.consecutive_failures = self.settings.failure_threshold;
                    state.transition(CircuitStatus::Open)
                }
                _ => None,
            }
        };

        self.notify(transition);
    }

    fn on_abandon(&self, trial: bool, generation: u64) {
        if !trial {
            return;
        }

        let mut state = self.lock();
        if state.generation == generation && state.status == CircuitStatus::HalfOpen {
            state.trial_in_flight = false;
        }
    }

    fn apply_manual(&self, status: CircuitStatus, manual_override: bool) {
        let transition = {
            let mut state = self.lock();
            state.generation += 1;
            state.trial_in_flight = false;
            state.manual_override = manual_override;

            if status == CircuitStatus::Closed {
                state.consecutive_failures = 0;
                state.window_started = None;
            }

            state.transition(status)
        };

        self.notify(transition);
    }

    /// Pin the circuit OPEN until another manual command
    pub fn force_open(&self) {
        info!(provider = %self.provider, "Circuit forced open");
        self.apply_manual(CircuitStatus::Open, true);
    }

    /// Force the circuit CLOSED; it may still trip automatically
    pub fn force_close(&self) {
        info!(provider = %self.provider, "Circuit forced closed");
        self.apply_manual(CircuitStatus::Closed, true);
    }

    /// Return to the initial CLOSED state
    pub fn reset(&self) {
        info!(provider = %self.provider, "Circuit reset");
        let mut transition = None;
        {
            let mut state = self.lock();
            let generation = state.generation + 1;
            let from = state.status;
            *state = BreakerState::new();
            state.generation = generation;
            if from != CircuitStatus::Closed {
                transition = Some((from, CircuitStatus::Closed));
            }
        }
        self.notify(transition);
    }

    pub fn status(&self) -> CircuitStatus {
        self.lock().status
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let state = self.lock();

        CircuitBreakerSnapshot {
            provider: self.provider.clone(),
            status: state.status,
            consecutive_failures: state.consecutive_failures,
            failure_threshold: self.settings.failure_threshold,
            last_failure_at: state.last_failure,
            last_state_change_at: state.last_state_change_at,
            manual_override: state.manual_override,
            trial_in_flight: state.trial_in_flight,
        }
    }
}

/// Admission ticket for one call.
///
/// Settle it with [`succeed`](Self::succeed) or [`fail`](Self::fail).
/// Dropping it unsettled (e.g. the caller was cancelled) frees a held trial
/// slot without counting a failure.
#[must_use = "a permit must be settled with the call outcome"]
#[derive(Debug)]
pub struct CallPermit {
    breaker: Option<Arc<CircuitBreaker>>,
    trial: bool,
    generation: u64,
}

impl CallPermit {
    /// A permit that records nothing, for when circuit breaking is disabled
    pub fn unguarded() -> Self {
        Self {
            breaker: None,
            trial: false,
            generation: 0,
        }
    }

    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn succeed(mut self) {
        if let Some(breaker) = self.breaker.take() {
            breaker.on_success(self.trial, self.generation);
        }
    }

    pub fn fail(mut self) {
        if let Some(breaker) = self.breaker.take() {
            breaker.on_failure(self.trial, self.generation);
        }
    }

    /// Release without counting, for outcomes that say nothing about the
    /// provider's health
    pub fn release(self) {}
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if let Some(breaker) = self.breaker.take() {
            breaker.on_abandon(self.trial, self.generation);
        }
    }
}
