//! Per-provider failure isolation

mod circuit_breaker;

pub use circuit_breaker::{
    CallPermit, CircuitBreaker, CircuitBreakerSettings, CircuitBreakerSnapshot, CircuitStatus,
    TransitionObserver,
};
