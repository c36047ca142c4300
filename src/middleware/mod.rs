// Middleware for resilient service calls
//
// Circuit breaking per caption candidate; an open circuit soft-skips
// the candidate in the fallback walk.

pub mod circuit_breaker;

// Re-export commonly used types
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
