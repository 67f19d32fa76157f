//! Unified error types for the calculation engine.
//!
//! A single taxonomy covers registry lookups, graph construction, and
//! per-measure execution. The orchestrator catches per-measure failures
//! inside a batch and records a NaN sentinel instead of aborting siblings,
//! so every variant here is `Clone` — eagerly-resolved dependency failures
//! are stored once and replayed for each component that consumes them.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised while building dependency graphs or executing measures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// One or more requested measure keys are not registered.
    ///
    /// For a batch request this names *every* unresolvable key at once and
    /// is raised before any computation starts. For a lazily-referenced
    /// dependency it carries the single missing key and fails only the
    /// consuming measure's branch.
    #[error("measure(s) not found: {}", keys.join(", "))]
    MeasureNotFound { keys: Vec<String> },

    /// A measure depends on itself, directly or transitively.
    ///
    /// The chain lists every key from the entry point to the re-entered
    /// key, in visit order.
    #[error("circular dependency: {}", chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    /// A component source shape the engine refuses to execute.
    #[error("invalid component source on measure '{measure}': {reason}")]
    InvalidComponentSource { measure: String, reason: String },

    /// The external table source failed to produce records.
    #[error("table fetch failed for '{table}': {message}")]
    TableFetch { table: String, message: String },

    /// A time window or month walk needed a reference point the execution
    /// context does not carry.
    #[error("missing context: {0}")]
    MissingContext(String),
}

impl EngineError {
    /// A single-key not-found error (lazy dependency path).
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::MeasureNotFound {
            keys: vec![key.into()],
        }
    }

    /// An invalid-source error for a measure.
    pub fn invalid_source(measure: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidComponentSource {
            measure: measure.into(),
            reason: reason.into(),
        }
    }
}
