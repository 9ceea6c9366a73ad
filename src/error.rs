//! Error types shared across the routing engine

use thiserror::Error;

/// Errors surfaced by the routing engine.
///
/// Input and arithmetic problems are reported as the specific variant that
/// detected them; programming errors (broken route chains, mismatched
/// currencies handed to arithmetic) surface as `ContractViolation`.
/// `GuardLimitExceeded` is raised only when the caller opted into strict
/// guard handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid currency code: {0:?}")]
    InvalidCurrency(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("scale {0} is outside the supported range 0..=50")]
    ScaleOutOfRange(u32),
    #[error("division by zero")]
    DivisionByZero,
    #[error("currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: String, actual: String },
    #[error("negative amount not allowed: {0}")]
    NegativeAmount(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("contract violation: {0}")]
    ContractViolation(String),
    #[error("guard limit exceeded: {0}")]
    GuardLimitExceeded(String),
}

impl EngineError {
    /// Convenience constructor for currency mismatches.
    pub fn currency_mismatch(expected: &str, actual: &str) -> Self {
        EngineError::CurrencyMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}
