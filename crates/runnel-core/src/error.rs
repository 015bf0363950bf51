//! Error types for the Runnel protocol.
//!
//! Every error aborts the enclosing engine call with no partial state
//! mutation; nothing is retried internally.
use thiserror::Error;

/// Weighted receiver list errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListError {
    #[error("sentinel identity used as a receiver")] InvalidIdentity,
    #[error("unknown traversal cursor: {0}")] UnknownCursor(String),
    #[error("duplicate receiver: {0}")] DuplicateReceiver(String),
    #[error("too many entries: {count} > {max}")] TooManyEntries { count: usize, max: usize },
    #[error("weight sum overflow")] ArithmeticOverflow,
}

/// Cycle-delta ledger errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("reserved cycle used as a real cycle: {0}")] InvalidCycle(u64),
    #[error("unknown traversal cursor: cycle {0}")] UnknownCursor(u64),
    #[error("delta overflow")] ArithmeticOverflow,
    #[error("delta underflow: per-cycle total went negative")] ArithmeticUnderflow,
}

/// Funding state machine and hub errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FundingError {
    #[error("insufficient balance: have {have}, need {need}")] InsufficientBalance { have: u128, need: u128 },
    #[error("proxy weights sum to {got}, expected {expected}")] WeightSumMismatch { got: u64, expected: u64 },
    #[error("target is not a registered proxy: {0}")] UnknownProxy(String),
    #[error("asset transfer failed: {0}")] TransferFailed(String),
    #[error("cycle length must be non-zero")] InvalidCycleLength,
    #[error("balance arithmetic overflow")] ArithmeticOverflow,
}

/// Top-level error wrapping every engine concern.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunnelError {
    #[error(transparent)] List(#[from] ListError),
    #[error(transparent)] Ledger(#[from] LedgerError),
    #[error(transparent)] Funding(#[from] FundingError),
}
