use thiserror::Error;

/// Errors surfaced by the bracket engine.
///
/// Every mutating operation validates before it touches state, so an `Err`
/// always means the bracket is exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BracketError {
    /// Malformed input data, e.g. a registration record without identity.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("match {match_id} not found")]
    NotFound { match_id: u64 },

    #[error("invalid score: {0}")]
    InvalidScore(String),

    #[error("need at least 2 approved participants to build a bracket (found {found})")]
    InsufficientParticipants { found: usize },

    #[error("config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, BracketError>;
