//! Error taxonomy for the engine's request surface. Internal plumbing
//! (SQLite, HTTP, JSON, file IO) keeps propagating `anyhow::Error`; this
//! taxonomy wraps that at the boundary the engine's endpoints (`api.rs`)
//! are called through.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("input validation failed: {0}")]
    InputValidation(String),

    #[error("team not resolved: {0}")]
    ResolutionMissing(String),

    #[error("league_id is required to create teams")]
    LeagueRequired,

    #[error("CSV schema mismatch: missing columns, available headers were: {available:?}")]
    SchemaMismatch { available: Vec<String> },

    #[error("upstream source unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("rate limited by upstream, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("no active model for the requested type")]
    NoActiveModel,

    #[error("insufficient training samples: have {have}, need {need}")]
    InsufficientTrainingSamples { have: usize, need: usize },

    #[error("task was cancelled")]
    Cancelled,

    #[error("a model of this type is already being activated")]
    ConflictActivation,

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    /// The taxonomy code surfaced on the HTTP-style response (`success=false`
    /// responses carry this alongside a human string).
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InputValidation(_) => "InputValidation",
            EngineError::ResolutionMissing(_) => "ResolutionMissing",
            EngineError::LeagueRequired => "LeagueRequired",
            EngineError::SchemaMismatch { .. } => "SchemaMismatch",
            EngineError::UpstreamUnavailable(_) => "UpstreamUnavailable",
            EngineError::RateLimited { .. } => "RateLimited",
            EngineError::NoActiveModel => "NoActiveModel",
            EngineError::InsufficientTrainingSamples { .. } => "InsufficientTrainingSamples",
            EngineError::Cancelled => "Cancelled",
            EngineError::ConflictActivation => "ConflictActivation",
            EngineError::Sqlite(_) => "StorageError",
            EngineError::Http(_) => "UpstreamUnavailable",
            EngineError::Other(_) => "InternalError",
        }
    }
}

/// Per-fixture / per-row recoverable issues that do not abort the caller;
/// these are accumulated and summarized at the batch boundary rather than
/// returned as `Err`.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    InsufficientTeamData { team_ref: String },
    DegenerateProbability { detail: String },
    ParseSkip { row: usize, reason: String },
    FallbackDefaults { team_ref: String },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::InsufficientTeamData { team_ref } => {
                write!(f, "team {team_ref} used default strengths")
            }
            Warning::DegenerateProbability { detail } => {
                write!(f, "degenerate probability recovered: {detail}")
            }
            Warning::ParseSkip { row, reason } => write!(f, "row {row} skipped: {reason}"),
            Warning::FallbackDefaults { team_ref } => {
                write!(f, "team {team_ref} fell back to default ratings")
            }
        }
    }
}
