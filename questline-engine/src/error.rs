use thiserror::Error;

use crate::achievements::AwardError;
use crate::campaign::CampaignError;
use crate::config::ConfigError;
use crate::finalize::FinalizeError;
use crate::grace::GraceError;
use crate::ledger::LedgerError;
use crate::scoring::ScoringError;
use crate::streaks::StreakError;

/// Coarse classification callers use to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Rejected before any state was touched; fix the input and retry.
    InvalidInput,
    /// A logic defect in stored or supplied state; surfaced, never corrected.
    InconsistentState,
    /// The store failed; the operation was rolled back and may be retried.
    StorageFailure,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error(transparent)]
    Streak(#[from] StreakError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Grace(#[from] GraceError),
    #[error(transparent)]
    Award(#[from] AwardError),
    #[error(transparent)]
    Campaign(#[from] CampaignError),
    #[error(transparent)]
    Finalize(#[from] FinalizeError),
    #[error("storage failure during {operation}: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl EngineError {
    pub(crate) fn storage<E>(operation: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            operation,
            source: Box::new(source),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::Scoring(_) | Self::Campaign(_) => ErrorKind::InvalidInput,
            Self::Streak(_) | Self::Ledger(_) | Self::Award(_) => ErrorKind::InconsistentState,
            Self::Grace(err) => grace_kind(err),
            Self::Finalize(err) => match err {
                FinalizeError::AlreadyFinalized { .. }
                | FinalizeError::NegativePenalty { .. }
                | FinalizeError::NegativeGain { .. }
                | FinalizeError::UnknownSkill { .. } => ErrorKind::InvalidInput,
                FinalizeError::Grace(grace) => grace_kind(grace),
                FinalizeError::Streak(_) | FinalizeError::Ledger(_) => {
                    ErrorKind::InconsistentState
                }
                FinalizeError::Storage { .. } => ErrorKind::StorageFailure,
            },
            Self::Storage { .. } => ErrorKind::StorageFailure,
        }
    }
}

const fn grace_kind(err: &GraceError) -> ErrorKind {
    match err {
        GraceError::AlreadyGranted { .. } | GraceError::NoneAvailable { .. } => {
            ErrorKind::InvalidInput
        }
        GraceError::UnknownToken { .. } => ErrorKind::InconsistentState,
    }
}
