//! Cycle-level errors. Any of these aborts the current cycle only; the last
//! published snapshot stays authoritative.

use crate::catalog::CatalogError;
use crate::history::HistoryError;
use orbitwatch_conjunction::ScreeningError;
use orbitwatch_core::{CoreError, EventError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("Catalog fetch failed: {0}")]
    Catalog(#[from] CatalogError),

    #[error("History store error: {0}")]
    History(#[from] HistoryError),

    #[error("Screening failed: {0}")]
    Screening(ScreeningError),

    #[error("Conjunction event rejected: {0}")]
    Event(#[from] EventError),

    #[error("Candidate refers to unknown object {0}")]
    UnknownObject(String),

    #[error("Snapshot encoding failed: {0}")]
    Snapshot(#[from] CoreError),

    #[error("Worker pool could not be built: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Cycle cancelled before publication")]
    Cancelled,
}

impl From<ScreeningError> for CycleError {
    fn from(e: ScreeningError) -> Self {
        match e {
            ScreeningError::Cancelled => CycleError::Cancelled,
            other => CycleError::Screening(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, CycleError>;
