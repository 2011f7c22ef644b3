use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WorkerError {
    #[error("fewer than {needed} healthy workers are available (have {available})")]
    NotEnoughWorkers { needed: usize, available: usize },
    #[error("deadline elapsed before any worker responded")]
    Timeout,
    #[error("operation cancelled")]
    Cancelled,
    #[error("every dispatched worker failed: {0}")]
    AllFailed(String),
}

pub type WorkerResult<T> = Result<T, WorkerError>;
