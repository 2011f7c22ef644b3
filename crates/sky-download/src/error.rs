use sky_primitives::SkyError;
use sky_worker::WorkerError;

pub type DownloadResult<T> = Result<T, SkyError>;

pub(crate) fn from_worker_error(context: &'static str, err: WorkerError) -> SkyError {
    match err {
        WorkerError::NotEnoughWorkers { .. } => SkyError::NotEnoughWorkers { context },
        WorkerError::Timeout => SkyError::Timeout { context },
        WorkerError::Cancelled => SkyError::Cancelled { context },
        WorkerError::AllFailed(_) => SkyError::ProviderUnavailable { context },
    }
}
