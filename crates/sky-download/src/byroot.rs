use sky_primitives::{Blocklist, Hash, RequestBudget, SkyError};
use sky_worker::WorkerPool;
use tokio_util::sync::CancellationToken;

use crate::error::{from_worker_error, DownloadResult};

/// Fetches `[offset, offset+length)` of the sector addressed by `root` from
/// whichever healthy worker answers first, honoring the blocklist and the
/// request's budget.
pub async fn download_by_root(
    pool: &WorkerPool,
    blocklist: &dyn Blocklist,
    root: Hash,
    offset: u32,
    length: u32,
    budget: &RequestBudget,
    cancel: &CancellationToken,
) -> DownloadResult<Vec<u8>> {
    if blocklist.is_blocked(&root) {
        return Err(SkyError::Blocked {
            context: "download_by_root",
        });
    }

    budget.check_deadline("download_by_root")?;

    pool.fetch_root(root, offset, length, budget, cancel)
        .await
        .map_err(|err| from_worker_error("download_by_root", err))
}
