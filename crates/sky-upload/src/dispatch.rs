use std::sync::Arc;

use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use sky_erasure::sector_root;
use sky_primitives::{Blocklist, Hash, RequestBudget, SkyError};
use sky_provider::ProviderClient;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::UploadResult;

/// Writes `sector` to `redundancy` providers in parallel and returns the
/// Merkle root it was stored under once a majority have acknowledged it.
///
/// Uploads never publish a skylink until every sector's quorum is met:
/// unlike the download side's escalating race, there is no fallback beyond
/// the `redundancy` providers dispatched here.
pub async fn write_sector_to_quorum(
    providers: &[Arc<dyn ProviderClient>],
    blocklist: &dyn Blocklist,
    sector: &[u8],
    redundancy: usize,
    budget: &RequestBudget,
    cancel: &CancellationToken,
) -> UploadResult<Hash> {
    let expected_root = sector_root(sector);
    if blocklist.is_blocked(&expected_root) {
        return Err(SkyError::Blocked {
            context: "write_sector_to_quorum",
        });
    }
    budget.check_deadline("write_sector_to_quorum")?;

    if providers.len() < redundancy {
        return Err(SkyError::NotEnoughWorkers {
            context: "write_sector_to_quorum",
        });
    }

    let quorum = redundancy.div_ceil(2).max(1);
    let mut in_flight = FuturesUnordered::new();
    for provider in &providers[..redundancy] {
        let provider = Arc::clone(provider);
        let body = sector.to_vec();
        in_flight.push(async move {
            let result = provider.write_sector(&body).await;
            (provider.provider_id(), result)
        });
    }

    let mut acks = 0usize;
    let mut errors = Vec::new();

    loop {
        if acks >= quorum {
            return Ok(expected_root);
        }
        tokio::select! {
            () = cancel.cancelled() => return Err(SkyError::Cancelled { context: "write_sector_to_quorum" }),
            () = sleep(budget.time_left()) => return Err(SkyError::Timeout { context: "write_sector_to_quorum" }),
            next = in_flight.next() => {
                match next {
                    Some((_, Ok(root))) if root == expected_root => acks += 1,
                    Some((provider_id, Ok(_))) => {
                        warn!(%provider_id, "provider stored sector under an unexpected root");
                        errors.push(format!("{provider_id}: root mismatch"));
                    }
                    Some((provider_id, Err(err))) => {
                        warn!(%provider_id, %err, "provider rejected sector write");
                        errors.push(err.to_string());
                    }
                    None => {
                        return Err(SkyError::NoSuccessfulUpdates { context: "write_sector_to_quorum" });
                    }
                }
                if in_flight.is_empty() && acks < quorum {
                    warn!(errors = errors.join("; "), "quorum not reached");
                    return Err(SkyError::NoSuccessfulUpdates { context: "write_sector_to_quorum" });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use sky_primitives::{NoBlocklist, PublicKey, SECTOR_SIZE};
    use sky_provider::client::memory::MemoryProvider;
    use sky_provider::PriceTable;

    use super::*;

    fn price() -> PriceTable {
        PriceTable {
            read_cost_per_byte: 1,
            write_cost_per_byte: 1,
            read_base_cost: 0,
            write_base_cost: 0,
            registry_read_cost: 0,
            registry_write_cost: 0,
        }
    }

    fn providers(n: u8) -> Vec<Arc<dyn ProviderClient>> {
        (0..n)
            .map(|i| Arc::new(MemoryProvider::new(PublicKey::new([i; 32]), price())) as Arc<dyn ProviderClient>)
            .collect()
    }

    #[tokio::test]
    async fn quorum_is_met_when_every_provider_agrees() {
        let sector = vec![9u8; SECTOR_SIZE];
        let root = write_sector_to_quorum(
            &providers(3),
            &NoBlocklist,
            &sector,
            3,
            &RequestBudget::unbounded(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(root, sector_root(&sector));
    }

    #[tokio::test]
    async fn fewer_providers_than_redundancy_is_rejected() {
        let sector = vec![9u8; SECTOR_SIZE];
        let err = write_sector_to_quorum(
            &providers(2),
            &NoBlocklist,
            &sector,
            3,
            &RequestBudget::unbounded(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SkyError::NotEnoughWorkers { .. }));
    }

    struct AlwaysBlocked;
    impl Blocklist for AlwaysBlocked {
        fn is_blocked(&self, _root: &Hash) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn blocked_root_is_rejected_before_dispatch() {
        let sector = vec![9u8; SECTOR_SIZE];
        let err = write_sector_to_quorum(
            &providers(1),
            &AlwaysBlocked,
            &sector,
            1,
            &RequestBudget::unbounded(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SkyError::Blocked { .. }));
    }
}
