use std::sync::Arc;

use dashmap::DashMap;
use sky_download::RegistryLinkResolver;
use sky_format::Skylink;
use sky_primitives::{sha256, Hash, PublicKey, RequestBudget, SkyError, SECTOR_SIZE};
use sky_provider::ProviderClient;
use sky_worker::LatencyEstimator;
use tokio_util::sync::CancellationToken;

use crate::coordinator::read;
use crate::error::RegistryResult;

/// A skylink's 32-byte address field has no room for a full `(public_key,
/// data_key)` pair, so a registry (v2) skylink instead addresses the
/// `blended_id` below: whoever mints the link registers the pair it stands
/// for with [`RegistryResolver::register_key`] first.
fn blended_id(owner: PublicKey, data_key: Hash) -> Hash {
    let mut preimage = Vec::with_capacity(64);
    preimage.extend_from_slice(owner.as_slice());
    preimage.extend_from_slice(data_key.as_bytes());
    sha256(&preimage)
}

/// Resolves v2 skylinks by reading the registry entry they address and
/// decoding its `data` as a v1 (or further v2) skylink.
pub struct RegistryResolver {
    providers: Vec<Arc<dyn ProviderClient>>,
    latency: LatencyEstimator,
    keys: DashMap<Hash, (PublicKey, Hash)>,
}

impl RegistryResolver {
    #[must_use]
    pub fn new(providers: Vec<Arc<dyn ProviderClient>>) -> Self {
        Self {
            providers,
            latency: LatencyEstimator::default(),
            keys: DashMap::new(),
        }
    }

    /// Remembers the `(owner, data_key)` pair a blended id stands for so a
    /// later [`resolve`](RegistryLinkResolver::resolve) can recover it.
    pub fn register_key(&self, owner: PublicKey, data_key: Hash) -> Hash {
        let id = blended_id(owner, data_key);
        self.keys.insert(id, (owner, data_key));
        id
    }

    /// Builds the v2 skylink addressing `(owner, data_key)`, registering the
    /// pair first so `resolve` can later recover it.
    pub fn registry_skylink(&self, owner: PublicKey, data_key: Hash) -> RegistryResult<Skylink> {
        let id = self.register_key(owner, data_key);
        Skylink::new(2, 0, SECTOR_SIZE as u64, id).map_err(|_| SkyError::InvalidSkylink {
            context: "RegistryResolver::registry_skylink",
        })
    }
}

#[async_trait::async_trait]
impl RegistryLinkResolver for RegistryResolver {
    async fn resolve(
        &self,
        registry_skylink: Skylink,
        budget: &RequestBudget,
        cancel: &CancellationToken,
    ) -> sky_download::DownloadResult<Skylink> {
        let id = registry_skylink.merkle_root();
        let (owner, data_key) = self
            .keys
            .get(&id)
            .map(|entry| *entry.value())
            .ok_or(SkyError::InvalidSkylink {
                context: "RegistryResolver::resolve",
            })?;

        let entry = read(&self.providers, owner, data_key, &self.latency, budget, cancel).await?;
        Skylink::from_bytes(&entry.data).map_err(|_| SkyError::InvalidSkylink {
            context: "RegistryResolver::resolve",
        })
    }
}
