use std::sync::Arc;
use std::time::Instant;

use sky_crypto::Skykey;
use sky_download::{download_by_root, download_skyfile, resolve_to_file_skylink, RegistryLinkResolver, SkyfileContents};
use sky_format::{parse_base_sector, Fanout, Skylink};
use sky_primitives::{Blocklist, Hash, NoBlocklist, PublicKey, RequestBudget, SkyError, SECTOR_SIZE};
use sky_provider::ProviderClient;
use sky_registry::{EntryType, RegistryEntry, RegistryResolver, Subscription};
use sky_upload::{upload_skyfile, write_sector_to_quorum, PathBinder, UploadOutcome, UploadParams, UploadResult};
use sky_worker::{LatencyEstimator, StatEvent, StatsAggregator, WorkerPool};
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::CoreResult;

/// Wires every subcrate into one composed portal: a worker pool and registry
/// resolver over a fixed provider set, a blocklist, an optional path binder
/// for named uploads, and the stats aggregator every operation reports to.
///
/// This is the only type application code outside this workspace is
/// expected to hold; everything else (`sky_download`, `sky_upload`,
/// `sky_registry`) is reachable directly for collaborators that want finer
/// control, but `Portal` is the composed entry point.
pub struct Portal {
    providers: Vec<Arc<dyn ProviderClient>>,
    pool: WorkerPool,
    blocklist: Arc<dyn Blocklist>,
    path_binder: Option<Arc<dyn PathBinder>>,
    registry: Arc<RegistryResolver>,
    registry_latency: LatencyEstimator,
    stats: StatsAggregator,
    config: Config,
}

impl Portal {
    #[must_use]
    pub fn new(
        providers: Vec<Arc<dyn ProviderClient>>,
        blocklist: Arc<dyn Blocklist>,
        path_binder: Option<Arc<dyn PathBinder>>,
        config: Config,
    ) -> Self {
        let pool = WorkerPool::new(providers.clone(), config.worker_queue_limit);
        let registry = Arc::new(RegistryResolver::new(providers.clone()));
        Self {
            providers,
            pool,
            blocklist,
            path_binder,
            registry,
            registry_latency: LatencyEstimator::default(),
            stats: StatsAggregator::new(),
            config,
        }
    }

    /// A portal over `providers` with no blocklist and no named-path
    /// binding, for tests and single-provider local deployments.
    #[must_use]
    pub fn unblocked(providers: Vec<Arc<dyn ProviderClient>>, config: Config) -> Self {
        Self::new(providers, Arc::new(NoBlocklist), None, config)
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    #[must_use]
    pub fn providers(&self) -> &[Arc<dyn ProviderClient>] {
        &self.providers
    }

    /// Downloads a skylink end to end: follows registry redirects, fetches
    /// and decrypts the base sector, and resolves the encoded byte range.
    /// `path` selects a subfile on a directory skylink; single-file
    /// skylinks ignore it and an explicit byte-range skylink always wins.
    pub async fn download_by_skylink(
        &self,
        skylink: Skylink,
        path: &str,
        known_skykeys: &[Skykey],
        budget: &RequestBudget,
        cancel: &CancellationToken,
    ) -> CoreResult<SkyfileContents> {
        let started = Instant::now();
        let resolver: &dyn RegistryLinkResolver = self.registry.as_ref();
        let contents = download_skyfile(
            &self.pool,
            self.blocklist.as_ref(),
            Some(resolver),
            skylink,
            path,
            known_skykeys,
            budget,
            cancel,
        )
        .await?;
        self.stats.record(StatEvent::SectorRead {
            bytes: contents.bytes.len() as u64,
            latency: started.elapsed(),
        });
        Ok(contents)
    }

    /// Fetches `[offset, offset+length)` of the sector addressed by `root`,
    /// honoring the blocklist and racing/escalating across the worker pool.
    pub async fn download_by_root(
        &self,
        root: Hash,
        offset: u32,
        length: u32,
        budget: &RequestBudget,
        cancel: &CancellationToken,
    ) -> CoreResult<Vec<u8>> {
        download_by_root(&self.pool, self.blocklist.as_ref(), root, offset, length, budget, cancel).await
    }

    /// Uploads a byte stream as a skyfile, optionally binding it to a named
    /// path. `sia_path` is rejected with `InvalidPath` when this portal
    /// wasn't constructed with a [`PathBinder`]: silently skipping a binding
    /// the caller explicitly asked for would be worse than failing loudly.
    pub async fn upload<R: AsyncRead + Unpin>(
        &self,
        reader: R,
        params: UploadParams,
        sia_path: Option<(&str, bool)>,
        budget: &RequestBudget,
        cancel: &CancellationToken,
    ) -> CoreResult<UploadOutcome> {
        let path_binder = match (sia_path, self.path_binder.as_deref()) {
            (Some((path, force)), Some(binder)) => Some((path, force, binder)),
            (Some(_), None) => {
                return Err(SkyError::InvalidPath {
                    context: "Portal::upload",
                });
            }
            (None, _) => None,
        };

        let outcome = upload_skyfile(&self.providers, self.blocklist.as_ref(), reader, params, path_binder, budget, cancel).await?;
        self.stats.record(StatEvent::SectorWritten {
            bytes: outcome.file_size,
        });
        Ok(outcome)
    }

    /// Re-uploads every sector reachable from `skylink` (the base sector and
    /// every fanout piece) to this portal's own providers, extending their
    /// rental of content that already exists elsewhere.
    ///
    /// Sectors are content-addressed, so re-writing identical bytes always
    /// reproduces the same root; this never touches the skylink itself.
    pub async fn pin(&self, skylink: Skylink, budget: &RequestBudget, cancel: &CancellationToken) -> CoreResult<()> {
        let file_link = resolve_to_file_skylink(Some(self.registry.as_ref() as &dyn RegistryLinkResolver), skylink, budget, cancel).await?;

        let base_sector = download_by_root(&self.pool, self.blocklist.as_ref(), file_link.merkle_root(), 0, SECTOR_SIZE as u32, budget, cancel).await?;
        self.pin_sector(&base_sector, budget, cancel).await?;

        let parsed = parse_base_sector(&base_sector).map_err(|_| SkyError::InvalidSkylink { context: "Portal::pin" })?;
        if parsed.layout.fanout_size == 0 {
            return Ok(());
        }
        let fanout = Fanout::decode(&parsed.fanout_bytes, parsed.layout.fanout_pieces_stored())
            .map_err(|_| SkyError::InvalidSkylink { context: "Portal::pin" })?;

        for chunk_index in 0..fanout.chunk_count() {
            let Some(roots) = fanout.chunk(chunk_index) else {
                continue;
            };
            for &root in roots {
                if root.is_zero() {
                    continue;
                }
                let piece = download_by_root(&self.pool, self.blocklist.as_ref(), root, 0, SECTOR_SIZE as u32, budget, cancel).await?;
                self.pin_sector(&piece, budget, cancel).await?;
            }
        }
        Ok(())
    }

    async fn pin_sector(&self, sector: &[u8], budget: &RequestBudget, cancel: &CancellationToken) -> CoreResult<()> {
        write_sector_to_quorum(&self.providers, self.blocklist.as_ref(), sector, self.config.base_chunk_redundancy, budget, cancel)
            .await?;
        Ok(())
    }

    /// Drops no state of its own: this portal doesn't own a pin index (the
    /// persisted-state collaborator surface names a sector store, a
    /// session log and a registry cache, not a pin list), so unpinning is
    /// purely a confirmation hook for a collaborator layering pin
    /// bookkeeping on top.
    pub fn unpin(&self, _skylink: Skylink) {}

    pub async fn registry_read(
        &self,
        owner: PublicKey,
        data_key: Hash,
        budget: &RequestBudget,
        cancel: &CancellationToken,
    ) -> CoreResult<RegistryEntry> {
        sky_registry::read(&self.providers, owner, data_key, &self.registry_latency, budget, cancel).await
    }

    pub async fn registry_update(
        &self,
        owner: PublicKey,
        entry: &RegistryEntry,
        budget: &RequestBudget,
        cancel: &CancellationToken,
    ) -> CoreResult<()> {
        sky_registry::update(&self.providers, owner, entry, budget, cancel).await
    }

    /// Mints the v2 skylink addressing `(owner, data_key)`, registering the
    /// pair with this portal's resolver so a later download through it can
    /// recover the registry key.
    pub fn registry_skylink(&self, owner: PublicKey, data_key: Hash) -> CoreResult<Skylink> {
        self.registry.registry_skylink(owner, data_key)
    }

    pub async fn subscribe(&self, owner: PublicKey, data_key: Hash) -> CoreResult<Subscription> {
        sky_registry::subscribe(&self.providers, owner, data_key).await
    }

    pub fn unsubscribe(&self, subscription: Subscription) {
        sky_registry::unsubscribe(subscription);
    }
}

/// Convenience for signing a registry entry without pulling
/// `sky_registry::entry` into a caller that only ever deals with `Portal`.
pub fn sign_registry_entry(
    signer: &sky_primitives::PrivateKey,
    data_key: Hash,
    data: Vec<u8>,
    revision: u64,
    primary: bool,
) -> CoreResult<RegistryEntry> {
    let entry_type = if primary { EntryType::Primary } else { EntryType::NonPrimary };
    RegistryEntry::sign(signer, data_key, data, revision, entry_type)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    use rand::thread_rng;
    use sky_primitives::PrivateKey;
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

    fn small_upload_params(filename: &str) -> UploadParams {
        UploadParams {
            filename: filename.to_owned(),
            skykey: None,
            data_pieces: 10,
            parity_pieces: 20,
            base_chunk_redundancy: 3,
            dry_run: false,
            subfiles: None,
            default_path: None,
            disable_default_path: false,
        }
    }

    #[tokio::test]
    async fn upload_then_download_round_trips() {
        let portal = Portal::unblocked(providers(5), Config::default());
        let budget = RequestBudget::unbounded();
        let cancel = CancellationToken::new();

        let outcome = portal
            .upload(&b"hello world"[..], small_upload_params("greeting.txt"), None, &budget, &cancel)
            .await
            .unwrap();

        let contents = portal
            .download_by_skylink(outcome.skylink, "/", &[], &budget, &cancel)
            .await
            .unwrap();
        assert_eq!(contents.bytes, b"hello world");
        assert_eq!(portal.stats().snapshot().sector_reads, 1);
    }

    #[tokio::test]
    async fn upload_with_unconfigured_path_binder_is_rejected() {
        let portal = Portal::unblocked(providers(5), Config::default());
        let budget = RequestBudget::unbounded();
        let cancel = CancellationToken::new();

        let err = portal
            .upload(&b"x"[..], small_upload_params("x.txt"), Some(("/x.txt", false)), &budget, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, SkyError::InvalidPath { .. }));
    }

    struct MapBinder {
        bindings: StdMutex<HashMap<String, Skylink>>,
    }

    impl PathBinder for MapBinder {
        fn existing(&self, sia_path: &str) -> Option<Skylink> {
            self.bindings.lock().unwrap().get(sia_path).copied()
        }

        fn bind(&self, sia_path: &str, skylink: Skylink) -> UploadResult<()> {
            self.bindings.lock().unwrap().insert(sia_path.to_owned(), skylink);
            Ok(())
        }
    }

    #[tokio::test]
    async fn upload_binds_a_named_path_when_configured() {
        let binder = Arc::new(MapBinder {
            bindings: StdMutex::new(HashMap::new()),
        });
        let portal = Portal::new(providers(5), Arc::new(NoBlocklist), Some(binder.clone()), Config::default());
        let budget = RequestBudget::unbounded();
        let cancel = CancellationToken::new();

        let outcome = portal
            .upload(&b"bound"[..], small_upload_params("bound.txt"), Some(("/bound.txt", false)), &budget, &cancel)
            .await
            .unwrap();
        assert_eq!(binder.existing("/bound.txt"), Some(outcome.skylink));
    }

    #[tokio::test]
    async fn registry_round_trips_through_the_portal() {
        let portal = Portal::unblocked(providers(5), Config::default());
        let budget = RequestBudget::unbounded();
        let cancel = CancellationToken::new();

        let sk = PrivateKey::random(&mut thread_rng());
        let pk = sk.public_key();
        let data_key = Hash::new([4u8; 32]);
        let entry = sign_registry_entry(&sk, data_key, b"v1".to_vec(), 1, true).unwrap();

        portal.registry_update(pk, &entry, &budget, &cancel).await.unwrap();
        let fetched = portal.registry_read(pk, data_key, &budget, &cancel).await.unwrap();
        assert_eq!(fetched.data, b"v1");
    }

    #[tokio::test]
    async fn pin_replicates_every_sector_onto_the_portals_providers() {
        let upload_providers = providers(5);
        let portal = Portal::unblocked(upload_providers.clone(), Config::default());
        let budget = RequestBudget::unbounded();
        let cancel = CancellationToken::new();

        let outcome = portal
            .upload(&vec![7u8; 2 * SECTOR_SIZE + 123][..], small_upload_params("big.bin"), None, &budget, &cancel)
            .await
            .unwrap();

        let pinning_providers = providers(5);
        let pinning_portal = Portal::unblocked(pinning_providers.clone(), Config::default());
        // Reach across to the uploading providers for the fetch side: a
        // portal only re-uploads to its own providers, so wire a pool that
        // can see the source sectors by constructing it directly.
        let mixed_pool = WorkerPool::new(upload_providers, 8);
        let mixed_portal = Portal {
            providers: pinning_providers,
            pool: mixed_pool,
            blocklist: Arc::new(NoBlocklist),
            path_binder: None,
            registry: Arc::new(RegistryResolver::new(vec![])),
            registry_latency: LatencyEstimator::default(),
            stats: StatsAggregator::new(),
            config: Config::default(),
        };

        mixed_portal.pin(outcome.skylink, &budget, &cancel).await.unwrap();
        let contents = pinning_portal
            .download_by_skylink(outcome.skylink, "/", &[], &budget, &cancel)
            .await
            .unwrap();
        assert_eq!(contents.bytes.len(), 2 * SECTOR_SIZE + 123);
    }
}
